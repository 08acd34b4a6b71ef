use std::{fmt, io, path::Path};

use retina_flow::FlowError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{registry::StageKind, retrieve::InvalidCorrespondence, storage::StorageError};

/// File I/O error that includes the path that caused the error
#[derive(Error, Debug)]
pub struct FileIOError {
	pub path: Box<Path>,
	#[source]
	pub source: io::Error,
	pub maybe_context: Option<&'static str>,
}

impl fmt::Display for FileIOError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "file I/O error")?;
		if let Some(ctx) = self.maybe_context {
			write!(f, " ({ctx})")?;
		}
		write!(f, ": {}; <path='{}'>", self.source, self.path.display())
	}
}

impl<P: AsRef<Path>> From<(P, io::Error)> for FileIOError {
	fn from((path, source): (P, io::Error)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: None,
		}
	}
}

impl<P: AsRef<Path>> From<(P, io::Error, &'static str)> for FileIOError {
	fn from((path, source, context): (P, io::Error, &'static str)) -> Self {
		Self {
			path: path.as_ref().into(),
			source,
			maybe_context: Some(context),
		}
	}
}

#[derive(Error, Debug)]
pub enum Error {
	// Configuration errors, raised while a schema or graph is built
	#[error("no {kind} registered for <type='{name}'>")]
	UnknownStage { kind: StageKind, name: String },
	#[error("<type='{name}'> is a {found}, expected a {expected}")]
	StageKindMismatch {
		name: String,
		expected: StageKind,
		found: StageKind,
	},
	#[error("no analyser registered for <type='{0}'>")]
	UnknownAnalyser(String),
	#[error("no connection provider registered for <database='{0}'>")]
	UnknownConnection(String),
	#[error("field not found: <schema='{schema}', field='{field}'>")]
	UnknownField { schema: String, field: String },
	#[error("pipeline <name='{pipeline}'> targets <schema='{expected}'> but was built for <schema='{found}'>")]
	SchemaMismatch {
		pipeline: String,
		expected: String,
		found: String,
	},
	#[error("missing required parameter: <stage='{stage}', key='{key}'>")]
	MissingParameter { stage: String, key: String },
	#[error("invalid parameter <stage='{stage}', key='{key}', value='{value}'>: {reason}")]
	InvalidParameter {
		stage: String,
		key: String,
		value: String,
		reason: String,
	},
	#[error("field names must not contain '.': <field='{0}'>")]
	InvalidFieldName(String),
	#[error("field declared twice: <schema='{schema}', field='{field}'>")]
	DuplicateField { schema: String, field: String },
	#[error("schema already loaded: <name='{0}'>")]
	DuplicateSchema(String),
	#[error("failed to parse configuration <path='{}'>: {reason}", .path.display())]
	ConfigFile { path: Box<Path>, reason: String },
	#[error("failed to install logger: {0}")]
	Logging(String),
	#[error("invalid correspondence function: {0}")]
	Correspondence(#[from] InvalidCorrespondence),

	// Consistency errors
	#[error("analyser <expected='{expected}'> cannot serve <field='{field}'> bound to <analyser='{found}'>")]
	AnalyserMismatch {
		field: String,
		expected: String,
		found: String,
	},
	#[error("descriptor <id='{descriptor}'> already describes <retrievable='{bound}'>")]
	AlreadyAssigned {
		descriptor: uuid::Uuid,
		bound: uuid::Uuid,
	},

	// Query errors
	#[error("schema not found: <name='{0}'>")]
	UnknownSchema(String),
	#[error("unsupported query for <field='{field}'>: {reason}")]
	UnsupportedQuery { field: String, reason: String },

	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error(transparent)]
	Flow(#[from] FlowError),
	#[error(transparent)]
	FileIO(#[from] FileIOError),
}

/// Error as reported across the query boundary: a status code and a message, never a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatus {
	pub code: u16,
	pub message: String,
}

impl Error {
	#[must_use]
	pub fn status(&self) -> QueryStatus {
		let code = match self {
			Self::UnknownSchema(_) | Self::UnknownField { .. } => 404,

			Self::UnsupportedQuery { .. }
			| Self::MissingParameter { .. }
			| Self::InvalidParameter { .. }
			| Self::AnalyserMismatch { .. }
			| Self::Storage(StorageError::InvalidQuery { .. }) => 400,

			_ => 500,
		};

		QueryStatus {
			code,
			message: self.to_string(),
		}
	}
}

impl From<Error> for QueryStatus {
	fn from(e: Error) -> Self {
		e.status()
	}
}
