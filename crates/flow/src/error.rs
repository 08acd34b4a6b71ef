use std::{error::Error, sync::Arc, time::Duration};

use thiserror::Error;

type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// Terminal signal travelling down a [`Flow`](crate::Flow).
///
/// Cloneable so a [`Broadcast`](crate::Broadcast) can hand the same failure to every subscriber.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
	#[error(
		"stage <name='{stage}'> failed{}: {source}",
		.element.as_ref().map(|element| format!(" on <element='{element}'>")).unwrap_or_default()
	)]
	Stage {
		stage: String,
		element: Option<String>,
		#[source]
		source: SharedError,
	},
	#[error("flow cancelled")]
	Cancelled,
	#[error("flow timed out after {0:?}")]
	TimedOut(Duration),
	#[error("task of stage <name='{stage}'> could not be joined: {reason}")]
	Join { stage: String, reason: String },
}

impl FlowError {
	pub fn stage(stage: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
		Self::Stage {
			stage: stage.into(),
			element: None,
			source: Arc::new(source),
		}
	}

	pub fn stage_on(
		stage: impl Into<String>,
		element: impl ToString,
		source: impl Error + Send + Sync + 'static,
	) -> Self {
		Self::Stage {
			stage: stage.into(),
			element: Some(element.to_string()),
			source: Arc::new(source),
		}
	}

	#[must_use]
	pub const fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled | Self::TimedOut(_))
	}
}
