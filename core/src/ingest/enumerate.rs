use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use async_stream::stream;
use futures::StreamExt;
use regex::Regex;
use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, Operator, Values};
use tokio::fs;
use tracing::{debug, error, instrument, trace};

use crate::{
	context::{IndexContext, Parameters},
	error::FileIOError,
	model::{FileSource, MediaType, Source, SourceRef},
	register_stage, Error,
};

/// Walks a directory tree and emits a source for every file of an accepted media type.
///
/// Files are visited in path order. `skip` and `limit` count the regular files matching `regex`,
/// before media types are filtered, and unreadable entries are logged and skipped.
#[derive(Debug)]
pub struct FileSystemEnumerator {
	name: String,
	root: PathBuf,
	depth: usize,
	skip: usize,
	limit: usize,
	media_types: Vec<MediaType>,
	regex: Option<Regex>,
}

impl FileSystemEnumerator {
	pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
		Self {
			name: name.into(),
			root: root.into(),
			depth: usize::MAX,
			skip: 0,
			limit: usize::MAX,
			media_types: MediaType::ALL.to_vec(),
			regex: None,
		}
	}

	#[instrument(skip_all, fields(stage = %parameters.stage()), err)]
	pub fn from_parameters(parameters: &Parameters) -> Result<Self, Error> {
		let mut enumerator = Self::new(parameters.stage(), parameters.require("path")?);

		if let Some(depth) = parameters.parse("depth")? {
			enumerator.depth = depth;
		}
		if let Some(skip) = parameters.parse("skip")? {
			enumerator.skip = skip;
		}
		if let Some(limit) = parameters.parse("limit")? {
			enumerator.limit = limit;
		}
		if let Some(types) = parameters.get("mediaTypes") {
			enumerator.media_types = types
				.split(',')
				.map(|t| {
					t.trim().parse().map_err(|e: strum::ParseError| Error::InvalidParameter {
						stage: parameters.stage().to_string(),
						key: "mediaTypes".to_string(),
						value: types.to_string(),
						reason: e.to_string(),
					})
				})
				.collect::<Result<_, _>>()?;
		}
		if let Some(pattern) = parameters.get("regex") {
			enumerator.regex = Some(Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
				Error::InvalidParameter {
					stage: parameters.stage().to_string(),
					key: "regex".to_string(),
					value: pattern.to_string(),
					reason: e.to_string(),
				}
			})?);
		}

		debug!(
			root = %enumerator.root.display(),
			depth = enumerator.depth,
			skip = enumerator.skip,
			limit = enumerator.limit,
			media_types = ?enumerator.media_types,
			"Enumerator configured;"
		);

		Ok(enumerator)
	}
}

/// Entries of `dir`, sorted by path.
async fn list(dir: &Path) -> Result<Vec<PathBuf>, FileIOError> {
	let mut entries = fs::read_dir(dir)
		.await
		.map_err(|e| FileIOError::from((dir, e, "listing directory")))?;

	let mut paths = Vec::new();
	while let Some(entry) = entries
		.next_entry()
		.await
		.map_err(|e| FileIOError::from((dir, e, "listing directory")))?
	{
		paths.push(entry.path());
	}
	paths.sort();

	Ok(paths)
}

impl Operator<SourceRef> for FileSystemEnumerator {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Nullary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<SourceRef> {
		let Self {
			name,
			root,
			depth,
			skip,
			limit,
			media_types,
			regex,
		} = *self;
		let scope = scope.clone();

		stream! {
			// Depth-first, one frame of remaining entries per open directory.
			let mut frames = Vec::new();
			match list(&root).await {
				Ok(entries) => frames.push((entries.into_iter(), 1usize)),
				Err(e) => error!(enumerator = %name, %e, "Cannot enumerate root;"),
			}
			let mut matched = 0usize;
			let mut emitted = 0usize;

			loop {
				if scope.is_cancelled() {
					debug!(enumerator = %name, emitted, "Cancelled;");
					break;
				}

				let Some((entries, level)) = frames.last_mut() else {
					break;
				};
				let level = *level;
				let Some(path) = entries.next() else {
					frames.pop();
					continue;
				};

				let metadata = match fs::metadata(&path).await {
					Ok(metadata) => metadata,
					Err(e) => {
						error!(enumerator = %name, e = %FileIOError::from((&path, e)), "Skipping entry;");
						continue;
					}
				};

				if metadata.is_dir() {
					if level < depth {
						match list(&path).await {
							Ok(entries) => frames.push((entries.into_iter(), level + 1)),
							Err(e) => error!(enumerator = %name, %e, "Skipping unreadable directory;"),
						}
					}
					continue;
				}
				if !metadata.is_file()
					|| regex.as_ref().is_some_and(|re| !re.is_match(&path.to_string_lossy()))
				{
					continue;
				}

				matched += 1;
				if matched <= skip {
					continue;
				}
				if matched - skip > limit {
					break;
				}

				match FileSource::from_path(&path).await {
					Ok(Some(source)) if media_types.contains(&source.media_type()) => {
						trace!(enumerator = %name, path = %path.display(), "Emitting source;");
						emitted += 1;
						yield Ok(Arc::new(source) as SourceRef);
					}
					Ok(_) => {}
					Err(e) => error!(enumerator = %name, %e, "Skipping source;"),
				}
			}

			debug!(enumerator = %name, emitted, "Enumeration finished;");
		}
		.boxed()
	}
}

fn new_file_system_enumerator(
	parameters: &Parameters,
	_context: &IndexContext,
) -> Result<BoxOperator<SourceRef>, Error> {
	Ok(Box::new(FileSystemEnumerator::from_parameters(parameters)?))
}

/// Emits the sources handed to the pipeline through its [`IndexContext`].
fn new_list_enumerator(
	parameters: &Parameters,
	context: &IndexContext,
) -> Result<BoxOperator<SourceRef>, Error> {
	Ok(Box::new(Values::new(
		parameters.stage(),
		context.sources().to_vec(),
	)))
}

register_stage!("FileSystemEnumerator", Enumerator, new_file_system_enumerator);
register_stage!("ListEnumerator", Enumerator, new_list_enumerator);
