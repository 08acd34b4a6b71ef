use std::{
	collections::HashMap,
	fmt,
	io::Cursor,
	path::{Path, PathBuf},
	pin::Pin,
	sync::Arc,
	time::SystemTime,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::{fs, io::AsyncRead};
use uuid::Uuid;

use crate::{error::FileIOError, Error};

pub type SourceRef = Arc<dyn Source>;

pub type SourceReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
	Image,
	Text,
	Audio,
	Video,
}

impl MediaType {
	pub const ALL: [Self; 4] = [Self::Image, Self::Text, Self::Audio, Self::Video];

	/// Guesses media type and mime type from a file extension.
	#[must_use]
	pub fn from_extension(extension: &str) -> Option<(Self, &'static str)> {
		let guess = match extension.to_ascii_lowercase().as_str() {
			"jpg" | "jpeg" => (Self::Image, "image/jpeg"),
			"png" => (Self::Image, "image/png"),
			"gif" => (Self::Image, "image/gif"),
			"bmp" => (Self::Image, "image/bmp"),
			"webp" => (Self::Image, "image/webp"),
			"tif" | "tiff" => (Self::Image, "image/tiff"),
			"txt" => (Self::Text, "text/plain"),
			"md" => (Self::Text, "text/markdown"),
			"csv" => (Self::Text, "text/csv"),
			"json" => (Self::Text, "application/json"),
			"mp3" => (Self::Audio, "audio/mpeg"),
			"wav" => (Self::Audio, "audio/wav"),
			"flac" => (Self::Audio, "audio/flac"),
			"ogg" => (Self::Audio, "audio/ogg"),
			"mp4" => (Self::Video, "video/mp4"),
			"mkv" => (Self::Video, "video/x-matroska"),
			"webm" => (Self::Video, "video/webm"),
			"mov" => (Self::Video, "video/quicktime"),
			"avi" => (Self::Video, "video/x-msvideo"),
			_ => return None,
		};

		Some(guess)
	}
}

/// A piece of media an enumerator found, before decoding.
#[async_trait]
pub trait Source: Send + Sync + fmt::Debug + 'static {
	fn id(&self) -> Uuid;

	fn name(&self) -> &str;

	fn media_type(&self) -> MediaType;

	fn mime_type(&self) -> &str;

	fn timestamp(&self) -> SystemTime;

	fn metadata(&self) -> &HashMap<String, String>;

	/// Opens a fresh byte stream over the source's payload.
	async fn open(&self) -> Result<SourceReader, Error>;
}

pub const METADATA_PATH: &str = "path";
pub const METADATA_SIZE: &str = "size";

#[derive(Debug, Clone)]
pub struct FileSource {
	id: Uuid,
	path: PathBuf,
	name: String,
	media_type: MediaType,
	mime_type: &'static str,
	timestamp: SystemTime,
	metadata: HashMap<String, String>,
}

impl FileSource {
	/// Stats `path` and builds a source for it, `None` if the extension is not a known media type.
	pub async fn from_path(path: impl AsRef<Path>) -> Result<Option<Self>, FileIOError> {
		let path = path.as_ref();

		let Some((media_type, mime_type)) = path
			.extension()
			.and_then(|ext| ext.to_str())
			.and_then(MediaType::from_extension)
		else {
			return Ok(None);
		};

		let stat = fs::metadata(path)
			.await
			.map_err(|e| FileIOError::from((path, e, "reading source metadata")))?;

		let metadata = HashMap::from([
			(METADATA_PATH.to_string(), path.to_string_lossy().into_owned()),
			(METADATA_SIZE.to_string(), stat.len().to_string()),
		]);

		Ok(Some(Self {
			id: Uuid::new_v4(),
			path: path.to_path_buf(),
			name: path
				.file_name()
				.map_or_else(String::new, |name| name.to_string_lossy().into_owned()),
			media_type,
			mime_type,
			timestamp: stat.modified().unwrap_or_else(|_| SystemTime::now()),
			metadata,
		}))
	}

	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[async_trait]
impl Source for FileSource {
	fn id(&self) -> Uuid {
		self.id
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn media_type(&self) -> MediaType {
		self.media_type
	}

	fn mime_type(&self) -> &str {
		self.mime_type
	}

	fn timestamp(&self) -> SystemTime {
		self.timestamp
	}

	fn metadata(&self) -> &HashMap<String, String> {
		&self.metadata
	}

	async fn open(&self) -> Result<SourceReader, Error> {
		let file = fs::File::open(&self.path)
			.await
			.map_err(|e| FileIOError::from((&self.path, e, "opening source")))?;

		Ok(Box::pin(file))
	}
}

/// Source whose payload is already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
	id: Uuid,
	name: String,
	media_type: MediaType,
	mime_type: String,
	timestamp: SystemTime,
	metadata: HashMap<String, String>,
	bytes: Arc<[u8]>,
}

impl MemorySource {
	pub fn new(
		name: impl Into<String>,
		media_type: MediaType,
		mime_type: impl Into<String>,
		bytes: impl Into<Arc<[u8]>>,
	) -> Self {
		let bytes = bytes.into();
		Self {
			id: Uuid::new_v4(),
			name: name.into(),
			media_type,
			mime_type: mime_type.into(),
			timestamp: SystemTime::now(),
			metadata: HashMap::from([(METADATA_SIZE.to_string(), bytes.len().to_string())]),
			bytes,
		}
	}
}

#[async_trait]
impl Source for MemorySource {
	fn id(&self) -> Uuid {
		self.id
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn media_type(&self) -> MediaType {
		self.media_type
	}

	fn mime_type(&self) -> &str {
		&self.mime_type
	}

	fn timestamp(&self) -> SystemTime {
		self.timestamp
	}

	fn metadata(&self) -> &HashMap<String, String> {
		&self.metadata
	}

	async fn open(&self) -> Result<SourceReader, Error> {
		Ok(Box::pin(Cursor::new(Arc::clone(&self.bytes))))
	}
}
