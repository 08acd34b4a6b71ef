use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, Operator};
use tokio::{io::AsyncReadExt, task};
use tracing::{debug, error, trace};

use crate::{
	context::{IndexContext, Parameters},
	model::{Content, ContentElement, MediaType, Source, SourceRef},
	register_stage, Error,
};

/// Turns sources into content elements, for the media types it accepts.
///
/// Sources of other media types, unreadable sources and payloads that fail to decode are
/// logged and skipped.
pub struct Decoder {
	name: String,
	accepts: &'static [MediaType],
	input: BoxOperator<SourceRef>,
}

impl Decoder {
	pub fn new(
		name: impl Into<String>,
		accepts: &'static [MediaType],
		input: BoxOperator<SourceRef>,
	) -> Self {
		Self {
			name: name.into(),
			accepts,
			input,
		}
	}
}

async fn decode(source: &SourceRef) -> Result<Content, String> {
	let mut bytes = Vec::new();
	source
		.open()
		.await
		.map_err(|e| e.to_string())?
		.read_to_end(&mut bytes)
		.await
		.map_err(|e| e.to_string())?;

	match source.media_type() {
		MediaType::Image => {
			let image = task::spawn_blocking(move || image::load_from_memory(&bytes))
				.await
				.map_err(|e| e.to_string())?
				.map_err(|e| e.to_string())?;
			Ok(Content::Image(Arc::new(image.to_rgb8())))
		}
		MediaType::Text => String::from_utf8(bytes)
			.map(|text| Content::Text(text.into()))
			.map_err(|e| e.to_string()),
		other => Err(format!("no decoder for {other} content")),
	}
}

impl Operator<ContentElement> for Decoder {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<ContentElement> {
		let Self {
			name,
			accepts,
			input,
		} = *self;
		let scope = scope.clone();
		let mut sources = input.into_flow(&scope);

		stream! {
			let mut decoded = 0u64;

			loop {
				let next = tokio::select! {
					biased;
					() = scope.cancelled() => break,
					next = sources.next() => next,
				};

				let source = match next {
					None => break,
					Some(Ok(source)) => source,
					Some(Err(e)) => {
						yield Err(e);
						break;
					}
				};

				if !accepts.contains(&source.media_type()) {
					debug!(decoder = %name, source = source.name(), media_type = %source.media_type(), "Unsupported media type, skipping;");
					continue;
				}

				match decode(&source).await {
					Ok(content) => {
						decoded += 1;
						trace!(decoder = %name, source = source.name(), "Decoded;");
						yield Ok(ContentElement::new(content, Some(source)));
					}
					Err(e) => error!(decoder = %name, source = source.name(), %e, "Failed to decode, skipping;"),
				}
			}

			debug!(decoder = %name, decoded, "Decoder finished;");
		}
		.boxed()
	}
}

fn new_image_decoder(
	input: BoxOperator<SourceRef>,
	parameters: &Parameters,
	_context: &IndexContext,
) -> Result<BoxOperator<ContentElement>, Error> {
	Ok(Box::new(Decoder::new(parameters.stage(), &[MediaType::Image], input)))
}

fn new_text_decoder(
	input: BoxOperator<SourceRef>,
	parameters: &Parameters,
	_context: &IndexContext,
) -> Result<BoxOperator<ContentElement>, Error> {
	Ok(Box::new(Decoder::new(parameters.stage(), &[MediaType::Text], input)))
}

fn new_content_decoder(
	input: BoxOperator<SourceRef>,
	parameters: &Parameters,
	_context: &IndexContext,
) -> Result<BoxOperator<ContentElement>, Error> {
	Ok(Box::new(Decoder::new(
		parameters.stage(),
		&[MediaType::Image, MediaType::Text],
		input,
	)))
}

register_stage!("ImageDecoder", Decoder, new_image_decoder);
register_stage!("TextDecoder", Decoder, new_text_decoder);
register_stage!("ContentDecoder", Decoder, new_content_decoder);

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use futures::TryStreamExt;
	use image::{ImageOutputFormat, Rgb, RgbImage};
	use retina_flow::Values;

	use crate::model::{ContentType, MemorySource};

	use super::*;

	fn png(color: [u8; 3]) -> Vec<u8> {
		let mut bytes = Cursor::new(Vec::new());
		RgbImage::from_pixel(4, 4, Rgb(color))
			.write_to(&mut bytes, ImageOutputFormat::Png)
			.unwrap();
		bytes.into_inner()
	}

	#[tokio::test]
	async fn decodes_and_skips() {
		let sources: Vec<SourceRef> = vec![
			Arc::new(MemorySource::new("red.png", MediaType::Image, "image/png", png([255, 0, 0]))),
			Arc::new(MemorySource::new("broken.png", MediaType::Image, "image/png", b"not a png".to_vec())),
			Arc::new(MemorySource::new("notes.txt", MediaType::Text, "text/plain", b"hello".to_vec())),
			Arc::new(MemorySource::new("song.mp3", MediaType::Audio, "audio/mpeg", vec![0u8; 8])),
		];

		let decoder = Decoder::new(
			"ContentDecoder",
			&[MediaType::Image, MediaType::Text],
			Box::new(Values::new("sources", sources)),
		);
		let elements = Box::new(decoder)
			.into_flow(&ExecutionScope::new())
			.try_collect::<Vec<_>>()
			.await
			.unwrap();

		assert_eq!(
			elements.iter().map(ContentElement::content_type).collect::<Vec<_>>(),
			vec![ContentType::Image, ContentType::Text]
		);
		assert!(matches!(
			elements[0].content(),
			Content::Image(image) if image.get_pixel(0, 0) == &Rgb([255, 0, 0])
		));
		assert_eq!(elements[1].source().map(|s| s.name()), Some("notes.txt"));
	}
}
