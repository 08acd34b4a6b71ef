use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
	/// Level of the retina crates; everything else logs warnings only.
	pub level: String,
	pub ansi: bool,
	pub thread_ids: bool,
}

impl Default for LogConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			ansi: true,
			thread_ids: false,
		}
	}
}

impl LogConfig {
	fn directives(&self) -> Result<String, Error> {
		let level = self
			.level
			.parse::<LevelFilter>()
			.map_err(|e| Error::Logging(format!("invalid level '{}': {e}", self.level)))?;

		Ok(format!("warn,retina_core={level},retina_flow={level}"))
	}
}

/// Installs the global subscriber. `RUST_LOG`, when set, takes precedence over `config`.
///
/// Fails instead of panicking if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), Error> {
	let directives = config.directives()?;

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives)))
		.with(
			fmt::layer()
				.with_target(true)
				.with_thread_ids(config.thread_ids)
				.with_ansi(config.ansi),
		)
		.try_init()
		.map_err(|e| Error::Logging(e.to_string()))
}
