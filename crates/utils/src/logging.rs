//! Tracing initialisation shared by every binary in the workspace.

use std::{path::Path, sync::Once};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::LoggingError;

pub const DEFAULT_FILTER: &str = "quire=info";

/// Installs a stderr layer and, when `logs_dir` is given, a daily rolling file layer without
/// ANSI colors. `RUST_LOG` takes precedence over `default_filter`.
///
/// Calling this more than once is a no-op.
pub fn init(logs_dir: Option<&Path>, default_filter: &str) -> Result<(), LoggingError> {
	static INIT: Once = Once::new();
	let mut result = Ok(());

	INIT.call_once(|| {
		result = install(logs_dir, default_filter);
	});

	result
}

fn install(logs_dir: Option<&Path>, default_filter: &str) -> Result<(), LoggingError> {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

	let file_layer = logs_dir
		.map(|dir| {
			std::fs::create_dir_all(dir)?;

			Ok::<_, LoggingError>(
				fmt::layer()
					.with_target(true)
					.with_ansi(false)
					.with_writer(RollingFileAppender::new(Rotation::DAILY, dir, "quire.log")),
			)
		})
		.transpose()?;

	tracing_subscriber::registry()
		.with(env_filter)
		.with(
			fmt::layer()
				.with_target(true)
				.with_writer(std::io::stderr),
		)
		.with(file_layer)
		.try_init()
		.map_err(|e| LoggingError::Init(e.to_string()))
}
