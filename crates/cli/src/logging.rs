use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Logs go to stderr; stdout carries the JSON-lines surface.
pub fn init_logging(verbosity: u8) {
	// 0 = warnings only, connection churn stays quiet
	// 1 (-v) = session and poll lifecycle
	// 2+ (-vv) = routing detail and dependency noise
	let filter = match verbosity {
		0 => "warn",
		1 => "warn,snaplink=info",
		_ => "debug,tungstenite=info,hyper=info,reqwest=info",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
