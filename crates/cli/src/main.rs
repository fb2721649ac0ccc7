use clap::Parser;
use snaplink_cli::{cli::Cli, logging, run};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let result = match cli.resolve_config() {
		Ok(config) => run::execute(config).await,
		Err(err) => Err(err),
	};
	if let Err(err) = result {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
	// the stdin reader may still be parked in a blocking read
	std::process::exit(0);
}
