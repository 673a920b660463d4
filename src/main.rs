use clap::Parser;
use evalsync::app::App;
use evalsync::cli::Args;
use evalsync::config::Config;
use evalsync::logging::setup_logging;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config and setup logging before App::new() so startup logs are
    // never silently dropped.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting evalsync"
    );

    let app = App::new(config).await.expect("Failed to initialize application");
    app.run(args.once).await
}
