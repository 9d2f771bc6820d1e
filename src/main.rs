use anyhow::Result;
use calendme::app::Application;
use calendme::cli::{execute, load_config, Cli};
use clap::Parser;
use log::{debug, info};

fn main() -> Result<()> {
    // RUST_LOG may come from .env, so load it before the logger
    let dotenv = dotenvy::dotenv();
    calendme::init_logger();
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded: {}", e),
    }

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    debug!("Loaded config: {:?}", config);

    match cli.command {
        Some(command) => execute(command, &config, cli.config.as_deref()),
        None => {
            info!("No command given, starting interactive mode");
            Application::new(config).run()
        }
    }
}
