use std::path::Path;

use anyhow::Result;
use clap::Parser;

use promo_localizer::settings::load_settings;

#[derive(Parser, Debug)]
#[command(
    name = "promo-localizer",
    version,
    about = "Localize promotional poster artwork"
)]
struct Cli {
    /// Bind address (overrides settings, e.g. 0.0.0.0:8080)
    #[arg(short = 'a', long = "addr")]
    addr: Option<String>,

    /// Pipeline mode: mock or live
    #[arg(short = 'm', long = "mode")]
    mode: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    promo_localizer::logging::init(cli.verbose)?;

    let settings_path = cli.read_settings.as_deref().map(Path::new);
    let mut settings = load_settings(settings_path)?;
    if let Some(addr) = cli.addr {
        settings.addr = addr;
    }
    if let Some(mode) = cli.mode.as_deref() {
        settings.mode = mode.parse()?;
    }

    let addr = settings.addr.clone();
    promo_localizer::run_server(settings, addr).await
}
