use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;

pub fn init(verbose: bool) -> Result<()> {
    let max_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let _ = fmt()
        .with_max_level(max_level)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
    Ok(())
}
