pub mod analysis;
pub mod imaging;
pub mod jobs;
pub mod logging;
pub mod providers;
pub mod server;
pub mod settings;

pub use server::run_server;
pub use settings::{load_settings, LocalizationMode, Settings};
