// Library surface for the binary and for headless integration tests.
pub mod app;
pub mod app_dirs;
pub mod bot;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod passages;
pub mod race;
pub mod recorder;
pub mod runtime;
pub mod session;
pub mod time_series;
pub mod timer_policy;
pub mod ui;

pub use app::App;
pub use error::{QkResult, QuickKeysError};
