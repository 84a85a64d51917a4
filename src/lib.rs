pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{Cli, Command, OutputFormat, Settings};
pub use core::client::TrackerClient;
pub use core::{Credentials, RetryPolicy};
pub use utils::error::{ApiError, Result};
