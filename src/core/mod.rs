pub mod auth;
pub mod client;
pub mod executor;

pub use auth::{Credentials, Redactor};
pub use client::TrackerClient;
pub use executor::{Executor, RetryPolicy};
