pub mod commands;
pub mod web;

pub use commands::Commands;
pub use web::{AppState, SessionStore};
