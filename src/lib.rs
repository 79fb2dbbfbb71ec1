pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod logging;
pub mod models;
pub mod permission;
pub mod server;
pub mod settings;
pub mod templates;

pub use error::{Error, Result};
