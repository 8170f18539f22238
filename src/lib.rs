pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;
pub use config::AppConfig;

pub use core::engine::ReminderEngine;
pub use domain::model::{Period, RunReport};
pub use utils::error::{MailerError, Result};
