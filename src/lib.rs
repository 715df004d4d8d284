pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::AdminSite;
pub use config::{cli::LocalStorage, memory::MemoryStorage, Settings};
pub use core::{database::Database, tables::Tables};
pub use utils::error::{AdminError, Result};
