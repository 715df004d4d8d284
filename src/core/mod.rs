pub mod database;
pub mod tables;

pub use crate::domain::model::*;
pub use crate::domain::ports::{ConfigProvider, EnrollmentLookup, Storage};
pub use crate::utils::error::Result;
pub use database::Database;
pub use tables::{StorageError, Tables};
