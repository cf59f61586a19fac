//! `roster` - Student records kept in `SQLite` and served over a JSON REST API
//!
//! The library holds the record model and its validation, the storage layer,
//! the axum router, and the configuration and logging setup used by the
//! `rosterd` binary.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod seed;
pub mod storage;
pub mod student;

pub use api::{router, AppState};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use storage::{GroupCount, GroupField, Storage, StudentStore};
pub use student::{NewStudent, Student, StudentId, StudentInput};
