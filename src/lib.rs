//! PDF Renamer Service
//!
//! Reads the `Name:` field off the first page of scanned PDF forms with OCR
//! and renames the files after the person named there.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use handlers::create_router;
pub use state::AppState;
