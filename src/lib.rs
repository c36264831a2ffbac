//! Elidune Circulation
//!
//! Borrowing & fine lifecycle engine: lends media to users, detects
//! overdue loans, issues and accrues fines, applies payments, and keeps
//! media availability and user balances consistent with loan state.

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
