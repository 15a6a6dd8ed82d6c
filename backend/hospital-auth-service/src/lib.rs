//! Hospital staff authentication service
//!
//! Issues and rotates bearer tokens, manages staff accounts and their
//! password lifecycle, and reports database health.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod security;
pub mod services;


pub use error::{AuthError, AuthResult};

use db_pool::Database;
use services::AuthService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub db: Database,
}
