/// HTTP request handlers (REST API)
pub mod auth;
pub mod health;
pub mod password;
