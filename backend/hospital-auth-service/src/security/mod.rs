/// Security module for authentication
/// Token issuing and verification live in the `jwt-security` crate.
pub mod password;

pub use password::{validate_password_strength, PasswordHasher};
