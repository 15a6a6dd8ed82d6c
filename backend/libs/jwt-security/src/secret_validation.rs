//! Signing secret handling
//!
//! HS256 secrets are checked for length, entropy and obvious patterns before a
//! token manager will accept them. The raw bytes are wiped when dropped.

use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::TokenError;

const MIN_SECRET_LENGTH: usize = 32; // 256 bits minimum
const RECOMMENDED_SECRET_LENGTH: usize = 64;
const MIN_ENTROPY_BITS: f64 = 4.0;
const STRONG_ENTROPY_BITS: f64 = 5.0;

/// Secret strength classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStrength {
    /// Rejected at startup
    Weak,
    /// Accepted with a warning
    Acceptable,
    Strong,
}

/// Process-wide HMAC key. Read-only once loaded.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into().into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn strength(&self) -> SecretStrength {
        validate_secret_strength(&self.0)
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningSecret").field(&"[REDACTED]").finish()
    }
}

/// Classify an HS256 secret.
///
/// **Criteria**:
/// - Minimum 32 bytes (256 bits)
/// - Shannon entropy of at least 4.0 bits/byte
/// - No runs of 4+ repeated or sequential bytes
///
/// 64+ bytes with entropy of 5.0 or more is classified as Strong.
pub fn validate_secret_strength(bytes: &[u8]) -> SecretStrength {
    if bytes.len() < MIN_SECRET_LENGTH {
        return SecretStrength::Weak;
    }

    let entropy = calculate_shannon_entropy(bytes);
    if entropy < MIN_ENTROPY_BITS {
        return SecretStrength::Weak;
    }

    if has_obvious_patterns(bytes) {
        return SecretStrength::Weak;
    }

    if bytes.len() >= RECOMMENDED_SECRET_LENGTH && entropy >= STRONG_ENTROPY_BITS {
        SecretStrength::Strong
    } else {
        SecretStrength::Acceptable
    }
}

/// Shannon entropy in bits per byte (0-8 scale)
fn calculate_shannon_entropy(data: &[u8]) -> f64 {
    let mut freq = [0u32; 256];
    let len = data.len() as f64;

    for &byte in data {
        freq[byte as usize] += 1;
    }

    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn has_obvious_patterns(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }

    let mut same_run = 1;
    let mut seq_run = 1;
    for window in data.windows(2) {
        same_run = if window[0] == window[1] { same_run + 1 } else { 1 };
        seq_run = if window[1] as i16 - window[0] as i16 == 1 {
            seq_run + 1
        } else {
            1
        };

        if same_run >= 4 || seq_run >= 4 {
            return true;
        }
    }

    false
}

/// Generate a random base64 secret of `length` random bytes for operators
/// provisioning `JWT_SECRET`.
pub fn generate_secure_secret(length: usize) -> Result<String, TokenError> {
    if length < MIN_SECRET_LENGTH {
        return Err(TokenError::SecretGeneration(format!(
            "secret length must be at least {} bytes",
            MIN_SECRET_LENGTH
        )));
    }

    let rng = SystemRandom::new();
    let mut buffer = vec![0u8; length];
    rng.fill(&mut buffer)
        .map_err(|_| TokenError::SecretGeneration("system RNG failure".to_string()))?;

    use base64::{engine::general_purpose::STANDARD, Engine};
    let encoded = STANDARD.encode(&buffer);
    buffer.zeroize();
    Ok(encoded)
}
