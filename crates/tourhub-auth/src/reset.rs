//! One-time password reset tokens.
//!
//! The plain token is handed to the user, only its digest is stored.

use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

pub const RESET_TOKEN_VALIDITY: std::time::Duration = std::time::Duration::from_secs(600);

fn to_hex(bytes: &[u8]) -> String {
    base16ct::lower::encode_string(bytes)
}

pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    to_hex(&digest)
}

#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub digest: String,
}

impl ResetToken {
    pub fn generate() -> Self {
        let random_bytes = rand::random::<[u8; TOKEN_BYTES]>();
        let token = to_hex(&random_bytes);
        let digest = token_digest(&token);
        ResetToken { token, digest }
    }
}
