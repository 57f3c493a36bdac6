//! Session token generation.

use rand::Rng;

/// Source of fresh session tokens.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// 256 bits from the thread-local CSPRNG, hex encoded (64 chars).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        let bytes: [u8; 32] = rng.random();

        bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
    }
}
