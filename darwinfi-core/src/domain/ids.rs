use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque genome identifier.
///
/// Ids are drawn from the caller's RNG rather than from ambient entropy, so a
/// seeded run produces the same ids every time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenomeId(pub String);

impl GenomeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Draw a fresh 128-bit id, rendered as 32 lowercase hex characters.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value: u128 = rng.gen();
        Self(format!("{value:032x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in generated names and log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
