//! Opaque 128-bit connection identifiers.

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IdError;

/// Unique identifier for one registered streaming connection.
///
/// 16 bytes drawn from the operating system's secure random source.
/// No value is reserved, the all-zero id included. Rendered as 32
/// lowercase hex characters for logs and for callers that store the id
/// next to their own session state to address the connection later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId([u8; ConnectionId::LEN]);

impl ConnectionId {
    /// Width of an identifier in bytes.
    pub const LEN: usize = 16;

    /// Draws a fresh identifier from the secure random source.
    ///
    /// # Errors
    ///
    /// Returns `IdError::RandomSource` if the OS cannot provide randomness.
    pub fn generate() -> Result<Self, IdError> {
        let mut bytes = [0u8; Self::LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| IdError::RandomSource(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Wraps raw bytes as an identifier.
    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ConnectionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; Self::LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| IdError::Parse {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(bytes))
    }
}

impl From<[u8; ConnectionId::LEN]> for ConnectionId {
    fn from(bytes: [u8; ConnectionId::LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for ConnectionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConnectionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
