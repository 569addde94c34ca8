//! Domain identifiers.
//!
//! - `EmailId`: store が払い出す不透明な文字列 ID
//! - `WorkerId`: worker 起動時に一度だけ生成する 128-bit のランダム値（UUID v4 形式）
//!
//! `WorkerId` は lease の帰属（誰が掴んでいるか）を示すためだけに使う。
//! 同一プロセス内で再利用されることはない。

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use uuid::Uuid;

use super::errors::IdentityError;

/// Identifier of one deliverable email record.
///
/// Opaque to the worker core; only the store interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(String);

impl EmailId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Ulid> for EmailId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid.to_string())
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one worker, used to tag the leases it holds.
///
/// Rendered as the usual 5-group hyphenated hex form,
/// e.g. `0f8fad5b-d9cb-469f-a165-70867728950e`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(Uuid);

impl WorkerId {
    /// Generate a fresh identity from the OS random source.
    ///
    /// The version nibble (byte 6) and variant bits (byte 8) are stamped per
    /// the version-4 layout. The only failure is an unusable random source.
    pub fn generate() -> Result<Self, IdentityError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| IdentityError::RandomSource(e.to_string()))?;
        Ok(Self::from_random_bytes(bytes))
    }

    /// Stamp version/variant bits into caller-provided random bytes.
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // hyphenated lowercase: 8-4-4-4-12
        write!(f, "{}", self.0.hyphenated())
    }
}
