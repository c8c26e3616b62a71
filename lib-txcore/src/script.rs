//! VM script container.
//!
//! A registered contract is a blob in a fixed container format: magic,
//! format version, a varint-prefixed code section, and a varint-prefixed
//! memo. Registration validates the container; the VM interprets the code
//! section, which the core never looks inside.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::serialize::{write_bytes, ReadError, SliceReader};

/// Container magic, first four bytes of every script blob.
pub const SCRIPT_MAGIC: [u8; 4] = *b"VMS\x01";

/// The only container format version currently deployed.
pub const SCRIPT_FORMAT_VERSION: u8 = 1;

/// Upper bound on the code section, in bytes.
pub const MAX_SCRIPT_SIZE: usize = 64 * 1024;

/// Container parse/validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptFormatError {
    #[error("bad container magic")]
    BadMagic,

    #[error("unsupported container version {0}")]
    UnsupportedVersion(u8),

    #[error("empty code section")]
    EmptyCode,

    #[error("code section of {size} bytes exceeds maximum {max}")]
    CodeTooLarge { size: usize, max: usize },

    #[error("malformed container: {0}")]
    Malformed(#[from] ReadError),
}

/// Parsed script container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmScript {
    pub version: u8,
    pub code: Vec<u8>,
    pub memo: Vec<u8>,
}

impl VmScript {
    pub fn new(code: Vec<u8>, memo: Vec<u8>) -> Self {
        Self {
            version: SCRIPT_FORMAT_VERSION,
            code,
            memo,
        }
    }

    /// Parse and validate a blob. Every byte must be accounted for.
    pub fn from_bytes(blob: &[u8]) -> Result<Self, ScriptFormatError> {
        let mut reader = SliceReader::new(blob);
        let magic = reader.read_exact(SCRIPT_MAGIC.len())?;
        if magic != SCRIPT_MAGIC {
            return Err(ScriptFormatError::BadMagic);
        }
        let version = reader.read_u8()?;
        if version != SCRIPT_FORMAT_VERSION {
            return Err(ScriptFormatError::UnsupportedVersion(version));
        }
        let code = reader.read_bytes()?.to_vec();
        let memo = reader.read_bytes()?.to_vec();
        reader.finish()?;

        if code.is_empty() {
            return Err(ScriptFormatError::EmptyCode);
        }
        if code.len() > MAX_SCRIPT_SIZE {
            return Err(ScriptFormatError::CodeTooLarge {
                size: code.len(),
                max: MAX_SCRIPT_SIZE,
            });
        }
        Ok(Self {
            version,
            code,
            memo,
        })
    }

    /// Serialize to the container format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SCRIPT_MAGIC.len() + 1 + self.code.len() + self.memo.len() + 8);
        out.extend_from_slice(&SCRIPT_MAGIC);
        out.push(self.version);
        write_bytes(&mut out, &self.code);
        write_bytes(&mut out, &self.memo);
        out
    }
}
