//! Tamper detection for submission files.
//!
//! A lesson page exports `{payload, security: {checksum}}` where the checksum
//! is the SHA-256 of the payload serialized with sorted keys, `", "` and
//! `": "` separators and raw (unescaped) non-ASCII text. Any edit to the
//! payload after export changes the digest.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use serde_json::Value;

use crate::core::errors::{LearningHubError, Result};
use crate::core::file_utils::sha256_hex;

/// Compact JSON with a space after every `,` and `:`
#[derive(Debug, Default, Clone, Copy)]
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Canonical text of a payload
pub fn canonical_json(value: &Value) -> Result<String> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, SpacedFormatter);
    sorted(value).serialize(&mut serializer)?;
    String::from_utf8(out).map_err(|e| LearningHubError::internal(format!("non-UTF-8 JSON output: {e}")))
}

/// Lowercase hex SHA-256 of the canonical payload
pub fn payload_checksum(payload: &Value) -> Result<String> {
    Ok(sha256_hex(canonical_json(payload)?.as_bytes()))
}

/// Result of checking one submission file
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    /// Checksum matches
    Valid,
    /// Payload changed after export
    Tampered {
        /// Checksum stored in the file
        expected: String,
        /// Checksum of the payload as found
        actual: String,
    },
    /// `payload` or `security` missing
    InvalidStructure,
    /// Not parseable as JSON
    InvalidJson(String),
    /// File does not exist
    NotFound,
}

impl Verification {
    /// Only `Valid` counts as verified
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Process exit code for a single-file check
    pub fn exit_code(&self) -> i32 {
        if self.is_valid() {
            0
        } else {
            1
        }
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        match self {
            Self::Valid => "OK".to_string(),
            Self::Tampered { .. } => "CHECKSUM MISMATCH - File has been tampered!".to_string(),
            Self::InvalidStructure => "Invalid structure: missing payload or security".to_string(),
            Self::InvalidJson(e) => format!("Invalid JSON: {e}"),
            Self::NotFound => "File not found".to_string(),
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// A submission file after verification; the document is kept whenever it
/// parsed, so callers can still show who submitted a tampered file
#[derive(Debug, Clone)]
pub struct VerifiedSubmission {
    /// Outcome
    pub status: Verification,
    /// Parsed document
    pub document: Option<Value>,
}

impl VerifiedSubmission {
    /// `payload` of a parsed document
    pub fn payload(&self) -> Option<&Value> {
        self.document.as_ref()?.get("payload")
    }
}

/// Verify a parsed submission document
pub fn verify_document(document: &Value) -> Result<Verification> {
    let (Some(payload), Some(security)) = (document.get("payload"), document.get("security")) else {
        return Ok(Verification::InvalidStructure);
    };
    let expected = security
        .get("checksum")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let actual = payload_checksum(payload)?;
    if expected == actual {
        Ok(Verification::Valid)
    } else {
        Ok(Verification::Tampered { expected, actual })
    }
}

/// Read and verify a submission file. I/O failures other than a missing
/// file are returned as errors.
pub fn verify_file(path: &Path) -> Result<VerifiedSubmission> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(VerifiedSubmission {
                status: Verification::NotFound,
                document: None,
            })
        }
        Err(e) => {
            return Err(LearningHubError::io(
                format!("Failed to read submission: {}", path.display()),
                e,
            ))
        }
    };

    let document: Value = match serde_json::from_slice(&bytes) {
        Ok(document) => document,
        Err(e) => {
            return Ok(VerifiedSubmission {
                status: Verification::InvalidJson(e.to_string()),
                document: None,
            })
        }
    };

    let status = verify_document(&document)?;
    Ok(VerifiedSubmission {
        status,
        document: Some(document),
    })
}
