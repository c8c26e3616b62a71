//! Validation outcomes.
//!
//! Rejections flow through a [`ValidationState`] sink, mirroring how the
//! block driver consumes them: one rejection per failed transaction,
//! carrying a DoS score for the peer that relayed it, a machine tag, and a
//! human reason. Errors are ordinary `Result`s; nothing unwinds.

use std::fmt;

use thiserror::Error;
use tracing::warn;

/// Disposition class for a rejected transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    /// Structurally or cryptographically malformed.
    Invalid,
    /// A referenced account or script could not be read.
    ReadAccountFail,
    /// An account mutation was refused mid-execution.
    UpdateAccountFail,
    /// An account write-through failed.
    WriteAccountFail,
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectCode::Invalid => "REJECT_INVALID",
            RejectCode::ReadAccountFail => "READ_ACCOUNT_FAIL",
            RejectCode::UpdateAccountFail => "UPDATE_ACCOUNT_FAIL",
            RejectCode::WriteAccountFail => "WRITE_ACCOUNT_FAIL",
        };
        f.write_str(name)
    }
}

/// A recorded rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Misbehavior score charged to the relaying peer.
    pub dos_score: u32,
    /// Human-readable reason, for logs.
    pub reason: String,
    /// Disposition class.
    pub code: RejectCode,
    /// Stable machine tag, e.g. `bad-tx-sig-size`.
    pub tag: &'static str,
}

/// Error produced by transaction check, execution, or undo.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    /// The transaction was rejected; the overlay must be discarded.
    #[error("rejected [{}] {}: {}", .0.code, .0.tag, .0.reason)]
    Rejected(Rejection),

    /// An undo record does not match the state it claims to reverse.
    /// Fatal: the block driver must halt rather than continue from a
    /// state it can no longer reconstruct.
    #[error("undo record corrupt: {0}")]
    UndoCorrupt(String),
}

impl TxError {
    /// The machine tag, if this is a rejection.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            TxError::Rejected(r) => Some(r.tag),
            TxError::UndoCorrupt(_) => None,
        }
    }
}

/// Result alias for the execution core.
pub type TxResult<T> = Result<T, TxError>;

/// Sink collecting the rejection for the transaction currently being
/// processed.
///
/// The driver owns one per transaction; per-kind code reports through
/// [`ValidationState::dos`] and propagates the returned error with `?`.
#[derive(Debug, Default)]
pub struct ValidationState {
    rejection: Option<Rejection>,
}

impl ValidationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rejection and hand back the error to propagate.
    ///
    /// The first rejection wins; later calls still return an error but do
    /// not overwrite the recorded outcome.
    pub fn dos(
        &mut self,
        dos_score: u32,
        reason: String,
        code: RejectCode,
        tag: &'static str,
    ) -> TxError {
        warn!(%code, tag, %reason, "transaction rejected");
        let rejection = Rejection {
            dos_score,
            reason,
            code,
            tag,
        };
        if self.rejection.is_none() {
            self.rejection = Some(rejection.clone());
        }
        TxError::Rejected(rejection)
    }

    /// The recorded rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        self.rejection.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_rejection_sticks() {
        let mut state = ValidationState::new();
        let first = state.dos(100, "first".into(), RejectCode::Invalid, "tag-one");
        let _ = state.dos(100, "second".into(), RejectCode::Invalid, "tag-two");
        assert_eq!(state.rejection().unwrap().tag, "tag-one");
        assert_eq!(first.tag(), Some("tag-one"));
    }

    #[test]
    fn error_display_includes_tag_and_code() {
        let mut state = ValidationState::new();
        let err = state.dos(
            100,
            "memo too large".into(),
            RejectCode::Invalid,
            "memo-size-toolarge",
        );
        let rendered = err.to_string();
        assert!(rendered.contains("memo-size-toolarge"));
        assert!(rendered.contains("REJECT_INVALID"));
    }
}
