//! Transfer error types

use thiserror::Error;

/// Why a value could not be transferred
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferErrorKind {
    /// The value has a kind that never leaves its interpreter
    #[error("cannot transfer a {type_name} value")]
    Unsupported {
        /// Script-visible type name of the offending value
        type_name: &'static str,
    },

    /// Scripted closures are disabled by the transfer policy
    #[error("scripted functions cannot be transferred")]
    ClosuresDisabled,

    /// The value graph nests deeper than the policy allows
    #[error("value nests deeper than {limit} levels")]
    TooDeep {
        /// Configured nesting limit
        limit: usize,
    },

    /// A closure's bytecode failed to serialize or reload
    #[error("function relocation failed: {0}")]
    Bytecode(String),

    /// A closure's captured variable failed to copy
    ///
    /// Never dropped, even inside a table: the half-bound closure may
    /// already be referenced from copies made while binding it.
    #[error("{0}")]
    CaptureFailed(Box<TransferErrorKind>),
}

impl TransferErrorKind {
    /// Whether a table entry failing this way is dropped instead of failing
    /// the whole table
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            TransferErrorKind::Unsupported { .. } | TransferErrorKind::ClosuresDisabled
        )
    }

    /// Wrap a captured variable's failure, once
    pub(super) fn captured(self) -> Self {
        match self {
            TransferErrorKind::CaptureFailed(_) => self,
            other => TransferErrorKind::CaptureFailed(Box::new(other)),
        }
    }

    /// The failure underneath any capture wrapping
    pub fn root_cause(&self) -> &TransferErrorKind {
        match self {
            TransferErrorKind::CaptureFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}

/// A failed transfer, tagged with the 1-based position of the value that
/// caused it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bad argument #{position} ({kind})")]
pub struct TransferError {
    /// 1-based position among the transferred values
    pub position: usize,
    /// What went wrong
    pub kind: TransferErrorKind,
}

impl TransferError {
    /// Create an error for the value at `position`
    pub fn new(position: usize, kind: TransferErrorKind) -> Self {
        Self { position, kind }
    }

    /// Shift the position, for callers whose transferred values start after
    /// other arguments
    pub fn offset(mut self, by: usize) -> Self {
        self.position += by;
        self
    }
}
