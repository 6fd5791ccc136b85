//! Error types for byte-level decoding and analysis

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LensError {
    #[error("buffer truncated at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("witness stack count {got} does not match input count {expected}")]
    WitnessCountMismatch { expected: usize, got: usize },

    #[error("input count {0} exceeds decoder cap")]
    ExcessiveInputs(u64),

    #[error("output count {0} exceeds decoder cap")]
    ExcessiveOutputs(u64),

    #[error("script does not match any known template: {0}")]
    InvalidTemplate(String),

    #[error("address encoding failed: {0}")]
    InvalidEncoding(String),

    #[error("malformed witness: {0}")]
    InvalidWitness(String),

    #[error("undo data does not match block: {0}")]
    UndoMismatch(String),

    #[error("merkle root mismatch: computed {computed}, header {expected}")]
    MerkleMismatch { computed: String, expected: String },

    #[error("compressed script payload is not a point on secp256k1")]
    CurvePointInvalid,

    #[error("unsupported witness version or program: {0}")]
    UnsupportedWitnessVersion(String),

    #[error("invalid hex input: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for LensError {
    fn from(e: hex::FromHexError) -> Self {
        LensError::InvalidHex(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LensError>;
