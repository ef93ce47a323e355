//! Error types for oxlink

use thiserror::Error;

use crate::icc::Signature;

/// Result type for oxlink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification reported to a context's error sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Truncated data, bad offsets, bad grid sizes, unknown wire signatures
    MalformedBinary,
    /// Channel counts or parameter values outside the supported range
    Range,
    /// Two links of a profile chain do not connect
    ColorSpaceMismatch,
    /// A pipeline cannot be expressed in the requested encoding
    NotSuitable,
    /// Allocation or size overflow
    Resource,
    /// No handler registered for an intent or tag
    UnknownExtension,
    /// Numerical breakdown inside an algorithm
    Internal,
}

/// Errors that can occur in oxlink operations
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Ran past the end of a buffer
    #[error("Truncated data: need {needed} bytes at offset {offset}, buffer holds {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A directory entry points outside its tag
    #[error("Element at offset {offset} with size {size} exceeds tag length {len}")]
    OutOfBounds { offset: usize, size: usize, len: usize },

    /// Grid point count of 1 or an oversized grid
    #[error("Invalid CLUT grid point count: {0}")]
    InvalidGridPoints(u32),

    /// A wire signature no handler understands
    #[error("Unsupported {kind} signature '{signature}'")]
    UnknownSignature {
        kind: &'static str,
        signature: Signature,
    },

    /// Structurally invalid content
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    /// Channel count of zero or above the implementation maximum
    #[error("Channel count {count} out of range 1..={max}")]
    ChannelCount { count: usize, max: usize },

    /// Adjacent stages or pipelines disagree on channel counts
    #[error("Channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// A numeric parameter outside its domain
    #[error("Value out of range: {0}")]
    Range(String),

    /// Rendering intent without a registered handler
    #[error("Unsupported rendering intent {0}")]
    UnsupportedIntent(u32),

    /// Incompatible color spaces between chain links or formats
    #[error("Color space mismatch: {0}")]
    ColorSpaceMismatch(String),

    /// The pipeline shape has no representation in the requested encoding
    #[error("Not suitable: {0}")]
    NotSuitable(String),

    /// Allocation would overflow or exceed limits
    #[error("Resource error: {0}")]
    Resource(String),

    /// A required tag is absent from a profile
    #[error("Missing tag '{0}'")]
    MissingTag(Signature),

    /// Matrix inversion failed
    #[error("Singular matrix")]
    SingularMatrix,

    /// Buffer size mismatch
    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}

impl Error {
    /// Classify this error for the context error sink
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Truncated { .. }
            | Self::OutOfBounds { .. }
            | Self::InvalidGridPoints(_)
            | Self::UnknownSignature { .. }
            | Self::Corrupted(_)
            | Self::MissingTag(_) => ErrorCode::MalformedBinary,
            Self::ChannelCount { .. }
            | Self::ChannelMismatch { .. }
            | Self::Range(_)
            | Self::BufferSize { .. } => ErrorCode::Range,
            Self::UnsupportedIntent(_) => ErrorCode::UnknownExtension,
            Self::ColorSpaceMismatch(_) => ErrorCode::ColorSpaceMismatch,
            Self::NotSuitable(_) => ErrorCode::NotSuitable,
            Self::Resource(_) => ErrorCode::Resource,
            Self::SingularMatrix => ErrorCode::Internal,
        }
    }

    pub(crate) fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        Self::Truncated {
            offset,
            needed,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Error::InvalidGridPoints(1).code(), ErrorCode::MalformedBinary);
        assert_eq!(
            Error::ChannelCount { count: 0, max: 16 }.code(),
            ErrorCode::Range
        );
        assert_eq!(Error::UnsupportedIntent(99).code(), ErrorCode::UnknownExtension);
        assert_eq!(
            Error::NotSuitable("float clut".into()).code(),
            ErrorCode::NotSuitable
        );
    }

    #[test]
    fn test_display_includes_signature() {
        let err = Error::UnknownSignature {
            kind: "element",
            signature: Signature::from_bytes(*b"zzzz"),
        };
        assert!(err.to_string().contains("zzzz"));
    }
}
