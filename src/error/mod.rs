use crate::feed::StreamState;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// Errors raised by a change feed stream
///
/// Every variant except [`FeedError::StreamClosed`] is fatal: the stream moves
/// to [`StreamState::Failed`] and never extracts another record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("[E{code:04}] Invalid configuration: {message}")]
    InvalidConfiguration { code: u16, message: String },

    #[error(
        "[E{code:04}] Malformed envelope at byte {position}: expected {}, found {}",
        byte_repr(.expected),
        byte_repr(.found),
        code = ErrorCode::ENVELOPE_MISMATCH
    )]
    MalformedEnvelope {
        position: usize,
        expected: u8,
        found: u8,
    },

    #[error("[E{code:04}] Malformed record at byte {offset}: {reason}")]
    MalformedRecord {
        code: u16,
        offset: u64,
        reason: String,
    },

    #[error(
        "[E{code:04}] Stream is not writable (state: {state})",
        code = ErrorCode::STREAM_CLOSED
    )]
    StreamClosed { state: StreamState },
}

/// Coarse classification used by retry policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedErrorKind {
    InvalidConfiguration,
    MalformedEnvelope,
    MalformedRecord,
    StreamClosed,
}

fn byte_repr(byte: &u8) -> String {
    format!("'{}'", std::ascii::escape_default(*byte))
}

impl FeedError {
    pub fn missing_mode() -> Self {
        Self::InvalidConfiguration {
            code: ErrorCode::CONFIG_MISSING_MODE,
            message: "feed mode is required (long-poll or continuous)".to_string(),
        }
    }

    pub fn unknown_mode(value: &str) -> Self {
        Self::InvalidConfiguration {
            code: ErrorCode::CONFIG_UNKNOWN_MODE,
            message: format!("unrecognized feed mode {value:?}; expected long-poll or continuous"),
        }
    }

    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            code: ErrorCode::CONFIG_PARSE_ERROR,
            message: message.into(),
        }
    }

    pub fn unbalanced(offset: u64) -> Self {
        Self::MalformedRecord {
            code: ErrorCode::RECORD_UNBALANCED,
            offset,
            reason: "unmatched closing bracket".to_string(),
        }
    }

    pub fn unexpected_byte(offset: u64, byte: u8) -> Self {
        Self::MalformedRecord {
            code: ErrorCode::RECORD_UNEXPECTED_BYTE,
            offset,
            reason: format!(
                "expected '{{', '[', ',' or ']' between records, found {}",
                byte_repr(&byte)
            ),
        }
    }

    pub fn mismatched_close(offset: u64) -> Self {
        Self::MalformedRecord {
            code: ErrorCode::RECORD_UNBALANCED,
            offset,
            reason: "envelope object closed with ']'".to_string(),
        }
    }

    pub fn invalid_utf8(offset: u64) -> Self {
        Self::MalformedRecord {
            code: ErrorCode::RECORD_INVALID_UTF8,
            offset,
            reason: "record is not valid UTF-8".to_string(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidConfiguration { code, .. } | Self::MalformedRecord { code, .. } => *code,
            Self::MalformedEnvelope { .. } => ErrorCode::ENVELOPE_MISMATCH,
            Self::StreamClosed { .. } => ErrorCode::STREAM_CLOSED,
        }
    }

    pub fn kind(&self) -> FeedErrorKind {
        match self {
            Self::InvalidConfiguration { .. } => FeedErrorKind::InvalidConfiguration,
            Self::MalformedEnvelope { .. } => FeedErrorKind::MalformedEnvelope,
            Self::MalformedRecord { .. } => FeedErrorKind::MalformedRecord,
            Self::StreamClosed { .. } => FeedErrorKind::StreamClosed,
        }
    }

    /// Whether the error moved the stream to its failed state
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::StreamClosed { .. })
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfiguration { .. } => 2,
            Self::MalformedEnvelope { .. } => 3,
            Self::MalformedRecord { .. } => 4,
            Self::StreamClosed { .. } => 1,
        }
    }
}

/// Errors raised while pumping an async reader into a feed sink
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("{0}")]
    Feed(#[from] FeedError),

    #[error("[E{code:04}] IO error: {0}", code = ErrorCode::IO_READ_FAILED)]
    Io(#[from] std::io::Error),
}

impl PumpError {
    pub fn code(&self) -> u16 {
        match self {
            Self::Feed(err) => err.code(),
            Self::Io(_) => ErrorCode::IO_READ_FAILED,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Feed(err) => err.exit_code(),
            Self::Io(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_display() {
        let err = FeedError::MalformedEnvelope {
            position: 11,
            expected: b'[',
            found: b']',
        };
        assert_eq!(
            err.to_string(),
            "[E2001] Malformed envelope at byte 11: expected '[', found ']'"
        );
        assert_eq!(err.kind(), FeedErrorKind::MalformedEnvelope);
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_non_ascii_byte_is_escaped() {
        let err = FeedError::MalformedEnvelope {
            position: 0,
            expected: b'{',
            found: 0xff,
        };
        assert!(err.to_string().ends_with(r"found '\xff'"));
    }

    #[test]
    fn test_error_codes_and_kinds() {
        assert_eq!(
            FeedError::missing_mode().code(),
            ErrorCode::CONFIG_MISSING_MODE
        );
        assert_eq!(
            FeedError::unknown_mode("normal").kind(),
            FeedErrorKind::InvalidConfiguration
        );
        assert_eq!(FeedError::unbalanced(4).code(), ErrorCode::RECORD_UNBALANCED);
        assert_eq!(
            FeedError::invalid_utf8(0).code(),
            ErrorCode::RECORD_INVALID_UTF8
        );
    }

    #[test]
    fn test_stream_closed_is_not_fatal() {
        let err = FeedError::StreamClosed {
            state: StreamState::Ended,
        };
        assert!(!err.is_fatal());
        assert!(FeedError::unbalanced(0).is_fatal());
        assert!(err.to_string().contains("state: ended"));
    }

    #[test]
    fn test_pump_error_exit_codes() {
        let io = PumpError::from(std::io::Error::other("connection reset"));
        assert_eq!(io.exit_code(), 5);
        assert_eq!(io.code(), ErrorCode::IO_READ_FAILED);

        let feed = PumpError::from(FeedError::missing_mode());
        assert_eq!(feed.exit_code(), 2);
    }
}
