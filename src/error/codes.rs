/// Error code registry for changes-feed
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Envelope errors
/// - 3000-3999: Record errors
/// - 4000-4999: Stream lifecycle errors
/// - 5000-5999: I/O errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_MISSING_MODE: u16 = 1001;
    pub const CONFIG_UNKNOWN_MODE: u16 = 1002;
    pub const CONFIG_PARSE_ERROR: u16 = 1003;

    // Envelope errors (2000-2999)
    pub const ENVELOPE_MISMATCH: u16 = 2001;

    // Record errors (3000-3999)
    pub const RECORD_GENERIC: u16 = 3000;
    pub const RECORD_UNBALANCED: u16 = 3001;
    pub const RECORD_UNEXPECTED_BYTE: u16 = 3002;
    pub const RECORD_INVALID_UTF8: u16 = 3003;

    // Stream lifecycle errors (4000-4999)
    pub const STREAM_CLOSED: u16 = 4001;

    // I/O errors (5000-5999)
    pub const IO_READ_FAILED: u16 = 5001;
}

/// Get a human-readable description of an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "Generic configuration error",
        ErrorCode::CONFIG_MISSING_MODE => "Feed mode was not configured",
        ErrorCode::CONFIG_UNKNOWN_MODE => "Feed mode is not long-poll or continuous",
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration file could not be parsed",
        ErrorCode::ENVELOPE_MISMATCH => "Long-poll feed did not open with {\"results\":[",
        ErrorCode::RECORD_GENERIC => "Generic record error",
        ErrorCode::RECORD_UNBALANCED => "More closing brackets than opening brackets",
        ErrorCode::RECORD_UNEXPECTED_BYTE => "Unexpected byte between records",
        ErrorCode::RECORD_INVALID_UTF8 => "Record payload is not valid UTF-8",
        ErrorCode::STREAM_CLOSED => "Write attempted on a stream that is not open",
        ErrorCode::IO_READ_FAILED => "Reading from the feed source failed",
        _ => "Unknown error code",
    }
}
