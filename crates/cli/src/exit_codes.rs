//! CLI Exit Code Registry
//!
//! Single source of truth for `fuzzylookup` exit codes. Scripts rely on
//! them, so codes are never renumbered.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 1    | General error (unspecified)                      |
//! | 2    | Usage or configuration error                     |
//! | 3    | I/O error (cannot read or write a file)          |
//! | 4    | Parse error (malformed CSV, Excel or TOML)       |
//! | 5    | Invalid input keys                               |
//! | 6    | Cancelled (time limit reached)                   |

use fuzzylookup_matcher::MatchError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, invalid config values, unknown column.
pub const EXIT_USAGE: u8 = 2;

/// A file could not be read or written.
pub const EXIT_IO: u8 = 3;

/// A file was read but its contents could not be parsed.
pub const EXIT_PARSE: u8 = 4;

/// A key column holds values that cannot be matched (blank, boolean, error cells).
pub const EXIT_INVALID_INPUT: u8 = 5;

/// Matching was cancelled before it produced a result.
pub const EXIT_CANCELLED: u8 = 6;

/// Map an engine error to its exit code.
pub fn match_exit_code(err: &MatchError) -> u8 {
    match err {
        MatchError::ConfigParse(_) => EXIT_PARSE,
        MatchError::Cancelled => EXIT_CANCELLED,
        e if e.is_configuration() => EXIT_USAGE,
        e if e.is_invalid_input() => EXIT_INVALID_INPUT,
        _ => EXIT_ERROR,
    }
}
