//! Error types for block encoding.

use thiserror::Error;

/// Result type alias for encoder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort the current block and the stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error
{
  /// Match length or distance outside the RFC 1951 ranges ( 3..=258, 1..=32768 ).
  #[error("match out of range: length {length}, distance {distance}")]
  ProtocolRange { length: usize, distance: usize },

  /// Heap or tree construction broke an internal invariant. Always a defect, never bad input.
  #[error("internal invariant violated: {0}")]
  InvariantViolation(&'static str),

  /// A buffer could not be allocated.
  #[error("allocation failed: could not allocate {requested_bytes} bytes")]
  AllocationFailed { requested_bytes: usize },

  /// Rejected configuration value.
  #[error("invalid option {name}: {value}")]
  InvalidOption { name: &'static str, value: usize },
}
