// src/error.rs

//! Errors reported by the `Result`-returning queue operations.

use core::fmt;

// Generates `into_inner`, `Display` and `Error` for enums whose every variant carries the
// rejected item.
macro_rules! impl_error_for_enum_with_inner {
    (
        $enum_name:ident < $generic_param:ident >,
        $($variant:ident ( $message:expr ) ),+
        $(,)?
    ) => {
        impl<$generic_param> $enum_name<$generic_param> {
            /// Consumes the error, returning the item that could not be enqueued.
            #[inline]
            pub fn into_inner(self) -> $generic_param {
                match self {
                    $( $enum_name::$variant(v) => v, )+
                }
            }
        }

        impl<$generic_param> fmt::Display for $enum_name<$generic_param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$variant(_) => f.write_str($message), )+
                }
            }
        }

        impl<$generic_param> std::error::Error for $enum_name<$generic_param> {}
    };
}

/// Error returned by `try_push` when the queue no longer accepts items.
///
/// The rejected item is handed back to the caller instead of being dropped.
#[derive(PartialEq, Eq, Clone)]
pub enum PushError<T> {
  /// The queue has been closed. The item being pushed is returned.
  Closed(T),
}

impl<T> fmt::Debug for PushError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PushError::Closed(_) => write!(f, "PushError::Closed(..)"),
    }
  }
}

impl_error_for_enum_with_inner!(
  PushError<T>,
  Closed("queue closed"),
);

/// Error returned by `pop_timeout`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PopTimeoutError {
  /// The time bound elapsed while the queue was still running and empty.
  Timeout,
  /// The queue is closed and every buffered item has been drained.
  Closed,
}

impl std::error::Error for PopTimeoutError {}
impl fmt::Display for PopTimeoutError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PopTimeoutError::Timeout => write!(f, "pop operation timed out"),
      PopTimeoutError::Closed => write!(f, "queue closed and drained"),
    }
  }
}
