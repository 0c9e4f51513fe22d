//! Customized unified error type.

use std::fmt;
use std::io;

/// Customized error type for RepLog.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RepLogError(pub String);

impl RepLogError {
    /// Builds an error from anything printable.
    pub fn msg(s: impl ToString) -> Self {
        RepLogError(s.to_string())
    }
}

impl fmt::Display for RepLogError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0) // do not display literal quotes
    }
}

impl std::error::Error for RepLogError {}

// Helper macro for saving boiler-plate `impl From<T>`s for transparent
// conversion from various common error types to `RepLogError`.
macro_rules! impl_from_error {
    ($error:ty) => {
        impl From<$error> for RepLogError {
            fn from(e: $error) -> Self {
                // just store the source error's string representation
                RepLogError(e.to_string())
            }
        }
    };
}

impl_from_error!(io::Error);
impl_from_error!(rmp_serde::encode::Error);
impl_from_error!(rmp_serde::decode::Error);
impl_from_error!(redb::DatabaseError);
impl_from_error!(redb::TransactionError);
impl_from_error!(redb::TableError);
impl_from_error!(redb::StorageError);
impl_from_error!(redb::CommitError);
impl_from_error!(tokio::sync::oneshot::error::RecvError);
impl_from_error!(tokio::task::JoinError);
impl_from_error!(
    tokio::sync::watch::error::SendError<Option<tokio::time::Instant>>
);

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn error_display() {
        let e = RepLogError("what the heck?".into());
        assert_eq!(format!("{}", e), String::from("what the heck?"));
    }

    #[test]
    fn from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "oh no!");
        let e = RepLogError::from(io_error);
        assert!(e.0.contains("oh no!"));
    }
}
