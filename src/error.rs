//! Error types for the Warden sidecar.
//!
//! This module provides a unified error type [`WardenError`] for all Warden
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! Errors are organized into the following categories:
//!
//! - **Locking**: contention and race outcomes of the advisory slot lock
//! - **Registry**: topology store availability and record lookups
//! - **Bootstrap**: peer-sync connection and warm-up failures
//! - **Process**: proxy/storage process control failures
//! - **Configuration**: invalid settings or missing configuration
//!
//! Retryability is a property of the error, not the call site: lock races and
//! registry unavailability are retryable by re-running the enclosing
//! operation, while configuration and argument errors are programmer errors
//! and never retried.
//!
//! # Example
//!
//! ```rust
//! use warden::error::{Result, WardenError};
//!
//! fn check_ring(ring_size: i64) -> Result<()> {
//!     if ring_size <= 0 {
//!         return Err(WardenError::InvalidArgument(
//!             "ring size must be positive".into(),
//!         ));
//!     }
//!     Ok(())
//! }
//!
//! let err = check_ring(0).unwrap_err();
//! assert!(!err.is_retryable());
//! ```

use std::io;
use thiserror::Error;

/// Main error type for Warden operations.
#[derive(Error, Debug)]
pub enum WardenError {
    // Advisory lock errors
    #[error("Lock contention on slot {slot}: another claimant is choosing")]
    LockContention { slot: String },

    #[error("Lock on slot {slot} held by {holder}")]
    LockHeldByOther { slot: String, holder: String },

    #[error("Lost lock race on slot {slot} after confirmation read")]
    LockRaceLost { slot: String },

    // Topology registry errors
    #[error("Topology registry unavailable: {0}")]
    RegistryUnavailable(String),

    // Bootstrap errors
    #[error("Cannot connect to any sync peer: {0}")]
    CannotConnect(String),

    #[error("Warm-up failed: {0}")]
    WarmupError(String),

    // Membership errors
    #[error("Instance {instance_id} not present in membership listing")]
    NotInMembership { instance_id: String },

    #[error("Membership source unavailable: {0}")]
    MembershipUnavailable(String),

    // Process control errors
    #[error("Process control failed: {0}")]
    ProcessControl(String),

    #[error("Storage engine error: {0}")]
    Storage(String),

    #[error("Proxy admin error: {0}")]
    ProxyAdmin(String),

    // Retry bookkeeping
    #[error("Retries exhausted after {attempts} attempts: {operation}")]
    RetryExhausted { operation: String, attempts: u32 },

    // Configuration and argument errors (never retried)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Infrastructure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WardenError {
    /// Check if this error is retryable by re-running the enclosing
    /// operation.
    ///
    /// Lock errors are retryable because a competing claimant may finish (or
    /// its TTL rows may expire) before the next attempt. Registry and
    /// membership unavailability is transient by assumption. Everything else
    /// is either a hard bootstrap outcome or a programmer error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WardenError::LockContention { .. }
                | WardenError::LockHeldByOther { .. }
                | WardenError::LockRaceLost { .. }
                | WardenError::RegistryUnavailable(_)
                | WardenError::MembershipUnavailable(_)
        )
    }
}

/// Convenient result type for Warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_errors_are_retryable() {
        let errs = [
            WardenError::LockContention { slot: "demo_us-east-1a_0".into() },
            WardenError::LockHeldByOther {
                slot: "demo_us-east-1a_0".into(),
                holder: "i-other".into(),
            },
            WardenError::LockRaceLost { slot: "demo_us-east-1a_0".into() },
            WardenError::RegistryUnavailable("connection refused".into()),
        ];
        for err in errs {
            assert!(err.is_retryable(), "{err} should be retryable");
        }
    }

    #[test]
    fn argument_and_bootstrap_errors_are_not_retryable() {
        assert!(!WardenError::InvalidArgument("bad ring".into()).is_retryable());
        assert!(!WardenError::CannotConnect("no peers".into()).is_retryable());
        assert!(!WardenError::WarmupError("offset read failed".into()).is_retryable());
        assert!(!WardenError::InvalidConfig {
            field: "cluster.name".into(),
            reason: "must be non-empty".into(),
        }
        .is_retryable());
    }
}
