//! Error types for field arithmetic and secret sharing.

use thiserror::Error;

use auction_types::ServerIndex;

/// A value or modulus outside the field's domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Value {value} outside field range [0, {modulus})")]
    OutOfRange { value: u64, modulus: u64 },

    #[error("Field modulus {0} is not a prime >= 2")]
    InvalidModulus(u64),
}

/// Errors that can occur during sharing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Seed share from server {0} does not match its commitment")]
    CommitmentMismatch(ServerIndex),
}
