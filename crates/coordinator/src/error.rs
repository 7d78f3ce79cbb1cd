//! Auction run error types.

use std::time::Duration;

use thiserror::Error;

use auction_crypto::{CryptoError, DomainError};
use auction_dealer::{BidError, DealerError};
use auction_server::ServerError;

/// Errors that abort an auction run.
///
/// None of them is recovered from: a failed run yields no result at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Field modulus {modulus} too small for bids up to {max_bid} (need modulus > 2 * max_bid)")]
    ModulusTooSmall { modulus: u64, max_bid: u64 },

    #[error("Incomplete shares: {0}")]
    IncompleteShares(String),

    #[error("Round {round} ({request}) timed out after {timeout:?}")]
    ProtocolTimeout {
        round: u64,
        request: &'static str,
        timeout: Duration,
    },
}

impl From<CryptoError> for AuctionError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Domain(e) => AuctionError::Domain(e),
            CryptoError::InvalidInput(msg) => AuctionError::InvalidInput(msg),
            CryptoError::CommitmentMismatch(index) => AuctionError::IncompleteShares(format!(
                "seed share from server {} does not match its commitment",
                index
            )),
        }
    }
}

impl From<DealerError> for AuctionError {
    fn from(e: DealerError) -> Self {
        match e {
            DealerError::InvalidInput(msg) => AuctionError::InvalidInput(msg),
            DealerError::Crypto(e) => e.into(),
        }
    }
}

impl From<BidError> for AuctionError {
    fn from(e: BidError) -> Self {
        AuctionError::InvalidInput(e.to_string())
    }
}

impl From<ServerError> for AuctionError {
    fn from(e: ServerError) -> Self {
        match e {
            ServerError::Domain(e) => AuctionError::Domain(e),
            ServerError::Crypto(e) => e.into(),
            ServerError::InvalidIndex { .. } | ServerError::WrongColumn { .. } => {
                AuctionError::InvalidInput(e.to_string())
            }
            other => AuctionError::IncompleteShares(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_mismatch_is_incomplete_shares() {
        let e: AuctionError = CryptoError::CommitmentMismatch(2).into();
        assert!(matches!(e, AuctionError::IncompleteShares(msg) if msg.contains("server 2")));
    }

    #[test]
    fn test_dealer_errors_map_to_taxonomy() {
        let e: AuctionError = DealerError::InvalidInput("no bids".into()).into();
        assert_eq!(e, AuctionError::InvalidInput("no bids".into()));

        let domain = DomainError::InvalidModulus(4);
        let e: AuctionError = DealerError::Crypto(CryptoError::Domain(domain.clone())).into();
        assert_eq!(e, AuctionError::Domain(domain));
    }

    #[test]
    fn test_server_errors_map_to_taxonomy() {
        let e: AuctionError = ServerError::WrongColumn { expected: 1, got: 2 }.into();
        assert!(matches!(e, AuctionError::InvalidInput(_)));

        let e: AuctionError = ServerError::Disconnected(3).into();
        assert_eq!(e, AuctionError::IncompleteShares("Server 3 is not running".into()));
    }

    #[test]
    fn test_timeout_message() {
        let e = AuctionError::ProtocolTimeout {
            round: 4,
            request: "compare",
            timeout: Duration::from_millis(250),
        };
        assert_eq!(e.to_string(), "Round 4 (compare) timed out after 250ms");
    }
}
