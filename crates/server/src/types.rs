//! Server configuration and errors.

use thiserror::Error;

use auction_crypto::{CryptoError, DomainError, Field, MIN_SERVERS};
use auction_types::{BidderId, ServerIndex, TieBreakSeedSource};

/// Errors raised by a computation server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    #[error("Server index {index} invalid for {count} servers")]
    InvalidIndex { index: ServerIndex, count: u32 },

    #[error("Share column for server {got} handed to server {expected}")]
    WrongColumn { expected: ServerIndex, got: ServerIndex },

    #[error("No share held for bidder {0}")]
    UnknownBidder(BidderId),

    #[error("No winner indicator for bidder {0}")]
    MissingIndicator(BidderId),

    #[error("Shares not aggregated yet")]
    NotAggregated,

    #[error("Seed share not committed yet")]
    SeedNotCommitted,

    #[error("Stale round {got}, last answered round {last}")]
    StaleRound { got: u64, last: u64 },

    #[error("Server {0} is not running")]
    Disconnected(ServerIndex),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Configuration of one computation server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// This server's index (1-based)
    pub server_index: ServerIndex,
    /// Total number of servers
    pub server_count: u32,
    /// Field all shares live in
    pub field: Field,
    /// Where the tie-break seed share comes from
    pub seed_source: TieBreakSeedSource,
}

impl ServerConfig {
    pub fn new(
        server_index: ServerIndex,
        server_count: u32,
        field: Field,
        seed_source: TieBreakSeedSource,
    ) -> Result<Self, ServerError> {
        if (server_count as usize) < MIN_SERVERS || server_index == 0 || server_index > server_count {
            return Err(ServerError::InvalidIndex {
                index: server_index,
                count: server_count,
            });
        }
        Ok(Self {
            server_index,
            server_count,
            field,
            seed_source,
        })
    }
}
