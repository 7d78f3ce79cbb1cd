//! Share generation and distribution.
//!
//! The dealer turns a [`BidBook`] into one [`ShareColumn`] per server. Column
//! i holds share i of every bidder's share set and nothing else, so each
//! server sees exactly one uniformly random share per bidder.

use std::collections::BTreeMap;
use std::fmt;
use std::mem;

use rand::{CryptoRng, RngCore};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroize;

use auction_crypto::{split_secret, CryptoError, Field, MIN_SERVERS};
use auction_types::{Bid, BidderId, FieldElement, ServerIndex};

use crate::bid::BidBook;

/// Errors that can occur during distribution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DealerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// The shares one server receives: bidder -> share.
pub struct ShareColumn {
    server_index: ServerIndex,
    shares: BTreeMap<BidderId, FieldElement>,
}

impl ShareColumn {
    pub fn new(server_index: ServerIndex) -> Self {
        Self {
            server_index,
            shares: BTreeMap::new(),
        }
    }

    pub fn server_index(&self) -> ServerIndex {
        self.server_index
    }

    /// Add one bidder's share. Returns false if the bidder already has one.
    pub fn insert(&mut self, bidder: BidderId, share: FieldElement) -> bool {
        if self.shares.contains_key(&bidder) {
            return false;
        }
        self.shares.insert(bidder, share);
        true
    }

    pub fn get(&self, bidder: &BidderId) -> Option<FieldElement> {
        self.shares.get(bidder).copied()
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn bidders(&self) -> impl Iterator<Item = &BidderId> {
        self.shares.keys()
    }

    /// Hand the shares over to their server, leaving the column empty.
    pub fn take_shares(&mut self) -> BTreeMap<BidderId, FieldElement> {
        mem::take(&mut self.shares)
    }
}

impl Drop for ShareColumn {
    fn drop(&mut self) {
        for share in self.shares.values_mut() {
            share.zeroize();
        }
    }
}

impl fmt::Debug for ShareColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareColumn")
            .field("server_index", &self.server_index)
            .field("bidders", &self.shares.len())
            .field("shares", &"***SENSITIVE***")
            .finish()
    }
}

/// Splits bids and assigns share i of every bid to server i.
#[derive(Debug, Clone)]
pub struct Dealer {
    field: Field,
    server_count: usize,
    max_bid: u64,
}

impl Dealer {
    /// Create a dealer for `server_count` servers accepting bids in [0, max_bid].
    pub fn new(field: Field, server_count: usize, max_bid: u64) -> Result<Self, DealerError> {
        if server_count < MIN_SERVERS {
            return Err(DealerError::InvalidInput(format!(
                "server count {} is below the minimum of {}",
                server_count, MIN_SERVERS
            )));
        }
        if max_bid >= field.modulus() {
            return Err(DealerError::InvalidInput(format!(
                "maximum bid {} does not fit in field of modulus {}",
                max_bid,
                field.modulus()
            )));
        }
        Ok(Self {
            field,
            server_count,
            max_bid,
        })
    }

    pub fn server_count(&self) -> usize {
        self.server_count
    }

    /// Share every bid and return the columns in server order (index 1..=N).
    ///
    /// All bids are validated before the first share is drawn. The book is
    /// consumed either way.
    pub fn deal<R: RngCore + CryptoRng>(
        &self,
        book: BidBook,
        rng: &mut R,
    ) -> Result<Vec<ShareColumn>, DealerError> {
        if book.is_empty() {
            return Err(DealerError::InvalidInput("no bids to distribute".into()));
        }
        for (bidder, value) in book.entries() {
            if value > self.max_bid {
                return Err(DealerError::InvalidInput(format!(
                    "bid of {} outside the valid range [0, {}]",
                    bidder, self.max_bid
                )));
            }
        }

        let mut columns: Vec<ShareColumn> = (1..=self.server_count as ServerIndex)
            .map(ShareColumn::new)
            .collect();

        for (bidder, value) in book.entries() {
            let mut bid = Bid {
                bidder: bidder.clone(),
                value: self.field.element(value).map_err(CryptoError::from)?,
            };
            let shares = split_secret(&self.field, bid.value, self.server_count, rng);
            bid.value.zeroize();
            let shares = shares?;
            for (column, share) in columns.iter_mut().zip(shares.as_slice()) {
                column.insert(bid.bidder.clone(), *share);
            }
        }

        debug!(
            bidders = book.len(),
            servers = self.server_count,
            "Distributed share columns"
        );

        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_crypto::reconstruct_secret;
    use rand::rngs::OsRng;

    fn dealer(p: u64, n: usize, max_bid: u64) -> Dealer {
        Dealer::new(Field::new(p).unwrap(), n, max_bid).unwrap()
    }

    #[test]
    fn test_columns_reconstruct_every_bid() {
        let mut rng = OsRng;
        let dealer = dealer(13, 3, 6);
        let book = BidBook::new()
            .with_bid("alice", 5)
            .unwrap()
            .with_bid("bob", 0)
            .unwrap()
            .with_bid("carol", 6)
            .unwrap();

        let columns = dealer.deal(book, &mut rng).unwrap();
        assert_eq!(columns.len(), 3);

        let field = Field::new(13).unwrap();
        for (bidder, expected) in [("alice", 5u64), ("bob", 0), ("carol", 6)] {
            let id = BidderId::from(bidder);
            let shares: Vec<FieldElement> = columns.iter().map(|c| c.get(&id).unwrap()).collect();
            assert_eq!(reconstruct_secret(&field, &shares).unwrap().value(), expected);
        }
    }

    #[test]
    fn test_one_share_per_bidder_per_server() {
        let dealer = dealer(13, 4, 6);
        let book = BidBook::new().with_bid("a", 1).unwrap().with_bid("b", 2).unwrap();
        let columns = dealer.deal(book, &mut OsRng).unwrap();

        for (i, column) in columns.iter().enumerate() {
            assert_eq!(column.server_index(), i as ServerIndex + 1);
            assert_eq!(column.len(), 2);
        }
    }

    #[test]
    fn test_rejects_bid_above_max() {
        let dealer = dealer(13, 3, 6);
        let book = BidBook::new().with_bid("alice", 7).unwrap();
        assert!(matches!(
            dealer.deal(book, &mut OsRng),
            Err(DealerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_empty_book() {
        let dealer = dealer(13, 3, 6);
        assert!(matches!(
            dealer.deal(BidBook::new(), &mut OsRng),
            Err(DealerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let field = Field::new(7).unwrap();
        assert!(matches!(Dealer::new(field, 1, 3), Err(DealerError::InvalidInput(_))));
        assert!(matches!(Dealer::new(field, 3, 7), Err(DealerError::InvalidInput(_))));
    }

    #[test]
    fn test_take_shares_empties_column() {
        let dealer = dealer(7, 2, 3);
        let book = BidBook::new().with_bid("dave", 3).unwrap();
        let mut columns = dealer.deal(book, &mut OsRng).unwrap();

        let shares = columns[0].take_shares();
        assert_eq!(shares.len(), 1);
        assert!(columns[0].is_empty());
    }

    #[test]
    fn test_error_message_does_not_leak_bid() {
        let dealer = dealer(13, 3, 6);
        let book = BidBook::new().with_bid("alice", 12).unwrap();
        let err = dealer.deal(book, &mut OsRng).unwrap_err();
        assert!(!err.to_string().contains("12"));
    }
}
