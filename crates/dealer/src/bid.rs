//! Plaintext bid collection.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use zeroize::Zeroize;

use auction_types::BidderId;

/// Errors that can occur while collecting bids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidError {
    #[error("Duplicate bid from bidder {0}")]
    DuplicateBidder(BidderId),

    #[error("Bidder identifier must not be empty")]
    EmptyBidderId,
}

/// Mapping bidder -> plaintext bid, as supplied by the bid-entry collaborator.
///
/// The book is consumed by the dealer. Its values are wiped when it is
/// dropped, so no plaintext outlives distribution.
#[derive(Default)]
pub struct BidBook {
    bids: BTreeMap<BidderId, u64>,
}

impl BidBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bid. Each bidder may bid once.
    pub fn insert(&mut self, bidder: impl Into<BidderId>, value: u64) -> Result<(), BidError> {
        let bidder = bidder.into();
        if bidder.as_str().is_empty() {
            return Err(BidError::EmptyBidderId);
        }
        if self.bids.contains_key(&bidder) {
            return Err(BidError::DuplicateBidder(bidder));
        }
        self.bids.insert(bidder, value);
        Ok(())
    }

    /// Builder-style [`BidBook::insert`].
    pub fn with_bid(mut self, bidder: impl Into<BidderId>, value: u64) -> Result<Self, BidError> {
        self.insert(bidder, value)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    /// Bidders in ascending order.
    pub fn bidders(&self) -> impl Iterator<Item = &BidderId> {
        self.bids.keys()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&BidderId, u64)> {
        self.bids.iter().map(|(bidder, value)| (bidder, *value))
    }
}

impl Drop for BidBook {
    fn drop(&mut self) {
        for value in self.bids.values_mut() {
            value.zeroize();
        }
    }
}

impl fmt::Debug for BidBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidBook")
            .field("bidders", &self.bids.keys().collect::<Vec<_>>())
            .field("values", &"***SENSITIVE***")
            .finish()
    }
}

impl<S: Into<BidderId>> TryFrom<BTreeMap<S, u64>> for BidBook {
    type Error = BidError;

    fn try_from(bids: BTreeMap<S, u64>) -> Result<Self, Self::Error> {
        let mut book = BidBook::new();
        for (bidder, value) in bids {
            book.insert(bidder, value)?;
        }
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_order() {
        let book = BidBook::new()
            .with_bid("carol", 5)
            .unwrap()
            .with_bid("alice", 5)
            .unwrap()
            .with_bid("bob", 3)
            .unwrap();

        assert_eq!(book.len(), 3);
        let bidders: Vec<&str> = book.bidders().map(|b| b.as_str()).collect();
        assert_eq!(bidders, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_duplicate_bidder() {
        let mut book = BidBook::new();
        book.insert("dave", 4).unwrap();
        assert_eq!(
            book.insert("dave", 2),
            Err(BidError::DuplicateBidder(BidderId::from("dave")))
        );
    }

    #[test]
    fn test_empty_bidder_id() {
        let mut book = BidBook::new();
        assert_eq!(book.insert("", 1), Err(BidError::EmptyBidderId));
        assert!(book.is_empty());
    }

    #[test]
    fn test_from_map() {
        let mut map = BTreeMap::new();
        map.insert("alice".to_string(), 1u64);
        map.insert("bob".to_string(), 2u64);
        let book = BidBook::try_from(map).unwrap();
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_debug_hides_values() {
        let book = BidBook::new().with_bid("alice", 4242).unwrap();
        let rendered = format!("{:?}", book);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("4242"));
    }
}
