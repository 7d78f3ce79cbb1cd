//! Dealer for secret-shared auctions.
//!
//! This crate provides:
//! - Collecting plaintext bids into a [`BidBook`]
//! - Splitting every bid into additive shares
//! - Handing each computation server its share column

pub mod bid;
pub mod dealer;

pub use bid::{BidBook, BidError};
pub use dealer::{Dealer, DealerError, ShareColumn};
