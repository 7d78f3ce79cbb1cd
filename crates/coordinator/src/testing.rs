//! Helpers shared by the unit tests of this crate.

use std::time::Duration;

use rand::rngs::OsRng;

use auction_crypto::Field;
use auction_dealer::{BidBook, Dealer};
use auction_server::{ComputationServer, ServerConfig, ServerHandle};
use auction_types::TieBreakSeedSource;

use crate::round::RoundDriver;

/// Deal `bids` to `server_count` spawned servers and wrap them in a driver.
pub(crate) fn spawn_driver(
    field: Field,
    max_bid: u64,
    server_count: u32,
    seed_source: TieBreakSeedSource,
    bids: &[(&str, u64)],
) -> RoundDriver {
    let dealer = Dealer::new(field, server_count as usize, max_bid).unwrap();
    let mut book = BidBook::new();
    for (bidder, value) in bids {
        book.insert(*bidder, *value).unwrap();
    }
    let handles = dealer
        .deal(book, &mut OsRng)
        .unwrap()
        .into_iter()
        .map(|column| {
            let config =
                ServerConfig::new(column.server_index(), server_count, field, seed_source).unwrap();
            ServerHandle::spawn(ComputationServer::new(config, column).unwrap())
        })
        .collect();
    RoundDriver::new([7u8; 32], handles, Duration::from_secs(5)).unwrap()
}
