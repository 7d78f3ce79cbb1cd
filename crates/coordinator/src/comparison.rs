//! Secure comparison tournament.
//!
//! For a pair (left, right) every server publishes its share of
//! left - right mod p. The coordinator sums those shares, so it learns the
//! exact signed difference left - right of every compared pair; the servers
//! learn nothing beyond their own shares. The value decodes unambiguously
//! because p > 2 * max_bid:
//!
//! | revealed value      | meaning        |
//! |---------------------|----------------|
//! | 0                   | tie            |
//! | 1 ..= max_bid       | left > right   |
//! | p - max_bid ..= p-1 | left < right   |
//!
//! Any other value cannot come from honest contributions.
//!
//! Every challenger is compared against a champion that chains to the final
//! winner, whose bid is published. The coordinator can therefore recover
//! every losing bid from the differences; only the servers are kept blind.
//! Only the ordering is logged or returned.

use std::cmp::Ordering;

use tracing::debug;

use auction_crypto::Field;
use auction_types::protocol::{ContributionPayload, RequestKind};
use auction_types::{BidderId, FieldElement};

use crate::error::AuctionError;
use crate::round::{check_elements, extract, RoundDriver};

/// Fail unless differences of bids in [0, max_bid] decode uniquely mod p.
pub fn check_modulus(field: &Field, max_bid: u64) -> Result<(), AuctionError> {
    if (field.modulus() as u128) <= 2 * max_bid as u128 {
        return Err(AuctionError::ModulusTooSmall {
            modulus: field.modulus(),
            max_bid,
        });
    }
    Ok(())
}

/// Signed value of a revealed difference left - right mod p.
///
/// Returns `None` if p is too small for `max_bid` or for a representative no
/// pair of bids in [0, max_bid] can produce.
pub fn signed_difference(field: &Field, max_bid: u64, revealed: FieldElement) -> Option<i64> {
    check_modulus(field, max_bid).ok()?;
    let value = revealed.value();
    let modulus = field.modulus();
    if value >= modulus {
        None
    } else if value <= max_bid {
        Some(value as i64)
    } else if value >= modulus - max_bid {
        Some(-((modulus - value) as i64))
    } else {
        None
    }
}

/// Decode a revealed difference left - right mod p into an ordering.
pub fn decode_difference(field: &Field, max_bid: u64, revealed: FieldElement) -> Option<Ordering> {
    signed_difference(field, max_bid, revealed).map(|d| d.cmp(&0))
}

/// Set of bidders currently tied for the highest bid seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    leaders: Vec<BidderId>,
}

impl Leaderboard {
    pub fn new(first: BidderId) -> Self {
        Self {
            leaders: vec![first],
        }
    }

    /// The leader every challenger is compared against.
    pub fn champion(&self) -> &BidderId {
        &self.leaders[0]
    }

    /// Record how `challenger` compared against the champion.
    pub fn record(&mut self, challenger: BidderId, outcome: Ordering) {
        match outcome {
            Ordering::Greater => {
                self.leaders.clear();
                self.leaders.push(challenger);
            }
            Ordering::Equal => self.leaders.push(challenger),
            Ordering::Less => {}
        }
    }

    pub fn leaders(&self) -> &[BidderId] {
        &self.leaders
    }

    pub fn into_leaders(self) -> Vec<BidderId> {
        self.leaders
    }
}

/// Compare two bidders' hidden bids in one round.
pub async fn compare(
    driver: &mut RoundDriver,
    field: &Field,
    max_bid: u64,
    left: &BidderId,
    right: &BidderId,
) -> Result<Ordering, AuctionError> {
    check_modulus(field, max_bid)?;
    let contributions = driver
        .run(RequestKind::Compare {
            left: left.clone(),
            right: right.clone(),
        })
        .await?;
    let differences = extract(contributions, "difference", |payload| match payload {
        ContributionPayload::Difference(d) => Some(d),
        _ => None,
    })?;
    check_elements(field, &differences)?;

    let revealed = field.sum(differences.iter().map(|(_, d)| *d))?;
    let outcome = decode_difference(field, max_bid, revealed).ok_or_else(|| {
        AuctionError::IncompleteShares(format!(
            "difference of {} and {} is outside [-{}, {}]",
            left, right, max_bid, max_bid
        ))
    })?;

    debug!(%left, %right, ?outcome, "Compared bids");
    Ok(outcome)
}

/// Run the max-fold over `bidders` (ascending order) and return every bidder
/// tied for the maximum.
///
/// Takes exactly `bidders.len() - 1` comparison rounds.
pub async fn find_leaders(
    driver: &mut RoundDriver,
    field: &Field,
    max_bid: u64,
    bidders: &[BidderId],
) -> Result<Vec<BidderId>, AuctionError> {
    check_modulus(field, max_bid)?;
    let (first, rest) = bidders
        .split_first()
        .ok_or_else(|| AuctionError::InvalidInput("no bidders to compare".into()))?;

    let mut board = Leaderboard::new(first.clone());
    for challenger in rest {
        let outcome = compare(driver, field, max_bid, challenger, board.champion()).await?;
        board.record(challenger.clone(), outcome);
    }
    Ok(board.into_leaders())
}
