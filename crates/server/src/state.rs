//! Private state of one computation server.

use std::collections::BTreeMap;
use std::fmt;

use zeroize::Zeroize;

use auction_crypto::{DomainError, Field};
use auction_types::{BidderId, FieldElement};

/// Shares received from the dealer and the local values derived from them.
///
/// Never merged with another server's state. Everything is wiped on drop.
#[derive(Default)]
pub struct ServerState {
    /// bidder -> share received from the dealer
    shares: BTreeMap<BidderId, FieldElement>,
    /// bidder -> local contribution used by the comparison rounds
    contributions: BTreeMap<BidderId, FieldElement>,
    /// Σ of every held share, disclosed only for audit
    local_sum: Option<FieldElement>,
}

impl ServerState {
    pub fn new(shares: BTreeMap<BidderId, FieldElement>) -> Self {
        Self {
            shares,
            contributions: BTreeMap::new(),
            local_sum: None,
        }
    }

    /// Run the local aggregator.
    ///
    /// Each held share becomes the bidder's local contribution and the local
    /// sum is recomputed. Running it again without new shares yields the same
    /// contributions.
    pub fn aggregate(&mut self, field: &Field) -> Result<usize, DomainError> {
        let mut contributions = BTreeMap::new();
        for (bidder, share) in &self.shares {
            contributions.insert(bidder.clone(), field.check(*share)?);
        }
        let local_sum = field.sum(contributions.values().copied())?;

        for old in self.contributions.values_mut() {
            old.zeroize();
        }
        self.contributions = contributions;
        self.local_sum = Some(local_sum);
        Ok(self.contributions.len())
    }

    pub fn is_aggregated(&self) -> bool {
        self.local_sum.is_some()
    }

    pub fn contribution(&self, bidder: &BidderId) -> Option<FieldElement> {
        self.contributions.get(bidder).copied()
    }

    /// Bidders with a local contribution.
    pub fn bidders(&self) -> impl Iterator<Item = &BidderId> {
        self.contributions.keys()
    }

    pub fn local_sum(&self) -> Option<FieldElement> {
        self.local_sum
    }

    /// Copy of the received share column, for full audit disclosure.
    pub fn share_column(&self) -> BTreeMap<BidderId, FieldElement> {
        self.shares.clone()
    }

    fn wipe(&mut self) {
        for share in self.shares.values_mut() {
            share.zeroize();
        }
        for contribution in self.contributions.values_mut() {
            contribution.zeroize();
        }
        self.local_sum.zeroize();
    }
}

impl Drop for ServerState {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl fmt::Debug for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerState")
            .field("bidders", &self.shares.len())
            .field("aggregated", &self.is_aggregated())
            .finish()
    }
}
