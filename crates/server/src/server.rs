//! Computation server implementation.

use std::collections::BTreeMap;

use rand::{CryptoRng, RngCore};
use tracing::debug;

use auction_crypto::SeedShare;
use auction_dealer::ShareColumn;
use auction_types::protocol::{Contribution, ContributionPayload, RequestKind, RoundRequest};
use auction_types::{BidderId, FieldElement, ServerIndex, TieBreakSeedSource};

use crate::state::ServerState;
use crate::types::{ServerConfig, ServerError};

/// One non-colluding party of the auction.
///
/// The server only ever sees its own share column. Every round it answers
/// with a value computed from its shares alone; cross-server interaction
/// happens exclusively through the coordinator's rounds.
pub struct ComputationServer {
    config: ServerConfig,
    state: ServerState,
    /// Our contribution to the tie-break seed
    seed_share: Option<SeedShare>,
    /// Whether the seed commitment has been published
    seed_committed: bool,
    /// Last round answered
    last_round: Option<u64>,
}

impl ComputationServer {
    /// Create a server from the share column the dealer handed it.
    pub fn new(config: ServerConfig, mut column: ShareColumn) -> Result<Self, ServerError> {
        if column.server_index() != config.server_index {
            return Err(ServerError::WrongColumn {
                expected: config.server_index,
                got: column.server_index(),
            });
        }
        let state = ServerState::new(column.take_shares());
        Ok(Self {
            config,
            state,
            seed_share: None,
            seed_committed: false,
            last_round: None,
        })
    }

    pub fn index(&self) -> ServerIndex {
        self.config.server_index
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Run the local aggregator and draw the tie-break seed share.
    ///
    /// The seed share is drawn once; repeated aggregation keeps it.
    pub fn aggregate<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<u32, ServerError> {
        let bidders = self.state.aggregate(&self.config.field)?;
        if self.seed_share.is_none() {
            self.seed_share = Some(match self.config.seed_source {
                TieBreakSeedSource::Joint => SeedShare::random(rng),
                TieBreakSeedSource::Deterministic(seed) => {
                    SeedShare::derive(seed, self.config.server_index)
                }
            });
        }
        debug!(server_index = self.index(), bidders, "Aggregated share column");
        Ok(bidders as u32)
    }

    /// Commitment to our tie-break seed share.
    pub fn commit_seed(&mut self) -> Result<[u8; 32], ServerError> {
        let share = self.seed_share.as_ref().ok_or(ServerError::NotAggregated)?;
        let commitment = share.commit(self.config.server_index);
        self.seed_committed = true;
        Ok(commitment)
    }

    /// Local share of left - right.
    pub fn difference(&self, left: &BidderId, right: &BidderId) -> Result<FieldElement, ServerError> {
        let a = self.contribution(left)?;
        let b = self.contribution(right)?;
        Ok(self.config.field.sub(a, b)?)
    }

    /// Open the committed seed share.
    pub fn reveal_seed(&self) -> Result<[u8; 32], ServerError> {
        if !self.seed_committed {
            return Err(ServerError::SeedNotCommitted);
        }
        self.seed_share
            .as_ref()
            .map(SeedShare::to_bytes)
            .ok_or(ServerError::SeedNotCommitted)
    }

    /// Our share of one bidder's value.
    pub fn share_of(&self, bidder: &BidderId) -> Result<FieldElement, ServerError> {
        self.contribution(bidder)
    }

    /// Sum of our shares of the 0/1 winner indicators.
    ///
    /// `indicators` must hold exactly one share per bidder we aggregated.
    pub fn count_winners(
        &self,
        indicators: &BTreeMap<BidderId, FieldElement>,
    ) -> Result<FieldElement, ServerError> {
        if !self.state.is_aggregated() {
            return Err(ServerError::NotAggregated);
        }
        if let Some(bidder) = indicators
            .keys()
            .find(|bidder| self.state.contribution(bidder).is_none())
        {
            return Err(ServerError::UnknownBidder(bidder.clone()));
        }
        if let Some(bidder) = self.state.bidders().find(|bidder| !indicators.contains_key(*bidder)) {
            return Err(ServerError::MissingIndicator(bidder.clone()));
        }
        Ok(self.config.field.sum(indicators.values().copied())?)
    }

    /// Audit disclosure: local sum, plus the whole column if `full`.
    pub fn audit(&self, full: bool) -> Result<ContributionPayload, ServerError> {
        let local_sum = self.state.local_sum().ok_or(ServerError::NotAggregated)?;
        let shares = full.then(|| self.state.share_column());
        Ok(ContributionPayload::Audit { local_sum, shares })
    }

    /// Answer one round request.
    pub fn handle<R: RngCore + CryptoRng>(
        &mut self,
        request: &RoundRequest,
        rng: &mut R,
    ) -> Result<Contribution, ServerError> {
        if let Some(last) = self.last_round {
            if request.round <= last {
                return Err(ServerError::StaleRound {
                    got: request.round,
                    last,
                });
            }
        }

        let payload = match &request.kind {
            RequestKind::Aggregate => ContributionPayload::Aggregated {
                bidders: self.aggregate(rng)?,
            },
            RequestKind::CommitSeed => ContributionPayload::SeedCommitment(self.commit_seed()?),
            RequestKind::Compare { left, right } => {
                ContributionPayload::Difference(self.difference(left, right)?)
            }
            RequestKind::RevealSeed => ContributionPayload::SeedShare(self.reveal_seed()?),
            RequestKind::RevealShare { bidder } => ContributionPayload::Share(self.share_of(bidder)?),
            RequestKind::CountWinners { indicators } => {
                ContributionPayload::WinnerIndicatorSum(self.count_winners(indicators)?)
            }
            RequestKind::Audit { full } => self.audit(*full)?,
        };

        self.last_round = Some(request.round);
        Ok(Contribution {
            server_index: self.config.server_index,
            round: request.round,
            payload,
        })
    }

    fn contribution(&self, bidder: &BidderId) -> Result<FieldElement, ServerError> {
        if !self.state.is_aggregated() {
            return Err(ServerError::NotAggregated);
        }
        self.state
            .contribution(bidder)
            .ok_or_else(|| ServerError::UnknownBidder(bidder.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_crypto::{verify_seed_share, Field};
    use auction_dealer::{BidBook, Dealer};
    use rand::rngs::OsRng;

    fn servers(bids: &[(&str, u64)], seed_source: TieBreakSeedSource) -> Vec<ComputationServer> {
        let field = Field::new(13).unwrap();
        let dealer = Dealer::new(field, 3, 6).unwrap();
        let mut book = BidBook::new();
        for (bidder, value) in bids {
            book.insert(*bidder, *value).unwrap();
        }
        dealer
            .deal(book, &mut OsRng)
            .unwrap()
            .into_iter()
            .map(|column| {
                let config =
                    ServerConfig::new(column.server_index(), 3, field, seed_source).unwrap();
                ComputationServer::new(config, column).unwrap()
            })
            .collect()
    }

    fn request(round: u64, kind: RequestKind) -> RoundRequest {
        RoundRequest { round, kind }
    }

    #[test]
    fn test_differences_sum_to_bid_difference() {
        let field = Field::new(13).unwrap();
        let mut servers = servers(&[("alice", 5), ("bob", 3)], TieBreakSeedSource::Joint);
        for server in &mut servers {
            server.aggregate(&mut OsRng).unwrap();
        }

        let alice = BidderId::from("alice");
        let bob = BidderId::from("bob");
        let forward = field
            .sum(servers.iter().map(|s| s.difference(&alice, &bob).unwrap()))
            .unwrap();
        let backward = field
            .sum(servers.iter().map(|s| s.difference(&bob, &alice).unwrap()))
            .unwrap();

        assert_eq!(forward.value(), 2);
        assert_eq!(backward.value(), 11);
    }

    #[test]
    fn test_requires_aggregation_first() {
        let servers = servers(&[("alice", 5)], TieBreakSeedSource::Joint);
        let alice = BidderId::from("alice");
        assert_eq!(servers[0].share_of(&alice), Err(ServerError::NotAggregated));
    }

    #[test]
    fn test_unknown_bidder() {
        let mut servers = servers(&[("alice", 5)], TieBreakSeedSource::Joint);
        servers[0].aggregate(&mut OsRng).unwrap();
        let mallory = BidderId::from("mallory");
        assert_eq!(
            servers[0].share_of(&mallory),
            Err(ServerError::UnknownBidder(mallory))
        );
    }

    #[test]
    fn test_seed_commit_reveal() {
        let mut servers = servers(&[("alice", 5)], TieBreakSeedSource::Joint);
        let server = &mut servers[1];
        server.aggregate(&mut OsRng).unwrap();

        assert_eq!(server.reveal_seed(), Err(ServerError::SeedNotCommitted));
        let commitment = server.commit_seed().unwrap();
        let opened = server.reveal_seed().unwrap();
        assert!(verify_seed_share(2, &opened, &commitment).is_ok());

        // Re-aggregation keeps the committed share
        server.aggregate(&mut OsRng).unwrap();
        assert_eq!(server.reveal_seed().unwrap(), opened);
    }

    #[test]
    fn test_deterministic_seed_share() {
        let mut a = servers(&[("alice", 5)], TieBreakSeedSource::Deterministic(9));
        let mut b = servers(&[("alice", 2)], TieBreakSeedSource::Deterministic(9));
        for server in a.iter_mut().chain(b.iter_mut()) {
            server.aggregate(&mut OsRng).unwrap();
        }
        assert_eq!(a[0].commit_seed().unwrap(), b[0].commit_seed().unwrap());
        assert_ne!(a[0].commit_seed().unwrap(), a[1].commit_seed().unwrap());
    }

    #[test]
    fn test_handle_rounds() {
        let mut servers = servers(&[("alice", 5), ("bob", 1)], TieBreakSeedSource::Joint);
        let server = &mut servers[2];
        let mut rng = OsRng;

        let reply = server.handle(&request(0, RequestKind::Aggregate), &mut rng).unwrap();
        assert_eq!(reply.server_index, 3);
        assert_eq!(reply.round, 0);
        assert_eq!(reply.payload, ContributionPayload::Aggregated { bidders: 2 });

        let reply = server
            .handle(
                &request(
                    1,
                    RequestKind::Compare {
                        left: BidderId::from("alice"),
                        right: BidderId::from("bob"),
                    },
                ),
                &mut rng,
            )
            .unwrap();
        assert!(matches!(reply.payload, ContributionPayload::Difference(_)));

        let stale = server.handle(&request(1, RequestKind::CommitSeed), &mut rng);
        assert_eq!(stale, Err(ServerError::StaleRound { got: 1, last: 1 }));
    }

    #[test]
    fn test_audit_disclosure() {
        let mut servers = servers(&[("alice", 5), ("bob", 1)], TieBreakSeedSource::Joint);
        servers[0].aggregate(&mut OsRng).unwrap();

        match servers[0].audit(false).unwrap() {
            ContributionPayload::Audit { shares, .. } => assert!(shares.is_none()),
            other => panic!("unexpected payload {:?}", other),
        }
        match servers[0].audit(true).unwrap() {
            ContributionPayload::Audit { shares, .. } => assert_eq!(shares.unwrap().len(), 2),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_count_winners() {
        let mut servers = servers(&[("alice", 5), ("bob", 5), ("carol", 1)], TieBreakSeedSource::Joint);
        let alice = BidderId::from("alice");
        let bob = BidderId::from("bob");
        let carol = BidderId::from("carol");

        let indicators: BTreeMap<BidderId, FieldElement> = [
            (alice.clone(), FieldElement::from_raw(12)),
            (bob.clone(), FieldElement::from_raw(3)),
            (carol.clone(), FieldElement::from_raw(0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(servers[0].count_winners(&indicators), Err(ServerError::NotAggregated));

        servers[0].aggregate(&mut OsRng).unwrap();
        assert_eq!(servers[0].count_winners(&indicators).unwrap(), FieldElement::from_raw(2));

        let mut missing = indicators.clone();
        missing.remove(&carol);
        assert_eq!(
            servers[0].count_winners(&missing),
            Err(ServerError::MissingIndicator(carol))
        );

        let mallory = BidderId::from("mallory");
        let mut extra = indicators.clone();
        extra.insert(mallory.clone(), FieldElement::from_raw(1));
        assert_eq!(
            servers[0].count_winners(&extra),
            Err(ServerError::UnknownBidder(mallory))
        );

        let mut outside = indicators;
        outside.insert(bob, FieldElement::from_raw(13));
        assert!(matches!(
            servers[0].count_winners(&outside),
            Err(ServerError::Domain(_))
        ));
    }

    #[test]
    fn test_wrong_column_rejected() {
        let field = Field::new(13).unwrap();
        let dealer = Dealer::new(field, 2, 6).unwrap();
        let book = BidBook::new().with_bid("dave", 4).unwrap();
        let mut columns = dealer.deal(book, &mut OsRng).unwrap();
        let second = columns.pop().unwrap();

        let config = ServerConfig::new(1, 2, field, TieBreakSeedSource::Joint).unwrap();
        assert!(matches!(
            ComputationServer::new(config, second),
            Err(ServerError::WrongColumn { expected: 1, got: 2 })
        ));
    }
}
