//! Messages exchanged between the coordinator and the computation servers.
//!
//! Every round the coordinator sends one [`RoundRequest`] to each server and
//! waits for one [`Contribution`] from each before the round's joint value is
//! computed. Payloads only ever carry field elements, hash commitments and
//! seed shares; plaintext bids never appear here.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{BidderId, FieldElement, ServerIndex};

/// What a server is asked to do in a round.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum RequestKind {
    /// Run the local aggregator over the received share column
    Aggregate,
    /// Publish the commitment to this server's tie-break seed share
    CommitSeed,
    /// Publish share(left) - share(right) mod p
    Compare { left: BidderId, right: BidderId },
    /// Open the tie-break seed share committed earlier
    RevealSeed,
    /// Publish this server's share of one bidder (the winner)
    RevealShare { bidder: BidderId },
    /// Sum the winner-indicator shares dealt to this server
    CountWinners {
        indicators: BTreeMap<BidderId, FieldElement>,
    },
    /// Publish audit data
    Audit { full: bool },
}

impl RequestKind {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            RequestKind::Aggregate => "aggregate",
            RequestKind::CommitSeed => "commit_seed",
            RequestKind::Compare { .. } => "compare",
            RequestKind::RevealSeed => "reveal_seed",
            RequestKind::RevealShare { .. } => "reveal_share",
            RequestKind::CountWinners { .. } => "count_winners",
            RequestKind::Audit { .. } => "audit",
        }
    }
}

/// Request sent to every server at the start of a round.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct RoundRequest {
    /// Round number, strictly increasing within a run
    pub round: u64,
    pub kind: RequestKind,
}

/// A server's reply for one round.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Contribution {
    pub server_index: ServerIndex,
    /// Echo of the round number the server answered
    pub round: u64,
    pub payload: ContributionPayload,
}

/// Round-specific content of a [`Contribution`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum ContributionPayload {
    /// Aggregation finished over this many bidders
    Aggregated { bidders: u32 },
    /// SHA-256 commitment to the tie-break seed share
    SeedCommitment([u8; 32]),
    /// Local share of a pairwise difference
    Difference(FieldElement),
    /// Opened tie-break seed share
    SeedShare([u8; 32]),
    /// Local share of one bidder's value
    Share(FieldElement),
    /// Local sum of the winner-indicator shares
    WinnerIndicatorSum(FieldElement),
    /// Audit disclosure
    Audit {
        local_sum: FieldElement,
        shares: Option<BTreeMap<BidderId, FieldElement>>,
    },
}

impl ContributionPayload {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ContributionPayload::Aggregated { .. } => "aggregated",
            ContributionPayload::SeedCommitment(_) => "seed_commitment",
            ContributionPayload::Difference(_) => "difference",
            ContributionPayload::SeedShare(_) => "seed_share",
            ContributionPayload::Share(_) => "share",
            ContributionPayload::WinnerIndicatorSum(_) => "winner_indicator_sum",
            ContributionPayload::Audit { .. } => "audit",
        }
    }
}
