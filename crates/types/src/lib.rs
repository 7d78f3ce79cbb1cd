//! Core type definitions for secret-shared sealed-bid auctions.
//!
//! This crate provides the data structures shared by the dealer, the
//! computation servers and the coordinator: field elements, bidder
//! identities, run options and the public auction result.

use std::collections::BTreeMap;
use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub mod protocol;

/// 1-based index of a computation server.
pub type ServerIndex = u32;

/// Identifier of an auction run (SHA-256 digest).
pub type RunId = [u8; 32];

// =========================
// FIELD ELEMENTS
// =========================

/// Representative of an element of the prime field Z_p.
///
/// The wrapper does not know p. Range checks happen in the field arithmetic,
/// which rejects any representative outside [0, p).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Zeroize,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct FieldElement(u64);

impl FieldElement {
    pub const ZERO: FieldElement = FieldElement(0);

    /// Wrap a raw representative without range checking.
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// The integer representative.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =========================
// BIDDERS
// =========================

/// Opaque bidder identity, unique within one auction run.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct BidderId(String);

impl BidderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BidderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BidderId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for BidderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A bid once its value has been mapped into the field.
#[derive(Clone, Debug, PartialEq, Eq, Zeroize)]
pub struct Bid {
    #[zeroize(skip)]
    pub bidder: BidderId,
    pub value: FieldElement,
}

// =========================
// RUN OPTIONS
// =========================

/// How the shared tie-break seed is derived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakSeedSource {
    /// Every server draws its seed share from the OS CSPRNG.
    #[default]
    Joint,
    /// Seed shares derived from a public seed, for replayable runs.
    Deterministic(u64),
}

/// How much per-server data is attached to the result.
///
/// Every mode other than `Off` discloses more than the winner and the
/// winning bid, so the trail is opt-in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// No audit trail.
    #[default]
    Off,
    /// Per-server local sums, winner-indicator sums and shares of the
    /// winning bid.
    ///
    /// The local sums add up to the sum of all bids, which is disclosed.
    Summary,
    /// Summary plus every server's full share column.
    ///
    /// Anyone holding a full trail can reconstruct every bid.
    Full,
}

// =========================
// RESULTS
// =========================

/// What one server disclosed for the audit display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAudit {
    pub server_index: ServerIndex,
    /// Sum of every share the server held, mod p
    pub local_sum: FieldElement,
    /// The server's share of the winning bid
    pub winner_share: FieldElement,
    /// Sum of the server's winner-indicator shares
    pub winner_indicator_sum: FieldElement,
    /// Full share column (only with [`AuditMode::Full`])
    pub shares: Option<BTreeMap<BidderId, FieldElement>>,
}

/// Per-server share and sum table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub modulus: u64,
    /// Number of winners counted from the shared indicators
    pub winner_count: u32,
    pub servers: Vec<ServerAudit>,
}

/// Public outcome of one auction run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionResult {
    run_id: RunId,
    winner: BidderId,
    max_bid: FieldElement,
    num_bidders: u32,
    num_tied: u32,
    audit: Option<AuditTrail>,
}

impl AuctionResult {
    pub fn new(
        run_id: RunId,
        winner: BidderId,
        max_bid: FieldElement,
        num_bidders: u32,
        num_tied: u32,
        audit: Option<AuditTrail>,
    ) -> Self {
        Self {
            run_id,
            winner,
            max_bid,
            num_bidders,
            num_tied,
            audit,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn winner(&self) -> &BidderId {
        &self.winner
    }

    pub fn max_bid(&self) -> FieldElement {
        self.max_bid
    }

    pub fn num_bidders(&self) -> u32 {
        self.num_bidders
    }

    /// Number of bidders that tied for the maximum (1 if there was no tie).
    pub fn num_tied(&self) -> u32 {
        self.num_tied
    }

    pub fn audit(&self) -> Option<&AuditTrail> {
        self.audit.as_ref()
    }
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Compute the identifier of an auction run.
pub fn compute_run_id<'a>(
    nonce: &[u8; 32],
    server_count: u32,
    bidders: impl IntoIterator<Item = &'a BidderId>,
) -> RunId {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"SECURE_AUCTION_RUN_V1:");
    hasher.update(nonce);
    hasher.update(server_count.to_le_bytes());
    for bidder in bidders {
        let id = bidder.as_str().as_bytes();
        hasher.update((id.len() as u64).to_le_bytes());
        hasher.update(id);
    }
    hasher.finalize().into()
}
