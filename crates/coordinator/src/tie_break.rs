//! Jointly random tie-break.
//!
//! Servers commit to their seed shares before the first comparison and open
//! them after the last one, so the seed is fixed before anyone learns
//! whether there is a tie or who is in it.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use auction_crypto::{combine_seed_shares, verify_seed_share};
use auction_types::protocol::{ContributionPayload, RequestKind};
use auction_types::{BidderId, ServerIndex};

use crate::error::AuctionError;
use crate::round::{extract, RoundDriver};

/// Seed commitments collected before the comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieBreak {
    commitments: Vec<(ServerIndex, [u8; 32])>,
}

impl TieBreak {
    /// Run the commitment round.
    pub async fn commit(driver: &mut RoundDriver) -> Result<Self, AuctionError> {
        let contributions = driver.run(RequestKind::CommitSeed).await?;
        let commitments = extract(contributions, "seed_commitment", |payload| match payload {
            ContributionPayload::SeedCommitment(c) => Some(c),
            _ => None,
        })?;
        Ok(Self { commitments })
    }

    pub fn commitments(&self) -> &[(ServerIndex, [u8; 32])] {
        &self.commitments
    }

    /// Run the reveal round, check every opening and return the joint seed.
    pub async fn reveal(&self, driver: &mut RoundDriver) -> Result<[u8; 32], AuctionError> {
        let contributions = driver.run(RequestKind::RevealSeed).await?;
        let shares = extract(contributions, "seed_share", |payload| match payload {
            ContributionPayload::SeedShare(s) => Some(s),
            _ => None,
        })?;
        self.open(&shares)
    }

    /// Verify openings against the commitments and combine them.
    pub fn open(&self, shares: &[(ServerIndex, [u8; 32])]) -> Result<[u8; 32], AuctionError> {
        if shares.len() != self.commitments.len() {
            return Err(AuctionError::IncompleteShares(format!(
                "{} seed shares opened for {} commitments",
                shares.len(),
                self.commitments.len()
            )));
        }
        for ((index, share), (committed_index, commitment)) in shares.iter().zip(&self.commitments) {
            if index != committed_index {
                return Err(AuctionError::IncompleteShares(format!(
                    "seed share from server {} where server {} committed",
                    index, committed_index
                )));
            }
            verify_seed_share(*index, share, commitment)?;
        }
        debug!(servers = shares.len(), "Seed shares verified");
        Ok(combine_seed_shares(shares.iter().map(|(_, share)| share)))
    }
}

/// Pick the winner among `leaders` using the joint seed.
///
/// A single leader wins without a draw. Returns `None` if `leaders` is empty.
pub fn draw_winner(seed: [u8; 32], leaders: &[BidderId]) -> Option<&BidderId> {
    match leaders {
        [] => None,
        [only] => Some(only),
        _ => {
            let mut rng = ChaCha20Rng::from_seed(seed);
            leaders.get(rng.gen_range(0..leaders.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_crypto::{commit_seed_share, Field};
    use auction_types::TieBreakSeedSource;
    use rand::rngs::OsRng;
    use rand::RngCore;

    use crate::testing::spawn_driver;

    fn tie_break(shares: &[[u8; 32]]) -> TieBreak {
        TieBreak {
            commitments: shares
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let index = i as ServerIndex + 1;
                    (index, commit_seed_share(index, s))
                })
                .collect(),
        }
    }

    #[test]
    fn test_open_combines_verified_shares() {
        let shares = [[1u8; 32], [2u8; 32], [4u8; 32]];
        let tb = tie_break(&shares);
        let opened: Vec<_> = shares.iter().enumerate().map(|(i, s)| (i as u32 + 1, *s)).collect();
        assert_eq!(tb.open(&opened).unwrap(), [7u8; 32]);
    }

    #[test]
    fn test_open_rejects_changed_share() {
        let shares = [[1u8; 32], [2u8; 32]];
        let tb = tie_break(&shares);
        let opened = vec![(1, [1u8; 32]), (2, [3u8; 32])];
        assert!(matches!(
            tb.open(&opened),
            Err(AuctionError::IncompleteShares(msg)) if msg.contains("server 2")
        ));

        let missing = vec![(1, [1u8; 32])];
        assert!(matches!(tb.open(&missing), Err(AuctionError::IncompleteShares(_))));
    }

    #[test]
    fn test_draw_winner() {
        let leaders = vec![BidderId::from("alice"), BidderId::from("carol")];
        assert_eq!(draw_winner([0u8; 32], &[]), None);
        assert_eq!(
            draw_winner([9u8; 32], &leaders[..1]),
            Some(&BidderId::from("alice"))
        );
        // Same seed, same winner
        assert_eq!(draw_winner([3u8; 32], &leaders), draw_winner([3u8; 32], &leaders));
    }

    #[test]
    fn test_draw_is_near_uniform() {
        let leaders = vec![
            BidderId::from("a"),
            BidderId::from("b"),
            BidderId::from("c"),
        ];
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            let mut seed = [0u8; 32];
            OsRng.fill_bytes(&mut seed);
            let winner = draw_winner(seed, &leaders).unwrap();
            let position = leaders.iter().position(|l| l == winner).unwrap();
            counts[position] += 1;
        }
        for count in counts {
            assert!((800..=1200).contains(&count), "counts {:?}", counts);
        }
    }

    #[tokio::test]
    async fn test_commit_then_reveal_round() {
        let field = Field::new(11).unwrap();
        let mut driver = spawn_driver(
            field,
            5,
            3,
            TieBreakSeedSource::Deterministic(42),
            &[("alice", 1)],
        );
        driver.run(RequestKind::Aggregate).await.unwrap();

        let tb = TieBreak::commit(&mut driver).await.unwrap();
        assert_eq!(tb.commitments().len(), 3);
        let seed = tb.reveal(&mut driver).await.unwrap();

        let mut other = spawn_driver(
            field,
            5,
            3,
            TieBreakSeedSource::Deterministic(42),
            &[("bob", 4)],
        );
        other.run(RequestKind::Aggregate).await.unwrap();
        let tb = TieBreak::commit(&mut other).await.unwrap();
        assert_eq!(tb.reveal(&mut other).await.unwrap(), seed);
    }
}
