//! Auction Coordinator
//!
//! Drives a sealed-bid auction across secret-sharing computation servers:
//! 1. Deal every bid as additive shares, one column per server
//! 2. Have each server aggregate its column and commit to a tie-break seed share
//! 3. Fold over the bidders, revealing each pairwise difference to the coordinator
//! 4. Open the seed shares and draw the winner among tied leaders
//! 5. Reconstruct the winning bid from the servers' shares of that bidder
//! 6. Optionally count the winners from shared indicators and attach an audit trail
//!
//! # What each party learns
//!
//! - A server sees one uniformly random share per bidder and nothing else
//!   until the winner's shares are opened.
//! - The coordinator learns the signed difference of every compared pair.
//!   Together with the published winning bid this determines every bid, so
//!   the coordinator must be trusted not to combine them.
//! - The public result carries the winner, the winning bid and the number
//!   of tied leaders, plus whatever the configured audit mode discloses.
//!
//! ```no_run
//! # async fn demo() -> Result<(), auction_coordinator::AuctionError> {
//! use auction_coordinator::{run_auction, AuctionConfig};
//! use auction_dealer::BidBook;
//!
//! let book = BidBook::new().with_bid("alice", 5)?.with_bid("bob", 3)?;
//! let result = run_auction(&AuctionConfig::default(), book).await?;
//! println!("{} wins with {}", result.winner(), result.max_bid());
//! # Ok(())
//! # }
//! ```

pub mod comparison;
pub mod config;
pub mod error;
pub mod reconstruction;
pub mod round;
pub mod run;
pub mod tie_break;

#[cfg(test)]
mod testing;

pub use comparison::{check_modulus, decode_difference, signed_difference, Leaderboard};
pub use config::AuctionConfig;
pub use error::AuctionError;
pub use round::RoundDriver;
pub use run::{run_auction, AuctionRun};
pub use tie_break::{draw_winner, TieBreak};
