//! Computation servers for secret-shared auctions.
//!
//! Each server holds one share per bidder and answers the coordinator's
//! rounds using only those shares:
//!
//! 1. Aggregate: the received column becomes the local contributions
//! 2. Commit to a random tie-break seed share
//! 3. For each comparison, publish share(A) - share(B) mod p
//! 4. Open the seed share once all comparisons are done
//! 5. Publish the share of the winning bidder for reconstruction
//! 6. With an audit, sum the winner-indicator shares the coordinator dealt
//!
//! # Security
//!
//! - Additive N-of-N sharing: privacy holds unless all N servers collude
//! - Honest-but-curious servers; no protection against active cheating
//! - Server state is wiped when the server stops

pub mod server;
pub mod state;
pub mod task;
pub mod types;

pub use server::ComputationServer;
pub use state::ServerState;
pub use task::{ServerHandle, ServerMessage, ServerReply};
pub use types::{ServerConfig, ServerError};
