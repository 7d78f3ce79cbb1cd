//! Secret-sharing primitives for sealed-bid auctions.
//!
//! # Overview
//!
//! 1. **Field arithmetic**: every value lives in Z_p for a public prime p.
//!
//! 2. **Sharing**: a bid v is split into N additive shares with
//!    Σ s_i = v mod p. Up to N-1 shares reveal nothing about v.
//!
//! 3. **Linear operations**: servers add and subtract shares locally; the
//!    result is a sharing of the sum or difference of the secrets.
//!
//! 4. **Seed commitments**: servers commit to tie-break seed shares before
//!    the comparisons start and open them afterwards.

pub mod commitment;
pub mod error;
pub mod field;
pub mod sharing;

pub use commitment::{combine_seed_shares, commit_seed_share, verify_seed_share, SeedShare};
pub use error::{CryptoError, DomainError};
pub use field::Field;
pub use sharing::{reconstruct_secret, split_secret, ShareSet, MIN_SERVERS};
