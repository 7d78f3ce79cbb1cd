//! Additive (N-of-N) secret sharing over Z_p.
//!
//! A value v is split into N shares s_1..s_N with Σ s_i = v mod p. The first
//! N-1 shares are uniform and independent; the last one closes the sum. Any
//! N-1 shares are therefore uniformly distributed whatever v is, and only all
//! N together determine it.

use std::fmt;

use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use auction_types::FieldElement;

use crate::error::CryptoError;
use crate::field::Field;

/// Minimum number of servers for sharing to hide anything.
pub const MIN_SERVERS: usize = 2;

/// The N shares of one secret, in server order.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ShareSet(Vec<FieldElement>);

impl fmt::Debug for ShareSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareSet")
            .field("len", &self.0.len())
            .field("shares", &"***SENSITIVE***")
            .finish()
    }
}

impl ShareSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Share destined for the server at 0-based position `position`.
    pub fn get(&self, position: usize) -> Option<FieldElement> {
        self.0.get(position).copied()
    }

    pub fn as_slice(&self) -> &[FieldElement] {
        &self.0
    }
}

/// Split `value` into `server_count` additive shares.
pub fn split_secret<R: RngCore + CryptoRng>(
    field: &Field,
    value: FieldElement,
    server_count: usize,
    rng: &mut R,
) -> Result<ShareSet, CryptoError> {
    if server_count < MIN_SERVERS {
        return Err(CryptoError::InvalidInput(format!(
            "server count {} is below the minimum of {}",
            server_count, MIN_SERVERS
        )));
    }
    let value = field.check(value).map_err(|_| {
        CryptoError::InvalidInput(format!(
            "secret {} outside field range [0, {})",
            value,
            field.modulus()
        ))
    })?;

    let mut shares = Vec::with_capacity(server_count);
    for _ in 1..server_count {
        shares.push(field.random(rng));
    }

    // Last share closes the sum: v - Σ s_i
    let partial = field.sum(shares.iter().copied())?;
    shares.push(field.sub(value, partial)?);

    Ok(ShareSet(shares))
}

/// Recombine additive shares: Σ s_i mod p.
pub fn reconstruct_secret(field: &Field, shares: &[FieldElement]) -> Result<FieldElement, CryptoError> {
    if shares.len() < MIN_SERVERS {
        return Err(CryptoError::InvalidInput(format!(
            "need at least {} shares, got {}",
            MIN_SERVERS,
            shares.len()
        )));
    }
    Ok(field.sum(shares.iter().copied())?)
}
