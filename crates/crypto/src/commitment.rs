//! Hash commitments for the jointly generated tie-break seed.
//!
//! Each server commits to a random 32-byte seed share before any comparison
//! is revealed and opens it only after the last comparison. The joint seed is
//! the XOR of all openings, so it is uniform as long as one server drew its
//! share honestly, and no server can adapt its share to the others'.

use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use auction_types::ServerIndex;

use crate::error::CryptoError;

/// One server's contribution to the tie-break seed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SeedShare([u8; 32]);

impl std::fmt::Debug for SeedShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SeedShare(***)")
    }
}

impl SeedShare {
    /// Draw a fresh seed share.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derive the share of `server_index` from a public seed.
    ///
    /// Only for replayable runs: anyone knowing the seed knows the outcome
    /// of every tie-break.
    pub fn derive(public_seed: u64, server_index: ServerIndex) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"AUCTION_TIE_BREAK_DERIVE_V1:");
        hasher.update(public_seed.to_le_bytes());
        hasher.update(server_index.to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Commitment binding this share to `server_index`.
    pub fn commit(&self, server_index: ServerIndex) -> [u8; 32] {
        commit_seed_share(server_index, &self.0)
    }
}

/// Compute H(tag || server_index || share).
pub fn commit_seed_share(server_index: ServerIndex, share: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"AUCTION_TIE_BREAK_COMMIT_V1:");
    hasher.update(server_index.to_le_bytes());
    hasher.update(share);
    hasher.finalize().into()
}

/// Check an opened seed share against the commitment published earlier.
pub fn verify_seed_share(
    server_index: ServerIndex,
    share: &[u8; 32],
    commitment: &[u8; 32],
) -> Result<(), CryptoError> {
    if commit_seed_share(server_index, share) != *commitment {
        return Err(CryptoError::CommitmentMismatch(server_index));
    }
    Ok(())
}

/// XOR all opened seed shares into the joint seed.
pub fn combine_seed_shares<'a, I>(shares: I) -> [u8; 32]
where
    I: IntoIterator<Item = &'a [u8; 32]>,
{
    let mut seed = [0u8; 32];
    for share in shares {
        for (acc, byte) in seed.iter_mut().zip(share.iter()) {
            *acc ^= byte;
        }
    }
    seed
}
