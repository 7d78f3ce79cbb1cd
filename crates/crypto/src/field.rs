//! Arithmetic in the prime field Z_p.
//!
//! All operations take and return [`FieldElement`]s and re-check that every
//! input lies in [0, p), so a representative built for another modulus (or
//! deserialized from an untrusted peer) is rejected instead of wrapped.

use rand::{CryptoRng, Rng, RngCore};

use auction_types::FieldElement;

use crate::error::DomainError;

/// A prime field, identified by its modulus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    modulus: u64,
}

impl Field {
    /// Create the field Z_p. Fails unless `modulus` is a prime >= 2.
    pub fn new(modulus: u64) -> Result<Self, DomainError> {
        if !primal::is_prime(modulus) {
            return Err(DomainError::InvalidModulus(modulus));
        }
        Ok(Self { modulus })
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Map an integer into the field, rejecting anything outside [0, p).
    pub fn element(&self, value: u64) -> Result<FieldElement, DomainError> {
        self.check(FieldElement::from_raw(value))
    }

    /// Check that a representative belongs to this field.
    pub fn check(&self, element: FieldElement) -> Result<FieldElement, DomainError> {
        if element.value() >= self.modulus {
            return Err(DomainError::OutOfRange {
                value: element.value(),
                modulus: self.modulus,
            });
        }
        Ok(element)
    }

    /// (a + b) mod p
    pub fn add(&self, a: FieldElement, b: FieldElement) -> Result<FieldElement, DomainError> {
        let a = self.check(a)?.value() as u128;
        let b = self.check(b)?.value() as u128;
        Ok(self.reduce(a + b))
    }

    /// (a - b) mod p
    pub fn sub(&self, a: FieldElement, b: FieldElement) -> Result<FieldElement, DomainError> {
        let a = self.check(a)?.value() as u128;
        let b = self.check(b)?.value() as u128;
        Ok(self.reduce(a + self.modulus as u128 - b))
    }

    /// (-a) mod p
    pub fn neg(&self, a: FieldElement) -> Result<FieldElement, DomainError> {
        self.sub(FieldElement::ZERO, a)
    }

    /// Sum of all elements mod p. The empty sum is zero.
    pub fn sum<I>(&self, elements: I) -> Result<FieldElement, DomainError>
    where
        I: IntoIterator<Item = FieldElement>,
    {
        elements
            .into_iter()
            .try_fold(FieldElement::ZERO, |acc, e| self.add(acc, e))
    }

    /// Draw a uniformly random element.
    pub fn random<R: RngCore + CryptoRng>(&self, rng: &mut R) -> FieldElement {
        FieldElement::from_raw(rng.gen_range(0..self.modulus))
    }

    /// Signed value of a representative.
    ///
    /// Representatives up to (p - 1) / 2 are non-negative; the rest stand for
    /// `value - p`.
    pub fn signed(&self, element: FieldElement) -> Result<i128, DomainError> {
        let value = self.check(element)?.value();
        if value <= (self.modulus - 1) / 2 {
            Ok(value as i128)
        } else {
            Ok(value as i128 - self.modulus as i128)
        }
    }

    fn reduce(&self, value: u128) -> FieldElement {
        FieldElement::from_raw((value % self.modulus as u128) as u64)
    }
}
