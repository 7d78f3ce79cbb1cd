//! Auction run configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use auction_crypto::{Field, MIN_SERVERS};
use auction_types::{AuditMode, TieBreakSeedSource};

use crate::comparison::check_modulus;
use crate::error::AuctionError;

/// Options recognized by an auction run.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuctionConfig {
    /// Prime modulus p of the share field
    pub field_modulus: u64,
    /// Largest accepted bid; bids are in [0, max_bid]
    pub max_bid: u64,
    /// Number of non-colluding computation servers
    pub server_count: u32,
    /// How the shared tie-break seed is derived
    pub tie_break_seed: TieBreakSeedSource,
    /// Time allowed for every server to answer one round
    pub round_timeout_ms: u64,
    /// Per-server data attached to the result
    pub audit: AuditMode,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            field_modulus: 13,
            max_bid: 6,
            server_count: 3,
            tie_break_seed: TieBreakSeedSource::Joint,
            round_timeout_ms: 5_000,
            audit: AuditMode::Off,
        }
    }
}

impl AuctionConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading auction config {}", path.display()))?;
        Self::from_json(&data).with_context(|| format!("loading auction config {}", path.display()))
    }

    /// Parse and validate a JSON config.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: AuctionConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the options against each other and return the share field.
    ///
    /// The comparison protocol decodes a revealed difference a - b in
    /// [-max_bid, max_bid] from its representative mod p, which is only
    /// unambiguous when p > 2 * max_bid.
    pub fn validate(&self) -> Result<Field, AuctionError> {
        let field = Field::new(self.field_modulus)?;

        if (self.server_count as usize) < MIN_SERVERS {
            return Err(AuctionError::InvalidInput(format!(
                "server count {} is below the minimum of {}",
                self.server_count, MIN_SERVERS
            )));
        }
        if self.round_timeout_ms == 0 {
            return Err(AuctionError::InvalidInput(
                "round timeout must be positive".into(),
            ));
        }
        check_modulus(&field, self.max_bid)?;

        Ok(field)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_crypto::DomainError;

    #[test]
    fn test_default_is_valid() {
        let config = AuctionConfig::default();
        let field = config.validate().unwrap();
        assert_eq!(field.modulus(), 13);
        assert_eq!(config.round_timeout(), Duration::from_secs(5));
        assert_eq!(config.audit, AuditMode::Off);
    }

    #[test]
    fn test_modulus_too_small() {
        // p = 7 only supports unambiguous comparison of bids up to 3
        let config = AuctionConfig {
            field_modulus: 7,
            max_bid: 6,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(AuctionError::ModulusTooSmall { modulus: 7, max_bid: 6 })
        );

        let config = AuctionConfig {
            field_modulus: 7,
            max_bid: 3,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_prime_modulus() {
        let config = AuctionConfig {
            field_modulus: 15,
            max_bid: 3,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(AuctionError::Domain(DomainError::InvalidModulus(15)))
        );
    }

    #[test]
    fn test_bad_server_count_and_timeout() {
        let config = AuctionConfig {
            server_count: 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AuctionError::InvalidInput(_))));

        let config = AuctionConfig {
            round_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AuctionError::InvalidInput(_))));
    }

    #[test]
    fn test_from_json_partial() {
        let config = AuctionConfig::from_json(
            r#"{ "field_modulus": 11, "max_bid": 5, "tie_break_seed": { "deterministic": 3 }, "audit": "full" }"#,
        )
        .unwrap();

        assert_eq!(config.field_modulus, 11);
        assert_eq!(config.server_count, 3);
        assert_eq!(config.tie_break_seed, TieBreakSeedSource::Deterministic(3));
        assert_eq!(config.audit, AuditMode::Full);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(AuctionConfig::from_json(r#"{ "field_modulus": 7 }"#).is_err());
        assert!(AuctionConfig::from_json(r#"{ "servers": 3 }"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("auction-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "server_count": 5 }"#).unwrap();
        let config = AuctionConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.server_count, 5);

        assert!(AuctionConfig::load(Path::new("/nonexistent/auction.json")).is_err());
    }
}
