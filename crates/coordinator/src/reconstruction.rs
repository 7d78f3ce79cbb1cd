//! Opening the winning bid, counting winners and assembling the audit trail.

use std::collections::BTreeMap;

use rand::{CryptoRng, RngCore};

use auction_crypto::{reconstruct_secret, split_secret, Field};
use auction_types::protocol::{ContributionPayload, RequestKind};
use auction_types::{AuditMode, AuditTrail, BidderId, FieldElement, ServerAudit, ServerIndex};

use crate::error::AuctionError;
use crate::round::{check_elements, extract, RoundDriver};

/// Ask every server for its share of `winner`.
pub async fn reveal_winner_shares(
    driver: &mut RoundDriver,
    field: &Field,
    winner: &BidderId,
) -> Result<Vec<(ServerIndex, FieldElement)>, AuctionError> {
    let contributions = driver
        .run(RequestKind::RevealShare {
            bidder: winner.clone(),
        })
        .await?;
    let shares = extract(contributions, "share", |payload| match payload {
        ContributionPayload::Share(s) => Some(s),
        _ => None,
    })?;
    check_elements(field, &shares)?;
    Ok(shares)
}

/// Sum the winner's shares into the maximum bid.
///
/// A value above `max_bid` cannot be a dealt bid and fails the run.
pub fn reconstruct_max_bid(
    field: &Field,
    max_bid: u64,
    shares: &[(ServerIndex, FieldElement)],
) -> Result<FieldElement, AuctionError> {
    let elements: Vec<FieldElement> = shares.iter().map(|(_, s)| *s).collect();
    let value = reconstruct_secret(field, &elements)?;
    if value.value() > max_bid {
        return Err(AuctionError::IncompleteShares(format!(
            "reconstructed bid {} exceeds the maximum of {}",
            value, max_bid
        )));
    }
    Ok(value)
}

/// Winner count opened from shared 0/1 indicators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WinnerCount {
    /// Each server's sum of its indicator shares, in server order
    pub server_sums: Vec<(ServerIndex, FieldElement)>,
    pub count: u32,
}

/// Deal a 0/1 winner indicator per bidder and count the winners from the
/// servers' local sums.
///
/// Every bidder in `leaders` gets indicator 1, everyone else 0. The opened
/// count must equal the number of leaders.
pub async fn count_winners<R: RngCore + CryptoRng>(
    driver: &mut RoundDriver,
    field: &Field,
    bidders: &[BidderId],
    leaders: &[BidderId],
    rng: &mut R,
) -> Result<WinnerCount, AuctionError> {
    let one = field.element(1)?;
    let mut columns: Vec<BTreeMap<BidderId, FieldElement>> =
        vec![BTreeMap::new(); driver.server_count()];
    for bidder in bidders {
        let indicator = if leaders.contains(bidder) {
            one
        } else {
            FieldElement::ZERO
        };
        let shares = split_secret(field, indicator, columns.len(), rng)?;
        for (column, share) in columns.iter_mut().zip(shares.as_slice()) {
            column.insert(bidder.clone(), *share);
        }
    }

    let contributions = driver
        .run_each(|index| RequestKind::CountWinners {
            indicators: columns
                .get(index as usize - 1)
                .cloned()
                .unwrap_or_default(),
        })
        .await?;
    let server_sums = extract(contributions, "winner_indicator_sum", |payload| match payload {
        ContributionPayload::WinnerIndicatorSum(s) => Some(s),
        _ => None,
    })?;
    check_elements(field, &server_sums)?;

    let elements: Vec<FieldElement> = server_sums.iter().map(|(_, s)| *s).collect();
    let opened = reconstruct_secret(field, &elements)?;
    if opened.value() != leaders.len() as u64 % field.modulus() {
        return Err(AuctionError::IncompleteShares(format!(
            "winner indicators open to {}, expected {} leaders",
            opened,
            leaders.len()
        )));
    }
    Ok(WinnerCount {
        server_sums,
        count: leaders.len() as u32,
    })
}

/// Run the audit round if `mode` asks for one.
///
/// `winner_shares` must come from [`reveal_winner_shares`] and `winners`
/// from [`count_winners`] on the same servers.
pub async fn collect_audit(
    driver: &mut RoundDriver,
    field: &Field,
    mode: AuditMode,
    winner_shares: &[(ServerIndex, FieldElement)],
    winners: &WinnerCount,
) -> Result<Option<AuditTrail>, AuctionError> {
    let full = match mode {
        AuditMode::Off => return Ok(None),
        AuditMode::Summary => false,
        AuditMode::Full => true,
    };

    let contributions = driver.run(RequestKind::Audit { full }).await?;
    let disclosures = extract(contributions, "audit", |payload| match payload {
        ContributionPayload::Audit { local_sum, shares } => Some((local_sum, shares)),
        _ => None,
    })?;
    if disclosures.len() != winner_shares.len() || disclosures.len() != winners.server_sums.len() {
        return Err(AuctionError::IncompleteShares(format!(
            "{} audit entries for {} servers",
            disclosures.len(),
            winner_shares.len()
        )));
    }

    let mut servers = Vec::with_capacity(disclosures.len());
    for (((index, (local_sum, shares)), (share_index, winner_share)), (sum_index, indicator_sum)) in
        disclosures
            .into_iter()
            .zip(winner_shares)
            .zip(&winners.server_sums)
    {
        if index != *share_index || index != *sum_index {
            return Err(AuctionError::IncompleteShares(format!(
                "audit from server {} paired with data from servers {} and {}",
                index, share_index, sum_index
            )));
        }
        if shares.is_some() != full {
            return Err(AuctionError::IncompleteShares(format!(
                "server {} sent an audit of the wrong kind",
                index
            )));
        }
        check_elements(field, &[(index, local_sum), (index, *winner_share)])?;
        if let Some(column) = &shares {
            for share in column.values() {
                check_elements(field, &[(index, *share)])?;
            }
        }
        servers.push(ServerAudit {
            server_index: index,
            local_sum,
            winner_share: *winner_share,
            winner_indicator_sum: *indicator_sum,
            shares,
        });
    }

    Ok(Some(AuditTrail {
        modulus: field.modulus(),
        winner_count: winners.count,
        servers,
    }))
}
