//! End-to-end integration tests for the secret-shared auction.
//!
//! These tests exercise the full auction lifecycle:
//! 1. Dealing bids as additive shares
//! 2. Server aggregation and seed commitments
//! 3. Secure comparison tournament
//! 4. Joint tie-break
//! 5. Reconstruction of the winning bid, the winner count and the audit trail

#![cfg(test)]

use std::collections::{BTreeMap, HashMap};

use rand::rngs::OsRng;
use rand::Rng;
use tracing_subscriber::EnvFilter;

use auction_coordinator::{run_auction, AuctionConfig, AuctionError, AuctionRun};
use auction_crypto::{commit_seed_share, DomainError, Field};
use auction_dealer::{BidBook, Dealer};
use auction_server::{ComputationServer, ServerConfig, ServerHandle, ServerMessage};
use auction_types::protocol::{Contribution, ContributionPayload, RequestKind};
use auction_types::{AuditMode, BidderId, FieldElement, ServerIndex, TieBreakSeedSource};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn small_config() -> AuctionConfig {
    AuctionConfig {
        field_modulus: 11,
        max_bid: 5,
        server_count: 3,
        ..Default::default()
    }
}

fn book(bids: &[(&str, u64)]) -> BidBook {
    let mut book = BidBook::new();
    for (bidder, value) in bids {
        book.insert(*bidder, *value).unwrap();
    }
    book
}

/// Deal `bids` and spawn real servers for the indices in `honest`.
fn spawn_honest(
    config: &AuctionConfig,
    bids: &[(&str, u64)],
    honest: &[ServerIndex],
) -> BTreeMap<ServerIndex, ServerHandle> {
    let field = Field::new(config.field_modulus).unwrap();
    let dealer = Dealer::new(field, config.server_count as usize, config.max_bid).unwrap();
    dealer
        .deal(book(bids), &mut OsRng)
        .unwrap()
        .into_iter()
        .filter(|column| honest.contains(&column.server_index()))
        .map(|column| {
            let index = column.server_index();
            let server_config =
                ServerConfig::new(index, config.server_count, field, config.tie_break_seed)
                    .unwrap();
            let server = ComputationServer::new(server_config, column).unwrap();
            (index, ServerHandle::spawn(server))
        })
        .collect()
}

/// A server that answers every round itself, using `compare` for differences.
fn spawn_scripted(
    index: ServerIndex,
    bidders: u32,
    compare: FieldElement,
) -> ServerHandle {
    let (handle, mut receiver) = ServerHandle::connect(index);
    tokio::spawn(async move {
        let seed_share = [index as u8; 32];
        while let Some(ServerMessage { request, reply }) = receiver.recv().await {
            let payload = match request.kind {
                RequestKind::Aggregate => ContributionPayload::Aggregated { bidders },
                RequestKind::CommitSeed => {
                    ContributionPayload::SeedCommitment(commit_seed_share(index, &seed_share))
                }
                RequestKind::Compare { .. } => ContributionPayload::Difference(compare),
                RequestKind::RevealSeed => ContributionPayload::SeedShare(seed_share),
                RequestKind::RevealShare { .. } => ContributionPayload::Share(FieldElement::ZERO),
                RequestKind::CountWinners { .. } => {
                    ContributionPayload::WinnerIndicatorSum(FieldElement::ZERO)
                }
                RequestKind::Audit { .. } => ContributionPayload::Audit {
                    local_sum: FieldElement::ZERO,
                    shares: None,
                },
            };
            let _ = reply.send(Ok(Contribution {
                server_index: index,
                round: request.round,
                payload,
            }));
        }
    });
    handle
}

// ========================================
// Outcomes
// ========================================

/// {Alice: 5, Bob: 3, Carol: 5}: the tie is split near-evenly, Bob never wins.
#[tokio::test]
async fn test_tied_auction_is_fair() {
    init_tracing();
    let config = AuctionConfig {
        audit: AuditMode::Off,
        ..small_config()
    };
    let bids = [("alice", 5), ("bob", 3), ("carol", 5)];

    let mut wins: HashMap<String, usize> = HashMap::new();
    let runs = 400;
    for _ in 0..runs {
        let result = run_auction(&config, book(&bids)).await.unwrap();
        assert_eq!(result.max_bid().value(), 5);
        assert_eq!(result.num_bidders(), 3);
        assert_eq!(result.num_tied(), 2);
        *wins.entry(result.winner().to_string()).or_default() += 1;
    }

    println!("Tie-break wins over {} runs: {:?}", runs, wins);
    assert_eq!(wins.get("bob"), None);
    let alice = wins.get("alice").copied().unwrap_or(0);
    let carol = wins.get("carol").copied().unwrap_or(0);
    assert_eq!(alice + carol, runs);
    // Expected 200 each; the bound is about six standard deviations
    assert!((140..=260).contains(&alice), "alice won {} of {}", alice, runs);
}

/// {Dave: 4} with two servers: Dave wins with 4, recoverable from both shares.
#[tokio::test]
async fn test_single_bidder_two_servers() {
    init_tracing();
    let config = AuctionConfig {
        server_count: 2,
        audit: AuditMode::Full,
        ..small_config()
    };
    let result = run_auction(&config, book(&[("dave", 4)])).await.unwrap();

    assert_eq!(result.winner().as_str(), "dave");
    assert_eq!(result.max_bid().value(), 4);
    assert_eq!(result.num_tied(), 1);

    let audit = result.audit().unwrap();
    assert_eq!(audit.servers.len(), 2);
    let field = Field::new(audit.modulus).unwrap();
    let total = field
        .sum(audit.servers.iter().map(|s| s.winner_share))
        .unwrap();
    assert_eq!(total.value(), 4);
}

/// Every pair of distinct bids is ordered correctly.
#[tokio::test]
async fn test_comparison_picks_larger_bid() {
    init_tracing();
    let config = AuctionConfig {
        audit: AuditMode::Off,
        ..AuctionConfig::default()
    };
    for a in 0..=config.max_bid {
        for b in 0..=config.max_bid {
            if a == b {
                continue;
            }
            let result = run_auction(&config, book(&[("left", a), ("right", b)]))
                .await
                .unwrap();
            let expected = if a > b { "left" } else { "right" };
            assert_eq!(result.winner().as_str(), expected, "{} vs {}", a, b);
            assert_eq!(result.max_bid().value(), a.max(b));
        }
    }
}

/// The full audit trail reconstructs every bid and the total.
#[tokio::test]
async fn test_full_audit_round_trip() {
    init_tracing();
    let config = AuctionConfig {
        server_count: 5,
        audit: AuditMode::Full,
        ..AuctionConfig::default()
    };
    let mut rng = OsRng;
    let bids: Vec<(String, u64)> = (0..8)
        .map(|i| (format!("bidder-{}", i), rng.gen_range(0..=config.max_bid)))
        .collect();
    let named: Vec<(&str, u64)> = bids.iter().map(|(n, v)| (n.as_str(), *v)).collect();

    let result = run_auction(&config, book(&named)).await.unwrap();
    let audit = result.audit().unwrap();
    let field = Field::new(audit.modulus).unwrap();

    for (bidder, value) in &bids {
        let id = BidderId::from(bidder.as_str());
        let shares = audit
            .servers
            .iter()
            .map(|s| s.shares.as_ref().unwrap()[&id]);
        assert_eq!(field.sum(shares).unwrap().value(), *value, "{}", bidder);
    }

    let total: u64 = bids.iter().map(|(_, v)| v).sum();
    let sums = field.sum(audit.servers.iter().map(|s| s.local_sum)).unwrap();
    assert_eq!(sums.value(), total % config.field_modulus);

    let highest = bids.iter().map(|(_, v)| *v).max().unwrap();
    assert_eq!(result.max_bid().value(), highest);
}

/// The shared winner indicators open to the number of tied leaders.
#[tokio::test]
async fn test_audit_counts_tied_winners() {
    init_tracing();
    let config = AuctionConfig {
        audit: AuditMode::Summary,
        ..small_config()
    };
    let result = run_auction(&config, book(&[("alice", 5), ("bob", 3), ("carol", 5)]))
        .await
        .unwrap();

    let audit = result.audit().unwrap();
    assert_eq!(audit.winner_count, result.num_tied());
    assert_eq!(audit.winner_count, 2);
    let field = Field::new(audit.modulus).unwrap();
    let opened = field
        .sum(audit.servers.iter().map(|s| s.winner_indicator_sum))
        .unwrap();
    assert_eq!(opened.value(), 2);
}

/// A public seed makes the tie-break replayable.
#[tokio::test]
async fn test_deterministic_seed_is_reproducible() {
    init_tracing();
    let bids = [("alice", 5), ("bob", 3), ("carol", 5)];
    let config = |seed| AuctionConfig {
        tie_break_seed: TieBreakSeedSource::Deterministic(seed),
        audit: AuditMode::Off,
        ..small_config()
    };

    let first = run_auction(&config(7), book(&bids)).await.unwrap();
    for _ in 0..10 {
        let again = run_auction(&config(7), book(&bids)).await.unwrap();
        assert_eq!(again.winner(), first.winner());
        assert_ne!(again.run_id(), first.run_id());
    }

    let mut winners = std::collections::BTreeSet::new();
    for seed in 0..64 {
        let result = run_auction(&config(seed), book(&bids)).await.unwrap();
        winners.insert(result.winner().to_string());
    }
    assert_eq!(winners.len(), 2);
    assert!(!winners.contains("bob"));
}

#[tokio::test]
async fn test_config_file_drives_run() {
    init_tracing();
    let config = AuctionConfig::from_json(
        r#"{ "field_modulus": 11, "max_bid": 5, "server_count": 4, "audit": "off" }"#,
    )
    .unwrap();
    let result = run_auction(&config, book(&[("alice", 1), ("bob", 5)])).await.unwrap();
    assert_eq!(result.winner().as_str(), "bob");
    assert!(result.audit().is_none());
}

// ========================================
// Failures
// ========================================

#[tokio::test]
async fn test_modulus_must_exceed_twice_max_bid() {
    let config = AuctionConfig {
        field_modulus: 7,
        max_bid: 6,
        ..AuctionConfig::default()
    };
    let result = run_auction(&config, book(&[("alice", 1)])).await;
    assert_eq!(
        result.unwrap_err(),
        AuctionError::ModulusTooSmall { modulus: 7, max_bid: 6 }
    );
}

#[tokio::test]
async fn test_non_prime_modulus() {
    let config = AuctionConfig {
        field_modulus: 21,
        max_bid: 5,
        ..AuctionConfig::default()
    };
    let result = run_auction(&config, book(&[("alice", 1)])).await;
    assert_eq!(
        result.unwrap_err(),
        AuctionError::Domain(DomainError::InvalidModulus(21))
    );
}

#[tokio::test]
async fn test_out_of_range_bid() {
    let result = run_auction(&small_config(), book(&[("alice", 6)])).await;
    assert!(matches!(result, Err(AuctionError::InvalidInput(_))));
}

/// A server that never answers fails the run with a timeout.
#[tokio::test]
async fn test_silent_server_times_out() {
    init_tracing();
    let config = AuctionConfig {
        round_timeout_ms: 100,
        ..small_config()
    };
    let bids = [("alice", 2), ("bob", 4)];
    let mut handles = spawn_honest(&config, &bids, &[1, 2]);
    let (silent, _requests) = ServerHandle::connect(3);
    handles.insert(3, silent);

    let run = AuctionRun::with_servers(
        &config,
        bids.iter().map(|(b, _)| BidderId::from(*b)),
        handles.into_values().collect(),
    )
    .unwrap();
    let result = run.execute().await;

    assert!(matches!(
        result,
        Err(AuctionError::ProtocolTimeout { round: 0, request: "aggregate", .. })
    ));
}

/// An out-of-range difference aborts the run instead of being decoded.
#[tokio::test]
async fn test_malformed_difference_is_rejected() {
    init_tracing();
    let config = small_config();
    let bids = [("alice", 2), ("bob", 4)];
    let mut handles = spawn_honest(&config, &bids, &[1, 2]);
    let tampered = FieldElement::from_raw(config.field_modulus + 3);
    handles.insert(3, spawn_scripted(3, 2, tampered));

    let run = AuctionRun::with_servers(
        &config,
        bids.iter().map(|(b, _)| BidderId::from(*b)),
        handles.into_values().collect(),
    )
    .unwrap();

    match run.execute().await {
        Err(AuctionError::IncompleteShares(msg)) => assert!(msg.contains("server 3"), "{}", msg),
        other => panic!("unexpected outcome {:?}", other),
    }
}

/// A server disconnecting mid-run fails the run.
#[tokio::test]
async fn test_disconnected_server_is_incomplete() {
    init_tracing();
    let config = small_config();
    let bids = [("alice", 2), ("bob", 4)];
    let mut handles = spawn_honest(&config, &bids, &[1, 2]);
    let (gone, requests) = ServerHandle::connect(3);
    drop(requests);
    handles.insert(3, gone);

    let run = AuctionRun::with_servers(
        &config,
        bids.iter().map(|(b, _)| BidderId::from(*b)),
        handles.into_values().collect(),
    )
    .unwrap();

    assert!(matches!(
        run.execute().await,
        Err(AuctionError::IncompleteShares(_))
    ));
}

/// Aborting a run closes every server's request channel.
#[tokio::test]
async fn test_abort_stops_servers() {
    let config = small_config();
    let mut receivers = Vec::new();
    let mut handles = Vec::new();
    for index in 1..=config.server_count {
        let (handle, receiver) = ServerHandle::connect(index);
        handles.push(handle);
        receivers.push(receiver);
    }
    let run = AuctionRun::with_servers(
        &config,
        [BidderId::from("alice"), BidderId::from("bob")],
        handles,
    )
    .unwrap();
    assert_eq!(run.bidders().len(), 2);

    run.abort();
    for receiver in &mut receivers {
        assert!(receiver.recv().await.is_none());
    }
}

/// Cancelling a run while a round is in flight stops its servers.
#[tokio::test]
async fn test_cancel_mid_round_stops_servers() {
    init_tracing();
    let config = small_config();
    let bids = [("alice", 2), ("bob", 4)];
    let mut handles = spawn_honest(&config, &bids, &[1, 2]);
    let (stalled, mut requests) = ServerHandle::connect(3);
    handles.insert(3, stalled);

    let run = AuctionRun::with_servers(
        &config,
        bids.iter().map(|(b, _)| BidderId::from(*b)),
        handles.into_values().collect(),
    )
    .unwrap();
    let task = tokio::spawn(run.execute());

    // The aggregate round is now waiting on server 3
    let pending = requests.recv().await.unwrap();
    assert_eq!(pending.request.kind, RequestKind::Aggregate);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(requests.recv().await.is_none());
    assert!(pending.reply.is_closed());
}
