//! Synchronous protocol rounds.
//!
//! A round sends a request to every server and completes only when all of
//! them have answered (a barrier). The whole round runs under a single
//! timeout; if it expires the run fails and no partial value is used.

use std::time::Duration;

use tracing::{debug, warn};

use auction_crypto::Field;
use auction_server::ServerHandle;
use auction_types::protocol::{Contribution, ContributionPayload, RequestKind, RoundRequest};
use auction_types::{FieldElement, RunId, ServerIndex};

use crate::error::AuctionError;

/// Drives rounds against a fixed set of servers.
#[derive(Debug)]
pub struct RoundDriver {
    run_id: RunId,
    servers: Vec<ServerHandle>,
    timeout: Duration,
    next_round: u64,
}

impl RoundDriver {
    /// `servers` must be ordered by index 1..=N.
    pub fn new(run_id: RunId, servers: Vec<ServerHandle>, timeout: Duration) -> Result<Self, AuctionError> {
        for (position, server) in servers.iter().enumerate() {
            let expected = position as ServerIndex + 1;
            if server.index() != expected {
                return Err(AuctionError::InvalidInput(format!(
                    "server at position {} has index {}, expected {}",
                    position,
                    server.index(),
                    expected
                )));
            }
        }
        Ok(Self {
            run_id,
            servers,
            timeout,
            next_round: 0,
        })
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Number of rounds started so far.
    pub fn rounds_started(&self) -> u64 {
        self.next_round
    }

    /// Run one round and return every server's contribution in server order.
    pub async fn run(&mut self, kind: RequestKind) -> Result<Vec<Contribution>, AuctionError> {
        self.run_each(|_| kind.clone()).await
    }

    /// Like [`RoundDriver::run`], but each server gets the request built
    /// for its index. Every request must be of the same kind.
    pub async fn run_each(
        &mut self,
        mut request_for: impl FnMut(ServerIndex) -> RequestKind,
    ) -> Result<Vec<Contribution>, AuctionError> {
        let round = self.next_round;
        self.next_round += 1;

        let requests: Vec<RoundRequest> = self
            .servers
            .iter()
            .map(|server| RoundRequest {
                round,
                kind: request_for(server.index()),
            })
            .collect();
        let label = requests.first().map_or("empty", |r| r.kind.label());
        let run_id = self.run_id;
        let timeout = self.timeout;
        let servers = &self.servers;

        let collect = async {
            let mut pending = Vec::with_capacity(servers.len());
            for (server, request) in servers.iter().zip(requests) {
                let receiver = server.send(request).await.map_err(|e| {
                    AuctionError::IncompleteShares(format!("round {}: {}", round, e))
                })?;
                pending.push((server.index(), receiver));
            }

            let mut contributions = Vec::with_capacity(pending.len());
            for (index, receiver) in pending {
                let reply = receiver.await.map_err(|_| {
                    AuctionError::IncompleteShares(format!(
                        "server {} dropped round {} without answering",
                        index, round
                    ))
                })?;
                let contribution = reply.map_err(|e| {
                    AuctionError::IncompleteShares(format!(
                        "server {} failed round {}: {}",
                        index, round, e
                    ))
                })?;
                if contribution.server_index != index || contribution.round != round {
                    return Err(AuctionError::IncompleteShares(format!(
                        "server {} answered round {} as server {} for round {}",
                        index, round, contribution.server_index, contribution.round
                    )));
                }
                debug!(
                    run_id = hex::encode(run_id),
                    round,
                    server_index = index,
                    payload = contribution.payload.label(),
                    "Accepted contribution"
                );
                contributions.push(contribution);
            }
            Ok::<_, AuctionError>(contributions)
        };

        match tokio::time::timeout(timeout, collect).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    run_id = hex::encode(run_id),
                    round,
                    request = label,
                    timeout_ms = timeout.as_millis() as u64,
                    "Round timed out"
                );
                Err(AuctionError::ProtocolTimeout {
                    round,
                    request: label,
                    timeout,
                })
            }
        }
    }

    /// Stop every server task.
    pub fn shutdown(&mut self) {
        for server in &mut self.servers {
            server.shutdown();
        }
    }
}

/// Pull one value out of every contribution, rejecting unexpected payloads.
pub(crate) fn extract<T>(
    contributions: Vec<Contribution>,
    expected: &'static str,
    f: impl Fn(ContributionPayload) -> Option<T>,
) -> Result<Vec<(ServerIndex, T)>, AuctionError> {
    contributions
        .into_iter()
        .map(|c| {
            let index = c.server_index;
            let round = c.round;
            let label = c.payload.label();
            f(c.payload).map(|value| (index, value)).ok_or_else(|| {
                AuctionError::IncompleteShares(format!(
                    "server {} sent {} in round {}, expected {}",
                    index, label, round, expected
                ))
            })
        })
        .collect()
}

/// Check that every element received belongs to the field.
pub(crate) fn check_elements(
    field: &Field,
    elements: &[(ServerIndex, FieldElement)],
) -> Result<(), AuctionError> {
    for (index, element) in elements {
        if field.check(*element).is_err() {
            return Err(AuctionError::IncompleteShares(format!(
                "server {} sent an element outside the field",
                index
            )));
        }
    }
    Ok(())
}
