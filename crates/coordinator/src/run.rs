//! One auction run from dealing to the public result.

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{info, warn};

use auction_crypto::Field;
use auction_dealer::{BidBook, Dealer};
use auction_server::{ComputationServer, ServerConfig, ServerHandle};
use auction_types::protocol::{ContributionPayload, RequestKind};
use auction_types::{compute_run_id, AuctionResult, AuditMode, BidderId, RunId};

use crate::comparison::find_leaders;
use crate::config::AuctionConfig;
use crate::error::AuctionError;
use crate::reconstruction::{collect_audit, count_winners, reconstruct_max_bid, reveal_winner_shares};
use crate::round::{extract, RoundDriver};
use crate::tie_break::{draw_winner, TieBreak};

/// An auction run owning its servers.
///
/// Dropping the run (or calling [`AuctionRun::abort`]) stops every server
/// task and wipes the server state.
#[derive(Debug)]
pub struct AuctionRun {
    run_id: RunId,
    config: AuctionConfig,
    field: Field,
    bidders: Vec<BidderId>,
    driver: RoundDriver,
}

impl AuctionRun {
    /// Validate `config`, deal `book` and spawn one task per server.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &AuctionConfig, book: BidBook) -> Result<Self, AuctionError> {
        let field = config.validate()?;
        let dealer = Dealer::new(field, config.server_count as usize, config.max_bid)?;
        let bidders: Vec<BidderId> = book.bidders().cloned().collect();

        let columns = dealer.deal(book, &mut OsRng)?;
        let mut handles = Vec::with_capacity(columns.len());
        for column in columns {
            let server_config = ServerConfig::new(
                column.server_index(),
                config.server_count,
                field,
                config.tie_break_seed,
            )?;
            handles.push(ServerHandle::spawn(ComputationServer::new(server_config, column)?));
        }

        Self::assemble(config.clone(), field, bidders, handles)
    }

    /// Build a run over servers that already hold their share columns.
    ///
    /// `handles` must be ordered by server index and may be bridged to
    /// remote servers via [`ServerHandle::connect`].
    pub fn with_servers(
        config: &AuctionConfig,
        bidders: impl IntoIterator<Item = BidderId>,
        handles: Vec<ServerHandle>,
    ) -> Result<Self, AuctionError> {
        let field = config.validate()?;
        if handles.len() != config.server_count as usize {
            return Err(AuctionError::InvalidInput(format!(
                "{} servers configured, {} supplied",
                config.server_count,
                handles.len()
            )));
        }

        let mut bidders: Vec<BidderId> = bidders.into_iter().collect();
        bidders.sort();
        let count = bidders.len();
        bidders.dedup();
        if bidders.len() != count {
            return Err(AuctionError::InvalidInput("duplicate bidder id".into()));
        }
        if bidders.is_empty() {
            return Err(AuctionError::InvalidInput("no bidders".into()));
        }

        Self::assemble(config.clone(), field, bidders, handles)
    }

    fn assemble(
        config: AuctionConfig,
        field: Field,
        bidders: Vec<BidderId>,
        handles: Vec<ServerHandle>,
    ) -> Result<Self, AuctionError> {
        let mut nonce = [0u8; 32];
        OsRng.fill_bytes(&mut nonce);
        let run_id = compute_run_id(&nonce, config.server_count, &bidders);
        let driver = RoundDriver::new(run_id, handles, config.round_timeout())?;

        info!(
            run_id = hex::encode(run_id),
            bidders = bidders.len(),
            servers = config.server_count,
            modulus = field.modulus(),
            "Started auction run"
        );

        Ok(Self {
            run_id,
            config,
            field,
            bidders,
            driver,
        })
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Bidders in comparison order.
    pub fn bidders(&self) -> &[BidderId] {
        &self.bidders
    }

    /// Stop the run without a result.
    pub fn abort(mut self) {
        self.driver.shutdown();
        warn!(run_id = hex::encode(self.run_id), "Auction run aborted");
    }

    /// Run every protocol round and produce the public result.
    ///
    /// The servers are stopped when this returns, whether or not the run
    /// succeeded.
    pub async fn execute(mut self) -> Result<AuctionResult, AuctionError> {
        let result = self.rounds().await;
        self.driver.shutdown();

        match &result {
            Ok(outcome) => info!(
                run_id = hex::encode(self.run_id),
                winner = %outcome.winner(),
                max_bid = outcome.max_bid().value(),
                tied = outcome.num_tied(),
                rounds = self.driver.rounds_started(),
                "Auction run finished"
            ),
            Err(e) => warn!(
                run_id = hex::encode(self.run_id),
                rounds = self.driver.rounds_started(),
                error = %e,
                "Auction run failed"
            ),
        }
        result
    }

    async fn rounds(&mut self) -> Result<AuctionResult, AuctionError> {
        let expected = self.bidders.len();
        let max_bid = self.config.max_bid;

        let contributions = self.driver.run(RequestKind::Aggregate).await?;
        let counts = extract(contributions, "aggregated", |payload| match payload {
            ContributionPayload::Aggregated { bidders } => Some(bidders),
            _ => None,
        })?;
        for (index, count) in counts {
            if count as usize != expected {
                return Err(AuctionError::IncompleteShares(format!(
                    "server {} holds shares for {} bidders, expected {}",
                    index, count, expected
                )));
            }
        }

        let tie_break = TieBreak::commit(&mut self.driver).await?;
        let leaders = find_leaders(&mut self.driver, &self.field, max_bid, &self.bidders).await?;
        info!(
            run_id = hex::encode(self.run_id),
            leaders = leaders.len(),
            "Comparisons finished"
        );

        let seed = tie_break.reveal(&mut self.driver).await?;
        let winner = draw_winner(seed, &leaders)
            .cloned()
            .ok_or_else(|| AuctionError::IncompleteShares("no leader after comparisons".into()))?;

        let winner_shares = reveal_winner_shares(&mut self.driver, &self.field, &winner).await?;
        let max = reconstruct_max_bid(&self.field, max_bid, &winner_shares)?;
        let audit = match self.config.audit {
            AuditMode::Off => None,
            mode => {
                let winners = count_winners(
                    &mut self.driver,
                    &self.field,
                    &self.bidders,
                    &leaders,
                    &mut OsRng,
                )
                .await?;
                collect_audit(&mut self.driver, &self.field, mode, &winner_shares, &winners).await?
            }
        };

        Ok(AuctionResult::new(
            self.run_id,
            winner,
            max,
            expected as u32,
            leaders.len() as u32,
            audit,
        ))
    }
}

/// Run a complete auction over `book` with freshly spawned servers.
pub async fn run_auction(config: &AuctionConfig, book: BidBook) -> Result<AuctionResult, AuctionError> {
    AuctionRun::start(config, book)?.execute().await
}
