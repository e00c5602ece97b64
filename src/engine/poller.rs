use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::engine::snapshot::MarketSnapshot;

/// Anything that can return raw account data for a list of addresses, in
/// order, with `None` for accounts that do not exist.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn fetch_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>>;
}

/// Accounts a snapshot is built from.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTargets {
    pub reserves: Vec<(String, Pubkey)>,
    pub obligation: Option<Pubkey>,
}

impl SnapshotTargets {
    fn addresses(&self) -> Vec<Pubkey> {
        self.reserves
            .iter()
            .map(|(_, address)| *address)
            .chain(self.obligation)
            .collect()
    }
}

/// One round trip: fetch every target account in a single batch and decode.
pub async fn fetch_snapshot(source: &dyn AccountSource, targets: &SnapshotTargets) -> Result<MarketSnapshot> {
    let addresses = targets.addresses();
    let mut data = source
        .fetch_accounts(&addresses)
        .await
        .context("Failed to fetch market accounts")?;

    if data.len() != addresses.len() {
        return Err(anyhow::anyhow!(
            "Account source returned {} accounts for {} addresses",
            data.len(),
            addresses.len()
        ));
    }

    let obligation_data = match targets.obligation {
        Some(_) => data.pop().flatten(),
        None => None,
    };
    let obligation = targets
        .obligation
        .map(|address| (address, obligation_data.as_deref()));

    MarketSnapshot::build(&targets.reserves, &data, obligation).context("Failed to build market snapshot")
}

/// Publishes a fresh snapshot every `poll_interval` until `cancel` fires or
/// every receiver is dropped. Errors back off exponentially; after
/// `max_consecutive_errors` in a row the poller gives up.
pub async fn run_snapshot_poller(
    source: Arc<dyn AccountSource>,
    targets: SnapshotTargets,
    poll_interval: Duration,
    max_consecutive_errors: u32,
    tx: watch::Sender<Option<Arc<MarketSnapshot>>>,
    cancel: CancellationToken,
) -> Result<()> {
    log::info!(
        "Starting snapshot poller: {} reserves, obligation={:?}, interval={:?}",
        targets.reserves.len(),
        targets.obligation,
        poll_interval
    );

    let mut consecutive_errors = 0u32;

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = fetch_snapshot(source.as_ref(), &targets) => result,
        };

        let wait = match result {
            Ok(snapshot) => {
                consecutive_errors = 0;
                log::info!(
                    "Snapshot refreshed: {} reserves, obligation {}",
                    snapshot.reserves.len(),
                    if snapshot.obligation.is_some() { "loaded" } else { "absent" }
                );
                if tx.send(Some(Arc::new(snapshot))).is_err() {
                    log::info!("No snapshot subscribers left, stopping poller");
                    break;
                }
                poll_interval
            }
            Err(e) => {
                consecutive_errors += 1;
                log::error!(
                    "Error refreshing snapshot: {:#} (attempt {}/{})",
                    e,
                    consecutive_errors,
                    max_consecutive_errors
                );

                if consecutive_errors >= max_consecutive_errors {
                    log::error!("Too many consecutive errors ({}), stopping poller", consecutive_errors);
                    return Err(anyhow::anyhow!("Too many consecutive polling errors"));
                }

                let backoff = poll_interval.saturating_mul(2u32.pow(consecutive_errors.min(3)));
                log::warn!("Backing off for {:?} before retry", backoff);
                backoff
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(wait) => {}
        }
    }

    log::info!("Snapshot poller stopped");
    Ok(())
}
