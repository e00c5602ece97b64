use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::sync::Arc;
use tokio::time::{timeout, Duration};

use crate::engine::poller::AccountSource;

/// `getMultipleAccounts` accepts at most this many keys per request.
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

pub struct RpcClient {
    client: Arc<SolanaRpcClient>,
    request_timeout: Duration,
}

impl RpcClient {
    pub fn new(rpc_url: String, request_timeout: Duration) -> Self {
        log::info!(
            "RpcClient: {} (request_timeout={:?})",
            rpc_url,
            request_timeout
        );

        RpcClient {
            client: Arc::new(SolanaRpcClient::new_with_commitment(
                rpc_url,
                CommitmentConfig::confirmed(),
            )),
            request_timeout,
        }
    }

    /// Raw data for each address, `None` where the account does not exist.
    /// Output order matches `addresses`.
    pub async fn fetch_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut out = Vec::with_capacity(addresses.len());
        for chunk in addresses.chunks(MAX_MULTIPLE_ACCOUNTS) {
            let accounts = timeout(self.request_timeout, self.client.get_multiple_accounts(chunk))
                .await
                .map_err(|_| anyhow::anyhow!("getMultipleAccounts timed out after {:?}", self.request_timeout))?
                .with_context(|| format!("getMultipleAccounts failed for {} keys", chunk.len()))?;
            out.extend(accounts.into_iter().map(|account| account.map(|a| a.data)));
        }
        log::debug!("Fetched {} accounts", out.len());
        Ok(out)
    }

    /// Current slot at confirmed commitment.
    pub async fn get_slot(&self) -> Result<u64> {
        timeout(self.request_timeout, self.client.get_slot())
            .await
            .map_err(|_| anyhow::anyhow!("getSlot timed out after {:?}", self.request_timeout))?
            .context("getSlot failed")
    }
}

#[async_trait]
impl AccountSource for RpcClient {
    async fn fetch_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Vec<u8>>>> {
        RpcClient::fetch_accounts(self, addresses).await
    }
}
