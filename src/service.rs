//! Orchestrates contract reads and writes around the snapshot store.
//!
//! A refresh is all-or-nothing: the raw records are fetched and every one of
//! them normalized before the snapshot swaps, so readers never see a
//! half-normalized collection. Write calls await on-chain confirmation and
//! then refresh, the same reload the original UI did after `tx.wait()`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use thiserror::Error;
use tracing::{debug, warn};

use crate::contract::{AuctionContract, ConfirmedTx, TxError};
use crate::normalize::{normalize_all, NormalizeError};
use crate::store::AuctionStore;
use crate::units::{min_bid_wei, parse_ether, MIN_BID};

/// Creation-side limits, mirrored from the contract's own checks.
pub const MAX_DESCRIPTION_LEN: usize = 100;
pub const MIN_TTL_MINUTES: u64 = 1;
/// One week.
pub const MAX_TTL_MINUTES: u64 = 10_080;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller-supplied input rejected before anything leaves the gateway.
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Tx(#[from] TxError),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// Contract handle plus the snapshot it feeds. The handle is injected, never
/// ambient, so tests run against a mock contract.
pub struct AuctionService {
    contract: Arc<dyn AuctionContract>,
    store: AuctionStore,
}

impl AuctionService {
    pub fn new(contract: Arc<dyn AuctionContract>, store: AuctionStore) -> Self {
        Self { contract, store }
    }

    pub fn store(&self) -> &AuctionStore {
        &self.store
    }

    /// Pulls a fresh snapshot. On any error the previous snapshot stays
    /// visible untouched.
    pub async fn refresh(&self) -> Result<usize, ServiceError> {
        let records = self.contract.get_auctions().await?;
        let auctions = normalize_all(&records)?;
        let count = auctions.len();
        self.store.replace_all(auctions);
        Ok(count)
    }

    pub async fn create_auction(
        &self,
        description: &str,
        time_to_live_minutes: u64,
    ) -> Result<ConfirmedTx, ServiceError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ServiceError::Invalid("description must not be empty".into()));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ServiceError::Invalid(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if !(MIN_TTL_MINUTES..=MAX_TTL_MINUTES).contains(&time_to_live_minutes) {
            return Err(ServiceError::Invalid(format!(
                "time to live must be between {MIN_TTL_MINUTES} and {MAX_TTL_MINUTES} minutes"
            )));
        }

        let tx = self
            .contract
            .create_auction(description, time_to_live_minutes)
            .await?;
        let confirmed = tx.confirmed().await?;
        self.refresh().await?;
        Ok(confirmed)
    }

    /// Bids `amount` (whole-coin decimal string) on an auction.
    ///
    /// Rejects below-minimum and non-outbidding amounts locally, mirroring
    /// the contract's own checks. The highest-bid comparison uses the
    /// snapshot; an auction missing from it goes to the contract as-is.
    pub async fn bid(&self, auction_id: u64, amount: &str) -> Result<ConfirmedTx, ServiceError> {
        let value_wei = parse_ether(amount).map_err(|e| ServiceError::Invalid(e.to_string()))?;
        if value_wei < min_bid_wei() {
            return Err(ServiceError::Invalid(format!(
                "bid amount must be at least {MIN_BID}"
            )));
        }
        if let Some(auction) = self.store.by_id(auction_id) {
            let highest = parse_ether(&auction.highest_bid).map_err(|e| {
                ServiceError::Upstream(anyhow!(
                    "stored highest bid for auction {auction_id} is not decimal: {e}"
                ))
            })?;
            if value_wei <= highest {
                return Err(ServiceError::Invalid(format!(
                    "bid must exceed the current highest bid of {}",
                    auction.highest_bid
                )));
            }
        }

        let tx = self.contract.bid(auction_id, value_wei).await?;
        let confirmed = tx.confirmed().await?;
        self.refresh().await?;
        Ok(confirmed)
    }

    pub async fn refund(&self, auction_id: u64) -> Result<ConfirmedTx, ServiceError> {
        let tx = self.contract.refund(auction_id).await?;
        let confirmed = tx.confirmed().await?;
        self.refresh().await?;
        Ok(confirmed)
    }

    pub async fn receipt(&self, auction_id: u64) -> Result<ConfirmedTx, ServiceError> {
        let tx = self.contract.receipt(auction_id).await?;
        let confirmed = tx.confirmed().await?;
        self.refresh().await?;
        Ok(confirmed)
    }

    pub async fn auction_withdraw(&self, auction_id: u64) -> Result<ConfirmedTx, ServiceError> {
        let tx = self.contract.auction_withdraw(auction_id).await?;
        let confirmed = tx.confirmed().await?;
        self.refresh().await?;
        Ok(confirmed)
    }

    pub async fn get_winner(&self, auction_id: u64) -> Result<String, ServiceError> {
        Ok(self.contract.get_winner(auction_id).await?)
    }
}

/// Background cadence: refresh the snapshot every `interval_secs`, keeping
/// the previous one when the contract read or normalization fails.
pub async fn run_refresh_loop(service: Arc<AuctionService>, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match service.refresh().await {
            Ok(count) => debug!(auctions = count, "auction snapshot refreshed"),
            Err(err) => warn!(error = %err, "auction refresh failed; keeping previous snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use num_bigint::BigUint;
    use parking_lot::Mutex;

    use crate::abi::AbiValue;
    use crate::contract::TxHandle;
    use crate::models::{AuctionStatus, SENTINEL_ADDRESS};

    const CREATOR: &str = "0x49a9e72975ea74133abf1e0c2780689d368c7781";

    fn record(id: u64) -> Vec<AbiValue> {
        vec![
            AbiValue::Uint(BigUint::from(id)),
            AbiValue::Address(CREATOR.to_string()),
            AbiValue::Str(format!("item {id}")),
            AbiValue::Uint(BigUint::from(1_700_000_000u64)),
            AbiValue::Address(SENTINEL_ADDRESS.to_string()),
            AbiValue::Uint(BigUint::default()),
            AbiValue::Uint(BigUint::default()),
        ]
    }

    fn record_with_bid(id: u64, bid_wei: &str) -> Vec<AbiValue> {
        let mut rec = record(id);
        rec[4] = AbiValue::Address(CREATOR.to_string());
        rec[5] = AbiValue::Uint(bid_wei.parse().unwrap());
        rec
    }

    /// Read-only mock; the write path needs a live RPC endpoint and is not
    /// exercised here.
    struct MockContract {
        records: Mutex<Vec<Vec<AbiValue>>>,
    }

    impl MockContract {
        fn with_records(records: Vec<Vec<AbiValue>>) -> Arc<Self> {
            Arc::new(Self {
                records: Mutex::new(records),
            })
        }
    }

    #[async_trait]
    impl AuctionContract for MockContract {
        async fn get_auctions(&self) -> anyhow::Result<Vec<Vec<AbiValue>>> {
            Ok(self.records.lock().clone())
        }

        async fn create_auction(&self, _: &str, _: u64) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }

        async fn bid(&self, _: u64, _: BigUint) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }

        async fn refund(&self, _: u64) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }

        async fn get_winner(&self, _: u64) -> anyhow::Result<String> {
            Ok(SENTINEL_ADDRESS.to_string())
        }

        async fn receipt(&self, _: u64) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }

        async fn auction_withdraw(&self, _: u64) -> anyhow::Result<TxHandle> {
            Err(anyhow!("writes not wired in tests"))
        }
    }

    fn service(records: Vec<Vec<AbiValue>>) -> AuctionService {
        AuctionService::new(MockContract::with_records(records), AuctionStore::new())
    }

    #[tokio::test]
    async fn refresh_replaces_the_snapshot_in_contract_order() {
        let svc = service(vec![record(2), record(1)]);
        assert_eq!(svc.refresh().await.unwrap(), 2);

        let all = svc.store().all();
        let ids: Vec<u64> = all.iter().map(|a| a.auction_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(all[0].status, AuctionStatus::Active);
    }

    #[tokio::test]
    async fn malformed_record_aborts_refresh_and_keeps_prior_snapshot() {
        // A batch with one truncated record behind a store primed with a
        // good prior snapshot.
        let good = service(vec![record(1)]);
        good.refresh().await.unwrap();

        let contract = MockContract::with_records(vec![record(2), record(3)[..5].to_vec()]);
        let svc2 = AuctionService::new(contract, AuctionStore::new());
        svc2.store().replace_all(good.store().all());

        let err = svc2.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Normalize(NormalizeError::MalformedRecord(_))
        ));
        // prior snapshot untouched
        assert_eq!(svc2.store().len(), 1);
        assert_eq!(svc2.store().by_id(1).unwrap().auction_id, 1);
    }

    #[tokio::test]
    async fn creation_inputs_are_validated_before_submission() {
        let svc = service(vec![]);

        let err = svc.create_auction("", 60).await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));

        let long = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        let err = svc.create_auction(&long, 60).await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));

        let err = svc.create_auction("Iphone", 0).await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));

        let err = svc
            .create_auction("Iphone", MAX_TTL_MINUTES + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }

    #[tokio::test]
    async fn bids_must_parse_and_reach_the_minimum() {
        let svc = service(vec![record(1)]);

        assert!(matches!(
            svc.bid(1, "abc").await.unwrap_err(),
            ServiceError::Invalid(_)
        ));
        assert!(matches!(
            svc.bid(1, "0").await.unwrap_err(),
            ServiceError::Invalid(_)
        ));
        // below the 0.01 minimum
        assert!(matches!(
            svc.bid(1, "0.005").await.unwrap_err(),
            ServiceError::Invalid(_)
        ));
        assert!(matches!(
            svc.bid(1, "0.0000000000000000001").await.unwrap_err(),
            ServiceError::Invalid(_)
        ));
    }

    #[tokio::test]
    async fn bids_must_beat_the_snapshot_highest_bid() {
        let svc = service(vec![record_with_bid(1, "1500000000000000000")]);
        svc.refresh().await.unwrap();

        assert!(matches!(
            svc.bid(1, "1.5").await.unwrap_err(),
            ServiceError::Invalid(_)
        ));
        assert!(matches!(
            svc.bid(1, "1.2").await.unwrap_err(),
            ServiceError::Invalid(_)
        ));
        // a strictly higher bid clears validation and reaches the contract
        assert!(matches!(
            svc.bid(1, "1.6").await.unwrap_err(),
            ServiceError::Upstream(_)
        ));
        // so does a bid on an auction the snapshot does not know about
        assert!(matches!(
            svc.bid(99, "0.01").await.unwrap_err(),
            ServiceError::Upstream(_)
        ));
    }
}
