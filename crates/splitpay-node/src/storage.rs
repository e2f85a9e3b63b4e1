//! RocksDB storage backend for the Splitpay node.
//!
//! Records are JSON documents. Conditional updates run inside a pessimistic
//! transaction that locks the record with `get_for_update`, so a concurrent
//! `update_if` on the same request waits for the first to commit and then
//! evaluates its condition against the committed value.

use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Options, TransactionDB, TransactionDBOptions,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use splitpay_core::{PaymentRequest, PaymentRequestId, RecipientId, RecipientPayoutProfile};
use splitpay_settlement::traits::UpdateFn;
use splitpay_settlement::{ConditionalUpdate, PaymentStore, SettlementError};

/// Column family names for different data types.
const CF_REQUESTS: &str = "payment_requests";
const CF_BY_CHECKOUT_REF: &str = "by_checkout_ref";
const CF_BY_CHECKOUT_URL: &str = "by_checkout_url";
const CF_PROFILES: &str = "payout_profiles";
const CF_EVENTS: &str = "processed_events";

fn storage_err(e: impl std::fmt::Display) -> SettlementError {
    SettlementError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SettlementError> {
    serde_json::to_vec(value).map_err(storage_err)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SettlementError> {
    serde_json::from_slice(bytes).map_err(storage_err)
}

/// RocksDB-backed [`PaymentStore`].
pub struct RocksStore {
    db: TransactionDB,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_REQUESTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_BY_CHECKOUT_REF, Options::default()),
            ColumnFamilyDescriptor::new(CF_BY_CHECKOUT_URL, Options::default()),
            ColumnFamilyDescriptor::new(CF_PROFILES, Options::default()),
            ColumnFamilyDescriptor::new(CF_EVENTS, Options::default()),
        ];

        let db = TransactionDB::open_cf_descriptors(
            &opts,
            &TransactionDBOptions::default(),
            path,
            cf_descriptors,
        )?;

        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, SettlementError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| storage_err(format!("column family '{name}' not found")))
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>, SettlementError> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key).map_err(storage_err)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn lookup_index(
        &self,
        cf_name: &str,
        key: &str,
    ) -> Result<Option<PaymentRequest>, SettlementError> {
        let cf = self.cf(cf_name)?;
        let Some(id) = self.db.get_cf(cf, key.as_bytes()).map_err(storage_err)? else {
            return Ok(None);
        };
        self.get_json(CF_REQUESTS, &id)
    }
}

#[async_trait]
impl PaymentStore for RocksStore {
    async fn insert(&self, request: PaymentRequest) -> Result<(), SettlementError> {
        let requests = self.cf(CF_REQUESTS)?;
        let by_ref = self.cf(CF_BY_CHECKOUT_REF)?;
        let by_url = self.cf(CF_BY_CHECKOUT_URL)?;
        let id = request.id.to_string();

        let txn = self.db.transaction();
        if txn
            .get_for_update_cf(by_ref, request.external_checkout_ref.as_bytes(), true)
            .map_err(storage_err)?
            .is_some()
        {
            return Err(storage_err(format!(
                "checkout reference {} already in use",
                request.external_checkout_ref
            )));
        }
        if txn
            .get_for_update_cf(requests, id.as_bytes(), true)
            .map_err(storage_err)?
            .is_some()
        {
            return Err(storage_err(format!("payment request {id} already exists")));
        }

        txn.put_cf(requests, id.as_bytes(), encode(&request)?)
            .map_err(storage_err)?;
        txn.put_cf(by_ref, request.external_checkout_ref.as_bytes(), id.as_bytes())
            .map_err(storage_err)?;
        if !request.checkout_url.is_empty() {
            txn.put_cf(by_url, request.checkout_url.as_bytes(), id.as_bytes())
                .map_err(storage_err)?;
        }
        txn.commit().map_err(storage_err)?;
        Ok(())
    }

    async fn get(&self, id: PaymentRequestId) -> Result<Option<PaymentRequest>, SettlementError> {
        self.get_json(CF_REQUESTS, id.to_string().as_bytes())
    }

    async fn find_by_checkout_ref(
        &self,
        checkout_ref: &str,
    ) -> Result<Option<PaymentRequest>, SettlementError> {
        self.lookup_index(CF_BY_CHECKOUT_REF, checkout_ref)
    }

    async fn find_by_checkout_url(
        &self,
        checkout_url: &str,
    ) -> Result<Option<PaymentRequest>, SettlementError> {
        self.lookup_index(CF_BY_CHECKOUT_URL, checkout_url)
    }

    async fn update_if(
        &self,
        id: PaymentRequestId,
        update: &UpdateFn<'_>,
    ) -> Result<ConditionalUpdate, SettlementError> {
        let requests = self.cf(CF_REQUESTS)?;
        let key = id.to_string();

        let txn = self.db.transaction();
        let current: PaymentRequest = match txn
            .get_for_update_cf(requests, key.as_bytes(), true)
            .map_err(storage_err)?
        {
            Some(bytes) => decode(&bytes)?,
            None => return Err(SettlementError::NotFound(id)),
        };

        match update(&current) {
            Some(next) => {
                txn.put_cf(requests, key.as_bytes(), encode(&next)?)
                    .map_err(storage_err)?;
                txn.commit().map_err(storage_err)?;
                Ok(ConditionalUpdate::Applied(next))
            }
            None => {
                txn.rollback().map_err(storage_err)?;
                Ok(ConditionalUpdate::Rejected(current))
            }
        }
    }

    async fn get_profile(
        &self,
        recipient_id: &RecipientId,
    ) -> Result<Option<RecipientPayoutProfile>, SettlementError> {
        self.get_json(CF_PROFILES, recipient_id.as_str().as_bytes())
    }

    async fn put_profile(&self, profile: RecipientPayoutProfile) -> Result<(), SettlementError> {
        let cf = self.cf(CF_PROFILES)?;
        self.db
            .put_cf(cf, profile.recipient_id.as_str().as_bytes(), encode(&profile)?)
            .map_err(storage_err)
    }

    async fn record_event(&self, event_id: &str) -> Result<bool, SettlementError> {
        let cf = self.cf(CF_EVENTS)?;
        let txn = self.db.transaction();
        if txn
            .get_for_update_cf(cf, event_id.as_bytes(), true)
            .map_err(storage_err)?
            .is_some()
        {
            return Ok(false);
        }
        let recorded_at = chrono::Utc::now().to_rfc3339();
        txn.put_cf(cf, event_id.as_bytes(), recorded_at.as_bytes())
            .map_err(storage_err)?;
        txn.commit().map_err(storage_err)?;
        Ok(true)
    }

    async fn is_event_recorded(&self, event_id: &str) -> Result<bool, SettlementError> {
        let cf = self.cf(CF_EVENTS)?;
        Ok(self
            .db
            .get_cf(cf, event_id.as_bytes())
            .map_err(storage_err)?
            .is_some())
    }
}
