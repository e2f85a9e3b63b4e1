use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use splitpay_core::{PaymentRequest, PaymentRequestId, RecipientId, RecipientPayoutProfile};

use crate::error::SettlementError;
use crate::traits::{PaymentStore, UpdateFn};
use crate::types::ConditionalUpdate;

/// In-memory [`PaymentStore`].
///
/// Conditional updates run under the DashMap shard write lock of the record,
/// which makes each check-and-write atomic with respect to every other
/// `update_if` on the same id.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    requests: DashMap<PaymentRequestId, PaymentRequest>,
    by_checkout_ref: DashMap<String, PaymentRequestId>,
    by_checkout_url: DashMap<String, PaymentRequestId>,
    profiles: DashMap<RecipientId, RecipientPayoutProfile>,
    events: DashSet<String>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, request: PaymentRequest) -> Result<(), SettlementError> {
        match self.by_checkout_ref.entry(request.external_checkout_ref.clone()) {
            Entry::Occupied(_) => {
                return Err(SettlementError::Storage(format!(
                    "checkout reference {} already in use",
                    request.external_checkout_ref
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(request.id);
            }
        }

        match self.requests.entry(request.id) {
            Entry::Occupied(_) => {
                self.by_checkout_ref.remove(&request.external_checkout_ref);
                Err(SettlementError::Storage(format!(
                    "payment request {} already exists",
                    request.id
                )))
            }
            Entry::Vacant(slot) => {
                if !request.checkout_url.is_empty() {
                    self.by_checkout_url
                        .insert(request.checkout_url.clone(), request.id);
                }
                slot.insert(request);
                Ok(())
            }
        }
    }

    async fn get(&self, id: PaymentRequestId) -> Result<Option<PaymentRequest>, SettlementError> {
        Ok(self.requests.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_checkout_ref(
        &self,
        checkout_ref: &str,
    ) -> Result<Option<PaymentRequest>, SettlementError> {
        let Some(id) = self.by_checkout_ref.get(checkout_ref).map(|id| *id) else {
            return Ok(None);
        };
        self.get(id).await
    }

    async fn find_by_checkout_url(
        &self,
        checkout_url: &str,
    ) -> Result<Option<PaymentRequest>, SettlementError> {
        let Some(id) = self.by_checkout_url.get(checkout_url).map(|id| *id) else {
            return Ok(None);
        };
        self.get(id).await
    }

    async fn update_if(
        &self,
        id: PaymentRequestId,
        update: &UpdateFn<'_>,
    ) -> Result<ConditionalUpdate, SettlementError> {
        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or(SettlementError::NotFound(id))?;

        match update(entry.value()) {
            Some(next) => {
                *entry.value_mut() = next.clone();
                Ok(ConditionalUpdate::Applied(next))
            }
            None => Ok(ConditionalUpdate::Rejected(entry.value().clone())),
        }
    }

    async fn get_profile(
        &self,
        recipient_id: &RecipientId,
    ) -> Result<Option<RecipientPayoutProfile>, SettlementError> {
        Ok(self.profiles.get(recipient_id).map(|p| p.value().clone()))
    }

    async fn put_profile(&self, profile: RecipientPayoutProfile) -> Result<(), SettlementError> {
        self.profiles.insert(profile.recipient_id.clone(), profile);
        Ok(())
    }

    async fn record_event(&self, event_id: &str) -> Result<bool, SettlementError> {
        Ok(self.events.insert(event_id.to_string()))
    }

    async fn is_event_recorded(&self, event_id: &str) -> Result<bool, SettlementError> {
        Ok(self.events.contains(event_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitpay_core::PaymentStatus;
    use std::sync::Arc;

    fn request(checkout_ref: &str) -> PaymentRequest {
        PaymentRequest::new(
            RecipientId::new("user-1"),
            1000,
            None,
            checkout_ref.into(),
            format!("https://pay.example.com/{checkout_ref}"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = InMemoryPaymentStore::new();
        let req = request("plink_1");
        store.insert(req.clone()).await.unwrap();

        assert_eq!(store.get(req.id).await.unwrap(), Some(req.clone()));
        assert_eq!(
            store.find_by_checkout_ref("plink_1").await.unwrap().map(|r| r.id),
            Some(req.id)
        );
        assert_eq!(
            store
                .find_by_checkout_url("https://pay.example.com/plink_1")
                .await
                .unwrap()
                .map(|r| r.id),
            Some(req.id)
        );
        assert!(store.find_by_checkout_ref("plink_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_checkout_ref_rejected() {
        let store = InMemoryPaymentStore::new();
        store.insert(request("plink_1")).await.unwrap();
        let result = store.insert(request("plink_1")).await;
        assert!(matches!(result, Err(SettlementError::Storage(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_if_applies_and_rejects() {
        let store = InMemoryPaymentStore::new();
        let req = request("plink_1");
        store.insert(req.clone()).await.unwrap();

        let cancel = |r: &PaymentRequest| {
            (r.status == PaymentStatus::Pending).then(|| {
                let mut next = r.clone();
                next.status = PaymentStatus::Cancelled;
                next
            })
        };
        assert!(matches!(
            store.update_if(req.id, &cancel).await.unwrap(),
            ConditionalUpdate::Applied(_)
        ));
        match store.update_if(req.id, &cancel).await.unwrap() {
            ConditionalUpdate::Rejected(current) => {
                assert_eq!(current.status, PaymentStatus::Cancelled)
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_if_missing_is_not_found() {
        let store = InMemoryPaymentStore::new();
        let id = PaymentRequestId::new();
        let result = store.update_if(id, &|r: &PaymentRequest| Some(r.clone())).await;
        assert!(matches!(result, Err(SettlementError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_concurrent_update_if_single_winner() {
        let store = Arc::new(InMemoryPaymentStore::new());
        let req = request("plink_1");
        store.insert(req.clone()).await.unwrap();
        let id = req.id;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let claim = |r: &PaymentRequest| {
                        (r.status == PaymentStatus::Pending).then(|| {
                            let mut next = r.clone();
                            next.status = PaymentStatus::Expired;
                            next
                        })
                    };
                    store.update_if(id, &claim).await.unwrap()
                })
            })
            .collect();

        let mut applied = 0;
        for handle in handles {
            if let ConditionalUpdate::Applied(_) = handle.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn test_events_recorded_once() {
        let store = InMemoryPaymentStore::new();
        assert!(!store.is_event_recorded("evt_1").await.unwrap());
        assert!(store.record_event("evt_1").await.unwrap());
        assert!(!store.record_event("evt_1").await.unwrap());
        assert!(store.is_event_recorded("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_profiles() {
        let store = InMemoryPaymentStore::new();
        let recipient = RecipientId::new("user-1");
        assert!(store.get_profile(&recipient).await.unwrap().is_none());
        let profile = RecipientPayoutProfile::new(recipient.clone())
            .with_destination("alice@example.com")
            .unwrap();
        store.put_profile(profile.clone()).await.unwrap();
        assert_eq!(store.get_profile(&recipient).await.unwrap(), Some(profile));
    }
}
