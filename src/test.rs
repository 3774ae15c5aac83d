use crate::gateway::{ContractGateway, GatewayError};
use crate::models::{Contract, ContractId};
use crate::notification::{DeliveryError, Notification, NotificationDispatcher, NotificationSink};
use crate::preferences::{InMemoryPreferences, NotificationSettings};
use crate::store::ContractStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// In-process stand-in for the contract server
#[derive(Default)]
struct MockGateway {
    server: Mutex<Vec<Contract>>,
    failure: Mutex<Option<GatewayError>>,
    calls: AtomicUsize,
    list_gate: Option<Arc<Notify>>,
    omit_id_on_update: bool,
}

impl MockGateway {
    fn with_contracts(contracts: Vec<Contract>) -> Self {
        Self {
            server: Mutex::new(contracts),
            ..Default::default()
        }
    }

    fn fail_next_with(&self, error: GatewayError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin_call(&self) -> Result<(), GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContractGateway for MockGateway {
    async fn create_contract(&self, contract: &Contract) -> Result<Contract, GatewayError> {
        self.begin_call()?;
        let mut server = self.server.lock().unwrap();
        let mut created = contract.clone();
        created.id = Some(server.iter().filter_map(|c| c.id).max().unwrap_or(0) + 1);
        server.push(created.clone());
        Ok(created)
    }

    async fn get_contract(&self, id: ContractId) -> Result<Contract, GatewayError> {
        self.begin_call()?;
        self.server
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == Some(id))
            .cloned()
            .ok_or(GatewayError::Server {
                status: 404,
                message: "Contract not found".to_string(),
            })
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, GatewayError> {
        if let Some(gate) = &self.list_gate {
            gate.notified().await;
        }
        self.begin_call()?;
        Ok(self.server.lock().unwrap().clone())
    }

    async fn update_contract(
        &self,
        id: ContractId,
        contract: &Contract,
    ) -> Result<Contract, GatewayError> {
        self.begin_call()?;
        let mut updated = contract.clone();
        updated.id = Some(id);
        updated.version += 1;
        let mut server = self.server.lock().unwrap();
        for existing in server.iter_mut().filter(|c| c.id == Some(id)) {
            *existing = updated.clone();
        }
        if self.omit_id_on_update {
            updated.id = None;
        }
        Ok(updated)
    }

    async fn delete_contract(&self, id: ContractId) -> Result<(), GatewayError> {
        self.begin_call()?;
        self.server.lock().unwrap().retain(|c| c.id != Some(id));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
    deny: bool,
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if self.deny {
            return Err(DeliveryError::PermissionDenied);
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn contract(id: i64, title: &str, finalized: bool) -> Contract {
    let mut contract = Contract::new_draft(title, Decimal::new(100, 0));
    contract.id = Some(id);
    contract.finalized = finalized;
    contract
}

fn lease_contracts() -> Vec<Contract> {
    vec![contract(1, "Lease A", false), contract(2, "Lease B", true)]
}

struct Harness {
    store: Arc<ContractStore>,
    gateway: Arc<MockGateway>,
    sink: Arc<RecordingSink>,
    settings: NotificationSettings,
}

fn harness_with(gateway: MockGateway, sink: RecordingSink) -> Harness {
    let gateway = Arc::new(gateway);
    let sink = Arc::new(sink);
    let settings = NotificationSettings::new(Arc::new(InMemoryPreferences::new()));
    let dispatcher = NotificationDispatcher::new(settings.clone(), sink.clone());
    let store = Arc::new(ContractStore::new(gateway.clone(), dispatcher));

    Harness {
        store,
        gateway,
        sink,
        settings,
    }
}

fn harness(contracts: Vec<Contract>) -> Harness {
    harness_with(MockGateway::with_contracts(contracts), RecordingSink::default())
}

fn ids(contracts: &[Contract]) -> Vec<Option<i64>> {
    contracts.iter().map(|c| c.id).collect()
}

#[cfg(test)]
mod load_tests {
    use super::*;

    #[tokio::test]
    async fn test_load_replaces_list_and_clears_loading() {
        let h = harness(lease_contracts());
        let loading = h.store.subscribe_loading();

        h.store.load_contracts().await.unwrap();

        assert_eq!(ids(&h.store.contracts()), vec![Some(1), Some(2)]);
        assert_eq!(ids(&h.store.all_contracts()), vec![Some(1), Some(2)]);
        assert!(!h.store.is_loading());
        assert!(!*loading.borrow());
        assert_eq!(h.store.error_message(), None);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_previous_list() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();

        h.gateway
            .fail_next_with(GatewayError::Transport("connection refused".to_string()));
        let err = h.store.load_contracts().await.unwrap_err();

        assert_eq!(err.user_message(), "connection refused");
        assert!(!h.store.is_loading());
        assert_eq!(h.store.error_message().as_deref(), Some("connection refused"));
        assert_eq!(ids(&h.store.contracts()), vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_last_error_replaces_previous() {
        let h = harness(Vec::new());
        h.gateway
            .fail_next_with(GatewayError::Transport("timeout".to_string()));
        let _ = h.store.load_contracts().await;
        h.gateway.fail_next_with(GatewayError::Server {
            status: 500,
            message: "Internal Server Error".to_string(),
        });
        let _ = h.store.load_contracts().await;

        assert_eq!(
            h.store.error_message().as_deref(),
            Some("Internal Server Error")
        );
    }

    #[tokio::test]
    async fn test_concurrent_loads_both_settle() {
        let h = harness(lease_contracts());

        let (first, second) =
            futures::future::join(h.store.load_contracts(), h.store.load_contracts()).await;

        assert!(first.is_ok() && second.is_ok());
        assert!(!h.store.is_loading());
        assert_eq!(h.store.contracts().len(), 2);
        assert_eq!(h.gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn test_spawned_load_publishes_to_subscribers() {
        let gate = Arc::new(Notify::new());
        let gateway = MockGateway {
            list_gate: Some(gate.clone()),
            ..MockGateway::with_contracts(lease_contracts())
        };
        let h = harness_with(gateway, RecordingSink::default());
        let mut contracts = h.store.subscribe_contracts();

        let handle = h.store.spawn_load();
        assert!(h.store.is_loading());

        gate.notify_one();
        handle.await.unwrap();

        assert!(contracts.has_changed().unwrap());
        assert_eq!(contracts.borrow_and_update().len(), 2);
        assert!(!h.store.is_loading());
    }

    #[tokio::test]
    async fn test_spawned_load_failure_sets_error() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();
        h.gateway
            .fail_next_with(GatewayError::Transport("host unreachable".to_string()));

        let handle = h.store.spawn_load();
        assert!(h.store.is_loading());
        handle.await.unwrap();

        assert!(!h.store.is_loading());
        assert_eq!(h.store.error_message().as_deref(), Some("host unreachable"));
        assert_eq!(ids(&h.store.contracts()), vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_spawned_load_ignores_dropped_store() {
        let gate = Arc::new(Notify::new());
        let gateway = MockGateway {
            list_gate: Some(gate.clone()),
            ..MockGateway::with_contracts(lease_contracts())
        };
        let Harness { store, gateway, .. } = harness_with(gateway, RecordingSink::default());

        let handle = store.spawn_load();
        drop(store);
        gate.notify_one();

        handle.await.expect("late completion must not panic");
        assert_eq!(gateway.call_count(), 1);
    }
}

#[cfg(test)]
mod search_tests {
    use super::*;

    #[tokio::test]
    async fn test_search_is_case_insensitive_substring() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();

        h.store.search_contracts("lease a");
        assert_eq!(ids(&h.store.contracts()), vec![Some(1)]);

        h.store.search_contracts("LEASE");
        assert_eq!(ids(&h.store.contracts()), vec![Some(1), Some(2)]);

        h.store.search_contracts("");
        assert_eq!(ids(&h.store.contracts()), vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_search_matches_description_and_type() {
        let mut warehouse = contract(3, "Storage", false);
        warehouse.description = "North Warehouse".to_string();
        let mut service = contract(4, "Cleaning", false);
        service.contract_type = "Service Agreement".to_string();

        let h = harness(vec![warehouse, service, contract(5, "Other", true)]);
        h.store.load_contracts().await.unwrap();

        h.store.search_contracts("  warehouse ");
        assert_eq!(ids(&h.store.contracts()), vec![Some(3)]);

        h.store.search_contracts("agreement");
        assert_eq!(ids(&h.store.contracts()), vec![Some(4)]);

        h.store.search_contracts("   ");
        assert_eq!(h.store.contracts().len(), 3);
    }

    fn filtered_cache(store: &ContractStore) -> Vec<Contract> {
        let all = store.all_contracts();
        match store.current_query() {
            None => all,
            Some(needle) => all
                .into_iter()
                .filter(|c| c.matches_lowercase(&needle))
                .collect(),
        }
    }

    #[test]
    fn test_overlapping_searches_keep_visible_list_consistent() {
        let mut contracts = lease_contracts();
        contracts.push(contract(3, "Parking", false));
        let h = harness(contracts);
        futures::executor::block_on(h.store.load_contracts()).unwrap();

        for _ in 0..500 {
            std::thread::scope(|scope| {
                scope.spawn(|| h.store.search_contracts("lease"));
                scope.spawn(|| h.store.search_contracts(""));
            });
            assert_eq!(h.store.contracts(), filtered_cache(&h.store));
        }
    }

    #[test]
    fn test_search_racing_mutation_keeps_visible_list_consistent() {
        let h = harness(lease_contracts());
        futures::executor::block_on(h.store.load_contracts()).unwrap();

        for round in 0..200 {
            std::thread::scope(|scope| {
                scope.spawn(|| h.store.search_contracts("parking"));
                scope.spawn(|| {
                    futures::executor::block_on(h.store.create_contract(Contract::new_draft(
                        format!("Parking {}", round),
                        Decimal::ONE,
                    )))
                    .unwrap()
                });
            });
            assert_eq!(h.store.contracts(), filtered_cache(&h.store));
        }
        assert_eq!(h.store.all_contracts().len(), 202);
    }

    #[tokio::test]
    async fn test_search_never_calls_gateway_or_touches_cache() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();
        let calls = h.gateway.call_count();

        h.store.search_contracts("nothing matches this");

        assert!(h.store.contracts().is_empty());
        assert_eq!(h.store.all_contracts().len(), 2);
        assert_eq!(h.gateway.call_count(), calls);
    }
}

#[cfg(test)]
mod mutation_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_appends_once_and_notifies_once() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();

        let created = h
            .store
            .create_contract(Contract::new_draft("Lease C", Decimal::new(250, 0)))
            .await
            .unwrap();

        assert_eq!(created.id, Some(3));
        let visible = h.store.contracts();
        assert_eq!(visible.iter().filter(|c| c.id == Some(3)).count(), 1);
        assert_eq!(h.store.all_contracts().len(), 3);

        let delivered = h.sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].body.contains("Lease C"));
    }

    #[tokio::test]
    async fn test_create_without_notifications_enabled() {
        let h = harness(Vec::new());
        h.settings.set_notifications_enabled(false).unwrap();

        h.store
            .create_contract(Contract::new_draft("X", Decimal::ONE))
            .await
            .unwrap();

        assert_eq!(h.store.contracts().len(), 1);
        assert!(h.sink.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_succeeds_when_delivery_fails() {
        let sink = RecordingSink {
            deny: true,
            ..Default::default()
        };
        let h = harness_with(MockGateway::default(), sink);

        let created = h
            .store
            .create_contract(Contract::new_draft("X", Decimal::ONE))
            .await;

        assert!(created.is_ok());
        assert_eq!(h.store.error_message(), None);
    }

    #[tokio::test]
    async fn test_invalid_contracts_never_reach_gateway() {
        let h = harness(Vec::new());

        let empty_title = h
            .store
            .create_contract(Contract::new_draft("", Decimal::new(100, 0)))
            .await
            .unwrap_err();
        let negative = h
            .store
            .create_contract(Contract::new_draft("X", Decimal::new(-5, 0)))
            .await
            .unwrap_err();

        assert!(matches!(empty_title, crate::AppError::Validation(_)));
        assert!(matches!(negative, crate::AppError::Validation(_)));
        assert_eq!(h.gateway.call_count(), 0);
        assert_eq!(h.store.error_message(), None);
        assert!(h.sink.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_sets_error() {
        let h = harness(Vec::new());
        h.gateway.fail_next_with(GatewayError::Server {
            status: 400,
            message: "Bad Request".to_string(),
        });

        let result = h
            .store
            .create_contract(Contract::new_draft("X", Decimal::ONE))
            .await;

        assert!(result.is_err());
        assert_eq!(h.store.error_message().as_deref(), Some("Bad Request"));
        assert!(h.store.contracts().is_empty());
        assert!(h.sink.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_respects_active_filter() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();
        h.store.search_contracts("lease");

        h.store
            .create_contract(Contract::new_draft("Parking", Decimal::ONE))
            .await
            .unwrap();
        assert_eq!(ids(&h.store.contracts()), vec![Some(1), Some(2)]);

        h.store.search_contracts("");
        assert_eq!(ids(&h.store.contracts()), vec![Some(1), Some(2), Some(3)]);
    }

    #[tokio::test]
    async fn test_get_by_id_sets_selected() {
        let h = harness(lease_contracts());

        let fetched = h.store.get_contract_by_id(2).await.unwrap();
        assert_eq!(h.store.selected(), Some(fetched));
        assert!(!h.store.is_loading());

        assert!(h.store.get_contract_by_id(42).await.is_err());
        assert_eq!(h.store.error_message().as_deref(), Some("Contract not found"));
        assert!(!h.store.is_loading());
    }

    #[tokio::test]
    async fn test_update_replaces_cached_entry() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();
        h.store.search_contracts("lease a");

        let mut edited = h.store.contracts()[0].clone();
        edited.title = "Lease A (renewed)".to_string();
        edited.finalized = true;
        let updated = h.store.update_contract(1, edited).await.unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(h.store.selected(), Some(updated.clone()));
        assert_eq!(h.store.contracts(), vec![updated.clone()]);
        assert_eq!(h.store.all_contracts()[0], updated);
        assert!(!h.store.is_loading());
    }

    #[tokio::test]
    async fn test_update_keys_cache_on_requested_id() {
        let gateway = MockGateway {
            omit_id_on_update: true,
            ..MockGateway::with_contracts(lease_contracts())
        };
        let h = harness_with(gateway, RecordingSink::default());
        h.store.load_contracts().await.unwrap();

        let mut edited = contract(1, "Lease A", false);
        edited.title = "Lease A renewed".to_string();
        let updated = h.store.update_contract(1, edited).await.unwrap();

        assert_eq!(updated.id, Some(1));
        assert_eq!(h.store.all_contracts()[0].title, "Lease A renewed");
        assert_eq!(h.store.contracts()[0], updated);
        assert_eq!(h.store.selected(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_failure_sets_error_and_keeps_cache() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();
        let before = h.store.all_contracts();
        h.gateway.fail_next_with(GatewayError::Server {
            status: 409,
            message: "Contract is finalized".to_string(),
        });

        let mut edited = contract(2, "Lease B", true);
        edited.title = "Lease B v2".to_string();
        assert!(h.store.update_contract(2, edited).await.is_err());

        assert!(!h.store.is_loading());
        assert_eq!(h.store.error_message().as_deref(), Some("Contract is finalized"));
        assert_eq!(h.store.all_contracts(), before);
        assert_eq!(h.store.contracts(), before);
        assert_eq!(h.store.selected(), None);
    }

    #[tokio::test]
    async fn test_update_validates_locally() {
        let h = harness(lease_contracts());
        let mut edited = contract(1, "Lease A", false);
        edited.amount = Decimal::ZERO;

        assert!(h.store.update_contract(1, edited).await.is_err());
        assert_eq!(h.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_and_reloads() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();
        let calls_before = h.gateway.call_count();

        h.store.delete_contract(1).await.unwrap();

        assert_eq!(ids(&h.store.contracts()), vec![Some(2)]);
        assert_eq!(ids(&h.store.all_contracts()), vec![Some(2)]);
        // delete plus the refresh
        assert_eq!(h.gateway.call_count(), calls_before + 2);
        assert!(!h.store.is_loading());
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_list() {
        let h = harness(lease_contracts());
        h.store.load_contracts().await.unwrap();
        h.gateway.fail_next_with(GatewayError::Transport("timeout".to_string()));

        assert!(h.store.delete_contract(1).await.is_err());
        assert_eq!(h.store.contracts().len(), 2);
        assert_eq!(h.store.error_message().as_deref(), Some("timeout"));
        assert!(!h.store.is_loading());
    }
}
