use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::gateway::{ContractGateway, GatewayError};
use crate::models::{Contract, ContractId};
use crate::notification::NotificationDispatcher;

/// Full contract list as last received from the server, plus the active search.
#[derive(Default)]
struct ContractCache {
	all: Vec<Contract>,
	query: Option<String>,
}

impl ContractCache {
	fn visible(&self) -> Vec<Contract> {
		match &self.query {
			None => self.all.clone(),
			Some(needle) => self
				.all
				.iter()
				.filter(|c| c.matches_lowercase(needle))
				.cloned()
				.collect(),
		}
	}
}

/// Local changes to the cached list. All of them go through
/// [`ContractStore::apply_mutation`].
enum Mutation {
	Replace(Vec<Contract>),
	Append(Contract),
	Update(ContractId, Contract),
	Remove(ContractId),
}

/// Authoritative in-memory contract state for the UI.
///
/// State is published through `watch` channels. Gateway calls are awaited
/// without holding the cache lock; their outcome is applied in one short
/// critical section. The visible list is always the cache filtered by the
/// current search, so the two cannot drift apart.
pub struct ContractStore {
	gateway: Arc<dyn ContractGateway>,
	notifier: NotificationDispatcher,
	cache: Mutex<ContractCache>,
	contracts: watch::Sender<Vec<Contract>>,
	is_loading: watch::Sender<bool>,
	error_message: watch::Sender<Option<String>>,
	selected: watch::Sender<Option<Contract>>,
}

impl ContractStore {
	pub fn new(gateway: Arc<dyn ContractGateway>, notifier: NotificationDispatcher) -> Self {
		Self {
			gateway,
			notifier,
			cache: Mutex::new(ContractCache::default()),
			contracts: watch::channel(Vec::new()).0,
			is_loading: watch::channel(false).0,
			error_message: watch::channel(None).0,
			selected: watch::channel(None).0,
		}
	}

	pub fn contracts(&self) -> Vec<Contract> {
		self.contracts.borrow().clone()
	}

	pub fn is_loading(&self) -> bool {
		*self.is_loading.borrow()
	}

	pub fn error_message(&self) -> Option<String> {
		self.error_message.borrow().clone()
	}

	pub fn selected(&self) -> Option<Contract> {
		self.selected.borrow().clone()
	}

	pub fn all_contracts(&self) -> Vec<Contract> {
		self.cache().all.clone()
	}

	/// The active search, lowercased and trimmed. `None` when showing everything.
	pub fn current_query(&self) -> Option<String> {
		self.cache().query.clone()
	}

	pub fn subscribe_contracts(&self) -> watch::Receiver<Vec<Contract>> {
		self.contracts.subscribe()
	}

	pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
		self.is_loading.subscribe()
	}

	pub fn subscribe_errors(&self) -> watch::Receiver<Option<String>> {
		self.error_message.subscribe()
	}

	pub fn subscribe_selected(&self) -> watch::Receiver<Option<Contract>> {
		self.selected.subscribe()
	}

	pub async fn load_contracts(&self) -> Result<()> {
		tracing::debug!("Loading contracts");
		self.is_loading.send_replace(true);

		let outcome = self.gateway.list_contracts().await;
		self.finish_load(outcome)
	}

	/// Runs [`load_contracts`](Self::load_contracts) on a background task. The
	/// task only keeps a weak reference, so a store dropped in the meantime
	/// simply discards the result.
	pub fn spawn_load(self: &Arc<Self>) -> JoinHandle<()> {
		self.is_loading.send_replace(true);

		let gateway = self.gateway.clone();
		let store = Arc::downgrade(self);
		tokio::spawn(async move {
			let outcome = gateway.list_contracts().await;
			match store.upgrade() {
				Some(store) => {
					let _ = store.finish_load(outcome);
				}
				None => tracing::debug!("Contract store dropped before load completed"),
			}
		})
	}

	fn finish_load(&self, outcome: std::result::Result<Vec<Contract>, GatewayError>) -> Result<()> {
		self.is_loading.send_replace(false);

		match outcome {
			Ok(contracts) => {
				tracing::info!(count = contracts.len(), "Contracts loaded");
				self.apply_mutation(Mutation::Replace(contracts));
				Ok(())
			}
			Err(e) => Err(self.fail("load contracts", e)),
		}
	}

	/// Filters the visible list locally. An empty or blank query shows everything.
	pub fn search_contracts(&self, query: &str) {
		let mut cache = self.cache();
		let needle = query.trim().to_lowercase();
		cache.query = if needle.is_empty() { None } else { Some(needle) };
		// Publish under the lock so overlapping searches cannot reorder
		self.contracts.send_replace(cache.visible());
	}

	pub async fn create_contract(&self, contract: Contract) -> Result<Contract> {
		contract.validate()?;
		tracing::info!(title = %contract.title, "Creating new contract");

		match self.gateway.create_contract(&contract).await {
			Ok(created) => {
				tracing::info!(contract_id = ?created.id, "Contract created");
				self.apply_mutation(Mutation::Append(created.clone()));
				self.notifier.notify_contract_created(&created);
				Ok(created)
			}
			Err(e) => Err(self.fail("create contract", e)),
		}
	}

	pub async fn get_contract_by_id(&self, id: ContractId) -> Result<Contract> {
		self.is_loading.send_replace(true);
		let outcome = self.gateway.get_contract(id).await;
		self.is_loading.send_replace(false);

		match outcome {
			Ok(contract) => {
				self.selected.send_replace(Some(contract.clone()));
				Ok(contract)
			}
			Err(e) => Err(self.fail("fetch contract", e)),
		}
	}

	/// Submits the full record. Cached entries with the same id are replaced.
	pub async fn update_contract(&self, id: ContractId, contract: Contract) -> Result<Contract> {
		contract.validate()?;

		self.is_loading.send_replace(true);
		let outcome = self.gateway.update_contract(id, &contract).await;
		self.is_loading.send_replace(false);

		match outcome {
			Ok(mut updated) => {
				// The server may confirm without echoing the id
				if updated.id.is_none() {
					updated.id = Some(id);
				}
				tracing::info!(contract_id = id, version = updated.version, "Contract updated");
				self.apply_mutation(Mutation::Update(id, updated.clone()));
				self.selected.send_replace(Some(updated.clone()));
				Ok(updated)
			}
			Err(e) => Err(self.fail("update contract", e)),
		}
	}

	/// Removes the contract locally, then reloads the list from the server.
	pub async fn delete_contract(&self, id: ContractId) -> Result<()> {
		self.is_loading.send_replace(true);
		let outcome = self.gateway.delete_contract(id).await;
		self.is_loading.send_replace(false);

		if let Err(e) = outcome {
			return Err(self.fail("delete contract", e));
		}

		tracing::info!(contract_id = id, "Contract deleted");
		self.apply_mutation(Mutation::Remove(id));

		// A failed refresh is already reported through the error slice
		let _ = self.load_contracts().await;
		Ok(())
	}

	fn apply_mutation(&self, mutation: Mutation) {
		let mut cache = self.cache();
		match mutation {
			Mutation::Replace(contracts) => cache.all = contracts,
			Mutation::Append(contract) => cache.all.push(contract),
			Mutation::Update(id, contract) => {
				for existing in cache.all.iter_mut().filter(|c| c.id == Some(id)) {
					*existing = contract.clone();
				}
			}
			Mutation::Remove(id) => cache.all.retain(|c| c.id != Some(id)),
		}
		// Published under the lock, same as search_contracts
		self.contracts.send_replace(cache.visible());
	}

	fn fail(&self, operation: &'static str, error: GatewayError) -> crate::error::AppError {
		tracing::error!(operation, error = %error, "Contract operation failed");
		self.error_message.send_replace(Some(error.to_string()));
		error.into()
	}

	fn cache(&self) -> MutexGuard<'_, ContractCache> {
		self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}
