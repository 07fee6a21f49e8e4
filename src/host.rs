#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::contract::{Contract, DeployedContract, Instance};
use crate::error::{HostError, Result};
use crate::storage::{StateStore, StoredState};
use crate::types::{ContractAddress, ContractKind, ContractSchema};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

type DeployFn = Box<dyn Fn() -> Box<dyn DeployedContract> + Send + Sync>;
type RestoreFn = Box<dyn Fn(Value) -> Result<Box<dyn DeployedContract>> + Send + Sync>;

struct Registration {
    schema: ContractSchema,
    deploy: DeployFn,
    restore: RestoreFn,
}

struct LiveInstance {
    contract: Box<dyn DeployedContract>,
    record: StoredState,
}

type SharedInstance = Arc<RwLock<LiveInstance>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteReceipt {
    pub result: Value,
    pub version: u64,
}

/// Executes registered contracts: one exclusive writer or many readers per
/// instance, state persisted after every successful write.
pub struct ContractHost<S> {
    store: S,
    registry: HashMap<ContractKind, Registration>,
    instances: RwLock<HashMap<ContractAddress, SharedInstance>>,
}

impl<S: StateStore> ContractHost<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            registry: HashMap::new(),
            instances: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Registers a contract type under `kind`; `factory` builds fresh
    /// instances on deploy.
    ///
    /// # Errors
    /// Returns `HostError::AlreadyRegistered` for a repeated kind,
    /// `HostError::DuplicateMethod` for a conflicting method table, or
    /// `HostError::Config` for an empty kind name.
    pub fn register<C, F>(&mut self, kind: impl Into<String>, factory: F) -> Result<()>
    where
        C: Contract,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let kind = ContractKind::new(kind);
        if kind.value().trim().is_empty() {
            return Err(HostError::Config("Contract kind must not be empty".to_string()));
        }
        if self.registry.contains_key(&kind) {
            return Err(HostError::AlreadyRegistered(kind.to_string()));
        }

        let table = Arc::new(C::methods());
        table.validate(&kind)?;
        let schema = table.schema(&kind);

        let deploy_kind = kind.clone();
        let deploy_table = Arc::clone(&table);
        let deploy: DeployFn = Box::new(move || {
            Box::new(Instance::new(
                deploy_kind.clone(),
                factory(),
                Arc::clone(&deploy_table),
            )) as Box<dyn DeployedContract>
        });

        let restore_kind = kind.clone();
        let restore: RestoreFn = Box::new(move |state: Value| {
            Instance::<C>::restore(restore_kind.clone(), state, Arc::clone(&table))
                .map(|instance| Box::new(instance) as Box<dyn DeployedContract>)
        });

        info!(
            "Registered contract kind {} ({} methods)",
            kind,
            schema.methods.len()
        );
        self.registry.insert(
            kind,
            Registration {
                schema,
                deploy,
                restore,
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<&ContractSchema> {
        let mut schemas: Vec<&ContractSchema> =
            self.registry.values().map(|r| &r.schema).collect();
        schemas.sort_by(|a, b| a.kind.cmp(&b.kind));
        schemas
    }

    /// # Errors
    /// Returns `HostError::UnknownKind` if `kind` was never registered.
    pub fn schema(&self, kind: &str) -> Result<&ContractSchema> {
        self.registration(kind).map(|r| &r.schema)
    }

    fn registration(&self, kind: &str) -> Result<&Registration> {
        self.registry
            .get(&ContractKind::new(kind))
            .ok_or_else(|| HostError::UnknownKind(kind.to_string()))
    }

    /// Constructs a new instance of `kind` and persists its initial state.
    ///
    /// # Errors
    /// Returns `HostError::UnknownKind`, or a storage error if the initial
    /// state cannot be persisted.
    pub async fn deploy(&self, kind: &str) -> Result<ContractAddress> {
        let registration = self.registration(kind)?;
        let contract = (registration.deploy)();
        let address = ContractAddress::derive(contract.kind(), &Uuid::new_v4());
        let record = StoredState::initial(
            address.clone(),
            contract.kind().clone(),
            contract.snapshot()?,
        );

        self.store.save(&record).await?;
        self.instances.write().await.insert(
            address.clone(),
            Arc::new(RwLock::new(LiveInstance { contract, record })),
        );

        info!("Deployed {} at {}", kind, address);
        Ok(address)
    }

    async fn instance(&self, address: &ContractAddress) -> Result<SharedInstance> {
        if let Some(live) = self.instances.read().await.get(address) {
            return Ok(Arc::clone(live));
        }

        let record = self
            .store
            .load(address)
            .await?
            .ok_or_else(|| HostError::ContractNotFound(address.to_string()))?;
        let registration = self.registration(record.kind.value())?;
        let contract = (registration.restore)(record.state.clone())?;
        debug!("Restored {} ({}) at version {}", address, record.kind, record.version);

        let mut instances = self.instances.write().await;
        let shared = instances
            .entry(address.clone())
            .or_insert_with(|| Arc::new(RwLock::new(LiveInstance { contract, record })));
        Ok(Arc::clone(shared))
    }

    /// Runs a view method. Views on one instance may run concurrently. A newer
    /// record in the store is adopted first.
    ///
    /// # Errors
    /// Returns `HostError::ContractNotFound`, `HostError::MethodNotFound`,
    /// `HostError::VisibilityMismatch` or `HostError::InvalidArguments`.
    pub async fn call_view(
        &self,
        address: &ContractAddress,
        method: &str,
        args: &Value,
    ) -> Result<Value> {
        let shared = self.instance(address).await?;
        let stored = self.store.load(address).await?;
        let current = shared.read().await.record.version;
        if let Some(newer) = stored.filter(|record| record.version > current) {
            let mut live = shared.write().await;
            self.adopt(&mut live, newer)?;
        }

        let live = shared.read().await;
        debug!("view {}::{}", address, method);
        live.contract.call_view(method, args)
    }

    /// Runs a write method under the instance's exclusive lock and persists
    /// the resulting state. The write starts from the newest stored record. On
    /// any failure the in-memory state is left as it was before the call.
    ///
    /// # Errors
    /// Returns `HostError::ContractNotFound`, `HostError::MethodNotFound`,
    /// `HostError::VisibilityMismatch`, `HostError::InvalidArguments`, or a
    /// storage error.
    pub async fn call_write(
        &self,
        address: &ContractAddress,
        method: &str,
        args: &Value,
    ) -> Result<WriteReceipt> {
        let shared = self.instance(address).await?;
        let mut guard = shared.write().await;
        let live = &mut *guard;
        if let Some(stored) = self.store.load(address).await? {
            self.adopt(live, stored)?;
        }
        debug!("write {}::{} at version {}", address, method, live.record.version);

        let outcome = match live.contract.call_write(method, args) {
            Ok(result) => match live.contract.snapshot() {
                Ok(state) => {
                    let next = live.record.next(state);
                    self.store.save(&next).await.map(|()| (result, next))
                }
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        match outcome {
            Ok((result, next)) => {
                live.record = next;
                Ok(WriteReceipt {
                    result,
                    version: live.record.version,
                })
            }
            Err(err) => {
                let registration = self.registration(live.record.kind.value())?;
                live.contract = (registration.restore)(live.record.state.clone())?;
                warn!("write {}::{} failed: {}", address, method, err);
                Err(err)
            }
        }
    }

    /// Replaces the live instance with a record another host persisted to
    /// the same store, if that record is newer.
    fn adopt(&self, live: &mut LiveInstance, stored: StoredState) -> Result<()> {
        if stored.version <= live.record.version {
            return Ok(());
        }
        let registration = self.registration(stored.kind.value())?;
        live.contract = (registration.restore)(stored.state.clone())?;
        debug!(
            "Caught up {} from version {} to {}",
            stored.address, live.record.version, stored.version
        );
        live.record = stored;
        Ok(())
    }

    /// # Errors
    /// Returns `HostError::ContractNotFound` for an unknown address.
    pub async fn snapshot(&self, address: &ContractAddress) -> Result<StoredState> {
        let shared = self.instance(address).await?;
        let live = shared.read().await.record.clone();
        Ok(match self.store.load(address).await? {
            Some(stored) if stored.version > live.version => stored,
            _ => live,
        })
    }

    /// # Errors
    /// Returns a storage error if the store cannot be listed.
    pub async fn instances(&self) -> Result<Vec<ContractAddress>> {
        self.store.list().await
    }
}
