// In-memory ledger and gateway collaborators with scripted behaviour.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;

use crate::error::{GatewayError, LedgerError};
use crate::gateway::{Gateway, SubmitRequest};
use crate::ledger::{EventStream, Ledger, Provider, RawChainEvent, TxReceipt};
use crate::model::{Address, LeaseId, ServiceStatus};

/// One subscription's worth of stream items.
pub struct Script {
    pub items: Vec<Result<RawChainEvent, LedgerError>>,
    /// Keep the stream open after the items instead of ending it.
    pub hang: bool,
}

#[derive(Default)]
pub struct FakeLedger {
    pub height: AtomicU64,
    pub fail_height: AtomicBool,
    pub providers: Mutex<HashMap<Address, Provider>>,
    pub provider_failures: AtomicU32,
    pub provider_calls: AtomicU32,
    pub scripts: Mutex<VecDeque<Script>>,
    pub subscribe_failures: Mutex<VecDeque<LedgerError>>,
    pub subscribed_from: Mutex<Vec<u64>>,
    pub broadcasts: Mutex<Vec<Vec<u8>>>,
}

impl FakeLedger {
    pub fn with_provider(self, address: &str, host_uri: &str) -> Self {
        self.providers.lock().insert(
            Address::new(address),
            Provider {
                owner: Address::new(address),
                host_uri: host_uri.to_string(),
            },
        );
        self
    }

    pub fn push_script(&self, items: Vec<Result<RawChainEvent, LedgerError>>, hang: bool) {
        self.scripts.lock().push_back(Script { items, hang });
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn subscribe(&self, _topic: &str, from_height: u64) -> Result<EventStream, LedgerError> {
        self.subscribed_from.lock().push(from_height);
        if let Some(err) = self.subscribe_failures.lock().pop_front() {
            return Err(err);
        }
        let script = self.scripts.lock().pop_front().unwrap_or(Script {
            items: Vec::new(),
            hang: true,
        });
        let items = futures::stream::iter(script.items);
        if script.hang {
            Ok(items.chain(futures::stream::pending()).boxed())
        } else {
            Ok(items.boxed())
        }
    }

    async fn provider(&self, address: &Address) -> Result<Provider, LedgerError> {
        self.provider_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.provider_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.provider_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(LedgerError::Transport("connection reset".into()));
        }
        self.providers
            .lock()
            .get(address)
            .cloned()
            .ok_or_else(|| LedgerError::ProviderNotFound(address.to_string()))
    }

    async fn latest_height(&self) -> Result<u64, LedgerError> {
        if self.fail_height.load(Ordering::SeqCst) {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn broadcast(&self, signed_tx: &[u8]) -> Result<TxReceipt, LedgerError> {
        self.broadcasts.lock().push(signed_tx.to_vec());
        Ok(TxReceipt {
            hash: hex::encode_upper(signed_tx),
            code: 0,
            log: String::new(),
        })
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub submissions: Mutex<Vec<(String, SubmitRequest)>>,
    /// Transient failures injected before submissions succeed.
    pub submit_failures: AtomicU32,
    pub submit_permanent: Mutex<Option<GatewayError>>,
    pub statuses: Mutex<HashMap<LeaseId, Vec<ServiceStatus>>>,
    pub status_failures: AtomicU32,
    pub status_calls: AtomicU32,
    /// Delay before every lease status answer.
    pub status_delay: Mutex<std::time::Duration>,
}

impl FakeGateway {
    pub fn set_status(&self, lease: &LeaseId, services: Vec<ServiceStatus>) {
        self.statuses.lock().insert(lease.clone(), services);
    }

    pub fn submissions(&self) -> Vec<(String, SubmitRequest)> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn submit_manifest(&self, host_uri: &str, req: &SubmitRequest) -> Result<(), GatewayError> {
        if let Some(err) = self.submit_permanent.lock().clone() {
            return Err(err);
        }
        let remaining = self.submit_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.submit_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(GatewayError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.submissions
            .lock()
            .push((host_uri.to_string(), req.clone()));
        Ok(())
    }

    async fn lease_status(&self, _host_uri: &str, lease: &LeaseId) -> Result<Vec<ServiceStatus>, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.status_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.status_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(GatewayError::Transport("connection refused".into()));
        }
        Ok(self.statuses.lock().get(lease).cloned().unwrap_or_default())
    }
}

pub fn service(name: &str, available: u32, total: u32) -> ServiceStatus {
    ServiceStatus {
        name: name.to_string(),
        available,
        total,
        uris: vec![format!("{name}.ingress.example")],
    }
}
