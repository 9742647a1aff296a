//! Shared application state: the hosted vault and its capabilities

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use chrono::Utc;
use solana_sdk::signature::Signature;
use tokio::sync::Mutex;
use tracing::{info, warn};
use volo_vault::{
    oracle::OracleConfig, Address, AdminCap, AssetType, OperatorCap, Vault, VaultConfig,
};

use crate::{
    error::{BackendError, Result},
    services::{RequestVerifier, UserAction},
    types::{Config, RecordedEvent},
};

/// Events kept for `/api/vault/events`; older ones are dropped
const MAX_RECORDED_EVENTS: usize = 4_096;

/// Current wall-clock time in milliseconds
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// The vault together with the capabilities the backend acts with
pub struct VaultHost {
    pub vault: Vault,
    pub admin: AdminCap,
    pub operator: OperatorCap,
    events: VecDeque<RecordedEvent>,
    next_sequence: u64,
    /// Accepted request signatures by signed timestamp
    used_signatures: HashMap<Signature, i64>,
}

impl VaultHost {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let now = now_ms();
        let vault_config = VaultConfig {
            loss_tolerance_bps: config.loss_tolerance_bps,
            ..VaultConfig::default()
        };
        let oracle_config = OracleConfig {
            staleness_window_ms: config.oracle_staleness_ms,
            ..OracleConfig::default()
        };

        let (mut vault, admin) = Vault::new(
            AssetType::new(config.principal_asset.clone()),
            config.principal_decimals,
            vault_config,
            oracle_config,
            now,
        )?;
        let operator = vault.create_operator_cap(&admin)?;

        info!(
            vault = %vault.id(),
            principal = %vault.principal(),
            operator_cap = %operator.id(),
            "Vault initialized"
        );

        let mut host = Self {
            vault,
            admin,
            operator,
            events: VecDeque::new(),
            next_sequence: 1,
            used_signatures: HashMap::new(),
        };
        host.record_events();
        Ok(host)
    }

    /// Move events emitted by the vault into the bounded log
    fn record_events(&mut self) {
        let recorded_at_ms = now_ms();
        for event in self.vault.take_events() {
            self.events.push_back(RecordedEvent {
                sequence: self.next_sequence,
                recorded_at_ms,
                event,
            });
            self.next_sequence += 1;
        }
        while self.events.len() > MAX_RECORDED_EVENTS {
            self.events.pop_front();
        }
    }

    /// Accept each signature once. Entries older than the tolerance window
    /// are dropped since their requests would be rejected as expired anyway.
    fn consume_signature(
        &mut self,
        signature: Signature,
        timestamp: i64,
        tolerance_secs: i64,
    ) -> Result<()> {
        let now = Utc::now().timestamp();
        self.used_signatures
            .retain(|_, signed_at| (now - *signed_at).abs() <= tolerance_secs);

        if self.used_signatures.contains_key(&signature) {
            return Err(BackendError::RequestReplayed);
        }
        self.used_signatures.insert(signature, timestamp);
        Ok(())
    }

    pub fn events_since(&self, since: u64) -> Vec<RecordedEvent> {
        self.events
            .iter()
            .filter(|e| e.sequence > since)
            .cloned()
            .collect()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub host: Arc<Mutex<VaultHost>>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let host = VaultHost::new(&config)?;
        Ok(Self {
            config,
            host: Arc::new(Mutex::new(host)),
        })
    }

    /// Run a vault call under the lock. Emitted events are recorded even
    /// when the call fails.
    pub async fn with_vault<T>(
        &self,
        f: impl FnOnce(&mut VaultHost) -> volo_vault::Result<T>,
    ) -> Result<T> {
        let mut host = self.host.lock().await;
        let result = f(&mut *host);
        host.record_events();
        Ok(result?)
    }

    /// Check a signed user request and return the wallet acting.
    ///
    /// The timestamp must fall inside the tolerance window, the signature
    /// must cover `action` and may only be used once.
    pub async fn authorize(
        &self,
        wallet: &Address,
        timestamp: i64,
        request_signature: &str,
        action: UserAction,
    ) -> Result<Address> {
        let tolerance = self.config.timestamp_tolerance_secs;
        RequestVerifier::validate_timestamp(timestamp, tolerance)?;
        let signature = RequestVerifier::parse_signature(request_signature)?;

        if let Err(err) =
            RequestVerifier::verify_request_signature(wallet, timestamp, &action, &signature)
        {
            warn!(wallet = %wallet, error = %err, "Rejected user request");
            return Err(err);
        }

        self.host
            .lock()
            .await
            .consume_signature(signature, timestamp, tolerance)?;
        Ok(*wallet)
    }

    /// Read-only access under the lock
    pub async fn read<T>(&self, f: impl FnOnce(&VaultHost) -> T) -> T {
        let host = self.host.lock().await;
        f(&*host)
    }
}
