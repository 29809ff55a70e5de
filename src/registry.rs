//! Named data sources, loaded and reloaded independently
//!
//! The registry publishes its state as an immutable snapshot behind an `Arc`.
//! A reload builds a fresh `TabularDataSource` and swaps in a new snapshot, so
//! readers holding the old one keep a consistent view until they drop it.

use crate::data_source::TabularDataSource;
use crate::logging;
use crate::table::Table;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

pub const PRIMARY_SOURCE: &str = "main";
pub const SECONDARY_SOURCE: &str = "secondary";
pub const LOGIC_SOURCE: &str = "logic";

pub const PRIMARY_LABEL: &str = "Aba principal";
pub const SECONDARY_LABEL: &str = "Aba secundária";
pub const LOGIC_LABEL: &str = "Lógica dos indicadores";

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provedor de planilhas não configurado: {0}")]
    NotConfigured(String),
    #[error("erro HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API de planilhas respondeu {status}: {body}")]
    Status { status: u16, body: String },
    #[error("dados malformados: {0}")]
    Malformed(String),
}

/// Source of raw tables, keyed by a range identifier such as `Sheet1!A1:Z1000`.
#[async_trait]
pub trait TableProvider: Send + Sync {
    /// Fetch a range. An empty table means "no data"; `Err` means the fetch failed.
    async fn fetch(&self, range: &str) -> Result<Table, ProviderError>;

    /// Read a single cell; `None` when it is blank.
    async fn fetch_cell(&self, range: &str) -> Result<Option<String>, ProviderError>;
}

/// Provider used when no spreadsheet is configured: every fetch fails.
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TableProvider for UnconfiguredProvider {
    async fn fetch(&self, _range: &str) -> Result<Table, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }

    async fn fetch_cell(&self, _range: &str) -> Result<Option<String>, ProviderError> {
        Err(ProviderError::NotConfigured(self.reason.clone()))
    }
}

/// A registered source: where it loads from and what it is called in replies.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub key: String,
    pub range: String,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct SourceSlot {
    pub spec: SourceSpec,
    pub source: Option<Arc<TabularDataSource>>,
    pub ready: bool,
    pub last_error: Option<String>,
}

/// Immutable view of every registered source.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    order: Vec<String>,
    slots: HashMap<String, SourceSlot>,
}

impl RegistrySnapshot {
    pub fn get(&self, key: &str) -> Option<Arc<TabularDataSource>> {
        self.slots
            .get(key)
            .filter(|slot| slot.ready)
            .and_then(|slot| slot.source.clone())
    }

    pub fn is_ready(&self, key: &str) -> bool {
        self.slots.get(key).map(|slot| slot.ready).unwrap_or(false)
    }

    pub fn slot(&self, key: &str) -> Option<&SourceSlot> {
        self.slots.get(key)
    }

    /// Slots in registration order.
    pub fn slots(&self) -> impl Iterator<Item = &SourceSlot> {
        self.order.iter().filter_map(|key| self.slots.get(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Loaded,
    Empty,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub key: String,
    pub label: String,
    pub status: LoadStatus,
    pub rows: usize,
}

impl SourceReport {
    pub fn is_ready(&self) -> bool {
        self.status == LoadStatus::Loaded
    }
}

pub struct DataSourceRegistry {
    provider: Arc<dyn TableProvider>,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
    reload_lock: Mutex<()>,
}

impl DataSourceRegistry {
    pub fn new(provider: Arc<dyn TableProvider>) -> Self {
        Self {
            provider,
            snapshot: RwLock::new(Arc::new(RegistrySnapshot::default())),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &Arc<dyn TableProvider> {
        &self.provider
    }

    /// Declare a source. Re-registering a key replaces its range and label and
    /// drops whatever was loaded for it.
    pub fn register(&self, key: &str, range: &str, label: &str) {
        let spec = SourceSpec {
            key: key.to_string(),
            range: range.to_string(),
            label: label.to_string(),
        };
        let slot = SourceSlot {
            spec,
            source: None,
            ready: false,
            last_error: None,
        };

        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = (**guard).clone();
        if !next.order.iter().any(|k| k == key) {
            next.order.push(key.to_string());
        }
        next.slots.insert(key.to_string(), slot);
        *guard = Arc::new(next);

        logging::log_data(None, &format!("Registered source '{}' -> {}", key, range));
    }

    /// Register the three standard sources in their fixed order.
    pub fn register_defaults(&self, primary_range: &str, secondary_range: &str, logic_range: &str) {
        self.register(PRIMARY_SOURCE, primary_range, PRIMARY_LABEL);
        self.register(SECONDARY_SOURCE, secondary_range, SECONDARY_LABEL);
        self.register(LOGIC_SOURCE, logic_range, LOGIC_LABEL);
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.snapshot().order.clone()
    }

    pub fn is_ready(&self, key: &str) -> bool {
        self.snapshot().is_ready(key)
    }

    pub fn get(&self, key: &str) -> Option<Arc<TabularDataSource>> {
        self.snapshot().get(key)
    }

    /// Load one source. Failures are recorded on the slot, never returned.
    /// Unknown keys report `Unknown`.
    pub async fn load(&self, key: &str) -> SourceReport {
        let _guard = self.reload_lock.lock().await;
        self.load_locked(key).await
    }

    /// Reload every registered source, in registration order.
    pub async fn reload_all(&self) -> Vec<SourceReport> {
        let _guard = self.reload_lock.lock().await;
        let mut reports = Vec::new();
        for key in self.keys() {
            reports.push(self.load_locked(&key).await);
        }
        reports
    }

    async fn load_locked(&self, key: &str) -> SourceReport {
        let Some(spec) = self.snapshot().slot(key).map(|slot| slot.spec.clone()) else {
            logging::log_error(None, &format!("Unknown source '{}'", key));
            return SourceReport {
                key: key.to_string(),
                label: key.to_string(),
                status: LoadStatus::Unknown,
                rows: 0,
            };
        };

        logging::log_data(None, &format!("Loading source '{}' from {}", key, spec.range));

        let (source, status, error) = match self.provider.fetch(&spec.range).await {
            Ok(table) if table.is_empty() => {
                logging::log_data(None, &format!("Source '{}' returned no data", key));
                (None, LoadStatus::Empty, Some("sem dados".to_string()))
            }
            Ok(table) => match TabularDataSource::new(table) {
                Ok(source) => {
                    logging::log_data(
                        None,
                        &format!(
                            "Source '{}' loaded: {} rows, {} columns",
                            key,
                            source.row_count(),
                            source.table().column_count()
                        ),
                    );
                    (Some(Arc::new(source)), LoadStatus::Loaded, None)
                }
                Err(e) => (None, LoadStatus::Empty, Some(e.to_string())),
            },
            Err(e) => {
                logging::log_error(None, &format!("Failed to load source '{}': {}", key, e));
                (None, LoadStatus::Failed, Some(e.to_string()))
            }
        };

        let rows = source.as_ref().map(|s| s.row_count()).unwrap_or(0);
        let slot = SourceSlot {
            spec: spec.clone(),
            ready: source.is_some(),
            source,
            last_error: error,
        };

        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = (**guard).clone();
        next.slots.insert(key.to_string(), slot);
        *guard = Arc::new(next);

        SourceReport {
            key: key.to_string(),
            label: spec.label,
            status,
            rows,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeProvider;
    use super::*;

    fn registry(provider: FakeProvider) -> (Arc<FakeProvider>, DataSourceRegistry) {
        let provider = Arc::new(provider);
        let registry = DataSourceRegistry::new(provider.clone());
        registry.register(PRIMARY_SOURCE, "Main!A1:Z", PRIMARY_LABEL);
        registry.register(SECONDARY_SOURCE, "Second!A1:Z", SECONDARY_LABEL);
        (provider, registry)
    }

    #[tokio::test]
    async fn test_load_sets_readiness() {
        let (_, registry) = registry(
            FakeProvider::default().with_table("Main!A1:Z", &["Produto", "Qtd"], &[&["a", "1"]]),
        );

        let report = registry.load(PRIMARY_SOURCE).await;
        assert_eq!(report.status, LoadStatus::Loaded);
        assert_eq!(report.rows, 1);
        assert!(registry.is_ready(PRIMARY_SOURCE));
        assert!(registry.get(PRIMARY_SOURCE).is_some());

        // the secondary range has no data: not ready, primary unaffected
        let report = registry.load(SECONDARY_SOURCE).await;
        assert_eq!(report.status, LoadStatus::Empty);
        assert!(!registry.is_ready(SECONDARY_SOURCE));
        assert!(registry.is_ready(PRIMARY_SOURCE));
    }

    #[tokio::test]
    async fn test_failed_reload_clears_previous_source() {
        let (provider, registry) = registry(
            FakeProvider::default().with_table("Main!A1:Z", &["Produto", "Qtd"], &[&["a", "1"]]),
        );
        registry.load(PRIMARY_SOURCE).await;
        assert!(registry.is_ready(PRIMARY_SOURCE));

        provider.set_failure("Main!A1:Z");
        let report = registry.load(PRIMARY_SOURCE).await;
        assert_eq!(report.status, LoadStatus::Failed);
        assert!(!registry.is_ready(PRIMARY_SOURCE));
        assert!(registry.get(PRIMARY_SOURCE).is_none());
        assert!(registry
            .snapshot()
            .slot(PRIMARY_SOURCE)
            .and_then(|s| s.last_error.clone())
            .is_some());
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_reload() {
        let (provider, registry) = registry(
            FakeProvider::default().with_table("Main!A1:Z", &["Produto", "Qtd"], &[&["a", "1"]]),
        );
        registry.load(PRIMARY_SOURCE).await;

        let before = registry.snapshot();
        provider.set_table("Main!A1:Z", &["Produto", "Qtd"], &[&["a", "1"], &["b", "2"]]);
        registry.load(PRIMARY_SOURCE).await;

        assert_eq!(before.get(PRIMARY_SOURCE).unwrap().row_count(), 1);
        assert_eq!(registry.get(PRIMARY_SOURCE).unwrap().row_count(), 2);
    }

    #[tokio::test]
    async fn test_reload_all_reports_in_registration_order() {
        let (provider, registry) = registry(
            FakeProvider::default()
                .with_table("Main!A1:Z", &["Produto", "Qtd"], &[&["a", "1"]])
                .with_failure("Second!A1:Z"),
        );

        let reports = registry.reload_all().await;
        let keys: Vec<&str> = reports.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec![PRIMARY_SOURCE, SECONDARY_SOURCE]);
        assert!(reports[0].is_ready());
        assert_eq!(reports[1].status, LoadStatus::Failed);
        assert_eq!(provider.fetches.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_register_defaults_order() {
        let registry = DataSourceRegistry::new(Arc::new(FakeProvider::default()));
        registry.register_defaults("A", "B", "C");
        assert_eq!(registry.keys(), vec![PRIMARY_SOURCE, SECONDARY_SOURCE, LOGIC_SOURCE]);
        assert_eq!(
            registry.snapshot().slot(LOGIC_SOURCE).map(|s| s.spec.label.as_str()),
            Some(LOGIC_LABEL)
        );
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let (_, registry) = registry(FakeProvider::default());
        let report = registry.load("nope").await;
        assert_eq!(report.status, LoadStatus::Unknown);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails() {
        let registry = DataSourceRegistry::new(Arc::new(UnconfiguredProvider::new("GOOGLE_SHEET_ID")));
        registry.register(PRIMARY_SOURCE, "Main!A1:Z", "Aba principal");
        let report = registry.load(PRIMARY_SOURCE).await;
        assert_eq!(report.status, LoadStatus::Failed);
        assert!(!registry.is_ready(PRIMARY_SOURCE));
    }
}
