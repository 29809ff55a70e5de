pub mod anthropic;
pub mod config;
pub mod data_source;
pub mod extract;
pub mod fallback;
pub mod formatter;
pub mod groq;
pub mod intents;
pub mod logging;
pub mod prompts;
pub mod registry;
pub mod router;
pub mod sheets;
pub mod table;

pub use config::{AiProvider, Config, ConfigError};
pub use data_source::{QueryError, QueryResult, Statistics, TabularDataSource};
pub use fallback::{DataSummary, FallbackDecider, GenerativeCollaborator, GenerativeError};
pub use registry::{DataSourceRegistry, ProviderError, TableProvider};
pub use router::{QuestionRouter, RefreshScope, RouterState};
pub use table::{Cell, Column, Table, TableError};

use anthropic::AnthropicClient;
use groq::GroqClient;
use registry::{RegistrySnapshot, UnconfiguredProvider, PRIMARY_SOURCE, SECONDARY_SOURCE};
use serde::{Deserialize, Serialize};
use sheets::{SheetsAuth, SheetsClient};
use std::sync::Arc;
use uuid::Uuid;

// ============ Health ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub ai_enabled: bool,
    pub sheets_enabled: bool,
    pub processor_ready: bool,
}

// ============ Assistant ============

/// Application context a webhook transport holds (usually in an `Arc`) and
/// calls once per inbound message.
pub struct Assistant {
    router: QuestionRouter,
    generative: Option<Arc<dyn GenerativeCollaborator>>,
    decider: FallbackDecider,
    sheets_enabled: bool,
}

impl Assistant {
    /// Wire an assistant over an explicit provider and optional model. The
    /// standard sources are registered but not loaded; call `initialize`.
    pub fn new(
        provider: Arc<dyn TableProvider>,
        generative: Option<Arc<dyn GenerativeCollaborator>>,
        config: &Config,
    ) -> Self {
        let registry = Arc::new(DataSourceRegistry::new(provider));
        registry.register_defaults(&config.primary_range, &config.secondary_range, &config.logic_range);

        Self {
            router: QuestionRouter::new(registry, &config.summary_cell, config.preview_rows),
            generative,
            decider: FallbackDecider::new(),
            sheets_enabled: true,
        }
    }

    /// Build everything from configuration and load the data. Configuration
    /// problems are logged, never returned: the assistant still starts and
    /// reports itself not ready.
    pub async fn from_config(config: &Config) -> Self {
        if let Err(e) = logging::init_logging(config.log_dir.as_deref()) {
            eprintln!("Failed to initialize logging: {}", e);
        }
        if let Some(dir) = &config.log_dir {
            // Clean up old log files (keep last 7 days)
            let _ = logging::cleanup_old_logs(dir);
        }

        let (provider, sheets_enabled) = build_provider(config);
        let generative = build_generative(config);

        let mut assistant = Self::new(provider, generative, config);
        assistant.sheets_enabled = sheets_enabled;

        let state = assistant.initialize().await;
        logging::log_startup(&format!(
            "Assistant started: router {:?}, sheets {}, ai {}",
            state,
            sheets_enabled,
            assistant.generative.as_ref().map(|g| g.name()).unwrap_or("disabled")
        ));

        assistant
    }

    pub async fn initialize(&self) -> RouterState {
        self.router.initialize().await
    }

    pub fn router(&self) -> &QuestionRouter {
        &self.router
    }

    /// Route the message and, when the router is ready and the decider says
    /// so, let the language model answer instead.
    pub async fn answer(&self, question: &str) -> String {
        let request_id = Uuid::new_v4().to_string();
        let rid = Some(request_id.as_str());

        logging::log_routing(rid, &format!("Question: {}", question));
        let snapshot = self.router.registry().snapshot();
        let response = self.router.process_snapshot(&snapshot, question, rid).await;

        if self.router.state_of(&snapshot) != RouterState::Ready {
            return response;
        }
        let Some(generative) = &self.generative else {
            return response;
        };
        let Some(reason) = self.decider.decide(question, &response) else {
            return response;
        };

        logging::log_fallback(rid, &format!("Fallback triggered: {}", reason.as_str()));
        let context = data_summary(&snapshot);
        fallback::augment(generative.as_ref(), question, context.as_ref(), &response, rid).await
    }

    pub async fn refresh(&self, scope: RefreshScope) -> String {
        self.router.refresh(scope).await
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok".to_string(),
            ai_enabled: self.generative.is_some(),
            sheets_enabled: self.sheets_enabled,
            processor_ready: self.router.is_ready(),
        }
    }
}

/// Context for the model: the primary source when loaded, else the secondary.
fn data_summary(snapshot: &RegistrySnapshot) -> Option<DataSummary> {
    snapshot
        .get(PRIMARY_SOURCE)
        .or_else(|| snapshot.get(SECONDARY_SOURCE))
        .map(|source| DataSummary::from_source(&source))
}

fn build_provider(config: &Config) -> (Arc<dyn TableProvider>, bool) {
    if let Err(e) = config.validate() {
        logging::log_error(None, &format!("Google Sheets disabled: {}", e));
        return (Arc::new(UnconfiguredProvider::new(e.to_string())), false);
    }

    let auth = match (&config.sheets_access_token, &config.sheets_api_key) {
        (Some(token), _) => SheetsAuth::AccessToken(token.clone()),
        (None, Some(key)) => SheetsAuth::ApiKey(key.clone()),
        (None, None) => return (Arc::new(UnconfiguredProvider::new("GOOGLE_SHEETS_API_KEY")), false),
    };
    let spreadsheet_id = config.spreadsheet_id.as_deref().unwrap_or_default();

    match SheetsClient::new(spreadsheet_id, auth) {
        Ok(client) => (Arc::new(client), true),
        Err(e) => {
            logging::log_error(None, &format!("Failed to build Sheets client: {}", e));
            (Arc::new(UnconfiguredProvider::new(e.to_string())), false)
        }
    }
}

fn build_generative(config: &Config) -> Option<Arc<dyn GenerativeCollaborator>> {
    let Some(key) = config.ai_api_key() else {
        logging::log_startup(&format!(
            "No API key for {:?}, generative fallback disabled",
            config.ai_provider
        ));
        return None;
    };

    let client: Result<Arc<dyn GenerativeCollaborator>, GenerativeError> = match config.ai_provider {
        AiProvider::Groq => GroqClient::new(key).map(|c| Arc::new(c) as Arc<dyn GenerativeCollaborator>),
        AiProvider::Anthropic => {
            AnthropicClient::new(key).map(|c| Arc::new(c) as Arc<dyn GenerativeCollaborator>)
        }
    };

    match client {
        Ok(client) => Some(client),
        Err(e) => {
            logging::log_error(None, &format!("Failed to build generative client: {}", e));
            None
        }
    }
}
