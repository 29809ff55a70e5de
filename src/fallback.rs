//! Generative fallback: when to call the language model and how

use crate::data_source::TabularDataSource;
use crate::formatter::format_table;
use crate::logging;
use async_trait::async_trait;
use serde::Serialize;

/// Prefix marking answers that came from the language model.
pub const AI_MARKER: &str = "🤖 ";

/// Phrases that suggest an open-ended question.
const COMPLEX_KEYWORDS: [&str; 16] = [
    "por que",
    "porque",
    "explique",
    "como funciona",
    "qual a diferença",
    "compare",
    "análise",
    "sugestão",
    "recomenda",
    "o que você acha",
    "me ajude",
    "não entendi",
    "dúvida",
    "quem",
    "o que é",
    "como",
];

/// Short questions still go to the model when they contain one of these.
const SHORT_OVERRIDES: [&str; 3] = ["quem", "o que", "como"];

/// Phrases in a reply that mean the router did not understand.
const FALLBACK_INDICATORS: [&str; 6] = [
    "não encontrei",
    "não entendi",
    "não consegui",
    "tente reformular",
    "não sei",
    "❓",
];

const SAMPLE_ROWS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum GenerativeError {
    #[error("erro HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API respondeu {status}: {message}")]
    Api { status: u16, message: String },
    #[error("resposta vazia do modelo")]
    EmptyResponse,
}

/// Compact description of a data source handed to the model as context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub sample: String,
}

impl DataSummary {
    pub fn from_source(source: &TabularDataSource) -> Self {
        Self {
            columns: source.column_names(),
            row_count: source.row_count(),
            sample: format_table(&source.preview(SAMPLE_ROWS)),
        }
    }

    /// Column list and row count, one per line.
    pub fn overview(&self) -> String {
        format!(
            "Colunas: {}\nRegistros: {}",
            self.columns.join(", "),
            self.row_count
        )
    }
}

/// A language model that can answer a question, optionally with data context.
#[async_trait]
pub trait GenerativeCollaborator: Send + Sync {
    async fn answer(&self, question: &str, context: Option<&DataSummary>) -> Result<String, GenerativeError>;

    /// Name used in logs and health output.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The router's own reply signals it did not understand.
    UnhelpfulResponse,
    /// The question looks open-ended.
    ComplexQuestion,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::UnhelpfulResponse => "unhelpful_response",
            FallbackReason::ComplexQuestion => "complex_question",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FallbackDecider;

impl FallbackDecider {
    pub fn new() -> Self {
        Self
    }

    /// Heuristic on the raw question.
    pub fn should_use_ai(&self, question: &str) -> bool {
        let lower = question.to_lowercase();

        if COMPLEX_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return true;
        }

        let word_count = question.split_whitespace().count();
        if word_count <= 3 && !SHORT_OVERRIDES.iter().any(|kw| lower.contains(kw)) {
            return false;
        }

        word_count > 15
    }

    /// Heuristic on the router's reply.
    pub fn should_fallback(&self, response: &str) -> bool {
        let lower = response.to_lowercase();
        FALLBACK_INDICATORS.iter().any(|i| lower.contains(i))
    }

    /// Either trigger suffices; the reply check runs first.
    pub fn decide(&self, question: &str, response: &str) -> Option<FallbackReason> {
        if self.should_fallback(response) {
            Some(FallbackReason::UnhelpfulResponse)
        } else if self.should_use_ai(question) {
            Some(FallbackReason::ComplexQuestion)
        } else {
            None
        }
    }
}

/// Ask the model and mark its answer. Any failure returns `previous` unchanged.
pub async fn augment(
    collaborator: &dyn GenerativeCollaborator,
    question: &str,
    context: Option<&DataSummary>,
    previous: &str,
    request_id: Option<&str>,
) -> String {
    logging::log_fallback(
        request_id,
        &format!(
            "Calling {} (context: {})",
            collaborator.name(),
            context.map(|c| c.row_count.to_string()).unwrap_or_else(|| "none".to_string())
        ),
    );

    match collaborator.answer(question, context).await {
        Ok(text) if !text.trim().is_empty() => format!("{}{}", AI_MARKER, text.trim()),
        Ok(_) => {
            logging::log_error(request_id, "Generative answer was empty, keeping router reply");
            previous.to_string()
        }
        Err(e) => {
            logging::log_error(request_id, &format!("Generative call failed: {}", e));
            previous.to_string()
        }
    }
}
