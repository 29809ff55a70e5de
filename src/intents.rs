//! Ordered intent rules
//!
//! Rules are evaluated top to bottom against the lowercased, trimmed message
//! and the first match wins. Triggers overlap ("explicar todos" also contains
//! "explica", "resumo por produto" also contains "produto"), so the order below
//! is part of the behavior.

use crate::registry::{LOGIC_SOURCE, PRIMARY_SOURCE, SECONDARY_SOURCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    ListIndicators,
    ExplainAllIndicators,
    ExplainIndicator,
    Help,
    ListColumns,
    PrimaryPreview,
    SecondaryPreview,
    Refresh,
    Status,
    TotalQuantity,
    WeightedAverage,
    ProductSummary,
    TopProducts,
    SearchProduct,
    Statistics,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::ListIndicators => "list_indicators",
            Intent::ExplainAllIndicators => "explain_all_indicators",
            Intent::ExplainIndicator => "explain_indicator",
            Intent::Help => "help",
            Intent::ListColumns => "list_columns",
            Intent::PrimaryPreview => "primary_preview",
            Intent::SecondaryPreview => "secondary_preview",
            Intent::Refresh => "refresh",
            Intent::Status => "status",
            Intent::TotalQuantity => "total_quantity",
            Intent::WeightedAverage => "weighted_average",
            Intent::ProductSummary => "product_summary",
            Intent::TopProducts => "top_products",
            Intent::SearchProduct => "search_product",
            Intent::Statistics => "statistics",
        }
    }
}

/// One routing rule: a trigger over the lowercased message, the intent it
/// selects and the data source the handler reads.
pub struct IntentRule {
    pub intent: Intent,
    pub matches: fn(&str) -> bool,
    pub source: Option<&'static str>,
}

const LIST_INDICATOR_TRIGGERS: [&str; 3] =
    ["quais indicadores", "listar indicadores", "todos os indicadores"];
const EXPLAIN_ALL_TRIGGERS: [&str; 3] = ["explica todos", "explicar todos", "explicação de todos"];
const EXPLAIN_TRIGGERS: [&str; 3] = ["explica", "lógica", "logica"];
const HELP_TRIGGERS: [&str; 3] = ["help", "comandos", "ajuda"];
const COLUMN_TRIGGERS: [&str; 4] = ["colunas", "columns", "campos", "fields"];
const PRIMARY_PREVIEW_TRIGGERS: [&str; 8] = [
    "!indicadores",
    "!indicador",
    "!performance",
    "!table",
    "prévia",
    "preview",
    "mostrar dados",
    "show data",
];
const SECONDARY_PREVIEW_TRIGGERS: [&str; 2] = ["!leftover", "!sobras"];
const REFRESH_TRIGGERS: [&str; 4] = ["recarregar", "atualizar", "refresh", "reload"];
const STATUS_TRIGGERS: [&str; 1] = ["status"];
const TOTAL_TRIGGERS: [&str; 3] = ["quantidade total", "total de quantidade", "soma quantidade"];
const WEIGHTED_TRIGGERS: [&str; 3] = ["média ponderada", "weighted average", "ponderada"];
const SUMMARY_TRIGGERS: [&str; 3] = ["resumo por produto", "agrupar por produto", "group by product"];
const TOP_TRIGGERS: [&str; 4] = ["top", "maiores", "principais", "melhores"];
const SEARCH_TRIGGERS: [&str; 5] = ["buscar", "procurar", "search", "find", "produto"];
const STATISTICS_TRIGGERS: [&str; 5] = ["estatística", "estatistica", "stats", "resumo", "summary"];

fn contains_any(text: &str, triggers: &[&str]) -> bool {
    triggers.iter().any(|t| text.contains(t))
}

pub static INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::ListIndicators,
        matches: |t| contains_any(t, &LIST_INDICATOR_TRIGGERS) && !t.contains("explica"),
        source: Some(LOGIC_SOURCE),
    },
    IntentRule {
        intent: Intent::ExplainAllIndicators,
        matches: |t| contains_any(t, &EXPLAIN_ALL_TRIGGERS),
        source: Some(LOGIC_SOURCE),
    },
    IntentRule {
        intent: Intent::ExplainIndicator,
        matches: |t| contains_any(t, &EXPLAIN_TRIGGERS),
        source: Some(LOGIC_SOURCE),
    },
    IntentRule {
        intent: Intent::Help,
        matches: |t| contains_any(t, &HELP_TRIGGERS),
        source: None,
    },
    IntentRule {
        intent: Intent::ListColumns,
        matches: |t| contains_any(t, &COLUMN_TRIGGERS),
        source: None,
    },
    IntentRule {
        intent: Intent::PrimaryPreview,
        matches: |t| contains_any(t, &PRIMARY_PREVIEW_TRIGGERS),
        source: Some(PRIMARY_SOURCE),
    },
    IntentRule {
        intent: Intent::SecondaryPreview,
        matches: |t| contains_any(t, &SECONDARY_PREVIEW_TRIGGERS),
        source: Some(SECONDARY_SOURCE),
    },
    IntentRule {
        intent: Intent::Refresh,
        matches: |t| contains_any(t, &REFRESH_TRIGGERS),
        source: None,
    },
    IntentRule {
        intent: Intent::Status,
        matches: |t| contains_any(t, &STATUS_TRIGGERS),
        source: None,
    },
    IntentRule {
        intent: Intent::TotalQuantity,
        matches: |t| contains_any(t, &TOTAL_TRIGGERS),
        source: Some(PRIMARY_SOURCE),
    },
    IntentRule {
        intent: Intent::WeightedAverage,
        matches: |t| contains_any(t, &WEIGHTED_TRIGGERS),
        source: Some(PRIMARY_SOURCE),
    },
    IntentRule {
        intent: Intent::ProductSummary,
        matches: |t| contains_any(t, &SUMMARY_TRIGGERS),
        source: Some(PRIMARY_SOURCE),
    },
    IntentRule {
        intent: Intent::TopProducts,
        matches: |t| contains_any(t, &TOP_TRIGGERS),
        source: Some(PRIMARY_SOURCE),
    },
    IntentRule {
        intent: Intent::SearchProduct,
        matches: |t| contains_any(t, &SEARCH_TRIGGERS),
        source: Some(PRIMARY_SOURCE),
    },
    IntentRule {
        intent: Intent::Statistics,
        matches: |t| contains_any(t, &STATISTICS_TRIGGERS),
        source: Some(PRIMARY_SOURCE),
    },
];

/// First rule matching the message. `text` is lowercased and trimmed here.
pub fn classify(text: &str) -> Option<&'static IntentRule> {
    let lower = text.to_lowercase();
    let lower = lower.trim();
    INTENT_RULES.iter().find(|rule| (rule.matches)(lower))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(text: &str) -> Option<Intent> {
        classify(text).map(|r| r.intent)
    }

    #[test]
    fn test_indicator_rules_come_first() {
        assert_eq!(intent("Quais indicadores existem?"), Some(Intent::ListIndicators));
        assert_eq!(intent("explicar todos os indicadores"), Some(Intent::ExplainAllIndicators));
        assert_eq!(intent("Explica o TMA"), Some(Intent::ExplainIndicator));
        assert_eq!(intent("qual a lógica do backlog"), Some(Intent::ExplainIndicator));
        // "explicar" outranks the generic help trigger
        assert_eq!(intent("ajuda para explicar o TMA"), Some(Intent::ExplainIndicator));
    }

    #[test]
    fn test_list_indicators_excludes_explain() {
        assert_eq!(
            intent("quais indicadores você explica?"),
            Some(Intent::ExplainIndicator)
        );
        assert_eq!(
            intent("todos os indicadores, explica"),
            Some(Intent::ExplainIndicator)
        );
    }

    #[test]
    fn test_command_order() {
        assert_eq!(intent("ajuda"), Some(Intent::Help));
        assert_eq!(intent("comandos das colunas"), Some(Intent::Help));
        assert_eq!(intent("Colunas"), Some(Intent::ListColumns));
        assert_eq!(intent("!Indicadores"), Some(Intent::PrimaryPreview));
        assert_eq!(intent("  !SOBRAS  "), Some(Intent::SecondaryPreview));
        assert_eq!(intent("!Leftover"), Some(Intent::SecondaryPreview));
        assert_eq!(intent("recarregar"), Some(Intent::Refresh));
        assert_eq!(intent("status"), Some(Intent::Status));
    }

    #[test]
    fn test_analytic_intents() {
        assert_eq!(intent("quantidade total caneta"), Some(Intent::TotalQuantity));
        assert_eq!(intent("média ponderada de preço por quantidade"), Some(Intent::WeightedAverage));
        assert_eq!(intent("resumo por produto"), Some(Intent::ProductSummary));
        assert_eq!(intent("top 5"), Some(Intent::TopProducts));
        assert_eq!(intent("buscar notebook"), Some(Intent::SearchProduct));
        assert_eq!(intent("estatísticas de preço"), Some(Intent::Statistics));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(intent("bom dia"), None);
        assert_eq!(intent(""), None);
    }

    #[test]
    fn test_sources() {
        assert_eq!(classify("explica tma").unwrap().source, Some(LOGIC_SOURCE));
        assert_eq!(classify("!sobras").unwrap().source, Some(SECONDARY_SOURCE));
        assert_eq!(classify("top 3").unwrap().source, Some(PRIMARY_SOURCE));
        assert_eq!(classify("ajuda").unwrap().source, None);
    }
}
