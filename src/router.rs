//! Question routing: readiness gate, intent dispatch and reply composition

use crate::data_source::{QueryError, QueryResult, TabularDataSource};
use crate::extract::{extract_number, extract_product_name, mentioned_columns};
use crate::formatter::{format_cell, format_number, format_optional, format_table};
use crate::intents::{self, Intent, IntentRule};
use crate::logging;
use crate::registry::{
    DataSourceRegistry, RegistrySnapshot, SourceReport, LOGIC_SOURCE, PRIMARY_SOURCE, SECONDARY_SOURCE,
};
use crate::table::{Column, Table};
use chrono::{Duration, Local};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

pub const LOADING_MESSAGE: &str = "⌛ Ainda estou carregando os dados. Tente novamente em instantes.";
pub const NOT_CONFIGURED_MESSAGE: &str =
    "❌ Não foi possível carregar os dados. Verifique a configuração do Google Sheets.";
pub const LOGIC_UNAVAILABLE_MESSAGE: &str = "⚠️ Não consegui carregar a aba 'Logica indicadores'.";
pub const WHICH_INDICATOR_MESSAGE: &str = "📘 Qual indicador você deseja que eu explique?";
const PRIMARY_UNAVAILABLE_MESSAGE: &str = "❌ Aba principal não disponível";
const SECONDARY_UNAVAILABLE_MESSAGE: &str =
    "❌ Aba secundária não disponível. Configure GOOGLE_SHEET_RANGE_2.";

const HELP_MESSAGE: &str = r#"📋 **Comandos Disponíveis:**

**Indicadores:**
• `!Indicadores` - Mostra como está o status dos indicadores
• `Explicar [indicador]` - Lógica de um indicador
• `Explicar todos` - Lógica de todos os indicadores
• `Quais indicadores existem?` - Lista os indicadores

**Leftover:**
• `!Leftover` - Mostra dados da segunda aba
• `!Sobras` - Alias para a aba secundária

**Consultas:**
• `quantidade total [produto]` - Soma das quantidades
• `média ponderada de [coluna] por [coluna]`
• `resumo por produto` - Quantidades agrupadas
• `top [N]` - Produtos com maior quantidade
• `buscar [produto]` - Procura registros
• `estatísticas [coluna]` - Total, média, mediana...

**Utilitários:**
• `status` - Status de todas as abas
• `recarregar` - Atualiza dados do Google Sheets
• `colunas` - Lista colunas disponíveis
• `ajuda` - Mostra esta mensagem"#;

const PRIMARY_PREVIEW_TITLE: &str = "📋 **Indicadores Performance SITE**";
const SUMMARY_ROWS: usize = 10;
const SEARCH_PREVIEW_ROWS: usize = 5;
const DEFAULT_TOP_N: usize = 10;

// ============ Router State ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterState {
    Uninitialized,
    Loading,
    Ready,
    Degraded,
}

/// Which sources a refresh reloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshScope {
    All,
    Key(String),
}

impl RefreshScope {
    /// "all" (or nothing) means every source; anything else names one key.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "all" => RefreshScope::All,
            key => RefreshScope::Key(key.to_string()),
        }
    }
}

// ============ Question Router ============

pub struct QuestionRouter {
    registry: Arc<DataSourceRegistry>,
    state: RwLock<RouterState>,
    summary_cell: String,
    preview_rows: usize,
}

impl QuestionRouter {
    pub fn new(registry: Arc<DataSourceRegistry>, summary_cell: &str, preview_rows: usize) -> Self {
        Self {
            registry,
            state: RwLock::new(RouterState::Uninitialized),
            summary_cell: summary_cell.to_string(),
            preview_rows,
        }
    }

    pub fn registry(&self) -> &Arc<DataSourceRegistry> {
        &self.registry
    }

    /// Current state, read against the latest snapshot.
    pub fn state(&self) -> RouterState {
        self.state_of(&self.registry.snapshot())
    }

    /// State as seen by a request holding `snapshot`. Before the first load
    /// settles this is Uninitialized or Loading; afterwards readiness comes
    /// from the snapshot itself, so a request never pairs one generation's
    /// readiness with another generation's data.
    pub fn state_of(&self, snapshot: &RegistrySnapshot) -> RouterState {
        match *self.state.read().unwrap_or_else(PoisonError::into_inner) {
            RouterState::Uninitialized => RouterState::Uninitialized,
            RouterState::Loading => RouterState::Loading,
            RouterState::Ready | RouterState::Degraded if snapshot.is_ready(PRIMARY_SOURCE) => RouterState::Ready,
            RouterState::Ready | RouterState::Degraded => RouterState::Degraded,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == RouterState::Ready
    }

    fn set_state(&self, next: RouterState) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *guard != next {
            logging::log_data(None, &format!("Router state {:?} -> {:?}", *guard, next));
        }
        *guard = next;
    }

    fn settle_state(&self) -> RouterState {
        let next = if self.registry.is_ready(PRIMARY_SOURCE) {
            RouterState::Ready
        } else {
            RouterState::Degraded
        };
        self.set_state(next);
        next
    }

    /// Load every registered source and settle on Ready or Degraded.
    pub async fn initialize(&self) -> RouterState {
        self.set_state(RouterState::Loading);
        let reports = self.registry.reload_all().await;
        for report in &reports {
            logging::log_startup(&format!(
                "Source '{}' ({}): {:?}, {} rows",
                report.key, report.label, report.status, report.rows
            ));
        }
        self.settle_state()
    }

    /// Reload sources and return a status line per source.
    pub async fn refresh(&self, scope: RefreshScope) -> String {
        logging::log_data(None, &format!("Refresh requested: {:?}", scope));

        match scope {
            RefreshScope::All => {
                let reports = self.registry.reload_all().await;
                self.settle_state();
                reports
                    .iter()
                    .map(refresh_line)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            RefreshScope::Key(key) => {
                if !self.registry.keys().iter().any(|k| *k == key) {
                    return format!(
                        "❌ Aba desconhecida '{}'. Opções: all, {}",
                        key,
                        self.registry.keys().join(", ")
                    );
                }
                let report = self.registry.load(&key).await;
                self.settle_state();
                if report.is_ready() {
                    format!("✅ {} recarregada!", key)
                } else {
                    format!("❌ Falha ao recarregar {}", key)
                }
            }
        }
    }

    pub async fn process(&self, question: &str) -> String {
        self.process_with_id(question, None).await
    }

    /// Answer one message. Never fails: every outcome is a reply string.
    pub async fn process_with_id(&self, question: &str, request_id: Option<&str>) -> String {
        let snapshot = self.registry.snapshot();
        self.process_snapshot(&snapshot, question, request_id).await
    }

    /// Answer one message against a snapshot the caller already holds.
    pub async fn process_snapshot(
        &self,
        snapshot: &RegistrySnapshot,
        question: &str,
        request_id: Option<&str>,
    ) -> String {
        match self.state_of(snapshot) {
            RouterState::Ready => {}
            RouterState::Degraded => {
                logging::log_routing(request_id, "Router degraded, skipping intent matching");
                return NOT_CONFIGURED_MESSAGE.to_string();
            }
            RouterState::Uninitialized | RouterState::Loading => {
                return LOADING_MESSAGE.to_string();
            }
        }

        let Some(rule) = intents::classify(question) else {
            logging::log_routing(request_id, "No intent matched");
            return default_response(question);
        };

        logging::log_routing(request_id, &format!("Matched intent '{}'", rule.intent.as_str()));
        self.dispatch(rule, question, snapshot, request_id).await
    }

    async fn dispatch(
        &self,
        rule: &IntentRule,
        question: &str,
        snapshot: &RegistrySnapshot,
        request_id: Option<&str>,
    ) -> String {
        match rule.intent {
            Intent::Help => return HELP_MESSAGE.to_string(),
            Intent::ListColumns => return list_columns(snapshot),
            Intent::Refresh => return self.refresh(RefreshScope::All).await,
            Intent::Status => return self.status_text(snapshot),
            _ => {}
        }

        let key = rule.source.unwrap_or(PRIMARY_SOURCE);
        let Some(source) = snapshot.get(key) else {
            logging::log_routing(request_id, &format!("Source '{}' not loaded", key));
            return unavailable_message(key).to_string();
        };

        match rule.intent {
            Intent::ListIndicators => list_indicators(&source),
            Intent::ExplainAllIndicators => explain_all_indicators(&source),
            Intent::ExplainIndicator => explain_indicator(&source, question),
            Intent::PrimaryPreview => self.primary_preview(&source, request_id).await,
            Intent::SecondaryPreview => self.secondary_preview(&source),
            Intent::TotalQuantity => total_quantity(&source, question),
            Intent::WeightedAverage => weighted_average(&source, question),
            Intent::ProductSummary => product_summary(&source),
            Intent::TopProducts => top_products(&source, question),
            Intent::SearchProduct => search_product(&source, question),
            Intent::Statistics => statistics(&source, question),
            Intent::Help | Intent::ListColumns | Intent::Refresh | Intent::Status => default_response(question),
        }
    }

    /// Per-source readiness with sizes, then overall readiness.
    pub fn status_text(&self, snapshot: &RegistrySnapshot) -> String {
        let mut lines = vec!["📊 **Status das Abas:**".to_string(), String::new()];

        for slot in snapshot.slots() {
            let line = match slot.source.as_ref().filter(|_| slot.ready) {
                Some(source) => format!(
                    "• **{}:** ✅ OK ({} linhas, {} colunas)",
                    slot.spec.label,
                    source.row_count(),
                    source.table().column_count()
                ),
                None if slot.spec.key == PRIMARY_SOURCE => format!("• **{}:** ❌ Falhou", slot.spec.label),
                None => format!("• **{}:** ⚠️ Indisponível", slot.spec.label),
            };
            lines.push(line);
        }

        lines.push(String::new());
        lines.push(format!(
            "Sistema: {}",
            if self.state_of(snapshot) == RouterState::Ready {
                "✅ Pronto"
            } else {
                "❌ Não pronto"
            }
        ));
        lines.join("\n")
    }

    async fn primary_preview(&self, source: &TabularDataSource, request_id: Option<&str>) -> String {
        let summary = match self.registry.provider().fetch_cell(&self.summary_cell).await {
            Ok(Some(value)) => value,
            Ok(None) => "N/A".to_string(),
            Err(e) => {
                logging::log_error(request_id, &format!("Failed to read {}: {}", self.summary_cell, e));
                "N/A".to_string()
            }
        };

        format!(
            "{}\n📌 *Resumo do dia:* **{}**\n```\n{}\n```",
            PRIMARY_PREVIEW_TITLE,
            summary,
            format_table(&source.preview(self.preview_rows))
        )
    }

    fn secondary_preview(&self, source: &TabularDataSource) -> String {
        let yesterday = Local::now().date_naive() - Duration::days(1);
        format!(
            "📋 **Resumo Leftover {}**\n```\n{}\n```",
            yesterday.format("%d-%m-%y"),
            format_table(&source.preview(self.preview_rows))
        )
    }
}

// ============ Handlers ============

fn default_response(question: &str) -> String {
    format!(
        "❓ Desculpe, não entendi sua pergunta: \"{}\"\n\nDigite **ajuda** para ver os comandos disponíveis.",
        question.trim()
    )
}

fn unavailable_message(key: &str) -> &'static str {
    match key {
        LOGIC_SOURCE => LOGIC_UNAVAILABLE_MESSAGE,
        SECONDARY_SOURCE => SECONDARY_UNAVAILABLE_MESSAGE,
        _ => PRIMARY_UNAVAILABLE_MESSAGE,
    }
}

fn refresh_line(report: &SourceReport) -> String {
    match (report.is_ready(), report.key.as_str()) {
        (true, _) => format!("✅ {} OK", report.label),
        (false, PRIMARY_SOURCE) => format!("❌ {} falhou", report.label),
        (false, _) => format!("⚠️ {} indisponível", report.label),
    }
}

fn list_columns(snapshot: &RegistrySnapshot) -> String {
    let sections: Vec<String> = [PRIMARY_SOURCE, SECONDARY_SOURCE]
        .iter()
        .filter_map(|key| Some((snapshot.slot(key)?, snapshot.get(key)?)))
        .map(|(slot, source)| {
            let names: Vec<String> = source
                .column_names()
                .iter()
                .map(|c| format!("  • {}", c))
                .collect();
            format!("📊 **Colunas da {}:**\n{}", slot.spec.label, names.join("\n"))
        })
        .collect();

    if sections.is_empty() {
        "❌ Nenhuma aba disponível".to_string()
    } else {
        sections.join("\n\n")
    }
}

// Indicator sheet: first column holds the name, second the explanation.
fn indicator_columns(source: &TabularDataSource) -> QueryResult<(&Column, &Column)> {
    match source.table().columns() {
        [name, logic, ..] => Ok((name, logic)),
        columns => Err(QueryError::MissingColumns {
            expected: 2,
            found: columns.len(),
        }),
    }
}

fn list_indicators(source: &TabularDataSource) -> String {
    let names: Vec<String> = match source.table().columns().first() {
        Some(column) => column
            .cells
            .iter()
            .filter_map(|c| c.as_key())
            .map(|name| format!("• {}", name))
            .collect(),
        None => Vec::new(),
    };

    format!("📋 **Lista de Indicadores Disponíveis:**\n\n{}", names.join("\n"))
}

fn explain_all_indicators(source: &TabularDataSource) -> String {
    let (names, logic) = match indicator_columns(source) {
        Ok(columns) => columns,
        Err(e) => return format!("❌ Erro ao consultar lógica dos indicadores: {}", e),
    };

    let mut reply = String::from("📘 **Explicação de Todos os Indicadores**\n\n");
    for (name, explanation) in names.cells.iter().zip(&logic.cells) {
        let Some(name) = name.as_key() else {
            continue;
        };
        reply.push_str(&format!(
            "🔹 **{}**\n{}\n\n{}\n\n",
            name,
            format_cell(explanation),
            "—".repeat(40)
        ));
    }
    reply
}

fn explain_indicator(source: &TabularDataSource, question: &str) -> String {
    let (names, logic) = match indicator_columns(source) {
        Ok(columns) => columns,
        Err(e) => return format!("❌ Erro ao consultar lógica dos indicadores: {}", e),
    };

    let lower = question.to_lowercase();
    let found = names.cells.iter().enumerate().find_map(|(row, cell)| {
        let name = cell.as_key()?;
        let needle = name.trim().to_lowercase();
        (!needle.is_empty() && lower.contains(&needle)).then_some((row, name))
    });

    match found {
        Some((row, name)) => format!(
            "📘 **Explicação do indicador: {}**\n\n{}",
            name,
            format_cell(&logic.cells[row])
        ),
        None => WHICH_INDICATOR_MESSAGE.to_string(),
    }
}

fn total_quantity(source: &TabularDataSource, question: &str) -> String {
    let product = extract_product_name(question);

    match source.total(product.as_deref(), None) {
        Ok(total) => match product {
            Some(name) => format!("📦 **Quantidade total de '{}':** {}", name, format_number(total, 0)),
            None => format!("📦 **Quantidade total geral:** {}", format_number(total, 0)),
        },
        Err(e) => format!("❌ Erro ao calcular quantidade total: {}", e),
    }
}

fn weighted_average(source: &TabularDataSource, question: &str) -> String {
    let columns = source.column_names();
    let mentioned = mentioned_columns(question, &columns);

    let [value, weight, ..] = mentioned.as_slice() else {
        return "❌ Especifique as colunas para calcular a média ponderada.\nEx: 'média ponderada de preço por quantidade'"
            .to_string();
    };

    match source.weighted_average(value, weight, None, None) {
        Ok(avg) => format!(
            "📊 **Média ponderada de '{}' por '{}':** {}",
            value,
            weight,
            format_number(avg, 2)
        ),
        Err(e) => format!("❌ Erro ao calcular média ponderada: {}", e),
    }
}

/// (product, summed quantity) pairs from a grouped table.
fn ranked(table: &Table, product_column: &str, quantity_column: &str) -> Vec<(String, f64)> {
    let (Some(products), Some(quantities)) = (table.column(product_column), table.column(quantity_column)) else {
        return Vec::new();
    };
    products
        .cells
        .iter()
        .zip(&quantities.cells)
        .map(|(p, q)| (format_cell(p), q.as_number().unwrap_or(0.0)))
        .collect()
}

fn grouped(source: &TabularDataSource, top: Option<usize>) -> QueryResult<(Vec<(String, f64)>, usize)> {
    let quantity = source.resolve_quantity_column(None)?;
    let summary = match top {
        Some(n) => source.top_n(n, &quantity)?,
        None => source.group_summary(&quantity, None)?,
    };
    let total_groups = summary.row_count();
    Ok((ranked(&summary, source.product_column(), &quantity), total_groups))
}

fn product_summary(source: &TabularDataSource) -> String {
    let (groups, total_groups) = match grouped(source, None) {
        Ok(result) => result,
        Err(e) => return format!("❌ Erro ao gerar resumo: {}", e),
    };

    if groups.is_empty() {
        return "❌ Nenhum dado disponível.".to_string();
    }

    let mut reply = String::from("📊 **Resumo por Produto:**\n\n");
    for (product, quantity) in groups.iter().take(SUMMARY_ROWS) {
        reply.push_str(&format!("• **{}**: {}\n", product, format_number(*quantity, 0)));
    }
    if total_groups > SUMMARY_ROWS {
        reply.push_str(&format!("\n_... e mais {} produtos_", total_groups - SUMMARY_ROWS));
    }
    reply
}

fn top_products(source: &TabularDataSource, question: &str) -> String {
    let n = extract_number(question).unwrap_or(DEFAULT_TOP_N);

    let (groups, _) = match grouped(source, Some(n)) {
        Ok(result) => result,
        Err(e) => return format!("❌ Erro ao obter top produtos: {}", e),
    };

    if groups.is_empty() {
        return "❌ Nenhum produto encontrado.".to_string();
    }

    let mut reply = format!("🏆 **Top {} Produtos:**\n\n", n);
    for (idx, (product, quantity)) in groups.iter().enumerate() {
        reply.push_str(&format!("{}. **{}**: {}\n", idx + 1, product, format_number(*quantity, 0)));
    }
    reply
}

fn search_product(source: &TabularDataSource, question: &str) -> String {
    let Some(product) = extract_product_name(question) else {
        return "❌ Especifique o nome do produto.\nEx: 'buscar notebook'".to_string();
    };

    let results = source.search(&product);
    if results.row_count() == 0 {
        return format!("❌ Nenhum produto encontrado com '{}'.", product);
    }

    let mut reply = format!(
        "🔍 **Resultados para '{}':**\n\n• **Total de registros:** {}\n",
        product,
        results.row_count()
    );

    if source.quantity_column().is_some() {
        match source.total(Some(product.as_str()), None) {
            Ok(total) => reply.push_str(&format!("• **Quantidade total:** {}\n", format_number(total, 0))),
            Err(e) => return format!("❌ Erro ao buscar produto: {}", e),
        }
    }

    reply.push_str(&format!(
        "\n```\n{}\n```",
        format_table(&results.head(SEARCH_PREVIEW_ROWS))
    ));
    reply
}

fn statistics(source: &TabularDataSource, question: &str) -> String {
    let columns = source.column_names();
    let column = match mentioned_columns(question, &columns).first() {
        Some(name) => Ok(name.to_string()),
        None => source.resolve_quantity_column(None),
    };

    let result = column.and_then(|name| {
        let stats = source.statistics(&name)?;
        Ok((name, stats))
    });
    match result {
        Ok((name, stats)) => format!(
            "📊 **Estatísticas de '{}':**\n\n\
             • **Total:** {}\n\
             • **Média:** {}\n\
             • **Mediana:** {}\n\
             • **Mínimo:** {}\n\
             • **Máximo:** {}\n\
             • **Desvio Padrão:** {}\n\
             • **Contagem:** {}\n",
            name,
            format_number(stats.total, 2),
            format_optional(stats.mean, 2),
            format_optional(stats.median, 2),
            format_optional(stats.min, 2),
            format_optional(stats.max, 2),
            format_optional(stats.std_dev, 2),
            stats.count
        ),
        Err(e) => format!("❌ Erro ao calcular estatísticas: {}", e),
    }
}
