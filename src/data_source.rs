//! Column-oriented analytics over one loaded table

use crate::table::{Cell, Column, Table, TableError};
use serde::Serialize;
use std::collections::HashMap;

/// Names that mark a column as the product/name column, in priority order.
const PRODUCT_COLUMN_HINTS: [&str; 6] = ["produto", "product", "nome", "name", "item", "sku"];

/// Substrings that mark a column as a quantity column.
const QUANTITY_COLUMN_HINTS: [&str; 2] = ["quant", "qty"];

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("coluna '{0}' não encontrada. Colunas disponíveis: {1}")]
    ColumnNotFound(String, String),
    #[error("coluna de quantidade não encontrada. Colunas disponíveis: {0}")]
    QuantityColumnNotFound(String),
    #[error("valor não numérico '{value}' na coluna '{column}'")]
    NonNumeric { column: String, value: String },
    #[error("a tabela está vazia")]
    EmptyTable,
    #[error("a tabela precisa de pelo menos {expected} colunas, encontrou {found}")]
    MissingColumns { expected: usize, found: usize },
    #[error("a coluna '{0}' não pode ser agrupada por ela mesma")]
    GroupByQuantity(String),
    #[error(transparent)]
    Table(#[from] TableError),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total: f64,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Sample standard deviation (ddof = 1); undefined below two values.
    pub std_dev: Option<f64>,
    pub count: usize,
}

/// One loaded table plus the columns detected on it.
#[derive(Debug, Clone)]
pub struct TabularDataSource {
    table: Table,
    product_column: String,
    quantity_column: Option<String>,
}

impl TabularDataSource {
    /// Wrap a table. Empty tables are rejected so queries never run on no data.
    pub fn new(table: Table) -> QueryResult<Self> {
        if table.is_empty() {
            return Err(QueryError::EmptyTable);
        }

        let product_column = detect_product_column(&table).ok_or(QueryError::EmptyTable)?;
        let quantity_column = detect_quantity_column(&table);

        Ok(Self {
            table,
            product_column,
            quantity_column,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    pub fn product_column(&self) -> &str {
        &self.product_column
    }

    pub fn quantity_column(&self) -> Option<&str> {
        self.quantity_column.as_deref()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.table.column_names()
    }

    pub fn preview(&self, n: usize) -> Table {
        self.table.head(n)
    }

    /// Resolve a quantity column: an explicit name must exist (exact, then
    /// case-insensitive); no name falls back to the detected quantity column.
    pub fn resolve_quantity_column(&self, requested: Option<&str>) -> QueryResult<String> {
        match requested {
            Some(name) => self.resolve_column(name),
            None => self
                .quantity_column
                .clone()
                .ok_or_else(|| QueryError::QuantityColumnNotFound(self.available_columns())),
        }
    }

    /// Sum of the quantity column, optionally restricted to rows whose product
    /// matches `selector`. A selector matching nothing sums to zero.
    pub fn total(&self, selector: Option<&str>, quantity_column: Option<&str>) -> QueryResult<f64> {
        let column_name = self.resolve_quantity_column(quantity_column)?;
        let column = self.column(&column_name)?;

        let rows: Vec<usize> = match selector {
            Some(needle) => self.matching_rows(needle),
            None => (0..self.table.row_count()).collect(),
        };

        let mut sum = 0.0;
        for row in rows {
            if let Some(n) = numeric(column, row)? {
                sum += n;
            }
        }
        Ok(sum)
    }

    /// Σ(value·weight) / Σ(weight) over the optionally filtered rows. Returns
    /// 0.0 when no rows remain or the weights sum to zero.
    pub fn weighted_average(
        &self,
        value_column: &str,
        weight_column: &str,
        filter_column: Option<&str>,
        filter_value: Option<&str>,
    ) -> QueryResult<f64> {
        let values = self.column(value_column)?;
        let weights = self.column(weight_column)?;

        let rows: Vec<usize> = match (filter_column, filter_value) {
            (Some(col), Some(needle)) => {
                let filter = self.column(col)?;
                rows_containing(filter, needle)
            }
            _ => (0..self.table.row_count()).collect(),
        };

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for row in rows {
            let (Some(v), Some(w)) = (numeric(values, row)?, numeric(weights, row)?) else {
                continue;
            };
            weighted_sum += v * w;
            total_weight += w;
        }

        if total_weight == 0.0 {
            return Ok(0.0);
        }
        Ok(weighted_sum / total_weight)
    }

    /// Group by the product column, summing the quantity column (and the value
    /// column when it exists), sorted by summed quantity descending. Ties keep
    /// the order in which each group first appears.
    pub fn group_summary(&self, quantity_column: &str, value_column: Option<&str>) -> QueryResult<Table> {
        let quantity_name = self.resolve_column(quantity_column)?;
        if quantity_name == self.product_column {
            return Err(QueryError::GroupByQuantity(quantity_name));
        }
        let quantity = self.column(&quantity_name)?;
        let product = self.column(&self.product_column)?;

        let value = match value_column {
            Some(name) => self
                .resolve_column(name)
                .ok()
                .filter(|n| *n != quantity_name && *n != self.product_column),
            None => None,
        };
        let value = value.map(|name| self.column(&name)).transpose()?;

        // (key, quantity sum, value sum), in first-appearance order
        let mut groups: Vec<(String, f64, f64)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for row in 0..self.table.row_count() {
            let Some(key) = product.cells[row].as_key() else {
                continue;
            };
            let q = numeric(quantity, row)?.unwrap_or(0.0);
            let v = match value {
                Some(col) => numeric(col, row)?.unwrap_or(0.0),
                None => 0.0,
            };

            match index.get(&key) {
                Some(&pos) => {
                    groups[pos].1 += q;
                    groups[pos].2 += v;
                }
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, q, v));
                }
            }
        }

        // sort_by is stable
        groups.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut columns = vec![
            Column::new(
                self.product_column.clone(),
                groups.iter().map(|(k, _, _)| Cell::Text(k.clone())).collect(),
            ),
            Column::new(
                quantity.name.clone(),
                groups.iter().map(|(_, q, _)| Cell::Number(*q)).collect(),
            ),
        ];
        if let Some(col) = value {
            columns.push(Column::new(
                col.name.clone(),
                groups.iter().map(|(_, _, v)| Cell::Number(*v)).collect(),
            ));
        }

        Ok(Table::new(columns)?)
    }

    /// The first `n` groups of `group_summary`.
    pub fn top_n(&self, n: usize, quantity_column: &str) -> QueryResult<Table> {
        Ok(self.group_summary(quantity_column, None)?.head(n))
    }

    /// Rows whose product column contains `needle`, case-insensitive, in
    /// original order.
    pub fn search(&self, needle: &str) -> Table {
        self.table.select_rows(&self.matching_rows(needle))
    }

    pub fn statistics(&self, column_name: &str) -> QueryResult<Statistics> {
        let column = self.column(column_name)?;

        let mut values = Vec::new();
        for row in 0..column.cells.len() {
            if let Some(n) = numeric(column, row)? {
                values.push(n);
            }
        }

        let count = values.len();
        let total: f64 = values.iter().sum();
        if count == 0 {
            return Ok(Statistics {
                total,
                mean: None,
                median: None,
                min: None,
                max: None,
                std_dev: None,
                count,
            });
        }

        let mean = total / count as f64;
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };
        let std_dev = if count > 1 {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            Some(variance.sqrt())
        } else {
            None
        };

        Ok(Statistics {
            total,
            mean: Some(mean),
            median: Some(median),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            std_dev,
            count,
        })
    }

    fn available_columns(&self) -> String {
        self.table.column_names().join(", ")
    }

    fn column(&self, name: &str) -> QueryResult<&Column> {
        self.table
            .column(name)
            .ok_or_else(|| QueryError::ColumnNotFound(name.to_string(), self.available_columns()))
    }

    fn resolve_column(&self, name: &str) -> QueryResult<String> {
        if self.table.column(name).is_some() {
            return Ok(name.to_string());
        }
        let lower = name.to_lowercase();
        self.table
            .columns()
            .iter()
            .find(|c| c.name.to_lowercase() == lower)
            .map(|c| c.name.clone())
            .ok_or_else(|| QueryError::ColumnNotFound(name.to_string(), self.available_columns()))
    }

    fn matching_rows(&self, needle: &str) -> Vec<usize> {
        match self.table.column(&self.product_column) {
            Some(product) => rows_containing(product, needle),
            None => Vec::new(),
        }
    }
}

/// First column whose lowercase name contains a product hint, else the first column.
pub fn detect_product_column(table: &Table) -> Option<String> {
    table
        .columns()
        .iter()
        .find(|c| {
            let lower = c.name.to_lowercase();
            PRODUCT_COLUMN_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .or_else(|| table.columns().first())
        .map(|c| c.name.clone())
}

/// First column whose lowercase name contains "quant" or "qty".
pub fn detect_quantity_column(table: &Table) -> Option<String> {
    table
        .columns()
        .iter()
        .find(|c| {
            let lower = c.name.to_lowercase();
            QUANTITY_COLUMN_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .map(|c| c.name.clone())
}

fn rows_containing(column: &Column, needle: &str) -> Vec<usize> {
    let needle = needle.to_lowercase();
    column
        .cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| {
            cell.as_key()
                .map(|text| text.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .map(|(row, _)| row)
        .collect()
}

/// Numeric value of a cell: `None` for missing, an error for non-numeric text.
fn numeric(column: &Column, row: usize) -> QueryResult<Option<f64>> {
    match column.cells.get(row) {
        Some(Cell::Missing) | None => Ok(None),
        Some(cell) => cell.as_number().map(Some).ok_or_else(|| QueryError::NonNumeric {
            column: column.name.clone(),
            value: cell.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(header: &[&str], rows: &[&[&str]]) -> TabularDataSource {
        let header: Vec<String> = header.iter().map(|s| s.to_string()).collect();
        let rows: Vec<Vec<String>> = rows
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect();
        TabularDataSource::new(Table::from_rows(&header, &rows).unwrap()).unwrap()
    }

    fn pens() -> TabularDataSource {
        source(
            &["Produto", "Quantidade"],
            &[&["Caneta", "10"], &["Caderno", "5"], &["Caneta", "3"]],
        )
    }

    fn key(table: &Table, column: &str, row: usize) -> String {
        table.cell(column, row).unwrap().to_string()
    }

    #[test]
    fn test_empty_table_is_rejected() {
        let table = Table::from_rows(&["a".to_string()], &[]).unwrap();
        assert_eq!(TabularDataSource::new(table).unwrap_err(), QueryError::EmptyTable);
    }

    #[test]
    fn test_column_names_preserve_order() {
        let src = source(&["b", "a", "c"], &[&["1", "2", "3"]]);
        assert_eq!(src.column_names(), vec!["b", "a", "c"]);
        assert_eq!(src.column_names().len(), src.table().column_count());
    }

    #[test]
    fn test_product_column_detection() {
        let src = source(&["Data", "Nome do Item", "SKU"], &[&["x", "y", "z"]]);
        assert_eq!(src.product_column(), "Nome do Item");

        let fallback = source(&["Data", "Valor"], &[&["x", "1"]]);
        assert_eq!(fallback.product_column(), "Data");
    }

    #[test]
    fn test_total() {
        let src = pens();
        assert_eq!(src.total(None, None).unwrap(), 18.0);
        assert_eq!(src.total(Some("caneta"), None).unwrap(), 13.0);
        assert_eq!(src.total(Some("lápis"), None).unwrap(), 0.0);
        assert_eq!(src.total(None, Some("quantidade")).unwrap(), 18.0);
    }

    #[test]
    fn test_total_column_not_found() {
        let src = source(&["Produto", "Preço"], &[&["Caneta", "2"]]);
        assert!(matches!(
            src.total(None, None),
            Err(QueryError::QuantityColumnNotFound(_))
        ));
        assert!(matches!(
            src.total(None, Some("Estoque")),
            Err(QueryError::ColumnNotFound(_, _))
        ));
    }

    #[test]
    fn test_total_rejects_text_quantities() {
        let src = source(&["Produto", "Qty"], &[&["Caneta", "dez"]]);
        assert_eq!(
            src.total(None, None),
            Err(QueryError::NonNumeric {
                column: "Qty".to_string(),
                value: "dez".to_string()
            })
        );
    }

    #[test]
    fn test_weighted_average() {
        let src = source(
            &["Produto", "Preço", "Quantidade"],
            &[&["Caneta", "2", "10"], &["Caderno", "10", "5"], &["Caneta", "4", "0"]],
        );
        let avg = src.weighted_average("Preço", "Quantidade", None, None).unwrap();
        assert!((avg - 70.0 / 15.0).abs() < 1e-9);

        let filtered = src
            .weighted_average("Preço", "Quantidade", Some("Produto"), Some("caneta"))
            .unwrap();
        assert_eq!(filtered, 2.0);
    }

    #[test]
    fn test_weighted_average_zero_cases() {
        let src = source(
            &["Produto", "Preço", "Peso"],
            &[&["Caneta", "2", "0"], &["Caderno", "10", "0"]],
        );
        assert_eq!(src.weighted_average("Preço", "Peso", None, None).unwrap(), 0.0);
        assert_eq!(
            src.weighted_average("Preço", "Peso", Some("Produto"), Some("régua"))
                .unwrap(),
            0.0
        );
    }

    #[test]
    fn test_group_summary_merges_repeated_products() {
        let summary = pens().group_summary("Quantidade", None).unwrap();
        assert_eq!(summary.row_count(), 2);
        assert_eq!(key(&summary, "Produto", 0), "Caneta");
        assert_eq!(summary.cell("Quantidade", 0), Some(&Cell::Number(13.0)));
        assert_eq!(key(&summary, "Produto", 1), "Caderno");
        assert_eq!(summary.cell("Quantidade", 1), Some(&Cell::Number(5.0)));
    }

    #[test]
    fn test_thousands_grouped_quantities() {
        let src = source(
            &["Produto", "Quantidade", "SKU"],
            &[&["Caneta", "1,234", "007"], &["Caderno", "2,000", "98,50"]],
        );
        assert_eq!(src.total(None, None).unwrap(), 3234.0);

        let top = src.top_n(1, "Quantidade").unwrap();
        assert_eq!(key(&top, "Produto", 0), "Caderno");
        assert_eq!(top.cell("Quantidade", 0), Some(&Cell::Number(2000.0)));

        let stats = src.statistics("SKU").unwrap();
        assert_eq!(stats.total, 105.5);
    }

    #[test]
    fn test_preview_keeps_cells_as_received() {
        let src = source(
            &["Produto", "Quantidade", "SKU"],
            &[&["Caneta", "1,234", "007"], &["Caderno", "2,000", "98,50"]],
        );
        let preview = src.preview(2);
        assert_eq!(key(&preview, "Quantidade", 0), "1,234");
        assert_eq!(key(&preview, "SKU", 0), "007");
        assert_eq!(key(&preview, "SKU", 1), "98,50");
    }

    #[test]
    fn test_group_summary_rejects_quantity_as_product() {
        let src = source(&["Quantidade", "Valor"], &[&["1", "2"]]);
        assert_eq!(src.product_column(), "Quantidade");
        assert_eq!(
            src.group_summary("Quantidade", None),
            Err(QueryError::GroupByQuantity("Quantidade".to_string()))
        );
    }

    #[test]
    fn test_group_summary_ties_keep_first_appearance() {
        let src = source(
            &["Item", "Qty"],
            &[&["b", "2"], &["a", "2"], &["c", "5"], &["b", ""]],
        );
        let summary = src.group_summary("Qty", None).unwrap();
        let order: Vec<String> = (0..summary.row_count())
            .map(|r| key(&summary, "Item", r))
            .collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_group_summary_with_value_column() {
        let src = source(
            &["Produto", "Quantidade", "Valor"],
            &[&["Caneta", "10", "20"], &["Caderno", "5", "50"], &["Caneta", "3", "6"]],
        );
        let summary = src.group_summary("Quantidade", Some("Valor")).unwrap();
        assert_eq!(summary.column_names(), vec!["Produto", "Quantidade", "Valor"]);
        assert_eq!(summary.cell("Valor", 0), Some(&Cell::Number(26.0)));

        let ignored = src.group_summary("Quantidade", Some("Desconto")).unwrap();
        assert_eq!(ignored.column_count(), 2);
    }

    #[test]
    fn test_top_n() {
        let src = pens();
        let top = src.top_n(1, "Quantidade").unwrap();
        assert_eq!(top.row_count(), 1);
        assert_eq!(key(&top, "Produto", 0), "Caneta");
        assert_eq!(top.cell("Quantidade", 0), Some(&Cell::Number(13.0)));

        let all = src.top_n(50, "Quantidade").unwrap();
        assert_eq!(all, src.group_summary("Quantidade", None).unwrap());
    }

    #[test]
    fn test_search() {
        let src = pens();
        let hits = src.search("CANETA");
        assert_eq!(hits.row_count(), 2);
        assert_eq!(key(&hits, "Quantidade", 0), "10");
        assert_eq!(key(&hits, "Quantidade", 1), "3");

        assert_eq!(src.search("borracha").row_count(), 0);
    }

    #[test]
    fn test_statistics() {
        let src = source(
            &["Produto", "Quantidade"],
            &[&["a", "2"], &["b", "4"], &["c", ""], &["d", "4"], &["e", "5"], &["f", "5"]],
        );
        let stats = src.statistics("Quantidade").unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.total, 20.0);
        assert_eq!(stats.mean, Some(4.0));
        assert_eq!(stats.median, Some(4.0));
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(5.0));
        // sample variance: (4 + 0 + 0 + 1 + 1) / 4 = 1.5
        assert!((stats.std_dev.unwrap() - 1.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_statistics_edge_cases() {
        let src = source(&["Produto", "Quantidade"], &[&["a", "7"], &["b", ""]]);
        let single = src.statistics("Quantidade").unwrap();
        assert_eq!(single.count, 1);
        assert_eq!(single.median, Some(7.0));
        assert_eq!(single.std_dev, None);

        assert!(matches!(
            src.statistics("Preço"),
            Err(QueryError::ColumnNotFound(_, _))
        ));
    }

    #[test]
    fn test_preview() {
        let src = pens();
        assert_eq!(src.preview(2).row_count(), 2);
        assert_eq!(src.preview(0).row_count(), 0);
    }
}
