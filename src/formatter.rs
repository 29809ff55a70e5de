//! Fixed-width rendering for monospace chat blocks

use crate::table::{Cell, Table};

pub const EMPTY_TABLE_MESSAGE: &str = "❌ Tabela vazia ou inválida";

/// Render a cell for display. Missing cells render as "-".
pub fn format_cell(cell: &Cell) -> String {
    cell.to_string()
}

/// Render a table as left-justified columns joined by two spaces. Each
/// column is as wide as its longest header or cell, counted in characters.
pub fn format_table(table: &Table) -> String {
    if table.row_count() == 0 || table.column_count() == 0 {
        return EMPTY_TABLE_MESSAGE.to_string();
    }

    let rendered: Vec<(String, Vec<String>)> = table
        .columns()
        .iter()
        .map(|c| (c.name.clone(), c.cells.iter().map(format_cell).collect()))
        .collect();

    let widths: Vec<usize> = rendered
        .iter()
        .map(|(name, cells)| {
            cells
                .iter()
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
                .max(name.chars().count())
        })
        .collect();

    let mut lines = Vec::with_capacity(table.row_count() + 1);
    lines.push(
        rendered
            .iter()
            .zip(&widths)
            .map(|((name, _), width)| format!("{:<width$}", name, width = width))
            .collect::<Vec<_>>()
            .join("  "),
    );

    for row in 0..table.row_count() {
        lines.push(
            rendered
                .iter()
                .zip(&widths)
                .map(|((_, cells), width)| format!("{:<width$}", cells[row], width = width))
                .collect::<Vec<_>>()
                .join("  "),
        );
    }

    lines.join("\n")
}

/// Format a number with comma thousands separators and a fixed number of
/// decimals, e.g. `1,234.50`.
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }

    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed.clone(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*ch);
    }

    let negative = value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    let sign = if negative { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

/// Format an optional statistic, rendering undefined values as "-".
pub fn format_optional(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format_number(v, decimals))
        .unwrap_or_else(|| "-".to_string())
}
