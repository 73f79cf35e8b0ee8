//! Tabular-answer chart detection.
//!
//! Answers are free text from a language model. When one embeds a markdown
//! table whose second column is entirely numeric, the table is upgraded to a
//! chart-ready [`ChartTable`] keyed by its first column. Deliberately narrow:
//! only the *first* table is inspected and only the second column decides
//! eligibility. Any parse failure means "no table found", never an error.

use crate::models::{ChartColumn, ChartTable};

/// An answer with an optionally attached chart table.
#[derive(Debug, Clone)]
pub struct ProcessedAnswer {
    /// The answer text, always passed through unchanged.
    pub text: String,
    /// Present when the first embedded table was chart-eligible.
    pub chart: Option<ChartTable>,
}

/// Inspect an answer for an embedded chart-eligible table.
pub fn postprocess(answer_text: &str) -> ProcessedAnswer {
    ProcessedAnswer {
        text: answer_text.to_string(),
        chart: first_chart_table(answer_text),
    }
}

fn first_chart_table(text: &str) -> Option<ChartTable> {
    let rows = first_table_rows(text)?;

    // Header plus at least one data row, more than one column.
    let header = rows.first()?;
    if header.len() < 2 || rows.len() < 2 {
        return None;
    }

    let width = header.len();
    let data: Vec<&Vec<String>> = rows[1..]
        .iter()
        .filter(|r| r.iter().any(|c| !c.is_empty()))
        .collect();
    if data.is_empty() {
        return None;
    }

    // Chart-eligible iff every value in the second column is numeric.
    if !data.iter().all(|r| parse_numeric(cell(r, 1)).is_some()) {
        return None;
    }

    let keys: Vec<String> = data.iter().map(|r| cell(r, 0).to_string()).collect();
    let columns = (1..width)
        .map(|col| {
            let cells: Vec<String> = data.iter().map(|r| cell(r, col).to_string()).collect();
            let values: Option<Vec<f64>> = cells.iter().map(|c| parse_numeric(c)).collect();
            ChartColumn {
                header: header[col].clone(),
                cells,
                values,
            }
        })
        .collect();

    Some(ChartTable {
        key_header: header[0].clone(),
        keys,
        columns,
    })
}

fn cell<'a>(row: &'a [String], index: usize) -> &'a str {
    row.get(index).map(|s| s.as_str()).unwrap_or("")
}

/// Rows of the first markdown table in the text, separator lines removed.
/// Returns `None` when no table-shaped block exists.
fn first_table_rows(text: &str) -> Option<Vec<Vec<String>>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut in_table = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('|') && trimmed.len() > 1 {
            in_table = true;
            let cells = split_row(trimmed);
            if !is_separator_row(&cells) {
                rows.push(cells);
            }
        } else if in_table {
            // First table ended; ignore anything after it.
            break;
        }
    }

    if rows.is_empty() {
        None
    } else {
        Some(rows)
    }
}

fn split_row(line: &str) -> Vec<String> {
    line.trim()
        .trim_start_matches('|')
        .trim_end_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .collect()
}

/// A markdown alignment row: every cell is dashes with optional colons.
fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|c| {
            !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':')
        })
}

/// Parse a display cell as a number, tolerating currency/percent dressing
/// (`$1,234.5`, `12%`, `(42)` for negatives).
fn parse_numeric(cell: &str) -> Option<f64> {
    let mut s = cell.trim().to_string();
    if s.is_empty() {
        return None;
    }

    let negative_parens = s.starts_with('(') && s.ends_with(')');
    if negative_parens {
        s = s[1..s.len() - 1].to_string();
    }

    let cleaned: String = s
        .chars()
        .filter(|&ch| ch != '$' && ch != ',' && ch != '%' && !ch.is_whitespace())
        .collect();

    cleaned.parse::<f64>().ok().map(|v| {
        if negative_parens {
            -v
        } else {
            v
        }
    })
}
