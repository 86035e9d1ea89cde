//! Dashed-header tables

use super::{canonical_label, normalize_value, split_columns, split_pairs};
use crate::types::{Field, Record};

/// Whether a line is a dash rule (`-----   ----`)
pub fn is_rule(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains("--") && trimmed.chars().all(|c| c == '-' || c.is_whitespace())
}

/// One header-rule-rows block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Raw header labels from the line above the opening rule
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Header labels in canonical attribute form
    pub fn columns(&self) -> Vec<String> {
        self.header.iter().map(|h| canonical_label(h)).collect()
    }

    /// Whether the first header label starts with `prefix`
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.header.first().is_some_and(|h| h.starts_with(prefix))
    }

    /// Zip rows against `columns` (or the table's own header)
    ///
    /// Rows with fewer than `columns - 1` fields are wrapped or blank
    /// lines and are dropped.
    pub fn records(&self, columns: Option<&[String]>) -> Vec<Record> {
        let own;
        let columns = match columns {
            Some(c) => c,
            None => {
                own = self.columns();
                &own
            }
        };
        self.rows
            .iter()
            .filter(|row| row.len() + 1 >= columns.len())
            .map(|row| {
                columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.clone(), Field::Text(normalize_value(v))))
                    .collect()
            })
            .collect()
    }
}

/// Split text into its header/rule/rows blocks
///
/// A block opens at a rule line and runs until a closing rule, a blank
/// line, or the end of the text. The line just above the opening rule is
/// the block's header.
pub fn stacked_tables(text: &str) -> Vec<Table> {
    let lines: Vec<&str> = text.lines().collect();
    let mut tables = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !is_rule(lines[i]) {
            i += 1;
            continue;
        }

        let header = match i.checked_sub(1).map(|h| lines[h]) {
            Some(line) if !line.trim().is_empty() && !is_rule(line) => split_pairs(line),
            _ => Vec::new(),
        };

        let mut rows = Vec::new();
        let mut j = i + 1;
        while j < lines.len() {
            let line = lines[j];
            if is_rule(line) {
                j += 1;
                break;
            }
            if line.trim().is_empty() {
                break;
            }
            rows.push(split_columns(line));
            j += 1;
        }

        tables.push(Table { header, rows });
        i = j;
    }

    tables
}

/// Records from every block of a dashed table, zipped against `columns`
pub fn dashed_table(text: &str, columns: Option<&[String]>) -> Vec<Record> {
    stacked_tables(text)
        .iter()
        .flat_map(|t| t.records(columns))
        .collect()
}
