//! Export detail: a key/value preamble followed by client and referral tables

use super::{canonical_label, is_rule, stacked_tables};
use crate::types::{Field, Record};

fn strip_parens(value: &str) -> String {
    value.replace(['(', ')'], "").trim().to_string()
}

/// Parse `nfs export show detailed` style output
///
/// Yields `name`, the other preamble keys, and `clients` / `referrals`
/// tables whose first columns are renamed to `clientid` / `referral`.
pub fn export_detail(text: &str) -> Record {
    let mut record = Record::new();
    let lines: Vec<&str> = text.lines().collect();

    let first_rule = lines.iter().position(|l| is_rule(l));
    let preamble_end = first_rule.map_or(lines.len(), |r| r.saturating_sub(1));

    for line in &lines[..preamble_end] {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = canonical_label(key);
        if key.starts_with("total") || key == "referrals" || key == "clients" {
            continue;
        }
        let key = if key == "nfs-export" { "name".to_string() } else { key };
        record.insert(key, Field::Text(value.trim().to_string()));
    }

    let mut clients = Vec::new();
    let mut referrals = Vec::new();

    for table in stacked_tables(text) {
        let mut columns = table.columns();
        let target = if table.starts_with("Client") {
            if let Some(first) = columns.first_mut() {
                *first = "clientid".into();
            }
            &mut clients
        } else if table.starts_with("Name") || table.starts_with("Referral") {
            if let Some(first) = columns.first_mut() {
                *first = "referral".into();
            }
            &mut referrals
        } else {
            continue;
        };

        for row in &table.rows {
            let entry: Record = columns
                .iter()
                .zip(row)
                .map(|(c, v)| (c.clone(), Field::Text(strip_parens(v))))
                .collect();
            if !entry.is_empty() {
                target.push(entry);
            }
        }
    }

    record.insert("clients".into(), Field::Table(clients));
    record.insert("referrals".into(), Field::Table(referrals));
    record
}
