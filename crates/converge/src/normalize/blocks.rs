//! Option/value blocks and colon-delimited paragraphs

use super::{canonical_label, is_rule, normalize_value, split_pairs};
use crate::types::{Field, Record};

/// Blank-line separated sections, with surrounding blank lines dropped
fn sections(text: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn option_pairs<'a>(lines: impl Iterator<Item = &'a str>) -> Record {
    let mut record = Record::new();
    for line in lines {
        if is_rule(line) {
            continue;
        }
        let columns = split_pairs(line);
        let Some((key, rest)) = columns.split_first() else {
            continue;
        };
        if key == "Option" {
            continue;
        }
        record.insert(
            canonical_label(key),
            Field::Text(normalize_value(&rest.join(" "))),
        );
    }
    record
}

/// Parse "Option ... Value" sections
///
/// A section opening with `label:` nests its pairs under that label; a
/// section headed by an `Option` column is a flat option map; any other
/// section yields one record per row, zipped against its first line.
pub fn option_value(text: &str) -> Vec<Record> {
    let mut out = Vec::new();
    for section in sections(text) {
        let first = section[0];
        let first_columns = split_pairs(first);

        if first.contains(':') && first_columns.len() == 1 {
            let label = canonical_label(first.trim().trim_end_matches(':'));
            let mut record = Record::new();
            record.insert(label, Field::Nested(option_pairs(section[1..].iter().copied())));
            out.push(record);
        } else if first_columns.first().is_some_and(|c| c == "Option") {
            out.push(option_pairs(section[1..].iter().copied()));
        } else {
            let header: Vec<String> = first_columns.iter().map(|h| canonical_label(h)).collect();
            for line in &section[1..] {
                if is_rule(line) {
                    continue;
                }
                let record: Record = header
                    .iter()
                    .zip(split_pairs(line))
                    .map(|(h, v)| (h.clone(), Field::Text(normalize_value(&v))))
                    .collect();
                if !record.is_empty() {
                    out.push(record);
                }
            }
        }
    }
    out
}

/// Parse colon-delimited `key: value` paragraphs
///
/// Keys are canonicalized; a key with an empty value opens a list that
/// following colon-less lines append to.
pub fn key_value(text: &str) -> Vec<Record> {
    let mut out = Vec::new();
    for section in sections(text) {
        let mut record = Record::new();
        let mut last_key: Option<String> = None;

        for line in section {
            let trimmed = line.trim();
            if is_rule(trimmed) {
                continue;
            }

            if let Some((key, value)) = trimmed.split_once(':') {
                let key = canonical_label(key);
                let value = value.trim();
                let field = if value.is_empty() {
                    Field::List(Vec::new())
                } else {
                    Field::Text(normalize_value(value))
                };
                record.insert(key.clone(), field);
                last_key = Some(key);
                continue;
            }

            if trimmed.contains('*') {
                continue;
            }

            let columns = split_pairs(trimmed);
            match last_key.as_ref().and_then(|k| record.get_mut(k)) {
                Some(Field::List(items)) => {
                    items.push(trimmed.to_string());
                    continue;
                }
                Some(field) if matches!(field, Field::Text(_)) && columns.len() != 2 => {
                    let first = field.as_text().unwrap_or_default().to_string();
                    *field = Field::List(vec![first, trimmed.to_string()]);
                    continue;
                }
                _ => {}
            }
            if let [key, value] = columns.as_slice() {
                record.insert(canonical_label(key), Field::Text(normalize_value(value)));
            }
        }

        if !record.is_empty() {
            out.push(record);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_header_section() {
        let text = "\
Option                    Value
-----------------------   -----
min-length                6 (default)
min-one-lowercase         1
";
        let records = option_value(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["min-length"], Field::from("6"));
        assert_eq!(records[0]["min-one-lowercase"], Field::from("1"));
    }

    #[test]
    fn test_labelled_section_nests() {
        let text = "\
Default Settings:
Option              Value
-----------------   -----
max-days-between-change   90
warn-days-before-expire   7

Other:
Option              Value
-----------------   -----
min-days-between-change   0
";
        let records = option_value(text);
        assert_eq!(records.len(), 2);
        let Field::Nested(defaults) = &records[0]["default-settings"] else {
            panic!("expected nested record");
        };
        assert_eq!(defaults["max-days-between-change"], Field::from("90"));
        assert!(records[1].contains_key("other"));
    }

    #[test]
    fn test_unlabelled_section_zips_rows() {
        let text = "\
Mtree                Option    Value
------------------   -------   -----
/data/col1/backup    random-io-optimize   enabled
";
        let records = option_value(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["option"], Field::from("random-io-optimize"));
    }

    #[test]
    fn test_key_value_paragraphs() {
        let text = "\
NFS Export: backup
Path: /data/col1/backup
Clients:
10.0.0.5
10.0.0.6

Status: enabled
";
        let records = key_value(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["nfs-export"], Field::from("backup"));
        assert_eq!(
            records[0]["clients"],
            Field::List(vec!["10.0.0.5".into(), "10.0.0.6".into()])
        );
        assert_eq!(records[1]["status"], Field::from("enabled"));
    }

    #[test]
    fn test_key_value_continuation_promotes_text() {
        let text = "Timeservers: ntp1.example.com\nntp2.example.com\n";
        let records = key_value(text);
        assert_eq!(
            records[0]["timeservers"],
            Field::List(vec!["ntp1.example.com".into(), "ntp2.example.com".into()])
        );
    }

    #[test]
    fn test_key_value_skips_legend_lines() {
        let text = "Status: enabled\n* default value\n";
        let records = key_value(text);
        assert_eq!(records[0].len(), 1);
    }

    #[test]
    fn test_key_value_two_column_line() {
        let text = "Status: enabled\nLast Sync   2024-01-01\n";
        let records = key_value(text);
        assert_eq!(records[0]["last-sync"], Field::from("2024-01-01"));
    }
}
