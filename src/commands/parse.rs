//! Parse command - run the output normalizer over captured text

use anyhow::{Context, Result};
use converge::normalize::{export_detail, normalize, stacked_tables};
use converge::{Parsed, Record};
use std::fs;
use std::io::{self, Read};

use crate::cli::{ParseArgs, ShapeArg};
use crate::config::expand_path;

/// Normalize `text` with the requested layout
pub fn parse_text(text: &str, shape: ShapeArg, columns: &[String]) -> Result<serde_json::Value> {
    let columns = (!columns.is_empty()).then_some(columns);
    let value = match shape {
        ShapeArg::Auto => serde_json::to_value(normalize(text, columns))?,
        ShapeArg::Export => serde_json::to_value(Parsed::One(export_detail(text)))?,
        ShapeArg::Stacked => {
            let blocks: Vec<Vec<Record>> = stacked_tables(text)
                .iter()
                .map(|table| table.records(columns))
                .collect();
            serde_json::to_value(blocks)?
        }
    };
    Ok(value)
}

pub fn run(args: ParseArgs) -> Result<()> {
    let text = match &args.file {
        Some(path) => {
            let path = expand_path(&path.to_string_lossy());
            fs::read_to_string(&path)
                .with_context(|| format!("Could not read {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Could not read stdin")?;
            buf
        }
    };

    let value = parse_text(&text, args.shape, &args.columns)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SERVERS: &str = "\
Server          Type
-------------   ------
10.0.0.1        server
time.corp.com   server
-------------   ------
";

    #[test]
    fn test_auto_table() {
        let value = parse_text(SERVERS, ShapeArg::Auto, &[]).unwrap();
        assert_eq!(
            value,
            json!([
                {"server": "10.0.0.1", "type": "server"},
                {"server": "time.corp.com", "type": "server"}
            ])
        );
    }

    #[test]
    fn test_columns_override_header() {
        let columns = vec!["host".to_string(), "kind".to_string()];
        let value = parse_text(SERVERS, ShapeArg::Auto, &columns).unwrap();
        assert_eq!(value[0], json!({"host": "10.0.0.1", "kind": "server"}));
    }

    #[test]
    fn test_stacked_keeps_blocks_apart() {
        let text = format!("{SERVERS}\n{SERVERS}");
        let value = parse_text(&text, ShapeArg::Stacked, &[]).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[1][1]["server"], json!("time.corp.com"));
    }

    #[test]
    fn test_raw_fallback() {
        let value = parse_text("Ping ok\n\n", ShapeArg::Auto, &[]).unwrap();
        assert_eq!(value, json!({"output": ["Ping ok"]}));
    }
}
