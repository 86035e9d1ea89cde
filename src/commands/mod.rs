pub mod apply;
pub mod catalog;
pub mod parse;
pub mod plan;

use anyhow::{Context, Result, bail};
use converge::{Descriptor, Value};
use std::fs;
use std::path::Path;

use crate::Context as AppContext;
use crate::cli::DesiredArgs;
use crate::config::{Config, Overrides, expand_path};
use crate::transport::Dispatch;

/// Parse one `--set key=value` flag
///
/// `true`/`false` become booleans, whole numbers integers, and a value
/// with commas a list of text items.
pub fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Expected KEY=VALUE, got '{raw}'");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Empty key in '{raw}'");
    }

    let value = match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        v if v.contains(',') => Value::list(
            v.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty()),
        ),
        v => v.parse::<i64>().map_or_else(|_| Value::text(v), Value::Int),
    };
    Ok((key.to_string(), value))
}

/// Read a desired-state file, TOML or JSON by extension
pub fn read_descriptor(path: &Path) -> Result<Descriptor> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let is_toml = path.extension().is_some_and(|e| e == "toml");
    let descriptor: Descriptor = if is_toml {
        toml::from_str(&content)
            .with_context(|| format!("Invalid desired state in {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid desired state in {}", path.display()))?
    };
    Ok(descriptor)
}

/// Build the desired state from `-f` and `--set`; flags win over the file
pub fn load_desired(args: &DesiredArgs) -> Result<Descriptor> {
    let mut desired = match &args.file {
        Some(path) => {
            let path = expand_path(&path.to_string_lossy());
            read_descriptor(&path)?.normalize()?
        }
        None => Descriptor::new(),
    };
    for raw in &args.set {
        let (key, value) = parse_assignment(raw)?;
        desired.insert(&key, value);
    }
    if desired.is_empty() {
        bail!("No desired state given: pass -f FILE or --set KEY=VALUE");
    }
    Ok(desired)
}

/// Executor for the configured appliance
pub fn connect(ctx: &AppContext) -> Result<Dispatch> {
    let overrides = Overrides {
        host: ctx.connection.host.clone(),
        username: ctx.connection.username.clone(),
        password: ctx.connection.password.clone(),
    };
    let config = Config::load(ctx.config.as_deref(), &overrides)?;
    Ok(Dispatch::new(config.appliance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn args(file: Option<PathBuf>, set: &[&str]) -> DesiredArgs {
        DesiredArgs {
            kind: "nfs".into(),
            file,
            set: set.iter().map(|s| s.to_string()).collect(),
            json: false,
        }
    }

    #[test]
    fn test_parse_assignment_types() {
        assert_eq!(
            parse_assignment("restart=true").unwrap(),
            ("restart".to_string(), Value::Bool(true))
        );
        assert_eq!(
            parse_assignment("count=3").unwrap(),
            ("count".to_string(), Value::Int(3))
        );
        assert_eq!(
            parse_assignment("clients=10.0.0.1, 10.0.0.2").unwrap().1,
            Value::list(["10.0.0.1", "10.0.0.2"])
        );
        assert_eq!(
            parse_assignment("path=/data/col1/a=b").unwrap().1,
            Value::text("/data/col1/a=b")
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn test_toml_file_with_flag_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.toml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(
            b"name = \"backup\"\nclients = [\"10.0.0.5\"]\nnew_export_name = \"b2\"\n",
        )
        .unwrap();

        let desired = load_desired(&args(Some(path), &["new-export-name=b3"])).unwrap();
        assert_eq!(desired.get("name"), Some(&Value::text("backup")));
        assert_eq!(desired.get("clients"), Some(&Value::list(["10.0.0.5"])));
        assert_eq!(desired.get("new-export-name"), Some(&Value::text("b3")));
        assert!(!desired.contains("new_export_name"));
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("share.json");
        fs::write(&path, r#"{"share": "s1", "browsing": true}"#).unwrap();
        let desired = load_desired(&args(Some(path), &[])).unwrap();
        assert_eq!(desired.get("browsing"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_empty_desired_state_fails() {
        let err = load_desired(&args(None, &[])).unwrap_err();
        assert!(err.to_string().contains("No desired state"));
    }
}
