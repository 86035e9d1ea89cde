//! Resource kinds known to ddctl
//!
//! Each kind is a table of data: the ordered action rules, the command
//! and endpoint templates, and how every action reads and reconciles the
//! appliance. The engine in `converge` does the rest.

use anyhow::{Result, bail};
use converge::ResourceKind;

pub mod cifs;
pub mod ddboost;
pub mod imperative;
pub mod mtree;
pub mod nfs;
pub mod ntp;
pub mod quota;
pub mod user;

/// Every kind name, declarative kinds first
pub const KINDS: &[&str] = &[
    "nfs",
    "cifs",
    "ntp",
    "quota",
    "mtree",
    "ddboost",
    "user",
    "net",
    "config",
    "adminaccess",
    "replication",
    "filesys",
    "compression",
];

/// Build the catalog of a resource kind by name
pub fn lookup(name: &str) -> Result<ResourceKind> {
    let kind = match name {
        "nfs" => nfs::kind()?,
        "cifs" => cifs::kind()?,
        "ntp" => ntp::kind()?,
        "quota" => quota::kind()?,
        "mtree" => mtree::kind()?,
        "ddboost" => ddboost::kind()?,
        "user" => user::kind()?,
        "net" => imperative::net()?,
        "config" => imperative::config()?,
        "adminaccess" => imperative::adminaccess()?,
        "replication" => imperative::replication()?,
        "filesys" => imperative::filesys()?,
        "compression" => imperative::compression()?,
        other => bail!(
            "Unknown resource kind '{other}' (expected one of: {})",
            KINDS.join(", ")
        ),
    };
    Ok(kind)
}
