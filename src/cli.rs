use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ddctl")]
#[command(version)]
#[command(about = "Reconcile a backup appliance with a declared state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Appliance config file (default: ~/.config/ddctl/config.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Clone, Default)]
pub struct ConnectionArgs {
    /// Appliance host name or address
    #[arg(long, env = "DDCTL_HOST", global = true)]
    pub host: Option<String>,

    /// Login user
    #[arg(long = "user", env = "DDCTL_USER", global = true)]
    pub username: Option<String>,

    /// Login password
    #[arg(long, env = "DDCTL_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bring one resource to its declared state
    Apply(ApplyArgs),

    /// Show what apply would run, without writing anything
    Plan(DesiredArgs),

    /// Normalize captured appliance output into JSON
    Parse(ParseArgs),

    /// List the action rules of a resource kind in priority order
    Catalog {
        /// Resource kind (omit to list every kind)
        kind: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Desired State
// ============================================================================

#[derive(Args)]
pub struct DesiredArgs {
    /// Resource kind (nfs, cifs, mtree, user, net, ...)
    pub kind: String,

    /// Desired-state file (JSON or TOML)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Desired attribute as key=value; commas make a list
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub desired: DesiredArgs,

    /// Print the invocations instead of running them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Apply without asking
    #[arg(short, long)]
    pub yes: bool,
}

// ============================================================================
// Parse
// ============================================================================

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum ShapeArg {
    /// Classify the layout from its cues
    #[default]
    Auto,
    /// Export detail: preamble plus client and referral tables
    Export,
    /// Every dashed table block, kept apart
    Stacked,
}

#[derive(Args)]
pub struct ParseArgs {
    /// Captured output (default: stdin)
    pub file: Option<PathBuf>,

    /// Column names to zip table rows against (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Layout to parse as
    #[arg(long, value_enum, default_value_t = ShapeArg::Auto)]
    pub shape: ShapeArg,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_args() {
        let cli = Cli::try_parse_from([
            "ddctl", "apply", "nfs", "--set", "name=backup", "--set", "clients=a,b", "-y",
        ])
        .unwrap();
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.desired.kind, "nfs");
        assert_eq!(args.desired.set, ["name=backup", "clients=a,b"]);
        assert!(args.yes);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_parse_columns_split() {
        let cli = Cli::try_parse_from(["ddctl", "parse", "--columns", "a,b,c", "--shape", "stacked"])
            .unwrap();
        let Command::Parse(args) = cli.command else {
            panic!("expected parse");
        };
        assert_eq!(args.columns, ["a", "b", "c"]);
        assert!(matches!(args.shape, ShapeArg::Stacked));
        assert!(args.file.is_none());
    }
}
