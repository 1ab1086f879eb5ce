//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sitesnap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export a site installation as a sandbox archive
    Export(ExportArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

#[derive(clap::Args)]
pub struct ExportArgs {
    /// Core installation directory
    #[arg(value_name = "CORE_DIR")]
    pub core: PathBuf,

    /// Content directory, mounted at wp-content/ (may live inside CORE_DIR)
    #[arg(long, value_name = "DIR")]
    pub content: Option<PathBuf>,

    /// Output archive path, or '-' for stdout (default: download name in
    /// the current directory)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Overwrite output file if exists
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Export target, used to name the download (sandbox-<TARGET>.zip)
    #[arg(long, value_name = "TARGET")]
    pub target: Option<String>,

    /// Compression level (0 = store, 1-9 = deflate)
    #[arg(short = 'l', long, default_value = "6", value_parser = clap::value_parser!(u8).range(0..=9))]
    pub compression_level: u8,

    /// Exclude a subtree, relative to the archive root (can be repeated)
    #[arg(long = "exclude-path", value_name = "PATH")]
    pub exclude_paths: Vec<String>,

    /// Exclude files by name pattern (can be repeated)
    #[arg(long = "exclude", short = 'x', value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Skip files larger than this (K, M, G, T suffixes)
    #[arg(long, value_parser = parse_byte_size)]
    pub max_file_size: Option<u64>,

    /// Include version control directories (.git, .svn, ...)
    #[arg(long)]
    pub include_vcs: bool,

    /// Skip hidden files and directories
    #[arg(long)]
    pub skip_hidden: bool,

    /// Site version passed to the sandbox
    #[arg(long, value_name = "VERSION", default_value = "")]
    pub site_version: String,

    /// Runtime version passed to the sandbox
    #[arg(long, value_name = "VERSION", default_value = "")]
    pub runtime_version: String,

    /// Sandbox client script URL
    #[arg(long, value_name = "URL")]
    pub client_url: Option<String>,

    /// Sandbox remote page URL
    #[arg(long, value_name = "URL")]
    pub remote_url: Option<String>,

    /// Template rendered over the site's configuration file
    #[arg(long, value_name = "FILE")]
    pub config_template: Option<PathBuf>,

    /// Archive path the rendered template is written to
    #[arg(long, value_name = "PATH", default_value = "wp-config.php", requires = "config_template")]
    pub config_path: String,

    /// Extra template variable (can be repeated)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Do not add the sandbox.json manifest
    #[arg(long)]
    pub no_manifest: bool,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Parse byte size with optional suffix (K, M, G, T)
#[allow(clippy::option_if_let_else)]
fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty byte size".to_string());
    }

    let (num_str, multiplier) = if let Some(stripped) = s.strip_suffix('T') {
        (stripped, 1024_u64.pow(4))
    } else if let Some(stripped) = s.strip_suffix('G') {
        (stripped, 1024_u64.pow(3))
    } else if let Some(stripped) = s.strip_suffix('M') {
        (stripped, 1024_u64.pow(2))
    } else if let Some(stripped) = s.strip_suffix('K') {
        (stripped, 1024)
    } else {
        (s, 1)
    };

    num_str
        .parse::<u64>()
        .map_err(|_| format!("invalid byte size: {s}"))
        .and_then(|n| {
            n.checked_mul(multiplier)
                .ok_or_else(|| format!("byte size overflow: {s}"))
        })
}

/// Parse a `NAME=VALUE` template variable
fn parse_var(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_byte_size() {
        assert_eq!(parse_byte_size("100").unwrap(), 100);
        assert_eq!(parse_byte_size("1K").unwrap(), 1024);
        assert_eq!(parse_byte_size("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_byte_size("3G").unwrap(), 3 * 1024 * 1024 * 1024);
        assert_eq!(parse_byte_size("1T").unwrap(), 1024_u64.pow(4));
        assert!(parse_byte_size("invalid").is_err());
        assert!(parse_byte_size("").is_err());
    }

    #[test]
    fn test_parse_byte_size_overflow() {
        assert!(parse_byte_size("18446744073709551615K").is_err());
        assert!(parse_byte_size("17592186044416G").is_err());
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("db_name=sandbox").unwrap(),
            ("db_name".to_string(), "sandbox".to_string())
        );
        assert_eq!(
            parse_var("url=https://a.test/?x=1").unwrap().1,
            "https://a.test/?x=1"
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_export_args_defaults() {
        let cli = Cli::try_parse_from(["sitesnap", "export", "/srv/site"]).unwrap();
        let Commands::Export(args) = cli.command else {
            panic!("expected export command");
        };
        assert_eq!(args.compression_level, 6);
        assert_eq!(args.config_path, "wp-config.php");
        assert!(args.output.is_none());
        assert!(!args.no_manifest);
    }

    #[test]
    fn test_compression_level_range() {
        assert!(Cli::try_parse_from(["sitesnap", "export", "/srv", "-l", "0"]).is_ok());
        assert!(Cli::try_parse_from(["sitesnap", "export", "/srv", "-l", "10"]).is_err());
    }
}
