use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu",
    version,
    about = "mdscript CLI - Execute and check declarative integration scripts: integrator modes, integration methods and forces, reconciled before every run.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a script against the recording engine and print what every run was handed.
    Run(RunArgs),
    /// Parse and validate a script without executing any command.
    Check(CheckArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the script file in TOML format.
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Override `system.mode` from the script ('cpu' or 'gpu').
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Do not draw a progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the script file in TOML format.
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Override `system.mode` from the script ('cpu' or 'gpu').
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_a_script_and_optional_mode() {
        let cli = Cli::parse_from(["mdscript", "-vv", "run", "job.toml", "--mode", "gpu"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.script, PathBuf::from("job.toml"));
                assert_eq!(args.mode.as_deref(), Some("gpu"));
                assert!(!args.no_progress);
            }
            Commands::Check(_) => panic!("Expected 'run' subcommand"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["mdscript", "-q", "-v", "check", "job.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli = Cli::parse_from(["mdscript", "check", "job.toml", "--log-file", "out.log"]);
        assert_eq!(cli.log_file, Some(PathBuf::from("out.log")));
        assert!(matches!(cli.command, Commands::Check(_)));
    }
}
