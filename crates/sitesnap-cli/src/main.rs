//! Sitesnap CLI - Export a site installation as a sandbox archive.

mod cli;
mod commands;
mod error;
mod logging;
mod output;
mod progress;

use clap::Parser;
use cli::Commands;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let archive_on_stdout = matches!(
        &cli.command,
        Commands::Export(args) if args.output.as_deref() == Some(Path::new("-"))
    );
    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet, archive_on_stdout);

    let result = match &cli.command {
        Commands::Export(args) => {
            let show_progress = !cli.quiet && !cli.json && progress::CliProgress::should_show();
            commands::export::execute(args, &*formatter, show_progress)
        }
        Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            formatter.format_error(&err);
            ExitCode::FAILURE
        }
    }
}
