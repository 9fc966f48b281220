//! BioEncoder config CLI entry point.

use clap::Parser;

use bioencoder_config::cli::{commands, handle_error, Cli, Commands};
use bioencoder_config::infrastructure::logging::LoggerImpl;

fn main() {
    let cli = Cli::parse();

    let _logger = match LoggerImpl::init(&cli.log_config()) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    let loader = cli.loader();
    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args, &loader, cli.json),
        Commands::Show(args) => commands::show::execute(args, &loader, cli.json),
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
