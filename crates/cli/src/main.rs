//! `blueprints` binary

// CLI binary needs to output to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use blueprints_cli::tracing::init_tracing;
use blueprints_cli::{Cli, EXIT_CLI, EXIT_OK, commands, exit_code_for, render_error};
use clap::Parser;

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.tracing_config()) {
        eprintln!("{e:?}");
        std::process::exit(EXIT_CLI);
    }

    let exit_code = match commands::run(&cli) {
        Ok(output) => {
            print!("{output}");
            EXIT_OK
        }
        Err(err) => {
            let code = exit_code_for(&err);
            tracing::debug!(exit_code = code, "Command failed");
            render_error(err, cli.json);
            code
        }
    };
    std::process::exit(exit_code);
}
