use intelflow::cli::{Cli, CliHandler, ReportFormatter};
use std::process;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = match Cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Argument parsing failed: {}", e);
            process::exit(e.exit_code());
        }
    };

    init_logging(cli.is_verbose());

    let formatter = ReportFormatter::new(&cli);
    let handler = CliHandler::new(cli);

    let exit_code = match handler.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e));
            e.exit_code()
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("intelflow=debug")
        } else {
            EnvFilter::new("intelflow=warn")
        }
    });

    // stdout carries the report; logs go to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).without_time())
        .with(filter)
        .init();
}
