//! runguard CLI entry point.

#![allow(clippy::print_stderr)]

use runguard::cli::{self, EXIT_FAILURE, exit_code_for, render_error};
use runguard::commands;
use runguard::tracing::{TracingConfig, init_tracing};

fn main() {
    // NOTE: tracing may be unusable while panicking, so the hook prints directly.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.trace_format,
        level: cli.level.into(),
        ..Default::default()
    };
    if let Err(err) = init_tracing(tracing_config) {
        eprintln!("Failed to initialize tracing: {err}");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let exit_code = match rt.block_on(commands::execute(cli.command)) {
        Ok(code) => code,
        Err(err) => {
            render_error(&err);
            exit_code_for(&err)
        }
    };
    drop(rt);
    std::process::exit(exit_code);
}
