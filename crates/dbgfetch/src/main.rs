//! `dbgfetch`: look up a build-id and print the cached file's path.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::app::App;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let app = App::parse();

    // RUST_LOG wins; otherwise 0 = warn, 1 = info, 2+ = debug.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match app.verbose {
        0 => EnvFilter::new("dbgfetch=warn,dbgfetch_fetch=warn"),
        1 => EnvFilter::new("dbgfetch=info,dbgfetch_fetch=info"),
        _ => EnvFilter::new("dbgfetch=debug,dbgfetch_fetch=debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli::run(app).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            if let Some(err) = e.downcast_ref::<dbgfetch::Error>() {
                for failure in err.failures() {
                    eprintln!("  {failure}");
                }
                return ExitCode::from(err.code().unsigned_abs().min(255) as u8);
            }
            ExitCode::FAILURE
        }
    }
}
