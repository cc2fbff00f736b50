use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;

use episode_rename::{
    Args, Batch, BatchSummary, CommandRenamer, CommandSelector, Console, RenameConfig, RenameError,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<RenameError>()
                .map_or(1, RenameError::exit_code);
            Console::stdio().error(format!("{e:#}"));
            ExitCode::from(code)
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = RenameConfig::try_from_args(args)?;

    let selector = CommandSelector::new(config.selector.clone());
    let renamer = CommandRenamer::new(config.renamer.clone());
    let stdin = io::stdin().lock();

    let mut batch = Batch::new(&config, selector, renamer, stdin, Console::stdio());
    let summary = batch.run().await?;

    let mut console = batch.into_console();
    print_summary(&mut console, &summary);
    Ok(())
}

fn print_summary<O: Write, E: Write>(console: &mut Console<O, E>, summary: &BatchSummary) {
    console.heading("Summary");

    if let Some(report) = &summary.initial {
        console.info(format!(
            "Normalized {} of {} selected file(s), {} without an episode number, {} failed",
            report.succeeded(),
            summary.selected.len(),
            summary.rejected.len(),
            report.failed()
        ));
    }

    if !summary.secondary.is_empty() {
        let moved = summary
            .secondary
            .iter()
            .filter(|r| r.outcome.is_ok())
            .count();
        console.info(format!(
            "Metadata renamer handled {} of {} file(s)",
            moved,
            summary.secondary.len()
        ));
    }
}

fn init_logging(verbosity: u8) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default = match verbosity {
        0 => "episode_rename=warn",
        1 => "episode_rename=info",
        _ => "episode_rename=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(io::stderr),
        )
        .with(filter)
        .init();
}
