mod callbacks;
mod cli;
mod config;
mod error;
mod screenshot;
mod session;
mod telemetry;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;
use computer_use::sampling::AnthropicSamplingLoop;
use computer_use::tools::ToolCollection;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Instrument;

use crate::cli::Cli;
use crate::config::Settings;
use crate::screenshot::ScreenshotSink;
use crate::session::Session;
use crate::telemetry::{init_tracing, Telemetry};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenv::dotenv().ok();

    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(err) => {
            init_tracing("info", None);
            tracing::error!("Fatal error: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let tracing_guard = init_tracing(&settings.log_level, settings.otlp_endpoint());

    let telemetry = match Telemetry::new(&settings.model) {
        Ok(telemetry) => Arc::new(telemetry),
        Err(err) => {
            tracing::error!("Fatal error: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let span = telemetry.span().clone();

    let outcome = tokio::select! {
        result = run(cli, settings, Arc::clone(&telemetry)).instrument(span) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let code = finish(outcome, &telemetry);
    tracing_guard.shutdown();
    ExitCode::from(code)
}

/// Log how the run ended and pick the exit status
///
/// `None` means the run was interrupted with Ctrl-C.
fn finish(outcome: Option<Result<()>>, telemetry: &Telemetry) -> u8 {
    match outcome {
        Some(Ok(())) => {
            telemetry.log_summary();
            0
        }
        Some(Err(err)) => {
            tracing::error!("Fatal error: {:#}", err);
            1
        }
        None => {
            tracing::info!("SIGINT: Application stopped by user");
            0
        }
    }
}

async fn run(cli: Cli, settings: Settings, telemetry: Arc<Telemetry>) -> Result<()> {
    let sink = Arc::new(ScreenshotSink::new(&settings.screenshots_dir));
    let tools = ToolCollection::computer_use(settings.display.to_display());
    let sampling = AnthropicSamplingLoop::new(&settings.api_host, tools);

    let session = Session::new(settings, Box::new(sampling), sink, telemetry);
    let messages = session.run(&cli.instruction()).await?;
    tracing::debug!("Conversation finished after {} messages", messages.len());
    Ok(())
}
