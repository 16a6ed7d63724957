// Entrypoint for the CLI application.
// - Parses flags, loads config, resolves inputs and runs the upload.
// - This is the only place that exits; everything below returns errors and
//   `errors::exit_code` picks the status from the error chain.

use anyhow::Result;
use clap::Parser;
use fir_distribute::api::ApiClient;
use fir_distribute::cli::Cli;
use fir_distribute::config::EffectiveConfig;
use fir_distribute::errors::exit_code;
use fir_distribute::logging::init_logging;
use fir_distribute::ui;
use fir_distribute::workflow::UploadWorkflow;
use std::process;
use std::time::Instant;
use tracing::info;

fn main() {
    let start = Instant::now();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            ui::say_error(&format!("{e:#}"));
            exit_code(&e)
        }
    };
    info!(took_ms = %start.elapsed().as_millis(), exit_code = code, "cli.finished");
    if code != 0 {
        process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(&cli.log_level, &cli.log_format)?;
    let mut cfg = EffectiveConfig::load()?;
    if let Some(base) = &cli.api_base {
        cfg.api_base = base.clone();
    }

    let inputs = ui::resolve_inputs(&cli, &cfg)?;
    let client = ApiClient::new(&inputs.user_token, &cfg.client_settings())?;
    let public_base = client.base_url().to_string();
    let workflow = UploadWorkflow::new(client, &public_base);

    let published = ui::with_spinner("Uploading build to fir.im...", || workflow.run(&inputs.request))?;
    ui::say_ok(&format!(
        "Build successfully uploaded to fir.im, visit url: {}",
        published.public_url
    ));
    Ok(())
}
