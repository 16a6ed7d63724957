// UI layer: turns flags, config and interactive answers into an
// `UploadRequest`, shows a spinner while the upload runs, and prints the
// outcome. Prompts are only shown when stdin is a terminal and
// `--no-input` was not given.

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::cli::Cli;
use crate::config::EffectiveConfig;
use crate::errors::FirError;
use crate::workflow::{BuildArtifact, ReleaseNotes, UploadRequest};

/// Values needed to build the client and run one upload.
#[derive(Debug)]
pub struct Inputs {
    pub user_token: String,
    pub request: UploadRequest,
}

/// Resolve every input in order flag > environment/config > prompt, and
/// check the build file exists before anything touches the network.
pub fn resolve_inputs(cli: &Cli, cfg: &EffectiveConfig) -> Result<Inputs> {
    let interactive = !cli.no_input && std::io::stdin().is_terminal();

    let file = match &cli.file {
        Some(f) => f.clone(),
        None => determine_file(&std::env::current_dir()?, interactive)?,
    };
    if !file.is_file() {
        return Err(FirError::Usage(format!("Missing or unspecified .ipa file: {}", file.display())).into());
    }

    let user_token = require(
        cli.user_token.clone().or_else(|| cfg.user_token.clone()),
        interactive,
        "Missing User Token",
        || Ok(Password::new().with_prompt("User Token").interact()?),
    )?;
    let app_id = require(
        cli.app_id.clone().or_else(|| cfg.app_id.clone()),
        interactive,
        "Missing App Id",
        || Ok(Input::<String>::new().with_prompt("App Id").interact_text()?),
    )?;

    let release = ReleaseNotes {
        changelog: optional(cli.notes.clone(), interactive, || ask_optional("Release notes"))?,
        version: optional(cli.app_version.clone(), interactive, || ask_optional("App Version"))?,
        short_version: optional(cli.short_version.clone(), interactive, || ask_optional("Short Version"))?,
    };

    debug!(file = %file.display(), app_id = %app_id, interactive, "inputs.resolved");
    Ok(Inputs {
        user_token,
        request: UploadRequest { app_id, artifact: BuildArtifact::ipa(file), release },
    })
}

fn require(
    value: Option<String>,
    interactive: bool,
    missing: &str,
    ask: impl FnOnce() -> Result<String>,
) -> Result<String> {
    let value = match value {
        Some(v) => Some(v),
        None if interactive => Some(ask()?),
        None => None,
    };
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FirError::Usage(missing.to_string()).into()),
    }
}

/// Release metadata may be left out; a blank answer means "skip".
fn optional(
    value: Option<String>,
    interactive: bool,
    ask: impl FnOnce() -> Result<String>,
) -> Result<Option<String>> {
    let value = match value {
        Some(v) => Some(v),
        None if interactive => Some(ask()?),
        None => None,
    };
    Ok(value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()))
}

fn ask_optional(prompt: &str) -> Result<String> {
    Ok(Input::<String>::new().with_prompt(prompt).allow_empty(true).interact_text()?)
}

/// Pick the build from the given directory: the only `.ipa` there, or a
/// choice among several when we can ask.
pub fn determine_file(dir: &Path, interactive: bool) -> Result<PathBuf> {
    let mut found = find_ipas(dir)?;
    match found.len() {
        0 => Err(FirError::Usage("Missing or unspecified .ipa file".into()).into()),
        1 => Ok(found.remove(0)),
        _ if interactive => {
            let names: Vec<String> = found.iter().map(|p| p.display().to_string()).collect();
            let idx = Select::new().with_prompt("Select .ipa file").items(&names).default(0).interact()?;
            Ok(found.remove(idx))
        }
        n => Err(FirError::Usage(format!("Found {n} .ipa files, choose one with --file")).into()),
    }
}

fn find_ipas(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("ipa")))
        .collect();
    found.sort();
    Ok(found)
}

/// Run `f` behind a spinner on stderr. indicatif hides it when stderr is
/// not a terminal.
pub fn with_spinner<T>(message: &str, f: impl FnOnce() -> T) -> T {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg} ({elapsed})").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let out = f();
    spinner.finish_and_clear();
    out
}

pub fn say_ok(msg: &str) {
    if std::io::stdout().is_terminal() {
        println!("{}", msg.green());
    } else {
        println!("{msg}");
    }
}

pub fn say_error(msg: &str) {
    if std::io::stderr().is_terminal() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{msg}");
    }
}
