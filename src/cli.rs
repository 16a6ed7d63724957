use clap::Parser;
use std::path::PathBuf;

#[derive(clap::ValueEnum, Clone, Debug)]
pub enum LogFormat {
    /// Compact lines without targets
    Auto,
    /// Full lines with targets
    Text,
    Json,
}

/// Distribute an .ipa file over fir.im
#[derive(Parser, Debug)]
#[command(name = "fir-distribute", version)]
pub struct Cli {
    /// .ipa file for the build (defaults to the only .ipa in the current directory)
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,
    /// User token, available at http://fir.im/user/info [env: FIR_USER_TOKEN]
    #[arg(short = 'u', long)]
    pub user_token: Option<String>,
    /// App id of the target app record [env: FIR_APP_ID]
    #[arg(short = 'a', long)]
    pub app_id: Option<String>,
    /// Release notes for the build
    #[arg(short = 'n', long)]
    pub notes: Option<String>,
    /// App version
    #[arg(long)]
    pub app_version: Option<String>,
    /// App short version
    #[arg(short = 'S', long)]
    pub short_version: Option<String>,
    /// API host, e.g. http://api.fir.im [env: FIR_API_BASE]
    #[arg(long)]
    pub api_base: Option<String>,
    /// Never prompt; fail when a required value is missing
    #[arg(long, default_value_t = false)]
    pub no_input: bool,
    /// Log level: trace|debug|info|warn|error
    #[arg(long, default_value = "warn")]
    pub log_level: String,
    /// Log format: auto|text|json
    #[arg(long, default_value = "auto")]
    pub log_format: LogFormat,
}
