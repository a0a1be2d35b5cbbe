use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "attendd")]
#[command(about = "Attendance tracker sidecar speaking JSON lines on stdin/stdout", long_about = None)]
pub struct Config {
    /// Workspace folder to open at startup instead of waiting for workspace.select
    #[arg(long, env = "ATTENDD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// tracing filter directive for stderr logs
    #[arg(long, env = "ATTENDD_LOG", default_value = "attendd=info")]
    pub log_filter: String,
}
