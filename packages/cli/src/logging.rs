use std::io::IsTerminal;

use clap::ValueEnum;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// `RUST_LOG` if set, otherwise `default_directive`.
fn filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the global subscriber, writing to stderr. Guest output arrives on
/// the `guest::stdout` and `guest::stderr` targets.
pub fn init(default_directive: &str, format: LogFormat) {
    let use_ansi = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    let builder = fmt::fmt()
        .with_env_filter(filter(default_directive))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(false);

    match format {
        LogFormat::Json => {
            let subscriber = builder.with_ansi(false).json().finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        LogFormat::Text => {
            let subscriber = builder.with_ansi(use_ansi).compact().finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
}
