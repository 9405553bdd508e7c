use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::{EnvFilter, filter::Directive, fmt};

use crate::cli::{LogColor, Options};

/// Installs the global subscriber. `RUST_LOG` overrides `--log.level` per target.
pub fn init_tracing(opts: &Options) {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let use_color = match opts.log_color {
        LogColor::Always => true,
        LogColor::Never => false,
        LogColor::Auto => std::io::stderr().is_terminal(),
    };
    let include_target = matches!(opts.log_level, Level::DEBUG | Level::TRACE);

    fmt()
        .with_env_filter(log_filter)
        .with_target(include_target)
        .with_ansi(use_color)
        .with_writer(std::io::stderr)
        .init();
}
