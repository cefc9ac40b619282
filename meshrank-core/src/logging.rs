//! Structured logging setup built on `slog`/`sloggers`/`serdeconv`: the
//! config is parsed, the logger is actually built and returned, and a
//! `MESHRANK_LOG` environment variable lets an operator override the level
//! or swap in a full `sloggers` TOML config without recompiling.
use slog::Drain;
use sloggers::Config as _;
use std::env;

pub use slog::Logger;

const DEFAULT_CONFIG: &str = r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#;

/// Builds the root logger for one worker process. `MESHRANK_LOG` may hold
/// either a bare level name (`"info"`, `"trace"`, ...) or a full
/// `sloggers::LoggerConfig` TOML document; anything else falls back to the
/// compiled-in terminal/stderr/debug default.
pub fn init(rank: u32) -> Logger {
    let config: sloggers::LoggerConfig = match env::var("MESHRANK_LOG") {
        Ok(value) if looks_like_bare_level(&value) => {
            serdeconv::from_toml_str(&format!(
                "type = \"terminal\"\nlevel = \"{}\"\ndestination = \"stderr\"\n",
                value
            ))
            .unwrap_or_else(|_| default_config())
        }
        Ok(value) => serdeconv::from_toml_str(&value).unwrap_or_else(|_| default_config()),
        Err(_) => default_config(),
    };

    let logger = config
        .build_logger()
        .unwrap_or_else(|_| fallback_logger());

    logger.new(slog::o!("rank" => rank))
}

fn default_config() -> sloggers::LoggerConfig {
    serdeconv::from_toml_str(DEFAULT_CONFIG).expect("built-in logging config must parse")
}

fn looks_like_bare_level(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "critical" | "error" | "warning" | "warn" | "info" | "debug" | "trace"
    )
}

/// Used only if the compiled-in TOML itself somehow fails to build a drain
/// (e.g. no terminal attached); discards everything rather than panicking,
/// since logging must never be the reason a worker fails to start.
fn fallback_logger() -> Logger {
    Logger::root(slog::Discard, slog::o!())
}

/// Per-peer child logger.
#[inline]
pub fn for_peer(parent: &Logger, peer: u32) -> Logger {
    parent.new(slog::o!("peer" => peer))
}
