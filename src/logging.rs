use std::io::Write;

use env_logger::WriteStyle;
use log::LevelFilter;

/// Installs an `env_logger` with the crate's `[ISIM | LEVEL]` format.
///
/// Call once from the embedding application or test harness; the crate itself only emits
/// through `log`. `RUST_LOG` overrides the default `Info` filter. Fails if a logger is already
/// installed.
pub fn try_init() -> Result<(), log::SetLoggerError> {
    env_logger::builder()
        .format(|buf, record| writeln!(buf, "[ISIM | {}] {}", record.level(), record.args()))
        .write_style(WriteStyle::Always)
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .try_init()
}
