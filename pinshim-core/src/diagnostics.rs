//! Stdout diagnostics for the preloaded shim.

use std::io::Write;
use env_logger::fmt::Color;
use env_logger::{Builder, Env, Target, WriteStyle};
use log::{Level, LevelFilter};

/// Prefix of every line the shim prints.
pub const LINE_PREFIX: &str = "[pthread wrapper]";

/// env_logger filter variable; defaults to `info` when unset.
pub const LOG_FILTER_VAR: &str = "PINSHIM_LOG";

/// env_logger style variable (`always`, `auto` or `never`); defaults to `never`.
pub const LOG_STYLE_VAR: &str = "PINSHIM_LOG_STYLE";

/// Installs the stdout logger. When `silent`, every record is discarded.
///
/// A logger that is already installed is left in place.
pub fn init(silent: bool) {
    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .write_style(WriteStyle::Never)
        .format(|buf, record| {
            let mut style = buf.style();
            style.set_bold(true).set_color(match record.level() {
                Level::Error => Color::Red,
                Level::Warn => Color::Yellow,
                _ => Color::Cyan,
            });

            if record.level() <= Level::Warn {
                writeln!(buf, "{} {}: {}", style.value(LINE_PREFIX), record.level(), record.args())
            } else {
                writeln!(buf, "{} {}", style.value(LINE_PREFIX), record.args())
            }
        });

    if silent {
        builder.filter_level(LevelFilter::Off);
    } else {
        builder
            .filter_level(LevelFilter::Info)
            .parse_env(Env::new().filter(LOG_FILTER_VAR).write_style(LOG_STYLE_VAR));
    }

    let _ = builder.try_init();
}
