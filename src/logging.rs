use fern::Dispatch;
use log::LevelFilter;

pub use log::LevelFilter::{Debug, Error, Info, Trace, Warn};

/// Wire up the global logger. Safe to call more than once; only the first
/// call takes effect (relevant when multiple tests initialize it).
pub fn setup_logging(verbosity: LevelFilter) {
    let _ = Dispatch::new()
        .level(verbosity)
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}: {}", record.level(), record.target(), message));
        })
        .chain(std::io::stdout())
        .apply();
}
