use colored::{ColoredString, Colorize};
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

use crate::utils::config::PackagePaths;

/// Install the stderr logger. Our crate logs at Debug when `verbose`, Info otherwise;
/// dependencies only at Warn. `RUST_LOG` is read first, so it can still widen the filter.
/// Safe to call more than once (later calls are no-ops).
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let name = PackagePaths::get().pkg_name();

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(name, level)
        .format(move |buf, record| {
            let tag = match thread_tag() {
                Some(thread) => format!("{} {}", name.cyan(), thread.dimmed()),
                None => name.cyan().to_string(),
            };
            let line = match record.level() {
                Level::Error | Level::Warn => format!(
                    "[{} {} {}] {}",
                    tag,
                    level_label(record.level()),
                    record.target().white(),
                    record.args()
                ),
                Level::Debug | Level::Trace => {
                    format!("[{} {}] {}", tag, "debug".dimmed(), record.args())
                }
                Level::Info => format!("[{}] {}", tag, record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}

fn level_label(level: Level) -> ColoredString {
    match level {
        Level::Error => "ERROR".red(),
        Level::Warn => "WARN".yellow(),
        other => other.as_str().normal(),
    }
}

/// Name of a worker thread (e.g. the writer); `None` on the main thread.
fn thread_tag() -> Option<String> {
    let current = std::thread::current();
    current
        .name()
        .filter(|n| *n != "main")
        .map(str::to_string)
}
