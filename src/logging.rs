use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install the global logger for the binaries.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks debug over info.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder = Builder::from_env(Env::default().default_filter_or(level.to_string()));
    // a second call (tests, tools sharing a process) keeps the first logger
    let _ = builder.try_init();
}
