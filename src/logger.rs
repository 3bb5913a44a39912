//! Optional logging setup. The core never installs a logger on its own —
//! every `log::debug!`/`info!`/`warn!`/`error!` call is a no-op until a
//! caller wires up a sink. These helpers are a convenience for binaries and
//! tests that just want a reasonable rolling-file default.

use std::path::Path;

/// Initializes logging from a `log4rs.yaml` file in the working directory,
/// if present. Silently does nothing if the file is missing or invalid.
pub fn init() {
    let _ = log4rs::init_file("log4rs.yaml", log4rs::config::Deserializers::default());
}

/// Initializes logging from a specific config file path.
///
/// # Errors
/// Returns an error if the file cannot be parsed as a `log4rs` config.
pub fn init_path(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Configures a size-rolling file appender under `dir` (default: current
/// directory) at the given level (default: info), keeping `retention`
/// rolled files (default: 7).
///
/// # Errors
/// Returns an error if the appender cannot be built or the logger is
/// already initialized with an incompatible configuration.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    use log::LevelFilter;
    use log4rs::append::rolling_file::RollingFileAppender;
    use log4rs::append::rolling_file::policy::compound::{
        CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
    };
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;
    use std::path::PathBuf;

    let base =
        dir.map(PathBuf::from).unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let keep = retention.unwrap_or(7) as u32;
    let lvl = match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join("logtree.{}.log").display()), keep)?;
    let policy =
        CompoundPolicy::new(Box::new(SizeTrigger::new(10 * 1024 * 1024)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}")))
        .build(base.join("logtree.log"), Box::new(policy))?;

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(appender)))
        .build(Root::builder().appender("file").build(lvl))?;
    log4rs::init_config(config)?;
    Ok(())
}
