use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

use docket_platform::AppPaths;

/// Initialize terminal and file logging. Failures here are not fatal; the
/// shell keeps working without a log file.
pub fn init(debug_enabled: bool) {
    let level = if debug_enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("docket")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(file_logger) = file_logger(config) {
        loggers.push(file_logger);
    }

    let _ = CombinedLogger::init(loggers);
}

fn file_logger(config: simplelog::Config) -> Option<Box<WriteLogger<std::fs::File>>> {
    let paths = AppPaths::new().ok()?;
    paths.ensure_dirs().ok()?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths.log_file())
        .ok()?;
    Some(WriteLogger::new(LevelFilter::Debug, config, file))
}
