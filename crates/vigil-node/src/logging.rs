use crate::config::LoggingConfig;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging system based on configuration
pub fn init_logging(config: &LoggingConfig, cli_verbose: u8) -> anyhow::Result<()> {
    let log_level = match cli_verbose {
        0 => config.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let mut filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vigil={}", log_level)),
    );
    for (module, level) in &config.module_filters {
        filter = filter.add_directive(format!("{}={}", module, level).parse()?);
    }

    let subscriber = tracing_subscriber::registry().with(filter);
    let file = match &config.file_output {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        ),
        None => None,
    };

    // Reports go to stdout, so logs go to stderr
    match config.format.as_str() {
        "json" => {
            let json_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(std::io::stderr);
            let file_layer = file.map(|f| {
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(f))
                    .with_ansi(false)
            });
            subscriber.with(json_layer).with(file_layer).try_init()?;
        }
        "compact" => {
            let compact_layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let file_layer = file.map(|f| {
                fmt::layer()
                    .compact()
                    .with_writer(Mutex::new(f))
                    .with_ansi(false)
            });
            subscriber.with(compact_layer).with(file_layer).try_init()?;
        }
        _ => {
            let show_location = matches!(log_level, "debug" | "trace");
            let pretty_layer = fmt::layer()
                .with_target(show_location)
                .with_line_number(show_location)
                .with_file(show_location)
                .with_writer(std::io::stderr);
            let file_layer = file.map(|f| {
                fmt::layer()
                    .with_writer(Mutex::new(f))
                    .with_ansi(false)
            });
            subscriber.with(pretty_layer).with(file_layer).try_init()?;
        }
    }

    Ok(())
}
