use std::str::FromStr;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Directive, fmt::writer::MakeWriterExt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt, EnvFilter, Layer,
};

pub const LOG_FILE_NAME: &str = "./bf2cc_monitor.log";

/// Directives applied to both outputs, quieting dependencies so the monitor's
/// own lines stand out.
fn quiet_dependencies(filter: EnvFilter) -> EnvFilter {
    ["tokio=warn", "runtime=warn", "atomic_write_file=warn"]
        .into_iter()
        .map(|d| Directive::from_str(d).expect("Bad directive"))
        .fold(filter, EnvFilter::add_directive)
}

pub fn init_tracing() -> Option<WorkerGuard> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(quiet_dependencies(EnvFilter::from_default_env())),
    );

    match std::fs::File::create(LOG_FILE_NAME) {
        Ok(latest_log) => {
            let (file_writer, guard) = tracing_appender::non_blocking(latest_log);
            subscriber
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_target(false)
                        .with_writer(file_writer.with_max_level(tracing::Level::TRACE))
                        .with_filter(quiet_dependencies(
                            EnvFilter::builder().parse("debug").expect("Bad env"),
                        )),
                )
                .init();
            Some(guard)
        }
        Err(e) => {
            subscriber.init();
            tracing::error!("Failed to create {LOG_FILE_NAME}, logging to stderr only: {e}");
            None
        }
    }
}
