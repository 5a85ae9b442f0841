use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt as _,
};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "sprat_control.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber. Keep the returned guard alive until exit
/// or buffered file output is lost.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let stdout = fmt::Layer::new()
        .with_writer(std::io::stdout)
        .with_span_events(FmtSpan::CLOSE);
    layers.push(if config.json {
        stdout.json().boxed()
    } else {
        stdout.with_ansi(true).boxed()
    });

    let guard = config.directory.as_ref().map(|directory| {
        let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_span_events(FmtSpan::CLOSE)
                .boxed(),
        );
        guard
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(layers).with(filter);

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global subscriber");

    guard
}
