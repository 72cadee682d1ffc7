use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "hydrate-dashboard.log";

/// Keeps the file writer and Sentry client alive; drop it last.
#[must_use]
pub struct LogGuard {
    installed: bool,
    _file: Option<WorkerGuard>,
    _sentry: Option<sentry::ClientInitGuard>,
}

impl LogGuard {
    /// Whether this call installed the global subscriber; `false` when one
    /// was already set.
    pub const fn is_installed(&self) -> bool {
        self.installed
    }
}

/// Installs the global subscriber: human logs on stderr, plain logs in a
/// daily rotated file and, with a DSN configured, errors forwarded to Sentry.
pub fn init(config: &Config) -> LogGuard {
    let sentry = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        EnvFilter::builder().parse_lossy(format!("hydrate_dashboard={}", config.log_level))
    };

    let appender = config.log_dir().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(dir)
            .map_err(|err| eprintln!("Unable to log to file: {err}"))
            .ok()
    });
    let (file_layer, file_guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .with(sentry.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .try_init()
        .map_err(|err| eprintln!("Unable to install log subscriber: {err}"))
        .is_ok();

    LogGuard {
        installed,
        _file: file_guard,
        _sentry: sentry,
    }
}
