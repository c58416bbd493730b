use std::{
    sync::{Once, OnceLock},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing_appender::rolling::{self, Builder};
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt};

static INIT_LOG: Once = Once::new();
static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

const LOG_FILE_PREFIX: &str = "volmex-deployer";

/// Install the global subscriber: terminal output plus a daily rolling file.
///
/// Deployment runs leave no other persisted trace than the manifest and this
/// log file, so the file layer is always on. Every run writes to its own file,
/// suffixed with the start time in seconds.
pub fn log_init(filter: String, log_path: Option<String>) {
    INIT_LOG.call_once(|| {
        let unique_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let log_directory = log_path.as_deref().unwrap_or("logs");
        let filename_suffix = format!("{}.log", unique_id);

        let file_layer = match Builder::new()
            .rotation(rolling::Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix(&filename_suffix)
            .build(log_directory)
        {
            Ok(file_appender) => {
                let (non_blocking_file_writer, guard) =
                    tracing_appender::non_blocking(file_appender);

                // Guard must outlive the program or buffered lines are lost
                let _ = LOG_GUARD.set(guard);

                Some(
                    Layer::new()
                        .with_writer(non_blocking_file_writer)
                        .with_ansi(false),
                )
            }
            Err(err) => {
                eprintln!(
                    "Failed to create log directory {}: {:?}, logging to terminal only",
                    log_directory, err
                );
                None
            }
        };

        let terminal_layer = Layer::new().with_writer(std::io::stdout).with_ansi(true);

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| filter.into());

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(terminal_layer)
            .init();
    });
}

/// Default initialize tracing log.
///
/// Must also import [`deploy_core::core::logging::log_init`] function.
///
/// ## Using
/// ```rust,no_run
/// use deploy_core::{core::logging::log_init, init_log};
///
/// init_log!();
/// tracing::info!("Deploying {} on {}", "VolmexProtocol", "localhost");
/// ```
///
/// # Configuring
/// Standard `RUST_LOG` environment variable can be used to configure, e.g.:
///
/// ```bash
/// export RUST_LOG="volmex_deployer=debug,volmex_contracts=debug"
/// ```
#[macro_export]
macro_rules! init_log {
    () => {
        log_init(
            format!(
                "{}=info,volmex_contracts=info,deploy_core=info",
                env!("CARGO_CRATE_NAME")
            ),
            None,
        );
    };
    ($log_path:expr) => {
        log_init(
            format!(
                "{}=info,volmex_contracts=info,deploy_core=info",
                env!("CARGO_CRATE_NAME")
            ),
            $log_path,
        );
    };
}
