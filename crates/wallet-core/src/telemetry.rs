use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::WalletConfig;
use crate::error::{WalletError, WalletResult};

/// Install the global tracing subscriber.
///
/// Output goes to stderr. `RUST_LOG` wins over `config.log_level`. Fails
/// if a subscriber is already installed.
pub fn init_tracing(config: &WalletConfig) -> WalletResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| WalletError::Config(format!("invalid log filter: {e}")))?;

    let json = config
        .log_json
        .then(|| fmt::layer().json().with_target(true).with_writer(std::io::stderr));
    let text = (!config.log_json).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .map_err(|e| WalletError::Config(format!("tracing already initialised: {e}")))
}
