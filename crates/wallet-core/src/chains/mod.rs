//! Built-in chain plugins.

mod btc;
mod eth;

pub use btc::BitcoinPlugin;
pub use eth::EvmPlugin;
