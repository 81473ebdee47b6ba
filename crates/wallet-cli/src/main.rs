//! Offline wallet tool: mnemonics, key derivation and message signing.
//!
//! The mnemonic is read from `MNEMONIC` (and `MNEMONIC_PASSPHRASE`), or a
//! `.env` file in the working directory.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use wallet_core::hd_derivation::MAX_DERIVE_COUNT;
use wallet_core::mnemonic::{generate_mnemonic, validate_mnemonic};
use wallet_core::{
    ChainClients, ChainId, EnvSeedProvider, KeyRecord, WalletConfig, WalletResult, WalletSession,
};

#[derive(Parser)]
#[command(name = "wallet")]
#[command(about = "Multi-chain HD wallet tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "WALLET_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new BIP-39 mnemonic
    Generate {
        /// Word count (12, 15, 18, 21 or 24)
        #[arg(short, long, default_value_t = 12)]
        words: usize,
    },

    /// Check a mnemonic's words and checksum
    Validate {
        /// Phrase to check
        phrase: String,
    },

    /// Derive key records for a chain
    Derive {
        /// eth, btc or btc-test
        #[arg(long)]
        chain: ChainId,

        /// Number of consecutive indices starting at 0
        #[arg(
            short = 'n',
            long,
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_DERIVE_COUNT))
        )]
        count: u32,

        /// Include private keys in the output
        #[arg(long)]
        show_private: bool,
    },

    /// Sign a message with an EVM account (EIP-191)
    SignMessage {
        #[arg(long, default_value = "eth")]
        chain: ChainId,

        #[arg(short, long, default_value_t = 0)]
        index: u32,

        message: String,
    },
}

fn main() -> WalletResult<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => WalletConfig::load(path)?,
        None => WalletConfig::default(),
    };
    if cli.verbose {
        config.log_level = "debug".to_string();
    }
    wallet_core::telemetry::init_tracing(&config)?;

    match cli.command {
        Commands::Generate { words } => {
            let phrase = generate_mnemonic(words)?;
            println!("{}", phrase.as_str());
        }
        Commands::Validate { phrase } => {
            let valid = validate_mnemonic(&phrase);
            println!("{}", json!({ "valid": valid }));
        }
        Commands::Derive {
            chain,
            count,
            show_private,
        } => {
            let session = open_session(&config)?;
            let records = session.derive_keys(chain, count)?;
            let out: Vec<_> = records
                .iter()
                .map(|r| record_json(r, show_private))
                .collect();
            println!("{}", serde_json::Value::Array(out));
        }
        Commands::SignMessage {
            chain,
            index,
            message,
        } => {
            let session = open_session(&config)?;
            let account = session.account(chain, index)?;
            let signature = account.sign_message(message.as_bytes())?;
            println!(
                "{}",
                json!({
                    "address": account.address(),
                    "signature": format!("0x{}", hex::encode(signature)),
                })
            );
        }
    }

    Ok(())
}

fn open_session(config: &WalletConfig) -> WalletResult<WalletSession> {
    WalletSession::from_config(config, &EnvSeedProvider::new(), ChainClients::new())
}

fn record_json(record: &KeyRecord, show_private: bool) -> serde_json::Value {
    let mut value = json!({
        "chain": record.chain,
        "index": record.derivation_index,
        "path": record.derivation_path,
        "address": record.address,
        "public_key": hex::encode(&record.public_key),
    });
    if show_private {
        value["private_key"] = json!(hex::encode(&*record.private_key));
    }
    value
}
