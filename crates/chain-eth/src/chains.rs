use serde::Serialize;

/// Definition of an EVM-compatible network the wallet can sign for.
#[derive(Debug, Clone, Serialize)]
pub struct EvmNetwork {
    pub chain_id: u64,
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
    /// Default JSON-RPC endpoint, used only by callers wiring a chain client.
    pub rpc_url: &'static str,
    pub is_testnet: bool,
}

/// Ethereum Mainnet (chain ID 1).
pub const ETHEREUM: EvmNetwork = EvmNetwork {
    chain_id: 1,
    name: "Ethereum",
    symbol: "ETH",
    decimals: 18,
    rpc_url: "https://eth.llamarpc.com",
    is_testnet: false,
};

/// Sepolia testnet (chain ID 11155111).
pub const SEPOLIA: EvmNetwork = EvmNetwork {
    chain_id: 11_155_111,
    name: "Sepolia",
    symbol: "ETH",
    decimals: 18,
    rpc_url: "https://rpc.sepolia.org",
    is_testnet: true,
};

/// Local proof-of-authority development node (geth `--dev`, chain ID 1337).
pub const DEVNET: EvmNetwork = EvmNetwork {
    chain_id: 1337,
    name: "Local devnet",
    symbol: "ETH",
    decimals: 18,
    rpc_url: "http://127.0.0.1:8545",
    is_testnet: true,
};

/// All known networks.
pub const ALL_NETWORKS: &[EvmNetwork] = &[ETHEREUM, SEPOLIA, DEVNET];

/// Looks up a known network by chain ID.
pub fn network_by_chain_id(chain_id: u64) -> Option<&'static EvmNetwork> {
    ALL_NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// Wei per whole ether.
pub const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

/// Gas used by a plain value transfer with empty calldata.
pub const TRANSFER_GAS: u64 = 21_000;
