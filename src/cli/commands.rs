use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hybrid-chain", about = "Account-model ledger with hybrid PoW/PoS consensus")]
pub struct Opt {
    /// Directory holding the chain database and wallet file
    #[arg(long = "data-dir", default_value = "data")]
    pub data_dir: PathBuf,

    /// Optional TOML configuration file for chain parameters
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createchain", about = "Create a new chain with a mined genesis block")]
    Createchain,
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(name = "listaddresses", about = "Print local wallet addresses")]
    ListAddresses,
    #[command(name = "getbalance", about = "Get the confirmed balance of an address")]
    GetBalance {
        #[arg(help = "The wallet address")]
        address: String,
    },
    #[command(name = "send", about = "Submit a signed transfer to the pending pool")]
    Send {
        #[arg(help = "Source wallet address (must exist in the local wallet file)")]
        from: String,
        #[arg(help = "Destination address")]
        to: String,
        #[arg(help = "Amount to send, in base units")]
        amount: u64,
        #[arg(long = "fee", default_value_t = 0, help = "Fee offered, in base units")]
        fee: u64,
        #[arg(long = "memo", help = "Optional memo attached to the transfer")]
        memo: Option<String>,
    },
    #[command(name = "mine", about = "Mine the next block from the pending pool")]
    Mine {
        #[arg(
            long = "address",
            help = "Address credited with the block reward; defaults to the stake-weighted producer"
        )]
        address: Option<String>,
    },
    #[command(name = "status", about = "Print the chain status as JSON")]
    Status,
    #[command(name = "printchain", about = "Print every block from genesis to tip")]
    Printchain,
    #[command(name = "validate", about = "Re-validate the entire chain from genesis")]
    Validate,
    #[command(name = "stake", about = "Lock funds as a staking position")]
    Stake {
        #[arg(help = "Address whose funds are staked")]
        address: String,
        #[arg(help = "Amount to stake, in base units")]
        amount: u64,
        #[arg(long = "lock-ms", help = "Optional lock-up duration in milliseconds")]
        lock_ms: Option<i64>,
    },
    #[command(name = "unstake", about = "Withdraw a staking position")]
    Unstake {
        #[arg(help = "Identifier returned when the stake was created")]
        stake_id: String,
    },
    #[command(name = "accrue", about = "Accrue staking rewards up to now")]
    Accrue,
}
