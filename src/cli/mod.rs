//! Command-line interface
//!
//! Argument parsing and the mapping from commands onto the ledger facade.

pub mod commands;

pub use commands::{Command, Opt};

use crate::config::ChainConfig;
use crate::core::Transaction;
use crate::error::Result;
use crate::ledger::{Ledger, MiningOutcome};
use crate::storage::SledStore;
use crate::wallet::{KeyDirectory, WalletStore};
use data_encoding::HEXLOWER;
use std::sync::Arc;

const DB_DIR: &str = "chain";
const WALLETS_FILE: &str = "wallets.json";

/// Execute a parsed command against the data directory.
pub fn run_command(opt: Opt) -> Result<()> {
    std::fs::create_dir_all(&opt.data_dir)?;
    let wallets_path = opt.data_dir.join(WALLETS_FILE);

    // Wallet-only commands skip opening the chain database.
    match &opt.command {
        Command::Createwallet => {
            let mut wallets = WalletStore::load(&wallets_path)?;
            let address = wallets.create_wallet()?;
            println!("Your new address: {address}");
            return Ok(());
        }
        Command::ListAddresses => {
            let wallets = WalletStore::load(&wallets_path)?;
            for address in wallets.addresses() {
                println!("{address}");
            }
            return Ok(());
        }
        _ => {}
    }

    let config = match &opt.config {
        Some(path) => ChainConfig::load(path)?,
        None => ChainConfig::default(),
    };

    let wallets = WalletStore::load(&wallets_path)?;
    let directory = Arc::new(KeyDirectory::new());
    wallets.register_all(&directory);

    let store = SledStore::open(&opt.data_dir.join(DB_DIR))?;
    let ledger = Ledger::open(config, Box::new(store), directory)?;

    match opt.command {
        Command::Createwallet | Command::ListAddresses => unreachable!("handled above"),
        Command::Createchain => {
            let status = ledger.get_chain_status()?;
            println!(
                "Chain {} ready at height {} (tip {})",
                status.chain_id, status.height, status.latest_hash
            );
        }
        Command::GetBalance { address } => {
            let balance = ledger.balance_of(&address)?;
            let spendable = ledger.spendable_balance(&address)?;
            println!("Balance of {address}: {balance} (spendable: {spendable})");
        }
        Command::Send {
            from,
            to,
            amount,
            fee,
            memo,
        } => {
            let wallet = wallets.get(&from).ok_or_else(|| {
                crate::error::LedgerError::Validation(format!(
                    "No local wallet for address {from}"
                ))
            })?;
            let tx = Transaction::new_signed(wallet, &to, amount, fee, memo)?;
            let tx_hash = tx.hash_hex();
            ledger.submit_transaction(tx)?;
            println!("Accepted transaction {tx_hash}");
        }
        Command::Mine { address } => {
            let miner = match address.or_else(|| ledger.select_block_producer()) {
                Some(miner) => miner,
                None => {
                    return Err(crate::error::LedgerError::Validation(
                        "No miner address given and no stake-weighted producer available"
                            .to_string(),
                    ))
                }
            };
            match ledger.mine_next_block(&miner)? {
                MiningOutcome::Success {
                    block,
                    attempts,
                    duration_ms,
                    reward,
                } => println!(
                    "Mined block {} ({}) in {duration_ms} ms, {attempts} attempts; reward {reward} to {miner}",
                    block.get_index(),
                    block.get_hash()
                ),
                MiningOutcome::Cancelled => println!("Mining was cancelled"),
                MiningOutcome::Exhausted { attempts } => {
                    println!("Mining gave up after {attempts} attempts")
                }
            }
        }
        Command::Status => {
            let status = ledger.get_chain_status()?;
            let json = serde_json::to_string_pretty(&status)
                .map_err(|e| crate::error::LedgerError::Serialization(e.to_string()))?;
            println!("{json}");
        }
        Command::Printchain => {
            for block in ledger.get_blocks()? {
                println!("Block {} ({})", block.get_index(), block.get_hash());
                println!("  previous: {}", block.get_previous_hash());
                println!("  timestamp: {}", block.get_timestamp());
                println!("  difficulty: {}", block.get_difficulty());
                println!("  merkle root: {}", HEXLOWER.encode(block.get_merkle_root()));
                println!("  miner: {}", block.get_miner_address());
                for tx in block.get_transactions() {
                    println!(
                        "  - {} {} -> {} amount {} fee {} ({} confirmations)",
                        tx.hash_hex(),
                        tx.get_sender(),
                        tx.get_recipient(),
                        tx.get_amount(),
                        tx.get_fee(),
                        tx.get_confirmation_count()
                    );
                }
                println!();
            }
        }
        Command::Validate => {
            ledger.validate_full_chain()?;
            println!("Chain is valid");
        }
        Command::Stake {
            address,
            amount,
            lock_ms,
        } => {
            let stake = ledger.stake(&address, amount, lock_ms)?;
            println!("Created stake {} for {address}", stake.get_id());
        }
        Command::Unstake { stake_id } => {
            let stake = ledger.unstake(&stake_id)?;
            println!(
                "Withdrew stake {}: {} principal, {} rewards",
                stake.get_id(),
                stake.get_staked_amount(),
                stake.get_rewards_earned()
            );
        }
        Command::Accrue => {
            let total = ledger.accrue_staking_rewards()?;
            println!("Accrued {total} base units of staking rewards");
        }
    }
    Ok(())
}
