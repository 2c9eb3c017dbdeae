use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pyrite_core::block::Block;
use pyrite_core::ledger::Chain;
use pyrite_core::miner;
use pyrite_core::pow::ProofOfWork;
use pyrite_core::ChainError;
use pyrite_db::RedbStore;

/// Command-line client for a pyrite ledger stored on local disk.
#[derive(Parser)]
#[command(name = "pyrite", version, about = "A minimal proof-of-work ledger")]
struct Cli {
    /// Path of the chain database.
    #[arg(long, default_value = "pyrite.redb")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new chain; the genesis coinbase reward goes to ADDRESS.
    Createblockchain {
        #[arg(long)]
        address: String,
    },
    /// Mine an empty block on top of the current tip.
    Addblock,
    /// Print every block from the tip down to genesis.
    Printchain {
        /// Render each block as JSON instead of the text form.
        #[arg(long)]
        json: bool,
    },
    /// Transfer value; --from, --to and --amount are parallel lists.
    Send {
        /// Source address (repeatable).
        #[arg(long = "from", required = true)]
        from: Vec<String>,
        /// Destination address (repeatable).
        #[arg(long = "to", required = true)]
        to: Vec<String>,
        /// Amount to transfer (repeatable).
        #[arg(long = "amount", required = true)]
        amount: Vec<u64>,
    },
    /// Sum the unspent outputs owned by ADDRESS.
    Getbalance {
        #[arg(long)]
        address: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ChainError> {
    match cli.command {
        Commands::Createblockchain { address } => {
            if address.is_empty() {
                return Err(ChainError::InvalidArguments(
                    "address must not be empty".into(),
                ));
            }
            let store = RedbStore::open(&cli.db)?;
            let chain = Chain::create_genesis(store, &address, ProofOfWork::default())?;
            println!(
                "chain created, genesis {} rewards [{}]",
                hex::encode(chain.tip_hash()),
                address
            );
        }
        Commands::Addblock => {
            let mut chain = open_chain(&cli.db)?;
            let block = miner::mine(&mut chain, Vec::new())?;
            println!(
                "block {} appended at height {}",
                hex::encode(block.hash),
                block.height
            );
        }
        Commands::Printchain { json } => {
            let chain = open_chain(&cli.db)?;
            for block in chain.iter() {
                print_block(&block?, json);
            }
        }
        Commands::Send { from, to, amount } => {
            let mut chain = open_chain(&cli.db)?;
            let block = miner::transfer_batch(&mut chain, &from, &to, &amount)?;
            println!(
                "block {} appended with {} transfer(s)",
                hex::encode(block.hash),
                block.transactions.len()
            );
        }
        Commands::Getbalance { address } => {
            if address.is_empty() {
                return Err(ChainError::InvalidArguments(
                    "address must not be empty".into(),
                ));
            }
            let chain = open_chain(&cli.db)?;
            let balance = chain.balance(&address)?;
            println!("balance of [{address}]: {balance}");
        }
    }
    Ok(())
}

fn open_chain(path: &Path) -> Result<Chain<RedbStore>, ChainError> {
    let store = RedbStore::open(path)?;
    Chain::open(store, ProofOfWork::default())
}

fn print_block(block: &Block, json: bool) {
    if json {
        let rendered =
            serde_json::to_string_pretty(block).expect("a block always renders as JSON");
        println!("{rendered}");
        return;
    }

    println!("---------------------------------");
    println!("hash:      {}", hex::encode(block.hash));
    println!("prev_hash: {}", hex::encode(block.prev_hash));
    println!("height:    {}", block.height);
    println!("timestamp: {}", block.timestamp);
    println!("nonce:     {}", block.nonce);
    for tx in &block.transactions {
        println!("  tx {}", hex::encode(tx.id));
        for input in &tx.inputs {
            println!(
                "    in  {}:{} sig [{}]",
                hex::encode(input.tx_id),
                input.vout,
                input.signature
            );
        }
        for output in &tx.outputs {
            println!("    out {} -> [{}]", output.amount, output.owner);
        }
    }
}
