use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "architect-ledger", about = "Single-process proof-of-work ledger")]
pub struct Opt {
    #[arg(
        long = "config",
        global = true,
        help = "Configuration file (defaults to ledger.toml when present)"
    )]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(name = "listaddresses", about = "Print local wallet addresses")]
    ListAddresses,
    #[command(name = "init", about = "Create a new ledger with a genesis block")]
    Init {
        #[arg(help = "The address that receives the genesis supply")]
        address: String,
        #[arg(help = "Genesis supply (defaults to genesis_amount from the configuration)")]
        amount: Option<String>,
    },
    #[command(name = "send", about = "Send a signed transfer between addresses")]
    Send {
        #[arg(help = "Source wallet address")]
        from: String,
        #[arg(help = "Destination wallet address")]
        to: String,
        #[arg(help = "Amount to send, e.g. 12.5")]
        amount: String,
        #[arg(long = "mine", help = "Mine the pending block right after sending")]
        mine: bool,
    },
    #[command(name = "mine", about = "Seal the pending transactions into a block")]
    Mine,
    #[command(
        name = "getbalance",
        about = "Get the wallet balance of the target address"
    )]
    GetBalance {
        #[arg(help = "The wallet address")]
        address: String,
    },
    #[command(name = "pending", about = "Print transactions waiting to be mined")]
    Pending,
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain,
    #[command(name = "validate", about = "Check the integrity of the whole chain")]
    Validate,
    #[command(name = "export", about = "Write the chain as JSON")]
    Export {
        #[arg(help = "Output file")]
        path: PathBuf,
    },
}
