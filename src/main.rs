// Entry point for the ledger CLI. Every command loads the ledger snapshot,
// acts on it and writes it back when something changed.
use architect_ledger::config::DEFAULT_CONFIG_FILE;
use architect_ledger::{
    validate_address, Command, Ledger, LedgerConfig, Opt, Transaction, Wallets,
};
use clap::Parser;
use log::{error, info, LevelFilter};
use std::fs;
use std::process;

fn main() {
    // Info by default, RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    let config_path = opt
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());
    let config = match LedgerConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(opt.command, &config) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn open_ledger(config: &LedgerConfig) -> Result<Ledger, Box<dyn std::error::Error>> {
    if !config.state_file.exists() {
        return Err(format!(
            "No ledger at {}. Run `init` first.",
            config.state_file.display()
        )
        .into());
    }
    Ok(Ledger::load_snapshot(config, &config.state_file)?)
}

fn require_address(address: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !validate_address(address) {
        return Err(format!("Invalid address: {address}").into());
    }
    Ok(())
}

fn run_command(command: Command, config: &LedgerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rules = config.rules()?;
    match command {
        Command::Createwallet => {
            let mut wallets = Wallets::open(&config.wallet_file)?;
            let address = wallets.create_wallet()?;
            println!("Your new address: {address}")
        }
        Command::ListAddresses => {
            let wallets = Wallets::open(&config.wallet_file)?;
            for address in wallets.get_addresses() {
                println!("{address}")
            }
        }
        Command::Init { address, amount } => {
            require_address(&address)?;
            if config.state_file.exists() {
                return Err(format!(
                    "A ledger already exists at {}",
                    config.state_file.display()
                )
                .into());
            }
            let units = match amount {
                Some(amount) => rules.parse_amount(&amount)?,
                None => config.genesis_units()?,
            };
            let ledger = Ledger::new(config, &address, units)?;
            ledger.save_snapshot(&config.state_file)?;
            println!(
                "Created ledger with genesis block {} paying {} to {address}",
                ledger.tip_hash()?,
                rules.format(units)
            );
        }
        Command::Send {
            from,
            to,
            amount,
            mine,
        } => {
            require_address(&from)?;
            require_address(&to)?;
            let wallets = Wallets::open(&config.wallet_file)?;
            let wallet = wallets.require_wallet(&from)?;
            let ledger = open_ledger(config)?;

            let units = rules.parse_amount(&amount)?;
            let transaction = Transaction::build_now(wallet, &to, units)?;
            let receipt = ledger.submit_transaction(transaction)?;
            println!("Accepted transaction {}", receipt.transaction_id);

            if mine {
                let block = ledger.mine()?;
                println!("Mined block {}", block.get_hash());
            }
            ledger.save_snapshot(&config.state_file)?;
        }
        Command::Mine => {
            let ledger = open_ledger(config)?;
            let block = ledger.mine()?;
            ledger.save_snapshot(&config.state_file)?;
            println!(
                "Mined block {} with {} transactions",
                block.get_hash(),
                block.get_transactions().len()
            );
        }
        Command::GetBalance { address } => {
            require_address(&address)?;
            let ledger = open_ledger(config)?;
            let balance = ledger.balance(&address)?;
            println!("Balance of {address}: {}", rules.format(balance));
        }
        Command::Pending => {
            let ledger = open_ledger(config)?;
            for tx in ledger.pending_transactions()? {
                println!(
                    "{} {} -> {} {}",
                    tx.get_id(),
                    tx.get_sender_address(),
                    tx.get_recipient_address(),
                    rules.format(tx.get_amount())
                );
            }
        }
        Command::Printchain => {
            let ledger = open_ledger(config)?;
            for (height, block) in ledger.blocks()?.iter().enumerate().rev() {
                println!("Block {height}: {}", block.get_hash());
                println!("  previous: {}", block.get_previous_hash());
                println!("  merkle root: {}", block.get_merkle_root());
                println!(
                    "  nonce: {} difficulty: {} timestamp: {}",
                    block.get_nonce(),
                    block.get_difficulty(),
                    block.get_timestamp()
                );
                for tx in block.get_transactions() {
                    println!("  - Transaction {}", tx.get_id());
                    for input in tx.get_inputs() {
                        println!(
                            "    in:  {} {} ({})",
                            input.get_owner_address(),
                            rules.format(input.get_amount()),
                            input.get_id()
                        );
                    }
                    for output in tx.get_outputs() {
                        println!(
                            "    out: {} {}",
                            output.get_owner_address(),
                            rules.format(output.get_amount())
                        );
                    }
                }
            }
        }
        Command::Validate => {
            let ledger = open_ledger(config)?;
            ledger.validate_chain()?;
            println!("Chain of {} blocks is valid", ledger.chain_len()?);
        }
        Command::Export { path } => {
            let ledger = open_ledger(config)?;
            fs::write(&path, ledger.export_chain_json()?)?;
            info!("Exported chain to {}", path.display());
        }
    }
    Ok(())
}
