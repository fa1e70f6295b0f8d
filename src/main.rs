// Entry point for the floodchain binary
// Two things it can do: run an overlay node, or mine a small chain locally
use clap::Parser;
use floodchain::{
    Block, Command, Ledger, Miner, OverlayNode, Opt, Server, Signer, TcpTransport, Transaction,
    TransactionPool, Wallet, GLOBAL_CONFIG,
};
use log::{error, info, warn, LevelFilter};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// How often a running node pings its peers and empties its inboxes
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(30);

// Amounts used by the local mining demo
const GENESIS_ALLOCATION: f64 = 100.0;
const TRANSFER_AMOUNT: f64 = 10.0;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::StartNode { bootstrap, listen } => {
            let listen_addr = match listen {
                Some(addr) => addr,
                None => GLOBAL_CONFIG.get_node_addr()?,
            };
            let bootstrap = match bootstrap {
                Some(addr) => Some(addr),
                None => GLOBAL_CONFIG.get_bootstrap_addr()?,
            };
            start_node(&listen_addr, bootstrap.as_deref())?;
        }
        Command::Mine { difficulty, blocks } => {
            let difficulty = match difficulty {
                Some(difficulty) => difficulty,
                None => GLOBAL_CONFIG.get_mining_difficulty()?,
            };
            mine_local_chain(difficulty, blocks)?;
        }
    }
    Ok(())
}

// Serves forever; the bootstrap node is simply a node started without one
fn start_node(listen_addr: &str, bootstrap: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let transport = Arc::new(TcpTransport::new(GLOBAL_CONFIG.get_connect_timeout()?));
    let node = Arc::new(
        OverlayNode::new(listen_addr, transport)
            .with_capacity(GLOBAL_CONFIG.get_cpu_power()?, GLOBAL_CONFIG.get_net_power()?)
            .with_hop_limit(GLOBAL_CONFIG.get_hop_limit()?),
    );

    let server = Server::bind(listen_addr, Arc::clone(&node))?;
    let server_thread = server.spawn();

    if let Some(addr) = bootstrap {
        node.join(addr)?;
    }
    info!("Node {} running at {}", node.id()?, node.identity()?.addr);

    loop {
        if server_thread.is_finished() {
            return Err("Server thread stopped".into());
        }
        thread::sleep(HOUSEKEEPING_INTERVAL);

        for peer in node.peers().snapshot()? {
            if let Err(e) = node.ping(&peer.id) {
                warn!("Ping to {} at {} failed: {e}", peer.id, peer.addr);
            }
        }
        for sender in node.messages().senders() {
            for packet in node.drain_messages(&sender) {
                info!(
                    "{} from {sender}: {}",
                    packet.kind,
                    String::from_utf8_lossy(&packet.data)
                );
            }
        }
    }
}

// Genesis pays alice, then every block carries one alice -> bob transfer
fn mine_local_chain(difficulty: u32, blocks: usize) -> Result<(), Box<dyn std::error::Error>> {
    let issuer = Wallet::new()?;
    let alice = Wallet::new()?;
    let bob = Wallet::new()?;
    let mut miner = Miner::new();

    let mut allocation = Transaction::new(
        issuer.public_key().clone(),
        alice.public_key().clone(),
        GENESIS_ALLOCATION,
        b"genesis",
    )?;
    allocation.sign_with(&issuer)?;
    let mut genesis = Block::new_genesis(vec![allocation], difficulty)?;
    miner.mine_block(&mut genesis)?;
    let mut ledger = Ledger::new(genesis)?;
    println!("Genesis: {}", ledger.get_blocks()[0].get_hash_hex());

    let pool = TransactionPool::new();
    for i in 1..=blocks {
        let mut transfer = Transaction::new(
            alice.public_key().clone(),
            bob.public_key().clone(),
            TRANSFER_AMOUNT,
            format!("transfer {i}").as_bytes(),
        )?;
        transfer.sign_with(&alice)?;
        if let Err(e) = pool.admit(transfer, &ledger) {
            warn!("Transfer {i} not admitted: {e}");
        }

        let block = ledger.mine_block(pool.take_all(), difficulty, &mut miner)?;
        println!(
            "Block {}: {} ({} transactions)",
            block.get_index(),
            block.get_hash_hex(),
            block.get_transactions().len()
        );
    }

    println!(
        "Balances: alice {}, bob {}",
        ledger.account_balance(alice.public_key(), None, &[]),
        ledger.account_balance(bob.public_key(), None, &[])
    );
    if !ledger.chain_is_valid() {
        return Err("Mined chain failed validation".into());
    }
    println!("Chain of {} blocks is valid", ledger.len());
    Ok(())
}
