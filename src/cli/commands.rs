use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "floodchain")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start an overlay node")]
    StartNode {
        #[arg(long, help = "Address of a node to join through (overrides BOOTSTRAP_ADDRESS)")]
        bootstrap: Option<String>,
        #[arg(long, help = "Address to listen on (overrides NODE_ADDRESS)")]
        listen: Option<String>,
    },
    #[command(name = "mine", about = "Mine a local chain and validate it")]
    Mine {
        #[arg(long, help = "Leading zero bytes each block hash must have")]
        difficulty: Option<u32>,
        #[arg(long, default_value_t = 3, help = "Blocks to mine after genesis")]
        blocks: usize,
    },
}
