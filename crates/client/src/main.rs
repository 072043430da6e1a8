//! CLI for sealed-bid auctions.
//!
//! This binary provides commands for:
//! - Managing a signing keypair
//! - Creating, closing and cancelling auctions
//! - Placing sealed bids
//! - Processing bids, finalizing and settling
//! - Inspecting auctions, bids and the legal next actions

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use sealbid_client::{auction_nonce, load_keypair, save_keypair, RpcChain};
use sealbid_coordinator::{
    AuctionCoordinator, AuctionSnapshot, CoordinatorConfig, Keypair, Ledger, NewAuction, Step,
};
use sealbid_types::wire::address_from_hex;
use sealbid_types::{Address, AuctionState, NULL_ADDRESS};

#[derive(Parser)]
#[command(name = "sealbid")]
#[command(about = "CLI for sealed-bid auctions")]
struct Cli {
    /// Mock chain RPC endpoint
    #[arg(long, env = "SEALBID_RPC", default_value = "http://127.0.0.1:9944")]
    rpc: String,

    /// Keypair file used to sign
    #[arg(long, env = "SEALBID_KEYPAIR", default_value = "sealbid-keypair.json")]
    keypair: PathBuf,

    /// Coordinator configuration (JSON)
    #[arg(long, env = "SEALBID_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new keypair
    Keygen {
        /// Replace an existing keypair file
        #[arg(long)]
        force: bool,
    },

    /// Credit an account on the mock chain
    Airdrop {
        amount: u64,

        /// Recipient address (hex); defaults to the keypair
        #[arg(long)]
        to: Option<String>,
    },

    /// Set or advance the mock chain clock
    SetTime {
        /// Absolute unix timestamp
        #[arg(long, conflicts_with = "advance")]
        at: Option<i64>,

        /// Seconds to move forward
        #[arg(long)]
        advance: Option<i64>,
    },

    /// Create a new auction
    Create {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Reserve price, minor units
        #[arg(long)]
        reserve: u64,

        /// Bidding period in seconds
        #[arg(long, default_value = "3600")]
        duration: i64,

        /// Auction nonce; defaults to wall-clock nanoseconds
        #[arg(long)]
        id: Option<u64>,

        /// Item reference address (hex)
        #[arg(long)]
        item_ref: Option<String>,
    },

    /// Place or replace a sealed bid
    Bid {
        /// Auction address (hex)
        auction: String,

        /// Bid amount (will be encrypted)
        amount: u64,
    },

    /// Show an auction and the actions available to the keypair
    Show { auction: String },

    /// List auctions
    List {
        /// Only auctions created by this address (hex)
        #[arg(long)]
        seller: Option<String>,

        /// Only auctions in this state
        #[arg(long)]
        state: Option<String>,
    },

    /// List bids of an auction
    Bids { auction: String },

    /// Print the event log of an auction
    Events { auction: String },

    /// Close bidding after the end time
    Close { auction: String },

    /// Compare unprocessed bids against the leader
    Process {
        auction: String,

        /// Keep going until every bid is processed
        #[arg(long)]
        all: bool,
    },

    /// Grant the leader decrypt permission and record the winner
    Finalize { auction: String },

    /// Reveal the winning bid and pay the seller (winner only)
    Settle { auction: String },

    /// Withdraw an open auction (seller only)
    Cancel {
        auction: String,

        #[arg(long, default_value = "withdrawn by seller")]
        reason: String,
    },
}

fn parse_address(s: &str) -> Result<Address> {
    address_from_hex(s).map_err(|e| anyhow!("invalid address {}: {}", s, e))
}

fn print_auction(snapshot: &AuctionSnapshot) {
    let a = &snapshot.auction;
    println!("Auction {}:", hex::encode(snapshot.address));
    println!("  Title: {}", a.title);
    if !a.description.is_empty() {
        println!("  Description: {}", a.description);
    }
    println!("  State: {}", a.state);
    println!("  Seller: {}", hex::encode(a.seller));
    println!("  Reserve: {}", a.reserve_price);
    println!("  Bidding: {} .. {} (now {})", a.start_time, a.end_time, snapshot.now);
    println!("  Bids: {} ({} processed)", a.bid_count, a.bids_processed);
    if a.current_leader != NULL_ADDRESS {
        println!("  Leader: {}", hex::encode(a.current_leader));
    }
    if a.state == AuctionState::Settled {
        println!("  Winner: {}", hex::encode(a.winner));
        println!("  Winning amount: {}", a.winning_amount);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sealbid=info".parse()?)
                .add_directive("sealbid_coordinator=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Keygen { force } = &cli.command {
        let keypair = Keypair::generate();
        save_keypair(&cli.keypair, &keypair, *force)?;
        println!("Address: {}", hex::encode(keypair.address()));
        println!("Saved to {}", cli.keypair.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => CoordinatorConfig::load(path)?,
        None => CoordinatorConfig::default(),
    };
    let chain = RpcChain::connect(&cli.rpc)?;
    let coordinator = AuctionCoordinator::new(chain.clone(), chain.clone(), config);
    let keypair = || load_keypair(&cli.keypair);

    match cli.command {
        Commands::Keygen { .. } => {}

        Commands::Airdrop { amount, to } => {
            let address = match to {
                Some(to) => parse_address(&to)?,
                None => keypair()?.address(),
            };
            let balance = chain.airdrop(&address, amount).await?;
            println!("Balance of {}: {}", hex::encode(address), balance);
        }

        Commands::SetTime { at, advance } => {
            let now = match (at, advance) {
                (Some(at), _) => chain.set_time(at).await?,
                (None, Some(seconds)) => chain.advance_time(seconds).await?,
                (None, None) => chain.now().await?,
            };
            println!("Ledger time: {}", now);
        }

        Commands::Create {
            title,
            description,
            reserve,
            duration,
            id,
            item_ref,
        } => {
            let identity = keypair()?;
            let auction_id = id.unwrap_or_else(auction_nonce);
            let item_ref = item_ref.as_deref().map(parse_address).transpose()?;

            let snapshot = coordinator
                .create_auction(
                    &identity,
                    NewAuction {
                        auction_id,
                        title,
                        description,
                        reserve_price: reserve,
                        duration,
                        item_ref,
                    },
                )
                .await?;
            print_auction(&snapshot);
        }

        Commands::Bid { auction, amount } => {
            let identity = keypair()?;
            let auction = parse_address(&auction)?;
            let bid = coordinator.place_bid(&identity, &auction, amount).await?;
            println!("Bid placed: {}", hex::encode(bid));
            println!("  Amount: {} (encrypted)", amount);
        }

        Commands::Show { auction } => {
            let auction = parse_address(&auction)?;
            let caller = keypair().map(|k| k.address()).unwrap_or(NULL_ADDRESS);
            let (snapshot, actions) = coordinator.available_actions(&caller, &auction).await?;
            print_auction(&snapshot);

            if actions.is_empty() {
                println!("  Available actions: none");
            } else {
                let names: Vec<&str> = actions.iter().map(|a| a.as_str()).collect();
                println!("  Available actions: {}", names.join(", "));
            }
        }

        Commands::List { seller, state } => {
            let seller = seller.as_deref().map(parse_address).transpose()?;
            let state = state
                .as_deref()
                .map(|s| AuctionState::parse(s).ok_or_else(|| anyhow!("unknown state {}", s)))
                .transpose()?;

            let auctions = coordinator.list(seller, state).await?;
            if auctions.is_empty() {
                println!("No auctions found");
            } else {
                println!("Auctions:");
                for entry in auctions {
                    println!(
                        "  {} {} - {} ({} bids, ends {})",
                        hex::encode(entry.address),
                        entry.auction.title,
                        entry.auction.state,
                        entry.auction.bid_count,
                        entry.auction.end_time
                    );
                }
            }
        }

        Commands::Bids { auction } => {
            let auction = parse_address(&auction)?;
            let bids = coordinator.bids(&auction).await?;
            if bids.is_empty() {
                println!("No bids for auction {}", hex::encode(auction));
            } else {
                println!("Bids for auction {}:", hex::encode(auction));
                for entry in bids {
                    println!("  {} Bidder: {}", hex::encode(entry.address), hex::encode(entry.bid.bidder));
                    println!(
                        "      Placed: {}  Updated: {}  Processed: {}",
                        entry.bid.created_at, entry.bid.updated_at, entry.bid.processed
                    );
                }
            }
        }

        Commands::Events { auction } => {
            let auction = parse_address(&auction)?;
            for event in coordinator.events(&auction).await? {
                println!("{}", serde_json::to_string(&event)?);
            }
        }

        Commands::Close { auction } => {
            let identity = keypair()?;
            let snapshot = coordinator.close_bidding(&identity, &parse_address(&auction)?).await?;
            print_auction(&snapshot);
        }

        Commands::Process { auction, all } => {
            let identity = keypair()?;
            let auction = parse_address(&auction)?;

            if all {
                let report = coordinator.process_all(&identity, &auction).await;
                println!(
                    "Processed {} bids, skipped {} ({}/{} done)",
                    report.processed, report.skipped, report.bids_processed, report.bid_count
                );
                if let Some(err) = report.error {
                    return Err(err.into());
                }
            } else {
                match coordinator.process_next(&identity, &auction).await? {
                    Step::Processed {
                        bid,
                        bids_processed,
                        bid_count,
                        ..
                    } => println!("Processed bid {} ({}/{})", hex::encode(bid), bids_processed, bid_count),
                    Step::Skipped { bid } => println!("Bid {} was already processed", hex::encode(bid)),
                    Step::Exhausted {
                        bids_processed,
                        bid_count,
                    } => println!("All bids processed ({}/{})", bids_processed, bid_count),
                }
            }
        }

        Commands::Finalize { auction } => {
            let identity = keypair()?;
            let snapshot = coordinator.finalize(&identity, &parse_address(&auction)?).await?;
            print_auction(&snapshot);
        }

        Commands::Settle { auction } => {
            let identity = keypair()?;
            let settlement = coordinator.settle(&identity, &parse_address(&auction)?).await?;
            info!(revealed = %settlement.revealed, "Settlement accepted");
            print_auction(&settlement.snapshot);
        }

        Commands::Cancel { auction, reason } => {
            let identity = keypair()?;
            let snapshot = coordinator
                .cancel_auction(&identity, &parse_address(&auction)?, &reason)
                .await?;
            print_auction(&snapshot);
        }
    }

    Ok(())
}
