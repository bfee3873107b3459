//! Command line view of the casino, dividend and governance ledger.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ethers::utils::format_ether;
use honest_client::{evm::EvmLedger, Config, Error, Feed, Ledger, LedgerEvent, Mirror, Scope};
use honest_types::voting::ProposalState;
use std::{path::PathBuf, time::UNIX_EPOCH};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Mirror of the casino, dividend and governance ledger")]
struct Args {
    /// Path to the YAML config file
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow blocks, the prize fund, the multiplier, wagers and wins.
    Watch {
        /// Only follow wagers and wins of the configured identity.
        #[arg(long)]
        mine: bool,
    },
    /// Print casino, payout and governance state once.
    Status,
    /// List every proposal with its state and tally.
    Proposals,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Could not read config file {}", args.config.display()))?;
    let config = Config::from_yaml(&contents)
        .context("Could not parse config file")?
        .validate()
        .context("Invalid config")?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();
    info!(?config, "loaded config");

    let ledger = EvmLedger::connect(&config)
        .await
        .context("Failed to connect to ledger")?;
    let mirror = Mirror::new(ledger, config.settings);

    match args.command {
        Command::Watch { mine } => watch(&mirror, mine).await,
        Command::Status => status(&mirror).await,
        Command::Proposals => proposals(&mirror).await,
    }
}

async fn watch(mirror: &Mirror<EvmLedger>, mine: bool) -> Result<()> {
    let scope = if mine { Scope::Mine } else { Scope::All };
    let mut blocks = mirror.subscribe(Feed::Blocks);
    let mut funds = mirror.subscribe(Feed::PrizeFund);
    let mut multipliers = mirror.subscribe(Feed::Multiplier);
    let mut wagers = mirror.subscribe(Feed::Wagers(scope));
    let mut wins = mirror.subscribe(Feed::Wins(scope));
    let casino = mirror.casino();
    let (mut fund, mut multiplier) =
        futures::try_join!(casino.prize_fund(), casino.prize_multiplier())?;
    info!(?scope, "watching ledger; press ctrl-c to stop");

    loop {
        let event = tokio::select! {
            event = blocks.next() => event,
            event = funds.next() => event,
            event = multipliers.next() => event,
            event = wagers.next() => event,
            event = wins.next() => event,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                return Ok(());
            }
        };
        let Some(event) = event else {
            warn!("feed closed");
            return Ok(());
        };
        match event {
            LedgerEvent::NewBlock(block) => info!(number = block.number, "block"),
            LedgerEvent::PrizeFund(value) => {
                fund = value;
                let bounds = casino.bounds_for(fund, multiplier);
                info!(
                    fund = %format_ether(fund),
                    max_stake = %format_ether(bounds.max_stake),
                    "prize fund"
                );
            }
            LedgerEvent::Multiplier(value) => {
                multiplier = value;
                let bounds = casino.bounds_for(fund, multiplier);
                info!(
                    multiplier,
                    max_stake = %format_ether(bounds.max_stake),
                    "prize multiplier"
                );
            }
            LedgerEvent::WagerPlaced(wager) => {
                let outcome = wager.outcome();
                info!(
                    player = ?wager.player,
                    stake = %format_ether(wager.stake),
                    number = wager.number,
                    resolved = outcome.resolved,
                    won = outcome.won,
                    "wager"
                );
            }
            LedgerEvent::PrizeClaimed(win) => {
                info!(
                    player = ?win.player,
                    prize = %format_ether(win.prize),
                    nonce = win.nonce,
                    "prize claimed"
                );
            }
            other => info!(?other, "event"),
        }
    }
}

async fn status(mirror: &Mirror<EvmLedger>) -> Result<()> {
    let casino = mirror.casino();
    let bounds = casino.bet_bounds().await?;
    println!("block:            {}", casino.block_number().await?);
    println!("prize fund:       {} ETH", format_ether(bounds.prize_fund));
    println!("multiplier:       {}", bounds.multiplier);
    println!("max stake:        {} ETH", format_ether(bounds.max_stake));
    println!("guesses today:    {}", casino.guesses_today().await?);
    for win in casino.recent_winners().await? {
        println!(
            "recent winner:    {:?} won {} ETH",
            win.player,
            format_ether(win.prize)
        );
    }

    let governance = mirror.governance();
    println!("leader:           {:?}", governance.leader().await?);
    println!(
        "total supply:     {}",
        format_ether(governance.total_supply().await?)
    );

    let accountant = mirror.accountant();
    match accountant.current_period().await {
        Ok(period) => {
            println!("period started:   {}", display_time(period.started_at));
            println!(
                "period payout:    {} ETH",
                format_ether(period.payout_snapshot)
            );
            println!("next action:      {:?}", accountant.next_action().await?);
        }
        Err(Error::NoPayoutPeriod) => println!("period:           none yet"),
        Err(err) => return Err(err.into()),
    }

    if mirror.connection().current().identity().is_some() {
        let (share, weight) = futures::try_join!(accountant.my_share(), governance.my_weight())?;
        println!("my share:         {} ETH", format_ether(share));
        println!("my weight:        {}", format_ether(weight));
        if let Some(wager) = casino.unclaimed_prize().await? {
            let current = casino.block_number().await?;
            println!(
                "unclaimed prize:  wager {} at block {}, {} blocks left",
                wager.nonce,
                wager.block_number,
                wager.blocks_left(current)
            );
        }
    }
    Ok(())
}

async fn proposals(mirror: &Mirror<EvmLedger>) -> Result<()> {
    let governance = mirror.governance();
    let now = mirror.connection().current().block(None).await?.timestamp;
    for proposal in governance.proposals().await? {
        let state = proposal.state(now);
        let verdict = match state {
            ProposalState::Open => "open".to_string(),
            ProposalState::ClosedPendingExecution => {
                format!("{:?}, awaiting execution", proposal.decide())
            }
            ProposalState::Executed => "executed".to_string(),
        };
        println!(
            "#{} {} ({}) accept {} / reject {} ends {}: {}",
            proposal.id,
            proposal.kind(),
            verdict,
            format_ether(proposal.accepted),
            format_ether(proposal.rejected),
            display_time(proposal.deadline()),
            proposal.description
        );
    }
    Ok(())
}

fn display_time(timestamp: u64) -> String {
    let elapsed = UNIX_EPOCH
        .elapsed()
        .map(|now| now.as_secs())
        .unwrap_or_default();
    if timestamp > elapsed {
        format!("{timestamp} (in {}s)", timestamp - elapsed)
    } else {
        format!("{timestamp} ({}s ago)", elapsed - timestamp)
    }
}
