use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use lending_client::config::{Config, MarketConfig};
use lending_client::engine::poller::{fetch_snapshot, run_snapshot_poller, SnapshotTargets};
use lending_client::engine::snapshot::{MarketSnapshot, ReserveSnapshot};
use lending_client::lending::accounts::{derive_obligation_address, get_associated_token_address};
use lending_client::lending::flows::{self, ExistingAccounts, Flow, MarketAccounts, ReserveAccounts, UserAccounts};
use lending_client::lending::instructions::{obligation_rent_exempt_lamports, LendingInstruction};
use lending_client::math::to_native_amount;
use lending_client::registry::ProgramIds;
use lending_client::rpc_client::RpcClient;

#[derive(Parser, Debug)]
#[command(name = "lending-client")]
#[command(about = "Inspect an SPL token-lending market and build lend/borrow transactions")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every configured reserve with its rates
    Reserves,
    /// Print an owner's deposits and borrows
    Balances {
        /// Obligation owner (defaults to OWNER_PUBKEY)
        #[arg(long)]
        owner: Option<String>,
    },
    /// Build a user flow and print its instructions
    Encode {
        #[arg(value_enum)]
        operation: Operation,
        /// Asset label from the market config, e.g. SOL
        #[arg(long)]
        asset: String,
        /// Amount in human units (collateral tokens for withdraw)
        #[arg(long)]
        amount: f64,
        /// Obligation owner (defaults to OWNER_PUBKEY)
        #[arg(long)]
        owner: Option<String>,
    },
    /// Describe base64-encoded lending instruction data
    Describe {
        data: String,
    },
    /// Keep refreshing the market snapshot until Ctrl-C
    Watch {
        #[arg(long)]
        owner: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Operation {
    Lend,
    Withdraw,
    Borrow,
    Repay,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();

    if let Command::Describe { data } = &args.command {
        return describe(data);
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    let market = config.load_market().context("Failed to load market config")?;
    let market_accounts = market.accounts()?;
    let rpc = Arc::new(RpcClient::new(
        config.rpc_http_url.clone(),
        Duration::from_secs(config.rpc_timeout_secs),
    ));

    match args.command {
        Command::Reserves => {
            let targets = targets(&market, None)?;
            let snapshot = fetch_snapshot(rpc.as_ref(), &targets).await?;
            print_reserves(&snapshot);
        }
        Command::Balances { owner } => {
            let owner = resolve_owner(owner, &config)?;
            let obligation = derive_obligation_address(&owner, &market_accounts.program_id)?;
            let snapshot = fetch_snapshot(rpc.as_ref(), &targets(&market, Some(obligation))?).await?;
            print_balances(&snapshot, &obligation);
        }
        Command::Encode {
            operation,
            asset,
            amount,
            owner,
        } => {
            let owner = resolve_owner(owner, &config)?;
            let flow = build_flow(&rpc, &market, &market_accounts, operation, &asset, amount, owner).await?;
            print_flow(&flow, owner, &market_accounts.program_id);
        }
        Command::Watch { owner } => {
            let obligation = match config.resolve_owner(owner.as_deref())? {
                Some(owner) => Some(derive_obligation_address(&owner, &market_accounts.program_id)?),
                None => None,
            };
            watch_market(rpc, targets(&market, obligation)?, &config).await?;
        }
        Command::Describe { .. } => {}
    }

    Ok(())
}

fn targets(market: &MarketConfig, obligation: Option<Pubkey>) -> Result<SnapshotTargets> {
    Ok(SnapshotTargets {
        reserves: market.reserve_addresses()?,
        obligation,
    })
}

fn resolve_owner(owner: Option<String>, config: &Config) -> Result<Pubkey> {
    config
        .resolve_owner(owner.as_deref())?
        .ok_or_else(|| anyhow::anyhow!("No owner given: pass --owner or set OWNER_PUBKEY"))
}

async fn build_flow(
    rpc: &RpcClient,
    market: &MarketConfig,
    market_accounts: &MarketAccounts,
    operation: Operation,
    asset: &str,
    amount: f64,
    owner: Pubkey,
) -> Result<Flow> {
    let user = UserAccounts {
        owner,
        obligation: derive_obligation_address(&owner, &market_accounts.program_id)?,
    };
    let snapshot = fetch_snapshot(rpc, &targets(market, Some(user.obligation))?).await?;
    let reserve = snapshot
        .reserve_by_asset(asset)
        .ok_or_else(|| anyhow::anyhow!("Reserve {} not found in market", asset))?;
    let reserve_accounts = ReserveAccounts::new(reserve.address, &reserve.reserve);
    let presence = rpc
        .fetch_accounts(&[
            get_associated_token_address(&owner, &reserve_accounts.liquidity_mint),
            get_associated_token_address(&owner, &reserve_accounts.collateral_mint),
            user.obligation,
        ])
        .await?;
    let existing = ExistingAccounts {
        liquidity_ata: presence.first().is_some_and(Option::is_some),
        collateral_ata: presence.get(1).is_some_and(Option::is_some),
        obligation: presence.get(2).is_some_and(Option::is_some),
    };

    let native_amount = to_native_amount(amount, reserve.reserve.liquidity.mint_decimals);
    if native_amount == 0 {
        return Err(anyhow::anyhow!("Amount {} rounds to zero", amount));
    }
    let transfer_authority = Keypair::new().pubkey();
    let rent = obligation_rent_exempt_lamports();
    let slot = rpc.get_slot().await?;

    log::info!(
        "Building {:?} of {} {} ({} native units) for {}",
        operation,
        amount,
        reserve.asset,
        native_amount,
        owner
    );

    let mut flow = match operation {
        Operation::Lend => flows::lend(
            market_accounts,
            &reserve_accounts,
            &reserve.reserve,
            &user,
            existing,
            transfer_authority,
            native_amount,
            rent,
            slot,
        )?,
        Operation::Withdraw => flows::withdraw(
            market_accounts,
            &reserve_accounts,
            &user,
            existing,
            transfer_authority,
            native_amount,
            rent,
        ),
        Operation::Borrow => flows::borrow(market_accounts, &reserve_accounts, &user, existing, native_amount),
        Operation::Repay => flows::repay(
            market_accounts,
            &reserve_accounts,
            &user,
            existing,
            transfer_authority,
            native_amount,
        ),
    };

    // Withdraw, borrow and repay are checked against the obligation's refreshed values.
    if matches!(operation, Operation::Withdraw | Operation::Borrow | Operation::Repay) {
        if let Some((address, obligation)) = &snapshot.obligation {
            let refresh = flows::refresh_instructions(market_accounts, *address, obligation, |r| {
                snapshot.reserve(r).map(|s| s.reserve.liquidity.oracle_pubkey)
            })
            .context("Cannot refresh obligation")?;
            flow.instructions = refresh.into_iter().chain(flow.instructions).collect();
        }
    }

    Ok(flow)
}

async fn watch_market(rpc: Arc<RpcClient>, targets: SnapshotTargets, config: &Config) -> Result<()> {
    let (tx, mut rx) = watch::channel(None);
    let cancel = CancellationToken::new();

    let poller = tokio::spawn(run_snapshot_poller(
        rpc,
        targets,
        Duration::from_millis(config.poll_interval_ms),
        config.max_consecutive_errors,
        tx,
        cancel.clone(),
    ));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl-C received, shutting down");
                cancel.cancel();
                break;
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    print_reserves(&snapshot);
                    if let Some((address, _)) = &snapshot.obligation {
                        print_balances(&snapshot, address);
                    }
                }
            }
        }
    }

    poller.await.context("Snapshot poller task panicked")?
}

fn print_reserves(snapshot: &MarketSnapshot) {
    println!(
        "{:<8} {:>16} {:>16} {:>12} {:>8} {:>9} {:>9} {:>5} {:>9}",
        "asset", "supply", "borrowed", "price", "util%", "borrow%", "supply%", "ltv", "accrued%"
    );
    for r in &snapshot.reserves {
        print_reserve(r);
    }
}

fn print_reserve(r: &ReserveSnapshot) {
    println!(
        "{:<8} {:>16.4} {:>16.4} {:>12.4} {:>8.2} {:>9.3} {:>9.3} {:>5} {:>9.4}",
        r.asset,
        r.total_supply_human(),
        r.total_borrow_human(),
        r.market_price(),
        r.rates.utilization.to_f64() * 100.0,
        r.rates.borrow_apy.to_f64() * 100.0,
        r.rates.supply_apy.to_f64() * 100.0,
        r.reserve.config.loan_to_value_ratio,
        r.accrued_interest_pct(),
    );
}

fn print_balances(snapshot: &MarketSnapshot, obligation: &Pubkey) {
    let Some(balances) = &snapshot.balances else {
        println!("Obligation {} not opened yet", obligation);
        return;
    };
    println!("Obligation {}", obligation);
    for (side, entries) in [("deposit", &balances.deposits), ("borrow", &balances.borrows)] {
        for e in entries {
            println!(
                "  {:<7} {:<8} {:>16.6}  apy {:>7.3}%  ltv {:>5.1}%",
                side,
                e.asset,
                e.amount,
                e.apy.to_f64() * 100.0,
                e.collateral_factor.to_f64() * 100.0
            );
        }
    }
    println!(
        "  total deposited {}  total borrowed {}",
        balances.total_deposited_value, balances.total_borrowed_value
    );
}

fn print_flow(flow: &Flow, owner: Pubkey, lending_program: &Pubkey) {
    let signers: Vec<String> = flow.signers(owner).iter().map(|s| s.to_string()).collect();
    println!("signers: {}", signers.join(", "));
    for (i, ix) in flow.instructions.iter().enumerate() {
        print_instruction(i, ix, lending_program);
    }
}

fn print_instruction(index: usize, ix: &Instruction, lending_program: &Pubkey) {
    let program = if ix.program_id == *lending_program {
        "token-lending".to_string()
    } else {
        ProgramIds::label(&ix.program_id)
            .map(str::to_string)
            .unwrap_or_else(|| ix.program_id.to_string())
    };
    let name = if ix.program_id == *lending_program {
        LendingInstruction::unpack(&ix.data)
            .map(|parsed| parsed.name())
            .unwrap_or("?")
    } else {
        "-"
    };
    println!("#{} {} {} data={}", index, program, name, BASE64.encode(&ix.data));
    for (j, meta) in ix.accounts.iter().enumerate() {
        println!(
            "    {:>2}. {} {}{}",
            j,
            meta.pubkey,
            if meta.is_writable { "w" } else { "-" },
            if meta.is_signer { "s" } else { "-" }
        );
    }
}

fn describe(data: &str) -> Result<()> {
    let bytes = BASE64.decode(data.trim()).context("Instruction data is not valid base64")?;
    let ix = LendingInstruction::unpack(&bytes)?;
    println!("{} (tag {}): {:?}", ix.name(), ix.tag(), ix);
    Ok(())
}
