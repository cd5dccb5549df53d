//! Paper replay command.
//!
//! Feeds a candle file bar by bar into a simulated venue and ticks the
//! control loop at each bar's open time.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use trading_broker::SimulatedBroker;
use trading_config::BotConfig;
use trading_core::traits::{Notifier, ReportSink};
use trading_data::{load_csv, resample};
use trading_engine::{ControlLoop, EngineContext, EntryAction, ReconcileConfig};
use trading_indicators::StandardIndicators;
use trading_monitor::{LogNotifier, MemoryReportSink, TelegramNotifier};
use trading_state::StateStore;

use crate::cli::PaperArgs;

/// Lowest ticket the simulated venue hands out.
const FIRST_TICKET: u64 = 1000;

#[derive(Debug, Default)]
struct ReplayStats {
    ticks: usize,
    failed_ticks: usize,
    entries: usize,
    reversals: usize,
    rejections: usize,
    adopted: usize,
    closed: usize,
    stops_moved: usize,
    targets_moved: usize,
}

pub async fn run(args: PaperArgs, config: &BotConfig, reports: Option<Arc<dyn ReportSink>>) -> Result<()> {
    config.validate()?;
    let timeframe = config.timeframe()?;

    if !args.data.exists() {
        bail!("Data file '{}' does not exist", args.data.display());
    }
    let mut bars = load_csv(&args.data).with_context(|| format!("Failed to load {}", args.data.display()))?;
    if args.resample {
        bars = resample(&bars, timeframe);
    }
    if bars.len() <= args.warmup {
        bail!(
            "{} candles loaded but the warmup needs {}; lower --warmup or provide more data",
            bars.len(),
            args.warmup + 1
        );
    }
    info!(candles = bars.len(), warmup = args.warmup, %timeframe, "Starting paper replay");

    // Records left by an earlier replay refer to positions of a venue that
    // no longer exists.
    let state_path = config.paper_state_path();
    let store = Arc::new(
        StateStore::open(&state_path).with_context(|| format!("Failed to open {}", state_path.display()))?,
    );
    let stale = store.list_tickets()?;
    if !stale.is_empty() {
        warn!(tickets = stale.len(), path = %state_path.display(), "Discarding records of a previous replay");
        for ticket in stale {
            store.remove(ticket)?;
        }
    }

    let reports = reports.unwrap_or_else(|| Arc::new(MemoryReportSink::new()) as Arc<dyn ReportSink>);
    let logged = reports.logged_tickets().context("Failed to read the trade history")?;

    let broker = Arc::new(
        SimulatedBroker::new(config.broker.symbol.as_str(), timeframe)
            .with_spread(config.broker.spread)
            .with_contract_size(config.broker.contract_size)
            .with_commission(config.broker.commission_per_lot)
            .with_first_ticket(first_ticket(&logged)),
    );
    let (warmup, replay) = bars.split_at(args.warmup);
    for bar in warmup {
        broker.push_bar(*bar);
    }
    let notifier: Arc<dyn Notifier> = if config.notify.enabled {
        Arc::new(TelegramNotifier::from_env(&config.notify.token_env, &config.notify.chat_id_env)?)
    } else {
        Arc::new(LogNotifier)
    };
    let ctx = EngineContext::new(broker.clone(), store, Arc::new(StandardIndicators), notifier, reports);

    // Simulated time does not pass while the loop sleeps.
    let mut entry = config.entry_config()?;
    entry.reversal_delay = Duration::ZERO;
    let reconcile = ReconcileConfig {
        deal_retry_delay_ms: 0,
        ..config.reconcile.clone()
    };
    let mut control = ControlLoop::new(ctx, entry, config.exits.clone(), reconcile, config.schedule.clone());

    let (shutdown_tx, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let mut stats = ReplayStats::default();
    for bar in replay {
        if *shutdown.borrow() {
            warn!(ticks = stats.ticks, "Replay interrupted");
            break;
        }
        broker.push_bar(*bar);
        stats.ticks += 1;

        match control.tick(bar.datetime()).await {
            Ok(outcome) => {
                stats.adopted += outcome.reconcile.adopted.len();
                stats.closed += outcome.reconcile.closed.len();
                stats.stops_moved += outcome.exits.stops_moved.len();
                stats.targets_moved += outcome.exits.targets_moved.len();
                match outcome.entry {
                    Some(EntryAction::Opened { .. }) => stats.entries += 1,
                    Some(EntryAction::Reversed { .. }) => stats.reversals += 1,
                    Some(EntryAction::Rejected(_)) => stats.rejections += 1,
                    _ => {}
                }
            }
            Err(e) => {
                stats.failed_ticks += 1;
                error!(severity = "critical", time = %bar.datetime(), error = %e, "Replay tick failed");
            }
        }
    }

    print_summary(&stats, &broker);
    Ok(())
}

/// First simulated ticket, above every ticket already in the trade history.
fn first_ticket(logged: &HashSet<u64>) -> u64 {
    logged
        .iter()
        .max()
        .map_or(FIRST_TICKET, |&highest| highest.saturating_add(1).max(FIRST_TICKET))
}

fn print_summary(stats: &ReplayStats, broker: &SimulatedBroker) {
    let realized: Decimal = broker
        .deals()
        .iter()
        .map(|d| d.profit + d.commission + d.swap)
        .sum();
    let open = broker.positions();

    println!("Paper replay complete");
    println!("  Ticks:            {} ({} failed)", stats.ticks, stats.failed_ticks);
    println!("  Entries:          {}", stats.entries);
    println!("  Reversals:        {}", stats.reversals);
    println!("  Rejected orders:  {}", stats.rejections);
    println!("  Adopted trades:   {}", stats.adopted);
    println!("  Closed trades:    {}", stats.closed);
    println!("  Stop advances:    {}", stats.stops_moved);
    println!("  Target advances:  {}", stats.targets_moved);
    println!("  Open positions:   {}", open.len());
    println!("  Realized P/L:     ${}", realized.round_dp(2));
}
