//! Rollup worker simulator.
//!
//! Deploys an in-memory anchor, fills its queue with price requests and runs
//! several competing price-feed workers against it until the queue drains.
//!
//! # Example
//!
//! ```bash
//! # Three workers racing over 200 requests with 5ms round trips
//! rollup-sim --workers 3 --requests 200 --latency 5ms
//!
//! # Meta-transaction path, fixed number of rounds
//! rollup-sim --meta --rounds 20 --config worker.toml
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::future::join_all;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rollup_anchor::{Anchor, AnchorBackend, AnchorConfig, Role, SharedAnchor};
use rollup_client::Client;
use rollup_codec::{MessageCoder, SborMessageCoder, SborTypeCoder};
use rollup_types::AttestorKey;
use rollup_worker::price_feed::{
    PriceFeedHandler, PriceRequest, PriceResponse, SimulatedPrices, ERR_NO_PRICE,
};
use rollup_worker::{Worker, WorkerConfig, WorkerReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pairs requested by the simulated users. The last one has no quote.
const PAIRS: [(&str, &str); 4] = [
    ("btc", "usd"),
    ("eth", "usd"),
    ("sol", "usd"),
    ("xyz", "usd"),
];

/// Rollup worker simulator
///
/// Given the same seed, enqueues the same requests and derives the same keys.
/// Round interleaving depends on the runtime.
#[derive(Parser, Debug)]
#[command(name = "rollup-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of competing workers
    #[arg(short = 'w', long, default_value = "3")]
    workers: usize,

    /// Number of queued price requests
    #[arg(short = 'r', long, default_value = "100")]
    requests: usize,

    /// Rounds per worker; runs until the queue drains when unset
    #[arg(long)]
    rounds: Option<u64>,

    /// Stop after this long (e.g. "10s")
    #[arg(short = 'd', long)]
    duration: Option<humantime::Duration>,

    /// Pause between rounds; overrides the config file
    #[arg(long)]
    interval: Option<humantime::Duration>,

    /// Simulated round-trip latency per remote call
    #[arg(long, default_value = "2ms")]
    latency: humantime::Duration,

    /// Messages drained per round; overrides the config file
    #[arg(long)]
    max_per_round: Option<usize>,

    /// Commit through the meta-transaction path
    #[arg(long)]
    meta: bool,

    /// Random seed for keys and requests
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Worker configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn,rollup_sim=info,rollup_worker=info,rollup_client=info")]
    log_level: String,
}

type PriceWorker = Worker<AnchorBackend, PriceRequest, PriceResponse>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    if args.workers == 0 {
        bail!("--workers must be at least 1");
    }

    let config = match &args.config {
        Some(path) => WorkerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => WorkerConfig::default(),
    };
    let mut settings = config.worker.clone();
    if let Some(max) = args.max_per_round {
        settings = settings.with_max_messages_per_round(max);
    }
    let interval = match args.interval {
        Some(interval) => *interval,
        None => settings.round_interval().context("reading round interval")?,
    };

    info!(
        workers = args.workers,
        requests = args.requests,
        latency_ms = args.latency.as_millis(),
        interval_ms = interval.as_millis(),
        meta = args.meta,
        seed = args.seed,
        "Starting simulation"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let admin = AttestorKey::from_seed(&rng.gen());
    let anchor = SharedAnchor::new(Anchor::new(
        admin.account_id(),
        Arc::new(SborTypeCoder),
        AnchorConfig {
            index_type: config.client.index_type,
            keys: config.keys.reserved_keys(),
        },
    ));

    let request_coder = SborMessageCoder::<PriceRequest>::new();
    {
        let mut anchor = anchor.lock();
        for id in 0..args.requests {
            let request = price_request(id, &mut rng)?;
            let data = request_coder
                .encode(&request)
                .context("encoding price request")?;
            anchor.push_message(data).context("enqueueing request")?;
        }
    }

    let configured_attestor = config.identity.attestor().context("reading attestor seed")?;
    let configured_sender = config.identity.sender().context("reading sender seed")?;
    let use_meta = args.meta || configured_sender.is_some() || config.client.meta_transaction;

    let mut workers: Vec<PriceWorker> = Vec::with_capacity(args.workers);
    for i in 0..args.workers {
        let attestor = match (i, &configured_attestor) {
            (0, Some(key)) => key.clone(),
            _ => AttestorKey::from_seed(&rng.gen()),
        };
        anchor
            .lock()
            .grant_role(admin.account_id(), Role::Attestor, attestor.account_id())
            .with_context(|| format!("granting attestor role to worker {}", i))?;

        let mut backend = AnchorBackend::new(anchor.clone())
            .with_attestor(attestor)
            .with_latency(*args.latency);
        if use_meta {
            let sender = match &configured_sender {
                Some(key) => key.clone(),
                None => AttestorKey::from_seed(&rng.gen()),
            };
            backend = backend.with_sender(sender);
        }

        let client = Client::new(
            backend,
            Arc::new(SborMessageCoder::<PriceRequest>::new()),
            Arc::new(SborMessageCoder::<PriceResponse>::new()),
            config.client.clone(),
        );
        let prices = SimulatedPrices::new(args.seed.wrapping_add(i as u64))
            .with_pair("btc", "usd", 60_000)
            .with_pair("eth", "usd", 3_000)
            .with_pair("sol", "usd", 150);
        workers.push(Worker::new(
            format!("worker-{}", i),
            client,
            Arc::new(PriceFeedHandler::new(prices)),
            settings.clone(),
        ));
    }

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(watch(
        anchor.clone(),
        cancel.clone(),
        args.duration.map(|d| *d),
        args.rounds.is_none(),
        interval,
    ));

    let start = Instant::now();
    let reports = join_all(
        workers
            .iter_mut()
            .map(|worker| worker.run_until_cancelled(cancel.clone(), interval, args.rounds)),
    )
    .await;
    cancel.cancel();
    watcher.await.context("joining watcher")?;

    print_summary(&anchor, &workers, &reports, args.requests, start.elapsed());
    Ok(())
}

/// A request for a random pair, numbered `id`.
fn price_request(id: usize, rng: &mut ChaCha8Rng) -> Result<PriceRequest> {
    let trading_pair_id =
        u32::try_from(id).with_context(|| format!("request id {} does not fit in u32", id))?;
    let (token_a, token_b) = PAIRS[rng.gen_range(0..PAIRS.len())];
    Ok(PriceRequest {
        op_type: 0,
        trading_pair_id,
        token_a: token_a.to_string(),
        token_b: token_b.to_string(),
    })
}

/// Cancel the workers on ctrl-c, after `duration`, or once the queue drains.
async fn watch(
    anchor: SharedAnchor,
    cancel: CancellationToken,
    duration: Option<Duration>,
    until_drained: bool,
    poll: Duration,
) {
    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    let drained = async {
        if !until_drained {
            return std::future::pending().await;
        }
        loop {
            if !anchor.lock().has_message().unwrap_or(false) {
                return;
            }
            tokio::time::sleep(poll).await;
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = deadline => info!("Duration elapsed"),
        _ = drained => info!("Queue drained"),
    }
    cancel.cancel();
}

fn print_summary(
    anchor: &SharedAnchor,
    workers: &[PriceWorker],
    reports: &[WorkerReport],
    requests: usize,
    elapsed: Duration,
) {
    let anchor = anchor.lock();
    let response_coder = SborMessageCoder::<PriceResponse>::new();
    let responses: Vec<PriceResponse> = anchor
        .replies()
        .iter()
        .filter_map(|bytes| response_coder.decode(bytes).ok())
        .collect();
    let unpriced = responses
        .iter()
        .filter(|r| r.err_no == Some(ERR_NO_PRICE))
        .count();

    println!("\n=== Simulation Complete ===");
    println!("Elapsed:      {:?}", elapsed);
    println!("Requests:     {}", requests);
    println!(
        "Queue:        head {} / tail {}",
        anchor.queue_head().unwrap_or_default(),
        anchor.queue_tail().unwrap_or_default()
    );
    println!("Transactions: {}", anchor.tx_count());
    println!("Replies:      {} ({} without price)", responses.len(), unpriced);

    println!(
        "\n{:<10} {:>7} {:>8} {:>10} {:>6} {:>7} {:>9}",
        "worker", "rounds", "commits", "conflicts", "empty", "errors", "messages"
    );
    let mut commits = 0;
    let mut conflicts = 0;
    for (worker, report) in workers.iter().zip(reports) {
        println!(
            "{:<10} {:>7} {:>8} {:>10} {:>6} {:>7} {:>9}",
            worker.name(),
            report.rounds,
            report.commits,
            report.conflicts,
            report.empty_rounds,
            report.errors,
            report.messages
        );
        commits += report.commits;
        conflicts += report.conflicts;
    }
    println!(
        "\nConflict rate: {:.1}%",
        conflicts as f64 / (commits + conflicts).max(1) as f64 * 100.0
    );
}
