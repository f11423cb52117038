use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use cfg_if::cfg_if;
use clap::{command, Parser};
use colored::Colorize;
use tokio::{
    signal,
    sync::{broadcast, mpsc, mpsc::error::TryRecvError},
};
use tracing::*;
use url::Url;

use shared::{
    interaction::{Challenge, Command, Submission},
    orchestrator::{Orchestrator, OrchestratorConfig},
    problem::Problem,
    types::WalletId,
};

use crate::config::{ClientConfig, DEFAULT_POLL_INTERVAL_MILLIS, DEFAULT_RECONNECT, DEFAULT_URL};

mod config;
mod stream;

cfg_if! {
    if #[cfg(feature = "build-version")] {
        include!(concat!(env!("OUT_DIR"), "/version.rs"));
    } else {
        pub const VERSION: &str = "unknown";
    }
}

#[derive(Parser, Debug)]
#[command(about, version)]
struct Args {
    #[arg(long, value_name = "SERVER_URL", help = "Challenge server websocket url")]
    url: Option<String>,

    #[arg(long, value_name = "WALLET_ID", help = "The wallet id submissions are credited to")]
    wallet: Option<String>,

    #[arg(
        long,
        value_name = "CORES_COUNT",
        help = "The number of worker threads per challenge, defaults to all cores"
    )]
    cores: Option<usize>,

    #[arg(long, value_name = "RECONNECT", help = "The number of reconnect times")]
    reconnect: Option<u32>,

    #[arg(
        long,
        value_name = "MILLIS",
        help = "How often the result slot is checked for a solution"
    )]
    poll_interval: Option<u64>,

    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Bind worker threads to CPU cores, `--pin-cores=false` overrides the config file"
    )]
    pin_cores: Option<bool>,

    #[arg(long, value_name = "CONFIG_FILE", help = "JSON config file, command line values win")]
    config: Option<String>,
}

struct Settings {
    url: Url,
    wallet: WalletId,
    reconnect: u32,
    poll_interval: Duration,
    orchestrator: OrchestratorConfig,
}

impl Settings {
    fn resolve(args: Args) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => config::load_config_file(path)?,
            None => ClientConfig::default(),
        };
        Self::merge(args, file)
    }

    /// Command line values win over the config file.
    fn merge(args: Args, file: ClientConfig) -> anyhow::Result<Self> {
        let url = args.url.or(file.url).unwrap_or_else(|| DEFAULT_URL.to_string());
        let url = Url::parse(&url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            anyhow::bail!("server url must be ws:// or wss://, got {url}");
        }

        let Some(wallet) = args.wallet.or(file.wallet) else {
            anyhow::bail!("a wallet id is required (--wallet or config file)");
        };

        Ok(Self {
            url,
            wallet: WalletId(wallet),
            reconnect: args.reconnect.or(file.reconnect).unwrap_or(DEFAULT_RECONNECT),
            poll_interval: Duration::from_millis(
                args.poll_interval.or(file.poll_interval).unwrap_or(DEFAULT_POLL_INTERVAL_MILLIS),
            ),
            orchestrator: OrchestratorConfig {
                workers: args.cores.or(file.cores),
                pin_cores: args.pin_cores.unwrap_or(file.pin_cores),
            },
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::log::init_log();

    info!("VERSION:{}", VERSION);

    let settings = Settings::resolve(Args::parse())?;

    info!(
        "Client Starting... Threads: {}, Wallet: {}",
        settings.orchestrator.worker_count(),
        settings.wallet
    );

    let (notify_shutdown, _) = broadcast::channel(1);
    let shutdown = Arc::new(AtomicBool::new(false));

    let (command_tx, challenge_rx) =
        stream::new_subscribe(settings.url.to_string(), settings.reconnect, notify_shutdown.subscribe());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = signal::ctrl_c().await {
                error!("failed to listen for Ctrl+C: {err}");
                return;
            }
            info!("ctrl+c received. start shutdown and wait for all threads to complete their work");
            shutdown.store(true, Ordering::SeqCst);
            notify_shutdown.send(()).ok();
        }
    });

    // the orchestrator blocks while draining workers, keep it off the async workers
    tokio::task::spawn_blocking(move || mine(settings, challenge_rx, command_tx, shutdown)).await?;

    Ok(())
}

fn mine(
    settings: Settings,
    mut challenge_rx: mpsc::Receiver<Challenge>,
    command_tx: mpsc::Sender<Command>,
    shutdown: Arc<AtomicBool>,
) {
    let Settings { wallet, poll_interval, orchestrator, .. } = settings;
    let mut orchestrator = Orchestrator::new(orchestrator);

    loop {
        if shutdown.load(Ordering::SeqCst) {
            warn!("shutdown flag is set. exiting...");
            break;
        }

        let (latest, disconnected) = latest_challenge(&mut challenge_rx);
        if let Some(challenge) = latest {
            on_challenge(&mut orchestrator, challenge);
        }

        if let Some(solution) = orchestrator.poll() {
            info!("{}", format!("solution found, nonce: {}", solution.nonce).bold().green());
            let submission = Command::Submission(Submission::new(&wallet, &solution));
            if let Err(err) = command_tx.blocking_send(submission) {
                error!("fail to send submission: {err}");
            }
        }

        if disconnected {
            error!("challenge stream closed");
            break;
        }

        std::thread::sleep(poll_interval);
    }

    orchestrator.shutdown();
    debug!("miner stopped");
}

/// Drain the queue, keeping only the newest challenge. The flag is set once
/// the stream task is gone.
fn latest_challenge(challenge_rx: &mut mpsc::Receiver<Challenge>) -> (Option<Challenge>, bool) {
    let mut latest = None;
    loop {
        match challenge_rx.try_recv() {
            Ok(challenge) => {
                if let Some(skipped) = latest.replace(challenge) {
                    debug!("skip outdated challenge {:?}", skipped.challenge_id);
                }
            }
            Err(TryRecvError::Empty) => return (latest, false),
            Err(TryRecvError::Disconnected) => return (latest, true),
        }
    }
}

fn on_challenge(orchestrator: &mut Orchestrator, challenge: Challenge) {
    info!(
        "{}",
        format!("======================== new challenge {:?} ========================", challenge.challenge_id)
            .bold()
            .red()
    );

    if let Some(previous) = orchestrator.problem() {
        debug!("superseding {previous}");
    }

    match Problem::try_from(challenge) {
        Ok(problem) => {
            orchestrator.start(problem);
        }
        Err(err) => {
            warn!("challenge rejected: {err}");
            // whatever was running belongs to a superseded challenge
            if orchestrator.is_running() {
                orchestrator.stop();
            }
        }
    }
}
