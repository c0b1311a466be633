use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use werewolf_cards::config::{
    seed_to_array, CardPreference, ClientConfig, DispatcherConfig, ProverConfig,
    DEFAULT_GENERATOR,
};
use werewolf_cards::dispatcher::{DispatcherChannels, ProtocolDispatcher};
use werewolf_cards::prover::{HttpProver, ProverClient};
use werewolf_cards::session::{GameEvent, PlayerCommand};
use werewolf_cards::tokio_tools::spawn_named_task;
use werewolf_cards::transport::{self, TransportChannels};

const LOG_TARGET: &str = "bin::werewolf_client";
const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:5000/game";
const DEFAULT_PROVER_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Parser)]
#[command(name = "werewolf_client")]
#[command(about = "Play the card protocol of a mental-poker werewolf game", long_about = None)]
struct Args {
    /// Game server websocket URL
    #[arg(long, env = "CLIENT_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Base URL of the proving service (`/execute` and `/prove` live under it)
    #[arg(long, env = "CLIENT_PROVER_URL", default_value = DEFAULT_PROVER_URL)]
    prover_url: String,

    /// Display name sent with `join`
    #[arg(long, env = "CLIENT_PLAYER_NAME")]
    name: String,

    /// ElGamal generator shared by every circuit
    #[arg(long, env = "CLIENT_GENERATOR", default_value = DEFAULT_GENERATOR)]
    generator: String,

    /// Per-request timeout for the proving service, in seconds
    #[arg(long, env = "CLIENT_PROVER_TIMEOUT_SECS", default_value_t = 120)]
    prover_timeout_secs: u64,

    /// Websocket handshake timeout, in seconds
    #[arg(long, env = "CLIENT_HANDSHAKE_TIMEOUT_SECS", default_value_t = 10)]
    handshake_timeout_secs: u64,

    /// Wait for a `pick <index>` line on stdin instead of choosing at random
    #[arg(long, env = "CLIENT_MANUAL_PICK", default_value_t = false)]
    manual_pick: bool,

    /// Send night actions without a card-message proof
    #[arg(long, env = "CLIENT_NO_NIGHT_PROOFS", default_value_t = false)]
    no_night_proofs: bool,

    /// Capacity of the inbound and outbound frame channels
    #[arg(long, env = "CLIENT_FRAME_CAPACITY", default_value_t = 256)]
    frame_capacity: usize,

    /// Capacity of the game event bus
    #[arg(long, env = "CLIENT_EVENT_CAPACITY", default_value_t = 256)]
    event_capacity: usize,

    /// Optional RNG seed for deterministic keys, shuffles and card picks
    #[arg(long, env = "CLIENT_RNG_SEED")]
    rng_seed: Option<u64>,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "CLIENT_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json)?;
    let config = build_config(args).context("failed to build client config")?;
    run_client(config).await
}

fn load_dotenv() {
    let manifest_env = env!("CARGO_MANIFEST_DIR");
    let manifest_env_path = PathBuf::from(manifest_env).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn build_config(args: Args) -> Result<ClientConfig> {
    let server_url = Url::parse(&args.server_url).context("invalid CLIENT_SERVER_URL")?;
    if !matches!(server_url.scheme(), "ws" | "wss") {
        return Err(anyhow!(
            "game server URL must use ws or wss, found {}",
            server_url.scheme()
        ));
    }
    let prover_url = Url::parse(&args.prover_url).context("invalid CLIENT_PROVER_URL")?;
    if args.name.trim().is_empty() {
        return Err(anyhow!("player name cannot be empty"));
    }
    if args.frame_capacity == 0 || args.event_capacity == 0 {
        return Err(anyhow!("channel capacities must be at least 1"));
    }

    let preference = if args.manual_pick {
        CardPreference::Manual
    } else {
        CardPreference::Random
    };
    let mut dispatcher = DispatcherConfig::new(args.name)
        .with_card_preference(preference)
        .with_night_action_proofs(!args.no_night_proofs);
    dispatcher.generator = args.generator;
    dispatcher.event_capacity = args.event_capacity;
    if let Some(seed) = args.rng_seed {
        dispatcher = dispatcher.with_rng_seed(seed_to_array(seed));
    }

    Ok(ClientConfig {
        server_url,
        handshake_timeout: Duration::from_secs(args.handshake_timeout_secs),
        frame_capacity: args.frame_capacity,
        prover: ProverConfig::new(prover_url)
            .with_request_timeout(Duration::from_secs(args.prover_timeout_secs)),
        dispatcher,
    })
}

async fn run_client(config: ClientConfig) -> Result<()> {
    let prover: Arc<dyn ProverClient> =
        Arc::new(HttpProver::new(&config.prover).context("failed to build prover client")?);
    let stream = transport::connect(&config.server_url, config.handshake_timeout).await?;

    let stop = CancellationToken::new();
    let (inbound_tx, inbound_rx) = mpsc::channel(config.frame_capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(config.frame_capacity);
    let (commands_tx, commands_rx) = mpsc::channel(16);

    let dispatcher = ProtocolDispatcher::new(
        config.dispatcher.clone(),
        prover,
        DispatcherChannels {
            inbound: inbound_rx,
            outbound: outbound_tx,
            commands: commands_rx,
        },
        stop.clone(),
    );
    let events = dispatcher.subscribe();

    let transport_task = spawn_named_task(
        "transport",
        transport::pump(
            stream,
            TransportChannels {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
            stop.clone(),
        ),
    );
    spawn_named_task("event-log", log_events(events));
    spawn_named_task("stdin-commands", read_commands(commands_tx, stop.clone()));
    let dispatcher_task = spawn_named_task("dispatcher", dispatcher.run());

    info!(
        target = LOG_TARGET,
        server = %config.server_url,
        prover = %config.prover.base_url,
        player = %config.dispatcher.player_name,
        "werewolf client running"
    );

    let signal_stop = stop.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_stop.cancel();
    });

    let outcome = dispatcher_task.await.context("dispatcher task panicked")?;
    stop.cancel();
    if let Err(err) = transport_task.await.context("transport task panicked")? {
        warn!(target = LOG_TARGET, error = %err, "transport ended with error");
    }
    outcome.map_err(|err| anyhow!("card protocol failed: {err}"))
}

/// Turn stdin lines into player commands until stdin closes or `stop` fires.
async fn read_commands(commands: mpsc::Sender<PlayerCommand>, stop: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = stop.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!(target = LOG_TARGET, "stdin closed, no more player commands");
                break;
            }
            Err(err) => {
                warn!(target = LOG_TARGET, error = %err, "failed to read stdin");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<PlayerCommand>() {
            Ok(command) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Err(err) => warn!(target = LOG_TARGET, error = %err, "ignoring command line"),
        }
    }
}

async fn log_events(mut events: broadcast::Receiver<GameEvent>) {
    loop {
        match events.recv().await {
            Ok(GameEvent::ProtocolFailed { reason, fatal }) => {
                warn!(target = LOG_TARGET, fatal, %reason, "protocol failure");
            }
            Ok(GameEvent::RoleAssigned { role, source }) => {
                info!(target = LOG_TARGET, %role, ?source, "role assigned");
            }
            Ok(GameEvent::GameOver { winner, .. }) => {
                info!(target = LOG_TARGET, %winner, "game over");
            }
            Ok(event) => debug!(target = LOG_TARGET, ?event, "game event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(target = LOG_TARGET, skipped, "event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target = LOG_TARGET, error = %err, "failed to install ctrl-c handler");
    }
    info!(target = LOG_TARGET, "shutdown signal received");
}
