use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mpc_presence_core::{AppConfig, PlaybackMetrics, PlaybackState};
use mpc_presence_discord_rpc::DiscordClient;
use mpc_presence_engine::{CycleError, EngineAction, EngineConfig, PresenceEngine};
use mpc_presence_scraper::{MpcWebInterface, StatusSource};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "mpc-presence",
    about = "MPC web interface -> presence engine -> Discord Rich Presence"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Run,
    Doctor,
    Status,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cmd = cli.command.unwrap_or(Commands::Run);
    let cfg_path = cli.config.unwrap_or_else(default_config_path);

    match cmd {
        Commands::Config {
            action: ConfigAction::Init,
        } => {
            init_config(&cfg_path)?;
            println!("Initialized config at {}", cfg_path.display());
            Ok(())
        }
        Commands::Doctor => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            doctor(&cfg).await
        }
        Commands::Status => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            status(&cfg).await
        }
        Commands::Run => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            run(cfg).await
        }
    }
}

async fn run(cfg: AppConfig) -> Result<()> {
    let mut source = MpcWebInterface::new(cfg.port)?;
    let mut engine = PresenceEngine::new(EngineConfig::from_app_config(&cfg));
    let mut discord = DiscordClient::new(cfg.discord_app_id.clone());

    let connected_poll = Duration::from_millis(cfg.intervals.connected_poll_ms);
    let retry_poll = Duration::from_millis(cfg.intervals.retry_poll_ms);

    info!(source = source.name(), port = cfg.port, "mpc-presence started");

    let mut next_poll_in = Duration::ZERO;
    let mut reachable = false;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(next_poll_in) => {
                match source.poll().await {
                    Ok(obs) => {
                        if !reachable {
                            info!(server = %obs.server, "connected to media player web interface");
                            reachable = true;
                        }
                        next_poll_in = connected_poll;

                        match engine.tick(&obs, SystemTime::now()) {
                            Ok(EngineAction::Send(payload)) => {
                                info!(
                                    state = %payload.state,
                                    title = payload.details.as_deref().unwrap_or("-"),
                                    "presence update"
                                );
                                if let Err(err) = discord.publish(&payload).await {
                                    warn!(error = %err, "presence publish failed");
                                }
                            }
                            Ok(EngineAction::None) => {}
                            Err(CycleError::MalformedTime(err)) => {
                                warn!(error = %err, "skipping cycle: unparsable clock field");
                            }
                            Err(CycleError::UnknownState(err)) => {
                                error!(error = %err, "player reported a state outside the known set");
                                return Err(err.into());
                            }
                        }
                    }
                    Err(err) => {
                        if reachable {
                            warn!(error = %err, "lost the media player web interface; clearing presence");
                            reachable = false;
                            if let Err(err) = discord.clear().await {
                                warn!(error = %err, "presence clear failed");
                            }
                        } else {
                            warn!(
                                error = %err,
                                port = cfg.port,
                                "media player web interface unreachable; check that the web interface is enabled"
                            );
                        }
                        next_poll_in = retry_poll;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c; shutting down");
                let _ = discord.clear().await;
                break;
            }
        }
    }

    Ok(())
}

async fn doctor(cfg: &AppConfig) -> Result<()> {
    println!("== mpc-presence doctor ==");

    let mut source = MpcWebInterface::new(cfg.port)?;
    match source.poll().await {
        Ok(obs) => {
            println!("Web interface: reachable ({})", obs.server);
            println!("State code: {}", obs.state_code);
            println!("File: {}", obs.filename);
        }
        Err(err) => {
            println!("Web interface: not reachable on port {} ({err:#})", cfg.port);
            println!(
                "Make sure the player is running and 'Web Interface' is enabled in its options."
            );
        }
    }

    let discord_ok = discord_running().await;
    println!(
        "Discord RPC local endpoint: {}",
        if discord_ok {
            "reachable"
        } else {
            "not reachable"
        }
    );

    Ok(())
}

async fn status(cfg: &AppConfig) -> Result<()> {
    let mut source = MpcWebInterface::new(cfg.port)?;
    let obs = source.poll().await?;
    let state = PlaybackState::from_code(&obs.state_code)?;

    println!("server: {}", obs.server);
    println!("state: {}", state.label());
    println!("file: {}", obs.filename);
    println!("position: {} / {}", obs.position_text, obs.duration_text);

    let duration_ms = mpc_presence_core::timefmt::parse_clock(&obs.duration_text)?;
    let position_ms = mpc_presence_core::timefmt::parse_clock(&obs.position_text)?;
    let metrics = PlaybackMetrics::derive(duration_ms, position_ms);
    println!("progress: {}%", metrics.percent_complete);

    Ok(())
}

fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("mpc-presence").join("config.toml")
}

fn init_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let cfg = AppConfig::default();
    let toml = toml::to_string_pretty(&cfg)?;
    std::fs::write(path, toml)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

fn load_or_default(path: &Path) -> Result<AppConfig> {
    let mut cfg = if !path.exists() {
        AppConfig::default()
    } else {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))?
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("MPC_PRESENCE_DISCORD_APP_ID") {
        if !v.trim().is_empty() {
            cfg.discord_app_id = v;
        }
    }
    if let Ok(v) = std::env::var("MPC_PRESENCE_PORT") {
        if let Ok(port) = v.parse::<u16>() {
            cfg.port = port;
        }
    }
    if let Ok(v) = std::env::var("MPC_PRESENCE_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.log_level = v;
        }
    }
}

async fn discord_running() -> bool {
    #[cfg(unix)]
    {
        for slot in 0..=9u8 {
            if discord_ipc_exists(slot) {
                return true;
            }
        }
    }

    let ports = [6463, 6464, 6465, 6466, 6467, 6468, 6469, 6470, 6471, 6472];
    for port in ports {
        let addr = format!("127.0.0.1:{port}");
        if tokio::time::timeout(
            Duration::from_millis(200),
            tokio::net::TcpStream::connect(addr),
        )
        .await
        .ok()
        .and_then(Result::ok)
        .is_some()
        {
            return true;
        }
    }
    false
}

#[cfg(unix)]
fn discord_ipc_exists(slot: u8) -> bool {
    let mut candidates = Vec::new();
    if let Ok(tmpdir) = std::env::var("TMPDIR") {
        candidates.push(PathBuf::from(tmpdir).join(format!("discord-ipc-{slot}")));
    }
    if let Ok(runtime) = std::env::var("XDG_RUNTIME_DIR") {
        candidates.push(PathBuf::from(runtime).join(format!("discord-ipc-{slot}")));
    }
    candidates.push(PathBuf::from(format!("/tmp/discord-ipc-{slot}")));
    candidates.push(PathBuf::from(format!("/private/tmp/discord-ipc-{slot}")));

    candidates.into_iter().any(|p| p.exists())
}
