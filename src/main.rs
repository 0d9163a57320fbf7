//! # vpsctl - VPS power-lifecycle controller
//!
//! Drives a single ConoHa-hosted game server VPS through start/stop/reboot
//! transitions: authenticates against the identity service, serializes
//! commands behind a cooldown guard, and watches each transition settle.

mod api;
mod config;
pub mod constants;
mod controller;
mod guard;
mod history;
mod models;
mod notify;
mod utils;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use api::ConohaClient;
use config::{Config, Credentials};
use controller::{Controller, ControllerSettings, ExecuteResult};
use guard::ActionGuard;
use models::{power_state_label, ActionKind};
use notify::DiscordNotifier;

/// vpsctl - ConoHa VPS power-lifecycle controller
#[derive(Parser, Debug)]
#[command(
    name = "vpsctl",
    version,
    about = "Start, stop and reboot a ConoHa-hosted game server VPS"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Don't wait for the server to settle after an action
    #[arg(long, global = true)]
    no_wait: bool,

    /// Override the settle deadline in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the server's current power status and addresses
    Status,
    /// Power the server on
    Start,
    /// Power the server off (billing stops while it's down)
    Stop,
    /// Soft-reboot the server
    Reboot,
    /// Discard the session token and authenticate again
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Credentials come from the environment; ~/.config/vpsctl/.env is the
    // usual home for them. A .env in the working directory also works.
    let _ = dotenvy::from_path(constants::env_file_path());
    let _ = dotenvy::dotenv();

    let mut config = Config::load();
    if let Some(secs) = cli.timeout {
        config.reconcile_timeout_secs = secs;
    }

    let credentials = Credentials::from_env().context(
        "missing credentials: set CONOHA_USERNAME, CONOHA_PASSWORD, \
         CONOHA_TENANT_ID and VPS_SERVER_ID (usually in ~/.config/vpsctl/.env)",
    )?;

    let client = ConohaClient::new(credentials, &config.region, config.http_timeout())
        .map_err(|e| anyhow::anyhow!("failed to build API client: {}", e))?;

    let mut settings = ControllerSettings::from_config(&config);
    settings.wait_for_settle = !cli.no_wait;

    let notifier = DiscordNotifier::from_env();
    let controller = Controller::new(
        client,
        ActionGuard::new(config.cooldowns()),
        settings,
        notifier.clone(),
    );

    let result = match cli.command {
        Command::Status => print_status(&controller).await,
        Command::Start => run_action(&controller, ActionKind::Start).await,
        Command::Stop => run_action(&controller, ActionKind::Stop).await,
        Command::Reboot => run_action(&controller, ActionKind::Reboot).await,
        Command::Auth => match controller.refresh_auth().await {
            Ok(()) => {
                println!("✓ authentication refreshed");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("authentication failed: {}", e)),
        },
    };

    // Returning from main tears the runtime down and aborts spawned tasks;
    // give the last webhook post a moment to land first.
    if let Some(notifier) = &notifier {
        notifier
            .flush(std::time::Duration::from_secs(
                constants::NOTIFY_FLUSH_TIMEOUT_SECS,
            ))
            .await;
    }

    result
}

async fn print_status(controller: &Controller<ConohaClient>) -> Result<()> {
    let server = controller
        .status()
        .await
        .map_err(|e| anyhow::anyhow!("status read failed: {}", e))?;

    println!("Server : {} ({})", server.name, server.status);
    println!("Power  : {}", power_state_label(server.power_state));
    match &server.task_state {
        Some(task) => println!("Task   : {} (in progress)", task),
        None => println!("Task   : idle"),
    }
    if !server.created.is_empty() {
        println!("Created: {}", server.created);
    }
    for (network, addresses) in &server.addresses {
        for address in addresses {
            println!("Addr   : {} (v{}, {})", address.addr, address.version, network);
        }
    }

    println!();
    for kind in ActionKind::ALL {
        match controller.action_permitted(kind) {
            Ok(()) => println!("{:<7}: allowed", kind.label()),
            Err(rejection) => println!("{:<7}: {}", kind.label(), rejection),
        }
    }
    Ok(())
}

async fn run_action(controller: &Controller<ConohaClient>, kind: ActionKind) -> Result<()> {
    match controller.execute(kind).await {
        ExecuteResult::Completed { no_op, server } => {
            if no_op {
                println!(
                    "✓ {}: server was already in the requested state ({})",
                    kind, server.status
                );
            } else {
                println!("✓ {} complete: server is {}", kind, server.status);
            }
            Ok(())
        }
        ExecuteResult::Pending { no_op, last_seen } => {
            if no_op {
                println!("✓ {}: server already in the requested state", kind);
            } else {
                match last_seen.and_then(|s| s.task_state) {
                    Some(task) => println!(
                        "… {} accepted; server still settling (task: {}). Check `vpsctl status` later.",
                        kind, task
                    ),
                    None => println!(
                        "… {} accepted; not waiting for the server to settle.",
                        kind
                    ),
                }
            }
            Ok(())
        }
        ExecuteResult::Refused(rejection) => bail!("{} refused: {}", kind, rejection),
        ExecuteResult::Rejected { status, detail } => {
            if detail.is_empty() {
                bail!("{} rejected by provider (status {})", kind, status)
            } else {
                bail!("{} rejected by provider (status {}): {}", kind, status, detail)
            }
        }
        ExecuteResult::Transient { detail } => {
            bail!("{} failed: {} (safe to retry)", kind, detail)
        }
        ExecuteResult::AuthFailed { status } => {
            bail!(
                "{} failed: provider kept rejecting our token (status {}); check credentials",
                kind,
                status
            )
        }
    }
}
