//! # homesyncd
//!
//! Composition root that wires the broker link, transport session, device
//! registry, reconciler and command dispatcher together, then runs an
//! operator console on stdin.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise logging
//! - Construct the broker link (MQTT or virtual)
//! - Construct application services, injecting the link via port traits
//! - Connect, reconcile inbound status, dispatch console commands
//! - Handle graceful shutdown (Ctrl-C, `quit`, end of input)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;
mod console;

use std::sync::Arc;

use chrono::Timelike;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use homesync_adapter_mqtt::RumqttLink;
use homesync_adapter_virtual::VirtualBroker;
use homesync_app::dispatcher::{CommandDispatcher, Dispatch};
use homesync_app::insights;
use homesync_app::ports::BrokerLink;
use homesync_app::reconciler::StateReconciler;
use homesync_app::registry::DeviceRegistry;
use homesync_app::session::TransportSession;
use homesync_domain::time::now;

use crate::config::{Config, TransportKind};
use crate::console::ConsoleCommand;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let fleet = config.fleet()?;
    let registry = Arc::new(DeviceRegistry::new(fleet.clone())?);
    tracing::info!(
        devices = registry.len(),
        transport = ?config.transport.kind,
        root = %config.session.topic_root,
        "starting homesyncd"
    );

    match config.transport.kind {
        TransportKind::Mqtt => run(RumqttLink::new(config.mqtt.clone()), &config, registry).await,
        TransportKind::Virtual => {
            let broker = VirtualBroker::new(config.namespace(), &fleet);
            run(broker, &config, registry).await
        }
    }
}

async fn run<L: BrokerLink + 'static>(
    link: L,
    config: &Config,
    registry: Arc<DeviceRegistry>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Arc::new(TransportSession::new(link, config.session_config()));

    // Subscribe before connecting so retained status is not missed.
    let reconciler = StateReconciler::new(Arc::clone(&registry), config.namespace());
    let reconciler_task = reconciler.spawn(session.subscribe());

    registry.subscribe(|device| {
        tracing::info!(
            device_id = %device.id,
            name = %device.name,
            status = %device.status,
            "device state changed"
        );
    });

    let dispatcher = CommandDispatcher::new(
        Arc::clone(&session),
        Arc::clone(&registry),
        config.namespace(),
    )
    .with_optimistic_updates(config.session.optimistic_updates);

    if !session.connect().await {
        tracing::warn!("broker unavailable; type `connect` to retry");
    }
    println!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("end of input");
                    break;
                };
                match console::parse(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => execute(command, &session, &registry, &dispatcher).await,
                    Ok(None) => {}
                    Err(err) => println!("{err}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    session.disconnect().await;
    reconciler_task.abort();
    Ok(())
}

async fn execute<L: BrokerLink>(
    command: ConsoleCommand,
    session: &Arc<TransportSession<L>>,
    registry: &DeviceRegistry,
    dispatcher: &CommandDispatcher<Arc<TransportSession<L>>>,
) {
    match command {
        ConsoleCommand::List => {
            for device in registry.list() {
                println!(
                    "{:>4}  {:<20} {:<16} {:<6} {:?}",
                    device.id,
                    device.name,
                    device.room,
                    device.status,
                    device.attributes
                );
            }
        }
        ConsoleCommand::Rooms => {
            for (room, devices) in registry.by_room() {
                let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
                println!("{room}: {}", names.join(", "));
            }
        }
        ConsoleCommand::Status => {
            println!(
                "{} ({} of {} devices reachable)",
                session.state(),
                registry.connected_count(),
                registry.len()
            );
        }
        ConsoleCommand::Energy => {
            let summary = insights::summarize(&registry.list(), now().hour());
            println!(
                "{} devices on, {} W, {:?} tariff, {:.2} per hour",
                summary.active_devices, summary.active_watts, summary.band, summary.hourly_cost
            );
        }
        ConsoleCommand::Insights { weather, solar } => {
            let advice = insights::generate(&registry.list(), &weather, &solar, now().hour());
            if advice.is_empty() {
                println!("no recommendations");
            }
            for insight in advice {
                println!(
                    "[{:?}] {} ({:.0}% confident, saves ~{}): {}",
                    insight.priority,
                    insight.title,
                    insight.confidence * 100.0,
                    insight.estimated_savings,
                    insight.description
                );
            }
        }
        ConsoleCommand::Toggle(device_id) => match dispatcher.toggle(&device_id).await {
            Ok(outcome) => report(outcome),
            Err(err) => println!("{err}"),
        },
        ConsoleCommand::Send {
            device_id,
            action,
            value,
        } => {
            let Some(device) = registry.get(&device_id) else {
                println!("device {device_id} not found");
                return;
            };
            match dispatcher
                .send_command(&device_id, device.kind(), action, value)
                .await
            {
                Ok(outcome) => report(outcome),
                Err(err) => println!("rejected: {err}"),
            }
        }
        ConsoleCommand::Connect => {
            if !session.connect().await {
                println!("connection failed");
            }
        }
        ConsoleCommand::Disconnect => session.disconnect().await,
        ConsoleCommand::Help => println!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
}

fn report(outcome: Dispatch) {
    match outcome {
        Dispatch::Sent => println!("sent"),
        Dispatch::NotConnected => println!("not connected; command dropped"),
        Dispatch::LinkFailed => println!("broker rejected the command"),
    }
}
