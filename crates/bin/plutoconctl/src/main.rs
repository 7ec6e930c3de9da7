//! # plutoconctl — Plutocon beacon tool
//!
//! Composition root that wires the btleplug transport into a session,
//! prints the beacon's properties and applies the configured edits.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the tracing subscriber
//! - Open the BLE adapter and construct the session
//! - Pump transport events into the session until it is done
//! - Handle Ctrl-C by disconnecting cleanly
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no protocol logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context as _;
use plutocon_adapter_ble::BtleplugTransport;
use plutocon_app::Session;
use plutocon_app::event_bus::InProcessEventBus;
use plutocon_app::ports::{DisconnectReason, SessionEvent, SessionObserver, Transport};
use plutocon_app::session::Editor;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, EditConfig};

/// Outcome of one edit write, forwarded from the session callback.
struct EditResult {
    characteristic: String,
    error: Option<String>,
    is_last: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let (transport, mut link_events) = BtleplugTransport::new(config.ble.clone())
        .await
        .context("failed to open BLE adapter")?;

    let bus = Arc::new(InProcessEventBus::new(64));
    let mut session_events = bus.subscribe();
    let mut session = Session::new(config.device.address.clone(), transport, bus);
    let (edit_tx, mut edit_results) = mpsc::unbounded_channel();

    session.connect().context("failed to start connecting")?;
    tracing::info!(address = %config.device.address, "connecting to beacon");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut interrupted = false;
    let mut failure = None;

    loop {
        tokio::select! {
            Some(event) = link_events.recv() => session.handle_event(event),
            event = session_events.recv() => match event {
                Ok(SessionEvent::Connected(identity)) => {
                    tracing::info!(name = ?identity.name, "beacon ready");
                    println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
                    if config.edit.is_empty() {
                        session.disconnect()?;
                    } else if let Err(err) = apply_edits(&mut session, &config.edit, edit_tx.clone()) {
                        tracing::error!("{err:#}");
                        failure = Some(err);
                        session.disconnect()?;
                    }
                }
                Ok(SessionEvent::Disconnected { reason: DisconnectReason::LinkDown }) => break,
                Ok(SessionEvent::Disconnected { reason: DisconnectReason::Failed { cause } }) => {
                    anyhow::bail!("connection failed: {cause}");
                }
                Ok(SessionEvent::StateChanged { from, to }) => {
                    tracing::debug!(%from, %to, "state changed");
                }
                Ok(SessionEvent::SignalStrength(rssi)) => tracing::info!(rssi, "signal strength"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(result) = edit_results.recv() => {
                match &result.error {
                    None => tracing::info!(characteristic = %result.characteristic, "written"),
                    Some(err) => tracing::warn!(characteristic = %result.characteristic, %err, "write failed"),
                }
                if result.is_last {
                    session.disconnect()?;
                }
            }
            _ = &mut shutdown, if !interrupted => {
                interrupted = true;
                tracing::info!("interrupted");
                if !session.is_connected() {
                    break;
                }
                session.disconnect()?;
            }
        }
    }

    match failure {
        Some(err) => Err(err),
        None => {
            tracing::info!("done");
            Ok(())
        }
    }
}

/// Queue every configured write as one batch.
fn apply_edits<T, O>(
    session: &mut Session<T, O>,
    edit: &EditConfig,
    results: mpsc::UnboundedSender<EditResult>,
) -> anyhow::Result<()>
where
    T: Transport,
    O: SessionObserver,
{
    let mut editor: Editor<'_, T, O> = session.editor()?;
    if let Some(name) = &edit.name {
        editor = editor.device_name(name);
    }
    if let Some(major) = edit.major {
        editor = editor.major(major);
    }
    if let Some(minor) = edit.minor {
        editor = editor.minor(minor);
    }
    if let Some(interval) = edit.advertising_interval {
        editor = editor.advertising_interval(interval);
    }
    if let Some(power) = edit.broadcasting_power {
        editor = editor.broadcasting_power(power);
    }
    if let Some((latitude, longitude)) = edit.coordinates() {
        editor = editor.coordinates(latitude, longitude);
    }

    let progress = editor
        .on_operation_complete(move |outcome| {
            let result = EditResult {
                characteristic: outcome.characteristic.to_string(),
                error: outcome.result.as_ref().err().map(ToString::to_string),
                is_last: outcome.is_last,
            };
            if results.send(result).is_err() {
                tracing::trace!("edit result receiver dropped");
            }
        })
        .commit()
        .context("failed to apply edits")?;
    tracing::info!(?progress, "edits committed");
    Ok(())
}
