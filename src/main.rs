//! pixelbridge - Main Entry Point
//!
//! Reads Open Pixel Control messages from stdin and drives the first
//! configured device with them.
//!
//! Usage: `pixelbridge [CONFIG]`. Without an argument the default config
//! path is used.

use anyhow::{anyhow, Context};
use crossbeam_channel::{bounded, select, tick};
use pixelbridge::{
    config::{default_config_path, BridgeConfig},
    device::{DeviceRegistry, TransferEvent},
    logging,
    opc::{OpcMessage, OpcReader},
    transport::TracingTransport,
};
use std::path::PathBuf;

/// Messages buffered between the stdin reader and the device
const MESSAGE_QUEUE_DEPTH: usize = 4;

fn main() -> anyhow::Result<()> {
    let config_path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => default_config_path().ok_or_else(|| anyhow!("Could not determine config path"))?,
    };
    let config = BridgeConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let _log_guard = logging::init_logging(&config.logging)?;
    tracing::info!("Starting pixelbridge with {:?}", config_path);

    if config.devices.len() > 1 {
        tracing::warn!(
            "{} devices configured; only the first is driven",
            config.devices.len()
        );
    }
    let device_config = &config.devices[0];

    let registry = DeviceRegistry::with_builtin();
    let mut device = registry.create(device_config, Box::new(TracingTransport::new()))?;
    if device.load_mapping(&device_config.map).is_err() {
        tracing::warn!(device = device.name(), "Continuing without a mapping");
    }
    device.open()?;

    let (msg_tx, msg_rx) = bounded::<OpcMessage>(MESSAGE_QUEUE_DEPTH);
    // Detached: a blocked stdin read must not hold up shutdown
    let _reader = std::thread::Builder::new()
        .name("opc-reader".to_string())
        .spawn(move || {
            let stdin = std::io::stdin().lock();
            for message in OpcReader::new(stdin) {
                match message {
                    Ok(message) => {
                        if msg_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("OPC stream error: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("OPC input closed");
        })
        .context("spawning OPC reader")?;

    let events = device.events();
    let flush_tick = tick(device_config.flush_interval());

    loop {
        select! {
            recv(msg_rx) -> message => match message {
                Ok(message) => {
                    if let Err(e) = device.write_message(&message) {
                        tracing::debug!("Dropped message: {}", e);
                    }
                }
                Err(_) => break,
            },
            recv(flush_tick) -> _ => {
                device.flush();
            },
            recv(events) -> event => match event {
                Ok(TransferEvent::TransportFailed { sequence, error }) => {
                    tracing::warn!(sequence, "Frame not delivered: {}", error);
                }
                Ok(TransferEvent::FrameSent { sequence, channels, duration }) => {
                    tracing::trace!(sequence, channels, ?duration, "Frame sent");
                }
                Ok(TransferEvent::Stopped) | Err(_) => break,
            },
        }
    }

    device.close()?;

    let description = device.describe();
    tracing::info!(
        sent = description.stats.frames_sent,
        failed = description.stats.frames_failed,
        avg_us = description.stats.avg_transfer_time_us(),
        jitter_us = description.stats.jitter_us(),
        "Transfer summary"
    );
    match serde_json::to_string_pretty(&description) {
        Ok(json) => tracing::info!("Final device state:\n{}", json),
        Err(e) => tracing::warn!("Failed to serialize device state: {}", e),
    }

    Ok(())
}
