//! Status example
//!
//! Reads the full status of a lock and prints it.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use ulrust::{BleTransport, Credentials, Lock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let address = std::env::var("LOCK_ADDRESS").context("LOCK_ADDRESS is not set")?;
    let password = std::env::var("LOCK_PASSWORD").context("LOCK_PASSWORD is not set")?;
    let uid = std::env::var("LOCK_UID")
        .unwrap_or_else(|_| "1".to_string())
        .parse::<u32>()
        .context("LOCK_UID is not a number")?;

    let transport = Arc::new(BleTransport::new().await?);

    let lock = Lock::new(address, Credentials::new(uid, password)?, transport)
        .with_model(std::env::var("LOCK_MODEL").unwrap_or_default())
        .with_wakeup_receiver(std::env::var("LOCK_WAKEUP").ok());

    println!("Lock: {}", lock);
    println!("Model: {:?}", lock.model());
    println!("Capabilities: {:?}", lock.capabilities());

    let status = lock.update_status().await?;

    println!("{}", status);
    if let Some(serial) = &status.serial_number {
        println!("Serial number: {}", serial);
    }
    if let Some(seconds) = status.autolock_seconds {
        println!("Auto-lock: {}s", seconds);
    }
    if let Some(clock) = status.calendar {
        println!("Lock clock: {}", clock);
    }

    Ok(())
}
