//! Simulated field device.
//!
//! Run with: `cargo run --example device [server-addr] [alias]`
//!
//! Registers, reads a few tags, greets the other cars and reports parked
//! shortly after each round starts.

use carlink::prelude::*;
use std::net::SocketAddr;
use std::time::Duration;

const ROUTE: [TagSerial; 3] = [
    [0x04, 0xA1, 0x22, 0x10],
    [0x04, 0xA1, 0x22, 0x12],
    [0x04, 0xB7, 0x31, 0x02],
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let server: SocketAddr = args.next().as_deref().unwrap_or("127.0.0.1:5000").parse()?;
    let wanted = match args.next() {
        Some(text) => u8::from_str_radix(text.trim_start_matches("0x"), 16)?,
        None => 0x20,
    };

    let mut device = DeviceClient::builder(server)
        .retry(RetryPolicy::default().max_attempts(0))
        .connect_with_retry()
        .await?;

    if !device.register(wanted).await? {
        println!("[Device] Alias 0x{wanted:02X} is taken");
        device.close().await?;
        return Ok(());
    }
    println!("[Device] Registered as 0x{wanted:02X}");

    for serial in ROUTE {
        let record = device.request_rfid(serial).await?;
        println!("[Device] Tag {record}");
    }

    device.broadcast(format!("hello from 0x{wanted:02X}")).await?;

    loop {
        let message = tokio::select! {
            message = device.recv() => message?,
            _ = tokio::signal::ctrl_c() => break,
        };

        match message.kind {
            MessageType::RoundStart => {
                println!("[Device] Round started");
                tokio::time::sleep(Duration::from_secs(3)).await;
                device.round_complete().await?;
                println!("[Device] Parked");
            }
            MessageType::RoundEnd => println!("[Device] Round ended"),
            MessageType::Custom => println!(
                "[Device] From 0x{:02X}: {}",
                message.id,
                String::from_utf8_lossy(message.payload())
            ),
            MessageType::CustomBroadcast => println!(
                "[Device] Operator: {}",
                String::from_utf8_lossy(message.payload())
            ),
            _ => println!("[Device] {message}"),
        }
    }

    device.close().await?;
    Ok(())
}
