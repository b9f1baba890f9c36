use chrono::Local;
use clap::Parser;
use fcm_rust::config::{ClientConfig, DEFAULT_CREDENTIALS_FILE};
use fcm_rust::{AppIdentity, CancellationToken, Client, ClientError};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

// Registers (once) and prints every push that arrives.
//
// Usage:
//   cargo run -- --package com.example.app --sender-id 123456 --cert <sha1 hex>
//   RUST_LOG=debug cargo run -- ...           # includes MCS frames and HTTP exchanges

#[derive(Parser, Debug)]
#[command(name = "fcm-listen", about = "Receive FCM pushes as an emulated Android device")]
struct Args {
    /// Android package name of the app to receive pushes for.
    #[arg(long)]
    package: String,

    /// GCM sender id (project number).
    #[arg(long)]
    sender_id: String,

    /// Uppercase or lowercase hex SHA-1 of the app's signing certificate.
    #[arg(long)]
    cert: String,

    #[arg(long)]
    app_version: Option<String>,

    #[arg(short, long, default_value = DEFAULT_CREDENTIALS_FILE)]
    credentials: PathBuf,

    /// Seconds to wait before reconnecting after the connection drops.
    #[arg(long, default_value_t = 5)]
    reconnect_delay: u64,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to build tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run(args)) {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ClientError> {
    let mut app = AppIdentity::new(args.package, args.sender_id, args.cert.to_lowercase());
    if let Some(version) = args.app_version {
        app = app.with_app_version(version);
    }

    let mut client = Client::builder()
        .with_config(ClientConfig {
            credentials_path: args.credentials,
            app,
            ..Default::default()
        })
        .build()
        .await;

    client.on_connected(|| info!("Listening for pushes"));
    client.on_message(|msg| {
        info!(
            "New message {} in {}: {}",
            msg.message_id.as_deref().unwrap_or("?"),
            msg.conversation_id.as_deref().unwrap_or("?"),
            msg.message_body.as_deref().unwrap_or("")
        );
    });
    client.on_nonconversational_message(|msg| info!("Nonconversational message, imei={}", msg.imei));
    client.on_device_account_update(|update| info!("Device account update: {}", update.data.get()));
    client.on_error(|e| warn!("Unrecognized push: {e}"));
    client.on_disconnected(|reason| info!("Disconnected: {reason}"));

    let token = client.register().await?;
    info!("FCM token: {token}");

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            ctrl_c.cancel();
        }
    });

    let delay = Duration::from_secs(args.reconnect_delay);
    while !cancel.is_cancelled() {
        match client.listen(&cancel).await {
            Ok(()) => break,
            Err(ClientError::Session(e)) if e.is_fatal_protocol() => return Err(e.into()),
            Err(e) => warn!("Connection lost: {e}. Reconnecting in {}s", delay.as_secs()),
        }
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
    Ok(())
}
