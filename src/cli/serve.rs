//! Run the receiving server until Ctrl-C

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use crate::config::Settings;
use crate::crypto::public_key_fingerprint;
use crate::error::{Result, TransferError};
use crate::sink::LogFacadeSink;
use crate::transfer::TransferServer;

use super::runtime;

pub fn run(settings: &Settings, save_dir: Option<PathBuf>) -> Result<()> {
    let server = TransferServer::bootstrap(settings, Arc::new(LogFacadeSink))?;

    if let Ok(public_key) = std::fs::read(&settings.public_key_path) {
        if let Ok(fingerprint) = public_key_fingerprint(&public_key) {
            println!("{} {}", "Key fingerprint:".cyan(), fingerprint);
        }
    }
    println!(
        "{} {}",
        "Clients need:".cyan(),
        settings.public_key_path.display().to_string().bold()
    );

    let shown_dir = save_dir.clone().unwrap_or_else(|| settings.save_dir.clone());

    runtime()?.block_on(async {
        let addr = server.start(save_dir).await?;
        println!(
            "{} {} {} {}",
            "Receiving on".green().bold(),
            addr,
            "into".green().bold(),
            shown_dir.display()
        );
        println!("{}", "Press Ctrl-C to stop.".dimmed());

        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Could not listen for Ctrl-C: {}", e);
        }
        println!();
        server.stop().await;
        Ok::<(), TransferError>(())
    })
}
