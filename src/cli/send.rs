//! Send one file to a running server

use std::path::Path;
use std::sync::Arc;

use colored::Colorize;

use crate::config::Settings;
use crate::error::Result;
use crate::sink::LogFacadeSink;
use crate::transfer::TransferClient;

use super::runtime;

pub fn run(settings: &Settings, file_path: &Path) -> Result<()> {
    let client = TransferClient::from_settings(settings, Arc::new(LogFacadeSink))?;

    println!(
        "{} {} {} {}",
        "Sending".cyan(),
        file_path.display().to_string().bold(),
        "to".cyan(),
        client.server_addr()
    );

    let report = runtime()?.block_on(client.send_file(file_path))?;

    println!(
        "{} '{}' sent ({} bytes, {} bytes on the wire).",
        "Done:".green().bold(),
        report.filename,
        report.plaintext_len,
        report.payload_len
    );
    println!(
        "{}",
        "The server does not acknowledge receipt; check its log to confirm.".dimmed()
    );

    Ok(())
}
