//! Show the server public key

use colored::Colorize;

use crate::config::{read_public_key, Settings};
use crate::crypto::public_key_fingerprint;
use crate::error::Result;

use super::print_key_block;

pub fn run(settings: &Settings) -> Result<()> {
    let public_key = read_public_key(&settings.public_key_path)?;
    let fingerprint = public_key_fingerprint(&public_key)?;

    println!();
    println!("{}", "Server public key:".cyan().bold());
    println!();
    print_key_block(&String::from_utf8_lossy(&public_key));
    println!("{} {}", "Fingerprint:".bold(), fingerprint);
    println!();
    println!(
        "Clients read it from {}.",
        settings.public_key_path.display().to_string().cyan()
    );
    println!();

    Ok(())
}
