//! CLI command implementations

pub mod keygen;
pub mod pubkey;
pub mod send;
pub mod serve;

use colored::Colorize;

use crate::error::Result;

/// Multi-threaded runtime for commands that do network I/O
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}

/// Print a PEM block between rules
pub(crate) fn print_key_block(pem: &str) {
    println!("{}", "─".repeat(64).dimmed());
    print!("{}", pem);
    if !pem.ends_with('\n') {
        println!();
    }
    println!("{}", "─".repeat(64).dimmed());
}
