//! Create the server key pair artifacts

use colored::Colorize;

use crate::config::{generate_keypair_files, Settings};
use crate::crypto::public_key_fingerprint;
use crate::error::Result;

pub fn run(settings: &Settings, force: bool) -> Result<()> {
    let paths = settings.key_paths();

    if force && paths.exist() {
        println!(
            "{} Replacing the existing key pair. Every client needs the new public key.",
            "Warning:".yellow().bold()
        );
    }

    print!("{}", "Generating RSA-2048 key pair... ".cyan());
    std::io::Write::flush(&mut std::io::stdout())?;
    let keypair = generate_keypair_files(&paths, force)?;
    println!("{}", "done".green());

    println!();
    println!("{} {}", "Private key:".bold(), paths.private_key.display());
    println!("{} {}", "Public key: ".bold(), paths.public_key.display());
    println!(
        "{} {}",
        "Fingerprint:".bold(),
        public_key_fingerprint(keypair.public_key_pem())?
    );
    println!();
    println!(
        "Copy {} to every machine that will send files.",
        paths.public_key.display().to_string().cyan()
    );

    Ok(())
}
