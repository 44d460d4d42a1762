//! `passvault escrow-keygen`: create the recovery keypair.
//!
//! The secret half goes to a new 0600 file for the recovery operator.
//! The public half is printed for `escrow_public_key` in `.passvault.toml`.

use std::path::Path;

use crate::cli::output;
use crate::crypto::keyfile::write_secret_file;
use crate::crypto::EscrowKeyPair;
use crate::errors::Result;

/// Execute the `escrow-keygen` command.
pub fn execute(out: &str) -> Result<()> {
    let pair = EscrowKeyPair::generate();
    write_secret_file(Path::new(out), pair.secret_bytes().as_slice())?;

    output::success(&format!("Escrow secret key written to {out}"));
    output::info("Public key (add to .passvault.toml as escrow_public_key):");
    println!("{}", pair.public_key().to_base64());
    output::tip("Keep the secret key off client machines.");
    Ok(())
}
