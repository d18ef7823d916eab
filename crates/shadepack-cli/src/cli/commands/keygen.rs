//! `shadepack keygen` - write a fresh signing keypair.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use shadepack_core::ArtifactSigner;

use crate::cli::args::KeygenArgs;
use crate::exit_codes::EXIT_SUCCESS;

pub const PRIVATE_KEY_FILE: &str = "private_key.pem";
pub const PUBLIC_KEY_FILE: &str = "public_key.pem";

pub fn run(args: KeygenArgs) -> Result<i32> {
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create directory: {}", args.out.display()))?;

    let private_path = args.out.join(PRIVATE_KEY_FILE);
    let public_path = args.out.join(PUBLIC_KEY_FILE);
    if !args.force {
        if let Some(existing) = [&private_path, &public_path].into_iter().find(|p| p.exists()) {
            anyhow::bail!("{} already exists (use --force to overwrite)", existing.display());
        }
    }

    let signer = ArtifactSigner::generate()?;
    write_private_key(&private_path, &signer.private_key_pem()?)?;
    fs::write(&public_path, signer.public_key_pem()?)
        .with_context(|| format!("failed to write public key: {}", public_path.display()))?;

    println!("private key: {}", private_path.display());
    println!("public key:  {}", public_path.display());
    println!("key_id: {}", signer.key_id());
    Ok(EXIT_SUCCESS)
}

/// Owner-only on unix.
fn write_private_key(path: &Path, pem: &str) -> Result<()> {
    fs::write(path, pem)
        .with_context(|| format!("failed to write private key: {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict {}", path.display()))?;
    }
    Ok(())
}
