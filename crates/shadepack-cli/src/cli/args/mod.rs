use clap::{Parser, Subcommand};

pub mod pack;
pub mod signing;
pub use pack::*;
pub use signing::*;

#[derive(Parser)]
#[command(
    name = "shadepack",
    version,
    about = "Reproducible shaded-jar packaging with symbol remapping, digests and detached signatures"
)]
pub struct Cli {
    /// Debug-level logging (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build, digest and optionally sign the artifact
    Pack(PackArgs),
    /// Verify a detached signature against an artifact
    Verify(VerifyArgs),
    /// Generate an ed25519 keypair for signing
    Keygen(KeygenArgs),
    Version,
}
