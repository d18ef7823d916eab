use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Artifact to verify
    #[arg(long)]
    pub artifact: PathBuf,

    /// Signature file (defaults to <artifact>.sig)
    #[arg(long)]
    pub signature: Option<PathBuf>,

    /// SPKI PEM public key
    #[arg(long = "public-key")]
    pub public_key: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct KeygenArgs {
    /// Output directory for keypair files
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// Force overwrite existing files
    #[arg(long, short)]
    pub force: bool,
}
