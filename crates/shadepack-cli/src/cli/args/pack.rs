use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct PackArgs {
    /// Config file (defaults to ./shadepack.yaml when present)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Archive base name (required without a config file)
    #[arg(long)]
    pub name: Option<String>,

    /// Archive version (required without a config file)
    #[arg(long = "artifact-version", value_name = "VERSION")]
    pub artifact_version: Option<String>,

    #[arg(long)]
    pub classifier: Option<String>,

    /// Origin directory or jar; repeat in dependency order (replaces config origins)
    #[arg(long = "origin", value_name = "PATH")]
    pub origins: Vec<PathBuf>,

    /// Exclude glob; repeatable (replaces config patterns)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,

    /// SRG mapping file
    #[arg(long)]
    pub mapping: Option<PathBuf>,

    /// PKCS#8 PEM ed25519 private key
    #[arg(long = "sign-key", env = "SHADEPACK_SIGN_KEY")]
    pub sign_key: Option<PathBuf>,

    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Keep the first service descriptor instead of merging
    #[arg(long)]
    pub no_merge_service_files: bool,
}
