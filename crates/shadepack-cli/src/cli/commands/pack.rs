//! `shadepack pack` - run the packaging pipeline.

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::debug;

use shadepack_core::config::CONFIG_FILE_NAME;
use shadepack_core::{PackConfig, PackError, PackagedArtifact, Pipeline, SignOutcome, Stage};

use crate::cli::args::PackArgs;
use crate::exit_codes::{EXIT_CONFIG_ERROR, EXIT_PIPELINE_FAILED, EXIT_SUCCESS};

pub fn run(args: PackArgs) -> Result<i32> {
    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(EXIT_CONFIG_ERROR);
        }
    };

    debug!(
        artifact = %config.archive_path().display(),
        origins = config.origins.len(),
        signing = config.signing_key.is_some(),
        "resolved configuration"
    );

    let result = Pipeline::from_config(&config).and_then(|pipeline| pipeline.run());
    match result {
        Ok(artifact) => {
            print_summary(&artifact);
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            report(&e);
            Ok(exit_code_for(&e))
        }
    }
}

/// Config file (explicit or `./shadepack.yaml`) with CLI overrides applied.
fn resolve_config(args: &PackArgs) -> Result<PackConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(CONFIG_FILE_NAME)).filter(|p| p.exists()),
    };

    let mut config = match (path, &args.name, &args.artifact_version) {
        (Some(path), _, _) => PackConfig::from_file(&path)?,
        (None, Some(name), Some(version)) => PackConfig::new(name, version),
        (None, _, _) => bail!(
            "no {} found; pass --config, or --name and --artifact-version",
            CONFIG_FILE_NAME
        ),
    };
    apply_overrides(&mut config, args);
    Ok(config)
}

fn apply_overrides(config: &mut PackConfig, args: &PackArgs) {
    if let Some(name) = &args.name {
        config.name = name.clone();
    }
    if let Some(version) = &args.artifact_version {
        config.version = version.clone();
    }
    if let Some(classifier) = &args.classifier {
        config.classifier = classifier.clone();
    }
    if !args.origins.is_empty() {
        config.origins = args.origins.clone();
    }
    if !args.excludes.is_empty() {
        config.exclude_patterns = args.excludes.clone();
    }
    if let Some(mapping) = &args.mapping {
        config.mapping = Some(mapping.clone());
    }
    if let Some(key) = &args.sign_key {
        config.signing_key = Some(key.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.no_merge_service_files {
        config.merge_service_files = false;
    }
}

fn print_summary(artifact: &PackagedArtifact) {
    println!("artifact: {}", artifact.path.display());
    println!("{}", artifact.digest);
    match &artifact.signature {
        SignOutcome::Signed {
            signature_path,
            key_id,
        } => println!("signature: {} (key_id: {})", signature_path.display(), key_id),
        SignOutcome::Skipped => println!("signature: skipped (no signing key configured)"),
    }
}

/// Configuration problems are usage errors; everything else is a stage failure.
fn exit_code_for(e: &PackError) -> i32 {
    match e.stage() {
        Stage::Configure => EXIT_CONFIG_ERROR,
        _ => EXIT_PIPELINE_FAILED,
    }
}

fn report(e: &PackError) {
    eprintln!("error: {} stage failed: {}", e.stage(), e);
    if let Some(hint) = hint_for(e) {
        eprintln!("hint: {}", hint);
    }
}

fn hint_for(e: &PackError) -> Option<String> {
    match e {
        PackError::Signing { .. } => {
            Some("check --sign-key / signing_key points at a PKCS#8 PEM ed25519 key".into())
        }
        PackError::Collection { .. } => e
            .origin()
            .map(|o| format!("check that origin '{}' exists and is readable", o)),
        PackError::Mapping { path, .. } => Some(format!(
            "mapping lines must be CL:/FD:/MD:/PK: records ({})",
            path.display()
        )),
        _ => None,
    }
}
