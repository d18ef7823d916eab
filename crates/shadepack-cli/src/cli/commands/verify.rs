//! `shadepack verify` - check a detached signature against its artifact.

use shadepack_core::signing::signature_path;
use shadepack_core::verify_signature;

use crate::cli::args::VerifyArgs;
use crate::exit_codes::{EXIT_CONFIG_ERROR, EXIT_SUCCESS, EXIT_VERIFY_FAILED};

pub fn run(args: VerifyArgs) -> i32 {
    let signature = args
        .signature
        .unwrap_or_else(|| signature_path(&args.artifact));

    match verify_signature(&args.artifact, &signature, &args.public_key) {
        Ok(verified) => {
            println!("OK: {}", args.artifact.display());
            println!("key_id: {}", verified.key_id);
            println!("{}", verified.digest);
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("FAILED: {}", e);
            let code = e.exit_code();
            debug_assert!(code == EXIT_CONFIG_ERROR || code == EXIT_VERIFY_FAILED);
            code
        }
    }
}
