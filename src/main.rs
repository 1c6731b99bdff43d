// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `verify-token` - verify a Supabase access token from the command line.
//!
//! Reads the token from the first argument, or from stdin when no argument is
//! given, and prints the verified claims as JSON. Exit codes:
//!
//! - `0` - token accepted
//! - `1` - token rejected
//! - `2` - configuration or usage error

use std::process::ExitCode;

use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

use supabase_token_verifier::auth::{extract_subject_unsafe, TokenVerifier};
use supabase_token_verifier::config::AuthSettings;
use supabase_token_verifier::logging::{init_tracing, LogFormat};

const EXIT_REJECTED: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());

    let settings = match AuthSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let verifier = match TokenVerifier::from_settings(&settings) {
        Ok(verifier) => verifier,
        Err(e) => {
            error!(error = %e, "Failed to build JWKS client");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let token = match read_token().await {
        Ok(token) if !token.is_empty() => token,
        Ok(_) => {
            error!("No token given; pass it as an argument or on stdin");
            return ExitCode::from(EXIT_USAGE);
        }
        Err(e) => {
            error!(error = %e, "Failed to read token from stdin");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match verifier.verify_with_path(&token).await {
        Ok(verified) => {
            info!(algorithm = ?verified.algorithm, "Token accepted");
            match serde_json::to_string_pretty(&verified.claims) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!(error = %e, "Failed to encode claims");
                    ExitCode::from(EXIT_REJECTED)
                }
            }
        }
        Err(e) => {
            warn!(
                error_code = e.error_code(),
                error = %e,
                subject = extract_subject_unsafe(&token).as_deref().unwrap_or("-"),
                "Token rejected"
            );
            println!("authentication failed");
            ExitCode::from(EXIT_REJECTED)
        }
    }
}

async fn read_token() -> std::io::Result<String> {
    if let Some(token) = std::env::args().nth(1) {
        return Ok(token.trim().to_string());
    }

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    Ok(input.trim().to_string())
}
