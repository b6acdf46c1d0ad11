//! `sealed-post`: send one JSON document through the secure dispatcher.
//!
//! Reads a JSON body from stdin (empty input sends a bodiless `GET`), prints
//! the opened response to stdout.
//!
//! Startup sequence:
//! 1. Load and validate [`ClientConfig`] from environment variables.
//! 2. Initialise telemetry (JSON logs, optional OTLP export).
//! 3. Resolve the version token, load the public key, generate the session key.
//! 4. Read the request body from stdin.
//! 5. Dispatch, cancelling on Ctrl-C, and print the result.

use anyhow::{Context, Result};
use sealed_client::dispatch::ReqwestTransport;
use sealed_client::{ClientConfig, DispatchError, ResponsePayload, SecureDispatcher, SecureRequest};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = ClientConfig::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    sealed_client::telemetry::init_telemetry("sealed-client", cfg.otlp_endpoint(), &cfg.log_level)?;

    // -----------------------------------------------------------------------
    // 3. Encryption context
    // -----------------------------------------------------------------------
    let encryption = cfg.encryption()?;
    let session = cfg.session();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %cfg.endpoint_url,
        trace_id = %session.trace_id,
        sealed = encryption.is_some(),
        "sealed-post starting"
    );
    let dispatcher = SecureDispatcher::new(ReqwestTransport::new(), session, encryption);

    // -----------------------------------------------------------------------
    // 4. Request body
    // -----------------------------------------------------------------------
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read request body from stdin")?;

    let mut request = if input.trim().is_empty() {
        SecureRequest::get(&cfg.endpoint_url)
    } else {
        let body = serde_json::from_str(&input).context("stdin is not valid JSON")?;
        SecureRequest::post(&cfg.endpoint_url, body)
    };
    request = request.framing(cfg.framing);
    if let Some(limit) = cfg.deadline() {
        request = request.deadline(limit);
    }

    // -----------------------------------------------------------------------
    // 5. Dispatch
    // -----------------------------------------------------------------------
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = dispatcher.dispatch(request.cancel_token(cancel)).await;
    sealed_client::telemetry::shutdown_telemetry();

    match outcome {
        Ok(ResponsePayload::Json(value)) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Ok(ResponsePayload::Raw(body)) => {
            println!("{body}");
            Ok(())
        }
        Err(DispatchError::Network(report)) => {
            eprintln!("{}", serde_json::to_string_pretty(&report)?);
            anyhow::bail!("request failed with status {}", report.status)
        }
        Err(e) => Err(e.into()),
    }
}
