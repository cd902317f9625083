//! Shared harness for the end-to-end pairing scenarios.

use std::time::Duration;

use pact_crypto::Keypair;
use pact_pairing::{
    AuthcodeConfirmer, MemoryTransport, PairedChannel, Pairing, PairingConfig, PairingInfo,
};

pub type TestResult<T = ()> = anyhow::Result<T>;

/// Tracing for test visibility; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .try_init();
}

pub fn test_config(timeout_ms: u64) -> PairingConfig {
    PairingConfig {
        application_name: "pact-tests".into(),
        application_version: "1".into(),
        shard_id: "42".into(),
        timeout_ms,
    }
}

/// Drive a complete pairing over an in-memory bus, the responder first so
/// its subscription is live before message 1 is published.
pub async fn pair_over_bus(
    bus: &MemoryTransport,
    config: PairingConfig,
    responder_confirm: impl AuthcodeConfirmer + 'static,
    initiator_confirm: impl AuthcodeConfirmer + 'static,
) -> (
    Result<PairedChannel, pact_pairing::Error>,
    Result<PairedChannel, pact_pairing::Error>,
) {
    let (responder, info) = match Pairing::new_responder(config.clone(), Keypair::generate()) {
        Ok(v) => v,
        Err(e) => return (Err(e), Err(pact_pairing::Error::transport("setup failed"))),
    };
    pair_over_bus_with_info(bus, config, responder, info, responder_confirm, initiator_confirm)
        .await
}

/// Same as [`pair_over_bus`] but with a caller-controlled responder and
/// out-of-band info (lets tests corrupt the QR in transit).
pub async fn pair_over_bus_with_info(
    bus: &MemoryTransport,
    config: PairingConfig,
    responder: Pairing,
    info: PairingInfo,
    responder_confirm: impl AuthcodeConfirmer + 'static,
    initiator_confirm: impl AuthcodeConfirmer + 'static,
) -> (
    Result<PairedChannel, pact_pairing::Error>,
    Result<PairedChannel, pact_pairing::Error>,
) {
    let initiator = match Pairing::new_initiator(config, Keypair::generate(), info) {
        Ok(v) => v,
        Err(e) => return (Err(pact_pairing::Error::transport("setup failed")), Err(e)),
    };

    let bus_r = bus.clone();
    let responder_task = tokio::spawn(async move {
        responder
            .execute(&bus_r, &bus_r, &responder_confirm)
            .await
    });
    tokio::time::sleep(Duration::from_millis(25)).await;
    let bus_i = bus.clone();
    let initiator_task = tokio::spawn(async move {
        initiator
            .execute(&bus_i, &bus_i, &initiator_confirm)
            .await
    });

    let initiator_outcome = initiator_task
        .await
        .unwrap_or_else(|e| Err(pact_pairing::Error::transport(e.to_string())));
    let responder_outcome = responder_task
        .await
        .unwrap_or_else(|e| Err(pact_pairing::Error::transport(e.to_string())));
    (responder_outcome, initiator_outcome)
}
