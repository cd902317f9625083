//! Loopback pairing demo: runs both sides of a device pairing over the
//! in-memory bus, prints the QR bootstrap and the shared authcode, then
//! exchanges a few messages on the resulting secure channel.
#![forbid(unsafe_code)]

use anyhow::{anyhow, Context};
use clap::Parser;
use pact_crypto::Keypair;
use pact_pairing::{AutoConfirm, MemoryTransport, PairedChannel, Pairing, PairingConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pact", about = "Device pairing secure-channel demo")]
struct Args {
    /// Application name (first content-topic segment)
    #[arg(long, default_value = "pact")]
    app_name: String,

    /// Application version (second content-topic segment)
    #[arg(long, default_value = "1")]
    app_version: String,

    /// Shard the pairing meets on
    #[arg(long, default_value = "0")]
    shard: String,

    /// Pairing timeout in milliseconds
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Messages to exchange per direction once paired
    #[arg(long, default_value_t = 4)]
    messages: usize,

    /// Decline the authcode on both sides (demonstrates the abort path)
    #[arg(long)]
    reject: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = PairingConfig {
        application_name: args.app_name,
        application_version: args.app_version,
        shard_id: args.shard,
        timeout_ms: args.timeout_ms,
    };

    let bus = MemoryTransport::new();
    let (responder, info) =
        Pairing::new_responder(config.clone(), Keypair::generate()).context("responder setup")?;

    println!("QR:              {}", info.qr.serialize());
    println!("QR nametag:      {}", hex::encode(info.qr_message_nametag));
    println!("content topic:   {}", info.qr.content_topic());

    let initiator = Pairing::new_initiator(config, Keypair::generate(), info)
        .context("initiator setup")?;

    let accept = !args.reject;
    let bus_r = bus.clone();
    let responder_task = tokio::spawn(async move {
        responder.execute(&bus_r, &bus_r, &AutoConfirm(accept)).await
    });
    // Let the responder subscribe before message 1 is published.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let bus_i = bus.clone();
    let initiator_task = tokio::spawn(async move {
        initiator.execute(&bus_i, &bus_i, &AutoConfirm(accept)).await
    });

    let alice = initiator_task.await?;
    let bob = responder_task.await?;
    if args.reject {
        println!("initiator abort: {}", unwrap_err(alice)?);
        println!("responder abort: {}", unwrap_err(bob)?);
        return Ok(());
    }

    let mut alice = alice.context("initiator pairing")?;
    let mut bob = bob.context("responder pairing")?;
    println!("authcode check:  both sides confirmed");
    println!("channel binding: h = {}", hex::encode(alice.handshake_hash()));

    exchange(&mut alice, &mut bob, args.messages)?;
    info!("demo finished");
    Ok(())
}

fn unwrap_err(
    outcome: Result<PairedChannel, pact_pairing::Error>,
) -> anyhow::Result<pact_pairing::Error> {
    match outcome {
        Ok(_) => Err(anyhow!("pairing unexpectedly succeeded")),
        Err(e) => Ok(e),
    }
}

fn exchange(
    alice: &mut PairedChannel,
    bob: &mut PairedChannel,
    rounds: usize,
) -> anyhow::Result<()> {
    for i in 0..rounds {
        let outbound = format!("ping {i}");
        let wire = alice.encode(outbound.as_bytes())?;
        let received = bob.decode(&wire)?;
        let reply = format!("pong {}", String::from_utf8_lossy(&received));
        let wire = bob.encode(reply.as_bytes())?;
        let received = alice.decode(&wire)?;
        println!("round {i}:         {}", String::from_utf8_lossy(&received));
    }
    Ok(())
}
