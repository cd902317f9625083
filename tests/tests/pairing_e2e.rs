// End-to-end pairing scenarios over the in-memory pub/sub bus: the happy
// path with sustained channel traffic, timeout, authcode rejection,
// tamper detection, message loss, and nonce exhaustion.

use async_trait::async_trait;
use rand::RngCore;
use std::time::Duration;

use pact_crypto::nonce::{Nonce, NONCE_MAX};
use pact_crypto::{Keypair, NoisePublicKey};
use pact_integration_tests::{init_tracing, pair_over_bus, pair_over_bus_with_info, test_config, TestResult};
use pact_pairing::{AutoConfirm, MemoryTransport, MessageReceiver, MessageSender, Pairing};
use pact_stream::nametag::MESSAGE_NAMETAG_BUFFER_SIZE;
use pact_stream::Handshake;

/// Ten times the nametag window, per direction.
const TRAFFIC_ROUNDS: usize = 10 * MESSAGE_NAMETAG_BUFFER_SIZE;

#[tokio::test]
async fn happy_path_pairing_with_sustained_traffic() -> TestResult {
    init_tracing();
    let bus = MemoryTransport::new();
    let (bob, alice) = pair_over_bus(
        &bus,
        test_config(10_000),
        AutoConfirm(true),
        AutoConfirm(true),
    )
    .await;
    let mut bob = bob?;
    let mut alice = alice?;

    assert_eq!(alice.handshake_hash(), bob.handshake_hash());
    assert_eq!(alice.content_topic(), bob.content_topic());

    let mut alice_sub = bus.subscribe(alice.content_topic()).await?;
    let mut bob_sub = bus.subscribe(bob.content_topic()).await?;
    let mut rng = rand::thread_rng();

    for round in 0..TRAFFIC_ROUNDS {
        // Alice -> Bob. Both subscriptions see the wire bytes; each side's
        // decoder silently drops what it cannot address (its own echoes).
        let mut data = [0u8; 32];
        rng.fill_bytes(&mut data);
        alice.send(&bus, &data).await?;
        assert_eq!(bob.recv(&mut bob_sub).await?, data, "round {round} a->b");

        // Bob -> Alice.
        let mut reply = [0u8; 32];
        rng.fill_bytes(&mut reply);
        bob.send(&bus, &reply).await?;
        assert_eq!(alice.recv(&mut alice_sub).await?, reply, "round {round} b->a");
    }
    Ok(())
}

#[tokio::test]
async fn initiator_times_out_without_a_peer() -> TestResult {
    init_tracing();
    let bus = MemoryTransport::new();
    // The responder mints the QR but never comes online.
    let (responder, info) = Pairing::new_responder(test_config(300), Keypair::generate())?;
    drop(responder);

    let initiator = Pairing::new_initiator(test_config(300), Keypair::generate(), info)?;
    let outcome = initiator.execute(&bus, &bus, &AutoConfirm(true)).await;
    assert!(matches!(outcome, Err(pact_pairing::Error::PairingTimeout)));
    Ok(())
}

#[tokio::test]
async fn authcode_rejection_aborts_both_sides() -> TestResult {
    init_tracing();
    let bus = MemoryTransport::new();
    let (bob, alice) = pair_over_bus(
        &bus,
        test_config(5_000),
        AutoConfirm(false),
        AutoConfirm(false),
    )
    .await;
    assert!(matches!(bob, Err(pact_pairing::Error::AuthcodeRejected)));
    assert!(matches!(alice, Err(pact_pairing::Error::AuthcodeRejected)));
    Ok(())
}

#[tokio::test]
async fn one_sided_rejection_strands_the_peer() -> TestResult {
    init_tracing();
    let bus = MemoryTransport::new();
    // The initiator declines; the responder keeps waiting for message 3
    // until its own deadline fires.
    let (bob, alice) = pair_over_bus(
        &bus,
        test_config(1_200),
        AutoConfirm(true),
        AutoConfirm(false),
    )
    .await;
    assert!(matches!(alice, Err(pact_pairing::Error::AuthcodeRejected)));
    assert!(matches!(bob, Err(pact_pairing::Error::PairingTimeout)));
    Ok(())
}

#[tokio::test]
async fn corrupted_commitment_is_caught_before_the_authcode() -> TestResult {
    init_tracing();
    let bus = MemoryTransport::new();
    let (responder, mut info) = Pairing::new_responder(test_config(1_200), Keypair::generate())?;
    // The scanned commitment does not match what the responder will open.
    info.qr.committed_static_key[0] ^= 0x01;

    let (bob, alice) = pair_over_bus_with_info(
        &bus,
        test_config(1_200),
        responder,
        info,
        AutoConfirm(true),
        AutoConfirm(true),
    )
    .await;
    assert!(matches!(
        alice,
        Err(pact_pairing::Error::CommitmentMismatch)
    ));
    // The initiator aborts before message 3, leaving the responder waiting.
    assert!(matches!(bob, Err(pact_pairing::Error::PairingTimeout)));
    Ok(())
}

/// Sender wrapper that flips one ciphertext bit in everything it publishes.
struct TamperingSender(MemoryTransport);

#[async_trait]
impl MessageSender for TamperingSender {
    async fn send(&self, content_topic: &str, mut payload: Vec<u8>) -> pact_pairing::Result<()> {
        if let Some(last) = payload.last_mut() {
            *last ^= 0x01;
        }
        self.0.send(content_topic, payload).await
    }
}

#[tokio::test]
async fn tampered_wire_message_fails_authentication() -> TestResult {
    init_tracing();
    let bus = MemoryTransport::new();
    let (responder, info) = Pairing::new_responder(test_config(1_200), Keypair::generate())?;
    let initiator = Pairing::new_initiator(test_config(1_200), Keypair::generate(), info)?;

    // The responder's only transmission is message 2; every bit of it is
    // authenticated, so the initiator must reject the session outright.
    let tampering = TamperingSender(bus.clone());
    let bus_r = bus.clone();
    let bob = tokio::spawn(async move {
        responder
            .execute(&tampering, &bus_r, &AutoConfirm(true))
            .await
    });
    tokio::time::sleep(Duration::from_millis(25)).await;
    let bus_i = bus.clone();
    let alice = tokio::spawn(async move {
        initiator.execute(&bus_i, &bus_i, &AutoConfirm(true)).await
    });

    let alice = alice.await?;
    match alice {
        Err(pact_pairing::Error::Stream(pact_stream::Error::Crypto(
            pact_crypto::Error::AuthenticationFailure,
        ))) => {}
        other => panic!("expected authentication failure, got {other:?}"),
    }
    let bob = bob.await?;
    assert!(matches!(bob, Err(pact_pairing::Error::PairingTimeout)));
    Ok(())
}

#[tokio::test]
async fn dropped_message_is_detected_and_skippable() -> TestResult {
    init_tracing();
    let bus = MemoryTransport::new();
    let (bob, alice) = pair_over_bus(
        &bus,
        test_config(10_000),
        AutoConfirm(true),
        AutoConfirm(true),
    )
    .await;
    let mut bob = bob?;
    let mut alice = alice?;

    let m1 = alice.encode(b"message-1")?;
    let m2 = alice.encode(b"message-2")?;
    let m3 = alice.encode(b"message-3")?;

    // The transport lost m1; m2 arrives first.
    match bob.decode(&m2) {
        Err(pact_pairing::Error::Stream(pact_stream::Error::NametagOutOfOrder { skipped })) => {
            assert_eq!(skipped, 1);
            bob.skip_inbound(skipped);
        }
        other => panic!("expected out-of-order, got {other:?}"),
    }
    assert_eq!(bob.decode(&m2)?, b"message-2");
    assert_eq!(bob.decode(&m3)?, b"message-3");

    // A late copy of the abandoned message is no longer addressable.
    assert!(matches!(
        bob.decode(&m1),
        Err(pact_pairing::Error::Stream(
            pact_stream::Error::NametagNotFound
        ))
    ));
    Ok(())
}

#[test]
fn nonce_exhaustion_stops_the_channel() -> TestResult {
    // Stream-level channel so the cipher-state counters can be seeded.
    let bob_e = Keypair::generate();
    let pre = [NoisePublicKey::plaintext(bob_e.public())];
    let mut alice = Handshake::new(
        pact_crypto::pattern::WAKU_PAIRING,
        true,
        Some(Keypair::generate()),
        None,
        Vec::new(),
        &pre,
    )?;
    let mut bob = Handshake::new(
        pact_crypto::pattern::WAKU_PAIRING,
        false,
        Some(Keypair::generate()),
        Some(bob_e),
        Vec::new(),
        &pre,
    )?;

    let mut tag = [7u8; 16];
    while !alice.is_complete() {
        let (w, r) = if alice.is_writing() {
            (&mut alice, &mut bob)
        } else {
            (&mut bob, &mut alice)
        };
        let payload = w.write_step(tag, b"x")?.ok_or_else(|| anyhow::anyhow!("no payload"))?;
        r.read_step(tag, &payload)?;
        if !alice.is_complete() {
            tag = alice.next_nametag();
        }
    }
    let mut a = alice.finalize()?;
    let mut b = bob.finalize()?;

    // Seed both directions at the last usable counter value.
    a.cs_outbound.set_nonce(Nonce::from_counter(NONCE_MAX - 1));
    b.cs_inbound.set_nonce(Nonce::from_counter(NONCE_MAX - 1));

    // One more message goes through...
    let env = a.write_message(b"last-one")?;
    assert_eq!(b.read_message(&env)?, b"last-one");

    // ...then the direction is dead, stably.
    for _ in 0..3 {
        assert!(matches!(
            a.write_message(b"too-late"),
            Err(pact_stream::Error::Crypto(
                pact_crypto::Error::NonceExhausted
            ))
        ));
    }
    Ok(())
}
