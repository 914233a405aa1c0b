//! Probe Example
//!
//! Watches a channel fed by a live source and asserts on what arrives.
//!
//! # Key Concepts Demonstrated
//!
//! ## 1. Deadline-Bound Assertions
//!
//! Every expectation waits a bounded window and then fails with a full
//! description of what it was waiting for. A broken system under test
//! produces a readable error, never a hung suite.
//!
//! ## 2. Strict vs. Eventual Matching
//!
//! `expect_next_message` requires the very next delivery to match.
//! `expect_eventual_message` acknowledges and discards noise (heartbeats,
//! telemetry) until the interesting message shows up, all inside the same
//! fixed window.
//!
//! ## 3. Failures Are Values
//!
//! Assertions return `Result`, so a test can `?` them for the usual
//! fail-fast behavior or match on the error to probe the failure itself.

use std::time::Duration;

use sonde::*;

/// What the exchange under test publishes on its order channel.
#[derive(Debug, Clone, PartialEq)]
enum OrderEvent {
    Accepted(u32),
    Filled(u32),
    Heartbeat,
}

#[tokio::main]
pub async fn main() -> Result {
    let environment = TestEnvironment::default()
        .with_receive_timeout(Duration::from_millis(500))
        .with_no_message_timeout(Duration::from_millis(200));
    let mut probe = Probe::new(environment, "orders");

    // Stand-in for the system under test: a scripted exchange feed.
    let exchange = Emitter::new("orders");
    exchange.subscribe(probe.subscriber());

    // A live feed interleaves heartbeats with the events we care about.
    exchange.send(OrderEvent::Accepted(7));
    exchange.send(OrderEvent::Heartbeat);
    exchange.send(OrderEvent::Heartbeat);
    exchange.send(OrderEvent::Filled(7));

    // Strict: the acceptance must be the very next thing on the channel.
    probe.expect_next_message(&OrderEvent::Accepted(7)).await?.ack();
    println!("order 7 accepted");

    // Relaxed: skip the heartbeats, find the fill. Skipped messages are
    // acknowledged on the way past.
    probe
        .expect_eventual_message(&OrderEvent::Filled(7))
        .await?
        .ack();
    println!("order 7 filled");

    // Silence: nothing further may arrive within the window.
    probe.expect_no_messages("order 7 is fully processed").await?;
    println!("channel is quiet");

    // A failed expectation is an ordinary error value. This one times out
    // because order 8 was never sent.
    match probe.expect_next_message(&OrderEvent::Filled(8)).await {
        Err(error) => println!("as expected: {error}"),
        Ok(message) => println!("surprising delivery: {message:?}"),
    }

    println!("Done");
    Ok(())
}
