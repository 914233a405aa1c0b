//! Emitter Example
//!
//! Scripts a message source and drives it with explicit demand.
//!
//! # Key Concepts Demonstrated
//!
//! ## 1. Demand Gates Delivery
//!
//! An `Emitter` queues whatever the test scripts, but nothing crosses to a
//! subscriber until that subscriber requests it. The consumer below holds a
//! hand crank: each turn requests a fixed number of items, and deliveries
//! happen synchronously inside the turn.
//!
//! ## 2. Terminal Signals Wait for the Backlog
//!
//! `complete` is scripted right after the payloads, yet the subscriber only
//! sees it once every queued message has been drained. No payload can be
//! lost to an early completion.
//!
//! ## 3. Settlement Flows Back to the Source
//!
//! Each scripted message carries an acknowledgement callback. As the
//! consumer acks deliveries, the source-side counter climbs, which is how a
//! test verifies the system under test settles everything it consumes.
//!
//! Runs without an async runtime: the whole demand pump is synchronous.
//! Set `RUST_LOG=sonde=debug` to watch the emitter's internal tracing.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use sonde::*;

/// A consumer that only takes what it is explicitly told to request.
#[derive(Default)]
struct HandCranked {
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
}

impl HandCranked {
    /// Turn the crank: request `n` more items. Deliveries land before this
    /// returns, because the emitter pumps on the caller's thread.
    fn crank(&self, n: u64) {
        println!("-- crank({n})");
        if let Some(subscription) = &*self.subscription.lock().unwrap() {
            subscription.request(n);
        }
    }
}

impl Subscriber<Message<String>> for HandCranked {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock().unwrap() = Some(subscription);
        println!("subscribed; requesting nothing yet");
    }

    fn on_next(&self, message: Message<String>) {
        println!("received {}", message.payload());
        message.ack();
    }

    fn on_error(&self, error: SignalError) {
        println!("stream failed: {error}");
    }

    fn on_complete(&self) {
        println!("stream complete");
    }
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let emitter = Emitter::new("ticker");
    let consumer = Arc::new(HandCranked::default());
    emitter.subscribe(Arc::clone(&consumer) as Arc<dyn Subscriber<Message<String>>>);

    // Script the whole session up front. The source-side counter records
    // every acknowledgement that comes back.
    let acks = Arc::new(AtomicUsize::new(0));
    for tick in ["tick-1", "tick-2", "tick-3"] {
        let counter = Arc::clone(&acks);
        emitter.send_message(Message::with_ack(tick.to_owned(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }
    emitter.complete();
    println!(
        "scripted 3 ticks and a completion; acks so far: {}",
        acks.load(Ordering::SeqCst)
    );

    // One turn, one delivery.
    consumer.crank(1);

    // The rest of the backlog, then the completion right behind it.
    consumer.crank(2);

    println!("acks seen by the source: {}", acks.load(Ordering::SeqCst));
    println!("Done");
}
