// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Availability lookups during a store outage.
//!
//! The store answers the first request, then fails with connection errors. Reads keep being
//! served from the stale cache while the circuit breaker opens and stops hammering the store.
//! A booking, which is never cached, surfaces the outage to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use innkeep_store::{QueryOptions, ResilientExecutor, StoreError, StoreReply, cache_key};
use tick::Clock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let clock = Clock::new_tokio();
    let executor = ResilientExecutor::builder(&clock)
        .name("availability")
        .retry_policy(|policy| {
            policy
                .max_retries(2)
                .initial_delay(Duration::from_millis(50))
                .max_delay(Duration::from_millis(200))
        })
        .build();

    let store_calls = Arc::new(AtomicU32::new(0));
    let key = cache_key(["availability", "lakeside-cabin", "2026-07"]);
    let options = QueryOptions::cached(Duration::from_millis(300));

    for round in 0..8 {
        let output = executor
            .query_reply(&key, &options, || fetch_availability(Arc::clone(&store_calls)))
            .await;

        match output.error() {
            None => println!(
                "{round}: nights {:?} (from cache: {})",
                output.value().cloned().flatten().unwrap_or_default(),
                output.from_cache()
            ),
            Some(error) => println!("{round}: {error}"),
        }

        clock.delay(Duration::from_millis(200)).await;
    }

    let booking = executor
        .query("booking:lakeside-cabin:2026-07-03", &QueryOptions::write().max_retries(0), || async {
            Err::<u64, _>(StoreError::from_message("connect ECONNREFUSED 10.0.0.12:443"))
        })
        .await;

    match booking.into_result() {
        Ok(id) => println!("booked: {id}"),
        Err(error) => println!("booking failed, try again later: {error}"),
    }

    println!(
        "store calls: {}, breaker: {}",
        store_calls.load(Ordering::Relaxed),
        executor.breaker_state(executor.default_dependency())
    );
}

// Answers the first request, then simulates an outage.
async fn fetch_availability(calls: Arc<AtomicU32>) -> StoreReply<Vec<u32>> {
    if calls.fetch_add(1, Ordering::Relaxed) == 0 {
        StoreReply::ok(vec![1, 2, 3, 7, 8])
    } else {
        StoreReply::err("TypeError: fetch failed")
    }
}
