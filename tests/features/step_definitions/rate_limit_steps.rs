//! Rate limiter step definitions

use cucumber::{given, then, when};

use brainybees::{
    db::RateLimitRepository,
    services::{
        rate_limiter::{reap_expired, RATE_LIMIT_TTL_SECS},
        FixedWindowLimiter, RateLimitDecision,
    },
};

use crate::features::support::TestWorld;

#[given(expr = "a limit of {int} requests per {int} seconds")]
async fn limit_configured(world: &mut TestWorld, max_hits: u32, window_secs: u64) {
    world.limits.max_hits = max_hits;
    world.limits.window_secs = window_secs;
}

#[given(expr = "the clock reads {int}")]
async fn clock_reads(world: &mut TestWorld, now: i64) {
    world.now = now;
}

#[when(expr = "{int} seconds pass")]
async fn seconds_pass(world: &mut TestWorld, secs: i64) {
    world.now += secs;
}

#[when(expr = "{string} makes {int} requests")]
async fn makes_requests(world: &mut TestWorld, key: String, count: usize) {
    let limiter = FixedWindowLimiter::new(world.db().await, &world.limits);
    for _ in 0..count {
        let decision = limiter
            .check_at(&key, world.now)
            .await
            .expect("Rate limit check failed");
        world.decisions.push(decision);
    }
}

#[when("the reaper runs")]
async fn reaper_runs(world: &mut TestWorld) {
    let pool = world.db().await;
    reap_expired(&pool, RATE_LIMIT_TTL_SECS, world.now)
        .await
        .expect("Reaper failed");
}

#[then(expr = "the first {int} requests are allowed")]
async fn first_requests_allowed(world: &mut TestWorld, count: usize) {
    assert!(world.decisions.len() >= count);
    assert!(world.decisions[..count].iter().all(RateLimitDecision::is_allowed));
}

#[then(expr = "the last request is throttled with a retry after of {int} seconds")]
async fn last_request_throttled(world: &mut TestWorld, expected: u64) {
    match world.decisions.last() {
        Some(RateLimitDecision::Throttled { retry_after_secs }) => {
            assert_eq!(*retry_after_secs, expected)
        }
        other => panic!("Expected a throttled request, got {:?}", other),
    }
}

#[then("the last request is allowed")]
async fn last_request_allowed(world: &mut TestWorld) {
    let decision = world.decisions.last().expect("No requests in scenario");
    assert!(decision.is_allowed(), "Expected an allowed request, got {:?}", decision);
}

#[then(expr = "{int} counter row remains")]
async fn counter_rows_remain(world: &mut TestWorld, expected: i64) {
    let pool = world.db().await;
    let count = RateLimitRepository::new(&pool)
        .count()
        .await
        .expect("Failed to count counter rows");
    assert_eq!(count, expected);
}
