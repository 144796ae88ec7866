//! Wall-clock behaviour of the frame clock thread.
//!
//! Rates are checked with generous tolerances so the tests stay stable on
//! loaded machines.

use rewind_clock::{ClockCallback, FrameClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Counter {
    advances: AtomicU64,
    rewinds: AtomicU64,
}

impl Counter {
    fn advances(&self) -> u64 {
        self.advances.load(Ordering::SeqCst)
    }

    fn rewinds(&self) -> u64 {
        self.rewinds.load(Ordering::SeqCst)
    }
}

impl ClockCallback for Counter {
    fn on_advance(&self) {
        self.advances.fetch_add(1, Ordering::SeqCst);
    }

    fn on_rewind(&self) {
        self.rewinds.fetch_add(1, Ordering::SeqCst);
    }
}

fn running_clock(rate: f64) -> (Arc<Counter>, FrameClock) {
    let counter = Arc::new(Counter::default());
    let clock = FrameClock::new(counter.clone(), rate);
    clock.start().unwrap();
    (counter, clock)
}

#[test]
fn test_double_speed_doubles_rate() {
    let (counter, clock) = running_clock(60.0);

    clock.set_speed(2.0);
    thread::sleep(Duration::from_secs(1));
    clock.pause_async();

    let advances = counter.advances();
    assert!(
        (90..=135).contains(&advances),
        "expected ~120 advances, got {advances}"
    );
    assert_eq!(counter.rewinds(), 0);
}

#[test]
fn test_negative_speed_rewinds() {
    let (counter, clock) = running_clock(60.0);

    clock.set_speed(-0.5);
    thread::sleep(Duration::from_secs(1));
    clock.stop();

    let rewinds = counter.rewinds();
    assert!(
        (20..=36).contains(&rewinds),
        "expected ~30 rewinds, got {rewinds}"
    );
    assert_eq!(counter.advances(), 0);
}

#[test]
fn test_paused_clock_emits_nothing() {
    let (counter, clock) = running_clock(240.0);

    thread::sleep(Duration::from_millis(200));
    clock.stop();

    assert_eq!(counter.advances(), 0);
    assert_eq!(counter.rewinds(), 0);
}

#[test]
fn test_stop_while_paused_is_prompt() {
    let (_counter, clock) = running_clock(60.0);
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    clock.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!clock.is_running());
}

#[test]
fn test_stop_during_long_tick_is_prompt() {
    // One tick every 10 seconds
    let (counter, clock) = running_clock(0.1);
    clock.set_speed(1.0);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(counter.advances(), 1);

    let started = Instant::now();
    clock.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_speed_change_wakes_loop() {
    // One tick per second until the speed is raised
    let (counter, clock) = running_clock(1.0);
    clock.set_speed(1.0);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(counter.advances(), 1);

    clock.set_speed(50.0);
    thread::sleep(Duration::from_millis(300));
    clock.stop();

    assert!(
        counter.advances() >= 6,
        "speed change did not take effect: {} advances",
        counter.advances()
    );
}

#[test]
fn test_no_catch_up_after_pause() {
    let (counter, clock) = running_clock(100.0);

    clock.set_speed(1.0);
    thread::sleep(Duration::from_millis(100));
    clock.pause_async();
    thread::sleep(Duration::from_millis(400));
    clock.set_speed(1.0);
    thread::sleep(Duration::from_millis(100));
    clock.stop();

    // ~20 ticks of playing time; catching up the pause would give ~60
    let advances = counter.advances();
    assert!(advances <= 35, "burst after resume: {advances} advances");
    assert!(advances >= 8, "too few advances: {advances}");
}

#[test]
fn test_restart_after_stop() {
    let (counter, clock) = running_clock(100.0);
    clock.set_speed(1.0);
    thread::sleep(Duration::from_millis(50));
    clock.stop();

    let before = counter.advances();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(counter.advances(), before);

    clock.start().unwrap();
    thread::sleep(Duration::from_millis(100));
    clock.stop();
    assert!(counter.advances() > before);
}
