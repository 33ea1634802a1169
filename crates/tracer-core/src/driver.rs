//! Wall-clock driver for a [`PlaybackEngine`].
//!
//! The engine sits behind a single async mutex; every API call and every
//! tick takes that lock, so a tick never interleaves with a load, scrub or
//! speed change. The ticker is one spawned task per run of the clock. It
//! re-reads the tick interval before each sleep, carries the clock epoch it
//! was spawned for, and exits as soon as a tick is rejected. Stopping
//! transitions also abort the task outright.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::clock::PlaybackSpeed;
use crate::engine::{LoadSummary, PlaybackEngine, PlaybackStatus, PlaybackUpdate};
use crate::error::Result;
use crate::log_store::{LogRecord, VehicleId};
use crate::path::VehiclePathOverlay;
use crate::payload::PayloadRecord;
use crate::resolver::FleetSnapshot;

/// Buffered updates per subscriber before slow receivers start lagging.
pub const UPDATE_CHANNEL_CAPACITY: usize = 256;

struct Shared {
    engine: PlaybackEngine,
    ticker: Option<JoinHandle<()>>,
}

impl Shared {
    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Runs a playback session against the tokio clock and publishes updates.
pub struct PlaybackDriver {
    shared: Arc<Mutex<Shared>>,
    updates: broadcast::Sender<PlaybackUpdate>,
}

impl PlaybackDriver {
    pub fn new(engine: PlaybackEngine) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Mutex::new(Shared {
                engine,
                ticker: None,
            })),
            updates,
        }
    }

    /// Receive an update after every applied tick, scrub, reset and load.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackUpdate> {
        self.updates.subscribe()
    }

    /// Run `f` against the engine under the session lock.
    pub async fn read<R>(&self, f: impl FnOnce(&PlaybackEngine) -> R) -> R {
        let shared = self.shared.lock().await;
        f(&shared.engine)
    }

    pub async fn status(&self) -> PlaybackStatus {
        self.read(PlaybackEngine::status).await
    }

    pub async fn snapshot(&self) -> FleetSnapshot {
        self.read(PlaybackEngine::snapshot).await
    }

    pub async fn update(&self) -> PlaybackUpdate {
        self.read(PlaybackEngine::update).await
    }

    pub async fn overlays(&self) -> BTreeMap<VehicleId, VehiclePathOverlay> {
        self.read(|engine| engine.overlays().clone()).await
    }

    pub async fn payloads(&self) -> Vec<PayloadRecord> {
        self.read(|engine| engine.payloads().to_vec()).await
    }

    /// Start or resume playback and schedule ticks.
    pub async fn start(&self) -> PlaybackStatus {
        let mut shared = self.shared.lock().await;
        if shared.engine.start() {
            self.spawn_ticker(&mut shared);
        }
        shared.engine.status()
    }

    pub async fn pause(&self) -> PlaybackStatus {
        let mut shared = self.shared.lock().await;
        shared.cancel_ticker();
        shared.engine.pause();
        shared.engine.status()
    }

    /// Stop, cancel any pending tick and return to time 0.
    pub async fn reset(&self) -> PlaybackUpdate {
        let mut shared = self.shared.lock().await;
        shared.cancel_ticker();
        shared.engine.reset();
        self.publish(shared.engine.update())
    }

    /// Jump to `time`. A running clock keeps running from there.
    pub async fn scrub(&self, time: u64) -> PlaybackUpdate {
        let mut shared = self.shared.lock().await;
        let update = shared.engine.scrub(time);
        self.publish(update)
    }

    /// Change pacing; the next tick already uses the new interval.
    pub async fn set_speed(&self, speed: PlaybackSpeed) -> PlaybackStatus {
        let mut shared = self.shared.lock().await;
        shared.engine.set_speed(speed);
        shared.engine.status()
    }

    /// Swap in a new location log.
    ///
    /// The ticker is stopped for the swap and restarted against the new
    /// timeline if the clock is still running afterwards. A rejected log
    /// leaves the session, including a running ticker, as it was.
    pub async fn load_logs(&self, records: Vec<LogRecord>) -> Result<LoadSummary> {
        let mut shared = self.shared.lock().await;
        let summary = shared.engine.load_logs(records)?;
        self.after_swap(&mut shared);
        Ok(summary)
    }

    pub async fn load_logs_json(&self, json: &str) -> Result<LoadSummary> {
        let mut shared = self.shared.lock().await;
        let summary = shared.engine.load_logs_json(json)?;
        self.after_swap(&mut shared);
        Ok(summary)
    }

    pub async fn load_payloads(&self, payloads: Vec<PayloadRecord>) {
        let mut shared = self.shared.lock().await;
        shared.engine.load_payloads(payloads);
    }

    pub async fn load_payloads_json(&self, json: &str) -> Result<usize> {
        let mut shared = self.shared.lock().await;
        shared.engine.load_payloads_json(json)
    }

    fn after_swap(&self, shared: &mut Shared) {
        shared.cancel_ticker();
        if shared.engine.clock().is_running() {
            self.spawn_ticker(shared);
        }
        self.publish(shared.engine.update());
    }

    fn spawn_ticker(&self, shared: &mut Shared) {
        shared.cancel_ticker();
        let epoch = shared.engine.clock().epoch();
        debug!(epoch, "scheduling ticks");
        shared.ticker = Some(tokio::spawn(run_ticker(
            Arc::downgrade(&self.shared),
            self.updates.clone(),
            epoch,
        )));
    }

    fn publish(&self, update: PlaybackUpdate) -> PlaybackUpdate {
        // No subscribers is fine.
        let _ = self.updates.send(update.clone());
        update
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        // A ticker blocked on the lock exits on its own: it only holds a
        // weak reference to the session.
        if let Ok(mut shared) = self.shared.try_lock() {
            shared.cancel_ticker();
        }
    }
}

async fn run_ticker(
    session: Weak<Mutex<Shared>>,
    updates: broadcast::Sender<PlaybackUpdate>,
    epoch: u64,
) {
    loop {
        let interval = {
            let Some(shared) = session.upgrade() else {
                return;
            };
            let guard = shared.lock().await;
            let clock = guard.engine.clock();
            if clock.epoch() != epoch || !clock.is_running() {
                return;
            }
            clock.tick_interval()
        };

        tokio::time::sleep(interval).await;

        let Some(shared) = session.upgrade() else {
            return;
        };
        let mut guard = shared.lock().await;
        let Some(update) = guard.engine.tick(epoch) else {
            debug!(epoch, "dropped stale tick");
            return;
        };
        let finished = !guard.engine.clock().is_running();
        let _ = updates.send(update);
        if finished {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockState;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;
    use tracer_graph::standard_facility;

    fn driver() -> PlaybackDriver {
        PlaybackDriver::new(PlaybackEngine::new(Arc::new(standard_facility())))
    }

    fn sample() -> Vec<LogRecord> {
        vec![
            LogRecord::at("A", 0, "Node1"),
            LogRecord::at("A", 5, "Node2"),
            LogRecord::at("B", 3, "Node4"),
        ]
    }

    async fn recv_until_finished(rx: &mut broadcast::Receiver<PlaybackUpdate>) -> Vec<PlaybackUpdate> {
        let mut seen = Vec::new();
        loop {
            let update = rx.recv().await.unwrap();
            let done = update.status.state == ClockState::Finished;
            seen.push(update);
            if done {
                return seen;
            }
        }
    }

    fn drain(rx: &mut broadcast::Receiver<PlaybackUpdate>) -> Option<PlaybackUpdate> {
        let mut last = None;
        while let Ok(update) = rx.try_recv() {
            last = Some(update);
        }
        last
    }

    #[tokio::test(start_paused = true)]
    async fn plays_to_the_end_and_stops() {
        let driver = driver();
        driver.load_logs(sample()).await.unwrap();
        let mut rx = driver.subscribe();

        driver.start().await;
        let updates = recv_until_finished(&mut rx).await;

        let times: Vec<u64> = updates.iter().map(|u| u.status.time).collect();
        assert_eq!(times, vec![1, 2, 3, 4, 5]);
        let last = updates.last().unwrap();
        assert_eq!(last.snapshot.location_of("A").map(|n| n.as_str()), Some("Node2"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(driver.status().await.time, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_interval_follows_speed() {
        let driver = driver();
        driver.load_logs(sample()).await.unwrap();
        driver.set_speed(PlaybackSpeed::Quintuple).await;
        let mut rx = driver.subscribe();

        let started = tokio::time::Instant::now();
        driver.start().await;
        recv_until_finished(&mut rx).await;

        // Five ticks at 200ms each; at 1x this would take five seconds.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1200), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_pending_ticks() {
        let driver = driver();
        driver.load_logs(sample()).await.unwrap();
        let mut rx = driver.subscribe();

        driver.start().await;
        rx.recv().await.unwrap();
        driver.reset().await;

        let last = drain(&mut rx).unwrap();
        assert_eq!(last.status.time, 0);
        assert!(last.snapshot.location_of("A").is_some());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        let status = driver.status().await;
        assert_eq!(status.state, ClockState::Idle);
        assert_eq!(status.time, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_ticks_and_start_resumes() {
        let driver = driver();
        driver.load_logs(sample()).await.unwrap();
        let mut rx = driver.subscribe();

        driver.start().await;
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        let paused = driver.pause().await;
        assert_eq!(paused.state, ClockState::Paused);
        assert_eq!(paused.time, 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(drain(&mut rx).is_none());

        driver.start().await;
        let rest = recv_until_finished(&mut rx).await;
        assert_eq!(rest.first().map(|u| u.status.time), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn scrub_publishes_resolved_snapshot() {
        let driver = driver();
        driver.load_logs(sample()).await.unwrap();
        let mut rx = driver.subscribe();

        let update = driver.scrub(4).await;
        assert_eq!(update.snapshot.len(), 2);
        assert!(!update.status.running);

        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed, update);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_load_keeps_playing_old_data() {
        let driver = driver();
        driver.load_logs(sample()).await.unwrap();
        let mut rx = driver.subscribe();
        driver.start().await;

        assert!(driver.load_logs_json("[{\"agv_id\": 3, \"timestamp\": \"x\", \"location\": \"Node1\"}]").await.is_err());
        let updates = recv_until_finished(&mut rx).await;
        assert_eq!(updates.last().map(|u| u.status.time), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn load_while_running_continues_on_new_timeline() {
        let driver = driver();
        driver.load_logs(sample()).await.unwrap();
        let mut rx = driver.subscribe();
        driver.start().await;
        rx.recv().await.unwrap();

        let longer = vec![LogRecord::at("Z", 0, "Node9"), LogRecord::at("Z", 8, "Node8")];
        let summary = driver.load_logs(longer).await.unwrap();
        assert_eq!(summary.max_timestamp, 8);

        let updates = recv_until_finished(&mut rx).await;
        let times: Vec<u64> = updates.iter().map(|u| u.status.time).collect();
        // The swap itself publishes the current position first.
        assert_eq!(times, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(updates.iter().all(|u| u.snapshot.location_of("A").is_none()));
    }
}
