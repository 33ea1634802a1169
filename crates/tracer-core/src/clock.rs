//! Virtual playback clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Wall-clock pacing of playback.
///
/// Speed scales how often a tick fires, never how much simulated time a
/// tick covers: every tick is exactly one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackSpeed {
    /// 0.5x speed
    Half,
    /// Normal speed (1x)
    #[default]
    Normal,
    /// 2x speed
    Double,
    /// 5x speed
    Quintuple,
}

impl PlaybackSpeed {
    /// Every selectable speed, slowest first.
    pub const ALL: [PlaybackSpeed; 4] = [
        PlaybackSpeed::Half,
        PlaybackSpeed::Normal,
        PlaybackSpeed::Double,
        PlaybackSpeed::Quintuple,
    ];

    /// Base wall-clock duration of one tick at 1x.
    pub const BASE_TICK_MS: u64 = 1000;

    /// Get the speed multiplier.
    pub fn multiplier(&self) -> f64 {
        match self {
            PlaybackSpeed::Half => 0.5,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::Double => 2.0,
            PlaybackSpeed::Quintuple => 5.0,
        }
    }

    /// Look up a speed by its multiplier. Only the selectable set is accepted.
    pub fn from_multiplier(multiplier: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|speed| speed.multiplier() == multiplier)
    }

    /// Wall-clock time between ticks at this speed.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis((Self::BASE_TICK_MS as f64 / self.multiplier()) as u64)
    }
}

/// Current state of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockState {
    /// Not started, or reset
    Idle,
    /// Advancing one tick per interval
    Running,
    /// Stopped mid-timeline, keeps its time
    Paused,
    /// Reached the end of the data
    Finished,
}

/// Virtual time over one dataset.
///
/// The clock never schedules anything itself. Whoever drives it calls
/// [`tick`](Self::tick) once per [`tick_interval`](Self::tick_interval),
/// passing the [`epoch`](Self::epoch) it read when it started waiting.
/// Every transition that should invalidate outstanding ticks (start,
/// pause, reset, rebinding to new data) moves the epoch on, so a tick that
/// arrives late is ignored.
#[derive(Debug, Clone)]
pub struct TimelineClock {
    time: u64,
    max_time: u64,
    state: ClockState,
    speed: PlaybackSpeed,
    epoch: u64,
    /// Whether the bound dataset has any events. A dataset can be
    /// non-empty with every event at time 0.
    has_data: bool,
}

impl TimelineClock {
    /// Create an idle clock over `[0, max_time]` of a loaded dataset.
    pub fn new(max_time: u64) -> Self {
        Self {
            time: 0,
            max_time,
            state: ClockState::Idle,
            speed: PlaybackSpeed::Normal,
            epoch: 0,
            has_data: true,
        }
    }

    /// Create an idle clock with no dataset bound. Starting it does nothing.
    pub fn empty() -> Self {
        Self {
            has_data: false,
            ..Self::new(0)
        }
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    /// Upper bound of the timeline (the dataset's latest timestamp).
    pub fn max_time(&self) -> u64 {
        self.max_time
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn has_data(&self) -> bool {
        self.has_data
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Wall-clock delay before the next tick.
    pub fn tick_interval(&self) -> Duration {
        self.speed.tick_interval()
    }

    /// Start or resume ticking. Returns whether the clock changed state.
    ///
    /// A clock already at the end rewinds to 0 first. No-op when already
    /// running or when there is nothing to play. A dataset whose events
    /// all sit at time 0 has nothing to tick through and finishes at once.
    pub fn start(&mut self) -> bool {
        if self.is_running() || !self.has_data {
            return false;
        }
        if self.max_time == 0 {
            if self.state == ClockState::Finished {
                return false;
            }
            self.time = 0;
            self.state = ClockState::Finished;
            self.epoch += 1;
            return true;
        }
        if self.time >= self.max_time {
            self.time = 0;
        }
        self.state = ClockState::Running;
        self.epoch += 1;
        true
    }

    /// Stop ticking, keeping the current time.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = ClockState::Paused;
        self.epoch += 1;
        true
    }

    /// Stop and return to the beginning.
    pub fn reset(&mut self) {
        self.time = 0;
        self.state = ClockState::Idle;
        self.epoch += 1;
    }

    /// Jump to `time`, clamped to the timeline. Does not start or stop
    /// ticking. Returns the time actually set.
    pub fn scrub(&mut self, time: u64) -> u64 {
        self.time = time.min(self.max_time);
        self.time
    }

    /// Change pacing. Applies from the next tick on.
    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.speed = speed;
    }

    /// Advance one tick if `epoch` is current and the clock is running.
    ///
    /// Returns the new time, or `None` when the tick is stale. Reaching
    /// the end of the timeline finishes the clock.
    pub fn tick(&mut self, epoch: u64) -> Option<u64> {
        if epoch != self.epoch || !self.is_running() {
            return None;
        }
        self.time = self.time.saturating_add(1).min(self.max_time);
        if self.time >= self.max_time {
            self.state = ClockState::Finished;
        }
        Some(self.time)
    }

    /// Point the clock at a new dataset's timeline.
    ///
    /// Outstanding ticks are invalidated. The time is clamped to the new
    /// bound; a running clock keeps running unless it is now at the end,
    /// and a finished clock left short of the new end becomes paused. A
    /// dataset without events sends the clock back to idle.
    pub fn rebind(&mut self, max_time: u64, has_data: bool) {
        self.max_time = max_time;
        self.has_data = has_data;
        self.time = self.time.min(max_time);
        self.epoch += 1;

        if !has_data {
            self.time = 0;
            self.state = ClockState::Idle;
        } else if self.is_running() && self.time >= max_time {
            self.state = ClockState::Finished;
        } else if self.state == ClockState::Finished && self.time < max_time {
            self.state = ClockState::Paused;
        }
    }

    /// Position on the timeline, 0.0 - 1.0.
    pub fn progress(&self) -> f64 {
        if self.max_time == 0 {
            if self.state == ClockState::Finished {
                1.0
            } else {
                0.0
            }
        } else {
            self.time as f64 / self.max_time as f64
        }
    }
}
