//! Purpose: Time sources the poller arms its single-shot timer against.
//! Exports: `Clock`, `BlockingClock`, `TimerHandle`, `VirtualClock`, `SystemClock`, `TokioClock`.
//! Role: Lets the same engine run on virtual time (tests, replays) or wall time (blocking or async).
//! Invariants: `now` is monotonic and measured from the clock's own origin.
//! Invariants: `VirtualClock` only moves when a driver sleeps on it; clones share one timeline.
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// One armed single-shot timer. Dropping or replacing the handle disarms it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimerHandle {
    id: u64,
    deadline: Duration,
}

impl TimerHandle {
    pub(crate) fn new(id: u64, deadline: Duration) -> Self {
        Self { id, deadline }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

pub trait Clock {
    fn now(&self) -> Duration;
}

/// Clocks a synchronous driver can wait on.
pub trait BlockingClock: Clock {
    fn sleep_until(&self, deadline: Duration);
}

#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    now: Rc<Cell<Duration>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        if now > self.now.get() {
            self.now.set(now);
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

impl BlockingClock for VirtualClock {
    fn sleep_until(&self, deadline: Duration) {
        self.set(deadline);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl BlockingClock for SystemClock {
    fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Wall time as seen by the tokio runtime, so paused test time is honoured.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }

    /// Deadlines past what `Instant` can represent map to roughly thirty years out.
    pub(crate) fn instant_at(&self, deadline: Duration) -> tokio::time::Instant {
        self.origin
            .checked_add(deadline)
            .unwrap_or_else(|| self.origin + FAR_FUTURE)
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}
