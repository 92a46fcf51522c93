//! Producer wake-up signalling.

use parking_lot::{Condvar, Mutex};

/// Why a [`FrameSignal::wait`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wake {
    /// Room for one more frame.
    Frame,
    /// Playback is stopping.
    Stop,
}

#[derive(Debug)]
struct SignalState {
    /// Frame requests not yet taken by a waiter
    pending: usize,
    stopped: bool,
}

/// Frame-ready and stop events, waited on together.
///
/// Frame requests are counted: every [`notify_frame`](FrameSignal::notify_frame)
/// releases exactly one [`wait`](FrameSignal::wait), so a sink that takes
/// several chunks in one burst gets every one of them replaced. `stopped`
/// stays set until [`rearm`](FrameSignal::rearm) and always wins over
/// pending frames.
#[derive(Debug)]
pub struct FrameSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl FrameSignal {
    /// Armed for a new session: one frame pending, not stopped.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SignalState { pending: 1, stopped: false }),
            cond: Condvar::new(),
        }
    }

    /// Block until a frame is requested or playback stops.
    pub fn wait(&self) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return Wake::Stop;
            }
            if state.pending > 0 {
                state.pending -= 1;
                return Wake::Frame;
            }
            self.cond.wait(&mut state);
        }
    }

    /// Request one more frame.
    pub fn notify_frame(&self) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_add(1);
        drop(state);
        self.cond.notify_one();
    }

    /// Wake every waiter with [`Wake::Stop`], now and until rearmed.
    pub fn stop(&self) {
        self.state.lock().stopped = true;
        self.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Reset to the initial state for a fresh session.
    pub fn rearm(&self) {
        let mut state = self.state.lock();
        state.pending = 1;
        state.stopped = false;
    }
}

impl Default for FrameSignal {
    fn default() -> Self {
        Self::new()
    }
}
