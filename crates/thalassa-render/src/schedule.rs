//! Frame slot bookkeeping.

/// Upper bound on frames the CPU may record ahead of the GPU. Per-frame
/// sync objects and command buffers are arrays of this size.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Tracks which frame slot is recording and whether a frame is open.
///
/// The schedule is plain bookkeeping; the fence wait keyed by
/// `frame_index` provides the actual backpressure.
#[derive(Debug)]
pub struct FrameSchedule {
    frame_index: usize,
    frames_in_flight: usize,
    started: bool,
}

impl FrameSchedule {
    /// Schedule cycling through `frames_in_flight` slots.
    #[must_use]
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "frames in flight must be non-zero");
        Self {
            frame_index: 0,
            frames_in_flight,
            started: false,
        }
    }

    /// Slot index selecting sync objects and the command buffer.
    #[must_use]
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// True between `begin` and `end`.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Mark the frame started.
    ///
    /// # Panics
    /// Panics when a frame is already in progress.
    pub fn begin(&mut self) {
        assert!(
            !self.started,
            "begin_frame called while a frame is already in progress"
        );
        self.started = true;
    }

    /// Mark the frame finished and advance to the next slot.
    ///
    /// # Panics
    /// Panics when no frame is in progress.
    pub fn end(&mut self) {
        assert!(self.started, "end_frame called without a started frame");
        self.started = false;
        self.frame_index = (self.frame_index + 1) % self.frames_in_flight;
    }
}

impl Default for FrameSchedule {
    fn default() -> Self {
        Self::new(MAX_FRAMES_IN_FLIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_index_cycles_through_both_slots() {
        let mut schedule = FrameSchedule::default();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(schedule.frame_index());
            schedule.begin();
            schedule.end();
        }

        assert_eq!(seen, [0, 1, 0, 1]);
    }

    #[test]
    #[should_panic(expected = "begin_frame called while a frame is already in progress")]
    fn double_begin_without_end_panics() {
        let mut schedule = FrameSchedule::default();
        schedule.begin();
        schedule.begin();
    }

    #[test]
    #[should_panic(expected = "end_frame called without a started frame")]
    fn end_without_begin_panics() {
        let mut schedule = FrameSchedule::default();
        schedule.end();
    }

    #[test]
    fn slot_reuse_waits_for_the_fence_signal() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::{Arc, Condvar, Mutex};
        use std::thread;
        use std::time::Duration;

        // Fence model: the Mutex<bool> is the signaled state, the Condvar
        // wakes the parked recorder.
        let fence = Arc::new((Mutex::new(false), Condvar::new()));
        let begun = Arc::new(AtomicBool::new(false));

        let recorder = {
            let fence = Arc::clone(&fence);
            let begun = Arc::clone(&begun);
            thread::spawn(move || {
                let mut schedule = FrameSchedule::default();
                schedule.begin();
                schedule.end();
                schedule.begin();
                schedule.end();

                // Back at slot 0; reusing it must wait for the fence.
                let (state, condvar) = &*fence;
                let mut signaled = state.lock().unwrap();
                while !*signaled {
                    signaled = condvar.wait(signaled).unwrap();
                }
                drop(signaled);

                schedule.begin();
                begun.store(true, Ordering::SeqCst);
                schedule.end();
                schedule.frame_index()
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(
            !begun.load(Ordering::SeqCst),
            "frame began before the fence was signaled"
        );

        let (state, condvar) = &*fence;
        *state.lock().unwrap() = true;
        condvar.notify_one();

        assert_eq!(recorder.join().unwrap(), 1);
    }
}
