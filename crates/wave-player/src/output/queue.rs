//! Bounded sample queue between the transport's blocking writes and the CPAL
//! callback.
//!
//! - transport thread → `push_timeout` (blocks while full, like a DMA ring)
//! - CPAL callback → `pop_into` (never waits)

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Thread-safe bounded queue of interleaved `f32` samples.
///
/// The capacity is counted in samples, not frames.
pub(crate) struct SampleQueue {
    channels: usize,
    inner: Mutex<VecDeque<f32>>,
    cv: Condvar,
    max_samples: usize,
}

/// Queue capacity in samples for `seconds` of audio at `(rate_hz, channels)`.
///
/// Non-finite or non-positive durations fall back to 250 ms. Always holds at
/// least one frame.
pub(crate) fn capacity_for(rate_hz: u32, channels: usize, seconds: f32) -> usize {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.25
    };
    let frames = ((rate_hz as f32 * secs).ceil() as usize).max(1);
    frames.saturating_mul(channels.max(1))
}

impl SampleQueue {
    pub(crate) fn new(channels: usize, max_samples: usize) -> Self {
        Self {
            channels: channels.max(1),
            inner: Mutex::new(VecDeque::with_capacity(max_samples)),
            cv: Condvar::new(),
            max_samples: max_samples.max(1),
        }
    }

    pub(crate) fn channels(&self) -> usize {
        self.channels
    }

    pub(crate) fn len_frames(&self) -> usize {
        let g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.len() / self.channels
    }

    /// Push all of `samples`, blocking while the queue is full.
    ///
    /// Returns `false` if no room appeared for `timeout`; samples not yet
    /// queued at that point are dropped.
    pub(crate) fn push_timeout(&self, samples: &[f32], timeout: Duration) -> bool {
        let mut offset = 0;
        let mut deadline = Instant::now() + timeout;
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        while offset < samples.len() {
            while g.len() >= self.max_samples {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                let (ng, _) = self
                    .cv
                    .wait_timeout(g, deadline - now)
                    .unwrap_or_else(|e| e.into_inner());
                g = ng;
            }
            let room = self.max_samples - g.len();
            let take = room.min(samples.len() - offset);
            g.extend(&samples[offset..offset + take]);
            offset += take;
            // Progress resets the stall window.
            deadline = Instant::now() + timeout;
        }
        true
    }

    /// Move up to `max_frames` whole frames into `out` without waiting.
    ///
    /// Returns the number of samples moved.
    pub(crate) fn pop_into(&self, out: &mut Vec<f32>, max_frames: usize) -> usize {
        out.clear();
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let take = (g.len() / self.channels).min(max_frames) * self.channels;
        out.extend(g.drain(..take));
        drop(g);
        if take > 0 {
            self.cv.notify_all();
        }
        take
    }

    /// Wait until the callback has drained the queue, up to `timeout`.
    pub(crate) fn wait_empty(&self, timeout: Duration) -> bool {
        let g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (g, _) = self
            .cv
            .wait_timeout_while(g, timeout, |q| !q.is_empty())
            .unwrap_or_else(|e| e.into_inner());
        g.is_empty()
    }

    /// Drop everything queued and wake a blocked writer.
    pub(crate) fn clear(&self) {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.clear();
        drop(g);
        self.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn capacity_for_falls_back_on_bad_duration() {
        assert_eq!(capacity_for(48_000, 2, 0.5), 48_000);
        assert_eq!(capacity_for(48_000, 2, -1.0), 24_000);
        assert_eq!(capacity_for(48_000, 2, f32::NAN), 24_000);
        assert_eq!(capacity_for(0, 2, 1.0), 2);
    }

    #[test]
    fn pop_into_takes_whole_frames_only() {
        let q = SampleQueue::new(2, 16);
        assert!(q.push_timeout(&[1.0, 2.0, 3.0, 4.0, 5.0], Duration::from_millis(5)));
        let mut out = Vec::new();
        assert_eq!(q.pop_into(&mut out, 8), 4);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(q.len_frames(), 0);
    }

    #[test]
    fn push_times_out_when_nobody_drains() {
        let q = SampleQueue::new(1, 4);
        assert!(!q.push_timeout(&[0.0; 8], Duration::from_millis(10)));
        assert_eq!(q.len_frames(), 4);
    }

    #[test]
    fn blocked_push_completes_once_drained() {
        let q = Arc::new(SampleQueue::new(1, 4));
        let q_pop = q.clone();
        let handle = thread::spawn(move || {
            let mut out = Vec::new();
            let mut total = 0;
            while total < 8 {
                total += q_pop.pop_into(&mut out, 2);
                thread::sleep(Duration::from_millis(1));
            }
            total
        });
        assert!(q.push_timeout(&[0.5; 8], Duration::from_secs(1)));
        assert_eq!(handle.join().unwrap(), 8);
    }

    #[test]
    fn wait_empty_reports_leftover_audio() {
        let q = SampleQueue::new(1, 8);
        assert!(q.wait_empty(Duration::from_millis(1)));
        q.push_timeout(&[1.0; 4], Duration::from_millis(5));
        assert!(!q.wait_empty(Duration::from_millis(5)));
        let mut out = Vec::new();
        q.pop_into(&mut out, 4);
        assert!(q.wait_empty(Duration::from_millis(1)));
    }

    #[test]
    fn clear_discards_pending_audio() {
        let q = SampleQueue::new(2, 16);
        q.push_timeout(&[1.0; 8], Duration::from_millis(5));
        q.clear();
        assert_eq!(q.len_frames(), 0);
    }
}
