/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::cmp::{self, Ord};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use base::id::{DocumentLoaderId, FrameId};
use rustc_hash::FxHashSet;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimerId(u64);

/// Deferred work queued by frame loaders.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TimerTask {
    /// Hand the substitute data of a provisional load to the frame.
    DeliverSubstituteData {
        frame: FrameId,
        loader: DocumentLoaderId,
    },
    /// Check whether a frame and its subframes finished loading.
    CheckLoadComplete { frame: FrameId },
    /// Perform a redirect requested by `FrameLoader::schedule_redirect`.
    Redirect { frame: FrameId },
}

struct ScheduledTimer {
    id: TimerId,
    for_time: Instant,
    task: TimerTask,
}

impl Ord for ScheduledTimer {
    fn cmp(&self, other: &ScheduledTimer) -> cmp::Ordering {
        // Earliest deadline first; timers with the same deadline fire in the
        // order they were queued.
        (self.for_time, self.id)
            .cmp(&(other.for_time, other.id))
            .reverse()
    }
}

impl PartialOrd for ScheduledTimer {
    fn partial_cmp(&self, other: &ScheduledTimer) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for ScheduledTimer {}
impl PartialEq for ScheduledTimer {
    fn eq(&self, other: &ScheduledTimer) -> bool {
        self.id == other.id
    }
}

/// A per-page queue of one-shot tasks. Nothing runs on its own: the page pulls
/// due tasks out while loading is not deferred.
#[derive(Default)]
pub struct TimerScheduler {
    queue: BinaryHeap<ScheduledTimer>,
    cancelled: FxHashSet<TimerId>,
    next_timer_id: u64,
}

impl TimerScheduler {
    pub fn queue_timer(&mut self, for_time: Instant, task: TimerTask) -> TimerId {
        self.next_timer_id += 1;
        let id = TimerId(self.next_timer_id);
        self.queue.push(ScheduledTimer { id, for_time, task });
        id
    }

    pub fn cancel_timer(&mut self, id: TimerId) {
        if self.queue.iter().any(|timer| timer.id == id) {
            self.cancelled.insert(id);
        }
    }

    /// The next task whose deadline is not after `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerTask> {
        loop {
            if self.queue.peek().is_none_or(|timer| timer.for_time > now) {
                return None;
            }
            let timer = self.queue.pop()?;
            if !self.cancelled.remove(&timer.id) {
                return Some(timer.task);
            }
        }
    }

    /// How long until the next timer is due, if any is queued.
    pub fn timer_timeout(&self, now: Instant) -> Option<Duration> {
        self.queue
            .iter()
            .filter(|timer| !self.cancelled.contains(&timer.id))
            .map(|timer| timer.for_time.saturating_duration_since(now))
            .min()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.len() == self.cancelled.len()
    }
}
