//! Rolling statistics over the last few animation ticks.

use std::{collections::VecDeque, time::Duration};
use web_time::Instant;

#[derive(Debug)]
pub struct TickTracker {
    tick_time_samples: usize,
    tick_time: VecDeque<Duration>,
    tick_timestamp: VecDeque<Instant>,
    tick_time_sum: Duration,
}

impl TickTracker {
    pub fn new(tick_time_samples: usize) -> Self {
        Self {
            tick_time_samples: tick_time_samples.max(1),
            tick_time: VecDeque::new(),
            tick_timestamp: VecDeque::new(),
            tick_time_sum: Duration::ZERO,
        }
    }

    pub fn tick_time(&self) -> &VecDeque<Duration> {
        &self.tick_time
    }

    /// Time spent inside a tick, averaged over the kept samples.
    pub fn avg_tick_time(&self) -> Option<Duration> {
        if self.tick_time.is_empty() {
            None
        } else {
            Some(self.tick_time_sum / self.tick_time.len() as u32)
        }
    }

    pub fn last_tick_time(&self) -> Option<&Duration> {
        self.tick_time.back()
    }

    /// Record a tick that took `tick_time` and started at `tick_timestamp`.
    pub fn add_sample(&mut self, tick_time: Duration, tick_timestamp: Instant) {
        self.tick_time.push_back(tick_time);
        self.tick_time_sum += tick_time;
        while self.tick_time.len() > self.tick_time_samples {
            if let Some(first_tick_time) = self.tick_time.pop_front() {
                self.tick_time_sum -= first_tick_time;
            }
        }

        self.tick_timestamp.push_back(tick_timestamp);
        while self.tick_timestamp.len() > self.tick_time_samples {
            self.tick_timestamp.pop_front();
        }
    }

    /// Rate at which ticks started, from the timestamps of the kept samples.
    pub fn ticks_per_second(&self) -> Option<f32> {
        self.tick_timestamp
            .front()
            .zip(self.tick_timestamp.back())
            .take_if(|(first, last)| first != last)
            .map(|(first, last)| {
                let intervals = self.tick_timestamp.len() - 1;
                let duration = *last - *first;
                let avg_duration = duration.as_nanos() as f32 / intervals as f32;
                let one_second = Duration::from_secs(1).as_nanos() as f32;
                one_second / avg_duration
            })
    }
}
