//! Periodic progress messages for long-running streams.

use log::info;
use std::time::{Duration, Instant};

/// Logs "N items processed" at most once per interval.
///
/// Message times are rounded down to a multiple of the interval so that they
/// stay on a regular grid (0, 15, 30, 45 ... seconds) instead of drifting.
#[derive(Debug)]
pub struct Progress {
    item_name: &'static str,
    interval: Option<Duration>,
    processed: u64,
    start: Instant,
    last: Instant,
}

impl Progress {
    /// `secs == 0` disables messages; items are still counted.
    pub fn new(item_name: &'static str, secs: u64) -> Self {
        let now = Instant::now();
        Self {
            item_name,
            interval: (secs > 0).then(|| Duration::from_secs(secs)),
            processed: 0,
            start: now,
            last: now,
        }
    }

    pub fn item_processed(&mut self) {
        self.items_processed(1);
    }

    pub fn items_processed(&mut self, n: u64) {
        self.processed += n;
        let Some(interval) = self.interval else {
            return;
        };

        let now = Instant::now();
        if now.duration_since(self.last) < interval {
            return;
        }

        let total = now.duration_since(self.start).as_secs();
        let step = interval.as_secs();
        self.last = self.start + Duration::from_secs(total / step * step);
        info!(
            "elapsed time: {} minutes {} seconds, {} {} processed",
            total / 60,
            total % 60,
            self.processed,
            self.unit()
        );
    }

    fn unit(&self) -> String {
        if self.processed == 1 {
            self.item_name.to_owned()
        } else {
            format!("{}s", self.item_name)
        }
    }
}
