use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

/// Minimum spacing between progress log lines.
const LOG_INTERVAL: Duration = Duration::from_millis(500);

/// Rate-limited transfer progress reporting: logs on the leading edge, then
/// at most every 500ms, then a final line on `finish`.
#[derive(Debug)]
pub struct ProgressReporter {
    label: String,
    total_bytes: Option<u64>,
    transferred: u64,
    last_logged: Option<Instant>,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, total_bytes: Option<u64>) -> Self {
        Self {
            label: label.into(),
            total_bytes,
            transferred: 0,
            last_logged: None,
        }
    }

    /// Record `bytes` more transferred, logging if the rate limit allows.
    pub fn record(&mut self, bytes: u64) {
        self.transferred += bytes;
        let now = Instant::now();
        let due = match self.last_logged {
            None => true,
            Some(at) => now.duration_since(at) >= LOG_INTERVAL,
        };
        if due {
            self.log();
            self.last_logged = Some(now);
        }
    }

    /// Log the final tally regardless of rate limiting.
    pub fn finish(&self) {
        self.log();
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    fn log(&self) {
        match self.total_bytes {
            Some(total) => info!(
                "{}: {:.2}MB/{:.2}MB",
                self.label,
                mb(self.transferred),
                mb(total)
            ),
            None => info!("{}: {:.2}MB", self.label, mb(self.transferred)),
        }
    }
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
