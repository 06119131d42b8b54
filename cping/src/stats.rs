use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::sender::EchoRecord;

/// Aggregate over every recorded attempt of a run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub percent: f64,
    pub succeeded: usize,
    pub attempted: usize,
    pub min_ms: i64,
    pub avg_ms: i64,
    pub max_ms: i64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Success rate is {:.1} percent ({}/{}), round-trip min/avg/max = {}/{}/{} ms",
            self.percent, self.succeeded, self.attempted, self.min_ms, self.avg_ms, self.max_ms
        )
    }
}

fn unix_millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

/// Round trip in whole milliseconds, truncating each timestamp first.
pub fn rtt_ms(record: &EchoRecord) -> i64 {
    unix_millis(record.received) - unix_millis(record.sent)
}

pub fn summarize(records: &[EchoRecord]) -> Summary {
    let mut summary = Summary {
        attempted: records.len(),
        ..Summary::default()
    };

    let mut total = 0i64;
    let mut min: Option<i64> = None;

    for record in records.iter().filter(|r| r.outcome.is_reply()) {
        let rtt = rtt_ms(record);
        summary.succeeded += 1;
        total += rtt;

        min = Some(min.map_or(rtt, |m| m.min(rtt)));
        if summary.succeeded == 1 || rtt > summary.max_ms {
            summary.max_ms = rtt;
        }
    }

    if summary.succeeded > 0 {
        summary.min_ms = min.unwrap_or_default();
        summary.avg_ms = total / summary.succeeded as i64;
        summary.percent = (summary.succeeded as f64 * 100.0) / summary.attempted as f64;
    }

    summary
}
