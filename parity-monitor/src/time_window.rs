use serde::Serialize;

const DEFAULT_BUFFER_MINUTES: u64 = 5;

/// The range of history a comparison looks at, in epoch seconds.
///
/// An unbounded window asks both systems for everything they still hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl TimeWindow {
    /// The last polling interval plus a buffer, so messages that land late on either side
    /// are still seen by the next run.
    pub fn trailing(now_secs: i64, polling_interval_minutes: u64, buffer_minutes: u64) -> Self {
        let buffer = if buffer_minutes == 0 {
            DEFAULT_BUFFER_MINUTES
        } else {
            buffer_minutes
        };
        let span_secs = i64::try_from((polling_interval_minutes + buffer) * 60).unwrap_or(i64::MAX);

        TimeWindow {
            from: Some(now_secs.saturating_sub(span_secs)),
            to: Some(now_secs),
        }
    }

    pub fn unbounded() -> Self {
        TimeWindow {
            from: None,
            to: None,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Query parameters for the fetch APIs. An unbounded window sends none.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(2);
        if let Some(from) = self.from {
            pairs.push(("start", from.to_string()));
        }
        if let Some(to) = self.to {
            pairs.push(("end", to.to_string()));
        }
        pairs
    }
}
