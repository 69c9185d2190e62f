use std::{sync::Arc, time::Duration};

use chrono::Local;
use tokio::time;
use tracing::debug;

use crate::stats::aggregate::{Aggregator, SniffStats};

/// Periodic status printer.
///
/// Each report is a blank line, a dated header with process-wide totals
/// and global latency, then the top fingerprint rows. Rows are
/// pre-rendered with the count in the leading fixed-width field and
/// sorted as strings descending, so lexicographic order tracks count.
pub struct Reporter {
    period: Duration,
    display_count: usize,
    aggregator: Arc<Aggregator>,
    stats: Arc<SniffStats>,
}

impl Reporter {
    pub fn new(
        period: Duration,
        display_count: usize,
        aggregator: Arc<Aggregator>,
        stats: Arc<SniffStats>,
    ) -> Self {
        Self {
            period,
            display_count,
            aggregator,
            stats,
        }
    }

    pub async fn run(self) {
        let mut ticker = time::interval(self.period);
        // The first tick completes immediately; skip it so the first
        // report covers a full period.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!("rendering status report");
            self.print_report();
        }
    }

    fn print_report(&self) {
        let elapsed = self.stats.elapsed_secs();
        let global = self.stats.latencies().stats();

        println!();
        println!(
            "{} {} total queries, {:.2} per second",
            Local::now().format("%Y/%m/%d %H:%M:%S"),
            self.stats.queries(),
            self.stats.queries() as f64 / elapsed
        );
        println!(
            "    {:.2}ms min / {:.2}ms avg / {:.2}ms max query time",
            global.min_ms, global.avg_ms, global.max_ms
        );

        for row in self.render_rows(elapsed) {
            println!("{row}");
        }
    }

    /// Render, sort, and truncate the per-fingerprint rows.
    fn render_rows(&self, elapsed: f64) -> Vec<String> {
        let mut rows: Vec<String> = self
            .aggregator
            .snapshot()
            .into_iter()
            .map(|(fingerprint, entry)| {
                let lat = entry.latencies().stats();
                format!(
                    "{:6}  {:6.2}/s  {:6.2} {:6.2} {:6.2} {:8}b  {}",
                    entry.count(),
                    entry.count() as f64 / elapsed,
                    lat.min_ms,
                    lat.avg_ms,
                    lat.max_ms,
                    entry.bytes(),
                    fingerprint
                )
            })
            .collect();
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.truncate(self.display_count);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter(display_count: usize) -> Reporter {
        Reporter::new(
            Duration::from_secs(10),
            display_count,
            Arc::new(Aggregator::default()),
            Arc::new(SniffStats::new()),
        )
    }

    #[test]
    fn rows_are_sorted_by_count_descending() {
        let rep = reporter(25);
        for _ in 0..12 {
            rep.aggregator.entry("users:hot").record_query();
        }
        rep.aggregator.entry("users:cold").record_query();

        let rows = rep.render_rows(60.0);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("users:hot"));
        assert!(rows[0].trim_start().starts_with("12"));
        assert!(rows[1].contains("users:cold"));
    }

    #[test]
    fn rows_are_truncated_to_display_count() {
        let rep = reporter(3);
        for i in 0..10 {
            rep.aggregator.entry(&format!("bucket:{i}")).record_query();
        }
        assert_eq!(rep.render_rows(60.0).len(), 3);
    }

    #[test]
    fn row_carries_count_rate_latency_and_bytes() {
        let rep = reporter(25);
        let entry = rep.aggregator.entry("users:42");
        entry.record_query();
        entry.record_response(0, 5_000_000, 200);

        let rows = rep.render_rows(10.0);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!(row.contains("0.10/s"), "rate missing in {row:?}");
        assert!(row.contains("5.00"), "latency missing in {row:?}");
        assert!(row.contains("200b"), "bytes missing in {row:?}");
        assert!(row.ends_with("users:42"));
    }
}
