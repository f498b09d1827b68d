use std::time::Duration;

use tilecache_chunks::CollectionStats;
use tilecache_grid::FrameTimer;

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub chunks_loaded: usize,
    pub chunks_unloaded: usize,
    pub chunks_repopulated: usize,
    pub resident_chunks: usize,
    pub dirty_marks: usize,
    pub deferred_actions: usize,
    pub animated_draws: usize,
    pub lighting_compute: Duration,
}

impl FrameReport {
    pub(crate) fn add_layer(&mut self, stats: CollectionStats, resident: usize) {
        self.chunks_loaded += stats.loaded;
        self.chunks_unloaded += stats.unloaded;
        // Loading a chunk populates it once; count only the repopulations.
        self.chunks_repopulated += stats.populated.saturating_sub(stats.loaded);
        self.resident_chunks += resident;
    }
}

/// Per-frame reports plus running totals and frame timing.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    last: FrameReport,
    totals: FrameReport,
    timer: FrameTimer,
}

impl FrameStats {
    pub fn last(&self) -> &FrameReport {
        &self.last
    }

    /// Counters summed over every finished frame. `frame` holds the number
    /// of frames, `resident_chunks` the latest value.
    pub fn totals(&self) -> &FrameReport {
        &self.totals
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub(crate) fn finish(&mut self, report: FrameReport, elapsed: Duration) {
        let t = &mut self.totals;
        t.frame += 1;
        t.chunks_loaded += report.chunks_loaded;
        t.chunks_unloaded += report.chunks_unloaded;
        t.chunks_repopulated += report.chunks_repopulated;
        t.resident_chunks = report.resident_chunks;
        t.dirty_marks += report.dirty_marks;
        t.deferred_actions += report.deferred_actions;
        t.animated_draws += report.animated_draws;
        t.lighting_compute += report.lighting_compute;
        self.last = report;
        self.timer.record(elapsed);
        tracing::trace!(
            frame = report.frame,
            loaded = report.chunks_loaded,
            unloaded = report.chunks_unloaded,
            repopulated = report.chunks_repopulated,
            animated = report.animated_draws,
            "frame finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repopulations_exclude_initial_loads() {
        let mut report = FrameReport::default();
        report.add_layer(
            CollectionStats {
                loaded: 3,
                unloaded: 1,
                populated: 5,
            },
            10,
        );
        assert_eq!(report.chunks_repopulated, 2);
        assert_eq!(report.resident_chunks, 10);
    }

    #[test]
    fn totals_accumulate() {
        let mut stats = FrameStats::default();
        for i in 0..3 {
            let report = FrameReport {
                frame: i,
                chunks_loaded: 2,
                animated_draws: 5,
                ..FrameReport::default()
            };
            stats.finish(report, Duration::from_millis(4));
        }
        assert_eq!(stats.totals().frame, 3);
        assert_eq!(stats.totals().chunks_loaded, 6);
        assert_eq!(stats.totals().animated_draws, 15);
        assert_eq!(stats.last().frame, 2);
        assert_eq!(stats.timer().average(), Duration::from_millis(4));
    }
}
