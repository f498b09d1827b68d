use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tilecache_common::ChunkCoord;

use crate::indexer::ChunkRange;

/// The loads and unloads that bring a resident set in line with a range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResidencyDiff {
    /// In the range but not resident, row-major.
    pub to_load: Vec<ChunkCoord>,
    /// Resident but outside the range, sorted.
    pub to_unload: Vec<ChunkCoord>,
}

impl ResidencyDiff {
    pub fn compute<'a>(
        resident: impl IntoIterator<Item = &'a ChunkCoord>,
        range: ChunkRange,
    ) -> Self {
        let resident: HashSet<ChunkCoord> = resident.into_iter().copied().collect();

        let to_load: Vec<ChunkCoord> = range.iter().filter(|c| !resident.contains(c)).collect();

        let mut to_unload: Vec<ChunkCoord> = resident
            .iter()
            .filter(|c| !range.contains(**c))
            .copied()
            .collect();
        to_unload.sort();

        tracing::trace!(
            load = to_load.len(),
            unload = to_unload.len(),
            "residency diff"
        );

        Self { to_load, to_unload }
    }

    pub fn is_empty(&self) -> bool {
        self.to_load.is_empty() && self.to_unload.is_empty()
    }
}

/// Rolling window of frame durations for instrumentation.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one sample, evicting the oldest once full.
    pub fn record(&mut self, dt: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(dt);
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        self.samples.iter().sum::<Duration>() / self.samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.samples.iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.samples.iter().copied().min().unwrap_or(Duration::ZERO)
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(min: (i32, i32), max: (i32, i32)) -> ChunkRange {
        ChunkRange::new(ChunkCoord::new(min.0, min.1), ChunkCoord::new(max.0, max.1))
    }

    #[test]
    fn empty_resident_loads_whole_range() {
        let diff = ResidencyDiff::compute(Vec::<ChunkCoord>::new().iter(), range((0, 0), (2, 1)));
        assert_eq!(diff.to_load.len(), 6);
        assert!(diff.to_unload.is_empty());
        assert_eq!(diff.to_load[0], ChunkCoord::new(0, 0));
        assert_eq!(diff.to_load[3], ChunkCoord::new(0, 1));
    }

    #[test]
    fn scrolling_right_loads_and_unloads_columns() {
        let resident: Vec<ChunkCoord> = range((0, 0), (2, 1)).iter().collect();
        let diff = ResidencyDiff::compute(&resident, range((1, 0), (3, 1)));
        assert_eq!(
            diff.to_load,
            vec![ChunkCoord::new(3, 0), ChunkCoord::new(3, 1)]
        );
        assert_eq!(
            diff.to_unload,
            vec![ChunkCoord::new(0, 0), ChunkCoord::new(0, 1)]
        );
    }

    #[test]
    fn matching_resident_is_empty_diff() {
        let r = range((-1, -1), (1, 1));
        let resident: Vec<ChunkCoord> = r.iter().collect();
        assert!(ResidencyDiff::compute(&resident, r).is_empty());
    }

    #[test]
    fn frame_timer_tracks_window() {
        let mut timer = FrameTimer::new(3);
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        timer.record(Duration::from_millis(30));

        assert_eq!(timer.count(), 3);
        assert_eq!(timer.average(), Duration::from_millis(20));
        assert_eq!(timer.max(), Duration::from_millis(30));
        assert_eq!(timer.min(), Duration::from_millis(10));

        timer.record(Duration::from_millis(40));
        assert_eq!(timer.count(), 3);
        assert_eq!(timer.average(), Duration::from_millis(30));
        assert_eq!(timer.min(), Duration::from_millis(20));
    }

    #[test]
    fn empty_timer_reports_zero() {
        let timer = FrameTimer::default();
        assert_eq!(timer.average(), Duration::ZERO);
        assert_eq!(timer.max(), Duration::ZERO);
    }
}
