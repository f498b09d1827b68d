use std::sync::{Arc, Mutex, MutexGuard};

use tilecache_common::TilePos;
use tilecache_grid::GridIndexer;
use tilecache_world::{TileEvent, VisibilityFlags};

use crate::collection::ChunkCollection;

/// An edit notification waiting to be turned into dirty marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    Tile(TilePos),
    Wall(TilePos),
    Visibility(VisibilityFlags),
}

impl From<TileEvent> for Invalidation {
    fn from(event: TileEvent) -> Self {
        match event {
            TileEvent::TileChanged { pos, .. } => Invalidation::Tile(pos),
            TileEvent::WallChanged { pos, .. } => Invalidation::Wall(pos),
            TileEvent::VisibilityChanged(flags) => Invalidation::Visibility(flags),
        }
    }
}

/// Edit notifications shared between any number of producer threads and the
/// render thread, which applies them once per frame.
#[derive(Debug, Clone, Default)]
pub struct InvalidationQueue {
    pending: Arc<Mutex<Vec<Invalidation>>>,
}

impl InvalidationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Invalidation>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, invalidation: Invalidation) {
        self.lock().push(invalidation);
    }

    pub fn tile_changed(&self, x: i32, y: i32) {
        self.push(Invalidation::Tile(TilePos::new(x, y)));
    }

    pub fn wall_changed(&self, x: i32, y: i32) {
        self.push(Invalidation::Wall(TilePos::new(x, y)));
    }

    pub fn visibility_changed(&self, flags: VisibilityFlags) {
        self.push(Invalidation::Visibility(flags));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn drain(&self) -> Vec<Invalidation> {
        std::mem::take(&mut *self.lock())
    }

    /// Turn every pending notification into dirty marks.
    ///
    /// Tile edits reach the two tile layers, wall edits the wall layer, and
    /// visibility changes every layer. Edits near a chunk edge also mark the
    /// neighbours across it. Returns how many marks landed on loaded chunks.
    pub fn apply(
        &self,
        grid: &GridIndexer,
        edge_threshold: i32,
        collections: &mut [ChunkCollection],
    ) -> usize {
        let mut marked = 0;
        for invalidation in self.drain() {
            match invalidation {
                Invalidation::Tile(pos) | Invalidation::Wall(pos) => {
                    let walls = matches!(invalidation, Invalidation::Wall(_));
                    let affected = grid.affected_chunks(pos, edge_threshold);
                    for collection in collections
                        .iter_mut()
                        .filter(|c| c.layer().is_wall() == walls)
                    {
                        for coord in &affected {
                            if collection.mark_dirty(*coord) {
                                marked += 1;
                            }
                        }
                    }
                }
                Invalidation::Visibility(flags) => {
                    tracing::debug!(?flags, "visibility changed, invalidating all layers");
                    for collection in collections.iter_mut() {
                        marked += collection.mark_all_dirty();
                    }
                }
            }
        }
        if marked > 0 {
            tracing::trace!(marked, "invalidations applied");
        }
        marked
    }
}
