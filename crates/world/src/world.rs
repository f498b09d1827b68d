use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tilecache_common::TilePos;

use crate::registry::{ids, ContentRegistry};
use crate::source::{FrameRect, Tile, TileSource, Wall};

bitflags! {
    /// World-wide visual state. Any change invalidates every cached chunk.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct VisibilityFlags: u8 {
        const ECHO = 1 << 0;
        const INVISIBLE_BLOCKS = 1 << 1;
        const INVISIBLE_WALLS = 1 << 2;
    }
}

/// An edit record produced by every mutation of the tile grid.
///
/// Hosts forward these to the renderer's invalidation hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileEvent {
    TileChanged { pos: TilePos, tile: Tile },
    WallChanged { pos: TilePos, wall: Wall },
    VisibilityChanged(VisibilityFlags),
}

/// A bounded, row-major tile grid.
///
/// Cells outside `[0, width) x [0, height)` are not in the world. Every
/// mutation appends a [`TileEvent`] to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileWorld {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    walls: Vec<Wall>,
    registry: ContentRegistry,
    visibility: VisibilityFlags,
    #[serde(skip)]
    event_log: Vec<TileEvent>,
}

impl TileWorld {
    /// An empty world: no active tiles and no walls.
    pub fn new(width: u32, height: u32, registry: ContentRegistry) -> Self {
        let len = width as usize * height as usize;
        Self {
            width: width as i32,
            height: height as i32,
            tiles: vec![Tile::default(); len],
            walls: vec![Wall::NONE; len],
            registry,
            visibility: VisibilityFlags::empty(),
            event_log: Vec::new(),
        }
    }

    /// Deterministic terrain: a rolling surface with plants and torches,
    /// dirt over stone with ore and chests underground, walls behind the
    /// underground and occasional animated waterfall walls.
    ///
    /// Same seed and size always yield the same [`TileWorld::state_hash`].
    /// Generation does not log events.
    pub fn generate(width: u32, height: u32, seed: u64) -> Self {
        let mut world = Self::new(width, height, ContentRegistry::standard());
        let mut rng = seed;
        let base = world.height / 3;
        let mut surface = base;

        for x in 0..world.width {
            rng = splitmix64(rng);
            // Random walk, clamped to a band around the base height.
            surface = (surface + (rng % 3) as i32 - 1).clamp(base - 8, base + 8).max(1);

            for y in 0..world.height {
                rng = splitmix64(rng);
                let roll = rng % 1000;
                let idx = world.index(x, y);
                let frame = FrameRect::new((rng % 3) as u16 * 18, 0, 16, 16);

                if y == surface - 1 && roll < 150 {
                    world.tiles[idx] = Tile::new(ids::GRASS_PLANT).with_frame(frame);
                } else if y >= surface {
                    let depth = y - surface;
                    let type_id = if depth < 6 {
                        ids::DIRT
                    } else if roll < 12 {
                        ids::ORE
                    } else {
                        ids::STONE
                    };
                    let cave = depth > 10 && roll % 7 == 0;
                    if cave {
                        if roll < 20 {
                            world.tiles[idx] = Tile::new(ids::TORCH).with_frame(frame);
                        } else if roll > 995 {
                            world.tiles[idx] = Tile::new(ids::CHEST).with_frame(frame);
                        }
                    } else {
                        world.tiles[idx] = Tile::new(type_id).with_frame(frame);
                    }
                    world.walls[idx] = if depth > 10 && roll % 97 == 0 {
                        Wall::new(ids::WATERFALL_WALL)
                    } else if depth > 0 {
                        Wall::new(ids::DIRT_WALL)
                    } else {
                        Wall::NONE
                    };
                }
            }
        }

        tracing::debug!(width, height, seed, "generated tile world");
        world
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn registry(&self) -> &ContentRegistry {
        &self.registry
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    /// Place a tile. Returns false, and logs nothing, outside the world or
    /// when the cell already holds `tile`.
    pub fn set_tile(&mut self, x: i32, y: i32, tile: Tile) -> bool {
        if !self.in_world(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        if self.tiles[idx] == tile {
            return false;
        }
        self.tiles[idx] = tile;
        self.event_log.push(TileEvent::TileChanged {
            pos: TilePos::new(x, y),
            tile,
        });
        true
    }

    pub fn clear_tile(&mut self, x: i32, y: i32) -> bool {
        self.set_tile(x, y, Tile::default())
    }

    /// Same contract as [`set_tile`](Self::set_tile).
    pub fn set_wall(&mut self, x: i32, y: i32, wall: Wall) -> bool {
        if !self.in_world(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        if self.walls[idx] == wall {
            return false;
        }
        self.walls[idx] = wall;
        self.event_log.push(TileEvent::WallChanged {
            pos: TilePos::new(x, y),
            wall,
        });
        true
    }

    /// Replace the visibility flags, logging only an actual change.
    pub fn set_visibility(&mut self, flags: VisibilityFlags) {
        if flags == self.visibility {
            return;
        }
        self.visibility = flags;
        self.event_log.push(TileEvent::VisibilityChanged(flags));
    }

    pub fn drain_events(&mut self) -> Vec<TileEvent> {
        std::mem::take(&mut self.event_log)
    }

    pub fn events(&self) -> &[TileEvent] {
        &self.event_log
    }

    /// Apply logged events to this world without logging them again.
    pub fn apply(&mut self, events: &[TileEvent]) {
        for event in events {
            match *event {
                TileEvent::TileChanged { pos, tile } => {
                    if self.in_world(pos.x, pos.y) {
                        let idx = self.index(pos.x, pos.y);
                        self.tiles[idx] = tile;
                    }
                }
                TileEvent::WallChanged { pos, wall } => {
                    if self.in_world(pos.x, pos.y) {
                        let idx = self.index(pos.x, pos.y);
                        self.walls[idx] = wall;
                    }
                }
                TileEvent::VisibilityChanged(flags) => self.visibility = flags,
            }
        }
    }

    /// FNV-1a over size, visibility and every cell in row-major order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.width.to_le_bytes());
        mix(&mut h, &self.height.to_le_bytes());
        mix(&mut h, &[self.visibility.bits()]);
        for (tile, wall) in self.tiles.iter().zip(&self.walls) {
            mix(&mut h, &[tile.active as u8]);
            mix(&mut h, &tile.type_id.to_le_bytes());
            mix(&mut h, &tile.frame.x.to_le_bytes());
            mix(&mut h, &tile.frame.y.to_le_bytes());
            mix(&mut h, &wall.type_id.to_le_bytes());
        }
        h
    }
}

impl TileSource for TileWorld {
    fn in_world(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn tile_at(&self, x: i32, y: i32) -> Tile {
        if !self.in_world(x, y) {
            return Tile::default();
        }
        self.tiles[self.index(x, y)]
    }

    fn wall_at(&self, x: i32, y: i32) -> Wall {
        if !self.in_world(x, y) {
            return Wall::NONE;
        }
        self.walls[self.index(x, y)]
    }

    fn is_possibly_animated(&self, type_id: u16, is_wall: bool) -> bool {
        self.registry.is_possibly_animated(type_id, is_wall)
    }

    fn is_solid(&self, type_id: u16) -> bool {
        self.registry.is_solid(type_id)
    }

    fn visibility(&self) -> VisibilityFlags {
        self.visibility
    }
}

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
