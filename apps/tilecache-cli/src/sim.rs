use std::time::Duration;

use glam::Vec2;
use tilecache_common::{CacheConfig, Camera, Color, TilePos};
use tilecache_pipeline::{FrameReport, TileRenderer};
use tilecache_render::DrawBackend;
use tilecache_world::registry::ids;
use tilecache_world::{LightField, SightModes, Tile, TileWorld, WorldLighting};

/// Knobs for one simulated session.
#[derive(Debug, Clone)]
pub struct SimOptions {
    pub frames: u64,
    pub seed: u64,
    pub world_tiles: (u32, u32),
    pub viewport: (u32, u32),
    pub edits_per_frame: u32,
    pub scroll_speed: f32,
    pub sight: SightModes,
}

/// Totals for a finished session.
#[derive(Debug, Clone, Copy)]
pub struct SimSummary {
    pub totals: FrameReport,
    pub avg_frame: Duration,
    pub min_frame: Duration,
    pub max_frame: Duration,
    pub world_hash: u64,
}

fn next(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Camera path: a slow horizontal scroll with a vertical sway.
fn camera_at(frame: u64, options: &SimOptions) -> Camera {
    let t = frame as f32;
    Camera::new(
        Vec2::new(t * options.scroll_speed, 160.0 + (t * 0.05).sin() * 96.0),
        options.viewport.0,
        options.viewport.1,
    )
}

/// Drive a renderer over a generated world for `options.frames` frames.
/// Edits are made on this thread and reported from a worker thread through
/// the renderer handle. The renderer is shut down before returning.
pub fn run<B: DrawBackend + 'static>(
    backend: &mut B,
    config: CacheConfig,
    options: &SimOptions,
    mut on_frame: impl FnMut(&FrameReport),
) -> anyhow::Result<SimSummary> {
    let mut renderer = TileRenderer::new(config)?;
    let (w, h) = options.world_tiles;
    let mut world = TileWorld::generate(w, h, options.seed);
    let mut field = LightField {
        sight: options.sight,
        ..LightField::default()
    };
    let mut rng = options.seed ^ 0xA5A5_5A5A;
    for _ in 0..(w / 40).max(1) {
        let x = (next(&mut rng) % w as u64) as i32;
        let y = (next(&mut rng) % h as u64) as i32;
        field.add_light(TilePos::new(x, y), Color::rgb(255, 220, 160), 14.0);
    }
    let handle = renderer.handle();
    let solid = [ids::DIRT, ids::STONE, ids::ORE];

    for frame in 0..options.frames {
        let camera = camera_at(frame, options);
        let view = camera.pixel_rect();
        let ts = renderer.grid().tile_size();
        for _ in 0..options.edits_per_frame {
            let x = view.x / ts + (next(&mut rng) % (view.width / ts).max(1) as u64) as i32;
            let y = view.y / ts + (next(&mut rng) % (view.height / ts).max(1) as u64) as i32;
            if next(&mut rng) % 3 == 0 {
                world.clear_tile(x, y);
            } else {
                let type_id = solid[(next(&mut rng) % solid.len() as u64) as usize];
                world.set_tile(x, y, Tile::new(type_id));
            }
        }
        let events = world.drain_events();
        let notifier = handle.clone();
        std::thread::scope(|s| {
            s.spawn(move || {
                for event in events {
                    notifier.notify_event(event);
                }
            });
        });

        let lights = WorldLighting::new(&world, &field);
        renderer.update(backend, &world, &lights, camera);
        let report = renderer.draw(backend, &world);
        on_frame(&report);
    }

    let stats = renderer.stats();
    let summary = SimSummary {
        totals: *stats.totals(),
        avg_frame: stats.timer().average(),
        min_frame: stats.timer().min(),
        max_frame: stats.timer().max(),
        world_hash: world.state_hash(),
    };
    renderer.shutdown(backend);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecache_render::RecordingBackend;

    fn options() -> SimOptions {
        SimOptions {
            frames: 8,
            seed: 1,
            world_tiles: (300, 120),
            viewport: (640, 360),
            edits_per_frame: 3,
            scroll_speed: 24.0,
            sight: SightModes::TREASURE,
        }
    }

    #[test]
    fn simulation_is_deterministic_and_releases_everything() {
        let mut a = RecordingBackend::new(640, 360);
        let mut b = RecordingBackend::new(640, 360);
        let mut frames = 0;
        let first = run(&mut a, CacheConfig::default(), &options(), |_| frames += 1).unwrap();
        let second = run(&mut b, CacheConfig::default(), &options(), |_| {}).unwrap();

        assert_eq!(frames, 8);
        assert_eq!(first.totals.frame, 8);
        assert_eq!(first.world_hash, second.world_hash);
        assert_eq!(first.totals.chunks_loaded, second.totals.chunks_loaded);
        assert_eq!(a.live_surfaces(), 0);
        assert_eq!(a.screen_hash(), b.screen_hash());
    }

    #[test]
    fn camera_path_is_continuous() {
        let o = options();
        let c0 = camera_at(0, &o);
        let c1 = camera_at(1, &o);
        assert_eq!(c0.size(), (640, 360));
        assert!((c1.origin.x - c0.origin.x - o.scroll_speed).abs() < 1e-4);
        assert!((c1.origin.y - c0.origin.y).abs() < 5.0);
    }
}
