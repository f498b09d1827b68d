mod sim;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tilecache_common::CacheConfig;
use tilecache_render::{RecordingBackend, RenderTarget};
use tilecache_render_wgpu::WgpuBackend;
use tilecache_world::SightModes;
use tracing_subscriber::EnvFilter;

use crate::sim::{SimOptions, SimSummary};

#[derive(Parser)]
#[command(name = "tilecache", about = "Headless driver for the tile chunk cache")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Cache configuration file (.yaml, .yml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Sight {
    Danger,
    Treasure,
    Biome,
}

#[derive(clap::Args, Debug)]
struct SimArgs {
    /// Frames to simulate
    #[arg(short, long, default_value = "120")]
    frames: u64,
    /// World generation and edit seed
    #[arg(short, long, default_value = "42")]
    seed: u64,
    /// World width in tiles
    #[arg(long, default_value = "1200")]
    world_width: u32,
    /// World height in tiles
    #[arg(long, default_value = "400")]
    world_height: u32,
    /// Viewport width in pixels
    #[arg(long, default_value = "1280")]
    width: u32,
    /// Viewport height in pixels
    #[arg(long, default_value = "720")]
    height: u32,
    /// Random tile edits per frame
    #[arg(short, long, default_value = "4")]
    edits: u32,
    /// Camera scroll in pixels per frame
    #[arg(long, default_value = "6.5")]
    scroll: f32,
    /// Special-sight modes to enable
    #[arg(long, value_enum)]
    sight: Vec<Sight>,
}

impl SimArgs {
    fn options(&self) -> SimOptions {
        let sight = self.sight.iter().fold(SightModes::empty(), |acc, s| {
            acc | match s {
                Sight::Danger => SightModes::DANGER,
                Sight::Treasure => SightModes::TREASURE,
                Sight::Biome => SightModes::BIOME,
            }
        });
        SimOptions {
            frames: self.frames,
            seed: self.seed,
            world_tiles: (self.world_width, self.world_height),
            viewport: (self.width, self.height),
            edits_per_frame: self.edits,
            scroll_speed: self.scroll,
            sight,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Run frames against the software recording backend
    Simulate(SimArgs),
    /// Run frames on a headless GPU device
    Gpu(SimArgs),
    /// Print the effective configuration
    Config {
        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<CacheConfig> {
    match path {
        Some(path) => CacheConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(CacheConfig::default()),
    }
}

fn print_summary(summary: &SimSummary) {
    let t = &summary.totals;
    println!("frames:        {}", t.frame);
    println!("loaded:        {}", t.chunks_loaded);
    println!("unloaded:      {}", t.chunks_unloaded);
    println!("repopulated:   {}", t.chunks_repopulated);
    println!("dirty marks:   {}", t.dirty_marks);
    println!("animated:      {}", t.animated_draws);
    println!("resident:      {}", t.resident_chunks);
    println!(
        "lighting:      {:?} total, {:?} per frame",
        t.lighting_compute,
        t.lighting_compute / t.frame.max(1) as u32
    );
    println!(
        "frame time:    avg {:?}, min {:?}, max {:?}",
        summary.avg_frame, summary.min_frame, summary.max_frame
    );
    println!("world hash:    {:#018x}", summary.world_hash);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Info => {
            println!("tilecache v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", tilecache_common::crate_info());
            println!("grid: {}", tilecache_grid::crate_info());
            println!("world: {}", tilecache_world::crate_info());
            println!("render: {}", tilecache_render::crate_info());
            println!("chunks: {}", tilecache_chunks::crate_info());
            println!("lighting: {}", tilecache_lighting::crate_info());
            println!("pipeline: {}", tilecache_pipeline::crate_info());
            println!("render-wgpu: {}", tilecache_render_wgpu::crate_info());
            println!("chunk size: {} px", config.chunk_size());
        }
        Commands::Simulate(args) => {
            let options = args.options();
            println!(
                "Simulating {} frames at {}x{} (seed {})",
                options.frames, options.viewport.0, options.viewport.1, options.seed
            );
            let mut backend = RecordingBackend::new(options.viewport.0, options.viewport.1);
            let summary = sim::run(&mut backend, config, &options, |report| {
                tracing::debug!(
                    frame = report.frame,
                    loaded = report.chunks_loaded,
                    repopulated = report.chunks_repopulated,
                    "frame"
                );
            })?;
            print_summary(&summary);
            println!("screen hash:   {}", backend.screen_hash());
            println!("live surfaces: {}", backend.live_surfaces());
        }
        Commands::Gpu(args) => {
            let options = args.options();
            let mut backend = WgpuBackend::headless(options.viewport.0, options.viewport.1)
                .context("creating headless GPU backend")?;
            println!("Running {} frames on {:?}", options.frames, backend);
            let summary = sim::run(&mut backend, config, &options, |_| {})?;
            print_summary(&summary);
            let pixels = backend.read_pixels(RenderTarget::Screen)?;
            let lit = pixels.iter().filter(|c| c.r > 0 || c.g > 0 || c.b > 0).count();
            println!("lit pixels:    {lit} / {}", pixels.len());
            println!("draw calls:    {}", backend.draw_calls());
        }
        Commands::Config { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", serde_yaml::to_string(&config)?);
            }
        }
    }

    Ok(())
}
