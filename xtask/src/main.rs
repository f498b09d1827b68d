use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for tilecache")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: fmt, clippy, tests, doc
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
    /// Run the grid and lighting timing benches
    Bench,
    /// Short headless simulation through the CLI
    Smoke {
        /// Frames to simulate
        #[arg(short, long, default_value = "30")]
        frames: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            run_fmt()?;
            run_clippy()?;
            run_tests()?;
            run_doc()?;
        }
        Commands::Fmt => run_fmt()?,
        Commands::Clippy => run_clippy()?,
        Commands::Test => run_tests()?,
        Commands::Doc => run_doc()?,
        Commands::Build => cargo("build", &["build", "--workspace"])?,
        Commands::Bench => run_bench()?,
        Commands::Smoke { frames } => run_smoke(frames)?,
    }

    Ok(())
}

fn cargo(what: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {what} failed");
    }
    Ok(())
}

fn run_fmt() -> Result<()> {
    cargo("fmt check", &["fmt", "--all", "--", "--check"])
}

fn run_clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn run_tests() -> Result<()> {
    cargo("test", &["test", "--workspace"])
}

fn run_doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}

fn run_bench() -> Result<()> {
    cargo(
        "bench",
        &["bench", "-p", "tilecache-grid", "-p", "tilecache-lighting"],
    )
}

fn run_smoke(frames: u32) -> Result<()> {
    let frames = frames.to_string();
    cargo(
        "run (smoke)",
        &[
            "run",
            "-p",
            "tilecache-cli",
            "--",
            "simulate",
            "--frames",
            &frames,
        ],
    )
}
