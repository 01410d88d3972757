//! layer-hoist - renders a sample scene through the layer hoisting pipeline.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{sample, DemoConfig, FrameRenderer};
use gpu::StaticGlInterface;
use hoister::RecordingPainter;

/// Render a sample scene with hoisted layers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of frames to render
    #[arg(long, default_value = "3")]
    frames: u32,

    /// Viewport width
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Viewport height
    #[arg(long, default_value = "720")]
    height: u32,

    /// How many times each sub-scene is drawn
    #[arg(long, default_value = "4")]
    copies: u32,

    /// Atlas page size
    #[arg(long, default_value = "2048")]
    atlas_size: u32,

    /// Maximum number of cached layers
    #[arg(long, default_value = "1024")]
    cache_capacity: usize,

    /// Render every layer into its own texture
    #[arg(long)]
    no_atlas: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> DemoConfig {
        DemoConfig::new()
            .with_viewport(self.width, self.height)
            .with_frames(self.frames)
            .with_copies(self.copies)
            .with_atlas_size(self.atlas_size)
            .with_cache_capacity(self.cache_capacity)
            .with_atlas(!self.no_atlas)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("layer-hoist v{}", cli::VERSION);

    let config = args.config();
    let renderer = FrameRenderer::new(config.clone(), &StaticGlInterface::headless())?;
    let scene = sample::demo_scene(config.viewport_width, config.viewport_height, config.copies);

    let mut painter = RecordingPainter::new();
    for _ in 0..config.frames {
        painter.clear();
        let report = renderer.render_frame(&scene, &mut painter);
        info!(
            frame = report.frame,
            hoisted = report.hoisted,
            atlased = report.hoist.atlased,
            standalone = report.hoist.non_atlased,
            recycled = report.hoist.recycled,
            aliases = report.hoist.aliases,
            oversized = report.hoist.oversized,
            rendered = report.hoist.rendered,
            failed = report.hoist.render_failures,
            quads = report.quads,
            inline_fills = report.inline_fills,
            commands = painter.commands().len(),
            "frame done"
        );
    }

    let cache = renderer.cache().stats();
    info!(
        entries = cache.entries,
        valid = cache.valid,
        evictions = cache.evictions,
        "shutdown complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::parse_from(["layer-hoist"]);
        assert_eq!(args.frames, 3);
        assert!(!args.no_atlas);
        assert!(args.config().atlas_enabled);
    }

    #[test]
    fn test_args_flags() {
        let args = Args::parse_from(["layer-hoist", "--no-atlas", "--copies", "9", "--cache-capacity", "8"]);
        let config = args.config();
        assert!(!config.atlas_enabled);
        assert_eq!(config.copies, 9);
        assert_eq!(config.cache_capacity, 8);
    }
}
