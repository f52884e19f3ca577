use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tileset_core::{BuildOptions, CacheStore, LoaderMode, LoaderOutput, build_tileset};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "tileset",
    about = "Pack frames into a sprite-sheet atlas",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(short, long, default_value_t = false, global = true, help_heading = "Logging")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build (or reuse) the atlas described by a YAML frame list
    Build(BuildArgs),
    /// Print the packed layout as JSON without writing any files
    Layout(LayoutArgs),
    /// Print the rebuild cache entries of an output directory
    Cache(CacheArgs),
}

#[derive(Parser, Debug, Clone)]
struct BuildArgs {
    /// YAML frame list
    #[arg(help_heading = "Input/Output")]
    config: PathBuf,
    /// Output directory for <name>.png, <name>.json and the cache file
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    output: PathBuf,
    /// Skip processing and serve the atlas already in the output directory
    #[arg(long, default_value_t = false, help_heading = "Input/Output")]
    no_process: bool,
    /// What to print once the atlas is ready
    #[arg(long, value_enum, default_value_t = LoaderChoice::Json, help_heading = "Loader")]
    loader: LoaderChoice,
    /// Prefix for asset URLs that are not inlined
    #[arg(long, default_value = "", help_heading = "Loader")]
    public_path: String,
    /// Inline assets up to this many bytes as data URLs
    #[arg(long, help_heading = "Loader")]
    inline_limit: Option<u64>,
    /// Always rebuild and leave the cache file untouched
    #[arg(long, default_value_t = false, help_heading = "Cache")]
    no_cache: bool,
    /// pngquant executable used when `colors` is configured
    #[arg(long, default_value = "pngquant", help_heading = "Tools")]
    pngquant: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LoaderChoice {
    /// Descriptor JSON with asset URLs filled in
    Json,
    /// URL of the descriptor
    Url,
    /// Nothing; the files in the output directory are the result
    None,
}

impl From<LoaderChoice> for LoaderMode {
    fn from(choice: LoaderChoice) -> Self {
        match choice {
            LoaderChoice::Json => LoaderMode::Json,
            LoaderChoice::Url => LoaderMode::Url,
            LoaderChoice::None => LoaderMode::None,
        }
    }
}

#[derive(Parser, Debug, Clone)]
struct LayoutArgs {
    /// YAML frame list
    config: PathBuf,
    /// Pretty-print the JSON
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Parser, Debug, Clone)]
struct CacheArgs {
    /// Output directory holding the cache file
    #[arg(default_value = "out")]
    dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Build(args) => run_build(args, cli.verbose > 0),
        Commands::Layout(args) => run_layout(args),
        Commands::Cache(args) => run_cache(args),
    }
}

fn run_build(args: &BuildArgs, verbose: bool) -> anyhow::Result<()> {
    let options = BuildOptions {
        process: !args.no_process,
        output: args.output.clone(),
        loader: args.loader.into(),
        verbose,
        cache: !args.no_cache,
        public_path: args.public_path.clone(),
        inline_limit: args.inline_limit,
        pngquant: args.pngquant.clone(),
    };

    let mut cache = CacheStore::open(&options.output);
    let out = build_tileset(&args.config, &options, &mut cache)
        .with_context(|| format!("build {}", args.config.display()))?;
    info!(
        name = %out.name,
        rebuilt = out.rebuilt,
        cache_hit = out.cache.is_hit(),
        warnings = out.warnings.len(),
        image = %out.image_path.display(),
        "done"
    );

    match out.content {
        LoaderOutput::None => {}
        LoaderOutput::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        LoaderOutput::Url(url) => println!("{url}"),
    }
    Ok(())
}

fn run_layout(args: &LayoutArgs) -> anyhow::Result<()> {
    let source = fs::read_to_string(&args.config)
        .with_context(|| format!("read {}", args.config.display()))?;
    let context = match args.config.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let packing = tileset_core::layout_from_str(&source, context)?;
    info!(
        frames = packing.placements.len(),
        rotated = packing.rotated_count(),
        occupancy = format!("{:.2}%", packing.occupancy() * 100.0),
        "stats"
    );
    let frames: Vec<serde_json::Value> = packing
        .placements
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.frame.name,
                "x": p.x,
                "y": p.y,
                "width": p.frame.width,
                "height": p.frame.height,
                "rotated": p.rotated,
            })
        })
        .collect();
    let value = serde_json::json!({
        "canvas": {"width": packing.canvas.width, "height": packing.canvas.height},
        "frames": frames,
    });
    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", serde_json::to_string(&value)?);
    }
    Ok(())
}

fn run_cache(args: &CacheArgs) -> anyhow::Result<()> {
    let mut cache = CacheStore::open(&args.dir);
    let path = cache.file_path();
    let entries = cache.entries();
    if entries.is_empty() {
        info!(path = %path.display(), "cache is empty");
        return Ok(());
    }
    for (key, fingerprint) in entries {
        println!("{key}\t{fingerprint}");
    }
    Ok(())
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
