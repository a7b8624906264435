use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use patternlib::engraver::SongCatalog;
use patternlib::{charts, matching, renderer, score_colors, similarity, AnnotationTable, Config};

#[derive(Parser, Debug)]
#[command(name = "patternlib", version, about = "Compare melodic pattern annotations")]
struct Cli {
    /// Configuration JSON. Every field is optional.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log more (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    paths: PathArgs,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct PathArgs {
    /// Annotation table CSV.
    #[arg(long, global = true)]
    annotations: Option<PathBuf>,

    /// Folder of pre-rendered page SVGs.
    #[arg(long, global = true)]
    pages: Option<PathBuf>,

    /// Folder of score sources (MEI, MusicXML, MXL).
    #[arg(long, global = true)]
    scores: Option<PathBuf>,

    /// Folder of persisted match relations.
    #[arg(long, global = true)]
    results: Option<PathBuf>,

    /// Folder for annotated pages and colored scores.
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute and persist match relations for every annotator pair.
    Analyse,
    /// Draw persisted match relations on the rendered pages.
    Visualize {
        /// Seed for box jitter; no jitter when absent.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Box every annotated pattern on the rendered pages, colored by tag.
    Overlay {
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Jaccard similarity of pattern start measures.
    Similarity {
        /// Neighborhood radius in measures.
        #[arg(long)]
        radius: Option<u32>,

        /// Output folder for matrices.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Tag statistics as Vega-Lite charts bundled into a zip archive.
    Charts {
        /// Output zip path.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Number of standardized tags in the top chart.
        #[arg(long)]
        top: Option<usize>,
    },
    /// Color pattern notes in the full score sources.
    ColorScore {
        /// Only this song.
        #[arg(long)]
        song: Option<i64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = load_config(cli.config.as_deref())?;
    apply_paths(&mut config, cli.paths);

    match cli.cmd {
        Command::Analyse => cmd_analyse(&config),
        Command::Visualize { seed } => {
            config.jitter_seed = seed.or(config.jitter_seed);
            report("annotated pages", renderer::visualize_all(&config)?)
        }
        Command::Overlay { seed } => {
            config.jitter_seed = seed.or(config.jitter_seed);
            let table = load_table(&config)?;
            report("tag overlays", renderer::overlay_all(&config, &table)?)
        }
        Command::Similarity { radius, out } => {
            if let Some(radius) = radius {
                config.similarity_radius = radius;
            }
            if let Some(out) = out {
                config.paths.similarity_dir = out;
            }
            let table = load_table(&config)?;
            report("similarity files", similarity::score_all(&config, &table)?)
        }
        Command::Charts { out, top } => {
            if let Some(out) = out {
                config.paths.charts_bundle = out;
            }
            if let Some(top) = top {
                config.chart_top_n = top;
            }
            let table = load_table(&config)?;
            let path = charts::write_charts(&config, &table)?;
            report("chart bundle", vec![path])
        }
        Command::ColorScore { song } => {
            let table = load_table(&config)?;
            let written = match song {
                Some(song_id) => {
                    let catalog = SongCatalog::open(&config.paths.scores_dir)?;
                    vec![score_colors::color_song(&config, &table, &catalog, song_id)
                        .with_context(|| format!("color score of song {song_id}"))?]
                }
                None => score_colors::color_all(&config, &table)?,
            };
            report("colored scores", written)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("load config '{}'", path.display())),
        None => Ok(Config::default()),
    }
}

fn apply_paths(config: &mut Config, args: PathArgs) {
    let paths = &mut config.paths;
    let overrides = [
        (args.annotations, &mut paths.annotations),
        (args.pages, &mut paths.pages_dir),
        (args.scores, &mut paths.scores_dir),
        (args.results, &mut paths.results_dir),
        (args.output, &mut paths.output_dir),
    ];
    for (value, slot) in overrides {
        if let Some(value) = value {
            *slot = value;
        }
    }
}

fn load_table(config: &Config) -> anyhow::Result<AnnotationTable> {
    let path = &config.paths.annotations;
    AnnotationTable::load(path).with_context(|| format!("read annotations '{}'", path.display()))
}

fn cmd_analyse(config: &Config) -> anyhow::Result<()> {
    let table = load_table(config)?;
    let written = matching::analyse_all(config, &table).context("analyse annotator pairs")?;
    report("match relations", written)
}

fn report(what: &str, written: Vec<PathBuf>) -> anyhow::Result<()> {
    info!(count = written.len(), "wrote {what}");
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}
