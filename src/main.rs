use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use denn_db::data::loader::load_file;
use denn_db::format::{ContainerReader, ContainerWriter, FormatVersion};
use denn_db::stats::DatasetStats;
use denn_db::Recipe;

/// Build and inspect DENN dataset containers
#[derive(Parser)]
#[command(name = "denn-db")]
#[command(about = "Prepare datasets for DENN trainers", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a source file, run a recipe and write a container
    Build {
        /// Source data (.csv, .json, .parquet)
        #[arg(long)]
        input: PathBuf,

        /// Recipe JSON describing the transformation steps
        #[arg(long)]
        recipe: PathBuf,

        /// Output container; a .gz extension enables compression
        #[arg(long)]
        output: PathBuf,

        /// Override the recipe seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the recipe format version (1, 2 or 3)
        #[arg(long)]
        version: Option<u16>,

        /// Also write <output>.stat.json
        #[arg(long)]
        stats: bool,
    },

    /// Print the header and split sizes of a container
    Inspect {
        /// Container file
        #[arg(name = "CONTAINER")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            input,
            recipe,
            output,
            seed,
            version,
            stats,
        } => {
            let mut recipe = Recipe::load(&recipe)
                .with_context(|| format!("reading recipe {}", recipe.display()))?;
            if let Some(seed) = seed {
                recipe.seed = Some(seed);
            }
            if let Some(version) = version {
                recipe.version = FormatVersion::try_from(version)?;
            }
            recipe.save_stats |= stats;
            build(&input, &recipe, &output)
        }
        Commands::Inspect { path } => inspect(&path),
    }
}

fn build(input: &Path, recipe: &Recipe, output: &Path) -> Result<()> {
    let mut dataset = load_file(input, &recipe.input)?;
    let mut pipeline = recipe.pipeline().context("validating recipe steps")?;
    pipeline.run(&mut dataset).context("running recipe steps")?;

    let bar = progress_bar(dataset.train().resources().len() as u64 + 2);
    let header = ContainerWriter::new(&dataset, recipe.writer_options())
        .context("preparing container")?
        .on_progress(|event| {
            bar.set_message(format!("{:?}", event.region));
            bar.inc(1);
        })
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    bar.finish_and_clear();

    info!(
        "train {} / validation {} / test {} records, {} bytes of header",
        dataset.train().len(),
        dataset.validation().len(),
        dataset.test().len(),
        header.byte_length()
    );

    if recipe.save_stats {
        let stats_path = stats_path(output);
        DatasetStats::of_dataset(&dataset)?
            .save(&stats_path)
            .with_context(|| format!("writing {}", stats_path.display()))?;
    }
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let reader =
        ContainerReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    println!("{}", reader.header());
    println!("version:    {}", reader.version());
    println!("type:       {}", reader.element_type());
    println!("test:       {} records", reader.read_test()?.len());
    println!("validation: {} records", reader.read_validation()?.len());
    let mut train = 0;
    for batch in reader.batches()? {
        train += batch?.len();
    }
    println!("train:      {train} records in {} batches", reader.n_batch());
    Ok(())
}

/// `<output>.stat.json`, keeping the full output file name as the stem.
fn stats_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".stat.json");
    PathBuf::from(name)
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {wide_bar} {pos}/{len} {msg}") {
        pb.set_style(style);
    }
    pb
}
