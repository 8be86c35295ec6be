use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Builder, Int64Array, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Write a synthetic, class-imbalanced classification set as Parquet
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Args {
    /// Output file
    #[arg(long, default_value = "sample_data.parquet")]
    output: PathBuf,

    /// Number of records
    #[arg(long, default_value_t = 1000)]
    records: usize,

    /// Attributes per record
    #[arg(long, default_value_t = 10)]
    features: usize,

    /// Relative class weights; class `i` is drawn with weight `weights[i]`
    #[arg(long, value_delimiter = ',', default_value = "0.9,0.1")]
    weights: Vec<f64>,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Per-class Gaussian cluster centres, one per feature.
fn class_centres(classes: usize, features: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    (0..classes)
        .map(|_| (0..features).map(|_| rng.gen_range(-3.0..3.0)).collect())
        .collect()
}

fn pick_class(weights: &[f64], total: f64, rng: &mut ChaCha8Rng) -> usize {
    let mut draw = rng.gen_range(0.0..total);
    for (class, w) in weights.iter().enumerate() {
        if draw < *w {
            return class;
        }
        draw -= w;
    }
    weights.len() - 1
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    anyhow::ensure!(!args.weights.is_empty(), "at least one class weight is needed");
    anyhow::ensure!(args.weights.iter().all(|w| *w > 0.0), "class weights must be positive");

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let noise = Normal::new(0.0, 1.0).context("building noise distribution")?;
    let centres = class_centres(args.weights.len(), args.features, &mut rng);
    let total_weight: f64 = args.weights.iter().sum();

    // Build Arrow arrays
    let mut attr_builder = ListBuilder::new(Float64Builder::new());
    let mut targets: Vec<i64> = Vec::with_capacity(args.records);
    let mut counts = vec![0usize; args.weights.len()];
    for _ in 0..args.records {
        let class = pick_class(&args.weights, total_weight, &mut rng);
        let values = attr_builder.values();
        for &centre in &centres[class] {
            values.append_value(centre + noise.sample(&mut rng));
        }
        attr_builder.append(true);
        targets.push(class as i64);
        counts[class] += 1;
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new(
            "attributes",
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            false,
        ),
        Field::new("target", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(attr_builder.finish()), Arc::new(Int64Array::from(targets))],
    )
    .context("Failed to create RecordBatch")?;

    // Write Parquet
    let file = std::fs::File::create(&args.output).context("Failed to create output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;

    println!(
        "Wrote {} records ({} features each, class counts {counts:?}) to {}",
        args.records,
        args.features,
        args.output.display()
    );
    Ok(())
}
