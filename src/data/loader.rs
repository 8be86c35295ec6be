use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use log::info;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::dataset::{Dataset, Kind, Split};
use super::model::ClassLabel;
use super::resource::Resource;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How raw rows become a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// CSV column holding the target; the last column when unset.
    pub label_column: Option<String>,
    /// Min-max scale every attribute column to `[0, 1]`.
    pub normalize: bool,
    /// Encode integer labels as one-hot vectors over the sorted distinct labels.
    pub one_hot: bool,
    pub kind: Kind,
}

/// Rows as parsed, before normalization and encoding.
#[derive(Debug, Default)]
struct Table {
    attributes: Vec<Vec<f64>>,
    targets: Vec<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a tabular source into a dataset holding one train resource.
/// Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `attributes` list column and a `target` column (recommended)
/// * `.json`    – `[{ "attributes": [...], "target": 3 }, ...]`
/// * `.csv`     – header row, numeric columns, one of them the label
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path, options.label_column.as_deref()),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    let dataset = build_dataset(table, options)?;
    info!(
        "loaded {} records from {} (normalized: {}, one-hot: {})",
        dataset.len(),
        path.display(),
        options.normalize,
        options.one_hot
    );
    Ok(dataset)
}

fn build_dataset(mut table: Table, options: &LoadOptions) -> Result<Dataset> {
    if table.attributes.is_empty() {
        bail!("source holds no records");
    }
    if options.normalize {
        min_max_scale(&mut table.attributes);
    }
    if options.one_hot {
        table.targets = one_hot(&table.targets)?;
    }
    let resource =
        Resource::from_rows(&table.attributes, &table.targets).context("building resource")?;
    let mut dataset = Dataset::new(options.normalize, options.one_hot, options.kind);
    dataset.insert(resource, Split::Train);
    Ok(dataset)
}

/// Scale each column to `[0, 1]`; constant columns become 0.
fn min_max_scale(rows: &mut [Vec<f64>]) {
    let width = rows.first().map_or(0, Vec::len);
    for col in 0..width {
        let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r[col]), hi.max(r[col]))
        });
        let range = max - min;
        for row in rows.iter_mut() {
            row[col] = if range > 0.0 { (row[col] - min) / range } else { 0.0 };
        }
    }
}

fn one_hot(targets: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let mut labels = Vec::with_capacity(targets.len());
    for (i, row) in targets.iter().enumerate() {
        match row.as_slice() {
            [v] if v.fract() == 0.0 => labels.push(ClassLabel::new(*v)),
            [v] => bail!("Row {i}: label {v} is not an integer"),
            _ => bail!("Row {i}: one-hot encoding needs a scalar label, got {} values", row.len()),
        }
    }
    let classes: Vec<ClassLabel> = labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    Ok(labels
        .iter()
        .map(|label| {
            let mut row = vec![0.0; classes.len()];
            if let Ok(pos) = classes.binary_search(label) {
                row[pos] = 1.0;
            }
            row
        })
        .collect())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   { "attributes": [0.1, 0.7, ...], "target": 3 },
///   { "attributes": [0.4, 0.2, ...], "target": [0, 1, 0] },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut table = Table::default();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let attributes = match obj.get("attributes") {
            Some(value @ JsonValue::Array(_)) => json_numbers(value),
            _ => Err(anyhow::anyhow!("missing 'attributes' array")),
        }
        .with_context(|| format!("Row {i}: bad 'attributes'"))?;
        let target = obj
            .get("target")
            .context("missing 'target'")
            .and_then(json_numbers)
            .with_context(|| format!("Row {i}: bad 'target'"))?;
        table.attributes.push(attributes);
        table.targets.push(target);
    }
    Ok(table)
}

/// A number becomes a one-element row, an array of numbers a full row.
fn json_numbers(value: &JsonValue) -> Result<Vec<f64>> {
    let number = |v: &JsonValue| v.as_f64().with_context(|| format!("{v} is not a number"));
    match value {
        JsonValue::Array(items) => items.iter().map(number).collect(),
        other => Ok(vec![number(other)?]),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, every cell numeric.
/// `label_column` names the target; the remaining columns, in order, are
/// the attributes.
fn load_csv(path: &Path, label_column: Option<&str>) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let label_idx = match label_column {
        Some(name) => headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))?,
        None => headers.len().checked_sub(1).context("CSV has no columns")?,
    };

    let mut table = Table::default();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let mut attributes = Vec::with_capacity(headers.len().saturating_sub(1));
        let mut label = None;
        for (col_idx, tok) in record.iter().enumerate() {
            let value = tok.trim().parse::<f64>().with_context(|| {
                format!("Row {row_no}, {}: '{tok}' is not a number", headers[col_idx])
            })?;
            if col_idx == label_idx {
                label = Some(value);
            } else {
                attributes.push(value);
            }
        }
        let label = label.with_context(|| format!("Row {row_no}: missing label"))?;
        table.attributes.push(attributes);
        table.targets.push(vec![label]);
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of labelled samples.
///
/// Expected schema:
/// - `attributes`: List<Float64|Float32> or LargeList of the same
/// - `target`: Int32, Int64, Float32 or Float64 scalar, or a float list
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut table = Table::default();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let attr_idx = schema
            .index_of("attributes")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'attributes' column"))?;
        let target_idx = schema
            .index_of("target")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'target' column"))?;

        let attr_col = batch.column(attr_idx);
        let target_col = batch.column(target_idx);
        // scalar targets are cast once per batch, list targets per row
        let scalar_targets = match target_col.data_type() {
            DataType::List(_) | DataType::LargeList(_) => None,
            _ => Some(as_f64_column(target_col).context("reading 'target'")?),
        };

        for row in 0..batch.num_rows() {
            let attributes = list_at(attr_col, row)
                .and_then(|values| non_null_f64(&values))
                .with_context(|| format!("Row {row}: failed to read 'attributes'"))?;
            let target = match &scalar_targets {
                Some(targets) if targets.is_null(row) => bail!("Row {row}: null target"),
                Some(targets) => vec![targets.value(row)],
                None => list_at(target_col, row)
                    .and_then(|values| non_null_f64(&values))
                    .with_context(|| format!("Row {row}: failed to read 'target'"))?,
            };
            table.attributes.push(attributes);
            table.targets.push(target);
        }
    }
    Ok(table)
}

// -- Parquet / Arrow helpers --

/// The values of row `row` of a List or LargeList column.
fn list_at(col: &ArrayRef, row: usize) -> Result<ArrayRef> {
    if col.is_null(row) {
        bail!("null list");
    }
    match col.data_type() {
        DataType::List(_) => Ok(col.as_list_opt::<i32>().context("expected ListArray")?.value(row)),
        DataType::LargeList(_) => Ok(col
            .as_list_opt::<i64>()
            .context("expected LargeListArray")?
            .value(row)),
        other => bail!("expected List or LargeList column, got {other:?}"),
    }
}

/// Cast an integer or float column to Float64, keeping nulls.
fn as_f64_column(col: &ArrayRef) -> Result<Float64Array> {
    match col.data_type() {
        DataType::Float64 | DataType::Float32 | DataType::Int32 | DataType::Int64 => {}
        other => bail!("unsupported numeric type {other:?}"),
    }
    let cast = cast(col.as_ref(), &DataType::Float64).context("casting to Float64")?;
    Ok(cast
        .as_primitive_opt::<Float64Type>()
        .context("expected Float64Array after cast")?
        .clone())
}

/// Every value as `f64`; a null element is an error, never a silent NaN.
fn non_null_f64(values: &ArrayRef) -> Result<Vec<f64>> {
    as_f64_column(values)?
        .iter()
        .enumerate()
        .map(|(j, v)| v.with_context(|| format!("null element at position {j}")))
        .collect()
}
