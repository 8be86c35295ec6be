use denn_db::data::loader::{load_file, LoadOptions};
use denn_db::data::{ClassLabel, ElementType, RecordField, Split};
use denn_db::format::{ContainerReader, ContainerWriter, FormatVersion, WriterOptions, CONTAINER_HEADER_SIZE};
use denn_db::pipeline::{Amount, Pipeline, Transform};
use denn_db::stats::{ClassStats, DatasetStats};
use denn_db::{Dataset, Recipe, Resource};

/// 100 records, 10 features, 2 one-hot classes.
fn hundred() -> Dataset {
    let attrs: Vec<Vec<f64>> = (0..100)
        .map(|i| (0..10).map(|j| (i * 10 + j) as f64 / 1000.0).collect())
        .collect();
    let targets: Vec<Vec<f64>> = (0..100)
        .map(|i| if i % 3 == 0 { vec![0.0, 1.0] } else { vec![1.0, 0.0] })
        .collect();
    let mut ds = Dataset::new(true, true, Default::default());
    ds.insert(Resource::from_rows(&attrs, &targets).unwrap(), Split::Train);
    ds
}

fn scenario_steps() -> Vec<Transform> {
    vec![
        Transform::SimpleShuffle { target: None },
        Transform::ExtractTo {
            from: Split::Train,
            to: Split::Test,
            amount: Amount::Count(20),
        },
        Transform::ExtractTo {
            from: Split::Train,
            to: Split::Validation,
            amount: Amount::Count(10),
        },
        Transform::Split {
            target: Split::Train,
            batch_size: Some(30),
            n_batch: None,
        },
        Transform::ConvertType {
            out_type: ElementType::Float,
        },
    ]
}

#[test]
fn shuffle_extract_split_convert_write() {
    let mut ds = hundred();
    Pipeline::new(scenario_steps(), Some(2024)).unwrap().run(&mut ds).unwrap();

    assert_eq!(ds.train().len(), 70);
    assert!(ds.train().resources().len() >= 3);
    assert!(ds.train().iter().all(|r| r.len() <= 30));
    assert_eq!(ds.validation().len(), 10);
    assert_eq!(ds.test().len(), 20);
    assert!(ds.resources().all(|r| r.element_type() == ElementType::Float));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.gz");
    let header = ContainerWriter::new(&ds, WriterOptions::default())
        .unwrap()
        .save(&path)
        .unwrap();

    let test_offset = header.get_u64("test_offset").unwrap();
    let validation_offset = header.get_u64("validation_offset").unwrap();
    let train_offset = header.get_u64("train_offset").unwrap();
    // the test block starts right after the header
    assert_eq!(test_offset, CONTAINER_HEADER_SIZE as u64);
    assert!(validation_offset > test_offset);
    assert!(train_offset > validation_offset);

    let reader = ContainerReader::open(&path).unwrap();
    assert_eq!(reader.header(), &header);
    assert_eq!(reader.read_test().unwrap(), ds.test().resources()[0]);
    assert_eq!(reader.read_validation().unwrap(), ds.validation().resources()[0]);
    let batches: Vec<Resource> = reader.batches().unwrap().map(Result::unwrap).collect();
    assert_eq!(batches, ds.train().resources().to_vec());
}

#[test]
fn raw_and_gzip_containers_match() {
    let mut ds = hundred();
    Pipeline::new(scenario_steps(), Some(5)).unwrap().run(&mut ds).unwrap();
    let dir = tempfile::tempdir().unwrap();

    for version in [FormatVersion::V1, FormatVersion::V2, FormatVersion::V3] {
        let options = WriterOptions {
            version,
            seed: 5,
            train_percentage: 70.0,
        };
        let gz = dir.path().join(format!("set_v{}.gz", version.number()));
        let raw = dir.path().join(format!("set_v{}.data", version.number()));
        ContainerWriter::new(&ds, options).unwrap().save(&gz).unwrap();
        ContainerWriter::new(&ds, options).unwrap().save(&raw).unwrap();

        let a = ContainerReader::open(&gz).unwrap();
        let b = ContainerReader::open(&raw).unwrap();
        assert_eq!(a.header(), b.header());
        assert_eq!(a.version(), version);
        for i in 0..a.n_batch() {
            assert_eq!(a.batch(i).unwrap(), b.batch(i).unwrap());
        }
        assert_eq!(a.batch(a.n_batch()).unwrap(), a.batch(0).unwrap());
    }
}

#[test]
fn depth_container_v3() {
    let mut ds = hundred();
    let mut steps = scenario_steps();
    steps.push(Transform::AddDepth {
        depth: 4,
        target: None,
        field: RecordField::Attributes,
    });
    Pipeline::new(steps, Some(9)).unwrap().run(&mut ds).unwrap();

    assert!(ContainerWriter::new(&ds, WriterOptions::default()).is_err());

    let options = WriterOptions {
        version: FormatVersion::V3,
        ..WriterOptions::default()
    };
    let mut bytes = Vec::new();
    ContainerWriter::new(&ds, options).unwrap().write_to(&mut bytes).unwrap();
    let reader = ContainerReader::from_source(bytes).unwrap();
    let test = reader.read_test().unwrap();
    assert_eq!(test.len(), 20);
    assert_eq!(test.attributes().depth(), 4);
    assert_eq!(test, ds.test().resources()[0]);
}

#[test]
fn stratified_extraction_keeps_ratio() {
    // 90/10 with the minority first, so a plain front extraction is skewed
    let attrs: Vec<Vec<f64>> = (0..400).map(|i| vec![i as f64]).collect();
    let targets: Vec<Vec<f64>> = (0..400)
        .map(|i| if i < 40 { vec![0.0, 1.0] } else { vec![1.0, 0.0] })
        .collect();
    let mut ds = Dataset::default();
    ds.insert(Resource::from_rows(&attrs, &targets).unwrap(), Split::Train);

    let steps = vec![Transform::ExtractToWithClassRatio {
        from: Split::Train,
        to: Split::Validation,
        amount: Amount::Fraction(0.5),
        tolerance: 2.0,
        max_iterations: None,
        reference: None,
    }];
    Pipeline::new(steps, Some(1)).unwrap().run(&mut ds).unwrap();

    let extracted = ClassStats::of_container(ds.validation()).unwrap();
    assert_eq!(ds.validation().len(), 200);
    assert!((extracted.percentage(ClassLabel::new(0.0)) - 90.0).abs() <= 2.0);
    assert!((extracted.percentage(ClassLabel::new(1.0)) - 10.0).abs() <= 2.0);
    assert_eq!(ds.len(), 400);
}

#[test]
fn recipe_from_csv_with_stats() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("source.csv");
    let mut text = String::from("f1,f2,f3,label\n");
    for i in 0..60 {
        text.push_str(&format!("{},{},{},{}\n", i, i * 2, 60 - i, i % 3));
    }
    std::fs::write(&csv, text).unwrap();

    let recipe: Recipe = serde_json::from_str(
        r#"{
            "version": 2,
            "out_type": "double",
            "seed": 3,
            "input": { "normalize": true, "one_hot": true },
            "steps": [
                { "op": "simple_shuffle", "target": "train" },
                { "op": "extract_to", "from": "train", "to": "test", "amount": 0.2 },
                { "op": "random_copy_to", "from": "train", "to": "validation", "amount": 6 },
                { "op": "split", "target": "train", "n_batch": 4 }
            ],
            "save_stats": true
        }"#,
    )
    .unwrap();

    let mut ds = load_file(&csv, &recipe.input).unwrap();
    recipe.pipeline().unwrap().run(&mut ds).unwrap();
    assert_eq!(ds.test().len(), 12);
    assert_eq!(ds.train().len(), 48);
    assert!(ds.train().iter().all(|r| r.len() <= 12));

    let out = dir.path().join("source.gz");
    ContainerWriter::new(&ds, recipe.writer_options()).unwrap().save(&out).unwrap();
    let reader = ContainerReader::open(&out).unwrap();
    assert_eq!(reader.version(), FormatVersion::V2);
    assert_eq!(reader.n_classes(), 3);
    assert_eq!(reader.n_features(), 3);

    let stats = DatasetStats::of_dataset(&ds).unwrap();
    let stats_path = dir.path().join("source.gz.stat.json");
    stats.save(&stats_path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&stats_path).unwrap()).unwrap();
    assert_eq!(json["class_stats"]["num_classes"], 3);
    assert!(json["attribute_stats"]["max"].as_f64().unwrap() <= 1.0);
}

#[test]
fn loader_options_are_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.json");
    std::fs::write(&path, r#"[{"attributes": [1, 5], "target": 0}, {"attributes": [3, 5], "target": 1}]"#).unwrap();
    let options = LoadOptions {
        normalize: true,
        ..LoadOptions::default()
    };
    let ds = load_file(&path, &options).unwrap();
    assert!(ds.normalized);
    assert!(!ds.one_hot);
    assert_eq!(ds.train().get(1).unwrap().attributes, vec![1.0, 0.0]);
}
