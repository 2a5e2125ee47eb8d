#[allow(dead_code)]
mod common;

use std::sync::Arc;
use std::time::Duration;

use ndarray::Array2;

use common::{
    events_of, new_log, AddConstant, Collector, Echo, FailOn, Recorder, Reference, SlowFail,
    UseReference,
};
use nightfall_core::block::Block;
use nightfall_core::error::{NightfallError, Result};
use nightfall_core::image::Image;
use nightfall_core::io::loader::ImageLoader;
use nightfall_core::io::source::FileSource;
use nightfall_core::pipeline::{ImageInput, RunOptions, Sequence};
use nightfall_core::value::Value;

fn add(value: f64) -> Box<dyn Block> {
    Box::new(AddConstant { value })
}

/// Loader returning a constant frame tagged with its path and telescope hint.
fn tagging_loader() -> Arc<dyn ImageLoader> {
    let loader = |path: &std::path::Path, telescope: Option<&str>| -> Result<Image> {
        let mut image = Image::new(Array2::from_elem((2, 2), 10.0));
        image
            .metadata
            .insert("path".into(), Value::from(path.display().to_string()));
        if let Some(t) = telescope {
            image.metadata.insert("telescope".into(), Value::from(t));
        }
        Ok(image)
    };
    Arc::new(loader)
}

fn quiet() -> RunOptions {
    RunOptions {
        show_progress: false,
        ..RunOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Traversal and discard
// ---------------------------------------------------------------------------

#[test]
fn test_discarded_images_skip_later_blocks() {
    let log = new_log();
    let mut sequence = Sequence::new(vec![
        Recorder::new("A", &log).boxed(),
        Recorder::new("B", &log).discarding(&[1, 3]).boxed(),
        Recorder::new("C", &log).boxed(),
    ]);

    sequence.run(common::constant_images(5, (4, 4)), &quiet()).unwrap();

    assert_eq!(sequence.n_processed_images(), 5);
    let run = |kind| -> Vec<String> {
        events_of(&log, kind)
            .into_iter()
            .filter(|e| e.starts_with("run"))
            .collect()
    };
    assert_eq!(run("A"), ["run 0", "run 1", "run 2", "run 3", "run 4"]);
    assert_eq!(run("B"), ["run 0", "run 1", "run 2", "run 3", "run 4"]);
    assert_eq!(run("C"), ["run 0", "run 2", "run 4"]);

    let discards = sequence.discards();
    assert_eq!(discards.len(), 1);
    assert_eq!(discards[0].kind, "B");
    assert_eq!(discards[0].name, "block1");
    assert_eq!(discards[0].images, vec![1, 3]);
}

#[test]
fn test_discard_by_last_block_is_tallied() {
    let log = new_log();
    let mut sequence = Sequence::new(vec![
        Recorder::new("A", &log).boxed(),
        Recorder::new("B", &log).discarding(&[2]).boxed(),
    ]);

    sequence.run(common::constant_images(4, (2, 2)), &quiet()).unwrap();

    let discards = sequence.discards();
    assert_eq!(discards.len(), 1);
    assert_eq!(discards[0].name, "block1");
    assert_eq!(discards[0].images, vec![2]);
}

#[test]
fn test_hooks_called_once_per_run() {
    let log = new_log();
    let mut sequence = Sequence::new(vec![Recorder::new("A", &log).boxed()]);
    sequence.run(common::constant_images(3, (2, 2)), &quiet()).unwrap();

    let events = events_of(&log, "A");
    assert_eq!(events.first().map(String::as_str), Some("initialize"));
    assert_eq!(events.last().map(String::as_str), Some("terminate"));
    assert_eq!(events.iter().filter(|e| *e == "initialize").count(), 1);
    assert_eq!(events.iter().filter(|e| *e == "terminate").count(), 1);
}

#[test]
fn test_live_discard_keeps_no_tally() {
    let log = new_log();
    let mut sequence = Sequence::new(vec![Recorder::new("A", &log).discarding(&[0]).boxed()]);
    let options = RunOptions {
        live_discard: true,
        ..quiet()
    };
    sequence.run(common::constant_images(2, (2, 2)), &options).unwrap();
    assert!(sequence.discards().is_empty());
    assert_eq!(sequence.n_processed_images(), 2);
}

#[test]
fn test_image_discarded_before_entering_is_skipped() {
    let log = new_log();
    let mut sequence = Sequence::new(vec![Recorder::new("A", &log).boxed()]);
    let mut images = common::constant_images(2, (2, 2));
    images[0].discard();

    sequence.run(images, &quiet()).unwrap();

    let runs: Vec<String> = events_of(&log, "A")
        .into_iter()
        .filter(|e| e.starts_with("run"))
        .collect();
    assert_eq!(runs, ["run 1"]);
    assert_eq!(sequence.n_processed_images(), 2);
    assert!(sequence.discards().is_empty());
}

#[test]
fn test_bookkeeping_resets_between_runs() {
    let log = new_log();
    let mut sequence = Sequence::new(vec![Recorder::new("A", &log).discarding(&[0]).boxed()]);
    sequence.run(common::constant_images(3, (2, 2)), &quiet()).unwrap();
    sequence.run(common::constant_images(2, (2, 2)), &quiet()).unwrap();
    assert_eq!(sequence.n_processed_images(), 2);
    assert_eq!(sequence.discards()[0].images, vec![0]);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn test_empty_input_fails_before_initialize() {
    let log = new_log();
    let mut sequence = Sequence::new(vec![Recorder::new("A", &log).boxed()]);
    let err = sequence.run(Vec::<Image>::new(), &quiet()).unwrap_err();
    assert!(matches!(err, NightfallError::EmptySequence));
    assert!(common::entries(&log).is_empty());
}

#[test]
fn test_block_error_aborts_run() {
    let mut sequence = Sequence::new(vec![
        Box::new(FailOn { index: 1 }),
        Box::new(Collector::default()),
    ]);
    let err = sequence.run(common::constant_images(3, (2, 2)), &quiet()).unwrap_err();
    assert_eq!(format!("{err}"), "Block FailOn failed: image 1");

    let collector = sequence.block_as::<Collector>("block1").unwrap();
    assert_eq!(collector.seen, vec![0]);
    assert!(!collector.terminated);
}

#[test]
fn test_failed_run_is_still_timed() {
    let mut sequence = Sequence::new(vec![Box::new(SlowFail {
        delay: Duration::from_millis(5),
    })]);
    assert!(sequence.run(common::constant_images(1, (2, 2)), &quiet()).is_err());
    assert!(sequence.block_time(0).unwrap() >= Duration::from_millis(5));
}

// ---------------------------------------------------------------------------
// Stack blocks
// ---------------------------------------------------------------------------

#[test]
fn test_stack_block_runs_once_on_stack_image() {
    let mut sequence = Sequence::new(vec![
        Box::new(Reference { value: 7.5 }),
        Box::new(UseReference),
    ])
    .with_stack_image(Image::new(Array2::zeros((2, 2))));

    let images = common::constant_images(3, (2, 2));
    sequence.run(images, &quiet()).unwrap();

    let stack = sequence.stack_image().unwrap();
    assert_eq!(*stack.get::<f64>("reference").unwrap(), 7.5);
    assert!(*stack.get::<bool>("stack_method_ran").unwrap());
}

#[test]
fn test_images_inherit_stack_outputs() {
    let mut sequence = Sequence::new(vec![
        Box::new(Reference { value: 2.0 }),
        Box::new(UseReference),
        Box::new(Collector::default()),
    ])
    .with_stack_image(Image::new(Array2::zeros((2, 2))));

    sequence.run(common::constant_images(2, (2, 2)), &quiet()).unwrap();
    assert_eq!(sequence.block_as::<Collector>("block2").unwrap().seen, vec![0, 1]);
}

#[test]
fn test_stack_block_without_stack_image() {
    let mut sequence = Sequence::new(vec![Box::new(Reference { value: 1.0 })]);
    let err = sequence.run(common::constant_images(1, (2, 2)), &quiet()).unwrap_err();
    assert!(matches!(err, NightfallError::MissingStackImage(ref kinds) if kinds == "Reference"));
}

// ---------------------------------------------------------------------------
// Loader and inputs
// ---------------------------------------------------------------------------

#[test]
fn test_custom_loader_and_mixed_inputs() {
    let log = new_log();
    let echo = Echo {
        keys: vec!["path", "telescope"],
        log: Arc::clone(&log),
        stack: false,
    };
    let mut sequence = Sequence::new(vec![Box::new(AddConstant { value: 1.0 }), Box::new(echo)])
        .with_loader(tagging_loader());
    let inputs: Vec<ImageInput> = vec![
        "a.fits".into(),
        Image::new(Array2::zeros((2, 2))).into(),
    ];
    let options = RunOptions {
        telescope: Some("Callisto".into()),
        ..quiet()
    };
    sequence.run(inputs, &options).unwrap();

    assert_eq!(sequence.n_processed_images(), 2);
    assert_eq!(events_of(&log, "Echo"), ["0 path=a.fits", "0 telescope=Callisto"]);
}

#[test]
fn test_stack_image_path_gets_telescope_hint() {
    let log = new_log();
    let echo = Echo {
        keys: vec!["path", "telescope"],
        log: Arc::clone(&log),
        stack: true,
    };
    let mut sequence = Sequence::new(vec![Box::new(echo)])
        .with_loader(tagging_loader())
        .with_source(Arc::new(FileSource::new().with_stack("ref.fits")));
    let options = RunOptions {
        telescope: Some("Callisto".into()),
        ..quiet()
    };
    sequence.run(common::constant_images(1, (2, 2)), &options).unwrap();

    assert_eq!(
        events_of(&log, "Echo"),
        ["stack path=ref.fits", "stack telescope=Callisto"]
    );
    let stack = sequence.stack_image().unwrap();
    assert_eq!(stack.metadata["telescope"], Value::from("Callisto"));
}

// ---------------------------------------------------------------------------
// Names, queries and reports
// ---------------------------------------------------------------------------

#[test]
fn test_default_and_duplicate_names() {
    let sequence = Sequence::from_named(vec![
        (Some("calib".into()), add(1.0)),
        (None, add(2.0)),
        (Some("calib".into()), add(3.0)),
    ]);
    assert_eq!(sequence.len(), 2);
    assert_eq!(sequence.block_names(), ["calib", "block1"]);
    let calib = sequence.block_as::<AddConstant>("calib").unwrap();
    assert_eq!(calib.value, 3.0);
    assert_eq!(sequence[1].kind(), "AddConstant");
    assert!(sequence.block("missing").is_none());
}

#[test]
fn test_citations_are_deduplicated() {
    let sequence = Sequence::new(vec![
        Box::new(AddConstant { value: 1.0 }),
        Box::new(AddConstant { value: 2.0 }),
        Box::new(UseReference),
    ]);
    assert_eq!(sequence.citations(), ["ndarray", "arithmetic"]);
}

#[test]
fn test_timing_table() {
    let mut sequence = Sequence::new(vec![
        Box::new(AddConstant { value: 1.0 }),
        Box::new(AddConstant { value: 2.0 }),
    ])
    .named("demo");
    sequence.run(common::constant_images(4, (8, 8)), &quiet()).unwrap();

    let table = format!("{sequence}");
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 6, "got:\n{table}");
    assert!(lines[1].contains("index"));
    assert!(lines[1].contains("processing"));
    assert!(lines[3].contains("block0"));
    assert!(lines[4].contains("AddConstant"));
    assert!(lines[3].contains(" s ("), "got: {}", lines[3]);

    let total: f64 = (0..sequence.len())
        .map(|k| sequence.block_time(k).unwrap().as_secs_f64())
        .sum();
    assert!((total - sequence.processing_time().as_secs_f64()).abs() < 1e-9);
}

#[test]
fn test_processing_time_accumulates_across_runs() {
    let mut sequence = Sequence::new(vec![Box::new(AddConstant { value: 1.0 })]);
    sequence.run(common::constant_images(2, (64, 64)), &quiet()).unwrap();
    let first = sequence.processing_time();
    sequence.run(common::constant_images(2, (64, 64)), &quiet()).unwrap();
    assert!(sequence.processing_time() >= first);
}

#[test]
fn test_terminate_can_be_deferred() {
    let mut sequence = Sequence::new(vec![Box::new(Collector::default())]);
    let options = RunOptions {
        terminate: false,
        ..quiet()
    };
    sequence.run(common::constant_images(2, (2, 2)), &options).unwrap();
    assert!(!sequence.block_as::<Collector>("block0").unwrap().terminated);

    sequence.terminate().unwrap();
    assert!(sequence.block_as::<Collector>("block0").unwrap().terminated);
}
