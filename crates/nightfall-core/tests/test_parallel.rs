#[allow(dead_code)]
mod common;

use ndarray::Array2;

use common::{events_of, new_log, AddConstant, Collector, FailOn, Recorder, Reference, UseReference};
use nightfall_core::block::Block;
use nightfall_core::blocks::{LightCurve, MeanStack};
use nightfall_core::error::NightfallError;
use nightfall_core::image::{Image, Metadata};
use nightfall_core::pipeline::{ParallelSequence, RunOptions};

fn quiet() -> RunOptions {
    RunOptions {
        show_progress: false,
        ..RunOptions::default()
    }
}

fn sorted(mut v: Vec<usize>) -> Vec<usize> {
    v.sort_unstable();
    v
}

// ---------------------------------------------------------------------------
// Data block placement
// ---------------------------------------------------------------------------

#[test]
fn test_data_block_in_main_chain_is_rejected_before_work() {
    let log = new_log();
    let blocks: Vec<Box<dyn Block>> = vec![
        Recorder::new("A", &log).boxed(),
        Box::new(MeanStack::new()),
        Box::new(LightCurve::new(["jd"])),
        Box::new(MeanStack::new()),
    ];
    let mut parallel = ParallelSequence::new(blocks, None).with_workers(2);

    let err = parallel
        .run(common::constant_images(3, (2, 2)), &quiet(), None)
        .unwrap_err();
    assert_eq!(
        format!("{err}"),
        "Data blocks [LightCurve, MeanStack] cannot be used in a parallel sequence, \
         consider passing them as data blocks"
    );
    assert!(common::entries(&log).is_empty());
}

#[test]
fn test_empty_input() {
    let mut parallel = ParallelSequence::new(vec![Box::new(AddConstant { value: 1.0 })], None);
    let err = parallel.run(Vec::<Image>::new(), &quiet(), None).unwrap_err();
    assert!(matches!(err, NightfallError::EmptySequence));
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

#[test]
fn test_data_blocks_see_every_kept_image() {
    let log = new_log();
    let mut parallel = ParallelSequence::new(
        vec![
            Recorder::new("A", &log).discarding(&[2, 5]).boxed(),
            Box::new(AddConstant { value: 1.0 }),
        ],
        Some(vec![Box::new(Collector::default())]),
    )
    .with_workers(3);

    parallel
        .run(common::constant_images(8, (4, 4)), &quiet(), None)
        .unwrap();

    assert_eq!(parallel.n_processed_images(), 8);
    let collector = parallel.data().unwrap().block_as::<Collector>("block0").unwrap();
    assert_eq!(sorted(collector.seen.clone()), vec![0, 1, 3, 4, 6, 7]);
    assert!(collector.terminated);

    let discards = parallel.main().discards();
    assert_eq!(discards.len(), 1);
    assert_eq!(discards[0].kind, "A");
    assert_eq!(sorted(discards[0].images.clone()), vec![2, 5]);
}

#[test]
fn test_worker_results_reach_data_blocks() {
    let mut parallel = ParallelSequence::new(
        vec![Box::new(AddConstant { value: 10.0 })],
        Some(vec![Box::new(MeanStack::new())]),
    )
    .with_workers(4);

    // pixel values 0..6 -> +10 -> mean 12.5
    parallel
        .run(common::constant_images(6, (3, 3)), &quiet(), None)
        .unwrap();

    let stack = parallel.data().unwrap().block_as::<MeanStack>("block0").unwrap();
    assert_eq!(stack.count(), 6);
    let data = stack.stacked().unwrap().data.as_ref().unwrap();
    approx::assert_abs_diff_eq!(data[[1, 1]], 12.5, epsilon = 1e-12);
}

#[test]
fn test_main_templates_initialized_and_terminated_once() {
    let log = new_log();
    let mut parallel =
        ParallelSequence::new(vec![Recorder::new("A", &log).boxed()], None).with_workers(2);
    parallel
        .run(common::constant_images(5, (2, 2)), &quiet(), None)
        .unwrap();

    let events = events_of(&log, "A");
    assert_eq!(events.iter().filter(|e| *e == "initialize").count(), 1);
    assert_eq!(events.iter().filter(|e| *e == "terminate").count(), 1);
    assert_eq!(events.iter().filter(|e| e.starts_with("run")).count(), 5);
}

#[test]
fn test_timings_are_collected_from_workers() {
    let mut parallel = ParallelSequence::new(
        vec![
            Box::new(AddConstant { value: 1.0 }),
            Box::new(AddConstant { value: 2.0 }),
        ],
        None,
    )
    .with_workers(2);
    parallel
        .run(common::constant_images(4, (128, 128)), &quiet(), None)
        .unwrap();

    let table = parallel.main().to_string();
    assert!(table.contains("block1"), "got:\n{table}");
    assert!(parallel.processing_time() > std::time::Duration::ZERO);
}

#[test]
fn test_worker_error_aborts_run() {
    let mut parallel = ParallelSequence::new(
        vec![Box::new(FailOn { index: 3 })],
        Some(vec![Box::new(Collector::default())]),
    )
    .with_workers(2);
    let err = parallel
        .run(common::constant_images(6, (2, 2)), &quiet(), None)
        .unwrap_err();
    assert!(matches!(err, NightfallError::Block { .. }));
    let collector = parallel.data().unwrap().block_as::<Collector>("block0").unwrap();
    assert!(!collector.terminated);
}

#[test]
fn test_backlog_larger_than_worker_count() {
    let mut parallel = ParallelSequence::new(
        vec![Box::new(AddConstant { value: 1.0 })],
        Some(vec![Box::new(Collector::default())]),
    )
    .with_workers(2);
    parallel
        .run(common::constant_images(200, (2, 2)), &quiet(), None)
        .unwrap();
    let collector = parallel.data().unwrap().block_as::<Collector>("block0").unwrap();
    assert_eq!(sorted(collector.seen.clone()), (0..200).collect::<Vec<_>>());
}

#[test]
fn test_early_error_with_full_backlog_returns() {
    let mut parallel = ParallelSequence::new(vec![Box::new(FailOn { index: 0 })], None).with_workers(2);
    let err = parallel
        .run(common::constant_images(200, (2, 2)), &quiet(), None)
        .unwrap_err();
    assert!(matches!(err, NightfallError::Block { .. }));
}

#[test]
fn test_workers_inherit_stack_outputs() {
    let mut parallel = ParallelSequence::new(
        vec![Box::new(Reference { value: 4.0 }), Box::new(UseReference)],
        Some(vec![Box::new(LightCurve::new(["reference"]))]),
    )
    .with_workers(2)
    .with_stack_image(Image::new(Array2::zeros((2, 2))));

    let mut globals = Metadata::new();
    globals.insert("campaign".into(), "test".into());
    parallel
        .run(common::constant_images(3, (2, 2)), &quiet(), Some(&globals))
        .unwrap();

    let curve = parallel.data().unwrap().block_as::<LightCurve>("block0").unwrap();
    let column = curve.column("reference").unwrap();
    assert_eq!(column, vec![Some(4.0); 3]);
}

#[test]
fn test_citations_merge_main_and_data() {
    let parallel = ParallelSequence::new(
        vec![Box::new(AddConstant { value: 1.0 })],
        Some(vec![Box::new(MeanStack::new())]),
    );
    assert_eq!(parallel.citations(), ["ndarray", "arithmetic"]);
}

#[test]
fn test_worker_count() {
    let parallel = ParallelSequence::new(vec![Box::new(AddConstant { value: 1.0 })], None);
    assert!(parallel.workers() >= 1);
    assert_eq!(parallel.with_workers(0).workers(), 1);
}
