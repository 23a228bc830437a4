//! Integration tests for the compile, copy and combine pipeline.

use crate::common::{BOOK_PARTS, FakeCompiler, Project};
use latexpages::Error;
use latexpages::backend::Engine;
use latexpages::build::{self, BuildEvent, BuildOptions, Stage};
use rstest::rstest;
use std::collections::BTreeMap;
use std::fs;
use std::future::pending;
use std::time::Duration;

fn options(processes: usize) -> BuildOptions {
    BuildOptions {
        processes: Some(processes),
        engine: Some(Engine::Latexmk),
        ..BuildOptions::default()
    }
}

fn slow_compiler() -> FakeCompiler {
    FakeCompiler::new()
        .delay("preface", 20)
        .delay("intro", 40)
        .delay("body", 5)
        .delay("outro", 25)
        .delay("poster", 10)
}

#[tokio::test]
async fn test_build_produces_exports_and_combinations() {
    let project = Project::book();
    let job = project.job();
    let compiler = slow_compiler();

    build::build(&job, &compiler, &options(4), pending(), |_| {})
        .await
        .unwrap();

    for name in [
        "preface.pdf",
        "01-intro.pdf",
        "02-body.pdf",
        "03-outro.pdf",
        "poster.pdf",
        "book.pdf",
        "book_2up.pdf",
    ] {
        assert!(project.path("_output").join(name).exists(), "{name} missing");
    }
    assert!(!project.path("_output/book.tex").exists());
    assert!(!project.path("_output/book.log").exists());
}

#[tokio::test]
async fn test_stages_are_barriers() {
    let project = Project::book();
    let job = project.job();
    let compiler = slow_compiler();

    let mut events = Vec::new();
    build::build(&job, &compiler, &options(4), pending(), |event| events.push(event))
        .await
        .unwrap();

    let first_combine = compiler.position("start:book").min(compiler.position("start:book_2up"));
    for part in BOOK_PARTS {
        assert!(compiler.position(&format!("end:{part}")) < first_combine);
    }

    let stage_of = |event: &BuildEvent| match event {
        BuildEvent::PartCompiled { .. } => Some(Stage::Compile),
        BuildEvent::FileCopied { .. } => Some(Stage::Copy),
        BuildEvent::TargetCombined { .. } => Some(Stage::Combine),
        _ => None,
    };
    let stages: Vec<Stage> = events.iter().filter_map(stage_of).collect();
    let mut sorted = stages.clone();
    sorted.sort_by_key(|stage| match stage {
        Stage::Compile => 0,
        Stage::Copy => 1,
        Stage::Combine => 2,
    });
    assert_eq!(stages, sorted);
    assert_eq!(stages.len(), 5 + 5 + 2);
}

#[tokio::test]
async fn test_worker_limit_is_respected() {
    let project = Project::book();
    let job = project.job();
    let compiler = slow_compiler();

    build::build(&job, &compiler, &options(2), pending(), |_| {})
        .await
        .unwrap();

    let max = compiler.max_in_flight.load(std::sync::atomic::Ordering::SeqCst);
    assert!(max <= 2, "{max} compiles ran at once");
}

#[tokio::test]
async fn test_single_worker_runs_in_order() {
    let project = Project::book();
    let job = project.job();
    let compiler = slow_compiler();

    let mut compiled = Vec::new();
    build::build(&job, &compiler, &options(1), pending(), |event| {
        if let BuildEvent::PartCompiled { part } = event {
            compiled.push(part);
        }
    })
    .await
    .unwrap();

    assert_eq!(compiled, BOOK_PARTS);
    assert_eq!(compiler.max_in_flight.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(project.path("_output/book_2up.pdf").exists());
}

/// Files produced in the output directory and the compiler calls made.
type BuildResult = (BTreeMap<String, Vec<u8>>, Vec<(String, bool, bool)>);

async fn build_book(workers: usize) -> BuildResult {
    let project = Project::book();
    let job = project.job();
    let compiler = slow_compiler();

    let options = BuildOptions {
        cleanup: false,
        ..options(workers)
    };
    build::build(&job, &compiler, &options, pending(), |_| {})
        .await
        .unwrap();

    let files = fs::read_dir(project.path("_output"))
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            (name, fs::read(&path).unwrap())
        })
        .collect();
    let mut calls = compiler.requests.lock().unwrap().clone();
    calls.sort();
    (files, calls)
}

#[rstest]
#[case(2)]
#[case(3)]
#[case(8)]
#[tokio::test]
async fn test_worker_count_does_not_change_output(#[case] workers: usize) {
    let (sequential_files, sequential_calls) = build_book(1).await;
    let (pooled_files, pooled_calls) = build_book(workers).await;

    assert_eq!(
        sequential_files.keys().collect::<Vec<_>>(),
        pooled_files.keys().collect::<Vec<_>>()
    );
    assert_eq!(sequential_files, pooled_files);
    assert_eq!(sequential_calls, pooled_calls);
    assert_eq!(sequential_calls.len(), BOOK_PARTS.len() + 2);
}

#[tokio::test]
async fn test_dvips_flag_reaches_compiler() {
    let project = Project::book();
    let job = project.job();
    let compiler = FakeCompiler::new();

    build::build(&job, &compiler, &options(3), pending(), |_| {})
        .await
        .unwrap();

    let requests = compiler.requests.lock().unwrap().clone();
    let dvips: Vec<&str> = requests
        .iter()
        .filter(|(_, dvips, _)| *dvips)
        .map(|(stem, _, _)| stem.as_str())
        .collect();
    assert_eq!(dvips, vec!["body"]);
}

#[tokio::test]
async fn test_failed_compile_stops_before_copy() {
    let project = Project::book();
    let job = project.job();
    let compiler = slow_compiler().failing("body");

    let err = build::build(&job, &compiler, &options(3), pending(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ExecutableNotFound { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(!project.path("_output").exists());
    // The other compiles were drained, not abandoned.
    compiler.position("end:outro");
    compiler.position("end:poster");
}

#[tokio::test]
async fn test_cancellation() {
    let project = Project::book();
    let job = project.job();
    let compiler = FakeCompiler::new().delay("intro", 5_000);

    let shutdown = tokio::time::sleep(Duration::from_millis(30));
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        build::build(&job, &compiler, &options(4), shutdown, |_| {}),
    )
    .await
    .expect("build did not stop on shutdown");

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(err.exit_code(), 130);
    assert!(!project.path("_output").exists());
}

#[tokio::test]
async fn test_only_compiles_one_part() {
    let project = Project::book();
    let job = project.job();
    let compiler = FakeCompiler::new();

    let options = BuildOptions {
        only: Some("outro".to_string()),
        view: true,
        ..options(4)
    };
    build::build(&job, &compiler, &options, pending(), |_| {})
        .await
        .unwrap();

    assert_eq!(compiler.log(), vec!["start:outro", "end:outro"]);
    assert_eq!(
        compiler.requests.lock().unwrap().clone(),
        vec![("outro".to_string(), false, true)]
    );
    assert!(project.path("outro/outro.pdf").exists());
    assert!(!project.path("_output").exists());
}

#[tokio::test]
async fn test_only_unknown_part() {
    let project = Project::book();
    let job = project.job();
    let compiler = FakeCompiler::new();

    let options = BuildOptions {
        only: Some("appendix".to_string()),
        ..options(4)
    };
    let err = build::build(&job, &compiler, &options, pending(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnknownPart { .. }));
    assert!(compiler.log().is_empty());
}

#[tokio::test]
async fn test_keep_leaves_combination_sources() {
    let project = Project::book();
    let job = project.job();
    let compiler = FakeCompiler::new();

    let options = BuildOptions {
        cleanup: false,
        ..options(2)
    };
    build::build(&job, &compiler, &options, pending(), |_| {})
        .await
        .unwrap();

    let normal = project.read("_output/book.tex");
    assert!(normal.contains(r"\documentclass[paper=a5]{scrartcl}"));
    assert!(normal.contains(r"\pagenumbering{roman}"));
    assert!(normal.contains(r"\includepdfmerge[fitpaper]{preface,-}"));
    assert!(normal.contains(r"\includepdfmerge[fitpaper]{01-intro,-,02-body,-,03-outro,-}"));
    assert!(!normal.contains("poster"));

    let two_up = project.read("_output/book_2up.tex");
    assert!(two_up.contains(r"\documentclass[paper=a4,landscape]{scrartcl}"));
    assert!(two_up.contains(
        r"\includepdfmerge[nup=2x1,openright]{preface,-,01-intro,-,02-body,-,03-outro,-}"
    ));
    assert!(project.path("_output/book.log").exists());
}

#[test]
fn test_dry_run_plan() {
    let project = Project::book();
    let job = project.job();

    let plan = build::plan(&job, &options(2)).unwrap();
    assert_eq!(plan.workers, 2);
    assert_eq!(plan.compile.len(), 5);
    assert_eq!(plan.copy.len(), 5);
    assert_eq!(plan.combine.len(), 2);

    let body = plan
        .compile
        .iter()
        .find(|step| step.task.part == "body")
        .unwrap();
    assert_eq!(
        body.commands[0].command_line(),
        "latexmk -silent -dvi -ps -pdfps body.tex"
    );
    assert_eq!(plan.combine[1].target.name, "book_2up");
    assert!(plan.combine[1].source.ends_with("_output/book_2up.tex"));

    let json = plan.to_json().unwrap();
    assert!(json.contains("\"engine\": \"latexmk\""));
    assert!(!project.path("_output").exists());
}

#[test]
fn test_dry_run_plan_only() {
    let project = Project::book();
    let job = project.job();

    let options = BuildOptions {
        only: Some("intro".to_string()),
        view: true,
        ..options(8)
    };
    let plan = build::plan(&job, &options).unwrap();
    assert_eq!(plan.workers, 1);
    assert!(plan.copy.is_empty() && plan.combine.is_empty());
    assert_eq!(
        plan.compile[0].commands[0].command_line(),
        "latexmk -silent -pdf -pv intro.tex"
    );
}
