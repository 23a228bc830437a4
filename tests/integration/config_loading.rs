//! Integration tests for loading collection configurations.

use crate::common::{BOOK, BOOK_PARTS, Project};
use latexpages::Error;
use latexpages::backend::Engine;
use latexpages::config::Job;
use std::path::PathBuf;

#[test]
fn test_book_configuration() {
    let project = Project::book();
    let job = project.job();

    assert_eq!(job.name, "book");
    assert_eq!(job.two_up.as_deref(), Some("book_2up"));
    assert_eq!(job.output_dir(), job.config_dir.join("_output"));
    assert_eq!(job.context.get("title").map(String::as_str), Some("Proceedings"));

    let exports: Vec<String> = job
        .to_copy()
        .iter()
        .map(|copy| copy.target.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        exports,
        vec!["preface.pdf", "01-intro.pdf", "02-body.pdf", "03-outro.pdf", "poster.pdf"]
    );
}

#[test]
fn test_user_values_override_defaults() {
    let ini = format!(
        "{BOOK}
[make]
directory = build/pdf
mainmatter = {{name}}-{{index1:03}}

[template]
class = book
options = paper=a4

[compile]
engine = texify
processes = 3
latexmk = -quiet -f
"
    );
    let project = Project::new(BOOK_PARTS, &ini);
    let job = project.job();

    assert_eq!(job.directory, PathBuf::from("build/pdf"));
    assert_eq!(job.template.class, "book");
    assert_eq!(job.template.class_options(false), "paper=a4");
    assert_eq!(job.template.class_options(true), "paper=a4,landscape");
    assert_eq!(job.compile.engine, Some(Engine::Texify));
    assert_eq!(job.compile.processes, Some(3));
    assert_eq!(job.compile.options.latexmk, vec!["-quiet", "-f"]);

    let main = job.to_combine().remove(0).main;
    assert_eq!(main, vec!["book-001", "book-002", "book-003"]);
}

#[test]
fn test_missing_part_sources_reported_together() {
    let project = Project::new(&["preface", "intro", "poster"], BOOK);
    let err = Job::load(&project.config).unwrap_err();

    match &err {
        Error::MissingPartSources { paths } => {
            assert_eq!(paths.len(), 2);
            assert!(paths[0].ends_with("body/body.tex"));
            assert!(paths[1].ends_with("outro/outro.tex"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_missing_configuration_file() {
    let project = Project::book();
    let err = Job::load(project.path("nope.ini")).unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { .. }));
}

#[test]
fn test_relative_paths_resolve_against_config_dir() {
    let project = Project::book();
    let job = project.job();

    let tasks = job.to_compile();
    assert!(tasks.iter().all(|task| task.directory.is_absolute()));
    assert_eq!(tasks[1].directory, job.config_dir.join("intro"));
    assert_eq!(tasks[1].filename, "intro.tex");
}
