//! Integration tests for start page renumbering.

use crate::common::{Project, write_pdf};
use latexpages::Error;
use latexpages::backend::{CounterChoice, LopdfCounter, PageCounter, ProbedCounter};
use latexpages::paginate::paginate;

const PAGINATED: &str = "\
[make]
name = book

[parts]
mainmatter = intro
  body
  outro

[paginate]
contents = contents
counter = lopdf
";

fn paginated_project(ini: &str) -> Project {
    let project = Project::new(&["intro", "body", "outro", "contents"], ini);
    for (part, pages) in [("intro", 3), ("body", 5), ("outro", 2)] {
        write_pdf(&project.path(&format!("{part}/{part}.pdf")), pages);
    }
    project
}

#[test]
fn test_lopdf_counter_reads_generated_pdf() {
    let project = paginated_project(PAGINATED);
    let pages = LopdfCounter.count_pages(&project.path("body/body.pdf")).unwrap();
    assert_eq!(pages, 5);
}

#[test]
fn test_paginate_updates_sources_and_contents() {
    let project = paginated_project(PAGINATED);
    project.write(
        "contents/contents.tex",
        "\\startpage{0} Intro\n\\startpage{0} Body\n\\startpage{0} Outro\n",
    );
    let job = project.job();
    let counter = ProbedCounter::new(job.paginate.counter);

    assert!(paginate(&job, &counter).unwrap());
    assert_eq!(counter.selected(), Some("lopdf"));

    assert!(project.read("intro/intro.tex").contains("\\setcounter{page}{1}"));
    assert!(project.read("body/body.tex").contains("\\setcounter{page}{4}"));
    assert!(project.read("outro/outro.tex").contains("\\setcounter{page}{9}"));
    assert_eq!(
        project.read("contents/contents.tex"),
        "\\startpage{1} Intro\n\\startpage{4} Body\n\\startpage{9} Outro\n"
    );

    // A second run finds nothing to change.
    assert!(!paginate(&job, &counter).unwrap());
}

#[test]
fn test_paginate_first_to_front_skips_first_part() {
    let ini = PAGINATED.replace("[parts]\n", "[parts]\nfirst_to_front = true\n");
    let project = paginated_project(&ini);
    project.write("contents/contents.tex", "\\startpage{0}\n\\startpage{0}\n");
    let job = project.job();

    paginate(&job, &ProbedCounter::new(CounterChoice::Lopdf)).unwrap();

    assert!(project.read("body/body.tex").contains("\\setcounter{page}{1}"));
    assert!(project.read("outro/outro.tex").contains("\\setcounter{page}{6}"));
    assert_eq!(
        project.read("contents/contents.tex"),
        "\\startpage{1}\n\\startpage{6}\n"
    );
}

#[test]
fn test_paginate_contents_count_mismatch() {
    let project = paginated_project(PAGINATED);
    project.write("contents/contents.tex", "\\startpage{0}\n\\startpage{0}\n");
    let job = project.job();

    let err = paginate(&job, &LopdfCounter).unwrap_err();
    assert!(matches!(
        err,
        Error::MatchCountMismatch {
            expected: 3,
            found: 2,
            ..
        }
    ));
    assert_eq!(err.exit_code(), 6);
}

#[test]
fn test_paginate_without_contents_target() {
    let ini = PAGINATED.replace("contents = contents\n", "");
    let project = paginated_project(&ini);
    let job = project.job();

    assert!(paginate(&job, &LopdfCounter).unwrap());
    assert!(!paginate(&job, &LopdfCounter).unwrap());
}

#[test]
fn test_paginate_missing_counter_pattern() {
    let project = paginated_project(PAGINATED);
    project.write("body/body.tex", "\\documentclass{article}\n");
    project.write("contents/contents.tex", "");
    let job = project.job();

    let err = paginate(&job, &LopdfCounter).unwrap_err();
    match err {
        Error::PatternNotFound { path, .. } => assert!(path.ends_with("body/body.tex")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_paginate_with_template() {
    let ini = format!(
        "{PAGINATED}{}",
        r#"template = "\\entry{$author}{$title}{$startpage}"
replace = %begin\n(.*)\n%end
author_extract = \\author\{([^}]*)\}
title_extract = \\title\{([^}]*)\}
"#
    );
    let project = paginated_project(&ini);
    project.write(
        "intro/intro.tex",
        "\\setcounter{page}{1}\n\\author{Ann}\\title{Opening}\n",
    );
    project.write("body/body.tex", "\\setcounter{page}{1}\n\\title{Example}\n");
    project.write(
        "outro/outro.tex",
        "\\setcounter{page}{1}\n\\author{Bob}\\author{Eve}\\title{Closing}\n",
    );
    project.write("contents/contents.tex", "top\n%begin\nstale\n%end\nbottom\n");
    let job = project.job();

    assert!(paginate(&job, &LopdfCounter).unwrap());
    assert_eq!(
        project.read("contents/contents.tex"),
        "top\n%begin\n\\entry{Ann}{Opening}{1}\n\\entry{}{Example}{4}\n\\entry{Eve}{Closing}{9}\n%end\nbottom\n"
    );
    assert!(!paginate(&job, &LopdfCounter).unwrap());
}

#[test]
fn test_paginate_latin1_contents_entries() {
    let ini = format!("{PAGINATED}{}", "encoding = latin1\nreplace = \\\\entry\\{.*\\}\\{(\\d+)\\}\n");
    let project = paginated_project(&ini);
    std::fs::write(
        project.path("contents/contents.tex"),
        b"\\entry{Caf\xe9}{0}\n\\entry{Cr\xe8me br\xfbl\xe9e}{0}\n\\entry{Fin}{0}\n",
    )
    .unwrap();
    let job = project.job();

    assert!(paginate(&job, &LopdfCounter).unwrap());
    assert_eq!(
        std::fs::read(project.path("contents/contents.tex")).unwrap(),
        b"\\entry{Caf\xe9}{1}\n\\entry{Cr\xe8me br\xfbl\xe9e}{4}\n\\entry{Fin}{9}\n"
    );
}
