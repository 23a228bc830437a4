//! Shared fixtures for the integration tests.
//!
//! Projects are built in temporary directories; PDFs are generated with
//! lopdf and compilation is simulated by [`FakeCompiler`].

use latexpages::Result;
use latexpages::backend::{CompileRequest, Compiler};
use latexpages::config::Job;
use latexpages::error::Error;
use lopdf::{Document, Object, Stream, dictionary};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Front matter, three main parts, one extra, with a two-up version.
pub const BOOK: &str = "\
[make]
name = book
make_two_up = true

[parts]
frontmatter = preface
mainmatter = intro
  body
  outro
extras = poster
use_dvips = body

[substitute]
title = Proceedings
";

pub const BOOK_PARTS: &[&str] = &["preface", "intro", "body", "outro", "poster"];

/// A collection on disk: one directory per part plus `latexpages.ini`.
pub struct Project {
    pub dir: TempDir,
    pub config: PathBuf,
}

impl Project {
    pub fn new(parts: &[&str], ini: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        for part in parts {
            let part_dir = dir.path().join(part);
            fs::create_dir_all(&part_dir).unwrap();
            fs::write(
                part_dir.join(format!("{part}.tex")),
                "\\documentclass{article}\n\\setcounter{page}{1}\n",
            )
            .unwrap();
        }
        let config = dir.path().join("latexpages.ini");
        fs::write(&config, ini).unwrap();
        Self { dir, config }
    }

    pub fn book() -> Self {
        Self::new(BOOK_PARTS, BOOK)
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    pub fn job(&self) -> Job {
        Job::load(&self.config).expect("Failed to load project configuration")
    }
}

/// Write a minimal PDF with `pages` empty A4 pages.
pub fn write_pdf(path: &Path, pages: u32) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(i64::from(pages)),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.save(path).expect("Failed to save test PDF");
}

/// Compiler stand-in that writes a PDF next to the source.
///
/// Every call is logged as `start:<stem>` and `end:<stem>`.
#[derive(Clone, Default)]
pub struct FakeCompiler {
    pub log: Arc<Mutex<Vec<String>>>,
    pub requests: Arc<Mutex<Vec<(String, bool, bool)>>>,
    delays: HashMap<String, u64>,
    pages: HashMap<String, u32>,
    fail: Option<String>,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, stem: &str, millis: u64) -> Self {
        self.delays.insert(stem.to_string(), millis);
        self
    }

    pub fn pages(mut self, stem: &str, pages: u32) -> Self {
        self.pages.insert(stem.to_string(), pages);
        self
    }

    pub fn failing(mut self, stem: &str) -> Self {
        self.fail = Some(stem.to_string());
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Position of `entry` in the log.
    pub fn position(&self, entry: &str) -> usize {
        let log = self.log();
        log.iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry} not logged in {log:?}"))
    }
}

impl Compiler for FakeCompiler {
    async fn compile(&self, request: &CompileRequest<'_>) -> Result<()> {
        let stem = Path::new(&request.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.log.lock().unwrap().push(format!("start:{stem}"));
        self.requests
            .lock()
            .unwrap()
            .push((stem.clone(), request.dvips, request.view));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let millis = self.delays.get(&stem).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.as_deref() == Some(stem.as_str()) {
            return Err(Error::executable_not_found(
                "latexmk",
                "make sure the latexmk executable is on your system's PATH",
            ));
        }

        let pages = self.pages.get(&stem).copied().unwrap_or(1);
        write_pdf(&request.directory.join(format!("{stem}.pdf")), pages);
        fs::write(request.directory.join(format!("{stem}.log")), "log").unwrap();
        self.log.lock().unwrap().push(format!("end:{stem}"));
        Ok(())
    }
}
