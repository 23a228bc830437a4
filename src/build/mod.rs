//! Build pipeline: compile every part, copy the PDFs into the output
//! directory, then combine them.
//!
//! The stages are strict barriers. Copying starts only after every compile
//! has finished, and combining only after every copy. Compiles and
//! combinations run as a bounded set of concurrent futures, one external
//! process each; with a single worker they run one after another on the
//! calling task instead.
//!
//! A shutdown future (Ctrl-C in the binary) races the whole pipeline. When
//! it fires the in-flight futures are dropped, which kills their processes,
//! and [`Error::Cancelled`] is returned.

use crate::backend::{Compiler, Engine, Invocation, LatexBackend};
use crate::config::{CombineTarget, CompileTask, CopyTask, Job};
use crate::render::{self, CombinationDocument};
use crate::utils::swapext;
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Caller overrides of the job's compile settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Worker count; falls back to `[compile] processes`, then to the
    /// available parallelism.
    pub processes: Option<usize>,
    /// Engine; falls back to `[compile] engine`, then to the platform default.
    pub engine: Option<Engine>,
    /// Remove combination sources and auxiliary files after compiling.
    pub cleanup: bool,
    /// Compile just this part, without copying or combining.
    pub only: Option<String>,
    /// Open the viewer after compiling the `only` part.
    pub view: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            processes: None,
            engine: None,
            cleanup: true,
            only: None,
            view: false,
        }
    }
}

impl BuildOptions {
    /// Number of concurrent workers for `job`.
    pub fn effective_workers(&self, job: &Job) -> usize {
        self.processes
            .or(job.compile.processes)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Engine for `job`, resolved before any work starts.
    pub fn effective_engine(&self, job: &Job) -> Result<Engine> {
        match self.engine.or(job.compile.engine) {
            Some(engine) => Ok(engine),
            None => Engine::platform_default(),
        }
    }
}

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Copy,
    Combine,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Compile => "compile",
            Self::Copy => "copy",
            Self::Combine => "combine",
        })
    }
}

/// Progress notification, emitted by the orchestrator as results arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    StageStarted { stage: Stage, tasks: usize },
    PartCompiled { part: String },
    FileCopied { source: PathBuf, target: PathBuf },
    TargetCombined { name: String, pdf: PathBuf },
    StageFinished { stage: Stage },
}

/// Run `job` to completion or until `shutdown` resolves.
///
/// # Errors
///
/// The first failure of a stage is returned once that stage has drained;
/// later stages do not start. [`Error::Cancelled`] when `shutdown` fires.
pub async fn build<C, S, F>(
    job: &Job,
    compiler: &C,
    options: &BuildOptions,
    shutdown: S,
    mut on_event: F,
) -> Result<()>
where
    C: Compiler,
    S: Future<Output = ()>,
    F: FnMut(BuildEvent),
{
    let engine = options.effective_engine(job)?;
    let work = run_stages(job, compiler, options, engine, &mut on_event);

    tokio::select! {
        result = work => result,
        () = shutdown => {
            warn!("build interrupted, stopping external processes");
            Err(Error::Cancelled)
        }
    }
}

async fn run_stages<C, F>(
    job: &Job,
    compiler: &C,
    options: &BuildOptions,
    engine: Engine,
    on_event: &mut F,
) -> Result<()>
where
    C: Compiler,
    F: FnMut(BuildEvent),
{
    let workers = options.effective_workers(job);

    if let Some(part) = &options.only {
        let task = job.to_compile_only(part)?;
        return compile_stage(job, compiler, engine, vec![task], 1, options.view, on_event).await;
    }

    let targets = job.to_combine();
    check_layouts(job, &targets)?;

    info!(workers, engine = %engine, "building {}", job.name);
    compile_stage(job, compiler, engine, job.to_compile(), workers, false, on_event).await?;
    copy_stage(job, job.to_copy(), on_event).await?;
    combine_stage(job, compiler, engine, options.cleanup, targets, workers, on_event).await
}

/// Reject impossible layouts before anything is compiled.
fn check_layouts(job: &Job, targets: &[CombineTarget]) -> Result<()> {
    for target in targets {
        CombinationDocument::from(target).body(job.template.include_options(target.two_up))?;
    }
    Ok(())
}

/// Run `task` over `items` with at most `workers` in flight.
///
/// Every item runs even after a failure; the first failure (in completion
/// order) is returned afterwards.
async fn run_bounded<T, R, F, Fut>(
    items: Vec<T>,
    workers: usize,
    task: F,
    mut on_done: impl FnMut(&R),
) -> Result<Vec<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let mut done = Vec::with_capacity(items.len());
    let mut first_error = None;
    let mut record = |result: Result<R>| match result {
        Ok(value) => {
            on_done(&value);
            done.push(value);
        }
        Err(err) => {
            error!("{err}");
            first_error.get_or_insert(err);
        }
    };

    if workers <= 1 {
        for item in items {
            record(task(item).await);
        }
    } else {
        let mut results = stream::iter(items.into_iter().map(&task)).buffer_unordered(workers);
        while let Some(result) = results.next().await {
            record(result);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(done),
    }
}

async fn compile_stage<C, F>(
    job: &Job,
    compiler: &C,
    engine: Engine,
    tasks: Vec<CompileTask>,
    workers: usize,
    view: bool,
    on_event: &mut F,
) -> Result<()>
where
    C: Compiler,
    F: FnMut(BuildEvent),
{
    on_event(BuildEvent::StageStarted {
        stage: Stage::Compile,
        tasks: tasks.len(),
    });

    let options = &job.compile.options;
    run_bounded(
        tasks,
        workers,
        move |task: CompileTask| async move {
            debug!(part = %task.part, dvips = task.dvips, "compiling");
            let mut request = task.request(engine, options);
            request.view = view;
            compiler.compile(&request).await?;
            Ok::<_, Error>(task.part)
        },
        |part: &String| on_event(BuildEvent::PartCompiled { part: part.clone() }),
    )
    .await?;

    on_event(BuildEvent::StageFinished {
        stage: Stage::Compile,
    });
    Ok(())
}

async fn copy_stage<F>(job: &Job, copies: Vec<CopyTask>, on_event: &mut F) -> Result<()>
where
    F: FnMut(BuildEvent),
{
    on_event(BuildEvent::StageStarted {
        stage: Stage::Copy,
        tasks: copies.len(),
    });

    let output = job.output_dir();
    tokio::fs::create_dir_all(&output)
        .await
        .map_err(|e| Error::file_io(&output, e))?;

    for CopyTask { source, target } in copies {
        tokio::fs::copy(&source, &target)
            .await
            .map_err(|e| Error::file_io(&source, e))?;
        debug!(source = %source.display(), target = %target.display(), "copied");
        on_event(BuildEvent::FileCopied { source, target });
    }

    on_event(BuildEvent::StageFinished { stage: Stage::Copy });
    Ok(())
}

async fn combine_stage<C, F>(
    job: &Job,
    compiler: &C,
    engine: Engine,
    cleanup: bool,
    targets: Vec<CombineTarget>,
    workers: usize,
    on_event: &mut F,
) -> Result<()>
where
    C: Compiler,
    F: FnMut(BuildEvent),
{
    on_event(BuildEvent::StageStarted {
        stage: Stage::Combine,
        tasks: targets.len(),
    });

    run_bounded(
        targets,
        workers,
        move |target: CombineTarget| async move {
            let pdf = render::combine(job, &target, compiler, engine, cleanup).await?;
            Ok::<_, Error>((target.name, pdf))
        },
        |(name, pdf): &(String, PathBuf)| {
            on_event(BuildEvent::TargetCombined {
                name: name.clone(),
                pdf: pdf.clone(),
            })
        },
    )
    .await?;

    on_event(BuildEvent::StageFinished {
        stage: Stage::Combine,
    });
    Ok(())
}

/// A compile task with the commands it would run.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedCompile {
    #[serde(flatten)]
    pub task: CompileTask,
    pub commands: Vec<Invocation>,
}

/// A combination target with its source file and commands.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedCombine {
    #[serde(flatten)]
    pub target: CombineTarget,
    pub source: PathBuf,
    pub commands: Vec<Invocation>,
}

/// Everything a build would do, without doing it.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub engine: Engine,
    pub workers: usize,
    pub compile: Vec<PlannedCompile>,
    pub copy: Vec<CopyTask>,
    pub combine: Vec<PlannedCombine>,
}

impl Plan {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compute the build plan for a dry run.
pub fn plan(job: &Job, options: &BuildOptions) -> Result<Plan> {
    let engine = options.effective_engine(job)?;
    let compile_options = &job.compile.options;

    let planned = |task: CompileTask, view: bool| {
        let mut request = task.request(engine, compile_options);
        request.view = view;
        PlannedCompile {
            commands: LatexBackend::plan(&request),
            task,
        }
    };

    if let Some(part) = &options.only {
        return Ok(Plan {
            engine,
            workers: 1,
            compile: vec![planned(job.to_compile_only(part)?, options.view)],
            copy: Vec::new(),
            combine: Vec::new(),
        });
    }

    let targets = job.to_combine();
    check_layouts(job, &targets)?;

    let output = job.output_dir();
    let combine = targets
        .into_iter()
        .map(|target| {
            let filename = swapext(&target.name, "tex");
            let request = crate::backend::CompileRequest {
                directory: output.clone(),
                filename: filename.clone(),
                dvips: false,
                view: false,
                engine,
                options: compile_options,
            };
            PlannedCombine {
                commands: LatexBackend::plan(&request),
                source: output.join(filename),
                target,
            }
        })
        .collect();

    Ok(Plan {
        engine,
        workers: options.effective_workers(job),
        compile: job
            .to_compile()
            .into_iter()
            .map(|task| planned(task, false))
            .collect(),
        copy: job.to_copy(),
        combine,
    })
}
