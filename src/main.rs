//! latexpages - Compile LaTeX parts and combine them into a single PDF.

use anyhow::Context;
use clap::Parser;
use std::io;
use std::process;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use latexpages::backend::{LatexBackend, ProbedCounter};
use latexpages::cli::{BuildArgs, CleanArgs, Cli, Command};
use latexpages::config::Job;
use latexpages::output::{BuildProgress, OutputFormatter};
use latexpages::{Error, build, clean, paginate};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        process::exit(exit_code(&err));
    }
}

/// Install the global subscriber; `RUST_LOG` wins over the flags.
fn init_tracing(cli: &Cli) {
    let default = if cli.quiet {
        "error"
    } else if cli.verbose {
        "latexpages=debug,info"
    } else {
        "latexpages=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(cli.verbose)
                .without_time(),
        )
        .with(filter)
        .init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Error>().map_or(1, Error::exit_code)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let formatter = OutputFormatter::new(cli.quiet, cli.verbose);
    let job = Job::load(cli.command.config())?;
    formatter.debug(&format!("{} v{}", latexpages::NAME, latexpages::VERSION));
    formatter.detail("Configuration", &job.config_dir.display().to_string());

    match &cli.command {
        Command::Build(args) => run_build(&job, args, &formatter).await,
        Command::Paginate(_) => run_paginate(job, &formatter).await,
        Command::Clean(args) => run_clean(&job, args, &formatter),
    }
}

async fn run_build(job: &Job, args: &BuildArgs, formatter: &OutputFormatter) -> anyhow::Result<()> {
    let options = args.to_options()?;

    if args.dry_run {
        let plan = build::plan(job, &options)?;
        if args.json {
            formatter.raw(&plan.to_json()?);
        } else {
            formatter.plan(&plan);
        }
        return Ok(());
    }

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let mut progress = BuildProgress::new(formatter);
    build::build(job, &LatexBackend::new(), &options, shutdown, |event| {
        progress.handle(event)
    })
    .await
    .with_context(|| format!("Failed to build {}", job.name))?;

    match &options.only {
        Some(part) => formatter.success(&format!("Compiled {part}")),
        None => formatter.success(&format!(
            "Finished {} in {}",
            job.name,
            job.output_dir().display()
        )),
    }
    Ok(())
}

/// Pagination reads files and runs page counters synchronously.
async fn run_paginate(job: Job, formatter: &OutputFormatter) -> anyhow::Result<()> {
    let (changed, counter) = tokio::task::spawn_blocking(move || {
        let counter = ProbedCounter::new(job.paginate.counter);
        let changed = paginate::paginate(&job, &counter)
            .with_context(|| format!("Failed to paginate {}", job.name))?;
        anyhow::Ok((changed, counter.selected()))
    })
    .await??;

    if let Some(name) = counter {
        formatter.debug(&format!("Page counter: {name}"));
    }
    if changed {
        formatter.success("Start pages updated");
    } else {
        formatter.info("Start pages already up to date");
    }
    Ok(())
}

fn run_clean(job: &Job, args: &CleanArgs, formatter: &OutputFormatter) -> anyhow::Result<()> {
    let outcome = clean::clean(job, args.output, |plan| {
        formatter.clean_plan(plan);
        if args.yes {
            return Ok(true);
        }
        clean::confirm(&plan.question(), &mut io::stdin().lock(), &mut io::stdout())
    })
    .with_context(|| format!("Failed to clean {}", job.name))?;

    formatter.clean_outcome(&outcome);
    Ok(())
}
