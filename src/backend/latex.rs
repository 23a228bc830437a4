//! `latexmk` / `texify` compilation through external processes.

use super::{CompileRequest, Compiler, Engine};
use crate::utils::swapext;
use crate::{Error, Result};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{Signal, killpg};
#[cfg(unix)]
use nix::unistd::Pid;

/// A planned external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Command line as a single shell-quoted string, for messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|word| shlex::try_quote(word).map_or_else(|_| word.to_string(), |q| q.into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run inside `directory` and wait for the exit status.
    ///
    /// A nonzero exit status is logged, not returned. On Unix the child
    /// leads its own process group, and dropping the returned future kills
    /// the whole group, including the engines it started.
    pub async fn run(&self, directory: &Path) -> Result<()> {
        debug!(directory = %directory.display(), command = %self.command_line(), "spawning");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(directory)
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|err| match err.kind() {
            ErrorKind::NotFound => {
                Error::executable_not_found(&self.program, install_hint(&self.program))
            }
            _ => Error::file_io(directory, err),
        })?;
        #[cfg(unix)]
        let mut group = ProcessGroup::new(child.id());

        let status = child.wait().await?;
        #[cfg(unix)]
        group.release();

        if !status.success() {
            warn!(command = %self.command_line(), %status, "command exited unsuccessfully");
        }
        Ok(())
    }
}

/// Kills a child's process group unless released after the child exited.
#[cfg(unix)]
struct ProcessGroup {
    leader: Option<Pid>,
}

#[cfg(unix)]
impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self {
            leader: pid.and_then(|pid| i32::try_from(pid).ok()).map(Pid::from_raw),
        }
    }

    fn release(&mut self) {
        self.leader = None;
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(leader) = self.leader.take() {
            match killpg(leader, Signal::SIGKILL) {
                Ok(()) => debug!(pgid = %leader, "killed process group"),
                Err(err) => debug!(pgid = %leader, %err, "process group already gone"),
            }
        }
    }
}

fn install_hint(program: &str) -> &'static str {
    match program {
        "latexmk" => "make sure the latexmk executable is on your system's PATH",
        "texify" | "dvips" | "ps2pdf" => "make sure the MiKTeX executables are on your system's PATH",
        _ => "make sure the executable is on your system's PATH",
    }
}

/// Compiles with the TeX distribution's command line drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatexBackend;

impl LatexBackend {
    pub fn new() -> Self {
        Self
    }

    /// Commands that compile `request`, in execution order.
    pub fn plan(request: &CompileRequest<'_>) -> Vec<Invocation> {
        let opts = request.options;
        match request.engine {
            Engine::Latexmk => {
                let mut latexmk = Invocation::new("latexmk").args(opts.latexmk.iter().cloned());
                latexmk = if request.dvips {
                    latexmk.args(["-dvi", "-ps", "-pdfps"])
                } else {
                    latexmk.arg("-pdf")
                };
                if request.view {
                    latexmk = latexmk.arg("-pv");
                }
                vec![latexmk.arg(&request.filename)]
            }
            Engine::Texify => {
                let mut texify = Invocation::new("texify").args(opts.texify.iter().cloned());
                if !request.dvips {
                    texify = texify.arg("--pdf");
                }
                if request.view {
                    texify = texify.arg("--run-viewer");
                }
                let mut plan = vec![texify.arg(&request.filename)];
                if request.dvips {
                    plan.push(
                        Invocation::new("dvips")
                            .args(["-P", "pdf"])
                            .args(opts.dvips.iter().cloned())
                            .arg(swapext(&request.filename, "dvi")),
                    );
                    plan.push(
                        Invocation::new("ps2pdf")
                            .args(opts.ps2pdf.iter().cloned())
                            .arg(swapext(&request.filename, "ps")),
                    );
                }
                plan
            }
        }
    }
}

impl Compiler for LatexBackend {
    async fn compile(&self, request: &CompileRequest<'_>) -> Result<()> {
        for invocation in Self::plan(request) {
            invocation.run(&request.directory).await?;
        }
        Ok(())
    }
}
