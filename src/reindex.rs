//! Handing the generated config over to `livegrep-fetch-reindex`.

use failure::{Error, ResultExt};
use sec::Secret;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{Config, TOKEN_ENV};
use crate::errors::ReindexFailed;

/// The name of the binary we delegate to.
pub const FETCH_REINDEX: &str = "livegrep-fetch-reindex";

/// A fully resolved invocation of `livegrep-fetch-reindex`.
#[derive(Debug, Clone)]
pub struct ReindexCommand {
    pub program: PathBuf,
    pub index_path: PathBuf,
    pub codesearch: PathBuf,
    pub num_workers: usize,
    pub no_index: bool,
    pub revparse: bool,
    pub skip_missing: bool,
    pub spec_path: PathBuf,
    /// Forwarded to the child as `GITLAB_TOKEN`.
    pub token: Option<Secret<String>>,
}

impl ReindexCommand {
    /// Build the command from a `Config`, using `argv0` to locate
    /// `livegrep-fetch-reindex` if it hasn't been set explicitly.
    pub fn from_config(cfg: &Config, argv0: &Path) -> ReindexCommand {
        let program = match cfg.reindex.fetch_reindex {
            Some(ref explicit) => explicit.clone(),
            None => resolve_binary(argv0, FETCH_REINDEX),
        };

        ReindexCommand {
            program,
            index_path: cfg.index_path(),
            codesearch: cfg.reindex.codesearch.clone(),
            num_workers: cfg.reindex.num_workers,
            no_index: cfg.reindex.no_index,
            revparse: cfg.reindex.revparse,
            skip_missing: cfg.general.skip_missing,
            spec_path: cfg.spec_path(),
            token: cfg
                .gitlab
                .token
                .clone()
                .filter(|tok| !tok.reveal_str().is_empty()),
        }
    }

    /// `--out <index> --codesearch <path> --num-workers <n> [flags...] <spec>`
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--out".into(),
            self.index_path.clone().into(),
            "--codesearch".into(),
            self.codesearch.clone().into(),
            "--num-workers".into(),
            self.num_workers.to_string().into(),
        ];

        if self.no_index {
            args.push("--no-index".into());
        }
        if self.revparse {
            args.push("--revparse".into());
        }
        if self.skip_missing {
            args.push("--skip-missing".into());
        }

        args.push(self.spec_path.clone().into());
        args
    }

    /// Extra environment variables for the child, on top of our own.
    pub fn env(&self) -> Vec<(&'static str, Secret<String>)> {
        match self.token {
            Some(ref tok) => vec![(TOKEN_ENV, tok.clone())],
            None => Vec::new(),
        }
    }

    /// Run the command, failing unless it exits successfully.
    pub fn run<R: ProcessRunner + ?Sized>(&self, runner: &R) -> Result<(), Error> {
        let args = self.args();
        info!("Running: {} {:?}", self.program.display(), args);

        let code = runner
            .run(&self.program, &args, &self.env())
            .with_context(|_| format!("Unable to start {}", self.program.display()))?;

        match code {
            Some(0) => Ok(()),
            code => Err(ReindexFailed {
                program: self.program.clone(),
                code,
            }
            .into()),
        }
    }
}

/// Something which can run a program to completion, letting its output go
/// straight through to ours.
pub trait ProcessRunner {
    /// Returns the exit code, or `None` if the process was killed by a
    /// signal.
    fn run(
        &self,
        program: &Path,
        args: &[OsString],
        env: &[(&str, Secret<String>)],
    ) -> Result<Option<i32>, Error>;
}

/// Runs things for real using `std::process::Command`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        program: &Path,
        args: &[OsString],
        env: &[(&str, Secret<String>)],
    ) -> Result<Option<i32>, Error> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        for &(key, ref value) in env {
            cmd.env(key, value.reveal_str());
        }

        // stdin, stdout and stderr are inherited
        let status = cmd.status().context("Unable to invoke the command")?;
        Ok(status.code())
    }
}

/// One way of guessing where a sibling binary lives.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Strategy {
    /// In the same directory as the current executable.
    Adjacent,
    /// Swap our own binary name for theirs, anywhere it appears in the path
    /// we were invoked with.
    Substitute,
}

impl Strategy {
    pub const ALL: [Strategy; 2] = [Strategy::Adjacent, Strategy::Substitute];

    pub fn candidate(self, argv0: &Path, name: &str) -> Option<PathBuf> {
        match self {
            Strategy::Adjacent => {
                let dir = match argv0.parent() {
                    Some(dir) if !dir.as_os_str().is_empty() => dir,
                    // a bare name would trigger a $PATH lookup
                    _ => Path::new("."),
                };
                Some(dir.join(name))
            }
            Strategy::Substitute => {
                let full = argv0.to_str()?;
                let base = argv0.file_name()?.to_str()?;
                Some(PathBuf::from(full.replace(base, name)))
            }
        }
    }
}

/// Find a binary called `name`, trying each `Strategy` in turn and falling
/// back to the bare name (i.e. whatever is on `$PATH`).
pub fn resolve_binary(argv0: &Path, name: &str) -> PathBuf {
    resolve_with(&Strategy::ALL, argv0, name)
}

pub fn resolve_with(strategies: &[Strategy], argv0: &Path, name: &str) -> PathBuf {
    for strategy in strategies {
        if let Some(candidate) = strategy.candidate(argv0, name) {
            let is_file = fs::metadata(&candidate)
                .map(|meta| !meta.is_dir())
                .unwrap_or(false);

            if is_file {
                debug!("Found {} at {} ({:?})", name, candidate.display(), strategy);
                return candidate;
            }
        }
    }

    debug!("Falling back to looking up {} on $PATH", name);
    PathBuf::from(name)
}
