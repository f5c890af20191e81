//! Thin subprocess helper for the VCS backends.
//!
//! Re-architects spack's `which(...)`/`Executable` pattern: a named tool is
//! resolved once, invoked with a fixed working directory and environment
//! overlay, and failures carry the tool's stderr for diagnostics.

use crate::util::errors::{ErrorKind, Res};
use failure::{bail, ResultExt};
use slog::Logger;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

pub struct Tool {
    name: &'static str,
    env: HashMap<String, String>,
    env_remove: Vec<&'static str>,
}

impl Tool {
    pub fn new(name: &'static str) -> Tool {
        Tool {
            name,
            env: HashMap::new(),
            env_remove: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Tool {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Strips an inherited environment variable before invoking the tool
    /// (spec §6: `PYTHONPATH` is cleared for Mercurial invocations, since
    /// `hg` may itself be a Python program and misbehaves if it inherits
    /// the caller's module search path).
    pub fn env_remove(mut self, key: &'static str) -> Tool {
        self.env_remove.push(key);
        self
    }

    /// Runs the tool with `args` in `cwd`, logging the invocation at debug
    /// level the way spack does when `config:debug` is set.
    pub fn run(&self, args: &[&str], cwd: &Path, log: &Logger) -> Res<String> {
        slog::debug!(log, "running tool"; "tool" => self.name, "args" => self.escaped(args));

        let mut cmd = Command::new(self.name);
        cmd.args(args).current_dir(cwd);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        for k in &self.env_remove {
            cmd.env_remove(k);
        }

        let output = cmd.output().context(ErrorKind::InvalidArgs(format!(
            "could not run `{}`; is it installed?",
            self.name
        )))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{} {}` failed: {}",
                self.name,
                args.join(" "),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Renders `args` as a shell-quoted command line for log messages.
    fn escaped(&self, args: &[&str]) -> String {
        use std::borrow::Cow;
        let mut parts = vec![self.name.to_string()];
        parts.extend(
            args.iter()
                .map(|a| shell_escape::escape(Cow::Borrowed(*a)).into_owned()),
        );
        parts.join(" ")
    }

    /// Like `run`, but a non-zero exit is tolerated and swallowed (spack's
    /// `ignore_errors=1` used around `git pull --tags` on old clients).
    pub fn run_ignore_errors(&self, args: &[&str], cwd: &Path, log: &Logger) {
        let mut cmd = Command::new(self.name);
        cmd.args(args).current_dir(cwd);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        for k in &self.env_remove {
            cmd.env_remove(k);
        }
        if let Ok(output) = cmd.output() {
            if !output.status.success() {
                slog::debug!(log, "ignoring nonzero exit"; "tool" => self.name);
            }
        }
    }
}
