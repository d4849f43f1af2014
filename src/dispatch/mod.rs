//! Running a package entry point in a child process.
//!
//! The child never evaluates text assembled from user input. It runs a fixed
//! bootstrap program that receives the entry path and a JSON payload as two
//! separate arguments, loads the entry and calls it with a single array:
//! the positionals followed by the options object.

mod deps;
mod payload;

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

use crate::error::Error;
use crate::runtime::Runtime;

pub use deps::NpmDependencyInstaller;
pub use payload::DispatchPayload;

/// Default interpreter for package entry points.
pub const DEFAULT_RUNNER: &str = "node";

/// Loader evaluated by the interpreter; the last two argv elements are the
/// entry path and the payload.
pub const BOOTSTRAP: &str = r#"
const [entry, raw] = process.argv.slice(-2);
const payload = JSON.parse(raw);
Promise.resolve()
  .then(() => {
    const mod = require(entry);
    const run = typeof mod === 'function' ? mod : mod && mod.default;
    if (typeof run !== 'function') {
      throw new Error(`${entry} does not export a function`);
    }
    return run.call(null, [...payload.args, payload.options]);
  })
  .catch((err) => {
    console.error((err && err.message) || err);
    process.exit(1);
  });
"#;

/// Program plus the leading arguments placed before entry and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    program: String,
    args: Vec<String>,
}

impl Interpreter {
    pub fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }

    /// `<program> -e <bootstrap> -- <entry> <payload>`
    pub fn node(program: &str) -> Self {
        Self::new(
            program,
            vec!["-e".to_string(), BOOTSTRAP.to_string(), "--".to_string()],
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The interpreter is spawned directly, never through a shell, so the
    /// payload reaches it as one opaque argument on every platform.
    fn command(&self, entry: &Path, payload: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(entry).arg(payload);
        cmd
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::node(DEFAULT_RUNNER)
    }
}

pub struct Dispatcher<'a, R: Runtime> {
    runtime: &'a R,
    interpreter: Interpreter,
}

impl<'a, R: Runtime> Dispatcher<'a, R> {
    pub fn new(runtime: &'a R, interpreter: Interpreter) -> Self {
        Self {
            runtime,
            interpreter,
        }
    }

    /// Run `entry` with `payload` and wait for it.
    ///
    /// Returns the child's exit code. Standard streams and the working
    /// directory are inherited.
    #[tracing::instrument(skip(self, payload))]
    pub async fn dispatch(&self, entry: Option<&Path>, payload: &DispatchPayload) -> Result<i32> {
        let entry = match entry {
            Some(path) if self.runtime.is_file(path) => path,
            Some(path) => return Err(Error::EntryNotFound(path.to_path_buf()).into()),
            None => return Err(Error::EntryNotFound(Default::default()).into()),
        };

        let json = payload.to_json()?;
        debug!(
            "Dispatching {} to {:?} via {}",
            payload.command,
            entry,
            self.interpreter.program()
        );

        let mut child = self
            .interpreter
            .command(entry, &json)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Spawn {
                program: self.interpreter.program().to_string(),
                reason: e.to_string(),
            })?;

        let status = child
            .wait()
            .await
            .context("Failed to wait for child process")?;
        let code = exit_code(status);
        if code != 0 {
            info!("{} exited with code {}", payload.command, code);
        }
        Ok(code)
    }
}

/// Exit code to report for `status`; a signal `n` maps to `128 + n`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
