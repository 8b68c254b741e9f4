//! Running the tool under test.
//!
//! One invocation per call, isolated (child process) or embedded (an
//! in-process entry point). Both streams land in a single log file in
//! emission order; the returned [`ExecutionResult`] holds the same lines.

pub mod discovery;

use crate::error::{HarnessError, LOG_TAIL_LINES, Result, log_tail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Serializes embedded invocations across the whole process.
fn embedded_mutex() -> &'static Mutex<()> {
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX.get_or_init(|| Mutex::new(()))
}

/// How the tool is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Separate OS process per invocation.
    #[default]
    Isolated,
    /// In-process entry point sharing harness state.
    Embedded,
}

impl ExecutionMode {
    /// Whether two invocations may run at the same time.
    #[must_use]
    pub const fn allows_concurrent_invocation(self) -> bool {
        matches!(self, Self::Isolated)
    }

    /// Whether artifacts may still be held open after an invocation returns.
    #[must_use]
    pub const fn may_hold_cache_locks(self) -> bool {
        matches!(self, Self::Embedded)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Isolated => "isolated",
            Self::Embedded => "embedded",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolated" | "forked" | "fork" => Ok(Self::Isolated),
            "embedded" | "in-process" => Ok(Self::Embedded),
            other => Err(HarnessError::Config(format!(
                "unknown execution mode '{other}' (expected isolated or embedded)"
            ))),
        }
    }
}

/// In-process entry point of the tool.
///
/// Implementations write everything they would print to `out`. The return
/// value is the exit status.
pub trait EmbeddedTool: Send + Sync {
    /// Version string the tool reports for itself.
    fn version(&self) -> String;

    fn run(
        &self,
        args: &[String],
        working_dir: &Path,
        env: &BTreeMap<String, String>,
        out: &mut dyn Write,
    ) -> i32;
}

/// Where invocations go.
#[derive(Clone)]
pub enum Launcher {
    Isolated { executable: PathBuf },
    Embedded(Arc<dyn EmbeddedTool>),
}

impl Launcher {
    #[must_use]
    pub fn isolated(executable: impl Into<PathBuf>) -> Self {
        Self::Isolated {
            executable: executable.into(),
        }
    }

    #[must_use]
    pub fn embedded(tool: impl EmbeddedTool + 'static) -> Self {
        Self::Embedded(Arc::new(tool))
    }

    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        match self {
            Self::Isolated { .. } => ExecutionMode::Isolated,
            Self::Embedded(_) => ExecutionMode::Embedded,
        }
    }
}

impl fmt::Debug for Launcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isolated { executable } => f
                .debug_struct("Isolated")
                .field("executable", executable)
                .finish(),
            Self::Embedded(tool) => f
                .debug_tuple("Embedded")
                .field(&tool.version())
                .finish(),
        }
    }
}

/// One invocation request. Immutable once handed to the invoker.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub working_dir: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub log_path: PathBuf,
}

impl InvocationSpec {
    /// Invocation in `working_dir` logging to `working_dir/log.txt`.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let log_path = working_dir.join("log.txt");
        Self {
            working_dir,
            args: Vec::new(),
            env: BTreeMap::new(),
            timeout: None,
            log_path,
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log file; relative paths resolve against the working directory.
    #[must_use]
    pub fn log_path(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.log_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        };
        self
    }
}

/// Outcome of one finished invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    /// Merged stdout/stderr lines in emission order.
    pub lines: Vec<String>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub log_path: PathBuf,
}

impl ExecutionResult {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    #[must_use]
    pub fn tail(&self) -> Vec<String> {
        log_tail(&self.lines, LOG_TAIL_LINES)
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Read a captured log back as lines.
///
/// # Errors
///
/// Returns an I/O error if the log cannot be read.
pub fn read_log_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path).map_err(|err| {
        HarnessError::with_context(format!("reading log {}", path.display()), err)
    })?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect())
}

/// Runs invocations against a [`Launcher`].
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    launcher: Launcher,
}

impl ProcessInvoker {
    #[must_use]
    pub const fn new(launcher: Launcher) -> Self {
        Self { launcher }
    }

    #[must_use]
    pub const fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.launcher.mode()
    }

    /// Run one invocation and wait for it.
    ///
    /// A non-zero exit is not an error here; callers decide.
    ///
    /// # Errors
    ///
    /// `Timeout` when the bound is exceeded (isolated mode), `ToolNotFound`
    /// when the executable cannot be launched, I/O errors for the log file.
    pub fn invoke(&self, spec: &InvocationSpec) -> Result<ExecutionResult> {
        if let Some(parent) = spec.log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        info!(
            mode = %self.mode(),
            args = ?spec.args,
            working_dir = %spec.working_dir.display(),
            "Invoking tool"
        );

        let started = Instant::now();
        let exit_code = match &self.launcher {
            Launcher::Isolated { executable } => run_isolated(executable, spec)?,
            Launcher::Embedded(tool) => run_embedded(tool.as_ref(), spec)?,
        };
        let duration = started.elapsed();

        let lines = read_log_lines(&spec.log_path)?;
        info!(
            exit_code,
            lines = lines.len(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Tool finished"
        );

        Ok(ExecutionResult {
            exit_code,
            lines,
            duration,
            log_path: spec.log_path.clone(),
        })
    }
}

fn spawn(executable: &Path, spec: &InvocationSpec, log: &File) -> Result<Child> {
    let stdout = log.try_clone()?;
    let stderr = log.try_clone()?;
    Command::new(executable)
        .args(&spec.args)
        .current_dir(&spec.working_dir)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => HarnessError::ToolNotFound {
                path: executable.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => HarnessError::with_context(
                format!("{} exists but is not executable", executable.display()),
                err,
            ),
            _ => HarnessError::with_context(
                format!("launching {}", executable.display()),
                err,
            ),
        })
}

fn exit_code_of(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(-1)
}

fn run_isolated(executable: &Path, spec: &InvocationSpec) -> Result<i32> {
    // Both streams share one file description, so writes interleave in the
    // order the child issues them.
    let log = File::create(&spec.log_path)?;
    let mut child = spawn(executable, spec, &log)?;
    drop(log);
    debug!(pid = child.id(), "Spawned tool process");

    let Some(timeout) = spec.timeout else {
        return Ok(exit_code_of(child.wait()?));
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(exit_code_of(status));
        }
        if start.elapsed() > timeout {
            warn!(pid = child.id(), ?timeout, "Tool timed out, killing it");
            if let Err(err) = child.kill() {
                warn!(error = %err, "Failed to kill timed-out tool");
            }
            let _ = child.wait();
            let lines = read_log_lines(&spec.log_path).unwrap_or_default();
            return Err(HarnessError::Timeout {
                timeout,
                log_path: spec.log_path.clone(),
                tail: log_tail(&lines, LOG_TAIL_LINES),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn run_embedded(tool: &dyn EmbeddedTool, spec: &InvocationSpec) -> Result<i32> {
    if let Some(timeout) = spec.timeout {
        warn!(
            ?timeout,
            "Timeout cannot be enforced for embedded invocations; waiting without bound"
        );
    }

    // A panicking tool poisons the lock; the guarded state is `()`.
    let _guard = embedded_mutex()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    let mut out = BufWriter::new(File::create(&spec.log_path)?);
    let code = tool.run(&spec.args, &spec.working_dir, &spec.env, &mut out);
    out.flush()?;
    Ok(code)
}
