//! Std adapters for fjgate.
//!
//! In clean-arch terms: this is where we touch the world.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub timeout: Option<Duration>,
    pub output_cap_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub wall_ms: u64,
    pub exit_code: i32,
    pub timed_out: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes past `output_cap_bytes` were dropped from `stdout`.
    pub stdout_truncated: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("command argv must not be empty")]
    EmptyArgv,

    #[error("timeout is not supported on this platform")]
    TimeoutUnsupported,

    #[error("not a valid executable: {0} does not exist")]
    ExecutableNotFound(PathBuf),

    #[error("not a valid executable: {0} is not a regular file")]
    ExecutableNotAFile(PathBuf),

    #[error("not a valid executable: {0} is not executable")]
    ExecutableNotExecutable(PathBuf),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Runs one command to completion. Shared across worker threads.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError>;
}

#[derive(Debug, Default, Clone)]
pub struct StdProcessRunner;

impl ProcessRunner for StdProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError> {
        if spec.argv.is_empty() {
            return Err(AdapterError::EmptyArgv);
        }

        #[cfg(unix)]
        {
            return run_unix(spec);
        }

        #[cfg(not(unix))]
        {
            if spec.timeout.is_some() {
                return Err(AdapterError::TimeoutUnsupported);
            }
            run_portable(spec)
        }
    }
}

/// Default worker count: one per logical CPU.
pub fn available_parallelism() -> usize {
    num_cpus::get().max(1)
}

/// Check that `path` names an executable regular file and make it absolute.
///
/// A bare name (no directory part) that does not exist in the working
/// directory is looked up on `PATH`.
pub fn resolve_executable(path: &Path) -> Result<PathBuf, AdapterError> {
    let candidate = if path.exists() || path.components().count() > 1 {
        path.to_path_buf()
    } else {
        which::which(path.as_os_str())
            .map_err(|_| AdapterError::ExecutableNotFound(path.to_path_buf()))?
    };

    let meta = std::fs::metadata(&candidate)
        .map_err(|_| AdapterError::ExecutableNotFound(path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(AdapterError::ExecutableNotAFile(path.to_path_buf()));
    }
    if !is_executable(&meta) {
        return Err(AdapterError::ExecutableNotExecutable(path.to_path_buf()));
    }

    let absolute = std::path::absolute(&candidate)
        .with_context(|| format!("failed to resolve {}", candidate.display()))?;
    Ok(absolute)
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}

/// Cut `bytes` to `cap`, reporting whether anything was dropped.
#[cfg(any(not(unix), test))]
fn truncate(mut bytes: Vec<u8>, cap: usize) -> (Vec<u8>, bool) {
    let cut = bytes.len() > cap;
    if cut {
        bytes.truncate(cap);
    }
    (bytes, cut)
}

#[cfg(not(unix))]
fn run_portable(spec: &CommandSpec) -> Result<RunResult, AdapterError> {
    use std::process::{Command, Stdio};

    let start = Instant::now();
    let out = Command::new(&spec.argv[0])
        .args(&spec.argv[1..])
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to run {}", spec.argv[0]))
        .map_err(AdapterError::Other)?;

    let wall_ms = start.elapsed().as_millis() as u64;
    let exit_code = out.status.code().unwrap_or(-1);
    let (stdout, stdout_truncated) = truncate(out.stdout, spec.output_cap_bytes);
    let (stderr, _) = truncate(out.stderr, spec.output_cap_bytes);

    Ok(RunResult {
        wall_ms,
        exit_code,
        timed_out: false,
        stdout,
        stderr,
        stdout_truncated,
    })
}

#[cfg(unix)]
fn run_unix(spec: &CommandSpec) -> Result<RunResult, AdapterError> {
    use std::os::unix::process::ExitStatusExt;
    use std::process::{Command, Stdio};
    use std::thread;

    let start = Instant::now();

    let mut cmd = Command::new(&spec.argv[0]);
    cmd.args(&spec.argv[1..]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    // argv can be thousands of tokens; only name the program.
    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {}", spec.argv[0]))
        .map_err(AdapterError::Other)?;

    let pid = child.id() as libc::pid_t;

    let mut stdout = child.stdout.take().expect("stdout piped");
    let mut stderr = child.stderr.take().expect("stderr piped");

    let cap = spec.output_cap_bytes;

    let out_handle = thread::spawn(move || read_with_cap(&mut stdout, cap));
    let err_handle = thread::spawn(move || read_with_cap(&mut stderr, cap));

    let (status_raw, timed_out) = wait_with_timeout(pid, spec.timeout)?;

    // Safety: we have reaped the child via waitpid; drop the Child handle without waiting.
    drop(child);

    let (stdout, stdout_truncated) = out_handle.join().unwrap_or_default();
    let (stderr, _) = err_handle.join().unwrap_or_default();

    let wall_ms = start.elapsed().as_millis() as u64;

    let exit_status = std::process::ExitStatus::from_raw(status_raw);
    let exit_code = exit_status.code().unwrap_or(-1);

    Ok(RunResult {
        wall_ms,
        exit_code,
        timed_out,
        stdout,
        stderr,
        stdout_truncated,
    })
}

/// Drain `reader` fully, keeping at most `cap` bytes so the child never
/// blocks on a full pipe. The flag is set when bytes were dropped.
#[cfg(unix)]
fn read_with_cap<R: std::io::Read>(reader: &mut R, cap: usize) -> (Vec<u8>, bool) {
    let mut buf: Vec<u8> = Vec::new();
    let mut tmp = [0u8; 8192];
    let mut truncated = false;

    loop {
        match reader.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => {
                let take = (cap - buf.len()).min(n);
                buf.extend_from_slice(&tmp[..take]);
                truncated |= take < n;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    (buf, truncated)
}

#[cfg(unix)]
fn wait_with_timeout(
    pid: libc::pid_t,
    timeout: Option<Duration>,
) -> Result<(libc::c_int, bool), AdapterError> {
    let start = Instant::now();
    let mut status: libc::c_int = 0;
    let mut timed_out = false;

    loop {
        let options = if timeout.is_some() { libc::WNOHANG } else { 0 };

        let res = unsafe { libc::waitpid(pid, &mut status as *mut libc::c_int, options) };

        if res == pid {
            break;
        }

        if res == 0 {
            // still running
            if let Some(t) = timeout {
                if start.elapsed() >= t {
                    timed_out = true;
                    unsafe {
                        libc::kill(pid, libc::SIGKILL);
                    }
                    // Reap it.
                    let res2 = unsafe { libc::waitpid(pid, &mut status as *mut libc::c_int, 0) };
                    if res2 != pid {
                        return Err(AdapterError::Other(anyhow::anyhow!(
                            "waitpid after kill failed: {:?}",
                            std::io::Error::last_os_error()
                        )));
                    }
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(2));
            continue;
        }

        if res == -1 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(AdapterError::Other(anyhow::anyhow!("waitpid failed: {err}")));
        }

        return Err(AdapterError::Other(anyhow::anyhow!(
            "waitpid returned unexpected pid: {res}"
        )));
    }

    Ok((status, timed_out))
}
