//! Process orchestration: pipes, one child per stage, fd wiring, exec and reaping.
//!
//! Failure policy: stages are resolved and forked one at a time. If stage `k`
//! cannot be resolved or forked, no further stage is started, but stages
//! `0..k` are left running and are reaped like any other child. Their pipe
//! ends are closed by the parent, so they see end-of-file or a broken pipe.

use crate::command::ExitCode;
use crate::error::ShellError;
use crate::external;
use crate::parser::{Pipeline, Stage};
use crate::signal::ForegroundJob;
use log::{debug, info};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl, open};
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close, dup2, execv, fork, pipe};
use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;

/// Exit status of a child whose program could not be started.
///
/// A program may legitimately exit with the same value, so the parent cannot
/// tell the two cases apart from the status alone.
pub const EXEC_FAILURE_STATUS: i32 = 126;

/// Exit status of a child that could not set up its redirection or pipes.
pub const SETUP_FAILURE_STATUS: i32 = 1;

/// Exit code reported when no stage could be started at all.
pub const NOT_STARTED_STATUS: i32 = 127;

/// Permission bits of a file created by output redirection, before umask.
const REDIRECT_MODE: libc::mode_t = 0o644;

/// A live child process and the stage it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildProcess {
    pub pid: Pid,
    pub stage: usize,
}

/// How one forked stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageExit {
    pub child: ChildProcess,
    pub status: Result<WaitStatus, ShellError>,
}

impl StageExit {
    /// Shell-style exit code: the program's status, or 128 + signal number.
    pub fn code(&self) -> Option<ExitCode> {
        match self.status {
            Ok(WaitStatus::Exited(_, code)) => Some(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => Some(128 + signal as i32),
            _ => None,
        }
    }
}

/// Outcome of one pipeline invocation. Every child listed here has been reaped.
#[derive(Debug, Default)]
pub struct ExitReport {
    pub stages: Vec<StageExit>,
    /// Error that stopped the remaining stages from being started.
    pub failure: Option<ShellError>,
}

impl ExitReport {
    /// Exit code of the pipeline: that of its last reaped stage.
    pub fn exit_code(&self) -> ExitCode {
        self.stages
            .last()
            .and_then(StageExit::code)
            .unwrap_or(NOT_STARTED_STATUS)
    }

    /// Wait errors for individual stages, in stage order.
    pub fn wait_errors(&self) -> impl Iterator<Item = &ShellError> {
        self.stages.iter().filter_map(|s| s.status.as_ref().err())
    }
}

/// Read and write ends of the pipes between consecutive stages.
///
/// Stage `i` writes to `pipes[i].1`; stage `i + 1` reads from `pipes[i].0`.
type Pipes = Vec<(OwnedFd, OwnedFd)>;

/// Run every stage of `pipeline` as a child process and reap them all.
///
/// Each stage's program is resolved against `search_paths` right before it is
/// forked and the result is stored in [`Stage::program`]. Returns an error
/// only if the pipes could not be created, in which case nothing was started.
pub fn run_pipeline(pipeline: &mut Pipeline, search_paths: &[String]) -> Result<ExitReport, ShellError> {
    let pipes = open_pipes(pipeline.len().saturating_sub(1))?;
    let mut children = Vec::with_capacity(pipeline.len());
    let mut report = ExitReport::default();

    for (index, stage) in pipeline.stages_mut().iter_mut().enumerate() {
        let launch = match Launch::prepare(stage, search_paths) {
            Ok(launch) => launch,
            Err(e) => {
                info!("not starting stage {index} or later: {e}");
                report.failure = Some(e);
                break;
            }
        };

        // SAFETY: the child allocates nothing; it only rewires fds, execs or exits.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                debug!("stage {index} ({}) started as pid {child}", launch.name);
                children.push(ChildProcess { pid: child, stage: index });
            }
            Ok(ForkResult::Child) => launch.exec(index, &pipes),
            Err(errno) => {
                info!("fork failed for stage {index}: {errno}");
                report.failure = Some(ShellError::ForkFailed(errno));
                break;
            }
        }
    }

    // Downstream stages only see end-of-file once every write end is closed here.
    drop(pipes);

    report.stages = children.into_iter().map(reap).collect();
    Ok(report)
}

fn open_pipes(count: usize) -> Result<Pipes, ShellError> {
    let mut pipes = Vec::with_capacity(count);
    for _ in 0..count {
        // On error `pipes` is dropped, which closes the ones already made.
        let (read, write) = pipe().map_err(ShellError::PipeCreationFailed)?;
        set_cloexec(&read)?;
        set_cloexec(&write)?;
        pipes.push((read, write));
    }
    Ok(pipes)
}

/// Keep pipe ends out of children forked for other purposes.
fn set_cloexec(fd: &OwnedFd) -> Result<(), ShellError> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .map(drop)
        .map_err(ShellError::PipeCreationFailed)
}

/// Wait for `child` to terminate, forwarding signals to it in the meantime.
fn reap(child: ChildProcess) -> StageExit {
    let _job = ForegroundJob::activate(child.pid);
    let status = loop {
        match waitpid(child.pid, None) {
            Ok(status) => break Ok(status),
            Err(Errno::EINTR) => continue,
            Err(errno) => break Err(ShellError::WaitFailed(errno)),
        }
    };
    debug!("stage {} (pid {}) reaped: {:?}", child.stage, child.pid, status);
    StageExit { child, status }
}

/// Everything a child needs, built before forking so the child only makes system calls.
struct Launch {
    name: String,
    path: CString,
    argv: Vec<CString>,
    redirect: Option<CString>,
    exec_failure: Vec<u8>,
    setup_failure: Vec<u8>,
}

impl Launch {
    fn prepare(stage: &mut Stage, search_paths: &[String]) -> Result<Self, ShellError> {
        let path = external::resolve(stage.name(), search_paths)?;
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| ShellError::ExecFailed(format!("{}: path contains a NUL byte", path.display())))?;
        stage.program = Some(path);

        let argv = stage
            .argv
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ShellError::ExecFailed(format!("{}: argument contains a NUL byte", stage.name())))?;
        let redirect = stage
            .redirect
            .as_deref()
            .map(CString::new)
            .transpose()
            .map_err(|_| ShellError::ExecFailed(format!("{}: target contains a NUL byte", stage.name())))?;

        let name = stage.name().to_string();
        Ok(Self {
            exec_failure: child_message(&ShellError::ExecFailed(name.clone())),
            setup_failure: child_message(&match stage.redirect.as_deref() {
                Some(target) => format!("cannot open output file {target}"),
                None => format!("{name}: cannot set up pipes"),
            }),
            name,
            path: c_path,
            argv,
            redirect,
        })
    }

    /// Runs in the child: wire stdin/stdout for stage `index`, then replace the process image.
    fn exec(self, index: usize, pipes: &Pipes) -> ! {
        if index > 0 {
            self.rewire(pipes[index - 1].0.as_raw_fd(), libc::STDIN_FILENO);
        }
        if index < pipes.len() {
            self.rewire(pipes[index].1.as_raw_fd(), libc::STDOUT_FILENO);
        } else if let Some(target) = &self.redirect {
            let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
            match open(target.as_c_str(), flags, Mode::from_bits_truncate(REDIRECT_MODE)) {
                Ok(fd) => {
                    if fd != libc::STDOUT_FILENO {
                        self.rewire(fd, libc::STDOUT_FILENO);
                        let _ = close(fd);
                    }
                }
                Err(_) => child_exit(&self.setup_failure, SETUP_FAILURE_STATUS),
            }
        }

        for (read, write) in pipes {
            let _ = close(read.as_raw_fd());
            let _ = close(write.as_raw_fd());
        }

        let _ = execv(&self.path, &self.argv);
        child_exit(&self.exec_failure, EXEC_FAILURE_STATUS)
    }

    fn rewire(&self, from: RawFd, to: RawFd) {
        if dup2(from, to).is_err() {
            child_exit(&self.setup_failure, SETUP_FAILURE_STATUS);
        }
    }
}

fn child_message(err: &dyn std::fmt::Display) -> Vec<u8> {
    format!("{}{}\n", crate::error::ERROR_PREFIX, err).into_bytes()
}

/// Report `message` on stderr and leave the child without running any destructors.
fn child_exit(message: &[u8], status: i32) -> ! {
    // SAFETY: plain write(2) and _exit(2) on memory owned by this process.
    unsafe {
        libc::write(libc::STDERR_FILENO, message.as_ptr().cast(), message.len());
        libc::_exit(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::signal::test_lock;
    use nix::sys::wait::WaitPidFlag;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn search_paths() -> Vec<String> {
        vec!["/bin".to_string(), "/usr/bin".to_string()]
    }

    fn stage(argv: &[&str]) -> String {
        argv.iter()
            .map(|a| format!("'{a}'"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn pipeline(stages: &[&[&str]]) -> Pipeline {
        let line = stages.iter().map(|s| stage(s)).collect::<Vec<_>>().join(" | ");
        Pipeline::parse(&line, &Limits::default()).unwrap()
    }

    fn temp_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("pipesh_exec_{}_{}_{}", tag, std::process::id(), nanos))
    }

    fn assert_no_children_left() {
        assert_eq!(
            waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)),
            Err(Errno::ECHILD)
        );
    }

    #[test]
    fn test_single_stage_exit_code() {
        let _lock = test_lock();
        let mut p = pipeline(&[&["sh", "-c", "exit 3"]]);
        let report = run_pipeline(&mut p, &search_paths()).unwrap();
        assert!(report.failure.is_none());
        assert_eq!(report.exit_code(), 3);
        assert!(p.stages()[0].program.is_some());
        assert_no_children_left();
    }

    #[test]
    fn test_two_stage_pipe_moves_every_byte() {
        let _lock = test_lock();
        let out = temp_path("count");
        let consumer = format!("wc -c > {}", out.display());
        let mut p = pipeline(&[
            &["sh", "-c", "head -c 100000 /dev/zero"],
            &["sh", "-c", &consumer],
        ]);

        let report = run_pipeline(&mut p, &search_paths()).unwrap();
        assert_eq!(report.stages.len(), 2);
        assert!(report.stages.iter().all(|s| s.code() == Some(0)));
        assert_no_children_left();

        let counted = fs::read_to_string(&out).unwrap();
        assert_eq!(counted.trim(), "100000");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_redirect_creates_and_truncates_target() {
        let _lock = test_lock();
        let out = temp_path("redirect");
        fs::write(&out, "old contents that are longer\n").unwrap();

        let mut p = pipeline(&[&["echo", "hello", "world"]]);
        p.stages_mut()[0].redirect = Some(out.to_string_lossy().into_owned());
        let report = run_pipeline(&mut p, &search_paths()).unwrap();

        assert_eq!(report.exit_code(), 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello world\n");
        let _ = fs::remove_file(out);
    }

    fn fd_listing(path: &PathBuf) -> Vec<String> {
        let listing = fs::read_to_string(path).unwrap();
        let mut fds: Vec<String> = listing.split_whitespace().map(String::from).collect();
        fds.sort();
        fds
    }

    #[test]
    fn test_stages_start_without_pipe_fds() {
        let _lock = test_lock();

        let alone = temp_path("fds_alone");
        let mut p = pipeline(&[&["ls", "/proc/self/fd"]]);
        p.stages_mut()[0].redirect = Some(alone.to_string_lossy().into_owned());
        run_pipeline(&mut p, &search_paths()).unwrap();

        let piped = temp_path("fds_piped");
        let consumer = format!("cat > {}", piped.display());
        let mut p = pipeline(&[
            &["sh", "-c", "exit 0"],
            &["ls", "/proc/self/fd"],
            &["sh", "-c", &consumer],
        ]);
        let report = run_pipeline(&mut p, &search_paths()).unwrap();
        assert_eq!(report.stages.len(), 3);
        assert_no_children_left();

        // Standard streams plus the directory `ls` itself opened, nothing else.
        let fds = fd_listing(&piped);
        for fd in ["0", "1", "2"] {
            assert!(fds.iter().any(|f| f == fd), "fd {fd} missing from {fds:?}");
        }
        assert_eq!(fds.len(), fd_listing(&alone).len(), "extra fds in {fds:?}");

        let _ = fs::remove_file(alone);
        let _ = fs::remove_file(piped);
    }

    #[test]
    fn test_redirect_when_stdout_was_already_closed() {
        let _lock = test_lock();
        let out = temp_path("closed_stdout");
        let mut p = pipeline(&[&["echo", "hello"]]);
        p.stages_mut()[0].redirect = Some(out.to_string_lossy().into_owned());

        // The target then opens as fd 1 in the stage; it must stay open through exec.
        match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let _ = close(libc::STDOUT_FILENO);
                let code = match run_pipeline(&mut p, &search_paths()) {
                    Ok(report) => report.exit_code(),
                    Err(_) => 99,
                };
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => {
                assert_eq!(waitpid(child, None), Ok(WaitStatus::Exited(child, 0)));
            }
        }
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello\n");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_argv_zero_is_the_name_as_typed() {
        let _lock = test_lock();
        let out = temp_path("argv0");
        let script = format!("echo \"$0\" > {}", out.display());
        let mut p = pipeline(&[&["sh", "-c", &script, "custom-zero"]]);
        run_pipeline(&mut p, &search_paths()).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "custom-zero\n");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn test_unresolved_later_stage_leaves_earlier_ones_to_finish() {
        let _lock = test_lock();
        let mut p = pipeline(&[&["sh", "-c", "exit 0"], &["pipesh-no-such-program"]]);
        let report = run_pipeline(&mut p, &search_paths()).unwrap();

        assert_eq!(
            report.failure,
            Some(ShellError::CommandNotFound("pipesh-no-such-program".to_string()))
        );
        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.stages[0].code(), Some(0));
        assert!(p.stages()[1].program.is_none());
        assert_no_children_left();
    }

    #[test]
    fn test_unresolved_first_stage_starts_nothing() {
        let _lock = test_lock();
        let mut p = pipeline(&[&["pipesh-no-such-program"], &["cat"]]);
        let report = run_pipeline(&mut p, &search_paths()).unwrap();
        assert!(report.stages.is_empty());
        assert!(report.failure.is_some());
        assert_no_children_left();
    }

    #[test]
    fn test_exec_failure_exits_with_reserved_status() {
        let _lock = test_lock();
        let bogus = temp_path("bogus");
        // Executable bit set, but not a format the kernel can run.
        fs::write(&bogus, [0u8, 1, 2, 3]).unwrap();
        fs::set_permissions(&bogus, fs::Permissions::from_mode(0o755)).unwrap();

        let name = bogus.to_string_lossy().into_owned();
        let mut p = pipeline(&[&[name.as_str()]]);
        let report = run_pipeline(&mut p, &[]).unwrap();
        assert_eq!(report.exit_code(), EXEC_FAILURE_STATUS);
        let _ = fs::remove_file(bogus);
    }

    #[test]
    fn test_stage_without_arguments_is_not_found() {
        let _lock = test_lock();
        let mut p = pipeline(&[&["true"]]);
        p.stages_mut()[0].argv.clear();
        let report = run_pipeline(&mut p, &search_paths()).unwrap();
        assert_eq!(report.failure, Some(ShellError::CommandNotFound(String::new())));
        assert!(report.stages.is_empty());
    }

    #[test]
    fn test_signaled_stage_reports_128_plus_signal() {
        let _lock = test_lock();
        let mut p = pipeline(&[&["sh", "-c", "kill -TERM $$"]]);
        let report = run_pipeline(&mut p, &search_paths()).unwrap();
        assert_eq!(report.exit_code(), 128 + libc::SIGTERM);
    }
}
