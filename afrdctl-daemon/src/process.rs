//! Liveness checks and privileged start/stop of the daemon.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::process::{Command, Stdio};

use filetime::FileTime;

use crate::error::ControlError;
use crate::paths::ControlPaths;

/// Runs command lines with elevated privileges.
pub trait PrivilegedShell {
    fn run(&self, commands: &[String]) -> io::Result<()>;
}

/// Feeds commands to `su` on stdin, one per line.
#[derive(Debug, Clone)]
pub struct SuShell {
    program: OsString,
}

impl SuShell {
    /// Feed commands to `program` instead of `su`.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SuShell {
    fn default() -> Self {
        Self::with_program("su")
    }
}

impl PrivilegedShell for SuShell {
    fn run(&self, commands: &[String]) -> io::Result<()> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Dropping stdin closes the pipe, so the child sees EOF even after a
        // failed write.
        let written = match child.stdin.take() {
            Some(mut stdin) => commands
                .iter()
                .try_for_each(|command| writeln!(stdin, "{command}"))
                .and_then(|()| writeln!(stdin, "exit")),
            None => Ok(()),
        };

        let status = child.wait()?;
        tracing::debug!(%status, "privileged shell exited");
        written
    }
}

/// Start, stop and probe the daemon named by [`ControlPaths::daemon`].
#[derive(Debug, Clone)]
pub struct ProcessController<S = SuShell> {
    paths: ControlPaths,
    shell: S,
}

impl ProcessController<SuShell> {
    pub fn new(paths: ControlPaths) -> Self {
        Self::with_shell(paths, SuShell::default())
    }
}

impl<S: PrivilegedShell> ProcessController<S> {
    pub fn with_shell(paths: ControlPaths, shell: S) -> Self {
        Self { paths, shell }
    }

    pub fn paths(&self) -> &ControlPaths {
        &self.paths
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    /// `true` when the PID file names a live process running our binary.
    /// Every I/O or parse problem reads as "not running".
    pub fn is_running(&self) -> bool {
        match self.running_pid() {
            Ok(pid) => pid.is_some(),
            Err(err) => {
                tracing::debug!(error = %err, "daemon liveness check failed");
                false
            }
        }
    }

    /// PID of the running daemon, `None` if the PID file points elsewhere.
    pub fn running_pid(&self) -> io::Result<Option<u32>> {
        let raw = fs::read(&self.paths.pid_file)?;
        let Some(pid) = parse_pid(&raw) else {
            return Ok(None);
        };
        let cmdline = fs::read(self.paths.cmdline_path(pid))?;
        let argv0 = cmdline.split(|b| *b == 0).next().unwrap_or_default();
        let expected = self.paths.daemon.as_os_str().as_bytes();
        Ok((argv0 == expected).then_some(pid))
    }

    /// `<daemon> -k -D <config>`: kill any running instance, then start.
    pub fn restart_command(&self) -> String {
        format!(
            "{} -k -D {}",
            self.paths.daemon.display(),
            self.paths.config.display()
        )
    }

    /// `<daemon> -k`
    pub fn stop_command(&self) -> String {
        format!("{} -k", self.paths.daemon.display())
    }

    /// Relaunch the daemon with the current config. Fire-and-forget: the
    /// caller re-checks liveness and re-opens the status channel afterwards.
    pub fn restart(&self) -> Result<(), ControlError> {
        self.make_executable();
        let command = self.restart_command();
        tracing::info!(%command, "restarting daemon");
        self.privileged(command)
    }

    pub fn stop(&self) -> Result<(), ControlError> {
        self.make_executable();
        let command = self.stop_command();
        tracing::info!(%command, "stopping daemon");
        self.privileged(command)
    }

    /// Ask the daemon to re-read its config by bumping the file's mtime.
    pub fn reload(&self) {
        let path = &self.paths.config;
        let result = if path.exists() {
            filetime::set_file_mtime(path, FileTime::now())
        } else {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map(drop)
        };
        match result {
            Ok(()) => tracing::debug!(path = %path.display(), "config touched"),
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "cannot touch config"),
        }
    }

    fn make_executable(&self) {
        let daemon = &self.paths.daemon;
        let result = fs::metadata(daemon).and_then(|meta| {
            let mut perms = meta.permissions();
            perms.set_mode(perms.mode() | 0o111);
            fs::set_permissions(daemon, perms)
        });
        if let Err(err) = result {
            tracing::warn!(path = %daemon.display(), error = %err, "cannot mark daemon executable");
        }
    }

    fn privileged(&self, command: String) -> Result<(), ControlError> {
        self.shell
            .run(std::slice::from_ref(&command))
            .map_err(|source| ControlError::Privileged { command, source })
    }
}

/// Leading ASCII decimal digits of a PID file; trailing bytes are ignored.
pub fn parse_pid(raw: &[u8]) -> Option<u32> {
    let digits = raw.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    std::str::from_utf8(&raw[..digits]).ok()?.parse().ok()
}
