use std::cell::RefCell;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use afrdctl_daemon::{ControlError, ControlPaths, PrivilegedShell, ProcessController};
use filetime::FileTime;
use rstest::rstest;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingShell {
    runs: RefCell<Vec<Vec<String>>>,
    fail: bool,
}

impl PrivilegedShell for RecordingShell {
    fn run(&self, commands: &[String]) -> io::Result<()> {
        self.runs.borrow_mut().push(commands.to_vec());
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "su: not found"));
        }
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    paths: ControlPaths,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("cache");
    let run = dir.path().join("run");
    let proc_root = dir.path().join("proc");
    for d in [&cache, &run, &proc_root] {
        fs::create_dir_all(d).unwrap();
    }
    let paths = ControlPaths::new(&cache, &run).with_proc_root(&proc_root);
    Fixture { _dir: dir, paths }
}

fn fake_process(proc_root: &Path, pid: u32, cmdline: &[u8]) {
    let dir = proc_root.join(pid.to_string());
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("cmdline"), cmdline).unwrap();
}

fn controller(paths: &ControlPaths) -> ProcessController<RecordingShell> {
    ProcessController::with_shell(paths.clone(), RecordingShell::default())
}

#[test]
fn running_when_cmdline_matches_daemon_path() {
    let fx = fixture();
    fs::write(&fx.paths.pid_file, b"4242\n").unwrap();
    let mut cmdline = fx.paths.daemon.display().to_string().into_bytes();
    cmdline.extend_from_slice(b"\0-D\0/x/afrd.ini\0");
    fake_process(&fx.paths.proc_root, 4242, &cmdline);

    let ctl = controller(&fx.paths);
    assert!(ctl.is_running());
    assert_eq!(ctl.running_pid().unwrap(), Some(4242));
}

#[rstest]
#[case::other_binary(b"/system/bin/sh\0".as_slice())]
#[case::longer_path(b"/nowhere/afrd-helper\0".as_slice())]
#[case::empty(b"".as_slice())]
fn not_running_when_cmdline_differs(#[case] cmdline: &[u8]) {
    let fx = fixture();
    fs::write(&fx.paths.pid_file, b"4242").unwrap();
    fake_process(&fx.paths.proc_root, 4242, cmdline);
    assert!(!controller(&fx.paths).is_running());
}

#[test]
fn missing_pid_file_or_process_is_not_running() {
    let fx = fixture();
    let ctl = controller(&fx.paths);
    assert!(!ctl.is_running());

    fs::write(&fx.paths.pid_file, b"31337").unwrap();
    assert!(!ctl.is_running());

    fs::write(&fx.paths.pid_file, b"garbage").unwrap();
    assert!(!ctl.is_running());
}

#[test]
fn restart_issues_kill_and_start_with_config() {
    let fx = fixture();
    fs::write(&fx.paths.daemon, b"#!/bin/sh\n").unwrap();
    fs::set_permissions(&fx.paths.daemon, fs::Permissions::from_mode(0o644)).unwrap();

    let ctl = controller(&fx.paths);
    ctl.restart().unwrap();

    let expected = format!(
        "{} -k -D {}",
        fx.paths.daemon.display(),
        fx.paths.config.display()
    );
    assert_eq!(ctl.restart_command(), expected);
    assert_eq!(*ctl.shell().runs.borrow(), vec![vec![expected]]);

    let mode = fs::metadata(&fx.paths.daemon).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111, "daemon marked executable");
}

#[test]
fn stop_issues_kill_only() {
    let fx = fixture();
    let ctl = controller(&fx.paths);
    // Missing binary only warns; the command still goes out.
    ctl.stop().unwrap();
    assert_eq!(
        *ctl.shell().runs.borrow(),
        vec![vec![format!("{} -k", fx.paths.daemon.display())]]
    );
}

#[test]
fn shell_failure_surfaces_command() {
    let fx = fixture();
    let shell = RecordingShell {
        fail: true,
        ..Default::default()
    };
    let ctl = ProcessController::with_shell(fx.paths.clone(), shell);
    let err = ctl.restart().unwrap_err();
    match err {
        ControlError::Privileged { command, .. } => assert!(command.ends_with("afrd.ini")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reload_creates_missing_config() {
    let fx = fixture();
    controller(&fx.paths).reload();
    assert!(fx.paths.config.exists());
    assert_eq!(fs::read(&fx.paths.config).unwrap(), b"");
}

#[test]
fn reload_bumps_mtime_and_keeps_contents() {
    let fx = fixture();
    fs::write(&fx.paths.config, "enable=1\n").unwrap();
    let old = FileTime::from_unix_time(1_000_000, 0);
    filetime::set_file_mtime(&fx.paths.config, old).unwrap();

    controller(&fx.paths).reload();

    let meta = fs::metadata(&fx.paths.config).unwrap();
    assert!(FileTime::from_last_modification_time(&meta) > old);
    assert_eq!(fs::read_to_string(&fx.paths.config).unwrap(), "enable=1\n");
}

#[test]
fn reload_into_missing_directory_is_swallowed() {
    let dir = TempDir::new().unwrap();
    let paths = ControlPaths::new(&dir.path().join("absent"), dir.path());
    controller(&paths).reload();
    assert!(!paths.config.exists());
}
