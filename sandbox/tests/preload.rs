// Runs real programs with the library preloaded. The policy name is the
// basename of the resolved executable, so targets are canonicalized first.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// exit_group on x86_64.
const EXIT_GROUP: u32 = 231;

fn library() -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();

    let mut found: Vec<(std::time::SystemTime, PathBuf)> = [deps, deps.parent().unwrap()]
        .iter()
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with("libsandbox") && name.ends_with(".so")
        })
        .filter_map(|path| Some((fs::metadata(&path).ok()?.modified().ok()?, path)))
        .collect();
    found.sort();

    found.pop().expect("libsandbox.so was not built").1
}

fn program(path: &str) -> (PathBuf, String) {
    let resolved = fs::canonicalize(path).unwrap();
    let name = resolved.file_name().unwrap().to_string_lossy().into_owned();
    (resolved, name)
}

fn write_policy(dir: &Path, name: &str, nrs: impl Iterator<Item = u32>) {
    let text: String = nrs.map(|nr| format!("{}\n", nr)).collect();
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(format!("policy_syscalls_{}.txt", name)), text).unwrap();
}

fn everything() -> impl Iterator<Item = u32> {
    0..512
}

fn confined(program: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .env("LD_PRELOAD", library())
        .env_remove("SANDBOX_POLICY_DIR")
        .env_remove("SANDBOX_TRACE_TRAPS")
        .env_remove("SANDBOX_LOG");
    cmd
}

fn run(mut cmd: Command) -> Output {
    cmd.output().expect("could not run confined program")
}

// Kernels before 5.11 have no syscall user dispatch; such hosts skip.
fn dispatch_refused(out: &Output) -> bool {
    String::from_utf8_lossy(&out.stderr).contains("cannot enable syscall user dispatch")
}

#[test]
fn complete_policy_runs_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let (exe, name) = program("/bin/true");
    write_policy(dir.path(), &name, everything());

    let mut cmd = confined(&exe, &[]);
    cmd.env("SANDBOX_POLICY_DIR", dir.path());
    let out = run(cmd);
    if dispatch_refused(&out) {
        return;
    }

    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
    assert!(out.stderr.is_empty(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn output_of_allowed_program_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let (exe, name) = program("/bin/echo");
    write_policy(dir.path(), &name, everything());

    let mut cmd = confined(&exe, &["hello"]);
    cmd.env("SANDBOX_POLICY_DIR", dir.path());
    let out = run(cmd);
    if dispatch_refused(&out) {
        return;
    }

    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(out.stdout, b"hello\n");
}

#[test]
fn default_policy_dir_is_relative_to_working_dir() {
    let root = tempfile::tempdir().unwrap();
    let work = root.path().join("work");
    fs::create_dir(&work).unwrap();
    let (exe, name) = program("/bin/true");
    write_policy(&root.path().join("policy"), &name, everything());

    let mut cmd = confined(&exe, &[]);
    cmd.current_dir(&work);
    let out = run(cmd);
    if dispatch_refused(&out) {
        return;
    }

    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn unlisted_syscall_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let (exe, name) = program("/bin/true");
    write_policy(dir.path(), &name, everything().filter(|&nr| nr != EXIT_GROUP));

    let mut cmd = confined(&exe, &[]);
    cmd.env("SANDBOX_POLICY_DIR", dir.path());
    let out = run(cmd);
    if dispatch_refused(&out) {
        return;
    }

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(out.status.code(), Some(1), "{}", stderr);
    assert!(
        stderr.contains(&format!("syscall {} is not in the policy", EXIT_GROUP)),
        "{}",
        stderr
    );
}

#[test]
fn trapped_syscalls_are_reported_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let (exe, name) = program("/bin/true");
    write_policy(dir.path(), &name, everything());

    let mut cmd = confined(&exe, &[]);
    cmd.env("SANDBOX_POLICY_DIR", dir.path())
        .env("SANDBOX_TRACE_TRAPS", "1");
    let out = run(cmd);
    if dispatch_refused(&out) {
        return;
    }

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(out.status.code(), Some(0), "{}", stderr);
    assert!(
        stderr.contains(&format!("trapping (syscall number = {})", EXIT_GROUP)),
        "{}",
        stderr
    );
}

#[test]
fn missing_policy_prevents_startup() {
    let dir = tempfile::tempdir().unwrap();
    let (exe, _) = program("/bin/echo");

    let mut cmd = confined(&exe, &["hello"]);
    cmd.env("SANDBOX_POLICY_DIR", dir.path());
    let out = run(cmd);

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(out.status.code(), Some(1), "{}", stderr);
    assert!(out.stdout.is_empty());
    assert!(stderr.contains("cannot be read"), "{}", stderr);
}

#[test]
fn empty_policy_prevents_startup() {
    let dir = tempfile::tempdir().unwrap();
    let (exe, name) = program("/bin/echo");
    write_policy(dir.path(), &name, std::iter::empty());

    let mut cmd = confined(&exe, &["hello"]);
    cmd.env("SANDBOX_POLICY_DIR", dir.path());
    let out = run(cmd);

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(out.status.code(), Some(1), "{}", stderr);
    assert!(out.stdout.is_empty());
    assert!(stderr.contains("is empty"), "{}", stderr);
}
