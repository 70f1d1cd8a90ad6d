//! Kept in its own test binary: writing an executable while sibling tests
//! fork can fail its exec with ETXTBSY.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const LAUNCHER: &str = env!("CARGO_BIN_EXE_ironic-exporter-launcher");

fn launcher() -> Command {
    let mut cmd = Command::new(LAUNCHER);
    cmd.env_remove("FLASK_RUN_HOST")
        .env_remove("FLASK_RUN_PORT")
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "ironic-launcher-exec-{}-{}",
        std::process::id(),
        name
    ))
}

fn write_executable(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn test_server_replaces_launcher_process() {
    let setup = temp_path("setup.sh");
    let server = temp_path("server.sh");
    let record = temp_path("record");

    std::fs::write(&setup, "export FLASK_RUN_HOST=127.0.0.1\nunset STALE_VAR\n").unwrap();
    write_executable(
        &server,
        &format!(
            "#!/bin/sh\nprintf '%s\\n' \"$$\" \"$*\" \"$IRONIC_CONFIG\" \"${{STALE_VAR-unset}}\" \"$RAW_BYTES\" > '{}'\n",
            record.display()
        ),
    );

    let child = launcher()
        .env("FLASK_RUN_PORT", "8080")
        .env("IRONIC_CONFIG", "/somewhere/else.conf")
        .env("STALE_VAR", "1")
        .env("RAW_BYTES", OsStr::from_bytes(b"caf\xe9"))
        .arg("--setup-script")
        .arg(&setup)
        .args(["--setup-shell", "/bin/sh", "--server-program"])
        .arg(&server)
        .spawn()
        .unwrap();
    let launcher_pid = child.id();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let recorded = std::fs::read(&record).unwrap();
    for path in [&setup, &server, &record] {
        let _ = std::fs::remove_file(path);
    }

    let lines: Vec<&[u8]> = recorded.split(|b| *b == b'\n').collect();
    assert_eq!(lines[0], launcher_pid.to_string().as_bytes());
    assert_eq!(
        lines[1],
        b"-b 127.0.0.1:8080 -w 4 ironic_prometheus_exporter.app.wsgi:application"
    );
    assert_eq!(lines[2], b"/etc/ironic/ironic.conf");
    assert_eq!(lines[3], b"unset");
    assert_eq!(lines[4], b"caf\xe9");
}
