use ironic_launcher::{
    Environment, IronicLauncher, LaunchMode, LauncherError, LauncherSettings, SetupPolicy,
};
use std::path::PathBuf;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_file(true)
        .with_target(false)
        .with_line_number(true)
        .with_test_writer()
        .try_init();
}

fn supervised(server_program: &str) -> LauncherSettings {
    LauncherSettings::builder()
        .skip_prerequisite()
        .server_program(server_program)
        .launch_mode(LaunchMode::Supervise)
        .build()
        .unwrap()
}

fn temp_script(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "ironic-launcher-{}-{}.sh",
        std::process::id(),
        name
    ));
    std::fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn test_failed_setup_aborts_with_its_exit_code() {
    init_tracing();
    let mut settings = supervised("true");
    settings.prerequisite = Some(ironic_launcher::Prerequisite::Command {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "exit 3".to_string()],
    });

    let error = IronicLauncher::with_environment(settings, Environment::from_process())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(error, LauncherError::PrerequisiteFailed { code: 3 }));
    assert!(error.is_prerequisite());
    assert_eq!(error.exit_code(), 3);
}

#[tokio::test]
async fn test_lenient_setup_still_launches() {
    init_tracing();
    let mut settings = supervised("true");
    settings.prerequisite = Some(ironic_launcher::Prerequisite::Command {
        program: "false".to_string(),
        args: Vec::new(),
    });
    settings.setup_policy = SetupPolicy::Lenient;

    IronicLauncher::with_environment(settings, Environment::from_process())
        .run()
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_exit_code_is_relayed() {
    init_tracing();
    IronicLauncher::with_environment(supervised("true"), Environment::from_process())
        .run()
        .await
        .unwrap();

    let error = IronicLauncher::with_environment(supervised("false"), Environment::from_process())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(error, LauncherError::ServerExited { code: 1 }));
}

#[tokio::test]
async fn test_missing_server_program() {
    init_tracing();
    let settings = supervised("/nonexistent/gunicorn");
    let error = IronicLauncher::with_environment(settings, Environment::from_process())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(error, LauncherError::ServerSpawn { .. }));
    assert_eq!(error.exit_code(), 127);
}

#[tokio::test]
async fn test_sourced_script_exports_reach_the_server() {
    init_tracing();
    let script = temp_script(
        "exports",
        "echo 'configuring ironic'\nexport FLASK_RUN_HOST=127.0.0.1\nexport SETUP_MARKER=done\n",
    );
    let settings = LauncherSettings::builder()
        .source_script(script.clone(), PathBuf::from("/bin/sh"))
        .build()
        .unwrap();

    let mut env = Environment::from_process();
    env.set("FLASK_RUN_PORT", "8080");
    env.set("IRONIC_CONFIG", "/somewhere/else.conf");

    let launcher = IronicLauncher::with_environment(settings, env)
        .start()
        .unwrap()
        .run_prerequisite_setup()
        .await
        .unwrap()
        .resolve();
    std::fs::remove_file(&script).unwrap();

    assert_eq!(launcher.config().bind_spec(), "127.0.0.1:8080");

    let command = launcher.server_command();
    assert_eq!(command.program, "gunicorn");
    assert_eq!(
        command.args,
        [
            "-b",
            "127.0.0.1:8080",
            "-w",
            "4",
            "ironic_prometheus_exporter.app.wsgi:application"
        ]
    );
    assert_eq!(command.env.get("SETUP_MARKER"), Some("done"));
    assert_eq!(command.env.get("IRONIC_CONFIG"), Some("/etc/ironic/ironic.conf"));
}

#[tokio::test]
async fn test_missing_setup_script_is_fatal_when_strict() {
    init_tracing();
    let settings = LauncherSettings::builder()
        .source_script("/nonexistent/configure-ironic.sh", "/bin/sh")
        .server_program("true")
        .launch_mode(LaunchMode::Supervise)
        .build()
        .unwrap();

    let error = IronicLauncher::with_environment(settings, Environment::from_process())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(error, LauncherError::PrerequisiteFailed { .. }));
    assert_ne!(error.exit_code(), 0);
}

#[tokio::test]
async fn test_missing_setup_shell_cannot_be_ignored() {
    init_tracing();
    let settings = LauncherSettings::builder()
        .source_script("/dev/null", "/nonexistent/bash")
        .setup_policy(SetupPolicy::Lenient)
        .server_program("true")
        .launch_mode(LaunchMode::Supervise)
        .build()
        .unwrap();

    let error = IronicLauncher::with_environment(settings, Environment::from_process())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(error, LauncherError::PrerequisiteSpawn { .. }));
    assert_eq!(error.exit_code(), 127);
}
