#![cfg(unix)]

use tokio::sync::mpsc;
use zinspector_supervisor::{
    find_free_port, LaunchSpec, LogSeverity, ProcessState, ProcessSupervisor,
};

#[tokio::test]
async fn backend_receives_allocated_port() {
    let port = find_free_port(55000, 55100).expect("a free port in the default range");
    assert!((55000..=55100).contains(&port));

    // `sh -c script --port N` binds `$0` to `--port` and `$1` to the port.
    let spec = LaunchSpec::new("sh")
        .with_args(["-c", "echo \"INFO: listening on $1\"; exec sleep 30"])
        .with_port(port);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut supervisor = ProcessSupervisor::new().with_line_tap(tx);
    supervisor.spawn(&spec).expect("spawn backend");

    let line = rx.recv().await.expect("startup line");
    assert_eq!(line.severity, LogSeverity::Info);
    assert_eq!(line.message, format!("listening on {port}"));

    let report = supervisor.shutdown().await.expect("shutdown").expect("exit report");
    assert!(!report.is_crash());
    assert_eq!(supervisor.state(), ProcessState::Exited);
    assert_eq!(supervisor.shutdown().await.expect("second shutdown"), None);
}
