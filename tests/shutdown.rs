//! Shutdown paths: done, interrupts, fatal bind failures and configuration errors.

use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use portico::config::validation::ValidationError;
use portico::ServeError;

mod common;

use common::{config_without_certs, free_port, get_with_retry, local, Running};

#[tokio::test]
async fn done_runs_collaborator_hooks_once_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let mut config = config_without_certs(&local(port), dir.path());
    config.protocol.plain_http_only = true;

    let mut running = Running::start(config);
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["close cache", "flush log"] {
        let order = Arc::clone(&order);
        running.hooks.register(move || order.lock().unwrap().push(name));
    }
    running.ready().await;

    let hooks = running.hooks.clone();
    assert!(running.finish().await.is_ok());

    assert!(hooks.is_completed());
    assert_eq!(*order.lock().unwrap(), vec!["close cache", "flush log"]);
    assert_eq!(hooks.run_all(), 0);
    assert_eq!(order.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn listener_is_released_after_done() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let mut config = config_without_certs(&local(port), dir.path());
    config.protocol.plain_http_only = true;

    let mut running = Running::start(config);
    running.ready().await;

    let client = reqwest::Client::new();
    let url = format!("http://{}/", local(port));
    get_with_retry(|| client.get(&url).send()).await;

    assert!(running.finish().await.is_ok());
    assert!(std::net::TcpListener::bind(local(port)).is_ok());
}

#[tokio::test]
async fn plain_mode_with_address_in_use_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = taken.local_addr().unwrap().to_string();
    let mut config = config_without_certs(&address, dir.path());
    config.protocol.plain_http_only = true;

    let running = Running::start(config);
    let hooks = running.hooks.clone();
    let ran = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&ran);
    hooks.register(move || {
        r.fetch_add(1, Ordering::SeqCst);
    });

    let state = running.orchestrator.serving_state();
    let err = running.join().await.unwrap_err();

    assert!(matches!(err, ServeError::Listener { .. }));
    assert!(hooks.is_completed());
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert!(!state.any());
}

#[tokio::test]
async fn binary_exits_non_zero_when_plain_http_cannot_bind() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = taken.local_addr().unwrap().to_string();

    let child = tokio::process::Command::new(env!("CARGO_BIN_EXE_portico"))
        .args(["--plain-http", "--addr", &address])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let output = tokio::time::timeout(Duration::from_secs(10), child.wait_with_output())
        .await
        .expect("binary did not exit")
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[cfg(unix)]
#[tokio::test]
async fn binary_exits_non_zero_on_interrupt() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use tokio::io::{AsyncBufReadExt, BufReader};

    let address = local(free_port());
    let mut child = tokio::process::Command::new(env!("CARGO_BIN_EXE_portico"))
        .args(["--plain-http", "--addr", &address])
        .env("RUST_LOG", "info")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    // Wait for the ready line so the interrupt handler is installed.
    let mut lines = BufReader::new(child.stdout.take().unwrap()).lines();
    let ready = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if line.contains("Ready") {
                return true;
            }
        }
        false
    })
    .await
    .expect("binary never became ready");
    assert!(ready);
    tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pid = Pid::from_raw(child.id().unwrap() as i32);
    kill(pid, Signal::SIGINT).unwrap();

    let status = tokio::time::timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("binary did not exit after SIGINT")
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[tokio::test]
async fn open_url_with_serve_nothing_is_rejected_before_starting() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_without_certs(&local(free_port()), dir.path());
    config.protocol.serve_nothing = true;
    config.open_url_after_serving = true;

    let running = Running::start(config);
    let hooks = running.hooks.clone();
    let err = running.join().await.unwrap_err();

    match err {
        ServeError::InvalidConfig(errors) => {
            assert_eq!(errors, vec![ValidationError::OpenUrlWithoutListener]);
        }
        other => panic!("expected invalid configuration, got {other}"),
    }
    assert_eq!(hooks.pending(), 0);
}

#[tokio::test]
async fn dropped_done_sender_keeps_serving() {
    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let mut config = config_without_certs(&local(port), dir.path());
    config.protocol.plain_http_only = true;

    let mut running = Running::start(config);
    running.ready().await;
    drop(running.done.take());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!running.task.is_finished());

    running.task.abort();
}
