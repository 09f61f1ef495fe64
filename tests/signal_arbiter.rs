//! Signal arbiter and end-to-end App tests with injected termination requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use graceful_shutdown::lifecycle::signals::{self, TerminationKind, TerminationRequest};
use graceful_shutdown::{App, ExitOutcome, ManagedServer, ShutdownContext};

mod common;

fn interrupt() -> TerminationRequest {
    TerminationRequest::new(TerminationKind::Interrupt)
}

#[test]
fn exit_codes_are_distinct() {
    assert_eq!(ExitOutcome::Clean.code(), 0);
    assert_eq!(ExitOutcome::ForcedByTimeout.code(), 1);
    assert_eq!(ExitOutcome::ForcedByOperator.code(), 127);
}

#[tokio::test]
async fn clean_exit_when_every_phase_fits() {
    let (server, addr) = common::bound_server("business").await;
    let released = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&released);

    let app = App::builder()
        .shared_server(server)
        .shutdown_deadline(Duration::from_secs(2))
        .drain_budget(Duration::from_millis(100))
        .callback_budget(Duration::from_millis(300))
        .callback("flush", |ctx: ShutdownContext| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                _ = ctx.done() => {}
            }
        })
        .cleanup("pool", move || flag.store(true, Ordering::SeqCst))
        .build();

    let (tx, rx) = signals::channel();
    let outcome = tokio::spawn(app.serve_until(rx));

    let client = common::client();
    let res = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    tx.send(interrupt()).unwrap();
    let outcome = outcome.await.unwrap();
    assert_eq!(outcome, ExitOutcome::Clean);
    assert_eq!(outcome.code(), 0);
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn deadline_shorter_than_sequence_forces_timeout_exit() {
    let (server, _addr) = common::bound_server("business").await;
    let released = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&released);

    let app = App::builder()
        .shared_server(server.clone())
        .shutdown_deadline(Duration::from_millis(300))
        .drain_budget(Duration::from_secs(1))
        .callback_budget(Duration::from_secs(1))
        .cleanup("pool", move || flag.store(true, Ordering::SeqCst))
        .build();

    let (tx, rx) = signals::channel();
    let outcome = tokio::spawn(app.serve_until(rx));
    tx.send(interrupt()).unwrap();

    let started = Instant::now();
    let outcome = outcome.await.unwrap();
    assert_eq!(outcome, ExitOutcome::ForcedByTimeout);
    assert_ne!(outcome.code(), ExitOutcome::Clean.code());
    assert!(started.elapsed() < Duration::from_millis(800));
    assert!(!released.load(Ordering::SeqCst));

    server.force_close();
}

#[tokio::test]
async fn ignored_cancellation_cannot_outlast_the_deadline() {
    let app = App::builder()
        .shutdown_deadline(Duration::from_millis(400))
        .drain_budget(Duration::from_millis(50))
        .callback_budget(Duration::from_secs(3))
        .callback("stubborn", |_ctx| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .build();

    let (tx, rx) = signals::channel();
    let outcome = tokio::spawn(app.serve_until(rx));
    tx.send(interrupt()).unwrap();

    let started = Instant::now();
    assert_eq!(outcome.await.unwrap(), ExitOutcome::ForcedByTimeout);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn second_request_mid_drain_exits_immediately() {
    let (server, addr) = common::bound_server("business").await;

    let app = App::builder()
        .shared_server(server.clone())
        .drain_budget(Duration::from_secs(10))
        .build();

    let (tx, rx) = signals::channel();
    let outcome = tokio::spawn(app.serve_until(rx));
    tx.send(interrupt()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = common::client()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);

    let sent = Instant::now();
    tx.send(TerminationRequest::new(TerminationKind::Terminate))
        .unwrap();
    let outcome = outcome.await.unwrap();
    assert!(sent.elapsed() < Duration::from_millis(100));
    assert_eq!(outcome, ExitOutcome::ForcedByOperator);
    assert_eq!(outcome.code(), 127);

    server.force_close();
}

#[tokio::test]
async fn closed_request_channel_still_completes() {
    let app = App::builder()
        .drain_budget(Duration::from_millis(50))
        .callback_budget(Duration::from_millis(50))
        .build();

    let (tx, rx) = signals::channel();
    tx.send(interrupt()).unwrap();
    drop(tx);

    assert_eq!(app.serve_until(rx).await, ExitOutcome::Clean);
}

#[tokio::test]
async fn failed_server_start_does_not_stop_the_others() {
    let (healthy, addr) = common::bound_server("business").await;
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let clash = graceful_shutdown::HttpServer::new(
        "clash",
        taken.local_addr().unwrap().to_string(),
    );

    let app = App::builder()
        .shared_server(healthy)
        .server(clash)
        .drain_budget(Duration::from_millis(100))
        .callback_budget(Duration::from_millis(100))
        .build();

    let (tx, rx) = signals::channel();
    let outcome = tokio::spawn(app.serve_until(rx));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let res = common::client()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    tx.send(interrupt()).unwrap();
    assert_eq!(outcome.await.unwrap(), ExitOutcome::Clean);
}
