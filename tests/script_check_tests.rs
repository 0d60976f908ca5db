// tests/script_check_tests.rs
#![cfg(unix)]

use health_checker::config::Config;
use health_checker::health::{HealthChecker, HealthService, Singleflight};
use health_checker::probe::Executors;
use hyper::StatusCode;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn build_service(config: &Config) -> Arc<HealthService> {
    let probes = config.probe_specs().unwrap();
    let executors = Executors::new(&config.timeouts).unwrap();
    let checker = HealthChecker::new(probes, executors, None);
    Arc::new(HealthService::new(
        checker,
        Singleflight::new(config.singleflight),
        config.detailed_status,
        None,
    ))
}

#[tokio::test]
async fn test_failing_script_short_circuits_sleepers() {
    let dir = TempDir::new().unwrap();
    let fail = write_script(dir.path(), "fail.sh", "exit 1");
    let sleeper = write_script(dir.path(), "sleeper.sh", "sleep 10");

    let config = Config {
        scripts: vec![
            sleeper.display().to_string(),
            fail.display().to_string(),
            sleeper.display().to_string(),
        ],
        ..Config::default()
    };
    let service = build_service(&config);

    let started = Instant::now();
    let result = service.check().await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!result.succeeded);
    assert_eq!(result.failures.len(), 1);
    assert!(result.failures[0].contains("fail.sh"));
}

#[tokio::test]
async fn test_singleflight_runs_script_once() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("runs.log");
    let script = write_script(dir.path(), "count.sh", "echo run >> \"$1\"\nsleep 1");

    let config = Config {
        scripts: vec![format!("{} {}", script.display(), log.display())],
        singleflight: true,
        ..Config::default()
    };
    let service = build_service(&config);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.handle().await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().status, StatusCode::OK);
    }

    let runs = std::fs::read_to_string(&log).unwrap();
    assert_eq!(runs.lines().count(), 1);
}

#[tokio::test]
async fn test_without_singleflight_every_request_runs_script() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("runs.log");
    let script = write_script(dir.path(), "count.sh", "echo run >> \"$1\"\nsleep 1");

    let config = Config {
        scripts: vec![format!("{} {}", script.display(), log.display())],
        ..Config::default()
    };
    let service = build_service(&config);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.handle().await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().status, StatusCode::OK);
    }

    let runs = std::fs::read_to_string(&log).unwrap();
    assert_eq!(runs.lines().count(), 10);
}

#[tokio::test]
async fn test_tcp_and_script_checks_together() {
    let dir = TempDir::new().unwrap();
    let ok = write_script(dir.path(), "ok.sh", "echo healthy");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        ports: vec![addr.to_string()],
        scripts: vec![ok.display().to_string()],
        detailed_status: true,
        ..Config::default()
    };
    let resp = build_service(&config).handle().await;

    assert_eq!(resp.status, StatusCode::OK);
    let payload: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
    assert_eq!(payload["status"], "OK");
}
