//! Supervisor integration tests.

use std::fs;
use std::time::Duration;

use unit_launcher::lifecycle::{DeploymentError, InstallError, UnitState};
use unit_launcher::supervisor::{AnchorWatcher, UnitSupervisor};

mod common;

use common::TestHome;

#[tokio::test]
async fn test_deploy_and_undeploy() {
    let home = TestHome::new();
    home.add_unit("orders", "a = 1\n");
    home.add_unit("billing", "b = 2\n");
    let supervisor = UnitSupervisor::new(home.env());

    supervisor.deploy("orders").await.unwrap();
    supervisor.deploy("billing").await.unwrap();
    assert_eq!(supervisor.names(), vec!["billing".to_string(), "orders".to_string()]);

    let orders = supervisor.get("orders").unwrap();
    assert_eq!(orders.state().await, UnitState::Started);

    assert!(supervisor.undeploy("orders").await.unwrap());
    assert!(!supervisor.undeploy("orders").await.unwrap());
    assert_eq!(orders.state().await, UnitState::Disposed);
    assert_eq!(supervisor.len(), 1);
}

#[tokio::test]
async fn test_failed_deploy_is_not_tracked() {
    let home = TestHome::new();
    home.add_empty_unit("orders");
    let supervisor = UnitSupervisor::new(home.env());

    let err = supervisor.deploy("orders").await.unwrap_err();
    assert!(matches!(
        err,
        DeploymentError::Install(InstallError::ResourceNotFound { .. })
    ));
    assert!(supervisor.is_empty());
}

#[tokio::test]
async fn test_deploying_twice_redeploys() {
    let home = TestHome::new();
    home.add_unit("orders", "a = 1\n");
    let supervisor = UnitSupervisor::new(home.env());

    let first = supervisor.deploy("orders").await.unwrap();
    let before = first.isolation().unwrap();
    let second = supervisor.deploy("orders").await.unwrap();

    assert_eq!(supervisor.len(), 1);
    assert_ne!(before.id(), second.isolation().unwrap().id());
}

#[tokio::test]
async fn test_shutdown_undeploys_everything() {
    let home = TestHome::new();
    home.add_unit("orders", "a = 1\n");
    home.add_unit("billing", "b = 2\n");
    let supervisor = UnitSupervisor::new(home.env());
    let orders = supervisor.deploy("orders").await.unwrap();
    let billing = supervisor.deploy("billing").await.unwrap();

    supervisor.shutdown().await;

    assert!(supervisor.is_empty());
    assert_eq!(orders.state().await, UnitState::Disposed);
    assert_eq!(billing.state().await, UnitState::Disposed);
}

#[tokio::test]
async fn test_removing_marker_requests_undeploy() {
    let home = TestHome::new();
    home.add_unit("orders", "a = 1\n");
    let supervisor = UnitSupervisor::new(home.env());
    supervisor.deploy("orders").await.unwrap();

    let (anchors, mut removed) = AnchorWatcher::new(&home.apps_dir());
    let _watcher = anchors.run().unwrap();

    fs::remove_file(home.apps_dir().join("orders-anchor.txt")).unwrap();
    let unit = tokio::time::timeout(Duration::from_secs(5), removed.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unit, "orders");

    assert!(supervisor.undeploy(&unit).await.unwrap());
    assert!(supervisor.is_empty());
}
