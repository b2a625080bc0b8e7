//! Manager sharing across ingestion client constructions
//!
//! Each scenario constructs ingestion handles against a mix of endpoints and
//! counts the distinct managers behind them.

use ingest_resources::config::ManagerConfig;
use ingest_resources::kusto::{Authorization, ManagementClient, MockClient};
use ingest_resources::resource::{
    IdentityPolicy, Manager, Registry, Resource, INGESTION_RESOURCES_COMMAND, KIND_COLUMN,
    URI_COLUMN,
};
use ingest_resources::Ingestion;
use std::sync::Arc;
use std::time::Duration;

const A: &str = "https://test.kusto.windows.net";
const B: &str = "https://test2.kusto.windows.net";
const C: &str = "https://test3.kusto.windows.net";

fn mock(endpoint: &str) -> Arc<dyn ManagementClient> {
    Arc::new(MockClient::new(endpoint))
}

fn lazy_registry() -> Registry {
    Registry::new(ManagerConfig::default().without_background_refresh())
}

/// Count distinct managers behind a set of handles
fn distinct_managers(handles: &[Ingestion]) -> usize {
    let mut seen: Vec<&Manager> = Vec::new();
    for handle in handles {
        if !seen.iter().any(|m| Manager::ptr_eq(m, handle.manager())) {
            seen.push(handle.manager());
        }
    }
    seen.len()
}

fn construct(registry: &Registry, clients: &[(&str, &str)]) -> Vec<Ingestion> {
    clients
        .iter()
        .map(|(endpoint, db)| Ingestion::with_registry(mock(endpoint), db, "table", registry))
        .collect()
}

#[test]
fn test_same_same_different() {
    let registry = lazy_registry();
    let handles = construct(&registry, &[(A, "test"), (A, "test"), (B, "test2")]);
    assert_eq!(distinct_managers(&handles), 2);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_all_same() {
    let registry = lazy_registry();
    let handles = construct(&registry, &[(A, "test"), (A, "test2"), (A, "test3")]);
    assert_eq!(distinct_managers(&handles), 1);
}

#[test]
fn test_all_different() {
    let registry = lazy_registry();
    let handles = construct(&registry, &[(A, "test"), (B, "test"), (C, "test")]);
    assert_eq!(distinct_managers(&handles), 3);
}

#[test]
fn test_secondary_parameters_do_not_split() {
    let registry = lazy_registry();
    let handles = construct(&registry, &[(A, "db1"), (A, "db2"), (B, "db1")]);
    assert_eq!(distinct_managers(&handles), 2);
    assert!(Manager::ptr_eq(handles[0].manager(), handles[1].manager()));
}

#[test]
fn test_credentials_ignored_by_default() {
    let registry = lazy_registry();
    let first = Ingestion::with_registry(
        Arc::new(MockClient::with_auth(A, Authorization::bearer("one"))),
        "db",
        "table",
        &registry,
    );
    let second = Ingestion::with_registry(
        Arc::new(MockClient::with_auth(A, Authorization::bearer("two"))),
        "db",
        "table",
        &registry,
    );
    assert!(Manager::ptr_eq(first.manager(), second.manager()));
}

#[test]
fn test_credentials_split_when_configured() {
    let registry = Registry::new(
        ManagerConfig::default()
            .without_background_refresh()
            .with_identity_policy(IdentityPolicy::EndpointAndCredential),
    );
    let first = Ingestion::with_registry(
        Arc::new(MockClient::with_auth(A, Authorization::bearer("one"))),
        "db",
        "table",
        &registry,
    );
    let second = Ingestion::with_registry(
        Arc::new(MockClient::with_auth(A, Authorization::bearer("two"))),
        "db",
        "table",
        &registry,
    );
    assert!(!Manager::ptr_eq(first.manager(), second.manager()));
}

#[test]
fn test_separate_registries_are_isolated() {
    let first = lazy_registry();
    let second = lazy_registry();
    let a = first.get_or_create(mock(A));
    let b = second.get_or_create(mock(A));
    assert!(!Manager::ptr_eq(&a, &b));
}

#[test]
fn test_concurrent_construction_from_threads() {
    let registry = Arc::new(lazy_registry());

    let threads: Vec<_> = (0..16)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let endpoint = if i % 2 == 0 { A } else { B };
                registry.get_or_create(mock(endpoint))
            })
        })
        .collect();

    let managers: Vec<Manager> = threads
        .into_iter()
        .map(|t| t.join().expect("thread should not panic"))
        .collect();

    assert_eq!(registry.len(), 2);
    for (i, manager) in managers.iter().enumerate() {
        assert!(Manager::ptr_eq(manager, &managers[i % 2]));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_construction_starts_one_loop() {
    let client = Arc::new(MockClient::new(A));
    client.respond_rows(
        INGESTION_RESOURCES_COMMAND,
        &[KIND_COLUMN, URI_COLUMN],
        &[&["queue", "q-uri-1"]],
    );
    let registry = Arc::new(Registry::new(
        ManagerConfig::default().with_refresh_interval(Duration::from_secs(3600)),
    ));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let registry = registry.clone();
            let client: Arc<dyn ManagementClient> = client.clone();
            tokio::spawn(async move { registry.get_or_create(client) })
        })
        .collect();

    let managers: Vec<Manager> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.expect("task should not panic"))
        .collect();

    assert!(managers.iter().all(|m| Manager::ptr_eq(m, &managers[0])));
    assert_eq!(
        managers[0].get("queue").await.unwrap(),
        vec![Resource::new("queue", "q-uri-1")]
    );

    // Give any duplicate loop a chance to show itself
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.calls(INGESTION_RESOURCES_COMMAND), 1);

    registry.shutdown();
}

#[test]
fn test_runtime_free_construction_fills_lazily() {
    let client = Arc::new(MockClient::new(A));
    client.respond_rows(
        INGESTION_RESOURCES_COMMAND,
        &[KIND_COLUMN, URI_COLUMN],
        &[&["queue", "q-uri-1"], &["storage-container", "c-uri-1"]],
    );

    // Background refresh requested, but there is no runtime to run it on
    let registry = Registry::default();
    let manager = registry.get_or_create(client.clone());
    assert!(!manager.is_started());
    assert_eq!(client.calls(INGESTION_RESOURCES_COMMAND), 0);

    let queues = tokio_test::block_on(manager.get("queue")).unwrap();
    assert_eq!(queues, vec![Resource::new("queue", "q-uri-1")]);
    let containers = tokio_test::block_on(manager.get("storage-container")).unwrap();
    assert_eq!(containers, vec![Resource::new("storage-container", "c-uri-1")]);
    assert_eq!(client.calls(INGESTION_RESOURCES_COMMAND), 1);
}
