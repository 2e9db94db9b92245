// tests/registry_tests.rs
use request_router::load_balancer::{LoadBalancer, RoundRobinBalancer};
use request_router::proxy::BackendPool;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_loses_no_updates() {
    let pool = Arc::new(BackendPool::new(Vec::new()));

    let mut tasks = Vec::new();
    for port in 3000..3050u16 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            pool.register(&format!("http://localhost:{}", port))
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(pool.len().await, 50);

    let ids: HashSet<String> = pool
        .snapshot()
        .await
        .iter()
        .map(|b| b.id.clone())
        .collect();
    assert_eq!(ids.len(), 50, "registered entries collided or were lost");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mixed_mutation_keeps_registry_consistent() {
    let pool = Arc::new(BackendPool::new(Vec::new()));
    for port in 4000..4010u16 {
        pool.register(&format!("http://localhost:{}", port))
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for port in 5000..5020u16 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            pool.register(&format!("http://localhost:{}", port))
                .await
                .unwrap();
        }));
    }
    for port in 4000..4010u16 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            pool.unregister(&format!("http://localhost:{}", port)).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // 10 seeded entries removed, 20 added.
    assert_eq!(pool.len().await, 20);
}

#[tokio::test]
async fn selection_follows_registration_order_after_removal() {
    let pool = BackendPool::new(Vec::new());
    for port in [3000, 3001, 3002u16] {
        pool.register(&format!("http://localhost:{}", port))
            .await
            .unwrap();
    }
    pool.unregister("http://localhost:3001").await;

    let balancer = RoundRobinBalancer::new();
    let snapshot = pool.snapshot().await;

    // Two survivors alternate.
    let first = balancer.select_backend(&snapshot).await.unwrap();
    let second = balancer.select_backend(&snapshot).await.unwrap();
    let third = balancer.select_backend(&snapshot).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(first.id, third.id);
    assert!(!snapshot.iter().any(|b| b.id == "localhost:3001"));
}
