//! Queued user operations survive process restarts.

use opsync_engine::Operation;
use opsync_testkit::prelude::*;
use opsync_user::{CreateUser, SetTag};
use proptest::prelude::*;
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn enqueued_operations_reload_in_order(ops in operation_sequence_strategy(1, 12)) {
        let mut harness = RestartHarness::new().with_config(idle_config());
        let rt = runtime();

        let ids = rt.block_on(async {
            let repo = harness.open(FakeBackend::new());
            repo.start();
            let mut ids = Vec::new();
            for op in &ops {
                ids.push(repo.enqueue(op.clone(), false).unwrap());
            }
            repo.shutdown().await;
            ids
        });

        prop_assert_eq!(harness.persisted_operations(), ops.clone());

        let reloaded = rt.block_on(async {
            let repo = harness.open(FakeBackend::new());
            repo.start();
            repo.await_initialized().await.unwrap();
            let pending = repo.pending_ids();
            repo.shutdown().await;
            pending
        });
        prop_assert_eq!(reloaded, ids);
    }
}

#[tokio::test(start_paused = true)]
async fn offline_work_drains_after_restart() {
    let mut harness = RestartHarness::new();

    {
        let backend = FakeBackend::new();
        backend.set_offline(true);
        let repo = harness.open(backend.clone());
        repo.start();
        repo.enqueue(CreateUser::new(TEST_APP_ID, "local-u").into(), false)
            .unwrap();
        repo.enqueue(SetTag::new(TEST_APP_ID, "local-u", "level", "1").into(), false)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(backend.batches().is_empty());
        assert!(repo.stats().retries > 0);
        repo.shutdown().await;
    }

    let backend = FakeBackend::new();
    let repo = harness.open(backend.clone());
    repo.start();
    for _ in 0..1_000 {
        if repo.pending_count() == 0 && !backend.batches().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    repo.shutdown().await;
    drop(repo);

    let names: Vec<String> = backend
        .accepted()
        .iter()
        .map(|op| op.name().to_string())
        .collect();
    assert_eq!(names, vec!["create-user", "set-tag"]);
    assert_eq!(harness.launches(), 2);
    assert!(harness.persisted_operations().is_empty());
}
