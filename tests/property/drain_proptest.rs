//! Property-based tests for the drain algorithm
//!
//! Random per-drain delivery outcomes are checked against a simple model of
//! the outbox: nothing vanishes, attempts grow by one per failed attempt,
//! the ceiling holds and deliveries follow creation order.

use crate::common::*;
use postsync::client::sync::SyncEngine;
use postsync::client::{LocalDatabase, OperationStatus};
use postsync::shared::event::SyncTrigger;
use proptest::prelude::*;
use std::sync::Arc;

const DRAINS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modeled {
    Pending(u32),
    Failed,
    Delivered,
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

async fn check_drains(outcomes: Vec<Vec<bool>>) -> Result<(), TestCaseError> {
    let transport = Arc::new(ScriptedTransport::new());
    let db = LocalDatabase::in_memory().await.expect("Failed to open outbox");
    let engine = SyncEngine::new(Arc::new(db.clone()), transport.clone());

    let names: Vec<String> = (0..outcomes.len()).map(|i| format!("item{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let ids = seed_posts(&db, &refs).await;
    let mut model = vec![Modeled::Pending(0); ids.len()];

    for drain in 0..DRAINS {
        for (i, name) in names.iter().enumerate() {
            let reply = if outcomes[i][drain] {
                Reply::Created
            } else {
                Reply::NetworkError
            };
            transport.set_reply(&format!("/posts/{name}"), reply);
        }

        let calls_before = transport.call_count();
        let report = engine.drain(SyncTrigger::Manual).await.report().expect("not skipped");

        let mut expected_calls = Vec::new();
        for (i, state) in model.iter_mut().enumerate() {
            if let Modeled::Pending(attempts) = *state {
                expected_calls.push(format!("/posts/{}", names[i]));
                *state = if outcomes[i][drain] {
                    Modeled::Delivered
                } else if attempts + 1 >= 3 {
                    Modeled::Failed
                } else {
                    Modeled::Pending(attempts + 1)
                };
            }
        }
        let calls = transport.endpoints()[calls_before..].to_vec();
        prop_assert_eq!(&calls, &expected_calls);
        prop_assert_eq!(report.processed, expected_calls.len());

        for (i, id) in ids.iter().enumerate() {
            let stored = db.get(*id).await;
            match model[i] {
                Modeled::Delivered => prop_assert!(stored.is_err()),
                Modeled::Pending(attempts) => {
                    let op = stored.expect("pending item must stay stored");
                    prop_assert_eq!(op.status, OperationStatus::Pending);
                    prop_assert_eq!(op.attempts, attempts);
                }
                Modeled::Failed => {
                    let op = stored.expect("failed item must stay stored");
                    prop_assert_eq!(op.status, OperationStatus::Failed);
                    prop_assert_eq!(op.attempts, 3);
                }
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_drains_follow_outbox_model(
        outcomes in prop::collection::vec(prop::collection::vec(any::<bool>(), DRAINS), 1..6)
    ) {
        runtime().block_on(check_drains(outcomes))?;
    }
}
