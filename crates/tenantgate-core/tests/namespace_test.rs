// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the namespace lifecycle and its audit trail.

mod common;

use std::sync::atomic::Ordering;

use common::{TestGateway, request};
use tenantgate_core::cluster::{
    ANNOTATION_CREATED_BY, ANNOTATION_CUSTOMER_ID, ANNOTATION_NODE_SELECTOR, ClusterError,
};
use tenantgate_core::error::{Conflict, Error, ErrorKind, NotFound, PartialFailure};
use tenantgate_core::namespaces::OrphanPolicy;
use tenantgate_core::platform::MockPlatform;
use tenantgate_core::provisioning::LaunchGuard;
use tenantgate_core::store::{NewNamespace, RecordStore};

async fn gateway(policy: OrphanPolicy) -> TestGateway {
    TestGateway::with_options(MockPlatform::new(), LaunchGuard::Enforced, policy).await
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_tags_namespace_and_records_owner() {
    let gw = TestGateway::new().await;

    let record = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap();
    assert_eq!(record.name, "team-a");
    assert_eq!(record.customer_id, "cust-1");
    assert_eq!(record.created_by, "alice");

    let ns = gw.cluster.namespace("team-a").await.unwrap();
    assert_eq!(ns.annotations[ANNOTATION_CUSTOMER_ID], "cust-1");
    assert_eq!(ns.annotations[ANNOTATION_CREATED_BY], "alice");
    assert_eq!(
        ns.annotations[ANNOTATION_NODE_SELECTOR],
        "node-role.kubernetes.io/tenant="
    );

    let listed = gw.namespaces.list_by_customer("cust-1").await.unwrap();
    assert_eq!(listed, vec![record]);

    let history = gw.history("cust-1").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, "create");
    assert_eq!(history[0].outcome, "success");
    assert_eq!(history[0].actor, "alice");
    assert_eq!(gw.metrics.snapshot().namespaces_created, 1);
}

#[tokio::test]
async fn test_create_conflicts_when_cluster_has_namespace_regardless_of_store() {
    let gw = TestGateway::new().await;
    gw.cluster.insert_namespace("team-a").await;

    let err = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::Conflict(Conflict::ExistsInCluster(n)) if n == "team-a"));

    // Same answer when the store also has a record.
    gw.store
        .insert_namespace(&NewNamespace {
            name: "team-a".into(),
            customer_id: "cust-1".into(),
            created_by: "alice".into(),
        })
        .await
        .unwrap();
    let err = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NAMESPACE_EXISTS_IN_CLUSTER");
    assert_eq!(gw.cluster.create_count(), 0);
}

#[tokio::test]
async fn test_create_conflicts_when_only_store_has_record() {
    let gw = TestGateway::new().await;
    gw.store
        .insert_namespace(&NewNamespace {
            name: "team-a".into(),
            customer_id: "cust-1".into(),
            created_by: "alice".into(),
        })
        .await
        .unwrap();

    let err = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(Conflict::ExistsInStore(_))));
    assert_eq!(gw.cluster.create_count(), 0);

    let history = gw.history("cust-1").await;
    assert_eq!(history[0].outcome, "error");
    assert!(history[0].details.contains("[NAMESPACE_EXISTS_IN_STORE]"));
    assert!(history[0].error_message.is_some());
}

#[tokio::test]
async fn test_create_maps_cluster_race_to_conflict() {
    let gw = TestGateway::new().await;
    gw.cluster
        .set_create_error(Some(ClusterError::AlreadyExists("team-a".into())))
        .await;

    let err = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NAMESPACE_EXISTS_IN_CLUSTER");
}

#[tokio::test]
async fn test_create_rejects_invalid_names() {
    let gw = TestGateway::new().await;

    for name in ["Team-A", "a", "-team", "team_a"] {
        let err = gw
            .namespaces
            .create(name, "cust-1", "alice")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{name}");
    }
    assert_eq!(gw.cluster.create_count(), 0);
    assert_eq!(gw.history("cust-1").await.len(), 4);
}

#[tokio::test]
async fn test_cluster_failure_is_external_system_error() {
    let gw = TestGateway::new().await;
    gw.cluster
        .set_get_error(Some(ClusterError::Api {
            status: 503,
            message: "etcd unavailable".into(),
        }))
        .await;

    let err = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalSystem);
    assert!(err.to_string().contains("cluster API"));
}

#[tokio::test]
async fn test_record_failure_after_cluster_create_is_surfaced_as_orphan() {
    let gw = gateway(OrphanPolicy::Surface).await;
    gw.store.fail_insert_namespace.store(true, Ordering::SeqCst);

    let err = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(
        err.partial_failure(),
        Some(&PartialFailure::ClusterOrphan {
            namespace: "team-a".into()
        })
    );

    // No rollback: the namespace stays in the cluster without a record.
    assert!(gw.cluster.namespace("team-a").await.is_some());
    assert!(gw.namespaces.list_by_customer("cust-1").await.unwrap().is_empty());
    assert_eq!(gw.metrics.snapshot().partial_failures, 1);

    let history = gw.history("cust-1").await;
    assert!(history[0].details.contains("[CLUSTER_ORPHAN]"));
}

#[tokio::test]
async fn test_record_failure_is_compensated_when_configured() {
    let gw = gateway(OrphanPolicy::Compensate).await;
    gw.store.fail_insert_namespace.store(true, Ordering::SeqCst);

    let err = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PERSISTENCE_ERROR");
    assert!(err.partial_failure().is_none());
    assert!(gw.cluster.namespace("team-a").await.is_none());
    assert_eq!(gw.cluster.delete_count(), 1);
    assert_eq!(gw.metrics.snapshot().partial_failures, 0);
}

#[tokio::test]
async fn test_failed_compensation_still_reports_orphan() {
    let gw = gateway(OrphanPolicy::Compensate).await;
    gw.store.fail_insert_namespace.store(true, Ordering::SeqCst);
    gw.cluster
        .set_delete_error(Some(ClusterError::Transport("connection refused".into())))
        .await;

    let err = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CLUSTER_ORPHAN");
    assert!(gw.cluster.namespace("team-a").await.is_some());
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_removes_namespace_and_record() {
    let gw = TestGateway::new().await;
    gw.namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap();

    gw.namespaces.delete("team-a", "cust-1", "bob").await.unwrap();

    assert!(gw.cluster.namespace("team-a").await.is_none());
    assert!(gw.namespaces.list_by_customer("cust-1").await.unwrap().is_empty());

    let history = gw.history("cust-1").await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].action, "delete");
    assert_eq!(history[0].outcome, "success");
    assert_eq!(history[0].actor, "bob");
    assert_eq!(gw.metrics.snapshot().namespaces_deleted, 1);
}

#[tokio::test]
async fn test_delete_by_non_owner_looks_like_missing_namespace() {
    let gw = TestGateway::new().await;
    gw.namespaces
        .create("ns1", "cust-1", "alice")
        .await
        .unwrap();

    let foreign = gw
        .namespaces
        .delete("ns1", "cust-2", "mallory")
        .await
        .unwrap_err();
    let missing = gw
        .namespaces
        .delete("ns2", "cust-2", "mallory")
        .await
        .unwrap_err();

    assert!(matches!(&foreign, Error::NotFound(NotFound::Namespace(n)) if n == "ns1"));
    assert_eq!(foreign.kind(), ErrorKind::NotFound);
    assert_eq!(foreign.error_code(), missing.error_code());
    assert_eq!(gw.cluster.delete_count(), 0);
    assert!(gw.cluster.namespace("ns1").await.is_some());

    // The failed attempts are audited under the caller's tenant.
    let history = gw.history("cust-2").await;
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.outcome == "error"));
}

#[tokio::test]
async fn test_delete_tolerates_namespace_already_gone_from_cluster() {
    let gw = TestGateway::new().await;
    gw.namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap();
    gw.cluster.remove_namespace("team-a").await;

    gw.namespaces
        .delete("team-a", "cust-1", "alice")
        .await
        .unwrap();
    assert!(
        gw.store
            .get_namespace("team-a", "cust-1")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_delete_cluster_failure_keeps_record() {
    let gw = TestGateway::new().await;
    gw.namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap();
    gw.cluster
        .set_delete_error(Some(ClusterError::Api {
            status: 403,
            message: "forbidden by policy".into(),
        }))
        .await;

    let err = gw
        .namespaces
        .delete("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "EXTERNAL_SYSTEM_ERROR");
    assert_eq!(gw.namespaces.list_by_customer("cust-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_record_failure_is_surfaced_as_record_orphan() {
    let gw = TestGateway::new().await;
    gw.namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap();
    gw.store.fail_delete_namespace.store(true, Ordering::SeqCst);

    let err = gw
        .namespaces
        .delete("team-a", "cust-1", "alice")
        .await
        .unwrap_err();
    assert_eq!(
        err.partial_failure(),
        Some(&PartialFailure::RecordOrphan {
            namespace: "team-a".into()
        })
    );
    assert!(gw.cluster.namespace("team-a").await.is_none());
    assert_eq!(gw.namespaces.list_by_customer("cust-1").await.unwrap().len(), 1);
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_get_hides_other_tenants_and_audits_failures() {
    let gw = TestGateway::new().await;
    let created = gw
        .namespaces
        .create("team-a", "cust-1", "alice")
        .await
        .unwrap();

    let found = gw.namespaces.get("team-a", "cust-1", "alice").await.unwrap();
    assert_eq!(found, created);

    let err = gw
        .namespaces
        .get("team-a", "cust-2", "mallory")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NAMESPACE_NOT_FOUND");

    // Successful reads are not audited, failed ones are.
    assert_eq!(gw.history("cust-1").await.len(), 1);
    let foreign = gw.history("cust-2").await;
    assert_eq!(foreign.len(), 1);
    assert_eq!(foreign[0].action, "get");
}

#[tokio::test]
async fn test_namespace_history_excludes_provisioning_entries() {
    let gw = TestGateway::new().await;
    gw.namespaces.create("pg1", "cust-1", "alice").await.unwrap();
    gw.provisioning.provision(request("pg1")).await.unwrap();

    let history = gw.namespaces.history("cust-1", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].resource, "namespace");
    assert_eq!(history[0].details, "namespace create");
}

#[tokio::test]
async fn test_history_is_newest_first_and_limited() {
    let gw = TestGateway::new().await;
    for name in ["ns-a", "ns-b", "ns-c"] {
        gw.namespaces.create(name, "cust-1", "alice").await.unwrap();
    }

    let history = gw.namespaces.history("cust-1", 2).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].target, "ns-c");
    assert_eq!(history[1].target, "ns-b");

    let names: Vec<String> = gw
        .namespaces
        .list_by_customer("cust-1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, ["ns-a", "ns-b", "ns-c"]);
}
