use super::*;
use crate::error::{MatchTier, TransportError};
use crate::kinds::{
    LogicalRouter, LogicalRouterAttributes, LogicalSwitch, LogicalSwitchAttributes,
    SpoofGuardProfile, SpoofGuardProfileAttributes,
};
use crate::testing::{Fault, MemoryGateway};

type Switches = MemoryGateway<LogicalSwitch>;

fn setup() -> (Arc<Switches>, Reconciler<Switches>) {
    let gateway = Arc::new(MemoryGateway::new());
    (gateway.clone(), Reconciler::new(gateway))
}

fn web(admin_state: &str) -> DesiredSpec<LogicalSwitchAttributes> {
    DesiredSpec::new(
        "web",
        LogicalSwitchAttributes {
            transport_zone_id: Some("tz-1".to_string()),
            admin_state: Some(admin_state.to_string()),
            ..Default::default()
        },
    )
}

async fn created(reconciler: &Reconciler<Switches>) -> Tracked<LogicalSwitchAttributes> {
    let mut tracked = Tracked::new(ResourceRef::by_name("web"));
    reconciler.create(&mut tracked, &web("UP")).await.unwrap();
    tracked
}

fn router(router_type: &str) -> LogicalRouterAttributes {
    LogicalRouterAttributes {
        router_type: Some(router_type.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_reads_back_and_tracks() {
    let (gateway, reconciler) = setup();
    let mut tracked = Tracked::new(ResourceRef::by_name("web"));

    let obj = reconciler.create(&mut tracked, &web("UP")).await.unwrap();
    assert_eq!(obj.display_name, "web");
    assert_eq!(tracked.lifecycle, Lifecycle::Present);
    assert_eq!(tracked.id(), Some(obj.id.as_str()));
    assert_eq!(tracked.revision.cached(), Some(0));
    assert_eq!(tracked.snapshot.as_ref(), Some(&obj));

    let calls = gateway.calls().await;
    assert_eq!((calls.create, calls.get, calls.list), (1, 1, 0));
}

#[tokio::test]
async fn test_create_with_unexpected_success_status_is_rejected() {
    let (gateway, reconciler) = setup();
    gateway.answer_create_with(Status::OK).await;

    let mut tracked = Tracked::new(ResourceRef::by_name("web"));
    let err = reconciler.create(&mut tracked, &web("UP")).await.unwrap_err();
    match err {
        ReconcileError::CreateRejected { name, failure, .. } => {
            assert_eq!(name, "web");
            assert_eq!(failure.status, Some(Status::OK));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(tracked.lifecycle, Lifecycle::Unmanaged);
    assert_eq!(tracked.id(), None);
}

#[tokio::test]
async fn test_create_transport_failure_is_rejected() {
    let (gateway, reconciler) = setup();
    gateway
        .fail_next(Fault::Transport(TransportError::Timeout))
        .await;

    let mut tracked = Tracked::new(ResourceRef::by_name("web"));
    let err = reconciler.create(&mut tracked, &web("UP")).await.unwrap_err();
    match err {
        ReconcileError::CreateRejected { name, failure, .. } => {
            assert_eq!(name, "web");
            assert_eq!(failure.status, None);
            assert_eq!(failure.cause, Some(TransportError::Timeout));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(tracked.lifecycle, Lifecycle::Unmanaged);
    assert_eq!(tracked.id(), None);
    assert!(gateway.is_empty().await);
}

#[tokio::test]
async fn test_policy_create_expects_ok() {
    let gateway = Arc::new(MemoryGateway::<SpoofGuardProfile>::new());
    let reconciler = Reconciler::new(gateway.clone());

    let mut tracked = Tracked::new(ResourceRef::by_name("strict"));
    let spec = DesiredSpec::new(
        "strict",
        SpoofGuardProfileAttributes {
            address_binding_allowlist: Some(true),
            ..Default::default()
        },
    );
    let obj = reconciler.create(&mut tracked, &spec).await.unwrap();
    assert!(tracked.is_present());
    assert!(gateway.get_now(&obj.id).await.is_some());
}

#[tokio::test]
async fn test_create_on_present_entry_is_invalid_state() {
    let (gateway, reconciler) = setup();
    let mut tracked = created(&reconciler).await;

    let err = reconciler.create(&mut tracked, &web("UP")).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::InvalidState {
            operation: "create",
            state: Lifecycle::Present,
            ..
        }
    ));
    assert_eq!(gateway.calls().await.create, 1);
}

#[tokio::test]
async fn test_read_of_vanished_object_forgets_it() {
    let (gateway, reconciler) = setup();
    let mut tracked = created(&reconciler).await;
    let old_id = tracked.id().unwrap().to_string();
    gateway.remove(&old_id).await.unwrap();

    let outcome = reconciler.read(&mut tracked).await.unwrap();
    assert_eq!(outcome, ReadOutcome::Gone);
    assert_eq!(tracked.lifecycle, Lifecycle::Unmanaged);
    assert_eq!(tracked.id(), None);
    assert_eq!(tracked.revision.cached(), None);
    assert!(tracked.snapshot.is_none());
    assert_eq!(tracked.reference.display_name(), Some("web"));

    // The next apply recreates it.
    reconciler.create(&mut tracked, &web("UP")).await.unwrap();
    assert_ne!(tracked.id(), Some(old_id.as_str()));
}

#[tokio::test]
async fn test_read_failure_keeps_entry() {
    let (gateway, reconciler) = setup();
    let mut tracked = created(&reconciler).await;
    let before = tracked.clone();

    gateway
        .fail_next(Fault::Status(Status::SERVICE_UNAVAILABLE))
        .await;
    let err = reconciler.read(&mut tracked).await.unwrap_err();
    assert!(matches!(err, ReconcileError::ReadFailed { .. }));
    assert_eq!(tracked, before);
}

#[tokio::test]
async fn test_read_by_name_adopts_id() {
    let (gateway, reconciler) = setup();
    let id = gateway.seed("db", Default::default()).await;

    let mut tracked = Tracked::new(ResourceRef::by_name("db"));
    let outcome = reconciler.read(&mut tracked).await.unwrap();
    assert!(matches!(outcome, ReadOutcome::Present(_)));
    assert_eq!(tracked.id(), Some(id.as_str()));
    assert!(tracked.is_present());
}

#[tokio::test]
async fn test_update_advances_revision() {
    let (gateway, reconciler) = setup();
    let mut tracked = created(&reconciler).await;
    let id = tracked.id().unwrap().to_string();

    let obj = reconciler.update(&mut tracked, &web("DOWN")).await.unwrap();
    assert_eq!(obj.revision, 1);
    assert_eq!(obj.attributes.admin_state.as_deref(), Some("DOWN"));
    assert_eq!(tracked.revision.cached(), Some(1));

    let obj = reconciler.update(&mut tracked, &web("UP")).await.unwrap();
    assert_eq!(obj.revision, 2);
    assert_eq!(tracked.revision.cached(), Some(2));
    assert_eq!(gateway.get_now(&id).await.unwrap().revision, 2);
    assert!(tracked.is_present());
}

#[tokio::test]
async fn test_stale_revision_is_a_conflict() {
    let (gateway, reconciler) = setup();
    let mut tracked = created(&reconciler).await;
    let id = tracked.id().unwrap().to_string();
    assert_eq!(gateway.bump(&id).await, Some(1));

    let err = reconciler.update(&mut tracked, &web("DOWN")).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::ConflictingUpdate { revision: 0, .. }
    ));

    // Nothing was written and nothing was retried.
    let remote = gateway.get_now(&id).await.unwrap();
    assert_eq!(remote.revision, 1);
    assert_eq!(remote.attributes.admin_state.as_deref(), Some("UP"));
    assert_eq!(gateway.calls().await.update, 1);
    assert!(tracked.is_present());
    assert_eq!(tracked.revision.cached(), Some(0));

    // A fresh read picks up the current revision and the update goes through.
    reconciler.read(&mut tracked).await.unwrap();
    let obj = reconciler.update(&mut tracked, &web("DOWN")).await.unwrap();
    assert_eq!(obj.revision, 2);
}

#[tokio::test]
async fn test_update_never_recreates_missing_target() {
    let (gateway, reconciler) = setup();
    let mut tracked = created(&reconciler).await;
    let id = tracked.id().unwrap().to_string();
    gateway.remove(&id).await.unwrap();

    let err = reconciler.update(&mut tracked, &web("DOWN")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::UpdateTargetMissing { .. }));
    assert_eq!(gateway.calls().await.create, 1);
    assert!(gateway.is_empty().await);
    assert!(tracked.is_present());
}

#[tokio::test]
async fn test_update_target_gone_before_reread_keeps_entry() {
    let (gateway, reconciler) = setup();
    let mut tracked = created(&reconciler).await;
    let id = tracked.id().unwrap().to_string();
    gateway.vanish_after_update().await;

    let err = reconciler.update(&mut tracked, &web("DOWN")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::UpdateTargetMissing { .. }));
    assert!(tracked.is_present());
    assert_eq!(tracked.id(), Some(id.as_str()));
    assert_eq!(tracked.revision.cached(), Some(1));
    assert!(gateway.is_empty().await);

    // The next read notices the drift and forgets the id.
    assert_eq!(reconciler.read(&mut tracked).await.unwrap(), ReadOutcome::Gone);
    assert_eq!(tracked.lifecycle, Lifecycle::Unmanaged);
    assert_eq!(tracked.id(), None);

    let calls = gateway.calls().await;
    assert_eq!((calls.create, calls.update), (1, 1));
}

#[tokio::test]
async fn test_update_without_cached_revision_reads_it_first() {
    let (gateway, reconciler) = setup();
    let id = gateway.seed("web", Default::default()).await;
    gateway.bump(&id).await.unwrap();

    let mut tracked = Tracked::new(ResourceRef::by_id(&id));
    tracked.lifecycle = Lifecycle::Present;

    let obj = reconciler.update(&mut tracked, &web("UP")).await.unwrap();
    assert_eq!(obj.revision, 2);
    // One read for the revision before the update, one after it.
    assert_eq!(gateway.calls().await.get, 2);
}

#[tokio::test]
async fn test_update_of_unmanaged_entry_is_invalid_state() {
    let (gateway, reconciler) = setup();
    let mut tracked = Tracked::new(ResourceRef::by_name("web"));

    let err = reconciler.update(&mut tracked, &web("UP")).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::InvalidState {
            operation: "update",
            state: Lifecycle::Unmanaged,
            ..
        }
    ));
    assert_eq!(gateway.calls().await, Default::default());
}

#[tokio::test]
async fn test_delete_twice_succeeds() {
    let (gateway, reconciler) = setup();
    let mut tracked = created(&reconciler).await;
    let id = tracked.id().unwrap().to_string();

    reconciler.delete(&mut tracked).await.unwrap();
    assert_eq!(tracked.lifecycle, Lifecycle::Unmanaged);
    assert_eq!(tracked.id(), Some(id.as_str()));
    assert_eq!(tracked.revision.cached(), None);
    assert!(tracked.snapshot.is_none());
    assert!(gateway.is_empty().await);

    reconciler.delete(&mut tracked).await.unwrap();
    assert_eq!(tracked.lifecycle, Lifecycle::Unmanaged);
    assert_eq!(tracked.id(), Some(id.as_str()));

    let calls = gateway.calls().await;
    assert_eq!((calls.delete, calls.list), (2, 0));
}

#[tokio::test]
async fn test_delete_failure_keeps_entry_present() {
    let (gateway, reconciler) = setup();
    let mut tracked = created(&reconciler).await;

    gateway
        .fail_next(Fault::Status(Status::INTERNAL_SERVER_ERROR))
        .await;
    let err = reconciler.delete(&mut tracked).await.unwrap_err();
    assert!(matches!(err, ReconcileError::DeleteFailed { .. }));
    assert!(tracked.is_present());
    assert!(tracked.id().is_some());
}

#[tokio::test]
async fn test_status_decides_over_transport_error() {
    let (gateway, reconciler) = setup();

    // 404 with a dropped connection is still "already gone".
    let mut tracked = created(&reconciler).await;
    gateway
        .fail_next(Fault::StatusWithError(
            Status::NOT_FOUND,
            TransportError::Connect("connection reset".to_string()),
        ))
        .await;
    reconciler.delete(&mut tracked).await.unwrap();
    assert_eq!(tracked.lifecycle, Lifecycle::Unmanaged);

    // A 500 is a failure even if the error body claims 404.
    let mut tracked = created(&reconciler).await;
    gateway
        .fail_next(Fault::StatusWithError(
            Status::INTERNAL_SERVER_ERROR,
            TransportError::Api {
                status: Status::NOT_FOUND,
                code: None,
                message: "not found".to_string(),
            },
        ))
        .await;
    let err = reconciler.delete(&mut tracked).await.unwrap_err();
    assert!(matches!(err, ReconcileError::DeleteFailed { .. }));

    // A 2xx with an undecodable body is a completed delete.
    gateway
        .fail_next(Fault::StatusWithError(
            Status::OK,
            TransportError::Decode("trailing characters".to_string()),
        ))
        .await;
    reconciler.delete(&mut tracked).await.unwrap();
    assert_eq!(tracked.lifecycle, Lifecycle::Unmanaged);
}

#[tokio::test]
async fn test_delete_surfaces_resolution_errors() {
    let (gateway, reconciler) = setup();
    gateway.seed("app-1", Default::default()).await;
    gateway.seed("app-2", Default::default()).await;

    let mut tracked = Tracked::new(ResourceRef::by_name("app"));
    let err = reconciler.delete(&mut tracked).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::AmbiguousReference {
            tier: MatchTier::Prefix,
            count: 2,
            ..
        }
    ));
    assert_eq!(gateway.calls().await.delete, 0);
}

#[tokio::test]
async fn test_lookup_by_id_is_strict() {
    let (gateway, reconciler) = setup();
    let id = gateway.seed("web", Default::default()).await;

    let obj = reconciler.lookup(&ResourceRef::by_id(&id)).await.unwrap();
    assert_eq!(obj.display_name, "web");
    assert_eq!(gateway.list_calls().await, 0);

    let err = reconciler
        .lookup(&ResourceRef::by_id("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::NotFound { .. }));

    let err = reconciler
        .lookup(&ResourceRef::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidReference { .. }));
}

#[tokio::test]
async fn test_lookup_checks_kind_filter() {
    let gateway = Arc::new(MemoryGateway::<LogicalRouter>::new());
    let tier1 = gateway.seed("edge", router(LogicalRouter::TIER1)).await;
    gateway.seed("core", router(LogicalRouter::TIER0)).await;
    let reconciler = Reconciler::new(gateway.clone()).with_kind_filter(LogicalRouter::TIER0);

    let err = reconciler
        .lookup(&ResourceRef::by_id(&tier1))
        .await
        .unwrap_err();
    match err {
        ReconcileError::WrongKind {
            expected, actual, ..
        } => {
            assert_eq!(expected, "TIER0");
            assert_eq!(actual, "TIER1");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let err = reconciler
        .lookup(&ResourceRef::by_name("edge"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::NotFound { .. }));

    let listed = reconciler.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].display_name, "core");
}

#[tokio::test]
async fn test_import_tracks_existing_object() {
    let (gateway, reconciler) = setup();
    let id = gateway.seed("db", Default::default()).await;
    gateway.bump(&id).await.unwrap();

    let tracked = reconciler.import(&ResourceRef::by_name("db")).await.unwrap();
    assert_eq!(tracked.id(), Some(id.as_str()));
    assert_eq!(tracked.reference.display_name(), Some("db"));
    assert_eq!(tracked.revision.cached(), Some(1));
    assert!(tracked.is_present());
}
