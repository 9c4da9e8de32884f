//! deploy-impl 部署核心集成测试
use deploy_abstractions::{
    DeploymentListener, ExecutionUnit, ResourceHandle, StaticExecutionUnit, UnitId, UnitRef,
};
use deploy_impl::{DeploymentCore, DescriptorKind};
use deployment_common::LookupError;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Released(Mutex<Vec<UnitId>>);

impl DeploymentListener for Released {
    fn on_unit_released(&self, unit: &UnitRef) {
        self.0.lock().push(unit.id());
    }
}

fn core_with_listener() -> (DeploymentCore, Arc<Released>) {
    let core = DeploymentCore::new(false, Duration::from_millis(20));
    let listener = Arc::new(Released::default());
    core.set_listener(Some(listener.clone()));
    (core, listener)
}

fn publish(core: &DeploymentCore, uri: &str, ts: i64, tasks: &[ResourceHandle]) -> Arc<StaticExecutionUnit> {
    let unit = StaticExecutionUnit::shared(tasks.to_vec());
    core.on_unit_discovered(uri, PathBuf::from("/staging").join(ts.to_string()), ts, unit.clone(), tasks, None);
    unit
}

#[test]
fn test_programmatic_and_scanned_units_share_namespace() {
    let (core, listener) = core_with_listener();
    let scanned = publish(
        &core,
        "file:///grid/a.gar",
        100,
        &[ResourceHandle::task("org.grid.Scanned", Some("word-count"))],
    );

    let direct: UnitRef =
        StaticExecutionUnit::shared([ResourceHandle::task("org.grid.Direct", Some("word-count"))]);
    let is_new = core
        .register(&direct, &ResourceHandle::task("org.grid.Direct", Some("word-count")))
        .unwrap();

    assert!(is_new);
    assert!(scanned.is_released());
    assert_eq!(*listener.0.lock(), vec![scanned.id()]);

    let descriptors = core.descriptors();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].kind, DescriptorKind::Programmatic);
    assert_eq!(core.find_resource("word-count").unwrap().resource().identity(), "org.grid.Direct");
}

#[test]
fn test_plain_resource_collision_evicts_older_unit() {
    let (core, _listener) = core_with_listener();

    // 旧单元的普通资源能被新单元加载
    let shared = ResourceHandle::plain("org.grid.util.Codec");
    let old = StaticExecutionUnit::shared([
        ResourceHandle::task("org.grid.Old", Some("old")),
        shared.clone(),
    ]);
    core.on_unit_discovered(
        "file:///grid/old.gar",
        "/staging/old".into(),
        100,
        old.clone(),
        &[ResourceHandle::task("org.grid.Old", Some("old"))],
        None,
    );
    assert!(core.find_resource("org.grid.util.Codec").is_ok());

    // 无关的单元位于新单元的插入位置
    let unrelated = publish(
        &core,
        "file:///grid/unrelated.gar",
        150,
        &[ResourceHandle::task("org.grid.Unrelated", Some("unrelated"))],
    );

    let new = StaticExecutionUnit::shared([
        ResourceHandle::task("org.grid.New", Some("new")),
        shared,
    ]);
    core.on_unit_discovered(
        "file:///grid/new.gar",
        "/staging/new".into(),
        200,
        new.clone(),
        &[ResourceHandle::task("org.grid.New", Some("new"))],
        None,
    );

    assert!(old.is_released());
    assert!(!new.is_released());
    assert!(!unrelated.is_released());
    assert_eq!(core.deployed_unit_count(), 2);
    assert!(matches!(core.find_resource("old"), Err(LookupError::NotFound { .. })));
}

#[test]
fn test_recency_order_with_unrelated_units() {
    let (core, listener) = core_with_listener();
    for (i, ts) in [300, 100, 500, 200].into_iter().enumerate() {
        publish(
            &core,
            &format!("file:///grid/{i}.gar"),
            ts,
            &[ResourceHandle::task(format!("org.grid.T{i}"), Some(&format!("t{i}")))],
        );
    }

    let timestamps: Vec<i64> = core.descriptors().iter().map(|d| d.timestamp).collect();
    assert_eq!(timestamps, vec![500, 300, 200, 100]);
    assert!(listener.0.lock().is_empty());
}

#[test]
fn test_unregister_removes_scanned_unit() {
    let (core, listener) = core_with_listener();
    let unit = publish(
        &core,
        "file:///grid/a.gar",
        100,
        &[ResourceHandle::task("org.grid.A", Some("alpha"))],
    );

    assert!(core.unregister("alpha"));
    assert!(!core.unregister("alpha"));
    assert!(unit.is_released());
    assert_eq!(listener.0.lock().len(), 1);
    assert_eq!(core.deployed_unit_count(), 0);
}
