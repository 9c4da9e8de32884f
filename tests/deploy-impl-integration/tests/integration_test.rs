//! Centralized integration tests for deploy-impl crate
use deploy_abstractions::{ExecutionUnit, ResourceHandle, StaticExecutionUnit, UnitRef};
use deploy_impl::testing::{ManualScannerFactory, RecordingListener, StubProcessor};
use deploy_impl::{DescriptorSummary, UriDeploymentSpi, UriDeploymentSpiBuilder};
use deployment_common::{DeploymentConfig, DeploymentError, LookupError};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// 测试环境
struct Grid {
    spi: UriDeploymentSpi,
    factory: Arc<ManualScannerFactory>,
    processor: Arc<StubProcessor>,
    listener: Arc<RecordingListener>,
    _tmp: TempDir,
}

impl Grid {
    fn new(source_count: usize, check_md5: bool) -> anyhow::Result<Self> {
        let tmp = tempfile::tempdir()?;
        let mut config = DeploymentConfig::new()
            .with_check_md5(check_md5)
            .with_temporary_directory_path(tmp.path())
            .with_readiness_check_interval(Duration::from_millis(20));
        for i in 0..source_count {
            config = config.with_uri(format!("file:///grid/source-{i}"));
        }

        let factory = ManualScannerFactory::new();
        let processor = StubProcessor::new();
        let listener = RecordingListener::new();
        let spi = UriDeploymentSpiBuilder::new()
            .config(config)
            .scanner_factory(factory.clone())
            .unit_processor(processor.clone())
            .listener(listener.clone())
            .work_dir(tmp.path())
            .build()?;
        spi.start()?;

        Ok(Self {
            spi,
            factory,
            processor,
            listener,
            _tmp: tmp,
        })
    }

    fn finish_all_first_scans(&self) {
        for handle in self.factory.handles() {
            handle.finish_first_scan();
        }
    }
}

fn task(identity: &str, alias: &str) -> ResourceHandle {
    ResourceHandle::task(identity, Some(alias))
}

fn assert_aliases_disjoint(descriptors: &[DescriptorSummary]) {
    let mut seen = HashSet::new();
    for desc in descriptors {
        for alias in &desc.aliases {
            assert!(seen.insert(alias.clone()), "任务名称重复发布: {alias}");
        }
    }
}

fn assert_recency_ordered(descriptors: &[DescriptorSummary]) {
    assert!(descriptors
        .windows(2)
        .all(|pair| pair[0].timestamp >= pair[1].timestamp));
}

#[test]
fn test_disjoint_artifacts_are_all_deployed() -> anyhow::Result<()> {
    let grid = Grid::new(3, false)?;
    for i in 0..10 {
        grid.processor.add_artifact(
            &format!("job-{i}.gar"),
            vec![task(&format!("org.grid.Job{i}"), &format!("job-{i}"))],
            None,
        );
    }

    thread::scope(|scope| {
        for (s, handle) in grid.factory.handles().into_iter().enumerate() {
            scope.spawn(move || {
                // 每个部署源发布不同的部署包
                for i in (0..10).filter(|i| i % 3 == s) {
                    handle.publish(&format!("job-{i}.gar"), 1_000 + i as i64);
                }
                handle.finish_first_scan();
            });
        }
    });

    assert_eq!(grid.spi.deployed_unit_count(), 10);
    for i in 0..10 {
        let found = grid.spi.find_resource(&format!("job-{i}"))?;
        assert_eq!(found.resource().identity(), format!("org.grid.Job{i}"));
    }
    assert_eq!(grid.listener.count(), 0);
    Ok(())
}

#[test]
fn test_invariants_hold_under_concurrent_scanners() -> anyhow::Result<()> {
    let grid = Grid::new(4, false)?;
    // 部署包之间共享任务名称，制造冲突
    for i in 0..12 {
        grid.processor.add_artifact(
            &format!("pkg-{i}.gar"),
            vec![
                task(&format!("org.grid.Pkg{i}.Main"), &format!("main-{}", i % 4)),
                task(&format!("org.grid.Pkg{i}.Side"), &format!("side-{}", i % 5)),
            ],
            None,
        );
    }

    thread::scope(|scope| {
        for (s, handle) in grid.factory.handles().into_iter().enumerate() {
            scope.spawn(move || {
                let mut seed = 17 + s as i64;
                for round in 0..30 {
                    seed = (seed * 1_103 + 12_345) % 9_973;
                    let file = format!("pkg-{}.gar", seed % 12);
                    handle.publish(&file, 1_000 + seed);
                    if round % 7 == 6 {
                        handle.delete(&[file.as_str()]);
                    }
                }
                handle.finish_first_scan();
            });
        }
    });

    let descriptors = grid.spi.descriptors();
    assert!(!descriptors.is_empty());
    assert_aliases_disjoint(&descriptors);
    assert_recency_ordered(&descriptors);

    // 已部署的单元都未被释放，被释放的单元都不在存储中
    let deployed: HashSet<_> = descriptors.iter().map(|d| d.unit_id).collect();
    for unit in grid.processor.created_units() {
        assert_eq!(unit.is_released(), !deployed.contains(&unit.id()));
    }
    Ok(())
}

#[test]
fn test_md5_replay_leaves_store_unchanged() -> anyhow::Result<()> {
    let grid = Grid::new(2, true)?;
    grid.processor
        .add_artifact("a.gar", vec![task("org.grid.A", "alpha")], Some("d41d8cd9"));
    grid.processor
        .add_artifact("copy.gar", vec![task("org.grid.A", "alpha")], Some("d41d8cd9"));

    let first = grid.factory.handle(0).expect("scanner 0");
    let second = grid.factory.handle(1).expect("scanner 1");
    first.publish("a.gar", 100);
    let before = grid.spi.descriptors();

    second.publish("copy.gar", 200);
    first.publish("copy.gar", 300);

    assert_eq!(grid.spi.descriptors(), before);
    assert_eq!(grid.listener.count(), 0);
    assert!(grid.processor.last_unit_for("copy.gar").expect("copy unit").is_released());
    Ok(())
}

#[test]
fn test_lookup_waits_for_both_sources() -> anyhow::Result<()> {
    let grid = Grid::new(2, false)?;
    grid.processor
        .add_artifact("a.gar", vec![task("org.grid.A", "alpha")], None);
    let first = grid.factory.handle(0).expect("scanner 0");
    let second = grid.factory.handle(1).expect("scanner 1");

    let spi = &grid.spi;
    thread::scope(|scope| {
        let lookup = scope.spawn(|| spi.find_resource("alpha"));

        first.publish("a.gar", 100);
        first.finish_first_scan();
        thread::sleep(Duration::from_millis(60));
        assert!(!lookup.is_finished());

        second.finish_first_scan();
        let found = lookup.join().expect("lookup thread");
        assert_eq!(found.map(|r| r.name().to_string()), Ok("alpha".to_string()));
    });

    // 就绪之后立即返回
    assert!(grid.spi.find_resource("alpha").is_ok());
    Ok(())
}

#[test]
fn test_newer_source_wins_shared_name() -> anyhow::Result<()> {
    let grid = Grid::new(2, false)?;
    grid.processor
        .add_artifact("a.gar", vec![task("org.source.a.X", "X")], None);
    grid.processor
        .add_artifact("b.gar", vec![task("org.source.b.X", "X")], None);

    grid.factory.handle(0).expect("scanner A").publish("a.gar", 100);
    grid.factory.handle(1).expect("scanner B").publish("b.gar", 200);
    grid.finish_all_first_scans();

    let a = grid.processor.last_unit_for("a.gar").expect("unit A");
    let b = grid.processor.last_unit_for("b.gar").expect("unit B");

    assert_eq!(grid.spi.deployed_unit_count(), 1);
    assert!(a.is_released());
    assert_eq!(grid.listener.released(), vec![a.id()]);

    let found = grid.spi.find_resource("X")?;
    assert_eq!(found.resource().identity(), "org.source.b.X");
    assert_eq!(found.unit().id(), b.id());
    Ok(())
}

#[test]
fn test_older_source_loses_shared_name() -> anyhow::Result<()> {
    let grid = Grid::new(2, false)?;
    grid.processor
        .add_artifact("a.gar", vec![task("org.source.a.X", "X")], None);
    grid.processor
        .add_artifact("b.gar", vec![task("org.source.b.X", "X")], None);

    grid.factory.handle(1).expect("scanner B").publish("b.gar", 200);
    grid.factory.handle(0).expect("scanner A").publish("a.gar", 100);
    grid.finish_all_first_scans();

    // 较旧的候选未部署，不产生通知
    assert!(grid.processor.last_unit_for("a.gar").expect("unit A").is_released());
    assert_eq!(grid.listener.count(), 0);
    assert_eq!(grid.spi.find_resource("X")?.resource().identity(), "org.source.b.X");
    Ok(())
}

#[test]
fn test_same_uri_republish_supersedes_despite_older_timestamp() -> anyhow::Result<()> {
    let grid = Grid::new(1, false)?;
    let handle = grid.factory.handle(0).expect("scanner");

    grid.processor
        .add_artifact("u.gar", vec![task("org.grid.v1.Job", "job")], None);
    handle.publish("u.gar", 100);
    let v1 = grid.processor.last_unit_for("u.gar").expect("v1");

    grid.processor
        .add_artifact("u.gar", vec![task("org.grid.v2.Job", "job")], None);
    handle.publish("u.gar", 50);
    handle.finish_first_scan();

    assert!(v1.is_released());
    assert_eq!(grid.spi.deployed_unit_count(), 1);
    assert_eq!(grid.spi.descriptors()[0].timestamp, 50);
    assert_eq!(grid.spi.find_resource("job")?.resource().identity(), "org.grid.v2.Job");
    Ok(())
}

#[test]
fn test_direct_registration() -> anyhow::Result<()> {
    let grid = Grid::new(1, false)?;
    grid.finish_all_first_scans();

    let loader_a: UnitRef = StaticExecutionUnit::shared([task("org.grid.Foo", "task1")]);
    let loader_b: UnitRef = StaticExecutionUnit::shared([task("org.grid.Foo", "task1")]);

    assert!(grid.spi.register(&loader_a, &task("org.grid.Foo", "task1"))?);
    // 同一单元重复注册相同资源
    assert!(!grid.spi.register(&loader_a, &task("org.grid.Foo", "task1"))?);

    // 同一单元内任务名称绑定到不同资源
    let err = grid
        .spi
        .register(&loader_a, &task("org.grid.Bar", "task1"))
        .unwrap_err();
    assert!(err.is_naming_conflict());
    assert_eq!(grid.spi.find_resource("task1")?.unit().id(), loader_a.id());

    // 另一个单元注册同名任务，取代原持有者
    assert!(grid.spi.register(&loader_b, &task("org.grid.Foo", "task1"))?);
    assert_eq!(grid.spi.deployed_unit_count(), 1);
    assert_eq!(grid.spi.find_resource("task1")?.unit().id(), loader_b.id());
    assert_eq!(grid.listener.released(), vec![loader_a.id()]);
    Ok(())
}

#[test]
fn test_unregister_unknown_name_has_no_effect() -> anyhow::Result<()> {
    let grid = Grid::new(1, false)?;
    grid.processor
        .add_artifact("a.gar", vec![task("org.grid.A", "alpha")], None);
    grid.factory.handle(0).expect("scanner").publish("a.gar", 100);
    grid.finish_all_first_scans();
    let before = grid.spi.descriptors();

    assert!(!grid.spi.unregister("task1"));

    assert_eq!(grid.spi.descriptors(), before);
    assert_eq!(grid.listener.count(), 0);

    assert!(grid.spi.unregister("alpha"));
    assert_eq!(grid.spi.deployed_unit_count(), 0);
    Ok(())
}

#[test]
fn test_lookup_of_undeclared_resources() -> anyhow::Result<()> {
    let grid = Grid::new(1, false)?;
    grid.processor.add_artifact_with_resources(
        "lib.gar",
        vec![
            task("org.grid.Job", "job"),
            ResourceHandle::plain("org.grid.util.Helper"),
            ResourceHandle::task("org.grid.Hidden", None),
        ],
        vec![task("org.grid.Job", "job")],
        None,
    );
    grid.factory.handle(0).expect("scanner").publish("lib.gar", 100);
    grid.finish_all_first_scans();

    // 普通资源可按全限定名取得
    let helper = grid.spi.find_resource("org.grid.util.Helper")?;
    assert_eq!(helper.name(), "org.grid.util.Helper");

    // 未声明的任务不会被查找登记
    assert!(matches!(
        grid.spi.find_resource("org.grid.Hidden"),
        Err(LookupError::NotFound { .. })
    ));

    // 全限定名访问已声明的任务时返回任务名称
    assert_eq!(grid.spi.find_resource("org.grid.Job")?.name(), "job");
    Ok(())
}

#[test]
fn test_stop_releases_and_restart_rescans() -> anyhow::Result<()> {
    let grid = Grid::new(1, false)?;
    grid.processor
        .add_artifact("a.gar", vec![task("org.grid.A", "alpha")], None);
    grid.factory.handle(0).expect("scanner").publish("a.gar", 100);
    grid.finish_all_first_scans();

    grid.spi.stop();
    assert_eq!(grid.listener.count(), 1);
    assert!(grid.spi.staging_dir().is_none());

    grid.spi.start()?;
    let handle = grid.factory.handle(1).expect("new scanner");
    handle.publish("a.gar", 200);
    handle.finish_first_scan();

    assert_eq!(grid.spi.find_resource("alpha")?.resource().identity(), "org.grid.A");
    assert!(matches!(grid.spi.start(), Err(DeploymentError::AlreadyStarted)));
    Ok(())
}

#[tokio::test]
async fn test_async_lookup() -> anyhow::Result<()> {
    let grid = Grid::new(1, false)?;
    grid.processor
        .add_artifact("a.gar", vec![task("org.grid.A", "alpha")], None);

    let handle = grid.factory.handle(0).expect("scanner");
    let publisher = tokio::task::spawn_blocking(move || {
        std::thread::sleep(Duration::from_millis(30));
        handle.publish("a.gar", 100);
        handle.finish_first_scan();
    });

    let found = grid.spi.find_resource_async("alpha").await?;
    publisher.await?;

    assert_eq!(found.resource().identity(), "org.grid.A");
    Ok(())
}
