//! Integration tests for the plugin manager: registration, instantiation,
//! dependency wiring, bulk lifecycle, and host wiring.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};

use reel_events::{EventBus, Listener};
use reel_host::{HostState, HostStateMachine, events as host_events};
use reel_plugins::{
    HostLink, LifecyclePhase, Plugin, PluginContext, PluginError, PluginEvent, PluginManager,
    PluginManagerConfig, RegisterOptions,
};

// =============================================================================
// Test Doubles
// =============================================================================

type Log = Arc<Mutex<Vec<String>>>;

/// A plugin that logs `<name>:<callback>` for every callback.
struct Feature {
    name: &'static str,
    log: Log,
    fail_mount: bool,
}

#[async_trait]
impl Plugin for Feature {
    async fn on_init(&mut self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("{}:init", self.name));

        let log = self.log.clone();
        let name = self.name;
        ctx.events().on(
            host_events::STATE_CHANGE,
            &Listener::from_fn(move |payload: &Value| {
                log.lock()
                    .unwrap()
                    .push(format!("{name}:state:{}", payload["to"].as_str().unwrap_or("?")));
            }),
        );
        Ok(())
    }

    async fn on_mount(&mut self, _ctx: &mut PluginContext) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("{}:mount", self.name));
        if self.fail_mount {
            anyhow::bail!("no room");
        }
        Ok(())
    }

    async fn on_unmount(&mut self, _ctx: &mut PluginContext) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("{}:unmount", self.name));
        Ok(())
    }

    async fn on_destroy(&mut self, _ctx: &mut PluginContext) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("{}:destroy", self.name));
        Ok(())
    }
}

fn register(manager: &PluginManager, log: &Log, name: &'static str, options: RegisterOptions) {
    register_with(manager, log, name, false, options);
}

fn register_with(
    manager: &PluginManager,
    log: &Log,
    name: &'static str,
    fail_mount: bool,
    options: RegisterOptions,
) {
    let log = log.clone();
    manager
        .register(
            name,
            move || -> anyhow::Result<Box<dyn Plugin>> {
                Ok(Box::new(Feature {
                    name,
                    log: log.clone(),
                    fail_mount,
                }))
            },
            options,
        )
        .expect("registration should succeed");
}

/// Records every manager event as `<event>:<plugin>`.
fn observe(manager: &PluginManager) -> Log {
    let seen: Log = Arc::default();
    for event in ["register", "unregister", "ready", "destroy", "warning", "error"] {
        let seen = seen.clone();
        manager.on(
            event,
            &Listener::from_fn(move |payload: &PluginEvent| {
                seen.lock()
                    .unwrap()
                    .push(format!("{}:{}", payload.name(), payload.plugin().unwrap_or("-")));
            }),
        );
    }
    seen
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

// =============================================================================
// End-to-end dependency scenario
// =============================================================================

#[tokio::test]
async fn test_destroying_a_dependency_warns_but_proceeds() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    let events = observe(&manager);
    register(&manager, &log, "a", RegisterOptions::new());
    register(&manager, &log, "b", RegisterOptions::new().depends_on(["a"]));

    assert_ok!(manager.create("a", None).await);
    let b = assert_ok!(manager.create("b", None).await);
    assert_eq!(manager.dependents("a"), vec!["b"]);

    assert_ok!(manager.destroy("a").await);
    assert!(!manager.has("a"));

    // B survives and keeps its reference to the destroyed A.
    let live_b = manager.get("b").expect("b should still be live");
    assert!(live_b.ptr_eq(&b));
    let a_ref = live_b.read().await.dependency("a").cloned().expect("reference kept");
    assert_eq!(a_ref.phase().await, LifecyclePhase::Destroyed);

    assert_eq!(
        entries(&events),
        vec![
            "register:a",
            "register:b",
            "ready:a",
            "ready:b",
            "warning:a",
            "destroy:a",
        ]
    );
}

#[tokio::test]
async fn test_recreated_dependency_regains_live_dependents() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    let events = observe(&manager);
    register(&manager, &log, "a", RegisterOptions::new());
    register(&manager, &log, "b", RegisterOptions::new().depends_on(["a"]));

    assert_ok!(manager.create("a", None).await);
    let b = assert_ok!(manager.create("b", None).await);
    assert_ok!(manager.destroy("a").await);

    let new_a = assert_ok!(manager.create("a", None).await);
    assert_eq!(manager.dependents("a"), vec!["b"]);

    // B still holds the instance it was wired to.
    let stale = b.read().await.dependency("a").cloned().unwrap();
    assert!(!stale.ptr_eq(&new_a));

    assert_ok!(manager.destroy("a").await);
    let warnings: Vec<_> = entries(&events)
        .into_iter()
        .filter(|e| e == "warning:a")
        .collect();
    assert_eq!(warnings.len(), 2);
}

#[tokio::test]
async fn test_dependency_graph_is_double_linked() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    register(&manager, &log, "i18n", RegisterOptions::new());
    register(&manager, &log, "theme", RegisterOptions::new().depends_on(["i18n"]));
    register(
        &manager,
        &log,
        "controls",
        RegisterOptions::new().depends_on(["theme"]),
    );

    assert_eq!(
        assert_ok!(manager.resolve_dependencies("controls")),
        vec!["i18n", "theme"]
    );

    assert_ok!(manager.create("i18n", None).await);
    assert_ok!(manager.create("theme", None).await);
    let controls = assert_ok!(manager.create("controls", None).await);

    assert_eq!(
        controls.read().await.context().dependency_names(),
        vec!["i18n", "theme"]
    );
    assert_eq!(manager.dependents("i18n"), vec!["theme", "controls"]);
    assert_eq!(manager.dependents("theme"), vec!["controls"]);
    assert!(manager.dependents("controls").is_empty());

    assert_ok!(manager.destroy("controls").await);
    assert_eq!(manager.dependents("i18n"), vec!["theme"]);
    assert!(manager.dependents("theme").is_empty());
}

#[tokio::test]
async fn test_create_requires_live_dependencies() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    let events = observe(&manager);
    register(&manager, &log, "a", RegisterOptions::new());
    register(&manager, &log, "b", RegisterOptions::new().depends_on(["a"]));

    assert!(!manager.check_dependencies("b"));
    let err = assert_err!(manager.create("b", None).await);
    assert_eq!(err, PluginError::missing_dependency("b", "a"));
    assert!(!manager.has("b"));
    assert!(entries(&log).is_empty());
    assert!(entries(&events).contains(&"error:b".to_string()));

    assert_ok!(manager.create("a", None).await);
    assert!(manager.check_dependencies("b"));
    assert_ok!(manager.create("b", None).await);
}

#[tokio::test]
async fn test_metadata_cycle_is_detected() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    register(&manager, &log, "a", RegisterOptions::new().depends_on(["b"]));
    register(&manager, &log, "b", RegisterOptions::new().depends_on(["a"]));

    let err = assert_err!(manager.resolve_dependencies("a"));
    assert!(matches!(err, PluginError::DependencyCycle { .. }));
    assert!(!manager.check_dependencies("a"));

    let err = assert_err!(manager.create("b", None).await);
    assert!(matches!(err, PluginError::DependencyCycle { .. }));
    assert_eq!(manager.count(), 0);
}

#[tokio::test]
async fn test_create_unknown_plugin() {
    let manager = PluginManager::default();
    let err = assert_err!(manager.create("ghost", None).await);
    assert_eq!(err, PluginError::NotRegistered("ghost".into()));
}

// =============================================================================
// Registration extension points
// =============================================================================

#[tokio::test]
async fn test_validators_reject_registration() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    manager.add_validator(|name, _| {
        if name.chars().all(|c| c.is_ascii_lowercase() || c == '-') {
            Ok(())
        } else {
            Err("names must be lowercase".to_string())
        }
    });
    manager.add_validator(|_, metadata| {
        if metadata.version.starts_with('0') {
            Err("pre-release plugins are not accepted".to_string())
        } else {
            Ok(())
        }
    });

    let feature = {
        let log = log.clone();
        move || -> anyhow::Result<Box<dyn Plugin>> {
            Ok(Box::new(Feature {
                name: "x",
                log: log.clone(),
                fail_mount: false,
            }))
        }
    };

    let err = assert_err!(manager.register("Bad_Name", feature.clone(), RegisterOptions::new()));
    assert_eq!(
        err,
        PluginError::validation("Bad_Name", "names must be lowercase")
    );
    assert_err!(manager.register("beta", feature.clone(), RegisterOptions::new().version("0.9.0")));
    assert_ok!(manager.register("quality-menu", feature, RegisterOptions::new()));

    assert_eq!(manager.registered_names(), vec!["quality-menu"]);
}

#[tokio::test]
async fn test_middleware_runs_in_order_before_init() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    register(&manager, &log, "pip", RegisterOptions::new());

    for tag in ["first", "second"] {
        let log = log.clone();
        manager.add_middleware(move |name, plugin, next| {
            log.lock()
                .unwrap()
                .push(format!("{tag}:{name}:{}", plugin.phase()));
            plugin.context_mut().config["tagged"] = json!(true);
            next.run(plugin)
        });
    }

    assert_ok!(manager.create("pip", None).await);
    assert_eq!(
        entries(&log),
        vec!["first:pip:created", "second:pip:created", "pip:init"]
    );
    let pip = manager.get("pip").unwrap();
    assert_eq!(pip.read().await.context().config["tagged"], json!(true));
}

#[tokio::test]
async fn test_middleware_can_wrap_and_halt_the_chain() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    register(&manager, &log, "pip", RegisterOptions::new());

    let outer = log.clone();
    manager.add_middleware(move |name, plugin, next| {
        outer.lock().unwrap().push(format!("outer:before:{name}"));
        let result = next.run(plugin);
        outer.lock().unwrap().push(format!("outer:after:{name}"));
        result
    });
    let gate = log.clone();
    manager.add_middleware(move |_, plugin, _next| {
        gate.lock().unwrap().push("gate".to_string());
        plugin.context_mut().config["gated"] = json!(true);
        Ok(())
    });
    let skipped = log.clone();
    manager.add_middleware(move |_, plugin, next| {
        skipped.lock().unwrap().push("skipped".to_string());
        next.run(plugin)
    });

    assert_ok!(manager.create("pip", None).await);
    assert_eq!(
        entries(&log),
        vec!["outer:before:pip", "gate", "outer:after:pip", "pip:init"]
    );
    let pip = manager.get("pip").unwrap();
    assert_eq!(pip.read().await.context().config["gated"], json!(true));
    assert_eq!(pip.phase().await, LifecyclePhase::Initialized);
}

#[tokio::test]
async fn test_middleware_failure_aborts_create() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    let events = observe(&manager);
    register(&manager, &log, "pip", RegisterOptions::new());
    manager.add_middleware(|_, _, _| Err(anyhow::anyhow!("quota exceeded")));

    let err = assert_err!(manager.create("pip", None).await);
    assert!(matches!(err, PluginError::MiddlewareError { .. }));
    assert!(!manager.has("pip"));
    assert!(entries(&log).is_empty());
    assert_eq!(entries(&events), vec!["register:pip", "error:pip"]);
}

// =============================================================================
// Bulk lifecycle
// =============================================================================

#[tokio::test]
async fn test_mount_all_honors_sorter_and_unmounts_in_reverse() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    register(&manager, &log, "low", RegisterOptions::new().priority(1));
    register(&manager, &log, "high", RegisterOptions::new().priority(10));
    register(&manager, &log, "mid", RegisterOptions::new().priority(5));
    for name in ["low", "high", "mid"] {
        assert_ok!(manager.create(name, None).await);
    }
    manager.set_sorter(|a, b| b.priority.cmp(&a.priority));
    log.lock().unwrap().clear();

    let mounted = manager.mount_all(None).await;
    assert!(mounted.iter().all(|(_, r)| r.is_ok()));
    let unmounted = manager.unmount_all().await;
    assert!(unmounted.iter().all(|(_, r)| r.is_ok()));

    assert_eq!(
        entries(&log),
        vec![
            "high:mount",
            "mid:mount",
            "low:mount",
            "low:unmount",
            "mid:unmount",
            "high:unmount",
        ]
    );
    let names: Vec<_> = manager.list().iter().map(|h| h.name().to_string()).collect();
    assert_eq!(names, vec!["high", "mid", "low"]);
}

#[tokio::test]
async fn test_mount_all_contains_failures_and_honors_filter() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    let events = observe(&manager);
    register(&manager, &log, "subtitles", RegisterOptions::new());
    register_with(&manager, &log, "broken", true, RegisterOptions::new());
    register(
        &manager,
        &log,
        "analytics",
        RegisterOptions::new().kind(reel_plugins::PluginKind::Analytics),
    );
    for name in ["subtitles", "broken", "analytics"] {
        assert_ok!(manager.create(name, None).await);
    }
    manager.set_filter(|metadata| metadata.kind == reel_plugins::PluginKind::Ui);

    let results = manager.mount_all(None).await;
    let outcome: Vec<_> = results
        .iter()
        .map(|(name, r)| (name.as_str(), r.is_ok()))
        .collect();
    assert_eq!(outcome, vec![("subtitles", true), ("broken", false)]);

    let broken = manager.get("broken").unwrap();
    assert_eq!(broken.phase().await, LifecyclePhase::Error);
    let subtitles = manager.get("subtitles").unwrap();
    assert_eq!(subtitles.phase().await, LifecyclePhase::Mounted);
    let analytics = manager.get("analytics").unwrap();
    assert_eq!(analytics.phase().await, LifecyclePhase::Initialized);
    assert!(entries(&events).contains(&"error:broken".to_string()));
}

#[tokio::test]
async fn test_enable_disable_all() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    register(&manager, &log, "a", RegisterOptions::new());
    register(&manager, &log, "b", RegisterOptions::new());
    assert_ok!(manager.create("a", None).await);
    assert_ok!(manager.create("b", None).await);

    manager.disable_all().await;
    for handle in manager.list() {
        assert!(!handle.read().await.is_enabled());
    }

    assert_ok!(manager.enable("b").await);
    assert!(manager.get("b").unwrap().read().await.is_enabled());
    assert!(!manager.get("a").unwrap().read().await.is_enabled());

    manager.enable_all().await;
    assert!(manager.get("a").unwrap().read().await.is_enabled());
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_toml_configuration_applies_to_created_plugins() {
    let config = PluginManagerConfig::from_toml_str(
        r#"
        disabled_plugins = ["analytics"]

        [plugin_configs.subtitles]
        language = "fr"
        "#,
    )
    .unwrap();
    let log: Log = Arc::default();
    let manager = PluginManager::new(config);
    register(&manager, &log, "subtitles", RegisterOptions::new());
    register(&manager, &log, "analytics", RegisterOptions::new());

    let subtitles = assert_ok!(manager.create("subtitles", None).await);
    let analytics = assert_ok!(manager.create("analytics", None).await);

    assert_eq!(
        subtitles.read().await.context().config_value::<String>("language").as_deref(),
        Some("fr")
    );
    assert!(subtitles.read().await.is_enabled());
    assert!(!analytics.read().await.is_enabled());
    assert_eq!(analytics.phase().await, LifecyclePhase::Initialized);
}

#[tokio::test]
async fn test_auto_init_disabled() {
    let log: Log = Arc::default();
    let manager = PluginManager::new(PluginManagerConfig {
        auto_init: false,
        ..Default::default()
    });
    register(&manager, &log, "playlist", RegisterOptions::new());

    let playlist = assert_ok!(manager.create("playlist", None).await);
    assert_eq!(playlist.phase().await, LifecyclePhase::Created);
    assert!(entries(&log).is_empty());

    assert_ok!(playlist.write().await.init().await);
    assert_eq!(playlist.phase().await, LifecyclePhase::Initialized);
}

// =============================================================================
// Host wiring
// =============================================================================

#[tokio::test]
async fn test_plugins_follow_host_state_until_destroyed() {
    let bus = Arc::new(EventBus::new());
    let machine = Arc::new(HostStateMachine::new(bus.clone()));
    machine.bind();

    let log: Log = Arc::default();
    let manager = PluginManager::with_host(
        PluginManagerConfig::default(),
        HostLink::from_state_machine(machine.clone()),
    );
    register(&manager, &log, "controls", RegisterOptions::new());
    let controls = assert_ok!(manager.create("controls", None).await);
    assert!(controls.read().await.context().host_state().is_some());

    bus.emit(host_events::LOAD_START, json!(null));
    bus.emit(host_events::CAN_PLAY, json!(null));
    assert_eq!(machine.current(), HostState::Ready);

    assert_ok!(manager.destroy("controls").await);
    bus.emit(host_events::PLAY, json!(null));
    assert_eq!(machine.current(), HostState::Playing);

    assert_eq!(
        entries(&log),
        vec![
            "controls:init",
            "controls:state:loading",
            "controls:state:ready",
            "controls:destroy",
        ]
    );
    assert_eq!(bus.listener_count(host_events::STATE_CHANGE), 0);
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test]
async fn test_unregister_destroys_live_instance() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    let events = observe(&manager);
    register(&manager, &log, "pip", RegisterOptions::new());
    assert_ok!(manager.create("pip", None).await);

    assert_ok!(manager.unregister("pip").await);
    assert!(!manager.is_registered("pip"));
    assert!(!manager.has("pip"));
    assert_eq!(entries(&log), vec!["pip:init", "pip:destroy"]);
    assert_eq!(
        entries(&events),
        vec!["register:pip", "ready:pip", "destroy:pip", "unregister:pip"]
    );

    let err = assert_err!(manager.unregister("pip").await);
    assert_eq!(err, PluginError::NotRegistered("pip".into()));
}

#[tokio::test]
async fn test_clear_destroys_in_reverse_creation_order() {
    let log: Log = Arc::default();
    let manager = PluginManager::default();
    register(&manager, &log, "a", RegisterOptions::new());
    register(&manager, &log, "b", RegisterOptions::new().depends_on(["a"]));
    assert_ok!(manager.create("a", None).await);
    assert_ok!(manager.create("b", None).await);
    manager.add_validator(|_, _| Err("closed".to_string()));
    let warnings = observe(&manager);

    manager.clear().await;

    assert_eq!(manager.count(), 0);
    assert!(manager.registered_names().is_empty());
    assert_eq!(
        entries(&log),
        vec!["a:init", "b:init", "b:destroy", "a:destroy"]
    );
    // Dependents went first, so nothing warned.
    assert!(!entries(&warnings).iter().any(|e| e.starts_with("warning")));

    // Validators and listeners are gone too.
    assert_eq!(manager.events().listener_count("register"), 0);
    register(&manager, &log, "a", RegisterOptions::new());
    assert!(manager.is_registered("a"));
}
