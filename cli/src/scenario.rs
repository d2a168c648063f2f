//! Scenario files: a scene, some component classes, and a script of steps.
//!
//! ```toml
//! [manager]
//! timeout_secs = 1.0
//!
//! [[entity]]
//! name = "hall"
//!
//! [[entity]]
//! name = "front_door"
//! parent = "hall"
//! tags = ["Door"]
//!
//! [[component]]
//! name = "Door"
//! tag = "Door"
//! ancestor = "hall"
//! start_delay_ms = 200
//!
//! [[step]]
//! action = "await_start"
//! entity = "front_door"
//! component = "Door"
//! ```
//!
//! Entities are referred to by name; `root` is the scene root.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;

use tether_config::ManagerConfig;
use tether_core::{
    Component, ComponentClass, ComponentManager, EntityId, InMemoryScene, SceneGraph, StartState,
    Tag,
};

const ROOT_NAME: &str = "root";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Overrides the user config file when present.
    pub manager: Option<ManagerConfig>,
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntitySpec>,
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentSpec>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitySpec {
    pub name: String,
    /// Defaults to the root.
    pub parent: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    pub name: String,
    pub tag: String,
    pub ancestor: Option<String>,
    /// How long `start` suspends before finishing.
    #[serde(default)]
    pub start_delay_ms: u64,
    /// Make `start` fail after the delay.
    #[serde(default)]
    pub fail_start: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    AddTag { entity: String, tag: String },
    RemoveTag { entity: String, tag: String },
    AwaitComponent { entity: String, component: String },
    AwaitStart { entity: String, component: String },
    SleepMs { ms: u64 },
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(content).context("invalid scenario")?;
        if let Some(config) = &scenario.manager {
            config.validate()?;
        }
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}

/// One live binding at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRow {
    pub component: String,
    pub entity: String,
    pub state: StartState,
}

/// Component used for every class in a scenario: it logs its lifecycle
/// and optionally takes a while to start, or fails.
struct TracedComponent {
    class: String,
    entity: EntityId,
    start_delay: Duration,
    fail_start: bool,
}

#[async_trait]
impl Component for TracedComponent {
    async fn start(&self) -> Result<()> {
        tracing::info!(component = %self.class, entity = %self.entity, "Starting");
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if self.fail_start {
            bail!("{} on {} was configured to fail", self.class, self.entity);
        }
        tracing::info!(component = %self.class, entity = %self.entity, "Started");
        Ok(())
    }

    fn destroy(&self) {
        tracing::info!(component = %self.class, entity = %self.entity, "Destroyed");
    }
}

/// Scene plus the name table used to resolve step targets.
struct Stage {
    scene: Arc<InMemoryScene>,
    names: HashMap<String, EntityId>,
}

impl Stage {
    fn build(entities: &[EntitySpec]) -> Result<Self> {
        let scene = Arc::new(InMemoryScene::new());
        let mut names = HashMap::from([(ROOT_NAME.to_string(), scene.root())]);

        for spec in entities {
            if names.contains_key(&spec.name) {
                bail!("entity '{}' is declared twice", spec.name);
            }
            let parent = match &spec.parent {
                Some(parent) => *names
                    .get(parent)
                    .with_context(|| format!("entity '{}': unknown parent '{parent}'", spec.name))?,
                None => scene.root(),
            };
            let id = scene.spawn(parent)?;
            for tag in &spec.tags {
                scene.add_tag(id, &parse_tag(tag)?)?;
            }
            names.insert(spec.name.clone(), id);
        }
        Ok(Self { scene, names })
    }

    fn resolve(&self, name: &str) -> Result<EntityId> {
        self.names
            .get(name)
            .copied()
            .with_context(|| format!("unknown entity '{name}'"))
    }

    fn name_of(&self, entity: EntityId) -> String {
        self.names
            .iter()
            .find(|(_, id)| **id == entity)
            .map_or_else(|| entity.to_string(), |(name, _)| name.clone())
    }
}

fn parse_tag(tag: &str) -> Result<Tag> {
    Tag::new(tag).with_context(|| format!("invalid tag '{tag}'"))
}

/// Run `scenario` to completion and report the bindings left standing.
///
/// Everything is torn down before returning.
pub async fn run(scenario: Scenario, config: &ManagerConfig) -> Result<Vec<BindingRow>> {
    let stage = Stage::build(&scenario.entities)?;
    let scene: Arc<dyn SceneGraph> = stage.scene.clone();
    let manager = ComponentManager::with_config(scene, config);

    for spec in &scenario.components {
        let mut class = ComponentClass::new(&spec.name, &spec.tag);
        if let Some(ancestor) = &spec.ancestor {
            class = class.with_ancestor(stage.resolve(ancestor)?);
        }
        let class_name = spec.name.clone();
        let start_delay = Duration::from_millis(spec.start_delay_ms);
        let fail_start = spec.fail_start;
        class = class.with_constructor(move |entity| {
            Ok(Arc::new(TracedComponent {
                class: class_name.clone(),
                entity,
                start_delay,
                fail_start,
            }) as Arc<dyn Component>)
        });
        manager
            .register(class)
            .await
            .with_context(|| format!("failed to register '{}'", spec.name))?;
    }

    for step in &scenario.steps {
        run_step(&manager, &stage, step).await?;
    }

    let mut rows = Vec::new();
    for class in manager.registered_classes() {
        for binding in manager.bindings(class.as_str()) {
            rows.push(BindingRow {
                component: class.to_string(),
                entity: stage.name_of(binding.entity()),
                state: binding.start_state(),
            });
        }
    }
    manager.shutdown();
    Ok(rows)
}

async fn run_step(manager: &ComponentManager, stage: &Stage, step: &Step) -> Result<()> {
    tracing::debug!(?step, "Running step");
    match step {
        Step::AddTag { entity, tag } => {
            stage.scene.add_tag(stage.resolve(entity)?, &parse_tag(tag)?)?;
            // Let the tag bridges see the event before the next step.
            tokio::task::yield_now().await;
        }
        Step::RemoveTag { entity, tag } => {
            stage
                .scene
                .remove_tag(stage.resolve(entity)?, &parse_tag(tag)?)?;
            tokio::task::yield_now().await;
        }
        Step::AwaitComponent { entity, component } => {
            let id = stage.resolve(entity)?;
            if manager.await_component(id, component).await?.is_none() {
                tracing::warn!(component = %component, entity = %entity, "Component never appeared");
            }
        }
        Step::AwaitStart { entity, component } => {
            let id = stage.resolve(entity)?;
            let Some(binding) = manager.await_component(id, component).await? else {
                tracing::warn!(component = %component, entity = %entity, "Component never appeared");
                return Ok(());
            };
            if let Err(e) = manager.await_start(&binding).await {
                tracing::warn!(component = %component, entity = %entity, "{e}");
            }
        }
        Step::SleepMs { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
    }
    Ok(())
}
