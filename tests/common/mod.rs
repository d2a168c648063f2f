//! Shared test utilities and fixtures
//!
//! A scene + manager pair, a component that counts its lifecycle calls,
//! and helpers for draining lifecycle events.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::Level;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use tether_core::{
    Component, ComponentClass, ComponentManager, ComponentName, EntityId, InMemoryScene,
    LifecycleEvent, SceneGraph, Tag,
};

/// Lifecycle counters shared by every instance of one test class.
#[derive(Debug, Default)]
pub struct Tally {
    constructed: AtomicUsize,
    starts_begun: AtomicUsize,
    starts_finished: AtomicUsize,
    destroyed: AtomicUsize,
}

impl Tally {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn starts_begun(&self) -> usize {
        self.starts_begun.load(Ordering::SeqCst)
    }

    pub fn starts_finished(&self) -> usize {
        self.starts_finished.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Component that reports to a [`Tally`], optionally slow or failing.
pub struct Recorder {
    pub entity: EntityId,
    tally: Arc<Tally>,
    start_delay: Duration,
    fail_start: bool,
}

#[async_trait]
impl Component for Recorder {
    async fn start(&self) -> anyhow::Result<()> {
        self.tally.starts_begun.fetch_add(1, Ordering::SeqCst);
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if self.fail_start {
            anyhow::bail!("boom");
        }
        self.tally.starts_finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&self) {
        self.tally.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

fn recorder_class(
    name: &str,
    tag: &str,
    tally: &Arc<Tally>,
    start_delay: Duration,
    fail_start: bool,
) -> ComponentClass {
    let tally = Arc::clone(tally);
    ComponentClass::new(name, tag).with_constructor(move |entity| {
        tally.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Recorder {
            entity,
            tally: Arc::clone(&tally),
            start_delay,
            fail_start,
        }) as Arc<dyn Component>)
    })
}

/// Class whose components start instantly.
pub fn class(name: &str, tag: &str, tally: &Arc<Tally>) -> ComponentClass {
    recorder_class(name, tag, tally, Duration::ZERO, false)
}

/// Class whose components take `delay` to start.
pub fn slow_class(name: &str, tag: &str, tally: &Arc<Tally>, delay: Duration) -> ComponentClass {
    recorder_class(name, tag, tally, delay, false)
}

/// Class whose components fail to start.
pub fn failing_class(name: &str, tag: &str, tally: &Arc<Tally>) -> ComponentClass {
    recorder_class(name, tag, tally, Duration::ZERO, true)
}

pub fn tag(name: &str) -> Tag {
    Tag::new(name).unwrap()
}

pub fn name(value: &str) -> ComponentName {
    ComponentName::new(value).unwrap()
}

/// An in-memory scene and a manager driving it.
pub struct Fixture {
    pub scene: Arc<InMemoryScene>,
    pub manager: ComponentManager,
}

impl Fixture {
    pub fn new() -> Self {
        let scene = Arc::new(InMemoryScene::new());
        let manager = ComponentManager::new(Arc::clone(&scene) as Arc<dyn SceneGraph>);
        Self { scene, manager }
    }

    pub fn root(&self) -> EntityId {
        self.scene.root()
    }

    /// New entity under the root.
    pub fn spawn(&self) -> EntityId {
        self.scene.spawn(self.root()).unwrap()
    }

    pub fn spawn_under(&self, parent: EntityId) -> EntityId {
        self.scene.spawn(parent).unwrap()
    }

    pub fn add_tag(&self, entity: EntityId, value: &str) {
        self.scene.add_tag(entity, &tag(value)).unwrap();
    }

    pub fn remove_tag(&self, entity: EntityId, value: &str) {
        self.scene.remove_tag(entity, &tag(value)).unwrap();
    }
}

/// Let spawned tasks (bridges, startups) run until they park.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Every event received so far, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Captures formatted log lines for the current thread.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Route this thread's logs up to `level` into the buffer until the
    /// guard drops.
    pub fn install(&self, level: Level) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
