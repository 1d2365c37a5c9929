#![allow(dead_code)]

use std::collections::HashMap;
use std::time::{Duration, Instant};

use evdev::{EventType, InputEvent, RelativeAxisType};
use motionmux::keymap::{BehaviorEvent, BehaviorId, BehaviorRegistry, LayerBinding};
pub use motionmux::keymap::Keymap;
use motionmux::processor::{Host, ProcessResult};
use motionmux::scheduler::ManualScheduler;
use motionmux::settings::MemoryStore;
use motionmux::{Error, Registry};

pub const REL_X: u16 = RelativeAxisType::REL_X.0;
pub const REL_Y: u16 = RelativeAxisType::REL_Y.0;
pub const REL_WHEEL: u16 = RelativeAxisType::REL_WHEEL.0;
pub const REL_HWHEEL: u16 = RelativeAxisType::REL_HWHEEL.0;

pub fn rel(code: u16, value: i32) -> InputEvent {
    InputEvent::new(EventType::RELATIVE, code, value)
}

pub fn key_event(code: u16, value: i32) -> InputEvent {
    InputEvent::new(EventType::KEY, code, value)
}

/// Unpack an emitted event, panicking on consumption.
pub fn emitted(result: ProcessResult) -> (u16, i32) {
    match result {
        ProcessResult::Emit(ev) => (ev.code(), ev.value()),
        ProcessResult::Consumed => panic!("expected an emitted event, got consumption"),
    }
}

/// Keymap fake: a fixed stack of layers with scripted bindings. Layer 0
/// starts active, like a base layer would.
pub struct FakeKeymap {
    pub active: Vec<bool>,
    pub bindings: HashMap<(u8, u32), LayerBinding>,
    pub activations: Vec<u8>,
    pub deactivations: Vec<u8>,
    pub fail_layer_ops: bool,
}

impl FakeKeymap {
    pub fn new(layers: u8) -> Self {
        let mut active = vec![false; usize::from(layers)];
        if let Some(base) = active.first_mut() {
            *base = true;
        }
        Self {
            active,
            bindings: HashMap::new(),
            activations: Vec::new(),
            deactivations: Vec::new(),
            fail_layer_ops: false,
        }
    }

    pub fn bind(&mut self, layer: u8, position: u32, name: &str, behavior: u32, param1: u32) {
        self.bindings.insert(
            (layer, position),
            LayerBinding {
                behavior: BehaviorId(behavior),
                name: name.into(),
                param1,
            },
        );
    }
}

impl Keymap for FakeKeymap {
    fn layer_activate(&mut self, layer: u8) -> Result<(), Error> {
        if self.fail_layer_ops {
            return Err(Error::External("layer activate refused".into()));
        }
        match self.active.get_mut(usize::from(layer)) {
            Some(slot) => {
                *slot = true;
                self.activations.push(layer);
                Ok(())
            }
            None => Err(Error::NotFound(format!("layer {layer}"))),
        }
    }

    fn layer_deactivate(&mut self, layer: u8) -> Result<(), Error> {
        if self.fail_layer_ops {
            return Err(Error::External("layer deactivate refused".into()));
        }
        match self.active.get_mut(usize::from(layer)) {
            Some(slot) => {
                *slot = false;
                self.deactivations.push(layer);
                Ok(())
            }
            None => Err(Error::NotFound(format!("layer {layer}"))),
        }
    }

    fn layer_active(&self, layer: u8) -> bool {
        self.active.get(usize::from(layer)).copied().unwrap_or(false)
    }

    fn highest_active_layer(&self) -> u8 {
        self.active.iter().rposition(|&a| a).unwrap_or(0) as u8
    }

    fn layer_count(&self) -> u8 {
        self.active.len() as u8
    }

    fn binding_at(&self, layer: u8, position: u32) -> Option<LayerBinding> {
        self.bindings.get(&(layer, position)).cloned()
    }
}

/// One recorded behavior invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub behavior: BehaviorId,
    pub pressed: bool,
    pub layer: u8,
    pub position: u32,
}

/// Behavior registry fake: names resolve to their index, invocations
/// are recorded in order.
#[derive(Default)]
pub struct FakeBehaviors {
    pub names: Vec<String>,
    pub invocations: Vec<Invocation>,
    pub failing: Vec<BehaviorId>,
}

impl FakeBehaviors {
    pub fn with_names(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| (*s).to_owned()).collect(),
            ..Self::default()
        }
    }
}

impl BehaviorRegistry for FakeBehaviors {
    fn lookup(&self, name: &str) -> Option<BehaviorId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| BehaviorId(i as u32))
    }

    fn invoke(
        &mut self,
        behavior: BehaviorId,
        event: BehaviorEvent,
        pressed: bool,
    ) -> Result<(), Error> {
        if self.failing.contains(&behavior) {
            return Err(Error::External(format!("behavior {} refused", behavior.0)));
        }
        self.invocations.push(Invocation {
            behavior,
            pressed,
            layer: event.layer,
            position: event.position,
        });
        Ok(())
    }
}

/// Everything a test needs to drive a registry, with a hand-cranked
/// clock anchored at `t0`.
pub struct Fixture {
    pub keymap: FakeKeymap,
    pub behaviors: FakeBehaviors,
    pub scheduler: ManualScheduler,
    pub store: MemoryStore,
    pub t0: Instant,
}

impl Fixture {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let t0 = Instant::now();
        Self {
            keymap: FakeKeymap::new(8),
            behaviors: FakeBehaviors::default(),
            scheduler: ManualScheduler::new(t0),
            store: MemoryStore::new(),
            t0,
        }
    }

    pub fn host(&mut self) -> Host<'_> {
        Host {
            keymap: &mut self.keymap,
            behaviors: &mut self.behaviors,
            scheduler: &mut self.scheduler,
            settings: &mut self.store,
        }
    }

    pub fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    /// Route one event through an instance at a given clock position.
    pub fn process(
        &mut self,
        registry: &mut Registry,
        id: usize,
        event: InputEvent,
        ms: u64,
    ) -> ProcessResult {
        let now = self.at(ms);
        self.scheduler.set_now(now);
        let mut host = self.host();
        registry.handle_event(id, event, now, &mut host).unwrap()
    }

    /// Run everything due at the given clock position.
    pub fn run_due(&mut self, registry: &mut Registry, ms: u64) {
        let now = self.at(ms);
        let due = self.scheduler.take_due(now);
        for work in due {
            let mut host = self.host();
            let _ = registry.dispatch_work(work, now, &mut host);
        }
    }
}
