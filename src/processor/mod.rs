//! Processor instances: per-instance config + state, the stage
//! sequencer, and the runtime control surface.

pub mod keybind;
pub mod pipeline;
pub mod rotate;
pub mod scale;
pub mod snap;
pub mod temp_layer;

use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, error, trace, warn};

use crate::config::ProcessorConfig;
use crate::error::{Error, Result};
use crate::keymap::{BehaviorId, BehaviorRegistry, Keymap};
use crate::scheduler::{Scheduler, WorkId, WorkKind};
use crate::settings::{
    storage_key, AxisSnapMode, SettingsChanged, SettingsRecord, SettingsStore, Tunables,
};

use keybind::KeybindState;
pub use pipeline::ProcessResult;
use rotate::RotationState;
use snap::SnapState;
pub use temp_layer::TempLayerState;

/// Borrowed bundle of host-side collaborators. Everything here runs on
/// the host's single logical thread; instances are never touched from
/// anywhere else.
pub struct Host<'a> {
    pub keymap: &'a mut dyn Keymap,
    pub behaviors: &'a mut dyn BehaviorRegistry,
    pub scheduler: &'a mut dyn Scheduler,
    pub settings: &'a mut dyn SettingsStore,
}

/// Mutable runtime state of one instance. `current` drives the
/// pipeline; `persistent` is what the debounced save writes out.
#[derive(Debug)]
pub struct ProcessorState {
    pub current: Tunables,
    pub persistent: Tunables,
    pub(crate) rotation: RotationState,
    pub(crate) snap: SnapState,
    pub(crate) keybind: KeybindState,
    pub(crate) temp_layer: TempLayerState,
    /// Per-axis fractional carry for the scaling stage.
    pub(crate) scale_remainders: [i32; 2],
}

/// One configured processor instance. Created by the registry at init,
/// alive for the process lifetime.
pub struct Processor {
    id: usize,
    config: ProcessorConfig,
    /// Keybind behaviors resolved at init; unresolved names stay `None`
    /// and act as disabled directions.
    behaviors: Vec<Option<BehaviorId>>,
    notify: Sender<SettingsChanged>,
    pub(crate) state: ProcessorState,
}

impl Processor {
    pub(crate) fn new(
        id: usize,
        config: ProcessorConfig,
        notify: Sender<SettingsChanged>,
        registry: &dyn BehaviorRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let behaviors = config
            .keybind_behaviors
            .iter()
            .map(|name| {
                let resolved = registry.lookup(name);
                if resolved.is_none() {
                    warn!(
                        "{}: behavior '{name}' not found, keybind direction disabled",
                        config.name
                    );
                }
                resolved
            })
            .collect();
        let tunables = config.initial_tunables();
        let rotation = RotationState::new(tunables.rotation_deg);
        Ok(Self {
            id,
            config,
            behaviors,
            notify,
            state: ProcessorState {
                current: tunables,
                persistent: tunables,
                rotation,
                snap: SnapState::default(),
                keybind: KeybindState::default(),
                temp_layer: TempLayerState::default(),
                scale_remainders: [0; 2],
            },
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The public view of the instance: its active tunables.
    pub fn current_settings(&self) -> Tunables {
        self.state.current
    }

    pub fn persistent_settings(&self) -> Tunables {
        self.state.persistent
    }

    pub fn temp_layer_state(&self) -> TempLayerState {
        self.state.temp_layer
    }

    pub(crate) fn work(&self, kind: WorkKind) -> WorkId {
        WorkId::new(self.id, kind)
    }

    // ------------------------------------------------------------------
    // Settings persistence
    // ------------------------------------------------------------------

    /// Apply the persisted record over the initial values, if one
    /// exists and passes the strict checks. A bad record is logged and
    /// ignored; config defaults stand.
    pub(crate) fn load_settings(&mut self, store: &mut dyn SettingsStore) -> Result<()> {
        let key = storage_key(&self.config.name);
        let Some(bytes) = store.load(&key).map_err(Error::Io)? else {
            debug!("{}: no persisted settings, using config defaults", self.config.name);
            return Ok(());
        };
        let loaded = SettingsRecord::decode(&bytes).and_then(Tunables::try_from);
        match loaded {
            Ok(tunables) => {
                self.state.current = tunables;
                self.state.persistent = tunables;
                self.state.rotation.set_degrees(tunables.rotation_deg);
                self.state.snap.clear();
                self.state.keybind.clear();
                debug!("{}: loaded persisted settings", self.config.name);
            }
            Err(e) => {
                warn!("{}: rejecting persisted settings: {e}", self.config.name);
            }
        }
        Ok(())
    }

    /// Write the persistent tunables out. Runs from the debounced save
    /// work item; a failure is surfaced but the in-memory state stands.
    pub(crate) fn save_now(&mut self, store: &mut dyn SettingsStore) -> Result<()> {
        let bytes = SettingsRecord::from(self.state.persistent)
            .encode()
            .map_err(Error::Io)?;
        let key = storage_key(&self.config.name);
        match store.save(&key, &bytes) {
            Ok(()) => {
                debug!("{}: settings saved", self.config.name);
                Ok(())
            }
            Err(e) => {
                error!("{}: settings save failed: {e}", self.config.name);
                Err(Error::Io(e))
            }
        }
    }

    /// Mirror a change into the persistent view, schedule the debounced
    /// save (re-scheduling coalesces back-to-back changes) and tell the
    /// observers.
    fn persist(&mut self, scheduler: &mut dyn Scheduler, apply: impl FnOnce(&mut Tunables)) {
        apply(&mut self.state.persistent);
        scheduler.schedule(
            self.work(WorkKind::SettingsSave),
            Duration::from_millis(self.config.save_debounce_ms.into()),
        );
        let update = SettingsChanged {
            name: self.config.name.clone(),
            settings: self.state.current,
        };
        if self.notify.try_send(update).is_err() {
            trace!("{}: settings observer not keeping up", self.config.name);
        }
    }

    // ------------------------------------------------------------------
    // Control surface. Every setter validates first; a rejected call
    // changes nothing. The current tunable always updates; with
    // `persistent` the matching persistent field follows and a save is
    // scheduled.
    // ------------------------------------------------------------------

    pub fn set_scaling(
        &mut self,
        mul: u32,
        div: u32,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.scale_mul = mul;
        self.state.current.scale_div = div;
        if persistent {
            self.persist(host.scheduler, |t| {
                t.scale_mul = mul;
                t.scale_div = div;
            });
        }
        Ok(())
    }

    pub fn set_rotation(
        &mut self,
        degrees: i32,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.rotation_deg = degrees;
        self.state.rotation.set_degrees(degrees);
        if persistent {
            self.persist(host.scheduler, |t| t.rotation_deg = degrees);
        }
        Ok(())
    }

    pub fn set_temp_layer(
        &mut self,
        enabled: bool,
        layer: u8,
        act_ms: u16,
        deact_ms: u16,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        if layer != self.state.current.temp_layer_layer {
            self.temp_layer_retarget(host.keymap, host.scheduler);
        }
        if !enabled && self.state.current.temp_layer_enabled {
            self.temp_layer_on_disable(host.keymap, host.scheduler);
        }
        let c = &mut self.state.current;
        c.temp_layer_enabled = enabled;
        c.temp_layer_layer = layer;
        c.temp_layer_act_ms = act_ms;
        c.temp_layer_deact_ms = deact_ms;
        if persistent {
            self.persist(host.scheduler, |t| {
                t.temp_layer_enabled = enabled;
                t.temp_layer_layer = layer;
                t.temp_layer_act_ms = act_ms;
                t.temp_layer_deact_ms = deact_ms;
            });
        }
        Ok(())
    }

    pub fn set_temp_layer_enabled(
        &mut self,
        enabled: bool,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        if !enabled && self.state.current.temp_layer_enabled {
            self.temp_layer_on_disable(host.keymap, host.scheduler);
        }
        self.state.current.temp_layer_enabled = enabled;
        if persistent {
            self.persist(host.scheduler, |t| t.temp_layer_enabled = enabled);
        }
        Ok(())
    }

    pub fn set_temp_layer_layer(
        &mut self,
        layer: u8,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        if layer != self.state.current.temp_layer_layer {
            self.temp_layer_retarget(host.keymap, host.scheduler);
        }
        self.state.current.temp_layer_layer = layer;
        if persistent {
            self.persist(host.scheduler, |t| t.temp_layer_layer = layer);
        }
        Ok(())
    }

    pub fn set_temp_layer_act_ms(
        &mut self,
        act_ms: u16,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.temp_layer_act_ms = act_ms;
        if persistent {
            self.persist(host.scheduler, |t| t.temp_layer_act_ms = act_ms);
        }
        Ok(())
    }

    pub fn set_temp_layer_deact_ms(
        &mut self,
        deact_ms: u16,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.temp_layer_deact_ms = deact_ms;
        if persistent {
            self.persist(host.scheduler, |t| t.temp_layer_deact_ms = deact_ms);
        }
        Ok(())
    }

    pub fn set_active_layers(
        &mut self,
        mask: u32,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.active_layers = mask;
        if persistent {
            self.persist(host.scheduler, |t| t.active_layers = mask);
        }
        Ok(())
    }

    pub fn set_axis_snap(
        &mut self,
        mode: AxisSnapMode,
        threshold: u16,
        timeout_ms: u16,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        let c = &mut self.state.current;
        c.axis_snap_mode = mode;
        c.axis_snap_threshold = threshold;
        c.axis_snap_timeout_ms = timeout_ms;
        self.state.snap.clear();
        if persistent {
            self.persist(host.scheduler, |t| {
                t.axis_snap_mode = mode;
                t.axis_snap_threshold = threshold;
                t.axis_snap_timeout_ms = timeout_ms;
            });
        }
        Ok(())
    }

    pub fn set_axis_snap_mode(
        &mut self,
        mode: AxisSnapMode,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.axis_snap_mode = mode;
        self.state.snap.clear();
        if persistent {
            self.persist(host.scheduler, |t| t.axis_snap_mode = mode);
        }
        Ok(())
    }

    pub fn set_axis_snap_threshold(
        &mut self,
        threshold: u16,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.axis_snap_threshold = threshold;
        self.state.snap.clear();
        if persistent {
            self.persist(host.scheduler, |t| t.axis_snap_threshold = threshold);
        }
        Ok(())
    }

    pub fn set_axis_snap_timeout(
        &mut self,
        timeout_ms: u16,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.axis_snap_timeout_ms = timeout_ms;
        self.state.snap.clear();
        if persistent {
            self.persist(host.scheduler, |t| t.axis_snap_timeout_ms = timeout_ms);
        }
        Ok(())
    }

    pub fn set_xy_to_scroll(
        &mut self,
        enabled: bool,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.xy_to_scroll = enabled;
        if persistent {
            self.persist(host.scheduler, |t| t.xy_to_scroll = enabled);
        }
        Ok(())
    }

    pub fn set_xy_swap(
        &mut self,
        enabled: bool,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.xy_swap = enabled;
        if persistent {
            self.persist(host.scheduler, |t| t.xy_swap = enabled);
        }
        Ok(())
    }

    pub fn set_x_invert(
        &mut self,
        enabled: bool,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.x_invert = enabled;
        if persistent {
            self.persist(host.scheduler, |t| t.x_invert = enabled);
        }
        Ok(())
    }

    pub fn set_y_invert(
        &mut self,
        enabled: bool,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.y_invert = enabled;
        if persistent {
            self.persist(host.scheduler, |t| t.y_invert = enabled);
        }
        Ok(())
    }

    pub fn set_keybind_enabled(
        &mut self,
        enabled: bool,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        self.state.current.keybind_enabled = enabled;
        self.state.keybind.clear();
        if persistent {
            self.persist(host.scheduler, |t| t.keybind_enabled = enabled);
        }
        Ok(())
    }

    pub fn set_keybind_count(
        &mut self,
        count: u8,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        if count == 0 || usize::from(count) > crate::config::MAX_KEYBIND_BEHAVIORS {
            return Err(Error::InvalidArgument("keybind count out of 1..=8"));
        }
        self.state.current.keybind_count = count;
        self.state.keybind.clear();
        if persistent {
            self.persist(host.scheduler, |t| t.keybind_count = count);
        }
        Ok(())
    }

    pub fn set_keybind_degree_offset(
        &mut self,
        degree_offset: u16,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        if degree_offset > 359 {
            return Err(Error::InvalidArgument("keybind degree offset out of 0..=359"));
        }
        self.state.current.keybind_degree_offset = degree_offset;
        if persistent {
            self.persist(host.scheduler, |t| t.keybind_degree_offset = degree_offset);
        }
        Ok(())
    }

    pub fn set_keybind_tick(
        &mut self,
        tick: u16,
        persistent: bool,
        host: &mut Host<'_>,
    ) -> Result<()> {
        if tick == 0 {
            return Err(Error::InvalidArgument("keybind tick must be positive"));
        }
        self.state.current.keybind_tick = tick;
        if persistent {
            self.persist(host.scheduler, |t| t.keybind_tick = tick);
        }
        Ok(())
    }

    /// Restore every tunable to the config defaults and schedule a
    /// save. Pending temp-layer work is left alone: its callbacks
    /// observe the new state on their existing deadlines.
    pub fn reset(&mut self, host: &mut Host<'_>) -> Result<()> {
        let defaults = self.config.initial_tunables();
        self.state.current = defaults;
        self.state.rotation.set_degrees(defaults.rotation_deg);
        self.state.snap.clear();
        self.state.keybind.clear();
        self.state.scale_remainders = [0; 2];
        self.persist(host.scheduler, |t| *t = defaults);
        Ok(())
    }

    /// Snap `current` back to `persistent`, dropping any temporary
    /// overrides; the snap and keybind accumulators start over.
    pub fn restore_persistent(&mut self) {
        self.state.current = self.state.persistent;
        self.state.rotation.set_degrees(self.state.current.rotation_deg);
        self.state.snap.clear();
        self.state.keybind.clear();
    }
}
