use evdev::{EventType, RelativeAxisType};
use smallvec::smallvec;

use crate::error::Error;
use crate::event::CodeList;
use crate::keymap::BehaviorId;
use crate::settings::{AxisSnapMode, Tunables};

/// Most directions the keybind dispatcher can fan out to.
pub const MAX_KEYBIND_BEHAVIORS: usize = 8;

/// Default debounce between a persistent change and the settings save.
/// Long on purpose: every save is a flash write on real hardware.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u16 = 60_000;

/// Temp-layer defaults: which layer to hold and the activation /
/// deactivation windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TempLayerConfig {
    pub enabled: bool,
    pub layer: u8,
    /// Minimum quiet time after a key press before pointer motion may
    /// activate the layer.
    pub act_ms: u16,
    /// Idle time after the last qualifying pointer event before the
    /// layer drops.
    pub deact_ms: u16,
}

/// Axis-snap defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisSnapConfig {
    pub mode: AxisSnapMode,
    /// Cross-axis accumulation needed to release the lock.
    pub threshold: u16,
    /// Window over which a full threshold of accumulation decays away.
    pub timeout_ms: u16,
}

/// Keybind-dispatch defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeybindConfig {
    pub enabled: bool,
    /// Number of directions the circle is divided into, 1..=8.
    pub count: u8,
    /// Where the first direction segment is centered, in degrees.
    pub degree_offset: u16,
    /// Accumulated 2D distance that triggers a fire.
    pub tick: u16,
}

impl Default for KeybindConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            count: 4,
            degree_offset: 0,
            tick: 10,
        }
    }
}

/// Immutable per-instance configuration. The devicetree/config loader
/// that populates these in firmware is an external collaborator; hosts
/// and tests build them in code.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Stable identifier, also the persistence key suffix.
    pub name: String,
    /// Only events of this type enter the pipeline.
    pub event_type: EventType,
    pub x_codes: CodeList,
    pub y_codes: CodeList,
    pub scale_mul: u32,
    pub scale_div: u32,
    pub rotation_deg: i32,
    pub temp_layer: TempLayerConfig,
    /// Layer gate bitmask; zero means the gate is always open.
    pub active_layers: u32,
    pub axis_snap: AxisSnapConfig,
    pub xy_to_scroll: bool,
    pub xy_swap: bool,
    pub x_invert: bool,
    pub y_invert: bool,
    /// Behavior names for the keybind directions, index = direction.
    pub keybind_behaviors: Vec<String>,
    pub keybind: KeybindConfig,
    /// Identity of the transparent behavior; name fallback when unset.
    pub transparent_behavior: Option<BehaviorId>,
    /// Identity of the key-press behavior; name fallback when unset.
    pub key_press_behavior: Option<BehaviorId>,
    /// Usage ids whose presses do NOT tear the temp layer down. When
    /// empty, modifier usages are kept instead.
    pub temp_layer_keep_keycodes: Vec<u16>,
    pub save_debounce_ms: u16,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            event_type: EventType::RELATIVE,
            x_codes: smallvec![RelativeAxisType::REL_X.0],
            y_codes: smallvec![RelativeAxisType::REL_Y.0],
            scale_mul: 1,
            scale_div: 1,
            rotation_deg: 0,
            temp_layer: TempLayerConfig::default(),
            active_layers: 0,
            axis_snap: AxisSnapConfig::default(),
            xy_to_scroll: false,
            xy_swap: false,
            x_invert: false,
            y_invert: false,
            keybind_behaviors: Vec::new(),
            keybind: KeybindConfig::default(),
            transparent_behavior: None,
            key_press_behavior: None,
            temp_layer_keep_keycodes: Vec::new(),
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
        }
    }
}

impl ProcessorConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Initial tunables, before any persisted record overrides them.
    pub fn initial_tunables(&self) -> Tunables {
        Tunables {
            scale_mul: self.scale_mul,
            scale_div: self.scale_div,
            rotation_deg: self.rotation_deg,
            temp_layer_enabled: self.temp_layer.enabled,
            temp_layer_layer: self.temp_layer.layer,
            temp_layer_act_ms: self.temp_layer.act_ms,
            temp_layer_deact_ms: self.temp_layer.deact_ms,
            active_layers: self.active_layers,
            axis_snap_mode: self.axis_snap.mode,
            axis_snap_threshold: self.axis_snap.threshold,
            axis_snap_timeout_ms: self.axis_snap.timeout_ms,
            xy_to_scroll: self.xy_to_scroll,
            xy_swap: self.xy_swap,
            x_invert: self.x_invert,
            y_invert: self.y_invert,
            keybind_enabled: self.keybind.enabled,
            keybind_count: self.keybind.count,
            keybind_degree_offset: self.keybind.degree_offset,
            keybind_tick: self.keybind.tick,
        }
    }

    /// The same invariants the setters enforce, checked once at init.
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::InvalidArgument("instance name is empty"));
        }
        if self.keybind_behaviors.len() > MAX_KEYBIND_BEHAVIORS {
            return Err(Error::InvalidArgument("more than 8 keybind behaviors"));
        }
        if self.keybind.tick == 0 {
            return Err(Error::InvalidArgument("keybind tick must be positive"));
        }
        if self.keybind.degree_offset > 359 {
            return Err(Error::InvalidArgument("keybind degree offset out of 0..=359"));
        }
        if usize::from(self.keybind.count) > MAX_KEYBIND_BEHAVIORS {
            return Err(Error::InvalidArgument("keybind count out of 1..=8"));
        }
        if self.keybind.enabled {
            let max = self.keybind_behaviors.len().min(MAX_KEYBIND_BEHAVIORS);
            if self.keybind.count == 0 || usize::from(self.keybind.count) > max {
                return Err(Error::InvalidArgument(
                    "keybind count exceeds configured behaviors",
                ));
            }
        }
        Ok(())
    }
}
