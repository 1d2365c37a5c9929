//! Runtime tunables and their persistence model. Every instance keeps
//! two copies of [`Tunables`]: `current` drives the pipeline,
//! `persistent` is what the settings backend holds once the debounced
//! save runs.

use std::collections::HashMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Storage key prefix; one record per instance, keyed by name.
pub const STORE_PREFIX: &str = "input_proc";

pub fn storage_key(name: &str) -> String {
    format!("{STORE_PREFIX}/{name}")
}

/// Axis the snap stage locks motion to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisSnapMode {
    #[default]
    None,
    SnapX,
    SnapY,
}

impl AxisSnapMode {
    pub const fn as_u8(self) -> u8 {
        match self {
            AxisSnapMode::None => 0,
            AxisSnapMode::SnapX => 1,
            AxisSnapMode::SnapY => 2,
        }
    }

    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(AxisSnapMode::None),
            1 => Some(AxisSnapMode::SnapX),
            2 => Some(AxisSnapMode::SnapY),
            _ => None,
        }
    }
}

/// Every runtime tunable of a processor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tunables {
    pub scale_mul: u32,
    pub scale_div: u32,
    pub rotation_deg: i32,
    pub temp_layer_enabled: bool,
    pub temp_layer_layer: u8,
    pub temp_layer_act_ms: u16,
    pub temp_layer_deact_ms: u16,
    pub active_layers: u32,
    pub axis_snap_mode: AxisSnapMode,
    pub axis_snap_threshold: u16,
    pub axis_snap_timeout_ms: u16,
    pub xy_to_scroll: bool,
    pub xy_swap: bool,
    pub x_invert: bool,
    pub y_invert: bool,
    pub keybind_enabled: bool,
    pub keybind_count: u8,
    pub keybind_degree_offset: u16,
    pub keybind_tick: u16,
}

/// Wire form of [`Tunables`]: primitive fields in the exact order and
/// width the settings backend stores. bincode's fixed-int little-endian
/// encoding lays this out byte for byte, bools as one byte each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    pub scale_mul: u32,
    pub scale_div: u32,
    pub rotation_deg: i32,
    pub temp_layer_enabled: bool,
    pub temp_layer_layer: u8,
    pub temp_layer_act_ms: u16,
    pub temp_layer_deact_ms: u16,
    pub active_layers: u32,
    pub axis_snap_mode: u8,
    pub axis_snap_threshold: u16,
    pub axis_snap_timeout_ms: u16,
    pub xy_to_scroll: bool,
    pub xy_swap: bool,
    pub x_invert: bool,
    pub y_invert: bool,
    pub keybind_enabled: bool,
    pub keybind_count: u8,
    pub keybind_degree_offset: u16,
    pub keybind_tick: u16,
}

impl SettingsRecord {
    /// Encoded size; records of any other length are rejected on load.
    pub const ENCODED_LEN: usize = 37;

    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = bincode::serialize(self).context("encode settings record")?;
        debug_assert_eq!(bytes.len(), Self::ENCODED_LEN);
        Ok(bytes)
    }

    /// Strict decode. A record written by a different firmware revision
    /// has a different length and is rejected, leaving config defaults
    /// in force.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(Error::InvalidArgument("settings record size mismatch"));
        }
        bincode::deserialize(bytes).map_err(|e| Error::Io(anyhow::anyhow!(e)))
    }
}

impl From<Tunables> for SettingsRecord {
    fn from(t: Tunables) -> Self {
        Self {
            scale_mul: t.scale_mul,
            scale_div: t.scale_div,
            rotation_deg: t.rotation_deg,
            temp_layer_enabled: t.temp_layer_enabled,
            temp_layer_layer: t.temp_layer_layer,
            temp_layer_act_ms: t.temp_layer_act_ms,
            temp_layer_deact_ms: t.temp_layer_deact_ms,
            active_layers: t.active_layers,
            axis_snap_mode: t.axis_snap_mode.as_u8(),
            axis_snap_threshold: t.axis_snap_threshold,
            axis_snap_timeout_ms: t.axis_snap_timeout_ms,
            xy_to_scroll: t.xy_to_scroll,
            xy_swap: t.xy_swap,
            x_invert: t.x_invert,
            y_invert: t.y_invert,
            keybind_enabled: t.keybind_enabled,
            keybind_count: t.keybind_count,
            keybind_degree_offset: t.keybind_degree_offset,
            keybind_tick: t.keybind_tick,
        }
    }
}

impl TryFrom<SettingsRecord> for Tunables {
    type Error = Error;

    fn try_from(r: SettingsRecord) -> Result<Self, Error> {
        let axis_snap_mode = AxisSnapMode::from_u8(r.axis_snap_mode)
            .ok_or(Error::InvalidArgument("axis snap mode out of range"))?;
        Ok(Self {
            scale_mul: r.scale_mul,
            scale_div: r.scale_div,
            rotation_deg: r.rotation_deg,
            temp_layer_enabled: r.temp_layer_enabled,
            temp_layer_layer: r.temp_layer_layer,
            temp_layer_act_ms: r.temp_layer_act_ms,
            temp_layer_deact_ms: r.temp_layer_deact_ms,
            active_layers: r.active_layers,
            axis_snap_mode,
            axis_snap_threshold: r.axis_snap_threshold,
            axis_snap_timeout_ms: r.axis_snap_timeout_ms,
            xy_to_scroll: r.xy_to_scroll,
            xy_swap: r.xy_swap,
            x_invert: r.x_invert,
            y_invert: r.y_invert,
            keybind_enabled: r.keybind_enabled,
            keybind_count: r.keybind_count,
            keybind_degree_offset: r.keybind_degree_offset,
            keybind_tick: r.keybind_tick,
        })
    }
}

/// Key/value settings backend. Implementations are host-provided; the
/// debounce that batches writes lives in the processor, not here.
pub trait SettingsStore {
    fn save(&mut self, key: &str, bytes: &[u8]) -> anyhow::Result<()>;
    fn load(&mut self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// In-RAM store. Hosts use it before a real backend exists; tests use
/// it to survive simulated reboots.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn save(&mut self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        self.records.insert(key.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn load(&mut self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.records.get(key).cloned())
    }
}

/// Published on the observer channel whenever a persistent tunable
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsChanged {
    pub name: String,
    pub settings: Tunables,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tunables {
        Tunables {
            scale_mul: 7,
            scale_div: 4,
            rotation_deg: -90,
            temp_layer_enabled: true,
            temp_layer_layer: 3,
            temp_layer_act_ms: 100,
            temp_layer_deact_ms: 500,
            active_layers: 0b101,
            axis_snap_mode: AxisSnapMode::SnapY,
            axis_snap_threshold: 120,
            axis_snap_timeout_ms: 900,
            xy_to_scroll: false,
            xy_swap: true,
            x_invert: true,
            y_invert: false,
            keybind_enabled: true,
            keybind_count: 8,
            keybind_degree_offset: 359,
            keybind_tick: 25,
        }
    }

    #[test]
    fn test_encoded_length_is_fixed() {
        let bytes = SettingsRecord::from(sample()).encode().unwrap();
        assert_eq!(bytes.len(), SettingsRecord::ENCODED_LEN);
    }

    #[test]
    fn test_record_round_trip() {
        let t = sample();
        let bytes = SettingsRecord::from(t).encode().unwrap();
        let decoded = SettingsRecord::decode(&bytes).unwrap();
        assert_eq!(Tunables::try_from(decoded).unwrap(), t);
    }

    #[test]
    fn test_layout_is_little_endian_in_field_order() {
        let bytes = SettingsRecord::from(sample()).encode().unwrap();
        assert_eq!(&bytes[0..4], &7u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &4u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &(-90i32).to_le_bytes());
        assert_eq!(bytes[12], 1); // temp_layer_enabled
        assert_eq!(bytes[13], 3); // temp_layer_layer
        assert_eq!(&bytes[14..16], &100u16.to_le_bytes());
        assert_eq!(&bytes[16..18], &500u16.to_le_bytes());
        assert_eq!(&bytes[18..22], &0b101u32.to_le_bytes());
        assert_eq!(bytes[22], 2); // SnapY
        assert_eq!(&bytes[35..37], &25u16.to_le_bytes());
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let mut bytes = SettingsRecord::from(sample()).encode().unwrap();
        bytes.push(0);
        assert!(matches!(
            SettingsRecord::decode(&bytes),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            SettingsRecord::decode(&bytes[..36]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unknown_snap_mode_rejected() {
        let mut record = SettingsRecord::from(sample());
        record.axis_snap_mode = 3;
        assert!(Tunables::try_from(record).is_err());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        store.save(&storage_key("tp"), &[1, 2, 3]).unwrap();
        assert_eq!(store.load("input_proc/tp").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.load("input_proc/other").unwrap(), None);
    }
}
