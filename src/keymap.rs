//! Traits for the host-side keymap and behavior registry. The real
//! implementations live in the host runtime; processors only see these
//! seams.

use std::time::Instant;

use crate::error::Error;

/// HID keyboard/keypad usage page.
pub const HID_USAGE_PAGE_KEYBOARD: u16 = 0x07;
/// HID keyboard modifier usage range (LeftControl through RightGUI).
pub const HID_USAGE_KBD_MODIFIER_FIRST: u16 = 0xE0;
pub const HID_USAGE_KBD_MODIFIER_LAST: u16 = 0xE7;

/// Position reported when a keybind direction fires. No physical key is
/// involved, so invocations carry this sentinel.
pub const KEYBIND_POSITION: u32 = u32::MAX;

/// Fallback name of the transparent behavior when no identity token is
/// configured.
pub const TRANSPARENT_NAME: &str = "trans";
/// Fallback name of the key-press behavior.
pub const KEY_PRESS_NAME: &str = "key_press";

/// Opaque identity of a resolved behavior. Two bindings are the same
/// behavior exactly when their ids compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BehaviorId(pub u32);

/// A binding slot in a keymap layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerBinding {
    pub behavior: BehaviorId,
    pub name: String,
    pub param1: u32,
}

impl LayerBinding {
    /// Split the first parameter into its encoded HID `(page, id)` pair.
    pub const fn usage(&self) -> (u16, u16) {
        (
            ((self.param1 >> 16) & 0xFFFF) as u16,
            (self.param1 & 0xFFFF) as u16,
        )
    }
}

/// Encode a HID `(page, id)` pair into a binding parameter.
pub const fn encode_usage(page: u16, id: u16) -> u32 {
    ((page as u32) << 16) | id as u32
}

/// Match a binding against a configured behavior token, falling back to
/// a case-insensitive name comparison when no token is configured.
pub fn binding_is(binding: &LayerBinding, token: Option<BehaviorId>, fallback_name: &str) -> bool {
    match token {
        Some(id) => binding.behavior == id,
        None => binding.name.eq_ignore_ascii_case(fallback_name),
    }
}

/// Timing and placement context handed to a behavior on press/release.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorEvent {
    pub layer: u8,
    pub position: u32,
    pub timestamp: Instant,
}

/// The keymap surface the host runtime exposes to processors.
pub trait Keymap {
    fn layer_activate(&mut self, layer: u8) -> Result<(), Error>;
    fn layer_deactivate(&mut self, layer: u8) -> Result<(), Error>;
    fn layer_active(&self, layer: u8) -> bool;
    fn highest_active_layer(&self) -> u8;

    /// Number of layers the keymap defines. Layer-mask bits at or past
    /// this index are skipped.
    fn layer_count(&self) -> u8;

    fn binding_at(&self, layer: u8, position: u32) -> Option<LayerBinding>;

    /// Whether a usage is a modifier key. The default covers the HID
    /// keyboard page modifier range.
    fn is_modifier(&self, page: u16, id: u16) -> bool {
        page == HID_USAGE_PAGE_KEYBOARD
            && id >= HID_USAGE_KBD_MODIFIER_FIRST
            && id <= HID_USAGE_KBD_MODIFIER_LAST
    }
}

/// Resolves behavior names to invocable handlers and invokes them.
pub trait BehaviorRegistry {
    fn lookup(&self, name: &str) -> Option<BehaviorId>;

    fn invoke(
        &mut self,
        behavior: BehaviorId,
        event: BehaviorEvent,
        pressed: bool,
    ) -> Result<(), Error>;
}
