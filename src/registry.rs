//! Process-wide list of processor instances, built at init. Also the
//! fan-out point for the keycode/position listeners and the executor
//! entry for due deferred work.

use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender};
use evdev::InputEvent;

use crate::config::ProcessorConfig;
use crate::error::{Error, Result};
use crate::processor::{Host, ProcessResult, Processor};
use crate::scheduler::{WorkId, WorkKind};
use crate::settings::SettingsChanged;

/// Observer notifications queue at most this many unread entries;
/// further ones are dropped until the observer catches up.
const NOTIFY_DEPTH: usize = 32;

pub struct Registry {
    processors: Vec<Processor>,
    notify_tx: Sender<SettingsChanged>,
    notify_rx: Receiver<SettingsChanged>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let (notify_tx, notify_rx) = bounded(NOTIFY_DEPTH);
        Self {
            processors: Vec::new(),
            notify_tx,
            notify_rx,
        }
    }

    /// Build an instance from its config, load any persisted settings
    /// over the initial values, and append it. Returns the instance id.
    pub fn add(&mut self, config: ProcessorConfig, host: &mut Host<'_>) -> Result<usize> {
        let id = self.processors.len();
        let mut processor = Processor::new(id, config, self.notify_tx.clone(), host.behaviors)?;
        processor.load_settings(host.settings)?;
        self.processors.push(processor);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Processor> {
        self.processors.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Processor> {
        self.processors.get_mut(id)
    }

    /// Name lookup is a linear scan; names are short and instances few.
    pub fn by_name(&self, name: &str) -> Option<&Processor> {
        self.processors.iter().find(|p| p.name() == name)
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Processor> {
        self.processors.iter_mut().find(|p| p.name() == name)
    }

    /// Fetch an instance's configuration by name, for callers that need
    /// a typed error on a miss rather than an `Option`.
    pub fn config(&self, name: &str) -> Result<&ProcessorConfig> {
        self.by_name(name)
            .map(Processor::config)
            .ok_or_else(|| Error::NotFound(format!("instance '{name}'")))
    }

    /// Visit instances in registration order, stopping at the first
    /// non-zero return and yielding it.
    pub fn for_each(&mut self, mut f: impl FnMut(&mut Processor) -> i32) -> i32 {
        for processor in &mut self.processors {
            let rc = f(processor);
            if rc != 0 {
                return rc;
            }
        }
        0
    }

    /// Receive persistent-change notifications. The channel is shared:
    /// clone-per-subscriber splits messages, so a single observer (the
    /// RPC/UI layer) is the intended shape.
    pub fn subscribe(&self) -> Receiver<SettingsChanged> {
        self.notify_rx.clone()
    }

    /// Route one input event through an instance.
    pub fn handle_event(
        &mut self,
        id: usize,
        event: InputEvent,
        now: Instant,
        host: &mut Host<'_>,
    ) -> Result<ProcessResult> {
        let processor = self
            .processors
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("processor {id}")))?;
        Ok(processor.handle_event(event, now, host))
    }

    /// Keycode listener: a key press anywhere delays pending temp-layer
    /// activations on every instance.
    pub fn note_keypress(&mut self, now: Instant) {
        for processor in &mut self.processors {
            processor.note_keypress(now);
        }
    }

    /// Position listener: a key pressed at `position` may tear down any
    /// instance's active temp layer.
    pub fn note_position_press(&mut self, position: u32, host: &mut Host<'_>) {
        for processor in &mut self.processors {
            processor.handle_position_press(position, host.keymap, host.scheduler);
        }
    }

    /// Execute one unit of due deferred work. The host calls this for
    /// every id its scheduler reports as due.
    pub fn dispatch_work(&mut self, work: WorkId, now: Instant, host: &mut Host<'_>) -> Result<()> {
        let processor = self
            .processors
            .get_mut(work.processor)
            .ok_or_else(|| Error::NotFound(format!("processor {}", work.processor)))?;
        match work.kind {
            WorkKind::TempLayerActivate => {
                processor.run_temp_layer_activate(now, host.keymap, host.scheduler);
                Ok(())
            }
            WorkKind::TempLayerDeactivate => {
                processor.run_temp_layer_deactivate(host.keymap);
                Ok(())
            }
            WorkKind::SettingsSave => processor.save_now(host.settings),
        }
    }
}
