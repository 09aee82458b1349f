//! Input mapping
//!
//! Maps host logical buttons to engine key bits. The table for a device
//! family is fixed; its order is the host contract's button order.

use crate::keys::{GbKeys, GbaKeys, InputSnapshot};
use gb_core::{DeviceFamily, Engine, InputModel};

const GB_BUTTON_MAPPING: [u32; 8] = [
    GbKeys::UP.bits(),
    GbKeys::DOWN.bits(),
    GbKeys::LEFT.bits(),
    GbKeys::RIGHT.bits(),
    GbKeys::A.bits(),
    GbKeys::B.bits(),
    GbKeys::SELECT.bits(),
    GbKeys::START.bits(),
];

const GBA_BUTTON_MAPPING: [u32; 10] = [
    GbaKeys::UP.bits(),
    GbaKeys::DOWN.bits(),
    GbaKeys::LEFT.bits(),
    GbaKeys::RIGHT.bits(),
    GbaKeys::A.bits(),
    GbaKeys::B.bits(),
    GbaKeys::SELECT.bits(),
    GbaKeys::START.bits(),
    GbaKeys::L.bits(),
    GbaKeys::R.bits(),
];

/// Button index to engine key bit table for a family
pub fn button_table(family: DeviceFamily) -> &'static [u32] {
    match family {
        DeviceFamily::GameBoy => &GB_BUTTON_MAPPING,
        DeviceFamily::GameBoyAdvance => &GBA_BUTTON_MAPPING,
    }
}

/// Translates host input into engine key state
#[derive(Debug, Clone, Copy)]
pub struct InputMapper {
    family: DeviceFamily,
    model: InputModel,
    table: &'static [u32],
}

impl InputMapper {
    pub fn new(family: DeviceFamily, model: InputModel) -> Self {
        Self {
            family,
            model,
            table: button_table(family),
        }
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn model(&self) -> InputModel {
        self.model
    }

    /// Engine key mask for a snapshot; bits past the family's buttons are ignored
    pub fn translate(&self, snapshot: InputSnapshot) -> u32 {
        self.table
            .iter()
            .enumerate()
            .filter(|(button, _)| snapshot.buttons & (1 << button) != 0)
            .fold(0, |keys, (_, key)| keys | key)
    }

    /// Engine key bit for one logical button
    ///
    /// Panics if the family has no such button.
    pub fn key_for(&self, button: usize) -> u32 {
        match self.table.get(button) {
            Some(&key) => key,
            None => panic!(
                "button {} does not exist on {:?} ({} buttons)",
                button,
                self.family,
                self.table.len()
            ),
        }
    }

    /// Replace the engine's whole key state with one snapshot
    pub fn apply_snapshot<E: Engine + ?Sized>(&self, engine: &mut E, snapshot: InputSnapshot) {
        assert_eq!(
            self.model,
            InputModel::FullState,
            "snapshot delivered to a session negotiated for edge events"
        );
        let keys = self.translate(snapshot);
        tracing::trace!("keys 0x{:03x}", keys);
        engine.set_keys(keys);
    }

    /// Set exactly one key bit
    pub fn button_pressed<E: Engine + ?Sized>(&self, engine: &mut E, button: usize) {
        self.assert_edge_model();
        engine.add_keys(self.key_for(button));
    }

    /// Clear exactly one key bit
    pub fn button_released<E: Engine + ?Sized>(&self, engine: &mut E, button: usize) {
        self.assert_edge_model();
        engine.clear_keys(self.key_for(button));
    }

    fn assert_edge_model(&self) {
        assert_eq!(
            self.model,
            InputModel::EdgeEvents,
            "edge event delivered to a session negotiated for full-state snapshots"
        );
    }
}
