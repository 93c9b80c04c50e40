//! Fixed-capacity device registry.

use crate::error::DeviceError;

/// Fixed-capacity table of devices owned by one manager.
///
/// Registration scans for the first free slot and assigns the slot index as
/// the device id; a full table rejects the registration. Written only during
/// start-up, read by the owning manager thereafter.
pub struct Registry<D> {
    class: &'static str,
    slots: Vec<Option<D>>,
}

impl<D> Registry<D> {
    /// A registry of `capacity` slots for devices of the named class.
    pub fn new(class: &'static str, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { class, slots }
    }

    /// Registers a device; returns its assigned id.
    pub fn register(&mut self, dev: D) -> Result<u8, DeviceError> {
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(dev);
                return Ok(idx as u8);
            }
        }
        Err(DeviceError::RegistryFull(self.class))
    }

    /// The device in slot `id`.
    pub fn get(&self, id: u8) -> Option<&D> {
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    /// The device in slot `id`, mutable.
    pub fn get_mut(&mut self, id: u8) -> Option<&mut D> {
        self.slots.get_mut(id as usize).and_then(Option::as_mut)
    }

    /// Occupied slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &D)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|dev| (idx as u8, dev)))
    }

    /// Occupied slots in id order, mutable.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u8, &mut D)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_mut().map(|dev| (idx as u8, dev)))
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether no device is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slot capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
