use crate::{DEVICE_SLOTS, Device, DeviceError, FileDevice, RandomDevice, first_free};
use log::{debug, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Slot {
    driver: usize,
    id: usize,
}

struct Driver {
    name: &'static str,
    device: Box<dyn Device>,
}

/// The device multiplexer.
///
/// Slot indices are what the kernel stores in a process's handle table.
pub struct DeviceTable {
    drivers: Vec<Driver>,
    slots: [Option<Slot>; DEVICE_SLOTS],
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::with_default_drivers()
    }
}

impl DeviceTable {
    /// A table with no drivers registered.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            drivers: Vec::new(),
            slots: [None; DEVICE_SLOTS],
        }
    }

    /// A table with the `file` and `random` drivers.
    #[must_use]
    pub fn with_default_drivers() -> Self {
        let mut table = Self::empty();
        table.register("file", Box::new(FileDevice::new()));
        table.register("random", Box::new(RandomDevice::new()));
        table
    }

    /// Register `device` under `name`, replacing an earlier driver of that name.
    pub fn register(&mut self, name: &'static str, device: Box<dyn Device>) {
        if let Some(existing) = self.drivers.iter_mut().find(|d| d.name == name) {
            existing.device = device;
        } else {
            self.drivers.push(Driver { name, device });
        }
    }

    #[must_use]
    pub fn is_open(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(Option::is_some)
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Name of the driver behind `slot`.
    #[must_use]
    pub fn driver_name(&self, slot: usize) -> Option<&'static str> {
        let s = self.slots.get(slot).copied().flatten()?;
        Some(self.drivers[s.driver].name)
    }

    fn resolve(&mut self, slot: usize) -> Option<(&mut dyn Device, usize)> {
        let s = self.slots.get(slot).copied().flatten()?;
        Some((self.drivers[s.driver].device.as_mut(), s.id))
    }
}

impl Device for DeviceTable {
    fn open(&mut self, spec: &str) -> Option<usize> {
        let (name, arg) = spec.split_once(' ').unwrap_or((spec, ""));
        let Some(driver) = self.drivers.iter().position(|d| d.name == name) else {
            warn!("no driver named {name:?}");
            return None;
        };
        let Some(slot) = first_free(&self.slots) else {
            warn!("device table full, cannot open {spec:?}");
            return None;
        };
        let id = self.drivers[driver].device.open(arg)?;
        self.slots[slot] = Some(Slot { driver, id });
        debug!("opened {name} stream {id} in slot {slot}");
        Some(slot)
    }

    fn close(&mut self, slot: usize) {
        let Some(s) = self.slots.get_mut(slot).and_then(Option::take) else {
            return;
        };
        self.drivers[s.driver].device.close(s.id);
        debug!("closed slot {slot}");
    }

    fn read(&mut self, slot: usize, size: usize) -> Result<Option<Vec<u8>>, DeviceError> {
        match self.resolve(slot) {
            Some((device, id)) => device.read(id, size),
            None => Ok(Some(Vec::new())),
        }
    }

    fn seek(&mut self, slot: usize, offset: u64) -> Result<(), DeviceError> {
        match self.resolve(slot) {
            Some((device, id)) => device.seek(id, offset),
            None => Ok(()),
        }
    }

    fn write(&mut self, slot: usize, data: &[u8]) -> Result<usize, DeviceError> {
        match self.resolve(slot) {
            Some((device, id)) => device.write(id, data),
            None => Ok(0),
        }
    }
}
