//! Client identity registry.
//!
//! A fixed table of [`MAX_CLIENTS`] slots. The slot index is stable for the
//! lifetime of a connection and doubles as the position of its socket in the
//! connection loop, so frames are addressed by slot index.

use carlink_core::alias;
use parking_lot::RwLock;
use std::fmt;

/// Number of client slots.
pub const MAX_CLIENTS: usize = 5;

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSlot {
    /// Slot index.
    pub index: usize,
    /// Peer IP address, empty while unoccupied.
    pub address: String,
    /// Registered alias, [`alias::UNASSIGNED`] until REGISTER succeeds.
    pub alias: u8,
    /// Whether a connection holds this slot.
    pub occupied: bool,
}

impl ClientSlot {
    fn vacant(index: usize) -> Self {
        Self {
            index,
            address: String::new(),
            alias: alias::UNASSIGNED,
            occupied: false,
        }
    }

    fn reset(&mut self) {
        *self = Self::vacant(self.index);
    }

    /// Returns true if the slot is occupied and has registered an alias.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.occupied && self.alias != alias::UNASSIGNED
    }
}

impl fmt::Display for ClientSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.occupied {
            return write!(f, "{}    No Connection", self.index);
        }
        write!(f, "{}    {:<20}", self.index, self.address)?;
        if self.alias == alias::UNASSIGNED {
            write!(f, "Undefined")
        } else {
            write!(f, "0x{:02X}", self.alias)
        }
    }
}

/// Fixed-capacity table mapping slot index, peer address and alias.
///
/// Lookups scan the table linearly.
pub struct ClientRegistry {
    slots: RwLock<[ClientSlot; MAX_CLIENTS]>,
}

impl ClientRegistry {
    /// Creates a registry with every slot vacant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(std::array::from_fn(ClientSlot::vacant)),
        }
    }

    /// Returns the index of the first unoccupied slot.
    #[must_use]
    pub fn find_free_slot(&self) -> Option<usize> {
        self.slots.read().iter().position(|slot| !slot.occupied)
    }

    /// Marks a slot occupied by a connection from `address`.
    ///
    /// Out-of-range indices are ignored.
    pub fn occupy(&self, index: usize, address: &str) {
        if let Some(slot) = self.slots.write().get_mut(index) {
            slot.occupied = true;
            slot.address = address.to_string();
        }
    }

    /// Assigns `new_alias` to the slot at `index`.
    ///
    /// Fails without touching the table if the slot is out of range or
    /// unoccupied, the alias is the unassigned sentinel or in the server
    /// band, or another occupied slot already holds it.
    pub fn assign_alias(&self, index: usize, new_alias: u8) -> bool {
        if !alias::is_assignable(new_alias) {
            return false;
        }

        let mut slots = self.slots.write();
        match slots.get(index) {
            Some(slot) if slot.occupied => {}
            _ => return false,
        }

        let taken = slots
            .iter()
            .any(|slot| slot.occupied && slot.index != index && slot.alias == new_alias);
        if taken {
            return false;
        }

        slots[index].alias = new_alias;
        true
    }

    /// Resets a slot to its vacant state. Idempotent.
    pub fn release(&self, index: usize) {
        if let Some(slot) = self.slots.write().get_mut(index) {
            slot.reset();
        }
    }

    /// Returns the first occupied slot connected from `address`.
    #[must_use]
    pub fn find_by_address(&self, address: &str) -> Option<usize> {
        self.slots
            .read()
            .iter()
            .position(|slot| slot.occupied && slot.address == address)
    }

    /// Returns the first occupied slot registered as `alias`.
    #[must_use]
    pub fn find_by_alias(&self, alias: u8) -> Option<usize> {
        if alias == alias::UNASSIGNED {
            return None;
        }
        self.slots
            .read()
            .iter()
            .position(|slot| slot.occupied && slot.alias == alias)
    }

    /// Returns the alias of the slot at `index`, or [`alias::UNASSIGNED`] if
    /// the index is out of range.
    #[must_use]
    pub fn alias_of(&self, index: usize) -> u8 {
        self.slots
            .read()
            .get(index)
            .map_or(alias::UNASSIGNED, |slot| slot.alias)
    }

    /// Returns the alias of the client connected from `address`.
    #[must_use]
    pub fn alias_of_address(&self, address: &str) -> u8 {
        self.slots
            .read()
            .iter()
            .find(|slot| slot.occupied && slot.address == address)
            .map_or(alias::UNASSIGNED, |slot| slot.alias)
    }

    /// Returns the indices of all occupied slots.
    #[must_use]
    pub fn occupied_slots(&self) -> Vec<usize> {
        self.slots
            .read()
            .iter()
            .filter(|slot| slot.occupied)
            .map(|slot| slot.index)
            .collect()
    }

    /// Returns the alias of every slot, occupied or not.
    #[must_use]
    pub fn aliases(&self) -> [u8; MAX_CLIENTS] {
        let slots = self.slots.read();
        std::array::from_fn(|index| slots[index].alias)
    }

    /// Returns a copy of the slot table.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ClientSlot> {
        self.slots.read().to_vec()
    }

    /// Returns the number of occupied slots.
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.read().iter().filter(|slot| slot.occupied).count()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
