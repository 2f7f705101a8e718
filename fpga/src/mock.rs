//! Host side stand-ins for the register bus and delay.
extern crate std;

use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use super::{Read, RegisterBus, Write};

/// Register bus recording all writes and serving scripted reads.
///
/// Reads of an address first drain its queue, then return its fixed value
/// (zero by default).
#[derive(Clone, Debug, Default)]
pub struct MockBus {
    writes: Vec<(u16, u16)>,
    reads: Vec<u16>,
    queued: BTreeMap<u16, VecDeque<u16>>,
    fixed: BTreeMap<u16, u16>,
}

impl MockBus {
    /// Append values to be returned by successive reads.
    pub fn queue(&mut self, reg: Read, values: impl IntoIterator<Item = u16>) {
        self.queued.entry(reg.into()).or_default().extend(values);
    }

    /// Value returned once the queue is drained.
    pub fn set(&mut self, reg: Read, value: u16) {
        self.fixed.insert(reg.into(), value);
    }

    /// All `(address, value)` writes in order.
    pub fn writes(&self) -> &[(u16, u16)] {
        &self.writes
    }

    /// Values written to one register in order.
    pub fn writes_to(&self, reg: Write) -> Vec<u16> {
        let addr: u16 = reg.into();
        self.writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Number of reads of a register.
    pub fn reads_of(&self, reg: Read) -> usize {
        let addr: u16 = reg.into();
        self.reads.iter().filter(|&&a| a == addr).count()
    }

    /// Forget recorded accesses. Scripted reads are kept.
    pub fn clear(&mut self) {
        self.writes.clear();
        self.reads.clear();
    }
}

impl RegisterBus for MockBus {
    fn write(&mut self, addr: u16, value: u16) {
        self.writes.push((addr, value));
    }

    fn read(&mut self, addr: u16) -> u16 {
        self.reads.push(addr);
        self.queued
            .get_mut(&addr)
            .and_then(|q| q.pop_front())
            .or_else(|| self.fixed.get(&addr).copied())
            .unwrap_or(0)
    }
}

/// Delay that returns immediately and accumulates the requested time.
#[derive(Copy, Clone, Debug, Default)]
pub struct MockDelay {
    elapsed_ns: u64,
}

impl MockDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}
