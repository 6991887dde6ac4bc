//! Linear memory backing a module instance
//!
//! A flat little-endian byte region sized in 64 KiB pages at instantiation.
//! It never grows. Every access is bounds-checked and an out-of-range access
//! is a trap.

use super::machine::Trap;

pub const PAGE_SIZE: usize = 65536;

/// Largest linear memory a 32-bit address space can hold: 4 GiB
pub const MAX_PAGES: u32 = 65536;

#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Zeroed memory of `pages` pages. Fails instead of aborting when the
    /// size is over `MAX_PAGES` or the host cannot provide it.
    pub fn new(pages: u32) -> Result<Self, Trap> {
        if pages > MAX_PAGES {
            return Err(Trap {
                message: format!("memory of {} pages exceeds the limit of {}", pages, MAX_PAGES),
            });
        }
        let too_large = || Trap {
            message: format!("cannot allocate {} pages of linear memory", pages),
        };
        let len = (pages as usize).checked_mul(PAGE_SIZE).ok_or_else(too_large)?;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len).map_err(|_| too_large())?;
        bytes.resize(len, 0);
        Ok(Self { bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn pages(&self) -> u32 {
        (self.bytes.len() / PAGE_SIZE) as u32
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn slot(&self, addr: u64, len: usize) -> Result<std::ops::Range<usize>, Trap> {
        let end = addr.checked_add(len as u64);
        match end {
            Some(end) if end <= self.bytes.len() as u64 => Ok(addr as usize..end as usize),
            _ => Err(Trap {
                message: format!(
                    "out of bounds memory access: {} bytes at 0x{:x} (memory size {})",
                    len,
                    addr,
                    self.bytes.len()
                ),
            }),
        }
    }

    pub fn load_f64(&self, addr: u64) -> Result<f64, Trap> {
        let r = self.slot(addr, 8)?;
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.bytes[r]);
        Ok(f64::from_le_bytes(b))
    }

    pub fn store_f64(&mut self, addr: u64, value: f64) -> Result<(), Trap> {
        let r = self.slot(addr, 8)?;
        self.bytes[r].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn load_i32(&self, addr: u64) -> Result<i32, Trap> {
        let r = self.slot(addr, 4)?;
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.bytes[r]);
        Ok(i32::from_le_bytes(b))
    }

    pub fn store_i32(&mut self, addr: u64, value: i32) -> Result<(), Trap> {
        let r = self.slot(addr, 4)?;
        self.bytes[r].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Read `count` consecutive f64 slots starting at `addr`
    pub fn read_f64s(&self, addr: u64, count: usize) -> Result<Vec<f64>, Trap> {
        (0..count)
            .map(|i| self.load_f64(addr.saturating_add(i as u64 * 8)))
            .collect()
    }
}
