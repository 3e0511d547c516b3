//! Memory handling for the NIC simulator.
//!
//! This module consists of:
//! - [`Mem`]: The memory, 256 cells of 4 bits each.
//! - [`RegFile`]: The register file, 16 registers of 8 bits each.
//!
//! All addressing wraps around the end of memory,
//! so a byte read at `0xff` takes its low nibble from address `0x00`.

use crate::ast::Reg;

const N_CELLS: usize = 256;

/// Memory.
///
/// Each of the 256 cells holds a 4-bit block (stored in the low bits of a `u8`).
/// Bytes are stored across two cells, high nibble first,
/// and instruction words across four.
///
/// ```
/// use nic_ensemble::sim::mem::Mem;
///
/// let mut mem = Mem::new();
/// mem.write_byte(0x10, 0xA5);
/// assert_eq!(mem.get_raw(0x10), 0xA);
/// assert_eq!(mem.get_raw(0x11), 0x5);
/// assert_eq!(mem.read_byte(0x10), 0xA5);
/// assert_eq!(mem.read_word(0x10), 0xA500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mem {
    data: Box<[u8; N_CELLS]>,
}
impl Mem {
    /// Creates a new, zeroed memory.
    pub fn new() -> Self {
        Self { data: Box::new([0; N_CELLS]) }
    }

    /// Gets the 4-bit block at the given address.
    pub fn get_raw(&self, addr: u8) -> u8 {
        self.data[usize::from(addr)]
    }

    /// Sets the 4-bit block at the given address.
    ///
    /// Only the low 4 bits of `value` are kept.
    pub fn set_raw(&mut self, addr: u8, value: u8) {
        self.data[usize::from(addr)] = value & 0xF;
    }

    /// Reads the byte stored at `addr` and `addr + 1`.
    pub fn read_byte(&self, addr: u8) -> u8 {
        (self.get_raw(addr) << 4) | self.get_raw(addr.wrapping_add(1))
    }

    /// Writes a byte into `addr` and `addr + 1`.
    pub fn write_byte(&mut self, addr: u8, value: u8) {
        self.set_raw(addr, value >> 4);
        self.set_raw(addr.wrapping_add(1), value & 0xF);
    }

    /// Reads the 16-bit instruction word stored at `addr` through `addr + 3`.
    pub fn read_word(&self, addr: u8) -> u16 {
        (0..4).fold(0, |word, i| (word << 4) | u16::from(self.get_raw(addr.wrapping_add(i))))
    }

    /// Copies an image of 4-bit blocks into memory, starting at address 0.
    ///
    /// Blocks past the end of memory are ignored.
    pub fn copy_image(&mut self, image: &[u8]) {
        for (cell, &block) in self.data.iter_mut().zip(image) {
            *cell = block & 0xF;
        }
    }

    /// Zeroes every cell.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Views the memory as a slice of blocks.
    pub fn as_slice(&self) -> &[u8] {
        &*self.data
    }
}
impl Default for Mem {
    fn default() -> Self {
        Self::new()
    }
}

/// The register file.
///
/// This struct can be indexed with a [`Reg`].
///
/// # Example
///
/// ```
/// use nic_ensemble::sim::mem::RegFile;
/// use nic_ensemble::ast::reg_consts::R2;
///
/// let mut reg = RegFile::new();
/// reg[R2] = 0xFE;
/// assert_eq!(reg[R2] as i8, -2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegFile([u8; Reg::COUNT]);
impl RegFile {
    /// Creates a register file with every register set to zero.
    pub fn new() -> Self {
        Self([0; Reg::COUNT])
    }

    /// Views the registers as an array.
    pub fn as_array(&self) -> &[u8; Reg::COUNT] {
        &self.0
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = u8;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{R1, R15};

    use super::{Mem, RegFile};

    #[test]
    fn test_wrapping_access() {
        let mut mem = Mem::new();
        mem.write_byte(0xFF, 0x3C);
        assert_eq!(mem.get_raw(0xFF), 0x3);
        assert_eq!(mem.get_raw(0x00), 0xC);
        assert_eq!(mem.read_byte(0xFF), 0x3C);

        mem.copy_image(&[0xF, 0x1]);
        mem.set_raw(0xFE, 0x7);
        assert_eq!(mem.read_word(0xFE), 0x73F1);
    }

    #[test]
    fn test_set_raw_masks() {
        let mut mem = Mem::new();
        mem.set_raw(4, 0xAB);
        assert_eq!(mem.get_raw(4), 0xB);
    }

    #[test]
    fn test_copy_image_and_clear() {
        let mut mem = Mem::new();
        let image: Vec<u8> = (0..300).map(|i| (i % 16) as u8).collect();
        mem.copy_image(&image);
        assert_eq!(mem.as_slice(), &image[..256]);

        mem.clear();
        assert!(mem.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reg_file() {
        let mut regs = RegFile::new();
        regs[R1] = 7;
        regs[R15] = regs[R1].wrapping_mul(40);
        assert_eq!(regs.as_array()[15], 24);
        assert_eq!(regs.as_array().iter().filter(|&&r| r != 0).count(), 2);
    }
}
