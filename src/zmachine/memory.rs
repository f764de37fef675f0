//! The story's memory image.
//!
//! Everything below the static mark is writable. A pristine copy of that region is
//! kept for the checksum, for restart and for the XOR-RLE save encoding.
use std::fmt;

use crate::{error::*, fatal_error};

pub struct Memory {
    map: Vec<u8>,
    static_mark: usize,
    /// Length covered by the checksum
    file_length: usize,
    /// Dynamic memory as loaded
    dynamic: Vec<u8>,
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Memory: {} bytes, static @ ${:04x}",
            self.map.len(),
            self.static_mark
        )
    }
}

/// Big-endian word from two bytes
pub fn word_value(hb: u8, lb: u8) -> u16 {
    ((hb as u16) << 8) | lb as u16
}

/// `(high, low)` bytes of a word
pub fn byte_values(w: u16) -> (u8, u8) {
    ((w >> 8) as u8, w as u8)
}

/// The header stores the file length divided by this
fn length_scale(version: u8) -> usize {
    match version {
        1..=3 => 2,
        4 | 5 => 4,
        _ => 8,
    }
}

impl TryFrom<Vec<u8>> for Memory {
    type Error = RuntimeError;

    fn try_from(map: Vec<u8>) -> Result<Self, Self::Error> {
        if map.len() < 64 {
            return fatal_error!(
                ErrorCode::HeaderTooShort,
                "Story file is {} bytes, the header alone is 64",
                map.len()
            );
        }

        let static_mark = word_value(map[0x0e], map[0x0f]) as usize;
        if static_mark < 64 || static_mark > map.len() {
            return fatal_error!(
                ErrorCode::InvalidFile,
                "Static memory mark ${:04x} is outside the story file ({} bytes)",
                static_mark,
                map.len()
            );
        }

        Ok(Memory::new(map))
    }
}

impl Memory {
    /// Wrap a story image without validating it. Loading goes through `try_from`.
    pub fn new(map: Vec<u8>) -> Memory {
        let version = map[0];
        let static_mark = usize::min(word_value(map[0x0e], map[0x0f]) as usize, map.len());
        let header_length = word_value(map[0x1a], map[0x1b]) as usize * length_scale(version);
        // Some older files leave the length word unset
        let file_length = if header_length == 0 || header_length > map.len() {
            map.len()
        } else {
            header_length
        };

        let dynamic = map[0..static_mark].to_vec();
        Memory {
            static_mark,
            file_length,
            map,
            dynamic,
        }
    }

    pub fn static_mark(&self) -> usize {
        self.static_mark
    }

    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Copy of `length` bytes from `start`, cut short at the end of memory
    pub fn slice(&self, start: usize, length: usize) -> Vec<u8> {
        let start = usize::min(start, self.map.len());
        let end = usize::min(start + length, self.map.len());
        self.map[start..end].to_vec()
    }

    /// Sum of the bytes from 0x40 to the file length, taken over the story as loaded
    pub fn checksum(&self) -> u16 {
        let mut checksum: u16 = 0;
        for i in 0x40..self.file_length {
            let b = if i < self.dynamic.len() {
                self.dynamic[i]
            } else {
                self.map[i]
            };
            checksum = checksum.wrapping_add(b as u16);
        }

        checksum
    }

    pub fn read_byte(&self, address: usize) -> Result<u8, RuntimeError> {
        if address < self.map.len() {
            Ok(self.map[address])
        } else {
            fatal_error!(
                ErrorCode::InvalidAddress,
                "Byte address {:#06x} beyond end of memory ({:#06x})",
                address,
                self.map.len() - 1
            )
        }
    }

    pub fn read_word(&self, address: usize) -> Result<u16, RuntimeError> {
        if address + 1 < self.map.len() {
            Ok(word_value(self.map[address], self.map[address + 1]))
        } else {
            fatal_error!(
                ErrorCode::InvalidAddress,
                "Word address {:#06x} beyond end of memory ({:#06x})",
                address,
                self.map.len() - 1
            )
        }
    }

    /// Writes at or above the static mark fail with `IllegalMemoryAccess`
    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), RuntimeError> {
        if address < self.static_mark {
            debug!(target: "app::state", "Write {:#04x} to ${:04x}", value, address);
            self.map[address] = value;
            Ok(())
        } else {
            fatal_error!(
                ErrorCode::IllegalMemoryAccess,
                "Byte write to ${:04x}, static memory starts at ${:04x}",
                address,
                self.static_mark
            )
        }
    }

    /// Both bytes must lie below the static mark, otherwise nothing is written
    pub fn write_word(&mut self, address: usize, value: u16) -> Result<(), RuntimeError> {
        if address + 1 < self.static_mark {
            debug!(target: "app::state", "Write {:#06x} to ${:04x}", value, address);
            let (hb, lb) = byte_values(value);
            self.map[address] = hb;
            self.map[address + 1] = lb;
            Ok(())
        } else {
            fatal_error!(
                ErrorCode::IllegalMemoryAccess,
                "Word write to ${:04x}, static memory starts at ${:04x}",
                address,
                self.static_mark
            )
        }
    }

    /// Current contents of dynamic memory
    pub fn dynamic(&self) -> &[u8] {
        &self.map[..self.static_mark]
    }

    /// CMem encoding of dynamic memory.
    ///
    /// Bytes are XORed against the loaded image. A zero byte is followed by the number of
    /// further zeros (up to 255), and unchanged bytes at the end are left out.
    pub fn compress(&self) -> Vec<u8> {
        let mut cdata = Vec::new();
        let mut zeros = 0;
        for (current, original) in self.map.iter().zip(self.dynamic.iter()) {
            match current ^ original {
                0 if zeros == 255 => {
                    cdata.extend_from_slice(&[0, 255]);
                    zeros = 0;
                }
                0 => zeros += 1,
                b => {
                    if zeros > 0 {
                        cdata.extend_from_slice(&[0, zeros - 1]);
                        zeros = 0;
                    }
                    cdata.push(b);
                }
            }
        }

        cdata
    }

    /// Expand CMem data into a full dynamic memory image. Memory is not modified.
    pub fn decompress(&self, cdata: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        let size = self.dynamic.len();
        let mut data = Vec::with_capacity(size);
        let mut bytes = cdata.iter();

        while let Some(&b) = bytes.next() {
            let at = data.len();
            if b == 0 {
                let Some(&count) = bytes.next() else {
                    return fatal_error!(
                        ErrorCode::Quetzal,
                        "Compressed memory ends inside a run of unchanged bytes"
                    );
                };
                let end = at + count as usize + 1;
                if end > size {
                    return fatal_error!(
                        ErrorCode::Quetzal,
                        "Compressed memory expands past dynamic memory (${:04x})",
                        size
                    );
                }
                data.extend_from_slice(&self.dynamic[at..end]);
            } else if at < size {
                data.push(b ^ self.dynamic[at]);
            } else {
                return fatal_error!(
                    ErrorCode::Quetzal,
                    "Compressed memory expands past dynamic memory (${:04x})",
                    size
                );
            }
        }

        let at = data.len();
        data.extend_from_slice(&self.dynamic[at..]);
        Ok(data)
    }

    pub fn reset(&mut self) {
        let l = self.dynamic.len();
        self.map[..l].copy_from_slice(&self.dynamic)
    }

    /// Overwrite dynamic memory with `data`, which must be exactly the dynamic size
    pub fn restore(&mut self, data: &[u8]) -> Result<(), RuntimeError> {
        if data.len() != self.dynamic.len() {
            fatal_error!(
                ErrorCode::Restore,
                "Restore dynamic memory size doesn't match: {:04x} != {:04x}",
                self.dynamic.len(),
                data.len()
            )
        } else {
            self.map[..data.len()].copy_from_slice(data);
            Ok(())
        }
    }
}
