use std::fmt;

use crate::{
    error::*,
    fatal_error,
    iff::{read_be, write_be, Chunk},
};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Story identification and saved program counter
pub struct IFhd {
    release_number: u16,
    serial_number: Vec<u8>,
    checksum: u16,
    pc: u32,
}

impl fmt::Display for IFhd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IFhd: release {}, serial ",
            self.release_number
        )?;
        for b in &self.serial_number {
            write!(f, "{}", *b as char)?;
        }
        write!(f, ", checksum {:04x}, PC ${:06x}", self.checksum, self.pc)
    }
}

impl TryFrom<&Chunk> for IFhd {
    type Error = RuntimeError;

    fn try_from(value: &Chunk) -> Result<Self, Self::Error> {
        let data = value.data();
        if data.len() < 13 {
            return fatal_error!(
                ErrorCode::Quetzal,
                "IFhd chunk should be 13 bytes, found {}",
                data.len()
            );
        }

        Ok(IFhd::new(
            read_be(&data[0..2]) as u16,
            &data[2..8],
            read_be(&data[8..10]) as u16,
            read_be(&data[10..13]) as u32,
        ))
    }
}

impl From<&IFhd> for Chunk {
    fn from(value: &IFhd) -> Self {
        let mut data = write_be(value.release_number as usize, 2);
        data.extend(&value.serial_number);
        data.extend(write_be(value.checksum as usize, 2));
        data.extend(write_be(value.pc as usize, 3));
        Chunk::new_chunk("IFhd", data)
    }
}

impl IFhd {
    pub fn new(release_number: u16, serial_number: &[u8], checksum: u16, pc: u32) -> IFhd {
        let mut serial_number = serial_number.to_vec();
        serial_number.resize(6, 0);
        IFhd {
            release_number,
            serial_number,
            checksum,
            pc: pc & 0xFFFFFF,
        }
    }

    pub fn release_number(&self) -> u16 {
        self.release_number
    }

    pub fn serial_number(&self) -> &[u8] {
        &self.serial_number
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Does this header identify the same story file as `other`?
    ///
    /// The program counter is not compared.
    pub fn same_story(&self, other: &IFhd) -> bool {
        self.release_number == other.release_number
            && self.serial_number == other.serial_number
            && self.checksum == other.checksum
    }
}
