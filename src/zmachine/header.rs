//! Story file header: field offsets, flag bits and accessors
use crate::error::RuntimeError;

use super::memory::Memory;

#[derive(Clone, Copy, Debug)]
pub enum HeaderField {
    Version = 0x00,
    Flags1 = 0x01,
    Release = 0x02,
    HighMark = 0x04,
    InitialPC = 0x06,
    Dictionary = 0x08,
    ObjectTable = 0x0A,
    GlobalTable = 0x0C,
    StaticMark = 0x0E,
    Flags2 = 0x10,
    Serial = 0x12,
    AbbreviationsTable = 0x18,
    FileLength = 0x1A,
    Checksum = 0x1C,
    InterpreterNumber = 0x1E,
    InterpreterVersion = 0x1F,
    ScreenLines = 0x20,
    ScreenColumns = 0x21,
    ScreenWidth = 0x22,
    ScreenHeight = 0x24,
    FontWidth = 0x26,
    FontHeight = 0x27,
    DefaultBackground = 0x2C,
    DefaultForeground = 0x2D,
    TerminatorTable = 0x2E,
    Revision = 0x32,
    AlphabetTable = 0x34,
    ExtensionTable = 0x36,
}

/// Flags 1 bits for version 3 stories
pub mod flags1_v3 {
    pub const STATUS_LINE_TIME: u8 = 1 << 1;
    pub const STATUS_LINE_UNAVAILABLE: u8 = 1 << 4;
    pub const SCREEN_SPLIT: u8 = 1 << 5;
    pub const VARIABLE_PITCH: u8 = 1 << 6;
}

/// Flags 1 bits from version 4 on
pub mod flags1_v4 {
    pub const COLOURS: u8 = 1 << 0;
    pub const PICTURES: u8 = 1 << 1;
    pub const BOLD: u8 = 1 << 2;
    pub const ITALIC: u8 = 1 << 3;
    pub const FIXED_SPACE: u8 = 1 << 4;
    pub const SOUND: u8 = 1 << 5;
    pub const TIMED_INPUT: u8 = 1 << 7;
}

/// Flags 2 bits
pub mod flags2 {
    pub const TRANSCRIPTING: u16 = 1 << 0;
    pub const FIXED_PITCH: u16 = 1 << 1;
    pub const PICTURES: u16 = 1 << 3;
    pub const UNDO: u16 = 1 << 4;
    pub const MOUSE: u16 = 1 << 5;
    pub const COLOURS: u16 = 1 << 6;
    pub const SOUND: u16 = 1 << 7;
}

pub fn field_byte(memory: &Memory, field: HeaderField) -> Result<u8, RuntimeError> {
    memory.read_byte(field as usize)
}

pub fn field_word(memory: &Memory, field: HeaderField) -> Result<u16, RuntimeError> {
    memory.read_word(field as usize)
}

pub fn set_byte(memory: &mut Memory, field: HeaderField, value: u8) -> Result<(), RuntimeError> {
    memory.write_byte(field as usize, value)
}

pub fn set_word(memory: &mut Memory, field: HeaderField, value: u16) -> Result<(), RuntimeError> {
    memory.write_word(field as usize, value)
}

/// True if any bit of `mask` is set in Flags 1
pub fn has_flags1(memory: &Memory, mask: u8) -> Result<bool, RuntimeError> {
    Ok(field_byte(memory, HeaderField::Flags1)? & mask != 0)
}

pub fn has_flags2(memory: &Memory, mask: u16) -> Result<bool, RuntimeError> {
    Ok(field_word(memory, HeaderField::Flags2)? & mask != 0)
}

/// Set the `on` bits and then clear the `off` bits of Flags 1
pub fn update_flags1(memory: &mut Memory, on: u8, off: u8) -> Result<(), RuntimeError> {
    let old = field_byte(memory, HeaderField::Flags1)?;
    let new = (old | on) & !off;
    debug!(target: "app::state", "Flags 1: {:08b} -> {:08b}", old, new);
    set_byte(memory, HeaderField::Flags1, new)
}

/// Set the `on` bits and then clear the `off` bits of Flags 2
pub fn update_flags2(memory: &mut Memory, on: u16, off: u16) -> Result<(), RuntimeError> {
    let old = field_word(memory, HeaderField::Flags2)?;
    let new = (old | on) & !off;
    debug!(target: "app::state", "Flags 2: {:016b} -> {:016b}", old, new);
    set_word(memory, HeaderField::Flags2, new)
}

pub fn serial(memory: &Memory) -> Vec<u8> {
    memory.slice(HeaderField::Serial as usize, 6)
}
