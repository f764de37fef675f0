//! Object [property](https://inform-fiction.org/zmachine/standards/z1point1/sect12.html#four) tables
use crate::{
    error::*,
    recoverable_error,
    zmachine::{header::HeaderField, ZMachine},
};

use super::object_address;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A single property table entry
struct Entry {
    number: u8,
    data_address: usize,
    size: usize,
}

impl Entry {
    /// Address of the entry following this one
    fn next_address(&self) -> usize {
        self.data_address + self.size
    }
}

/// Gets the property table byte address for an object
fn property_table_address(zmachine: &ZMachine, object: usize) -> Result<usize, RuntimeError> {
    let object_address = object_address(zmachine, object)?;
    let offset = zmachine.capabilities().object_entry_size() - 2;
    Ok(zmachine.read_word(object_address + offset)? as usize)
}

/// Reads the property entry that starts at an address
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `address` - Address of the first size byte
///
/// # Returns
/// [Result] with the [Entry], [None] at the end of the table, or a [RuntimeError]
fn entry(zmachine: &ZMachine, address: usize) -> Result<Option<Entry>, RuntimeError> {
    let b = zmachine.read_byte(address)?;
    if b == 0 {
        return Ok(None);
    }

    let entry = if zmachine.version() == 3 {
        Entry {
            number: b & 0x1F,
            data_address: address + 1,
            size: (b as usize / 32) + 1,
        }
    } else if b & 0x80 == 0x80 {
        let size = zmachine.read_byte(address + 1)? as usize & 0x3F;
        Entry {
            number: b & 0x3F,
            data_address: address + 2,
            size: if size == 0 { 64 } else { size },
        }
    } else {
        Entry {
            number: b & 0x3F,
            data_address: address + 1,
            size: if b & 0x40 == 0x40 { 2 } else { 1 },
        }
    };

    Ok(Some(entry))
}

/// First property entry of an object, after the short name
fn first_entry(zmachine: &ZMachine, object: usize) -> Result<Option<Entry>, RuntimeError> {
    let table = property_table_address(zmachine, object)?;
    let name_words = zmachine.read_byte(table)? as usize;
    entry(zmachine, table + 1 + (name_words * 2))
}

/// Finds a property on an object.
///
/// Properties are stored in descending order, so the search stops at the first
/// entry numbered below `property`.
fn find(zmachine: &ZMachine, object: usize, property: u8) -> Result<Option<Entry>, RuntimeError> {
    let mut current = first_entry(zmachine, object)?;
    while let Some(e) = current {
        if e.number == property {
            return Ok(Some(e));
        } else if e.number < property {
            break;
        }
        current = entry(zmachine, e.next_address())?;
    }

    Ok(None)
}

/// Property number, checked against the largest the version allows
fn number(zmachine: &ZMachine, property: u16) -> Result<u8, RuntimeError> {
    if property as usize > zmachine.capabilities().property_defaults() {
        recoverable_error!(
            ErrorCode::InvalidObjectProperty,
            "Invalid property {}",
            property
        )
    } else {
        Ok(property as u8)
    }
}

/// Gets the byte address of an object's property data
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
/// * `property` - Property number
///
/// # Returns
/// [Result] with the byte address of the property data, 0 if the object doesn't have the property, or a [RuntimeError]
pub fn property_data_address(
    zmachine: &ZMachine,
    object: usize,
    property: u16,
) -> Result<usize, RuntimeError> {
    let property = number(zmachine, property)?;
    Ok(find(zmachine, object, property)?.map_or(0, |e| e.data_address))
}

/// Gets the length of a property's data from its data address
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `property_data_address` - Byte address of the property's data, as returned by [property_data_address]
///
/// # Returns
/// [Result] with the length in bytes, 0 when the address is 0, or a [RuntimeError]
pub fn property_length(
    zmachine: &ZMachine,
    property_data_address: usize,
) -> Result<usize, RuntimeError> {
    if property_data_address == 0 {
        return Ok(0);
    }

    let b = zmachine.read_byte(property_data_address - 1)? as usize;
    if zmachine.version() == 3 {
        Ok((b / 32) + 1)
    } else if b & 0x80 == 0x80 {
        // Second size byte of a long entry
        match b & 0x3F {
            0 => Ok(64),
            n => Ok(n),
        }
    } else if b & 0x40 == 0x40 {
        Ok(2)
    } else {
        Ok(1)
    }
}

/// Gets the encoded text of an object's short name
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
///
/// # Returns
/// [Result] with the encoded text words or a [RuntimeError]
pub fn short_name(zmachine: &ZMachine, object: usize) -> Result<Vec<u16>, RuntimeError> {
    let table = property_table_address(zmachine, object)?;
    let name_words = zmachine.read_byte(table)? as usize;
    (0..name_words)
        .map(|i| zmachine.read_word(table + 1 + (i * 2)))
        .collect()
}

fn default_property(zmachine: &ZMachine, property: u8) -> Result<u16, RuntimeError> {
    if property == 0 || property as usize > zmachine.capabilities().property_defaults() {
        return recoverable_error!(
            ErrorCode::InvalidObjectProperty,
            "No default value for property {}",
            property
        );
    }

    let table = zmachine.header_word(HeaderField::ObjectTable)? as usize;
    zmachine.read_word(table + ((property as usize - 1) * 2))
}

/// Gets the value of a property for an object, or the property default if
/// the object doesn't have it
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
/// * `property` - Property number
///
/// # Returns
/// [Result] with the property value or a [RuntimeError]
pub fn property(zmachine: &ZMachine, object: usize, property: u16) -> Result<u16, RuntimeError> {
    let property = number(zmachine, property)?;
    match find(zmachine, object, property)? {
        None => default_property(zmachine, property),
        Some(e) if e.size == 1 => Ok(zmachine.read_byte(e.data_address)? as u16),
        Some(e) if e.size == 2 => zmachine.read_word(e.data_address),
        Some(e) => recoverable_error!(
            ErrorCode::InvalidObjectPropertySize,
            "Read of property {} on object {} with size {}",
            property,
            object,
            e.size
        ),
    }
}

/// Gets the number of the property after `property` on an object.
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
/// * `property` - Property number, 0 for the first property
///
/// # Returns
/// [Result] with the next property number, 0 after the last property, or a [RuntimeError]
pub fn next_property(zmachine: &ZMachine, object: usize, property: u16) -> Result<u8, RuntimeError> {
    let property = number(zmachine, property)?;
    let next = if property == 0 {
        first_entry(zmachine, object)?
    } else {
        match find(zmachine, object, property)? {
            Some(e) => entry(zmachine, e.next_address())?,
            None => {
                return recoverable_error!(
                    ErrorCode::InvalidObjectProperty,
                    "Object {} does not have property {}",
                    object,
                    property
                )
            }
        }
    };

    Ok(next.map_or(0, |e| e.number))
}

/// Sets the value of a property on an object.
///
/// The property must exist and hold a byte or a word.
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
/// * `property` - Property number
/// * `value` - Value to set, truncated to a byte for 1-byte properties
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn set_property(
    zmachine: &mut ZMachine,
    object: usize,
    property: u16,
    value: u16,
) -> Result<(), RuntimeError> {
    let property = number(zmachine, property)?;
    match find(zmachine, object, property)? {
        None => recoverable_error!(
            ErrorCode::InvalidObjectProperty,
            "Object {} does not have property {}",
            object,
            property
        ),
        Some(e) if e.size == 1 => zmachine.write_byte(e.data_address, value as u8),
        Some(e) if e.size == 2 => zmachine.write_word(e.data_address, value),
        Some(e) => recoverable_error!(
            ErrorCode::InvalidObjectPropertySize,
            "Object {} property {} has size {}, not a byte or a word",
            object,
            property,
            e.size
        ),
    }
}
