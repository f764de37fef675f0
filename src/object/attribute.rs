//! Object [attribute](https://inform-fiction.org/zmachine/standards/z1point1/sect12.html#three) flags
use crate::{error::*, recoverable_error, zmachine::ZMachine};

use super::object_address;

/// Locate the attribute byte and bit mask for an attribute
///
/// # Arguments
/// * `zmachine` - Reference to the zmachine
/// * `object` - Object number
/// * `attribute` - Attribute number, 0 is the most significant bit of the first byte
///
/// # Returns
/// [Result] with (byte address, mask) or a [RuntimeError]
fn locate(zmachine: &ZMachine, object: usize, attribute: u16) -> Result<(usize, u8), RuntimeError> {
    let object_address = object_address(zmachine, object)?;
    if attribute >= zmachine.capabilities().attributes() as u16 {
        return recoverable_error!(
            ErrorCode::InvalidObjectAttribute,
            "Invalid attribute {} on object {}",
            attribute,
            object
        );
    }

    Ok((
        object_address + (attribute as usize / 8),
        0x80 >> (attribute % 8),
    ))
}

/// Tests an attribute
///
/// # Returns
/// [Result] with the state of the attribute or a [RuntimeError]
pub fn value(zmachine: &ZMachine, object: usize, attribute: u16) -> Result<bool, RuntimeError> {
    let (address, mask) = locate(zmachine, object, attribute)?;
    Ok(zmachine.read_byte(address)? & mask == mask)
}

pub fn set(zmachine: &mut ZMachine, object: usize, attribute: u16) -> Result<(), RuntimeError> {
    let (address, mask) = locate(zmachine, object, attribute)?;
    let b = zmachine.read_byte(address)?;
    debug!(target: "app::object", "Set attribute {} on {}", attribute, object);
    zmachine.write_byte(address, b | mask)
}

pub fn clear(zmachine: &mut ZMachine, object: usize, attribute: u16) -> Result<(), RuntimeError> {
    let (address, mask) = locate(zmachine, object, attribute)?;
    let b = zmachine.read_byte(address)?;
    debug!(target: "app::object", "Clear attribute {} on {}", attribute, object);
    zmachine.write_byte(address, b & !mask)
}
