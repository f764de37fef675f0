use crate::{
    error::RuntimeError,
    instruction::{Instruction, NextAddress},
    text,
    zmachine::ZMachine,
};

use super::{operand_values, required, store_result};

/// Address of the store byte, where a restored game picks up
fn store_address(instruction: &Instruction) -> usize {
    instruction
        .store()
        .map_or(instruction.next_address() - 1, |s| s.address())
}

pub fn save(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    if !operands.is_empty() {
        warn!(target: "app::quetzal", "Auxiliary save to table ${:04x} is not supported", operands[0]);
        store_result(zmachine, instruction, 0)?;
        return Ok(NextAddress::Address(instruction.next_address()));
    }

    let result = match zmachine.save(store_address(instruction)) {
        Ok(_) => 1,
        Err(e) => {
            warn!(target: "app::quetzal", "Save failed: {}", e);
            0
        }
    };
    store_result(zmachine, instruction, result)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn restore(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    if !operands.is_empty() {
        warn!(target: "app::quetzal", "Auxiliary restore from table ${:04x} is not supported", operands[0]);
        store_result(zmachine, instruction, 0)?;
        return Ok(NextAddress::Address(instruction.next_address()));
    }

    match zmachine.restore() {
        Ok(n) => Ok(n),
        Err(e) => {
            warn!(target: "app::quetzal", "Restore failed: {}", e);
            store_result(zmachine, instruction, 0)?;
            Ok(NextAddress::Address(instruction.next_address()))
        }
    }
}

pub fn log_shift(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = required(&operands, 0, instruction)?;
    let places = required(&operands, 1, instruction)? as i16;
    let result = match places {
        0 => value,
        1..=15 => value << places,
        -15..=-1 => value >> places.unsigned_abs(),
        _ => 0,
    };
    store_result(zmachine, instruction, result)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn art_shift(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = required(&operands, 0, instruction)? as i16;
    let places = required(&operands, 1, instruction)? as i16;
    let result = match places {
        0 => value,
        1..=15 => value << places,
        -15..=-1 => value >> places.unsigned_abs(),
        // Everything shifted out leaves only the sign
        _ if places < 0 && value < 0 => -1,
        _ => 0,
    };
    store_result(zmachine, instruction, result as u16)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn set_font(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let font = required(&operands, 0, instruction)?;
    let result = zmachine.set_font(font);
    store_result(zmachine, instruction, result)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn save_undo(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let result = match zmachine.save_undo(store_address(instruction)) {
        Ok(true) => 1,
        // Undo is disabled
        Ok(false) => 0xFFFF,
        Err(e) => {
            warn!(target: "app::quetzal", "Save undo failed: {}", e);
            0
        }
    };
    store_result(zmachine, instruction, result)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn restore_undo(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    match zmachine.restore_undo() {
        Ok(n) => Ok(n),
        Err(e) => {
            warn!(target: "app::quetzal", "Restore undo failed: {}", e);
            store_result(zmachine, instruction, 0)?;
            Ok(NextAddress::Address(instruction.next_address()))
        }
    }
}

fn unicode_zscii(c: u16) -> Option<u16> {
    char::from_u32(c as u32).and_then(text::char_to_zscii)
}

pub fn print_unicode(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let c = required(&operands, 0, instruction)?;
    let z = unicode_zscii(c).unwrap_or(b'?' as u16);
    zmachine.print(&[z])?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn check_unicode(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let c = required(&operands, 0, instruction)?;
    // Both printable and readable
    let result = if unicode_zscii(c).is_some() { 3 } else { 0 };
    store_result(zmachine, instruction, result)?;
    Ok(NextAddress::Address(instruction.next_address()))
}
