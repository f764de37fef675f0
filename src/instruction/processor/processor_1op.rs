use crate::{
    error::RuntimeError,
    instruction::{Instruction, NextAddress},
    object::{self, property},
    text,
    zmachine::ZMachine,
};

use super::{branch, call_fn, operand_values, required, store_result, variable_number};

/// Common shape: one operand, required
fn operand(zmachine: &mut ZMachine, instruction: &Instruction) -> Result<u16, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    required(&operands, 0, instruction)
}

pub fn jz(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let value = operand(zmachine, instruction)?;
    branch(zmachine, instruction, value == 0)
}

pub fn get_sibling(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let object = operand(zmachine, instruction)?;
    let sibling = object::sibling(zmachine, object as usize)?;
    store_result(zmachine, instruction, sibling as u16)?;
    branch(zmachine, instruction, sibling != 0)
}

pub fn get_child(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let object = operand(zmachine, instruction)?;
    let child = object::child(zmachine, object as usize)?;
    store_result(zmachine, instruction, child as u16)?;
    branch(zmachine, instruction, child != 0)
}

pub fn get_parent(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let object = operand(zmachine, instruction)?;
    let parent = object::parent(zmachine, object as usize)?;
    store_result(zmachine, instruction, parent as u16)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn get_prop_len(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let address = operand(zmachine, instruction)?;
    let len = property::property_length(zmachine, address as usize)?;
    store_result(zmachine, instruction, len as u16)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn inc(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let variable = variable_number(operand(zmachine, instruction)?, instruction)?;
    let value = zmachine.peek_variable(variable)? as i16;
    zmachine.set_variable_indirect(variable, value.wrapping_add(1) as u16)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn dec(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let variable = variable_number(operand(zmachine, instruction)?, instruction)?;
    let value = zmachine.peek_variable(variable)? as i16;
    zmachine.set_variable_indirect(variable, value.wrapping_sub(1) as u16)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn print_addr(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let address = operand(zmachine, instruction)?;
    let text = text::as_text(zmachine, address as usize, false)?;
    zmachine.print(&text)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn call_1s(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let address = operand(zmachine, instruction)?;
    call_fn(zmachine, instruction, address, &[])
}

pub fn remove_obj(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let object = operand(zmachine, instruction)?;
    object::remove(zmachine, object as usize)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn print_obj(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let object = operand(zmachine, instruction)?;
    let ztext = property::short_name(zmachine, object as usize)?;
    let text = text::from_vec(zmachine, &ztext, false)?;
    zmachine.print(&text)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn ret(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let value = operand(zmachine, instruction)?;
    zmachine.return_routine(value)
}

pub fn jump(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let offset = operand(zmachine, instruction)? as i16;
    let address = (instruction.next_address() as isize + offset as isize - 2) as usize;
    Ok(NextAddress::Address(address))
}

pub fn print_paddr(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let packed = operand(zmachine, instruction)?;
    let address = zmachine.packed_string_address(packed);
    let text = text::as_text(zmachine, address, false)?;
    zmachine.print(&text)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn load(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let variable = variable_number(operand(zmachine, instruction)?, instruction)?;
    let value = zmachine.peek_variable(variable)?;
    store_result(zmachine, instruction, value)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn not(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let value = operand(zmachine, instruction)?;
    store_result(zmachine, instruction, !value)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn call_1n(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let address = operand(zmachine, instruction)?;
    call_fn(zmachine, instruction, address, &[])
}
