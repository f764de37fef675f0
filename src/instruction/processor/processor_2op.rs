use crate::{
    error::*,
    fatal_error,
    instruction::{Instruction, NextAddress},
    object::{self, attribute, property},
    zmachine::ZMachine,
};

use super::{branch, call_fn, operand_values, required, store_result, variable_number};

/// Both operands of a 2OP instruction
fn operands(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<(u16, u16), RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    Ok((
        required(&operands, 0, instruction)?,
        required(&operands, 1, instruction)?,
    ))
}

fn next(instruction: &Instruction) -> Result<NextAddress, RuntimeError> {
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn je(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let first = required(&operands, 0, instruction)?;
    required(&operands, 1, instruction)?;
    let condition = operands[1..].iter().any(|v| *v == first);
    branch(zmachine, instruction, condition)
}

pub fn jl(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (a, b) = operands(zmachine, instruction)?;
    branch(zmachine, instruction, (a as i16) < (b as i16))
}

pub fn jg(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (a, b) = operands(zmachine, instruction)?;
    branch(zmachine, instruction, (a as i16) > (b as i16))
}

pub fn dec_chk(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (variable, value) = operands(zmachine, instruction)?;
    let variable = variable_number(variable, instruction)?;
    let new_value = (zmachine.peek_variable(variable)? as i16).wrapping_sub(1);
    zmachine.set_variable_indirect(variable, new_value as u16)?;
    branch(zmachine, instruction, new_value < value as i16)
}

pub fn inc_chk(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (variable, value) = operands(zmachine, instruction)?;
    let variable = variable_number(variable, instruction)?;
    let new_value = (zmachine.peek_variable(variable)? as i16).wrapping_add(1);
    zmachine.set_variable_indirect(variable, new_value as u16)?;
    branch(zmachine, instruction, new_value > value as i16)
}

pub fn jin(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (object, parent) = operands(zmachine, instruction)?;
    let condition = object::parent(zmachine, object as usize)? == parent as usize;
    branch(zmachine, instruction, condition)
}

pub fn test(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (bitmap, flags) = operands(zmachine, instruction)?;
    branch(zmachine, instruction, bitmap & flags == flags)
}

pub fn or(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (a, b) = operands(zmachine, instruction)?;
    store_result(zmachine, instruction, a | b)?;
    next(instruction)
}

pub fn and(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (a, b) = operands(zmachine, instruction)?;
    store_result(zmachine, instruction, a & b)?;
    next(instruction)
}

pub fn test_attr(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (object, attr) = operands(zmachine, instruction)?;
    let condition = attribute::value(zmachine, object as usize, attr)?;
    branch(zmachine, instruction, condition)
}

pub fn set_attr(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (object, attr) = operands(zmachine, instruction)?;
    attribute::set(zmachine, object as usize, attr)?;
    next(instruction)
}

pub fn clear_attr(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (object, attr) = operands(zmachine, instruction)?;
    attribute::clear(zmachine, object as usize, attr)?;
    next(instruction)
}

pub fn store(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (variable, value) = operands(zmachine, instruction)?;
    zmachine.set_variable_indirect(variable_number(variable, instruction)?, value)?;
    next(instruction)
}

pub fn insert_obj(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (object, destination) = operands(zmachine, instruction)?;
    object::insert(zmachine, object as usize, destination as usize)?;
    next(instruction)
}

pub fn loadw(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (array, index) = operands(zmachine, instruction)?;
    let address = array.wrapping_add(index.wrapping_mul(2)) as usize;
    let value = zmachine.read_word(address)?;
    store_result(zmachine, instruction, value)?;
    next(instruction)
}

pub fn loadb(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (array, index) = operands(zmachine, instruction)?;
    let address = array.wrapping_add(index) as usize;
    let value = zmachine.read_byte(address)?;
    store_result(zmachine, instruction, value as u16)?;
    next(instruction)
}

pub fn get_prop(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (object, prop) = operands(zmachine, instruction)?;
    let value = property::property(zmachine, object as usize, prop)?;
    store_result(zmachine, instruction, value)?;
    next(instruction)
}

pub fn get_prop_addr(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (object, prop) = operands(zmachine, instruction)?;
    let address = property::property_data_address(zmachine, object as usize, prop)?;
    store_result(zmachine, instruction, address as u16)?;
    next(instruction)
}

pub fn get_next_prop(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (object, prop) = operands(zmachine, instruction)?;
    let next_prop = property::next_property(zmachine, object as usize, prop)?;
    store_result(zmachine, instruction, next_prop as u16)?;
    next(instruction)
}

pub fn add(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (a, b) = operands(zmachine, instruction)?;
    store_result(zmachine, instruction, (a as i16).wrapping_add(b as i16) as u16)?;
    next(instruction)
}

pub fn sub(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (a, b) = operands(zmachine, instruction)?;
    store_result(zmachine, instruction, (a as i16).wrapping_sub(b as i16) as u16)?;
    next(instruction)
}

pub fn mul(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (a, b) = operands(zmachine, instruction)?;
    store_result(zmachine, instruction, (a as i16).wrapping_mul(b as i16) as u16)?;
    next(instruction)
}

pub fn div(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (a, b) = operands(zmachine, instruction)?;
    if b == 0 {
        return fatal_error!(ErrorCode::DivideByZero, "Divide {} by zero", a as i16);
    }
    store_result(zmachine, instruction, (a as i16).wrapping_div(b as i16) as u16)?;
    next(instruction)
}

pub fn modulus(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (a, b) = operands(zmachine, instruction)?;
    if b == 0 {
        return fatal_error!(ErrorCode::DivideByZero, "{} modulo zero", a as i16);
    }
    store_result(zmachine, instruction, (a as i16).wrapping_rem(b as i16) as u16)?;
    next(instruction)
}

pub fn call_2s(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (address, argument) = operands(zmachine, instruction)?;
    call_fn(zmachine, instruction, address, &[argument])
}

pub fn call_2n(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (address, argument) = operands(zmachine, instruction)?;
    call_fn(zmachine, instruction, address, &[argument])
}

pub fn set_colour(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (foreground, background) = operands(zmachine, instruction)?;
    zmachine.set_colours(foreground, background);
    next(instruction)
}

pub fn throw(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let (value, depth) = operands(zmachine, instruction)?;
    zmachine.throw(depth, value)
}
