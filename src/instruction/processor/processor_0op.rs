use crate::{
    error::RuntimeError,
    instruction::{Instruction, NextAddress},
    text,
    zmachine::{header::HeaderField, ZMachine},
};

use super::{branch, store_result};

pub fn rtrue(
    zmachine: &mut ZMachine,
    _instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    zmachine.return_routine(1)
}

pub fn rfalse(
    zmachine: &mut ZMachine,
    _instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    zmachine.return_routine(0)
}

/// Literal text follows the opcode
fn literal_text(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<usize, RuntimeError> {
    let ztext = zmachine.string_literal(instruction.next_address())?;
    let text = text::from_vec(zmachine, &ztext, false)?;
    zmachine.print(&text)?;
    Ok(instruction.next_address() + (ztext.len() * 2))
}

pub fn print(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    Ok(NextAddress::Address(literal_text(zmachine, instruction)?))
}

pub fn print_ret(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    literal_text(zmachine, instruction)?;
    zmachine.new_line()?;
    zmachine.return_routine(1)
}

pub fn nop(
    _zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn save(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    // The saved PC is the branch data, so a restore can take the branch
    let pc = instruction
        .branch()
        .map_or(instruction.next_address(), |b| b.address());
    match zmachine.save(pc) {
        Ok(_) => branch(zmachine, instruction, true),
        Err(e) => {
            warn!(target: "app::quetzal", "Save failed: {}", e);
            branch(zmachine, instruction, false)
        }
    }
}

pub fn restore(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    match zmachine.restore() {
        Ok(n) => Ok(n),
        Err(e) => {
            warn!(target: "app::quetzal", "Restore failed: {}", e);
            branch(zmachine, instruction, false)
        }
    }
}

pub fn restart(
    zmachine: &mut ZMachine,
    _instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    Ok(NextAddress::Address(zmachine.restart()?))
}

pub fn ret_popped(
    zmachine: &mut ZMachine,
    _instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let value = zmachine.variable(0)?;
    zmachine.return_routine(value)
}

pub fn pop(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    zmachine.variable(0)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn catch(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let depth = zmachine.frame_count();
    store_result(zmachine, instruction, depth as u16)?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn quit(
    _zmachine: &mut ZMachine,
    _instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    Ok(NextAddress::Quit)
}

pub fn new_line(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    zmachine.new_line()?;
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn show_status(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    if zmachine.version() == 3 {
        zmachine.status_line()?;
    }
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn verify(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let expected = zmachine.header_word(HeaderField::Checksum)?;
    let checksum = zmachine.checksum();
    debug!(target: "app::state", "Verify: checksum {:04x}, header {:04x}", checksum, expected);
    branch(zmachine, instruction, checksum == expected)
}

pub fn piracy(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    branch(zmachine, instruction, true)
}
