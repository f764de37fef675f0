//! Instruction execution
use crate::{error::*, fatal_error, zmachine::ZMachine};

use super::*;

mod processor_0op;
mod processor_1op;
mod processor_2op;
mod processor_ext;
mod processor_var;

fn operand_value(zmachine: &mut ZMachine, operand: &Operand) -> Result<u16, RuntimeError> {
    match operand.operand_type() {
        OperandType::SmallConstant | OperandType::LargeConstant => Ok(operand.value()),
        OperandType::Variable => zmachine.variable(operand.value() as u8),
    }
}

/// Operand values in order. Variable operands are read as they come, so stack operands pop.
fn operand_values(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<Vec<u16>, RuntimeError> {
    let values = instruction
        .operands()
        .iter()
        .map(|o| operand_value(zmachine, o))
        .collect::<Result<Vec<u16>, RuntimeError>>()?;
    if !values.is_empty() {
        debug!(target: "app::instruction", "Operands: {:04x?}", values);
    }
    Ok(values)
}

/// Get an operand value that the instruction can't do without
fn required(operands: &[u16], index: usize, instruction: &Instruction) -> Result<u16, RuntimeError> {
    match operands.get(index) {
        Some(v) => Ok(*v),
        None => fatal_error!(
            ErrorCode::InvalidInstruction,
            "{} is missing operand {}",
            instruction,
            index + 1
        ),
    }
}

/// Variable number named by an operand of `inc`, `store` and friends
fn variable_number(value: u16, instruction: &Instruction) -> Result<u8, RuntimeError> {
    match u8::try_from(value) {
        Ok(v) => Ok(v),
        Err(_) => fatal_error!(
            ErrorCode::InvalidInstruction,
            "{} names variable {:#x}",
            instruction,
            value
        ),
    }
}

/// Take the branch if `condition` matches the branch sense. Offsets 0 and 1 return false and true.
fn branch(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
    condition: bool,
) -> Result<NextAddress, RuntimeError> {
    let next = NextAddress::Address(instruction.next_address());
    let Some(b) = instruction.branch() else {
        return Ok(next);
    };
    if b.condition() != condition {
        return Ok(next);
    }

    match b.branch_address() {
        a @ (0 | 1) => zmachine.return_routine(a as u16),
        a => Ok(NextAddress::Address(a)),
    }
}

fn store_result(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
    value: u16,
) -> Result<(), RuntimeError> {
    match instruction.store() {
        Some(s) => zmachine.set_variable(s.variable(), value),
        None => Ok(()),
    }
}

/// Call a routine by packed address; the result is stored if the instruction has a store variable
fn call_fn(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
    packed_address: u16,
    arguments: &[u16],
) -> Result<NextAddress, RuntimeError> {
    let address = zmachine.packed_routine_address(packed_address);
    let pc = zmachine.call_routine(
        address,
        arguments,
        instruction.store().copied(),
        instruction.next_address(),
    )?;
    Ok(NextAddress::Address(pc))
}

fn unimplemented(instruction: &Instruction) -> Result<NextAddress, RuntimeError> {
    fatal_error!(
        ErrorCode::UnimplementedInstruction,
        "Unimplemented instruction: {}",
        instruction.opcode()
    )
}

/// Run one decoded instruction. Opcodes that don't exist in the story's version are fatal.
pub fn dispatch(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    info!(target: "app::instruction", "dispatch: {}", instruction);
    let version = zmachine.version();
    match instruction.opcode().form() {
        OpcodeForm::Ext => match instruction.opcode().instruction() {
            0x00 => processor_ext::save(zmachine, instruction),
            0x01 => processor_ext::restore(zmachine, instruction),
            0x02 => processor_ext::log_shift(zmachine, instruction),
            0x03 => processor_ext::art_shift(zmachine, instruction),
            0x04 => processor_ext::set_font(zmachine, instruction),
            0x09 => processor_ext::save_undo(zmachine, instruction),
            0x0a => processor_ext::restore_undo(zmachine, instruction),
            0x0b => processor_ext::print_unicode(zmachine, instruction),
            0x0c => processor_ext::check_unicode(zmachine, instruction),
            _ => unimplemented(instruction),
        },
        _ => match instruction.opcode().operand_count() {
            OperandCount::_0OP => match (version, instruction.opcode().instruction()) {
                (_, 0x0) => processor_0op::rtrue(zmachine, instruction),
                (_, 0x1) => processor_0op::rfalse(zmachine, instruction),
                (_, 0x2) => processor_0op::print(zmachine, instruction),
                (_, 0x3) => processor_0op::print_ret(zmachine, instruction),
                (_, 0x4) => processor_0op::nop(zmachine, instruction),
                (3, 0x5) => processor_0op::save(zmachine, instruction),
                (3, 0x6) => processor_0op::restore(zmachine, instruction),
                (_, 0x7) => processor_0op::restart(zmachine, instruction),
                (_, 0x8) => processor_0op::ret_popped(zmachine, instruction),
                (3, 0x9) => processor_0op::pop(zmachine, instruction),
                (_, 0x9) => processor_0op::catch(zmachine, instruction),
                (_, 0xa) => processor_0op::quit(zmachine, instruction),
                (_, 0xb) => processor_0op::new_line(zmachine, instruction),
                (_, 0xc) => processor_0op::show_status(zmachine, instruction),
                (_, 0xd) => processor_0op::verify(zmachine, instruction),
                (5.., 0xf) => processor_0op::piracy(zmachine, instruction),
                _ => unimplemented(instruction),
            },
            OperandCount::_1OP => match (version, instruction.opcode().instruction()) {
                (_, 0x0) => processor_1op::jz(zmachine, instruction),
                (_, 0x1) => processor_1op::get_sibling(zmachine, instruction),
                (_, 0x2) => processor_1op::get_child(zmachine, instruction),
                (_, 0x3) => processor_1op::get_parent(zmachine, instruction),
                (_, 0x4) => processor_1op::get_prop_len(zmachine, instruction),
                (_, 0x5) => processor_1op::inc(zmachine, instruction),
                (_, 0x6) => processor_1op::dec(zmachine, instruction),
                (_, 0x7) => processor_1op::print_addr(zmachine, instruction),
                (5.., 0x8) => processor_1op::call_1s(zmachine, instruction),
                (_, 0x9) => processor_1op::remove_obj(zmachine, instruction),
                (_, 0xa) => processor_1op::print_obj(zmachine, instruction),
                (_, 0xb) => processor_1op::ret(zmachine, instruction),
                (_, 0xc) => processor_1op::jump(zmachine, instruction),
                (_, 0xd) => processor_1op::print_paddr(zmachine, instruction),
                (_, 0xe) => processor_1op::load(zmachine, instruction),
                (3, 0xf) => processor_1op::not(zmachine, instruction),
                (_, 0xf) => processor_1op::call_1n(zmachine, instruction),
                _ => unimplemented(instruction),
            },
            OperandCount::_2OP => match (version, instruction.opcode().instruction()) {
                (_, 0x01) => processor_2op::je(zmachine, instruction),
                (_, 0x02) => processor_2op::jl(zmachine, instruction),
                (_, 0x03) => processor_2op::jg(zmachine, instruction),
                (_, 0x04) => processor_2op::dec_chk(zmachine, instruction),
                (_, 0x05) => processor_2op::inc_chk(zmachine, instruction),
                (_, 0x06) => processor_2op::jin(zmachine, instruction),
                (_, 0x07) => processor_2op::test(zmachine, instruction),
                (_, 0x08) => processor_2op::or(zmachine, instruction),
                (_, 0x09) => processor_2op::and(zmachine, instruction),
                (_, 0x0a) => processor_2op::test_attr(zmachine, instruction),
                (_, 0x0b) => processor_2op::set_attr(zmachine, instruction),
                (_, 0x0c) => processor_2op::clear_attr(zmachine, instruction),
                (_, 0x0d) => processor_2op::store(zmachine, instruction),
                (_, 0x0e) => processor_2op::insert_obj(zmachine, instruction),
                (_, 0x0f) => processor_2op::loadw(zmachine, instruction),
                (_, 0x10) => processor_2op::loadb(zmachine, instruction),
                (_, 0x11) => processor_2op::get_prop(zmachine, instruction),
                (_, 0x12) => processor_2op::get_prop_addr(zmachine, instruction),
                (_, 0x13) => processor_2op::get_next_prop(zmachine, instruction),
                (_, 0x14) => processor_2op::add(zmachine, instruction),
                (_, 0x15) => processor_2op::sub(zmachine, instruction),
                (_, 0x16) => processor_2op::mul(zmachine, instruction),
                (_, 0x17) => processor_2op::div(zmachine, instruction),
                (_, 0x18) => processor_2op::modulus(zmachine, instruction),
                (5.., 0x19) => processor_2op::call_2s(zmachine, instruction),
                (5.., 0x1a) => processor_2op::call_2n(zmachine, instruction),
                (5.., 0x1b) => processor_2op::set_colour(zmachine, instruction),
                (5.., 0x1c) => processor_2op::throw(zmachine, instruction),
                _ => unimplemented(instruction),
            },
            OperandCount::_VAR => match (version, instruction.opcode().instruction()) {
                (_, 0x00) => processor_var::call_vs(zmachine, instruction),
                (_, 0x01) => processor_var::storew(zmachine, instruction),
                (_, 0x02) => processor_var::storeb(zmachine, instruction),
                (_, 0x03) => processor_var::put_prop(zmachine, instruction),
                (_, 0x04) => processor_var::read(zmachine, instruction),
                (_, 0x05) => processor_var::print_char(zmachine, instruction),
                (_, 0x06) => processor_var::print_num(zmachine, instruction),
                (_, 0x07) => processor_var::random(zmachine, instruction),
                (_, 0x08) => processor_var::push(zmachine, instruction),
                (_, 0x09) => processor_var::pull(zmachine, instruction),
                (_, 0x0a) => processor_var::split_window(zmachine, instruction),
                (_, 0x0b) => processor_var::set_window(zmachine, instruction),
                (5.., 0x0c) => processor_var::call_vs2(zmachine, instruction),
                (5.., 0x0d) => processor_var::erase_window(zmachine, instruction),
                (5.., 0x0e) => processor_var::erase_line(zmachine, instruction),
                (5.., 0x0f) => processor_var::set_cursor(zmachine, instruction),
                (5.., 0x10) => processor_var::get_cursor(zmachine, instruction),
                (5.., 0x11) => processor_var::set_text_style(zmachine, instruction),
                (5.., 0x12) => processor_var::buffer_mode(zmachine, instruction),
                (_, 0x13) => processor_var::output_stream(zmachine, instruction),
                (_, 0x14) => processor_var::input_stream(zmachine, instruction),
                (_, 0x15) => processor_var::sound_effect(zmachine, instruction),
                (5.., 0x16) => processor_var::read_char(zmachine, instruction),
                (5.., 0x17) => processor_var::scan_table(zmachine, instruction),
                (5.., 0x18) => processor_var::not(zmachine, instruction),
                (5.., 0x19) => processor_var::call_vn(zmachine, instruction),
                (5.., 0x1a) => processor_var::call_vn2(zmachine, instruction),
                (5.., 0x1b) => processor_var::tokenise(zmachine, instruction),
                (5.., 0x1c) => processor_var::encode_text(zmachine, instruction),
                (5.., 0x1d) => processor_var::copy_table(zmachine, instruction),
                (5.., 0x1e) => processor_var::print_table(zmachine, instruction),
                (5.., 0x1f) => processor_var::check_arg_count(zmachine, instruction),
                _ => unimplemented(instruction),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        assert_ok, assert_ok_eq,
        test_util::{
            mock_branch, mock_frame, mock_instruction, mock_routine,
            mock_store_result, mock_zmachine, opcode, operand, test_map,
        },
    };

    use super::*;

    #[test]
    fn test_operand_values() {
        let mut map = test_map(5);
        map[0x100] = 0x12;
        map[0x101] = 0x34;
        let mut zmachine = mock_zmachine(map);
        assert_ok!(zmachine.push(0x5678));
        let i = mock_instruction(
            0x400,
            vec![
                operand(OperandType::LargeConstant, 0x1234),
                operand(OperandType::SmallConstant, 0x56),
                operand(OperandType::Variable, 0x10),
                operand(OperandType::Variable, 0x00),
            ],
            opcode(5, 0xE0),
            0x408,
        );
        assert_ok_eq!(
            operand_values(&mut zmachine, &i),
            vec![0x1234, 0x56, 0x1234, 0x5678]
        );
        assert!(zmachine.peek_variable(0).is_err());
    }

    #[test]
    fn test_branch() {
        let mut map = test_map(5);
        mock_routine(&mut map, 0x600, &[]);
        let mut zmachine = mock_zmachine(map);
        assert_ok_eq!(
            branch(&mut zmachine, &mock_branch(true, 0x500, 0x410), true),
            NextAddress::Address(0x500)
        );
        assert_ok_eq!(
            branch(&mut zmachine, &mock_branch(true, 0x500, 0x410), false),
            NextAddress::Address(0x410)
        );
        assert_ok_eq!(
            branch(&mut zmachine, &mock_branch(false, 0x500, 0x410), false),
            NextAddress::Address(0x500)
        );

        mock_frame(&mut zmachine, 0x600, Some(0x80), 0x480);
        assert_ok_eq!(
            branch(&mut zmachine, &mock_branch(true, 1, 0x410), true),
            NextAddress::Address(0x480)
        );
        assert_ok_eq!(zmachine.variable(0x80), 1);

        mock_frame(&mut zmachine, 0x600, Some(0x80), 0x490);
        assert_ok_eq!(
            branch(&mut zmachine, &mock_branch(true, 0, 0x410), true),
            NextAddress::Address(0x490)
        );
        assert_ok_eq!(zmachine.variable(0x80), 0);

        let i = mock_instruction(0x400, vec![], opcode(5, 0xB0), 0x401);
        assert_ok_eq!(branch(&mut zmachine, &i, true), NextAddress::Address(0x401));
    }

    #[test]
    fn test_store_result() {
        let mut zmachine = mock_zmachine(test_map(5));
        assert_ok!(store_result(&mut zmachine, &mock_store_result(Some(0x80), 0x401), 0x1234));
        assert_ok_eq!(zmachine.variable(0x80), 0x1234);
        assert_ok!(store_result(&mut zmachine, &mock_store_result(None, 0x401), 0x5678));
        assert_ok_eq!(zmachine.variable(0x80), 0x1234);
    }

    #[test]
    fn test_dispatch_unimplemented() {
        let mut zmachine = mock_zmachine(test_map(3));
        // call_1s is not a V3 instruction
        let i = mock_instruction(
            0x400,
            vec![operand(OperandType::LargeConstant, 0x300)],
            opcode(3, 0x88),
            0x403,
        );
        let e = dispatch(&mut zmachine, &i).unwrap_err();
        assert_eq!(e.code(), ErrorCode::UnimplementedInstruction);
        assert!(!e.is_recoverable());

        let i = mock_instruction(0x400, vec![], crate::test_util::ext_opcode(5, 0x1D), 0x403);
        let mut zmachine = mock_zmachine(test_map(5));
        let e = dispatch(&mut zmachine, &i).unwrap_err();
        assert_eq!(e.code(), ErrorCode::UnimplementedInstruction);
    }
}
