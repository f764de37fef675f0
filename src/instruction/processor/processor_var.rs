use crate::{
    error::RuntimeError,
    instruction::{Instruction, NextAddress},
    object::property,
    text,
    zmachine::{header::HeaderField, ZMachine},
};

use super::{branch, call_fn, operand_values, required, store_result, variable_number};

fn next(instruction: &Instruction) -> Result<NextAddress, RuntimeError> {
    Ok(NextAddress::Address(instruction.next_address()))
}

pub fn call_vs(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let address = required(&operands, 0, instruction)?;
    call_fn(zmachine, instruction, address, &operands[1..])
}

pub fn storew(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let array = required(&operands, 0, instruction)?;
    let index = required(&operands, 1, instruction)?;
    let value = required(&operands, 2, instruction)?;
    let address = array.wrapping_add(index.wrapping_mul(2)) as usize;
    zmachine.write_word(address, value)?;
    next(instruction)
}

pub fn storeb(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let array = required(&operands, 0, instruction)?;
    let index = required(&operands, 1, instruction)?;
    let value = required(&operands, 2, instruction)?;
    let address = array.wrapping_add(index) as usize;
    zmachine.write_byte(address, value as u8)?;
    next(instruction)
}

pub fn put_prop(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let object = required(&operands, 0, instruction)?;
    let prop = required(&operands, 1, instruction)?;
    let value = required(&operands, 2, instruction)?;
    property::set_property(zmachine, object as usize, prop, value)?;
    next(instruction)
}

/// Copy a command line into a text buffer
///
/// V3 buffers hold the text from byte 1, zero terminated. V5+ buffers keep the
/// length in byte 1 and the text from byte 2, after any text already there.
fn store_input(
    zmachine: &mut ZMachine,
    text_buffer: usize,
    input: &[u16],
) -> Result<(), RuntimeError> {
    let capacity = zmachine.read_byte(text_buffer)? as usize;
    if zmachine.version() < 5 {
        let n = usize::min(input.len(), capacity.saturating_sub(1));
        for (i, c) in input.iter().take(n).enumerate() {
            zmachine.write_byte(text_buffer + 1 + i, *c as u8)?;
        }
        zmachine.write_byte(text_buffer + 1 + n, 0)
    } else {
        let existing = usize::min(zmachine.read_byte(text_buffer + 1)? as usize, capacity);
        let n = usize::min(input.len(), capacity - existing);
        for (i, c) in input.iter().take(n).enumerate() {
            zmachine.write_byte(text_buffer + 2 + existing + i, *c as u8)?;
        }
        zmachine.write_byte(text_buffer + 1, (existing + n) as u8)
    }
}

pub fn read(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    // Operands are only evaluated once there is a line to read, since the
    // instruction runs again when input arrives
    if !zmachine.has_input() {
        if zmachine.version() == 3 {
            zmachine.status_line()?;
        }
        debug!(target: "app::input", "Waiting for input @ ${:06x}", instruction.address());
        return Ok(NextAddress::Input);
    }

    let operands = operand_values(zmachine, instruction)?;
    let text_buffer = required(&operands, 0, instruction)? as usize;
    let parse_buffer = operands.get(1).copied().unwrap_or(0) as usize;
    let line = zmachine.take_input().unwrap_or_default();
    info!(target: "app::input", "Read: {:?}", line);
    zmachine.transcript_input(&line)?;

    let input = line
        .to_lowercase()
        .chars()
        .filter_map(text::char_to_zscii)
        .filter(|c| *c != 13)
        .collect::<Vec<u16>>();
    store_input(zmachine, text_buffer, &input)?;

    if parse_buffer > 0 {
        let dictionary = zmachine.header_word(HeaderField::Dictionary)? as usize;
        text::parse_text(zmachine, text_buffer, parse_buffer, dictionary, false)?;
    }

    // Terminating character, V5+ only
    store_result(zmachine, instruction, 13)?;
    next(instruction)
}

pub fn print_char(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let c = required(&operands, 0, instruction)?;
    zmachine.print(&[c])?;
    next(instruction)
}

pub fn print_num(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let n = required(&operands, 0, instruction)? as i16;
    zmachine.print_str(&n.to_string())?;
    next(instruction)
}

pub fn random(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let range = required(&operands, 0, instruction)? as i16;
    let value = if range > 0 {
        zmachine.random(range as u16)
    } else {
        if range == 0 {
            zmachine.reseed();
        } else if range > -1000 {
            zmachine.predictable(range.unsigned_abs());
        } else {
            zmachine.seed(range.unsigned_abs() as u64);
        }
        0
    };
    store_result(zmachine, instruction, value)?;
    next(instruction)
}

pub fn push(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = required(&operands, 0, instruction)?;
    zmachine.push(value)?;
    next(instruction)
}

pub fn pull(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let variable = variable_number(required(&operands, 0, instruction)?, instruction)?;
    let value = zmachine.variable(0)?;
    zmachine.set_variable_indirect(variable, value)?;
    next(instruction)
}

pub fn split_window(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let lines = required(&operands, 0, instruction)?;
    zmachine.split_window(lines);
    next(instruction)
}

pub fn set_window(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let window = required(&operands, 0, instruction)?;
    zmachine.set_window(window)?;
    next(instruction)
}

pub fn call_vs2(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    call_vs(zmachine, instruction)
}

pub fn erase_window(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let window = required(&operands, 0, instruction)? as i16;
    zmachine.erase_window(window)?;
    next(instruction)
}

pub fn erase_line(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = required(&operands, 0, instruction)?;
    zmachine.erase_line(value);
    next(instruction)
}

pub fn set_cursor(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let row = required(&operands, 0, instruction)?;
    let column = operands.get(1).copied().unwrap_or(1);
    zmachine.set_cursor(row, column);
    next(instruction)
}

pub fn get_cursor(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let array = required(&operands, 0, instruction)? as usize;
    let (row, column) = zmachine.cursor();
    zmachine.write_word(array, row)?;
    zmachine.write_word(array + 2, column)?;
    next(instruction)
}

pub fn set_text_style(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let style = required(&operands, 0, instruction)?;
    zmachine.set_text_style(style);
    next(instruction)
}

pub fn buffer_mode(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let mode = required(&operands, 0, instruction)?;
    zmachine.buffer_mode(mode);
    next(instruction)
}

pub fn output_stream(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let stream = required(&operands, 0, instruction)? as i16;
    let table = operands.get(1).map(|t| *t as usize);
    zmachine.output_stream(stream, table)?;
    next(instruction)
}

pub fn input_stream(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    info!(target: "app::input", "Input stream {:?} ignored, input is from the keyboard", operands.first());
    next(instruction)
}

pub fn sound_effect(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    debug!(target: "app::screen", "Sound effect {:?} ignored", operands);
    next(instruction)
}

pub fn read_char(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    if !zmachine.has_input() {
        debug!(target: "app::input", "Waiting for a key @ ${:06x}", instruction.address());
        return Ok(NextAddress::Input);
    }

    operand_values(zmachine, instruction)?;
    let line = zmachine.take_input().unwrap_or_default();
    let c = line
        .chars()
        .next()
        .and_then(text::char_to_zscii)
        .unwrap_or(13);
    info!(target: "app::input", "Read character: {}", c);
    store_result(zmachine, instruction, c)?;
    next(instruction)
}

pub fn scan_table(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = required(&operands, 0, instruction)?;
    let table = required(&operands, 1, instruction)? as usize;
    let length = required(&operands, 2, instruction)? as usize;
    let form = operands.get(3).copied().unwrap_or(0x82);
    let field_size = (form & 0x7F) as usize;
    let words = form & 0x80 == 0x80;

    for i in 0..length {
        let address = table + (i * field_size);
        let v = if words {
            zmachine.read_word(address)?
        } else {
            zmachine.read_byte(address)? as u16
        };
        if v == value {
            store_result(zmachine, instruction, address as u16)?;
            return branch(zmachine, instruction, true);
        }
    }

    store_result(zmachine, instruction, 0)?;
    branch(zmachine, instruction, false)
}

pub fn not(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let value = required(&operands, 0, instruction)?;
    store_result(zmachine, instruction, !value)?;
    next(instruction)
}

pub fn call_vn(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    call_vs(zmachine, instruction)
}

pub fn call_vn2(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    call_vs(zmachine, instruction)
}

pub fn tokenise(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let text_buffer = required(&operands, 0, instruction)? as usize;
    let parse_buffer = required(&operands, 1, instruction)? as usize;
    let dictionary = match operands.get(2) {
        Some(d) if *d > 0 => *d as usize,
        _ => zmachine.header_word(HeaderField::Dictionary)? as usize,
    };
    let skip_unknown = operands.get(3).map_or(false, |f| *f != 0);
    text::parse_text(zmachine, text_buffer, parse_buffer, dictionary, skip_unknown)?;
    next(instruction)
}

pub fn encode_text(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let zscii_text = required(&operands, 0, instruction)? as usize;
    let length = required(&operands, 1, instruction)? as usize;
    let from = required(&operands, 2, instruction)? as usize;
    let coded_text = required(&operands, 3, instruction)? as usize;

    let zscii = (0..length)
        .map(|i| zmachine.read_byte(zscii_text + from + i).map(|b| b as u16))
        .collect::<Result<Vec<u16>, RuntimeError>>()?;
    let encoded = text::encode_text(&zscii, zmachine.capabilities().dictionary_words());
    for (i, w) in encoded.iter().enumerate() {
        zmachine.write_word(coded_text + (i * 2), *w)?;
    }
    next(instruction)
}

pub fn copy_table(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let first = required(&operands, 0, instruction)? as usize;
    let second = required(&operands, 1, instruction)? as usize;
    let size = required(&operands, 2, instruction)? as i16;
    let length = size.unsigned_abs() as usize;

    if second == 0 {
        for i in 0..length {
            zmachine.write_byte(first + i, 0)?;
        }
    } else if size < 0 {
        // Forwards, even if the tables overlap
        for i in 0..length {
            let b = zmachine.read_byte(first + i)?;
            zmachine.write_byte(second + i, b)?;
        }
    } else {
        let data = (0..length)
            .map(|i| zmachine.read_byte(first + i))
            .collect::<Result<Vec<u8>, RuntimeError>>()?;
        for (i, b) in data.iter().enumerate() {
            zmachine.write_byte(second + i, *b)?;
        }
    }
    next(instruction)
}

pub fn print_table(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let table = required(&operands, 0, instruction)? as usize;
    let width = required(&operands, 1, instruction)? as usize;
    let height = operands.get(2).copied().unwrap_or(1) as usize;
    let skip = operands.get(3).copied().unwrap_or(0) as usize;

    let (row, column) = zmachine.cursor();
    for r in 0..height {
        if r > 0 {
            if zmachine.selected_window() == 1 {
                zmachine.set_cursor(row + r as u16, column);
            } else {
                zmachine.new_line()?;
            }
        }
        let start = table + (r * (width + skip));
        let line = (0..width)
            .map(|i| zmachine.read_byte(start + i).map(|b| b as u16))
            .collect::<Result<Vec<u16>, RuntimeError>>()?;
        zmachine.print(&line)?;
    }
    next(instruction)
}

pub fn check_arg_count(
    zmachine: &mut ZMachine,
    instruction: &Instruction,
) -> Result<NextAddress, RuntimeError> {
    let operands = operand_values(zmachine, instruction)?;
    let argument = required(&operands, 0, instruction)?;
    let count = zmachine.argument_count()? as u16;
    branch(zmachine, instruction, argument <= count)
}
