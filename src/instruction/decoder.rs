//! Instruction [decoding](https://inform-fiction.org/zmachine/standards/z1point1/sect04.html)
use super::*;
use crate::{
    error::*,
    fatal_error,
    zmachine::{memory, ZMachine},
};

fn byte(bytes: &[u8], offset: usize) -> Result<u8, RuntimeError> {
    match bytes.get(offset) {
        Some(b) => Ok(*b),
        None => fatal_error!(
            ErrorCode::InvalidInstruction,
            "Instruction runs past the end of memory at offset {}",
            offset
        ),
    }
}

fn operand_type(type_byte: u8, operand_index: u8) -> Option<OperandType> {
    // Two bits per operand, first operand in the top bits; 0b11 ends the list
    match (type_byte >> (6 - (operand_index * 2))) & 3 {
        0 => Some(OperandType::LargeConstant),
        1 => Some(OperandType::SmallConstant),
        2 => Some(OperandType::Variable),
        _ => None,
    }
}

fn long_operand_type(opcode: u8, index: u8) -> OperandType {
    if opcode >> (6 - index) & 1 == 1 {
        OperandType::Variable
    } else {
        OperandType::SmallConstant
    }
}

fn operand_types(
    bytes: &[u8],
    opcode: &Opcode,
    mut offset: usize,
) -> Result<(usize, Vec<OperandType>), RuntimeError> {
    let mut types = Vec::new();
    match opcode.form() {
        OpcodeForm::Short => {
            if let Some(t) = operand_type(opcode.opcode(), 1) {
                types.push(t);
            }
        }
        OpcodeForm::Long => {
            types.push(long_operand_type(opcode.opcode(), 0));
            types.push(long_operand_type(opcode.opcode(), 1));
        }
        OpcodeForm::Var | OpcodeForm::Ext => {
            // CALL_VS2 and CALL_VN2 have a second byte of operand types
            let type_bytes = if opcode.form() == OpcodeForm::Var
                && (opcode.opcode() == 0xEC || opcode.opcode() == 0xFA)
            {
                2
            } else {
                1
            };
            let mut more = true;
            for _ in 0..type_bytes {
                let b = byte(bytes, offset)?;
                offset += 1;
                for i in 0..4 {
                    if !more {
                        break;
                    }
                    match operand_type(b, i) {
                        Some(t) => types.push(t),
                        None => more = false,
                    }
                }
            }
        }
    }

    Ok((offset, types))
}

fn operands(
    bytes: &[u8],
    operand_types: &[OperandType],
    mut offset: usize,
) -> Result<(usize, Vec<Operand>), RuntimeError> {
    let mut operands = Vec::new();

    for optype in operand_types {
        match optype {
            OperandType::LargeConstant => {
                operands.push(Operand::new(
                    *optype,
                    memory::word_value(byte(bytes, offset)?, byte(bytes, offset + 1)?),
                ));
                offset += 2;
            }
            OperandType::SmallConstant | OperandType::Variable => {
                operands.push(Operand::new(*optype, byte(bytes, offset)? as u16));
                offset += 1;
            }
        }
    }

    Ok((offset, operands))
}

fn is_store_instruction(opcode: &Opcode) -> bool {
    let version = opcode.version();
    match opcode.form() {
        OpcodeForm::Ext => matches!(opcode.instruction(), 0x00..=0x04 | 0x09 | 0x0A | 0x0C),
        _ => match opcode.operand_count() {
            OperandCount::_0OP => matches!((version, opcode.instruction()), (5.., 0x9)),
            OperandCount::_1OP => match opcode.instruction() {
                0x1..=0x4 | 0x8 | 0xE => true,
                0xF => version < 5,
                _ => false,
            },
            OperandCount::_2OP => matches!(opcode.instruction(), 0x08 | 0x09 | 0x0F..=0x19),
            OperandCount::_VAR => match opcode.instruction() {
                0x00 | 0x07 | 0x0C | 0x16 | 0x17 | 0x18 => true,
                0x04 => version >= 5,
                _ => false,
            },
        },
    }
}

fn result_variable(
    address: usize,
    bytes: &[u8],
    opcode: &Opcode,
    offset: usize,
) -> Result<(usize, Option<StoreResult>), RuntimeError> {
    if is_store_instruction(opcode) {
        Ok((
            offset + 1,
            Some(StoreResult::new(address + offset, byte(bytes, offset)?)),
        ))
    } else {
        Ok((offset, None))
    }
}

fn branch_address(address: usize, offset: i16) -> usize {
    match offset {
        0 => 0,
        1 => 1,
        _ => ((address as isize) + offset as isize) as usize,
    }
}

/// Branch data at `offset`. Returns the offset past it with the [Branch].
///
/// The destination is the address after the branch data, plus the offset, minus 2.
fn branch_condition(
    address: usize,
    bytes: &[u8],
    offset: usize,
) -> Result<(usize, Branch), RuntimeError> {
    let b = byte(bytes, offset)?;
    let condition = b & 0x80 == 0x80;
    match b & 0x40 {
        0x40 => {
            let b_offset = b & 0x3f;
            Ok((
                offset + 1,
                Branch::new(
                    address + offset,
                    condition,
                    branch_address(address + offset - 1, b_offset as i16),
                ),
            ))
        }
        _ => {
            let mut b_offset = ((b as u16 & 0x3f) << 8) | byte(bytes, offset + 1)? as u16;
            if b_offset & 0x2000 == 0x2000 {
                b_offset |= 0xC000;
            }
            Ok((
                offset + 2,
                Branch::new(
                    address + offset,
                    condition,
                    branch_address(address + offset, b_offset as i16),
                ),
            ))
        }
    }
}

fn is_branch_instruction(opcode: &Opcode) -> bool {
    match opcode.form() {
        OpcodeForm::Ext => false,
        _ => match opcode.operand_count() {
            OperandCount::_0OP => match (opcode.version(), opcode.instruction()) {
                (_, 0x0d) | (_, 0x0f) => true,
                (3, 0x05) | (3, 0x06) => true,
                (_, _) => false,
            },
            OperandCount::_1OP => matches!(opcode.instruction(), 0x00..=0x02),
            OperandCount::_2OP => matches!(opcode.instruction(), 0x01..=0x07 | 0x0a),
            OperandCount::_VAR => matches!(opcode.instruction(), 0x17 | 0x1F),
        },
    }
}

fn opcode(bytes: &[u8], version: u8, offset: usize) -> Result<(usize, Opcode), RuntimeError> {
    let mut opcode = byte(bytes, offset)?;
    let (offset, form) = if opcode == 0xBE && version >= 5 {
        opcode = byte(bytes, offset + 1)?;
        (offset + 2, OpcodeForm::Ext)
    } else {
        (
            offset + 1,
            match (opcode >> 6) & 0x3 {
                3 => OpcodeForm::Var,
                2 => OpcodeForm::Short,
                _ => OpcodeForm::Long,
            },
        )
    };

    let instruction = match form {
        OpcodeForm::Var | OpcodeForm::Long => opcode & 0x1F,
        OpcodeForm::Short => opcode & 0xF,
        OpcodeForm::Ext => opcode,
    };

    let operand_count = match form {
        OpcodeForm::Short => {
            if opcode & 0x30 == 0x30 {
                OperandCount::_0OP
            } else {
                OperandCount::_1OP
            }
        }
        OpcodeForm::Long => OperandCount::_2OP,
        OpcodeForm::Var => {
            if opcode & 0x20 == 0x20 {
                OperandCount::_VAR
            } else {
                OperandCount::_2OP
            }
        }
        OpcodeForm::Ext => OperandCount::_VAR,
    };

    Ok((
        offset,
        Opcode::new(version, opcode, instruction, form, operand_count),
    ))
}

pub fn decode_instruction(
    zmachine: &ZMachine,
    address: usize,
) -> Result<Instruction, RuntimeError> {
    let version = zmachine.version();
    let bytes = zmachine.instruction(address);
    let (offset, opcode) = opcode(&bytes, version, 0)?;
    let (offset, operand_types) = operand_types(&bytes, &opcode, offset)?;
    let (offset, operands) = operands(&bytes, &operand_types, offset)?;
    let (offset, store) = result_variable(address, &bytes, &opcode, offset)?;
    let (offset, branch) = if is_branch_instruction(&opcode) {
        let (o, b) = branch_condition(address, &bytes, offset)?;
        (o, Some(b))
    } else {
        (offset, None)
    };

    Ok(Instruction::new(
        address,
        opcode,
        operands,
        store,
        branch,
        address + offset,
    ))
}

/// Branch data starting at `address`, for resuming a V3 `save` after a restore
pub fn decode_branch(zmachine: &ZMachine, address: usize) -> Result<(usize, Branch), RuntimeError> {
    let bytes = zmachine.instruction(address);
    let (offset, branch) = branch_condition(address, &bytes, 0)?;
    Ok((address + offset, branch))
}
