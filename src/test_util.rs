//! Story builders and assertion macros for unit tests
use crate::{
    config::Config,
    instruction::{
        Branch, Instruction, Opcode, OpcodeForm, Operand, OperandCount, OperandType, StoreResult,
    },
    zmachine::{memory::Memory, ZMachine},
};

/// Unwraps an `Ok`, failing the test with the error otherwise
#[macro_export]
macro_rules! assert_ok {
    ($r:expr) => {
        match $r {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err({:?})", e),
        }
    };
}

#[macro_export]
macro_rules! assert_ok_eq {
    ($r:expr, $v:expr) => {
        assert_eq!($crate::assert_ok!($r), $v)
    };
}

/// Unwraps a `Some`, failing the test on `None`
#[macro_export]
macro_rules! assert_some {
    ($o:expr) => {
        match $o {
            Some(v) => v,
            None => panic!("Expected Some, got None"),
        }
    };
}

#[macro_export]
macro_rules! assert_some_eq {
    ($o:expr, $v:expr) => {
        assert_eq!($crate::assert_some!($o), $v)
    };
}

/// Property tables for mock objects start here, 0x20 bytes per object
const PROPERTY_TABLES: usize = 0x500;

pub fn test_map(version: u8) -> Vec<u8> {
    // Globals $0100, objects $0200, code from $0400, static memory from $0600
    let mut v = vec![0; 0x800];
    v[0] = version;
    v[0x06] = 0x04;
    v[0x0A] = 0x02;
    v[0x0C] = 0x01;
    v[0x0E] = 0x06;
    v
}

pub fn set_variable(map: &mut [u8], variable: u8, value: u16) {
    let address = 0x100 + ((variable as usize - 16) * 2);
    map[address] = (value >> 8) as u8;
    map[address + 1] = value as u8;
}

pub fn mock_zmachine(map: Vec<u8>) -> ZMachine {
    mock_zmachine_with_config(map, &Config::default().with_random_seed(Some(1)))
}

pub fn mock_zmachine_with_config(map: Vec<u8>, config: &Config) -> ZMachine {
    crate::assert_ok!(ZMachine::new(Memory::new(map), config, "test"))
}

pub fn operand(operand_type: OperandType, value: u16) -> Operand {
    Operand::new(operand_type, value)
}

pub fn opcode(version: u8, opcode: u8) -> Opcode {
    let (form, operand_count, instruction) = match opcode {
        0x00..=0x7F => (OpcodeForm::Long, OperandCount::_2OP, opcode & 0x1F),
        0x80..=0xAF => (OpcodeForm::Short, OperandCount::_1OP, opcode & 0xF),
        0xB0..=0xBF => (OpcodeForm::Short, OperandCount::_0OP, opcode & 0xF),
        0xC0..=0xDF => (OpcodeForm::Var, OperandCount::_2OP, opcode & 0x1F),
        _ => (OpcodeForm::Var, OperandCount::_VAR, opcode & 0x1F),
    };
    Opcode::new(version, opcode, instruction, form, operand_count)
}

pub fn ext_opcode(version: u8, opcode: u8) -> Opcode {
    Opcode::new(version, opcode, opcode, OpcodeForm::Ext, OperandCount::_VAR)
}

pub fn mock_instruction(
    address: usize,
    operands: Vec<Operand>,
    opcode: Opcode,
    next_address: usize,
) -> Instruction {
    Instruction::new(address, opcode, operands, None, None, next_address)
}

pub fn branch(byte_address: usize, condition: bool, branch_address: usize) -> Branch {
    Branch::new(byte_address, condition, branch_address)
}

pub fn mock_branch_instruction(
    address: usize,
    operands: Vec<Operand>,
    opcode: Opcode,
    next_address: usize,
    branch: Branch,
) -> Instruction {
    Instruction::new(address, opcode, operands, None, Some(branch), next_address)
}

pub fn store(byte_address: usize, variable: u8) -> StoreResult {
    StoreResult::new(byte_address, variable)
}

pub fn mock_store_instruction(
    address: usize,
    operands: Vec<Operand>,
    opcode: Opcode,
    next_address: usize,
    result: StoreResult,
) -> Instruction {
    Instruction::new(address, opcode, operands, Some(result), None, next_address)
}

pub fn mock_branch_store_instruction(
    address: usize,
    operands: Vec<Operand>,
    opcode: Opcode,
    next_address: usize,
    branch: Branch,
    result: StoreResult,
) -> Instruction {
    Instruction::new(
        address,
        opcode,
        operands,
        Some(result),
        Some(branch),
        next_address,
    )
}

pub fn mock_branch(condition: bool, branch_address: usize, next_address: usize) -> Instruction {
    Instruction::new(
        0,
        Opcode::new(5, 1, 1, OpcodeForm::Var, OperandCount::_VAR),
        vec![],
        None,
        Some(Branch::new(0, condition, branch_address)),
        next_address,
    )
}

pub fn mock_store_result(result: Option<u8>, next_address: usize) -> Instruction {
    let r = result.map(|x| StoreResult::new(0, x));
    Instruction::new(
        0,
        Opcode::new(5, 1, 1, OpcodeForm::Var, OperandCount::_VAR),
        vec![],
        r,
        None,
        next_address,
    )
}

/// Push a frame for a routine already placed with [mock_routine]
pub fn mock_frame(
    zmachine: &mut ZMachine,
    address: usize,
    result: Option<u8>,
    return_address: usize,
) {
    let r = result.map(|x| StoreResult::new(0, x));
    assert!(zmachine
        .call_routine(address, &[], r, return_address)
        .is_ok());
}

pub fn mock_routine(map: &mut [u8], address: usize, local_variables: &[u16]) {
    map[address] = local_variables.len() as u8;
    if map[0] < 5 {
        for (i, w) in local_variables.iter().enumerate() {
            map[address + 1 + (i * 2)] = (*w >> 8) as u8;
            map[address + 2 + (i * 2)] = *w as u8;
        }
    }
}

fn write_words(map: &mut [u8], address: usize, words: &[u16]) {
    for (i, w) in words.iter().enumerate() {
        map[address + (i * 2)] = (*w >> 8) as u8;
        map[address + (i * 2) + 1] = *w as u8;
    }
}

/// Dictionary at $0300 with 4 words: hello, inventory, look, sailor.
///
/// The text buffer at $0380 holds 20 characters, the parse buffer at $03A0 holds 4 entries.
pub fn mock_dictionary(map: &mut [u8]) {
    map[0x08] = 0x03;

    map[0x300] = 3;
    map[0x301] = b'.';
    map[0x302] = b',';
    map[0x303] = b'"';

    // Entry length is 9 bytes
    map[0x304] = 0x9;
    // There are 4 entries
    map[0x306] = 4;

    if map[0] == 3 {
        // hello
        //   D     A     11       11    14    5
        // 0 01101 01010 10001  1 10001 10100 00101
        write_words(map, 0x307, &[0x3551, 0xC685]);
        // inventory
        //   E     13    1B       A     13    19
        // 0 01110 10011 11011  1 01010 10011 11001
        write_words(map, 0x310, &[0x3A7B, 0xAA79]);
        // look
        //   11    14    14       10    5     5
        // 0 10001 10100 10100  1 10000 00101 00101
        write_words(map, 0x319, &[0x4694, 0xC0A5]);
        // sailor
        //   18    6     E        11    14    17
        // 0 11000 00110 01110  1 10001 10100 10111
        write_words(map, 0x322, &[0x60CE, 0xC697]);
    } else {
        // hello
        write_words(map, 0x307, &[0x3551, 0x4685, 0x94A5]);
        // inventory
        //   E     13    1B       A     13    19       14    17    1E
        write_words(map, 0x310, &[0x3A7B, 0x2A79, 0xD2FE]);
        // look
        write_words(map, 0x319, &[0x4694, 0x40A5, 0x94A5]);
        // sailor
        write_words(map, 0x322, &[0x60CE, 0x4697, 0x94A5]);
    }

    map[0x380] = 20;
    map[0x3A0] = 4;
}

/// Unsorted dictionary with 3 words: xyzzy, plover, moon
pub fn mock_custom_dictionary(map: &mut [u8], address: usize) {
    map[address] = 3;
    map[address + 1] = b'.';
    map[address + 2] = b',';
    map[address + 3] = b'"';

    // Entry length is 9 bytes
    map[address + 4] = 0x9;
    // -3 entries, unsorted
    map[address + 5] = 0xFF;
    map[address + 6] = 0xFD;

    // xyzzy
    //   1D    1E    1F       1F    1E    5        5     5     5
    write_words(map, address + 7, &[0x77DF, 0x7FC5, 0x94A5]);
    // plover
    //   15    11    14       1B    A     17       5     5     5
    write_words(map, address + 16, &[0x5634, 0x6D57, 0x94A5]);
    // moon
    //   12    14    14       13    5     5
    write_words(map, address + 25, &[0x4A94, 0x4CA5, 0x94A5]);
}

fn mock_object_address(map: &[u8], object: usize) -> usize {
    let object_table = ((map[0x0a] as usize) << 8) + map[0x0b] as usize;
    if map[0] < 4 {
        object_table + 62 + ((object - 1) * 9)
    } else {
        object_table + 126 + ((object - 1) * 14)
    }
}

pub fn mock_object(
    map: &mut [u8],
    object: usize,
    short_name: Vec<u16>,
    (parent, sibling, child): (u16, u16, u16),
) {
    let object_address = mock_object_address(map, object);
    let property_table_address = PROPERTY_TABLES + ((object - 1) * 0x20);
    if map[0] < 4 {
        map[object_address + 4] = parent as u8;
        map[object_address + 5] = sibling as u8;
        map[object_address + 6] = child as u8;
        map[object_address + 7] = (property_table_address >> 8) as u8;
        map[object_address + 8] = property_table_address as u8;
    } else {
        write_words(map, object_address + 6, &[parent, sibling, child]);
        write_words(map, object_address + 12, &[property_table_address as u16]);
    }

    map[property_table_address] = short_name.len() as u8;
    write_words(map, property_table_address + 1, &short_name);
}

pub fn mock_attributes(map: &mut [u8], object: usize, attributes: &[u8]) {
    let object_address = mock_object_address(map, object);
    for (i, b) in attributes.iter().enumerate() {
        map[object_address + i] = *b;
    }
}

pub fn mock_default_properties(map: &mut [u8]) {
    let words = if map[0] < 4 { 31 } else { 63 };
    let object_table = ((map[0x0a] as usize) << 8) + map[0x0b] as usize;
    for i in 0..words {
        let address = object_table + (i * 2);
        map[address] = (i as u8) % 0x10;
        map[address + 1] = i as u8;
    }
}

/// Write a property list after the short name of an object created by [mock_object]
pub fn mock_properties(map: &mut [u8], object: usize, properties: &[(u8, &[u8])]) {
    let property_table_address = PROPERTY_TABLES + ((object - 1) * 0x20);
    let hl = map[property_table_address] as usize;

    let mut address = property_table_address + 1 + (hl * 2);
    for (number, data) in properties {
        let header = match (map[0], data.len()) {
            (3, l) => vec![((l - 1) * 32) as u8 + *number],
            (_, 1) => vec![*number],
            (_, 2) => vec![0x40 | *number],
            (_, l) => vec![0x80 | *number, 0x80 | (l as u8 & 0x3F)],
        };
        for b in header.iter().chain(data.iter()) {
            map[address] = *b;
            address += 1;
        }
    }
    map[address] = 0;
}
