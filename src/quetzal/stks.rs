use std::fmt;

use crate::{
    error::*,
    fatal_error,
    iff::{read_be, write_be, Chunk},
};

#[derive(Clone, Debug, PartialEq, Eq)]
/// A single saved call frame
pub struct Stk {
    /// Address execution resumes at when this frame returns
    return_address: u32,
    /// 000rvvvv: r set when no result is stored, vvvv local variable count
    flags: u8,
    result_variable: u8,
    /// Bit n set when argument n+1 was supplied
    arguments: u8,
    variables: Vec<u16>,
    stack: Vec<u16>,
}

impl fmt::Display for Stk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "return ${:06x}, flags {:02x}, result {:02x}, arguments {:07b}, locals [",
            self.return_address, self.flags, self.result_variable, self.arguments
        )?;
        for v in &self.variables {
            write!(f, " {:04x}", v)?;
        }
        write!(f, " ], stack [")?;
        for v in &self.stack {
            write!(f, " {:04x}", v)?;
        }
        write!(f, " ]")
    }
}

impl From<&Stk> for Vec<u8> {
    fn from(value: &Stk) -> Vec<u8> {
        let mut data = write_be(value.return_address as usize, 3);
        data.push(value.flags);
        data.push(value.result_variable);
        data.push(value.arguments);
        data.extend(write_be(value.stack.len(), 2));
        for v in &value.variables {
            data.extend(write_be(*v as usize, 2));
        }
        for v in &value.stack {
            data.extend(write_be(*v as usize, 2));
        }

        data
    }
}

impl Stk {
    pub fn new(
        return_address: u32,
        flags: u8,
        result_variable: u8,
        arguments: u8,
        variables: &[u16],
        stack: &[u16],
    ) -> Stk {
        Stk {
            return_address,
            flags,
            result_variable,
            arguments,
            variables: variables.to_vec(),
            stack: stack.to_vec(),
        }
    }

    pub fn return_address(&self) -> u32 {
        self.return_address
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn result_variable(&self) -> u8 {
        self.result_variable
    }

    pub fn arguments(&self) -> u8 {
        self.arguments
    }

    /// Number of arguments supplied, from the argument mask
    pub fn argument_count(&self) -> u8 {
        let mut count = 0;
        while count < 7 && self.arguments & (1 << count) != 0 {
            count += 1;
        }
        count
    }

    pub fn variables(&self) -> &[u16] {
        &self.variables
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stks {
    stks: Vec<Stk>,
}

fn read_word(data: &[u8], offset: usize) -> Result<u16, RuntimeError> {
    if offset + 2 > data.len() {
        fatal_error!(
            ErrorCode::Quetzal,
            "Stks chunk truncated at offset {}",
            offset
        )
    } else {
        Ok(read_be(&data[offset..offset + 2]) as u16)
    }
}

impl TryFrom<&Chunk> for Stks {
    type Error = RuntimeError;

    fn try_from(value: &Chunk) -> Result<Self, Self::Error> {
        let data = value.data();
        let mut position = 0;
        let mut stks = Vec::new();
        while position < data.len() {
            if position + 8 > data.len() {
                return fatal_error!(
                    ErrorCode::Quetzal,
                    "Stks frame header truncated at offset {}",
                    position
                );
            }
            let return_address = read_be(&data[position..position + 3]) as u32;
            let flags = data[position + 3];
            let result_variable = data[position + 4];
            let arguments = data[position + 5];
            let stack_size = read_word(data, position + 6)? as usize;
            position += 8;

            let mut variables = Vec::new();
            for _ in 0..flags & 0xF {
                variables.push(read_word(data, position)?);
                position += 2;
            }

            let mut stack = Vec::new();
            for _ in 0..stack_size {
                stack.push(read_word(data, position)?);
                position += 2;
            }

            stks.push(Stk::new(
                return_address,
                flags,
                result_variable,
                arguments,
                &variables,
                &stack,
            ));
        }

        Ok(Stks::new(stks))
    }
}

impl From<&Stks> for Chunk {
    fn from(value: &Stks) -> Self {
        let mut data = Vec::new();
        for stk in &value.stks {
            data.extend(Vec::from(stk));
        }
        Chunk::new_chunk("Stks", data)
    }
}

impl Stks {
    pub fn new(stks: Vec<Stk>) -> Stks {
        Stks { stks }
    }

    pub fn stks(&self) -> &[Stk] {
        &self.stks
    }
}
