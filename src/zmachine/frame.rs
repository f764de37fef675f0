//! Routine call frames, each with its own locals and evaluation stack
use crate::instruction::StoreResult;
use crate::quetzal::{Stk, Stks};
use crate::{error::*, fatal_error};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Routine header address; 0 for the main routine and for restored frames
    address: usize,
    local_variables: Vec<u16>,
    /// Arguments actually supplied by the caller
    argument_count: u8,
    stack: Vec<u16>,
    /// Where the caller wants the return value, if anywhere
    result: Option<StoreResult>,
    return_address: usize,
}

impl From<&Stk> for Frame {
    fn from(value: &Stk) -> Self {
        let result = if value.flags() & 0x10 == 0x00 {
            Some(StoreResult::new(0, value.result_variable()))
        } else {
            None
        };
        Frame::new(
            0,
            value.variables(),
            value.argument_count(),
            value.stack(),
            result,
            value.return_address() as usize,
        )
    }
}

impl From<&Stks> for Vec<Frame> {
    fn from(value: &Stks) -> Self {
        value.stks().iter().map(Frame::from).collect()
    }
}

impl From<&Frame> for Stk {
    fn from(value: &Frame) -> Self {
        // Bit 4 set: result is discarded. Low nibble: local count
        let flags = match value.result() {
            Some(_) => 0x00,
            None => 0x10,
        } | value.local_variables.len() as u8;

        // One bit per supplied argument, low bit first
        let arguments = ((1u16 << value.argument_count) - 1) as u8;

        let result_variable = match value.result() {
            Some(r) => r.variable(),
            None => 0,
        };

        Stk::new(
            value.return_address as u32,
            flags,
            result_variable,
            arguments,
            &value.local_variables,
            &value.stack,
        )
    }
}

impl Frame {
    pub fn new(
        address: usize,
        local_variables: &[u16],
        argument_count: u8,
        stack: &[u16],
        result: Option<StoreResult>,
        return_address: usize,
    ) -> Frame {
        Frame {
            address,
            local_variables: local_variables.to_vec(),
            argument_count,
            stack: stack.to_vec(),
            result,
            return_address,
        }
    }

    /// Frame for a routine call.
    ///
    /// `local_variables` holds the routine's initial values. Arguments replace
    /// them from local 1 upwards and any arguments beyond the last local are dropped.
    pub fn call_routine(
        address: usize,
        arguments: &[u16],
        local_variables: Vec<u16>,
        result: Option<StoreResult>,
        return_address: usize,
    ) -> Frame {
        let mut lv = local_variables;
        let count = usize::min(arguments.len(), lv.len());
        lv[..count].copy_from_slice(&arguments[..count]);

        Frame::new(
            address,
            &lv,
            count as u8,
            &[],
            result,
            return_address,
        )
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn local_variables(&self) -> &[u16] {
        &self.local_variables
    }

    pub fn argument_count(&self) -> u8 {
        self.argument_count
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    pub fn result(&self) -> Option<&StoreResult> {
        self.result.as_ref()
    }

    pub fn return_address(&self) -> usize {
        self.return_address
    }

    pub fn pop(&mut self) -> Result<u16, RuntimeError> {
        match self.stack.pop() {
            Some(v) => {
                debug!(target: "app::state", "Pop {:04x} [{}]", v, self.stack.len());
                Ok(v)
            }
            None => fatal_error!(ErrorCode::StackUnderflow, "Pop from an empty stack"),
        }
    }

    pub fn peek(&self) -> Result<u16, RuntimeError> {
        match self.stack.last() {
            Some(v) => Ok(*v),
            None => fatal_error!(ErrorCode::StackUnderflow, "Peek at an empty stack"),
        }
    }

    pub fn push(&mut self, value: u16) {
        self.stack.push(value);
        debug!(target: "app::state", "Push {:04x} [{}]", value, self.stack.len());
    }

    fn check_local(&self, variable: u8, access: &str) -> Result<usize, RuntimeError> {
        if variable as usize <= self.local_variables.len() {
            Ok(variable as usize - 1)
        } else {
            fatal_error!(
                ErrorCode::InvalidLocalVariable,
                "{} local variable {}, routine has {}",
                access,
                variable,
                self.local_variables.len()
            )
        }
    }

    /// Read local `variable`, where 0 pops the evaluation stack
    pub fn local_variable(&mut self, variable: u8) -> Result<u16, RuntimeError> {
        if variable == 0 {
            self.pop()
        } else {
            let i = self.check_local(variable, "Read from")?;
            Ok(self.local_variables[i])
        }
    }

    /// As [Frame::local_variable], but 0 reads the top of the stack in place
    pub fn peek_local_variable(&self, variable: u8) -> Result<u16, RuntimeError> {
        if variable == 0 {
            self.peek()
        } else {
            let i = self.check_local(variable, "Peek at")?;
            Ok(self.local_variables[i])
        }
    }

    /// Write local `variable`, where 0 pushes onto the evaluation stack
    pub fn set_local_variable(&mut self, variable: u8, value: u16) -> Result<(), RuntimeError> {
        if variable == 0 {
            self.push(value);
            Ok(())
        } else {
            let i = self.check_local(variable, "Write to")?;
            self.local_variables[i] = value;
            Ok(())
        }
    }

    /// Write for `store`, `inc` and friends: variable 0 overwrites the top of the stack
    pub fn set_local_variable_indirect(
        &mut self,
        variable: u8,
        value: u16,
    ) -> Result<(), RuntimeError> {
        if variable == 0 {
            self.pop()?;
            self.push(value);
            Ok(())
        } else {
            self.set_local_variable(variable, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{assert_ok, assert_ok_eq, assert_some_eq};

    use super::*;

    fn frame() -> Frame {
        Frame::new(
            0x1234,
            &[0x1122, 0x3344, 0x5566, 0x7788],
            3,
            &[0x1111, 0x2222],
            Some(StoreResult::new(0x4321, 0x80)),
            0x9876,
        )
    }

    #[test]
    fn test_from_stk() {
        let stk = Stk::new(
            0x1234,
            0x03,
            0x80,
            0x07,
            &[0x5678, 0x9abc, 0xf0ad],
            &[0x1111, 0x2222, 0x3333, 0x4444],
        );

        let frame = Frame::from(&stk);
        assert_eq!(frame.address(), 0);
        assert_eq!(frame.local_variables(), &[0x5678, 0x9abc, 0xf0ad]);
        assert_eq!(frame.argument_count(), 3);
        assert_eq!(frame.stack(), &[0x1111, 0x2222, 0x3333, 0x4444]);
        assert_some_eq!(frame.result(), &StoreResult::new(0, 0x80));
        assert_eq!(frame.return_address(), 0x1234);
    }

    #[test]
    fn test_from_stk_no_result() {
        let stk = Stk::new(0x1234, 0x12, 0x00, 0x01, &[0x5678, 0x9abc], &[]);
        let frame = Frame::from(&stk);
        assert!(frame.result().is_none());
        assert_eq!(frame.argument_count(), 1);
        assert!(frame.stack().is_empty());
    }

    #[test]
    fn test_stk_from_frame() {
        let stk = Stk::from(&frame());
        assert_eq!(stk.return_address(), 0x9876);
        assert_eq!(stk.flags(), 0x04);
        assert_eq!(stk.result_variable(), 0x80);
        assert_eq!(stk.arguments(), 0x07);
        assert_eq!(stk.variables(), &[0x1122, 0x3344, 0x5566, 0x7788]);
        assert_eq!(stk.stack(), &[0x1111, 0x2222]);

        let f = Frame::new(0, &[], 0, &[], None, 0);
        let stk = Stk::from(&f);
        assert_eq!(stk.flags(), 0x10);
        assert_eq!(stk.arguments(), 0);
    }

    #[test]
    fn test_vec_from_stks() {
        let stks = Stks::new(vec![
            Stk::new(0, 0x10, 0, 0, &[], &[0x1111]),
            Stk::new(0x4321, 0x02, 0x80, 0x03, &[0x8765, 0xcba9], &[]),
        ]);
        let frames: Vec<Frame> = Vec::from(&stks);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].result().is_none());
        assert_eq!(frames[0].stack(), &[0x1111]);
        assert_eq!(frames[1].local_variables(), &[0x8765, 0xcba9]);
        assert_eq!(frames[1].argument_count(), 2);
        assert_some_eq!(frames[1].result(), &StoreResult::new(0, 0x80));
        assert_eq!(frames[1].return_address(), 0x4321);
    }

    #[test]
    fn test_pop_peek_push() {
        let mut frame = frame();
        assert_ok_eq!(frame.peek(), 0x2222);
        frame.push(0x3456);
        assert_ok_eq!(frame.pop(), 0x3456);
        assert_ok_eq!(frame.pop(), 0x2222);
        assert_ok_eq!(frame.pop(), 0x1111);
        let e = frame.pop().unwrap_err();
        assert_eq!(e.code(), ErrorCode::StackUnderflow);
        assert_eq!(e.kind(), ErrorKind::Stack);
        assert!(frame.peek().is_err());
    }

    #[test]
    fn test_local_variable() {
        let mut frame = frame();
        assert_ok_eq!(frame.local_variable(1), 0x1122);
        assert_ok_eq!(frame.local_variable(4), 0x7788);
        assert_eq!(
            frame.local_variable(5).unwrap_err().code(),
            ErrorCode::InvalidLocalVariable
        );
        assert_ok_eq!(frame.local_variable(0), 0x2222);
        assert_eq!(frame.stack().len(), 1);
    }

    #[test]
    fn test_peek_local_variable() {
        let frame = frame();
        assert_ok_eq!(frame.peek_local_variable(2), 0x3344);
        assert_ok_eq!(frame.peek_local_variable(0), 0x2222);
        assert_eq!(frame.stack().len(), 2);
        assert!(frame.peek_local_variable(5).is_err());
    }

    #[test]
    fn test_set_local_variable() {
        let mut frame = frame();
        assert_ok!(frame.set_local_variable(2, 0));
        assert_ok_eq!(frame.local_variable(2), 0);
        assert!(frame.set_local_variable(5, 0).is_err());
        assert_ok!(frame.set_local_variable(0, 0x3333));
        assert_eq!(frame.stack(), &[0x1111, 0x2222, 0x3333]);
    }

    #[test]
    fn test_set_local_variable_indirect() {
        let mut frame = frame();
        assert_ok!(frame.set_local_variable_indirect(3, 0x9999));
        assert_ok_eq!(frame.local_variable(3), 0x9999);
        assert_ok!(frame.set_local_variable_indirect(0, 0x3333));
        assert_eq!(frame.stack(), &[0x1111, 0x3333]);
        let mut empty = Frame::new(0, &[], 0, &[], None, 0);
        assert!(empty.set_local_variable_indirect(0, 1).is_err());
    }

    #[test]
    fn test_call_routine() {
        let frame = Frame::call_routine(
            0x1234,
            &[0x1122, 0x3344],
            vec![0x9988, 0x7766, 0x5544, 0x3322],
            None,
            0x4321,
        );
        assert_eq!(frame.address(), 0x1234);
        assert_eq!(frame.local_variables(), &[0x1122, 0x3344, 0x5544, 0x3322]);
        assert_eq!(frame.argument_count(), 2);
        assert!(frame.result().is_none());
        assert_eq!(frame.return_address(), 0x4321);
        assert!(frame.stack().is_empty());
    }

    #[test]
    fn test_call_routine_extra_arguments() {
        let frame = Frame::call_routine(
            0x1234,
            &[1, 2, 3],
            vec![0; 2],
            Some(StoreResult::new(0x1001, 0x10)),
            0x4321,
        );
        assert_eq!(frame.local_variables(), &[1, 2]);
        assert_eq!(frame.argument_count(), 2);
        assert_some_eq!(frame.result(), &StoreResult::new(0x1001, 0x10));
    }
}
