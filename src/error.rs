//! Runtime errors
use std::fmt;

/// Broad classes of failure, as seen by a host
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Truncated or unusable story file, bad configuration
    Load,
    /// Write outside dynamic memory, address outside the image
    MemoryProtection,
    /// Unknown or malformed instruction for the active version
    Decode,
    /// Division or modulo by zero
    Arithmetic,
    /// Call stack and variable errors
    Stack,
    /// Save, restore, undo and transcript failures
    Persistence,
    /// Object table errors
    Object,
    /// Output stream and window errors
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigError,
    DivideByZero,
    FrameUnderflow,
    HeaderTooShort,
    IFF,
    IllegalMemoryAccess,
    InvalidAbbreviation,
    InvalidAddress,
    InvalidFile,
    InvalidInstruction,
    InvalidLocalVariable,
    InvalidObject,
    InvalidObjectAttribute,
    InvalidObjectProperty,
    InvalidObjectPropertySize,
    InvalidObjectTree,
    InvalidOutputStream,
    InvalidRoutine,
    InvalidWindow,
    NoFrame,
    Quetzal,
    Restore,
    ReturnNoCaller,
    Save,
    StackUnderflow,
    Stream3Table,
    Transcript,
    UndoNoState,
    UnimplementedInstruction,
    UnsupportedVersion,
}

impl ErrorCode {
    /// Get the kind of error this code belongs to
    ///
    /// # Returns
    /// [ErrorKind] for the code
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ConfigError
            | ErrorCode::HeaderTooShort
            | ErrorCode::InvalidFile
            | ErrorCode::UnsupportedVersion => ErrorKind::Load,
            ErrorCode::IllegalMemoryAccess | ErrorCode::InvalidAddress => {
                ErrorKind::MemoryProtection
            }
            ErrorCode::InvalidAbbreviation
            | ErrorCode::InvalidInstruction
            | ErrorCode::UnimplementedInstruction => ErrorKind::Decode,
            ErrorCode::DivideByZero => ErrorKind::Arithmetic,
            ErrorCode::FrameUnderflow
            | ErrorCode::InvalidLocalVariable
            | ErrorCode::InvalidRoutine
            | ErrorCode::NoFrame
            | ErrorCode::ReturnNoCaller
            | ErrorCode::StackUnderflow => ErrorKind::Stack,
            ErrorCode::IFF
            | ErrorCode::Quetzal
            | ErrorCode::Restore
            | ErrorCode::Save
            | ErrorCode::Transcript
            | ErrorCode::UndoNoState => ErrorKind::Persistence,
            ErrorCode::InvalidObject
            | ErrorCode::InvalidObjectAttribute
            | ErrorCode::InvalidObjectProperty
            | ErrorCode::InvalidObjectPropertySize
            | ErrorCode::InvalidObjectTree => ErrorKind::Object,
            ErrorCode::InvalidOutputStream | ErrorCode::InvalidWindow | ErrorCode::Stream3Table => {
                ErrorKind::Output
            }
        }
    }
}

/// A runtime error
#[derive(Clone, PartialEq, Eq)]
pub struct RuntimeError {
    /// Can execution continue past the failing instruction?
    recoverable: bool,
    /// Error code
    code: ErrorCode,
    /// Error message
    message: String,
}

impl RuntimeError {
    /// Recoverable error constructor
    ///
    /// # Arguments
    /// * `code` - Error code
    /// * `message` - Error message
    pub fn recoverable(code: ErrorCode, message: String) -> RuntimeError {
        RuntimeError {
            recoverable: true,
            code,
            message,
        }
    }

    /// Fatal error constructor
    ///
    /// # Arguments
    /// * `code` - Error code
    /// * `message` - Error message
    pub fn fatal(code: ErrorCode, message: String) -> RuntimeError {
        RuntimeError {
            recoverable: false,
            code,
            message,
        }
    }

    /// Get the error code
    ///
    /// # Returns
    /// Error code
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the error kind
    ///
    /// # Returns
    /// [ErrorKind] of the error code
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Get the error message
    ///
    /// # Returns
    /// Error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Is the error recoverable?
    ///
    /// # Returns
    /// `true` if execution may continue with the next instruction, `false` if not
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }
}

#[macro_export]
macro_rules! fatal_error {
    ($code:expr, $($arg:tt)*) => {
        Err($crate::error::RuntimeError::fatal($code, format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! recoverable_error {
    ($code:expr, $($arg:tt)*) => {
        Err($crate::error::RuntimeError::recoverable($code, format!($($arg)*)))
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} error - [{:?}]: {}",
            if self.recoverable {
                "Recoverable"
            } else {
                "Fatal"
            },
            self.code,
            self.message
        )
    }
}

impl fmt::Debug for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for RuntimeError {}
