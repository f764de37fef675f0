//! The Z-Machine: memory, call stack, output streams and the run loop
use std::{
    collections::{HashSet, VecDeque},
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use time::OffsetDateTime;

use crate::{
    config::Config,
    error::*,
    fatal_error, files,
    instruction::{decoder, processor, NextAddress, StoreResult},
    object::property,
    quetzal::{IFhd, IntD, Mem, Quetzal, Stk, Stks},
    recoverable_error, text,
};

use self::{
    frame::Frame,
    header::{flags1_v3, flags1_v4, flags2, HeaderField},
    memory::Memory,
    rng::{chacha_rng::ChaChaRng, ZRng},
    screen::Screen,
    version::Version,
};

pub mod frame;
pub mod header;
pub mod memory;
pub mod rng;
pub mod screen;
pub mod version;

/// Maximum nesting of output stream 3
const STREAM_3_DEPTH: usize = 16;
/// Flags 2 bits that survive restart and restore
const KEPT_FLAGS2: u16 = flags2::TRANSCRIPTING | flags2::FIXED_PITCH;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// What to do when an instruction fails with a recoverable error
pub enum ErrorHandling {
    /// Report every occurrence in the story text and continue
    ContinueWarnAlways,
    /// Report the first occurrence of each error code and continue
    ContinueWarnOnce,
    /// Log the error and continue
    Ignore,
    /// Stop the machine
    Abort,
}

/// Output stream 3 table
struct Stream3 {
    address: usize,
    buffer: Vec<u16>,
}

pub struct ZMachine {
    name: String,
    version: Version,
    memory: Memory,
    rng: Box<dyn ZRng>,
    random_seed: Option<u64>,
    frames: Vec<Frame>,
    pc: usize,
    undo_stack: VecDeque<Quetzal>,
    undo_depth: usize,
    error_handling: ErrorHandling,
    /// Error codes already reported
    errors: HashSet<ErrorCode>,
    output_streams: u8,
    stream_2: Option<File>,
    stream_3: Vec<Stream3>,
    save_directory: Option<String>,
    screen: Screen,
    /// Command line waiting for a read instruction
    input: Option<String>,
    halted: bool,
    instruction_count: usize,
}

impl TryFrom<(&ZMachine, usize)> for Quetzal {
    type Error = RuntimeError;

    fn try_from((zmachine, pc): (&ZMachine, usize)) -> Result<Self, Self::Error> {
        debug!(target: "app::quetzal", "Building save state @ ${:06x}", pc);
        let ifhd = zmachine.ifhd(pc)?;
        let mem = Mem::new(true, zmachine.memory.compress());
        let stks = Stks::new(zmachine.frames.iter().map(Stk::from).collect());
        Ok(Quetzal::new(ifhd, mem, stks))
    }
}

impl ZMachine {
    /// Constructor
    ///
    /// # Arguments
    /// * `memory` - Story [Memory]
    /// * `config` - Runtime [Config]
    /// * `name` - Story name, used to name save and transcript files
    ///
    /// # Returns
    /// [Result] with a ready to run [ZMachine] or a [RuntimeError]
    pub fn new(memory: Memory, config: &Config, name: &str) -> Result<ZMachine, RuntimeError> {
        let version = Version::select(memory.read_byte(0)?, config.unsupported_version())?;
        let screen = Screen::new(
            version.number(),
            config.rows(),
            config.columns(),
            (config.foreground(), config.background()),
        );

        let mut zmachine = ZMachine {
            name: name.to_string(),
            version,
            memory,
            rng: Box::new(ChaChaRng::new(config.random_seed())),
            random_seed: config.random_seed(),
            frames: Vec::new(),
            pc: 0,
            undo_stack: VecDeque::new(),
            undo_depth: config.undo_depth(),
            error_handling: config.error_handling(),
            errors: HashSet::new(),
            output_streams: 0x1,
            stream_2: None,
            stream_3: Vec::new(),
            save_directory: config.save_directory().map(|s| s.to_string()),
            screen,
            input: None,
            halted: false,
            instruction_count: 0,
        };

        zmachine.initialize()?;
        zmachine.pc = zmachine.header_word(HeaderField::InitialPC)? as usize;
        info!(target: "app::state", "{} loaded: version {}, {} bytes, initial PC ${:04x}", name, zmachine.version(), zmachine.memory.size(), zmachine.pc);
        Ok(zmachine)
    }

    /// Set the interpreter-owned header fields and make sure there is a frame to run in
    fn initialize(&mut self) -> Result<(), RuntimeError> {
        let rows = self.screen.rows();
        let columns = self.screen.columns();
        let (foreground, background) = self.screen.colours();

        if self.version() == 3 {
            header::update_flags1(
                &mut self.memory,
                flags1_v3::SCREEN_SPLIT,
                flags1_v3::STATUS_LINE_UNAVAILABLE | flags1_v3::VARIABLE_PITCH,
            )?;
        } else {
            header::set_byte(&mut self.memory, HeaderField::DefaultBackground, background)?;
            header::set_byte(&mut self.memory, HeaderField::DefaultForeground, foreground)?;
            header::set_byte(&mut self.memory, HeaderField::ScreenLines, rows)?;
            header::set_byte(&mut self.memory, HeaderField::ScreenColumns, columns)?;
            header::set_word(&mut self.memory, HeaderField::ScreenHeight, rows as u16)?;
            header::set_word(&mut self.memory, HeaderField::ScreenWidth, columns as u16)?;
            header::set_byte(&mut self.memory, HeaderField::FontWidth, 1)?;
            header::set_byte(&mut self.memory, HeaderField::FontHeight, 1)?;
            header::update_flags1(
                &mut self.memory,
                flags1_v4::COLOURS | flags1_v4::BOLD | flags1_v4::ITALIC | flags1_v4::FIXED_SPACE,
                flags1_v4::PICTURES | flags1_v4::SOUND | flags1_v4::TIMED_INPUT,
            )?;
            header::update_flags2(
                &mut self.memory,
                0,
                flags2::PICTURES | flags2::MOUSE | flags2::SOUND,
            )?;
        }

        // Interpreter number and version
        header::set_byte(&mut self.memory, HeaderField::InterpreterNumber, 6)?;
        header::set_byte(&mut self.memory, HeaderField::InterpreterVersion, b'Z')?;
        // Standard revision 1.0
        header::set_word(&mut self.memory, HeaderField::Revision, 0x0100)?;

        if self.frames.is_empty() {
            self.frames.push(Frame::new(0, &[], 0, &[], None, 0));
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version whose semantics the machine runs with
    pub fn version(&self) -> u8 {
        self.version.number()
    }

    pub fn capabilities(&self) -> &Version {
        &self.version
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    // Memory
    pub fn read_byte(&self, address: usize) -> Result<u8, RuntimeError> {
        self.memory.read_byte(address)
    }

    pub fn read_word(&self, address: usize) -> Result<u16, RuntimeError> {
        self.memory.read_word(address)
    }

    /// Start or stop the transcript when the story flips Flags2 bit 0
    fn update_transcript_bit(&mut self, old: u16, new: u16) -> Result<(), RuntimeError> {
        if old & 0x1 == new & 0x1 {
            Ok(())
        } else if new & 0x1 == 0x1 {
            self.start_transcript()
        } else {
            self.output_streams &= !0x2;
            Ok(())
        }
    }

    pub fn write_byte(&mut self, address: usize, value: u8) -> Result<(), RuntimeError> {
        if address == HeaderField::Flags2 as usize + 1 {
            let old = self.memory.read_byte(address)?;
            self.update_transcript_bit(old as u16, value as u16)?;
        }

        self.memory.write_byte(address, value)
    }

    pub fn write_word(&mut self, address: usize, value: u16) -> Result<(), RuntimeError> {
        if address == HeaderField::Flags2 as usize {
            let old = self.memory.read_word(address)?;
            self.update_transcript_bit(old, value)?;
        }

        self.memory.write_word(address, value)
    }

    pub fn header_byte(&self, field: HeaderField) -> Result<u8, RuntimeError> {
        header::field_byte(&self.memory, field)
    }

    pub fn header_word(&self, field: HeaderField) -> Result<u16, RuntimeError> {
        header::field_word(&self.memory, field)
    }

    /// Bytes of a (possible) instruction
    ///
    /// An instruction is at most 23 bytes long, not counting literal text
    pub fn instruction(&self, address: usize) -> Vec<u8> {
        self.memory.slice(address, 23)
    }

    /// Reads encoded text words up to and including the word with the top bit set
    pub fn string_literal(&self, address: usize) -> Result<Vec<u16>, RuntimeError> {
        let mut d = Vec::new();
        loop {
            let w = self.memory.read_word(address + (d.len() * 2))?;
            d.push(w);
            if w & 0x8000 == 0x8000 {
                return Ok(d);
            }
        }
    }

    pub fn packed_routine_address(&self, address: u16) -> usize {
        address as usize * self.version.packing()
    }

    pub fn packed_string_address(&self, address: u16) -> usize {
        address as usize * self.version.packing()
    }

    /// Checksum of the story file, for `verify`
    pub fn checksum(&self) -> u16 {
        self.memory.checksum()
    }

    // Frames and variables
    fn current_frame(&self) -> Result<&Frame, RuntimeError> {
        match self.frames.last() {
            Some(f) => Ok(f),
            None => fatal_error!(ErrorCode::NoFrame, "No call frame"),
        }
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        match self.frames.last_mut() {
            Some(f) => Ok(f),
            None => fatal_error!(ErrorCode::NoFrame, "No call frame"),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn global_variable_address(&self, variable: u8) -> Result<usize, RuntimeError> {
        let table = self.header_word(HeaderField::GlobalTable)? as usize;
        Ok(table + ((variable as usize - 16) * 2))
    }

    /// Read a variable; variable 0 pops the stack
    pub fn variable(&mut self, variable: u8) -> Result<u16, RuntimeError> {
        if variable < 16 {
            self.current_frame_mut()?.local_variable(variable)
        } else {
            let address = self.global_variable_address(variable)?;
            self.read_word(address)
        }
    }

    /// Read a variable; variable 0 reads the top of the stack in place
    pub fn peek_variable(&self, variable: u8) -> Result<u16, RuntimeError> {
        if variable < 16 {
            self.current_frame()?.peek_local_variable(variable)
        } else {
            let address = self.global_variable_address(variable)?;
            self.read_word(address)
        }
    }

    /// Write a variable; variable 0 pushes onto the stack
    pub fn set_variable(&mut self, variable: u8, value: u16) -> Result<(), RuntimeError> {
        if variable < 16 {
            self.current_frame_mut()?.set_local_variable(variable, value)
        } else {
            let address = self.global_variable_address(variable)?;
            self.write_word(address, value)
        }
    }

    /// Write a variable; variable 0 replaces the top of the stack
    pub fn set_variable_indirect(&mut self, variable: u8, value: u16) -> Result<(), RuntimeError> {
        if variable < 16 {
            self.current_frame_mut()?
                .set_local_variable_indirect(variable, value)
        } else {
            let address = self.global_variable_address(variable)?;
            self.write_word(address, value)
        }
    }

    pub fn push(&mut self, value: u16) -> Result<(), RuntimeError> {
        self.current_frame_mut()?.push(value);
        Ok(())
    }

    pub fn argument_count(&self) -> Result<u8, RuntimeError> {
        Ok(self.current_frame()?.argument_count())
    }

    /// Read a routine header
    ///
    /// # Returns
    /// [Result] with (address of the first instruction, initial local variables) or a [RuntimeError]
    fn routine_header(&self, address: usize) -> Result<(usize, Vec<u16>), RuntimeError> {
        let count = self.read_byte(address)? as usize;
        if count > 15 {
            return fatal_error!(
                ErrorCode::InvalidRoutine,
                "Routine at ${:06x} declares {} local variables",
                address,
                count
            );
        }

        if self.version() < 5 {
            let locals = (0..count)
                .map(|i| self.read_word(address + 1 + (i * 2)))
                .collect::<Result<Vec<u16>, RuntimeError>>()?;
            Ok((address + 1 + (count * 2), locals))
        } else {
            Ok((address + 1, vec![0; count]))
        }
    }

    /// Call a routine
    ///
    /// # Arguments
    /// * `address` - Byte address of the routine, 0 stores 0 without a call
    /// * `arguments` - Argument values
    /// * `result` - [Option] with the [StoreResult] for the return value
    /// * `return_address` - Address to continue at when the routine returns
    ///
    /// # Returns
    /// [Result] with the address of the next instruction to execute or a [RuntimeError]
    pub fn call_routine(
        &mut self,
        address: usize,
        arguments: &[u16],
        result: Option<StoreResult>,
        return_address: usize,
    ) -> Result<usize, RuntimeError> {
        if address == 0 {
            if let Some(r) = result {
                self.set_variable(r.variable(), 0)?;
            }
            return Ok(return_address);
        }

        let (initial_pc, local_variables) = self.routine_header(address)?;
        debug!(target: "app::state", "Call ${:06x} with {:?}, returning to ${:06x}", address, arguments, return_address);
        self.frames.push(Frame::call_routine(
            address,
            arguments,
            local_variables,
            result,
            return_address,
        ));
        Ok(initial_pc)
    }

    /// Return from the current routine
    ///
    /// Returning from the main routine halts the machine.
    ///
    /// # Arguments
    /// * `value` - Return value
    ///
    /// # Returns
    /// [Result] with the [NextAddress] or a [RuntimeError]
    pub fn return_routine(&mut self, value: u16) -> Result<NextAddress, RuntimeError> {
        match self.frames.len() {
            0 => fatal_error!(ErrorCode::ReturnNoCaller, "Return with no call frame"),
            1 => {
                info!(target: "app::state", "Return from the main routine");
                Ok(NextAddress::Quit)
            }
            _ => {
                let frame = self.current_frame()?.clone();
                self.frames.pop();
                debug!(target: "app::state", "Return {:04x} to ${:06x} -> {:?}", value, frame.return_address(), frame.result());
                if let Some(r) = frame.result() {
                    self.set_variable(r.variable(), value)?;
                }
                Ok(NextAddress::Address(frame.return_address()))
            }
        }
    }

    /// Unwind to a frame depth returned by `catch` and return from it
    pub fn throw(&mut self, depth: u16, value: u16) -> Result<NextAddress, RuntimeError> {
        let depth = depth as usize;
        if depth == 0 || depth > self.frames.len() {
            return fatal_error!(
                ErrorCode::FrameUnderflow,
                "Throw to frame {}, only {} frames",
                depth,
                self.frames.len()
            );
        }

        self.frames.truncate(depth);
        self.return_routine(value)
    }

    // RNG
    pub fn random(&mut self, range: u16) -> u16 {
        self.rng.random(range)
    }

    /// Reseed, 0 seeds from entropy
    pub fn seed(&mut self, seed: u64) {
        self.rng.seed(seed)
    }

    pub fn predictable(&mut self, seed: u16) {
        self.rng.predictable(seed)
    }

    /// Reseed with the configured seed, or from entropy when there isn't one
    pub fn reseed(&mut self) {
        self.rng.seed(self.random_seed.unwrap_or(0))
    }

    // Output
    fn is_stream_enabled(&self, stream: u8) -> bool {
        let mask = 1 << (stream - 1);
        self.output_streams & mask == mask
    }

    /// Print ZSCII text to the active output streams
    pub fn print(&mut self, text: &[u16]) -> Result<(), RuntimeError> {
        if self.is_stream_enabled(3) {
            match self.stream_3.last_mut() {
                Some(s) => {
                    for c in text {
                        match *c {
                            0 => {}
                            0x0A => s.buffer.push(0x0D),
                            _ => s.buffer.push(*c),
                        }
                    }
                    Ok(())
                }
                None => fatal_error!(
                    ErrorCode::Stream3Table,
                    "Stream 3 enabled without a table"
                ),
            }
        } else {
            if self.is_stream_enabled(1) {
                self.screen.print(text);
            }
            if self.is_stream_enabled(2) && self.screen.selected_window() == 0 {
                let s = text
                    .iter()
                    .filter_map(|c| text::zscii_to_char(*c))
                    .collect::<String>();
                self.transcript(&s)?;
            }
            Ok(())
        }
    }

    pub fn print_str(&mut self, s: &str) -> Result<(), RuntimeError> {
        self.print(&text::str_to_zscii(s))
    }

    pub fn new_line(&mut self) -> Result<(), RuntimeError> {
        self.print(&[0x0D])
    }

    fn transcript(&mut self, s: &str) -> Result<(), RuntimeError> {
        if let Some(f) = self.stream_2.as_mut() {
            if let Err(e) = f.write_all(s.as_bytes()) {
                return recoverable_error!(ErrorCode::Transcript, "Transcript write: {}", e);
            }
        }
        Ok(())
    }

    /// Copy a command line into the transcript
    pub fn transcript_input(&mut self, line: &str) -> Result<(), RuntimeError> {
        if self.is_stream_enabled(2) {
            self.transcript(&format!("{}\n", line))
        } else {
            Ok(())
        }
    }

    pub fn transcript_path(&self) -> PathBuf {
        files::data_path(self.save_directory.as_deref(), &self.name, "transcript")
    }

    fn start_transcript(&mut self) -> Result<(), RuntimeError> {
        if self.stream_2.is_none() {
            let path = self.transcript_path();
            info!(target: "app::stream", "Transcript to {}", path.display());
            self.stream_2 = Some(files::append_file(&path)?);
        }
        self.output_streams |= 0x2;
        Ok(())
    }

    /// Select or deselect an output stream
    ///
    /// # Arguments
    /// * `stream` - Stream number, negative to deselect
    /// * `table` - Table address for stream 3
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError]
    pub fn output_stream(&mut self, stream: i16, table: Option<usize>) -> Result<(), RuntimeError> {
        info!(target: "app::stream", "Output stream {} {:?}", stream, table);
        match stream {
            0 => Ok(()),
            1 => {
                self.output_streams |= 0x1;
                Ok(())
            }
            2 => {
                self.start_transcript()?;
                header::update_flags2(&mut self.memory, flags2::TRANSCRIPTING, 0)
            }
            3 => match table {
                Some(address) => {
                    if self.stream_3.len() == STREAM_3_DEPTH {
                        return fatal_error!(
                            ErrorCode::Stream3Table,
                            "Stream 3 nested more than {} deep",
                            STREAM_3_DEPTH
                        );
                    }
                    self.stream_3.push(Stream3 {
                        address,
                        buffer: Vec::new(),
                    });
                    self.output_streams |= 0x4;
                    Ok(())
                }
                None => fatal_error!(ErrorCode::Stream3Table, "Stream 3 selected without a table"),
            },
            // Stream 4 (command script) isn't kept, there is no input to record beyond the transcript
            4 | -4 => Ok(()),
            -1 => {
                self.output_streams &= !0x1;
                Ok(())
            }
            -2 => {
                self.output_streams &= !0x2;
                header::update_flags2(&mut self.memory, 0, flags2::TRANSCRIPTING)
            }
            -3 => {
                if let Some(s) = self.stream_3.pop() {
                    self.write_word(s.address, s.buffer.len() as u16)?;
                    for (i, c) in s.buffer.iter().enumerate() {
                        self.write_byte(s.address + 2 + i, *c as u8)?;
                    }
                }
                if self.stream_3.is_empty() {
                    self.output_streams &= !0x4;
                }
                Ok(())
            }
            _ => recoverable_error!(
                ErrorCode::InvalidOutputStream,
                "Output stream {} is not valid",
                stream
            ),
        }
    }

    // Screen
    pub fn rows(&self) -> u8 {
        self.screen.rows()
    }

    pub fn columns(&self) -> u8 {
        self.screen.columns()
    }

    pub fn selected_window(&self) -> u8 {
        self.screen.selected_window()
    }

    pub fn split_window(&mut self, lines: u16) {
        self.screen.split_window(lines)
    }

    pub fn set_window(&mut self, window: u16) -> Result<(), RuntimeError> {
        self.screen.set_window(window)
    }

    pub fn erase_window(&mut self, window: i16) -> Result<(), RuntimeError> {
        self.screen.erase_window(window)
    }

    pub fn erase_line(&mut self, value: u16) {
        self.screen.erase_line(value)
    }

    pub fn set_cursor(&mut self, row: u16, column: u16) {
        self.screen.set_cursor(row, column)
    }

    pub fn cursor(&self) -> (u16, u16) {
        self.screen.cursor()
    }

    pub fn set_text_style(&mut self, style: u16) {
        self.screen.set_style(style)
    }

    pub fn buffer_mode(&mut self, mode: u16) {
        self.screen.buffer_mode(mode)
    }

    pub fn set_colours(&mut self, foreground: u16, background: u16) {
        self.screen.set_colours(foreground, background)
    }

    pub fn set_font(&mut self, font: u16) -> u16 {
        self.screen.set_font(font)
    }

    /// Redraw the V3 status line from globals 0-2
    pub fn status_line(&mut self) -> Result<(), RuntimeError> {
        let location = self.peek_variable(16)? as usize;
        let name = if location == 0 {
            String::new()
        } else {
            let ztext = property::short_name(self, location)?;
            text::from_vec(self, &ztext, false)?
                .iter()
                .filter_map(|c| text::zscii_to_char(*c))
                .collect()
        };

        let right = if !header::has_flags1(&self.memory, flags1_v3::STATUS_LINE_TIME)? {
            let score = self.peek_variable(17)? as i16;
            let moves = self.peek_variable(18)?;
            format!("Score: {}  Moves: {}", score, moves)
        } else {
            let hour = self.peek_variable(17)? % 24;
            let minute = self.peek_variable(18)?;
            let suffix = if hour > 11 { "PM" } else { "AM" };
            let h = match hour % 12 {
                0 => 12,
                h => h,
            };
            format!("Time: {}:{:02} {}", h, minute, suffix)
        };

        debug!(target: "app::screen", "Status: {} / {}", name, right);
        self.screen.set_status_line(&name, &right);
        Ok(())
    }

    /// Take the story text printed since the last call
    pub fn flush(&mut self) -> String {
        self.screen.flush()
    }

    pub fn status_text(&self) -> String {
        self.screen.status_text()
    }

    /// Object number of the current location, from global 0
    pub fn location(&self) -> Option<u16> {
        match self.peek_variable(16) {
            Ok(0) | Err(_) => None,
            Ok(o) => Some(o),
        }
    }

    // Input
    pub fn set_input(&mut self, line: &str) {
        self.input = Some(line.to_string());
    }

    pub fn take_input(&mut self) -> Option<String> {
        self.input.take()
    }

    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    // Save, restore, undo
    fn ifhd(&self, pc: usize) -> Result<IFhd, RuntimeError> {
        Ok(IFhd::new(
            self.header_word(HeaderField::Release)?,
            &header::serial(&self.memory),
            self.header_word(HeaderField::Checksum)?,
            (pc as u32) & 0xFFFFFF,
        ))
    }

    /// Serialize the machine state as a Quetzal file
    ///
    /// # Arguments
    /// * `pc` - Address to resume at: the branch or store byte of an in-game save,
    /// or the read instruction for a save taken while waiting for input
    /// * `at_input` - `true` when saving while waiting for input
    ///
    /// # Returns
    /// [Result] with the Quetzal file data or a [RuntimeError]
    pub fn save_state(&self, pc: usize, at_input: bool) -> Result<Vec<u8>, RuntimeError> {
        let now = OffsetDateTime::now_utc();
        let quetzal = Quetzal::try_from((self, pc))?
            .with_intd(IntD::new(vec![at_input as u8]))
            .with_annotation(&format!("Saved by zline {} at {}", env!("CARGO_PKG_VERSION"), now));
        Ok(Vec::from(&quetzal))
    }

    /// Replace the machine state from a Quetzal state.
    ///
    /// The save is checked against the story before anything changes.
    ///
    /// # Returns
    /// [Result] with (saved PC, saved while waiting for input) or a [RuntimeError]
    fn apply_quetzal(&mut self, quetzal: &Quetzal) -> Result<(usize, bool), RuntimeError> {
        let current = self.ifhd(0)?;
        if !current.same_story(quetzal.ifhd()) {
            return recoverable_error!(
                ErrorCode::Restore,
                "Saved game is for a different story: {}",
                quetzal.ifhd()
            );
        }

        let dynamic = if quetzal.mem().compressed() {
            self.memory.decompress(quetzal.mem().memory())?
        } else {
            quetzal.mem().memory().to_vec()
        };
        if dynamic.len() != self.memory.dynamic().len() {
            return recoverable_error!(
                ErrorCode::Restore,
                "Saved dynamic memory is {} bytes, story has {}",
                dynamic.len(),
                self.memory.dynamic().len()
            );
        }

        let frames = Vec::<Frame>::from(quetzal.stks());
        if frames.is_empty() {
            return recoverable_error!(ErrorCode::Restore, "Saved game has no call frames");
        }

        let kept = self.header_word(HeaderField::Flags2)? & KEPT_FLAGS2;
        self.memory.restore(&dynamic)?;
        self.frames = frames;
        self.stream_3.clear();
        self.output_streams &= !0x4;
        self.input = None;
        self.initialize()?;
        header::update_flags2(&mut self.memory, kept, KEPT_FLAGS2 & !kept)?;

        let at_input = quetzal
            .intd()
            .map_or(false, |i| i.is_ours() && i.data() == [1]);
        info!(target: "app::quetzal", "Restored state @ ${:06x}", quetzal.ifhd().pc());
        Ok((quetzal.ifhd().pc() as usize, at_input))
    }

    /// Apply a Quetzal state and work out where to continue.
    ///
    /// On any error, including a saved PC that doesn't lead anywhere, the live
    /// memory, frames and output streams are put back as they were.
    ///
    /// # Arguments
    /// * `quetzal` - State to restore
    /// * `undo` - `true` for an undo state, which always resumes after `save_undo`
    fn restore_quetzal(
        &mut self,
        quetzal: &Quetzal,
        undo: bool,
    ) -> Result<NextAddress, RuntimeError> {
        let dynamic = self.memory.dynamic().to_vec();
        let frames = self.frames.clone();
        let output_streams = self.output_streams;
        let stream_3 = std::mem::take(&mut self.stream_3);
        let input = self.input.clone();

        let result = self
            .apply_quetzal(quetzal)
            .and_then(|(pc, at_input)| self.resume(pc, at_input && !undo));
        if let Err(e) = &result {
            warn!(target: "app::quetzal", "Restore failed, rolling back: {}", e);
            self.memory.restore(&dynamic)?;
            self.frames = frames;
            self.output_streams = output_streams;
            self.stream_3 = stream_3;
            self.input = input;
        }
        result
    }

    /// Restore the machine state from Quetzal data
    ///
    /// # Returns
    /// [Result] with the [NextAddress] to continue from or a [RuntimeError], in which
    /// case the machine is unchanged
    pub fn restore_state(&mut self, data: &[u8]) -> Result<NextAddress, RuntimeError> {
        let quetzal = Quetzal::try_from(data)?;
        self.restore_quetzal(&quetzal, false)
    }

    /// Work out where to continue after a restore
    ///
    /// # Arguments
    /// * `pc` - Saved PC
    /// * `at_input` - The state was saved while waiting for input
    ///
    /// # Returns
    /// [Result] with the [NextAddress] or a [RuntimeError]
    pub fn resume(&mut self, pc: usize, at_input: bool) -> Result<NextAddress, RuntimeError> {
        if at_input {
            // Run the read instruction again
            self.read_byte(pc)?;
            Ok(NextAddress::Address(pc))
        } else if self.version() == 3 {
            // Saved PC is the branch data of the save instruction, which succeeded
            let (next, branch) = decoder::decode_branch(self, pc)?;
            if branch.condition() {
                match branch.branch_address() {
                    0 => self.return_routine(0),
                    1 => self.return_routine(1),
                    a => Ok(NextAddress::Address(a)),
                }
            } else {
                Ok(NextAddress::Address(next))
            }
        } else {
            // Saved PC is the store byte of the save instruction
            let variable = self.read_byte(pc)?;
            self.set_variable(variable, 2)?;
            Ok(NextAddress::Address(pc + 1))
        }
    }

    fn save_path(&self) -> PathBuf {
        files::data_path(self.save_directory.as_deref(), &self.name, "ifzs")
    }

    /// In-game save to the story's save file
    pub fn save(&mut self, pc: usize) -> Result<(), RuntimeError> {
        let data = self.save_state(pc, false)?;
        files::write_file(&self.save_path(), &data, ErrorCode::Save)
    }

    /// In-game restore from the story's save file
    pub fn restore(&mut self) -> Result<NextAddress, RuntimeError> {
        let data = files::read_file(&self.save_path(), ErrorCode::Restore)?;
        self.restore_state(&data)
    }

    /// Save the state to a file while waiting for input
    pub fn save_to(&mut self, path: &Path) -> Result<(), RuntimeError> {
        let data = self.save_state(self.pc, true)?;
        files::write_file(path, &data, ErrorCode::Save)
    }

    /// Restore the state from a file and set the PC to continue from
    pub fn restore_from(&mut self, path: &Path) -> Result<(), RuntimeError> {
        let data = files::read_file(path, ErrorCode::Restore)?;
        match self.restore_state(&data)? {
            NextAddress::Address(a) => {
                self.pc = a;
                self.halted = false;
            }
            NextAddress::Input => self.halted = false,
            NextAddress::Quit => self.halted = true,
        }
        Ok(())
    }

    /// Keep an undo state
    ///
    /// # Arguments
    /// * `pc` - Address of the store byte of the `save_undo` instruction
    ///
    /// # Returns
    /// [Result] with `true` if the state was kept, `false` if undo is disabled, or a [RuntimeError]
    pub fn save_undo(&mut self, pc: usize) -> Result<bool, RuntimeError> {
        if self.undo_depth == 0 {
            return Ok(false);
        }

        let quetzal = Quetzal::try_from((&*self, pc))?;
        self.undo_stack.push_back(quetzal);
        while self.undo_stack.len() > self.undo_depth {
            self.undo_stack.pop_front();
        }
        debug!(target: "app::quetzal", "Undo states: {}", self.undo_stack.len());
        Ok(true)
    }

    /// Go back to the most recent undo state
    ///
    /// # Returns
    /// [Result] with the [NextAddress] following the `save_undo` instruction or a [RuntimeError]
    pub fn restore_undo(&mut self) -> Result<NextAddress, RuntimeError> {
        match self.undo_stack.pop_back() {
            Some(quetzal) => match self.restore_quetzal(&quetzal, true) {
                Ok(next) => Ok(next),
                Err(e) => {
                    self.undo_stack.push_back(quetzal);
                    Err(e)
                }
            },
            None => recoverable_error!(ErrorCode::UndoNoState, "No undo state"),
        }
    }

    /// Restart the story from the pristine image
    ///
    /// # Returns
    /// [Result] with the initial PC or a [RuntimeError]
    pub fn restart(&mut self) -> Result<usize, RuntimeError> {
        let kept = self.header_word(HeaderField::Flags2)? & KEPT_FLAGS2;
        self.memory.reset();
        self.frames.clear();
        self.stream_3.clear();
        self.output_streams &= !0x4;
        self.input = None;
        self.screen.reset();
        self.initialize()?;
        header::update_flags2(&mut self.memory, kept, KEPT_FLAGS2 & !kept)?;
        self.reseed();
        self.halted = false;
        self.pc = self.header_word(HeaderField::InitialPC)? as usize;
        info!(target: "app::state", "Restart @ ${:04x}", self.pc);
        Ok(self.pc)
    }

    /// Deal with a recoverable error per the configured [ErrorHandling]
    fn recover(&mut self, error: RuntimeError) -> Result<(), RuntimeError> {
        warn!(target: "app::state", "{}", error);
        let report = match self.error_handling {
            ErrorHandling::Abort => return Err(error),
            ErrorHandling::Ignore => false,
            ErrorHandling::ContinueWarnAlways => true,
            ErrorHandling::ContinueWarnOnce => self.errors.insert(error.code()),
        };
        if report {
            self.screen.diagnostic(&format!("[{}]", error));
        }
        Ok(())
    }

    /// Execute instructions until the story needs input or halts
    ///
    /// # Returns
    /// [Result] with [NextAddress::Input] or [NextAddress::Quit], or the [RuntimeError] that stopped the machine
    pub fn run(&mut self) -> Result<NextAddress, RuntimeError> {
        if self.halted {
            return Ok(NextAddress::Quit);
        }

        loop {
            self.instruction_count += 1;
            log_mdc::insert("instruction_count", format!("{:8x}", self.instruction_count));
            let instruction = match decoder::decode_instruction(self, self.pc) {
                Ok(i) => i,
                Err(e) => {
                    error!(target: "app::state", "{} @ ${:06x}", e, self.pc);
                    self.halted = true;
                    return Err(e);
                }
            };
            match processor::dispatch(self, &instruction) {
                Ok(NextAddress::Address(a)) => self.pc = a,
                Ok(NextAddress::Input) => return Ok(NextAddress::Input),
                Ok(NextAddress::Quit) => {
                    info!(target: "app::state", "Halted after {} instructions", self.instruction_count);
                    self.halted = true;
                    return Ok(NextAddress::Quit);
                }
                Err(e) if e.is_recoverable() => {
                    if let Err(e) = self.recover(e) {
                        self.halted = true;
                        return Err(e);
                    }
                    self.pc = instruction.next_address();
                }
                Err(e) => {
                    error!(target: "app::state", "{} @ ${:06x}", e, self.pc);
                    self.halted = true;
                    return Err(e);
                }
            }
        }
    }

    /// Stop the machine
    pub fn halt(&mut self) {
        self.halted = true;
    }
}
