//! Line-at-a-time host API
//!
//! A host hands over the story file once, then alternates between [Interpreter::run] to
//! collect text and [Interpreter::input] to send the player's next command.
use std::path::Path;

use crate::{
    config::Config,
    error::RuntimeError,
    instruction::NextAddress,
    zmachine::{memory::Memory, ZMachine},
};

pub struct Interpreter {
    zmachine: Option<ZMachine>,
    /// Why the story couldn't be loaded
    load_error: Option<RuntimeError>,
    /// Story text produced since the last [Interpreter::run]
    output: String,
    /// The machine is suspended on a read
    waiting: bool,
}

impl Interpreter {
    /// Load a story with the default configuration
    ///
    /// # Arguments
    /// * `bytes` - Story file contents
    pub fn new(bytes: Vec<u8>) -> Interpreter {
        Interpreter::with_config(bytes, "story", &Config::default())
    }

    /// Load a story
    ///
    /// Load failures are kept and reported by [Interpreter::run]; the interpreter is
    /// never running in that case.
    ///
    /// # Arguments
    /// * `bytes` - Story file contents
    /// * `name` - Story name, used to name save and transcript files
    /// * `config` - Runtime [Config]
    pub fn with_config(bytes: Vec<u8>, name: &str, config: &Config) -> Interpreter {
        let zmachine = Memory::try_from(bytes).and_then(|m| ZMachine::new(m, config, name));
        match zmachine {
            Ok(z) => Interpreter {
                zmachine: Some(z),
                load_error: None,
                output: String::new(),
                waiting: false,
            },
            Err(e) => {
                error!(target: "app::state", "Loading {}: {}", name, e);
                Interpreter {
                    zmachine: None,
                    load_error: Some(e),
                    output: String::new(),
                    waiting: false,
                }
            }
        }
    }

    /// The error that stopped the story from loading
    pub fn load_error(&self) -> Option<&RuntimeError> {
        self.load_error.as_ref()
    }

    /// Run the machine up to the next read, collecting its text
    fn step(&mut self) {
        let zmachine = match self.zmachine.as_mut() {
            Some(z) => z,
            None => return,
        };

        let result = zmachine.run();
        self.output.push_str(&zmachine.flush());
        match result {
            Ok(NextAddress::Input) => self.waiting = true,
            Ok(_) => self.waiting = false,
            Err(e) => {
                self.waiting = false;
                if !self.output.is_empty() && !self.output.ends_with('\n') {
                    self.output.push('\n');
                }
                self.output.push_str(&format!("[{}]\n", e));
            }
        }
    }

    /// Execute until the story needs input or stops
    ///
    /// # Returns
    /// Story text since the previous call, possibly empty. Runtime errors appear in
    /// the text as a diagnostic line.
    pub fn run(&mut self) -> String {
        if let Some(e) = &self.load_error {
            return format!("[{}]\n", e);
        }

        if !self.waiting && self.is_running() {
            self.step();
        }
        std::mem::take(&mut self.output)
    }

    /// Send a command line and run to the next read.
    ///
    /// The text produced is returned by the next [Interpreter::run].
    ///
    /// # Arguments
    /// * `line` - Player command, without a line terminator
    pub fn input(&mut self, line: &str) {
        if !self.is_running() {
            return;
        }

        if let Some(zmachine) = self.zmachine.as_mut() {
            zmachine.set_input(line);
            self.waiting = false;
            self.step();
        }
    }

    pub fn is_running(&self) -> bool {
        self.zmachine.as_ref().map_or(false, |z| !z.is_halted())
    }

    /// Save the game to a file
    ///
    /// # Arguments
    /// * `path` - Save file path
    ///
    /// # Returns
    /// `true` if the file was written
    pub fn save_game(&mut self, path: &Path) -> bool {
        match self.zmachine.as_mut() {
            Some(z) => match z.save_to(path) {
                Ok(_) => true,
                Err(e) => {
                    warn!(target: "app::quetzal", "Save to {}: {}", path.display(), e);
                    false
                }
            },
            None => false,
        }
    }

    /// Restore a game saved by [Interpreter::save_game] or the story's own save
    ///
    /// A failed restore leaves the running game untouched.
    ///
    /// # Arguments
    /// * `path` - Save file path
    ///
    /// # Returns
    /// `true` if the game was restored
    pub fn restore_game(&mut self, path: &Path) -> bool {
        match self.zmachine.as_mut() {
            Some(z) => match z.restore_from(path) {
                Ok(_) => {
                    self.waiting = false;
                    true
                }
                Err(e) => {
                    warn!(target: "app::quetzal", "Restore from {}: {}", path.display(), e);
                    false
                }
            },
            None => false,
        }
    }

    /// Start the story again from the beginning
    pub fn restart(&mut self) {
        if let Some(zmachine) = self.zmachine.as_mut() {
            self.output.push_str(&zmachine.flush());
            match zmachine.restart() {
                Ok(_) => self.waiting = false,
                Err(e) => {
                    error!(target: "app::state", "Restart: {}", e);
                    zmachine.halt();
                    self.output.push_str(&format!("[{}]\n", e));
                }
            }
        }
    }

    /// Status line (V3) or upper window text
    pub fn status(&self) -> String {
        self.zmachine
            .as_ref()
            .map_or(String::new(), |z| z.status_text())
    }

    /// Object number of the player's location
    pub fn location(&self) -> Option<u16> {
        self.zmachine.as_ref().and_then(|z| z.location())
    }
}
