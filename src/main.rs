#[macro_use]
extern crate log;

use std::env;
use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use zline::{config::Config, files, text, Interpreter};

fn initialize_config() -> Config {
    if let Some(filename) = files::config_file("config.yml") {
        match File::open(&filename) {
            Ok(f) => match Config::try_from(f) {
                Ok(config) => config,
                Err(e) => {
                    info!(target: "app::trace", "Error parsing configuration from {}: {}", filename.display(), e);
                    Config::default()
                }
            },
            Err(e) => {
                info!(target: "app::trace", "Error reading configuration from {}: {}", filename.display(), e);
                Config::default()
            }
        }
    } else {
        Config::default()
    }
}

fn initialize_logging(config: &Config, name: &str) {
    if !config.logging() {
        return;
    }

    if let Some(filename) = files::config_file("log4rs.yml") {
        if log4rs::init_file(filename, Default::default()).is_ok() {
            log_mdc::insert("instruction_count", format!("{:8x}", 0));
        }

        info!(target: "app::instruction", "Start instruction log for '{}'", name);
        info!(target: "app::screen", "Start screen log for '{}'", name);
        info!(target: "app::state", "Start state log for '{}'", name);
        info!(target: "app::stream", "Start stream log for '{}'", name);
        info!(target: "app::state", "Configuration: {:?}", config);
    }
}

struct Host {
    interpreter: Interpreter,
    plain: bool,
    autosave: Option<PathBuf>,
    status: String,
}

impl Host {
    fn show(&mut self, text: &str) {
        if !self.plain {
            let status = self.interpreter.status();
            if !status.trim().is_empty() && status != self.status {
                println!("[{}]", status.trim_end());
            }
            self.status = status;
            print!("{}", text);
        } else {
            match text::speech_text(text) {
                Ok(t) if t.is_empty() => (),
                Ok(t) => println!("{}", t),
                Err(e) => {
                    error!(target: "app::trace", "Speech text: {}", e);
                    print!("{}", text);
                }
            }
        }
        if let Err(e) = io::stdout().flush() {
            warn!(target: "app::trace", "Flush stdout: {}", e);
        }
    }

    fn autosave(&mut self) {
        if let Some(path) = self.autosave.clone() {
            if !self.interpreter.save_game(&path) {
                warn!(target: "app::trace", "Autosave to {} failed", path.display());
            }
        }
    }

    /// Handle a `/` command
    ///
    /// # Returns
    /// `false` to end the session
    fn meta_command(&mut self, line: &str) -> bool {
        let mut words = line.splitn(2, ' ');
        let command = words.next().unwrap_or_default();
        let argument = words.next().map(|a| a.trim()).unwrap_or_default();
        match (command, argument) {
            ("/quit", _) => return false,
            ("/status", _) => println!("{}", self.interpreter.status().trim_end()),
            ("/save", "") | ("/restore", "") => println!("Usage: {} <file>", command),
            ("/save", path) => {
                if self.interpreter.save_game(Path::new(path)) {
                    println!("Saved to {}", path);
                } else {
                    println!("Save to {} failed", path);
                }
            }
            ("/restore", path) => {
                if self.interpreter.restore_game(Path::new(path)) {
                    println!("Restored from {}", path);
                    let text = self.interpreter.run();
                    self.show(&text);
                } else {
                    println!("Restore from {} failed", path);
                }
            }
            _ => println!("Commands: /save <file>, /restore <file>, /status, /quit"),
        }
        true
    }

    fn run(&mut self) {
        let text = self.interpreter.run();
        self.show(&text);

        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        while self.interpreter.is_running() {
            let line = match lines.next() {
                Some(Ok(l)) => l,
                Some(Err(e)) => {
                    error!(target: "app::trace", "Reading stdin: {}", e);
                    break;
                }
                None => break,
            };

            if line.starts_with('/') {
                if !self.meta_command(line.trim()) {
                    break;
                }
                continue;
            }

            self.interpreter.input(&line);
            let text = self.interpreter.run();
            self.show(&text);
            if self.interpreter.is_running() {
                self.autosave();
            } else if let Some(path) = &self.autosave {
                // Finished games start over next time
                if let Err(e) = fs::remove_file(path) {
                    debug!(target: "app::trace", "Remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let filename = match args.iter().skip(1).find(|a| !a.starts_with("--")) {
        Some(f) => f.clone(),
        None => {
            eprintln!("Usage: zline <story file> [--plain]");
            return ExitCode::FAILURE;
        }
    };
    let plain = args.iter().any(|a| a == "--plain");
    let name = files::story_name(&filename);
    let config = initialize_config();
    initialize_logging(&config, &name);

    let data = match fs::read(&filename) {
        Ok(d) => d,
        Err(e) => {
            error!(target: "app::trace", "Error reading {}: {}", filename, e);
            eprintln!("Error reading {}: {}", filename, e);
            return ExitCode::FAILURE;
        }
    };

    let mut interpreter = Interpreter::with_config(data, &name, &config);
    if let Some(e) = interpreter.load_error() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let autosave = if config.autosave() {
        let path = files::data_path(config.save_directory(), &name, "autosave");
        if path.exists() {
            if interpreter.restore_game(&path) {
                info!(target: "app::trace", "Resumed from {}", path.display());
            } else {
                eprintln!("Could not resume from {}, starting over", path.display());
            }
        }
        Some(path)
    } else {
        None
    };

    let mut host = Host {
        interpreter,
        plain,
        autosave,
        status: String::new(),
    };
    host.run();
    ExitCode::SUCCESS
}
