//! A two-room version 3 story, assembled in memory
#![allow(dead_code)]

use std::collections::HashMap;

pub const TEXT_BUFFER: u16 = 0x2C0;
pub const PARSE_BUFFER: u16 = 0x300;

const GLOBALS: usize = 0x40;
const OBJECT_TABLE: usize = 0x220;
const STATIC_MARK: usize = 0x340;
const DICTIONARY: usize = 0x340;
const CODE: usize = 0x400;

/// Globals used by the story
pub const LOCATION: u8 = 0x10;
pub const MOVES: u8 = 0x12;
pub const WORD: u8 = 0x13;

pub const ROOMS: [&str; 2] = ["West of House", "North of House"];
pub const WORDS: [&str; 6] = ["look", "north", "quit", "restore", "save", "south"];

const A2: &str = "0123456789.,!?_#'\"/\\-:()";

fn zchars(text: &str) -> Vec<u8> {
    let mut z = Vec::new();
    for c in text.chars() {
        match c {
            ' ' => z.push(0),
            'a'..='z' => z.push(c as u8 - b'a' + 6),
            'A'..='Z' => {
                z.push(4);
                z.push(c as u8 - b'A' + 6);
            }
            _ => match A2.find(c) {
                Some(i) => {
                    z.push(5);
                    z.push(i as u8 + 8);
                }
                None => {
                    let zscii = c as u8;
                    z.extend_from_slice(&[5, 6, zscii >> 5, zscii & 0x1F]);
                }
            },
        }
    }
    z
}

fn pack(z: &[u8]) -> Vec<u8> {
    let words = z.len() / 3;
    let mut bytes = Vec::new();
    for (i, c) in z.chunks(3).enumerate() {
        let mut w = ((c[0] as u16) << 10) | ((c[1] as u16) << 5) | c[2] as u16;
        if i == words - 1 {
            w |= 0x8000;
        }
        bytes.push((w >> 8) as u8);
        bytes.push(w as u8);
    }
    bytes
}

/// Encode text as Z-characters
pub fn encode(text: &str) -> Vec<u8> {
    let mut z = zchars(text);
    while z.is_empty() || z.len() % 3 != 0 {
        z.push(5);
    }
    pack(&z)
}

fn dictionary_word(word: &str) -> Vec<u8> {
    let mut z = zchars(word);
    z.resize(6, 5);
    pack(&z)
}

/// Instruction assembler with forward labels
pub struct Assembler {
    code: Vec<u8>,
    labels: HashMap<String, usize>,
    branches: Vec<(usize, String, bool)>,
    jumps: Vec<(usize, String)>,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler {
            code: Vec::new(),
            labels: HashMap::new(),
            branches: Vec::new(),
            jumps: Vec::new(),
        }
    }

    fn address(&self) -> usize {
        CODE + self.code.len()
    }

    fn word(&mut self, w: u16) {
        self.code.push((w >> 8) as u8);
        self.code.push(w as u8);
    }

    fn branch(&mut self, label: &str, condition: bool) {
        self.branches
            .push((self.code.len(), label.to_string(), condition));
        self.code.extend_from_slice(&[0, 0]);
    }

    pub fn label(&mut self, name: &str) -> &mut Self {
        let a = self.address();
        self.labels.insert(name.to_string(), a);
        self
    }

    pub fn print(&mut self, text: &str) -> &mut Self {
        self.code.push(0xB2);
        self.code.extend(encode(text));
        self
    }

    pub fn new_line(&mut self) -> &mut Self {
        self.code.push(0xBB);
        self
    }

    pub fn quit(&mut self) -> &mut Self {
        self.code.push(0xBA);
        self
    }

    pub fn print_obj(&mut self, variable: u8) -> &mut Self {
        self.code.extend_from_slice(&[0xAA, variable]);
        self
    }

    pub fn inc(&mut self, variable: u8) -> &mut Self {
        self.code.extend_from_slice(&[0x95, variable]);
        self
    }

    pub fn store(&mut self, variable: u8, value: u8) -> &mut Self {
        self.code.extend_from_slice(&[0x0D, variable, value]);
        self
    }

    /// `je variable small ?label`
    pub fn je(&mut self, variable: u8, value: u8, label: &str) -> &mut Self {
        self.code.extend_from_slice(&[0x41, variable, value]);
        self.branch(label, true);
        self
    }

    /// `je variable large ?label`
    pub fn je_word(&mut self, variable: u8, value: u16, label: &str) -> &mut Self {
        self.code.extend_from_slice(&[0xC1, 0x8F, variable]);
        self.word(value);
        self.branch(label, true);
        self
    }

    pub fn sread(&mut self, text: u16, parse: u16) -> &mut Self {
        self.code.extend_from_slice(&[0xE4, 0x0F]);
        self.word(text);
        self.word(parse);
        self
    }

    /// `loadw array index -> variable`
    pub fn loadw(&mut self, array: u16, index: u8, variable: u8) -> &mut Self {
        self.code.extend_from_slice(&[0xCF, 0x1F]);
        self.word(array);
        self.code.extend_from_slice(&[index, variable]);
        self
    }

    /// `loadb array index -> variable`
    pub fn loadb(&mut self, array: u16, index: u8, variable: u8) -> &mut Self {
        self.code.extend_from_slice(&[0xD0, 0x1F]);
        self.word(array);
        self.code.extend_from_slice(&[index, variable]);
        self
    }

    pub fn jump(&mut self, label: &str) -> &mut Self {
        self.code.push(0x8C);
        self.jumps.push((self.code.len(), label.to_string()));
        self.word(0);
        self
    }

    pub fn save(&mut self, label: &str) -> &mut Self {
        self.code.push(0xB5);
        self.branch(label, true);
        self
    }

    pub fn restore(&mut self, label: &str) -> &mut Self {
        self.code.push(0xB6);
        self.branch(label, true);
        self
    }

    /// Resolve labels
    pub fn finish(mut self) -> Vec<u8> {
        for (offset, label, condition) in self.branches.iter() {
            let target = self.labels[label] as isize;
            let next = (CODE + offset + 2) as isize;
            let o = (target - next + 2) as u16 & 0x3FFF;
            self.code[*offset] = if *condition { 0x80 } else { 0 } | (o >> 8) as u8;
            self.code[offset + 1] = o as u8;
        }
        for (offset, label) in self.jumps.iter() {
            let target = self.labels[label] as isize;
            let next = (CODE + offset + 2) as isize;
            let o = (target - next + 2) as u16;
            self.code[*offset] = (o >> 8) as u8;
            self.code[offset + 1] = o as u8;
        }
        self.code
    }
}

/// Dictionary entries, sorted by encoded word
fn dictionary() -> (Vec<u8>, HashMap<&'static str, u16>) {
    let mut entries = WORDS
        .iter()
        .map(|w| (*w, dictionary_word(w)))
        .collect::<Vec<(&str, Vec<u8>)>>();
    entries.sort_by(|a, b| a.1.cmp(&b.1));

    let mut data = vec![1, b',', 7, 0, entries.len() as u8];
    let mut addresses = HashMap::new();
    for (word, encoded) in entries {
        addresses.insert(word, (DICTIONARY + data.len()) as u16);
        data.extend(encoded);
        data.extend_from_slice(&[0, 0, 0]);
    }
    (data, addresses)
}

fn program(words: &HashMap<&str, u16>) -> Vec<u8> {
    let mut a = Assembler::new();
    a.print("Welcome to the Test House.")
        .new_line()
        .store(LOCATION, 1)
        .label("describe")
        .print_obj(LOCATION)
        .new_line()
        .je(LOCATION, 2, "north-description")
        .print("You are west of a white house.")
        .new_line()
        .jump("prompt")
        .label("north-description")
        .print("You face the north side of the house.")
        .new_line()
        .label("prompt")
        .print(">")
        .sread(TEXT_BUFFER, PARSE_BUFFER)
        .inc(MOVES)
        .loadb(PARSE_BUFFER, 1, WORD)
        .je(WORD, 0, "unknown")
        .loadw(PARSE_BUFFER, 1, WORD)
        .je_word(WORD, words["look"], "describe")
        .je_word(WORD, words["north"], "go-north")
        .je_word(WORD, words["south"], "go-south")
        .je_word(WORD, words["save"], "save")
        .je_word(WORD, words["restore"], "restore")
        .je_word(WORD, words["quit"], "quit")
        .label("unknown")
        .print("I don't know that word.")
        .new_line()
        .jump("prompt")
        .label("go-north")
        .je(LOCATION, 2, "blocked")
        .store(LOCATION, 2)
        .jump("describe")
        .label("go-south")
        .je(LOCATION, 1, "blocked")
        .store(LOCATION, 1)
        .jump("describe")
        .label("blocked")
        .print("You can't go that way.")
        .new_line()
        .jump("prompt")
        .label("save")
        .save("saved")
        .print("Failed.")
        .new_line()
        .jump("prompt")
        .label("saved")
        .print("Ok.")
        .new_line()
        .jump("prompt")
        .label("restore")
        .restore("saved")
        .print("Failed.")
        .new_line()
        .jump("prompt")
        .label("quit")
        .print("Goodbye.")
        .new_line()
        .quit();
    a.finish()
}

fn set_word(map: &mut [u8], address: usize, value: u16) {
    map[address] = (value >> 8) as u8;
    map[address + 1] = value as u8;
}

/// Build the story with a serial number
pub fn story_with_serial(serial: &str) -> Vec<u8> {
    let (dictionary, words) = dictionary();
    let code = program(&words);
    let mut map = vec![0; CODE + code.len() + (code.len() % 2)];

    map[0] = 3;
    set_word(&mut map, 0x02, 1);
    set_word(&mut map, 0x04, CODE as u16);
    set_word(&mut map, 0x06, CODE as u16);
    set_word(&mut map, 0x08, DICTIONARY as u16);
    set_word(&mut map, 0x0A, OBJECT_TABLE as u16);
    set_word(&mut map, 0x0C, GLOBALS as u16);
    set_word(&mut map, 0x0E, STATIC_MARK as u16);
    map[0x12..0x18].copy_from_slice(&serial.as_bytes()[0..6]);

    // Two rooms, no defaults, no properties
    let mut properties = OBJECT_TABLE + 62 + (ROOMS.len() * 9);
    for (i, room) in ROOMS.iter().enumerate() {
        let entry = OBJECT_TABLE + 62 + (i * 9);
        set_word(&mut map, entry + 7, properties as u16);
        let name = encode(room);
        map[properties] = (name.len() / 2) as u8;
        map[properties + 1..properties + 1 + name.len()].copy_from_slice(&name);
        properties += name.len() + 2;
    }

    map[TEXT_BUFFER as usize] = 40;
    map[PARSE_BUFFER as usize] = 8;
    map[DICTIONARY..DICTIONARY + dictionary.len()].copy_from_slice(&dictionary);
    map[CODE..CODE + code.len()].copy_from_slice(&code);

    let length = map.len();
    set_word(&mut map, 0x1A, (length / 2) as u16);
    let checksum = map[0x40..]
        .iter()
        .fold(0u16, |s, b| s.wrapping_add(*b as u16));
    set_word(&mut map, 0x1C, checksum);
    map
}

pub fn story() -> Vec<u8> {
    story_with_serial("260101")
}
