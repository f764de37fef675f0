//! [ZSCII](https://inform-fiction.org/zmachine/standards/z1point1/sect03.html) text encoding and
//! [lexical analysis](https://inform-fiction.org/zmachine/standards/z1point1/sect13.html)
use std::sync::OnceLock;

use regex::Regex;

use crate::{
    error::*,
    fatal_error,
    zmachine::{header::HeaderField, ZMachine},
};

/// Version 3+ [alphabets](https://inform-fiction.org/zmachine/standards/z1point1/sect03.html#two)
const ALPHABET: [[char; 26]; 3] = [
    [
        'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
        's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    ],
    [
        'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
        'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    ],
    [
        ' ', '\r', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '.', ',', '!', '?', '_', '#',
        '\'', '"', '/', '\\', '-', ':', '(', ')',
    ],
];

/// Default [Unicode translations](https://inform-fiction.org/zmachine/standards/z1point1/sect03.html#eight)
/// for ZSCII 155-223
const EXTRA_CHARACTERS: [char; 69] = [
    'ä', 'ö', 'ü', 'Ä', 'Ö', 'Ü', 'ß', '»', '«', 'ë', 'ï', 'ÿ', 'Ë', 'Ï', 'á', 'é', 'í', 'ó', 'ú',
    'ý', 'Á', 'É', 'Í', 'Ó', 'Ú', 'Ý', 'à', 'è', 'ì', 'ò', 'ù', 'À', 'È', 'Ì', 'Ò', 'Ù', 'â', 'ê',
    'î', 'ô', 'û', 'Â', 'Ê', 'Î', 'Ô', 'Û', 'å', 'Å', 'ø', 'Ø', 'ã', 'ñ', 'õ', 'Ã', 'Ñ', 'Õ', 'æ',
    'Æ', 'ç', 'Ç', 'þ', 'ð', 'Þ', 'Ð', '£', 'œ', 'Œ', '¡', '¿',
];

/// Map a ZSCII output character to a [char]
///
/// # Arguments
/// * `zscii` - ZSCII character
///
/// # Returns
/// [Option] with the character, or [None] if it has no printable form
pub fn zscii_to_char(zscii: u16) -> Option<char> {
    match zscii {
        13 => Some('\n'),
        32..=126 => Some(zscii as u8 as char),
        155..=223 => Some(EXTRA_CHARACTERS[zscii as usize - 155]),
        _ => None,
    }
}

/// Map an input [char] to ZSCII
///
/// # Arguments
/// * `c` - input character
///
/// # Returns
/// [Option] with the ZSCII value, or [None] if the character can't be represented
pub fn char_to_zscii(c: char) -> Option<u16> {
    match c {
        '\n' | '\r' => Some(13),
        ' '..='~' => Some(c as u16),
        _ => EXTRA_CHARACTERS
            .iter()
            .position(|x| *x == c)
            .map(|i| i as u16 + 155),
    }
}

/// Convert a string to ZSCII, replacing characters with no ZSCII form with `?`
pub fn str_to_zscii(s: &str) -> Vec<u16> {
    s.chars()
        .map(|c| char_to_zscii(c).unwrap_or(b'?' as u16))
        .collect()
}

/// Decode an [abbreviation](https://inform-fiction.org/zmachine/standards/z1point1/sect03.html#three)
///
/// # Arguments
/// * `zmachine` - Reference to the Z-machine
/// * `abbrev_table` - Abbreviation table (1-3)
/// * `index` - Abbreviation index within the table
///
/// # Returns
/// [Result] containing the abbreviation ZSCII text or a [RuntimeError]
fn abbreviation(
    zmachine: &ZMachine,
    abbrev_table: u8,
    index: u8,
) -> Result<Vec<u16>, RuntimeError> {
    let abbreviation_table = zmachine.header_word(HeaderField::AbbreviationsTable)? as usize;
    let entry = (64 * (abbrev_table as usize - 1)) + (index as usize * 2);
    let word_addr = zmachine.read_word(abbreviation_table + entry)? as usize;
    as_text(zmachine, word_addr * 2, true)
}

/// Read encoded text from an address and decode it
///
/// # Arguments
/// * `zmachine` - Reference to the Z-machine
/// * `address` - Address of the text
/// * `is_abbreviation` - `true` when decoding an abbreviation, `false` if not.
///
/// # Returns
/// [Result] containing the decoded ZSCII text or a [RuntimeError]
pub fn as_text(
    zmachine: &ZMachine,
    address: usize,
    is_abbreviation: bool,
) -> Result<Vec<u16>, RuntimeError> {
    from_vec(
        zmachine,
        &zmachine.string_literal(address)?,
        is_abbreviation,
    )
}

/// Decode a vector of encoded text words to ZSCII
///
/// An abbreviation that contains another abbreviation is an error.
///
/// # Arguments:
/// * `zmachine` - Reference to the Z-machine
/// * `ztext` - Encoded text
/// * `is_abbreviation` - `true` when decoding an abbreviation, `false` if not.
///
/// # Returns
/// [Result] containing the decoded ZSCII text or a [RuntimeError]
pub fn from_vec(
    zmachine: &ZMachine,
    ztext: &[u16],
    is_abbreviation: bool,
) -> Result<Vec<u16>, RuntimeError> {
    let mut alphabet_shift: usize = 0;
    let mut s = Vec::new();

    let mut abbrev = 0;
    let mut zscii_read1 = false;
    let mut zscii_read2 = false;
    let mut zscii_b1 = 0;

    for w in ztext {
        let b1 = (w >> 10 & 0x1F) as u8;
        let b2 = (w >> 5 & 0x1F) as u8;
        let b3 = (w & 0x1F) as u8;

        for b in [b1, b2, b3] {
            if abbrev > 0 {
                let mut abbreviation = abbreviation(zmachine, abbrev, b)?;
                s.append(&mut abbreviation);
                abbrev = 0;
            } else if zscii_read1 {
                zscii_b1 = b;
                zscii_read2 = true;
                zscii_read1 = false;
            } else if zscii_read2 {
                let z = (((zscii_b1 as u16) << 5) & 0x3E0) | b as u16;
                s.push(z);
                zscii_read2 = false;
            } else {
                match b {
                    0 => s.push(0x20),
                    1..=3 => {
                        if is_abbreviation {
                            return fatal_error!(
                                ErrorCode::InvalidAbbreviation,
                                "Abbreviations can't nest",
                            );
                        }
                        abbrev = b
                    }
                    4 => alphabet_shift = 1,
                    5 => alphabet_shift = 2,
                    6 if alphabet_shift == 2 => zscii_read1 = true,
                    7 if alphabet_shift == 2 => s.push(13),
                    _ => s.push(ALPHABET[alphabet_shift][b as usize - 6] as u16),
                }
            }

            // Shifts apply to the next character only
            if b != 4 && b != 5 {
                alphabet_shift = 0;
            }
        }
    }

    Ok(s)
}

/// Find the Z-characters for a ZSCII character.
///
/// # Arguments
/// * `zscii` - Character to look up
///
/// # Returns
/// Vector of Z-characters, including any shift. Characters outside the alphabets become a
/// 10-bit ZSCII escape sequence.
fn find_char(zscii: u16) -> Vec<u16> {
    if zscii == 0x20 {
        return vec![0];
    }

    if zscii == 13 {
        return vec![5, 7];
    }

    if zscii < 0x80 {
        let c = zscii as u8 as char;
        for (shift, alphabet) in ALPHABET.iter().enumerate() {
            // A2 index 0 is the escape and index 1 is newline
            let start = if shift == 2 { 2 } else { 0 };
            if let Some(i) = alphabet[start..].iter().position(|x| *x == c) {
                return match shift {
                    0 => vec![(i + start) as u16 + 6],
                    _ => vec![shift as u16 + 3, (i + start) as u16 + 6],
                };
            }
        }
    }

    vec![5, 6, (zscii >> 5) & 0x1f, zscii & 0x1f]
}

/// Encode 3 5-bit Z-characters into a word
///
/// # Return
/// Word encoding of the sequence: 01111122 22233333
fn as_word(z1: u16, z2: u16, z3: u16) -> u16 {
    ((z1 & 0x1F) << 10) | ((z2 & 0x1F) << 5) | z3 & 0x1F
}

/// [Encode](https://inform-fiction.org/zmachine/standards/z1point1/sect03.html#seven) a word
///
/// # Arguments
/// * `zscii` - Word to encode, as ZSCII characters
/// * `words` - the number of encoded words in the result: 2 for v3 (6 Z-characters) and 3 for v5+ (9 Z-characters)
///
/// # Returns
/// Vector of encoded text words
pub fn encode_text(zscii: &[u16], words: usize) -> Vec<u16> {
    let mut zchars = Vec::new();

    for c in zscii.iter().take(words * 3) {
        zchars.append(&mut find_char(*c));
    }

    zchars.resize(words * 3, 5);

    let mut zwords = Vec::new();
    for i in 0..words {
        let index = i * 3;
        let mut w = as_word(zchars[index], zchars[index + 1], zchars[index + 2]);
        if i == words - 1 {
            w |= 0x8000;
        }
        zwords.push(w);
    }

    debug!(target: "app::input", "Encoded {:?} => {:04x?}", zscii, zwords);
    zwords
}

/// Get the set of word separators from a dictionary
///
/// # Arguments
/// * `zmachine` - Reference to the Z-Machine
/// * `dictionary_address` - Address of the dictionary
///
/// # Returns
/// [Result] containing a vector of word separators or a [RuntimeError]
fn separators(zmachine: &ZMachine, dictionary_address: usize) -> Result<Vec<u8>, RuntimeError> {
    let separator_count = zmachine.read_byte(dictionary_address)? as usize;
    let mut sep = Vec::new();
    for i in 1..=separator_count {
        sep.push(zmachine.read_byte(dictionary_address + i)?);
    }

    Ok(sep)
}

fn entry_words(
    zmachine: &ZMachine,
    address: usize,
    count: usize,
) -> Result<Vec<u16>, RuntimeError> {
    let mut v = Vec::new();
    for i in 0..count {
        v.push(zmachine.read_word(address + (i * 2))?);
    }
    Ok(v)
}

/// Binary search for a word in a sorted [dictionary](https://inform-fiction.org/zmachine/standards/z1point1/sect13.html#two)
///
/// # Arguments
/// * `zmachine` - Reference to the z-machine
/// * `address` - Address of the first entry in the dictionary
/// * `entry_count` - Number of entries in the dictionary
/// * `entry_size` - Dictionary entry size
/// * `word` - Encoded text for the word to find
///
/// # Returns
/// [Result] containing the address of the matching dictionary entry, 0 if not found, or a [RuntimeError]
fn search_entry(
    zmachine: &ZMachine,
    address: usize,
    entry_count: usize,
    entry_size: usize,
    word: &[u16],
) -> Result<usize, RuntimeError> {
    let mut low = 0;
    let mut high = entry_count;
    while low < high {
        let pivot = low + ((high - low) / 2);
        let entry_address = address + (pivot * entry_size);
        let entry = entry_words(zmachine, entry_address, word.len())?;
        match entry.as_slice().cmp(word) {
            std::cmp::Ordering::Equal => return Ok(entry_address),
            std::cmp::Ordering::Less => low = pivot + 1,
            std::cmp::Ordering::Greater => high = pivot,
        }
    }

    Ok(0)
}

/// Scan for a word in an unsorted dictionary
///
/// # Returns
/// [Result] containing the address of the matching dictionary entry, 0 if not found, or a [RuntimeError]
fn scan_entry(
    zmachine: &ZMachine,
    address: usize,
    entry_count: usize,
    entry_size: usize,
    word: &[u16],
) -> Result<usize, RuntimeError> {
    for i in 0..entry_count {
        let entry_address = address + (i * entry_size);
        if entry_words(zmachine, entry_address, word.len())? == word {
            return Ok(entry_address);
        }
    }

    Ok(0)
}

/// Find the address of the dictionary entry for a word, if any.
///
/// # Argument
/// * `zmachine` - Reference to the Z-Machine
/// * `dictionary_address` - Address of the dictionary
/// * `word` - Word to find as ZSCII
///
/// # Returns
/// [Result] containing the address of the matching dictionary entry, 0 if not found, or a [RuntimeError]
pub fn from_dictionary(
    zmachine: &ZMachine,
    dictionary_address: usize,
    word: &[u16],
) -> Result<usize, RuntimeError> {
    let separator_count = zmachine.read_byte(dictionary_address)? as usize;
    let entry_size = zmachine.read_byte(dictionary_address + separator_count + 1)? as usize;
    let entry_count = zmachine.read_word(dictionary_address + separator_count + 2)? as i16;
    let encoded = encode_text(word, zmachine.capabilities().dictionary_words());
    let first_entry = dictionary_address + separator_count + 4;

    if entry_count > 0 {
        search_entry(
            zmachine,
            first_entry,
            entry_count as usize,
            entry_size,
            &encoded,
        )
    } else {
        scan_entry(
            zmachine,
            first_entry,
            entry_count.unsigned_abs() as usize,
            entry_size,
            &encoded,
        )
    }
}

/// Split input into words and separators.
///
/// # Arguments
/// * `data` - ZSCII input
/// * `separators` - dictionary word separators
///
/// # Returns
/// Vector of (offset into `data`, token) tuples
fn tokens(data: &[u8], separators: &[u8]) -> Vec<(usize, Vec<u8>)> {
    let mut tokens = Vec::new();
    let mut word = Vec::new();
    let mut word_start = 0;

    for (i, b) in data.iter().enumerate() {
        if *b == b' ' || separators.contains(b) {
            if !word.is_empty() {
                tokens.push((word_start, word.clone()));
                word.clear();
            }
            if *b != b' ' {
                tokens.push((i, vec![*b]));
            }
        } else {
            if word.is_empty() {
                word_start = i;
            }
            word.push(*b);
        }
    }

    if !word.is_empty() {
        tokens.push((word_start, word));
    }

    tokens
}

/// Read the text from a text buffer
///
/// # Arguments
/// * `zmachine` - Reference to the Z-Machine
/// * `text_buffer` - Text buffer address
///
/// # Returns
/// [Result] with the buffer text or a [RuntimeError]
fn text_buffer_data(zmachine: &ZMachine, text_buffer: usize) -> Result<Vec<u8>, RuntimeError> {
    let mut data = Vec::new();
    if zmachine.version() < 5 {
        // Zero terminated from byte 1
        let max = zmachine.read_byte(text_buffer)? as usize;
        for i in 1..=max {
            let b = zmachine.read_byte(text_buffer + i)?;
            if b == 0 {
                break;
            }
            data.push(b);
        }
    } else {
        // Length in byte 1, text from byte 2
        let n = zmachine.read_byte(text_buffer + 1)? as usize;
        for i in 0..n {
            data.push(zmachine.read_byte(text_buffer + 2 + i)?);
        }
    }

    Ok(data)
}

/// Tokenise a text buffer into a parse buffer.
///
/// # Arguments
/// * `zmachine` - Reference to the Z-Machine
/// * `text_buffer` - Input text buffer address
/// * `parse_buffer` - Parse buffer address
/// * `dictionary` - Dictionary address
/// * `skip_unknown` - If `true`, parse buffer entries for words that aren't in the dictionary are left alone
///
/// # Returns
/// Empty [Result] or a [RuntimeError]
pub fn parse_text(
    zmachine: &mut ZMachine,
    text_buffer: usize,
    parse_buffer: usize,
    dictionary: usize,
    skip_unknown: bool,
) -> Result<(), RuntimeError> {
    let separators = separators(zmachine, dictionary)?;
    let data = text_buffer_data(zmachine, text_buffer)?;
    let max_words = zmachine.read_byte(parse_buffer)? as usize;
    let offset = if zmachine.version() < 5 { 1 } else { 2 };
    let tokens = tokens(&data, &separators);
    debug!(target: "app::input", "Tokenise {:?}: {} tokens, dictionary ${:04x}", String::from_utf8_lossy(&data), tokens.len(), dictionary);

    let mut count = 0;
    for (start, token) in tokens.iter().take(max_words) {
        let word: Vec<u16> = token.iter().map(|b| *b as u16).collect();
        let entry = from_dictionary(zmachine, dictionary, &word)?;
        let entry_address = parse_buffer + 2 + (count * 4);
        if entry > 0 || !skip_unknown {
            debug!(target: "app::input", "{} => ${:04x} [{}, {}]", String::from_utf8_lossy(token), entry, token.len(), start + offset);
            zmachine.write_word(entry_address, entry as u16)?;
            zmachine.write_byte(entry_address + 2, token.len() as u8)?;
            zmachine.write_byte(entry_address + 3, (start + offset) as u8)?;
        }
        count += 1;
    }

    zmachine.write_byte(parse_buffer + 1, count as u8)
}

struct SpeechPatterns {
    prompt: Regex,
    paragraph: Regex,
    spaces: Regex,
}

static SPEECH_PATTERNS: OnceLock<SpeechPatterns> = OnceLock::new();

fn speech_patterns() -> Result<&'static SpeechPatterns, regex::Error> {
    if let Some(patterns) = SPEECH_PATTERNS.get() {
        return Ok(patterns);
    }

    let patterns = SpeechPatterns {
        prompt: Regex::new(r"(?m)^[ \t]*>[ \t]*")?,
        paragraph: Regex::new(r"\n[ \t]*\n\s*")?,
        spaces: Regex::new(r"\s+")?,
    };
    Ok(SPEECH_PATTERNS.get_or_init(|| patterns))
}

/// Clean story output for a speech host.
///
/// Hard-wrapped lines inside a paragraph are joined, the `>` prompt is dropped and
/// runs of whitespace are collapsed. Paragraphs stay separated by a blank line.
///
/// # Arguments
/// * `text` - story output
///
/// # Returns
/// [Result] with the cleaned text or a [regex::Error]
pub fn speech_text(text: &str) -> Result<String, regex::Error> {
    let patterns = speech_patterns()?;
    let text = patterns.prompt.replace_all(text, "");
    Ok(patterns
        .paragraph
        .split(&text)
        .map(|p| patterns.spaces.replace_all(p.trim(), " ").to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<String>>()
        .join("\n\n"))
}
