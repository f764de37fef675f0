//! In-memory [screen model](https://inform-fiction.org/zmachine/standards/z1point1/sect08.html)
//!
//! Window 0 is a text stream collected until the host flushes it. Window 1 is a
//! character grid that the host can read as the status text.
use crate::{error::*, recoverable_error, text};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    Roman = 0,
    Reverse = 1,
    Bold = 2,
    Italic = 4,
    Fixed = 8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Active text style bits
pub struct CellStyle {
    mask: u8,
}

impl CellStyle {
    pub fn new() -> CellStyle {
        CellStyle { mask: 0 }
    }

    /// Apply a `set_text_style` value: 0 resets, anything else is combined with the current style
    pub fn set(&mut self, style: u8) {
        match style {
            0 => self.mask = 0,
            _ => self.mask |= style & 0xF,
        }
    }

    pub fn is_style(&self, style: Style) -> bool {
        let s = style as u8;
        if s == 0 {
            self.mask == 0
        } else {
            self.mask & s == s
        }
    }
}

#[derive(Debug)]
pub struct Screen {
    version: u8,
    rows: u8,
    columns: u8,
    /// Window 0 text not yet taken by the host
    story: String,
    /// Window 1 rows
    grid: Vec<Vec<char>>,
    selected_window: u8,
    /// Window 1 cursor (row, column), 1-based
    cursor: (u8, u8),
    style: CellStyle,
    buffered: bool,
    default_colours: (u8, u8),
    colours: (u8, u8),
    font: u16,
    /// Interpreter-drawn status line (V3)
    status_line: String,
}

impl Screen {
    /// Constructor
    ///
    /// # Arguments
    /// * `version` - Story version
    /// * `rows` - Screen height in lines
    /// * `columns` - Screen width in characters
    /// * `colours` - Default (foreground, background) colours
    pub fn new(version: u8, rows: u8, columns: u8, colours: (u8, u8)) -> Screen {
        Screen {
            version,
            rows,
            columns,
            story: String::new(),
            grid: Vec::new(),
            selected_window: 0,
            cursor: (1, 1),
            style: CellStyle::new(),
            buffered: true,
            default_colours: colours,
            colours,
            font: 1,
            status_line: String::new(),
        }
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn columns(&self) -> u8 {
        self.columns
    }

    pub fn selected_window(&self) -> u8 {
        self.selected_window
    }

    /// Height of window 1
    pub fn split_lines(&self) -> u8 {
        self.grid.len() as u8
    }

    pub fn style(&self) -> CellStyle {
        self.style
    }

    pub fn is_buffered(&self) -> bool {
        self.buffered
    }

    pub fn colours(&self) -> (u8, u8) {
        self.colours
    }

    pub fn font(&self) -> u16 {
        self.font
    }

    fn blank_row(&self) -> Vec<char> {
        vec![' '; self.columns as usize]
    }

    fn put_char(&mut self, c: char) {
        let (row, column) = self.cursor;
        if c == '\n' {
            self.cursor = (row.saturating_add(1), 1);
            return;
        }

        if let Some(r) = self.grid.get_mut(row as usize - 1) {
            if let Some(cell) = r.get_mut(column as usize - 1) {
                *cell = c;
            }
        }
        self.cursor = (row, column.saturating_add(1));
    }

    /// Print ZSCII text to the selected window
    ///
    /// # Arguments
    /// * `text` - ZSCII characters, 13 is a line break
    pub fn print(&mut self, text: &[u16]) {
        for c in text.iter().filter_map(|z| text::zscii_to_char(*z)) {
            if self.selected_window == 0 {
                self.story.push(c);
            } else {
                self.put_char(c);
            }
        }
    }

    pub fn new_line(&mut self) {
        self.print(&[13]);
    }

    /// Interpreter message, always shown in window 0 on a line of its own
    pub fn diagnostic(&mut self, message: &str) {
        if !self.story.is_empty() && !self.story.ends_with('\n') {
            self.story.push('\n');
        }
        self.story.push_str(message);
        self.story.push('\n');
    }

    /// Split the screen so window 1 has `lines` rows
    ///
    /// # Arguments
    /// * `lines` - Height of window 1, 0 to unsplit
    pub fn split_window(&mut self, lines: u16) {
        let lines = u16::min(lines, self.rows as u16) as usize;
        debug!(target: "app::screen", "Split window 1 to {} lines", lines);
        let blank = self.blank_row();
        self.grid.resize(lines, blank);
        if self.version == 3 {
            for r in self.grid.iter_mut() {
                r.fill(' ');
            }
        }
        if lines == 0 {
            self.selected_window = 0;
        }
        if self.cursor.0 as usize > lines {
            self.cursor = (1, 1);
        }
    }

    /// Select the output window
    ///
    /// # Arguments
    /// * `window` - 0 or 1
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError] for any other window
    pub fn set_window(&mut self, window: u16) -> Result<(), RuntimeError> {
        match window {
            0 => {
                self.selected_window = 0;
                Ok(())
            }
            1 => {
                self.selected_window = 1;
                self.cursor = (1, 1);
                Ok(())
            }
            _ => recoverable_error!(ErrorCode::InvalidWindow, "Invalid window {}", window),
        }
    }

    /// Erase a window.
    ///
    /// Erasing window 0 only affects text the host hasn't taken yet
    /// by starting a fresh line.
    ///
    /// # Arguments
    /// * `window` - 0, 1, -1 (unsplit and erase all) or -2 (erase all)
    ///
    /// # Returns
    /// Empty [Result] or a [RuntimeError] for any other window
    pub fn erase_window(&mut self, window: i16) -> Result<(), RuntimeError> {
        match window {
            0 => {
                self.erase_story();
                Ok(())
            }
            1 => {
                self.erase_grid();
                Ok(())
            }
            -1 => {
                self.split_window(0);
                self.erase_story();
                Ok(())
            }
            -2 => {
                self.erase_grid();
                self.erase_story();
                Ok(())
            }
            _ => recoverable_error!(
                ErrorCode::InvalidWindow,
                "Invalid window {} to erase",
                window
            ),
        }
    }

    fn erase_grid(&mut self) {
        for r in self.grid.iter_mut() {
            r.fill(' ');
        }
        self.cursor = (1, 1);
    }

    fn erase_story(&mut self) {
        if !self.story.is_empty() && !self.story.ends_with('\n') {
            self.story.push('\n');
        }
    }

    /// Erase from the cursor to the end of the line in window 1
    pub fn erase_line(&mut self, value: u16) {
        if value != 1 || self.selected_window != 1 {
            return;
        }

        let (row, column) = self.cursor;
        if let Some(r) = self.grid.get_mut(row as usize - 1) {
            for cell in r.iter_mut().skip(column as usize - 1) {
                *cell = ' ';
            }
        }
    }

    /// Move the window 1 cursor.
    ///
    /// Rows and columns are 1-based. The cursor of window 0 isn't tracked.
    pub fn set_cursor(&mut self, row: u16, column: u16) {
        if self.selected_window == 1 {
            self.cursor = (
                u16::clamp(row, 1, 255) as u8,
                u16::clamp(column, 1, 255) as u8,
            );
        }
    }

    /// Cursor position for `get_cursor`
    ///
    /// # Returns
    /// (row, column) of window 1, or the bottom line of window 0
    pub fn cursor(&self) -> (u16, u16) {
        if self.selected_window == 1 {
            (self.cursor.0 as u16, self.cursor.1 as u16)
        } else {
            (self.rows as u16, 1)
        }
    }

    pub fn set_style(&mut self, style: u16) {
        self.style.set(style as u8);
    }

    pub fn buffer_mode(&mut self, mode: u16) {
        self.buffered = mode != 0;
    }

    /// Set colours, 0 keeps the current colour and 1 selects the default
    pub fn set_colours(&mut self, foreground: u16, background: u16) {
        let pick = |value: u16, current: u8, default: u8| match value {
            0 => current,
            1 => default,
            _ => value as u8,
        };
        self.colours = (
            pick(foreground, self.colours.0, self.default_colours.0),
            pick(background, self.colours.1, self.default_colours.1),
        );
    }

    /// Select a font
    ///
    /// # Arguments
    /// * `font` - Font number, 0 to query the current font
    ///
    /// # Returns
    /// The previous font, or 0 if the font is unavailable
    pub fn set_font(&mut self, font: u16) -> u16 {
        match font {
            0 => self.font,
            1 | 4 => {
                let previous = self.font;
                self.font = font;
                previous
            }
            _ => 0,
        }
    }

    /// Draw the interpreter status line
    ///
    /// # Arguments
    /// * `left` - Location name
    /// * `right` - Score and moves, or time
    pub fn set_status_line(&mut self, left: &str, right: &str) {
        let width = self.columns as usize;
        let right_len = right.chars().count();
        let available = width.saturating_sub(right_len + 2);
        let mut left: String = left.to_string();
        if left.chars().count() > available {
            left = left
                .chars()
                .take(available.saturating_sub(3))
                .collect::<String>()
                + "...";
        }

        let spaces = width.saturating_sub(left.chars().count() + right_len + 2);
        self.status_line = format!(" {}{}{} ", left, " ".repeat(spaces), right);
    }

    /// Take the window 0 text printed since the last flush
    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.story)
    }

    /// Current status text: the interpreter status line in V3, otherwise the
    /// contents of window 1 with trailing blanks removed
    pub fn status_text(&self) -> String {
        let grid = self
            .grid
            .iter()
            .map(|r| r.iter().collect::<String>().trim_end().to_string())
            .collect::<Vec<String>>();
        if self.version == 3 && grid.iter().all(|r| r.is_empty()) {
            self.status_line.clone()
        } else {
            grid.join("\n")
        }
    }

    /// Reset to the initial state, keeping any text the host hasn't taken
    pub fn reset(&mut self) {
        self.grid.clear();
        self.selected_window = 0;
        self.cursor = (1, 1);
        self.style = CellStyle::new();
        self.buffered = true;
        self.colours = self.default_colours;
        self.font = 1;
        self.status_line.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::assert_ok;

    use super::*;

    fn zscii(s: &str) -> Vec<u16> {
        s.chars().map(|c| if c == '\n' { 13 } else { c as u16 }).collect()
    }

    #[test]
    fn test_story_text() {
        let mut screen = Screen::new(5, 24, 80, (9, 2));
        screen.print(&zscii("Hello"));
        screen.new_line();
        screen.print(&[0, 155]);
        assert_eq!(screen.flush(), "Hello\nä");
        assert_eq!(screen.flush(), "");
    }

    #[test]
    fn test_upper_window() {
        let mut screen = Screen::new(5, 24, 10, (9, 2));
        screen.split_window(2);
        assert_eq!(screen.split_lines(), 2);
        assert_ok!(screen.set_window(1));
        screen.set_cursor(2, 3);
        screen.print(&zscii("abc"));
        assert_eq!(screen.cursor(), (2, 6));
        screen.set_cursor(1, 9);
        screen.print(&zscii("xyz"));
        assert_eq!(screen.status_text(), "        xy\n  abc");
        // Nothing leaks into the story
        assert_eq!(screen.flush(), "");

        screen.set_cursor(2, 4);
        screen.erase_line(1);
        assert_eq!(screen.status_text(), "        xy\n  a");

        assert_ok!(screen.erase_window(1));
        assert_eq!(screen.status_text(), "\n");
        assert_ok!(screen.set_window(0));
        assert_eq!(screen.cursor(), (24, 1));
    }

    #[test]
    fn test_windows() {
        let mut screen = Screen::new(5, 24, 80, (9, 2));
        let e = screen.set_window(2).unwrap_err();
        assert_eq!(e.code(), ErrorCode::InvalidWindow);
        assert!(e.is_recoverable());
        assert!(screen.erase_window(3).is_err());
        screen.split_window(3);
        assert_ok!(screen.set_window(1));
        assert_ok!(screen.erase_window(-1));
        assert_eq!(screen.split_lines(), 0);
        assert_eq!(screen.selected_window(), 0);
    }

    #[test]
    fn test_erase_story_keeps_text() {
        let mut screen = Screen::new(5, 24, 80, (9, 2));
        screen.print(&zscii("One"));
        assert_ok!(screen.erase_window(-2));
        screen.print(&zscii("Two"));
        assert_eq!(screen.flush(), "One\nTwo");
    }

    #[test]
    fn test_status_line() {
        let mut screen = Screen::new(3, 24, 40, (9, 2));
        screen.set_status_line("West of House", "Score: 0  Moves: 1");
        assert_eq!(
            screen.status_text(),
            " West of House       Score: 0  Moves: 1 "
        );
        assert_eq!(screen.status_text().len(), 40);
        screen.set_status_line(
            "An extremely long location name for this line",
            "Time: 9:05 AM",
        );
        let s = screen.status_text();
        assert_eq!(s.chars().count(), 40);
        assert!(s.starts_with(" An extremely long loca..."));
        assert!(s.ends_with("Time: 9:05 AM "));
    }

    #[test]
    fn test_style_colour_font() {
        let mut screen = Screen::new(5, 24, 80, (9, 2));
        screen.set_style(Style::Bold as u16);
        screen.set_style(Style::Italic as u16);
        assert!(screen.style().is_style(Style::Bold));
        assert!(screen.style().is_style(Style::Italic));
        screen.set_style(0);
        assert!(screen.style().is_style(Style::Roman));

        screen.set_colours(3, 0);
        assert_eq!(screen.colours(), (3, 2));
        screen.set_colours(1, 5);
        assert_eq!(screen.colours(), (9, 5));

        assert_eq!(screen.set_font(4), 1);
        assert_eq!(screen.set_font(0), 4);
        assert_eq!(screen.set_font(3), 0);
        assert_eq!(screen.set_font(1), 4);

        screen.buffer_mode(0);
        assert!(!screen.is_buffered());
    }
}
