use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{poll, read, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Back-buffered terminal. Headless instances never touch the real terminal.
pub struct Terminal {
    width: u16,
    height: u16,
    buffer: Vec<Vec<Cell>>,
    alternate_screen: bool,
}

/// A single cell in the terminal buffer
#[derive(Clone, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bold: false,
        }
    }
}

impl Terminal {
    /// Take over the terminal: raw mode, alternate screen, hidden cursor.
    pub fn new() -> io::Result<Self> {
        let (width, height) = size()?;
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, Hide)?;

        let mut term = Self::headless(width, height);
        term.alternate_screen = true;
        Ok(term)
    }

    /// A plain buffer of the given size, for printing to stdout.
    pub fn headless(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            buffer: vec![vec![Cell::default(); width as usize]; height as usize],
            alternate_screen: false,
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Pick up a resize; the buffer is cleared when the size changed.
    pub fn refresh_size(&mut self) -> io::Result<()> {
        let (width, height) = size()?;
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.buffer = vec![vec![Cell::default(); width as usize]; height as usize];
            execute!(stdout(), Clear(ClearType::All))?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        for row in &mut self.buffer {
            for cell in row {
                *cell = Cell::default();
            }
        }
    }

    /// Set a character at position with optional color; off-screen writes are dropped.
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize][x as usize] = Cell { ch, fg, bold };
        }
    }

    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bold);
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<&Cell> {
        if x < 0 || y < 0 {
            return None;
        }
        self.buffer.get(y as usize).and_then(|row| row.get(x as usize))
    }

    /// Draw a straight segment between two cells with slope-matching characters.
    /// Cells that already hold something other than a blank are left alone.
    pub fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), fg: Option<Color>) {
        let (x0, y0) = from;
        let (x1, y1) = to;
        let dx = x1 - x0;
        let dy = y1 - y0;
        let ch = match (dx.signum(), dy.signum()) {
            (_, 0) => '-',
            (0, _) => '|',
            (1, -1) | (-1, 1) => '/',
            _ => '\\',
        };

        let steps = dx.abs().max(dy.abs());
        for i in 1..steps {
            let x = x0 + (dx as f64 * i as f64 / steps as f64).round() as i32;
            let y = y0 + (dy as f64 * i as f64 / steps as f64).round() as i32;
            if self.get(x, y).map_or(false, |c| c.ch == ' ') {
                self.set(x, y, ch, fg, false);
            }
        }
    }

    /// Row contents as plain text, trailing blanks removed.
    pub fn row_text(&self, y: usize) -> String {
        self.buffer
            .get(y)
            .map(|row| row.iter().map(|c| c.ch).collect::<String>().trim_end().to_string())
            .unwrap_or_default()
    }

    /// Render the entire buffer to screen
    pub fn render(&self) -> io::Result<()> {
        let mut out = stdout();
        for (y, row) in self.buffer.iter().enumerate() {
            queue!(out, MoveTo(0, y as u16))?;
            for cell in row {
                if cell.bold {
                    queue!(out, SetAttribute(Attribute::Bold))?;
                }
                match cell.fg {
                    Some(color) => queue!(out, SetForegroundColor(color), Print(cell.ch), ResetColor)?,
                    None => queue!(out, Print(cell.ch))?,
                }
                if cell.bold {
                    queue!(out, SetAttribute(Attribute::Reset))?;
                }
            }
        }
        out.flush()
    }

    /// Wait up to `timeout` for a key press.
    pub fn wait_key(&self, timeout: Duration) -> io::Result<Option<(KeyCode, KeyModifiers)>> {
        if poll(timeout)? {
            if let Event::Key(key) = read()? {
                if key.kind != KeyEventKind::Release {
                    return Ok(Some((key.code, key.modifiers)));
                }
            }
        }
        Ok(None)
    }

    /// Write the buffer with ANSI colors, trimming trailing blank rows.
    pub fn write_ansi<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let last = (0..self.buffer.len())
            .rev()
            .find(|&y| !self.row_text(y).is_empty())
            .map_or(0, |y| y + 1);

        for row in &self.buffer[..last] {
            let end = row.iter().rposition(|c| c.ch != ' ').map_or(0, |i| i + 1);
            for cell in &row[..end] {
                if cell.ch == ' ' {
                    write!(out, " ")?;
                    continue;
                }
                if cell.bold {
                    write!(out, "\x1b[1m")?;
                }
                if let Some(code) = cell.fg.and_then(ansi_fg) {
                    write!(out, "\x1b[{}m", code)?;
                }
                write!(out, "{}\x1b[0m", cell.ch)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.alternate_screen {
            let _ = execute!(stdout(), Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
        }
    }
}

/// SGR foreground parameters for a crossterm color.
fn ansi_fg(color: Color) -> Option<String> {
    let code = match color {
        Color::Rgb { r, g, b } => return Some(format!("38;2;{};{};{}", r, g, b)),
        Color::AnsiValue(v) => return Some(format!("38;5;{}", v)),
        Color::Black => 30,
        Color::DarkRed => 31,
        Color::DarkGreen => 32,
        Color::DarkYellow => 33,
        Color::DarkBlue => 34,
        Color::DarkMagenta => 35,
        Color::DarkCyan => 36,
        Color::Grey => 37,
        Color::DarkGrey => 90,
        Color::Red => 91,
        Color::Green => 92,
        Color::Yellow => 93,
        Color::Blue => 94,
        Color::Magenta => 95,
        Color::Cyan => 96,
        Color::White => 97,
        Color::Reset => return None,
    };
    Some(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_screen_writes_are_ignored() {
        let mut term = Terminal::headless(4, 2);
        term.set(-1, 0, 'x', None, false);
        term.set(4, 1, 'x', None, false);
        term.set(1, 1, 'y', None, false);
        assert_eq!(term.row_text(0), "");
        assert_eq!(term.row_text(1), " y");
    }

    #[test]
    fn lines_pick_slope_characters() {
        let mut term = Terminal::headless(10, 10);
        term.draw_line((0, 5), (0, 0), None);
        term.draw_line((2, 4), (6, 0), None);
        term.draw_line((2, 8), (8, 8), None);
        assert_eq!(term.get(0, 2).unwrap().ch, '|');
        assert_eq!(term.get(4, 2).unwrap().ch, '/');
        assert_eq!(term.get(5, 8).unwrap().ch, '-');
        // End points are left for the caller.
        assert_eq!(term.get(0, 0).unwrap().ch, ' ');
    }

    #[test]
    fn lines_do_not_overwrite() {
        let mut term = Terminal::headless(5, 1);
        term.set(2, 0, 'o', None, false);
        term.draw_line((0, 0), (4, 0), None);
        assert_eq!(term.row_text(0), " -o-");
    }

    #[test]
    fn ansi_output_trims_and_colors() {
        let mut term = Terminal::headless(6, 4);
        term.set(1, 0, 'a', Some(Color::Green), true);
        let mut out = Vec::new();
        term.write_ansi(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, " \x1b[1m\x1b[92ma\x1b[0m\n");
    }
}
