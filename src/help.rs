use crate::terminal::Terminal;
use crossterm::cursor::MoveTo;
use crossterm::event::KeyCode;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use std::io::{self, stdout, Write};
use std::time::Duration;

/// Where a centered help box lands on screen.
#[derive(Debug, PartialEq, Eq)]
pub struct HelpBox {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl HelpBox {
    /// One column of padding either side of the text, one border all round.
    pub fn centered(term_width: u16, term_height: u16, text: &str) -> Self {
        let text_width = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = (text_width + 4).min(term_width as usize) as u16;
        let height = (text.lines().count() + 2).min(term_height as usize) as u16;
        Self {
            x: term_width.saturating_sub(width) / 2,
            y: term_height.saturating_sub(height) / 2,
            width,
            height,
        }
    }
}

/// Show the help text over the current frame until `?` closes it.
/// Returns true if the user asked to quit (q/Esc) while it was open.
pub fn show_help_modal(term: &mut Terminal, help_text: &str, border: Color) -> io::Result<bool> {
    if help_text.is_empty() {
        return Ok(false);
    }

    let (width, height) = term.size();
    draw_help_box(&HelpBox::centered(width, height, help_text), help_text, border)?;

    loop {
        if let Some((code, _)) = term.wait_key(Duration::from_millis(50))? {
            match code {
                KeyCode::Char('?') => break,
                KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
                _ => {}
            }
        }
    }

    // The back buffer still holds the frame underneath.
    term.render()?;
    Ok(false)
}

fn draw_help_box(b: &HelpBox, help_text: &str, border: Color) -> io::Result<()> {
    if b.width < 4 || b.height < 2 {
        return Ok(());
    }
    let inner = (b.width - 2) as usize;
    let mut out = stdout();

    queue!(out, SetForegroundColor(border))?;
    queue!(out, MoveTo(b.x, b.y), Print(format!("┌{}┐", "─".repeat(inner))))?;
    for (i, line) in help_text.lines().take((b.height - 2) as usize).enumerate() {
        let text: String = line.chars().take(inner.saturating_sub(2)).collect();
        let padded = format!(" {:<width$} ", text, width = inner.saturating_sub(2));
        queue!(
            out,
            MoveTo(b.x, b.y + 1 + i as u16),
            SetForegroundColor(border),
            Print('│'),
            SetForegroundColor(Color::Grey),
            Print(padded),
            SetForegroundColor(border),
            Print('│')
        )?;
    }
    queue!(out, MoveTo(b.x, b.y + b.height - 1), Print(format!("└{}┘", "─".repeat(inner))))?;

    queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
    out.flush()
}
