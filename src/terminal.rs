//! Styled terminal output using crossterm

use std::io::{self, Stdout, Write};

use crossterm::{
    queue,
    style::{self, Attribute, Print, SetAttribute, SetBackgroundColor, SetForegroundColor},
    tty::IsTty,
};

use crate::document::Document;
use crate::error::Result;
use crate::syntax::{Color, Style, StyleCode, StyleTable};

/// Writer that renders documents with their highlight styles
pub struct Terminal<W: Write> {
    out: W,
    /// Emit escape sequences; off when output is not a terminal
    color: bool,
    current: Style,
}

impl Terminal<Stdout> {
    /// Terminal on standard output, colored only when it is a tty
    pub fn stdout() -> Self {
        let out = io::stdout();
        let color = out.is_tty();
        Self::new(out, color)
    }
}

impl<W: Write> Terminal<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            current: Style::default(),
        }
    }

    /// Switch to `style` for the following output
    pub fn set_style(&mut self, style: Style) -> Result<()> {
        if !self.color || style == self.current {
            return Ok(());
        }
        queue!(self.out, SetAttribute(Attribute::Reset))?;
        if let Some(fg) = to_crossterm(style.fg) {
            queue!(self.out, SetForegroundColor(fg))?;
        }
        if let Some(bg) = to_crossterm(style.bg) {
            queue!(self.out, SetBackgroundColor(bg))?;
        }
        if style.bold {
            queue!(self.out, SetAttribute(Attribute::Bold))?;
        }
        if style.italic {
            queue!(self.out, SetAttribute(Attribute::Italic))?;
        }
        if style.underline {
            queue!(self.out, SetAttribute(Attribute::Underlined))?;
        }
        self.current = style;
        Ok(())
    }

    /// Reset all attributes
    pub fn reset_attributes(&mut self) -> Result<()> {
        self.set_style(Style::default())
    }

    pub fn write_str(&mut self, s: &str) -> Result<()> {
        queue!(self.out, Print(s))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Write a whole document, line by line, in its highlight styles
    ///
    /// Styles of each line are made final just before it is written, the
    /// way a display would as lines scroll into view.
    pub fn write_document(&mut self, doc: &Document, styles: &StyleTable) -> Result<()> {
        let text = doc.text();
        let bytes = text.as_bytes();
        let Some(highlighter) = doc.highlighter() else {
            return self.write_str(text);
        };

        let mut line_start = 0;
        for line in text.split_inclusive('\n') {
            let line_end = line_start + line.len();
            doc.ensure_styles(line_start..line_end);

            let mut pos = line_start;
            while pos < line_end {
                let (style, run) = {
                    let h = highlighter.borrow();
                    let code = h.stored_style(pos).unwrap_or(StyleCode::PLAIN);
                    let style = styles.get(h.table().style_name(code));
                    (style, h.style_run_len(pos).clamp(1, line_end - pos))
                };
                self.set_style(style)?;
                self.out.write_all(&bytes[pos..pos + run])?;
                pos += run;
            }
            line_start = line_end;
        }
        self.reset_attributes()?;
        self.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn to_crossterm(color: Color) -> Option<style::Color> {
    let color = match color {
        Color::Default => return None,
        Color::Black => style::Color::Black,
        Color::Red => style::Color::DarkRed,
        Color::Green => style::Color::DarkGreen,
        Color::Yellow => style::Color::DarkYellow,
        Color::Blue => style::Color::DarkBlue,
        Color::Magenta => style::Color::DarkMagenta,
        Color::Cyan => style::Color::DarkCyan,
        Color::White => style::Color::Grey,
        Color::BrightBlack => style::Color::DarkGrey,
        Color::BrightRed => style::Color::Red,
        Color::BrightGreen => style::Color::Green,
        Color::BrightYellow => style::Color::Yellow,
        Color::BrightBlue => style::Color::Blue,
        Color::BrightMagenta => style::Color::Magenta,
        Color::BrightCyan => style::Color::Cyan,
        Color::BrightWhite => style::Color::White,
    };
    Some(color)
}
