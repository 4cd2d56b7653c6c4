//! The Markdown command family (§4.2): wire grammar, and the low-level
//! application logic shared by the coordinator's [`crate::document::Document`]
//! and an editor's [`crate::replica::Replica`].

use std::fmt;

use crate::piece::PieceList;
use crate::status::{EditStatus, ParseCommandError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Insert { pos: usize, text: String },
    Delete { pos: usize, n: usize },
    Newline { pos: usize },
    Heading { level: u8, pos: usize },
    Blockquote { pos: usize },
    UnorderedList { pos: usize },
    OrderedList { pos: usize },
    HorizontalRule { pos: usize },
    Bold { start: usize, end: usize },
    Italic { start: usize, end: usize },
    Code { start: usize, end: usize },
    Link { start: usize, end: usize, url: String },
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseCommandError> {
        let err = || ParseCommandError(line.to_string());
        let mut parts = line.splitn(2, ' ');
        let keyword = parts.next().ok_or_else(err)?;
        let rest = parts.next().unwrap_or("");

        Ok(match keyword {
            "INSERT" => {
                let mut it = rest.splitn(2, ' ');
                let pos = it.next().ok_or_else(err)?.parse().map_err(|_| err())?;
                let text = it.next().unwrap_or("").to_string();
                Self::Insert { pos, text }
            }
            "DEL" => {
                let (pos, n) = two_usize(rest).ok_or_else(err)?;
                Self::Delete { pos, n }
            }
            "NEWLINE" => Self::Newline {
                pos: rest.trim().parse().map_err(|_| err())?,
            },
            "HEADING" => {
                let (level, pos) = two_usize(rest).ok_or_else(err)?;
                if !(1..=3).contains(&level) {
                    return Err(err());
                }
                Self::Heading {
                    level: level as u8,
                    pos,
                }
            }
            "BLOCKQUOTE" => Self::Blockquote {
                pos: rest.trim().parse().map_err(|_| err())?,
            },
            "UNORDERED_LIST" => Self::UnorderedList {
                pos: rest.trim().parse().map_err(|_| err())?,
            },
            "ORDERED_LIST" => Self::OrderedList {
                pos: rest.trim().parse().map_err(|_| err())?,
            },
            "HORIZONTAL_RULE" => Self::HorizontalRule {
                pos: rest.trim().parse().map_err(|_| err())?,
            },
            "BOLD" => {
                let (start, end) = two_usize(rest).ok_or_else(err)?;
                Self::Bold { start, end }
            }
            "ITALIC" => {
                let (start, end) = two_usize(rest).ok_or_else(err)?;
                Self::Italic { start, end }
            }
            "CODE" => {
                let (start, end) = two_usize(rest).ok_or_else(err)?;
                Self::Code { start, end }
            }
            "LINK" => {
                let mut it = rest.splitn(3, ' ');
                let start = it.next().ok_or_else(err)?.parse().map_err(|_| err())?;
                let end = it.next().ok_or_else(err)?.parse().map_err(|_| err())?;
                let url = it.next().unwrap_or("").to_string();
                Self::Link { start, end, url }
            }
            _ => return Err(err()),
        })
    }
}

fn two_usize(rest: &str) -> Option<(usize, usize)> {
    let mut it = rest.split_whitespace();
    let a = it.next()?.parse().ok()?;
    let b = it.next()?.parse().ok()?;
    Some((a, b))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert { pos, text } => write!(f, "INSERT {pos} {text}"),
            Self::Delete { pos, n } => write!(f, "DEL {pos} {n}"),
            Self::Newline { pos } => write!(f, "NEWLINE {pos}"),
            Self::Heading { level, pos } => write!(f, "HEADING {level} {pos}"),
            Self::Blockquote { pos } => write!(f, "BLOCKQUOTE {pos}"),
            Self::UnorderedList { pos } => write!(f, "UNORDERED_LIST {pos}"),
            Self::OrderedList { pos } => write!(f, "ORDERED_LIST {pos}"),
            Self::HorizontalRule { pos } => write!(f, "HORIZONTAL_RULE {pos}"),
            Self::Bold { start, end } => write!(f, "BOLD {start} {end}"),
            Self::Italic { start, end } => write!(f, "ITALIC {start} {end}"),
            Self::Code { start, end } => write!(f, "CODE {start} {end}"),
            Self::Link { start, end, url } => write!(f, "LINK {start} {end} {url}"),
        }
    }
}

/// Ensures `pos` is at the start of a line, inserting a bare newline first if
/// it isn't (and `pos` isn't already at the start of the document). Returns
/// the (possibly advanced) position to insert the Markdown prefix at. The
/// newline this may insert is never recorded on its own (§4.2's recording
/// policy): it's a direct piece-list mutation, same as the rest of the
/// command's effect.
fn ensure_line_start(pl: &mut PieceList, pos: usize) -> Result<usize, EditStatus> {
    if pos > pl.total_length() {
        return Err(EditStatus::InvalidPosition);
    }
    if pos > 0 && pl.byte_at(pos - 1) != Some(b'\n') {
        pl.insert(pos, "\n")?;
        return Ok(pos + 1);
    }
    Ok(pos)
}

/// Continues numbering from whatever already sits at the insertion point
/// (§9: this mirrors the reference's literal scan, which inspects the
/// about-to-be-prefixed line itself rather than the line above it).
fn ordered_list_number(pl: &PieceList, pos: usize) -> u8 {
    if pos == 0 {
        return 1;
    }
    match (pl.byte_at(pos), pl.byte_at(pos + 1), pl.byte_at(pos + 2)) {
        (Some(d @ b'1'..=b'9'), Some(b'.'), Some(b' ')) => {
            let n = d - b'0' + 1;
            if n > 9 {
                1
            } else {
                n
            }
        }
        _ => 1,
    }
}

fn require_range(pl: &PieceList, start: usize, end: usize) -> Result<(), EditStatus> {
    if start < end && end <= pl.total_length() {
        Ok(())
    } else {
        Err(EditStatus::InvalidPosition)
    }
}

/// Applies one command's effect directly to a piece list, with no version
/// check and no recording: both the coordinator's authoritative apply and an
/// editor replica's replay of a broadcast record go through this.
pub fn apply_command(pl: &mut PieceList, cmd: &Command) -> Result<(), EditStatus> {
    match cmd {
        Command::Insert { pos, text } => {
            if *pos > pl.total_length() {
                return Err(EditStatus::InvalidPosition);
            }
            pl.insert(*pos, text)?;
        }
        Command::Delete { pos, n } => {
            let in_range = matches!(pos.checked_add(*n), Some(end) if end <= pl.total_length());
            if !in_range {
                return Err(EditStatus::InvalidPosition);
            }
            pl.delete(*pos, *n)?;
        }
        Command::Newline { pos } => {
            if *pos > pl.total_length() {
                return Err(EditStatus::InvalidPosition);
            }
            pl.insert(*pos, "\n")?;
        }
        Command::Heading { level, pos } => {
            if !(1..=3).contains(level) {
                return Err(EditStatus::InvalidPosition);
            }
            let pos = ensure_line_start(pl, *pos)?;
            let prefix = match level {
                1 => "# ",
                2 => "## ",
                _ => "### ",
            };
            pl.insert(pos, prefix)?;
        }
        Command::Blockquote { pos } => {
            let pos = ensure_line_start(pl, *pos)?;
            pl.insert(pos, "> ")?;
        }
        Command::UnorderedList { pos } => {
            let pos = ensure_line_start(pl, *pos)?;
            pl.insert(pos, "- ")?;
        }
        Command::OrderedList { pos } => {
            let pos = ensure_line_start(pl, *pos)?;
            let n = ordered_list_number(pl, pos);
            pl.insert(pos, &format!("{n}. "))?;
        }
        Command::HorizontalRule { pos } => {
            let pos = ensure_line_start(pl, *pos)?;
            pl.insert(pos, "---")?;
            let after = pos + 3;
            if pl.byte_at(after) != Some(b'\n') {
                pl.insert(after, "\n")?;
            }
        }
        Command::Bold { start, end } => {
            require_range(pl, *start, *end)?;
            pl.insert(*end, "**")?;
            pl.insert(*start, "**")?;
        }
        Command::Italic { start, end } => {
            require_range(pl, *start, *end)?;
            pl.insert(*end, "*")?;
            pl.insert(*start, "*")?;
        }
        Command::Code { start, end } => {
            require_range(pl, *start, *end)?;
            pl.insert(*end, "`")?;
            pl.insert(*start, "`")?;
        }
        Command::Link { start, end, url } => {
            require_range(pl, *start, *end)?;
            pl.insert(*end, &format!("]({url})"))?;
            pl.insert(*start, "[")?;
        }
    }
    Ok(())
}
