//! Keyboard mapping. Pure: every key becomes an [`Intent`] and the session
//! decides what I/O follows.

use std::time::Instant;

use grid_sync::command::KeyFeed;
use grid_sync::{
    Bounds, CellIdError, CellStatus, CellView, CommandBuffer, CommandError, GridCoordinate,
    ViewportCommand,
};

use crate::transport::MutationCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Escape,
    ShiftDown,
    ShiftUp,
}

/// Cell under the pointer and the active selection, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyContext {
    pub hovered: Option<(GridCoordinate, CellView)>,
    pub selection: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    None,
    CommandPending(String),
    CommandCancelled,
    CommandRejected { input: String, error: CommandError },
    Navigate(ViewportCommand),
    Mutate {
        id: GridCoordinate,
        status: Option<CellStatus>,
        command: MutationCommand,
        radius: i64,
    },
    FillSelection { rect: Bounds, status: CellStatus },
    ShowTiming(GridCoordinate),
    ShowDetails(GridCoordinate),
    BeginSelection,
    EndSelection,
}

/// One event decoded from a line of terminal input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Hover(GridCoordinate),
    /// Pointer released over a cell, ending a drag.
    Release(GridCoordinate),
    Key(Key),
}

/// Decodes a line of watch-mode input: `@{row}x{col}` moves the pointer,
/// `^{row}x{col}` releases it, `+shift`/`-shift` press and release the
/// selection modifier, `esc` is Escape, anything else is typed key by key.
pub fn parse_input_line(line: &str) -> Result<Vec<InputEvent>, CellIdError> {
    let line = line.trim();
    match line {
        "" => return Ok(Vec::new()),
        "+shift" => return Ok(vec![InputEvent::Key(Key::ShiftDown)]),
        "-shift" => return Ok(vec![InputEvent::Key(Key::ShiftUp)]),
        "esc" => return Ok(vec![InputEvent::Key(Key::Escape)]),
        _ => {}
    }
    if let Some(id) = line.strip_prefix('@') {
        return Ok(vec![InputEvent::Hover(id.trim().parse()?)]);
    }
    if let Some(id) = line.strip_prefix('^') {
        return Ok(vec![InputEvent::Release(id.trim().parse()?)]);
    }
    Ok(line
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| InputEvent::Key(Key::Char(ch)))
        .collect())
}

#[derive(Debug, Default)]
pub struct KeyController {
    buffer: CommandBuffer,
    selecting: bool,
}

impl KeyController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    pub fn buffer(&self) -> &CommandBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut CommandBuffer {
        &mut self.buffer
    }

    pub fn handle(&mut self, key: Key, ctx: &KeyContext, now: Instant) -> Intent {
        match key {
            Key::Escape => {
                if self.buffer.cancel() {
                    Intent::CommandCancelled
                } else {
                    Intent::None
                }
            }
            Key::ShiftDown => {
                self.selecting = true;
                Intent::BeginSelection
            }
            Key::ShiftUp => {
                self.selecting = false;
                Intent::EndSelection
            }
            Key::Char(ch) => self.handle_char(ch, ctx, now),
        }
    }

    fn handle_char(&mut self, ch: char, ctx: &KeyContext, now: Instant) -> Intent {
        // the numeric buffer doubles as radius/range for mutation keys
        self.buffer.expire(now);
        let pending = self.buffer.pending_number();
        let hovered = ctx.hovered;
        // c/e/t/q only act on cells showing an elapsed value
        let decorated = hovered.filter(|(_, view)| view.has_elapsed());

        match ch.to_ascii_lowercase() {
            key @ ('r' | 'g' | 'b' | 'o' | 'd') => {
                let Some(status) = CellStatus::from_key(key) else {
                    return Intent::None;
                };
                if let Some(rect) = ctx.selection {
                    return Intent::FillSelection { rect, status };
                }
                let Some((id, view)) = hovered else {
                    return Intent::None;
                };
                let command = if pending == 0 {
                    MutationCommand::UpdateStatus
                } else if view.has_elapsed() {
                    MutationCommand::SpanStatus
                } else {
                    MutationCommand::FillStatus
                };
                Intent::Mutate {
                    id,
                    status: Some(status),
                    command,
                    radius: pending,
                }
            }
            'c' => match decorated {
                Some((id, view)) => Intent::Mutate {
                    id,
                    status: Some(view.status),
                    command: MutationCommand::ClearStatus,
                    radius: pending,
                },
                None => Intent::None,
            },
            'e' => match decorated {
                Some((id, _)) => Intent::Mutate {
                    id,
                    status: None,
                    command: MutationCommand::EraseStatus,
                    radius: pending,
                },
                None => Intent::None,
            },
            'p' => match hovered {
                Some((id, _)) => Intent::Mutate {
                    id,
                    status: Some(CellStatus::Predator),
                    command: MutationCommand::CreatePredator,
                    radius: pending,
                },
                None => Intent::None,
            },
            't' => decorated.map_or(Intent::None, |(id, _)| Intent::ShowTiming(id)),
            'q' => decorated.map_or(Intent::None, |(id, _)| Intent::ShowDetails(id)),
            _ => match self.buffer.feed(ch, now) {
                KeyFeed::Ignored => Intent::None,
                KeyFeed::Pending(input) => Intent::CommandPending(input),
                KeyFeed::Executed { command, .. } => Intent::Navigate(command),
                KeyFeed::Invalid { error, input } => Intent::CommandRejected { input, error },
            },
        }
    }
}
