//! Viewport navigation grammar.
//!
//! A command is a signed decimal magnitude followed by one terminator:
//!
//! | terminator | effect                  |
//! |------------|-------------------------|
//! | `x`        | absolute X = value      |
//! | `y`        | absolute Y = value      |
//! | `h`        | move X by `-value`      |
//! | `l`        | move X by `+value`      |
//! | `j`        | move Y by `+value`      |
//! | `k`        | move Y by `-value`      |
//!
//! Relative terminators only accept non-negative magnitudes.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::viewport::OriginUpdate;

/// An unterminated buffer is discarded after this much inactivity.
pub const COMMAND_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportCommand {
    AbsoluteX(i64),
    AbsoluteY(i64),
    RelativeX(i64),
    RelativeY(i64),
}

impl ViewportCommand {
    pub fn to_origin_update(self) -> OriginUpdate {
        let mut update = OriginUpdate::default();
        match self {
            ViewportCommand::AbsoluteX(x) => update.x = Some(x),
            ViewportCommand::AbsoluteY(y) => update.y = Some(y),
            ViewportCommand::RelativeX(dx) => update.rel_x = Some(dx),
            ViewportCommand::RelativeY(dy) => update.rel_y = Some(dy),
        }
        update
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("command '{0}' is missing a magnitude")]
    MissingMagnitude(String),
    #[error("'{0}' is not a navigation terminator")]
    InvalidTerminator(char),
    #[error("'{0}' is not a number")]
    NotNumeric(String),
    #[error("'{terminator}' does not accept a negative magnitude ({value})")]
    NegativeMagnitude { terminator: char, value: i64 },
}

#[inline]
pub fn is_terminator(key: char) -> bool {
    matches!(key, 'x' | 'y' | 'h' | 'j' | 'k' | 'l')
}

#[inline]
pub fn is_command_key(key: char) -> bool {
    key.is_ascii_digit() || key == '-' || is_terminator(key)
}

/// Parses one complete command such as `"100x"` or `"30j"`.
pub fn parse_command(command: &str) -> Result<ViewportCommand, CommandError> {
    let terminator = command
        .chars()
        .last()
        .ok_or_else(|| CommandError::MissingMagnitude(String::new()))?;
    if !is_terminator(terminator) {
        return Err(CommandError::InvalidTerminator(terminator));
    }
    let magnitude = &command[..command.len() - terminator.len_utf8()];
    if magnitude.is_empty() {
        return Err(CommandError::MissingMagnitude(command.to_string()));
    }
    let value = parse_magnitude(magnitude)?;

    if matches!(terminator, 'h' | 'j' | 'k' | 'l') && value < 0 {
        return Err(CommandError::NegativeMagnitude { terminator, value });
    }

    Ok(match terminator {
        'x' => ViewportCommand::AbsoluteX(value),
        'y' => ViewportCommand::AbsoluteY(value),
        'h' => ViewportCommand::RelativeX(-value),
        'l' => ViewportCommand::RelativeX(value),
        'j' => ViewportCommand::RelativeY(value),
        _ => ViewportCommand::RelativeY(-value),
    })
}

fn parse_magnitude(raw: &str) -> Result<i64, CommandError> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::NotNumeric(raw.to_string()));
    }
    raw.parse::<i64>()
        .map_err(|_| CommandError::NotNumeric(raw.to_string()))
}

/// Result of feeding one key to the [`CommandBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFeed {
    /// Key is not part of the grammar; buffer untouched.
    Ignored,
    /// Buffer grew but has no terminator yet.
    Pending(String),
    Executed {
        command: ViewportCommand,
        input: String,
    },
    Invalid {
        error: CommandError,
        input: String,
    },
}

/// Accumulates navigation keys until a terminator arrives. The buffer is
/// cleared after every terminated command, valid or not.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    buffer: String,
    last_input: Option<Instant>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Numeric value of the pending buffer, used as radius/range by mutation
    /// keys. Empty or non-numeric buffers count as zero.
    pub fn pending_number(&self) -> i64 {
        parse_magnitude(&self.buffer).unwrap_or(0)
    }

    pub fn feed(&mut self, key: char, now: Instant) -> KeyFeed {
        if !is_command_key(key) {
            return KeyFeed::Ignored;
        }
        self.expire(now);
        self.buffer.push(key);
        self.last_input = Some(now);

        if !is_terminator(key) {
            return KeyFeed::Pending(self.buffer.clone());
        }

        let input = std::mem::take(&mut self.buffer);
        self.last_input = None;
        match parse_command(&input) {
            Ok(command) => KeyFeed::Executed { command, input },
            Err(error) => KeyFeed::Invalid { error, input },
        }
    }

    /// Drops an unterminated buffer once it has been idle for
    /// [`COMMAND_IDLE_TIMEOUT`]. Returns `true` when something was discarded.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.last_input {
            Some(last) if now.saturating_duration_since(last) >= COMMAND_IDLE_TIMEOUT => {
                self.last_input = None;
                !std::mem::take(&mut self.buffer).is_empty()
            }
            _ => false,
        }
    }

    /// Time at which the pending buffer expires, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_input
            .filter(|_| !self.buffer.is_empty())
            .map(|last| last + COMMAND_IDLE_TIMEOUT)
    }

    /// Escape handling. Returns `true` when a non-empty buffer was dropped.
    pub fn cancel(&mut self) -> bool {
        self.last_input = None;
        !std::mem::take(&mut self.buffer).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(buffer: &mut CommandBuffer, keys: &str, now: Instant) -> KeyFeed {
        let mut last = KeyFeed::Ignored;
        for key in keys.chars() {
            last = buffer.feed(key, now);
        }
        last
    }

    #[test]
    fn parses_each_terminator() {
        assert_eq!(parse_command("100x"), Ok(ViewportCommand::AbsoluteX(100)));
        assert_eq!(parse_command("-76y"), Ok(ViewportCommand::AbsoluteY(-76)));
        assert_eq!(parse_command("50h"), Ok(ViewportCommand::RelativeX(-50)));
        assert_eq!(parse_command("40l"), Ok(ViewportCommand::RelativeX(40)));
        assert_eq!(parse_command("30j"), Ok(ViewportCommand::RelativeY(30)));
        assert_eq!(parse_command("20k"), Ok(ViewportCommand::RelativeY(-20)));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert_eq!(
            parse_command("-5h"),
            Err(CommandError::NegativeMagnitude {
                terminator: 'h',
                value: -5
            })
        );
        assert!(matches!(
            parse_command("x"),
            Err(CommandError::MissingMagnitude(_))
        ));
        assert!(matches!(parse_command("-x"), Err(CommandError::NotNumeric(_))));
        assert!(matches!(parse_command("5-3x"), Err(CommandError::NotNumeric(_))));
        assert_eq!(parse_command("12q"), Err(CommandError::InvalidTerminator('q')));
        assert!(matches!(
            parse_command("99999999999999999999x"),
            Err(CommandError::NotNumeric(_))
        ));
    }

    #[test]
    fn unterminated_buffer_is_pending() {
        let mut buffer = CommandBuffer::new();
        let now = Instant::now();
        assert_eq!(buffer.feed('5', now), KeyFeed::Pending("5".into()));
        assert_eq!(buffer.as_str(), "5");
        assert_eq!(buffer.pending_number(), 5);
    }

    #[test]
    fn terminator_executes_and_resets() {
        let mut buffer = CommandBuffer::new();
        let now = Instant::now();
        assert_eq!(
            feed_all(&mut buffer, "-76y", now),
            KeyFeed::Executed {
                command: ViewportCommand::AbsoluteY(-76),
                input: "-76y".into()
            }
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn invalid_command_still_resets() {
        let mut buffer = CommandBuffer::new();
        let now = Instant::now();
        let result = feed_all(&mut buffer, "-5h", now);
        assert!(matches!(result, KeyFeed::Invalid { .. }));
        assert!(buffer.is_empty());
        assert_eq!(buffer.feed('r', now), KeyFeed::Ignored);
    }

    #[test]
    fn idle_buffer_expires() {
        let mut buffer = CommandBuffer::new();
        let start = Instant::now();
        buffer.feed('4', start);
        assert_eq!(buffer.deadline(), Some(start + COMMAND_IDLE_TIMEOUT));
        assert!(!buffer.expire(start + Duration::from_millis(2999)));
        assert!(buffer.expire(start + COMMAND_IDLE_TIMEOUT));
        assert!(buffer.is_empty());

        // A key after the idle window starts a fresh command.
        buffer.feed('1', start);
        let later = start + Duration::from_secs(4);
        assert_eq!(
            feed_all(&mut buffer, "2x", later),
            KeyFeed::Executed {
                command: ViewportCommand::AbsoluteX(2),
                input: "2x".into()
            }
        );
    }

    #[test]
    fn cancel_reports_whether_anything_was_dropped() {
        let mut buffer = CommandBuffer::new();
        assert!(!buffer.cancel());
        buffer.feed('9', Instant::now());
        assert!(buffer.cancel());
        assert_eq!(buffer.pending_number(), 0);
    }

    #[test]
    fn commands_map_to_origin_updates() {
        let update = ViewportCommand::RelativeY(-20).to_origin_update();
        assert_eq!(update.rel_y, Some(-20));
        assert_eq!(update.x, None);
    }
}
