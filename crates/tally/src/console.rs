//! # Console Host
//!
//! A [`Host`] that prints what a chat platform would show, for playing the
//! game from a terminal. Roles live in memory.
//!
//! Input lines look like `<user> <message...>`:
//!
//! ```text
//! 1 1
//! 2 0x2
//! <@3> 6 # 1 / 2
//! ```

use std::collections::HashSet;
use std::io::Write;

use parking_lot::Mutex;
use tally_game::error::HostResult;
use tally_game::{Host, HostError, MessageId, Reaction, RoleId, UserId};

/// One parsed console line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleLine<'a> {
    /// `<user> <text>`: a chat message.
    Message {
        /// Author.
        user: UserId,
        /// Message text.
        text: &'a str,
    },
    /// `!top [n]`: print the leaderboard.
    Leaderboard(usize),
    /// `!eval <text>`: evaluate without counting.
    Evaluate(&'a str),
    /// Nothing to do.
    Blank,
}

/// Default leaderboard length.
pub const DEFAULT_TOP: usize = 10;

/// Parses a console line, `None` when it is malformed.
#[must_use]
pub fn parse_line(line: &str) -> Option<ConsoleLine<'_>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("//") {
        return Some(ConsoleLine::Blank);
    }
    if let Some(rest) = line.strip_prefix("!top") {
        let rest = rest.trim();
        if rest.is_empty() {
            return Some(ConsoleLine::Leaderboard(DEFAULT_TOP));
        }
        return rest.parse().ok().map(ConsoleLine::Leaderboard);
    }
    if let Some(rest) = line.strip_prefix("!eval") {
        return Some(ConsoleLine::Evaluate(rest.trim()));
    }

    let (user, text) = line.split_once(char::is_whitespace)?;
    let user = user.parse().ok()?;
    Some(ConsoleLine::Message {
        user,
        text: text.trim_start(),
    })
}

/// Host writing every action as a line of text.
#[derive(Debug)]
pub struct ConsoleHost<W> {
    out: Mutex<W>,
    roles: Mutex<HashSet<(UserId, RoleId)>>,
}

impl<W: Write + Send> ConsoleHost<W> {
    /// Host writing to `out`.
    #[must_use]
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            roles: Mutex::new(HashSet::new()),
        }
    }

    /// Gives the writer back.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, action: &'static str, line: std::fmt::Arguments<'_>) -> HostResult<()> {
        let mut out = self.out.lock();
        writeln!(out, "{line}")
            .and_then(|()| out.flush())
            .map_err(|e| HostError::Rejected {
                action,
                reason: e.to_string(),
            })
    }
}

impl<W: Write + Send> Host for ConsoleHost<W> {
    async fn react(&self, message: MessageId, reaction: Reaction) -> HostResult<()> {
        let mark = match reaction {
            Reaction::Ok => "✅",
            Reaction::NewHigh => "☑️",
            Reaction::Fail => "❌",
        };
        self.emit("react", format_args!("  #{message} {mark} {}", reaction.as_str()))
    }

    async fn reply(&self, message: MessageId, text: &str) -> HostResult<()> {
        self.emit("reply", format_args!("  #{message} ↳ {text}"))
    }

    async fn apply_role(&self, user: UserId, role: RoleId) -> HostResult<()> {
        self.roles.lock().insert((user, role));
        self.emit("apply_role", format_args!("  <@{user}> +role {role}"))
    }

    async fn is_member_of_role(&self, user: UserId, role: RoleId) -> HostResult<bool> {
        Ok(self.roles.lock().contains(&(user, role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("12 1 + 1"),
            Some(ConsoleLine::Message {
                user: UserId::new(12),
                text: "1 + 1",
            })
        );
        assert_eq!(
            parse_line("<@!12>\t0x2"),
            Some(ConsoleLine::Message {
                user: UserId::new(12),
                text: "0x2",
            })
        );
        assert_eq!(parse_line("   "), Some(ConsoleLine::Blank));
        assert_eq!(parse_line("// note"), Some(ConsoleLine::Blank));
        assert_eq!(parse_line("!top"), Some(ConsoleLine::Leaderboard(DEFAULT_TOP)));
        assert_eq!(parse_line("!top 3"), Some(ConsoleLine::Leaderboard(3)));
        assert_eq!(parse_line("!eval 2#8"), Some(ConsoleLine::Evaluate("2#8")));
        assert_eq!(parse_line("alice 1"), None);
        assert_eq!(parse_line("12"), None);
        assert_eq!(parse_line("!top many"), None);
    }

    #[tokio::test]
    async fn test_output() {
        let host = ConsoleHost::new(Vec::new());
        host.react(MessageId::new(4), Reaction::Fail).await.unwrap();
        host.reply(MessageId::new(4), "oops").await.unwrap();
        host.apply_role(UserId::new(1), RoleId::new(2)).await.unwrap();
        assert!(host
            .is_member_of_role(UserId::new(1), RoleId::new(2))
            .await
            .unwrap());

        let text = String::from_utf8(host.into_inner()).unwrap();
        assert_eq!(
            text,
            "  #4 ❌ fail\n  #4 ↳ oops\n  <@1> +role 2\n"
        );
    }
}
