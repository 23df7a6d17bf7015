//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the session without sending messages to the
//! chat endpoint.

/// A parsed chat command.
///
/// These commands control the session and are not sent to the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the conversation and start over with the greeting.
    Clear,

    /// Show the signed-in member's profile.
    Me,

    /// Show blood group compatibility for the signed-in member.
    Compatibility,

    /// Send the n-th (1-based) follow-up suggestion of the latest reply.
    Suggest(usize),

    /// Sign out and return to the login prompt.
    Logout,

    /// Sign in as someone else.
    Login,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use thalassist::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/suggest 2").is_some());
/// assert!(parse_command("When can I donate again?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "me" | "profile" => ChatCommand::Me,
        "compat" | "compatibility" => ChatCommand::Compatibility,
        "suggest" | "s" => match argument {
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) if n > 0 => ChatCommand::Suggest(n),
                _ => ChatCommand::Invalid("/suggest expects a positive number".to_string()),
            },
            None => ChatCommand::Invalid("/suggest requires a suggestion number".to_string()),
        },
        "logout" => ChatCommand::Logout,
        "login" => ChatCommand::Login,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear                 Clear the conversation
  /me                    Show your profile
  /compat                Show blood group compatibility
  /suggest <n>           Send the n-th suggested question
  /stats                 Show session statistics
  /login                 Sign in as a different member
  /logout                Sign out
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_clear() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::Clear));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/me"), Some(ChatCommand::Me));
        assert_eq!(parse_command("/login"), Some(ChatCommand::Login));
        assert_eq!(parse_command("/logout"), Some(ChatCommand::Logout));
        assert_eq!(parse_command("/compat"), Some(ChatCommand::Compatibility));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
    }

    #[test]
    fn parse_suggest() {
        assert_eq!(parse_command("/suggest 2"), Some(ChatCommand::Suggest(2)));
        assert_eq!(parse_command("/s   1 "), Some(ChatCommand::Suggest(1)));
        assert!(matches!(
            parse_command("/suggest"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
        assert!(matches!(
            parse_command("/suggest 0"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("positive")
        ));
        assert!(matches!(
            parse_command("/suggest two"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/donate"),
            Some(ChatCommand::Invalid("Unknown command: /donate".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Is A+ compatible with O-?"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/clear"));
        assert!(help.contains("/suggest"));
        assert!(help.contains("/logout"));
    }
}
