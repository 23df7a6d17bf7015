//! Terminal output for the chat front-end.
//!
//! Entries are formatted into strings first so that the layout can be
//! checked without a terminal; the [`Renderer`] decides where they go.

use std::io::{self, Stdout, Write};

use time::macros::format_description;

use super::message::{AssistantReply, ChatEntry, ReplyKind};

/// ANSI escape code for dim text (used for metadata lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for speaker labels).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for suggested actions).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for follow-up suggestions).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for emergencies and errors).
const ANSI_RED: &str = "\x1b[31m";

const ASSISTANT_LABEL: &str = "ThalAssist";
const USER_LABEL: &str = "You";

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print one transcript entry.
    fn print_entry(&mut self, entry: &ChatEntry);

    /// Print the indicator shown while a reply is outstanding.
    fn print_composing(&mut self);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::to_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes into `out`.
    pub fn to_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_entry(&mut self, entry: &ChatEntry) {
        let text = format_entry(entry, self.use_color);
        self.write(&text);
    }

    fn print_composing(&mut self) {
        let text = style(
            &format!("{ASSISTANT_LABEL} is typing..."),
            ANSI_DIM,
            self.use_color,
        );
        self.write(&text);
    }

    fn print_error(&mut self, error: &str) {
        let text = style(&format!("Error: {error}"), ANSI_RED, self.use_color);
        let _ = writeln!(io::stderr(), "{text}");
    }

    fn print_info(&mut self, info: &str) {
        self.write(info);
    }
}

fn style(text: &str, code: &str, use_color: bool) -> String {
    if use_color {
        format!("{code}{text}{ANSI_RESET}")
    } else {
        text.to_string()
    }
}

/// Formats an entry as `[HH:MM] Speaker: text`, followed by any assistant
/// extras on indented lines.
pub fn format_entry(entry: &ChatEntry, use_color: bool) -> String {
    let clock = entry
        .timestamp()
        .format(format_description!("[hour]:[minute]"))
        .unwrap_or_default();
    let stamp = style(&format!("[{clock}]"), ANSI_DIM, use_color);
    match entry {
        ChatEntry::User { text, .. } => {
            let label = style(&format!("{USER_LABEL}:"), ANSI_BOLD, use_color);
            format!("{stamp} {label} {text}")
        }
        ChatEntry::Assistant { reply, .. } => {
            let color = if reply.is_error() { ANSI_RED } else { ANSI_CYAN };
            let label = style(&format!("{ASSISTANT_LABEL}:"), color, use_color);
            let mut out = format!("{stamp} {label} {}", reply.text);
            for line in reply_extras(reply, use_color) {
                out.push_str("\n    ");
                out.push_str(&line);
            }
            out
        }
    }
}

fn reply_extras(reply: &AssistantReply, use_color: bool) -> Vec<String> {
    let mut lines = Vec::new();

    let mut meta = Vec::new();
    if let Some(category) = &reply.category {
        meta.push(category.clone());
    }
    if let Some(confidence) = reply.confidence {
        meta.push(format!("{:.0}% confidence", confidence * 100.0));
    }
    if let Some(severity) = &reply.severity {
        meta.push(format!("severity {}", severity.to_uppercase()));
    }
    if !meta.is_empty() {
        lines.push(style(&format!("({})", meta.join(" | ")), ANSI_DIM, use_color));
    }

    match &reply.kind {
        ReplyKind::EmergencyContacts(contacts) => {
            lines.push(style("Emergency contacts:", ANSI_RED, use_color));
            for contact in contacts {
                lines.push(format!("  {}: {}", contact.service, contact.number));
            }
        }
        ReplyKind::ActionSuggestion(action) => {
            let text = match &action.secondary {
                Some(secondary) => format!("Suggested action: {} / {secondary}", action.primary),
                None => format!("Suggested action: {}", action.primary),
            };
            lines.push(style(&text, ANSI_YELLOW, use_color));
        }
        ReplyKind::PlainText | ReplyKind::Error => {}
    }

    if !reply.suggestions.is_empty() {
        lines.push("Try asking:".to_string());
        for (idx, suggestion) in reply.suggestions.iter().enumerate() {
            lines.push(style(
                &format!("  {}. {suggestion}", idx + 1),
                ANSI_GREEN,
                use_color,
            ));
        }
    }
    if !reply.related_topics.is_empty() {
        lines.push(style(
            &format!("Related: {}", reply.related_topics.join(", ")),
            ANSI_DIM,
            use_color,
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmergencyContact, SuggestedAction};
    use time::macros::datetime;

    fn at_noon(reply: AssistantReply) -> ChatEntry {
        ChatEntry::Assistant {
            reply,
            timestamp: datetime!(2024-03-01 12:05 UTC),
        }
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn user_entry() {
        let entry = ChatEntry::User {
            text: "Can I donate?".to_string(),
            timestamp: datetime!(2024-03-01 09:30 UTC),
        };
        assert_eq!(format_entry(&entry, false), "[09:30] You: Can I donate?");
    }

    #[test]
    fn metadata_line() {
        let mut reply = AssistantReply::plain("Donate every 3 months.");
        reply.category = Some("donation".to_string());
        reply.confidence = Some(0.92);
        reply.severity = Some("low".to_string());
        let text = format_entry(&at_noon(reply), false);
        assert_eq!(
            text,
            "[12:05] ThalAssist: Donate every 3 months.\n    (donation | 92% confidence | severity LOW)"
        );
    }

    #[test]
    fn emergency_and_suggestions() {
        let mut reply = AssistantReply::plain("Get help now.");
        reply.kind = ReplyKind::EmergencyContacts(vec![EmergencyContact {
            service: "Ambulance".to_string(),
            number: "108".to_string(),
        }]);
        reply.suggestions = vec!["Nearest blood bank?".to_string(), "Symptoms?".to_string()];
        let text = format_entry(&at_noon(reply), false);
        assert!(text.contains("\n    Emergency contacts:\n      Ambulance: 108"));
        assert!(text.contains("\n      1. Nearest blood bank?\n      2. Symptoms?"));
    }

    #[test]
    fn action_line() {
        let mut reply = AssistantReply::plain("You are eligible.");
        reply.kind = ReplyKind::ActionSuggestion(SuggestedAction {
            primary: "Schedule Donation".to_string(),
            secondary: Some("Find Blood Bank".to_string()),
        });
        let text = format_entry(&at_noon(reply), false);
        assert!(text.ends_with("Suggested action: Schedule Donation / Find Blood Bank"));
    }

    #[test]
    fn colored_output_resets() {
        let text = format_entry(&at_noon(AssistantReply::error()), true);
        assert!(text.contains(ANSI_RED));
        assert!(text.contains(ANSI_RESET));
    }

    #[test]
    fn writes_to_buffer() {
        let mut renderer = PlainTextRenderer::to_writer(Vec::new(), false);
        renderer.print_info("Conversation cleared.");
        renderer.print_composing();
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, "Conversation cleared.\nThalAssist is typing...\n");
    }
}
