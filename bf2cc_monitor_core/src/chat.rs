use serde::{Deserialize, Serialize};

use crate::response::{records, require_fields, MalformedRecordError};

/// Fewest fields a chat record may have. Records with exactly this many have
/// an empty text.
pub const MIN_CHAT_FIELDS: usize = 5;

const COMMAND_PREFIXES: [char; 3] = ['!', '/', '|'];
/// Messages sent from an administrator's own chat channel carry this prefix.
const ADMIN_CHANNEL_PREFIX: &str = ": ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Slot id of the sender, `None` for server messages.
    pub pid: Option<usize>,
    pub origin: String,
    pub team: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub time: String,
    pub text: String,
    /// The command line without its prefix, if the text is a command.
    pub command: Option<String>,
}

impl ChatMessage {
    /// # Errors
    /// If the record has fewer than [`MIN_CHAT_FIELDS`] fields
    pub fn from_fields(fields: &[&str]) -> Result<Self, MalformedRecordError> {
        require_fields(fields, MIN_CHAT_FIELDS)?;

        let text = fields.get(MIN_CHAT_FIELDS).copied().unwrap_or_default();
        Ok(Self {
            pid: fields[0].trim().parse().ok(),
            origin: fields[1].to_owned(),
            team: fields[2].to_owned(),
            kind: fields[3].to_owned(),
            time: fields[4].to_owned(),
            text: text.to_owned(),
            command: extract_command(text),
        })
    }

    #[must_use]
    pub const fn is_command(&self) -> bool {
        self.command.is_some()
    }
}

fn extract_command(text: &str) -> Option<String> {
    let text = text.strip_prefix(ADMIN_CHANNEL_PREFIX).unwrap_or(text);
    let mut chars = text.chars();
    let prefix = chars.next()?;

    COMMAND_PREFIXES
        .contains(&prefix)
        .then(|| chars.as_str().to_owned())
}

/// Parses a `bf2cc clientchatbuffer` dump. Short records are skipped.
#[must_use]
pub fn parse_chat(dump: &str) -> Vec<ChatMessage> {
    records(dump)
        .filter_map(|fields| {
            ChatMessage::from_fields(&fields)
                .map_err(|e| tracing::trace!("Skipping chat record: {e}"))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn command_message() {
        let messages = parse_chat("3\tAce\t1\tchat\t12:00\t!test");

        assert_eq!(
            messages,
            vec![ChatMessage {
                pid: Some(3),
                origin: "Ace".into(),
                team: "1".into(),
                kind: "chat".into(),
                time: "12:00".into(),
                text: "!test".into(),
                command: Some("test".into()),
            }]
        );
        assert!(messages[0].is_command());
    }

    #[test]
    fn every_prefix_is_recognized() {
        for text in ["!kick bob", "/kick bob", "|kick bob", ": !kick bob"] {
            assert_eq!(extract_command(text).as_deref(), Some("kick bob"), "{text}");
        }
        assert_eq!(extract_command("hello !there"), None);
        assert_eq!(extract_command(""), None);
        assert_eq!(extract_command(": hi"), None);
    }

    #[test]
    fn five_fields_means_empty_text() {
        let messages = parse_chat("-1\tServer\t0\tserver\t12:01");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].pid, None);
        assert_eq!(messages[0].text, "");
        assert!(!messages[0].is_command());
    }

    #[test]
    fn records_are_split_and_short_ones_dropped() {
        let dump = "1\tA\t1\tchat\t12:00\thi\r2\tB\r3\tC\t2\tteam\t12:02\t/help\r\n";
        let messages = parse_chat(dump);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].origin, "A");
        assert_eq!(messages[1].command.as_deref(), Some("help"));
    }
}
