//! Transcript parsers for exported chat files.

use crate::types::MessageRole;
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ParsedMessage {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTranscript {
    /// Name of the detected format, stored in import metadata.
    pub format: &'static str,
    pub messages: Vec<ParsedMessage>,
}

impl ParsedTranscript {
    fn new(format: &'static str, messages: Vec<ParsedMessage>) -> Self {
        Self { format, messages }
    }
}

/// Detect the transcript format of `content` and extract its messages.
///
/// `path` only contributes its extension.
pub fn parse_transcript(path: &Path, content: &str) -> ParsedTranscript {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if extension == "jsonl" {
        return ParsedTranscript::new("jsonl", parse_jsonl(content));
    }

    let trimmed = content.trim_start();
    if extension == "json" || trimmed.starts_with('{') || trimmed.starts_with('[') {
        match serde_json::from_str::<Value>(content) {
            Ok(value) => return parse_json_value(&value),
            Err(_) if extension == "json" => return ParsedTranscript::new("invalid_json", Vec::new()),
            Err(_) => {}
        }
    }

    if extension == "md" {
        return ParsedTranscript::new("markdown", parse_markdown(content));
    }
    ParsedTranscript::new("text", parse_text(content))
}

fn parse_json_value(value: &Value) -> ParsedTranscript {
    match value {
        Value::Object(obj) if obj.contains_key("mapping") => {
            ParsedTranscript::new("chatgpt", parse_chatgpt_mapping(&obj["mapping"]))
        }
        Value::Object(obj) if obj.contains_key("messages") => {
            ParsedTranscript::new("messages", parse_message_collection(&obj["messages"]))
        }
        Value::Object(obj) if obj.contains_key("conversation") => {
            ParsedTranscript::new("character_ai", parse_character_conversation(&obj["conversation"]))
        }
        Value::Object(obj) if obj.contains_key("history") => {
            ParsedTranscript::new("text_generation_webui", parse_history(&obj["history"]))
        }
        Value::Array(items) => ParsedTranscript::new("array", parse_simple_array(items)),
        _ => ParsedTranscript::new("unknown_json", Vec::new()),
    }
}

/// One JSON object per line; lines that are not objects are skipped.
pub fn parse_jsonl(content: &str) -> Vec<ParsedMessage> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| value.as_object().and_then(message_from_object))
        .collect()
}

/// ChatGPT export: a `mapping` of node id to `{message: {author, content, create_time}}`.
fn parse_chatgpt_mapping(mapping: &Value) -> Vec<ParsedMessage> {
    let Some(nodes) = mapping.as_object() else {
        return Vec::new();
    };

    let mut timed: Vec<(Option<f64>, ParsedMessage)> = nodes
        .values()
        .filter_map(|node| {
            let message = node.get("message")?;
            let role = message
                .pointer("/author/role")
                .and_then(Value::as_str)
                .map(MessageRole::parse_lenient)
                .unwrap_or(MessageRole::Unknown);
            let content = message.get("content").and_then(content_text)?;
            let created = message.get("create_time").and_then(Value::as_f64);
            Some((created, ParsedMessage::new(role, content)))
        })
        .collect();

    // Nodes without a timestamp sort last
    timed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    timed.into_iter().map(|(_, m)| m).collect()
}

/// `messages` as either an array or an object of message objects.
fn parse_message_collection(messages: &Value) -> Vec<ParsedMessage> {
    match messages {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_object().and_then(message_from_object))
            .collect(),
        Value::Object(map) => map
            .values()
            .filter_map(|v| v.as_object().and_then(message_from_object))
            .collect(),
        _ => Vec::new(),
    }
}

/// Character.ai style: turns carry `role`, an `is_human` flag or the
/// speaking `character`.
fn parse_character_conversation(conversation: &Value) -> Vec<ParsedMessage> {
    let turns = match conversation {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => match obj.get("turns").or_else(|| obj.get("messages")) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    turns
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|turn| {
            let content = ["text", "content", "message"]
                .iter()
                .find_map(|key| turn.get(*key).and_then(content_text))?;
            let role = if let Some(role) = turn.get("role").and_then(Value::as_str) {
                MessageRole::parse_lenient(role)
            } else if let Some(is_human) = turn.get("is_human").and_then(Value::as_bool) {
                if is_human {
                    MessageRole::User
                } else {
                    MessageRole::Assistant
                }
            } else if turn.contains_key("character") {
                MessageRole::Assistant
            } else {
                MessageRole::User
            };
            Some(ParsedMessage::new(role, content))
        })
        .collect()
}

/// text-generation-webui: `history` holds `[user, assistant]` pairs,
/// directly or under `internal`/`visible`.
fn parse_history(history: &Value) -> Vec<ParsedMessage> {
    let entries = match history {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("internal").or_else(|| obj.get("visible")) {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut messages = Vec::new();
    for entry in entries {
        match entry {
            Value::Array(pair) => {
                let roles = [MessageRole::User, MessageRole::Assistant];
                for (role, text) in roles.into_iter().zip(pair) {
                    if let Some(text) = text.as_str().map(str::trim).filter(|t| !t.is_empty()) {
                        messages.push(ParsedMessage::new(role, text));
                    }
                }
            }
            Value::Object(obj) => messages.extend(message_from_object(obj)),
            _ => {}
        }
    }
    messages
}

/// Bare array of message objects; role defaults to user.
fn parse_simple_array(items: &[Value]) -> Vec<ParsedMessage> {
    items
        .iter()
        .filter_map(Value::as_object)
        .filter(|obj| obj.contains_key("role") || obj.contains_key("content"))
        .filter_map(message_from_object)
        .collect()
}

fn message_from_object(obj: &Map<String, Value>) -> Option<ParsedMessage> {
    let content = ["content", "text", "message"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(content_text))?;
    let role = ["role", "author", "sender", "speaker"]
        .iter()
        .find_map(|key| match obj.get(*key) {
            Some(Value::String(s)) => Some(MessageRole::parse_lenient(s)),
            Some(Value::Object(author)) => author
                .get("role")
                .and_then(Value::as_str)
                .map(MessageRole::parse_lenient),
            _ => None,
        })
        .unwrap_or(MessageRole::User);
    Some(ParsedMessage::new(role, content))
}

/// Text of a content value: a string, a list of parts, or an object with
/// `parts` or `text`. Empty text yields `None`.
fn content_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str).map(|s| s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(obj) => {
            if let Some(parts) = obj.get("parts") {
                return content_text(parts);
            }
            obj.get("text").and_then(Value::as_str).unwrap_or_default().trim().to_string()
        }
        _ => String::new(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// `Speaker: rest` with a known speaker name.
fn speaker_marker(line: &str) -> Option<(MessageRole, &str)> {
    let (speaker, rest) = line.split_once(':')?;
    let role = match speaker.trim().trim_matches('*').trim().to_lowercase().as_str() {
        "user" | "human" | "me" => MessageRole::User,
        "assistant" | "ai" | "bot" | "friday" => MessageRole::Assistant,
        "system" => MessageRole::System,
        _ => return None,
    };
    Some((role, rest.trim_start_matches('*').trim()))
}

/// Markdown transcripts mark turns with headings, bold or quotes:
/// `## User:`, `**Assistant:**`, `> AI:`.
pub fn parse_markdown(content: &str) -> Vec<ParsedMessage> {
    let mut blocks = TurnCollector::default();
    for line in content.lines() {
        let stripped = line
            .trim()
            .trim_start_matches('#')
            .trim_start_matches('>')
            .trim();
        match speaker_marker(stripped) {
            Some((role, rest)) => blocks.start(role, rest),
            None => blocks.push_line(line.trim_end(), MessageRole::User),
        }
    }
    blocks.finish()
}

/// Plain `Speaker: text` transcripts. Text before the first marker is
/// attributed to the user.
pub fn parse_text(content: &str) -> Vec<ParsedMessage> {
    let mut blocks = TurnCollector::default();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match speaker_marker(line) {
            Some((role, rest)) => blocks.start(role, rest),
            None => blocks.push_line(line, MessageRole::User),
        }
    }
    blocks.finish()
}

#[derive(Default)]
struct TurnCollector {
    current: Option<(MessageRole, Vec<String>)>,
    done: Vec<ParsedMessage>,
}

impl TurnCollector {
    fn start(&mut self, role: MessageRole, first_line: &str) {
        self.flush();
        let lines = if first_line.is_empty() {
            Vec::new()
        } else {
            vec![first_line.to_string()]
        };
        self.current = Some((role, lines));
    }

    fn push_line(&mut self, line: &str, default_role: MessageRole) {
        match self.current {
            Some((_, ref mut lines)) => lines.push(line.to_string()),
            None if line.trim().is_empty() => {}
            None => self.current = Some((default_role, vec![line.to_string()])),
        }
    }

    fn flush(&mut self) {
        if let Some((role, lines)) = self.current.take() {
            let content = lines.join("\n").trim().to_string();
            if !content.is_empty() {
                self.done.push(ParsedMessage::new(role, content));
            }
        }
    }

    fn finish(mut self) -> Vec<ParsedMessage> {
        self.flush();
        self.done
    }
}

/// Best guess at which application exported a file, from its path.
pub fn detect_source_application(path: &Path) -> &'static str {
    let lowered = path.to_string_lossy().to_lowercase();
    let matches_any = |needles: &[&str]| needles.iter().any(|n| lowered.contains(n));

    if matches_any(&["chatgpt", "openai"]) {
        "ChatGPT"
    } else if matches_any(&["claude", "anthropic"]) {
        "Claude"
    } else if matches_any(&["copilot"]) {
        "Copilot"
    } else if matches_any(&["lmstudio", "lm-studio", "lm_studio", "lm studio"]) {
        "LM Studio"
    } else if matches_any(&["ollama"]) {
        "Ollama"
    } else if matches_any(&["vscode", "vs code", "code - insiders"]) {
        "VS Code"
    } else {
        "Unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn roles(messages: &[ParsedMessage]) -> Vec<MessageRole> {
        messages.iter().map(|m| m.role).collect()
    }

    #[test]
    fn test_jsonl_skips_bad_lines() {
        let content = "{\"role\":\"user\",\"content\":\"hi\"}\nnot json\n\n{\"role\":\"assistant\",\"content\":\"hello\"}\n";
        let parsed = parse_transcript(Path::new("chat.jsonl"), content);
        assert_eq!(parsed.format, "jsonl");
        assert_eq!(roles(&parsed.messages), vec![MessageRole::User, MessageRole::Assistant]);
    }

    #[test]
    fn test_chatgpt_mapping_ordered_by_create_time() {
        let content = serde_json::json!({
            "title": "t",
            "mapping": {
                "b": {"message": {"author": {"role": "assistant"}, "content": {"parts": ["Sure", "thing"]}, "create_time": 2.0}},
                "a": {"message": {"author": {"role": "user"}, "content": {"parts": ["Help me"]}, "create_time": 1.0}},
                "root": {"message": null},
                "empty": {"message": {"author": {"role": "system"}, "content": {"parts": [""]}, "create_time": 0.5}}
            }
        })
        .to_string();
        let parsed = parse_transcript(Path::new("conversations.json"), &content);
        assert_eq!(parsed.format, "chatgpt");
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.messages[0].content, "Help me");
        assert_eq!(parsed.messages[1].content, "Sure thing");
        assert_eq!(parsed.messages[1].role, MessageRole::Assistant);
    }

    #[test]
    fn test_messages_object() {
        let content = r#"{"messages": [{"role": "human", "content": "a"}, {"sender": "bot", "text": "b"}]}"#;
        let parsed = parse_transcript(Path::new("x.json"), content);
        assert_eq!(parsed.format, "messages");
        assert_eq!(roles(&parsed.messages), vec![MessageRole::User, MessageRole::Assistant]);
    }

    #[test]
    fn test_character_ai_conversation() {
        let content = r#"{"conversation": [
            {"is_human": true, "text": "hello"},
            {"character": "Aria", "text": "greetings"}
        ]}"#;
        let parsed = parse_transcript(Path::new("c.json"), content);
        assert_eq!(parsed.format, "character_ai");
        assert_eq!(roles(&parsed.messages), vec![MessageRole::User, MessageRole::Assistant]);
    }

    #[test]
    fn test_webui_history_pairs() {
        let content = r#"{"history": {"internal": [["q1", "a1"], ["q2", ""]]}}"#;
        let parsed = parse_transcript(Path::new("h.json"), content);
        assert_eq!(parsed.format, "text_generation_webui");
        assert_eq!(parsed.messages.len(), 3);
        assert_eq!(parsed.messages[2].content, "q2");
    }

    #[test]
    fn test_simple_array_defaults_to_user() {
        let content = r#"[{"content": "no role"}, {"role": "assistant", "content": "yes"}, "stray"]"#;
        let parsed = parse_transcript(Path::new("a.json"), content);
        assert_eq!(parsed.format, "array");
        assert_eq!(roles(&parsed.messages), vec![MessageRole::User, MessageRole::Assistant]);
    }

    #[test]
    fn test_invalid_json_file_yields_nothing() {
        let parsed = parse_transcript(Path::new("broken.json"), "{ nope");
        assert_eq!(parsed.format, "invalid_json");
        assert!(parsed.messages.is_empty());
    }

    #[rstest]
    #[case("## User: What is Rust?")]
    #[case("**User:** What is Rust?")]
    #[case("> User: What is Rust?")]
    fn test_markdown_markers(#[case] marker: &str) {
        let content = format!("{}\nMore detail\n\n**Assistant:** A language.\n", marker);
        let parsed = parse_transcript(Path::new("notes.md"), &content);
        assert_eq!(parsed.format, "markdown");
        assert_eq!(parsed.messages.len(), 2);
        assert_eq!(parsed.messages[0].content, "What is Rust?\nMore detail");
        assert_eq!(parsed.messages[1].role, MessageRole::Assistant);
        assert_eq!(parsed.messages[1].content, "A language.");
    }

    #[test]
    fn test_plain_text_preamble_is_user() {
        let content = "context line\n\nFriday: Good morning\nme: thanks\nstill me\n";
        let parsed = parse_transcript(Path::new("log.txt"), content);
        assert_eq!(parsed.format, "text");
        assert_eq!(
            roles(&parsed.messages),
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::User]
        );
        assert_eq!(parsed.messages[2].content, "thanks\nstill me");
    }

    #[rstest]
    #[case("/home/u/Downloads/chatgpt-export/conversations.json", "ChatGPT")]
    #[case("/home/u/.config/Claude/logs/chat.txt", "Claude")]
    #[case("/home/u/.vscode/copilot/chat.json", "Copilot")]
    #[case("/home/u/.lmstudio/conversations/a.json", "LM Studio")]
    #[case("/srv/ollama/history.jsonl", "Ollama")]
    #[case("/home/u/.vscode/history.md", "VS Code")]
    #[case("/tmp/random.txt", "Unknown")]
    fn test_source_application(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(detect_source_application(Path::new(path)), expected);
    }
}
