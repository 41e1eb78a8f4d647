//! Voice command recognition
//!
//! Normalizes a recognized utterance and classifies it into exactly one
//! [`Intent`] by trying an ordered list of pattern rules. The first rule that
//! matches wins; later, looser rules never see input an earlier rule claimed.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::reminder::split_task_and_time;
use crate::types::Intent;

/// Phrases that end the interactive loop
const STOP_PHRASES: [&str; 4] = ["exit", "quit", "stop assistant", "shutdown"];

/// Substrings that mark an utterance as a mail command
const MAIL_TRIGGERS: [&str; 2] = ["send mail to", "send email to"];

/// Lowercase and trim raw recognized text
///
/// # Examples
/// ```
/// use hark::voice_commands::normalize_utterance;
///
/// assert_eq!(normalize_utterance("  Search For Rust  "), "search for rust");
/// ```
pub fn normalize_utterance(raw: &str) -> String {
    raw.trim().to_lowercase()
}

type Extractor = fn(&Regex, &str) -> Option<Intent>;

/// One command shape: a pattern and the function that turns a match into an intent
struct Rule {
    name: &'static str,
    pattern: Regex,
    extract: Extractor,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, extract: Extractor) -> Result<Self> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            extract,
        })
    }
}

/// Ordered rule set mapping utterances to intents
pub struct IntentMatcher {
    rules: Vec<Rule>,
}

impl IntentMatcher {
    /// Build the matcher with the built-in rules in priority order
    pub fn new() -> Result<Self> {
        let rules = vec![
            Rule::new(
                "search",
                r"^(?:search|google)(?:\s+for)?(?:\s+(.*))?$",
                extract_search,
            )?,
            Rule::new("open", r"^open(?:\s+(.*))?$", extract_open)?,
            Rule::new(
                "create_folder",
                r"^(?:create a folder|create folder|make folder)(?:\s+(.*))?$",
                extract_folder,
            )?,
            Rule::new(
                "create_file",
                r"^(?:create a file|make a file|create file|make file)(?:\s+(.*))?$",
                extract_file,
            )?,
            Rule::new(
                "send_mail",
                r"(?:send (?:an )?email|send mail)(?: to)?\s+(\S+)\s+(?:about|regarding)\s+(.+)",
                extract_mail,
            )?,
            Rule::new(
                "set_reminder",
                r"^remind me to(?:\s+(.*))?$",
                extract_reminder,
            )?,
        ];

        Ok(Self { rules })
    }

    /// Classify a normalized utterance
    pub fn classify(&self, utterance: &str) -> Intent {
        for rule in &self.rules {
            if let Some(intent) = (rule.extract)(&rule.pattern, utterance) {
                debug!("Utterance matched rule '{}'", rule.name);
                return intent;
            }
        }
        Intent::Unknown
    }

    /// Rule names in the order they are tried
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }
}

fn capture_arg(pattern: &Regex, text: &str) -> Option<String> {
    pattern.captures(text).map(|caps| {
        caps.get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    })
}

fn extract_search(pattern: &Regex, text: &str) -> Option<Intent> {
    capture_arg(pattern, text).map(|query| Intent::Search { query })
}

fn extract_open(pattern: &Regex, text: &str) -> Option<Intent> {
    capture_arg(pattern, text).map(|target| Intent::Open { target })
}

fn extract_folder(pattern: &Regex, text: &str) -> Option<Intent> {
    capture_arg(pattern, text).map(|name| Intent::CreateFolder { name })
}

fn extract_file(pattern: &Regex, text: &str) -> Option<Intent> {
    capture_arg(pattern, text).map(|name| Intent::CreateFile { name })
}

fn extract_mail(pattern: &Regex, text: &str) -> Option<Intent> {
    if !MAIL_TRIGGERS.iter().any(|t| text.contains(t)) {
        return None;
    }

    // recognized as mail from here on, parseable or not
    let intent = match pattern.captures(text) {
        Some(caps) => Intent::SendMail {
            to: caps[1].trim().to_string(),
            subject: caps[2].trim().to_string(),
            body: None,
        },
        None => Intent::MalformedMail,
    };
    Some(intent)
}

fn extract_reminder(pattern: &Regex, text: &str) -> Option<Intent> {
    capture_arg(pattern, text).map(|rest| {
        let (task, time) = split_task_and_time(&rest);
        Intent::SetReminder { task, time }
    })
}

/// Detects phrases that should stop the assistant
pub struct StopPhrases {
    automaton: Option<AhoCorasick>,
}

impl StopPhrases {
    pub fn new() -> Self {
        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostFirst)
            .build(STOP_PHRASES)
            .ok();
        Self { automaton }
    }

    /// True when the utterance contains any stop phrase
    pub fn matches(&self, utterance: &str) -> bool {
        match &self.automaton {
            Some(ac) => ac.is_match(utterance),
            None => STOP_PHRASES.iter().any(|p| utterance.contains(p)),
        }
    }
}

impl Default for StopPhrases {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Intent {
        IntentMatcher::new()
            .unwrap()
            .classify(&normalize_utterance(text))
    }

    #[test]
    fn test_search_with_for() {
        assert_eq!(
            classify("search for rust programming"),
            Intent::Search {
                query: "rust programming".to_string()
            }
        );
    }

    #[test]
    fn test_google_without_for() {
        assert_eq!(
            classify("Google weather in paris"),
            Intent::Search {
                query: "weather in paris".to_string()
            }
        );
    }

    #[test]
    fn test_word_starting_with_for_is_query() {
        assert_eq!(
            classify("google formula one"),
            Intent::Search {
                query: "formula one".to_string()
            }
        );
    }

    #[test]
    fn test_bare_search_has_empty_query() {
        assert_eq!(
            classify("search for"),
            Intent::Search {
                query: String::new()
            }
        );
        assert_eq!(
            classify("search"),
            Intent::Search {
                query: String::new()
            }
        );
    }

    #[test]
    fn test_searching_is_not_search() {
        assert_eq!(classify("searching is fun"), Intent::Unknown);
    }

    #[test]
    fn test_open() {
        assert_eq!(
            classify("open youtube"),
            Intent::Open {
                target: "youtube".to_string()
            }
        );
    }

    #[test]
    fn test_create_folder_variants() {
        for text in [
            "create folder projects",
            "make folder projects",
            "create a folder projects",
        ] {
            assert_eq!(
                classify(text),
                Intent::CreateFolder {
                    name: "projects".to_string()
                },
                "failed for {text}"
            );
        }
    }

    #[test]
    fn test_create_file_variants() {
        for text in [
            "create file notes",
            "make file notes",
            "create a file notes",
            "make a file notes",
        ] {
            assert_eq!(
                classify(text),
                Intent::CreateFile {
                    name: "notes".to_string()
                },
                "failed for {text}"
            );
        }
    }

    #[test]
    fn test_send_mail() {
        assert_eq!(
            classify("send mail to abc@gmail.com about leave tomorrow"),
            Intent::SendMail {
                to: "abc@gmail.com".to_string(),
                subject: "leave tomorrow".to_string(),
                body: None,
            }
        );
        assert_eq!(
            classify("please send email to boss@work.com regarding the report"),
            Intent::SendMail {
                to: "boss@work.com".to_string(),
                subject: "the report".to_string(),
                body: None,
            }
        );
    }

    #[test]
    fn test_mail_without_recipient_is_malformed() {
        assert_eq!(classify("send mail to"), Intent::MalformedMail);
        assert_eq!(
            classify("send email to bob@example.com"),
            Intent::MalformedMail
        );
    }

    #[test]
    fn test_mail_without_trigger_is_unknown() {
        assert_eq!(classify("send mail please"), Intent::Unknown);
    }

    #[test]
    fn test_reminder_split() {
        assert_eq!(
            classify("remind me to call mom at 6 pm"),
            Intent::SetReminder {
                task: "call mom".to_string(),
                time: Some("at 6 pm".to_string()),
            }
        );
    }

    #[test]
    fn test_reminder_without_time() {
        assert_eq!(
            classify("remind me to water the plants"),
            Intent::SetReminder {
                task: "water the plants".to_string(),
                time: None,
            }
        );
    }

    #[test]
    fn test_priority_search_before_mail() {
        // anchored search wins even though the mail trigger is present
        assert_eq!(
            classify("search send mail to bob about lunch"),
            Intent::Search {
                query: "send mail to bob about lunch".to_string()
            }
        );
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classify("what is the weather"), Intent::Unknown);
        assert_eq!(classify(""), Intent::Unknown);
    }

    #[test]
    fn test_rule_order() {
        let matcher = IntentMatcher::new().unwrap();
        assert_eq!(
            matcher.rule_names(),
            vec![
                "search",
                "open",
                "create_folder",
                "create_file",
                "send_mail",
                "set_reminder"
            ]
        );
    }

    #[test]
    fn test_stop_phrases() {
        let stop = StopPhrases::new();
        assert!(stop.matches("ok quit now"));
        assert!(stop.matches("stop assistant"));
        assert!(!stop.matches("open youtube"));
    }
}
