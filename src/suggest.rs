/// Source of short free-text ideas (task labels, motivational lines).
/// An empty answer means "nothing to suggest".
pub trait Suggester: Send + Sync {
    fn suggest(&self, prompt: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSuggester;

impl Suggester for NoopSuggester {
    fn suggest(&self, _prompt: &str) -> String {
        String::new()
    }
}

/// Trims whitespace and surrounding quotes from a raw suggestion.
pub fn clean_suggestion(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Suggester;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct CannedSuggester {
        answer: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedSuggester {
        pub fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompt lock").clone()
        }
    }

    impl Suggester for CannedSuggester {
        fn suggest(&self, prompt: &str) -> String {
            self.prompts.lock().expect("prompt lock").push(prompt.to_string());
            self.answer.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{clean_suggestion, NoopSuggester, Suggester};

    #[test]
    fn noop_suggests_nothing() {
        assert!(NoopSuggester.suggest("anything").is_empty());
    }

    #[test]
    fn clean_strips_quotes_and_whitespace() {
        assert_eq!(clean_suggestion("  \"Drink water\"\n"), "Drink water");
        assert_eq!(clean_suggestion("'Stretch'"), "Stretch");
        assert_eq!(clean_suggestion("Let's go"), "Let's go");
        assert_eq!(clean_suggestion("  \"\" "), "");
    }
}
