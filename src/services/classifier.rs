use std::collections::HashSet;

/// Maps a question to the focus areas it exercises.
///
/// Weak and strong areas are built from these labels, and the adaptive selector matches
/// them against question text, so labels should be words likely to appear in questions.
pub trait TopicClassifier: Send + Sync {
    fn areas(&self, topic: &str, question_text: &str) -> Vec<String>;
}

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "among", "being", "below", "between", "cannot",
    "could", "does", "doing", "during", "each", "every", "following", "from", "have", "having",
    "itself", "other", "their", "there", "these", "those", "through", "under", "until", "which",
    "while", "would", "where", "whose", "what", "when", "correct", "answer", "statement",
    "describe", "explain", "select", "choose", "true", "false", "best",
];

/// Default classifier: the first few significant words of the question.
///
/// A word is significant when it is at least `min_len` characters long and not a stop word.
/// Questions without significant words fall back to the topic name.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    min_len: usize,
    max_areas: usize,
    stop_words: HashSet<&'static str>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            min_len: 5,
            max_areas: 3,
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }
}

impl KeywordClassifier {
    pub fn new(min_len: usize, max_areas: usize) -> Self {
        Self {
            min_len: min_len.max(1),
            max_areas: max_areas.max(1),
            ..Self::default()
        }
    }
}

impl TopicClassifier for KeywordClassifier {
    fn areas(&self, topic: &str, question_text: &str) -> Vec<String> {
        let mut areas: Vec<String> = Vec::new();
        for word in question_text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= self.min_len)
            .map(str::to_lowercase)
        {
            if self.stop_words.contains(word.as_str()) || areas.contains(&word) {
                continue;
            }
            areas.push(word);
            if areas.len() == self.max_areas {
                break;
            }
        }

        if areas.is_empty() {
            let topic = topic.trim().to_lowercase();
            if !topic.is_empty() {
                areas.push(topic);
            }
        }
        areas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_significant_words() {
        let classifier = KeywordClassifier::default();
        let areas = classifier.areas("Biology", "Which organelle performs photosynthesis in plant cells?");
        assert_eq!(areas, vec!["organelle", "performs", "photosynthesis"]);
    }

    #[test]
    fn test_falls_back_to_topic() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.areas("Math", "2 + 2 = ?"), vec!["math"]);
        assert!(classifier.areas("  ", "").is_empty());
    }

    #[test]
    fn test_skips_stop_words_and_duplicates() {
        let classifier = KeywordClassifier::new(5, 5);
        let areas = classifier.areas("t", "Which of the following enzymes; enzymes digest starch");
        assert_eq!(areas, vec!["enzymes", "digest", "starch"]);
    }
}
