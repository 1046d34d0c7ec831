//! Extracts quiz-worthy sentences from free text and splits them into
//! (partial, full) prompt pairs for the orchestrator.

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "than", "that", "this", "these", "those",
    "of", "in", "on", "at", "to", "for", "from", "with", "by", "as", "is", "are", "was", "were",
    "be", "been", "being", "it", "its", "he", "she", "they", "them", "his", "her", "their", "we",
    "you", "i", "not", "no", "so", "do", "does", "did", "have", "has", "had", "will", "would",
    "can", "could", "about", "into", "over", "after", "before", "between", "out", "up", "down",
];

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Fraction of sentences kept by the extractive summarization step.
    pub summary_ratio: f32,
    pub min_chars: usize,
    pub max_chars: usize,
    /// Fraction of leading words forming the partial sentence.
    pub partial_ratio: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            summary_ratio: 0.3,
            min_chars: 30,
            max_chars: 150,
            partial_ratio: 0.7,
        }
    }
}

#[derive(Clone, Default)]
pub struct TextPipeline {
    settings: PipelineSettings,
}

impl TextPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    /// Candidate sentences for statement generation: the most
    /// information-dense sentences of the text, cut at clause boundaries,
    /// with quoted speech and questions removed.
    pub fn candidate_sentences(&self, text: &str) -> Vec<String> {
        let sentences = split_sentences(text);
        let selected = self.summarize(&sentences);

        selected
            .into_iter()
            .map(|s| {
                s.split(|c| c == ':' || c == ';')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
            .filter(|s| s.len() > self.settings.min_chars && s.len() < self.settings.max_chars)
            .filter(|s| !contains_quote_or_question(s))
            .map(|s| {
                s.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
                    .to_string()
            })
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Frequency-scored extractive selection: keeps the top `summary_ratio`
    /// share of sentences by average word frequency, in original order.
    fn summarize(&self, sentences: &[String]) -> Vec<String> {
        if sentences.len() <= 1 {
            return sentences.to_vec();
        }

        let mut frequencies = std::collections::HashMap::new();
        for sentence in sentences {
            for word in content_words(sentence) {
                *frequencies.entry(word).or_insert(0usize) += 1;
            }
        }

        let mut scored: Vec<(usize, f32)> = sentences
            .iter()
            .enumerate()
            .map(|(i, sentence)| {
                let words = content_words(sentence);
                let score = if words.is_empty() {
                    0.0
                } else {
                    let total: usize = words.iter().map(|w| frequencies[w]).sum();
                    total as f32 / words.len() as f32
                };
                (i, score)
            })
            .collect();

        let keep = ((sentences.len() as f32 * self.settings.summary_ratio).ceil() as usize).max(1);
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut kept_indices: Vec<usize> = scored.into_iter().take(keep).map(|(i, _)| i).collect();
        kept_indices.sort_unstable();

        kept_indices
            .into_iter()
            .map(|i| sentences[i].clone())
            .collect()
    }

    /// Leading fraction of whitespace words, used as the generation prompt.
    pub fn partial_of(&self, sentence: &str) -> String {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        let cut = ((words.len() as f32 * self.settings.partial_ratio) as usize).max(1);
        words[..cut.min(words.len())].join(" ")
    }

    /// (partial, full) pairs ready for the orchestrator batch path.
    pub fn completion_pairs(&self, text: &str) -> Vec<(String, String)> {
        self.candidate_sentences(text)
            .into_iter()
            .map(|sentence| (self.partial_of(&sentence), sentence))
            .collect()
    }
}

fn content_words(sentence: &str) -> Vec<String> {
    sentence
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.len() > 1 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn contains_quote_or_question(sentence: &str) -> bool {
    sentence.contains('"')
        || sentence.contains('\u{201c}')
        || sentence.contains('\u{201d}')
        || sentence.contains('?')
        || sentence.contains(" '")
}

/// Sentence boundary splitting on terminator punctuation followed by
/// whitespace. Decimal points and abbreviation dots inside tokens do not end
/// a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if chars.peek().map_or(true, |next| next.is_whitespace()) {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}
