//! Lightweight structural checks for generated candidates: verb and subject
//! detection plus implausible-year screening. These are heuristics over token
//! shapes, standing in for a full POS tagger.

const AUXILIARY_VERBS: &[&str] = &[
    "am", "is", "are", "was", "were", "be", "been", "being", "has", "have", "had", "do", "does",
    "did", "will", "would", "shall", "should", "can", "could", "may", "might", "must",
];

// Common irregular verbs that carry no -ed/-ing marker in past tense.
const IRREGULAR_VERBS: &[&str] = &[
    "said", "made", "went", "took", "came", "saw", "got", "gave", "found", "told", "became",
    "left", "felt", "put", "brought", "began", "kept", "held", "wrote", "stood", "heard", "let",
    "meant", "set", "met", "ran", "paid", "sat", "spoke", "led", "grew", "lost", "fell", "sent",
    "built", "understood", "drew", "broke", "spent", "cut", "rose", "drove", "bought", "wore",
    "chose", "won", "sold", "knew", "thought",
];

const PRONOUN_SUBJECTS: &[&str] = &[
    "i", "you", "he", "she", "it", "we", "they", "this", "that", "these", "those", "there",
    "everyone", "everybody", "someone", "somebody", "nobody", "who", "which",
];

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "his", "her", "its", "their", "our", "my", "your", "each", "every", "some",
    "many", "most", "few", "several", "all", "both", "no", "another",
];

/// Alphanumeric word tokens, punctuation stripped.
pub fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn is_verb_like(token: &str) -> bool {
    let lower = token.to_lowercase();
    if AUXILIARY_VERBS.contains(&lower.as_str()) || IRREGULAR_VERBS.contains(&lower.as_str()) {
        return true;
    }
    // Morphological cues: regular past tense and progressive forms.
    (lower.len() > 4 && lower.ends_with("ed")) || (lower.len() > 5 && lower.ends_with("ing"))
}

fn first_verb_index(tokens: &[String]) -> Option<usize> {
    tokens.iter().position(|t| is_verb_like(t))
}

pub fn has_verb(tokens: &[String]) -> bool {
    first_verb_index(tokens).is_some()
}

/// A detectable grammatical subject: a content word or pronoun appearing
/// before the first verb. A sentence opening directly with its verb
/// (imperative-like output) fails the check.
pub fn has_subject(tokens: &[String]) -> bool {
    let Some(verb_idx) = first_verb_index(tokens) else {
        return false;
    };
    tokens[..verb_idx].iter().any(|t| {
        let lower = t.to_lowercase();
        if PRONOUN_SUBJECTS.contains(&lower.as_str()) {
            return true;
        }
        if DETERMINERS.contains(&lower.as_str()) {
            return false;
        }
        // Adverbs modifying the verb do not count as a subject.
        if lower.len() > 3 && lower.ends_with("ly") {
            return false;
        }
        lower.chars().all(|c| c.is_alphabetic())
    })
}

/// First four-digit year-shaped number in the token stream.
pub fn find_year(tokens: &[String]) -> Option<i32> {
    tokens
        .iter()
        .filter(|t| t.len() == 4 && t.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|t| t.parse::<i32>().ok())
        .find(|y| (1000..=2999).contains(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        tokens(s)
    }

    #[test]
    fn detects_regular_and_irregular_verbs() {
        assert!(has_verb(&toks("The company announced record profits.")));
        assert!(has_verb(&toks("She went home early.")));
        assert!(has_verb(&toks("Prices are rising fast.")));
        assert!(!has_verb(&toks("A very tall green tree.")));
    }

    #[test]
    fn detects_subject_before_verb() {
        assert!(has_subject(&toks("The company announced record profits.")));
        assert!(has_subject(&toks("They announced a merger yesterday.")));
        // Verb-initial: no subject to be found.
        assert!(!has_subject(&toks("Announced record profits for the quarter.")));
        // Only an adverb before the verb.
        assert!(!has_subject(&toks("Quickly announced the results.")));
    }

    #[test]
    fn finds_plausible_years_only() {
        assert_eq!(find_year(&toks("The war ended in 1945.")), Some(1945));
        assert_eq!(find_year(&toks("Launched in 2024 worldwide.")), Some(2024));
        assert_eq!(find_year(&toks("It weighed 8000 kilograms.")), None);
        assert_eq!(find_year(&toks("No numbers here.")), None);
    }

    #[test]
    fn tokenizer_strips_punctuation() {
        assert_eq!(toks("Hello, world!"), vec!["Hello", "world"]);
    }
}
