use screener_core::{ClassProbabilities, HeadlineClassifier};
use std::collections::HashSet;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "profit", "growth", "beat",
    "upgrade", "outperform", "strong", "positive", "rise", "increase",
    "breakthrough", "innovation", "success", "exceed", "momentum",
    "buy", "recommend", "optimistic", "record", "advance",
    "dividend", "buyback", "upside", "recovery", "rebound", "expansion",
    "robust", "overweight", "raised", "upgraded", "tailwind",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "loss", "fall", "plunge", "crash", "miss",
    "downgrade", "underperform", "weak", "negative", "drop", "decrease",
    "concern", "risk", "fail", "disappoint", "slump", "sell",
    "warning", "pessimistic", "retreat", "fear", "trouble",
    "headwind", "lawsuit", "litigation", "recall", "investigation",
    "probe", "default", "bankruptcy", "layoff", "downside", "lowered",
];

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't",
    "hardly", "barely", "neither", "nor", "without",
];

/// Words within this distance after a negation flip polarity.
const NEGATION_WINDOW: usize = 3;

/// Lexicon-based three-class classifier. Counts polarity hits with a short
/// negation window and turns the counts into pseudo-probabilities; a headline
/// with no lexicon hits is fully neutral.
pub struct WordListClassifier {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl WordListClassifier {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }
}

impl Default for WordListClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlineClassifier for WordListClassifier {
    fn classify(&self, headline: &str) -> ClassProbabilities {
        let lowered = headline.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':'))
            .filter(|w| !w.is_empty())
            .collect();

        let negation_positions: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.negation.contains(*w))
            .map(|(i, _)| i)
            .collect();

        let mut positive_hits = 0usize;
        let mut negative_hits = 0usize;

        for (i, word) in words.iter().enumerate() {
            let is_positive = self.positive.contains(*word);
            let is_negative = self.negative.contains(*word);
            if !is_positive && !is_negative {
                continue;
            }

            let negated = negation_positions
                .iter()
                .any(|&pos| pos < i && i - pos <= NEGATION_WINDOW);

            match (is_positive, negated) {
                (true, false) | (false, true) => positive_hits += 1,
                _ => negative_hits += 1,
            }
        }

        let total = positive_hits + negative_hits;
        if total == 0 {
            return ClassProbabilities {
                negative: 0.0,
                neutral: 1.0,
                positive: 0.0,
            };
        }

        // One pseudo-count of neutral mass keeps single-hit headlines from
        // reading as fully certain.
        let denominator = (total + 1) as f64;
        ClassProbabilities {
            negative: negative_hits as f64 / denominator,
            neutral: 1.0 / denominator,
            positive: positive_hits as f64 / denominator,
        }
    }
}
