use serde::{Deserialize, Serialize};

/// Length bounds handed to the summarizer, derived from the word count of its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBudget {
    pub min_length: usize,
    pub max_length: usize,
}

impl SummaryBudget {
    pub const fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
        }
    }

    pub fn for_text(text: &str) -> Self {
        Self::for_word_count(text.split_whitespace().count())
    }

    pub fn for_word_count(words: usize) -> Self {
        match words {
            0..=10 => Self::new(3, 8),
            11..=50 => Self::new(8, 25),
            51..=100 => Self::new(15, 40),
            _ => Self::new(20, 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_bucket_boundaries() {
        let expected = [
            (0, (3, 8)),
            (10, (3, 8)),
            (11, (8, 25)),
            (50, (8, 25)),
            (51, (15, 40)),
            (100, (15, 40)),
            (101, (20, 60)),
        ];

        for (count, (min, max)) in expected {
            assert_eq!(
                SummaryBudget::for_text(&words(count)),
                SummaryBudget::new(min, max),
                "word count {count}"
            );
        }
    }

    #[test]
    fn test_words_split_on_any_whitespace() {
        let text = "Mild opacity. \nNo acute\tfindings. \n";
        assert_eq!(SummaryBudget::for_text(text), SummaryBudget::new(3, 8));
        assert_eq!(SummaryBudget::for_text(text), SummaryBudget::for_text(text));
    }

    #[test]
    fn test_every_bucket_has_room() {
        for count in [0, 10, 11, 50, 51, 100, 101, 10_000] {
            let budget = SummaryBudget::for_word_count(count);
            assert!(budget.max_length > budget.min_length);
        }
    }
}
