use serde::Deserialize;

use super::models::{Bet, Outcome};

/// Bet list filter. Text matching is case-insensitive substring search;
/// empty strings match everything.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BetFilter {
    /// Matched against description and category
    pub search: String,
    pub tipster: String,
    pub show_pending: bool,
    pub show_wins: bool,
    pub show_losses: bool,
}

impl Default for BetFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            tipster: String::new(),
            show_pending: true,
            show_wins: true,
            show_losses: true,
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl BetFilter {
    pub fn matches(&self, bet: &Bet) -> bool {
        let matches_search = contains_ci(&bet.description, &self.search)
            || bet
                .category
                .as_deref()
                .is_some_and(|c| contains_ci(c, &self.search));

        let matches_tipster = self.tipster.is_empty()
            || bet
                .tipster
                .as_deref()
                .is_some_and(|t| contains_ci(t, &self.tipster));

        let matches_outcome = match bet.outcome {
            Outcome::Win => self.show_wins,
            Outcome::Loss => self.show_losses,
            Outcome::Pending => self.show_pending,
        };

        matches_search && matches_tipster && matches_outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn bet(description: &str, category: Option<&str>, tipster: Option<&str>, outcome: Outcome) -> Bet {
        Bet {
            id: "b".into(),
            date: Utc::now(),
            description: description.into(),
            category: category.map(Into::into),
            tipster: tipster.map(Into::into),
            bet_amount: dec!(10),
            odds: dec!(-110),
            outcome,
            profit_loss: dec!(0),
        }
    }

    #[test]
    fn test_default_matches_everything() {
        let filter = BetFilter::default();
        assert!(filter.matches(&bet("Arsenal win", None, None, Outcome::Pending)));
        assert!(filter.matches(&bet("Arsenal win", None, None, Outcome::Loss)));
    }

    #[test]
    fn test_search_covers_description_and_category() {
        let filter = BetFilter {
            search: "premier".into(),
            ..BetFilter::default()
        };
        assert!(filter.matches(&bet("Arsenal win", Some("Premier League"), None, Outcome::Win)));
        assert!(!filter.matches(&bet("Arsenal win", Some("FA Cup"), None, Outcome::Win)));
        assert!(!filter.matches(&bet("Arsenal win", None, None, Outcome::Win)));
    }

    #[test]
    fn test_tipster_filter_requires_tipster() {
        let filter = BetFilter {
            tipster: "SHARP".into(),
            ..BetFilter::default()
        };
        assert!(filter.matches(&bet("x", None, Some("sharpbettor"), Outcome::Win)));
        assert!(!filter.matches(&bet("x", None, None, Outcome::Win)));
    }

    #[test]
    fn test_outcome_toggles() {
        let filter = BetFilter {
            show_pending: false,
            ..BetFilter::default()
        };
        assert!(!filter.matches(&bet("x", None, None, Outcome::Pending)));
        assert!(filter.matches(&bet("x", None, None, Outcome::Win)));
    }
}
