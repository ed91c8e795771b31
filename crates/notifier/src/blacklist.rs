use std::collections::HashSet;

use herald_common::config::{AppConfig, DEFAULT_BLACKLIST, parse_blacklist};

/// Recipients that must never receive a notification. Fixed at startup.
#[derive(Debug, Clone)]
pub struct Blacklist {
    numbers: HashSet<String>,
}

impl Blacklist {
    pub fn new<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            numbers: numbers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            numbers: config.blacklist.clone(),
        }
    }

    pub fn contains(&self, phone_number: &str) -> bool {
        self.numbers.contains(phone_number)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self {
            numbers: parse_blacklist(DEFAULT_BLACKLIST),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_numbers() {
        let blacklist = Blacklist::default();
        assert!(blacklist.contains("4153518780"));
        assert!(blacklist.contains("4153518781"));
        assert!(!blacklist.contains("5551234567"));
        assert_eq!(blacklist.len(), 2);
    }

    #[test]
    fn test_exact_match_only() {
        let blacklist = Blacklist::new(["4153518780"]);
        assert!(!blacklist.contains(" 4153518780"));
        assert!(!blacklist.contains("415351878"));
    }

    #[test]
    fn test_empty() {
        let blacklist = Blacklist::new(Vec::<String>::new());
        assert!(blacklist.is_empty());
        assert!(!blacklist.contains("4153518780"));
    }
}
