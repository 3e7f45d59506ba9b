use serde::{Deserialize, Serialize};

/// A service the visitor can pick from the chip row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    pub intro: String,
    pub follow_ups: Vec<String>,
}

impl ServiceEntry {
    fn new(name: &str, intro: &str, follow_ups: [&str; 3]) -> Self {
        Self {
            name: name.to_string(),
            intro: intro.to_string(),
            follow_ups: follow_ups.iter().map(|q| q.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCatalog {
    entries: Vec<ServiceEntry>,
}

impl ServiceCatalog {
    pub fn new(entries: Vec<ServiceEntry>) -> Self {
        Self { entries }
    }

    /// Uses the configured services when present and non-empty.
    pub fn from_config(services: Option<&[ServiceEntry]>) -> Self {
        match services {
            Some(entries) if !entries.is_empty() => Self::new(entries.to_vec()),
            _ => Self::default(),
        }
    }

    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn find(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name.trim()))
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::new(vec![
            ServiceEntry::new(
                "IT Services",
                "Great choice! Our IT team handles infrastructure, cloud migration and day-to-day support.",
                [
                    "Are you looking for ongoing managed support or a one-off project?",
                    "Which systems or platforms are you currently running?",
                    "How many people in your organisation would rely on the service?",
                ],
            ),
            ServiceEntry::new(
                "E-commerce Services",
                "Wonderful! We build and grow online stores from the first product page to checkout.",
                [
                    "Do you already sell online, or is this a new store?",
                    "Roughly how many products will you list?",
                    "Do you need help with payments, shipping or marketplace integrations?",
                ],
            ),
            ServiceEntry::new(
                "Digital Marketing",
                "Excellent! Our marketing team covers SEO, paid campaigns and social media.",
                [
                    "Which channels are you using today?",
                    "What is the main goal: traffic, leads or sales?",
                    "Do you have a monthly budget in mind?",
                ],
            ),
            ServiceEntry::new(
                "Custom Software Development",
                "Perfect! We design and build software tailored to the way your business works.",
                [
                    "What problem should the software solve?",
                    "Is this a web app, a mobile app or an internal tool?",
                    "Do you have a target launch date?",
                ],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_three_follow_ups_each() {
        let catalog = ServiceCatalog::default();
        assert_eq!(catalog.entries().len(), 4);
        assert!(catalog.entries().iter().all(|e| e.follow_ups.len() == 3));
    }

    #[test]
    fn lookup_ignores_case_and_padding() {
        let catalog = ServiceCatalog::default();
        assert_eq!(catalog.find("  it services ").unwrap().name, "IT Services");
        assert!(catalog.find("Plumbing").is_none());
    }

    #[test]
    fn empty_config_keeps_defaults() {
        assert_eq!(ServiceCatalog::from_config(Some(&[])), ServiceCatalog::default());
        let custom = vec![ServiceEntry::new("Audits", "Sure.", ["a", "b", "c"])];
        assert_eq!(ServiceCatalog::from_config(Some(&custom)).entries(), custom.as_slice());
    }
}
