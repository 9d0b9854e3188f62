//! External-standard reference tags
//!
//! Controls carry references into CCI, NIST 800-53, and the source STIG.
//! NIST references appear in the source material in several shapes
//! ("AC-3", "AU-12 b", "CM-5 (6)", "SC-28 (1)") and are parsed into a
//! structured form so reports can group by base control.

use serde::{Deserialize, Serialize};

/// Reference tags attached to a control.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlTags {
    /// STIG rule identifier (e.g., "SQLD-22-000700")
    #[serde(default)]
    pub stig_id: Option<String>,

    /// Source SRG requirement (e.g., "SRG-APP-000090-DB-000065")
    #[serde(default)]
    pub srg: Option<String>,

    /// Control Correlation Identifiers
    #[serde(default)]
    pub cci: Vec<String>,

    /// NIST 800-53 control references
    #[serde(default)]
    pub nist: Vec<String>,

    /// Identifiers from superseded STIG releases
    #[serde(default)]
    pub legacy: Vec<String>,
}

impl ControlTags {
    /// Parsed NIST references, skipping any that do not parse
    pub fn nist_refs(&self) -> Vec<NistRef> {
        self.nist.iter().filter_map(|s| NistRef::parse(s)).collect()
    }

    /// Check if any NIST reference matches the given base control id
    /// (enhancements ignored, case-insensitive)
    pub fn maps_to_nist(&self, base_id: &str) -> bool {
        self.nist_refs().iter().any(|r| r.matches_base(base_id))
    }
}

/// A parsed NIST 800-53 control reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NistRef {
    /// Control family (e.g., "AC", "AU", "SC")
    pub family: String,

    /// Control number within the family
    pub number: String,

    /// Enhancement / part designators (e.g., ["1"] for SC-28 (1),
    /// ["b"] for AU-12 b)
    pub enhancements: Vec<String>,
}

impl NistRef {
    /// Parse a reference like "AC-3", "AU-12 b", "CM-5 (6)", or "CM-5 (1) (a)".
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let dash = s.find('-')?;
        let family = s[..dash].trim().to_uppercase();
        if family.is_empty() || !family.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let rest = s[dash + 1..].trim();
        let number_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let number = &rest[..number_end];
        if number.is_empty() {
            return None;
        }

        // Everything after the number is enhancement designators, either
        // parenthesized or bare ("b" in "AU-12 b").
        let mut enhancements = Vec::new();
        for token in rest[number_end..]
            .split(|c: char| c == '(' || c == ')' || c.is_whitespace() || c == ',')
        {
            let token = token.trim();
            if !token.is_empty() {
                enhancements.push(token.to_string());
            }
        }

        Some(Self {
            family,
            number: number.to_string(),
            enhancements,
        })
    }

    /// Base control id without enhancements (e.g., "AU-12")
    pub fn base_id(&self) -> String {
        format!("{}-{}", self.family, self.number)
    }

    /// Full id with enhancements in parenthesized form (e.g., "CM-5(1)(a)")
    pub fn full_id(&self) -> String {
        if self.enhancements.is_empty() {
            self.base_id()
        } else {
            let enh: String = self
                .enhancements
                .iter()
                .map(|e| format!("({})", e))
                .collect();
            format!("{}{}", self.base_id(), enh)
        }
    }

    /// Check against a base control id, ignoring enhancements
    pub fn matches_base(&self, base_id: &str) -> bool {
        self.base_id().eq_ignore_ascii_case(base_id.trim())
    }
}

impl std::fmt::Display for NistRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_ref() {
        let r = NistRef::parse("AC-3").unwrap();
        assert_eq!(r.family, "AC");
        assert_eq!(r.number, "3");
        assert!(r.enhancements.is_empty());
        assert_eq!(r.full_id(), "AC-3");
    }

    #[test]
    fn test_parse_part_letter() {
        let r = NistRef::parse("AU-12 b").unwrap();
        assert_eq!(r.base_id(), "AU-12");
        assert_eq!(r.enhancements, vec!["b"]);
        assert_eq!(r.full_id(), "AU-12(b)");
    }

    #[test]
    fn test_parse_parenthesized_enhancement() {
        let r = NistRef::parse("CM-5 (6)").unwrap();
        assert_eq!(r.base_id(), "CM-5");
        assert_eq!(r.enhancements, vec!["6"]);
    }

    #[test]
    fn test_parse_enhancement_and_part() {
        let r = NistRef::parse("CM-5 (1) (a)").unwrap();
        assert_eq!(r.enhancements, vec!["1", "a"]);
        assert_eq!(r.full_id(), "CM-5(1)(a)");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(NistRef::parse("").is_none());
        assert!(NistRef::parse("no dash").is_none());
        assert!(NistRef::parse("AC-").is_none());
    }

    #[test]
    fn test_matches_base() {
        let r = NistRef::parse("SC-28 (1)").unwrap();
        assert!(r.matches_base("SC-28"));
        assert!(r.matches_base("sc-28"));
        assert!(!r.matches_base("SC-2"));
    }

    #[test]
    fn test_tags_maps_to_nist() {
        let tags = ControlTags {
            nist: vec!["CM-5 (6)".to_string(), "CM-11 (2)".to_string()],
            ..Default::default()
        };
        assert!(tags.maps_to_nist("CM-5"));
        assert!(tags.maps_to_nist("CM-11"));
        assert!(!tags.maps_to_nist("AC-3"));
    }
}
