//! Case and run identity types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque case identifier as it appears in the event log.
///
/// Ordering is lexicographic on the raw string, which is also the order
/// cases are emitted in.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct CaseId(pub String);

impl CaseId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        CaseId(s.to_string())
    }
}

impl From<String> for CaseId {
    fn from(s: String) -> Self {
        CaseId(s)
    }
}

/// Run ID for tracking batch runs.
///
/// Format: `ppm-YYYYMMDD-HHMMSS-XXXX`
/// Example: `ppm-20260115-143022-a7xq`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let suffix = generate_base32_suffix();
        RunId(format!(
            "ppm-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            suffix
        ))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 24 || !s.starts_with("ppm-") {
            return None;
        }
        let bytes = s.as_bytes();
        if bytes[12] != b'-' || bytes[19] != b'-' {
            return None;
        }
        let date = &s[4..12];
        let time = &s[13..19];
        let suffix = &s[20..24];
        if !date.chars().all(|c| c.is_ascii_digit()) || !time.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !suffix.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(RunId(s.to_string()))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let mut value = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32);
    value &= 0x000F_FFFF;
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity(4);
    for shift in [15_u32, 10, 5, 0] {
        let idx = ((value >> shift) & 0x1F) as usize;
        out.push(alphabet[idx] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_format() {
        let rid = RunId::new();
        assert!(rid.0.starts_with("ppm-"));
        assert_eq!(rid.0.len(), 24);
        assert_eq!(RunId::parse(&rid.0), Some(rid));
    }

    #[test]
    fn test_run_id_parse_rejects_garbage() {
        assert!(RunId::parse("ppm-2026011-143022-a7xq0").is_none());
        assert!(RunId::parse("job-20260115-143022-a7xq").is_none());
        assert!(RunId::parse("ppm-20260115-143022-A7XQ").is_none());
        assert!(RunId::parse("ppm-20260115-143022-a7xq").is_some());
    }

    #[test]
    fn test_case_id_ordering_and_display() {
        let mut ids = vec![CaseId::from("b"), CaseId::from("a10"), CaseId::from("a2")];
        ids.sort();
        assert_eq!(ids, vec![CaseId::from("a10"), CaseId::from("a2"), CaseId::from("b")]);
        assert_eq!(CaseId::from("C1").to_string(), "C1");
    }

    #[test]
    fn test_case_id_serde_transparent() {
        let json = serde_json::to_string(&CaseId::from("C7")).unwrap();
        assert_eq!(json, "\"C7\"");
    }
}
