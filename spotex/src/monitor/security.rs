use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::filters::{MAX_QUERY_LENGTH, SearchFilters};

pub const DEFAULT_MAX_ARRAY_LEN: usize = 50;

static SQL_INJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\bunion\s+(all\s+)?select\b|'\s*(or|and)\s+'?\w+'?\s*=\s*'?\w+|;\s*(drop|delete|truncate|alter|shutdown)\b|\b(drop|truncate)\s+table\b|--\s*$|/\*.*\*/|\bexec(ute)?\s+xp_)",
    )
    .expect("invalid sql injection pattern")
});

static SCRIPT_INJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(<\s*/?\s*(script|iframe|object|embed|svg|img|style)\b|javascript\s*:|\bon[a-z]+\s*=)")
        .expect("invalid script injection pattern")
});

static PATH_TRAVERSAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\.\./|\.\.\\|%2e%2e(%2f|%5c|/|\\)|/etc/passwd|\\windows\\system32)")
        .expect("invalid path traversal pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    SqlInjection,
    ScriptInjection,
    PathTraversal,
    OversizedArray,
    OversizedText,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FindingKind::SqlInjection => "sql injection",
            FindingKind::ScriptInjection => "script injection",
            FindingKind::PathTraversal => "path traversal",
            FindingKind::OversizedArray => "oversized array",
            FindingKind::OversizedText => "oversized text",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl FindingKind {
    pub fn severity(self) -> Severity {
        match self {
            FindingKind::SqlInjection | FindingKind::ScriptInjection => Severity::High,
            FindingKind::PathTraversal => Severity::Medium,
            FindingKind::OversizedArray | FindingKind::OversizedText => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityFinding {
    pub field: String,
    pub kind: FindingKind,
    pub severity: Severity,
}

impl SecurityFinding {
    fn new(field: impl Into<String>, kind: FindingKind) -> Self {
        Self {
            field: field.into(),
            kind,
            severity: kind.severity(),
        }
    }
}

/// Heuristic scanner for hostile search input.
///
/// Findings are advisory: queries are always built from escaped values, so the monitor
/// only reports and logs what it sees.
#[derive(Debug, Clone, Copy)]
pub struct SecurityMonitor {
    pub max_array_len: usize,
    pub max_text_len: usize,
}

impl Default for SecurityMonitor {
    fn default() -> Self {
        Self {
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
            max_text_len: MAX_QUERY_LENGTH,
        }
    }
}

impl SecurityMonitor {
    /// Scan a raw filter payload, whatever its shape.
    pub fn inspect(&self, raw: &Value) -> Vec<SecurityFinding> {
        let mut findings = Vec::new();
        self.walk("", raw, &mut findings);
        log_findings(&findings);
        findings
    }

    /// Scan the free-text fields of already-parsed filters.
    pub fn inspect_filters(&self, filters: &SearchFilters) -> Vec<SecurityFinding> {
        let mut findings = Vec::new();
        for (field, text) in filters.text_fields() {
            self.check_text(&field, text, &mut findings);
        }
        log_findings(&findings);
        findings
    }

    fn walk(&self, path: &str, value: &Value, findings: &mut Vec<SecurityFinding>) {
        match value {
            Value::String(text) => self.check_text(field_or_root(path), text, findings),
            Value::Array(items) => {
                if items.len() > self.max_array_len {
                    findings.push(SecurityFinding::new(field_or_root(path), FindingKind::OversizedArray));
                }
                for item in items {
                    self.walk(path, item, findings);
                }
            }
            Value::Object(map) => {
                for (key, child) in map {
                    self.check_text(field_or_root(path), key, findings);
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    self.walk(&child_path, child, findings);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }

    fn check_text(&self, field: &str, text: &str, findings: &mut Vec<SecurityFinding>) {
        if text.chars().count() > self.max_text_len {
            findings.push(SecurityFinding::new(field, FindingKind::OversizedText));
        }
        if SQL_INJECTION.is_match(text) {
            findings.push(SecurityFinding::new(field, FindingKind::SqlInjection));
        }
        if SCRIPT_INJECTION.is_match(text) {
            findings.push(SecurityFinding::new(field, FindingKind::ScriptInjection));
        }
        if PATH_TRAVERSAL.is_match(text) {
            findings.push(SecurityFinding::new(field, FindingKind::PathTraversal));
        }
    }
}

fn field_or_root(path: &str) -> &str {
    if path.is_empty() { "filters" } else { path }
}

fn log_findings(findings: &[SecurityFinding]) {
    for finding in findings {
        log::warn!(
            "suspicious search input in {}: {} ({:?})",
            finding.field,
            finding.kind,
            finding.severity
        );
    }
}
