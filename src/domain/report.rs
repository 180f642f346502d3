//! Translation diagnostics
//!
//! The translator attaches warnings and errors to the top-level object they
//! concern. Sanitizers decide whether to run by looking for a specific
//! [`DiagnosticCode`] among the warnings, so activation is a tag match and
//! never depends on the exact wording of a message.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::ResourceRef;

/// Marker text for free-form warnings about routes whose upstream is missing.
pub const MISSING_UPSTREAM_MARKER: &str = "missing upstream";

/// Closed set of defect classes the translator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// A route references an upstream that is not declared
    MissingUpstream,
    /// Anything no sanitizer knows how to repair
    Unclassified,
}

impl DiagnosticCode {
    /// Classify free-form diagnostic text by marker substring.
    pub fn classify(message: &str) -> Self {
        if message.to_ascii_lowercase().contains(MISSING_UPSTREAM_MARKER) {
            DiagnosticCode::MissingUpstream
        } else {
            DiagnosticCode::Unclassified
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::MissingUpstream => "missing_upstream",
            DiagnosticCode::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single warning or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn missing_upstream(message: impl Into<String>) -> Self {
        Self::new(DiagnosticCode::MissingUpstream, message)
    }
}

impl From<&str> for Diagnostic {
    fn from(message: &str) -> Self {
        Self::new(DiagnosticCode::classify(message), message)
    }
}

impl From<String> for Diagnostic {
    fn from(message: String) -> Self {
        Self { code: DiagnosticCode::classify(&message), message }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Kind of top-level declared object a report is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Proxy,
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReportKey {
    pub kind: ObjectKind,
    pub reference: ResourceRef,
}

impl ReportKey {
    pub fn proxy(reference: ResourceRef) -> Self {
        Self { kind: ObjectKind::Proxy, reference }
    }

    pub fn upstream(reference: ResourceRef) -> Self {
        Self { kind: ObjectKind::Upstream, reference }
    }
}

/// Warnings and errors for one declared object, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

/// Reports for every object touched by a translation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceReports {
    reports: BTreeMap<ReportKey, Report>,
}

impl ResourceReports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, key: ReportKey, warning: impl Into<Diagnostic>) {
        self.reports.entry(key).or_default().warnings.push(warning.into());
    }

    pub fn add_error(&mut self, key: ReportKey, error: impl Into<Diagnostic>) {
        self.reports.entry(key).or_default().errors.push(error.into());
    }

    pub fn get(&self, key: &ReportKey) -> Option<&Report> {
        self.reports.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReportKey, &Report)> {
        self.reports.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// True if any object carries a warning with the given code.
    pub fn has_warning(&self, code: DiagnosticCode) -> bool {
        self.reports.values().flat_map(|r| r.warnings.iter()).any(|w| w.code == code)
    }

    pub fn warning_count(&self) -> usize {
        self.reports.values().map(|r| r.warnings.len()).sum()
    }

    pub fn error_count(&self) -> usize {
        self.reports.values().map(|r| r.errors.len()).sum()
    }
}

impl FromIterator<(ReportKey, Report)> for ResourceReports {
    fn from_iter<I: IntoIterator<Item = (ReportKey, Report)>>(iter: I) -> Self {
        Self { reports: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy() -> ReportKey {
        ReportKey::proxy(ResourceRef::new("gateway-proxy", "flowplane-system"))
    }

    #[test]
    fn test_classify_is_substring_based() {
        assert_eq!(
            DiagnosticCode::classify("route with missing upstream"),
            DiagnosticCode::MissingUpstream
        );
        assert_eq!(
            DiagnosticCode::classify("Route 'r1' on vhost 'v' has Missing Upstream billing.prod"),
            DiagnosticCode::MissingUpstream
        );
        assert_eq!(DiagnosticCode::classify("missing_upstream"), DiagnosticCode::Unclassified);
        assert_eq!(DiagnosticCode::classify("duplicate domain"), DiagnosticCode::Unclassified);
    }

    #[test]
    fn test_has_warning_ignores_errors() {
        let mut reports = ResourceReports::new();
        reports.add_error(proxy(), "route with missing upstream");
        assert!(!reports.has_warning(DiagnosticCode::MissingUpstream));

        reports.add_warning(proxy(), Diagnostic::missing_upstream("r1 -> billing.prod"));
        assert!(reports.has_warning(DiagnosticCode::MissingUpstream));
        assert_eq!(reports.warning_count(), 1);
        assert_eq!(reports.error_count(), 1);
    }

    #[test]
    fn test_warnings_keep_order_per_object() {
        let mut reports = ResourceReports::new();
        reports.add_warning(proxy(), "first");
        reports.add_warning(proxy(), "second");

        let report = reports.get(&proxy()).expect("report exists");
        let messages: Vec<_> = report.warnings.iter().map(|w| w.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }
}
