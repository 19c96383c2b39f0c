use std::collections::HashMap;

use serde::Deserialize;

/// A severity as written in a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Off,
    Error,
    Warning,
    Info,
    Hint,
}

impl DiagnosticSeverity {
    /// The renderer's severity, or `None` for `off`.
    #[must_use]
    pub fn to_render_severity(self) -> Option<soyc_source::Severity> {
        match self {
            DiagnosticSeverity::Off => None,
            DiagnosticSeverity::Error => Some(soyc_source::Severity::Error),
            DiagnosticSeverity::Warning => Some(soyc_source::Severity::Warning),
            DiagnosticSeverity::Info => Some(soyc_source::Severity::Info),
            DiagnosticSeverity::Hint => Some(soyc_source::Severity::Hint),
        }
    }
}

/// Per-code severity overrides.
///
/// Keys are diagnostic codes or code prefixes, compared case-insensitively.
/// The longest key that prefixes a code decides its severity (a full code is
/// its own longest prefix); codes no key covers are errors.
///
/// ```toml
/// [diagnostics.severity]
/// H1 = "warning"
/// H105 = "off"   # paths that close a tag only sometimes
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub severity: HashMap<String, DiagnosticSeverity>,
}

impl DiagnosticsConfig {
    /// ```
    /// # use soyc_conf::{DiagnosticSeverity, DiagnosticsConfig};
    /// let config = DiagnosticsConfig {
    ///     severity: [
    ///         ("H".to_string(), DiagnosticSeverity::Warning),
    ///         ("H10".to_string(), DiagnosticSeverity::Off),
    ///         ("H104".to_string(), DiagnosticSeverity::Error),
    ///     ]
    ///     .into(),
    /// };
    ///
    /// assert_eq!(config.get_severity("H104"), DiagnosticSeverity::Error);
    /// assert_eq!(config.get_severity("H102"), DiagnosticSeverity::Off);
    /// assert_eq!(config.get_severity("H200"), DiagnosticSeverity::Warning);
    /// assert_eq!(config.get_severity("P100"), DiagnosticSeverity::Error);
    /// ```
    #[must_use]
    pub fn get_severity(&self, code: &str) -> DiagnosticSeverity {
        self.severity
            .iter()
            .filter(|(pattern, _)| {
                code.get(..pattern.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(pattern))
            })
            .max_by_key(|(pattern, _)| pattern.len())
            .map_or(DiagnosticSeverity::Error, |(_, severity)| *severity)
    }

    #[must_use]
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_severity(code) != DiagnosticSeverity::Off
    }
}
