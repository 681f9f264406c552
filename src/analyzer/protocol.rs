//! Wire protocol types for the analyzer daemon.
//!
//! The request mirrors what the daemon's `/analyze` handler reads; the
//! report mirrors PMD's native JSON report format. Findings are carried
//! verbatim; the pipeline only counts them and tallies by rule name.

use serde::{Deserialize, Serialize};

/// Request body for `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Absolute path of the worktree root.
    pub path: String,

    /// Path to the ruleset XML.
    pub ruleset: String,

    /// Extra classpath entries, joined with the platform path separator.
    #[serde(rename = "auxClasspath", skip_serializing_if = "Option::is_none")]
    pub aux_classpath: Option<String>,

    /// Worktree-relative paths to analyze. When present only these files are
    /// analyzed; when absent the whole tree is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

/// PMD's native JSON report, reduced to the fields the pipeline consumes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeReport {
    /// Per-file violation lists. Files without violations are absent.
    #[serde(default)]
    pub files: Vec<FileReport>,

    /// Files PMD failed to process (parse errors and the like).
    #[serde(default, rename = "processingErrors")]
    pub processing_errors: Vec<ProcessingError>,
}

/// One file's entry in a PMD report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileReport {
    /// File path as PMD reported it (absolute or relative to the analyzed
    /// root, depending on the daemon's working directory).
    pub filename: String,

    /// Violations found in this file.
    #[serde(default)]
    pub violations: Vec<Finding>,
}

/// A single rule violation, kept verbatim from PMD's JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    /// First line of the violating range (1-based).
    #[serde(default)]
    pub beginline: u32,

    /// First column of the violating range (1-based).
    #[serde(default)]
    pub begincolumn: u32,

    /// Last line of the violating range.
    #[serde(default)]
    pub endline: u32,

    /// Last column of the violating range.
    #[serde(default)]
    pub endcolumn: u32,

    /// Human-readable description of the violation.
    #[serde(default)]
    pub description: String,

    /// Rule name, the aggregation key for `stat_of_warnings`.
    pub rule: String,

    /// Ruleset the rule belongs to. Optional fields serialize as `null`;
    /// the bincode-encoded cache cannot round-trip skipped fields.
    pub ruleset: Option<String>,

    /// PMD priority (1 = highest).
    pub priority: Option<u32>,

    /// Link to the rule's documentation.
    #[serde(rename = "externalInfoUrl")]
    pub external_info_url: Option<String>,
}

/// A file PMD could not process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingError {
    /// File the error occurred in.
    #[serde(default)]
    pub filename: String,

    /// Error message.
    #[serde(default)]
    pub message: String,
}

/// Error body the daemon returns with HTTP 500.
#[derive(Debug, Deserialize)]
pub struct AnalyzerErrorBody {
    /// The daemon's error message, usually an exception trace excerpt.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_daemon_field_names() {
        let request = AnalyzeRequest {
            path: "/work/wt_0".into(),
            ruleset: "/rules/quickstart.xml".into(),
            aux_classpath: Some("a.jar:b.jar".into()),
            files: Some(vec!["src/Main.java".into()]),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["path"], "/work/wt_0");
        assert_eq!(json["auxClasspath"], "a.jar:b.jar");
        assert_eq!(json["files"][0], "src/Main.java");
    }

    #[test]
    fn request_omits_absent_optionals() {
        let request = AnalyzeRequest {
            path: "/work/wt_0".into(),
            ruleset: "/rules/quickstart.xml".into(),
            aux_classpath: None,
            files: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("auxClasspath"));
        assert!(!json.contains("files"));
    }

    #[test]
    fn parses_pmd_native_report() {
        let raw = r#"{
            "formatVersion": 1,
            "pmdVersion": "7.0.0",
            "timestamp": "2024-05-01T10:00:00+00:00",
            "files": [
                {
                    "filename": "/work/wt_0/src/Main.java",
                    "violations": [
                        {
                            "beginline": 7,
                            "begincolumn": 17,
                            "endline": 7,
                            "endcolumn": 23,
                            "description": "Avoid unused private fields such as 'count'.",
                            "rule": "UnusedPrivateField",
                            "ruleset": "Best Practices",
                            "priority": 3,
                            "externalInfoUrl": "https://docs.pmd-code.org/latest/"
                        }
                    ]
                }
            ],
            "suppressedViolations": [],
            "processingErrors": [
                { "filename": "src/Broken.java", "message": "ParseException", "detail": "..." }
            ],
            "configurationErrors": []
        }"#;

        let report: AnalyzeReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.files.len(), 1);
        let finding = &report.files[0].violations[0];
        assert_eq!(finding.rule, "UnusedPrivateField");
        assert_eq!(finding.beginline, 7);
        assert_eq!(finding.priority, Some(3));
        assert_eq!(report.processing_errors.len(), 1);
    }

    #[test]
    fn empty_report_parses_to_no_files() {
        let report: AnalyzeReport = serde_json::from_str("{}").unwrap();
        assert!(report.files.is_empty());
    }
}
