//! Result types produced by a batch run.

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The result of converting one manifest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    /// Name of the group the entry belongs to.
    pub group: String,
    /// 0-based position inside the group.
    pub index: usize,
    /// Markdown path as written in the manifest.
    pub source: PathBuf,
    /// PDF file name as written in the manifest.
    pub output: String,
    /// Where the PDF was (or would have been) written.
    pub pdf_path: PathBuf,
    /// Retained HTML artifact, if any.
    pub html_path: Option<PathBuf>,
    /// Display title; None when the source was never read.
    pub title: Option<String>,
    /// Wall-clock time spent on this entry.
    pub duration_ms: u64,
    /// Why the entry failed; None on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DocumentError>,
}

impl DocumentOutcome {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-group tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReport {
    pub name: String,
    /// Number of entries in the group.
    pub expected: usize,
    /// Entries that produced a PDF.
    pub successful: usize,
    /// One outcome per entry, in manifest order.
    pub outcomes: Vec<DocumentOutcome>,
}

impl GroupReport {
    /// Build a report from outcomes in any order.
    pub fn from_outcomes(name: impl Into<String>, mut outcomes: Vec<DocumentOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.index);
        let successful = outcomes.iter().filter(|o| o.success()).count();
        Self {
            name: name.into(),
            expected: outcomes.len(),
            successful,
            outcomes,
        }
    }

    pub fn failed(&self) -> usize {
        self.expected - self.successful
    }
}

/// A PDF found in the output directory after the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPdf {
    pub name: String,
    pub size_bytes: u64,
}

impl GeneratedPdf {
    /// Size in kibibytes, as printed in the listing.
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }
}

/// The complete outcome of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Group reports in manifest order.
    pub groups: Vec<GroupReport>,
    pub output_dir: PathBuf,
    /// Every `*.pdf` in the output directory, sorted by name. This includes
    /// files left over from earlier runs.
    pub generated: Vec<GeneratedPdf>,
    pub total_duration_ms: u64,
}

impl BatchReport {
    pub fn total_successful(&self) -> usize {
        self.groups.iter().map(|g| g.successful).sum()
    }

    pub fn total_expected(&self) -> usize {
        self.groups.iter().map(|g| g.expected).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.total_successful() == self.total_expected()
    }

    /// Process exit status: 0 when every document succeeded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.all_succeeded() {
            0
        } else {
            1
        }
    }

    /// Iterate over every outcome across all groups.
    pub fn outcomes(&self) -> impl Iterator<Item = &DocumentOutcome> {
        self.groups.iter().flat_map(|g| g.outcomes.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderFailure;

    fn outcome(index: usize, ok: bool) -> DocumentOutcome {
        DocumentOutcome {
            group: "Main Documents".into(),
            index,
            source: PathBuf::from(format!("doc{index}.md")),
            output: format!("Doc{index}.pdf"),
            pdf_path: PathBuf::from(format!("pdf/Doc{index}.pdf")),
            html_path: None,
            title: Some(format!("Doc {index}")),
            duration_ms: 1,
            error: (!ok).then(|| RenderFailure::TimedOut { secs: 120 }.into()),
        }
    }

    #[test]
    fn group_report_sorts_and_counts() {
        let g = GroupReport::from_outcomes(
            "Main Documents",
            vec![outcome(2, true), outcome(0, false), outcome(1, true)],
        );
        assert_eq!(g.expected, 3);
        assert_eq!(g.successful, 2);
        assert_eq!(g.failed(), 1);
        let order: Vec<usize> = g.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn exit_code_reflects_totals() {
        let ok = BatchReport {
            groups: vec![GroupReport::from_outcomes("A", vec![outcome(0, true)])],
            output_dir: PathBuf::from("pdf"),
            generated: vec![],
            total_duration_ms: 0,
        };
        assert!(ok.all_succeeded());
        assert_eq!(ok.exit_code(), 0);

        let partial = BatchReport {
            groups: vec![
                GroupReport::from_outcomes("A", vec![outcome(0, true)]),
                GroupReport::from_outcomes("B", vec![outcome(0, false)]),
            ],
            ..ok
        };
        assert_eq!(partial.total_successful(), 1);
        assert_eq!(partial.total_expected(), 2);
        assert_eq!(partial.exit_code(), 1);
        assert_eq!(partial.outcomes().count(), 2);
    }

    #[test]
    fn size_kb_uses_1024() {
        let pdf = GeneratedPdf {
            name: "a.pdf".into(),
            size_bytes: 1536,
        };
        assert!((pdf.size_kb() - 1.5).abs() < f64::EPSILON);
        assert_eq!(format!("{:.1}", pdf.size_kb()), "1.5");
    }

    #[test]
    fn successful_outcome_omits_error_in_json() {
        let json = serde_json::to_string(&outcome(0, true)).unwrap();
        assert!(!json.contains("\"error\""), "got: {json}");
    }
}
