//! Per-target, per-field results of a reconcile run

use serde::Serialize;
use std::fmt;
use transync::{FieldRef, ItemId, LanguageTag};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum FieldOutcome {
    /// A new value was written to the target field
    Translated,
    /// The target field was removed (empty source, or no reference resolved)
    Deleted,
    Failed(String),
}

impl FieldOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, FieldOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldStatus {
    #[serde(serialize_with = "serialize_display")]
    pub field: FieldRef,
    #[serde(flatten)]
    pub outcome: FieldOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub language: LanguageTag,
    pub item: ItemId,
    pub fields: Vec<FieldStatus>,
}

impl TargetReport {
    pub fn new(language: LanguageTag, item: ItemId) -> Self {
        Self {
            language,
            item,
            fields: Vec::new(),
        }
    }

    pub fn record(&mut self, field: &FieldRef, outcome: FieldOutcome) {
        self.fields.push(FieldStatus {
            field: field.clone(),
            outcome,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub source: ItemId,
    pub source_language: LanguageTag,
    pub targets: Vec<TargetReport>,
    /// Fields removed from the pending record during the run
    #[serde(serialize_with = "serialize_display_list")]
    pub cleared: Vec<FieldRef>,
}

fn serialize_display<S: serde::Serializer>(field: &FieldRef, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(field)
}

fn serialize_display_list<S: serde::Serializer>(
    fields: &[FieldRef],
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_seq(fields.iter().map(ToString::to_string))
}

impl ReconcileReport {
    pub fn new(source: ItemId, source_language: LanguageTag) -> Self {
        Self {
            source,
            source_language,
            targets: Vec::new(),
            cleared: Vec::new(),
        }
    }

    /// Every failed (language, field, error) triple
    pub fn failures(&self) -> Vec<(&LanguageTag, &FieldRef, &str)> {
        self.targets
            .iter()
            .flat_map(|target| {
                target.fields.iter().filter_map(move |status| match &status.outcome {
                    FieldOutcome::Failed(error) => {
                        Some((&target.language, &status.field, error.as_str()))
                    }
                    _ => None,
                })
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures().is_empty()
    }

    pub fn status(&self, language: &LanguageTag, field: &FieldRef) -> Option<&FieldOutcome> {
        self.targets
            .iter()
            .find(|target| &target.language == language)?
            .fields
            .iter()
            .find(|status| &status.field == field)
            .map(|status| &status.outcome)
    }

    pub fn field_count(&self) -> usize {
        self.targets.iter().map(|target| target.fields.len()).sum()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Item {} ({})", self.source, self.source_language)?;
        if self.field_count() == 0 {
            return writeln!(f, "  nothing pending");
        }

        for target in &self.targets {
            writeln!(f, "  {} → item {}", target.language, target.item)?;
            for status in &target.fields {
                match &status.outcome {
                    FieldOutcome::Translated => writeln!(f, "    ✓ {}", status.field)?,
                    FieldOutcome::Deleted => writeln!(f, "    ✓ {} (deleted)", status.field)?,
                    FieldOutcome::Failed(error) => {
                        writeln!(f, "    ✗ {}: {}", status.field, error)?
                    }
                }
            }
        }

        let failed = self.failures().len();
        writeln!(
            f,
            "{} of {} field updates succeeded, {} cleared",
            self.field_count() - failed,
            self.field_count(),
            self.cleared.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> LanguageTag {
        s.parse().unwrap()
    }

    fn sample() -> ReconcileReport {
        let mut report = ReconcileReport::new(ItemId(1), tag("en"));
        let mut de = TargetReport::new(tag("de"), ItemId(2));
        de.record(&FieldRef::summary(), FieldOutcome::Translated);
        de.record(&FieldRef::body(), FieldOutcome::Deleted);
        let mut fr = TargetReport::new(tag("fr"), ItemId(3));
        fr.record(&FieldRef::summary(), FieldOutcome::Translated);
        fr.record(&FieldRef::body(), FieldOutcome::Failed("quota exceeded".to_string()));
        report.targets = vec![de, fr];
        report.cleared = vec![FieldRef::summary()];
        report
    }

    #[test]
    fn test_failures_and_status() {
        let report = sample();
        assert!(!report.is_complete());
        assert_eq!(
            report.failures(),
            vec![(&tag("fr"), &FieldRef::body(), "quota exceeded")]
        );
        assert_eq!(
            report.status(&tag("de"), &FieldRef::body()),
            Some(&FieldOutcome::Deleted)
        );
        assert_eq!(report.status(&tag("ja"), &FieldRef::body()), None);
    }

    #[test]
    fn test_display_lists_every_field() {
        let rendered = sample().to_string();
        assert!(rendered.contains("de → item 2"));
        assert!(rendered.contains("✓ content:summary"));
        assert!(rendered.contains("✓ content:body (deleted)"));
        assert!(rendered.contains("✗ content:body: quota exceeded"));
        assert!(rendered.contains("3 of 4 field updates succeeded, 1 cleared"));
    }

    #[test]
    fn test_display_empty_run() {
        let report = ReconcileReport::new(ItemId(9), tag("en"));
        assert!(report.is_complete());
        assert!(report.to_string().contains("nothing pending"));
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["source_language"], "en");
        assert_eq!(json["cleared"][0], "content:summary");
        assert_eq!(json["targets"][1]["fields"][1]["field"], "content:body");
        assert_eq!(json["targets"][1]["fields"][1]["status"], "failed");
        assert_eq!(json["targets"][1]["fields"][1]["error"], "quota exceeded");
        assert_eq!(json["targets"][0]["fields"][0]["status"], "translated");
    }
}
