//! Text, email and phone standardization.
//!
//! Column kinds are detected from a sample of leading values, not per cell, so
//! a column that mixes emails with free text is treated as an email column.

use crate::config::{CaseStyle, SpecialChars, TextOptions};
use crate::table::{Cell, Column, Table};
use crate::types::{ActionRecord, StageOutput};
use crate::utils::{looks_like_email, looks_like_phone};
use tracing::{debug, warn};

pub(crate) const STAGE: &str = "standardize-formats";

/// What a text column was detected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Email,
    Phone,
    Plain,
}

#[derive(Debug, Clone)]
pub struct FormatStandardizer {
    options: TextOptions,
    sample_size: usize,
}

impl FormatStandardizer {
    pub fn new(options: TextOptions, sample_size: usize) -> Self {
        Self {
            options,
            sample_size: sample_size.max(1),
        }
    }

    /// Detect the kind of a text column from its first non-null values.
    pub fn detect(&self, column: &Column) -> TextKind {
        let sample: Vec<&str> = column
            .sample(self.sample_size)
            .filter_map(Cell::as_str)
            .collect();

        if sample.iter().any(|s| looks_like_email(s)) {
            TextKind::Email
        } else if sample.iter().any(|s| looks_like_phone(s)) {
            TextKind::Phone
        } else {
            TextKind::Plain
        }
    }

    fn standardize_value(&self, value: &str, kind: TextKind) -> String {
        match kind {
            TextKind::Email => value.trim().to_lowercase(),
            TextKind::Phone => format_phone(value),
            TextKind::Plain => {
                let mut out = if self.options.trim {
                    value.trim().to_string()
                } else {
                    value.to_string()
                };
                if self.options.special_chars == SpecialChars::Remove {
                    out = strip_special_chars(&out);
                }
                apply_case(&out, self.options.case)
            }
        }
    }

    /// Standardize every text and categorical column.
    pub fn apply(&self, table: &Table) -> StageOutput {
        let mut output = table.clone();
        let mut records = Vec::new();
        let mut total_changed = 0;

        for (index, column) in table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.column_type().is_textual())
        {
            let kind = self.detect(column);
            let mut changed = 0;
            let cells: Vec<Cell> = column
                .cells()
                .iter()
                .map(|cell| match cell {
                    Cell::Text(s) => {
                        let standardized = self.standardize_value(s, kind);
                        if &standardized != s {
                            changed += 1;
                        }
                        Cell::Text(standardized)
                    }
                    other => other.clone(),
                })
                .collect();

            if changed == 0 {
                continue;
            }

            if let Err(e) = output.replace_column(index, column.clone().with_cells(cells)) {
                warn!("Failed to standardize '{}': {}", column.name(), e);
                continue;
            }
            debug!("Standardized {} values in '{}' as {:?}", changed, column.name(), kind);
            total_changed += changed;

            let label = match kind {
                TextKind::Email => "email",
                TextKind::Phone => "phone",
                TextKind::Plain => "text",
            };
            records.push(
                ActionRecord::success(STAGE, format!("standardized {} {} values", changed, label))
                    .for_column(column.name())
                    .with_values(changed),
            );
        }

        if records.is_empty() {
            records.push(ActionRecord::success(STAGE, "all text values already standard"));
        }
        debug!("Format standardization changed {} values", total_changed);

        StageOutput {
            table: output,
            records,
            issues: Vec::new(),
        }
    }
}

/// Reduce to digits; exactly ten digits render as `NNN-NNN-NNNN`.
pub fn format_phone(value: &str) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        format!("{}-{}-{}", &digits[0..3], &digits[3..6], &digits[6..10])
    } else {
        digits
    }
}

fn strip_special_chars(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ".,@-_'".contains(*c))
        .collect()
}

fn apply_case(value: &str, case: CaseStyle) -> String {
    match case {
        CaseStyle::Preserve => value.to_string(),
        CaseStyle::Lower => value.to_lowercase(),
        CaseStyle::Upper => value.to_uppercase(),
        CaseStyle::Title => title_case(value),
    }
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn standardizer() -> FormatStandardizer {
        FormatStandardizer::new(TextOptions::default(), 10)
    }

    fn texts(table: &Table, name: &str) -> Vec<String> {
        table
            .column(name)
            .unwrap()
            .cells()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn test_email_lowercased_and_trimmed() {
        let table = Table::new(vec![Column::from_values(
            "contact",
            vec![" Alice@Test.COM ", "bob@test.com"],
        )])
        .unwrap();

        let output = standardizer().apply(&table);
        assert_eq!(texts(&output.table, "contact"), vec!["alice@test.com", "bob@test.com"]);
        assert_eq!(output.records[0].values_affected, 1);
    }

    #[test]
    fn test_phone_formatting() {
        let table = Table::new(vec![Column::from_values(
            "phone",
            vec!["(555) 123-4567", "5551234567", "555-123-4567", "+1 555 123 45"],
        )])
        .unwrap();

        let output = standardizer().apply(&table);
        assert_eq!(
            texts(&output.table, "phone"),
            vec!["555-123-4567", "555-123-4567", "555-123-4567", "155512345"]
        );
    }

    #[test]
    fn test_plain_text_options() {
        let options = TextOptions {
            trim: true,
            case: CaseStyle::Title,
            special_chars: SpecialChars::Remove,
        };
        let table = Table::new(vec![Column::from_values(
            "city",
            vec!["  new YORK!! ", "san-francisco#"],
        )])
        .unwrap();

        let output = FormatStandardizer::new(options, 10).apply(&table);
        assert_eq!(texts(&output.table, "city"), vec!["New York", "San-Francisco"]);
    }

    #[test]
    fn test_numeric_columns_untouched() {
        let table = Table::new(vec![Column::from_values("n", vec![1.0, 2.0])]).unwrap();
        let output = standardizer().apply(&table);
        assert_eq!(output.table, table);
        assert_eq!(output.records.len(), 1);
    }

    #[test]
    fn test_detection_uses_sample_only() {
        let mut values = vec!["plain"; 10];
        values.push("someone@example.com");
        let column = Column::from_values("notes", values);
        assert_eq!(standardizer().detect(&column), TextKind::Plain);
        assert_eq!(
            FormatStandardizer::new(TextOptions::default(), 11).detect(&column),
            TextKind::Email
        );
    }

    #[test]
    fn test_columns_sharing_a_name_are_standardized_independently() {
        let table = Table::new(vec![
            Column::from_values("email", vec!["a@x.com", "b@x.com"]),
            Column::from_values("email", vec![" C@X.COM", "d@x.com"]),
        ])
        .unwrap();

        let output = standardizer().apply(&table);
        let second: Vec<String> =
            output.table.columns()[1].cells().iter().map(|c| c.to_string()).collect();
        assert_eq!(second, vec!["c@x.com", "d@x.com"]);
        assert_eq!(output.table.columns()[0], table.columns()[0]);
    }
}
