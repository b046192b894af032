// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the people holding the camera.
//
// Every pipeline failure maps to plain English with a clear suggestion. The
// severity tells a UI whether to ask for a new framing or a new photo.

use crate::error::FlatscanError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The user can fix it by repositioning the camera or the page.
    ActionRequired,
    /// This photo cannot be used; a new one is needed.
    Permanent,
    /// Something outside the scanner failed (disk, file format).
    Environment,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same input could possibly succeed.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Convert a `FlatscanError` into a `HumanError`.
///
/// None of the pipeline errors are retriable: the scan is deterministic, so
/// the same photo fails the same way.
pub fn humanize_error(err: &FlatscanError) -> HumanError {
    match err {
        FlatscanError::InvalidInput(detail) => HumanError {
            message: "This picture can't be scanned.".into(),
            suggestion: format!("Please take the photo again. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        FlatscanError::NoDocumentFound(_) => HumanError {
            message: "We couldn't see a document in the photo.".into(),
            suggestion: "Place the page on a darker surface so all four corners are visible, \
                         then take the photo again."
                .into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FlatscanError::SingularTransform(_) => HumanError {
            message: "The document is at too steep an angle.".into(),
            suggestion: "Hold the camera more directly above the page and retake the photo."
                .into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        FlatscanError::ImageError(detail) => HumanError {
            message: "This image file couldn't be opened.".into(),
            suggestion: format!("Try saving it as a JPEG or PNG first. ({detail})"),
            retriable: false,
            severity: Severity::Environment,
        },

        FlatscanError::Io(err) => HumanError {
            message: "A file couldn't be read or written.".into(),
            suggestion: format!("Check the file exists and there is free space. ({err})"),
            retriable: true,
            severity: Severity::Environment,
        },

        FlatscanError::Serialization(err) => HumanError {
            message: "The settings file is not valid.".into(),
            suggestion: format!("Fix or remove the settings file. ({err})"),
            retriable: false,
            severity: Severity::Environment,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_asks_for_reposition() {
        let human = humanize_error(&FlatscanError::NoDocumentFound("no candidates".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn singular_transform_asks_for_retake() {
        let human = humanize_error(&FlatscanError::SingularTransform("det 0".into()));
        assert_eq!(human.severity, Severity::Permanent);
        assert!(human.suggestion.contains("retake"));
    }

    #[test]
    fn invalid_input_includes_detail() {
        let human = humanize_error(&FlatscanError::InvalidInput("0x0 bitmap".into()));
        assert!(human.suggestion.contains("0x0 bitmap"));
    }
}
