// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Flatscan.

use thiserror::Error;

/// Top-level error type for all Flatscan operations.
///
/// The first three variants are the pipeline failures, listed in the order a
/// scan can hit them. They are terminal: the pipeline is deterministic, so a
/// retry with the same bitmap and configuration fails the same way.
#[derive(Debug, Error)]
pub enum FlatscanError {
    // -- Pipeline errors --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no document found: {0}")]
    NoDocumentFound(String),

    #[error("singular transform: {0}")]
    SingularTransform(String),

    // -- Collaborator errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlatscanError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NoDocumentFound(_) => "no_document_found",
            Self::SingularTransform(_) => "singular_transform",
            Self::ImageError(_) => "image_error",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FlatscanError>;
