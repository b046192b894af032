// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — bitmap conversion, the injectable codec capability, and
// preview overlays.

pub mod codec;
pub mod convert;
pub mod overlay;

pub use codec::{ImageCodec, ImageCrateCodec, OutputFormat};
pub use convert::{bitmap_from_dynamic, bitmap_to_dynamic, bitmap_to_gray};
pub use overlay::highlight_document;
