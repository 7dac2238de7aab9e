//! PDF annotation module
//!
//! Provides the annotator abstraction and its lopdf implementation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pdf_annotator_server::pdf::{LopdfAnnotator, PdfAnnotator, PdfDocument};
//!
//! let annotator = LopdfAnnotator::new(100 * 1024 * 1024);
//! let source = PdfDocument::from_bytes(bytes)?;
//! let result = annotator.annotate(&source, &annotation_set)?;
//! assert_eq!(result.page_count, page_count_of_source);
//! ```

mod annotator;
mod document;
mod error;
mod writer;

pub use annotator::{AnnotatedDocument, PdfAnnotator};
pub use document::PdfDocument;
pub use error::AnnotateError;
pub use writer::LopdfAnnotator;
