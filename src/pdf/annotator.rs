//! Annotator trait

use super::document::PdfDocument;
use super::error::AnnotateError;
use crate::annotations::AnnotationSet;

/// Applies an annotation set to a PDF
///
/// Implementations must leave the input untouched and return a new document
/// with the same pages, in the same order, plus the requested annotations.
/// Annotating with an empty set yields the source content unchanged.
pub trait PdfAnnotator: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    fn annotate(
        &self,
        document: &PdfDocument,
        annotations: &AnnotationSet,
    ) -> Result<AnnotatedDocument, AnnotateError>;
}

/// Output of an annotation run
#[derive(Debug, Clone)]
pub struct AnnotatedDocument {
    pub document: PdfDocument,
    pub page_count: usize,
    /// Number of PDF annotation objects written
    pub annotations_written: usize,
}
