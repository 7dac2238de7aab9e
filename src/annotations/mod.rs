//! Annotation instructions applied to PDF documents

mod types;

pub use types::{Annotation, AnnotationKind, AnnotationSet, Color, Comment, Rectangle};
