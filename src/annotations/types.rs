//! Annotation set types
//!
//! The JSON shape matches the annotation store's `AnnotationSet` documents:
//! camelCase fields, 1-indexed pages and rectangles measured in PDF points
//! from the top-left corner of the page.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ordered collection of annotations targeting one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSet {
    /// Annotation set identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// The document the set was recorded against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Annotations in application order
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// A single annotation instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Page number (1-indexed)
    pub page: u32,
    /// Annotation type name, see [`AnnotationKind`]
    pub annotation_type: String,
    /// Hex colour (`#RRGGBB` or `RRGGBB`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub rectangles: Vec<Rectangle>,
    /// Author shown by PDF viewers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Comment attached to an annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub content: String,
}

/// Rectangle in PDF points, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Supported annotation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Highlight,
    Underline,
    StrikeOut,
    /// Boxed region
    Area,
    /// Sticky note
    Comment,
}

impl AnnotationKind {
    /// Parse an annotation type name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "highlight" | "texthighlight" => Some(Self::Highlight),
            "underline" => Some(Self::Underline),
            "strikeout" | "strike-out" => Some(Self::StrikeOut),
            "area" => Some(Self::Area),
            "comment" | "note" => Some(Self::Comment),
            _ => None,
        }
    }

    /// PDF `/Subtype` name
    pub fn subtype(&self) -> &'static [u8] {
        match self {
            Self::Highlight => b"Highlight",
            Self::Underline => b"Underline",
            Self::StrikeOut => b"StrikeOut",
            Self::Area => b"Square",
            Self::Comment => b"Text",
        }
    }

    /// Text markup annotations carry quad points
    pub fn is_markup(&self) -> bool {
        matches!(self, Self::Highlight | Self::Underline | Self::StrikeOut)
    }

    pub fn default_color(&self) -> Color {
        if self.is_markup() {
            Color::YELLOW
        } else {
            Color::RED
        }
    }
}

/// RGB colour with 0-1 components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const YELLOW: Color = Color { r: 1.0, g: 1.0, b: 0.0 };
    pub const RED: Color = Color { r: 1.0, g: 0.0, b: 0.0 };

    /// Parse `#RRGGBB` / `RRGGBB`
    pub fn from_hex(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).ok().map(|v| v as f32 / 255.0)
        };
        Some(Color {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl Rectangle {
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl Annotation {
    /// Create an annotation of the given type covering one rectangle
    pub fn new(page: u32, annotation_type: &str, rect: Rectangle) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            page,
            annotation_type: annotation_type.to_string(),
            color: None,
            comments: Vec::new(),
            rectangles: vec![rect],
            created_by: None,
        }
    }

    /// Add a comment
    pub fn with_comment(mut self, content: &str) -> Self {
        self.comments.push(Comment {
            content: content.to_string(),
        });
        self
    }

    /// Set the colour
    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    /// Set the author
    pub fn with_author(mut self, created_by: &str) -> Self {
        self.created_by = Some(created_by.to_string());
        self
    }

    /// Add another rectangle (multi-line highlights)
    pub fn add_rectangle(mut self, rect: Rectangle) -> Self {
        self.rectangles.push(rect);
        self
    }

    pub fn kind(&self) -> Option<AnnotationKind> {
        AnnotationKind::parse(&self.annotation_type)
    }

    /// Comment contents joined for the PDF `/Contents` entry
    pub fn contents(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .comments
            .iter()
            .map(|c| c.content.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }
}

impl AnnotationSet {
    pub fn new(document_id: &str) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            document_id: Some(document_id.to_string()),
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Rectangle {
        Rectangle {
            x: 72.0,
            y: 100.0,
            width: 200.0,
            height: 14.0,
        }
    }

    #[test]
    fn test_deserialize_annotation_set() {
        let json = r##"{
            "id": "6f1c1b2e-1f3c-4d2a-9c49-0b3f1c1e7a10",
            "documentId": "doc-123",
            "annotations": [
                {
                    "page": 1,
                    "annotationType": "highlight",
                    "color": "#FFFF00",
                    "comments": [{"content": "Check this"}],
                    "rectangles": [{"x": 10, "y": 20, "width": 100, "height": 12}]
                },
                {
                    "page": 2,
                    "annotationType": "area",
                    "rectangles": [{"x": 0.5, "y": 1.5, "width": 30, "height": 40}],
                    "createdBy": "Case Officer"
                }
            ]
        }"##;

        let set: AnnotationSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.document_id.as_deref(), Some("doc-123"));
        assert_eq!(set.len(), 2);
        assert_eq!(set.annotations[0].kind(), Some(AnnotationKind::Highlight));
        assert_eq!(set.annotations[0].contents().as_deref(), Some("Check this"));
        assert_eq!(set.annotations[1].kind(), Some(AnnotationKind::Area));
        assert!(set.annotations[1].comments.is_empty());
        assert_eq!(set.annotations[1].created_by.as_deref(), Some("Case Officer"));
    }

    #[test]
    fn test_empty_object_is_empty_set() {
        let set: AnnotationSet = serde_json::from_str("{}").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_serialization_is_camel_case() {
        let set = AnnotationSet::new("doc-1")
            .with_annotation(Annotation::new(3, "comment", rect()).with_author("Case Officer"));
        let json = serde_json::to_string(&set).unwrap();

        assert!(json.contains("\"documentId\":\"doc-1\""));
        assert!(json.contains("\"annotationType\":\"comment\""));
        assert!(json.contains("\"createdBy\":\"Case Officer\""));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(AnnotationKind::parse("HIGHLIGHT"), Some(AnnotationKind::Highlight));
        assert_eq!(AnnotationKind::parse("textHighlight"), Some(AnnotationKind::Highlight));
        assert_eq!(AnnotationKind::parse("strikeout"), Some(AnnotationKind::StrikeOut));
        assert_eq!(AnnotationKind::parse(" area "), Some(AnnotationKind::Area));
        assert_eq!(AnnotationKind::parse("stamp"), None);
        assert!(AnnotationKind::Underline.is_markup());
        assert!(!AnnotationKind::Comment.is_markup());
        assert_eq!(AnnotationKind::Area.subtype(), b"Square");
    }

    #[test]
    fn test_default_colors() {
        assert_eq!(AnnotationKind::Highlight.default_color(), Color::YELLOW);
        assert_eq!(AnnotationKind::StrikeOut.default_color(), Color::YELLOW);
        assert_eq!(AnnotationKind::Area.default_color(), Color::RED);
        assert_eq!(AnnotationKind::Comment.default_color(), Color::RED);
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!(Color::from_hex("#FFFF00"), Some(Color::YELLOW));
        assert_eq!(Color::from_hex("ff0000"), Some(Color::RED));
        assert_eq!(Color::from_hex("#FFF"), None);
        assert_eq!(Color::from_hex("#GGGGGG"), None);
    }

    #[test]
    fn test_contents_skips_blank_comments() {
        let annotation = Annotation::new(1, "highlight", rect())
            .with_comment("first")
            .with_comment("  ")
            .with_comment("second");
        assert_eq!(annotation.contents().as_deref(), Some("first\nsecond"));

        assert!(Annotation::new(1, "highlight", rect()).contents().is_none());
    }

    #[test]
    fn test_rectangle_checks() {
        assert!(!rect().is_empty());
        assert!(Rectangle { width: 0.0, ..rect() }.is_empty());
        assert!(Rectangle { height: -1.0, ..rect() }.is_empty());
        assert!(!Rectangle { x: f64::NAN, ..rect() }.is_finite());
    }
}
