//! lopdf annotation backend
//!
//! Writes native `/Annot` dictionaries into each target page's `/Annots`
//! array. Page objects and content streams are left as they are, so page
//! count, order and content survive unchanged.

use chrono::{DateTime, Utc};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};

use super::annotator::{AnnotatedDocument, PdfAnnotator};
use super::document::PdfDocument;
use super::error::AnnotateError;
use crate::annotations::{Annotation, AnnotationKind, AnnotationSet, Color, Rectangle};

/// Highlight fill opacity
const HIGHLIGHT_OPACITY: f32 = 0.4;

/// Edge length of a sticky-note icon, in points
const NOTE_ICON_SIZE: f64 = 24.0;

/// Border width of area annotations
const AREA_BORDER_WIDTH: i64 = 2;

/// `/F` flags: print
const ANNOTATION_FLAGS: i64 = 4;

/// Page tree depth limit when resolving inherited attributes
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Annotator backed by lopdf
#[derive(Debug, Clone)]
pub struct LopdfAnnotator {
    max_output_bytes: usize,
}

impl LopdfAnnotator {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }
}

impl Default for LopdfAnnotator {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

/// A validated annotation ready to be written
struct Planned<'a> {
    index: usize,
    annotation: &'a Annotation,
    kind: AnnotationKind,
    color: Color,
}

impl PdfAnnotator for LopdfAnnotator {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn annotate(
        &self,
        document: &PdfDocument,
        annotations: &AnnotationSet,
    ) -> Result<AnnotatedDocument, AnnotateError> {
        let mut doc = Document::load_mem(document.as_bytes())
            .map_err(|e| AnnotateError::MalformedDocument(e.to_string()))?;

        let pages = doc.get_pages();
        let page_count = pages.len();
        if page_count == 0 {
            return Err(AnnotateError::MalformedDocument(
                "document has no pages".to_string(),
            ));
        }

        // Validate everything before touching the document
        let planned = plan(annotations, page_count)?;

        if planned.is_empty() {
            return Ok(AnnotatedDocument {
                document: document.clone(),
                page_count,
                annotations_written: 0,
            });
        }

        let modified = pdf_date(Utc::now());
        let mut written = 0;

        for item in &planned {
            let page_id = *pages.get(&item.annotation.page).ok_or_else(|| {
                AnnotateError::Internal(format!("page {} vanished", item.annotation.page))
            })?;
            let page_box = media_box(&doc, page_id);
            if let Some(rect) = item.annotation.rectangles.iter().find(|r| !page_box.overlaps(r)) {
                return Err(AnnotateError::InvalidAnnotation {
                    index: item.index,
                    reason: format!(
                        "rectangle at ({}, {}) lies outside page {}",
                        rect.x, rect.y, item.annotation.page
                    ),
                });
            }

            for dict in build_annotations(item, page_id, &page_box, &modified) {
                let annot_id = doc.add_object(Object::Dictionary(dict));
                attach_annotation(&mut doc, page_id, annot_id)?;
                written += 1;
            }
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| AnnotateError::Write(e.to_string()))?;

        if output.len() > self.max_output_bytes {
            return Err(AnnotateError::OutputTooLarge {
                size: output.len(),
                limit: self.max_output_bytes,
            });
        }

        let after = Document::load_mem(&output)
            .map_err(|e| AnnotateError::Write(format!("output does not re-open: {}", e)))?
            .get_pages()
            .len();
        if after != page_count {
            return Err(AnnotateError::PageCountMismatch {
                before: page_count,
                after,
            });
        }

        tracing::debug!(
            backend = self.name(),
            page_count,
            annotations = planned.len(),
            written,
            "Annotated document"
        );

        Ok(AnnotatedDocument {
            document: PdfDocument::from_bytes(output)?,
            page_count,
            annotations_written: written,
        })
    }
}

fn plan(set: &AnnotationSet, page_count: usize) -> Result<Vec<Planned<'_>>, AnnotateError> {
    set.annotations
        .iter()
        .enumerate()
        .map(|(index, annotation)| {
            let kind = annotation.kind().ok_or_else(|| {
                AnnotateError::UnsupportedAnnotationType {
                    index,
                    annotation_type: annotation.annotation_type.clone(),
                }
            })?;

            if annotation.page == 0 || annotation.page as usize > page_count {
                return Err(AnnotateError::PageOutOfRange {
                    index,
                    page: annotation.page,
                    page_count,
                });
            }

            if annotation.rectangles.is_empty() {
                return Err(AnnotateError::InvalidAnnotation {
                    index,
                    reason: "no rectangles".to_string(),
                });
            }
            if let Some(rect) = annotation
                .rectangles
                .iter()
                .find(|r| !r.is_finite() || r.is_empty())
            {
                return Err(AnnotateError::InvalidAnnotation {
                    index,
                    reason: format!(
                        "rectangle {}x{} at ({}, {}) has no area",
                        rect.width, rect.height, rect.x, rect.y
                    ),
                });
            }

            if let Some(rect) = annotation.rectangles.iter().find(|r| !fits_pdf_real(r)) {
                return Err(AnnotateError::InvalidAnnotation {
                    index,
                    reason: format!(
                        "rectangle at ({}, {}) exceeds the PDF number range",
                        rect.x, rect.y
                    ),
                });
            }

            let color = match annotation.color.as_deref() {
                Some(hex) => Color::from_hex(hex).ok_or_else(|| AnnotateError::InvalidAnnotation {
                    index,
                    reason: format!("unparseable colour '{}'", hex),
                })?,
                None => kind.default_color(),
            };

            Ok(Planned {
                index,
                annotation,
                kind,
                color,
            })
        })
        .collect()
}

/// PDF reals are single precision; every edge must survive the narrowing
fn fits_pdf_real(rect: &Rectangle) -> bool {
    [rect.x, rect.y, rect.x + rect.width, rect.y + rect.height]
        .iter()
        .all(|v| (*v as f32).is_finite())
}

/// Page bounds in PDF user space (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageBox {
    llx: f64,
    lly: f64,
    urx: f64,
    ury: f64,
}

impl PageBox {
    /// US Letter, used when no MediaBox can be resolved
    const LETTER: PageBox = PageBox {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    /// Whether a top-left rectangle covers any part of the page
    fn overlaps(&self, rect: &Rectangle) -> bool {
        let width = self.urx - self.llx;
        let height = self.ury - self.lly;
        rect.x < width && rect.x + rect.width > 0.0 && rect.y < height && rect.y + rect.height > 0.0
    }

    /// Convert a top-left rectangle to `[x1, y1, x2, y2]` in user space
    fn to_user_space(&self, rect: &Rectangle) -> [f64; 4] {
        let x1 = self.llx + rect.x;
        let y2 = self.ury - rect.y;
        [x1, y2 - rect.height, x1 + rect.width, y2]
    }
}

fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        Object::Reference(id) => number(doc, doc.get_object(*id).ok()?),
        _ => None,
    }
}

fn resolve_box(doc: &Document, obj: &Object) -> Option<PageBox> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let values = obj.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let v: Vec<f64> = values
        .iter()
        .map(|item| number(doc, item))
        .collect::<Option<_>>()?;

    Some(PageBox {
        llx: v[0].min(v[2]),
        lly: v[1].min(v[3]),
        urx: v[0].max(v[2]),
        ury: v[1].max(v[3]),
    })
}

/// MediaBox of a page, following `/Parent` for inherited values
fn media_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let mut current = Some(page_id);
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_dictionary(id) else { break };

        if let Some(page_box) = dict.get(b"MediaBox").ok().and_then(|o| resolve_box(doc, o)) {
            return page_box;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    PageBox::LETTER
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn color_array(color: &Color) -> Object {
    Object::Array(vec![
        Object::Real(color.r),
        Object::Real(color.g),
        Object::Real(color.b),
    ])
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        Object::String(value.as_bytes().to_vec(), StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn pdf_date(now: DateTime<Utc>) -> String {
    now.format("D:%Y%m%d%H%M%SZ").to_string()
}

fn base_dictionary(item: &Planned<'_>, page_id: ObjectId, rect: [f64; 4], modified: &str) -> Dictionary {
    let annotation = item.annotation;
    let mut dict = dictionary! {
        "Type" => "Annot",
        "Subtype" => Object::Name(item.kind.subtype().to_vec()),
        "Rect" => rect.iter().map(|v| real(*v)).collect::<Vec<_>>(),
        "F" => ANNOTATION_FLAGS,
        "C" => color_array(&item.color),
        "P" => Object::Reference(page_id),
        "M" => Object::string_literal(modified),
    };

    if let Some(contents) = annotation.contents() {
        dict.set("Contents", text_string(&contents));
    }
    if let Some(id) = annotation.id {
        dict.set("NM", Object::string_literal(id.to_string()));
    }
    if let Some(author) = annotation.created_by.as_deref() {
        dict.set("T", text_string(author));
    }
    dict
}

fn union(rects: &[[f64; 4]]) -> [f64; 4] {
    rects.iter().skip(1).fold(rects[0], |acc, r| {
        [acc[0].min(r[0]), acc[1].min(r[1]), acc[2].max(r[2]), acc[3].max(r[3])]
    })
}

fn build_annotations(
    item: &Planned<'_>,
    page_id: ObjectId,
    page_box: &PageBox,
    modified: &str,
) -> Vec<Dictionary> {
    let rects: Vec<[f64; 4]> = item
        .annotation
        .rectangles
        .iter()
        .map(|r| page_box.to_user_space(r))
        .collect();

    match item.kind {
        AnnotationKind::Highlight | AnnotationKind::Underline | AnnotationKind::StrikeOut => {
            let mut dict = base_dictionary(item, page_id, union(&rects), modified);
            // One quad per rectangle: upper-left, upper-right, lower-left, lower-right
            let quads: Vec<Object> = rects
                .iter()
                .flat_map(|[x1, y1, x2, y2]| [*x1, *y2, *x2, *y2, *x1, *y1, *x2, *y1])
                .map(real)
                .collect();
            dict.set("QuadPoints", quads);
            if item.kind == AnnotationKind::Highlight {
                dict.set("CA", Object::Real(HIGHLIGHT_OPACITY));
            }
            vec![dict]
        }
        AnnotationKind::Area => rects
            .iter()
            .map(|rect| {
                let mut dict = base_dictionary(item, page_id, *rect, modified);
                dict.set("BS", dictionary! { "W" => AREA_BORDER_WIDTH, "S" => "S" });
                dict
            })
            .collect(),
        AnnotationKind::Comment => {
            let [x1, _, _, y2] = rects[0];
            let icon = [x1, y2 - NOTE_ICON_SIZE, x1 + NOTE_ICON_SIZE, y2];
            let mut dict = base_dictionary(item, page_id, icon, modified);
            dict.set("Name", "Comment");
            dict.set("Open", false);
            vec![dict]
        }
    }
}

fn attach_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), AnnotateError> {
    let existing = doc.get_dictionary(page_id)?.get(b"Annots").ok().cloned();

    let annots = match existing {
        // Indirect array: append in place, the page keeps its reference
        Some(Object::Reference(array_id)) => {
            if let Ok(Object::Array(arr)) = doc.get_object_mut(array_id) {
                arr.push(Object::Reference(annot_id));
                return Ok(());
            }
            vec![Object::Reference(annot_id)]
        }
        Some(Object::Array(mut arr)) => {
            arr.push(Object::Reference(annot_id));
            arr
        }
        _ => vec![Object::Reference(annot_id)],
    };

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Annots", annots);
    Ok(())
}
