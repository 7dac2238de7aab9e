//! PDF document payloads

use std::fmt;

use sha2::{Digest, Sha256};

use super::error::AnnotateError;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Binary PDF payload
///
/// Annotators borrow their input and return a freshly allocated document.
#[derive(Clone, PartialEq, Eq)]
pub struct PdfDocument {
    bytes: Vec<u8>,
}

impl PdfDocument {
    /// Wrap bytes after checking the PDF header
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AnnotateError> {
        if !Self::has_pdf_magic(&bytes) {
            return Err(AnnotateError::MalformedDocument(
                "missing %PDF- header".to_string(),
            ));
        }
        Ok(Self { bytes })
    }

    /// Detect a PDF from its first bytes
    ///
    /// Some producers emit junk before the header; readers accept up to
    /// 1024 bytes of it.
    pub fn has_pdf_magic(bytes: &[u8]) -> bool {
        let window = &bytes[..bytes.len().min(1024)];
        window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 of the payload, hex encoded
    pub fn sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

impl fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDocument")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_pdf() {
        let result = PdfDocument::from_bytes(b"PK\x03\x04 not a pdf".to_vec());
        assert!(matches!(result, Err(AnnotateError::MalformedDocument(_))));
        assert!(PdfDocument::from_bytes(Vec::new()).is_err());
    }

    #[test]
    fn test_accepts_leading_junk() {
        let mut bytes = vec![b' '; 16];
        bytes.extend_from_slice(b"%PDF-1.7\n");
        assert!(PdfDocument::from_bytes(bytes).is_ok());
    }

    #[test]
    fn test_sha256_is_stable() {
        let doc = PdfDocument::from_bytes(b"%PDF-1.4\n%%EOF".to_vec()).unwrap();
        assert_eq!(doc.sha256().len(), 64);
        assert_eq!(doc.sha256(), doc.clone().sha256());
        assert_eq!(doc.len(), 14);
    }
}
