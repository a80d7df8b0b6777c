//! Event-level access to UBL invoice XML.
//!
//! Documents are kept as a flat list of `quick-xml` events. Events that are not
//! touched are written back byte-for-byte, which keeps the hash boundary stable
//! across signing.
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

pub(crate) mod constants;

#[derive(Debug, Error)]
pub enum InvoiceXmlError {
    #[error("invoice XML is empty")]
    Empty,
    #[error("failed to parse invoice XML at byte {position}: {message}")]
    Parse { position: u64, message: String },
    #[error("malformed invoice XML: {0}")]
    Malformed(String),
    #[error("failed to write invoice XML: {0}")]
    Write(String),
    #[error("missing {0} in invoice XML")]
    MissingElement(&'static str),
}

pub type XmlResult<T> = std::result::Result<T, InvoiceXmlError>;

/// Element paths, rooted at the document element. A segment may carry an
/// attribute constraint: `Reference[Id=invoiceSignedData]`.
pub(crate) mod paths {
    pub const UUID: &[&str] = &["Invoice", "UUID"];
    pub const ISSUE_DATE: &[&str] = &["Invoice", "IssueDate"];
    pub const ISSUE_TIME: &[&str] = &["Invoice", "IssueTime"];
    pub const SELLER_NAME: &[&str] = &[
        "Invoice",
        "AccountingSupplierParty",
        "Party",
        "PartyLegalEntity",
        "RegistrationName",
    ];
    pub const SELLER_VAT: &[&str] = &[
        "Invoice",
        "AccountingSupplierParty",
        "Party",
        "PartyTaxScheme",
        "CompanyID",
    ];
    pub const TOTAL_WITH_VAT: &[&str] = &["Invoice", "LegalMonetaryTotal", "TaxInclusiveAmount"];
    pub const TOTAL_VAT: &[&str] = &["Invoice", "TaxTotal", "TaxAmount"];

    pub const SIGNATURE_VALUE: &[&str] = &[
        "Invoice",
        "UBLExtensions",
        "UBLExtension",
        "ExtensionContent",
        "UBLDocumentSignatures",
        "SignatureInformation",
        "Signature",
        "SignatureValue",
    ];
    pub const INVOICE_DIGEST: &[&str] = &[
        "Invoice",
        "UBLExtensions",
        "UBLExtension",
        "ExtensionContent",
        "UBLDocumentSignatures",
        "SignatureInformation",
        "Signature",
        "SignedInfo",
        "Reference[Id=invoiceSignedData]",
        "DigestValue",
    ];
    pub const X509_CERTIFICATE: &[&str] = &[
        "Invoice",
        "UBLExtensions",
        "UBLExtension",
        "ExtensionContent",
        "UBLDocumentSignatures",
        "SignatureInformation",
        "Signature",
        "KeyInfo",
        "X509Data",
        "X509Certificate",
    ];
}

/// A parsed document (or fragment) as an owned event list.
#[derive(Debug, Clone)]
pub(crate) struct XmlEvents {
    events: Vec<Event<'static>>,
}

impl XmlEvents {
    /// Parses a complete document with exactly one root element.
    pub(crate) fn parse(xml: &str) -> XmlResult<Self> {
        if xml.trim().is_empty() {
            return Err(InvoiceXmlError::Empty);
        }
        let doc = Self::parse_fragment(xml)?;
        let roots = doc.top_level_elements().count();
        if roots != 1 {
            return Err(InvoiceXmlError::Malformed(format!(
                "expected one root element, found {roots}"
            )));
        }
        Ok(doc)
    }

    /// Parses a sequence of sibling elements, as used for signature templates.
    pub(crate) fn parse_fragment(xml: &str) -> XmlResult<Self> {
        let mut reader = Reader::from_str(xml);
        let mut events = Vec::new();
        let mut depth: usize = 0;
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(event) => {
                    match &event {
                        Event::Start(_) => depth += 1,
                        Event::End(_) => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    events.push(event.into_owned());
                }
                Err(e) => {
                    return Err(InvoiceXmlError::Parse {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })
                }
            }
        }
        if depth != 0 {
            return Err(InvoiceXmlError::Malformed(format!(
                "{depth} element(s) left open"
            )));
        }
        Ok(Self { events })
    }

    pub(crate) fn to_xml_string(&self) -> XmlResult<String> {
        write_events(self.events.iter())
    }

    /// Serialization without the XML declaration, the text that gets hashed.
    pub(crate) fn to_hash_input(&self) -> XmlResult<String> {
        write_events(self.events.iter().filter(|e| !matches!(e, Event::Decl(_))))
    }

    /// Drops `UBLExtensions`, every `Signature` element and the QR
    /// `AdditionalDocumentReference`.
    pub(crate) fn without_signature_elements(&self) -> Self {
        let mut events = Vec::with_capacity(self.events.len());
        let mut idx = 0;
        while idx < self.events.len() {
            if self.is_signature_element(idx) {
                idx = self.subtree_end(idx) + 1;
                continue;
            }
            events.push(self.events[idx].clone());
            idx += 1;
        }
        Self { events }
    }

    /// Inserts `extensions` as the first child of the root and `references`
    /// after the last `AdditionalDocumentReference` (or before the supplier
    /// party when there is none).
    pub(crate) fn with_signature_elements(
        &self,
        extensions: &XmlEvents,
        references: &XmlEvents,
    ) -> XmlResult<Self> {
        let root = self
            .root()
            .ok_or(InvoiceXmlError::MissingElement("document root"))?;
        if !matches!(self.events[root], Event::Start(_)) {
            return Err(InvoiceXmlError::Malformed("invoice root has no content".into()));
        }
        let root_end = self.subtree_end(root);

        let last_reference = self
            .children(root)
            .filter(|&i| self.local_name_is(i, "AdditionalDocumentReference"))
            .last();
        let references_at = match last_reference {
            Some(i) => self.subtree_end(i) + 1,
            None => self
                .children(root)
                .find(|&i| self.local_name_is(i, "AccountingSupplierParty"))
                .unwrap_or(root_end),
        };

        let mut events = Vec::with_capacity(
            self.events.len() + extensions.events.len() + references.events.len(),
        );
        events.extend_from_slice(&self.events[..=root]);
        events.extend(extensions.events.iter().cloned());
        events.extend_from_slice(&self.events[root + 1..references_at]);
        events.extend(references.events.iter().cloned());
        events.extend_from_slice(&self.events[references_at..]);
        Ok(Self { events })
    }

    /// Text of the element at `path`, if present.
    pub(crate) fn text_at(&self, path: &[&str]) -> XmlResult<Option<String>> {
        match self.find_path(path) {
            Some(idx) => self.element_text(idx).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`Self::text_at`] but the value must be present and non-empty.
    pub(crate) fn required_text(&self, path: &[&str], label: &'static str) -> XmlResult<String> {
        match self.text_at(path)? {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(InvoiceXmlError::MissingElement(label)),
        }
    }

    /// Embedded QR payload from the `AdditionalDocumentReference` whose ID is `QR`.
    pub(crate) fn qr_value(&self) -> XmlResult<Option<String>> {
        let Some(root) = self.root() else {
            return Ok(None);
        };
        for reference in self
            .children(root)
            .filter(|&i| self.local_name_is(i, "AdditionalDocumentReference"))
        {
            if !self.is_qr_reference(reference) {
                continue;
            }
            let object = self
                .children(reference)
                .filter(|&i| self.local_name_is(i, "Attachment"))
                .flat_map(|attachment| self.children(attachment))
                .find(|&i| self.local_name_is(i, "EmbeddedDocumentBinaryObject"));
            if let Some(object) = object {
                return self.element_text(object).map(|t| Some(t.trim().to_string()));
            }
        }
        Ok(None)
    }

    fn root(&self) -> Option<usize> {
        self.top_level_elements().next()
    }

    fn top_level_elements(&self) -> impl Iterator<Item = usize> + '_ {
        let mut idx = 0;
        std::iter::from_fn(move || {
            while idx < self.events.len() {
                let current = idx;
                match self.events[current] {
                    Event::Start(_) | Event::Empty(_) => {
                        idx = self.subtree_end(current) + 1;
                        return Some(current);
                    }
                    _ => idx += 1,
                }
            }
            None
        })
    }

    /// Direct child elements of the element starting at `parent`.
    fn children(&self, parent: usize) -> impl Iterator<Item = usize> + '_ {
        let end = self.subtree_end(parent);
        let mut idx = parent + 1;
        std::iter::from_fn(move || {
            while idx < end {
                let current = idx;
                match self.events[current] {
                    Event::Start(_) | Event::Empty(_) => {
                        idx = self.subtree_end(current) + 1;
                        return Some(current);
                    }
                    _ => idx += 1,
                }
            }
            None
        })
    }

    /// Index of the matching `End` for a `Start`; the index itself otherwise.
    fn subtree_end(&self, start: usize) -> usize {
        if !matches!(self.events[start], Event::Start(_)) {
            return start;
        }
        let mut depth = 0usize;
        for (offset, event) in self.events[start..].iter().enumerate() {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return start + offset;
                    }
                }
                _ => {}
            }
        }
        self.events.len() - 1
    }

    fn start(&self, idx: usize) -> Option<&BytesStart<'static>> {
        match &self.events[idx] {
            Event::Start(s) | Event::Empty(s) => Some(s),
            _ => None,
        }
    }

    fn local_name_is(&self, idx: usize, name: &str) -> bool {
        self.start(idx)
            .map(|s| s.local_name().as_ref() == name.as_bytes())
            .unwrap_or(false)
    }

    fn segment_matches(&self, idx: usize, segment: &str) -> bool {
        let (name, constraint) = match segment.split_once('[') {
            Some((name, rest)) => (name, rest.strip_suffix(']').and_then(|c| c.split_once('='))),
            None => (segment, None),
        };
        if !self.local_name_is(idx, name) {
            return false;
        }
        let Some((attr, expected)) = constraint else {
            return true;
        };
        self.start(idx)
            .and_then(|s| s.try_get_attribute(attr).ok().flatten())
            .and_then(|a| a.unescape_value().ok().map(|v| v == expected))
            .unwrap_or(false)
    }

    fn find_path(&self, path: &[&str]) -> Option<usize> {
        let root = self.root()?;
        let (first, rest) = path.split_first()?;
        if !self.segment_matches(root, first) {
            return None;
        }
        let mut current = root;
        for segment in rest {
            current = self
                .children(current)
                .find(|&i| self.segment_matches(i, segment))?;
        }
        Some(current)
    }

    fn element_text(&self, idx: usize) -> XmlResult<String> {
        let end = self.subtree_end(idx);
        let mut text = String::new();
        for event in &self.events[idx + 1..end.max(idx + 1)] {
            match event {
                Event::Text(t) => {
                    let value = t
                        .unescape()
                        .map_err(|e| InvoiceXmlError::Malformed(e.to_string()))?;
                    text.push_str(&value);
                }
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(c)),
                _ => {}
            }
        }
        Ok(text)
    }

    fn is_qr_reference(&self, idx: usize) -> bool {
        self.children(idx)
            .filter(|&i| self.local_name_is(i, "ID"))
            .any(|i| {
                self.element_text(i)
                    .map(|t| t.trim() == "QR")
                    .unwrap_or(false)
            })
    }

    fn is_signature_element(&self, idx: usize) -> bool {
        if self.local_name_is(idx, "UBLExtensions") || self.local_name_is(idx, "Signature") {
            return true;
        }
        self.local_name_is(idx, "AdditionalDocumentReference") && self.is_qr_reference(idx)
    }
}

fn write_events<'a>(events: impl Iterator<Item = &'a Event<'static>>) -> XmlResult<String> {
    let mut writer = Writer::new(Vec::new());
    for event in events {
        writer
            .write_event(event.borrow())
            .map_err(|e| InvoiceXmlError::Write(e.to_string()))?;
    }
    String::from_utf8(writer.into_inner()).map_err(|e| InvoiceXmlError::Write(e.to_string()))
}

/// Substitutes `{{KEY}}` placeholders, escaping each value.
pub(crate) fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.trim().to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{{{key}}}}}"), &quick_xml::escape::escape(*value));
    }
    out
}
