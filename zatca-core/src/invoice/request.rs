//! Reporting/clearance request body for a signed invoice.
use serde::{Deserialize, Serialize};

use super::signed::SignedInvoiceResult;
use super::xml::{paths, InvoiceXmlError, XmlEvents};

/// JSON body accepted by the reporting and clearance endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub invoice_hash: String,
    pub uuid: String,
    pub invoice: String,
}

impl SubmissionRequest {
    pub fn from_result(result: &SignedInvoiceResult) -> Result<Self, InvoiceXmlError> {
        let doc = XmlEvents::parse(result.invoice())?;
        let uuid = doc.required_text(paths::UUID, "cbc:UUID")?;
        Ok(Self {
            invoice_hash: result.hash().to_string(),
            uuid,
            invoice: result.encoded_signed_xml(),
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
