//! CSR input validation and generation.
use crate::config::EnvironmentType;
use crate::validation::{codes, ValidationError};
use base64ct::{Base64, Encoding};
use java_properties::read;
use k256::ecdsa::{DerSignature, SigningKey};
use rand_core::OsRng;
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::debug;
use x509_cert::{
    builder::{Builder, RequestBuilder},
    der::{
        asn1, pem::LineEnding, Encode, EncodePem, Error as DerError, Length, Result as DerResult,
        Writer,
    },
    ext::{
        pkix::{name::GeneralName, SubjectAltName},
        AsExtension, Extension,
    },
    name,
    request::CertReq,
};
use zatca_derive::Validate;

/// Errors that can occur while reading, validating or building CSRs.
///
/// `Io` and `PropertiesRead` are configuration problems, `Validation` carries the
/// offending field and its code, the rest are encoding/signing failures.
#[derive(Debug, Error)]
pub enum CsrError {
    #[error("failed to open CSR config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSR properties from '{path}': {source}")]
    PropertiesRead {
        path: PathBuf,
        #[source]
        source: java_properties::PropertiesError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to construct CSR request: {message}")]
    RequestBuild { message: String },

    #[error("failed adding CSR extension '{which}': {message}")]
    AddExtension {
        which: &'static str,
        message: String,
    },

    #[error("failed to build CSR: {message}")]
    CsrBuild { message: String },

    #[error("failed DER encoding for {context}: {source}")]
    DerEncode {
        context: &'static str,
        #[source]
        source: DerError,
    },
}

impl CsrError {
    /// The validation code, when this is a validation failure.
    pub fn validation_code(&self) -> Option<i32> {
        match self {
            CsrError::Validation(err) => Some(err.code()),
            _ => None,
        }
    }
}

struct TemplateNameExtension(asn1::PrintableString);

impl const_oid::AssociatedOid for TemplateNameExtension {
    const OID: const_oid::ObjectIdentifier =
        const_oid::ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.20.2");
}

impl Encode for TemplateNameExtension {
    fn encoded_len(&self) -> DerResult<Length> {
        self.0.encoded_len()
    }
    fn encode(&self, encoder: &mut impl Writer) -> DerResult<()> {
        self.0.encode(encoder)
    }
}

impl AsExtension for TemplateNameExtension {
    fn critical(&self, _name: &name::Name, _exts: &[Extension]) -> bool {
        false
    }
}

impl TryFrom<EnvironmentType> for TemplateNameExtension {
    type Error = CsrError;

    fn try_from(env: EnvironmentType) -> Result<Self, CsrError> {
        let value = asn1::PrintableString::new(env.template_name()).map_err(|e| {
            CsrError::RequestBuild {
                message: format!("invalid template name for extension: {e}"),
            }
        })?;
        Ok(TemplateNameExtension(value))
    }
}

const PROPERTY_KEYS: [&str; 9] = [
    "csr.common.name",
    "csr.serial.number",
    "csr.organization.identifier",
    "csr.organization.unit.name",
    "csr.organization.name",
    "csr.country.name",
    "csr.invoice.type",
    "csr.location.address",
    "csr.industry.business.category",
];

/// CSR properties in the layout of the ZATCA SDK properties file.
///
/// Construction validates every field; a failure is a [`ValidationError`] whose
/// code comes from [`codes`].
///
/// # Examples
/// ```rust,no_run
/// use zatca_core::config::EnvironmentType;
/// use zatca_core::csr::CsrProperties;
///
/// let props = CsrProperties::parse_csr_config("csr.properties".as_ref())?;
/// let (csr, _key) = props.build_with_rng(EnvironmentType::NonProduction)?;
/// # let _ = csr;
/// # Ok::<(), zatca_core::csr::CsrError>(())
/// ```
#[derive(Validate, Debug, Clone, PartialEq, Eq)]
#[validate_error(ValidationError)]
#[validate(non_empty, no_special_chars)]
pub struct CsrProperties {
    #[validate(non_empty)]
    common_name: String,
    #[validate(non_empty, is_egs_serial)]
    serial_number: String,
    #[validate(non_empty, is_vat_number)]
    organization_identifier: String,
    organization_unit_name: String,
    organization_name: String,
    #[validate(non_empty, is_country_code)]
    country_name: String,
    #[validate(non_empty, is_invoice_type)]
    invoice_type: String,
    location_address: String,
    industry_business_category: String,
}

impl CsrProperties {
    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn organization_identifier(&self) -> &str {
        &self.organization_identifier
    }

    pub fn organization_unit_name(&self) -> &str {
        &self.organization_unit_name
    }

    pub fn organization_name(&self) -> &str {
        &self.organization_name
    }

    pub fn country_name(&self) -> &str {
        &self.country_name
    }

    pub fn invoice_type(&self) -> &str {
        &self.invoice_type
    }

    pub fn location_address(&self) -> &str {
        &self.location_address
    }

    pub fn industry_business_category(&self) -> &str {
        &self.industry_business_category
    }

    fn generate_subject(&self) -> Result<name::Name, ValidationError> {
        let code = codes::INVALID_SUBJECT;
        let country = self.country_name.trim().to_uppercase();
        name::Name::from_str(&format!(
            "C={},OU={},O={},CN={}",
            dn_value("country_name", &country, code)?,
            dn_value("organization_unit_name", &self.organization_unit_name, code)?,
            dn_value("organization_name", &self.organization_name, code)?,
            dn_value("common_name", &self.common_name, code)?,
        ))
        .map_err(|e| {
            ValidationError::new(format!("invalid subject distinguished name: {e}"), code)
        })
    }

    fn generate_san_extension(&self) -> Result<SubjectAltName, ValidationError> {
        let code = codes::INVALID_SAN;
        let name = name::Name::from_str(&format!(
            "sn={},uid={},title={},registeredAddress={},businessCategory={}",
            dn_value("serial_number", &self.serial_number, code)?,
            dn_value("organization_identifier", &self.organization_identifier, code)?,
            dn_value("invoice_type", &self.invoice_type, code)?,
            dn_value("location_address", &self.location_address, code)?,
            dn_value(
                "industry_business_category",
                &self.industry_business_category,
                code
            )?,
        ))
        .map_err(|e| {
            ValidationError::new(format!("invalid subject alternative name: {e}"), code)
        })?;
        Ok(SubjectAltName(vec![GeneralName::DirectoryName(name)]))
    }

    /// Checks that the subject and SAN can be encoded, without signing anything.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.generate_subject()?;
        self.generate_san_extension()?;
        Ok(())
    }

    pub fn build(&self, signer: &SigningKey, env: EnvironmentType) -> Result<CertReq, CsrError> {
        debug!(env = %env, common_name = %self.common_name, "building CSR");
        let subject = self.generate_subject()?;
        let template_extension = TemplateNameExtension::try_from(env)?;
        let san_extension = self.generate_san_extension()?;

        let mut csr_builder =
            RequestBuilder::new(subject, signer).map_err(|e| CsrError::RequestBuild {
                message: e.to_string(),
            })?;
        csr_builder
            .add_extension(&template_extension)
            .map_err(|e| CsrError::AddExtension {
                which: "TemplateName",
                message: e.to_string(),
            })?;
        csr_builder
            .add_extension(&san_extension)
            .map_err(|e| CsrError::AddExtension {
                which: "SubjectAltName",
                message: e.to_string(),
            })?;
        csr_builder
            .build::<DerSignature>()
            .map_err(|e| CsrError::CsrBuild {
                message: e.to_string(),
            })
    }

    /// Generates a fresh secp256k1 key and a CSR signed with it.
    pub fn build_with_rng(&self, env: EnvironmentType) -> Result<(CertReq, SigningKey), CsrError> {
        let signer = SigningKey::random(&mut OsRng);
        let csr = self.build(&signer, env)?;
        Ok((csr, signer))
    }

    /// Builds validated properties from an already-parsed key/value map.
    pub fn from_properties(map: &HashMap<String, String>) -> Result<CsrProperties, ValidationError> {
        let req = |key: &str| -> Result<String, ValidationError> {
            map.get(key).map(|s| s.trim().to_string()).ok_or_else(|| {
                ValidationError::new(
                    format!("missing required CSR property '{key}'"),
                    codes::MISSING_PROPERTY,
                )
            })
        };

        let [cn, serial, org_id, unit, org, country, invoice_type, location, industry] =
            PROPERTY_KEYS;
        CsrProperties::new(
            req(cn)?,
            req(serial)?,
            req(org_id)?,
            req(unit)?,
            req(org)?,
            req(country)?,
            req(invoice_type)?,
            req(location)?,
            req(industry)?,
        )
    }

    /// Parses properties text in the ZATCA SDK format.
    pub fn from_properties_reader(
        reader: impl Read,
        origin: &Path,
    ) -> Result<CsrProperties, CsrError> {
        let map = read(reader).map_err(|e| CsrError::PropertiesRead {
            path: origin.to_path_buf(),
            source: e,
        })?;
        Ok(Self::from_properties(&map)?)
    }

    pub fn parse_csr_config(csr_path: &Path) -> Result<CsrProperties, CsrError> {
        let file = File::open(csr_path).map_err(|e| CsrError::Io {
            path: csr_path.to_path_buf(),
            source: e,
        })?;
        Self::from_properties_reader(BufReader::new(file), csr_path)
    }
}

const DN_SPECIAL_CHARS: [char; 8] = [',', '+', '=', '\\', '"', '<', '>', ';'];

/// A value spliced into a distinguished name string must not carry RDN syntax.
fn dn_value<'a>(field: &str, value: &'a str, code: i32) -> Result<&'a str, ValidationError> {
    if value.contains(DN_SPECIAL_CHARS) {
        return Err(ValidationError::new(
            format!("{field} must not contain distinguished name separators"),
            code,
        ));
    }
    Ok(value)
}

/// Encode to base64 string.
pub trait ToBase64String {
    fn to_base64_string(&self) -> Result<String, CsrError>;
    fn to_pem_base64_string(&self) -> Result<String, CsrError>;
}

impl ToBase64String for CertReq {
    fn to_base64_string(&self) -> Result<String, CsrError> {
        let der_bytes = self.to_der().map_err(|e| CsrError::DerEncode {
            context: "certificate request",
            source: e,
        })?;
        Ok(Base64::encode_string(&der_bytes))
    }

    fn to_pem_base64_string(&self) -> Result<String, CsrError> {
        let pem = self
            .to_pem(LineEnding::LF)
            .map_err(|e| CsrError::DerEncode {
                context: "certificate request (PEM)",
                source: e,
            })?;
        Ok(Base64::encode_string(pem.as_bytes()))
    }
}
