pub(crate) const UBL_EXTENSIONS_TEMPLATE: &str =
    include_str!("../../../assets/templates/ubl_extensions.xml");
pub(crate) const SIGNED_PROPERTIES_TEMPLATE: &str =
    include_str!("../../../assets/templates/signed_properties.xml");
pub(crate) const QR_REFERENCE_TEMPLATE: &str =
    include_str!("../../../assets/templates/qr_reference.xml");
pub(crate) const CAC_SIGNATURE_TEMPLATE: &str =
    include_str!("../../../assets/templates/cac_signature.xml");

/// `ds:SigningTime` and QR timestamp layout.
pub(crate) const SIGNING_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
