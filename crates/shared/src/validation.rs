//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref CNPJ_BASICO_REGEX: Regex = Regex::new(r"^\d{8}$").unwrap();
    static ref UF_REGEX: Regex = Regex::new(r"^[A-Za-z]{2}$").unwrap();
}

/// Validates the 8-digit base registration key (`cnpj_basico`).
pub fn validate_cnpj_basico(value: &str) -> Result<(), ValidationError> {
    if CNPJ_BASICO_REGEX.is_match(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("cnpj_format");
        err.message = Some("CNPJ base must have exactly 8 digits".into());
        Err(err)
    }
}

/// Validates a two-letter state code.
pub fn validate_uf(value: &str) -> Result<(), ValidationError> {
    if UF_REGEX.is_match(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("uf_format");
        err.message = Some("State must be a two-letter code".into());
        Err(err)
    }
}

/// Loose email check used before handing addresses to the mailing list.
///
/// Only rejects values that cannot possibly be an address.
pub fn is_deliverable_email(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value.contains('@')
}

/// Formats a 14-digit CNPJ as `XX.XXX.XXX/XXXX-XX`.
///
/// Values that do not have 14 characters are returned unchanged.
pub fn format_cnpj(cnpj: &str) -> String {
    if cnpj.len() != 14 || !cnpj.is_ascii() {
        return cnpj.to_string();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &cnpj[0..2],
        &cnpj[2..5],
        &cnpj[5..8],
        &cnpj[8..12],
        &cnpj[12..14]
    )
}
