//! Company registry domain models.
//!
//! The registry is owned by an external loader; this service reads it and only
//! flips the sent-flags after a successful export.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::validation::format_cnpj;

/// A company (`empresas`), keyed by the 8-digit base registration number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub registration_key: String,
    pub legal_name: String,
    pub legal_nature: Option<String>,
    pub size_code: Option<String>,
    pub share_capital: Option<f64>,
    pub active: bool,
    pub email: Option<String>,
    pub landline: Option<String>,
    pub mobile: Option<String>,
    pub sent_to_crm: bool,
    pub sent_to_mailing: bool,
    #[serde(default)]
    pub establishments: Vec<Establishment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partners: Vec<Partner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_regime: Option<TaxRegime>,
}

impl Company {
    /// Trade name of the first establishment, if any.
    pub fn primary_trade_name(&self) -> Option<&str> {
        self.establishments
            .first()
            .and_then(|e| e.trade_name.as_deref())
    }

    /// Head office establishment, falling back to the first one.
    pub fn head_office(&self) -> Option<&Establishment> {
        self.establishments
            .iter()
            .find(|e| e.head_office)
            .or_else(|| self.establishments.first())
    }
}

/// An establishment (`estabelecimento`) of a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Establishment {
    pub cnpj: String,
    pub head_office: bool,
    pub trade_name: Option<String>,
    pub registration_status: Option<String>,
    pub state: Option<String>,
    pub municipality: Option<String>,
    pub primary_activity: Option<String>,
    /// Catalogue description of `primary_activity`, when the code is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_activity_description: Option<String>,
    pub opened_on: Option<NaiveDate>,
}

impl Establishment {
    /// Full CNPJ rendered as `XX.XXX.XXX/XXXX-XX`.
    pub fn formatted_cnpj(&self) -> String {
        format_cnpj(&self.cnpj)
    }

    /// Primary activity as `code - description`, or the bare code.
    pub fn primary_activity_label(&self) -> Option<String> {
        let code = self.primary_activity.as_deref()?;
        Some(match self.primary_activity_description.as_deref() {
            Some(description) => format!("{} - {}", code, description),
            None => code.to_string(),
        })
    }
}

/// Economic activity classification entry (`cnae`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cnae {
    pub code: String,
    pub description: String,
}

/// A partner (`socios`) of a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub name: String,
    pub document: Option<String>,
    pub qualification: Option<String>,
    pub joined_on: Option<NaiveDate>,
}

/// Simplified tax regime options (`simples`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRegime {
    pub simples_option: bool,
    pub simples_since: Option<NaiveDate>,
    pub mei_option: bool,
    pub mei_since: Option<NaiveDate>,
}

/// Counts shown next to search results.
///
/// The active counts are registry-wide and come from one snapshot. Search
/// responses carry the match total in `total_companies`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStatistics {
    pub total_companies: i64,
    pub active_companies: i64,
    pub active_with_mobile: i64,
    pub active_with_landline: i64,
    pub active_with_email: i64,
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct CompanyPage {
    pub records: Vec<Company>,
    /// Size of the full match set, independent of paging.
    pub total: i64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn company(key: &str, name: &str) -> Company {
        Company {
            registration_key: key.to_string(),
            legal_name: name.to_string(),
            legal_nature: Some("2062".to_string()),
            size_code: Some("03".to_string()),
            share_capital: Some(10_000.0),
            active: true,
            email: None,
            landline: None,
            mobile: None,
            sent_to_crm: false,
            sent_to_mailing: false,
            establishments: Vec::new(),
            partners: Vec::new(),
            tax_regime: None,
        }
    }

    pub fn establishment(cnpj: &str, state: &str, municipality: &str) -> Establishment {
        Establishment {
            cnpj: cnpj.to_string(),
            head_office: cnpj.get(8..12) == Some("0001"),
            trade_name: None,
            registration_status: Some("02".to_string()),
            state: Some(state.to_string()),
            municipality: Some(municipality.to_string()),
            primary_activity: Some("6201501".to_string()),
            primary_activity_description: None,
            opened_on: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_primary_trade_name() {
        let mut c = company("12345678", "ACME LTDA");
        assert_eq!(c.primary_trade_name(), None);

        let mut e = establishment("12345678000195", "SP", "7107");
        e.trade_name = Some("ACME".to_string());
        c.establishments.push(e);
        assert_eq!(c.primary_trade_name(), Some("ACME"));
    }

    #[test]
    fn test_primary_activity_label() {
        let mut e = establishment("12345678000195", "SP", "7107");
        assert_eq!(e.primary_activity_label().as_deref(), Some("6201501"));

        e.primary_activity_description =
            Some("Desenvolvimento de programas de computador sob encomenda".to_string());
        assert_eq!(
            e.primary_activity_label().as_deref(),
            Some("6201501 - Desenvolvimento de programas de computador sob encomenda")
        );

        e.primary_activity = None;
        assert_eq!(e.primary_activity_label(), None);
    }

    #[test]
    fn test_head_office_prefers_matriz() {
        let mut c = company("12345678", "ACME LTDA");
        c.establishments.push(establishment("12345678000276", "RJ", "6001"));
        c.establishments.push(establishment("12345678000195", "SP", "7107"));

        assert_eq!(c.head_office().unwrap().cnpj, "12345678000195");
    }

    #[test]
    fn test_formatted_cnpj() {
        let e = establishment("12345678000195", "SP", "7107");
        assert_eq!(e.formatted_cnpj(), "12.345.678/0001-95");
    }

    #[test]
    fn test_company_serializes_camel_case() {
        let c = company("12345678", "ACME LTDA");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["registrationKey"], "12345678");
        assert_eq!(json["sentToCrm"], false);
        assert!(json.get("partners").is_none());
    }
}
