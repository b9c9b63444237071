//! Company filter compilation.
//!
//! A `CompanyFilter` is the caller-facing description of a company search.
//! `compile` validates it and turns it into a `Predicate`: a conjunction of
//! typed criteria that every `CompanyStore` can execute and that can also be
//! evaluated in memory.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use shared::validation::{validate_cnpj_basico, validate_uf};
use validator::Validate;

use crate::errors::ValidationError;
use crate::models::{Company, Establishment};

/// Structured filter description, keyed by the registry's field names.
///
/// Absent fields, empty strings and `false` presence flags impose no
/// constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompanyFilter {
    #[validate(length(max = 200, message = "Legal name filter must be at most 200 characters"))]
    pub razao_social: Option<String>,

    #[validate(custom(function = "validate_cnpj_basico"))]
    pub cnpj: Option<String>,

    #[validate(length(max = 10, message = "Legal nature code must be at most 10 characters"))]
    pub natureza_juridica: Option<String>,

    #[validate(length(max = 10, message = "Size code must be at most 10 characters"))]
    pub porte: Option<String>,

    pub ativa: Option<bool>,
    pub tem_email: Option<bool>,
    pub tem_telefone: Option<bool>,
    pub tem_celular: Option<bool>,

    #[validate(custom(function = "validate_uf"))]
    pub uf: Option<String>,

    #[validate(length(max = 10, message = "Municipality code must be at most 10 characters"))]
    pub municipio: Option<String>,

    #[validate(length(max = 10, message = "Registration status must be at most 10 characters"))]
    pub situacao_cadastral: Option<String>,

    #[validate(length(max = 10, message = "Activity code must be at most 10 characters"))]
    pub cnae: Option<String>,
}

impl CompanyFilter {
    /// Trims text fields and drops the empty ones.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            razao_social: clean(self.razao_social),
            cnpj: clean(self.cnpj),
            natureza_juridica: clean(self.natureza_juridica),
            porte: clean(self.porte),
            ativa: self.ativa,
            tem_email: self.tem_email,
            tem_telefone: self.tem_telefone,
            tem_celular: self.tem_celular,
            uf: clean(self.uf).map(|uf| uf.to_uppercase()),
            municipio: clean(self.municipio),
            situacao_cadastral: clean(self.situacao_cadastral),
            cnae: clean(self.cnae),
        }
    }
}

/// Company text attributes a criterion can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    LegalName,
    RegistrationKey,
    LegalNature,
    SizeCode,
}

impl TextField {
    pub fn value<'a>(&self, company: &'a Company) -> Option<&'a str> {
        match self {
            TextField::LegalName => Some(company.legal_name.as_str()),
            TextField::RegistrationKey => Some(company.registration_key.as_str()),
            TextField::LegalNature => company.legal_nature.as_deref(),
            TextField::SizeCode => company.size_code.as_deref(),
        }
    }
}

/// Optional contact columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Email,
    Landline,
    Mobile,
}

impl ContactField {
    pub fn value<'a>(&self, company: &'a Company) -> Option<&'a str> {
        match self {
            ContactField::Email => company.email.as_deref(),
            ContactField::Landline => company.landline.as_deref(),
            ContactField::Mobile => company.mobile.as_deref(),
        }
    }
}

/// Establishment attributes matched inside `AnyEstablishment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstablishmentField {
    State,
    Municipality,
    RegistrationStatus,
    PrimaryActivity,
}

impl EstablishmentField {
    pub fn value<'a>(&self, establishment: &'a Establishment) -> Option<&'a str> {
        match self {
            EstablishmentField::State => establishment.state.as_deref(),
            EstablishmentField::Municipality => establishment.municipality.as_deref(),
            EstablishmentField::RegistrationStatus => establishment.registration_status.as_deref(),
            EstablishmentField::PrimaryActivity => establishment.primary_activity.as_deref(),
        }
    }
}

/// Equality test on one establishment attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EstablishmentMatch {
    pub field: EstablishmentField,
    pub value: String,
}

/// One condition of a predicate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Criterion {
    /// Case-insensitive substring match.
    Contains { field: TextField, value: String },
    /// Exact match.
    Equals { field: TextField, value: String },
    /// Activity flag equality.
    IsActive { value: bool },
    /// Contact column holds a non-blank value.
    Present { field: ContactField },
    /// At least one establishment satisfies every match.
    AnyEstablishment { matches: Vec<EstablishmentMatch> },
}

impl Criterion {
    pub fn matches(&self, company: &Company) -> bool {
        match self {
            Criterion::Contains { field, value } => field
                .value(company)
                .map(|v| v.to_lowercase().contains(&value.to_lowercase()))
                .unwrap_or(false),
            Criterion::Equals { field, value } => field.value(company) == Some(value.as_str()),
            Criterion::IsActive { value } => company.active == *value,
            Criterion::Present { field } => field
                .value(company)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false),
            Criterion::AnyEstablishment { matches } => {
                company.establishments.iter().any(|establishment| {
                    matches
                        .iter()
                        .all(|m| m.field.value(establishment) == Some(m.value.as_str()))
                })
            }
        }
    }
}

/// A conjunction of criteria. The empty predicate matches every company.
///
/// Criteria are kept sorted and deduplicated so that equivalent filters
/// compile to equal predicates regardless of field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Predicate {
    criteria: Vec<Criterion>,
}

impl Predicate {
    pub fn new(mut criteria: Vec<Criterion>) -> Self {
        criteria.sort();
        criteria.dedup();
        Self { criteria }
    }

    /// Predicate that matches everything.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Conjunction of `self` and `other`.
    pub fn and(self, other: Predicate) -> Self {
        let mut criteria = self.criteria;
        criteria.extend(other.criteria);
        Self::new(criteria)
    }

    /// Adds one criterion to the conjunction.
    pub fn with(self, criterion: Criterion) -> Self {
        self.and(Predicate::new(vec![criterion]))
    }

    pub fn matches(&self, company: &Company) -> bool {
        self.criteria.iter().all(|c| c.matches(company))
    }
}

/// Validates a filter and compiles it into a predicate.
pub fn compile(filter: &CompanyFilter) -> Result<Predicate, ValidationError> {
    let filter = filter.clone().normalized();
    filter.validate()?;

    let mut criteria = Vec::new();

    if let Some(name) = filter.razao_social {
        criteria.push(Criterion::Contains {
            field: TextField::LegalName,
            value: name,
        });
    }
    if let Some(key) = filter.cnpj {
        criteria.push(Criterion::Equals {
            field: TextField::RegistrationKey,
            value: key,
        });
    }
    if let Some(code) = filter.natureza_juridica {
        criteria.push(Criterion::Equals {
            field: TextField::LegalNature,
            value: code,
        });
    }
    if let Some(code) = filter.porte {
        criteria.push(Criterion::Equals {
            field: TextField::SizeCode,
            value: code,
        });
    }
    if let Some(active) = filter.ativa {
        criteria.push(Criterion::IsActive { value: active });
    }

    for (flag, field) in [
        (filter.tem_email, ContactField::Email),
        (filter.tem_telefone, ContactField::Landline),
        (filter.tem_celular, ContactField::Mobile),
    ] {
        if flag == Some(true) {
            criteria.push(Criterion::Present { field });
        }
    }

    let mut establishment: Vec<EstablishmentMatch> = [
        (filter.uf, EstablishmentField::State),
        (filter.municipio, EstablishmentField::Municipality),
        (filter.situacao_cadastral, EstablishmentField::RegistrationStatus),
        (filter.cnae, EstablishmentField::PrimaryActivity),
    ]
    .into_iter()
    .filter_map(|(value, field)| value.map(|value| EstablishmentMatch { field, value }))
    .collect();

    if !establishment.is_empty() {
        establishment.sort();
        criteria.push(Criterion::AnyEstablishment {
            matches: establishment,
        });
    }

    Ok(Predicate::new(criteria))
}

/// Compiles a JSON condition document. `null` compiles to the empty predicate.
pub fn compile_json(conditions: &JsonValue) -> Result<Predicate, ValidationError> {
    if conditions.is_null() {
        return Ok(Predicate::empty());
    }
    if !conditions.is_object() {
        return Err(ValidationError::MalformedFilter(
            "conditions must be a JSON object".to_string(),
        ));
    }

    let filter: CompanyFilter = serde_json::from_value(conditions.clone())
        .map_err(|e| ValidationError::MalformedFilter(e.to_string()))?;
    compile(&filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::company::fixtures::{company, establishment};
    use serde_json::json;

    fn registry() -> Vec<Company> {
        let mut a = company("11111111", "ALFA COMERCIO LTDA");
        a.email = Some("contato@alfa.com.br".to_string());
        a.mobile = Some("11999990000".to_string());
        a.establishments
            .push(establishment("11111111000191", "SP", "7107"));

        let mut b = company("22222222", "BETA SERVICOS SA");
        b.active = false;
        b.email = Some("beta@beta.com".to_string());
        b.establishments
            .push(establishment("22222222000102", "RJ", "6001"));

        let mut c = company("33333333", "GAMA ALFA ME");
        c.landline = Some("1133334444".to_string());
        c.email = Some("   ".to_string());
        c.establishments
            .push(establishment("33333333000103", "RJ", "6001"));
        c.establishments
            .push(establishment("33333333000284", "SP", "7107"));

        vec![a, b, c]
    }

    fn keys(predicate: &Predicate) -> Vec<String> {
        registry()
            .into_iter()
            .filter(|c| predicate.matches(c))
            .map(|c| c.registration_key)
            .collect()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let predicate = compile(&CompanyFilter::default()).unwrap();
        assert!(predicate.is_empty());
        assert_eq!(keys(&predicate).len(), 3);
    }

    #[test]
    fn test_active_with_email() {
        let predicate = compile_json(&json!({ "ativa": true, "temEmail": true })).unwrap();
        assert_eq!(keys(&predicate), vec!["11111111"]);
    }

    #[test]
    fn test_false_presence_flag_imposes_no_constraint() {
        let predicate = compile_json(&json!({ "temEmail": false })).unwrap();
        assert!(predicate.is_empty());
    }

    #[test]
    fn test_empty_strings_impose_no_constraint() {
        let predicate = compile_json(&json!({ "razaoSocial": "", "cnpj": "  ", "uf": "" })).unwrap();
        assert!(predicate.is_empty());
    }

    #[test]
    fn test_legal_name_is_case_insensitive_substring() {
        let predicate = compile_json(&json!({ "razaoSocial": "alfa" })).unwrap();
        assert_eq!(keys(&predicate), vec!["11111111", "33333333"]);
    }

    #[test]
    fn test_establishment_fields_must_match_same_establishment() {
        // 33333333 has an RJ/6001 and an SP/7107 establishment, never RJ/7107.
        let predicate = compile_json(&json!({ "uf": "rj", "municipio": "7107" })).unwrap();
        assert!(keys(&predicate).is_empty());

        let predicate = compile_json(&json!({ "uf": "SP", "municipio": "7107" })).unwrap();
        assert_eq!(keys(&predicate), vec!["11111111", "33333333"]);
    }

    #[test]
    fn test_blank_contact_is_not_present() {
        let predicate = compile_json(&json!({ "temEmail": true })).unwrap();
        assert_eq!(keys(&predicate), vec!["11111111", "22222222"]);
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a = compile_json(&json!({ "uf": "SP", "ativa": true, "cnae": "6201501" })).unwrap();
        let b = compile_json(&json!({ "cnae": "6201501", "ativa": true, "uf": "SP" })).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_conjunction() {
        let p = compile_json(&json!({ "temEmail": true })).unwrap();
        let q = compile_json(&json!({ "uf": "RJ" })).unwrap();
        let both = p.clone().and(q.clone());

        for company in registry() {
            assert_eq!(
                both.matches(&company),
                p.matches(&company) && q.matches(&company)
            );
        }
    }

    #[test]
    fn test_adding_criteria_never_widens_result() {
        let base = compile_json(&json!({ "ativa": true })).unwrap();
        let narrower = base.clone().with(Criterion::Present {
            field: ContactField::Landline,
        });

        let base_keys = keys(&base);
        for key in keys(&narrower) {
            assert!(base_keys.contains(&key));
        }
    }

    #[test]
    fn test_duplicate_criteria_are_collapsed() {
        let p = compile_json(&json!({ "temEmail": true })).unwrap();
        let doubled = p.clone().with(Criterion::Present {
            field: ContactField::Email,
        });
        assert_eq!(p, doubled);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = compile_json(&json!({ "capitalMinimo": 10 })).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedFilter(_)));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = compile_json(&json!({ "ativa": "sim" })).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedFilter(_)));

        let err = compile_json(&json!(["ativa"])).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedFilter(_)));
    }

    #[test]
    fn test_invalid_cnpj_is_rejected() {
        let err = compile_json(&json!({ "cnpj": "1234" })).unwrap_err();
        match err {
            ValidationError::InvalidField { field, .. } => assert_eq!(field, "cnpj"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_uf_is_rejected() {
        assert!(compile_json(&json!({ "uf": "SAO" })).is_err());
    }

    #[test]
    fn test_null_conditions() {
        assert!(compile_json(&JsonValue::Null).unwrap().is_empty());
    }
}
