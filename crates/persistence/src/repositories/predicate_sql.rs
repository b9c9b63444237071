//! Translation of company predicates into SQL.
//!
//! Queries alias `empresas` as `c`. Every value is bound, never interpolated.

use domain::services::predicate::{
    ContactField, Criterion, EstablishmentField, Predicate, TextField,
};
use sqlx::{Postgres, QueryBuilder};

fn text_column(field: TextField) -> &'static str {
    match field {
        TextField::LegalName => "c.razao_social",
        TextField::RegistrationKey => "c.cnpj_basico",
        TextField::LegalNature => "c.natureza_juridica",
        TextField::SizeCode => "c.porte_empresa",
    }
}

fn contact_column(field: ContactField) -> &'static str {
    match field {
        ContactField::Email => "c.email",
        ContactField::Landline => "c.telefone_fixo",
        ContactField::Mobile => "c.celular",
    }
}

fn establishment_column(field: EstablishmentField) -> &'static str {
    match field {
        EstablishmentField::State => "e.uf",
        EstablishmentField::Municipality => "e.municipio",
        EstablishmentField::RegistrationStatus => "e.situacao_cadastral",
        EstablishmentField::PrimaryActivity => "e.cnae_fiscal",
    }
}

/// SQL condition for a non-blank contact column.
pub(crate) fn present_sql(field: ContactField) -> String {
    format!("NULLIF(BTRIM({}), '') IS NOT NULL", contact_column(field))
}

/// Escapes `LIKE` wildcards so the value matches literally.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Appends ` WHERE ...` for a non-empty predicate.
pub(crate) fn push_where(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    for (i, criterion) in predicate.criteria().iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        push_criterion(qb, criterion);
    }
}

fn push_criterion(qb: &mut QueryBuilder<'_, Postgres>, criterion: &Criterion) {
    match criterion {
        Criterion::Contains { field, value } => {
            qb.push(text_column(*field))
                .push(" ILIKE ")
                .push_bind(format!("%{}%", escape_like(value)));
        }
        Criterion::Equals { field, value } => {
            qb.push(text_column(*field))
                .push(" = ")
                .push_bind(value.clone());
        }
        Criterion::IsActive { value } => {
            qb.push("c.ativa = ").push_bind(*value);
        }
        Criterion::Present { field } => {
            qb.push(present_sql(*field));
        }
        Criterion::AnyEstablishment { matches } => {
            qb.push("EXISTS (SELECT 1 FROM estabelecimento e WHERE e.cnpj_basico = c.cnpj_basico");
            for m in matches {
                qb.push(" AND ")
                    .push(establishment_column(m.field))
                    .push(" = ")
                    .push_bind(m.value.clone());
            }
            qb.push(")");
        }
    }
}
