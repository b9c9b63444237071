//! Company search and export submission handlers.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{Company, CompanyStatistics, Destination};
use domain::services::{compile, CompanyFilter};
use serde::{Deserialize, Serialize};
use shared::pagination::{total_pages, PageRequest};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::services::ExportRequest;

/// Query string of `GET /empresas`.
///
/// Flags arrive as strings so malformed values get a JSON error body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySearchQuery {
    pub razao_social: Option<String>,
    pub cnpj: Option<String>,
    pub natureza_juridica: Option<String>,
    pub porte: Option<String>,
    pub uf: Option<String>,
    pub municipio: Option<String>,
    pub situacao_cadastral: Option<String>,
    pub cnae: Option<String>,
    pub tem_email: Option<String>,
    pub tem_telefone: Option<String>,
    pub tem_celular: Option<String>,
    pub ativa: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl CompanySearchQuery {
    fn filter(&self) -> Result<CompanyFilter, ApiError> {
        Ok(CompanyFilter {
            razao_social: self.razao_social.clone(),
            cnpj: self.cnpj.clone(),
            natureza_juridica: self.natureza_juridica.clone(),
            porte: self.porte.clone(),
            ativa: parse_flag("ativa", self.ativa.as_deref())?,
            tem_email: parse_flag("temEmail", self.tem_email.as_deref())?,
            tem_telefone: parse_flag("temTelefone", self.tem_telefone.as_deref())?,
            tem_celular: parse_flag("temCelular", self.tem_celular.as_deref())?,
            uf: self.uf.clone(),
            municipio: self.municipio.clone(),
            situacao_cadastral: self.situacao_cadastral.clone(),
            cnae: self.cnae.clone(),
        })
    }

    fn page_request(&self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::new(
            parse_number("page", self.page.as_deref())?,
            parse_number("limit", self.limit.as_deref())?,
        ))
    }
}

fn parse_flag(name: &str, value: Option<&str>) -> Result<Option<bool>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(Some(true)),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(Some(false)),
        Some(v) => Err(ApiError::Validation(format!(
            "`{}` must be true or false, got `{}`",
            name, v
        ))),
    }
}

fn parse_number(name: &str, value: Option<&str>) -> Result<Option<u32>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| {
            ApiError::Validation(format!("`{}` must be a positive integer, got `{}`", name, v))
        }),
    }
}

/// Response of `GET /empresas`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySearchResponse {
    pub records: Vec<Company>,
    pub total: i64,
    pub total_pages: i64,
    pub current_page: u32,
    pub statistics: CompanyStatistics,
}

/// Search companies.
///
/// `statistics.totalCompanies` is the match total; the active counts cover
/// the whole registry.
///
/// GET /empresas
pub async fn search_companies(
    State(state): State<AppState>,
    Query(query): Query<CompanySearchQuery>,
) -> Result<Json<CompanySearchResponse>, ApiError> {
    let predicate = compile(&query.filter()?)?;
    let page = query.page_request()?;

    let (results, statistics) = tokio::try_join!(
        state.companies.search(&predicate, page),
        state.companies.aggregate_counts(),
    )?;

    tracing::debug!(
        total = results.total,
        page = page.page,
        criteria = predicate.criteria().len(),
        "Company search"
    );

    Ok(Json(CompanySearchResponse {
        records: results.records,
        total: results.total,
        total_pages: total_pages(results.total, page.limit),
        current_page: page.page,
        statistics: CompanyStatistics {
            total_companies: results.total,
            ..statistics
        },
    }))
}

/// Company detail with establishments, partners and tax regime.
///
/// GET /empresas/:cnpj
pub async fn get_company(
    State(state): State<AppState>,
    Path(registration_key): Path<String>,
) -> Result<Json<Company>, ApiError> {
    let company = state
        .companies
        .find_by_key(registration_key.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Company not found: {}", registration_key)))?;

    Ok(Json(company))
}

/// Response of an accepted export submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportAcceptedResponse {
    pub message: String,
    pub exportacao_id: Uuid,
}

/// Submit an export of the matching companies.
///
/// POST /empresas/exportar/:destino
pub async fn export_companies(
    State(state): State<AppState>,
    user: UserAuth,
    Path(destination): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ExportAcceptedResponse>), ApiError> {
    let destination: Destination = destination.parse()?;
    let request: ExportRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ExportRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))?
    };

    let job = state
        .exports
        .submit(user.user_id, destination, request)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ExportAcceptedResponse {
            message: "Exportação iniciada com sucesso".to_string(),
            exportacao_id: job.id,
        }),
    ))
}
