//! CNAE catalogue lookups.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::Cnae;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;

/// Most codes accepted by one list lookup.
const MAX_CODES: usize = 100;

/// Query string of `GET /cnaes`.
#[derive(Debug, Default, Deserialize)]
pub struct CnaeListQuery {
    /// Comma-separated codes.
    pub codigos: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CnaeListResponse {
    pub cnaes: Vec<Cnae>,
}

fn parse_codes(raw: Option<&str>) -> Result<Vec<String>, ApiError> {
    let codes: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    if codes.is_empty() {
        return Err(ApiError::Validation("`codigos` is required".to_string()));
    }
    if codes.len() > MAX_CODES {
        return Err(ApiError::Validation(format!(
            "At most {} codes per request",
            MAX_CODES
        )));
    }
    Ok(codes)
}

/// Catalogue entries for a list of codes. Unknown codes are left out.
///
/// GET /cnaes?codigos=6201501,4711302
pub async fn list_cnaes(
    State(state): State<AppState>,
    Query(query): Query<CnaeListQuery>,
) -> Result<Json<CnaeListResponse>, ApiError> {
    let codes = parse_codes(query.codigos.as_deref())?;
    let cnaes = state.companies.find_cnaes(&codes).await?;
    Ok(Json(CnaeListResponse { cnaes }))
}

/// One catalogue entry.
///
/// GET /cnaes/:codigo
pub async fn get_cnae(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Cnae>, ApiError> {
    let code = code.trim().to_string();
    state
        .companies
        .find_cnaes(std::slice::from_ref(&code))
        .await?
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("CNAE not found: {}", code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codes() {
        assert_eq!(
            parse_codes(Some(" 6201501, ,4711302 ")).unwrap(),
            vec!["6201501", "4711302"]
        );
        assert!(parse_codes(None).is_err());
        assert!(parse_codes(Some(" , ")).is_err());

        let many = vec!["1"; MAX_CODES + 1].join(",");
        assert!(parse_codes(Some(&many)).is_err());
    }
}
