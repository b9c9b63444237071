//! Company registry entities.
//!
//! Registry dates are stored as text, usually `YYYYMMDD`.

use chrono::NaiveDate;
use domain::models::{Cnae, Company, CompanyStatistics, Establishment, Partner, TaxRegime};
use sqlx::FromRow;

/// Row of `empresas`.
#[derive(Debug, Clone, FromRow)]
pub struct CompanyEntity {
    pub cnpj_basico: String,
    pub razao_social: String,
    pub natureza_juridica: Option<String>,
    pub porte_empresa: Option<String>,
    pub capital_social: Option<f64>,
    pub ativa: bool,
    pub email: Option<String>,
    pub telefone_fixo: Option<String>,
    pub celular: Option<String>,
    pub enviado_crm: bool,
    pub enviado_email: bool,
}

impl CompanyEntity {
    /// Converts the row into a company with no relations loaded.
    pub fn into_domain(self) -> Company {
        Company {
            registration_key: self.cnpj_basico,
            legal_name: self.razao_social,
            legal_nature: self.natureza_juridica,
            size_code: self.porte_empresa,
            share_capital: self.capital_social,
            active: self.ativa,
            email: self.email,
            landline: self.telefone_fixo,
            mobile: self.celular,
            sent_to_crm: self.enviado_crm,
            sent_to_mailing: self.enviado_email,
            establishments: Vec::new(),
            partners: Vec::new(),
            tax_regime: None,
        }
    }
}

/// Row of `estabelecimento`.
#[derive(Debug, Clone, FromRow)]
pub struct EstablishmentEntity {
    pub cnpj_basico: String,
    pub cnpj: String,
    pub matriz_filial: Option<String>,
    pub nome_fantasia: Option<String>,
    pub situacao_cadastral: Option<String>,
    pub data_inicio_atividades: Option<String>,
    pub cnae_fiscal: Option<String>,
    /// Joined from `cnae`.
    pub cnae_descricao: Option<String>,
    pub uf: Option<String>,
    pub municipio: Option<String>,
}

impl From<EstablishmentEntity> for Establishment {
    fn from(e: EstablishmentEntity) -> Self {
        Self {
            cnpj: e.cnpj,
            // "1" marks the head office in the registry
            head_office: e.matriz_filial.as_deref() == Some("1"),
            trade_name: e.nome_fantasia.filter(|n| !n.trim().is_empty()),
            registration_status: e.situacao_cadastral,
            state: e.uf,
            municipality: e.municipio,
            primary_activity: e.cnae_fiscal,
            primary_activity_description: e.cnae_descricao,
            opened_on: e.data_inicio_atividades.as_deref().and_then(parse_registry_date),
        }
    }
}

/// Row of `cnae`.
#[derive(Debug, Clone, FromRow)]
pub struct CnaeEntity {
    pub codigo: String,
    pub descricao: String,
}

impl From<CnaeEntity> for Cnae {
    fn from(c: CnaeEntity) -> Self {
        Self {
            code: c.codigo,
            description: c.descricao,
        }
    }
}

/// Row of `socios`.
#[derive(Debug, Clone, FromRow)]
pub struct PartnerEntity {
    pub cnpj_basico: String,
    pub nome_socio: Option<String>,
    pub cnpj_cpf_socio: Option<String>,
    pub qualificacao_socio: Option<String>,
    pub data_entrada_sociedade: Option<String>,
}

impl From<PartnerEntity> for Partner {
    fn from(p: PartnerEntity) -> Self {
        Self {
            name: p.nome_socio.unwrap_or_default(),
            document: p.cnpj_cpf_socio,
            qualification: p.qualificacao_socio,
            joined_on: p.data_entrada_sociedade.as_deref().and_then(parse_registry_date),
        }
    }
}

/// Row of `simples`.
#[derive(Debug, Clone, FromRow)]
pub struct TaxRegimeEntity {
    pub cnpj_basico: String,
    pub opcao_simples: Option<String>,
    pub data_opcao_simples: Option<String>,
    pub opcao_mei: Option<String>,
    pub data_opcao_mei: Option<String>,
}

impl From<TaxRegimeEntity> for TaxRegime {
    fn from(t: TaxRegimeEntity) -> Self {
        Self {
            simples_option: is_yes(t.opcao_simples.as_deref()),
            simples_since: t.data_opcao_simples.as_deref().and_then(parse_registry_date),
            mei_option: is_yes(t.opcao_mei.as_deref()),
            mei_since: t.data_opcao_mei.as_deref().and_then(parse_registry_date),
        }
    }
}

/// Result of the statistics query.
#[derive(Debug, Clone, FromRow)]
pub struct CompanyStatisticsEntity {
    pub total_companies: i64,
    pub active_companies: i64,
    pub active_with_mobile: i64,
    pub active_with_landline: i64,
    pub active_with_email: i64,
}

impl From<CompanyStatisticsEntity> for CompanyStatistics {
    fn from(s: CompanyStatisticsEntity) -> Self {
        Self {
            total_companies: s.total_companies,
            active_companies: s.active_companies,
            active_with_mobile: s.active_with_mobile,
            active_with_landline: s.active_with_landline,
            active_with_email: s.active_with_email,
        }
    }
}

fn is_yes(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("S") | Some("s"))
}

/// Parses `YYYYMMDD` or `YYYY-MM-DD`; zeroed or malformed dates yield `None`.
pub fn parse_registry_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}
