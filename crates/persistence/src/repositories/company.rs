//! Company registry repository.

use std::collections::HashMap;

use domain::errors::StoreError;
use domain::models::{Cnae, Company, CompanyPage, CompanyStatistics, Destination};
use domain::services::predicate::{ContactField, Predicate};
use domain::store::CompanyStore;
use shared::pagination::PageRequest;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::predicate_sql::{present_sql, push_where};
use crate::entities::{
    CnaeEntity, CompanyEntity, CompanyStatisticsEntity, EstablishmentEntity, PartnerEntity,
    TaxRegimeEntity,
};
use crate::metrics::QueryTimer;

const COMPANY_COLUMNS: &str = "c.cnpj_basico, c.razao_social, c.natureza_juridica, \
     c.porte_empresa, c.capital_social::float8 AS capital_social, c.ativa, c.email, \
     c.telefone_fixo, c.celular, c.enviado_crm, c.enviado_email";

/// Relations loaded alongside companies.
#[derive(Debug, Clone, Copy)]
struct Relations {
    partners: bool,
    tax_regime: bool,
}

/// Repository for the company registry.
#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn select(predicate: &Predicate) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM empresas c", COMPANY_COLUMNS));
        push_where(&mut qb, predicate);
        qb
    }

    /// Loads relations for `entities` with one query per relation.
    async fn with_relations(
        &self,
        entities: Vec<CompanyEntity>,
        relations: Relations,
    ) -> Result<Vec<Company>, sqlx::Error> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = entities.iter().map(|e| e.cnpj_basico.clone()).collect();

        let mut establishments: HashMap<String, Vec<EstablishmentEntity>> = HashMap::new();
        for row in sqlx::query_as::<_, EstablishmentEntity>(
            r#"
            SELECT e.cnpj_basico, e.cnpj, e.matriz_filial, e.nome_fantasia,
                   e.situacao_cadastral, e.data_inicio_atividades, e.cnae_fiscal,
                   k.descricao AS cnae_descricao, e.uf, e.municipio
            FROM estabelecimento e
            LEFT JOIN cnae k ON k.codigo = e.cnae_fiscal
            WHERE e.cnpj_basico = ANY($1)
            ORDER BY e.cnpj_basico, e.cnpj
            "#,
        )
        .bind(&keys)
        .fetch_all(&self.pool)
        .await?
        {
            establishments
                .entry(row.cnpj_basico.clone())
                .or_default()
                .push(row);
        }

        let mut partners: HashMap<String, Vec<PartnerEntity>> = HashMap::new();
        if relations.partners {
            for row in sqlx::query_as::<_, PartnerEntity>(
                r#"
                SELECT cnpj_basico, nome_socio, cnpj_cpf_socio, qualificacao_socio,
                       data_entrada_sociedade
                FROM socios
                WHERE cnpj_basico = ANY($1)
                ORDER BY cnpj_basico, nome_socio
                "#,
            )
            .bind(&keys)
            .fetch_all(&self.pool)
            .await?
            {
                partners.entry(row.cnpj_basico.clone()).or_default().push(row);
            }
        }

        let mut regimes: HashMap<String, TaxRegimeEntity> = HashMap::new();
        if relations.tax_regime {
            for row in sqlx::query_as::<_, TaxRegimeEntity>(
                r#"
                SELECT cnpj_basico, opcao_simples, data_opcao_simples, opcao_mei, data_opcao_mei
                FROM simples
                WHERE cnpj_basico = ANY($1)
                "#,
            )
            .bind(&keys)
            .fetch_all(&self.pool)
            .await?
            {
                regimes.insert(row.cnpj_basico.clone(), row);
            }
        }

        Ok(entities
            .into_iter()
            .map(|entity| {
                let key = entity.cnpj_basico.clone();
                let mut company = entity.into_domain();
                company.establishments = establishments
                    .remove(&key)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Into::into)
                    .collect();
                company.partners = partners
                    .remove(&key)
                    .unwrap_or_default()
                    .into_iter()
                    .map(Into::into)
                    .collect();
                company.tax_regime = regimes.remove(&key).map(Into::into);
                company
            })
            .collect())
    }

    async fn search_inner(
        &self,
        predicate: &Predicate,
        page: PageRequest,
    ) -> Result<CompanyPage, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM empresas c");
        push_where(&mut count, predicate);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = Self::select(predicate);
        select
            .push(" ORDER BY c.cnpj_basico LIMIT ")
            .push_bind(page.limit_i64())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let entities = select
            .build_query_as::<CompanyEntity>()
            .fetch_all(&self.pool)
            .await?;

        let records = self
            .with_relations(
                entities,
                Relations {
                    partners: false,
                    tax_regime: true,
                },
            )
            .await?;

        Ok(CompanyPage { records, total })
    }

    async fn fetch_for_export_inner(
        &self,
        predicate: &Predicate,
        limit: i64,
    ) -> Result<Vec<Company>, sqlx::Error> {
        let mut select = Self::select(predicate);
        select
            .push(" ORDER BY c.cnpj_basico LIMIT ")
            .push_bind(limit.max(0));
        let entities = select
            .build_query_as::<CompanyEntity>()
            .fetch_all(&self.pool)
            .await?;

        self.with_relations(
            entities,
            Relations {
                partners: true,
                tax_regime: false,
            },
        )
        .await
    }

    async fn find_by_key_inner(&self, key: &str) -> Result<Option<Company>, sqlx::Error> {
        let entity = sqlx::query_as::<_, CompanyEntity>(&format!(
            "SELECT {} FROM empresas c WHERE c.cnpj_basico = $1",
            COMPANY_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(entity) = entity else {
            return Ok(None);
        };
        let mut companies = self
            .with_relations(
                vec![entity],
                Relations {
                    partners: true,
                    tax_regime: true,
                },
            )
            .await?;
        Ok(companies.pop())
    }

    async fn mark_sent_inner(&self, column: &str, keys: &[String]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&format!(
            "UPDATE empresas SET {} = TRUE WHERE cnpj_basico = ANY($1)",
            column
        ))
        .bind(keys)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl CompanyStore for CompanyRepository {
    async fn search(
        &self,
        predicate: &Predicate,
        page: PageRequest,
    ) -> Result<CompanyPage, StoreError> {
        let timer = QueryTimer::new("search_companies");
        let result = self.search_inner(predicate, page).await;
        timer.observe(&result);
        Ok(result?)
    }

    async fn aggregate_counts(&self) -> Result<CompanyStatistics, StoreError> {
        let timer = QueryTimer::new("company_statistics");
        let sql = format!(
            r#"
            SELECT
                COUNT(*) AS total_companies,
                COUNT(*) FILTER (WHERE c.ativa) AS active_companies,
                COUNT(*) FILTER (WHERE c.ativa AND {mobile}) AS active_with_mobile,
                COUNT(*) FILTER (WHERE c.ativa AND {landline}) AS active_with_landline,
                COUNT(*) FILTER (WHERE c.ativa AND {email}) AS active_with_email
            FROM empresas c
            "#,
            mobile = present_sql(ContactField::Mobile),
            landline = present_sql(ContactField::Landline),
            email = present_sql(ContactField::Email),
        );
        let result = sqlx::query_as::<_, CompanyStatisticsEntity>(&sql)
            .fetch_one(&self.pool)
            .await;
        timer.observe(&result);

        Ok(result?.into())
    }

    async fn find_by_key(&self, registration_key: &str) -> Result<Option<Company>, StoreError> {
        let timer = QueryTimer::new("find_company_by_key");
        let result = self.find_by_key_inner(registration_key).await;
        timer.observe(&result);
        Ok(result?)
    }

    async fn fetch_for_export(
        &self,
        predicate: &Predicate,
        limit: i64,
    ) -> Result<Vec<Company>, StoreError> {
        let timer = QueryTimer::new("fetch_companies_for_export");
        let result = self.fetch_for_export_inner(predicate, limit).await;
        timer.observe(&result);
        Ok(result?)
    }

    async fn find_cnaes(&self, codes: &[String]) -> Result<Vec<Cnae>, StoreError> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let entities = sqlx::query_as::<_, CnaeEntity>(
            "SELECT codigo, descricao FROM cnae WHERE codigo = ANY($1) ORDER BY codigo",
        )
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn mark_sent(
        &self,
        destination: Destination,
        keys: &[String],
    ) -> Result<u64, StoreError> {
        let column = match destination {
            Destination::Crm => "enviado_crm",
            Destination::Mailing => "enviado_email",
            Destination::File => return Ok(0),
        };
        if keys.is_empty() {
            return Ok(0);
        }

        let timer = QueryTimer::new("mark_companies_sent");
        let result = self.mark_sent_inner(column, keys).await;
        timer.observe(&result);

        let updated = result?;
        tracing::debug!(
            destination = %destination,
            requested = keys.len(),
            updated,
            "Marked companies as sent"
        );
        Ok(updated)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
