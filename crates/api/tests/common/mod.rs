//! Common test utilities for integration tests.
//!
//! The router runs over the in-memory store, mock destination clients and
//! in-memory artifact storage, so no database is needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{NaiveDate, Utc};
use domain::models::{Company, Establishment, Partner, TaxRegime};
use domain::services::{MemorySpreadsheetWriter, MockCrmClient, MockMailingListClient};
use domain::store::InMemoryStore;
use fake::{faker::company::en::CompanyName, Fake};
use jsonwebtoken::{encode, EncodingKey, Header};
use prospect_api::{
    app::{create_app, AppState},
    config::Config,
    jobs::ExportWorkerPool,
    services::{
        destinations::{CrmExecutor, Executors, FileExecutor, MailingExecutor},
        ExportRunner, ExportService,
    },
};
use serde_json::Value;
use shared::jwt::{Claims, JwtVerifier};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration_test_secret_0123456789";

/// A running application over in-memory doubles.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub crm: Arc<MockCrmClient>,
    pub mailing: Arc<MockMailingListClient>,
    pub artifacts: Arc<MemorySpreadsheetWriter>,
    pub owner: Uuid,
    pub token: String,
    workers: Option<ExportWorkerPool>,
}

/// Options for [`spawn_app_with`].
pub struct TestOptions {
    pub crm: MockCrmClient,
    pub mailing: MockMailingListClient,
    pub crm_batch_size: usize,
    pub queue_depth: usize,
    pub workers: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            crm: MockCrmClient::new(),
            mailing: MockMailingListClient::new(),
            crm_batch_size: 100,
            queue_depth: 16,
            workers: 2,
        }
    }
}

pub fn test_config() -> Config {
    Config::load_for_test(&[("jwt.secret", TEST_SECRET)]).expect("Failed to load test config")
}

pub fn spawn_app(companies: Vec<Company>) -> TestApp {
    spawn_app_with(companies, TestOptions::default())
}

pub fn spawn_app_with(companies: Vec<Company>, options: TestOptions) -> TestApp {
    let config = test_config();
    let store = Arc::new(InMemoryStore::with_companies(companies));
    let crm = Arc::new(options.crm);
    let mailing = Arc::new(options.mailing);
    let artifacts = Arc::new(MemorySpreadsheetWriter::new());

    let executors = Executors::new(
        Arc::new(FileExecutor::new(artifacts.clone())),
        Arc::new(CrmExecutor::new(crm.clone(), options.crm_batch_size)),
        Arc::new(MailingExecutor::new(mailing.clone())),
    );
    let runner = Arc::new(ExportRunner::new(
        store.clone(),
        store.clone(),
        store.clone(),
        executors,
        Duration::from_secs(config.export.destination_timeout_secs),
    ));
    let (queue, workers) = ExportWorkerPool::start(runner, options.workers, options.queue_depth);

    let jwt = JwtVerifier::from_secret(TEST_SECRET, config.jwt.leeway_secs)
        .expect("Failed to build verifier");
    let state = AppState {
        config: Arc::new(config),
        companies: store.clone(),
        filters: store.clone(),
        exports: ExportService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            artifacts.clone(),
            queue,
        ),
        jwt: Arc::new(jwt),
    };

    let owner = Uuid::new_v4();
    TestApp {
        router: create_app(state),
        store,
        crm,
        mailing,
        artifacts,
        owner,
        token: token_for(owner),
        workers: Some(workers),
    }
}

/// Signs an HS256 token for `user_id`.
pub fn token_for(user_id: Uuid) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to sign token")
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(get_request(uri, &self.token)).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.send(json_request(Method::POST, uri, body, &self.token))
            .await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> Response {
        self.send(json_request(Method::PUT, uri, body, &self.token))
            .await
    }

    pub async fn delete(&self, uri: &str) -> Response {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Submits an export and returns its job id.
    pub async fn submit_export(&self, destination: &str, body: Value) -> Uuid {
        let response = self
            .post_json(&format!("/empresas/exportar/{}", destination), body)
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = parse_response_body(response).await;
        body["exportacaoId"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("Response carries the job id")
    }

    /// Polls the status endpoint until the job is terminal.
    pub async fn wait_for_export(&self, id: Uuid) -> Value {
        for _ in 0..200 {
            let response = self.get(&format!("/exportacoes/{}/status", id)).await;
            assert_eq!(response.status(), StatusCode::OK);
            let status = parse_response_body(response).await;
            match status["status"].as_str() {
                Some("queued") | Some("processing") => {
                    tokio::time::sleep(Duration::from_millis(10)).await
                }
                _ => return status,
            }
        }
        panic!("Export {} did not finish", id);
    }

    /// Stops the export workers; later submissions are rejected.
    pub async fn stop_workers(&mut self) {
        if let Some(workers) = self.workers.take() {
            workers.shutdown(Duration::from_secs(5)).await;
        }
    }
}

pub fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: Value, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn parse_response_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub async fn response_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Company builder for registry fixtures.
pub struct TestCompany {
    company: Company,
}

impl TestCompany {
    pub fn new(key: &str) -> Self {
        Self {
            company: Company {
                registration_key: key.to_string(),
                legal_name: CompanyName().fake::<String>().to_uppercase(),
                legal_nature: Some("2062".to_string()),
                size_code: Some("03".to_string()),
                share_capital: Some(50_000.0),
                active: true,
                email: None,
                landline: None,
                mobile: None,
                sent_to_crm: false,
                sent_to_mailing: false,
                establishments: Vec::new(),
                partners: Vec::new(),
                tax_regime: None,
            },
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.company.legal_name = name.to_string();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.company.active = false;
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.company.email = Some(email.to_string());
        self
    }

    pub fn mobile(mut self, mobile: &str) -> Self {
        self.company.mobile = Some(mobile.to_string());
        self
    }

    /// Adds the head office establishment in `state`.
    pub fn located_in(mut self, state: &str, municipality: &str) -> Self {
        let order = self.company.establishments.len() + 1;
        self.company.establishments.push(Establishment {
            cnpj: format!("{}{:04}00", self.company.registration_key, order),
            head_office: order == 1,
            trade_name: Some(format!("Fantasia {}", self.company.registration_key)),
            registration_status: Some("02".to_string()),
            state: Some(state.to_string()),
            municipality: Some(municipality.to_string()),
            primary_activity: Some("6201501".to_string()),
            primary_activity_description: None,
            opened_on: NaiveDate::from_ymd_opt(2015, 3, 10),
        });
        self
    }

    pub fn with_partner(mut self, name: &str) -> Self {
        self.company.partners.push(Partner {
            name: name.to_string(),
            document: Some("***123456**".to_string()),
            qualification: Some("49".to_string()),
            joined_on: NaiveDate::from_ymd_opt(2015, 3, 10),
        });
        self
    }

    pub fn simples(mut self) -> Self {
        self.company.tax_regime = Some(TaxRegime {
            simples_option: true,
            simples_since: NaiveDate::from_ymd_opt(2016, 1, 1),
            mei_option: false,
            mei_since: None,
        });
        self
    }

    pub fn build(self) -> Company {
        self.company
    }
}

/// `count` active companies keyed `00000001..`, each with an email.
pub fn registry(count: usize) -> Vec<Company> {
    (1..=count)
        .map(|i| {
            TestCompany::new(&format!("{:08}", i))
                .email(&format!("contato{}@empresa.com.br", i))
                .located_in("SP", "7107")
                .build()
        })
        .collect()
}
