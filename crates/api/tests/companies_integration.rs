//! Integration tests for company search and detail endpoints.

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{parse_response_body, registry, spawn_app, TestCompany};

#[tokio::test]
async fn test_search_requires_token() {
    let app = spawn_app(registry(2));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/empresas")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(common::get_request("/empresas", "not-a-token"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app(Vec::new());

    for uri in ["/api/health", "/api/health/live", "/api/health/ready"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}

#[tokio::test]
async fn test_search_pages_with_totals_and_statistics() {
    let app = spawn_app(registry(30));

    let response = app.get("/empresas?page=2&limit=10").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0]["registrationKey"], "00000011");
    assert_eq!(body["total"], 30);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["currentPage"], 2);
    assert_eq!(body["statistics"]["totalCompanies"], 30);
    assert_eq!(body["statistics"]["activeWithEmail"], 30);
}

#[tokio::test]
async fn test_statistics_total_follows_filter() {
    let mut companies = registry(12);
    companies.push(TestCompany::new("00000099").located_in("MG", "4123").build());
    companies.push(TestCompany::new("00000098").located_in("MG", "4123").build());
    let app = spawn_app(companies);

    let body = parse_response_body(app.get("/empresas?uf=MG&limit=1").await).await;
    assert_eq!(body["records"].as_array().unwrap().len(), 1);
    assert_eq!(body["total"], 2);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["statistics"]["totalCompanies"], 2);
    assert_eq!(body["statistics"]["activeCompanies"], 14);
}

#[tokio::test]
async fn test_search_past_last_page_is_empty() {
    let app = spawn_app(registry(5));

    let body = parse_response_body(app.get("/empresas?page=4&limit=2").await).await;
    assert!(body["records"].as_array().unwrap().is_empty());
    assert_eq!(body["total"], 5);
    assert_eq!(body["totalPages"], 3);
}

#[tokio::test]
async fn test_active_with_email_filter() {
    let app = spawn_app(vec![
        TestCompany::new("00000001")
            .email("a@empresa.com.br")
            .build(),
        TestCompany::new("00000002").build(),
        TestCompany::new("00000003")
            .email("c@empresa.com.br")
            .inactive()
            .build(),
        TestCompany::new("00000004").email("   ").build(),
    ]);

    let body = parse_response_body(app.get("/empresas?ativa=true&temEmail=true").await).await;
    let keys: Vec<&str> = body["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["registrationKey"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["00000001"]);
    assert_eq!(body["total"], 1);

    assert_eq!(body["statistics"]["totalCompanies"], 1);
    assert_eq!(body["statistics"]["activeCompanies"], 3);
    assert_eq!(body["statistics"]["activeWithEmail"], 1);
}

#[tokio::test]
async fn test_false_flag_imposes_no_constraint() {
    let app = spawn_app(vec![
        TestCompany::new("00000001").mobile("11999990000").build(),
        TestCompany::new("00000002").build(),
    ]);

    let body = parse_response_body(app.get("/empresas?temCelular=false").await).await;
    assert_eq!(body["total"], 2);

    let body = parse_response_body(app.get("/empresas?temCelular=true").await).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_establishment_filters() {
    let app = spawn_app(vec![
        TestCompany::new("00000001").located_in("SP", "7107").build(),
        TestCompany::new("00000002").located_in("RJ", "6001").build(),
        TestCompany::new("00000003")
            .located_in("MG", "4123")
            .located_in("SP", "7107")
            .build(),
    ]);

    let body = parse_response_body(app.get("/empresas?uf=sp").await).await;
    assert_eq!(body["total"], 2);

    let body = parse_response_body(app.get("/empresas?uf=RJ&municipio=6001").await).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["records"][0]["registrationKey"], "00000002");
}

#[tokio::test]
async fn test_invalid_filters_are_rejected() {
    let app = spawn_app(registry(1));

    let response = app.get("/empresas?uf=SPX").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");

    let response = app.get("/empresas?cnpj=123").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/empresas?temEmail=talvez").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/empresas?page=abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_company_detail() {
    let app = spawn_app(vec![TestCompany::new("12345678")
        .named("ACME COMERCIO LTDA")
        .located_in("SP", "7107")
        .with_partner("MARIA DA SILVA")
        .simples()
        .build()]);

    let response = app.get("/empresas/12345678").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_response_body(response).await;
    assert_eq!(body["legalName"], "ACME COMERCIO LTDA");
    assert_eq!(body["establishments"][0]["state"], "SP");
    assert_eq!(body["partners"][0]["name"], "MARIA DA SILVA");
    assert_eq!(body["taxRegime"]["simplesOption"], true);
    assert!(body["establishments"][0]
        .get("primaryActivityDescription")
        .is_none());
}

#[tokio::test]
async fn test_company_detail_describes_primary_activity() {
    let app = spawn_app(vec![TestCompany::new("12345678")
        .located_in("SP", "7107")
        .build()]);
    app.store.insert_cnae(
        "6201501",
        "Desenvolvimento de programas de computador sob encomenda",
    );

    let body = parse_response_body(app.get("/empresas/12345678").await).await;
    let establishment = &body["establishments"][0];
    assert_eq!(establishment["primaryActivity"], "6201501");
    assert_eq!(
        establishment["primaryActivityDescription"],
        "Desenvolvimento de programas de computador sob encomenda"
    );
}

#[tokio::test]
async fn test_cnae_lookups() {
    let app = spawn_app(Vec::new());
    app.store.insert_cnae("4711302", "Comércio varejista de mercadorias em geral");
    app.store.insert_cnae("1091102", "Fabricação de produtos de padaria e confeitaria");

    let response = app.get("/cnaes/4711302").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["code"], "4711302");
    assert_eq!(body["description"], "Comércio varejista de mercadorias em geral");

    let response = app.get("/cnaes/0000000").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body =
        parse_response_body(app.get("/cnaes?codigos=4711302,0000000,1091102").await).await;
    let codes: Vec<&str> = body["cnaes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["1091102", "4711302"]);

    let response = app.get("/cnaes").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_company_is_not_found() {
    let app = spawn_app(registry(1));

    let response = app.get("/empresas/99999999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "not_found");
}
