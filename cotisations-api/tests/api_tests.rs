/// Integration tests for the HTTP API
///
/// Every test runs the full router (tracing, CORS, security headers) over
/// its own seeded SQLite database.

#[allow(dead_code)]
mod common;

use axum::http::StatusCode;
use common::TestContext;
use serde_json::json;

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["schema_version"], 2);
}

#[tokio::test]
async fn test_seeded_reference_data() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.get("/v1/collections/cantons").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);

    let names: Vec<&str> = body["documents"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["nom"].as_str())
        .collect();
    assert!(names.contains(&"Golfe"));

    let (_, body) = ctx.get("/v1/collections/types_cotisation").await;
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_document_lifecycle() {
    let ctx = TestContext::new().await.unwrap();
    let golfe = ctx.canton_id("Golfe").await;

    // Create
    let (status, created) = ctx
        .post(
            "/v1/collections/villages",
            json!({ "nom": "Bè", "canton_id": golfe, "population": 1200, "chef": "Togbui Ayi" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["nom"], "Bè");
    assert_eq!(created["chef"], "Togbui Ayi");
    assert!(created["date_creation"].is_string());

    // Read
    let (status, fetched) = ctx.get(&format!("/v1/collections/villages/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    // Update
    let (status, updated) = ctx
        .put(
            &format!("/v1/collections/villages/{}", id),
            json!({ "nom": "Bè Kpota", "canton_id": golfe }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["nom"], "Bè Kpota");
    assert_eq!(updated["date_creation"], created["date_creation"]);
    assert!(updated["date_modification"].as_str().unwrap() > created["date_modification"].as_str().unwrap());

    // Search
    let (status, found) = ctx
        .post("/v1/collections/villages/search", json!({ "nom": "kpota" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["total"], 1);

    // Delete
    let (status, _) = ctx.delete(&format!("/v1/collections/villages/{}", id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = ctx.get(&format!("/v1/collections/villages/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_document_errors() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _) = ctx.get("/v1/collections/inconnue").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = ctx.get("/v1/collections/cantons/golfe").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "id");

    let (status, _) = ctx.delete("/v1/collections/cotisants/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.put("/v1/collections/cotisants/999", json!({ "nom": "Personne" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = ctx.post("/v1/collections/cantons", json!(["pas", "un", "objet"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
}

#[tokio::test]
async fn test_incomplete_member_is_refused_and_rankings_still_answer() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.post("/v1/collections/cotisants", json!({ "nom": "Ayivi" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert!(body["message"].as_str().unwrap().contains("prenom"), "{}", body);

    let (status, body) = ctx.post("/v1/collections/villages", json!({ "nom": "Bè" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = ctx.get("/v1/rankings/cantons").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["classement"].as_array().unwrap().len(), 4);

    let (status, _) = ctx.get("/v1/collections/villages").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_canton_name_conflicts() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.post("/v1/collections/cantons", json!({ "nom": "Golfe" })).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    // Village names are not unique
    let golfe = ctx.canton_id("Golfe").await;
    let kloto = ctx.canton_id("Kloto").await;
    ctx.village_with_quarter(golfe, "Agbavi", "Centre").await;
    ctx.village_with_quarter(kloto, "Agbavi", "Centre").await;
}

#[tokio::test]
async fn test_settings() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _) = ctx.get("/v1/settings/devise").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = ctx.put("/v1/settings/devise", json!({ "valeur": "CFA" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "cle": "devise", "valeur": "CFA" }));

    let (status, _) = ctx.put("/v1/settings/devise", json!({ "valeur": { "code": "XOF" } })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = ctx.get("/v1/settings/devise").await;
    assert_eq!(body["valeur"]["code"], "XOF");

    let (status, _) = ctx.delete("/v1/settings/devise").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.delete("/v1/settings/devise").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_golfe_ranking_scenario() {
    let ctx = TestContext::new().await.unwrap();
    let golfe = ctx.canton_id("Golfe").await;
    let (be, quarter) = ctx.village_with_quarter(golfe, "Bè", "Bè Kpota").await;

    let (status, body) = ctx
        .post(
            "/v1/collections/cotisants",
            json!({
                "nom": "Agbodjan",
                "prenom": "Kossi",
                "canton_id": golfe,
                "village_id": be,
                "quartier_id": quarter,
                "montant_cotisation": 5000,
                "statut": "actif"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, body) = ctx.get("/v1/rankings/cantons").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["critere"], "montant_cotise");
    assert_eq!(body["ordre"], "desc");

    let first = &body["classement"][0];
    assert_eq!(first["rang"], 1);
    assert_eq!(first["entite"]["nom"], "Golfe");
    assert_eq!(first["statistiques"]["montant_total"], 5000.0);
    assert_eq!(first["statistiques"]["nombre_cotisants"], 1);
    assert_eq!(first["statistiques"]["taux_participation"], 100.0);

    // Cantons without members are still listed
    let entries = body["classement"].as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[3]["statistiques"]["montant_total"], 0.0);
    assert_eq!(entries[3]["rang"], 4);

    let (status, body) = ctx.get(&format!("/v1/rankings/cantons/{}/villages", golfe)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classement"][0]["entite"]["nom"], "Bè");

    let (status, body) = ctx.get(&format!("/v1/rankings/villages/{}/quartiers", be)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classement"][0]["statistiques"]["montant_total"], 5000.0);
}

#[tokio::test]
async fn test_ranking_parameters() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.get("/v1/rankings/cantons?critere=nombre_cotisants&ordre=asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["critere"], "nombre_cotisants");
    assert_eq!(body["ordre"], "asc");

    let (status, body) = ctx.get("/v1/rankings/cantons?critere=popularite").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "critere");

    let (status, _) = ctx.get("/v1/rankings/cantons/999/villages").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_confirmed_payments_amount_source() {
    let ctx = TestContext::with_env(&[("RANKING_AMOUNT_SOURCE", "confirmed_payments")])
        .await
        .unwrap();
    let golfe = ctx.canton_id("Golfe").await;
    let (be, quarter) = ctx.village_with_quarter(golfe, "Bè", "Bè Kpota").await;

    let (_, member) = ctx
        .post(
            "/v1/collections/cotisants",
            json!({ "nom": "Amegah", "prenom": "Yao", "village_id": be, "quartier_id": quarter, "montant_cotisation": 5000 }),
        )
        .await;
    let member_id = member["id"].as_i64().unwrap();

    for (amount, status) in [(1500, "confirme"), (900, "en_attente")] {
        let (code, body) = ctx
            .post(
                "/v1/collections/paiements",
                json!({
                    "cotisant_id": member_id,
                    "montant": amount,
                    "date_paiement": "2025-03-01",
                    "mode_paiement": "especes",
                    "statut": status
                }),
            )
            .await;
        assert_eq!(code, StatusCode::CREATED, "{}", body);
    }

    let (_, body) = ctx.get("/v1/rankings/cantons").await;
    assert_eq!(body["source_montants"], "confirmed_payments");
    assert_eq!(body["classement"][0]["statistiques"]["montant_total"], 1500.0);
    assert_eq!(body["classement"][0]["statistiques"]["nombre_paiements"], 2);
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    let ctx = TestContext::new().await.unwrap();
    let golfe = ctx.canton_id("Golfe").await;
    let (be, _) = ctx.village_with_quarter(golfe, "Bè", "Bè Kpota").await;

    let (status, snapshot) = ctx.get("/v1/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    assert!(snapshot["exportDate"].is_string());
    assert_eq!(snapshot["collections"]["villages"].as_array().unwrap().len(), 1);

    ctx.delete(&format!("/v1/collections/villages/{}", be)).await;
    ctx.post("/v1/collections/cantons", json!({ "nom": "Zio" })).await;

    let (status, report) = ctx.post("/v1/snapshot", snapshot.clone()).await;
    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["imported"]["villages"], 1);
    assert_eq!(report["imported"]["cantons"], 4);

    let (_, restored) = ctx.get("/v1/snapshot").await;
    assert_eq!(restored["collections"], snapshot["collections"]);
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let ctx = TestContext::new().await.unwrap();

    let response = {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        ctx.app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap()
    };

    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-store");
}
