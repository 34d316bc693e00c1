//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tandem_core::db::Database;
use tower::ServiceExt;

fn setup_test_app() -> (Router, Database) {
    let db = Database::in_memory().unwrap();
    let app = create_router(db.clone(), Config::for_tests(), AIClient::mock());
    (app, db)
}

/// App whose mock model returns a fixed response
fn setup_test_app_with_ai(response: &str) -> (Router, Database) {
    let db = Database::in_memory().unwrap();
    let app = create_router(
        db.clone(),
        Config::for_tests(),
        AIClient::mock_with_response(response),
    );
    (app, db)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

// ========== Health and Auth ==========

#[tokio::test]
async fn test_health() {
    let (app, _db) = setup_test_app();

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_register_and_me() {
    let (app, _db) = setup_test_app();

    let body = serde_json::json!({ "email": "Alice@Example.com", "name": "Alice" });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/register", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    // email is normalized
    assert_eq!(json["email"], "alice@example.com");
    assert_eq!(json["name"], "Alice");
    let user_id = json["id"].as_i64().unwrap();
    // refresh token never leaves the server
    assert!(json.get("gmail_refresh_token").is_none());

    let response = app
        .oneshot(get(&format!("/api/auth/me?user_id={}", user_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["email"], "alice@example.com");
}

#[tokio::test]
async fn test_register_rejects_bad_email() {
    let (app, _db) = setup_test_app();

    let body = serde_json::json!({ "email": "not-an-email" });
    let response = app
        .oneshot(json_request("POST", "/api/auth/register", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_google_login_returns_consent_url() {
    let (app, db) = setup_test_app();
    let profile = db.upsert_profile("a@example.com", None).unwrap();

    let response = app
        .oneshot(get(&format!("/api/auth/google/login?user_id={}", profile.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let url = json["auth_url"].as_str().unwrap();
    assert!(url.starts_with("https://accounts.google.com/"));
    assert!(url.contains(&format!("state={}", profile.id)));
}

#[tokio::test]
async fn test_google_callback_redirects_on_error() {
    let (app, _db) = setup_test_app();

    let response = app
        .oneshot(get("/api/auth/google/callback?error=access_denied"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.ends_with("/settings?gmail=error"));
}

// ========== Expense API ==========

#[tokio::test]
async fn test_expense_crud_over_http() {
    let (app, db) = setup_test_app();
    let profile = db.upsert_profile("a@example.com", None).unwrap();

    let body = serde_json::json!({
        "amount": 12.5,
        "description": "Lunch",
        "category": "Food & Dining"
    });
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/expenses?user_id={}", profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["amount"], 12.5);
    assert_eq!(json["category"], "Food & Dining");
    let expense_id = json["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/expenses?user_id={}", profile.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let body = serde_json::json!({ "amount": 15.0 });
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/expenses/{}?user_id={}", expense_id, profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["amount"], 15.0);
    assert_eq!(json["description"], "Lunch");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/expenses/{}?user_id={}", expense_id, profile.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!(
            "/api/expenses/{}?user_id={}",
            expense_id, profile.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_without_category_asks_the_model() {
    let (app, db) = setup_test_app_with_ai("Groceries");
    let profile = db.upsert_profile("a@example.com", None).unwrap();

    let body = serde_json::json!({ "amount": 42.0, "description": "Whole Foods run" });
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/expenses?user_id={}", profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Groceries");
}

#[tokio::test]
async fn test_expense_validation() {
    let (app, db) = setup_test_app();
    let profile = db.upsert_profile("a@example.com", None).unwrap();

    let body = serde_json::json!({ "amount": -5.0, "description": "Bad" });
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/expenses?user_id={}", profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = serde_json::json!({ "amount": 5.0, "description": "x", "category": "Nope" });
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/expenses?user_id={}", profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get(&format!(
            "/api/expenses?user_id={}&limit=9999",
            profile.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expenses_are_isolated_between_strangers() {
    let (app, db) = setup_test_app();
    let alice = db.upsert_profile("a@example.com", None).unwrap();
    let bob = db.upsert_profile("b@example.com", None).unwrap();

    let expense = db
        .create_expense(
            alice.id,
            &tandem_core::models::NewExpense {
                amount: 10.0,
                description: "Secret".to_string(),
                category: None,
                merchant: None,
                date: None,
                source: Default::default(),
                email_id: None,
            },
            None,
        )
        .unwrap();

    // Bob can't read Alice's expense
    let response = app
        .clone()
        .oneshot(get(&format!("/api/expenses/{}?user_id={}", expense.id, bob.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Deleting it looks like a missing row to him
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/expenses/{}?user_id={}", expense.id, bob.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // And his listing doesn't include it
    let response = app
        .oneshot(get(&format!("/api/expenses?user_id={}", bob.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_partner_sees_shared_expenses() {
    let (app, db) = setup_test_app();
    let alice = db.upsert_profile("a@example.com", None).unwrap();
    let bob = db.upsert_profile("b@example.com", None).unwrap();
    let invite = db.create_invite(alice.id, "b@example.com").unwrap();
    db.accept_invite(bob.id, invite.id).unwrap();

    db.create_expense(
        alice.id,
        &tandem_core::models::NewExpense {
            amount: 10.0,
            description: "Shared".to_string(),
            category: None,
            merchant: None,
            date: None,
            source: Default::default(),
            email_id: None,
        },
        None,
    )
    .unwrap();

    // Without include_partner Bob sees nothing
    let response = app
        .clone()
        .oneshot(get(&format!("/api/expenses?user_id={}", bob.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json.as_array().unwrap().is_empty());

    // With include_partner he sees Alice's expense
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/expenses?user_id={}&include_partner=true",
            bob.id
        )))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let expense_id = json[0]["id"].as_i64().unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);

    // He can read it directly, but mutations stay with the owner
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/expenses/{}?user_id={}",
            expense_id, bob.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/expenses/{}?user_id={}", expense_id, bob.id),
            serde_json::json!({ "amount": 1.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/expenses/{}?user_id={}", expense_id, bob.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expense_stats_endpoint() {
    let (app, db) = setup_test_app();
    let profile = db.upsert_profile("a@example.com", None).unwrap();
    let category_id = db
        .category_id_by_name(profile.id, "Groceries")
        .unwrap()
        .unwrap();
    db.create_expense(
        profile.id,
        &tandem_core::models::NewExpense {
            amount: 30.0,
            description: "Food".to_string(),
            category: None,
            merchant: None,
            date: None,
            source: Default::default(),
            email_id: None,
        },
        Some(category_id),
    )
    .unwrap();

    let response = app
        .oneshot(get(&format!("/api/expenses/stats?user_id={}", profile.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["total_spent"], 30.0);
    assert_eq!(json["top_categories"][0]["name"], "Groceries");
    assert_eq!(json["recent_expenses"].as_array().unwrap().len(), 1);
    assert_eq!(json["monthly_trend"].as_array().unwrap().len(), 6);
}

// ========== Category API ==========

#[tokio::test]
async fn test_category_endpoints() {
    let (app, db) = setup_test_app();
    let profile = db.upsert_profile("a@example.com", None).unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/categories?user_id={}", profile.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 10);

    let body = serde_json::json!({ "name": "Coffee", "color": "#112233" });
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/categories?user_id={}", profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let category_id = json["id"].as_i64().unwrap();

    // Duplicate is a conflict
    let body = serde_json::json!({ "name": "Coffee" });
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/categories?user_id={}", profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = serde_json::json!({ "color": "#445566" });
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/categories/{}?user_id={}", category_id, profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["color"], "#445566");

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!(
                    "/api/categories/{}?user_id={}",
                    category_id, profile.id
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_shared_category_cannot_be_deleted_over_http() {
    let (app, db) = setup_test_app();
    let profile = db.upsert_profile("a@example.com", None).unwrap();
    let shared_id = db
        .category_id_by_name(profile.id, "Groceries")
        .unwrap()
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/categories/{}?user_id={}", shared_id, profile.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ========== Partner API ==========

#[tokio::test]
async fn test_partner_invite_flow_over_http() {
    let (app, db) = setup_test_app();
    let alice = db.upsert_profile("a@example.com", Some("Alice")).unwrap();
    let bob = db.upsert_profile("b@example.com", None).unwrap();

    let body = serde_json::json!({ "email": "B@example.com" });
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/partners/invite?user_id={}", alice.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "pending");
    let invite_id = json["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/partners/invites?user_id={}", bob.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["received"].as_array().unwrap().len(), 1);
    assert_eq!(json["received"][0]["inviter_name"], "Alice");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/partners/invites/{}/accept?user_id={}", invite_id, bob.id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/partners/me?user_id={}", alice.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["email"], "b@example.com");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/partners/link?user_id={}", bob.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/partners/me?user_id={}", alice.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json.is_null());
}

#[tokio::test]
async fn test_accept_foreign_invite_is_forbidden() {
    let (app, db) = setup_test_app();
    let alice = db.upsert_profile("a@example.com", None).unwrap();
    db.upsert_profile("b@example.com", None).unwrap();
    let carol = db.upsert_profile("c@example.com", None).unwrap();
    let invite = db.create_invite(alice.id, "b@example.com").unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/partners/invites/{}/accept?user_id={}", invite.id, carol.id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ========== Gmail API ==========

#[tokio::test]
async fn test_gmail_status_and_disconnect() {
    let (app, db) = setup_test_app();
    let profile = db.upsert_profile("a@example.com", None).unwrap();
    db.set_gmail_credentials(profile.id, "token").unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/gmail/status?user_id={}", profile.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["connected"], true);
    assert_eq!(json["label"], "Expenses");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/gmail/disconnect?user_id={}", profile.id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/gmail/status?user_id={}", profile.id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["connected"], false);
}

#[tokio::test]
async fn test_gmail_sync_requires_connection() {
    let (app, db) = setup_test_app();
    let profile = db.upsert_profile("a@example.com", None).unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/gmail/sync?user_id={}", profile.id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_gmail_errors_keep_their_text() {
    let err = AppError::from(tandem_core::Error::Mail("label list failed".to_string()));
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(err.message.contains("label list failed"));
}

// ========== Analysis API ==========

#[tokio::test]
async fn test_analysis_uses_model_response() {
    let (app, db) = setup_test_app_with_ai(
        "SUMMARY: Mostly groceries.\n\
         INSIGHTS:\n\
         - Grocery spending is steady.\n\
         RECOMMENDATIONS:\n\
         - Consider meal planning.",
    );
    let profile = db.upsert_profile("a@example.com", None).unwrap();
    let category_id = db
        .category_id_by_name(profile.id, "Groceries")
        .unwrap()
        .unwrap();
    db.create_expense(
        profile.id,
        &tandem_core::models::NewExpense {
            amount: 80.0,
            description: "Food".to_string(),
            category: None,
            merchant: None,
            date: None,
            source: Default::default(),
            email_id: None,
        },
        Some(category_id),
    )
    .unwrap();

    let body = serde_json::json!({ "timeframe": "month" });
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/analysis?user_id={}", profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["summary"], "Mostly groceries.");
    assert_eq!(json["insights"][0], "Grocery spending is steady.");
    assert_eq!(json["spending_by_category"]["Groceries"], 80.0);
    // one spending week, one trend bucket
    assert_eq!(json["trends"].as_array().unwrap().len(), 1);
    assert_eq!(json["trends"][0]["amount"], 80.0);
}

#[tokio::test]
async fn test_analysis_falls_back_on_unusable_response() {
    let (app, db) = setup_test_app_with_ai("");
    let profile = db.upsert_profile("a@example.com", None).unwrap();

    let body = serde_json::json!({ "timeframe": "week" });
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/analysis?user_id={}", profile.id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    // fallback still returns a complete report
    assert!(json["summary"].as_str().unwrap().contains("week"));
    assert!(!json["insights"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_categorize_endpoint_validates_label() {
    let (app, _db) = setup_test_app_with_ai("Groceries");
    let body = serde_json::json!({ "description": "Whole Foods run" });
    let response = app
        .oneshot(json_request("POST", "/api/analysis/categorize", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Groceries");

    // An off-list suggestion collapses to Other
    let (app, _db) = setup_test_app_with_ai("Cryptocurrency");
    let body = serde_json::json!({ "description": "Something odd" });
    let response = app
        .oneshot(json_request("POST", "/api/analysis/categorize", body))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["category"], "Other");
}

#[tokio::test]
async fn test_comparison_requires_partner() {
    let (app, db) = setup_test_app();
    let profile = db.upsert_profile("a@example.com", None).unwrap();

    let response = app
        .oneshot(get(&format!(
            "/api/analysis/comparison?user_id={}",
            profile.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_comparison_splits_totals() {
    let (app, db) = setup_test_app();
    let alice = db.upsert_profile("a@example.com", None).unwrap();
    let bob = db.upsert_profile("b@example.com", None).unwrap();
    let invite = db.create_invite(alice.id, "b@example.com").unwrap();
    db.accept_invite(bob.id, invite.id).unwrap();

    for (user_id, amount) in [(alice.id, 75.0), (bob.id, 25.0)] {
        db.create_expense(
            user_id,
            &tandem_core::models::NewExpense {
                amount,
                description: "x".to_string(),
                category: None,
                merchant: None,
                date: None,
                source: Default::default(),
                email_id: None,
            },
            None,
        )
        .unwrap();
    }

    let response = app
        .oneshot(get(&format!(
            "/api/analysis/comparison?user_id={}",
            alice.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["user"]["total"], 75.0);
    assert_eq!(json["partner"]["total"], 25.0);
    assert_eq!(json["user"]["percentage"], 75.0);
    assert_eq!(json["combined"]["total"], 100.0);
}
