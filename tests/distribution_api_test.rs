mod common;

use axum::http::StatusCode;
use serde_json::json;
use tokio_test::assert_ok;

use common::{setup, setup_with, test_config};

#[tokio::test]
async fn only_active_templates_can_be_distributed() {
    let app = setup().await;
    let template = app
        .create_template(json!([{ "text": "How are you?", "type": "FREE_TEXT" }]))
        .await;
    let id = template["id"].as_str().unwrap();

    let (status, body) = app
        .call("POST", &format!("/api/templates/{id}/distributions"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_state");

    let (status, _) = app
        .call(
            "POST",
            &format!("/api/templates/{}/distributions", uuid::Uuid::new_v4()),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.activate(id).await;
    let distribution = app.distribute(id, json!({ "title": "Grade 9 check-in" })).await;
    assert_eq!(distribution["status"], "open");
    assert_eq!(distribution["accepting"], true);
    let token = distribution["access_token"].as_str().unwrap();
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(
        distribution["share_path"],
        format!("/api/public/surveys/{token}").as_str()
    );
}

#[tokio::test]
async fn window_and_audience_are_validated() {
    let app = setup().await;
    let survey = app.open_survey().await;
    let uri = format!("/api/templates/{}/distributions", survey.template_id);
    let now = chrono::Utc::now();

    let (status, body) = app
        .call(
            "POST",
            &uri,
            Some(json!({ "opens_at": now, "closes_at": now - chrono::Duration::hours(1) })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["violations"][0]["field"], "closes_at");

    let (status, body) = app
        .call(
            "POST",
            &uri,
            Some(json!({ "scope": { "kind": "students", "student_ids": [] } })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["violations"][0]["field"], "scope.student_ids");
}

#[tokio::test]
async fn every_distribution_gets_its_own_link() {
    let app = setup().await;
    let survey = app.open_survey().await;
    let second = app.distribute(&survey.template_id, json!({})).await;
    assert_ne!(second["access_token"].as_str().unwrap(), survey.token);

    let (status, by_template) = app
        .call("GET", &format!("/api/templates/{}/distributions", survey.template_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_template["items"].as_array().unwrap().len(), 2);

    app.call("POST", &format!("/api/distributions/{}/close", survey.distribution_id), None)
        .await;
    let (_, open) = app.call("GET", "/api/distributions?status=open", None).await;
    let open_ids: Vec<&str> = open["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(open_ids, vec![second["id"].as_str().unwrap()]);
}

#[tokio::test]
async fn sweeper_closes_lapsed_windows() {
    let app = setup().await;
    let survey = app.open_survey().await;
    let now = chrono::Utc::now();
    let short = app
        .distribute(
            &survey.template_id,
            json!({
                "opens_at": now - chrono::Duration::hours(2),
                "closes_at": now + chrono::Duration::seconds(30)
            }),
        )
        .await;

    let closed = assert_ok!(
        app.state
            .distribution_service
            .close_expired(now + chrono::Duration::minutes(5))
            .await
    );
    assert_eq!(closed, 1);

    let (_, fetched) = app
        .call("GET", &format!("/api/distributions/{}", short["id"].as_str().unwrap()), None)
        .await;
    assert_eq!(fetched["status"], "closed");
    let (_, untouched) = app
        .call("GET", &format!("/api/distributions/{}", survey.distribution_id), None)
        .await;
    assert_eq!(untouched["status"], "open");
}

#[tokio::test]
async fn oversized_token_length_still_yields_reachable_links() {
    let mut config = test_config();
    config.access_token_length = 200;
    let app = setup_with(config).await;
    let survey = app.open_survey().await;
    assert_eq!(survey.token.len(), 128);

    let (status, body) = app
        .public("GET", &format!("/api/public/surveys/{}", survey.token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["distribution"]["accepting"], true);
}
