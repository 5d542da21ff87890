#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

use survey_backend::config::Config;
use survey_backend::database::pool::{connect, run_migrations, DbPool};
use survey_backend::middleware::auth::Claims;
use survey_backend::{routes, AppState};

pub const JWT_SECRET: &str = "test_secret_key";

pub fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: "sqlite::memory:".into(),
        database_max_connections: 1,
        jwt_secret: JWT_SECRET.into(),
        counselor_rps: 1000,
        public_rps: 1000,
        access_token_length: 32,
        analytics_cache_ttl_seconds: 300,
        sweep_interval_seconds: 60,
    }
}

pub fn bearer(role: &str) -> String {
    let claims = Claims {
        sub: "counselor-1".into(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        role: Some(role.into()),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("sign token");
    format!("Bearer {}", token)
}

pub struct TestApp {
    pub app: Router,
    pub pool: DbPool,
    pub state: AppState,
    auth: String,
}

pub async fn setup() -> TestApp {
    setup_with(test_config()).await
}

pub async fn setup_with(config: Config) -> TestApp {
    let pool = connect(&config.database_url, config.database_max_connections)
        .await
        .expect("pool");
    run_migrations(&pool).await.expect("migrations");
    let state = AppState::new(pool.clone(), &config);
    let app = routes::router(state.clone(), &config);
    TestApp {
        app,
        pool,
        state,
        auth: bearer("counselor"),
    }
}

pub async fn read_json(resp: Response) -> JsonValue {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("body");
    if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    }
}

impl TestApp {
    pub async fn raw(&self, req: Request<Body>) -> Response {
        self.app.clone().oneshot(req).await.expect("oneshot")
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<JsonValue>,
        auth: Option<&str>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        let resp = self.raw(req).await;
        let status = resp.status();
        (status, read_json(resp).await)
    }

    /// Authenticated counselor call.
    pub async fn call(&self, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
        self.send(method, uri, body, Some(&self.auth)).await
    }

    /// Unauthenticated call, as a student's browser would make it.
    pub async fn public(&self, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
        self.send(method, uri, body, None).await
    }

    pub async fn call_as(&self, auth: &str, method: &str, uri: &str) -> (StatusCode, JsonValue) {
        self.send(method, uri, None, Some(auth)).await
    }

    pub async fn create_template(&self, questions: JsonValue) -> JsonValue {
        let (status, body) = self
            .call(
                "POST",
                "/api/templates",
                Some(json!({
                    "title": "Weekly wellbeing check-in",
                    "description": "Short pulse survey",
                    "questions": questions,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    pub async fn activate(&self, template_id: &str) {
        let (status, body) = self
            .call(
                "PATCH",
                &format!("/api/templates/{template_id}"),
                Some(json!({ "status": "active" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    pub async fn distribute(&self, template_id: &str, payload: JsonValue) -> JsonValue {
        let (status, body) = self
            .call(
                "POST",
                &format!("/api/templates/{template_id}/distributions"),
                Some(payload),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    /// Active template with the standard question set and an open distribution.
    pub async fn open_survey(&self) -> Survey {
        let template = self.create_template(standard_questions()).await;
        let template_id = template["id"].as_str().expect("template id").to_string();
        self.activate(&template_id).await;
        let distribution = self.distribute(&template_id, json!({})).await;
        Survey {
            template_id,
            question_ids: template["question_ids"]
                .as_array()
                .expect("question ids")
                .iter()
                .map(|id| id.as_str().expect("id").to_string())
                .collect(),
            distribution_id: distribution["id"].as_str().expect("distribution id").to_string(),
            token: distribution["access_token"].as_str().expect("token").to_string(),
        }
    }

    pub async fn response_count(&self, distribution_id: &str) -> i64 {
        let (status, body) = self
            .call("GET", &format!("/api/distributions/{distribution_id}/responses"), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["total"].as_i64().expect("total")
    }
}

pub struct Survey {
    pub template_id: String,
    pub question_ids: Vec<String>,
    pub distribution_id: String,
    pub token: String,
}

impl Survey {
    /// A complete, valid answer set for [`standard_questions`].
    pub fn full_answers(&self) -> JsonValue {
        json!([
            { "question_id": self.question_ids[0], "value": "Good" },
            { "question_id": self.question_ids[1], "value": ["Sleep", "Friends"] },
            { "question_id": self.question_ids[2], "value": 4 },
            { "question_id": self.question_ids[3], "value": "Exams are stressful" },
        ])
    }
}

/// Required single choice, optional multiple choice, required 1..5 scale,
/// optional free text.
pub fn standard_questions() -> JsonValue {
    json!([
        {
            "text": "How are you feeling this week?",
            "required": true,
            "type": "SINGLE_CHOICE",
            "options": ["Good", "Okay", "Bad"]
        },
        {
            "text": "What is affecting your mood?",
            "type": "MULTIPLE_CHOICE",
            "options": ["Sleep", "Friends", "Schoolwork"],
            "validation": { "max_selections": 2 }
        },
        {
            "text": "Rate your stress level",
            "required": true,
            "type": "SCALE",
            "validation": { "min": 1, "max": 5 }
        },
        {
            "text": "Anything else you want to share?",
            "type": "FREE_TEXT",
            "validation": { "max_length": 500 }
        }
    ])
}
