use std::sync::Arc;

use axum::http::HeaderValue;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use careportal_api::app::{AppServices, build_app, services::default_directory};
use careportal_api::config::DEFAULT_CORS_ORIGIN;
use careportal_api::middleware::AuthState;
use careportal_api::store::InMemoryProviderStore;
use careportal_auth::VerifierConfig;
use careportal_core::{Role, SubjectId};
use careportal_directory::{DirectoryCall, DirectoryUser, Fault, InMemoryDirectory};

const SECRET: &str = "test-secret";
const ADMIN: &str = "Administrator";
const PROVIDER: &str = "Healthcare-Provider";
const PATIENT: &str = "Patient";

struct TestServer {
    base_url: String,
    directory: Arc<InMemoryDirectory>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(directory: InMemoryDirectory) -> Self {
        let directory = Arc::new(directory);
        let services = AppServices::new(directory.clone(), Arc::new(InMemoryProviderStore::new()));
        let app = build_app(
            AuthState::hs256(SECRET, VerifierConfig::default()),
            services,
            HeaderValue::from_static(DEFAULT_CORS_ORIGIN),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            directory,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn subject(s: &str) -> SubjectId {
    SubjectId::parse(s).unwrap()
}

fn user(sub: &str, given: &str, family: &str) -> DirectoryUser {
    DirectoryUser::new(subject(sub))
        .with_attribute("given_name", given)
        .with_attribute("family_name", family)
        .with_attribute("email", format!("{}@clinic.test", given.to_lowercase()))
}

/// A: admin (directory says {Patient}, token says {Administrator}); B: patient.
fn clinic() -> InMemoryDirectory {
    default_directory()
        .with_call_log()
        .with_user(user("user-a", "Ada", "Admin"), [Role::from(PATIENT)])
        .with_user(user("user-b", "Bea", "Patient"), [Role::from(PATIENT)])
        .with_user(user("dr-c", "Cy", "Doctor"), [Role::from(PROVIDER)])
}

fn mint(secret: &str, sub: &str, roles: &[&str], ttl: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = json!({
        "sub": sub,
        "roles": roles,
        "iat": now.timestamp(),
        "exp": (now + ttl).timestamp(),
    });
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn token(sub: &str, roles: &[&str]) -> String {
    mint(SECRET, sub, roles, ChronoDuration::minutes(10))
}

async fn change_roles(srv: &TestServer, bearer: &str, body: Value) -> (StatusCode, Value) {
    let res = reqwest::Client::new()
        .post(format!("{}/user-roles", srv.base_url))
        .bearer_auth(bearer)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn(clinic()).await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn browser_preflight_is_allowed_from_the_portal_origin_only() {
    let srv = TestServer::spawn(clinic()).await;
    let client = reqwest::Client::new();
    let preflight = |origin: &'static str| {
        client
            .request(reqwest::Method::OPTIONS, format!("{}/user-roles", srv.base_url))
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "authorization,content-type")
            .send()
    };

    let res = preflight(DEFAULT_CORS_ORIGIN).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let headers = res.headers();
    assert_eq!(headers["access-control-allow-origin"], DEFAULT_CORS_ORIGIN);
    let methods = headers["access-control-allow-methods"].to_str().unwrap();
    assert!(methods.contains("POST") && methods.contains("DELETE"), "{methods}");
    let allowed = headers["access-control-allow-headers"].to_str().unwrap().to_lowercase();
    assert!(allowed.contains("authorization") && allowed.contains("content-type"), "{allowed}");

    let res = preflight("http://evil.test").await.unwrap();
    assert!(res.headers().get("access-control-allow-origin").is_none());

    // preflights never reach the route guard or the directory
    assert!(srv.directory.calls().is_empty());

    let res = client
        .get(format!("{}/health", srv.base_url))
        .header("Origin", DEFAULT_CORS_ORIGIN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["access-control-allow-origin"], DEFAULT_CORS_ORIGIN);
}

#[tokio::test]
async fn missing_or_malformed_credentials_get_the_same_401() {
    let srv = TestServer::spawn(clinic()).await;
    let client = reqwest::Client::new();
    let good = token("user-a", &[ADMIN]);

    let mut tampered = good.clone();
    let sig_start = tampered.rfind('.').unwrap() + 1;
    let flipped = if &tampered[sig_start..sig_start + 1] == "A" { "B" } else { "A" };
    tampered.replace_range(sig_start..sig_start + 1, flipped);

    let cases = vec![
        None,
        Some("Token abc".to_string()),
        Some(format!("Bearer {tampered}")),
        Some(format!("Bearer {}", mint("other-secret", "user-a", &[ADMIN], ChronoDuration::minutes(10)))),
        Some(format!("Bearer {}", mint(SECRET, "user-a", &[ADMIN], ChronoDuration::minutes(-5)))),
    ];

    for header in cases {
        let mut req = client.get(format!("{}/whoami", srv.base_url));
        if let Some(h) = &header {
            req = req.header("Authorization", h);
        }
        let res = req.send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "header: {header:?}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body, json!({ "error": "not authorized" }));
    }

    assert!(srv.directory.calls().is_empty());
}

#[tokio::test]
async fn whoami_reflects_verified_claims() {
    let srv = TestServer::spawn(clinic()).await;
    let res = reqwest::Client::new()
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token("user-b", &[PATIENT]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["sub"], "user-b");
    assert_eq!(body["roles"], json!([PATIENT]));
}

#[tokio::test]
async fn admin_updates_own_roles_and_is_told_the_session_is_affected() {
    let srv = TestServer::spawn(clinic()).await;

    let (status, body) = change_roles(
        &srv,
        &token("user-a", &[ADMIN]),
        json!({ "adminUserId": "user-a", "targetUserId": "user-a", "newRoles": [ADMIN, PATIENT] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ok"], true);
    assert_eq!(body["sessionAffected"], true);
    assert_eq!(body["appliedRoles"], json!([ADMIN, PATIENT]));

    let roles = srv.directory.memberships(&subject("user-a")).unwrap();
    assert!(roles.contains_name(ADMIN) && roles.contains_name(PATIENT));
    assert_eq!(srv.directory.mutation_count(), 1);
}

#[tokio::test]
async fn changing_another_users_roles_does_not_affect_the_session() {
    let srv = TestServer::spawn(clinic()).await;

    let (status, body) = change_roles(
        &srv,
        &token("user-a", &[ADMIN]),
        json!({ "adminUserId": "user-a", "targetUserId": "user-b", "newRoles": [PROVIDER] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sessionAffected"], false);
    let calls: Vec<DirectoryCall> = srv.directory.calls().into_iter().filter(|c| c.is_mutation()).collect();
    assert_eq!(
        calls,
        vec![
            DirectoryCall::RemoveUserFromGroup(subject("user-b"), Role::from(PATIENT)),
            DirectoryCall::AddUserToGroup(subject("user-b"), Role::from(PROVIDER)),
        ]
    );
}

#[tokio::test]
async fn missing_fields_are_rejected_before_touching_the_directory() {
    let srv = TestServer::spawn(clinic()).await;
    let bearer = token("user-a", &[ADMIN]);

    for body in [
        json!({ "adminUserId": "user-a", "newRoles": [PATIENT] }),
        json!({ "adminUserId": "user-a", "targetUserId": "user-b" }),
        json!({ "adminUserId": "user-a", "targetUserId": "user-b", "newRoles": PATIENT }),
    ] {
        let (status, resp) = change_roles(&srv, &bearer, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(resp["error"].as_str().unwrap().ends_with("are required"));
    }

    assert!(srv.directory.calls().is_empty());
}

#[tokio::test]
async fn non_admins_cannot_change_roles() {
    let srv = TestServer::spawn(clinic()).await;

    let (status, body) = change_roles(
        &srv,
        &token("user-b", &[PATIENT]),
        json!({ "adminUserId": "user-b", "targetUserId": "user-b", "newRoles": [ADMIN] }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "not authorized" }));
    assert!(srv.directory.calls().is_empty());
}

#[tokio::test]
async fn admin_id_in_body_must_match_the_token() {
    let srv = TestServer::spawn(clinic()).await;

    let (status, _) = change_roles(
        &srv,
        &token("user-a", &[ADMIN]),
        json!({ "adminUserId": "someone-else", "targetUserId": "user-b", "newRoles": [PATIENT] }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(srv.directory.mutation_count(), 0);
}

#[tokio::test]
async fn unknown_role_is_rejected_without_mutation() {
    let srv = TestServer::spawn(clinic()).await;

    let (status, body) = change_roles(
        &srv,
        &token("user-a", &[ADMIN]),
        json!({ "adminUserId": "user-a", "targetUserId": "user-b", "newRoles": ["Superuser"] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Superuser"));
    assert_eq!(srv.directory.mutation_count(), 0);
}

#[tokio::test]
async fn padded_role_names_are_trimmed() {
    let srv = TestServer::spawn(clinic()).await;

    let (status, body) = change_roles(
        &srv,
        &token("user-a", &[ADMIN]),
        json!({ "adminUserId": "user-a", "targetUserId": "user-b", "newRoles": [" Patient ", "Healthcare-Provider\t"] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["appliedRoles"], json!([PROVIDER, PATIENT]));
    assert_eq!(
        srv.directory.calls().into_iter().filter(|c| c.is_mutation()).collect::<Vec<_>>(),
        vec![DirectoryCall::AddUserToGroup(subject("user-b"), Role::from(PROVIDER))]
    );

    let (status, _) = change_roles(
        &srv,
        &token("user-a", &[ADMIN]),
        json!({ "adminUserId": "user-a", "targetUserId": "user-b", "newRoles": ["   "] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(srv.directory.mutation_count(), 1);
}

#[tokio::test]
async fn unknown_target_is_404() {
    let srv = TestServer::spawn(clinic()).await;

    let (status, body) = change_roles(
        &srv,
        &token("user-a", &[ADMIN]),
        json!({ "adminUserId": "user-a", "targetUserId": "ghost", "newRoles": [PATIENT] }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "User not found" }));
}

#[tokio::test]
async fn directory_outage_on_read_reports_no_applied_operations() {
    let srv = TestServer::spawn(clinic()).await;
    srv.directory.inject(Fault::ListGroupsForUser);

    let (status, body) = change_roles(
        &srv,
        &token("user-a", &[ADMIN]),
        json!({ "adminUserId": "user-a", "targetUserId": "user-b", "newRoles": [PROVIDER] }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["partial"], false);
    assert_eq!(body["appliedOperations"], json!([]));
    assert_eq!(srv.directory.mutation_count(), 0);
}

#[tokio::test]
async fn failure_midway_reports_what_was_applied() {
    let srv = TestServer::spawn(clinic()).await;
    srv.directory.inject(Fault::AddToGroup(Role::from(PROVIDER)));

    let (status, body) = change_roles(
        &srv,
        &token("user-a", &[ADMIN]),
        json!({ "adminUserId": "user-a", "targetUserId": "user-b", "newRoles": [PROVIDER] }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["partial"], true);
    assert_eq!(body["appliedOperations"], json!([{ "kind": "remove", "role": PATIENT }]));
    assert_eq!(body["failedOperation"], json!({ "kind": "add", "role": PROVIDER }));
    // no rollback: the removal stays applied
    assert!(srv.directory.memberships(&subject("user-b")).unwrap().is_empty());
}

#[tokio::test]
async fn role_catalog_requires_an_administrator() {
    let srv = TestServer::spawn(clinic()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/user-roles", srv.base_url))
        .bearer_auth(token("user-b", &[PATIENT]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(format!("{}/user-roles", srv.base_url))
        .bearer_auth(token("user-a", &[ADMIN]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let names: Vec<&str> = body["roles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec![ADMIN, PROVIDER, PATIENT]);
}

#[tokio::test]
async fn users_may_read_their_own_roles_but_not_others() {
    let srv = TestServer::spawn(clinic()).await;
    let client = reqwest::Client::new();
    let bearer = token("user-b", &[PATIENT]);

    let res = client
        .get(format!("{}/user-roles/user-b", srv.base_url))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["roles"], json!([PATIENT]));

    let res = client
        .get(format!("{}/user-roles/user-a", srv.base_url))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn search_filters_by_role_and_text() {
    let srv = TestServer::spawn(clinic()).await;

    let res = reqwest::Client::new()
        .get(format!("{}/search-users", srv.base_url))
        .query(&[("role", PATIENT), ("search", "bea")])
        .bearer_auth(token("dr-c", &[PROVIDER]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!([{ "sub": "user-b", "firstName": "Bea", "lastName": "Patient", "email": "bea@clinic.test" }])
    );
}

#[tokio::test]
async fn user_profile_lookup() {
    let srv = TestServer::spawn(clinic()).await;
    let client = reqwest::Client::new();
    let bearer = token("user-b", &[PATIENT]);

    let res = client
        .get(format!("{}/search-users/dr-c", srv.base_url))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["firstName"], "Cy");
    assert_eq!(body["enabled"], true);

    let res = client
        .get(format!("{}/search-users/nobody", srv.base_url))
        .bearer_auth(&bearer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn provider_selection_lifecycle() {
    let srv = TestServer::spawn(clinic()).await;
    let client = reqwest::Client::new();
    let patient = token("user-b", &[PATIENT]);

    let res = client
        .post(format!("{}/provider", srv.base_url))
        .bearer_auth(&patient)
        .json(&json!({ "userId": "user-b", "providerId": "dr-c" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/provider", srv.base_url))
        .query(&[("user", "user-b")])
        .bearer_auth(token("dr-c", &[PROVIDER]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["selection"]["providerId"], "dr-c");

    // another patient may neither read nor change it
    let res = client
        .delete(format!("{}/provider", srv.base_url))
        .query(&[("user", "user-b")])
        .bearer_auth(token("user-a", &[PATIENT]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .delete(format!("{}/provider", srv.base_url))
        .query(&[("user", "user-b")])
        .bearer_auth(&patient)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["removed"], true);
}

#[tokio::test]
async fn provider_routes_require_a_target() {
    let srv = TestServer::spawn(clinic()).await;

    let res = reqwest::Client::new()
        .get(format!("{}/provider", srv.base_url))
        .bearer_auth(token("user-b", &[PATIENT]))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "invalid request target" }));
}
