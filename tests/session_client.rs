use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use thalassist::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use thalassist::{
    BloodGroup, ClientConfig, MemoryTokenStore, ProfileUpdate, RegistrationForm, RequestOptions,
    RequestOutcome, ResponseBody, SessionClient, SessionState, TokenStore, UserRole,
};

fn user_json() -> Value {
    json!({
        "id": 7,
        "email": "a@b.com",
        "name": "Asha",
        "userType": "donor",
        "bloodGroup": "O-",
        "city": "Hyderabad",
        "weight": 62,
        "totalDonations": 3
    })
}

fn client_for(server: &MockServer, store: Arc<MemoryTokenStore>) -> SessionClient {
    let config = ClientConfig::new()
        .with_base_url(server.uri())
        .with_timeout(Duration::from_secs(5));
    SessionClient::new(config, store).unwrap()
}

async fn mount_login(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({
            "email": "a@b.com",
            "password": "secret1",
            "user_type": "donor"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access,
            "refresh_token": refresh,
            "token_type": "bearer",
            "user": user_json()
        })))
        .mount(server)
        .await;
}

async fn signed_in(server: &MockServer, store: Arc<MemoryTokenStore>) -> SessionClient {
    mount_login(server, "T1", "R1").await;
    let client = client_for(server, store);
    client
        .login("a@b.com", "secret1", UserRole::Donor)
        .await
        .unwrap();
    client
}

async fn mount_expired_then_ok(server: &MockServer, endpoint: &str) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoint))
        .and(header("Authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_stores_tokens_and_user() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = signed_in(&server, store.clone()).await;

    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T1"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R1"));
    assert_eq!(client.state().await, SessionState::Authenticated);
    assert!(client.is_authenticated().await);
    assert!(client.has_role(UserRole::Donor).await);
    assert!(!client.has_role(UserRole::Patient).await);

    let user = client.user().await.unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.blood_group, BloodGroup::ONegative);
}

#[tokio::test]
async fn requests_carry_the_login_token() {
    let server = MockServer::start().await;
    let client = signed_in(&server, Arc::new(MemoryTokenStore::new())).await;
    Mock::given(method("GET"))
        .and(path("/api/donors/stats"))
        .and(header("Authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"donations": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client
        .authenticated_request("/api/donors/stats", RequestOptions::get())
        .await;
    match outcome {
        RequestOutcome::Success(ResponseBody::Json(body)) => {
            assert_eq!(body, json!({"donations": 3}))
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn text_bodies_come_back_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryTokenStore::new()));

    let outcome = client
        .authenticated_request("/api/health", RequestOptions::get())
        .await;
    assert_eq!(
        outcome.into_result().unwrap(),
        ResponseBody::Text("pong".to_string())
    );
    assert_eq!(client.state().await, SessionState::Anonymous);
}

#[tokio::test]
async fn expired_token_is_refreshed_and_retried() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = signed_in(&server, store.clone()).await;
    mount_expired_then_ok(&server, "/api/data").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({"refresh_token": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "T2"})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client
        .authenticated_request("/api/data", RequestOptions::get())
        .await;
    assert_eq!(
        outcome.into_result().unwrap(),
        ResponseBody::Json(json!({"ok": true}))
    );
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T2"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R1"));
    assert_eq!(client.access_token().await.as_deref(), Some("T2"));
    assert_eq!(client.state().await, SessionState::Authenticated);
}

#[tokio::test]
async fn refresh_rotates_refresh_token_when_given() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = signed_in(&server, store.clone()).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T2",
            "refresh_token": "R2"
        })))
        .mount(&server)
        .await;

    client.refresh().await.unwrap();
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T2"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R2"));
}

#[tokio::test]
async fn failed_refresh_clears_credentials() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = signed_in(&server, store.clone()).await;
    mount_expired_then_ok(&server, "/api/data").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Invalid refresh token"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client
        .authenticated_request("/api/data", RequestOptions::get())
        .await;
    assert!(outcome.is_unauthenticated());
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    assert_eq!(client.state().await, SessionState::Anonymous);
    assert!(client.user().await.is_none());
}

#[tokio::test]
async fn explicit_refresh_failure_keeps_tokens() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = signed_in(&server, store.clone()).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.refresh().await.unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T1"));
    assert_eq!(client.access_token().await.as_deref(), Some("T1"));
    assert_eq!(client.state().await, SessionState::Authenticated);
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    let client = signed_in(&server, Arc::new(MemoryTokenStore::new())).await;
    mount_expired_then_ok(&server, "/api/data").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "T2"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .named("refresh")
        .mount(&server)
        .await;

    let requests = (0..5).map(|_| {
        let client = client.clone();
        async move {
            client
                .authenticated_request("/api/data", RequestOptions::get())
                .await
        }
    });
    let outcomes = futures::future::join_all(requests).await;

    for outcome in outcomes {
        assert_eq!(
            outcome.into_result().unwrap(),
            ResponseBody::Json(json!({"ok": true}))
        );
    }
    assert_eq!(client.access_token().await.as_deref(), Some("T2"));
    server.verify().await;
}

#[tokio::test]
async fn refresh_without_refresh_token_stays_offline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "T9"})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryTokenStore::new()));

    assert!(client.refresh().await.is_err());
    let outcome = client
        .authenticated_request("/api/data", RequestOptions::get())
        .await;
    assert!(outcome.is_unauthenticated());
    server.verify().await;
}

#[tokio::test]
async fn logout_clears_credentials_even_when_server_fails() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = signed_in(&server, store.clone()).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    client.logout().await;
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    assert_eq!(client.state().await, SessionState::Anonymous);
    assert!(!client.is_authenticated().await);
}

#[tokio::test]
async fn login_rejection_keeps_previous_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Incorrect email or password"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "T9"})))
        .expect(0)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(ACCESS_TOKEN_KEY, "T0").unwrap();
    store.set(REFRESH_TOKEN_KEY, "R0").unwrap();
    let client = client_for(&server, store.clone());

    let err = client
        .login("a@b.com", "secret1", UserRole::Donor)
        .await
        .unwrap_err();
    assert!(err.is_authentication());
    assert_eq!(err.message(), "Incorrect email or password");
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T0"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("R0"));
    assert_eq!(client.state().await, SessionState::Anonymous);
    server.verify().await;
}

#[tokio::test]
async fn login_failure_without_message_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryTokenStore::new()));

    let err = client
        .login("a@b.com", "secret1", UserRole::Donor)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Login failed. Please try again.");
}

#[tokio::test]
async fn invalid_login_never_reaches_the_server() {
    let server = MockServer::start().await;
    let client = client_for(&server, Arc::new(MemoryTokenStore::new()));

    let err = client
        .login("a@b.com", "123", UserRole::Donor)
        .await
        .unwrap_err();
    assert_eq!(err.param(), Some("password"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn register_signs_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "access_token": "T1",
            "refresh_token": "R1",
            "user": user_json()
        })))
        .expect(1)
        .mount(&server)
        .await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = client_for(&server, store.clone());

    let mut form = RegistrationForm::new(UserRole::Donor);
    form.name = "Asha".to_string();
    form.email = "a@b.com".to_string();
    form.password = "secret1".to_string();
    form.confirm_password = "secret1".to_string();
    form.phone = "9876543210".to_string();
    form.date_of_birth = Some("1995-04-12".to_string());
    form.blood_group = Some(BloodGroup::ONegative);
    form.city = "Hyderabad".to_string();
    form.weight = Some(62);

    let user = client.register(&form).await.unwrap();
    assert_eq!(user.name, "Asha");
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T1"));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("confirm_password").is_none());
}

#[tokio::test]
async fn register_reports_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Email already registered"})),
        )
        .mount(&server)
        .await;
    let client = client_for(&server, Arc::new(MemoryTokenStore::new()));

    let mut form = RegistrationForm::new(UserRole::Patient);
    form.name = "Ravi".to_string();
    form.email = "r@b.com".to_string();
    form.password = "secret1".to_string();
    form.confirm_password = "secret1".to_string();
    form.phone = "9876543210".to_string();
    form.date_of_birth = Some("2010-01-01".to_string());
    form.blood_group = Some(BloodGroup::BPositive);
    form.city = "Chennai".to_string();
    form.emergency_contact = Some("9123456780".to_string());

    let err = client.register(&form).await.unwrap_err();
    assert!(err.is_bad_request());
    assert_eq!(err.message(), "Email already registered");
}

#[tokio::test]
async fn initialize_restores_a_valid_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("Authorization", "Bearer T0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(&server)
        .await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(ACCESS_TOKEN_KEY, "T0").unwrap();
    store.set(REFRESH_TOKEN_KEY, "R0").unwrap();
    let client = client_for(&server, store);

    assert_eq!(client.initialize().await, SessionState::Authenticated);
    assert_eq!(client.user().await.unwrap().email, "a@b.com");
}

#[tokio::test]
async fn initialize_with_dead_tokens_lands_anonymous() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(ACCESS_TOKEN_KEY, "T0").unwrap();
    store.set(REFRESH_TOKEN_KEY, "R0").unwrap();
    let client = client_for(&server, store.clone());

    assert_eq!(client.initialize().await, SessionState::Anonymous);
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn initialize_without_tokens_skips_the_network() {
    let server = MockServer::start().await;
    let client = client_for(&server, Arc::new(MemoryTokenStore::new()));

    assert_eq!(client.initialize().await, SessionState::Anonymous);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn server_errors_surface_their_message() {
    let server = MockServer::start().await;
    let client = signed_in(&server, Arc::new(MemoryTokenStore::new())).await;
    Mock::given(method("GET"))
        .and(path("/api/donors/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Donor not found"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(418))
        .mount(&server)
        .await;

    match client
        .authenticated_request("/api/donors/99", RequestOptions::get())
        .await
    {
        RequestOutcome::Failed(err) => {
            assert!(err.is_not_found());
            assert_eq!(err.message(), "Donor not found");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let err = client
        .get_json::<Value>("/api/broken")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(418));
    assert_eq!(err.message(), "HTTP 418");
}

#[tokio::test]
async fn profile_update_replaces_cached_user() {
    let server = MockServer::start().await;
    let client = signed_in(&server, Arc::new(MemoryTokenStore::new())).await;
    let mut updated = user_json();
    updated["city"] = json!("Pune");
    Mock::given(method("PUT"))
        .and(path("/api/auth/profile"))
        .and(body_json(json!({"city": "Pune"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
        .expect(1)
        .mount(&server)
        .await;

    let user = client
        .update_profile(&ProfileUpdate::new().with_city("Pune"))
        .await
        .unwrap();
    assert_eq!(user.city.as_deref(), Some("Pune"));
    assert_eq!(client.user().await.unwrap().city.as_deref(), Some("Pune"));

    let err = client
        .update_profile(&ProfileUpdate::new())
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn dispose_forgets_memory_only() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = signed_in(&server, store.clone()).await;

    client.dispose().await;
    assert_eq!(client.state().await, SessionState::Anonymous);
    assert!(client.user().await.is_none());
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T1"));
}

#[tokio::test]
async fn logout_during_refresh_keeps_session_closed() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = signed_in(&server, store.clone()).await;
    mount_expired_then_ok(&server, "/api/data").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "T2", "refresh_token": "R2"}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let request = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .authenticated_request("/api/data", RequestOptions::get())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.logout().await;

    let outcome = request.await.unwrap();
    assert!(outcome.is_unauthenticated());
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    assert_eq!(client.access_token().await, None);
    assert_eq!(client.state().await, SessionState::Anonymous);
}

#[tokio::test]
async fn disposed_refresh_leaves_the_next_one_in_charge() {
    let server = MockServer::start().await;
    let client = signed_in(&server, Arc::new(MemoryTokenStore::new())).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "T2"}))
                .set_delay(Duration::from_millis(400)),
        )
        .expect(2)
        .named("refresh")
        .mount(&server)
        .await;

    // Started before dispose; finishes while the second refresh is running.
    let first = {
        let client = client.clone();
        tokio::spawn(async move { client.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.dispose().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = {
        let client = client.clone();
        tokio::spawn(async move { client.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(350)).await;
    let third = {
        let client = client.clone();
        tokio::spawn(async move { client.refresh().await })
    };

    assert!(first.await.unwrap().is_err());
    assert!(second.await.unwrap().is_ok());
    assert!(third.await.unwrap().is_ok());
    assert_eq!(client.access_token().await.as_deref(), Some("T2"));
    server.verify().await;
}

#[tokio::test]
async fn login_without_refresh_token_drops_the_old_one() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    store.set(REFRESH_TOKEN_KEY, "R-previous").unwrap();
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T1",
            "user": user_json()
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "T9"})))
        .expect(0)
        .mount(&server)
        .await;
    let client = client_for(&server, store.clone());

    client
        .login("a@b.com", "secret1", UserRole::Donor)
        .await
        .unwrap();
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("T1"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
    assert!(client.refresh().await.is_err());
    server.verify().await;
}
