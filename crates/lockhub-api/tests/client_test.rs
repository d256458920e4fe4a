#![allow(clippy::unwrap_used)]
// Integration tests for `LockApi` using wiremock.

use std::time::{Duration, Instant};

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lockhub_api::{
    Credentials, Error, ErrorKind, LockApi, LockId, NewPasscode, OpenState, PassageModeConfig,
    PasscodeChange, PasscodeId, PasscodeType, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_transport() -> TransportConfig {
    TransportConfig::default().with_retry_delay(Duration::from_millis(10))
}

fn client_for(server: &MockServer, transport: TransportConfig) -> LockApi {
    let base = Url::parse(&server.uri()).unwrap();
    LockApi::with_client(
        reqwest::Client::new(),
        &base,
        Credentials {
            username: "owner@example.com".into(),
            password: "hunter2".to_string().into(),
        },
        transport,
    )
    .unwrap()
}

/// Client whose every request gives up after `timeout`.
fn client_with_timeout(server: &MockServer, timeout: Duration) -> LockApi {
    let base = Url::parse(&server.uri()).unwrap();
    LockApi::with_client(
        reqwest::Client::builder().timeout(timeout).build().unwrap(),
        &base,
        Credentials {
            username: "owner@example.com".into(),
            password: "hunter2".to_string().into(),
        },
        fast_transport(),
    )
    .unwrap()
}

async fn setup() -> (MockServer, LockApi) {
    let server = MockServer::start().await;
    let api = client_for(&server, fast_transport());
    (server, api)
}

async fn mount_login(server: &MockServer, expires_in_ms: u64, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": expires_in_ms,
        })))
        .expect(times)
        .mount(server)
        .await;
}

fn detail_body(lock_id: i64) -> serde_json::Value {
    json!({
        "lockId": lock_id,
        "lockName": "S31_c3a1f0",
        "lockAlias": "Front door",
        "lockMac": "C3:A1:F0:11:22:33",
        "electricQuantity": 87,
        "featureValue": "F44354CD5F3",
        "hasGateway": 1,
        "modelNum": "SN9161_PV53",
        "firmwareRevision": "6.0.6.210622",
    })
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let (server, api) = setup().await;
    mount_login(&server, 7_776_000_000, 1).await;

    api.login().await.unwrap();
    assert!(api.has_valid_session().await);
}

#[tokio::test]
async fn test_login_http_failure() {
    let (server, api) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = api.login().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!api.has_valid_session().await);
}

#[tokio::test]
async fn test_login_errcode_is_auth_error() {
    let (server, api) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": 10003,
            "errmsg": "invalid account or password",
        })))
        .mount(&server)
        .await;

    let err = api.login().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(err.to_string().contains("invalid account"));
}

#[tokio::test]
async fn test_session_reused_within_validity() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .and(query_param("access_token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(1)))
        .expect(2)
        .mount(&server)
        .await;

    api.lock_detail(LockId(1)).await.unwrap();
    api.lock_detail(LockId(1)).await.unwrap();
}

#[tokio::test]
async fn test_expired_session_triggers_one_relogin() {
    let (server, api) = setup().await;
    mount_login(&server, 50, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(1)))
        .mount(&server)
        .await;

    api.lock_detail(LockId(1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    api.lock_detail(LockId(1)).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_calls_share_one_login() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(1)))
        .mount(&server)
        .await;

    let (a, b, c) = tokio::join!(
        api.lock_detail(LockId(1)),
        api.lock_detail(LockId(1)),
        api.lock_detail(LockId(1)),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();
}

#[tokio::test]
async fn test_unauthorized_discards_session() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(1)))
        .mount(&server)
        .await;

    let first = api.lock_detail(LockId(1)).await.unwrap_err();
    assert!(first.is_auth_expired());
    assert!(!api.has_valid_session().await);

    api.lock_detail(LockId(1)).await.unwrap();
}

// ── Response classification ─────────────────────────────────────────

#[tokio::test]
async fn test_errcode_is_application_error() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": -1003,
            "errmsg": "Lock does not exist",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = api.lock_detail(LockId(9)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(err.api_error_code(), Some(-1003));
    assert_eq!(err.summary(), "Lock does not exist");
}

#[tokio::test]
async fn test_server_error_on_read_is_not_retried() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let err = api.lock_detail(LockId(1)).await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 500, .. }));
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_malformed_detail_is_validation_error() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lockId": 1})))
        .mount(&server)
        .await;

    let err = api.lock_detail(LockId(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ── Retry policy ────────────────────────────────────────────────────

#[tokio::test]
async fn test_read_retries_exhaust_to_absence() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/queryOpenState"))
        .respond_with(ResponseTemplate::new(400))
        .expect(3)
        .mount(&server)
        .await;

    let err = api.query_open_state(LockId(1)).await.unwrap_err();
    assert!(err.is_absence(), "expected absence, got {err:?}");
    assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_read_retry_recovers() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/queryOpenState"))
        .respond_with(ResponseTemplate::new(400))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/lock/queryOpenState"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": 1})))
        .mount(&server)
        .await;

    let state = api.query_open_state(LockId(1)).await.unwrap();
    assert_eq!(state, OpenState::Unlocked);
}

#[tokio::test]
async fn test_read_budget_exhaustion_is_absence() {
    let server = MockServer::start().await;
    let transport = TransportConfig {
        read_budget: Duration::from_millis(100),
        ..fast_transport()
    };
    let api = client_for(&server, transport);
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(detail_body(1))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = api.lock_detail(LockId(1)).await.unwrap_err();
    assert!(matches!(err, Error::BudgetExhausted { .. }));
    assert!(err.is_absence());
}

#[tokio::test]
async fn test_write_retries_failure_statuses() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/unlock"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = api.unlock(LockId(1)).await.unwrap_err();
    assert!(err.is_absence());
}

#[tokio::test]
async fn test_write_application_error_is_not_retried() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/lock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errcode": -3003,
            "errmsg": "Gateway is offline",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = api.lock(LockId(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
}

#[tokio::test]
async fn test_write_timeout_is_not_retried() {
    let server = MockServer::start().await;
    let api = client_with_timeout(&server, Duration::from_millis(100));
    mount_login(&server, 60_000, 1).await;

    // The unlock may have landed; sending it again could toggle twice.
    Mock::given(method("GET"))
        .and(path("/api/lock/unlock"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errcode": 0}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = api.unlock(LockId(1)).await.unwrap_err();
    assert!(
        matches!(err, Error::Transport(ref e) if e.is_timeout()),
        "expected a bare timeout, got {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_read_timeout_is_retried() {
    let server = MockServer::start().await;
    let api = client_with_timeout(&server, Duration::from_millis(100));
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(detail_body(1))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let err = api.lock_detail(LockId(1)).await.unwrap_err();
    assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
    assert!(err.is_absence());
}

// ── Lock endpoints ──────────────────────────────────────────────────

#[tokio::test]
async fn test_connectable_lock_filter() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    let wifi_only = format!("{:X}", 1u128 << 56);
    Mock::given(method("GET"))
        .and(path("/api/lock/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [
                { "lockId": 1, "lockAlias": "Gateway lock", "hasGateway": 1, "featureValue": "3" },
                { "lockId": 2, "lockAlias": "Bluetooth only", "hasGateway": 0, "featureValue": "3" },
                { "lockId": 3, "lockAlias": "Wi-Fi lock", "hasGateway": 0, "featureValue": wifi_only },
            ],
            "pageNo": 1,
            "pageSize": 20,
        })))
        .mount(&server)
        .await;

    let ids = api.connectable_lock_ids().await.unwrap();
    assert_eq!(ids, vec![LockId(1), LockId(3)]);
}

#[tokio::test]
async fn test_lock_detail_parses() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .and(query_param("lockId", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(42)))
        .mount(&server)
        .await;

    let lock = api.lock_detail(LockId(42)).await.unwrap();
    assert_eq!(lock.display_name(), "Front door");
    assert_eq!(lock.battery(), Some(87));
    assert_eq!(lock.model_num.as_deref(), Some("SN9161_PV53"));
}

#[tokio::test]
async fn test_set_passage_mode_wire_form() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/lock/configPassageMode"))
        .and(body_partial_json(json!({
            "lockId": 7,
            "type": 2,
            "passageMode": 1,
            "autoUnlock": 2,
            "isAllDay": 1,
            "weekDays": "[1,3,5]",
            "access_token": "tok-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let config = PassageModeConfig {
        enabled: true,
        auto_unlock: false,
        all_day: true,
        start_minute: 0,
        end_minute: 0,
        week_days: vec![1, 3, 5],
    };
    api.set_passage_mode(LockId(7), &config).await.unwrap();
}

#[tokio::test]
async fn test_passage_mode_read_back() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/getPassageModeConfig"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "passageMode": 1,
            "autoUnlock": 2,
            "isAllDay": 1,
            "startDate": 0,
            "endDate": 0,
            "weekDays": "[1,3,5]",
        })))
        .mount(&server)
        .await;

    let config = api.passage_mode_config(LockId(7)).await.unwrap();
    assert!(config.enabled);
    assert!(!config.auto_unlock);
    assert!(config.all_day);
    assert_eq!(config.week_days, vec![1, 3, 5]);
}

// ── Gateway serialization ───────────────────────────────────────────

#[tokio::test]
async fn test_gateway_calls_never_overlap() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    let delay = Duration::from_millis(200);
    for endpoint in ["/api/lock/lock", "/api/lock/unlock"] {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"errcode": 0}))
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
    }

    // warm the session so login time is not part of the measurement
    api.login().await.unwrap();

    let started = Instant::now();
    let (locked, unlocked) = tokio::join!(api.lock(LockId(1)), api.unlock(LockId(2)));
    locked.unwrap();
    unlocked.unwrap();

    assert!(
        started.elapsed() >= delay * 2,
        "gateway calls overlapped: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_direct_calls_do_not_wait_for_gateway() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/detail"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(detail_body(1))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    api.login().await.unwrap();

    let started = Instant::now();
    let (a, b) = tokio::join!(api.lock_detail(LockId(1)), api.lock_detail(LockId(1)));
    a.unwrap();
    b.unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));
}

// ── Passcodes ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_generated_passcode() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/keyboardPwd/get"))
        .and(body_partial_json(json!({
            "lockId": 3,
            "keyboardPwdName": "Cleaner",
            "keyboardPwdType": 3,
            "startDate": 1_700_000_000_000_i64,
            "endDate": 1_700_003_600_000_i64,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keyboardPwd": "48213907",
            "keyboardPwdId": 5501,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = api
        .add_passcode(
            LockId(3),
            &NewPasscode {
                name: "Cleaner".into(),
                kind: PasscodeType::Period,
                start_date: 1_700_000_000_000,
                end_date: 1_700_003_600_000,
                code: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.id, PasscodeId(5501));
    assert_eq!(created.code.as_deref(), Some("48213907"));
}

#[tokio::test]
async fn test_add_explicit_passcode() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/keyboardPwd/add"))
        .and(body_partial_json(json!({
            "lockId": 3,
            "keyboardPwd": "246810",
            "addType": 2,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keyboardPwdId": 77})))
        .expect(1)
        .mount(&server)
        .await;

    let created = api
        .add_passcode(
            LockId(3),
            &NewPasscode {
                name: "Family".into(),
                kind: PasscodeType::Permanent,
                start_date: 0,
                end_date: 0,
                code: Some("246810".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.id, PasscodeId(77));
}

#[tokio::test]
async fn test_list_and_delete_passcodes() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lock/listKeyboardPwd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [
                { "keyboardPwdId": 1, "keyboardPwdName": "Old", "keyboardPwdType": 3, "startDate": 1, "endDate": 2 },
                { "keyboardPwdId": 2, "keyboardPwdName": "Forever", "keyboardPwdType": 2 },
                { "keyboardPwdId": 3, "keyboardPwdName": "Open ended", "keyboardPwdType": 3, "startDate": 1 },
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/keyboardPwd/delete"))
        .and(body_partial_json(json!({
            "lockId": 3,
            "keyboardPwdId": 1,
            "deleteType": 2,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let codes = api.list_passcodes(LockId(3)).await.unwrap();
    assert_eq!(codes.len(), 3);
    assert!(codes[0].is_expired());
    assert!(!codes[1].is_expired());
    assert_eq!(codes[2].end_date, None);
    assert!(!codes[2].is_expired());

    api.delete_passcode(LockId(3), codes[0].id).await.unwrap();
}

#[tokio::test]
async fn test_change_passcode_sends_only_given_fields() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/keyboardPwd/change"))
        .and(body_partial_json(json!({
            "lockId": 3,
            "keyboardPwdId": 9,
            "newKeyboardPwd": "1357",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let change = PasscodeChange {
        new_code: Some("1357".into()),
        new_name: None,
    };
    api.change_passcode(LockId(3), PasscodeId(9), &change)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let change_body: serde_json::Value = requests
        .iter()
        .find(|r| r.url.path() == "/api/keyboardPwd/change")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    assert!(change_body.get("keyboardPwdName").is_none());
}

#[tokio::test]
async fn test_empty_change_is_rejected_without_io() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 0).await;

    let err = api
        .change_passcode(LockId(3), PasscodeId(9), &PasscodeChange::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ── Records ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_unlock_records() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/lockRecord/list"))
        .and(query_param("pageNo", "2"))
        .and(query_param("pageSize", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{
                "recordId": 901,
                "lockId": 3,
                "recordType": 4,
                "success": 1,
                "username": "Cleaner",
                "keyboardPwd": "48213907",
                "lockDate": 1_700_000_100_000_i64,
                "serverDate": 1_700_000_101_000_i64,
            }],
            "pageNo": 2,
            "pageSize": 50,
            "pages": 3,
            "total": 101,
        })))
        .mount(&server)
        .await;

    let page = api.list_unlock_records(LockId(3), 2, 50).await.unwrap();
    assert_eq!(page.total, 101);
    assert_eq!(page.list[0].record_type.label(), "passcode unlock");
}

// ── Webhook registration ────────────────────────────────────────────

#[tokio::test]
async fn test_register_webhook_is_unauthenticated() {
    let (server, api) = setup().await;
    mount_login(&server, 60_000, 0).await;

    Mock::given(method("POST"))
        .and(path("/api/add_webhook"))
        .and(body_json(json!({
            "webhook_url": "https://264128793837.cloud.example.com/api/webhook/abc",
            "mac": "264128793837",
            "lock_ids": [1, 3],
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = Url::parse("https://264128793837.cloud.example.com/api/webhook/abc").unwrap();
    api.register_webhook(&url, "264128793837", &[LockId(1), LockId(3)])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_webhook_failure_status() {
    let (server, api) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/add_webhook"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let url = Url::parse("https://example.com/api/webhook/abc").unwrap();
    let err = api
        .register_webhook(&url, "node", &[LockId(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http { status: 502, .. }));
}
