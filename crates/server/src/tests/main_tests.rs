use super::*;
use axum::{
    body::{self, Body},
    http::{header, Request},
};
use exporter::ExportFormat;
use storage::StoredTranslation;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    storage: Storage,
    dir: TempDir,
}

async fn test_app(notify_on_domain_waiting: bool) -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let database_url = format!("sqlite://{}", dir.path().join("app.db").display());
    let storage = Storage::new(&database_url).await.expect("db");

    let api = ApiContext {
        exporter: Arc::new(FileExporter::new(
            storage.clone(),
            dir.path().join("export"),
            ExportFormat::Json,
        )),
        storage: storage.clone(),
        cache: LocaleCache::new(dir.path().join("cache")),
        managed_locales: vec!["en".to_string(), "fr".to_string()],
    };
    let views = ViewSettings {
        base_layout: "admin/layout.html".to_string(),
        grid_input_type: GridInputType::Textarea,
        grid_toggle_similar: true,
        notice_locale: NoticeLocale::En,
        notify_on_domain_waiting,
    };
    TestApp {
        router: build_router(Arc::new(AppState { api, views })),
        storage,
        dir,
    }
}

async fn seed_unit(storage: &Storage, key: &str, domain: &str) -> TransUnitId {
    storage
        .create_trans_unit(
            key,
            domain,
            TransUnitStatus::Waiting,
            &[StoredTranslation {
                locale: "en".to_string(),
                content: format!("{key} text"),
            }],
        )
        .await
        .expect("unit")
}

async fn status_of(storage: &Storage, id: TransUnitId) -> TransUnitStatus {
    storage
        .load_trans_unit(id)
        .await
        .expect("load")
        .expect("exists")
        .status
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location")
        .to_str()
        .expect("ascii")
}

/// Turns the `Set-Cookie` of a redirect into the `Cookie` sent by the browser.
fn cookie_from(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie")
        .to_str()
        .expect("ascii");
    set_cookie.split(';').next().expect("pair").to_string()
}

async fn flashes_after(router: &Router, redirect: &Response) -> Vec<FlashMessage> {
    let request = Request::get(GRID_ROUTE)
        .header(header::COOKIE, cookie_from(redirect))
        .body(Body::empty())
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let view: GridView = serde_json::from_slice(&body).expect("json");
    view.flashes
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app(true).await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn grid_view_exposes_configuration() {
    let app = test_app(true).await;
    let request = Request::get(GRID_ROUTE)
        .body(Body::empty())
        .expect("request");
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let view: GridView = serde_json::from_slice(&body).expect("json");
    assert_eq!(view.layout, "admin/layout.html");
    assert_eq!(view.input_type, GridInputType::Textarea);
    assert!(view.toggle_similar);
    assert_eq!(view.locales, vec!["en", "fr"]);
    assert!(view.flashes.is_empty());
}

#[tokio::test]
async fn validating_a_unit_redirects_to_grid_with_flash() {
    let app = test_app(true).await;
    let id = seed_unit(&app.storage, "home.title", "messages").await;

    let response = app
        .router
        .clone()
        .oneshot(post(&format!("/translations/{}/validate", id.0)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), GRID_ROUTE);
    assert_eq!(status_of(&app.storage, id).await, TransUnitStatus::Validated);

    let flashes = flashes_after(&app.router, &response).await;
    assert_eq!(
        flashes,
        vec![FlashMessage {
            level: FlashLevel::Success,
            message: "Translation validated!".to_string(),
        }]
    );
}

#[tokio::test]
async fn unit_status_routes_cover_every_status() {
    let app = test_app(true).await;
    let id = seed_unit(&app.storage, "home.title", "messages").await;

    for (action, expected) in [
        ("invalidate", TransUnitStatus::Invalid),
        ("waiting", TransUnitStatus::Waiting),
        ("validate", TransUnitStatus::Validated),
        ("validate", TransUnitStatus::Validated),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(post(&format!("/translations/{}/{action}", id.0)))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(status_of(&app.storage, id).await, expected);
    }
}

#[tokio::test]
async fn status_change_on_unknown_unit_is_not_found() {
    let app = test_app(true).await;
    let response = app
        .router
        .oneshot(post("/translations/9999/validate"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let err: ApiError = serde_json::from_slice(&body).expect("json");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn domain_validation_touches_only_that_domain() {
    let app = test_app(true).await;
    let mut emails = Vec::new();
    for key in ["welcome", "reset", "goodbye"] {
        emails.push(seed_unit(&app.storage, key, "emails").await);
    }
    let other = seed_unit(&app.storage, "home.title", "messages").await;

    let response = app
        .router
        .clone()
        .oneshot(post("/translations/domain/emails/validate"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), DOMAINS_ROUTE);

    for id in emails {
        assert_eq!(status_of(&app.storage, id).await, TransUnitStatus::Validated);
    }
    assert_eq!(status_of(&app.storage, other).await, TransUnitStatus::Waiting);
}

#[tokio::test]
async fn domain_less_route_targets_messages() {
    let app = test_app(true).await;
    let messages = seed_unit(&app.storage, "home.title", "messages").await;
    let emails = seed_unit(&app.storage, "welcome", "emails").await;

    let response = app
        .router
        .oneshot(post("/translations/domain/invalidate"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(status_of(&app.storage, messages).await, TransUnitStatus::Invalid);
    assert_eq!(status_of(&app.storage, emails).await, TransUnitStatus::Waiting);
}

#[tokio::test]
async fn blank_domain_route_leaves_messages_untouched() {
    let app = test_app(true).await;
    let messages = seed_unit(&app.storage, "hello", "messages").await;

    let response = app
        .router
        .oneshot(post("/translations/domain/%20/invalidate"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(status_of(&app.storage, messages).await, TransUnitStatus::Waiting);
}

#[tokio::test]
async fn domain_route_matches_the_exact_domain() {
    let app = test_app(true).await;
    let spaced = seed_unit(&app.storage, "odd", " emails ").await;
    let plain = seed_unit(&app.storage, "welcome", "emails").await;

    let response = app
        .router
        .oneshot(post("/translations/domain/%20emails%20/validate"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(status_of(&app.storage, spaced).await, TransUnitStatus::Validated);
    assert_eq!(status_of(&app.storage, plain).await, TransUnitStatus::Waiting);
}

#[tokio::test]
async fn empty_domain_still_redirects() {
    let app = test_app(true).await;
    let response = app
        .router
        .oneshot(post("/translations/domain/ghost/validate"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), DOMAINS_ROUTE);
}

#[tokio::test]
async fn domain_waiting_flash_follows_setting() {
    let notifying = test_app(true).await;
    let response = notifying
        .router
        .oneshot(post("/translations/domain/emails/waiting"))
        .await
        .expect("response");
    assert!(response.headers().get(header::SET_COOKIE).is_some());

    let silent = test_app(false).await;
    let response = silent
        .router
        .clone()
        .oneshot(post("/translations/domain/emails/waiting"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let response = silent
        .router
        .oneshot(post("/translations/domain/emails/validate"))
        .await
        .expect("response");
    assert!(response.headers().get(header::SET_COOKIE).is_some());
}

#[tokio::test]
async fn ajax_cache_invalidation_returns_json_message() {
    let app = test_app(true).await;
    let cache_dir = app.dir.path().join("cache");
    std::fs::create_dir_all(&cache_dir).expect("cache dir");
    std::fs::write(cache_dir.join("catalogue.fr.abc.php"), b"stale").expect("cache file");
    std::fs::write(cache_dir.join("catalogue.de.abc.php"), b"other").expect("cache file");

    let request = Request::get("/translations/cache/invalidate")
        .header("x-requested-with", "XMLHttpRequest")
        .body(Body::empty())
        .expect("request");
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let message: MessageResponse = serde_json::from_slice(&body).expect("json");
    assert_eq!(message.message, "Translation cache removed.");
    assert!(!cache_dir.join("catalogue.fr.abc.php").exists());
    assert!(cache_dir.join("catalogue.de.abc.php").exists());
}

#[tokio::test]
async fn plain_cache_invalidation_redirects_to_grid() {
    let app = test_app(true).await;
    let response = app
        .router
        .clone()
        .oneshot(post("/translations/cache/invalidate"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), GRID_ROUTE);

    let flashes = flashes_after(&app.router, &response).await;
    assert_eq!(flashes.len(), 1);
    assert_eq!(flashes[0].message, "Translation cache removed.");
}

#[tokio::test]
async fn new_unit_redirect_depends_on_submit_button() {
    let app = test_app(true).await;

    for (key, submit, target) in [
        ("home.title", "save", GRID_ROUTE),
        ("home.subtitle", "save_add", NEW_ROUTE),
    ] {
        let request = Request::post(NEW_ROUTE)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({
                    "key": key,
                    "translations": { "en": "Hello", "fr": "Bonjour" },
                    "submit": submit,
                })
                .to_string(),
            ))
            .expect("request");
        let response = app.router.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), target);
    }

    let id = app
        .storage
        .find_trans_unit_id("home.subtitle", "messages")
        .await
        .expect("lookup")
        .expect("created");
    assert_eq!(status_of(&app.storage, id).await, TransUnitStatus::Waiting);
}

#[tokio::test]
async fn invalid_new_unit_is_rejected() {
    let app = test_app(true).await;
    let request = Request::post(NEW_ROUTE)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "key": "", "translations": {} }).to_string(),
        ))
        .expect("request");
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_exports_and_redirects() {
    let app = test_app(true).await;
    seed_unit(&app.storage, "home.title", "messages").await;

    let response = app
        .router
        .clone()
        .oneshot(post("/translations/refresh"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), GRID_ROUTE);
    assert!(app.dir.path().join("export").join("messages.en.json").exists());

    let flashes = flashes_after(&app.router, &response).await;
    assert_eq!(flashes[0].message, "Translations exported, cache cleared.");
}

#[tokio::test]
async fn units_can_be_listed_and_fetched() {
    let app = test_app(true).await;
    let id = seed_unit(&app.storage, "welcome", "emails").await;
    seed_unit(&app.storage, "home.title", "messages").await;

    let request = Request::get("/translations/units?domain=emails&status=waiting")
        .body(Body::empty())
        .expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let page: TransUnitPage = serde_json::from_slice(&body).expect("json");
    assert_eq!(page.total, 1);
    assert_eq!(page.units[0].id, id);

    let request = Request::get(format!("/translations/units/{}", id.0))
        .body(Body::empty())
        .expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let unit: TransUnitSummary = serde_json::from_slice(&body).expect("json");
    assert_eq!(unit.key, "welcome");

    let request = Request::get("/translations/units/777")
        .body(Body::empty())
        .expect("request");
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn domains_view_lists_known_domains() {
    let app = test_app(true).await;
    seed_unit(&app.storage, "welcome", "emails").await;
    seed_unit(&app.storage, "home.title", "messages").await;

    let request = Request::get(DOMAINS_ROUTE)
        .body(Body::empty())
        .expect("request");
    let response = app.router.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let view: DomainsView = serde_json::from_slice(&body).expect("json");
    assert_eq!(view.domains, vec!["emails", "messages"]);
}
