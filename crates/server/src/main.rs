use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use exporter::FileExporter;
use server_api::{
    create_trans_unit, get_trans_unit, invalidate_cache, list_domains, list_trans_units,
    refresh, set_status, set_status_for_domain, ApiContext, Notice, NoticeLocale,
    TransUnitQuery,
};
use shared::{
    domain::{GridInputType, TransUnitId, TransUnitStatus},
    error::{ApiError, ErrorCode},
    protocol::{
        DomainsView, FlashLevel, FlashMessage, GridView, MessageResponse, NewTransUnitRequest,
        NewTransUnitView, SubmitAction, TransUnitPage, TransUnitSummary,
    },
};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use translation_cache::{DirectoryCodeCache, LocaleCache};

mod config;
mod flash;

use config::{load_settings, prepare_database_url, Settings};

const GRID_ROUTE: &str = "/translations/grid";
const DOMAINS_ROUTE: &str = "/translations/domains";
const NEW_ROUTE: &str = "/translations/new";
const MAX_BODY_BYTES: usize = 256 * 1024;

type HttpError = (StatusCode, Json<ApiError>);

/// Presentation options handed to the views.
#[derive(Debug, Clone)]
struct ViewSettings {
    base_layout: String,
    grid_input_type: GridInputType,
    grid_toggle_similar: bool,
    notice_locale: NoticeLocale,
    notify_on_domain_waiting: bool,
}

impl From<&Settings> for ViewSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            base_layout: settings.base_layout.clone(),
            grid_input_type: settings.grid_input_type,
            grid_toggle_similar: settings.grid_toggle_similar,
            notice_locale: settings.notice_locale,
            notify_on_domain_waiting: settings.notify_on_domain_waiting,
        }
    }
}

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    views: ViewSettings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let mut cache = LocaleCache::new(&settings.cache_dir);
    if let Some(dir) = &settings.compiled_code_cache_dir {
        cache = cache.with_compiled_code_cache(Arc::new(DirectoryCodeCache::new(dir)));
    }
    let api = ApiContext {
        exporter: Arc::new(FileExporter::new(
            storage.clone(),
            &settings.export_dir,
            settings.export_format,
        )),
        storage,
        cache,
        managed_locales: settings.managed_locales.clone(),
    };
    info!(
        locales = ?api.managed_locales,
        cache_dir = %settings.cache_dir.display(),
        export_dir = %settings.export_dir.display(),
        "translation admin configured"
    );

    let state = AppState {
        api,
        views: ViewSettings::from(&settings),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(GRID_ROUTE, get(grid))
        .route(DOMAINS_ROUTE, get(domains))
        .route(NEW_ROUTE, get(new_form).post(create_unit))
        .route(
            "/translations/cache/invalidate",
            get(invalidate_cache_action).post(invalidate_cache_action),
        )
        .route("/translations/refresh", post(refresh_action))
        .route("/translations/units", get(http_list_units))
        .route("/translations/units/:id", get(http_get_unit))
        .route("/translations/:id/validate", post(validate_unit))
        .route("/translations/:id/waiting", post(waiting_unit))
        .route("/translations/:id/invalidate", post(invalidate_unit))
        .route("/translations/domain/validate", post(validate_default_domain))
        .route("/translations/domain/waiting", post(waiting_default_domain))
        .route("/translations/domain/invalidate", post(invalidate_default_domain))
        .route("/translations/domain/:domain/validate", post(validate_domain))
        .route("/translations/domain/:domain/waiting", post(waiting_domain))
        .route("/translations/domain/:domain/invalidate", post(invalidate_domain))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.api.storage.health_check().await.map_err(|error| {
        error!(%error, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn grid(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> (HeaderMap, Json<GridView>) {
    let mut response_headers = HeaderMap::new();
    let flashes = flash::take_flashes(&headers, &mut response_headers);
    let view = GridView {
        layout: state.views.base_layout.clone(),
        input_type: state.views.grid_input_type,
        toggle_similar: state.views.grid_toggle_similar,
        locales: state.api.managed_locales.clone(),
        flashes,
    };
    (response_headers, Json(view))
}

async fn domains(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<DomainsView>), HttpError> {
    let domains = list_domains(&state.api).await.map_err(http_error)?;
    let mut response_headers = HeaderMap::new();
    let flashes = flash::take_flashes(&headers, &mut response_headers);
    Ok((
        response_headers,
        Json(DomainsView {
            layout: state.views.base_layout.clone(),
            domains,
            flashes,
        }),
    ))
}

async fn new_form(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<NewTransUnitView>), HttpError> {
    let domains = list_domains(&state.api).await.map_err(http_error)?;
    let mut response_headers = HeaderMap::new();
    let flashes = flash::take_flashes(&headers, &mut response_headers);
    Ok((
        response_headers,
        Json(NewTransUnitView {
            layout: state.views.base_layout.clone(),
            locales: state.api.managed_locales.clone(),
            domains,
            flashes,
        }),
    ))
}

async fn create_unit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewTransUnitRequest>,
) -> Result<Response, HttpError> {
    create_trans_unit(&state.api, &req)
        .await
        .map_err(http_error)?;
    let target = match req.submit {
        SubmitAction::SaveAdd => NEW_ROUTE,
        SubmitAction::Save => GRID_ROUTE,
    };
    Ok(redirect_with_notice(
        &state,
        target,
        Some(Notice::TranslationAdded),
    ))
}

async fn invalidate_cache_action(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    invalidate_cache(&state.api, false)
        .await
        .map_err(http_error)?;
    let message = Notice::CacheRemoved.text(state.views.notice_locale);

    if is_xml_http_request(&headers) {
        return Ok(Json(MessageResponse {
            message: message.to_string(),
        })
        .into_response());
    }
    Ok(redirect_with_notice(
        &state,
        GRID_ROUTE,
        Some(Notice::CacheRemoved),
    ))
}

async fn refresh_action(State(state): State<Arc<AppState>>) -> Result<Response, HttpError> {
    let outcome = refresh(&state.api).await.map_err(http_error)?;
    if let Ok(report) = &outcome.export {
        info!(files = report.files.len(), "refresh completed");
    }
    Ok(redirect_with_notice(
        &state,
        GRID_ROUTE,
        Some(Notice::TranslationsRefreshed),
    ))
}

async fn http_list_units(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TransUnitQuery>,
) -> Result<Json<TransUnitPage>, HttpError> {
    let page = list_trans_units(&state.api, &q).await.map_err(http_error)?;
    Ok(Json(page))
}

async fn http_get_unit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TransUnitSummary>, HttpError> {
    let unit = get_trans_unit(&state.api, TransUnitId(id))
        .await
        .map_err(http_error)?;
    Ok(Json(unit))
}

async fn validate_unit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, HttpError> {
    change_unit_status(&state, id, TransUnitStatus::Validated).await
}

async fn waiting_unit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, HttpError> {
    change_unit_status(&state, id, TransUnitStatus::Waiting).await
}

async fn invalidate_unit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, HttpError> {
    change_unit_status(&state, id, TransUnitStatus::Invalid).await
}

async fn change_unit_status(
    state: &AppState,
    id: i64,
    status: TransUnitStatus,
) -> Result<Response, HttpError> {
    set_status(&state.api, TransUnitId(id), status)
        .await
        .map_err(http_error)?;
    Ok(redirect_with_notice(
        state,
        GRID_ROUTE,
        Some(Notice::UnitStatusChanged(status)),
    ))
}

async fn validate_default_domain(
    State(state): State<Arc<AppState>>,
) -> Result<Response, HttpError> {
    change_domain_status(&state, None, TransUnitStatus::Validated).await
}

async fn waiting_default_domain(
    State(state): State<Arc<AppState>>,
) -> Result<Response, HttpError> {
    change_domain_status(&state, None, TransUnitStatus::Waiting).await
}

async fn invalidate_default_domain(
    State(state): State<Arc<AppState>>,
) -> Result<Response, HttpError> {
    change_domain_status(&state, None, TransUnitStatus::Invalid).await
}

async fn validate_domain(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Result<Response, HttpError> {
    change_domain_status(&state, Some(&domain), TransUnitStatus::Validated).await
}

async fn waiting_domain(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Result<Response, HttpError> {
    change_domain_status(&state, Some(&domain), TransUnitStatus::Waiting).await
}

async fn invalidate_domain(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Result<Response, HttpError> {
    change_domain_status(&state, Some(&domain), TransUnitStatus::Invalid).await
}

async fn change_domain_status(
    state: &AppState,
    domain: Option<&str>,
    status: TransUnitStatus,
) -> Result<Response, HttpError> {
    set_status_for_domain(&state.api, domain, status)
        .await
        .map_err(http_error)?;
    let notice = (status != TransUnitStatus::Waiting || state.views.notify_on_domain_waiting)
        .then_some(Notice::DomainStatusChanged(status));
    Ok(redirect_with_notice(state, DOMAINS_ROUTE, notice))
}

fn redirect_with_notice(state: &AppState, target: &str, notice: Option<Notice>) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(notice) = notice {
        flash::set_flashes(
            &mut headers,
            &[FlashMessage {
                level: FlashLevel::Success,
                message: notice.text(state.views.notice_locale).to_string(),
            }],
        );
    }
    (headers, Redirect::to(target)).into_response()
}

fn is_xml_http_request(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("XMLHttpRequest"))
}

fn http_error(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => {
            error!(message = %err.message, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
