use std::sync::Arc;

use exporter::{ExportReport, TranslationExporter};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{domain_or_default, TransUnitId, TransUnitStatus},
    error::ApiError,
    protocol::{
        DomainStatusChange, NewTransUnitRequest, TransUnitPage, TransUnitSummary,
        TranslationPayload,
    },
};
use storage::{Storage, StoredTransUnit, StoredTranslation, TransUnitFilter};
use tracing::{info, warn};
use translation_cache::{CacheError, InvalidationReport, LocaleCache};

pub mod notice;

pub use notice::{Notice, NoticeLocale};

/// Status given to units created through the admin form.
pub const NEW_UNIT_STATUS: TransUnitStatus = TransUnitStatus::Waiting;

const MAX_KEY_LEN: usize = 255;
const DEFAULT_ROWS: u32 = 20;
const MAX_ROWS: u32 = 200;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub cache: LocaleCache,
    pub exporter: Arc<dyn TranslationExporter>,
    pub managed_locales: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TransUnitQuery {
    pub domain: Option<String>,
    pub status: Option<TransUnitStatus>,
    pub page: Option<u32>,
    pub rows: Option<u32>,
}

#[derive(Debug)]
pub struct RefreshOutcome {
    pub export: Result<ExportReport, String>,
    pub invalidation: InvalidationReport,
}

pub async fn set_status(
    ctx: &ApiContext,
    id: TransUnitId,
    status: TransUnitStatus,
) -> Result<(), ApiError> {
    let updated = ctx
        .storage
        .set_status(id, status)
        .await
        .map_err(internal)?;
    if updated == 0 {
        return Err(ApiError::not_found(format!("trans unit {} not found", id.0)));
    }
    info!(id = id.0, %status, "trans unit status changed");
    Ok(())
}

/// Sets the status of every unit in `domain` (`messages` when absent). A
/// domain without units is left as is and reports zero updates.
pub async fn set_status_for_domain(
    ctx: &ApiContext,
    domain: Option<&str>,
    status: TransUnitStatus,
) -> Result<DomainStatusChange, ApiError> {
    let domain = domain_or_default(domain);
    if domain.trim().is_empty() {
        return Err(ApiError::validation("domain cannot be blank"));
    }
    let updated = ctx
        .storage
        .set_status_for_domain(domain, status)
        .await
        .map_err(internal)?;
    info!(%domain, %status, updated, "domain status changed");
    Ok(DomainStatusChange {
        domain: domain.to_string(),
        status,
        updated,
    })
}

/// Drops the compiled catalogues of the managed locales, and the
/// compiled-code cache when `clear_compiled_code` is set.
pub async fn invalidate_cache(
    ctx: &ApiContext,
    clear_compiled_code: bool,
) -> Result<InvalidationReport, ApiError> {
    let cache = ctx.cache.clone();
    let locales = ctx.managed_locales.clone();
    tokio::task::spawn_blocking(move || cache.invalidate_locales(&locales, clear_compiled_code))
        .await
        .map_err(|error| ApiError::internal(format!("cache invalidation task failed: {error}")))?
        .map_err(cache_error)
}

/// Exports the store to translation files, then clears the locale and
/// compiled-code caches. The caches are cleared even when the export
/// failed; the failure is only reported in the outcome.
pub async fn refresh(ctx: &ApiContext) -> Result<RefreshOutcome, ApiError> {
    let export = match ctx.exporter.export(&ctx.managed_locales).await {
        Ok(report) => Ok(report),
        Err(error) => {
            let error = format!("{error:#}");
            warn!(%error, "translation export failed; clearing caches anyway");
            Err(error)
        }
    };
    let invalidation = invalidate_cache(ctx, true).await?;
    Ok(RefreshOutcome {
        export,
        invalidation,
    })
}

pub async fn list_domains(ctx: &ApiContext) -> Result<Vec<String>, ApiError> {
    ctx.storage.list_domains().await.map_err(internal)
}

pub async fn get_trans_unit(
    ctx: &ApiContext,
    id: TransUnitId,
) -> Result<TransUnitSummary, ApiError> {
    ctx.storage
        .load_trans_unit(id)
        .await
        .map_err(internal)?
        .map(summary)
        .ok_or_else(|| ApiError::not_found(format!("trans unit {} not found", id.0)))
}

pub async fn list_trans_units(
    ctx: &ApiContext,
    query: &TransUnitQuery,
) -> Result<TransUnitPage, ApiError> {
    let rows = query.rows.unwrap_or(DEFAULT_ROWS).clamp(1, MAX_ROWS);
    let page = query.page.unwrap_or(1).max(1);
    let filter = TransUnitFilter {
        domain: query
            .domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        status: query.status,
    };
    let offset = u64::from(page - 1) * u64::from(rows);

    let total = ctx
        .storage
        .count_trans_units(&filter)
        .await
        .map_err(internal)?;
    let units = ctx
        .storage
        .list_trans_units(&filter, rows, offset)
        .await
        .map_err(internal)?;

    Ok(TransUnitPage {
        total,
        page,
        rows,
        units: units.into_iter().map(summary).collect(),
    })
}

pub async fn create_trans_unit(
    ctx: &ApiContext,
    req: &NewTransUnitRequest,
) -> Result<TransUnitSummary, ApiError> {
    let key = req.key.trim();
    if key.is_empty() {
        return Err(ApiError::validation("key cannot be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(ApiError::validation(format!(
            "key cannot exceed {MAX_KEY_LEN} bytes"
        )));
    }

    let domain = domain_or_default(req.domain.as_deref().map(str::trim).filter(|d| !d.is_empty()));
    if domain.contains(['/', '\\']) || domain.starts_with('.') {
        return Err(ApiError::validation(
            "domain must not contain path separators or start with a dot",
        ));
    }

    let mut translations = Vec::with_capacity(req.translations.len());
    for (locale, content) in &req.translations {
        if !ctx.managed_locales.iter().any(|managed| managed == locale) {
            return Err(ApiError::validation(format!(
                "locale '{locale}' is not managed"
            )));
        }
        if content.trim().is_empty() {
            continue;
        }
        translations.push(StoredTranslation {
            locale: locale.clone(),
            content: content.clone(),
        });
    }

    if ctx
        .storage
        .find_trans_unit_id(key, domain)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::validation(format!(
            "key '{key}' already exists in domain '{domain}'"
        )));
    }

    let id = ctx
        .storage
        .create_trans_unit(key, domain, NEW_UNIT_STATUS, &translations)
        .await
        .map_err(internal)?;
    info!(id = id.0, %key, %domain, locales = translations.len(), "trans unit created");

    get_trans_unit(ctx, id).await
}

fn summary(unit: StoredTransUnit) -> TransUnitSummary {
    TransUnitSummary {
        id: unit.id,
        key: unit.key,
        domain: unit.domain,
        status: unit.status,
        created_at: unit.created_at,
        translations: unit
            .translations
            .into_iter()
            .map(|t| TranslationPayload {
                locale: t.locale,
                content: t.content,
            })
            .collect(),
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(format!("{err:#}"))
}

fn cache_error(err: CacheError) -> ApiError {
    ApiError::internal(err.to_string())
}
