use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, QueryBuilder, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{TransUnitId, TransUnitStatus};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTranslation {
    pub locale: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct StoredTransUnit {
    pub id: TransUnitId,
    pub key: String,
    pub domain: String,
    pub status: TransUnitStatus,
    pub created_at: DateTime<Utc>,
    pub translations: Vec<StoredTranslation>,
}

/// One translated message as the exporter consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportableTranslation {
    pub domain: String,
    pub locale: String,
    pub key: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransUnitFilter {
    pub domain: Option<String>,
    pub status: Option<TransUnitStatus>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Inserts a unit and its translations in one transaction.
    pub async fn create_trans_unit(
        &self,
        key: &str,
        domain: &str,
        status: TransUnitStatus,
        translations: &[StoredTranslation],
    ) -> Result<TransUnitId> {
        let mut tx = self.pool.begin().await?;

        let rec = sqlx::query(
            "INSERT INTO trans_units (key_name, domain, status) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(key)
        .bind(domain)
        .bind(status.code())
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to insert trans unit '{key}' in domain '{domain}'"))?;
        let id = TransUnitId(rec.get::<i64, _>(0));

        for translation in translations {
            sqlx::query(
                "INSERT INTO translations (trans_unit_id, locale, content) VALUES (?, ?, ?)",
            )
            .bind(id.0)
            .bind(&translation.locale)
            .bind(&translation.content)
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!(
                    "failed to insert '{}' translation for trans unit {}",
                    translation.locale, id.0
                )
            })?;
        }

        tx.commit().await?;
        Ok(id)
    }

    pub async fn find_trans_unit_id(&self, key: &str, domain: &str) -> Result<Option<TransUnitId>> {
        let row = sqlx::query("SELECT id FROM trans_units WHERE key_name = ? AND domain = ?")
            .bind(key)
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| TransUnitId(r.get::<i64, _>(0))))
    }

    pub async fn load_trans_unit(&self, id: TransUnitId) -> Result<Option<StoredTransUnit>> {
        let row = sqlx::query(
            "SELECT id, key_name, domain, status, created_at FROM trans_units WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut unit = unit_from_row(&row)?;
        unit.translations = self
            .translations_for_units(&[unit.id])
            .await?
            .remove(&unit.id)
            .unwrap_or_default();
        Ok(Some(unit))
    }

    /// Units matching `filter`, ordered by id, with their translations.
    pub async fn list_trans_units(
        &self,
        filter: &TransUnitFilter,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<StoredTransUnit>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, key_name, domain, status, created_at FROM trans_units",
        );
        push_filter(&mut query, filter);
        query.push(" ORDER BY id ASC LIMIT ");
        query.push_bind(i64::from(limit));
        query.push(" OFFSET ");
        query.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut units = rows
            .iter()
            .map(unit_from_row)
            .collect::<Result<Vec<_>>>()?;

        let ids: Vec<TransUnitId> = units.iter().map(|u| u.id).collect();
        let mut translations = self.translations_for_units(&ids).await?;
        for unit in &mut units {
            unit.translations = translations.remove(&unit.id).unwrap_or_default();
        }
        Ok(units)
    }

    pub async fn count_trans_units(&self, filter: &TransUnitFilter) -> Result<u64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM trans_units");
        push_filter(&mut query, filter);
        let count: i64 = query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Distinct domains present in the store, sorted.
    pub async fn list_domains(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT domain FROM trans_units GROUP BY domain ORDER BY domain")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }

    /// Overwrites the status of one unit. Returns the number of rows
    /// touched, so zero means the id is unknown.
    pub async fn set_status(&self, id: TransUnitId, status: TransUnitStatus) -> Result<u64> {
        let updated = sqlx::query("UPDATE trans_units SET status = ? WHERE id = ?")
            .bind(status.code())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to set status of trans unit {}", id.0))?
            .rows_affected();
        debug!(id = id.0, %status, updated, "trans unit status written");
        Ok(updated)
    }

    /// Overwrites the status of every unit in `domain` with a single
    /// statement.
    pub async fn set_status_for_domain(&self, domain: &str, status: TransUnitStatus) -> Result<u64> {
        let updated = sqlx::query("UPDATE trans_units SET status = ? WHERE domain = ?")
            .bind(status.code())
            .bind(domain)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to set status of domain '{domain}'"))?
            .rows_affected();
        debug!(%domain, %status, updated, "domain status written");
        Ok(updated)
    }

    pub async fn list_translations_for_locales(
        &self,
        locales: &[String],
    ) -> Result<Vec<ExportableTranslation>> {
        if locales.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT u.domain, t.locale, u.key_name, t.content
             FROM translations t
             INNER JOIN trans_units u ON u.id = t.trans_unit_id
             WHERE t.locale IN (",
        );
        let mut separated = query.separated(", ");
        for locale in locales {
            separated.push_bind(locale);
        }
        separated.push_unseparated(")");
        query.push(" ORDER BY u.domain, t.locale, u.key_name");

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|r| ExportableTranslation {
                domain: r.get::<String, _>(0),
                locale: r.get::<String, _>(1),
                key: r.get::<String, _>(2),
                content: r.get::<String, _>(3),
            })
            .collect())
    }

    async fn translations_for_units(
        &self,
        ids: &[TransUnitId],
    ) -> Result<HashMap<TransUnitId, Vec<StoredTranslation>>> {
        let mut by_unit: HashMap<TransUnitId, Vec<StoredTranslation>> = HashMap::new();
        if ids.is_empty() {
            return Ok(by_unit);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT trans_unit_id, locale, content FROM translations WHERE trans_unit_id IN (",
        );
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.0);
        }
        separated.push_unseparated(")");
        query.push(" ORDER BY trans_unit_id, locale");

        let rows = query.build().fetch_all(&self.pool).await?;
        for row in rows {
            by_unit
                .entry(TransUnitId(row.get::<i64, _>(0)))
                .or_default()
                .push(StoredTranslation {
                    locale: row.get::<String, _>(1),
                    content: row.get::<String, _>(2),
                });
        }
        Ok(by_unit)
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &TransUnitFilter) {
    let mut has_where = false;
    if let Some(domain) = &filter.domain {
        query.push(" WHERE domain = ");
        query.push_bind(domain.clone());
        has_where = true;
    }
    if let Some(status) = filter.status {
        query.push(if has_where { " AND " } else { " WHERE " });
        query.push("status = ");
        query.push_bind(status.code());
    }
}

fn unit_from_row(row: &SqliteRow) -> Result<StoredTransUnit> {
    let id = row.get::<i64, _>(0);
    let code = row.get::<i64, _>(3);
    let status = TransUnitStatus::from_code(code)
        .with_context(|| format!("trans unit {id} has unknown status code {code}"))?;
    Ok(StoredTransUnit {
        id: TransUnitId(id),
        key: row.get::<String, _>(1),
        domain: row.get::<String, _>(2),
        status,
        created_at: row.get::<DateTime<Utc>, _>(4),
        translations: Vec::new(),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
