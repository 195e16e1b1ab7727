use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use exporter::{ExportFormat, FileExporter};
use server_api::{
    create_trans_unit, invalidate_cache, list_domains, refresh, set_status,
    set_status_for_domain, ApiContext,
};
use shared::{
    domain::{TransUnitId, TransUnitStatus},
    error::ApiError,
    protocol::{NewTransUnitRequest, SubmitAction},
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;
use translation_cache::{DirectoryCodeCache, LocaleCache};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/translations.db")]
    database_url: String,
    /// Comma separated list of managed locales.
    #[arg(long, value_delimiter = ',', default_value = "en")]
    locales: Vec<String>,
    #[arg(long, default_value = "./data/cache/translations")]
    cache_dir: PathBuf,
    #[arg(long)]
    compiled_code_cache_dir: Option<PathBuf>,
    #[arg(long, default_value = "./data/translations")]
    export_dir: PathBuf,
    #[arg(long, default_value = "json")]
    export_format: ExportFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Writes translation files then clears every cache.
    Export,
    InvalidateCache {
        #[arg(long)]
        compiled_code: bool,
    },
    SetStatus {
        id: i64,
        status: TransUnitStatus,
    },
    SetDomainStatus {
        #[arg(long)]
        domain: Option<String>,
        status: TransUnitStatus,
    },
    ListDomains,
    CreateUnit {
        key: String,
        #[arg(long)]
        domain: Option<String>,
        /// `locale=content` pairs.
        #[arg(long = "translation", value_parser = parse_translation)]
        translations: Vec<(String, String)>,
    },
}

fn parse_translation(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(locale, content)| (locale.trim().to_string(), content.to_string()))
        .ok_or_else(|| format!("expected locale=content, got '{raw}'"))
}

fn api_error(err: ApiError) -> anyhow::Error {
    anyhow!("{:?}: {}", err.code, err.message)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let mut cache = LocaleCache::new(&cli.cache_dir);
    if let Some(dir) = &cli.compiled_code_cache_dir {
        cache = cache.with_compiled_code_cache(Arc::new(DirectoryCodeCache::new(dir)));
    }
    let ctx = ApiContext {
        exporter: Arc::new(FileExporter::new(
            storage.clone(),
            &cli.export_dir,
            cli.export_format,
        )),
        storage,
        cache,
        managed_locales: cli.locales.clone(),
    };

    match cli.command {
        Command::Export => {
            let outcome = refresh(&ctx).await.map_err(api_error)?;
            let report = outcome.export.map_err(|error| anyhow!(error))?;
            for file in &report.files {
                println!("{}", file.display());
            }
            info!(
                files = report.files.len(),
                messages = report.messages,
                cache_files_removed = outcome.invalidation.files_removed,
                "export finished"
            );
        }
        Command::InvalidateCache { compiled_code } => {
            let report = invalidate_cache(&ctx, compiled_code)
                .await
                .map_err(api_error)?;
            println!(
                "removed {} cache files (compiled code cleared: {})",
                report.files_removed, report.compiled_code_cleared
            );
        }
        Command::SetStatus { id, status } => {
            set_status(&ctx, TransUnitId(id), status)
                .await
                .map_err(api_error)?;
            println!("trans unit {id} is now {status}");
        }
        Command::SetDomainStatus { domain, status } => {
            let change = set_status_for_domain(&ctx, domain.as_deref(), status)
                .await
                .map_err(api_error)?;
            println!(
                "{} units of domain '{}' are now {}",
                change.updated, change.domain, change.status
            );
        }
        Command::ListDomains => {
            for domain in list_domains(&ctx).await.map_err(api_error)? {
                println!("{domain}");
            }
        }
        Command::CreateUnit {
            key,
            domain,
            translations,
        } => {
            let req = NewTransUnitRequest {
                key,
                domain,
                translations: translations.into_iter().collect::<BTreeMap<_, _>>(),
                submit: SubmitAction::Save,
            };
            let unit = create_trans_unit(&ctx, &req).await.map_err(api_error)?;
            println!("created trans_unit_id={} in domain '{}'", unit.id.0, unit.domain);
        }
    }

    Ok(())
}
