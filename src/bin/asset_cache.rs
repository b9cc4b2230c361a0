use clap::Parser;
use voucher_desk::config::cli::CacheCommand;
use voucher_desk::offline::{ResponseSource, RequestDestination};
use voucher_desk::utils::{logger, validation::Validate};
use voucher_desk::{
    AppConfig, AssetRequest, CacheCliConfig, HttpFetcher, LocalStorage, OfflineWorker, Result,
};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CacheCliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Cache command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        std::process::exit(e.severity().exit_code());
    }

    Ok(())
}

async fn run(cli: CacheCliConfig) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(cache_dir) = cli.cache_dir {
        config.offline.cache_dir = cache_dir;
        config.validate()?;
    }

    let worker = OfflineWorker::new(
        LocalStorage::new(&config.offline.cache_dir),
        HttpFetcher::new(config.fetch_timeout())?,
        config.worker_settings()?,
    );

    match cli.command {
        CacheCommand::Install => {
            let report = worker.install().await;
            match report.error {
                None => println!("✅ Cached {} assets", report.cached.len()),
                Some(message) => println!("⚠️  Install incomplete, nothing cached: {}", message),
            }
        }
        CacheCommand::Activate => {
            let report = worker.activate(chrono::Utc::now()).await?;
            for name in &report.removed_caches {
                println!("🗑️  Removed cache '{}'", name);
            }
            println!("✅ Activated; {} expired entries removed", report.expired);
        }
        CacheCommand::Fetch {
            url,
            method,
            document,
            out,
        } => {
            let mut request = AssetRequest::get(url::Url::parse(&url)?);
            request.method = method.to_ascii_uppercase();
            if document {
                request.destination = RequestDestination::Document;
            }

            let response = worker.fetch(&request).await?;
            let source = match response.source {
                ResponseSource::Cache => "cache",
                ResponseSource::Network => "network",
                ResponseSource::Fallback => "cached root document",
            };
            println!(
                "✅ {} {} from {} ({} bytes)",
                response.status,
                request.url,
                source,
                response.body.len()
            );
            if let Some(path) = out {
                tokio::fs::write(&path, &response.body).await?;
                println!("📁 Body saved to {}", path.display());
            }
        }
        CacheCommand::Cleanup => {
            let removed = worker.cleanup(chrono::Utc::now()).await?;
            println!("✅ {} expired entries removed", removed);
        }
        CacheCommand::List => {
            for name in worker.caches().keys().await? {
                let marker = if name == worker.settings().cache_name {
                    "*"
                } else {
                    " "
                };
                println!("{} {}", marker, name);
            }
            let entries = worker
                .caches()
                .open(&worker.settings().cache_name)
                .entries()
                .await?;
            for entry in entries {
                let date = entry
                    .response_date()
                    .map(|d| d.format("%d-%m-%Y %H:%M").to_string())
                    .unwrap_or_else(|| "no date".to_string());
                println!("   {}  {}  ({})", entry.status, entry.url, date);
            }
        }
    }
    Ok(())
}
