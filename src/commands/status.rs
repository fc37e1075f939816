//! Status command - show index statistics without loading the model

use anyhow::{Context, Result};
use colored::Colorize;

use wisetask_search::{SearchConfig, VectorStore};

/// Run status command
pub fn run(config: &SearchConfig, json: bool) -> Result<()> {
    let db_path = &config.db_path;

    if !db_path.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "exists": false,
                    "error": "Index not found"
                })
            );
        } else {
            println!(
                "{} Index not found at {}. Run {} first.",
                "!".yellow().bold(),
                db_path.display(),
                "wisetask-search index".cyan()
            );
        }
        return Ok(());
    }

    let store = VectorStore::open(db_path)
        .with_context(|| format!("Failed to open index at {}", db_path.display()))?;
    let stats = store.stats()?;
    let file_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    if json {
        let namespaces: serde_json::Map<String, serde_json::Value> = stats
            .namespaces
            .iter()
            .map(|ns| {
                (
                    ns.namespace.to_string(),
                    serde_json::json!({
                        "count": ns.count,
                        "last_indexed": ns.last_indexed,
                    }),
                )
            })
            .collect();

        println!(
            "{}",
            serde_json::json!({
                "exists": true,
                "namespaces": namespaces,
                "model_id": stats.model_id,
                "dimension": stats.dimension,
                "file_size_bytes": file_size,
                "configured_model": config.model.to_string(),
            })
        );
        return Ok(());
    }

    println!("{}", "Index Status".bold());
    println!();
    for ns in &stats.namespaces {
        let last = ns
            .last_indexed
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {} {} {} (last indexed: {})",
            "→".dimmed(),
            ns.count.to_string().cyan(),
            ns.namespace,
            last
        );
    }
    match (&stats.model_id, stats.dimension) {
        (Some(model), Some(dim)) => {
            println!("  {} Model: {} ({} dims)", "→".dimmed(), model, dim)
        }
        _ => println!("  {} Model: not bound yet", "→".dimmed()),
    }
    println!(
        "  {} Size: {:.2} KB",
        "→".dimmed(),
        file_size as f64 / 1024.0
    );

    Ok(())
}
