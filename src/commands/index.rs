//! Index command - bulk index tasks or plugins from JSON

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use super::{open_ready_index, Kind};
use wisetask_search::{BulkIndexRequest, PluginBulkIndexRequest, PluginIn, SearchConfig, TaskIn};

/// Either a bare array of records or the bulk request object
#[derive(Deserialize)]
#[serde(untagged)]
enum Batch<R, W> {
    Records(Vec<R>),
    Request(W),
}

/// Run index command
pub fn run(kind: Kind, input: &Path, config: &SearchConfig, json: bool) -> Result<()> {
    let raw = read_input(input)?;
    let index = open_ready_index(config)?;
    let start = Instant::now();

    let count = match kind {
        Kind::Tasks => {
            let tasks = match serde_json::from_str::<Batch<TaskIn, BulkIndexRequest>>(&raw)
                .context("Invalid task JSON")?
            {
                Batch::Records(tasks) => tasks,
                Batch::Request(request) => request.tasks,
            };
            index.bulk_index_tasks(tasks)?
        }
        Kind::Plugins => {
            let plugins = match serde_json::from_str::<Batch<PluginIn, PluginBulkIndexRequest>>(&raw)
                .context("Invalid plugin JSON")?
            {
                Batch::Records(plugins) => plugins,
                Batch::Request(request) => request.plugins,
            };
            index.bulk_index_plugins(plugins)?
        }
    };

    if json {
        println!("{}", serde_json::to_string(&count)?);
    } else {
        println!(
            "{} Indexed {} {} in {:.2}s",
            "✓".green().bold(),
            count.indexed.to_string().cyan(),
            kind_label(kind),
            start.elapsed().as_secs_f64()
        );
        println!(
            "  {} Index saved to: {}",
            "→".dimmed(),
            config.db_path.display()
        );
    }

    Ok(())
}

/// Read the whole file, or stdin when the path is `-`
fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}

pub(crate) fn kind_label(kind: Kind) -> &'static str {
    match kind {
        Kind::Tasks => "tasks",
        Kind::Plugins => "plugins",
    }
}
