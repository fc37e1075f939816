//! Search command - semantic search over tasks or plugins

use anyhow::Result;
use colored::{ColoredString, Colorize};

use super::index::kind_label;
use super::{open_ready_index, Kind};
use wisetask_search::SearchConfig;

/// One row of human-readable output
struct Hit<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    tags: Vec<&'a str>,
    score: f32,
}

/// Run search command
pub fn run(kind: Kind, query: &str, top_k: i64, config: &SearchConfig, json: bool) -> Result<()> {
    let index = open_ready_index(config)?;

    match kind {
        Kind::Tasks => {
            let results = index.search_tasks(query, top_k)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }
            let hits = results
                .iter()
                .map(|r| Hit {
                    id: &r.id,
                    name: &r.name,
                    description: &r.description,
                    tags: vec![r.category.as_str()],
                    score: r.score,
                })
                .collect();
            print_hits(kind, query, hits);
        }
        Kind::Plugins => {
            let results = index.search_plugins(query, top_k)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }
            let hits = results
                .iter()
                .map(|r| Hit {
                    id: &r.id,
                    name: &r.name,
                    description: &r.description,
                    tags: vec![
                        r.category.as_str(),
                        r.graph_type.as_str(),
                        r.plugin_type.as_str(),
                    ],
                    score: r.score,
                })
                .collect();
            print_hits(kind, query, hits);
        }
    }

    Ok(())
}

fn print_hits(kind: Kind, query: &str, hits: Vec<Hit<'_>>) {
    if hits.is_empty() {
        println!(
            "{} No {} found for: {}",
            "→".dimmed(),
            kind_label(kind),
            query.cyan()
        );
        return;
    }

    println!(
        "{} {} results for: {}",
        "→".dimmed(),
        hits.len(),
        query.cyan()
    );
    println!();

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{}] {} {}",
            (i + 1).to_string().bold(),
            colored_score(hit.score),
            hit.name.cyan(),
            format!("({})", hit.id).dimmed()
        );

        if !hit.description.is_empty() {
            // char-aware truncation for Unicode
            let display = if hit.description.chars().count() > 100 {
                format!("{}...", hit.description.chars().take(100).collect::<String>())
            } else {
                hit.description.to_string()
            };
            println!("   {}", display.dimmed());
        }

        let tags: Vec<&str> = hit.tags.iter().copied().filter(|t| !t.is_empty()).collect();
        if !tags.is_empty() {
            println!("   {}", tags.join(" | "));
        }
        println!();
    }
}

fn colored_score(score: f32) -> ColoredString {
    let text = format!("{:.2}", score);
    if score > 0.8 {
        text.green()
    } else if score > 0.6 {
        text.yellow()
    } else {
        text.dimmed()
    }
}
