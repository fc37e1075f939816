pub mod index;
pub mod search;
pub mod status;

use anyhow::{Context, Result};
use clap::ValueEnum;
use wisetask_search::{SearchConfig, SemanticIndex};

/// Which namespace a command operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Tasks,
    Plugins,
}

/// Open the index and load the model, so a bad model fails before any work
pub fn open_ready_index(config: &SearchConfig) -> Result<SemanticIndex> {
    let index = SemanticIndex::open(config)
        .with_context(|| format!("Failed to open index at {}", config.db_path.display()))?;
    index
        .warmup()
        .with_context(|| format!("Failed to load embedding model '{}'", config.model))?;
    Ok(index)
}
