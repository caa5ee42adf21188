//! Command-line interface for blobmark.
//!
//! Provides the interactive annotation loop plus commands for inspecting
//! corpus progress, the persisted split, annotator ratings, and the
//! resolved configuration.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;

use crate::config;
use crate::core::{rating, AnnotationManager, ManagerOptions, ServeError};
use crate::domain::Served;
use crate::store::{annotations, discover_records, CorpusSplit, RatingTable};

/// blobmark - annotation loop for music-score blob datasets
#[derive(Parser, Debug)]
#[command(name = "blobmark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Label blobs interactively, one at a time
    Annotate {
        /// Annotate under a different identity than the configured one
        #[arg(short, long)]
        annotator: Option<String>,

        /// Stop after this many labels
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show per-field annotation counts across the corpus
    Stats,

    /// Show (creating if needed) the persisted control/normal split
    Split,

    /// Show the trust score of an annotator
    Rating {
        /// Annotator identity (defaults to the configured one)
        annotator: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Annotate { annotator, limit } => annotate(annotator, limit).await,
            Commands::Stats => show_stats().await,
            Commands::Split => show_split().await,
            Commands::Rating { annotator } => show_rating(annotator).await,
            Commands::Config => show_config(),
        }
    }
}

/// Run the interactive annotation loop
async fn annotate(annotator: Option<String>, limit: Option<usize>) -> Result<()> {
    let config = config::config()?;
    let mut options = ManagerOptions::from_config(config);
    if let Some(annotator) = annotator {
        options.annotator = annotator;
    }

    let corpus = discover_records(&config.blobs)?;
    if corpus.is_empty() {
        anyhow::bail!("No blob records found under {}", config.blobs.display());
    }

    let mut labels: Vec<(&String, &f64)> = config.annotation.values.iter().collect();
    labels.sort_by(|a, b| a.0.cmp(b.0));

    let mut manager = AnnotationManager::open(options, corpus).await?;
    if let Some(event) = manager.take_rating_event() {
        println!("Your rating from previous sessions: {}", event.score);
    }

    println!("Labeling as '{}'.", manager.annotator());
    let choices: Vec<&str> = labels.iter().map(|(name, _)| name.as_str()).collect();
    println!(
        "Labels: {}. 'b' = back, 'f' = forward, 'q' = quit.",
        choices.join(", ")
    );

    let mut current = match manager.ask(None).await {
        Ok(served) => served,
        Err(ServeError::Exhausted) => {
            println!("Nothing to do: every normal item already carries a label.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // How far back we are navigated; 0 = the live item (history index 1)
    let mut depth: usize = 0;
    let mut labeled = 0usize;
    let stdin = io::stdin();

    loop {
        present(&current);
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // stdin closed
            manager.cleanup(&current.render.unique_id)?;
            break;
        }
        let input = line.trim();

        match input {
            "q" => {
                manager.cleanup(&current.render.unique_id)?;
                break;
            }
            "b" => match manager.ask(Some(depth + 2)).await {
                Ok(served) => {
                    manager.cleanup(&current.render.unique_id)?;
                    current = served;
                    depth += 1;
                }
                Err(ServeError::EndedHistory { .. }) => {
                    println!("No further history.");
                }
                Err(e) => return Err(e.into()),
            },
            "f" => {
                if depth == 0 {
                    println!("Already at the latest item.");
                } else {
                    let served = manager.ask(Some(depth)).await?;
                    manager.cleanup(&current.render.unique_id)?;
                    current = served;
                    depth -= 1;
                }
            }
            label => {
                let Some((_, value)) = labels.iter().find(|(name, _)| name.as_str() == label)
                else {
                    println!("Unknown label '{label}'. Choices: {}.", choices.join(", "));
                    continue;
                };

                manager
                    .save_annotation(
                        &current.record_path,
                        current.is_control,
                        **value,
                        &current.render.unique_id,
                    )
                    .await?;
                labeled += 1;

                if let Some(event) = manager.take_rating_event() {
                    println!(">>> New annotator rating: {} <<<", event.score);
                }

                if limit.is_some_and(|max| labeled >= max) {
                    println!("Stopping after {labeled} labels.");
                    break;
                }

                depth = 0;
                current = match manager.ask(None).await {
                    Ok(served) => served,
                    Err(ServeError::Exhausted) => {
                        println!("Corpus exhausted: every normal item now carries a label.");
                        break;
                    }
                    Err(e) => return Err(e.into()),
                };
            }
        }
    }

    println!("Labeled {labeled} items this session.");
    Ok(())
}

/// Print one served item
fn present(served: &Served) {
    println!();
    println!("Record: {}", served.record_path.display());
    if served.render.page_parts.len() >= 2 {
        let source = &served.render.page_parts[served.render.page_parts.len() - 2..];
        println!("Source: {}", source.join(" / "));
    }
    println!("Blob:   {}", served.render.blob_image.display());
    println!("Page:   {}", served.render.page_image.display());
}

/// Show per-field annotation counts (which fields are filled how often)
async fn show_stats() -> Result<()> {
    let config = config::config()?;
    let files = discover_records(&config.blobs)?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for file in &files {
        let raw = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read blob record: {}", file.display()))?;
        let record: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse blob record: {}", file.display()))?;

        if let Some(object) = record.as_object() {
            for (field, value) in object {
                if !value.is_null() {
                    *counts.entry(field.clone()).or_default() += 1;
                }
            }
        }
    }

    println!("Non-empty field counts across the corpus:");
    for (field, count) in &counts {
        println!("  {field}: {count}");
    }
    println!("Total number of records: {}", files.len());

    Ok(())
}

/// Show the persisted corpus split and labeling progress
async fn show_split() -> Result<()> {
    let config = config::config()?;
    let corpus = discover_records(&config.blobs)?;
    let mut rng = StdRng::seed_from_u64(config.annotation.seed);

    let split = CorpusSplit::load_or_create(
        &config::split_path()?,
        corpus,
        config.annotation.control_length,
        &mut rng,
    )
    .await?;

    let mut annotated = 0usize;
    for path in &split.normal {
        if annotations::read_field(path, &config.annotation.field)
            .await?
            .is_some()
        {
            annotated += 1;
        }
    }

    println!("Corpus: {} records", split.len());
    println!("  control: {}", split.control.len());
    println!("  normal:  {}", split.normal.len());
    println!(
        "  labeled: {}/{} ({}%)",
        annotated,
        split.normal.len(),
        if split.normal.is_empty() {
            100
        } else {
            annotated * 100 / split.normal.len()
        }
    );

    Ok(())
}

/// Show the trust score of an annotator
async fn show_rating(annotator: Option<String>) -> Result<()> {
    let config = config::config()?;
    let annotator = annotator.unwrap_or_else(|| config.annotation.annotator.clone());

    let table = RatingTable::load(&config::ratings_path()?).await?;
    match rating::compute(&table, &annotator) {
        Some(score) => println!("{annotator}: {score}%"),
        None => println!("{annotator}: no rating yet (needs repeated control exposures)"),
    }

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("home:   {}", config.home.display());
    println!("blobs:  {}", config.blobs.display());
    match &config.config_file {
        Some(path) => println!("config: {}", path.display()),
        None => println!("config: (defaults, no config file found)"),
    }

    let annotation = &config.annotation;
    println!("annotation:");
    println!("  field:          {}", annotation.field);
    println!("  annotator:      {}", annotation.annotator);
    println!("  control_length: {}", annotation.control_length);
    println!("  control_freq:   {}", annotation.control_freq);
    println!("  enlarge:        {}", annotation.enlarge);
    println!("  seed:           {}", annotation.seed);

    let mut labels: Vec<_> = annotation.values.iter().collect();
    labels.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in labels {
        println!("  value:          {name} = {value}");
    }

    Ok(())
}
