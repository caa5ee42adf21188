//! Configuration for blobmark paths and annotation settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BLOBMARK_HOME, BLOBMARK_BLOBS)
//! 2. Config file (.blobmark/config.yaml)
//! 3. Defaults (~/.blobmark)
//!
//! Config file discovery:
//! - Searches current directory and parents for .blobmark/config.yaml
//! - Paths in config file are relative to the config file's parent directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub annotation: Option<AnnotationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file): split, rating table, static artifacts
    pub home: Option<String>,
    /// Blob record directory (relative to config file)
    pub blobs: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    /// Record field the label is written to
    pub field: Option<String>,
    /// Identity of the person labeling
    pub annotator: Option<String>,
    /// Number of corpus items reserved as control probes
    pub control_length: Option<usize>,
    /// Denominator of the per-serve control probability (1/control_freq)
    pub control_freq: Option<u32>,
    /// Pixel margin around the cropped blob render
    pub enlarge: Option<u32>,
    /// Seed for the corpus shuffle and serving draws
    pub seed: Option<u64>,
    /// Label name to numeric value mapping
    #[serde(default)]
    pub values: HashMap<String, f64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to blobmark home (state directory)
    pub home: PathBuf,
    /// Absolute path to the blob record corpus
    pub blobs: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Annotation settings
    pub annotation: AnnotationSettings,
}

#[derive(Debug, Clone)]
pub struct AnnotationSettings {
    pub field: String,
    pub annotator: String,
    pub control_length: usize,
    pub control_freq: u32,
    pub enlarge: u32,
    pub seed: u64,
    pub values: HashMap<String, f64>,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            field: "relevant".to_string(),
            annotator: "anonymous".to_string(),
            control_length: 100,
            control_freq: 200,
            enlarge: 50,
            seed: 1992,
            values: [
                ("relevant".to_string(), 1.0),
                ("irrelevant".to_string(), 0.0),
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl AnnotationSettings {
    fn from_file(config: Option<&AnnotationConfig>) -> Self {
        let defaults = Self::default();
        let Some(config) = config else {
            return defaults;
        };

        Self {
            field: config.field.clone().unwrap_or(defaults.field),
            annotator: config.annotator.clone().unwrap_or(defaults.annotator),
            control_length: config.control_length.unwrap_or(defaults.control_length),
            control_freq: config.control_freq.unwrap_or(defaults.control_freq).max(1),
            enlarge: config.enlarge.unwrap_or(defaults.enlarge),
            seed: config.seed.unwrap_or(defaults.seed),
            values: if config.values.is_empty() {
                defaults.values
            } else {
                config.values.clone()
            },
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".blobmark").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".blobmark");

    // Check for config file
    let config_file = find_config_file();

    let (home, blobs, annotation) = if let Some(ref config_path) = config_file {
        // Config file found - use it as base
        let config = load_config_file(config_path)?;

        // Base directory is the parent of .blobmark/ (i.e., grandparent of config.yaml)
        let base_dir = config_path
            .parent() // .blobmark/
            .and_then(|p| p.parent()) // project root
            .unwrap_or(Path::new("."));

        // Resolve home path
        let home = if let Ok(env_home) = std::env::var("BLOBMARK_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            // home is relative to .blobmark/ directory
            let blobmark_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(blobmark_dir, home_path)
        } else {
            default_home.clone()
        };

        // Resolve blob corpus path
        let blobs = if let Ok(env_blobs) = std::env::var("BLOBMARK_BLOBS") {
            PathBuf::from(env_blobs)
        } else if let Some(ref blobs_path) = config.paths.blobs {
            resolve_path(base_dir, blobs_path)
        } else {
            home.join("blobs")
        };

        let annotation = AnnotationSettings::from_file(config.annotation.as_ref());

        (home, blobs, annotation)
    } else {
        // No config file - use env vars or defaults
        let home = std::env::var("BLOBMARK_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        let blobs = std::env::var("BLOBMARK_BLOBS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("blobs"));

        (home, blobs, AnnotationSettings::default())
    };

    Ok(ResolvedConfig {
        home,
        blobs,
        config_file,
        annotation,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

// ============================================================================
// Convenience functions
// ============================================================================

/// Get the blobmark home directory (state).
pub fn blobmark_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the blob corpus directory.
pub fn blobs_dir() -> Result<PathBuf> {
    Ok(config()?.blobs.clone())
}

/// Get the persisted control/normal split path ($BLOBMARK_HOME/split.json)
pub fn split_path() -> Result<PathBuf> {
    Ok(config()?.home.join("split.json"))
}

/// Get the annotator rating table path ($BLOBMARK_HOME/ratings.json)
pub fn ratings_path() -> Result<PathBuf> {
    Ok(config()?.home.join("ratings.json"))
}

/// Get the directory render artifacts are written to ($BLOBMARK_HOME/static)
pub fn static_dir() -> Result<PathBuf> {
    Ok(config()?.home.join("static"))
}
