//! CLI + environment configuration. A `clap::Parser` derive struct: each flag
//! resolves from the CLI, then its upper-snake-case environment variable,
//! then a built-in default. Two fields whose defaults are computed from
//! another field's runtime value are filled in by [`Config::finish`] after
//! parsing.

use crate::partition::SearchType;
use clap::Parser;
use std::path::PathBuf;

/// Transforms a sorted Databus N-Triples dump into property-graph JSONL.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The Databus N-Triples input file path.
    #[arg(env = "INPUT_PATH", default_value = "sorted.nt")]
    pub input_path: PathBuf,

    /// The JSON output directory path (default: a timestamped directory).
    #[arg(env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Transform parts in parallel using a worker pool.
    #[arg(long, env = "PARALLEL", action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", default_value = "false")]
    pub parallel: bool,

    /// Shorten URIs by replacing known namespaces with their corresponding prefix.
    #[arg(long = "shorten-uris", env = "SHORTEN_URIS", action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", default_value = "false")]
    pub shorten_uris: bool,

    /// The approximate size of parts in bytes. Accepts scientific notation (e.g. `500e6`).
    #[arg(long, env = "TARGET_SIZE", default_value = "500e6", value_parser = cast_int)]
    pub target_size: u64,

    /// Only triples with this marker in the subject will be transformed.
    #[arg(long = "global-id-marker", env = "GLOBAL_ID_MARKER", default_value = "global.dbpedia.org/id/")]
    pub global_id_marker: String,

    /// The characters that precede `global_id_marker` in each triple.
    #[arg(long = "id-marker-prefix", env = "ID_MARKER_PREFIX", default_value = "<https://")]
    pub id_marker_prefix: String,

    /// The file in which parts are listed with their input file positions
    /// (default: `<output_dir>/parts.tsv`).
    #[arg(long = "parts-file", env = "PARTS_FILE")]
    pub parts_file: Option<PathBuf>,

    /// The number of seconds a part transformation is allowed to run
    /// (applies only to parallel execution).
    #[arg(long = "task-timeout", env = "TASK_TIMEOUT", default_value = "600")]
    pub task_timeout: u64,

    /// The search strategy used to skip to the first `global_id_marker` triple.
    #[arg(long = "search-type", env = "SEARCH_TYPE", default_value = "binary")]
    pub search_type: SearchType,

    /// The maximum number of iterations of the binary search main loop.
    #[arg(long = "bin-search-limit", env = "BIN_SEARCH_LIMIT", default_value = "120")]
    pub bin_search_limit: u32,

    /// The size of forward jumps in bytes, for `--search-type jump`.
    #[arg(long = "jump-size", env = "JUMP_SIZE", default_value = "350e6", value_parser = cast_int_signed)]
    pub jump_size: i64,

    /// The size of backpedals in bytes (default: `jump_size / 10`).
    #[arg(long = "backpedal-size", env = "BACKPEDAL_SIZE", value_parser = cast_int_signed)]
    pub backpedal_size: Option<i64>,

    /// Qualify the Namespace Prefixer's cache file; refreshed over HTTP on startup.
    #[arg(long = "namespaces-cache", env = "NAMESPACES_CACHE", default_value = "default-namespaces.json")]
    pub namespaces_cache: PathBuf,

    /// The namespace-declaration page scraped to refresh the prefixer table.
    #[arg(long = "namespaces-url", env = "NAMESPACES_URL", default_value = "http://dbpedia.org/sparql?nsdecl")]
    pub namespaces_url: String,

    /// Resolve global subjects and edge endpoints to canonical Wikidata IRIs
    /// via the SameThing service before writing them out.
    #[arg(long = "resolve-identity", env = "RESOLVE_IDENTITY", action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", default_value = "false")]
    pub resolve_identity: bool,

    /// Base URL of the SameThing lookup service (required when `--resolve-identity` is set).
    #[arg(long = "samething-service-url", env = "SAMETHING_SERVICE_URL", default_value = "https://global.dbpedia.org/")]
    pub samething_service_url: String,
}

impl Config {
    /// Fills in the two computed defaults that depend on another field's
    /// runtime value.
    pub fn finish(mut self) -> Self {
        let output_dir = self.output_dir.clone().unwrap_or_else(timestamped_output_dir);
        self.parts_file.get_or_insert_with(|| output_dir.join("parts.tsv"));
        self.output_dir = Some(output_dir);
        self.backpedal_size.get_or_insert(self.jump_size / 10);
        self
    }

    pub fn output_dir(&self) -> &std::path::Path {
        self.output_dir.as_deref().expect("Config::finish must run before output_dir is read")
    }

    pub fn parts_file(&self) -> &std::path::Path {
        self.parts_file.as_deref().expect("Config::finish must run before parts_file is read")
    }

    pub fn backpedal_size(&self) -> i64 {
        self.backpedal_size.expect("Config::finish must run before backpedal_size is read")
    }
}

fn timestamped_output_dir() -> PathBuf {
    let unix_secs = chrono::Utc::now().timestamp();
    PathBuf::from(format!("output_{unix_secs:x}"))
}

/// Parses a CLI/env integer value that may be given in scientific notation
/// (e.g. `"500e6"`) by parsing as a float and truncating.
fn cast_int(s: &str) -> Result<u64, String> {
    let f: f64 = s.parse().map_err(|e| format!("'{s}' is not a number: {e}"))?;
    if f < 0.0 {
        return Err(format!("'{s}' must not be negative"));
    }
    Ok(f.trunc() as u64)
}

fn cast_int_signed(s: &str) -> Result<i64, String> {
    let f: f64 = s.parse().map_err(|e| format!("'{s}' is not a number: {e}"))?;
    Ok(f.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_int_accepts_scientific_notation() {
        assert_eq!(cast_int("500e6").unwrap(), 500_000_000);
        assert_eq!(cast_int("42").unwrap(), 42);
    }

    #[test]
    fn cast_int_signed_accepts_scientific_notation() {
        assert_eq!(cast_int_signed("350e6").unwrap(), 350_000_000);
    }

    #[test]
    fn finish_computes_backpedal_and_parts_file_defaults() {
        let config = Config::parse_from(["databus-preloader", "in.nt", "--jump-size", "1000"]).finish();
        assert_eq!(config.backpedal_size(), 100);
        assert_eq!(config.parts_file(), config.output_dir().join("parts.tsv"));
    }

    #[test]
    fn explicit_backpedal_size_overrides_the_computed_default() {
        let config =
            Config::parse_from(["databus-preloader", "in.nt", "--jump-size", "1000", "--backpedal-size", "5"])
                .finish();
        assert_eq!(config.backpedal_size(), 5);
    }
}
