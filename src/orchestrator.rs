//! Orchestrator: drives the [`crate::partition`] module to completion,
//! dispatches each part to a worker (sequential loop or thread pool), and
//! merges per-part predicate histograms into `predicate-counts.json`.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::namespace::NamespacePrefixer;
use crate::ntriples;
use crate::partition::{self, Part, PartitionParams};
use crate::samething::SameThingClient;
use crate::sink::PropertyGraphSink;
use indexmap::IndexMap;
use log::info;
use std::fs::File;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// Runs the full pipeline: partition `config.input_path`, transform every
/// part (serially or via a bounded worker pool per `config.parallel`), and
/// write the predicate-count summary. Returns the path to that summary.
pub fn run(config: &Config) -> Result<std::path::PathBuf> {
    if !config.input_path.exists() {
        return Err(Error::Io {
            path: config.input_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "input file not found"),
        });
    }

    info!("reading from {}", config.input_path.display());

    let prefixer = config.shorten_uris.then(|| NamespacePrefixer::load(&config.namespaces_cache, &config.namespaces_url));
    let same_thing = config.resolve_identity.then(|| SameThingClient::new(config.samething_service_url.clone()));

    let params = PartitionParams {
        input_path: config.input_path.clone(),
        parts_file: config.parts_file().to_owned(),
        output_dir: config.output_dir().to_owned(),
        target_size: config.target_size,
        global_id_marker: config.global_id_marker.clone(),
        id_marker_prefix: config.id_marker_prefix.clone(),
        search_type: config.search_type,
        bin_search_limit: config.bin_search_limit,
        jump_size: config.jump_size,
        backpedal_size: config.backpedal_size(),
    };

    let parts = partition::compute_parts(params)?;

    let results: Vec<(String, IndexMap<String, u64>)> = if config.parallel {
        run_parallel(config, parts, prefixer.map(Arc::new), same_thing.map(Arc::new))?
    } else {
        run_sequential(config, parts, prefixer.as_ref(), same_thing.as_ref())?
    };

    write_summary(config.output_dir(), &results)
}

fn run_sequential(
    config: &Config,
    parts: impl Iterator<Item = std::result::Result<Part, partition::Error>>,
    prefixer: Option<&NamespacePrefixer>,
    same_thing: Option<&SameThingClient>,
) -> Result<Vec<(String, IndexMap<String, u64>)>> {
    let mut results = Vec::new();
    for part in parts {
        let part = part?;
        let counts = transform_part(&config.input_path, &config.global_id_marker, &part, prefixer, same_thing, None)?;
        results.push((part.name, counts));
    }
    Ok(results)
}

enum ProgressMsg {
    Delta(u64),
    Done,
}

/// Dispatches every part onto `pool` without blocking the calling thread
/// (`ThreadPool::spawn`, not `pool.scope`, since a scope would wait for
/// every worker to finish before this function could start applying the
/// per-task timeout below) and collects results as they arrive.
fn run_parallel(
    config: &Config,
    parts: impl Iterator<Item = std::result::Result<Part, partition::Error>>,
    prefixer: Option<Arc<NamespacePrefixer>>,
    same_thing: Option<Arc<SameThingClient>>,
) -> Result<Vec<(String, IndexMap<String, u64>)>> {
    // Parts are generated eagerly into the pool rather than gated on worker
    // availability; this also lets a partition failure abort before any
    // worker is spawned.
    let parts: Vec<Part> = parts.collect::<std::result::Result<Vec<_>, _>>()?;

    let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).saturating_sub(1).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::Io {
            path: config.output_dir().to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;

    let (progress_tx, progress_rx) = mpsc::sync_channel::<ProgressMsg>(1024);
    let listener = std::thread::spawn(move || {
        let mut total = 0u64;
        loop {
            match progress_rx.recv() {
                Ok(ProgressMsg::Delta(n)) => {
                    total += n;
                    info!("progress: {total} bytes processed");
                }
                Ok(ProgressMsg::Done) | Err(_) => break,
            }
        }
    });

    let input_path = Arc::new(config.input_path.clone());
    let global_id_marker = Arc::new(config.global_id_marker.clone());

    // Every part is dispatched up front, each carrying its own result
    // channel, and the timeout is applied per task as results are collected
    // in submission order.
    let mut receivers = Vec::with_capacity(parts.len());
    for part in parts {
        let (tx, rx) = mpsc::channel();
        let progress_tx = progress_tx.clone();
        let prefixer = prefixer.clone();
        let same_thing = same_thing.clone();
        let input_path = Arc::clone(&input_path);
        let global_id_marker = Arc::clone(&global_id_marker);
        let part_name = part.name.clone();
        pool.spawn(move || {
            let outcome = transform_part(
                &input_path,
                &global_id_marker,
                &part,
                prefixer.as_deref(),
                same_thing.as_deref(),
                Some(&progress_tx),
            );
            let _ = tx.send(outcome);
        });
        receivers.push((part_name, rx));
    }
    drop(progress_tx);

    let results = collect_with_timeout(receivers, Duration::from_secs(config.task_timeout))?;
    let _ = listener.join();
    Ok(results)
}

/// Waits for each part's worker result in submission order, applying
/// `timeout` per task: a worker that hasn't answered within the budget is
/// abandoned and the whole run fails, with no retry.
fn collect_with_timeout(
    receivers: Vec<(String, mpsc::Receiver<Result<IndexMap<String, u64>>>)>,
    timeout: Duration,
) -> Result<Vec<(String, IndexMap<String, u64>)>> {
    let mut results = Vec::with_capacity(receivers.len());
    for (part_name, rx) in receivers {
        match rx.recv_timeout(timeout) {
            Ok(Ok(counts)) => results.push((part_name, counts)),
            Ok(Err(err)) => return Err(err),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(Error::Timeout { part_name, timeout_secs: timeout.as_secs() });
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(Error::WorkerPanicked { part_name });
            }
        }
    }
    Ok(results)
}

fn transform_part(
    input_path: &Path,
    global_id_marker: &str,
    part: &Part,
    prefixer: Option<&NamespacePrefixer>,
    same_thing: Option<&SameThingClient>,
    progress: Option<&mpsc::SyncSender<ProgressMsg>>,
) -> Result<IndexMap<String, u64>> {
    info!("starting {}: {} -- {}", part.name, part.start, part.end);

    let file = File::open(input_path).map_err(|source| Error::Io { path: input_path.to_owned(), source })?;
    let mut sink = PropertyGraphSink::new(global_id_marker, &part.path, prefixer, same_thing)?;

    let parse_result = ntriples::parse_range(file, part.start, part.end, &mut sink, |delta| {
        if let Some(tx) = progress {
            let _ = tx.send(ProgressMsg::Delta(delta));
        }
    });

    match parse_result {
        Ok(()) => {
            let counts = sink.finish()?;
            let total: u64 = counts.values().sum();
            info!("finished {}: {total} triples", part.name);
            Ok(counts)
        }
        Err(err) => {
            sink.abort();
            Err(err.into())
        }
    }
}

fn write_summary(output_dir: &std::path::Path, results: &[(String, IndexMap<String, u64>)]) -> Result<std::path::PathBuf> {
    let summary: IndexMap<&str, &IndexMap<String, u64>> =
        results.iter().map(|(name, counts)| (name.as_str(), counts)).collect();
    let summary_path = output_dir.join("predicate-counts.json");
    let file = File::create(&summary_path).map_err(|source| Error::Io { path: summary_path.clone(), source })?;
    // `serde_json::to_writer_pretty` hardcodes a 2-space indent; the summary
    // format calls for 4 spaces.
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(file, formatter);
    serde::Serialize::serialize(&summary, &mut serializer)
        .map_err(|source| Error::Io { path: summary_path.clone(), source: source.into() })?;
    Ok(summary_path)
}
