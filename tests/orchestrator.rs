//! End-to-end sequential-mode run over a small synthetic dump, exercising
//! partitioning, N-Triples parsing and property-graph sink output together.

use databus_preloader::config::Config;
use databus_preloader::orchestrator;
use databus_preloader::partition::SearchType;
use indexmap::IndexMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

fn write_dump(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("dump.nt");
    // fs_err::File gives this fixture write a path-annotated error message
    // instead of std::fs::File's bare "No such file or directory".
    let mut f = fs_err::File::create(&path).unwrap();
    writeln!(f, "<http://dbpedia.org/resource/Berlin> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://dbpedia.org/ontology/Place> .").unwrap();
    for i in 0..200 {
        writeln!(
            f,
            "<https://global.dbpedia.org/id/E{i:04}> <http://www.w3.org/2000/01/rdf-schema#label> \"Entity {i}\"@en ."
        )
        .unwrap();
        writeln!(
            f,
            "<https://global.dbpedia.org/id/E{i:04}> <http://dbpedia.org/ontology/knows> <https://global.dbpedia.org/id/E{next:04}> .",
            next = (i + 1) % 200
        )
        .unwrap();
    }
    path
}

fn config(dir: &std::path::Path, input_path: PathBuf) -> Config {
    Config {
        input_path,
        output_dir: Some(dir.join("out")),
        parallel: false,
        shorten_uris: false,
        target_size: 4096,
        global_id_marker: "global.dbpedia.org/id/".to_owned(),
        id_marker_prefix: "<https://".to_owned(),
        parts_file: Some(dir.join("out").join("parts.tsv")),
        task_timeout: 600,
        search_type: SearchType::Binary,
        bin_search_limit: 64,
        jump_size: 2048,
        backpedal_size: Some(1024),
        namespaces_cache: dir.join("ns-cache.json"),
        namespaces_url: "http://example.invalid/nsdecl".to_owned(),
        resolve_identity: false,
        samething_service_url: "http://example.invalid/".to_owned(),
    }
}

#[test]
fn sequential_run_over_a_multi_part_dump_accounts_for_every_triple() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = write_dump(dir.path());
    let cfg = config(dir.path(), input_path);

    let summary_path = orchestrator::run(&cfg).unwrap();
    assert!(summary_path.exists());

    let summary: IndexMap<String, IndexMap<String, u64>> =
        serde_json::from_reader(File::open(&summary_path).unwrap()).unwrap();

    // the local (non-global) Berlin triple at the top of the file never
    // counts toward any part, since only global subjects are transformed.
    let total_labels: u64 = summary
        .values()
        .map(|c| *c.get("http://www.w3.org/2000/01/rdf-schema#label").unwrap_or(&0))
        .sum();
    assert_eq!(total_labels, 200);
    let total_knows: u64 =
        summary.values().map(|c| *c.get("http://dbpedia.org/ontology/knows").unwrap_or(&0)).sum();
    assert_eq!(total_knows, 200);

    assert!(summary.len() > 1, "the dump should have been split into more than one part");

    let mut vertex_lines = 0usize;
    let mut edge_lines = 0usize;
    for part_name in summary.keys() {
        let vertices_path = cfg.output_dir().join(format!("{part_name}_vertices.jsonl"));
        let edges_path = cfg.output_dir().join(format!("{part_name}_edges.jsonl"));
        vertex_lines += std::fs::read_to_string(&vertices_path).unwrap().lines().count();
        edge_lines += std::fs::read_to_string(&edges_path).unwrap().lines().count();
    }
    assert_eq!(vertex_lines, 200, "one vertex line per global subject");
    assert_eq!(edge_lines, 200, "one edge per dbo:knows triple");
}

#[test]
fn missing_input_file_surfaces_as_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), dir.path().join("does-not-exist.nt"));
    let err = orchestrator::run(&cfg).unwrap_err();
    assert!(matches!(err, databus_preloader::error::Error::Io { .. }));
}
