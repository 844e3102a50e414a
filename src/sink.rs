//! Property-Graph Sink: groups triples by subject into vertex/edge records
//! and streams them to JSONL sidecar files, with namespace qualification and
//! identity resolution applied along the way.

use crate::namespace::NamespacePrefixer;
use crate::ntriples::{Term, Triple, TripleSink};
use crate::samething::SameThingClient;
use indexmap::IndexMap;
use log::{error, warn};
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const OWL_SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";
const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const DBO_WIKI_PAGE_EXTERNAL_LINK: &str = "http://dbpedia.org/ontology/wikiPageExternalLink";
const MULTI: [&str; 3] = [OWL_SAME_AS, RDF_TYPE, DBO_WIKI_PAGE_EXTERNAL_LINK];
const DBPEDIA_DATATYPE_MARKER: &str = "dbpedia.org/datatype";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error writing sidecar file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> Error + '_ {
    move |source| Error::Io { path: path.to_owned(), source }
}

/// One value held under a predicate key in the vertex buffer. Modeled as a
/// tagged union so classification and promotion operate on this enum
/// directly, rather than branching on a dynamically-typed value's runtime
/// shape.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexValue {
    /// A single scalar: the common case for a vertex's first literal or
    /// external-URI value on a predicate.
    Scalar(Value),
    /// A list of plain scalars, as produced by the multivalued URI
    /// predicates (`rdf:type`, `owl:sameAs`, `dbo:wikiPageExternalLink`).
    Plain(Vec<Value>),
    /// A list of `{value, language}` records, produced once a predicate
    /// sees more than one literal or a language-tagged literal.
    Tagged(Vec<TaggedValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedValue {
    pub value: Value,
    pub language: Option<String>,
}

impl Serialize for VertexValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            VertexValue::Scalar(v) => v.serialize(serializer),
            VertexValue::Plain(list) => list.serialize(serializer),
            VertexValue::Tagged(list) => list.serialize(serializer),
        }
    }
}

impl VertexValue {
    /// Merges a new plain (non-language-tagged) value into whatever this
    /// predicate already holds, or starts a fresh scalar if this is the
    /// first value seen for it.
    fn merge_plain(existing: Option<VertexValue>, value: Value) -> VertexValue {
        match existing {
            None => VertexValue::Scalar(value),
            Some(VertexValue::Scalar(prior)) => VertexValue::Plain(vec![prior, value]),
            Some(VertexValue::Plain(mut list)) => {
                list.push(value);
                VertexValue::Plain(list)
            }
            Some(VertexValue::Tagged(mut list)) => {
                list.push(TaggedValue { value, language: None });
                VertexValue::Tagged(list)
            }
        }
    }

    /// Merges a new language-tagged value, promoting whatever was there
    /// before (a bare scalar, or a list of plain scalars from the
    /// multivalued-URI path) into tagged records so the shapes can coexist.
    fn merge_tagged(existing: Option<VertexValue>, tagged: TaggedValue) -> VertexValue {
        match existing {
            None => VertexValue::Tagged(vec![tagged]),
            Some(VertexValue::Scalar(prior)) => {
                VertexValue::Tagged(vec![TaggedValue { value: prior, language: None }, tagged])
            }
            Some(VertexValue::Plain(list)) => {
                let mut tagged_list: Vec<TaggedValue> =
                    list.into_iter().map(|value| TaggedValue { value, language: None }).collect();
                tagged_list.push(tagged);
                VertexValue::Tagged(tagged_list)
            }
            Some(VertexValue::Tagged(mut list)) => {
                list.push(tagged);
                VertexValue::Tagged(list)
            }
        }
    }

    /// Appends `value` as one more element of a multivalued URI predicate's
    /// list.
    fn push_multi(existing: Option<VertexValue>, value: Value) -> VertexValue {
        match existing {
            None => VertexValue::Plain(vec![value]),
            Some(VertexValue::Plain(mut list)) => {
                list.push(value);
                VertexValue::Plain(list)
            }
            Some(VertexValue::Scalar(prior)) => VertexValue::Plain(vec![prior, value]),
            Some(VertexValue::Tagged(mut list)) => {
                list.push(TaggedValue { value, language: None });
                VertexValue::Tagged(list)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub outv: String,
    pub label: String,
    pub inv: String,
}

/// Buffers one subject's vertex attributes and outgoing edges, flushing
/// both to `<part_name>_vertices.jsonl` / `<part_name>_edges.jsonl` each
/// time the subject changes.
pub struct PropertyGraphSink<'a> {
    global_id_marker: String,
    part_name: String,
    prefixer: Option<&'a NamespacePrefixer>,
    same_thing: Option<&'a SameThingClient>,
    predicate_count: IndexMap<String, u64>,
    vertex_buffer: IndexMap<String, VertexValue>,
    edge_buffer: Vec<Edge>,
    last_subject: Option<String>,
    vertices_path: PathBuf,
    edges_path: PathBuf,
    vertices_writer: BufWriter<File>,
    edges_writer: BufWriter<File>,
}

impl<'a> PropertyGraphSink<'a> {
    /// Opens (and warns if appending to) this part's sidecar files.
    pub fn new(
        global_id_marker: &str,
        part_path: &Path,
        prefixer: Option<&'a NamespacePrefixer>,
        same_thing: Option<&'a SameThingClient>,
    ) -> Result<Self, Error> {
        let vertices_path = with_suffix(part_path, "_vertices.jsonl");
        let edges_path = with_suffix(part_path, "_edges.jsonl");

        if vertices_path.exists() || edges_path.exists() {
            warn!(
                "sidecar files for {} already exist and will be appended to",
                part_path.display()
            );
        }

        let vertices_writer = BufWriter::new(
            File::options().create(true).append(true).open(&vertices_path).map_err(io_err(&vertices_path))?,
        );
        let edges_writer = BufWriter::new(
            File::options().create(true).append(true).open(&edges_path).map_err(io_err(&edges_path))?,
        );

        Ok(PropertyGraphSink {
            global_id_marker: global_id_marker.to_owned(),
            part_name: part_path.to_string_lossy().into_owned(),
            prefixer,
            same_thing,
            predicate_count: IndexMap::new(),
            vertex_buffer: IndexMap::new(),
            edge_buffer: Vec::new(),
            last_subject: None,
            vertices_path,
            edges_path,
            vertices_writer,
            edges_writer,
        })
    }

    fn qualify(&self, iri: &str) -> String {
        match self.prefixer {
            Some(prefixer) => prefixer.qname(iri),
            None => iri.to_owned(),
        }
    }

    fn is_global(&self, iri: &str) -> bool {
        iri.contains(self.global_id_marker.as_str())
    }

    /// Resolves and qualifies `iri` for use as an edge endpoint. Resolution
    /// happens once, here, at edge-creation time; nothing re-resolves an
    /// edge endpoint later at flush time.
    fn resolve_for_edge(&self, iri: &str) -> String {
        match self.same_thing {
            Some(client) => self.qualify(&client.fetch_wikidata_uri(iri)),
            None => self.qualify(iri),
        }
    }

    fn handle_triple(&mut self, triple: &Triple) -> Result<(), Error> {
        if !self.is_global(&triple.subject) {
            return Ok(());
        }

        if self.last_subject.as_deref() != Some(triple.subject.as_str()) {
            self.flush_buffers()?;
            self.last_subject = Some(triple.subject.clone());
        }

        let qn_subj = self.qualify(&triple.subject);
        let qn_pred = self.qualify(&triple.predicate);
        self.vertex_buffer.insert("id".to_owned(), VertexValue::Scalar(Value::String(qn_subj.clone())));
        *self.predicate_count.entry(qn_pred.clone()).or_insert(0) += 1;

        let self_same_as =
            object_iri(&triple.object) == Some(triple.subject.as_str()) && triple.predicate == OWL_SAME_AS;

        if MULTI.contains(&triple.predicate.as_str()) {
            if self_same_as {
                return Ok(());
            }
            let obj_repr = object_iri(&triple.object).unwrap_or(literal_lexical(&triple.object));
            let qn_obj = self.qualify(obj_repr);
            let entry = self.vertex_buffer.shift_remove(&qn_pred);
            self.vertex_buffer.insert(qn_pred, VertexValue::push_multi(entry, Value::String(qn_obj)));
            return Ok(());
        }

        match &triple.object {
            Term::Iri(obj_iri) if self.is_global(obj_iri) => {
                let outv = self.resolve_for_edge(&triple.subject);
                let label = qn_pred;
                let inv = self.resolve_for_edge(obj_iri);
                self.edge_buffer.push(Edge { outv, label, inv });
            }
            Term::Iri(obj_iri) => {
                // Unlike every other IRI-valued slot, rule 4 stores the raw
                // object IRI rather than its qualified form.
                self.vertex_buffer.insert(qn_pred, VertexValue::Scalar(Value::String(obj_iri.clone())));
            }
            Term::Literal { lexical, language: Some(language), datatype: _ } => {
                let native = promote_literal(lexical, None);
                let tagged = TaggedValue { value: native, language: Some(language.clone()) };
                let entry = self.vertex_buffer.shift_remove(&qn_pred);
                self.vertex_buffer.insert(qn_pred, VertexValue::merge_tagged(entry, tagged));
            }
            Term::Literal { lexical, language: None, datatype } => {
                let native = promote_literal(lexical, datatype.as_deref());
                let entry = self.vertex_buffer.shift_remove(&qn_pred);
                self.vertex_buffer.insert(qn_pred, VertexValue::merge_plain(entry, native));
            }
        }

        Ok(())
    }

    /// Flushes the vertex buffer then the edge buffer, in that order.
    pub fn flush_buffers(&mut self) -> Result<(), Error> {
        self.flush_vertex()?;
        self.flush_edges()
    }

    fn flush_vertex(&mut self) -> Result<(), Error> {
        if let Some(client) = self.same_thing {
            if let Some(last_subject) = &self.last_subject {
                if let Some(VertexValue::Scalar(Value::String(previous_id))) = self.vertex_buffer.get("id").cloned() {
                    let resolved = self.qualify(&client.fetch_wikidata_uri(last_subject));
                    self.vertex_buffer.insert("dbg:cluster-id".to_owned(), VertexValue::Scalar(Value::String(previous_id)));
                    self.vertex_buffer.insert("id".to_owned(), VertexValue::Scalar(Value::String(resolved)));
                }
            }
        }

        if !self.vertex_buffer.is_empty() {
            serde_json::to_writer(&mut self.vertices_writer, &self.vertex_buffer)
                .map_err(|e| Error::Io { path: self.vertices_path.clone(), source: e.into() })?;
            self.vertices_writer.write_all(b"\n").map_err(io_err(&self.vertices_path))?;
        }
        self.vertex_buffer = IndexMap::new();
        Ok(())
    }

    fn flush_edges(&mut self) -> Result<(), Error> {
        for edge in &self.edge_buffer {
            serde_json::to_writer(&mut self.edges_writer, edge)
                .map_err(|e| Error::Io { path: self.edges_path.clone(), source: e.into() })?;
            self.edges_writer.write_all(b"\n").map_err(io_err(&self.edges_path))?;
        }
        self.edge_buffer.clear();
        Ok(())
    }

    /// Normal scope exit: flushes whatever remains buffered and returns the
    /// per-predicate triple counts.
    pub fn finish(mut self) -> Result<IndexMap<String, u64>, Error> {
        self.flush_buffers()?;
        self.vertices_writer.flush().map_err(io_err(&self.vertices_path))?;
        self.edges_writer.flush().map_err(io_err(&self.edges_path))?;
        Ok(self.predicate_count)
    }

    /// Abnormal scope exit: dumps the part name and both buffers to the
    /// error log without flushing.
    pub fn abort(self) {
        error!("aborting {}", self.part_name);
        error!("vertex_buffer: {:?}", self.vertex_buffer);
        error!("edge_buffer: {:?}", self.edge_buffer);
    }
}

impl TripleSink for PropertyGraphSink<'_> {
    fn triple(&mut self, triple: &Triple) -> std::io::Result<()> {
        self.handle_triple(triple).map_err(|err| match err {
            Error::Io { source, .. } => source,
        })
    }
}

fn object_iri(term: &Term) -> Option<&str> {
    term.as_iri()
}

/// Fallback representation for a multivalued-URI-predicate object that
/// turns out to be a literal rather than an IRI; not exercised by any
/// well-formed Databus dump (`rdf:type`/`owl:sameAs`/
/// `wikiPageExternalLink` objects are always IRIs) but kept total rather
/// than panicking on malformed input.
fn literal_lexical(term: &Term) -> &str {
    match term {
        Term::Iri(iri) => iri,
        Term::Literal { lexical, .. } => lexical,
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// Promotes a literal's lexical form to a native JSON value based on its
/// datatype. DBpedia custom-unit datatypes keep their lexical form with a
/// type annotation rather than being coerced to a native type.
fn promote_literal(lexical: &str, datatype: Option<&str>) -> Value {
    let Some(datatype) = datatype else {
        return Value::String(lexical.to_owned());
    };

    if datatype.contains(DBPEDIA_DATATYPE_MARKER) {
        return Value::String(format!("\"{lexical}\"^^<{datatype}>"));
    }

    let Some(local) = datatype.strip_prefix(XSD) else {
        return Value::String(lexical.to_owned());
    };

    const INTEGER_KINDS: [&str; 8] =
        ["integer", "int", "long", "short", "byte", "nonNegativeInteger", "positiveInteger", "negativeInteger"];
    const DECIMAL_KINDS: [&str; 3] = ["decimal", "double", "float"];

    match local {
        "boolean" => {
            lexical.parse::<bool>().map(Value::Bool).unwrap_or_else(|_| Value::String(lexical.to_owned()))
        }
        _ if INTEGER_KINDS.contains(&local) => lexical
            .parse::<i64>()
            .ok()
            .map(|n| Value::Number(n.into()))
            .unwrap_or_else(|| Value::String(lexical.to_owned())),
        _ if DECIMAL_KINDS.contains(&local) => lexical
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(lexical.to_owned())),
        "date" | "dateTime" => promote_temporal(lexical),
        _ => Value::String(lexical.to_owned()),
    }
}

/// Round-trips a date/dateTime literal through `chrono` to a canonical
/// RFC 3339 / ISO 8601 form, falling back to the raw lexical form on a
/// parse failure rather than dropping the value.
fn promote_temporal(lexical: &str) -> Value {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(lexical) {
        return Value::String(dt.to_rfc3339());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(lexical, "%Y-%m-%d") {
        return Value::String(date.format("%Y-%m-%d").to_string());
    }
    Value::String(lexical.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NamespacePrefixer;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn sink(dir: &Path, part_name: &str) -> PropertyGraphSink<'static> {
        PropertyGraphSink::new("global.dbpedia.org/id/", &dir.join(part_name), None, None).unwrap()
    }

    fn iri_triple(s: &str, p: &str, o: &str) -> Triple {
        Triple { subject: s.to_owned(), predicate: p.to_owned(), object: Term::Iri(o.to_owned()) }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path).unwrap().lines().map(str::to_owned).collect()
    }

    #[test]
    fn emits_one_edge_for_global_to_global_triple() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = sink(dir.path(), "part-001");
        s.handle_triple(&iri_triple(
            "https://global.dbpedia.org/id/A",
            "http://dbpedia.org/ontology/knows",
            "https://global.dbpedia.org/id/B",
        ))
        .unwrap();
        let counts = s.finish().unwrap();

        let edges = read_lines(&dir.path().join("part-001_edges.jsonl"));
        assert_eq!(edges.len(), 1);
        let edge: Edge = serde_json::from_str(&edges[0]).unwrap();
        assert_eq!(edge.outv, "https://global.dbpedia.org/id/A");
        assert_eq!(edge.inv, "https://global.dbpedia.org/id/B");
        assert_eq!(edge.label, "http://dbpedia.org/ontology/knows");
        assert_eq!(counts["http://dbpedia.org/ontology/knows"], 1);
    }

    #[test]
    fn self_same_as_produces_no_edge_and_no_list_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = sink(dir.path(), "part-001");
        s.handle_triple(&iri_triple("https://global.dbpedia.org/id/A", OWL_SAME_AS, "https://global.dbpedia.org/id/A"))
            .unwrap();
        s.finish().unwrap();

        let edges = std::fs::read_to_string(dir.path().join("part-001_edges.jsonl")).unwrap_or_default();
        assert!(edges.is_empty(), "a self-sameAs triple must never produce an edge");

        // `id` is always set regardless of classification, so the vertex
        // still flushes, but with no `owl:sameAs` list entry appended.
        let vertices = read_lines(&dir.path().join("part-001_vertices.jsonl"));
        assert_eq!(vertices.len(), 1);
        let v: HashMap<String, Value> = serde_json::from_str(&vertices[0]).unwrap();
        assert!(!v.contains_key(OWL_SAME_AS));
    }

    #[test]
    fn two_rdf_types_produce_a_two_element_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = sink(dir.path(), "part-001");
        s.handle_triple(&iri_triple("https://global.dbpedia.org/id/A", RDF_TYPE, "http://dbpedia.org/ontology/Person"))
            .unwrap();
        s.handle_triple(&iri_triple("https://global.dbpedia.org/id/A", RDF_TYPE, "http://dbpedia.org/ontology/Agent"))
            .unwrap();
        s.finish().unwrap();

        let vertices = read_lines(&dir.path().join("part-001_vertices.jsonl"));
        assert_eq!(vertices.len(), 1);
        let v: HashMap<String, Value> = serde_json::from_str(&vertices[0]).unwrap();
        let types = v[RDF_TYPE].as_array().unwrap();
        assert_eq!(types.len(), 2);
    }

    #[test]
    fn two_language_tagged_literals_produce_a_two_element_tagged_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = sink(dir.path(), "part-001");
        let pred = "http://www.w3.org/2000/01/rdf-schema#label";
        s.handle_triple(&Triple {
            subject: "https://global.dbpedia.org/id/A".to_owned(),
            predicate: pred.to_owned(),
            object: Term::Literal { lexical: "Berlin".to_owned(), language: Some("en".to_owned()), datatype: None },
        })
        .unwrap();
        s.handle_triple(&Triple {
            subject: "https://global.dbpedia.org/id/A".to_owned(),
            predicate: pred.to_owned(),
            object: Term::Literal { lexical: "Berlín".to_owned(), language: Some("es".to_owned()), datatype: None },
        })
        .unwrap();
        s.finish().unwrap();

        let vertices = read_lines(&dir.path().join("part-001_vertices.jsonl"));
        let v: HashMap<String, Value> = serde_json::from_str(&vertices[0]).unwrap();
        let labels = v[pred].as_array().unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0]["language"], "en");
        assert_eq!(labels[1]["language"], "es");
    }

    #[test]
    fn plain_literal_then_tagged_literal_promotes_prior_with_null_language() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = sink(dir.path(), "part-001");
        let pred = "http://www.w3.org/2000/01/rdf-schema#comment";
        s.handle_triple(&Triple {
            subject: "https://global.dbpedia.org/id/A".to_owned(),
            predicate: pred.to_owned(),
            object: Term::Literal { lexical: "a city".to_owned(), language: None, datatype: None },
        })
        .unwrap();
        s.handle_triple(&Triple {
            subject: "https://global.dbpedia.org/id/A".to_owned(),
            predicate: pred.to_owned(),
            object: Term::Literal { lexical: "une ville".to_owned(), language: Some("fr".to_owned()), datatype: None },
        })
        .unwrap();
        s.finish().unwrap();

        let vertices = read_lines(&dir.path().join("part-001_vertices.jsonl"));
        let v: HashMap<String, Value> = serde_json::from_str(&vertices[0]).unwrap();
        let comments = v[pred].as_array().unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0]["value"], "a city");
        assert_eq!(comments[0]["language"], Value::Null);
        assert_eq!(comments[1]["value"], "une ville");
        assert_eq!(comments[1]["language"], "fr");
    }

    #[test]
    fn non_global_triples_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = sink(dir.path(), "part-001");
        s.handle_triple(&iri_triple(
            "http://dbpedia.org/resource/Local",
            "http://dbpedia.org/ontology/knows",
            "https://global.dbpedia.org/id/B",
        ))
        .unwrap();
        let counts = s.finish().unwrap();
        assert!(counts.is_empty());
    }

    #[test]
    fn typed_literal_promotes_to_native_number() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = sink(dir.path(), "part-001");
        let pred = "http://dbpedia.org/ontology/populationTotal";
        s.handle_triple(&Triple {
            subject: "https://global.dbpedia.org/id/A".to_owned(),
            predicate: pred.to_owned(),
            object: Term::Literal {
                lexical: "3769000".to_owned(),
                language: None,
                datatype: Some(format!("{XSD}nonNegativeInteger")),
            },
        })
        .unwrap();
        s.finish().unwrap();

        let vertices = read_lines(&dir.path().join("part-001_vertices.jsonl"));
        let v: HashMap<String, Value> = serde_json::from_str(&vertices[0]).unwrap();
        assert_eq!(v[pred], Value::Number(3769000.into()));
    }

    #[test]
    fn dbpedia_datatype_keeps_lexical_form_annotated() {
        let dt = "http://dbpedia.org/datatype/squareKilometre";
        let v = promote_literal("891.8", Some(dt));
        assert_eq!(v, Value::String(format!("\"891.8\"^^<{dt}>")));
    }

    #[test]
    fn external_non_global_iri_is_scalar_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = sink(dir.path(), "part-001");
        let pred = "http://xmlns.com/foaf/0.1/homepage";
        s.handle_triple(&iri_triple("https://global.dbpedia.org/id/A", pred, "http://example.org/a")).unwrap();
        s.finish().unwrap();

        let vertices = read_lines(&dir.path().join("part-001_vertices.jsonl"));
        let v: HashMap<String, Value> = serde_json::from_str(&vertices[0]).unwrap();
        assert_eq!(v[pred], "http://example.org/a");
    }

    #[test]
    fn external_non_global_iri_stays_raw_even_with_a_prefixer_configured() {
        let dir = tempfile::tempdir().unwrap();
        let prefixer = NamespacePrefixer::with_defaults();
        let mut s = PropertyGraphSink::new("global.dbpedia.org/id/", &dir.path().join("part-001"), Some(&prefixer), None)
            .unwrap();
        let pred = "http://xmlns.com/foaf/0.1/homepage";
        // the object's namespace is known to the prefixer (it would qualify
        // to "dbr:Example"), but rule 4 stores `str(o)`, not `qn_obj`.
        s.handle_triple(&iri_triple("https://global.dbpedia.org/id/A", pred, "http://dbpedia.org/resource/Example"))
            .unwrap();
        s.finish().unwrap();

        let vertices = read_lines(&dir.path().join("part-001_vertices.jsonl"));
        let v: HashMap<String, Value> = serde_json::from_str(&vertices[0]).unwrap();
        assert_eq!(v[pred], "http://dbpedia.org/resource/Example");
    }

    #[test]
    fn qualifies_ids_and_predicates_when_prefixer_is_configured() {
        let dir = tempfile::tempdir().unwrap();
        let prefixer = NamespacePrefixer::with_defaults();
        let mut s = PropertyGraphSink::new("global.dbpedia.org/id/", &dir.path().join("part-001"), Some(&prefixer), None)
            .unwrap();
        s.handle_triple(&iri_triple(
            "https://global.dbpedia.org/id/A",
            "http://dbpedia.org/ontology/birthPlace",
            "https://global.dbpedia.org/id/B",
        ))
        .unwrap();
        s.finish().unwrap();

        let edges = read_lines(&dir.path().join("part-001_edges.jsonl"));
        let edge: Edge = serde_json::from_str(&edges[0]).unwrap();
        assert_eq!(edge.label, "dbo:birthPlace");
        assert_eq!(edge.outv, "dbg:A");
        assert_eq!(edge.inv, "dbg:B");
    }

    #[test]
    fn existing_sidecar_files_are_appended_to() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part-001_vertices.jsonl"), "{\"id\":\"dbg:existing\"}\n").unwrap();

        let mut s = sink(dir.path(), "part-001");
        s.handle_triple(&iri_triple(
            "https://global.dbpedia.org/id/A",
            "http://dbpedia.org/ontology/knows",
            "https://global.dbpedia.org/id/B",
        ))
        .unwrap();
        s.finish().unwrap();

        let vertices = read_lines(&dir.path().join("part-001_vertices.jsonl"));
        assert_eq!(vertices.len(), 2, "the pre-existing line is untouched and the new flush is appended after it");
        assert!(vertices[0].contains("dbg:existing"));
        assert!(vertices[1].contains("global.dbpedia.org/id/A"));
    }
}
