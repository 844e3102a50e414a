//! Bounded N-Triples streaming parser.
//!
//! The grammar itself is not reimplemented here: [`oxttl::NTriplesParser`] already
//! understands N-Triples 1.1 escaping, language tags and typed literals. This
//! module is a thin driver on top of it that bounds reading to a `[left, right)`
//! byte range, amortizes progress reporting to roughly 1 MiB, and turns
//! per-line syntax errors into "log and skip" rather than aborting the stream.

use log::error;
use std::io::{BufReader, Read};

/// An RDF object term: either an IRI or a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    Literal { lexical: String, language: Option<String>, datatype: Option<String> },
}

impl Term {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            Term::Literal { .. } => None,
        }
    }
}

/// One parsed triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

/// Receives triples as they are parsed. Implemented by [`crate::sink::PropertyGraphSink`].
///
/// `triple` returns `io::Result` because the sink flushes to sidecar files as
/// it groups subjects; a write failure there is as fatal as a read failure
/// here and must unwind the same way.
pub trait TripleSink {
    fn triple(&mut self, triple: &Triple) -> std::io::Result<()>;
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error reading N-Triples")]
    Io(#[from] std::io::Error),
}

const PROGRESS_AMORTIZE_BYTES: u64 = 1024 * 1024;

/// Wraps a reader, counting bytes consumed and invoking `on_progress` once the
/// running total since the last callback exceeds [`PROGRESS_AMORTIZE_BYTES`].
struct CountingReader<R, F: FnMut(u64)> {
    inner: R,
    pending: u64,
    on_progress: F,
}

impl<R: Read, F: FnMut(u64)> Read for CountingReader<R, F> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pending += n as u64;
        if self.pending >= PROGRESS_AMORTIZE_BYTES {
            (self.on_progress)(self.pending);
            self.pending = 0;
        }
        Ok(n)
    }
}

impl<R, F: FnMut(u64)> Drop for CountingReader<R, F> {
    fn drop(&mut self) {
        if self.pending > 0 {
            (self.on_progress)(self.pending);
        }
    }
}

/// Parses N-Triples from `left` up to (but not including) `right` in `file`,
/// calling `sink.triple()` for each well-formed line and `on_progress` with
/// amortized bytes-consumed deltas.
///
/// Malformed lines are logged at `error!` and skipped; the stream continues.
/// I/O failures reading the underlying file are fatal and propagate.
pub fn parse_range<S: TripleSink>(
    mut file: std::fs::File,
    left: u64,
    right: u64,
    sink: &mut S,
    mut on_progress: impl FnMut(u64),
) -> Result<(), Error> {
    use std::io::Seek;

    file.seek(std::io::SeekFrom::Start(left))?;
    let bounded = file.take(right.saturating_sub(left));
    let counting = CountingReader { inner: bounded, pending: 0, on_progress: &mut on_progress };
    let reader = BufReader::new(counting);

    for result in oxttl::NTriplesParser::new().for_reader(reader) {
        match result {
            Ok(quad) => sink.triple(&to_triple(&quad))?,
            Err(err) => error!("skipping malformed N-Triples line: {err}"),
        }
    }
    Ok(())
}

fn strip_angle_brackets(iri: &str) -> &str {
    iri.strip_prefix('<').and_then(|s| s.strip_suffix('>')).unwrap_or(iri)
}

fn to_term(term: &oxrdf::Term) -> Term {
    match term {
        oxrdf::Term::NamedNode(n) => Term::Iri(n.as_str().to_owned()),
        oxrdf::Term::BlankNode(b) => Term::Iri(format!("_:{}", b.as_str())),
        oxrdf::Term::Literal(lit) => {
            let language = lit.language().map(str::to_owned);
            let datatype = if language.is_some() {
                None
            } else {
                let dt = lit.datatype();
                if dt.as_str() == "http://www.w3.org/2001/XMLSchema#string" {
                    None
                } else {
                    Some(dt.as_str().to_owned())
                }
            };
            Term::Literal { lexical: lit.value().to_owned(), language, datatype }
        }
        #[allow(unreachable_patterns)]
        _ => Term::Iri(strip_angle_brackets(&term.to_string()).to_owned()),
    }
}

fn to_triple(quad: &oxrdf::Triple) -> Triple {
    let subject = match &quad.subject {
        oxrdf::Subject::NamedNode(n) => n.as_str().to_owned(),
        oxrdf::Subject::BlankNode(b) => format!("_:{}", b.as_str()),
        #[allow(unreachable_patterns)]
        _ => strip_angle_brackets(&quad.subject.to_string()).to_owned(),
    };
    Triple { subject, predicate: quad.predicate.as_str().to_owned(), object: to_term(&quad.object) }
}
