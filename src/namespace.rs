//! Namespace Prefixer: IRI <-> qname (`prefix:local`) bijection against a
//! loadable namespace table.

use log::warn;
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_NAMESPACES: &str = include_str!("../resources/default-namespaces.json");
const SEPARATORS: [char; 3] = ['/', '#', ':'];

const OVERRIDE_DBPEDIA_GLOBAL: (&str, &str) = ("https://global.dbpedia.org/id/", "dbg");
const OVERRIDE_WIKIDATA: (&str, &str) = ("http://www.wikidata.org/entity/", "wde");

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("can't split '{0}' into a known namespace and a local name")]
    UnsplittableIri(String),
}

/// Bidirectional mapping between full IRI namespaces and short prefixes.
pub struct NamespacePrefixer {
    table: HashMap<String, String>,
    reverse_table: HashMap<String, String>,
}

impl NamespacePrefixer {
    /// Builds a prefixer from an explicit namespace -> prefix mapping, then
    /// installs the two overrides that are always present regardless of what
    /// was loaded.
    pub fn with_mapping(mut table: HashMap<String, String>) -> Self {
        table.insert(OVERRIDE_DBPEDIA_GLOBAL.0.to_owned(), OVERRIDE_DBPEDIA_GLOBAL.1.to_owned());
        table.insert(OVERRIDE_WIKIDATA.0.to_owned(), OVERRIDE_WIKIDATA.1.to_owned());
        let reverse_table = table.iter().map(|(ns, pf)| (pf.clone(), ns.clone())).collect();
        NamespacePrefixer { table, reverse_table }
    }

    /// The namespaces compiled into this crate, used when no cache file
    /// exists yet and a network fetch is unavailable or not requested.
    pub fn with_defaults() -> Self {
        let table: HashMap<String, String> =
            serde_json::from_str(DEFAULT_NAMESPACES).expect("embedded default-namespaces.json is valid JSON");
        Self::with_mapping(table)
    }

    /// Loads the namespace table: try an HTTP refresh first, falling back to
    /// `cache_path`, falling back to the defaults compiled into this crate if
    /// neither is available.
    pub fn load(cache_path: &Path, namespaces_url: &str) -> Self {
        match fetch_and_scrape(namespaces_url) {
            Ok(table) => {
                if let Err(err) = write_cache(cache_path, &table) {
                    warn!("couldn't update namespace cache at {}: {err}", cache_path.display());
                }
                Self::with_mapping(table)
            }
            Err(err) => {
                warn!("couldn't update namespaces from {namespaces_url}: {err}");
                match read_cache(cache_path) {
                    Ok(table) => Self::with_mapping(table),
                    Err(err) => {
                        warn!("couldn't read namespace cache at {}: {err}, using built-in defaults", cache_path.display());
                        Self::with_defaults()
                    }
                }
            }
        }
    }

    /// Shortens `iri` to `prefix:local` if its namespace is known, otherwise
    /// returns it unchanged.
    pub fn qname(&self, iri: &str) -> String {
        match self.split_iri(iri) {
            Ok((namespace, local)) => match self.table.get(&namespace) {
                Some(prefix) => format!("{prefix}:{local}"),
                None => iri.to_owned(),
            },
            Err(_) => iri.to_owned(),
        }
    }

    /// Expands a `prefix:local` qname back to a full IRI, or returns it
    /// unchanged if the prefix is unknown.
    pub fn reverse(&self, qname: &str) -> String {
        match qname.split_once(':') {
            Some((prefix, local)) => match self.reverse_table.get(prefix) {
                Some(namespace) => {
                    let separator = if namespace.ends_with(".owl") { "#" } else { "" };
                    format!("{namespace}{separator}{local}")
                }
                None => qname.to_owned(),
            },
            None => qname.to_owned(),
        }
    }

    /// Splits `iri` into its longest known namespace and the remaining local
    /// name, scanning from the rightmost separator inward. Mirrors
    /// `NamespacePrefixer.split_iri`: both "namespace ends with the
    /// separator" and "namespace ends just before the separator" candidates
    /// are tried, which is what lets `.owl`-convention namespaces (stored
    /// without a trailing `#`) and ordinary `/`/`#`/`:`-terminated namespaces
    /// coexist in the same table.
    pub fn split_iri(&self, iri: &str) -> Result<(String, String), Error> {
        let tokens = tokenize(iri);
        let mut local_parts: Vec<&str> = Vec::new();
        let mut remaining = tokens.len();
        while remaining > 0 {
            remaining -= 1;
            local_parts.push(tokens[remaining]);
            let namespace: String = tokens[..remaining].concat();
            if self.table.contains_key(&namespace) {
                let mut local_name: String = local_parts.iter().rev().copied().collect();
                if local_name.starts_with(SEPARATORS) {
                    local_name.remove(0);
                }
                return Ok((namespace, local_name));
            }
        }
        Err(Error::UnsplittableIri(iri.to_owned()))
    }
}

/// Splits `iri` the way `re.split(r'([/#:])', iri)` would: every occurrence
/// of a separator becomes its own one-character token, and the text between
/// two separators (possibly empty) becomes a token of its own.
fn tokenize(iri: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (idx, ch) in iri.char_indices() {
        if SEPARATORS.contains(&ch) {
            tokens.push(&iri[start..idx]);
            tokens.push(&iri[idx..idx + ch.len_utf8()]);
            start = idx + ch.len_utf8();
        }
    }
    tokens.push(&iri[start..]);
    tokens
}

fn read_cache(cache_path: &Path) -> std::io::Result<HashMap<String, String>> {
    let contents = std::fs::read_to_string(cache_path)?;
    serde_json::from_str(&contents).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn write_cache(cache_path: &Path, table: &HashMap<String, String>) -> std::io::Result<()> {
    let contents = serde_json::to_string_pretty(table)?;
    std::fs::write(cache_path, contents)
}

/// Fetches the namespace-declaration page and scrapes its result table,
/// mapping each row's `href` to its prefix text. The page is a plain HTML
/// table (`<table class="tableresult">`), so this is a small hand-rolled
/// row scanner rather than a full HTML parser.
fn fetch_and_scrape(namespaces_url: &str) -> Result<HashMap<String, String>, Box<dyn std::error::Error>> {
    let body = reqwest::blocking::get(namespaces_url)?.error_for_status()?.text()?;
    scrape_namespace_table(&body)
}

fn scrape_namespace_table(html: &str) -> Result<HashMap<String, String>, Box<dyn std::error::Error>> {
    use regex::Regex;

    let row_re = Regex::new(r"(?is)<tr>(.*?)</tr>")?;
    let href_re = Regex::new(r#"(?is)<a[^>]*\bhref\s*=\s*"([^"]+)""#)?;
    let cell_text_re = Regex::new(r"(?is)<td[^>]*>(.*?)</td>")?;
    let tag_re = Regex::new(r"(?is)<[^>]+>")?;

    let mut table = HashMap::new();
    for row in row_re.captures_iter(html) {
        let row_html = &row[1];
        let Some(href) = href_re.captures(row_html).map(|c| c[1].to_owned()) else { continue };
        let Some(prefix_cell) = cell_text_re.captures(row_html).map(|c| c[1].to_owned()) else { continue };
        let prefix = tag_re.replace_all(&prefix_cell, "").trim().to_owned();
        if !prefix.is_empty() {
            table.insert(href, prefix);
        }
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixer() -> NamespacePrefixer {
        NamespacePrefixer::with_defaults()
    }

    #[test]
    fn split_iri_cases() {
        let p = prefixer();
        assert!(p.split_iri("http://unknown.namespace/Semantics").is_err());

        assert_eq!(
            p.split_iri("http://dbpedia.org/ontology/Taxon").unwrap(),
            ("http://dbpedia.org/ontology/".to_owned(), "Taxon".to_owned())
        );
        assert_eq!(
            p.split_iri("http://dbpedia.org/resource/AC/DC").unwrap(),
            ("http://dbpedia.org/resource/".to_owned(), "AC/DC".to_owned())
        );
        assert_eq!(
            p.split_iri("http://www.ontologydesignpatterns.org/ont/dul/DUL.owl#Concept").unwrap(),
            ("http://www.ontologydesignpatterns.org/ont/dul/DUL.owl".to_owned(), "Concept".to_owned())
        );
        assert_eq!(
            p.split_iri("http://www.geonames.org/ontology#Feature").unwrap(),
            ("http://www.geonames.org/ontology#".to_owned(), "Feature".to_owned())
        );
        assert_eq!(
            p.split_iri("http://dbpedia.org/resource/Category:Life").unwrap(),
            ("http://dbpedia.org/resource/Category:".to_owned(), "Life".to_owned())
        );
        assert_eq!(
            p.split_iri("http://dbpedia.org/resource/4:20").unwrap(),
            ("http://dbpedia.org/resource/".to_owned(), "4:20".to_owned())
        );
    }

    #[test]
    fn qname_cases() {
        let p = prefixer();
        assert_eq!(p.qname("http://unknown.namespace/Semantics"), "http://unknown.namespace/Semantics");
        assert_eq!(p.qname("http://dbpedia.org/ontology/Taxon"), "dbo:Taxon");
        assert_eq!(p.qname("http://dbpedia.org/resource/AC/DC"), "dbr:AC/DC");
        assert_eq!(
            p.qname("http://www.ontologydesignpatterns.org/ont/dul/DUL.owl#Concept"),
            "dul:Concept"
        );
        assert_eq!(p.qname("http://www.geonames.org/ontology#Feature"), "geonames:Feature");
        assert_eq!(p.qname("http://dbpedia.org/resource/Category:Life"), "dbc:Life");
        assert_eq!(p.qname("http://dbpedia.org/resource/10:20:31/50"), "dbr:10:20:31/50");
    }

    #[test]
    fn reverse_cases() {
        let p = prefixer();
        assert_eq!(
            p.reverse("dul:Concept"),
            "http://www.ontologydesignpatterns.org/ont/dul/DUL.owl#Concept"
        );
        assert_eq!(p.reverse("dbo:Taxon"), "http://dbpedia.org/ontology/Taxon");
        assert_eq!(p.reverse("unknownpfx:Thing"), "unknownpfx:Thing");
    }

    #[test]
    fn qname_then_reverse_round_trips() {
        let p = prefixer();
        for iri in [
            "http://dbpedia.org/ontology/Taxon",
            "http://dbpedia.org/resource/AC/DC",
            "http://www.geonames.org/ontology#Feature",
            "http://dbpedia.org/resource/Category:Life",
        ] {
            assert_eq!(p.reverse(&p.qname(iri)), iri);
        }
    }

    #[test]
    fn overrides_always_installed() {
        let p = NamespacePrefixer::with_mapping(HashMap::new());
        assert_eq!(p.qname("https://global.dbpedia.org/id/Q1"), "dbg:Q1");
        assert_eq!(p.qname("http://www.wikidata.org/entity/Q1"), "wde:Q1");
    }

    #[test]
    fn scrapes_namespace_table_rows() {
        let html = r#"
            <table class="tableresult">
              <tr><td>dbo</td><td><a href="http://dbpedia.org/ontology/">http://dbpedia.org/ontology/</a></td></tr>
              <tr><td>dbr</td><td><a href="http://dbpedia.org/resource/">http://dbpedia.org/resource/</a></td></tr>
            </table>
        "#;
        let table = scrape_namespace_table(html).unwrap();
        assert_eq!(table.get("http://dbpedia.org/ontology/"), Some(&"dbo".to_owned()));
        assert_eq!(table.get("http://dbpedia.org/resource/"), Some(&"dbr".to_owned()));
    }
}
