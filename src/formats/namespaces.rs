//! Repair of undeclared XML namespace prefixes.
//!
//! KML exported by some tools uses `gx:` or `kml:` prefixed elements without
//! declaring the prefix, which namespace-aware parsers reject. The scan here
//! uses a non-namespace-aware `quick-xml` reader, collects every prefix that
//! is used but never declared, and adds the declarations to the root element.
//! Declarations anywhere in the document count as declared; scoping is not
//! tracked.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::borrow::Cow;
use std::collections::HashSet;

/// Standard URI for well-known KML-related prefixes.
pub fn known_namespace(prefix: &str) -> Option<&'static str> {
    match prefix {
        "kml" => Some("http://www.opengis.net/kml/2.2"),
        "gx" => Some("http://www.google.com/kml/ext/2.2"),
        "atom" => Some("http://www.w3.org/2005/Atom"),
        "xal" => Some("urn:oasis:names:tc:ciq:xsdschema:xAL:2.0"),
        "xsi" => Some("http://www.w3.org/2001/XMLSchema-instance"),
        _ => None,
    }
}

/// Prefixes used in `xml` without a matching `xmlns:` declaration, in order
/// of first use, with the URI that will be declared for them.
pub fn undeclared_prefixes(xml: &str) -> Result<IndexMap<String, String>> {
    Ok(scan(xml)?.missing)
}

/// Return `xml` with declarations added for undeclared prefixes. Input that
/// needs nothing is returned borrowed.
pub fn repair_namespaces(xml: &str) -> Result<Cow<'_, str>> {
    let Scan { missing, root_end } = scan(xml)?;
    let Some(root_end) = root_end else {
        return Ok(Cow::Borrowed(xml));
    };
    if missing.is_empty() {
        return Ok(Cow::Borrowed(xml));
    }

    let close = xml[..root_end]
        .rfind('>')
        .context("root element has no closing '>'")?;
    let at = if close > 0 && xml.as_bytes()[close - 1] == b'/' {
        close - 1
    } else {
        close
    };

    let mut decls = String::new();
    for (prefix, uri) in &missing {
        log::debug!("declaring missing namespace prefix {prefix}: {uri}");
        decls.push_str(&format!(" xmlns:{prefix}=\"{uri}\""));
    }
    let mut out = String::with_capacity(xml.len() + decls.len());
    out.push_str(&xml[..at]);
    out.push_str(&decls);
    out.push_str(&xml[at..]);
    Ok(Cow::Owned(out))
}

struct Scan {
    missing: IndexMap<String, String>,
    /// Byte offset just past the root start tag.
    root_end: Option<usize>,
}

fn scan(xml: &str) -> Result<Scan> {
    let mut reader = Reader::from_str(xml);
    let mut declared: HashSet<String> = HashSet::new();
    let mut used: IndexMap<String, ()> = IndexMap::new();
    let mut root_end = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("XML syntax error near byte {}", reader.buffer_position()))?;
        let start = match &event {
            Event::Start(e) | Event::Empty(e) => e,
            Event::Eof => break,
            _ => continue,
        };
        if root_end.is_none() {
            root_end = Some(reader.buffer_position() as usize);
        }
        collect_prefixes(start, &mut declared, &mut used);
    }

    let missing = used
        .into_keys()
        .filter(|p| !declared.contains(p))
        .map(|p| {
            let uri = known_namespace(&p)
                .map(str::to_string)
                .unwrap_or_else(|| format!("urn:labelfit:unbound:{p}"));
            (p, uri)
        })
        .collect();
    Ok(Scan { missing, root_end })
}

fn collect_prefixes(
    start: &BytesStart<'_>,
    declared: &mut HashSet<String>,
    used: &mut IndexMap<String, ()>,
) {
    if let Some(prefix) = start.name().prefix() {
        note_use(prefix.as_ref(), used);
    }
    for attr in start.attributes().with_checks(false).flatten() {
        let key = attr.key.as_ref();
        if let Some(decl) = key.strip_prefix(b"xmlns:") {
            declared.insert(String::from_utf8_lossy(decl).into_owned());
        } else if let Some(prefix) = attr.key.prefix() {
            note_use(prefix.as_ref(), used);
        }
    }
}

fn note_use(prefix: &[u8], used: &mut IndexMap<String, ()>) {
    // `xml:` is bound by definition; `xmlns` only appears in declarations.
    if prefix == b"xml" || prefix == b"xmlns" {
        return;
    }
    used.entry(String::from_utf8_lossy(prefix).into_owned())
        .or_insert(());
}
