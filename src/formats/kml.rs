//! KML reading and writing.
//!
//! Polygons are the outer rings of `<Polygon>` geometries; labels are
//! `<Placemark>`s holding a `<Point>`, named by their `<name>`. Geographic
//! coordinates are projected into a local equirectangular frame in meters so
//! that fitting works in a metric plane; placements are projected back when
//! written. Writing splices new `<coordinates>` text into the source, so
//! everything except the moved points stays byte-identical.

use crate::fit::Placement;
use crate::formats::namespaces::repair_namespaces;
use crate::geometry::Point;
use crate::relabel::{Label, LabelDocument};
use anyhow::{Context, Result};
use roxmltree::{Document, Node};
use std::collections::BTreeMap;
use std::ops::Range;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmlOptions {
    /// Label height in meters used for fitting point markers.
    pub label_height: f64,
}

impl Default for KmlOptions {
    fn default() -> Self {
        Self { label_height: 2.5 }
    }
}

/// Equirectangular projection around `(lon0, lat0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    pub lon0: f64,
    pub lat0: f64,
    cos_lat0: f64,
}

impl LocalFrame {
    pub fn new(lon0: f64, lat0: f64) -> Self {
        Self {
            lon0,
            lat0,
            cos_lat0: lat0.to_radians().cos(),
        }
    }

    pub fn to_local(&self, lon: f64, lat: f64) -> Point {
        Point::new(
            (lon - self.lon0) * METERS_PER_DEGREE * self.cos_lat0,
            (lat - self.lat0) * METERS_PER_DEGREE,
        )
    }

    /// Inverse of [`LocalFrame::to_local`], as `(lon, lat)`.
    pub fn to_geo(&self, p: Point) -> (f64, f64) {
        let lon = if self.cos_lat0.abs() > f64::EPSILON {
            self.lon0 + p.x / (METERS_PER_DEGREE * self.cos_lat0)
        } else {
            self.lon0
        };
        (lon, self.lat0 + p.y / METERS_PER_DEGREE)
    }
}

/// One `lon,lat[,alt]` tuple. Altitude is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoCoord {
    pub lon: f64,
    pub lat: f64,
    pub alt: Option<String>,
}

/// Parse a `<coordinates>` body. Malformed tuples are skipped.
pub fn parse_coordinates(text: &str) -> Vec<GeoCoord> {
    text.split_whitespace()
        .filter_map(|tuple| {
            let mut it = tuple.split(',');
            let lon = it.next()?.trim().parse::<f64>().ok()?;
            let lat = it.next()?.trim().parse::<f64>().ok()?;
            let alt = it.next().map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
            (lon.is_finite() && lat.is_finite()).then_some(GeoCoord { lon, lat, alt })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct KmlLabel {
    pub name: String,
    pub position: GeoCoord,
    /// Byte range of the trimmed `<coordinates>` text in the document.
    coords_range: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct KmlDocument {
    xml: String,
    frame: LocalFrame,
    rings: Vec<Vec<GeoCoord>>,
    labels: Vec<KmlLabel>,
    options: KmlOptions,
    placements: BTreeMap<usize, Placement>,
}

impl KmlDocument {
    pub fn parse(text: &str, options: KmlOptions) -> Result<Self> {
        let xml = repair_namespaces(text)?.into_owned();
        let (rings, labels) = {
            let doc = Document::parse(&xml).context("Failed to parse KML")?;
            (read_rings(&doc), read_labels(&doc))
        };
        let frame = frame_for(&rings, &labels);
        log::debug!(
            "KML: {} polygon rings, {} point labels, frame origin ({}, {})",
            rings.len(),
            labels.len(),
            frame.lon0,
            frame.lat0
        );
        Ok(Self {
            xml,
            frame,
            rings,
            labels,
            options,
            placements: BTreeMap::new(),
        })
    }

    pub fn from_file(path: impl AsRef<std::path::Path>, options: KmlOptions) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text, options).with_context(|| format!("In {}", path.display()))
    }

    pub fn frame(&self) -> LocalFrame {
        self.frame
    }

    pub fn point_labels(&self) -> &[KmlLabel] {
        &self.labels
    }

    /// Polygon outer rings in geographic coordinates.
    pub fn geo_rings(&self) -> &[Vec<GeoCoord>] {
        &self.rings
    }

    /// Serialize with moved points rewritten.
    pub fn to_kml_string(&self) -> String {
        let mut edits: Vec<(Range<usize>, String)> = self
            .placements
            .iter()
            .map(|(idx, placement)| {
                let label = &self.labels[*idx];
                let (lon, lat) = self.frame.to_geo(placement.center());
                let text = match &label.position.alt {
                    Some(alt) => format!("{lon:.8},{lat:.8},{alt}"),
                    None => format!("{lon:.8},{lat:.8}"),
                };
                (label.coords_range.clone(), text)
            })
            .collect();
        edits.sort_by_key(|(r, _)| std::cmp::Reverse(r.start));

        let mut out = self.xml.clone();
        for (range, text) in edits {
            out.replace_range(range, &text);
        }
        out
    }

    pub fn write_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_kml_string())
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

impl LabelDocument for KmlDocument {
    fn polygon_rings(&self) -> Vec<Vec<Point>> {
        self.rings
            .iter()
            .map(|ring| {
                ring.iter()
                    .map(|c| self.frame.to_local(c.lon, c.lat))
                    .collect()
            })
            .collect()
    }

    fn labels(&self) -> Vec<Label> {
        self.labels
            .iter()
            .enumerate()
            .map(|(index, l)| Label {
                index,
                text: l.name.clone(),
                anchor: self.frame.to_local(l.position.lon, l.position.lat),
                height: self.options.label_height,
                width_factor: 1.0,
            })
            .collect()
    }

    fn apply(&mut self, index: usize, placement: &Placement) {
        if index < self.labels.len() {
            self.placements.insert(index, *placement);
        }
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.has_tag_name(name))
}

fn read_rings(doc: &Document<'_>) -> Vec<Vec<GeoCoord>> {
    doc.descendants()
        .filter(|n| n.is_element() && n.has_tag_name("Polygon"))
        .filter_map(|poly| {
            let outer = child(poly, "outerBoundaryIs")?;
            let coords = outer
                .descendants()
                .find(|n| n.is_element() && n.has_tag_name("coordinates"))?;
            let ring = parse_coordinates(coords.text().unwrap_or_default());
            (!ring.is_empty()).then_some(ring)
        })
        .collect()
}

fn read_labels(doc: &Document<'_>) -> Vec<KmlLabel> {
    doc.descendants()
        .filter(|n| n.is_element() && n.has_tag_name("Placemark"))
        .filter_map(|pm| {
            let point = pm
                .descendants()
                .find(|n| n.is_element() && n.has_tag_name("Point"))?;
            let coords = child(point, "coordinates")?;
            let text_node = coords.children().find(|n| n.is_text())?;
            let raw = text_node.text()?;
            let position = parse_coordinates(raw).into_iter().next()?;
            let name = child(pm, "name")
                .and_then(|n| n.text())
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            Some(KmlLabel {
                name,
                position,
                coords_range: trimmed_range(text_node.range(), raw),
            })
        })
        .collect()
}

fn trimmed_range(range: Range<usize>, raw: &str) -> Range<usize> {
    let lead = raw.len() - raw.trim_start().len();
    let trail = raw.len() - raw.trim_end().len();
    if lead + trail >= range.len() {
        return range.start..range.start;
    }
    range.start + lead..range.end - trail
}

fn frame_for(rings: &[Vec<GeoCoord>], labels: &[KmlLabel]) -> LocalFrame {
    let mut n = 0usize;
    let (mut lon, mut lat) = (0.0, 0.0);
    for c in rings.iter().flatten() {
        lon += c.lon;
        lat += c.lat;
        n += 1;
    }
    if n == 0 {
        for l in labels {
            lon += l.position.lon;
            lat += l.position.lat;
            n += 1;
        }
    }
    if n == 0 {
        return LocalFrame::new(0.0, 0.0);
    }
    LocalFrame::new(lon / n as f64, lat / n as f64)
}
