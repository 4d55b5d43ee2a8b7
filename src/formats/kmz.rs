//! KMZ archive reading and writing.
//!
//! A KMZ file is a ZIP archive holding one main KML document (`doc.kml` by
//! convention) plus icons, overlays and other resources. The main document is
//! parsed into a [`KmlDocument`]; every other entry is kept as raw bytes. When
//! writing, the entry order and per-entry compression are preserved and only
//! the main document is regenerated.

use crate::fit::Placement;
use crate::formats::kml::{KmlDocument, KmlOptions};
use crate::geometry::Point;
use crate::relabel::{Label, LabelDocument};
use anyhow::{Context, Result, anyhow};
use std::io::{Read, Seek, Write};

#[derive(Debug, Clone)]
struct KmzEntry {
    path: String,
    data: Vec<u8>,
    compressed: bool,
}

#[derive(Debug, Clone)]
pub struct KmzArchive {
    entries: Vec<KmzEntry>,
    main: usize,
    document: KmlDocument,
}

/// Index of the main KML entry: `doc.kml` at the root, else the first `.kml`.
fn main_kml_index(paths: &[&str]) -> Option<usize> {
    paths
        .iter()
        .position(|p| p.trim_start_matches("./").eq_ignore_ascii_case("doc.kml"))
        .or_else(|| {
            paths
                .iter()
                .position(|p| p.to_ascii_lowercase().ends_with(".kml"))
        })
}

impl KmzArchive {
    /// Read a KMZ archive from a reader (ZIP format).
    pub fn from_reader<R: Read + Seek>(reader: R, options: KmlOptions) -> Result<Self> {
        let mut zip = zip::ZipArchive::new(reader).context("Failed to open KMZ ZIP")?;
        let mut entries = Vec::with_capacity(zip.len());

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let path = file.name().to_string();
            let compressed = file.compression() == zip::CompressionMethod::Deflated;
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .with_context(|| format!("Failed to read {} from KMZ", path))?;
            entries.push(KmzEntry {
                path,
                data,
                compressed,
            });
        }

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        let main = main_kml_index(&paths).ok_or_else(|| anyhow!("No .kml document in KMZ"))?;
        let text = std::str::from_utf8(&entries[main].data)
            .with_context(|| format!("Non-UTF8 content in {}", entries[main].path))?;
        let document = KmlDocument::parse(text, options)
            .with_context(|| format!("In KMZ entry {}", entries[main].path))?;

        Ok(Self {
            entries,
            main,
            document,
        })
    }

    pub fn from_file(path: impl AsRef<std::path::Path>, options: KmlOptions) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        let reader = std::io::BufReader::new(file);
        Self::from_reader(reader, options)
    }

    /// Write the archive to a writer in ZIP format.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = zip::ZipWriter::new(writer);

        for (i, entry) in self.entries.iter().enumerate() {
            let options = if entry.compressed {
                zip::write::FileOptions::default()
                    .compression_method(zip::CompressionMethod::Deflated)
            } else {
                zip::write::FileOptions::default()
                    .compression_method(zip::CompressionMethod::Stored)
            };

            if entry.path.ends_with('/') {
                zip.add_directory(entry.path.as_str(), options)?;
                continue;
            }
            zip.start_file(entry.path.as_str(), options)?;
            if i == self.main {
                zip.write_all(self.document.to_kml_string().as_bytes())?;
            } else {
                zip.write_all(&entry.data)?;
            }
        }

        zip.finish()?;
        Ok(())
    }

    pub fn write_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())
            .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
        let writer = std::io::BufWriter::new(file);
        self.write_to(writer)
    }

    pub fn document(&self) -> &KmlDocument {
        &self.document
    }

    /// Path of the main KML entry.
    pub fn main_entry(&self) -> &str {
        &self.entries[self.main].path
    }

    /// List all entry paths in the archive.
    pub fn entry_paths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.path.as_str()).collect()
    }
}

impl LabelDocument for KmzArchive {
    fn polygon_rings(&self) -> Vec<Vec<Point>> {
        self.document.polygon_rings()
    }

    fn labels(&self) -> Vec<Label> {
        self.document.labels()
    }

    fn apply(&mut self, index: usize, placement: &Placement) {
        self.document.apply(index, placement)
    }
}
