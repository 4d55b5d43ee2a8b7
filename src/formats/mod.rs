//! Host file formats.
//!
//! - [`dxf`] – DXF through the `dxf` crate: closed `LWPOLYLINE`s and `TEXT` labels
//! - [`kml`] – KML: `<Polygon>` rings and `<Point>` placemarks
//! - [`kmz`] – KMZ archives wrapping a KML document
//! - [`namespaces`] – repair of undeclared XML namespace prefixes
//!
//! [`Document`] dispatches over the three so callers can open a path and run
//! [`crate::relabel::relabel`] without caring which format it is.

pub mod dxf;
pub mod kml;
pub mod kmz;
pub mod namespaces;

pub use self::dxf::{DxfDocument, DxfOptions};
pub use self::kml::{KmlDocument, KmlOptions};
pub use self::kmz::KmzArchive;

use crate::fit::Placement;
use crate::geometry::Point;
use crate::relabel::{Label, LabelDocument};
use anyhow::{Result, bail};
use camino::{Utf8Path, Utf8PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Dxf,
    Kml,
    Kmz,
}

impl Format {
    /// Format from the file extension (case-insensitive).
    pub fn from_path(path: &Utf8Path) -> Option<Self> {
        let ext = path.extension()?.to_ascii_lowercase();
        match ext.as_str() {
            "dxf" => Some(Self::Dxf),
            "kml" => Some(Self::Kml),
            "kmz" => Some(Self::Kmz),
            _ => None,
        }
    }
}

/// Output path for `input`: the file stem gets `suffix`, the extension stays.
/// An empty suffix would overwrite the input and is rejected.
pub fn output_path(input: &Utf8Path, suffix: &str) -> Result<Utf8PathBuf> {
    if suffix.is_empty() {
        bail!("Empty output suffix would overwrite {}", input);
    }
    let stem = input.file_stem().unwrap_or("output");
    Ok(match input.extension() {
        Some(ext) => input.with_file_name(format!("{}{}.{}", stem, suffix, ext)),
        None => input.with_file_name(format!("{}{}", stem, suffix)),
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatOptions {
    pub dxf: DxfOptions,
    pub kml: KmlOptions,
}

/// An opened document of any supported format.
#[derive(Debug)]
pub enum Document {
    Dxf(DxfDocument),
    Kml(KmlDocument),
    Kmz(KmzArchive),
}

impl Document {
    pub fn open(path: &Utf8Path, options: &FormatOptions) -> Result<Self> {
        match Format::from_path(path) {
            Some(Format::Dxf) => Ok(Self::Dxf(DxfDocument::from_file(
                path,
                options.dxf.clone(),
            )?)),
            Some(Format::Kml) => Ok(Self::Kml(KmlDocument::from_file(path, options.kml)?)),
            Some(Format::Kmz) => Ok(Self::Kmz(KmzArchive::from_file(path, options.kml)?)),
            None => bail!("Unsupported file type: {}", path),
        }
    }

    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        match self {
            Self::Dxf(d) => d.write_to_file(path),
            Self::Kml(d) => d.write_to_file(path),
            Self::Kmz(d) => d.write_to_file(path),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Self::Dxf(_) => Format::Dxf,
            Self::Kml(_) => Format::Kml,
            Self::Kmz(_) => Format::Kmz,
        }
    }

    fn inner(&self) -> &dyn LabelDocument {
        match self {
            Self::Dxf(d) => d,
            Self::Kml(d) => d,
            Self::Kmz(d) => d,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn LabelDocument {
        match self {
            Self::Dxf(d) => d,
            Self::Kml(d) => d,
            Self::Kmz(d) => d,
        }
    }
}

impl LabelDocument for Document {
    fn polygon_rings(&self) -> Vec<Vec<Point>> {
        self.inner().polygon_rings()
    }

    fn labels(&self) -> Vec<Label> {
        self.inner().labels()
    }

    fn apply(&mut self, index: usize, placement: &Placement) {
        self.inner_mut().apply(index, placement)
    }
}
