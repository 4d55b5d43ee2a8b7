//! DXF reading and writing on top of the `dxf` crate.
//!
//! Closed `LWPOLYLINE`s in the entities section become polygon rings and
//! `TEXT` entities become labels. A TEXT entity that receives a placement is
//! moved to the placement center with middle-center justification (the
//! second alignment point carries the center). Every other entity is left as
//! the crate loaded it. Text encoding, including the code page of pre-2007
//! files, is handled by the crate on both load and save.

use crate::fit::Placement;
use crate::geometry::Point;
use crate::relabel::{Label, LabelDocument};
use anyhow::{Result, anyhow};
use dxf::entities::{Entity, EntityType, Text};
use dxf::enums::{HorizontalTextJustification, VerticalTextJustification};
use dxf::{Color, Drawing};
use std::io::Read;

/// Entity filters and the styling of moved labels. Layer names compare
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DxfOptions {
    pub polygon_layer: Option<String>,
    pub text_layer: Option<String>,
    /// ACI color a TEXT must carry.
    pub text_color: Option<u8>,
    /// Layer assigned to moved labels.
    pub output_layer: Option<String>,
    /// ACI color assigned to moved labels.
    pub output_color: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DxfPolyline {
    pub layer: String,
    pub closed: bool,
    pub vertices: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DxfText {
    pub layer: String,
    pub text: String,
    /// Visual anchor: the second alignment point for justified text, the
    /// insertion point otherwise.
    pub insert: Point,
    pub height: f64,
    pub rotation: f64,
    pub width_factor: f64,
    pub color: Option<u8>,
    /// Position among the drawing's entities.
    entity: usize,
}

pub struct DxfDocument {
    drawing: Drawing,
    polylines: Vec<DxfPolyline>,
    texts: Vec<DxfText>,
    options: DxfOptions,
}

impl std::fmt::Debug for DxfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DxfDocument")
            .field("polylines", &self.polylines)
            .field("texts", &self.texts)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DxfDocument {
    pub fn parse(text: &str, options: DxfOptions) -> Result<Self> {
        Self::from_reader(&mut text.as_bytes(), options)
    }

    /// Load from raw file bytes; non-UTF-8 code page text is decoded by the
    /// `dxf` crate.
    pub fn from_bytes(bytes: &[u8], options: DxfOptions) -> Result<Self> {
        Self::from_reader(&mut &bytes[..], options)
    }

    pub fn from_reader<R: Read + ?Sized>(reader: &mut R, options: DxfOptions) -> Result<Self> {
        let drawing = Drawing::load(reader).map_err(|e| anyhow!("Failed to parse DXF: {e:?}"))?;
        Ok(Self::from_drawing(drawing, options))
    }

    pub fn from_file(path: impl AsRef<std::path::Path>, options: DxfOptions) -> Result<Self> {
        let path = path.as_ref();
        let drawing = Drawing::load_file(path)
            .map_err(|e| anyhow!("Failed to read DXF {}: {e:?}", path.display()))?;
        Ok(Self::from_drawing(drawing, options))
    }

    pub fn from_drawing(drawing: Drawing, options: DxfOptions) -> Self {
        let mut polylines = Vec::new();
        let mut texts = Vec::new();
        for (i, entity) in drawing.entities().enumerate() {
            match &entity.specific {
                EntityType::LwPolyline(poly) => polylines.push(DxfPolyline {
                    layer: entity.common.layer.clone(),
                    closed: poly.is_closed(),
                    vertices: poly.vertices.iter().map(|v| Point::new(v.x, v.y)).collect(),
                }),
                EntityType::Text(text) => texts.push(read_text(entity, text, i)),
                _ => {}
            }
        }
        log::debug!(
            "DXF: {} LWPOLYLINE, {} TEXT",
            polylines.len(),
            texts.len()
        );
        Self {
            drawing,
            polylines,
            texts,
            options,
        }
    }

    pub fn drawing(&self) -> &Drawing {
        &self.drawing
    }

    pub fn polylines(&self) -> &[DxfPolyline] {
        &self.polylines
    }

    pub fn texts(&self) -> &[DxfText] {
        &self.texts
    }

    /// Serialize the drawing to DXF bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.drawing
            .save(&mut buf)
            .map_err(|e| anyhow!("Failed to write DXF: {e:?}"))?;
        Ok(buf)
    }

    pub fn write_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        self.drawing
            .save_file(path)
            .map_err(|e| anyhow!("Failed to write {}: {e:?}", path.display()))
    }

    fn text_selected(&self, t: &DxfText) -> bool {
        layer_matches(self.options.text_layer.as_deref(), &t.layer)
            && self.options.text_color.is_none_or(|c| t.color == Some(c))
    }
}

impl LabelDocument for DxfDocument {
    fn polygon_rings(&self) -> Vec<Vec<Point>> {
        self.polylines
            .iter()
            .filter(|p| layer_matches(self.options.polygon_layer.as_deref(), &p.layer))
            .filter(|p| p.is_closed_ring())
            .map(|p| p.vertices.clone())
            .collect()
    }

    fn labels(&self) -> Vec<Label> {
        self.texts
            .iter()
            .enumerate()
            .filter(|(_, t)| self.text_selected(t))
            .map(|(index, t)| Label {
                index,
                text: t.text.clone(),
                anchor: t.insert,
                height: t.height,
                width_factor: t.width_factor,
            })
            .collect()
    }

    fn apply(&mut self, index: usize, placement: &Placement) {
        let Some(label) = self.texts.get_mut(index) else {
            return;
        };
        let Some(entity) = self.drawing.entities_mut().nth(label.entity) else {
            return;
        };
        let EntityType::Text(text) = &mut entity.specific else {
            return;
        };

        let center = dxf::Point::new(placement.x, placement.y, text.location.z);
        text.location = center.clone();
        text.second_alignment_point = center;
        text.text_height = placement.height;
        text.rotation = placement.rotation;
        text.horizontal_text_justification = HorizontalTextJustification::Center;
        text.vertical_text_justification = VerticalTextJustification::Middle;

        if let Some(layer) = &self.options.output_layer {
            entity.common.layer = layer.clone();
            label.layer = layer.clone();
        }
        if let Some(color) = self.options.output_color {
            entity.common.color = Color::from_index(color);
            label.color = Some(color);
        }
        label.insert = placement.center();
        label.height = placement.height;
        label.rotation = placement.rotation;
    }
}

impl DxfPolyline {
    /// Closed flag set, or first and last vertex coincide.
    pub fn is_closed_ring(&self) -> bool {
        if self.closed {
            return self.vertices.len() >= 3;
        }
        match (self.vertices.first(), self.vertices.last()) {
            (Some(a), Some(b)) => self.vertices.len() >= 4 && a == b,
            _ => false,
        }
    }
}

fn layer_matches(filter: Option<&str>, layer: &str) -> bool {
    filter.is_none_or(|f| f.eq_ignore_ascii_case(layer))
}

/// `value` if finite and positive, else 1.0.
fn positive_or_one(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

fn is_justified(text: &Text) -> bool {
    !matches!(
        text.horizontal_text_justification,
        HorizontalTextJustification::Left
    ) || !matches!(
        text.vertical_text_justification,
        VerticalTextJustification::Baseline
    )
}

fn read_text(entity: &Entity, text: &Text, index: usize) -> DxfText {
    let anchor = if is_justified(text) {
        &text.second_alignment_point
    } else {
        &text.location
    };
    DxfText {
        layer: entity.common.layer.clone(),
        text: text.value.clone(),
        insert: Point::new(anchor.x, anchor.y),
        height: positive_or_one(text.text_height),
        rotation: if text.rotation.is_finite() {
            text.rotation
        } else {
            0.0
        },
        width_factor: positive_or_one(text.relative_x_scale_factor),
        color: entity.common.color.index(),
        entity: index,
    }
}
