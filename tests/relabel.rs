use approx::assert_relative_eq;
use camino::{Utf8Path, Utf8PathBuf};
use labelfit::fit::Placement;
use labelfit::formats::{Document, Format, FormatOptions, output_path};
use labelfit::geometry::Point;
use labelfit::matching::MatchStrategy;
use labelfit::relabel::{
    Label, LabelDocument, LabelStatus, RelabelOptions, collect_polygons, relabel,
};
use std::collections::BTreeMap;

/// In-memory document for driving the pipeline without a file format.
#[derive(Default)]
struct MemDoc {
    rings: Vec<Vec<Point>>,
    labels: Vec<Label>,
    applied: BTreeMap<usize, Placement>,
}

impl MemDoc {
    fn ring(mut self, points: &[(f64, f64)]) -> Self {
        self.rings
            .push(points.iter().map(|&p| Point::from(p)).collect());
        self
    }

    fn label(mut self, index: usize, text: &str, at: (f64, f64), height: f64) -> Self {
        self.labels.push(Label {
            index,
            text: text.to_string(),
            anchor: Point::from(at),
            height,
            width_factor: 1.0,
        });
        self
    }
}

impl LabelDocument for MemDoc {
    fn polygon_rings(&self) -> Vec<Vec<Point>> {
        self.rings.clone()
    }

    fn labels(&self) -> Vec<Label> {
        self.labels.clone()
    }

    fn apply(&mut self, index: usize, placement: &Placement) {
        self.applied.insert(index, *placement);
    }
}

fn square(x: f64, y: f64, size: f64) -> Vec<(f64, f64)> {
    vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size)]
}

fn assert_near(p: Point, (x, y): (f64, f64)) {
    assert_relative_eq!(p.x, x, epsilon = 1e-9);
    assert_relative_eq!(p.y, y, epsilon = 1e-9);
}

#[test]
fn invalid_and_tiny_rings_are_skipped() {
    let rings = vec![
        vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
        square(0.0, 0.0, 0.5).into_iter().map(Point::from).collect(),
        square(0.0, 0.0, 10.0).into_iter().map(Point::from).collect(),
    ];
    let (kept, skipped) = collect_polygons(rings, 1.0);
    assert_eq!(kept.len(), 1);
    assert_eq!(skipped, 2);
    assert_relative_eq!(kept[0].area(), 100.0, epsilon = 1e-9);
}

#[test]
fn labels_go_to_their_nearest_lot() {
    let mut doc = MemDoc::default()
        .ring(&square(0.0, 0.0, 10.0))
        .ring(&square(20.0, 0.0, 10.0))
        .label(7, "B", (21.0, 1.0), 2.0)
        .label(3, "A", (1.0, 1.0), 2.0);

    let report = relabel(&mut doc, &RelabelOptions::default());
    assert_eq!(report.polygons, 2);
    assert_eq!(report.labels, 2);
    assert_eq!(report.placed, 2);

    assert_near(doc.applied[&3].center(), (5.0, 5.0));
    assert_near(doc.applied[&7].center(), (25.0, 5.0));

    // outcomes come back in label order
    let order: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
    assert_eq!(order, vec![3, 7]);
    assert!(matches!(
        report.outcomes[1].status,
        LabelStatus::Placed { polygon: 1, .. }
    ));
}

#[test]
fn bad_label_does_not_stop_the_others() {
    let mut doc = MemDoc::default()
        .ring(&square(0.0, 0.0, 10.0))
        .label(0, "OK", (1.0, 1.0), 2.0)
        .label(1, "BAD", (2.0, 2.0), 0.0);

    let report = relabel(&mut doc, &RelabelOptions::default());
    assert_eq!(report.placed, 1);
    assert_eq!(report.failed, 1);
    assert!(doc.applied.contains_key(&0));
    assert!(!doc.applied.contains_key(&1));
    assert!(matches!(
        report.outcomes[1].status,
        LabelStatus::Failed { polygon: 0, .. }
    ));
}

#[test]
fn oversized_text_is_reported_as_fallback() {
    let mut doc = MemDoc::default()
        .ring(&square(0.0, 0.0, 2.0))
        .label(0, "A VERY LONG LABEL THAT CANNOT FIT", (1.0, 1.0), 1.0);

    let report = relabel(&mut doc, &RelabelOptions::default());
    assert_eq!(report.fallback, 1);
    let placement = doc.applied[&0];
    assert_near(placement.center(), (1.0, 1.0));
    assert_relative_eq!(placement.height, 0.3, epsilon = 1e-12);
}

#[test]
fn labels_without_polygons_are_left_in_place() {
    let mut doc = MemDoc::default()
        .ring(&[(0.0, 0.0), (0.5, 0.0), (0.5, 0.5)])
        .label(0, "A", (1.0, 1.0), 2.0);

    let report = relabel(&mut doc, &RelabelOptions::default());
    assert_eq!(report.polygons, 0);
    assert_eq!(report.skipped_polygons, 1);
    assert_eq!(report.unmatched, 1);
    assert!(doc.applied.is_empty());
    assert_eq!(report.outcomes[0].status, LabelStatus::NoPolygon);
}

#[test]
fn containing_first_matching_is_honored() {
    let mut doc = MemDoc::default()
        .ring(&square(0.0, 0.0, 100.0))
        .ring(&square(60.0, 0.0, 2.0))
        .label(0, "X", (58.0, 1.0), 0.5);

    let options = RelabelOptions {
        matching: MatchStrategy::ContainingFirst,
        ..Default::default()
    };
    let report = relabel(&mut doc, &options);
    assert!(matches!(
        report.outcomes[0].status,
        LabelStatus::Placed { polygon: 0, .. }
    ));
    assert_near(doc.applied[&0].center(), (50.0, 50.0));
}

#[test]
fn report_serializes_with_status_tags() {
    let mut doc = MemDoc::default()
        .ring(&square(0.0, 0.0, 10.0))
        .label(0, "A", (1.0, 1.0), 2.0)
        .label(1, "B", (500.0, 500.0), 2.0);
    let options = RelabelOptions {
        min_polygon_area: 0.0,
        ..Default::default()
    };
    let report = relabel(&mut doc, &options);
    // every label matches the single polygon
    assert_eq!(report.placed, 2);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["placed"], 2);
    assert_eq!(json["outcomes"][0]["status"], "placed");
    assert_eq!(json["outcomes"][0]["text"], "A");
    let x = json["outcomes"][0]["placement"]["x"].as_f64().unwrap();
    assert_relative_eq!(x, 5.0, epsilon = 1e-9);

    let mut empty = MemDoc::default().label(0, "A", (0.0, 0.0), 1.0);
    let json = serde_json::to_value(relabel(&mut empty, &options)).unwrap();
    assert_eq!(json["outcomes"][0]["status"], "no_polygon");
}

#[test]
fn format_is_detected_from_extension() {
    assert_eq!(Format::from_path(Utf8Path::new("a/lots.DXF")), Some(Format::Dxf));
    assert_eq!(Format::from_path(Utf8Path::new("site.kml")), Some(Format::Kml));
    assert_eq!(Format::from_path(Utf8Path::new("site.kmz")), Some(Format::Kmz));
    assert_eq!(Format::from_path(Utf8Path::new("notes.txt")), None);
    assert_eq!(Format::from_path(Utf8Path::new("Makefile")), None);
}

#[test]
fn document_opens_relabels_and_saves() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Utf8Path::from_path(tmp.path()).unwrap();
    let src = dir.join("lot.kml");
    let dst = dir.join("lot_fitted.kml");
    std::fs::write(
        &src,
        r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Document>
<Placemark><Polygon><outerBoundaryIs><LinearRing><coordinates>0,0 0.001,0 0.001,0.001 0,0.001 0,0</coordinates></LinearRing></outerBoundaryIs></Polygon></Placemark>
<Placemark><name>A</name><Point><coordinates>0.0001,0.0001</coordinates></Point></Placemark>
</Document></kml>"#,
    )
    .unwrap();

    let mut doc = Document::open(&src, &FormatOptions::default()).unwrap();
    assert_eq!(doc.format(), Format::Kml);
    let report = relabel(&mut doc, &RelabelOptions::default());
    assert_eq!(report.placed, 1);
    doc.save(&dst).unwrap();
    assert!(std::fs::read_to_string(&dst).unwrap().contains("0.00050000,0.00050000"));

    assert!(Document::open(&dir.join("lot.txt"), &FormatOptions::default()).is_err());
}

#[test]
fn output_path_adds_suffix_and_refuses_to_overwrite() {
    let input = Utf8Path::new("site/lots.dxf");
    assert_eq!(
        output_path(input, "_fitted").unwrap(),
        Utf8PathBuf::from("site/lots_fitted.dxf")
    );
    assert_eq!(
        output_path(Utf8Path::new("README"), "_x").unwrap(),
        Utf8PathBuf::from("README_x")
    );
    assert!(output_path(input, "").is_err());
}
