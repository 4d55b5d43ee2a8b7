use approx::assert_relative_eq;
use dxf::entities::EntityType;
use dxf::enums::{HorizontalTextJustification, VerticalTextJustification};
use labelfit::formats::dxf::{DxfDocument, DxfOptions};
use labelfit::relabel::{LabelDocument, RelabelOptions, relabel};

fn dxf(pairs: &[(i32, &str)]) -> String {
    pairs
        .iter()
        .map(|(code, value)| format!("{:>3}\n{}\n", code, value))
        .collect()
}

fn entities(body: &[(i32, &str)]) -> String {
    let mut pairs = vec![
        (0, "SECTION"),
        (2, "HEADER"),
        (9, "$ACADVER"),
        (1, "AC1015"),
        (0, "ENDSEC"),
        (0, "SECTION"),
        (2, "ENTITIES"),
    ];
    pairs.extend_from_slice(body);
    pairs.extend_from_slice(&[(0, "ENDSEC"), (0, "EOF")]);
    dxf(&pairs)
}

fn sample() -> String {
    entities(&[
        // closed lot, 10x10
        (0, "LWPOLYLINE"),
        (8, "GARIS HOMEPASS"),
        (90, "4"),
        (70, "1"),
        (10, "0.0"),
        (20, "0.0"),
        (10, "10.0"),
        (20, "0.0"),
        (10, "10.0"),
        (20, "10.0"),
        (10, "0.0"),
        (20, "10.0"),
        // open polyline, not a polygon
        (0, "LWPOLYLINE"),
        (8, "GARIS HOMEPASS"),
        (90, "3"),
        (70, "0"),
        (10, "20.0"),
        (20, "0.0"),
        (10, "30.0"),
        (20, "0.0"),
        (10, "30.0"),
        (20, "10.0"),
        // the label to move
        (0, "TEXT"),
        (8, "FEATURE_LABEL"),
        (62, "6"),
        (10, "1.0"),
        (20, "1.0"),
        (30, "0.0"),
        (40, "2.5"),
        (1, "A"),
        // a label on another layer
        (0, "TEXT"),
        (8, "NOTES"),
        (10, "2.0"),
        (20, "2.0"),
        (30, "0.0"),
        (40, "1.0"),
        (1, "keep me"),
    ])
}

fn label_options() -> DxfOptions {
    DxfOptions {
        polygon_layer: Some("garis homepass".into()),
        text_layer: Some("FEATURE_LABEL".into()),
        text_color: Some(6),
        ..Default::default()
    }
}

fn texts(drawing: &dxf::Drawing) -> Vec<(&dxf::entities::Entity, &dxf::entities::Text)> {
    drawing
        .entities()
        .filter_map(|e| match &e.specific {
            EntityType::Text(t) => Some((e, t)),
            _ => None,
        })
        .collect()
}

#[test]
fn reads_polylines_and_texts() {
    let doc = DxfDocument::parse(&sample(), label_options()).unwrap();
    assert_eq!(doc.polylines().len(), 2);
    assert!(doc.polylines()[0].closed);
    assert!(!doc.polylines()[1].is_closed_ring());
    assert_eq!(doc.texts().len(), 2);
    assert_eq!(doc.texts()[0].text, "A");
    assert_eq!(doc.texts()[0].height, 2.5);
    assert_eq!(doc.texts()[0].color, Some(6));

    assert_eq!(doc.polygon_rings().len(), 1);
    let labels = doc.labels();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].index, 0);
    assert_eq!(labels[0].text, "A");
}

#[test]
fn untouched_document_keeps_its_entities() {
    let doc = DxfDocument::parse(&sample(), DxfOptions::default()).unwrap();
    let bytes = doc.to_bytes().unwrap();
    let back = DxfDocument::from_bytes(&bytes, DxfOptions::default()).unwrap();
    assert_eq!(back.polylines(), doc.polylines());
    assert_eq!(back.texts(), doc.texts());
}

#[test]
fn relabel_moves_text_to_lot_center() {
    let mut doc = DxfDocument::parse(&sample(), label_options()).unwrap();
    let report = relabel(&mut doc, &RelabelOptions::default());
    assert_eq!(report.polygons, 1);
    assert_eq!(report.labels, 1);
    assert_eq!(report.placed, 1);

    let moved = DxfDocument::from_bytes(&doc.to_bytes().unwrap(), DxfOptions::default()).unwrap();
    let text = &moved.texts()[0];
    assert_relative_eq!(text.insert.x, 5.0, epsilon = 1e-9);
    assert_relative_eq!(text.insert.y, 5.0, epsilon = 1e-9);
    assert_eq!(text.height, 2.5);
    assert_eq!(text.rotation, 0.0);
    assert_eq!(text.layer, "FEATURE_LABEL");
    assert_eq!(text.color, Some(6));

    // the other text is untouched
    let other = &moved.texts()[1];
    assert_eq!((other.insert.x, other.insert.y), (2.0, 2.0));
    assert_eq!(other.text, "keep me");

    let (_, placed) = texts(moved.drawing())[0];
    assert_eq!(
        placed.horizontal_text_justification,
        HorizontalTextJustification::Center
    );
    assert_eq!(
        placed.vertical_text_justification,
        VerticalTextJustification::Middle
    );
    assert_relative_eq!(placed.second_alignment_point.x, 5.0, epsilon = 1e-9);
    assert_relative_eq!(placed.second_alignment_point.y, 5.0, epsilon = 1e-9);
}

#[test]
fn moved_labels_take_output_layer_and_color() {
    let options = DxfOptions {
        output_layer: Some("LABELS".into()),
        output_color: Some(2),
        ..label_options()
    };
    let mut doc = DxfDocument::parse(&sample(), options).unwrap();
    relabel(&mut doc, &RelabelOptions::default());

    let back = DxfDocument::from_bytes(&doc.to_bytes().unwrap(), DxfOptions::default()).unwrap();
    assert_eq!(back.texts()[0].layer, "LABELS");
    assert_eq!(back.texts()[0].color, Some(2));
    assert_eq!(back.texts()[1].layer, "NOTES");
}

#[test]
fn code_page_text_survives_a_rewrite() {
    let mut input = entities(&[
        (0, "LWPOLYLINE"),
        (8, "LOTS"),
        (90, "4"),
        (70, "1"),
        (10, "0.0"),
        (20, "0.0"),
        (10, "10.0"),
        (20, "0.0"),
        (10, "10.0"),
        (20, "10.0"),
        (10, "0.0"),
        (20, "10.0"),
        (0, "TEXT"),
        (8, "L"),
        (10, "1.0"),
        (20, "1.0"),
        (40, "1.0"),
        (1, "A"),
        (0, "TEXT"),
        (8, "NOTES"),
        (10, "2.0"),
        (20, "2.0"),
        (40, "1.0"),
        (1, "45@ NOTE"),
    ])
    .into_bytes();
    // ANSI_1252 degree sign, not valid UTF-8 on its own
    let at = input.iter().position(|&b| b == b'@').unwrap();
    input[at] = 0xB0;

    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("lots.dxf");
    let dst = tmp.path().join("lots_fitted.dxf");
    std::fs::write(&src, &input).unwrap();

    let options = DxfOptions {
        text_layer: Some("L".into()),
        ..Default::default()
    };
    let mut doc = DxfDocument::from_file(&src, options.clone()).unwrap();
    assert_eq!(doc.texts()[1].text, "45\u{B0} NOTE");
    assert_eq!(relabel(&mut doc, &RelabelOptions::default()).placed, 1);
    doc.write_to_file(&dst).unwrap();

    let written = std::fs::read(&dst).unwrap();
    let replacement = "\u{FFFD}".as_bytes();
    assert!(!written.windows(replacement.len()).any(|w| w == replacement));

    let back = DxfDocument::from_file(&dst, options).unwrap();
    let note = &back.texts()[1].text;
    assert!(!note.contains('\u{FFFD}'), "{note:?}");
    assert!(note.starts_with("45") && note.ends_with(" NOTE"), "{note:?}");
}

#[test]
fn invalid_group_code_is_an_error() {
    assert!(DxfDocument::parse("abc\nSECTION\n", DxfOptions::default()).is_err());
}

#[test]
fn writes_and_reads_files() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("lots.dxf");
    let dst = tmp.path().join("lots_fitted.dxf");
    std::fs::write(&src, sample()).unwrap();

    let mut doc = DxfDocument::from_file(&src, label_options()).unwrap();
    relabel(&mut doc, &RelabelOptions::default());
    doc.write_to_file(&dst).unwrap();

    let back = DxfDocument::from_file(&dst, label_options()).unwrap();
    assert_relative_eq!(back.texts()[0].insert.x, 5.0, epsilon = 1e-9);
}
