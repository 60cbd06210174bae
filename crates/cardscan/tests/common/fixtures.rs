//! Fixture PDFs. Every text line sits in its own `BT ... ET` block so the
//! text layer reads back one line per entry.

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, Stream};

/// ASCII stand-in for the real template marker.
pub const TEST_MARKER: &str = "PMJAY-CMCHIS";

pub const TEST_ID_NUMBER: &str = "1234567890123456";

/// Lines of a well-formed card, boilerplate included.
pub fn card_lines() -> Vec<&'static str> {
    vec![
        "Government of Tamil Nadu",
        "(PMJAY-CMCHIS Integrated Scheme)",
        "Member Identity Card",
        TEST_ID_NUMBER,
        "Murugan K",
        "No 12, Gandhi Street",
        "Chennai 600001",
    ]
}

/// Same layout with the template marker removed.
pub fn foreign_card_lines() -> Vec<&'static str> {
    card_lines()
        .into_iter()
        .filter(|line| !line.contains(TEST_MARKER))
        .collect()
}

/// Builds a one-page A4 PDF with a Courier text layer.
pub fn card_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let content: String = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            format!(
                "BT /F1 12 Tf 50 {} Td ({}) Tj ET\n",
                760 - 18 * i as i64,
                escape(line)
            )
        })
        .collect();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize fixture PDF");
    bytes
}

/// A file that lopdf cannot parse, standing in for an image-only scan.
pub fn scanned_bytes() -> Vec<u8> {
    b"%PDF-1.4\n% image-only scan without a text layer\n".to_vec()
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}
