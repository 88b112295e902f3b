#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};

pub const TITLE_CASE_HEADER: &str = "Participant,Workshop,Area,Director,President\n";
pub const UPPER_CASE_HEADER: &str = "PARTICIPANT,WORKSHOP,AREA,DIRECTOR,PRESIDENT\n";

/// Writes a template whose pages show every placeholder token as literal text.
pub fn write_template(dir: &Path, pages: usize) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in 0..pages {
        let content = format!(
            "BT\n/F1 28 Tf\n200 700 Td\n(Certificate of Completion {}) Tj\nET\n\
             BT\n/F1 18 Tf\n150 500 Td\n([PARTICIPANT]) Tj\nET\n\
             BT\n/F1 14 Tf\n150 450 Td\n([WORKSHOP]) Tj\nET\n\
             BT\n/F1 14 Tf\n150 400 Td\n([AREA]) Tj\nET\n\
             BT\n/F1 12 Tf\n150 200 Td\n([DIRECTOR]) Tj\nET\n\
             BT\n/F1 12 Tf\n350 200 Td\n([PRESIDENT]) Tj\nET",
            page + 1
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 842.into(), 595.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join("template.pdf");
    doc.save(&path).expect("template written");
    path
}

pub fn write_csv(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("participants.csv");
    std::fs::write(&path, content).expect("csv written");
    path
}

/// Concatenated, decoded content of every page.
pub fn page_texts(path: &Path) -> Vec<String> {
    let doc = Document::load(path).expect("output is a readable PDF");
    doc.get_pages()
        .values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
        .collect()
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
