//! Blank fillable voucher templates, for agencies that have no form yet.

use crate::core::pdf_form::encode_win_ansi;
use crate::core::template_mapper::field_names;
use crate::utils::error::Result;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: f32 = 40.0;
const ROW_HEIGHT: f32 = 28.0;
const FIELD_HEIGHT: f32 = 16.0;
const COLUMN_GAP: f32 = 20.0;
const MULTILINE_FIELDS: &[&str] = &["observacao"];

fn show_text(content: &mut Vec<u8>, size: u32, x: f32, y: f32, text: &str) {
    content.extend_from_slice(format!("BT /F1 {size} Tf {x} {y} Td (").as_bytes());
    for byte in encode_win_ansi(text) {
        if matches!(byte, b'(' | b')' | b'\\') {
            content.push(b'\\');
        }
        content.push(byte);
    }
    content.extend_from_slice(b") Tj ET\n");
}

/// Single-page PDF with one text field per name, laid out in two columns
/// under a title. Every field uses auto-sized Helvetica.
pub fn build_template(title: &str, fields: &[String]) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let rows_per_column = ((fields.len() + 1) / 2).max(1);
    let column_width = (PAGE_WIDTH as f32 - 2.0 * MARGIN - COLUMN_GAP) / 2.0;
    let top = PAGE_HEIGHT as f32 - MARGIN - 50.0;

    let mut content = Vec::new();
    show_text(
        &mut content,
        16,
        MARGIN,
        PAGE_HEIGHT as f32 - MARGIN - 16.0,
        title,
    );
    let mut field_refs = Vec::with_capacity(fields.len());

    for (index, name) in fields.iter().enumerate() {
        let column = index / rows_per_column;
        let row = index % rows_per_column;
        let x = MARGIN + column as f32 * (column_width + COLUMN_GAP);
        let y = top - row as f32 * ROW_HEIGHT;

        show_text(&mut content, 7, x, y + FIELD_HEIGHT + 2.0, name);

        let mut widget = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(name.as_str()),
            "Rect" => vec![
                Object::Real(x as _),
                Object::Real(y as _),
                Object::Real((x + column_width) as _),
                Object::Real((y + FIELD_HEIGHT) as _),
            ],
            "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
            "F" => Object::Integer(4),
            "P" => page_id,
        };
        if MULTILINE_FIELDS.contains(&name.as_str()) {
            widget.set("Ff", Object::Integer(1 << 12));
        }
        field_refs.push(Object::Reference(doc.add_object(widget)));
    }

    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "Annots" => field_refs.clone(),
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );

    let acroform_id = doc.add_object(dictionary! {
        "Fields" => field_refs,
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
        "DR" => dictionary! {
            "Font" => dictionary! { "Helv" => font_id },
        },
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

/// Template carrying every field the voucher mapper writes.
pub fn voucher_template(title: &str) -> Result<Vec<u8>> {
    build_template(title, &field_names())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pdf_form::{FieldKind, PdfForm};

    #[test]
    fn test_scaffold_exposes_every_mapped_field() {
        let bytes = voucher_template("Ceará Tours").unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let form = PdfForm::load(&bytes).unwrap();
        let names = form.field_names();
        for expected in field_names() {
            assert!(names.contains(&expected.as_str()), "missing {expected}");
        }
        assert_eq!(form.field_kind("observacao"), Some(FieldKind::Text));
    }

    #[test]
    fn test_title_is_escaped() {
        let mut content = Vec::new();
        show_text(&mut content, 16, 40.0, 786.0, "Tours (CE) à");
        assert_eq!(content, b"BT /F1 16 Tf 40 786 Td (Tours \\(CE\\) \xe0) Tj ET\n".to_vec());

        let bytes = build_template("Tours (CE)", &["nome_contratante".to_string()]).unwrap();
        let form = PdfForm::load(&bytes).unwrap();
        assert_eq!(form.field_names(), vec!["nome_contratante"]);
    }
}
