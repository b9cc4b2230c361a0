//! AcroForm handling on top of `lopdf`: field discovery, text values with
//! generated appearances, and flattening into page content.

use crate::domain::ports::FillableForm;
use crate::utils::error::{Result, VoucherError};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeSet;

const DEFAULT_APPEARANCE: &str = "/Helv 0 Tf 0 g";
const MULTILINE_FLAG: i64 = 1 << 12;
const MAX_FIELD_DEPTH: usize = 32;
const PADDING: f32 = 2.0;
const AUTO_SIZE_MAX: f32 = 12.0;
const AUTO_SIZE_MIN: f32 = 4.0;
const MULTILINE_AUTO_SIZE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Button,
    Choice,
    Signature,
    Unknown,
}

impl FieldKind {
    fn from_name(name: Option<&[u8]>) -> Self {
        match name {
            Some(b"Tx") => FieldKind::Text,
            Some(b"Btn") => FieldKind::Button,
            Some(b"Ch") => FieldKind::Choice,
            Some(b"Sig") => FieldKind::Signature,
            _ => FieldKind::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Button => "button",
            FieldKind::Choice => "choice",
            FieldKind::Signature => "signature",
            FieldKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone)]
struct FormField {
    name: String,
    id: ObjectId,
    kind: FieldKind,
    flags: i64,
    appearance: String,
    alignment: i64,
    widgets: Vec<ObjectId>,
}

impl FormField {
    fn is_multiline(&self) -> bool {
        self.flags & MULTILINE_FLAG != 0
    }
}

/// Values a field inherits from its ancestors.
#[derive(Debug, Clone, Default)]
struct Inherited {
    name: Option<String>,
    kind: Option<Vec<u8>>,
    flags: Option<i64>,
    appearance: Option<String>,
    alignment: Option<i64>,
}

/// A PDF document with an interactive form.
pub struct PdfForm {
    doc: Document,
    fields: Vec<FormField>,
    /// Every object belonging to the field tree, widgets included.
    field_objects: BTreeSet<ObjectId>,
    font: Option<ObjectId>,
}

impl PdfForm {
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes)?;
        let mut form = Self {
            doc,
            fields: Vec::new(),
            field_objects: BTreeSet::new(),
            font: None,
        };
        form.discover_fields()?;
        tracing::debug!("Loaded PDF form with {} fields", form.fields.len());
        Ok(form)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    /// Current `/V` of a text field, `None` when unset.
    pub fn get_text(&self, name: &str) -> Result<Option<String>> {
        let field = self.field(name)?;
        let dict = self.doc.get_dictionary(field.id)?;
        Ok(match dict.get(b"V") {
            Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
            _ => None,
        })
    }

    /// Draws every widget appearance into its page, removes the widgets and
    /// drops the interactive form.
    pub fn flatten(&mut self) -> Result<()> {
        let widgets: BTreeSet<ObjectId> = self
            .fields
            .iter()
            .flat_map(|f| f.widgets.iter().copied())
            .collect();

        let pages: Vec<ObjectId> = self.doc.get_pages().into_values().collect();
        let mut drawn = 0;
        for page_id in pages {
            drawn += self.flatten_page(page_id, &widgets)?;
        }

        self.drop_acroform()?;
        for id in std::mem::take(&mut self.field_objects) {
            self.doc.objects.remove(&id);
        }
        self.fields.clear();

        tracing::debug!("Flattened {} widget appearances", drawn);
        Ok(())
    }

    pub fn save(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    fn field(&self, name: &str) -> Result<&FormField> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| VoucherError::FieldNotFound {
                name: name.to_string(),
            })
    }

    fn catalog_id(&self) -> Result<ObjectId> {
        match self.doc.trailer.get(b"Root") {
            Ok(Object::Reference(id)) => Ok(*id),
            _ => Err(VoucherError::InvalidTemplate {
                name: "document".to_string(),
                reason: "missing document catalog".to_string(),
            }),
        }
    }

    fn acroform(&self) -> Result<Option<&Dictionary>> {
        let catalog = self.doc.get_dictionary(self.catalog_id()?)?;
        match catalog.get(b"AcroForm") {
            Ok(Object::Reference(id)) => Ok(Some(self.doc.get_dictionary(*id)?)),
            Ok(Object::Dictionary(dict)) => Ok(Some(dict)),
            _ => Ok(None),
        }
    }

    fn discover_fields(&mut self) -> Result<()> {
        let Some(acroform) = self.acroform()? else {
            return Ok(());
        };

        let root = Inherited {
            appearance: acroform.get(b"DA").ok().and_then(text_of),
            alignment: acroform.get(b"Q").ok().and_then(integer_of),
            ..Default::default()
        };
        let top_level = match acroform.get(b"Fields") {
            Ok(object) => references_in(&self.doc, object),
            Err(_) => Vec::new(),
        };

        let mut fields = Vec::new();
        let mut objects = BTreeSet::new();
        for id in top_level {
            collect_fields(&self.doc, id, &root, 0, &mut fields, &mut objects)?;
        }
        self.fields = fields;
        self.field_objects = objects;
        Ok(())
    }

    fn helvetica(&mut self) -> ObjectId {
        if let Some(id) = self.font {
            return id;
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.font = Some(id);
        id
    }

    fn write_appearance(&mut self, field: &FormField, widget_id: ObjectId, value: &str) -> Result<()> {
        let widget = self.doc.get_dictionary(widget_id)?;
        let Some([x0, y0, x1, y1]) = widget.get(b"Rect").ok().and_then(|r| rect_of(&self.doc, r))
        else {
            tracing::warn!("Widget of field '{}' has no usable /Rect", field.name);
            return Ok(());
        };
        let alignment = widget
            .get(b"Q")
            .ok()
            .and_then(integer_of)
            .unwrap_or(field.alignment);
        let width = x1 - x0;
        let height = y1 - y0;

        let font_id = self.helvetica();
        let content = appearance_content(
            value,
            width,
            height,
            font_size_of(&field.appearance),
            field.is_multiline(),
            alignment,
        );
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(width as _),
                    Object::Real(height as _),
                ],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "Helv" => font_id },
                },
            },
            content,
        );
        let stream_id = self.doc.add_object(stream);

        let widget = self.doc.get_object_mut(widget_id)?.as_dict_mut()?;
        widget.set("AP", dictionary! { "N" => stream_id });
        Ok(())
    }

    fn flatten_page(&mut self, page_id: ObjectId, widgets: &BTreeSet<ObjectId>) -> Result<usize> {
        let page = self.doc.get_dictionary(page_id)?;
        let (annots_holder, annots) = match page.get(b"Annots") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id)? {
                Object::Array(items) => (Some(*id), items.clone()),
                _ => (None, Vec::new()),
            },
            Ok(Object::Array(items)) => (None, items.clone()),
            _ => return Ok(0),
        };

        let original = annots.len();
        let mut kept = Vec::new();
        let mut draws = Vec::new();
        for annot in annots {
            match annot {
                Object::Reference(id) if widgets.contains(&id) => {
                    if let Some(draw) = self.widget_draw(id)? {
                        draws.push(draw);
                    }
                }
                other => kept.push(other),
            }
        }
        if kept.len() < original {
            if let Some(id) = annots_holder {
                *self.doc.get_object_mut(id)? = Object::Array(kept.clone());
            }
            let page = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
            if kept.is_empty() {
                page.remove(b"Annots");
            } else if annots_holder.is_none() {
                page.set("Annots", kept);
            }
        }

        if draws.is_empty() {
            return Ok(0);
        }

        let mut resources = effective_resources(&self.doc, page_id)?;
        let mut xobjects = match resources.get(b"XObject") {
            Ok(Object::Reference(id)) => self.doc.get_dictionary(*id)?.clone(),
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        let mut operations = String::from("Q\n");
        for draw in &draws {
            xobjects.set(draw.name.as_bytes().to_vec(), draw.appearance);
            operations.push_str(&draw.operation());
        }
        resources.set("XObject", xobjects);

        let mut contents = page_contents(&self.doc, page_id)?;
        let open = self
            .doc
            .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let close = self
            .doc
            .add_object(Stream::new(Dictionary::new(), operations.into_bytes()));
        contents.insert(0, Object::Reference(open));
        contents.push(Object::Reference(close));

        let page = self.doc.get_object_mut(page_id)?.as_dict_mut()?;
        page.set("Resources", resources);
        page.set("Contents", contents);
        Ok(draws.len())
    }

    /// Where and how to paint the normal appearance of a widget.
    fn widget_draw(&self, widget_id: ObjectId) -> Result<Option<WidgetDraw>> {
        let widget = self.doc.get_dictionary(widget_id)?;
        let appearance = match widget.get(b"AP") {
            Ok(Object::Dictionary(ap)) => ap.get(b"N").ok().cloned(),
            Ok(Object::Reference(id)) => self.doc.get_dictionary(*id)?.get(b"N").ok().cloned(),
            _ => None,
        };
        let Some(Object::Reference(stream_id)) = appearance else {
            return Ok(None);
        };
        let Object::Stream(stream) = self.doc.get_object(stream_id)? else {
            return Ok(None);
        };
        let Some(rect) = widget.get(b"Rect").ok().and_then(|r| rect_of(&self.doc, r)) else {
            return Ok(None);
        };
        let bbox = stream
            .dict
            .get(b"BBox")
            .ok()
            .and_then(|b| rect_of(&self.doc, b))
            .unwrap_or(rect);

        Ok(Some(WidgetDraw {
            name: format!("FlatW{}", widget_id.0),
            appearance: stream_id,
            rect,
            bbox,
        }))
    }

    fn drop_acroform(&mut self) -> Result<()> {
        let root = self.catalog_id()?;
        let catalog = self.doc.get_object_mut(root)?.as_dict_mut()?;
        if let Some(Object::Reference(id)) = catalog.remove(b"AcroForm") {
            self.doc.objects.remove(&id);
        }
        Ok(())
    }
}

impl FillableForm for PdfForm {
    fn set_text(&mut self, name: &str, value: &str) -> Result<()> {
        let field = self.field(name)?.clone();
        if field.kind != FieldKind::Text {
            return Err(VoucherError::UnsupportedField {
                name: name.to_string(),
                kind: field.kind.label().to_string(),
            });
        }

        let dict = self.doc.get_object_mut(field.id)?.as_dict_mut()?;
        dict.set("V", encode_text_string(value));

        for widget_id in &field.widgets {
            self.write_appearance(&field, *widget_id, value)?;
        }
        Ok(())
    }
}

struct WidgetDraw {
    name: String,
    appearance: ObjectId,
    rect: [f32; 4],
    bbox: [f32; 4],
}

impl WidgetDraw {
    fn operation(&self) -> String {
        let [x0, y0, x1, y1] = self.rect;
        let [bx0, by0, bx1, by1] = self.bbox;
        let sx = scale(x1 - x0, bx1 - bx0);
        let sy = scale(y1 - y0, by1 - by0);
        format!(
            "q {} 0 0 {} {} {} cm /{} Do Q\n",
            number(sx),
            number(sy),
            number(x0 - bx0 * sx),
            number(y0 - by0 * sy),
            self.name
        )
    }
}

fn scale(target: f32, source: f32) -> f32 {
    if source.abs() < f32::EPSILON {
        1.0
    } else {
        target / source
    }
}

fn collect_fields(
    doc: &Document,
    id: ObjectId,
    parent: &Inherited,
    depth: usize,
    fields: &mut Vec<FormField>,
    objects: &mut BTreeSet<ObjectId>,
) -> Result<()> {
    if depth > MAX_FIELD_DEPTH || !objects.insert(id) {
        return Ok(());
    }
    let dict = doc.get_dictionary(id)?;

    let partial = dict.get(b"T").ok().and_then(text_of);
    let name = match (&parent.name, partial) {
        (Some(prefix), Some(part)) => Some(format!("{prefix}.{part}")),
        (None, Some(part)) => Some(part),
        (prefix, None) => prefix.clone(),
    };
    let inherited = Inherited {
        name,
        kind: match dict.get(b"FT") {
            Ok(Object::Name(kind)) => Some(kind.clone()),
            _ => parent.kind.clone(),
        },
        flags: dict.get(b"Ff").ok().and_then(integer_of).or(parent.flags),
        appearance: dict
            .get(b"DA")
            .ok()
            .and_then(text_of)
            .or_else(|| parent.appearance.clone()),
        alignment: dict.get(b"Q").ok().and_then(integer_of).or(parent.alignment),
    };

    let kids = match dict.get(b"Kids") {
        Ok(object) => references_in(doc, object),
        Err(_) => Vec::new(),
    };
    let (child_fields, widgets): (Vec<ObjectId>, Vec<ObjectId>) = kids
        .into_iter()
        .partition(|kid| doc.get_dictionary(*kid).map(|d| d.has(b"T")).unwrap_or(false));

    if !child_fields.is_empty() {
        for kid in child_fields {
            collect_fields(doc, kid, &inherited, depth + 1, fields, objects)?;
        }
        return Ok(());
    }

    let Some(name) = inherited.name.clone() else {
        return Ok(());
    };
    let widgets = if widgets.is_empty() { vec![id] } else { widgets };
    objects.extend(widgets.iter().copied());

    fields.push(FormField {
        name,
        id,
        kind: FieldKind::from_name(inherited.kind.as_deref()),
        flags: inherited.flags.unwrap_or(0),
        appearance: inherited
            .appearance
            .unwrap_or_else(|| DEFAULT_APPEARANCE.to_string()),
        alignment: inherited.alignment.unwrap_or(0),
        widgets,
    });
    Ok(())
}

/// Resources of a page, following `/Parent` when they are inherited.
fn effective_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        let node = doc.get_dictionary(id)?;
        match node.get(b"Resources") {
            Ok(Object::Reference(res)) => return Ok(doc.get_dictionary(*res)?.clone()),
            Ok(Object::Dictionary(res)) => return Ok(res.clone()),
            _ => {}
        }
        depth += 1;
        current = match node.get(b"Parent") {
            Ok(Object::Reference(parent)) if depth < MAX_FIELD_DEPTH => Some(*parent),
            _ => None,
        };
    }
    Ok(Dictionary::new())
}

fn page_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc.get_dictionary(page_id)?;
    Ok(match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    })
}

fn references_in(doc: &Document, object: &Object) -> Vec<ObjectId> {
    let items = match object {
        Object::Array(items) => items.as_slice(),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    items
        .iter()
        .filter_map(|item| match item {
            Object::Reference(id) => Some(*id),
            _ => None,
        })
        .collect()
}

fn number_of(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn integer_of(object: &Object) -> Option<i64> {
    match object {
        Object::Integer(i) => Some(*i),
        _ => None,
    }
}

fn text_of(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// Normalized `[x0, y0, x1, y1]` with the lower-left corner first.
fn rect_of(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let items = match object {
        Object::Array(items) => items,
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Array(items) => items,
            _ => return None,
        },
        _ => return None,
    };
    if items.len() != 4 {
        return None;
    }
    let v: Vec<f32> = items.iter().filter_map(number_of).collect();
    if v.len() != 4 {
        return None;
    }
    Some([v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])])
}

/// Font size of a default appearance string such as `/Helv 9 Tf 0 g`.
/// Zero means auto size.
fn font_size_of(appearance: &str) -> f32 {
    let tokens: Vec<&str> = appearance.split_whitespace().collect();
    tokens
        .iter()
        .position(|t| *t == "Tf")
        .filter(|i| *i >= 1)
        .and_then(|i| tokens[i - 1].parse::<f32>().ok())
        .filter(|size| size.is_finite() && *size >= 0.0)
        .unwrap_or(0.0)
}

/// Approximate Helvetica advance width, in units of the font size.
fn char_width(c: char) -> f32 {
    match c {
        'i' | 'j' | 'l' | '\'' | '|' => 0.22,
        ' ' | '.' | ',' | ':' | ';' | 'I' | 'f' | 't' | '!' | '/' => 0.28,
        'r' | '(' | ')' | '-' => 0.33,
        'm' | 'M' | 'W' => 0.83,
        'w' => 0.72,
        c if c.is_uppercase() => 0.67,
        c if c.is_ascii_digit() => 0.56,
        _ => 0.53,
    }
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(char_width).sum::<f32>() * size
}

/// Greedy word wrap to `width`; explicit line breaks are kept.
fn wrap_lines(text: &str, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split(' ') {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if !line.is_empty() && text_width(&candidate, size) > width {
                lines.push(std::mem::take(&mut line));
                line = word.to_string();
            } else {
                line = candidate;
            }
        }
        lines.push(line);
    }
    lines
}

fn appearance_content(
    value: &str,
    width: f32,
    height: f32,
    requested_size: f32,
    multiline: bool,
    alignment: i64,
) -> Vec<u8> {
    let inner_width = (width - 2.0 * PADDING).max(1.0);
    let value = value.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = b"/Tx BMC\nq\nBT\n".to_vec();
    if multiline {
        let size = if requested_size > 0.0 {
            requested_size
        } else {
            MULTILINE_AUTO_SIZE
        };
        let leading = size * 1.15;
        out.extend_from_slice(format!("/Helv {} Tf 0 g\n", number(size)).as_bytes());
        out.extend_from_slice(format!("{} TL\n", number(leading)).as_bytes());

        let mut y = height - PADDING - size;
        let mut previous_x = 0.0;
        for (index, line) in wrap_lines(&value, size, inner_width).iter().enumerate() {
            if y < 0.0 {
                break;
            }
            let x = aligned_x(line, size, inner_width, alignment);
            if index == 0 {
                out.extend_from_slice(format!("{} {} Td\n", number(x), number(y)).as_bytes());
            } else {
                out.extend_from_slice(
                    format!("{} {} Td\n", number(x - previous_x), number(-leading)).as_bytes(),
                );
            }
            previous_x = x;
            y -= leading;
            push_show_text(&mut out, line);
        }
    } else {
        let line = value.replace('\n', " ");
        let size = if requested_size > 0.0 {
            requested_size
        } else {
            auto_size(&line, inner_width, height)
        };
        let x = aligned_x(&line, size, inner_width, alignment);
        let y = ((height - size) / 2.0 + size * 0.22).max(0.0);
        out.extend_from_slice(format!("/Helv {} Tf 0 g\n", number(size)).as_bytes());
        out.extend_from_slice(format!("{} {} Td\n", number(x), number(y)).as_bytes());
        push_show_text(&mut out, &line);
    }
    out.extend_from_slice(b"ET\nQ\nEMC\n");
    out
}

fn auto_size(line: &str, inner_width: f32, height: f32) -> f32 {
    let mut size = ((height - 2.0 * PADDING) * 0.8).clamp(AUTO_SIZE_MIN, AUTO_SIZE_MAX);
    while size > AUTO_SIZE_MIN && text_width(line, size) > inner_width {
        size -= 0.5;
    }
    size
}

fn aligned_x(line: &str, size: f32, inner_width: f32, alignment: i64) -> f32 {
    let free = (inner_width - text_width(line, size)).max(0.0);
    PADDING
        + match alignment {
            1 => free / 2.0,
            2 => free,
            _ => 0.0,
        }
}

fn push_show_text(out: &mut Vec<u8>, line: &str) {
    out.push(b'(');
    for byte in encode_win_ansi(line) {
        if matches!(byte, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out.extend_from_slice(b") Tj\n");
}

fn number(value: f32) -> String {
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Encodes for the standard WinAnsi encoding of the appearance font;
/// unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

/// PDF text string: plain bytes for ASCII, UTF-16BE with BOM otherwise.
fn encode_text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::String(value.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|b| *b as char).collect()
}
