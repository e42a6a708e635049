use std::collections::HashSet;
use std::fmt::Display;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{SheetError, StorageError};
use crate::sheet::{column_letter, Cell, Sheet};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";

/// Style 1 is the bold header font.
const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

const MAX_SHEET_NAME: usize = 31;

/// Writes `sheets` as one workbook, one worksheet each, into `out`.
pub fn write_workbook<W: Write + Seek>(sheets: &[Sheet], out: W) -> Result<W, SheetError> {
    let names = sheet_names(sheets);
    let mut zip = ZipWriter::new(out);

    add_part(&mut zip, "[Content_Types].xml", &content_types_xml(sheets.len())?)?;
    add_part(&mut zip, "_rels/.rels", &root_rels_xml()?)?;
    add_part(&mut zip, "xl/workbook.xml", &workbook_xml(&names)?)?;
    add_part(
        &mut zip,
        "xl/_rels/workbook.xml.rels",
        &workbook_rels_xml(sheets.len())?,
    )?;
    add_part(&mut zip, "xl/styles.xml", STYLES_XML.as_bytes())?;

    for (i, sheet) in sheets.iter().enumerate() {
        let part = format!("xl/worksheets/sheet{}.xml", i + 1);
        add_part(&mut zip, &part, &worksheet_xml(sheet)?)?;
    }

    zip.finish().map_err(|e| SheetError::Archive(e.to_string()))
}

pub fn workbook_bytes(sheets: &[Sheet]) -> Result<Vec<u8>, SheetError> {
    Ok(write_workbook(sheets, Cursor::new(Vec::new()))?.into_inner())
}

pub fn save_workbook(path: &Path, sheets: &[Sheet]) -> Result<(), StorageError> {
    let bytes = workbook_bytes(sheets).map_err(|e| StorageError::Workbook {
        path: path.to_path_buf(),
        source: e,
    })?;

    std::fs::write(path, bytes).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

fn add_part<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    content: &[u8],
) -> Result<(), SheetError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, options)
        .map_err(|e| SheetError::Archive(e.to_string()))?;
    zip.write_all(content)?;
    Ok(())
}

/// Excel sheet names: at most 31 chars, none of `[]:*?/\`, unique.
fn sheet_names(sheets: &[Sheet]) -> Vec<String> {
    let mut taken = HashSet::new();
    sheets
        .iter()
        .enumerate()
        .map(|(i, sheet)| {
            let mut base: String = sheet
                .name
                .chars()
                .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
                .take(MAX_SHEET_NAME)
                .collect();
            if base.trim().is_empty() {
                base = format!("Sheet{}", i + 1);
            }

            let mut name = base.clone();
            let mut n = 1;
            while !taken.insert(name.to_lowercase()) {
                let suffix = format!(" ({})", n);
                let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
                name = format!("{}{}", base.chars().take(keep).collect::<String>(), suffix);
                n += 1;
            }
            name
        })
        .collect()
}

fn xml_err<E: Display>(part: &'static str) -> impl Fn(E) -> SheetError {
    move |e| SheetError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    }
}

struct XmlPart {
    writer: Writer<Vec<u8>>,
    part: &'static str,
}

impl XmlPart {
    fn new(part: &'static str) -> Result<Self, SheetError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_err(part))?;
        Ok(Self { writer, part })
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), SheetError> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer
            .write_event(Event::Start(element))
            .map_err(xml_err(self.part))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), SheetError> {
        let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer
            .write_event(Event::Empty(element))
            .map_err(xml_err(self.part))
    }

    fn text(&mut self, text: &str) -> Result<(), SheetError> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err(self.part))
    }

    fn end(&mut self, name: &str) -> Result<(), SheetError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_err(self.part))
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

fn content_types_xml(sheet_count: usize) -> Result<Vec<u8>, SheetError> {
    let mut xml = XmlPart::new("[Content_Types].xml")?;
    xml.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    xml.empty("Default", &[("Extension", "rels"), ("ContentType", CT_RELS)])?;
    xml.empty(
        "Default",
        &[("Extension", "xml"), ("ContentType", "application/xml")],
    )?;
    xml.empty(
        "Override",
        &[("PartName", "/xl/workbook.xml"), ("ContentType", CT_WORKBOOK)],
    )?;
    xml.empty(
        "Override",
        &[("PartName", "/xl/styles.xml"), ("ContentType", CT_STYLES)],
    )?;
    for i in 1..=sheet_count {
        let part_name = format!("/xl/worksheets/sheet{}.xml", i);
        xml.empty(
            "Override",
            &[("PartName", part_name.as_str()), ("ContentType", CT_WORKSHEET)],
        )?;
    }
    xml.end("Types")?;
    Ok(xml.finish())
}

fn root_rels_xml() -> Result<Vec<u8>, SheetError> {
    let mut xml = XmlPart::new("_rels/.rels")?;
    xml.start("Relationships", &[("xmlns", NS_PKG_REL)])?;
    xml.empty(
        "Relationship",
        &[
            ("Id", "rId1"),
            ("Type", REL_OFFICE_DOCUMENT),
            ("Target", "xl/workbook.xml"),
        ],
    )?;
    xml.end("Relationships")?;
    Ok(xml.finish())
}

fn workbook_xml(names: &[String]) -> Result<Vec<u8>, SheetError> {
    let mut xml = XmlPart::new("xl/workbook.xml")?;
    xml.start("workbook", &[("xmlns", NS_MAIN), ("xmlns:r", NS_REL)])?;
    xml.start("sheets", &[])?;
    for (i, name) in names.iter().enumerate() {
        let sheet_id = (i + 1).to_string();
        let rel_id = format!("rId{}", i + 1);
        xml.empty(
            "sheet",
            &[
                ("name", name.as_str()),
                ("sheetId", sheet_id.as_str()),
                ("r:id", rel_id.as_str()),
            ],
        )?;
    }
    xml.end("sheets")?;
    xml.end("workbook")?;
    Ok(xml.finish())
}

fn workbook_rels_xml(sheet_count: usize) -> Result<Vec<u8>, SheetError> {
    let mut xml = XmlPart::new("xl/_rels/workbook.xml.rels")?;
    xml.start("Relationships", &[("xmlns", NS_PKG_REL)])?;
    for i in 1..=sheet_count {
        let id = format!("rId{}", i);
        let target = format!("worksheets/sheet{}.xml", i);
        xml.empty(
            "Relationship",
            &[
                ("Id", id.as_str()),
                ("Type", REL_WORKSHEET),
                ("Target", target.as_str()),
            ],
        )?;
    }
    let styles_id = format!("rId{}", sheet_count + 1);
    xml.empty(
        "Relationship",
        &[
            ("Id", styles_id.as_str()),
            ("Type", REL_STYLES),
            ("Target", "styles.xml"),
        ],
    )?;
    xml.end("Relationships")?;
    Ok(xml.finish())
}

fn worksheet_xml(sheet: &Sheet) -> Result<Vec<u8>, SheetError> {
    let mut xml = XmlPart::new("xl/worksheets/sheet.xml")?;
    xml.start("worksheet", &[("xmlns", NS_MAIN)])?;
    xml.start("sheetData", &[])?;

    let header: Vec<Cell> = sheet.columns.iter().map(|c| Cell::text(c.as_str())).collect();
    write_row(&mut xml, 1, &header, Some("1"))?;

    for (i, row) in sheet.rows.iter().enumerate() {
        write_row(&mut xml, i + 2, row, None)?;
    }

    xml.end("sheetData")?;
    xml.end("worksheet")?;
    Ok(xml.finish())
}

fn write_row(
    xml: &mut XmlPart,
    row_number: usize,
    cells: &[Cell],
    style: Option<&str>,
) -> Result<(), SheetError> {
    let r = row_number.to_string();
    xml.start("row", &[("r", r.as_str())])?;

    for (col, cell) in cells.iter().enumerate() {
        let reference = format!("{}{}", column_letter(col), row_number);
        let mut attrs: Vec<(&str, &str)> = vec![("r", reference.as_str())];
        if let Some(style) = style {
            attrs.push(("s", style));
        }

        match cell {
            Cell::Empty => {}
            Cell::Number(n) if n.is_finite() => {
                let value = n.to_string();
                xml.start("c", &attrs)?;
                xml.start("v", &[])?;
                xml.text(&value)?;
                xml.end("v")?;
                xml.end("c")?;
            }
            Cell::Number(n) => write_inline(xml, &mut attrs, &n.to_string())?,
            Cell::Text(s) => write_inline(xml, &mut attrs, s)?,
        }
    }

    xml.end("row")
}

fn write_inline<'a>(
    xml: &mut XmlPart,
    attrs: &mut Vec<(&'a str, &'a str)>,
    text: &str,
) -> Result<(), SheetError> {
    attrs.push(("t", "inlineStr"));
    xml.start("c", attrs)?;
    xml.start("is", &[])?;
    xml.start("t", &[("xml:space", "preserve")])?;
    xml.text(text)?;
    xml.end("t")?;
    xml.end("is")?;
    xml.end("c")
}
