//! Minimal Office Open XML workbook codec.
//!
//! Reads the first worksheet of an `.xlsx` into a [`Table`] and writes a
//! single-sheet workbook back out. Writing is deterministic: fixed part
//! order, fixed zip timestamps, inline strings only.

use std::io::{Cursor, Read, Seek, Write};

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use super::model::{CellValue, Table};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const DEFAULT_SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

/// Worksheet limits of the format: rows 1..=1048576, columns A..=XFD.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;
/// Upper bound on the dense grid built from a sparse sheet.
const MAX_CELLS: usize = 50_000_000;

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("invalid zip container: {0}")]
    Zip(#[from] ZipError),
    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] AttrError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed workbook: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parse the first worksheet of a workbook. The first row is the header.
pub fn read_workbook(bytes: &[u8]) -> Result<Table, XlsxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let sheet_path = first_sheet_path(&mut archive)?;
    let shared = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };
    let sheet_xml = read_part(&mut archive, &sheet_path)?
        .ok_or_else(|| XlsxError::Malformed(format!("missing worksheet {sheet_path}")))?;

    let grid = parse_sheet(&sheet_xml, &shared)?;
    grid_to_table(grid)
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, XlsxError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    Ok(Some(text))
}

/// Resolve the part name of the first sheet listed in `xl/workbook.xml`.
fn first_sheet_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String, XlsxError> {
    let Some(workbook) = read_part(archive, "xl/workbook.xml")? else {
        return Err(XlsxError::Malformed("missing xl/workbook.xml".into()));
    };

    let mut rel_id = None;
    let mut reader = Reader::from_str(&workbook);
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheet" => {
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.local_name().as_ref() == b"id" {
                        rel_id = Some(attr.unescape_value()?.into_owned());
                    }
                }
                break;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let Some(rel_id) = rel_id else {
        return Ok(DEFAULT_SHEET_PATH.to_string());
    };

    let Some(rels) = read_part(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(DEFAULT_SHEET_PATH.to_string());
    };
    let mut reader = Reader::from_str(&rels);
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.as_ref() {
                        b"Id" => id = Some(attr.unescape_value()?.into_owned()),
                        b"Target" => target = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
                if id.as_deref() == Some(rel_id.as_str()) {
                    if let Some(target) = target {
                        return Ok(match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("xl/{target}"),
                        });
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(DEFAULT_SHEET_PATH.to_string())
}

/// Collect the plain text of every `<si>` entry, skipping phonetic runs.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, XlsxError> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_text = !in_phonetic,
                _ => {}
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(ref t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

struct PendingCell {
    col: usize,
    cell_type: String,
    value: String,
}

/// Read a worksheet into a row-major grid of raw text.
fn parse_sheet(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, XlsxError> {
    let mut grid: Vec<Vec<String>> = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut row = 0usize;
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut pending: Option<PendingCell> = None;
    let mut in_value = false;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                row = match attr_value(e, b"r")? {
                    Some(r) => r
                        .parse::<usize>()
                        .ok()
                        .and_then(|r| r.checked_sub(1))
                        .ok_or_else(|| XlsxError::Malformed(format!("bad row number {r}")))?,
                    None => next_row,
                };
                next_row = row + 1;
                next_col = 0;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"c" => {
                let col = cell_column(e, next_col)?;
                next_col = col + 1;
                pending = Some(PendingCell {
                    col,
                    cell_type: attr_value(e, b"t")?.unwrap_or_default(),
                    value: String::new(),
                });
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                next_col = cell_column(e, next_col)? + 1;
            }
            Event::Start(ref e)
                if pending.is_some() && matches!(e.local_name().as_ref(), b"v" | b"t") =>
            {
                in_value = true;
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let value = resolve_cell(cell.cell_type.as_str(), cell.value, shared)?;
                        place(&mut grid, row, cell.col, value)?;
                    }
                }
                _ => {}
            },
            Event::Text(ref t) if in_value => {
                if let Some(cell) = pending.as_mut() {
                    cell.value.push_str(&t.unescape()?);
                }
            }
            Event::CData(ref t) if in_value => {
                if let Some(cell) = pending.as_mut() {
                    cell.value.push_str(&String::from_utf8_lossy(t));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(grid)
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, XlsxError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn cell_column(e: &BytesStart<'_>, fallback: usize) -> Result<usize, XlsxError> {
    match attr_value(e, b"r")? {
        Some(reference) => column_index(&reference)
            .ok_or_else(|| XlsxError::Malformed(format!("bad cell reference {reference}"))),
        None => Ok(fallback),
    }
}

fn resolve_cell(cell_type: &str, value: String, shared: &[String]) -> Result<String, XlsxError> {
    match cell_type {
        "s" => {
            let idx: usize = value
                .trim()
                .parse()
                .map_err(|_| XlsxError::Malformed(format!("bad shared string index {value}")))?;
            shared
                .get(idx)
                .cloned()
                .ok_or_else(|| XlsxError::Malformed(format!("shared string {idx} out of range")))
        }
        "b" => Ok(if value.trim() == "1" { "TRUE" } else { "FALSE" }.to_string()),
        _ => Ok(value),
    }
}

fn place(grid: &mut Vec<Vec<String>>, row: usize, col: usize, value: String) -> Result<(), XlsxError> {
    if row >= MAX_ROWS {
        return Err(XlsxError::Malformed(format!("row {} exceeds {MAX_ROWS}", row + 1)));
    }
    if col >= MAX_COLS {
        return Err(XlsxError::Malformed(format!(
            "column {} exceeds {}",
            column_letters(col),
            column_letters(MAX_COLS - 1)
        )));
    }
    if grid.len() <= row {
        grid.resize_with(row + 1, Vec::new);
    }
    let cells = &mut grid[row];
    if cells.len() <= col {
        cells.resize(col + 1, String::new());
    }
    cells[col] = value;
    Ok(())
}

fn grid_to_table(mut grid: Vec<Vec<String>>) -> Result<Table, XlsxError> {
    if grid.is_empty() {
        return Err(XlsxError::Malformed("worksheet has no header row".into()));
    }
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return Err(XlsxError::Malformed("worksheet has no header row".into()));
    }
    if width.saturating_mul(grid.len()) > MAX_CELLS {
        return Err(XlsxError::Malformed(format!(
            "worksheet spans {} rows × {width} columns",
            grid.len()
        )));
    }
    for row in grid.iter_mut() {
        row.resize(width, String::new());
    }

    let mut rows = grid.into_iter();
    let headers = rows
        .next()
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, h)| if h.is_empty() { format!("Unnamed: {i}") } else { h })
        .collect();

    Table::from_text_rows(headers, rows.collect()).map_err(|e| XlsxError::Malformed(e.to_string()))
}

/// Zero-based column index of a reference such as `AB12`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .collect();
    if letters.is_empty() {
        return None;
    }
    letters
        .iter()
        .try_fold(0usize, |acc, &b| {
            acc.checked_mul(26)?
                .checked_add((b.to_ascii_uppercase() - b'A') as usize + 1)
        })
        .map(|n| n - 1)
}

/// Column letters for a zero-based index: 0 → `A`, 26 → `AA`.
fn column_letters(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    r#"</Types>"#
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#
);

const WORKBOOK_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"</Relationships>"#
);

const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#
);

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<workbook xmlns="{ns}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            r#"<sheets><sheet name="{name}" sheetId="1" r:id="rId1"/></sheets>"#,
            r#"</workbook>"#
        ),
        ns = NS_MAIN,
        name = quick_xml::escape::escape(sheet_name),
    )
}

/// Serialise `table` as a single-sheet workbook with a header row.
pub fn write_workbook(table: &Table, sheet_name: &str) -> Result<Vec<u8>, XlsxError> {
    let sheet = sheet_xml(table)?;
    let workbook = workbook_xml(sheet_name);

    let fixed_time = DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0)
        .map_err(|_| XlsxError::Malformed("failed to build fixed timestamp".into()))?;

    let parts: [(&str, &[u8]); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", workbook.as_bytes()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        ("xl/styles.xml", STYLES.as_bytes()),
        (DEFAULT_SHEET_PATH, sheet.as_slice()),
    ];

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in parts {
        writer.start_file(name, part_options(fixed_time))?;
        writer.write_all(data)?;
    }
    Ok(writer.finish()?.into_inner())
}

fn part_options(fixed_time: DateTime) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(fixed_time)
        .unix_permissions(0o644)
}

fn sheet_xml(table: &Table) -> Result<Vec<u8>, XlsxError> {
    let mut w = Writer::new(Cursor::new(Vec::new()));
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    let mut root = BytesStart::new("worksheet");
    root.push_attribute(("xmlns", NS_MAIN));
    w.write_event(Event::Start(root))?;
    w.write_event(Event::Start(BytesStart::new("sheetData")))?;

    let header: Vec<CellValue> = table
        .column_names()
        .into_iter()
        .map(|n| CellValue::Text(n.to_string()))
        .collect();
    write_row(&mut w, 0, header.iter())?;

    for r in 0..table.n_rows() {
        let cells = table.columns().iter().map(|c| &c.values[r]);
        write_row(&mut w, r + 1, cells)?;
    }

    w.write_event(Event::End(BytesEnd::new("sheetData")))?;
    w.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(w.into_inner().into_inner())
}

fn write_row<'a, W: Write>(
    w: &mut Writer<W>,
    row: usize,
    cells: impl Iterator<Item = &'a CellValue>,
) -> Result<(), XlsxError> {
    let row_number = (row + 1).to_string();
    let mut start = BytesStart::new("row");
    start.push_attribute(("r", row_number.as_str()));
    w.write_event(Event::Start(start))?;

    for (col, value) in cells.enumerate() {
        let reference = format!("{}{row_number}", column_letters(col));
        match value {
            CellValue::Null => continue,
            CellValue::Float(v) if !v.is_finite() => continue,
            CellValue::Text(s) => {
                let mut c = BytesStart::new("c");
                c.push_attribute(("r", reference.as_str()));
                c.push_attribute(("t", "inlineStr"));
                w.write_event(Event::Start(c))?;
                w.write_event(Event::Start(BytesStart::new("is")))?;
                let mut t = BytesStart::new("t");
                t.push_attribute(("xml:space", "preserve"));
                w.write_event(Event::Start(t))?;
                w.write_event(Event::Text(BytesText::new(s)))?;
                w.write_event(Event::End(BytesEnd::new("t")))?;
                w.write_event(Event::End(BytesEnd::new("is")))?;
                w.write_event(Event::End(BytesEnd::new("c")))?;
            }
            number => {
                let mut c = BytesStart::new("c");
                c.push_attribute(("r", reference.as_str()));
                w.write_event(Event::Start(c))?;
                w.write_event(Event::Start(BytesStart::new("v")))?;
                w.write_event(Event::Text(BytesText::new(&number.to_string())))?;
                w.write_event(Event::End(BytesEnd::new("v")))?;
                w.write_event(Event::End(BytesEnd::new("c")))?;
            }
        }
    }

    w.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}
