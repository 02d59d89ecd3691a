//! Preview rendering: classify a file by extension, decode it, and build the
//! matching [`Preview`] variant. Decode failures never escape this module as
//! hard errors; they fold into `Preview::Error`.

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use calamine::{Reader, open_workbook_auto_from_rs};
use image::ImageFormat;
use std::io::Cursor;

use crate::models::preview::Preview;
use crate::services::filesystem::FsError;

/// Objects larger than this are rejected before their body is fetched.
pub const DEFAULT_MAX_PREVIEW_BYTES: u64 = 5 * 1024 * 1024;
/// Character cap for text previews.
pub const TEXT_PREVIEW_CHARS: usize = 10_000;
/// Row cap for tabular previews.
pub const TABLE_PREVIEW_ROWS: usize = 100;
/// Thumbnail bounding box, axis-preserving.
pub const THUMBNAIL_MAX_WIDTH: u32 = 800;
pub const THUMBNAIL_MAX_HEIGHT: u32 = 600;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "log", "md", "py", "js", "html", "css", "json", "xml", "yaml", "yml",
];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Everything after the last `.`, lowercased. A key with no dot yields the
/// key itself, which lands in the `unknown` arm.
pub fn extension_of(key: &str) -> String {
    key.rsplit('.').next().unwrap_or(key).to_ascii_lowercase()
}

/// Build a preview for an already-fetched body.
pub fn render(key: &str, size: u64, content: &Bytes) -> Preview {
    let extension = extension_of(key);
    let result = match extension.as_str() {
        ext if TEXT_EXTENSIONS.contains(&ext) => render_text(key, content),
        "svg" => render_svg(key, content),
        ext if IMAGE_EXTENSIONS.contains(&ext) => render_image(key, content),
        "csv" => render_csv(key, content),
        "xlsx" | "xls" => render_workbook(key, content),
        "pdf" => Ok(Preview::Pdf { size }),
        _ => Ok(Preview::Unknown { extension, size }),
    };

    result.unwrap_or_else(|err| Preview::Error {
        message: err.to_string(),
    })
}

fn decode_err(key: &str, reason: impl Into<String>) -> FsError {
    FsError::Decode {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn render_text(key: &str, content: &Bytes) -> Result<Preview, FsError> {
    let text = std::str::from_utf8(content)
        .map_err(|err| decode_err(key, format!("not valid UTF-8: {err}")))?;

    let truncated = text.chars().count() > TEXT_PREVIEW_CHARS;
    let content = if truncated {
        text.chars().take(TEXT_PREVIEW_CHARS).collect()
    } else {
        text.to_string()
    };
    Ok(Preview::Text { content, truncated })
}

fn render_svg(key: &str, content: &Bytes) -> Result<Preview, FsError> {
    let markup = std::str::from_utf8(content)
        .map_err(|err| decode_err(key, format!("not valid UTF-8: {err}")))?;
    Ok(Preview::Svg {
        content: markup.to_string(),
    })
}

fn render_image(key: &str, content: &Bytes) -> Result<Preview, FsError> {
    let format = image::guess_format(content)
        .map_err(|err| decode_err(key, format!("unrecognized image data: {err}")))?;
    let source = image::load_from_memory_with_format(content, format)
        .map_err(|err| decode_err(key, format!("unable to decode image: {err}")))?;

    let thumbnail = source.thumbnail(THUMBNAIL_MAX_WIDTH, THUMBNAIL_MAX_HEIGHT);
    let mut encoded = Cursor::new(Vec::new());
    thumbnail
        .write_to(&mut encoded, format)
        .map_err(|err| decode_err(key, format!("unable to re-encode thumbnail: {err}")))?;

    Ok(Preview::Image {
        content: general_purpose::STANDARD.encode(encoded.get_ref()),
        format: format_label(format),
        width: thumbnail.width(),
        height: thumbnail.height(),
    })
}

fn format_label(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map(|ext| ext.to_ascii_uppercase())
        .unwrap_or_else(|| "IMAGE".to_string())
}

fn render_csv(key: &str, content: &Bytes) -> Result<Preview, FsError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_ref());
    let columns: Vec<String> = reader
        .headers()
        .map_err(|err| decode_err(key, format!("unable to parse CSV: {err}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    let mut total_rows = 0usize;
    for record in reader.records() {
        let record = record.map_err(|err| decode_err(key, format!("unable to parse CSV: {err}")))?;
        if total_rows < TABLE_PREVIEW_ROWS {
            rows.push(record.iter().map(str::to_string).collect());
        }
        total_rows += 1;
    }

    Ok(Preview::Tabular {
        total_columns: columns.len(),
        columns,
        rows,
        total_rows,
    })
}

fn render_workbook(key: &str, content: &Bytes) -> Result<Preview, FsError> {
    let cursor = Cursor::new(content.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|err| decode_err(key, format!("unable to open workbook: {err}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| decode_err(key, "workbook has no sheets"))?
        .map_err(|err| decode_err(key, format!("unable to read sheet: {err}")))?;

    let mut row_iter = range.rows();
    let columns: Vec<String> = row_iter
        .next()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<String>> = row_iter
        .take(TABLE_PREVIEW_ROWS)
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();

    Ok(Preview::Tabular {
        total_columns: range.width(),
        columns,
        rows,
        total_rows: range.height().saturating_sub(1),
    })
}
