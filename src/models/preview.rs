//! Tagged preview results, one variant per supported file class.

use serde::Serialize;

/// Outcome of a preview request. Transient: built per request, never stored.
///
/// Closed dispatch by filename extension with an explicit `unknown` arm.
/// Decode or parse failures inside a branch fold into `error` rather than
/// propagating as a hard failure.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Preview {
    /// UTF-8 text, truncated to the preview character limit.
    Text { content: String, truncated: bool },

    /// Re-encoded thumbnail, base64 so it survives JSON transport.
    Image {
        content: String,
        format: String,
        width: u32,
        height: u32,
    },

    /// Raw SVG markup, passed through untouched.
    Svg { content: String },

    /// First rows of a csv/xlsx/xls file plus the full shape.
    Tabular {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        total_rows: usize,
        total_columns: usize,
    },

    /// PDF rendering is not supported; metadata only.
    Pdf { size: u64 },

    /// Unrecognized extension; metadata only.
    Unknown { extension: String, size: u64 },

    Error { message: String },
}
