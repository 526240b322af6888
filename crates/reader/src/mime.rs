//! Mime types for packaged content, derived from file extensions.

use crate::path::ContentPath;

/// Mime type of article pages.
pub const HTML: &str = "text/html";
/// Fallback when an extension is unknown or missing.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guess the mime type of a content path from its extension.
///
/// Extension-less paths are treated as HTML: encyclopedic snapshots
/// conventionally omit `.html` from article paths.
pub fn from_path(path: &ContentPath) -> &'static str {
    let Some(extension) = path.extension() else {
        return HTML;
    };
    match extension.as_str() {
        "html" | "htm" | "xhtml" => HTML,
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => OCTET_STREAM,
    }
}

/// Whether entries of this mime type are article pages.
pub fn is_article(mime: &str) -> bool {
    // Parameters such as `;charset=utf-8` don't change the kind.
    mime.split(';').next().is_some_and(|essence| essence.trim().eq_ignore_ascii_case(HTML))
}
