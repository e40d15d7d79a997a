//! Utility functions and helpers for the imagetruth application

use std::path::Path;

/// Whether `file_name` names a JPEG or PNG, judged by its extension.
pub(crate) fn is_accepted_image_name(file_name: &str) -> bool {
    mime_guess::from_path(Path::new(file_name))
        .first()
        .map(|mime| matches!(mime.essence_str(), "image/jpeg" | "image/png"))
        .unwrap_or(false)
}

/// Escape text for inclusion in HTML element content or attribute values.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
