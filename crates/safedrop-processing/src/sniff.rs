//! Magic-byte content sniffing.

/// Number of leading bytes inspected when identifying a file.
pub const SNIFF_LEN: usize = 8192;

/// Identify a file's MIME type from its leading bytes.
///
/// Returns `None` when no known signature matches. Text content is reported
/// as `text/plain` (or a more specific script type) so it can be rejected by
/// an allow-list rather than slipping through as unknown.
pub fn sniff(data: &[u8]) -> Option<&'static str> {
    if data.is_empty() {
        return None;
    }

    // JPEG: FF D8 FF
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }

    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }

    // RIFF container: WEBP / WAVE / AVI
    if data.len() >= 12 && data.starts_with(b"RIFF") {
        return match &data[8..12] {
            b"WEBP" => Some("image/webp"),
            b"WAVE" => Some("audio/wav"),
            b"AVI " => Some("video/x-msvideo"),
            _ => None,
        };
    }

    if data.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }

    // ISO base media: size(4) "ftyp" brand(4)
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return match &data[8..12] {
            b"avif" | b"avis" => Some("image/avif"),
            b"heic" | b"heix" | b"mif1" => Some("image/heic"),
            b"qt  " => Some("video/quicktime"),
            _ => Some("video/mp4"),
        };
    }

    if data.len() >= 14 && data.starts_with(b"BM") {
        return Some("image/bmp");
    }

    if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
        return Some("image/tiff");
    }

    if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        return Some("image/x-icon");
    }

    if data.starts_with(b"PK\x03\x04") || data.starts_with(b"PK\x05\x06") {
        return Some("application/zip");
    }

    if data.starts_with(&[0x1F, 0x8B]) {
        return Some("application/gzip");
    }

    if data.starts_with(b"7z\xBC\xAF\x27\x1C") {
        return Some("application/x-7z-compressed");
    }

    if data.starts_with(b"Rar!\x1A\x07") {
        return Some("application/vnd.rar");
    }

    if data.starts_with(&[0x7F, b'E', b'L', b'F']) {
        return Some("application/x-executable");
    }

    if data.starts_with(b"MZ") {
        return Some("application/x-msdownload");
    }

    // OLE2 compound document (legacy Office)
    if data.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return Some("application/x-ole-storage");
    }

    if data.starts_with(b"ID3") || data.starts_with(&[0xFF, 0xFB]) {
        return Some("audio/mpeg");
    }

    if data.starts_with(b"OggS") {
        return Some("audio/ogg");
    }

    if data.starts_with(b"fLaC") {
        return Some("audio/flac");
    }

    if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some("video/webm");
    }

    sniff_text(data)
}

fn sniff_text(data: &[u8]) -> Option<&'static str> {
    let text = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    let looks_textual = text
        .iter()
        .all(|&b| b == b'\t' || b == b'\n' || b == b'\r' || b == 0x0C || b >= 0x20);
    if !looks_textual {
        return None;
    }

    let start = text
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|i| &text[i..])
        .unwrap_or(&[]);
    let lower: Vec<u8> = start.iter().take(64).map(u8::to_ascii_lowercase).collect();

    if lower.starts_with(b"<?php") || lower.starts_with(b"<?=") {
        Some("text/x-php")
    } else if lower.starts_with(b"#!") {
        Some("text/x-shellscript")
    } else if lower.starts_with(b"<svg") || lower.starts_with(b"<?xml") {
        Some("image/svg+xml")
    } else if lower.starts_with(b"<!doctype html") || lower.starts_with(b"<html") {
        Some("text/html")
    } else {
        Some("text/plain")
    }
}
