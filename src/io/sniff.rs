//! Content sniffing for uploaded captures.
//!
//! File names say nothing about type; only the leading bytes decide.

use image::ImageFormat;
use std::io::Read;
use std::path::Path;

/// Bytes read from the head of a file: PNG signature plus the IHDR chunk header.
const SNIFF_LEN: usize = 16;

/// Detect the image format of a byte prefix, if any.
pub fn sniff_bytes(head: &[u8]) -> Option<ImageFormat> {
    image::guess_format(head).ok()
}

/// True when `head` is the start of a PNG stream: signature followed by an
/// IHDR chunk, which is what any decodable PNG must begin with.
pub fn is_png_bytes(head: &[u8]) -> bool {
    sniff_bytes(head) == Some(ImageFormat::Png) && head.len() >= SNIFF_LEN && &head[12..16] == b"IHDR"
}

/// Sniff the file at `path`.
pub fn is_png(path: &Path) -> std::io::Result<bool> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    std::fs::File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(is_png_bytes(&head))
}
