//! Parsers for the IDX binary format used by MNIST and its derivatives
//! (Fashion-MNIST, EMNIST, …).
//!
//! # IDX3 image file layout
//! ```text
//! bytes  0-1:   0x00 0x00   (reserved, must be zero)
//! byte   2:     0x08        (dtype = uint8)
//! byte   3:     0x03        (number of dimensions = 3)
//! bytes  4-7:   N           (number of images, big-endian u32)
//! bytes  8-11:  rows        (image height in pixels, big-endian u32)
//! bytes 12-15:  cols        (image width in pixels, big-endian u32)
//! bytes 16..:   N * rows * cols bytes, row-major, uint8
//! ```
//!
//! # IDX1 label file layout
//! ```text
//! bytes  0-1:   0x00 0x00   (reserved, must be zero)
//! byte   2:     0x08        (dtype = uint8)
//! byte   3:     0x01        (number of dimensions = 1)
//! bytes  4-7:   N           (number of labels, big-endian u32)
//! bytes  8..:   N bytes, each a class index
//! ```

/// Decoded IDX3 image file; pixels are divided by 255.0 so values lie in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IdxImages {
    pub count: usize,
    pub rows: usize,
    pub cols: usize,
    pub pixels: Vec<f64>,
}

fn be_u32(bytes: &[u8], offset: usize) -> usize {
    u32::from_be_bytes([
        bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3],
    ]) as usize
}

fn check_header(bytes: &[u8], header_len: usize, dims: u8, kind: &str) -> Result<(), String> {
    if bytes.len() < header_len {
        return Err(format!(
            "IDX {} file too short: expected at least {} header bytes, got {}.",
            kind, header_len, bytes.len()
        ));
    }
    if bytes[0] != 0x00 || bytes[1] != 0x00 {
        return Err(format!(
            "IDX {} file: bytes 0-1 must be 0x00 0x00 (reserved), got 0x{:02X} 0x{:02X}.",
            kind, bytes[0], bytes[1]
        ));
    }
    if bytes[2] != 0x08 {
        return Err(format!(
            "IDX {} file: byte 2 (dtype) must be 0x08 (uint8), got 0x{:02X}.",
            kind, bytes[2]
        ));
    }
    if bytes[3] != dims {
        return Err(format!(
            "IDX {} file: byte 3 (dimensions) must be {}, got {}.",
            kind, dims, bytes[3]
        ));
    }
    Ok(())
}

pub fn parse_images(bytes: &[u8]) -> Result<IdxImages, String> {
    check_header(bytes, 16, 0x03, "image")?;

    let count = be_u32(bytes, 4);
    let rows = be_u32(bytes, 8);
    let cols = be_u32(bytes, 12);

    let n_pixels = rows.checked_mul(cols).ok_or_else(|| {
        format!("IDX image file: rows * cols overflows usize (rows={}, cols={}).", rows, cols)
    })?;
    let data_len = count.checked_mul(n_pixels).ok_or_else(|| {
        format!(
            "IDX image file: count * pixels overflows usize (count={}, pixels={}).",
            count, n_pixels
        )
    })?;
    let required = data_len
        .checked_add(16)
        .ok_or_else(|| "IDX image file: data length overflows usize.".to_owned())?;

    if bytes.len() < required {
        return Err(format!(
            "IDX image file too short: header declares {} items of {}×{} pixels \
             ({} data bytes needed after header), but file is only {} bytes total.",
            count, rows, cols, data_len, bytes.len()
        ));
    }

    let pixels = bytes[16..required].iter().map(|&px| px as f64 / 255.0).collect();
    Ok(IdxImages { count, rows, cols, pixels })
}

/// Decodes an IDX1 label file, rejecting any class index `>= n_classes`.
pub fn parse_labels(bytes: &[u8], n_classes: usize) -> Result<Vec<usize>, String> {
    check_header(bytes, 8, 0x01, "label")?;

    let count = be_u32(bytes, 4);
    let required = 8 + count;
    if bytes.len() < required {
        return Err(format!(
            "IDX label file too short: header declares {} labels but file is only {} bytes \
             (need at least {} bytes).",
            count, bytes.len(), required
        ));
    }

    bytes[8..required]
        .iter()
        .enumerate()
        .map(|(i, &class)| {
            let class = class as usize;
            if class >= n_classes {
                Err(format!(
                    "IDX label at index {}: class index {} is out of range for n_classes={}.",
                    i, class, n_classes
                ))
            } else {
                Ok(class)
            }
        })
        .collect()
}

/// Serializes images and labels back into IDX3/IDX1 byte buffers.
///
/// Pixels are clamped to `[0, 1]` and quantized to `u8`.
pub fn encode_pair(rows: usize, cols: usize, pixels: &[f64], labels: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut images = vec![0x00, 0x00, 0x08, 0x03];
    images.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    images.extend_from_slice(&(rows as u32).to_be_bytes());
    images.extend_from_slice(&(cols as u32).to_be_bytes());
    images.extend(pixels.iter().map(|p| (p.clamp(0.0, 1.0) * 255.0).round() as u8));

    let mut label_bytes = vec![0x00, 0x00, 0x08, 0x01];
    label_bytes.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    label_bytes.extend_from_slice(labels);

    (images, label_bytes)
}
