//! Embedded preview extraction from RAW files.
//!
//! Cameras store a JPEG-encoded preview (often near full resolution) inside
//! the RAW container so that the back-of-camera display never has to demosaic
//! the sensor data. This module pulls that JPEG out without touching the RAW
//! pipeline, which is what keeps filmstrip scrolling responsive.
//!
//! The supported containers (ARW, CR2, NEF, DNG, ORF) are all TIFF-based:
//! a byte-order header followed by a chain of IFDs, with previews referenced
//! either through JPEGInterchangeFormat tags, JPEG-compressed strips, or a
//! SubIFD. Every referenced JPEG is collected and the largest one wins, which
//! is what separates the real preview from the tiny EXIF thumbnail that most
//! files also carry. A bounded marker scan over the file body is the fallback
//! for containers whose directory structure we fail to follow.

use super::{raster, DecodeError, DecodedImage};

const TIFF_MAGIC_LE: [u8; 4] = [0x49, 0x49, 0x2A, 0x00];
const TIFF_MAGIC_BE: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A];

const TAG_COMPRESSION: u16 = 0x0103;
const TAG_STRIP_OFFSETS: u16 = 0x0111;
const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
const TAG_SUB_IFDS: u16 = 0x014A;
const TAG_JPEG_OFFSET: u16 = 0x0201; // JpegInterchangeFormat
const TAG_JPEG_LENGTH: u16 = 0x0202; // JpegInterchangeFormatLength

const COMPRESSION_JPEG: u32 = 6;
const COMPRESSION_JPEG_OLD: u32 = 7;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

// Bounds against malformed directory structures
const MAX_IFDS: usize = 8;
const MAX_SUB_IFDS: usize = 4;
const MAX_IFD_ENTRIES: u16 = 1024;

/// Extract the embedded preview JPEG from a RAW file, undecoded.
///
/// # Errors
///
/// - `DecodeError::InvalidFormat` - not a TIFF-based container
/// - `DecodeError::CorruptedFile` - the primary directory cannot be parsed
/// - `DecodeError::NoPreview` - container is well-formed but holds no JPEG
pub fn extract_preview_bytes(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let order = match bytes.get(..4) {
        Some(magic) if magic == TIFF_MAGIC_LE => ByteOrder::Little,
        Some(magic) if magic == TIFF_MAGIC_BE => ByteOrder::Big,
        _ => return Err(DecodeError::InvalidFormat),
    };

    let ifd0 = order
        .u32_at(bytes, 4)
        .ok_or_else(|| corrupted("truncated TIFF header"))? as usize;

    let mut pending = vec![ifd0];
    let mut visited = 0usize;
    let mut best: Option<&[u8]> = None;

    while let Some(offset) = pending.pop() {
        visited += 1;
        if visited > MAX_IFDS {
            break;
        }

        let (entries, next_ifd) = match parse_ifd(bytes, order, offset) {
            Ok(parsed) => parsed,
            // IFD0 must parse; damage further down the chain is survivable
            Err(err) if visited == 1 => return Err(err),
            Err(_) => continue,
        };

        for jpeg in candidate_slices(bytes, &entries) {
            if best.is_none_or(|b| jpeg.len() > b.len()) {
                best = Some(jpeg);
            }
        }

        for entry in entries.iter().filter(|e| e.tag == TAG_SUB_IFDS) {
            for sub in sub_ifd_offsets(bytes, order, entry) {
                pending.push(sub as usize);
            }
        }
        if next_ifd != 0 {
            pending.push(next_ifd as usize);
        }
    }

    if let Some(jpeg) = best {
        return Ok(jpeg.to_vec());
    }

    scan_for_jpeg(bytes)
        .map(<[u8]>::to_vec)
        .ok_or(DecodeError::NoPreview)
}

/// Extract and decode the embedded preview in one step.
pub fn decode_raw_preview(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    let jpeg = extract_preview_bytes(bytes)?;
    raster::decode_raster(&jpeg)
}

fn corrupted(what: &str) -> DecodeError {
    DecodeError::CorruptedFile(what.to_string())
}

#[derive(Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16_at(self, bytes: &[u8], offset: usize) -> Option<u16> {
        let raw: [u8; 2] = bytes.get(offset..offset + 2)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u16::from_le_bytes(raw),
            ByteOrder::Big => u16::from_be_bytes(raw),
        })
    }

    fn u32_at(self, bytes: &[u8], offset: usize) -> Option<u32> {
        let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        })
    }
}

struct IfdEntry {
    tag: u16,
    count: u32,
    value: u32,
}

/// Parse the IFD at `offset`, returning its entries and the next-IFD pointer.
fn parse_ifd(
    bytes: &[u8],
    order: ByteOrder,
    offset: usize,
) -> Result<(Vec<IfdEntry>, u32), DecodeError> {
    let entry_count = order
        .u16_at(bytes, offset)
        .ok_or_else(|| corrupted("IFD offset out of bounds"))?;
    if entry_count > MAX_IFD_ENTRIES {
        return Err(corrupted("implausible IFD entry count"));
    }

    let mut entries = Vec::with_capacity(entry_count as usize);
    let mut pos = offset + 2;
    for _ in 0..entry_count {
        let tag = order
            .u16_at(bytes, pos)
            .ok_or_else(|| corrupted("truncated IFD entry"))?;
        let count = order
            .u32_at(bytes, pos + 4)
            .ok_or_else(|| corrupted("truncated IFD entry"))?;
        let value = order
            .u32_at(bytes, pos + 8)
            .ok_or_else(|| corrupted("truncated IFD entry"))?;
        entries.push(IfdEntry { tag, count, value });
        pos += 12;
    }

    let next_ifd = order.u32_at(bytes, pos).unwrap_or(0);
    Ok((entries, next_ifd))
}

/// Resolve the SubIFD offsets referenced by a `TAG_SUB_IFDS` entry.
///
/// A single offset is stored inline; multiple offsets live in an array that
/// the value field points at.
fn sub_ifd_offsets(bytes: &[u8], order: ByteOrder, entry: &IfdEntry) -> Vec<u32> {
    match entry.count {
        0 => Vec::new(),
        1 => vec![entry.value],
        n => {
            let n = (n as usize).min(MAX_SUB_IFDS);
            (0..n)
                .filter_map(|i| order.u32_at(bytes, entry.value as usize + i * 4))
                .collect()
        }
    }
}

/// Collect every JPEG blob an IFD's entries point at, bounds-checked and
/// validated against the SOI magic.
fn candidate_slices<'a>(bytes: &'a [u8], entries: &[IfdEntry]) -> Vec<&'a [u8]> {
    let mut jpeg_offset = None;
    let mut jpeg_length = None;
    let mut strip_offset = None;
    let mut strip_length = None;
    let mut compression = None;

    for entry in entries {
        match entry.tag {
            TAG_JPEG_OFFSET => jpeg_offset = Some(entry.value),
            TAG_JPEG_LENGTH => jpeg_length = Some(entry.value),
            TAG_STRIP_OFFSETS => strip_offset = Some(entry.value),
            TAG_STRIP_BYTE_COUNTS => strip_length = Some(entry.value),
            TAG_COMPRESSION => compression = Some(entry.value),
            _ => {}
        }
    }

    let mut found = Vec::new();
    if let (Some(offset), Some(length)) = (jpeg_offset, jpeg_length) {
        if let Some(slice) = jpeg_slice(bytes, offset, length) {
            found.push(slice);
        }
    }
    // Some cameras store the preview as a single JPEG-compressed strip
    let strips_are_jpeg =
        matches!(compression, Some(COMPRESSION_JPEG) | Some(COMPRESSION_JPEG_OLD));
    if strips_are_jpeg {
        if let (Some(offset), Some(length)) = (strip_offset, strip_length) {
            if let Some(slice) = jpeg_slice(bytes, offset, length) {
                found.push(slice);
            }
        }
    }
    found
}

/// Slice `length` bytes at `offset` if in bounds and starting with SOI.
fn jpeg_slice(bytes: &[u8], offset: u32, length: u32) -> Option<&[u8]> {
    if length < 2 {
        return None;
    }
    let start = offset as usize;
    let end = start.checked_add(length as usize)?;
    let slice = bytes.get(start..end)?;
    slice.starts_with(&JPEG_SOI).then_some(slice)
}

/// Fallback: scan the file body for SOI..EOI marker pairs.
///
/// The first few KiB are skipped so the TIFF structure itself is not
/// misread, and blobs under the size floor are rejected as EXIF thumbnails.
fn scan_for_jpeg(bytes: &[u8]) -> Option<&[u8]> {
    const SKIP_HEADER: usize = 8 * 1024;
    const MIN_PREVIEW_LEN: usize = 50 * 1024;

    let mut i = SKIP_HEADER.min(bytes.len());
    while i + 1 < bytes.len() {
        if bytes[i..].starts_with(&JPEG_SOI) {
            let mut j = i + 2;
            while j + 1 < bytes.len() {
                if bytes[j..].starts_with(&JPEG_EOI) {
                    break;
                }
                j += 1;
            }
            if j + 1 < bytes.len() {
                let blob = &bytes[i..j + 2];
                if blob.len() >= MIN_PREVIEW_LEN {
                    return Some(blob);
                }
                // Too small to be the preview, keep looking past it
                i = j + 2;
                continue;
            }
            return None;
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fake JPEG blob: SOI marker, filler, EOI marker.
    fn jpeg_blob(len: usize) -> Vec<u8> {
        assert!(len >= 4);
        let mut blob = vec![0xAA; len];
        blob[..2].copy_from_slice(&JPEG_SOI);
        blob[len - 2..].copy_from_slice(&JPEG_EOI);
        blob
    }

    /// Builder for little-endian TIFF fixtures with explicit layout control.
    struct TiffBuilder {
        data: Vec<u8>,
    }

    impl TiffBuilder {
        fn new(ifd0_offset: u32) -> Self {
            let mut data = TIFF_MAGIC_LE.to_vec();
            data.extend_from_slice(&ifd0_offset.to_le_bytes());
            Self { data }
        }

        fn pad_to(mut self, offset: usize) -> Self {
            assert!(self.data.len() <= offset, "fixture layout overlaps");
            self.data.resize(offset, 0);
            self
        }

        /// Append an IFD: entries are (tag, count, value) triples, all LONG.
        fn ifd(mut self, entries: &[(u16, u32, u32)], next: u32) -> Self {
            self.data
                .extend_from_slice(&(entries.len() as u16).to_le_bytes());
            for &(tag, count, value) in entries {
                self.data.extend_from_slice(&tag.to_le_bytes());
                self.data.extend_from_slice(&4u16.to_le_bytes()); // type LONG
                self.data.extend_from_slice(&count.to_le_bytes());
                self.data.extend_from_slice(&value.to_le_bytes());
            }
            self.data.extend_from_slice(&next.to_le_bytes());
            self
        }

        fn bytes_at(mut self, offset: usize, bytes: &[u8]) -> Self {
            self = self.pad_to(offset);
            self.data.extend_from_slice(bytes);
            self
        }

        fn build(self) -> Vec<u8> {
            self.data
        }
    }

    #[test]
    fn test_rejects_non_tiff_input() {
        // JPEG magic is not a RAW container
        let jpeg = jpeg_blob(16);
        assert!(matches!(
            extract_preview_bytes(&jpeg),
            Err(DecodeError::InvalidFormat)
        ));
        assert!(matches!(
            extract_preview_bytes(&[]),
            Err(DecodeError::InvalidFormat)
        ));
        assert!(matches!(
            extract_preview_bytes(&[0x00, 0x01, 0x02, 0x03, 0x04]),
            Err(DecodeError::InvalidFormat)
        ));
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        // Magic only, no IFD0 pointer
        let result = extract_preview_bytes(&TIFF_MAGIC_LE);
        assert!(matches!(result, Err(DecodeError::CorruptedFile(_))));
    }

    #[test]
    fn test_ifd0_offset_past_eof_is_corrupt() {
        let data = TiffBuilder::new(4096).build();
        assert!(matches!(
            extract_preview_bytes(&data),
            Err(DecodeError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_truncated_ifd0_is_corrupt() {
        // IFD0 claims an entry but the file ends mid-entry
        let mut data = TiffBuilder::new(8).build();
        data.extend_from_slice(&1u16.to_le_bytes());
        data.push(0x00);
        assert!(matches!(
            extract_preview_bytes(&data),
            Err(DecodeError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_implausible_entry_count_is_corrupt() {
        let mut data = TiffBuilder::new(8).build();
        data.extend_from_slice(&2000u16.to_le_bytes());
        data.resize(64 * 1024, 0);
        assert!(matches!(
            extract_preview_bytes(&data),
            Err(DecodeError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_empty_ifd_has_no_preview() {
        let data = TiffBuilder::new(8).ifd(&[], 0).build();
        assert!(matches!(
            extract_preview_bytes(&data),
            Err(DecodeError::NoPreview)
        ));
    }

    #[test]
    fn test_extracts_jpeg_interchange_pair() {
        let jpeg = jpeg_blob(32);
        let data = TiffBuilder::new(8)
            .ifd(
                &[(TAG_JPEG_OFFSET, 1, 200), (TAG_JPEG_LENGTH, 1, 32)],
                0,
            )
            .bytes_at(200, &jpeg)
            .build();

        assert_eq!(extract_preview_bytes(&data).unwrap(), jpeg);
    }

    #[test]
    fn test_largest_candidate_wins_across_ifds() {
        // IFD0 carries the small EXIF thumbnail, IFD1 the real preview
        let thumb = jpeg_blob(24);
        let preview = jpeg_blob(96);
        let data = TiffBuilder::new(8)
            .ifd(
                &[(TAG_JPEG_OFFSET, 1, 300), (TAG_JPEG_LENGTH, 1, 24)],
                40, // next IFD
            )
            .pad_to(40)
            .ifd(
                &[(TAG_JPEG_OFFSET, 1, 400), (TAG_JPEG_LENGTH, 1, 96)],
                0,
            )
            .bytes_at(300, &thumb)
            .bytes_at(400, &preview)
            .build();

        assert_eq!(extract_preview_bytes(&data).unwrap(), preview);
    }

    #[test]
    fn test_follows_sub_ifd_pointer() {
        let preview = jpeg_blob(64);
        let data = TiffBuilder::new(8)
            .ifd(&[(TAG_SUB_IFDS, 1, 40)], 0)
            .pad_to(40)
            .ifd(
                &[(TAG_JPEG_OFFSET, 1, 300), (TAG_JPEG_LENGTH, 1, 64)],
                0,
            )
            .bytes_at(300, &preview)
            .build();

        assert_eq!(extract_preview_bytes(&data).unwrap(), preview);
    }

    #[test]
    fn test_strip_based_jpeg_both_compression_codes() {
        for compression in [COMPRESSION_JPEG, COMPRESSION_JPEG_OLD] {
            let preview = jpeg_blob(48);
            let data = TiffBuilder::new(8)
                .ifd(
                    &[
                        (TAG_STRIP_OFFSETS, 1, 300),
                        (TAG_STRIP_BYTE_COUNTS, 1, 48),
                        (TAG_COMPRESSION, 1, compression),
                    ],
                    0,
                )
                .bytes_at(300, &preview)
                .build();

            assert_eq!(
                extract_preview_bytes(&data).unwrap(),
                preview,
                "compression code {compression}"
            );
        }
    }

    #[test]
    fn test_uncompressed_strips_are_not_candidates() {
        // Strip tags without a JPEG compression code point at sensor data
        let looks_like_jpeg = jpeg_blob(48);
        let data = TiffBuilder::new(8)
            .ifd(
                &[(TAG_STRIP_OFFSETS, 1, 300), (TAG_STRIP_BYTE_COUNTS, 1, 48)],
                0,
            )
            .bytes_at(300, &looks_like_jpeg)
            .build();

        assert!(matches!(
            extract_preview_bytes(&data),
            Err(DecodeError::NoPreview)
        ));
    }

    #[test]
    fn test_out_of_bounds_candidate_is_skipped() {
        let data = TiffBuilder::new(8)
            .ifd(
                &[(TAG_JPEG_OFFSET, 1, 60_000), (TAG_JPEG_LENGTH, 1, 32)],
                0,
            )
            .build();

        assert!(matches!(
            extract_preview_bytes(&data),
            Err(DecodeError::NoPreview)
        ));
    }

    #[test]
    fn test_candidate_without_soi_magic_is_skipped() {
        let not_jpeg = vec![0u8; 32];
        let data = TiffBuilder::new(8)
            .ifd(
                &[(TAG_JPEG_OFFSET, 1, 200), (TAG_JPEG_LENGTH, 1, 32)],
                0,
            )
            .bytes_at(200, &not_jpeg)
            .build();

        assert!(matches!(
            extract_preview_bytes(&data),
            Err(DecodeError::NoPreview)
        ));
    }

    #[test]
    fn test_marker_scan_fallback_finds_large_jpeg() {
        // Valid TIFF, empty directory, but a 60 KiB JPEG in the body
        let preview = jpeg_blob(60 * 1024);
        let data = TiffBuilder::new(8)
            .ifd(&[], 0)
            .bytes_at(10_000, &preview)
            .build();

        assert_eq!(extract_preview_bytes(&data).unwrap(), preview);
    }

    #[test]
    fn test_marker_scan_ignores_small_blobs() {
        let small = jpeg_blob(4 * 1024);
        let data = TiffBuilder::new(8)
            .ifd(&[], 0)
            .bytes_at(10_000, &small)
            .pad_to(128 * 1024)
            .build();

        assert!(matches!(
            extract_preview_bytes(&data),
            Err(DecodeError::NoPreview)
        ));
    }

    #[test]
    fn test_marker_scan_skips_small_blob_then_finds_preview() {
        let small = jpeg_blob(1024);
        let preview = jpeg_blob(55 * 1024);
        let data = TiffBuilder::new(8)
            .ifd(&[], 0)
            .bytes_at(9_000, &small)
            .bytes_at(20_000, &preview)
            .build();

        assert_eq!(extract_preview_bytes(&data).unwrap(), preview);
    }

    #[test]
    fn test_marker_scan_ignores_markers_in_header_region() {
        // SOI before the 8 KiB skip point must not be picked up
        let mut data = TiffBuilder::new(8).ifd(&[], 0).pad_to(128 * 1024).build();
        data[1000] = JPEG_SOI[0];
        data[1001] = JPEG_SOI[1];
        data[100_000] = JPEG_EOI[0];
        data[100_001] = JPEG_EOI[1];

        assert!(matches!(
            extract_preview_bytes(&data),
            Err(DecodeError::NoPreview)
        ));
    }

    #[test]
    fn test_decode_raw_preview_propagates_extraction_failure() {
        assert!(decode_raw_preview(&[0x01, 0x02, 0x03, 0x04]).is_err());
    }

    #[test]
    fn test_decode_raw_preview_fails_on_undecodable_blob() {
        // Extraction succeeds (valid markers) but the blob is not real JPEG
        let fake = jpeg_blob(60 * 1024);
        let data = TiffBuilder::new(8).ifd(&[], 0).bytes_at(10_000, &fake).build();
        assert!(decode_raw_preview(&data).is_err());
    }

    #[test]
    fn test_sub_ifd_offset_array() {
        // count > 1: the value field points at an array of offsets
        let mut data = vec![0u8; 64];
        data[16..20].copy_from_slice(&111u32.to_le_bytes());
        data[20..24].copy_from_slice(&222u32.to_le_bytes());
        let entry = IfdEntry {
            tag: TAG_SUB_IFDS,
            count: 2,
            value: 16,
        };

        assert_eq!(
            sub_ifd_offsets(&data, ByteOrder::Little, &entry),
            vec![111, 222]
        );
    }

    #[test]
    fn test_big_endian_reads() {
        let data = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(ByteOrder::Big.u16_at(&data, 0), Some(0x1234));
        assert_eq!(ByteOrder::Big.u32_at(&data, 0), Some(0x12345678));
        assert_eq!(ByteOrder::Little.u32_at(&data, 0), Some(0x78563412));
        assert_eq!(ByteOrder::Little.u32_at(&data, 2), None);
    }
}
