//! RIFF/WAVE header parsing.
//!
//! Only linear PCM (format tag 1) is accepted. The `data` sub-chunk is found by
//! walking sub-chunks from the start of the container and skipping anything
//! that is not `data` by its declared length, so files with `LIST`, `fact` or
//! other metadata chunks ahead of the audio still play.

use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{PlayerError, Result};

const FORMAT_PCM: u16 = 1;
const SUPPORTED_BITS: [u16; 4] = [8, 16, 24, 32];

/// Parsed container header plus the location of the audio payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavContainerInfo {
    pub sample_rate: u32,
    pub channel_count: u16,
    pub bits_per_sample: u16,
    pub byte_rate: u32,
    /// Bytes per multi-channel sample frame.
    pub block_align: u16,
    /// Absolute file offset of the first payload byte.
    pub data_chunk_offset: u64,
    /// Payload length in bytes, truncated to what the file actually holds.
    pub data_chunk_size: u64,
}

impl WavContainerInfo {
    /// Playback length of the payload in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.byte_rate == 0 {
            return 0.0;
        }
        self.data_chunk_size as f64 / self.byte_rate as f64
    }
}

struct FmtChunk {
    format_tag: u16,
    channel_count: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

/// Parse the container header of `reader` and leave it positioned at the
/// first payload byte.
///
/// `path` is only used to label I/O errors.
pub fn read_header<R: Read + Seek>(reader: &mut R, path: &Path) -> Result<WavContainerInfo> {
    let file_len = reader
        .seek(SeekFrom::End(0))
        .map_err(|e| PlayerError::io("seek", path, e))?;
    reader
        .seek(SeekFrom::Start(0))
        .map_err(|e| PlayerError::io("seek", path, e))?;

    let mut preamble = [0u8; 12];
    read_exact_or_format(reader, &mut preamble, path, "RIFF preamble")?;
    if &preamble[0..4] != b"RIFF" || &preamble[8..12] != b"WAVE" {
        return Err(PlayerError::Format("missing RIFF/WAVE magic".into()));
    }

    let mut fmt: Option<FmtChunk> = None;
    let mut pos: u64 = 12;
    loop {
        let mut header = [0u8; 8];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(PlayerError::Format("no data sub-chunk".into()));
            }
            Err(e) => return Err(PlayerError::io("read header", path, e)),
        }
        pos += 8;
        let id = [header[0], header[1], header[2], header[3]];
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as u64;

        match &id {
            b"fmt " => {
                if size < 16 {
                    return Err(PlayerError::Format(format!("fmt chunk too short ({size} bytes)")));
                }
                let mut body = [0u8; 16];
                read_exact_or_format(reader, &mut body, path, "fmt chunk")?;
                let parsed = parse_fmt(&body)?;
                tracing::debug!(
                    sample_rate = parsed.sample_rate,
                    channels = parsed.channel_count,
                    bits = parsed.bits_per_sample,
                    "fmt chunk"
                );
                fmt = Some(parsed);
                let rest = padded(size) - 16;
                pos = skip(reader, pos + 16, rest, path)?;
            }
            b"data" => {
                let Some(fmt) = fmt else {
                    return Err(PlayerError::Format("data sub-chunk before fmt".into()));
                };
                let available = file_len.saturating_sub(pos);
                if size > available {
                    tracing::warn!(
                        declared = size,
                        available,
                        "data sub-chunk runs past end of file; truncating"
                    );
                }
                return Ok(WavContainerInfo {
                    sample_rate: fmt.sample_rate,
                    channel_count: fmt.channel_count,
                    bits_per_sample: fmt.bits_per_sample,
                    byte_rate: fmt.byte_rate,
                    block_align: fmt.block_align,
                    data_chunk_offset: pos,
                    data_chunk_size: size.min(available),
                });
            }
            other => {
                tracing::debug!(
                    id = %String::from_utf8_lossy(other),
                    size,
                    "skipping sub-chunk"
                );
                pos = skip(reader, pos, padded(size), path)?;
            }
        }
        if pos >= file_len {
            return Err(PlayerError::Format("no data sub-chunk".into()));
        }
    }
}

fn parse_fmt(body: &[u8; 16]) -> Result<FmtChunk> {
    let u16_at = |i: usize| u16::from_le_bytes([body[i], body[i + 1]]);
    let u32_at = |i: usize| u32::from_le_bytes([body[i], body[i + 1], body[i + 2], body[i + 3]]);
    let fmt = FmtChunk {
        format_tag: u16_at(0),
        channel_count: u16_at(2),
        sample_rate: u32_at(4),
        byte_rate: u32_at(8),
        block_align: u16_at(12),
        bits_per_sample: u16_at(14),
    };
    if fmt.format_tag != FORMAT_PCM {
        return Err(PlayerError::Format(format!(
            "audio format tag {} is not PCM",
            fmt.format_tag
        )));
    }
    if fmt.channel_count == 0 {
        return Err(PlayerError::Format("zero channels".into()));
    }
    if !SUPPORTED_BITS.contains(&fmt.bits_per_sample) {
        return Err(PlayerError::Format(format!(
            "{} bits per sample",
            fmt.bits_per_sample
        )));
    }
    if fmt.byte_rate == 0 || fmt.sample_rate == 0 {
        return Err(PlayerError::Format("zero sample or byte rate".into()));
    }
    let expected_align = fmt.channel_count.checked_mul(fmt.bits_per_sample / 8);
    if expected_align != Some(fmt.block_align) {
        return Err(PlayerError::Format(format!(
            "block align {} does not match {} channels x {} bits",
            fmt.block_align, fmt.channel_count, fmt.bits_per_sample
        )));
    }
    Ok(fmt)
}

/// RIFF chunks are word aligned: odd sizes carry one pad byte.
fn padded(size: u64) -> u64 {
    size + (size & 1)
}

fn skip<R: Seek>(reader: &mut R, pos: u64, len: u64, path: &Path) -> Result<u64> {
    let next = pos.saturating_add(len);
    reader
        .seek(SeekFrom::Start(next))
        .map_err(|e| PlayerError::io("seek", path, e))?;
    Ok(next)
}

fn read_exact_or_format<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    path: &Path,
    what: &str,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            PlayerError::Format(format!("truncated {what}"))
        } else {
            PlayerError::io("read header", path, e)
        }
    })
}

/// Write `bytes` to a fresh file under the system temp dir.
#[cfg(test)]
pub(crate) fn write_fixture(label: &str, bytes: &[u8]) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let path = std::env::temp_dir().join(format!(
        "wave-player-{label}-{}-{}-{}.wav",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::write(&path, bytes).expect("write wav fixture");
    path
}

/// Build an in-memory PCM WAV image. Used by tests across the crate.
#[cfg(test)]
pub(crate) fn build_wav(
    sample_rate: u32,
    channels: u16,
    bits: u16,
    extra_chunks: &[(&[u8; 4], &[u8])],
    payload: &[u8],
) -> Vec<u8> {
    let block_align = channels * (bits / 8);
    let byte_rate = sample_rate * block_align as u32;
    let mut body = Vec::new();
    body.extend_from_slice(b"WAVE");
    for (id, data) in extra_chunks {
        body.extend_from_slice(*id);
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        body.extend_from_slice(data);
        if data.len() % 2 == 1 {
            body.push(0);
        }
    }
    body.extend_from_slice(b"fmt ");
    body.extend_from_slice(&16u32.to_le_bytes());
    body.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    body.extend_from_slice(&channels.to_le_bytes());
    body.extend_from_slice(&sample_rate.to_le_bytes());
    body.extend_from_slice(&byte_rate.to_le_bytes());
    body.extend_from_slice(&block_align.to_le_bytes());
    body.extend_from_slice(&bits.to_le_bytes());
    body.extend_from_slice(b"data");
    body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    body.extend_from_slice(payload);

    let mut out = Vec::with_capacity(body.len() + 8);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(bytes: Vec<u8>) -> Result<WavContainerInfo> {
        read_header(&mut Cursor::new(bytes), Path::new("test.wav"))
    }

    #[test]
    fn parses_plain_pcm_header() {
        let info = parse(build_wav(44_100, 2, 16, &[], &[0u8; 400])).unwrap();
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channel_count, 2);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.byte_rate, 176_400);
        assert_eq!(info.block_align, 4);
        assert_eq!(info.data_chunk_offset, 44);
        assert_eq!(info.data_chunk_size, 400);
    }

    #[test]
    fn skips_unknown_chunks_including_odd_padding() {
        let bytes = build_wav(
            8_000,
            1,
            16,
            &[(b"LIST", b"INFOabc"), (b"junk", &[0u8; 10])],
            &[1u8; 16],
        );
        let info = parse(bytes.clone()).unwrap();
        // 12 preamble + (8 + 7 + 1 pad) + (8 + 10) + (8 + 16 fmt) + 8 data header
        assert_eq!(info.data_chunk_offset, 12 + 16 + 18 + 24 + 8);
        let start = info.data_chunk_offset as usize;
        assert_eq!(&bytes[start..start + 16], &[1u8; 16]);
    }

    #[test]
    fn reader_is_left_at_payload() {
        let mut cursor = Cursor::new(build_wav(8_000, 1, 16, &[(b"fact", &[0u8; 4])], &[7u8; 8]));
        let info = read_header(&mut cursor, Path::new("t.wav")).unwrap();
        assert_eq!(cursor.position(), info.data_chunk_offset);
    }

    #[test]
    fn rejects_non_pcm_format() {
        let mut bytes = build_wav(8_000, 1, 16, &[], &[0u8; 8]);
        // format tag lives right after "fmt " + size at offset 20
        bytes[20] = 3;
        let err = parse(bytes).unwrap_err();
        assert!(matches!(err, PlayerError::Format(msg) if msg.contains("not PCM")));
    }

    #[test]
    fn rejects_missing_data_chunk() {
        let mut bytes = build_wav(8_000, 1, 16, &[], &[]);
        // Truncate the data header: only preamble + fmt remain.
        bytes.truncate(36);
        let err = parse(bytes).unwrap_err();
        assert!(matches!(err, PlayerError::Format(msg) if msg.contains("no data")));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = build_wav(8_000, 1, 16, &[], &[0u8; 4]);
        bytes[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(parse(bytes), Err(PlayerError::Format(_))));
    }

    #[test]
    fn truncates_oversized_data_declaration() {
        let mut bytes = build_wav(8_000, 1, 16, &[], &[0u8; 100]);
        bytes[40..44].copy_from_slice(&10_000u32.to_le_bytes());
        let info = parse(bytes).unwrap();
        assert_eq!(info.data_chunk_size, 100);
    }

    #[test]
    fn duration_uses_byte_rate() {
        let info = parse(build_wav(8_000, 1, 16, &[], &vec![0u8; 32_000])).unwrap();
        assert!((info.duration_secs() - 2.0).abs() < 1e-9);
    }
}
