//! Bit-exact reader/writer for canonical RIFF/WAVE PCM16 mono 8kHz files.
//!
//! This is a thin I/O wrapper with no knowledge of segments or tracks: it
//! only ever deals with a flat `Vec<i16>`/`&[i16]` buffer of samples. It
//! exists as an independent crate so that the WAV format boundary can be
//! tested on its own, the way `segtrack` depends on it rather than
//! reimplementing it.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;
use tracing::info;

/// Fixed format constants this crate supports. The specification pins all
/// three; there is no configuration surface for them.
pub const CHANNELS: u16 = 1;
pub const SAMPLE_RATE: u32 = 8000;
pub const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = (CHANNELS as u32 * (BITS_PER_SAMPLE as u32 / 8)) as u16;
const BYTE_RATE: u32 = SAMPLE_RATE * BLOCK_ALIGN as u32;
const FMT_CHUNK_SIZE: u32 = 16;
const AUDIO_FORMAT_PCM: u16 = 1;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("not a RIFF file")]
    BadRiffTag,

    #[error("RIFF file is not a WAVE file")]
    BadWaveTag,

    #[error("WAVE file has no 'data' chunk")]
    MissingDataChunk,

    #[error("WAVE file header is truncated")]
    TruncatedHeader,
}

type Result<T> = std::result::Result<T, Error>;

fn read_tag<R: Read>(r: &mut R) -> Result<[u8; 4]> {
    let mut tag = [0u8; 4];
    r.read_exact(&mut tag).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedHeader,
        _ => Error::Io(e),
    })?;
    Ok(tag)
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedHeader,
        _ => Error::Io(e),
    })?;
    Ok(u32::from_le_bytes(buf))
}

/// Loads the PCM16 sample data out of the `data` chunk of a canonical WAVE
/// file, skipping over any other chunks (e.g. `LIST`) that precede it.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<i16>> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    if read_tag(&mut file)? != *b"RIFF" {
        return Err(Error::BadRiffTag);
    }
    let _riff_size = read_u32(&mut file)?;
    if read_tag(&mut file)? != *b"WAVE" {
        return Err(Error::BadWaveTag);
    }

    loop {
        let tag = match read_tag(&mut file) {
            Ok(tag) => tag,
            Err(Error::TruncatedHeader) => return Err(Error::MissingDataChunk),
            Err(e) => return Err(e),
        };
        let chunk_size = read_u32(&mut file)?;

        if &tag == b"data" {
            let sample_count = chunk_size as usize / 2;
            let mut samples = vec![0i16; sample_count];
            let mut bytes = vec![0u8; chunk_size as usize];
            file.read_exact(&mut bytes)?;
            for (i, chunk) in bytes.chunks_exact(2).enumerate() {
                samples[i] = i16::from_le_bytes([chunk[0], chunk[1]]);
            }
            info!(path = %path.display(), samples = samples.len(), "loaded wav");
            return Ok(samples);
        }

        // RIFF chunks are padded to an even byte boundary.
        let skip = chunk_size as i64 + (chunk_size & 1) as i64;
        file.seek(SeekFrom::Current(skip))?;
    }
}

/// Writes `samples` as a canonical PCM16/8kHz/mono WAVE file.
pub fn save<P: AsRef<Path>>(path: P, samples: &[i16]) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;

    let data_bytes = (samples.len() * 2) as u32;
    let file_size = data_bytes + 36;

    file.write_all(b"RIFF")?;
    file.write_all(&file_size.to_le_bytes())?;
    file.write_all(b"WAVE")?;

    file.write_all(b"fmt ")?;
    file.write_all(&FMT_CHUNK_SIZE.to_le_bytes())?;
    file.write_all(&AUDIO_FORMAT_PCM.to_le_bytes())?;
    file.write_all(&CHANNELS.to_le_bytes())?;
    file.write_all(&SAMPLE_RATE.to_le_bytes())?;
    file.write_all(&BYTE_RATE.to_le_bytes())?;
    file.write_all(&BLOCK_ALIGN.to_le_bytes())?;
    file.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    file.write_all(b"data")?;
    file.write_all(&data_bytes.to_le_bytes())?;
    for sample in samples {
        file.write_all(&sample.to_le_bytes())?;
    }

    info!(path = %path.display(), samples = samples.len(), "saved wav");
    Ok(())
}
