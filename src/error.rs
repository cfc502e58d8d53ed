use thiserror::Error;

/// The small, structured error taxonomy the segment graph can surface.
///
/// Most edit primitives are intentionally *not* fallible in the Rust sense
/// where the original C source was merely silent: `read` never errors (a
/// short or empty copy is the documented behavior), and `delete_range`
/// returns `Ok(false)` rather than an error for both "nothing to delete" and
/// "blocked by an outstanding view", since both are ordinary, expected
/// outcomes a caller is meant to branch on, not failures.
#[derive(Error, Debug)]
pub enum Error {
    #[error("range out of bounds: pos={pos} len={len} against length {length}")]
    OutOfRange {
        pos: usize,
        len: usize,
        length: usize,
    },

    #[error("write begins at {pos}, which is past the current track length {length}")]
    WriteBeyondEnd { pos: usize, length: usize },

    #[error("insert requires both tracks to share a graph (use Track::pair)")]
    UnrelatedTracks,

    #[error(transparent)]
    Wav(#[from] wavio::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
