use std::path::PathBuf;
use thiserror::Error;

use crate::core::manuscript::Gender;

/// Fatal conditions of a single timeline build. Running out of duration
/// budget is not one of them.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("manuscript has no contents, nothing to render")]
    EmptyManuscript,

    #[error("narration has {narration} segments but the manuscript has {contents} contents")]
    NarrationMismatch { contents: usize, narration: usize },

    #[error("failed to read audio duration of {}", path.display())]
    Duration {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("{gender} image pool needs at least 2 distinct images, found {found}")]
    ImagePoolTooSmall { gender: Gender, found: usize },

    #[error("no {0} assets available")]
    EmptyPool(&'static str),

    #[error("could not draw a {gender} image different from {}", previous.display())]
    ImageDrawExhausted { gender: Gender, previous: PathBuf },
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
