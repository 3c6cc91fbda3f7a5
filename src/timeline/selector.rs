use std::path::PathBuf;

use crate::core::error::{BuildError, BuildResult};
use crate::core::manuscript::Gender;
use crate::services::resources::ResourceProvider;

/// Upper bound on rejection-sampling redraws. A pool that passed
/// `check_pools` practically never gets near it.
const MAX_REDRAWS: usize = 256;

/// The speaker and picture of the turn just placed on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub speaker_id: String,
    pub image: PathBuf,
}

/// Picks the picture for `speaker_id`, given only the previous turn.
///
/// The same speaker keeps their picture. A new speaker gets a uniform draw
/// from their gender's pool, redrawn until it differs from the previous
/// turn's picture.
pub fn select_image(
    resources: &dyn ResourceProvider,
    speaker_id: &str,
    gender: Gender,
    previous: Option<&Turn>,
) -> BuildResult<PathBuf> {
    let Some(previous) = previous else {
        return resources.random_image(gender);
    };
    if previous.speaker_id == speaker_id {
        return Ok(previous.image.clone());
    }

    for _ in 0..MAX_REDRAWS {
        let candidate = resources.random_image(gender)?;
        if candidate != previous.image {
            return Ok(candidate);
        }
    }
    Err(BuildError::ImageDrawExhausted {
        gender,
        previous: previous.image.clone(),
    })
}

/// Folds one speaker turn into the selector state.
pub fn next_turn(
    resources: &dyn ResourceProvider,
    previous: Option<&Turn>,
    speaker_id: &str,
    gender: Gender,
) -> BuildResult<Turn> {
    let image = select_image(resources, speaker_id, gender, previous)?;
    Ok(Turn {
        speaker_id: speaker_id.to_string(),
        image,
    })
}
