//! Deterministic card-image assignment.
//!
//! Cards come out of the spreadsheet without artwork. Each id is hashed onto
//! a fixed placeholder pool, so the same card shows the same image on every
//! client and across page loads, with no image hosting involved.

use std::collections::HashMap;

use parking_lot::Mutex;

const IMAGE_WIDTH: u32 = 400;
const IMAGE_HEIGHT: u32 = 300;
const IMAGE_POOL_SIZE: u32 = 1000;

/// Assigns each card id a stable placeholder image URL.
///
/// The mapping is a pure function of the id. Assignments are additionally
/// cached per instance so repeated lookups return the identical string
/// without rehashing.
#[derive(Default)]
pub struct ImageAssigner {
    cache: Mutex<HashMap<String, String>>,
}

impl ImageAssigner {
    /// Create an assigner with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The image URL for `card_id`.
    pub fn image_url(&self, card_id: &str) -> String {
        if let Some(url) = self.cache.lock().get(card_id) {
            return url.clone();
        }
        let image_id = image_id_for(card_id);
        let url = format!("https://picsum.photos/id/{image_id}/{IMAGE_WIDTH}/{IMAGE_HEIGHT}");
        let _ = self.cache.lock().insert(card_id.to_string(), url.clone());
        url
    }

    /// Number of cached assignments.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }
}

/// Map a card id onto the `1..=1000` placeholder image pool.
///
/// Uses the classic `31 * h + byte` string hash with wrapping arithmetic,
/// folded over the id's bytes.
fn image_id_for(card_id: &str) -> u32 {
    let hash = card_id.bytes().fold(0i32, |acc, byte| {
        i32::from(byte).wrapping_add(acc.wrapping_shl(5).wrapping_sub(acc))
    });
    hash.unsigned_abs() % IMAGE_POOL_SIZE + 1
}
