pub mod normalize;
pub mod track;
pub mod tracks;

pub use normalize::normalize_horse_name;
pub use track::{TrackMatcher, TrackStrategy};
pub use tracks::{find_track_fuzzy, DEFAULT_SIMILARITY_THRESHOLD};
