//! Catalogue of British racecourses and fuzzy lookup against it.
//!
//! Feed labels are free text ("Wolves", "Chelmsford City", "Bangor"), so
//! besides exact name/alias lookup there is a Levenshtein-based fallback for
//! resolving a single label to the closest known course.

use serde::Serialize;

use super::normalize::{normalize_track_name, strip_parenthesized};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackKind {
    Flat,
    Jump,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UkTrack {
    pub name: &'static str,
    pub kind: TrackKind,
    pub aliases: &'static [&'static str],
}

const fn track(name: &'static str, kind: TrackKind, aliases: &'static [&'static str]) -> UkTrack {
    UkTrack { name, kind, aliases }
}

use TrackKind::{Flat, Jump, Mixed};

pub const UK_TRACKS: &[UkTrack] = &[
    track("Aintree", Jump, &["ain"]),
    track("Ascot", Mixed, &["asc"]),
    track("Ayr", Mixed, &[]),
    track("Bangor-on-Dee", Jump, &["bangor", "bod"]),
    track("Bath", Flat, &[]),
    track("Beverley", Flat, &["bev"]),
    track("Brighton", Flat, &["bri"]),
    track("Carlisle", Mixed, &["car"]),
    track("Cartmel", Jump, &[]),
    track("Catterick Bridge", Mixed, &["catterick", "cat"]),
    track("Chelmsford City", Flat, &["chelmsford", "che"]),
    track("Cheltenham", Jump, &["chelt"]),
    track("Chepstow", Mixed, &["chep"]),
    track("Chester", Flat, &[]),
    track("Doncaster", Mixed, &["donny", "don"]),
    track("Epsom Downs", Flat, &["epsom"]),
    track("Exeter", Jump, &["exe"]),
    track("Fakenham", Jump, &["fak"]),
    track("Ffos Las", Mixed, &["ffos"]),
    track("Fontwell Park", Jump, &["fontwell", "fon"]),
    track("Goodwood", Flat, &["good"]),
    track("Great Yarmouth", Flat, &["yarmouth", "yarnmouth", "yar"]),
    track("Hamilton Park", Flat, &["hamilton", "ham"]),
    track("Haydock Park", Mixed, &["haydock", "hay"]),
    track("Hereford", Jump, &["her"]),
    track("Hexham", Jump, &["hex"]),
    track("Huntingdon", Jump, &["hunt"]),
    track("Kelso", Jump, &[]),
    track("Kempton Park", Mixed, &["kempton", "kem"]),
    track("Leicester", Mixed, &["leic"]),
    track("Lingfield Park", Mixed, &["lingfield", "ling"]),
    track("Ludlow", Jump, &["lud"]),
    track("Market Rasen", Jump, &["rasen", "mar"]),
    track("Musselburgh", Mixed, &["muss"]),
    track("Newbury", Mixed, &["new"]),
    track("Newcastle", Mixed, &["newc"]),
    track("Newmarket", Flat, &["newm"]),
    track("Newton Abbot", Jump, &["newton"]),
    track("Nottingham", Flat, &["nott"]),
    track("Perth", Jump, &[]),
    track("Plumpton", Jump, &["plum"]),
    track("Pontefract", Flat, &["ponte", "pon"]),
    track("Redcar", Flat, &["red"]),
    track("Ripon", Flat, &["rip"]),
    track("Salisbury", Flat, &["sal"]),
    track("Sandown Park", Mixed, &["sandown", "san"]),
    track("Sedgefield", Jump, &["sedge"]),
    track("Southwell", Mixed, &["south"]),
    track("Stratford-on-Avon", Jump, &["stratford", "strat"]),
    track("Taunton", Jump, &["tau"]),
    track("Thirsk", Flat, &["thi"]),
    track("Uttoxeter", Jump, &["utto"]),
    track("Warwick", Jump, &["war"]),
    track("Wetherby", Jump, &["wet"]),
    track("Wincanton", Jump, &["winc"]),
    track("Windsor", Mixed, &["win"]),
    track("Wolverhampton", Flat, &["wolves", "wolv"]),
    track("Worcester", Jump, &["worc"]),
    track("York", Flat, &[]),
];

/// Default acceptance threshold for [`find_track_fuzzy`].
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

impl UkTrack {
    fn labels(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }

    fn is_named(&self, normalized: &str) -> bool {
        self.labels().any(|l| l.to_lowercase() == normalized)
    }
}

/// Exact name/alias resolution, ignoring surface qualifiers such as "(AW)".
pub fn canonical_track(name: &str) -> Option<&'static UkTrack> {
    let stripped = strip_parenthesized(&normalize_track_name(name));
    UK_TRACKS.iter().find(|t| t.is_named(&stripped))
}

/// Course type of a known course; `None` for anything outside the catalogue.
pub fn track_kind(name: &str) -> Option<TrackKind> {
    canonical_track(name).map(|t| t.kind)
}

/// Resolve a free-text label to the closest catalogue course.
pub fn find_track_fuzzy(search: &str, threshold: f64) -> Option<&'static UkTrack> {
    let labels: Vec<(usize, String)> = UK_TRACKS
        .iter()
        .enumerate()
        .flat_map(|(i, t)| t.labels().map(move |l| (i, l.to_lowercase())))
        .collect();
    let label_refs: Vec<&str> = labels.iter().map(|(_, l)| l.as_str()).collect();

    best_match(search, &label_refs, threshold).map(|(idx, _)| &UK_TRACKS[labels[idx].0])
}

/// Pick the candidate most similar to `search`.
///
/// A candidate is accepted when its similarity reaches `threshold`. One that
/// contains the search string verbatim is accepted regardless, ranked at no
/// less than `threshold + 0.1`. Equal scores keep the earliest candidate.
/// Returns the winning index and its score.
pub fn best_match(search: &str, candidates: &[&str], threshold: f64) -> Option<(usize, f64)> {
    let needle = normalize_track_name(search);
    let mut best: Option<(usize, f64)> = None;

    for (idx, candidate) in candidates.iter().enumerate() {
        let hay = normalize_track_name(candidate);
        let mut score = similarity(&needle, &hay);
        if !needle.is_empty() && hay.contains(&needle) {
            score = score.max(threshold + 0.1);
        }
        if score < threshold {
            continue;
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((idx, score));
        }
    }

    best
}

/// Normalised Levenshtein similarity in `[0, 1]`; two empty strings score 1.
pub fn similarity(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let longest = len_a.max(len_b);
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / longest as f64
}

/// Levenshtein distance over chars, single-row DP.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = if ca == cb { 0 } else { 1 };
            row[j + 1] = (diag + cost).min(above + 1).min(row[j] + 1);
            diag = above;
        }
    }
    row[b.len()]
}
