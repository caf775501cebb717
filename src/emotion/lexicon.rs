//! Marker lexicon for affect inference.

/// Joy / gratitude markers.
pub const JOY_MARKERS: &[&str] = &[
    "thank",
    "thanks",
    "awesome",
    "great",
    "perfect",
    "love",
    "amazing",
    "excellent",
    "wonderful",
    "fantastic",
    "brilliant",
    "beautiful",
    "happy",
    "glad",
    "appreciate",
    "helpful",
    "nice",
    "impressive",
    "delighted",
    "pleased",
    "excited",
    "celebrate",
    "success",
    "win",
    "fun",
    "enjoy",
];

/// Sadness / loss markers.
pub const SADNESS_MARKERS: &[&str] = &[
    "sad",
    "miss",
    "lonely",
    "lost",
    "cry",
    "grief",
    "sorry",
    "regret",
    "disappointed",
    "disappointing",
    "hopeless",
    "tired",
    "exhausted",
    "hurt",
    "pain",
    "suffer",
    "helpless",
];

/// Anger / frustration markers.
pub const ANGER_MARKERS: &[&str] = &[
    "angry",
    "furious",
    "rage",
    "hate",
    "annoying",
    "annoyed",
    "frustrated",
    "frustrating",
    "terrible",
    "awful",
    "horrible",
    "worst",
    "disgusting",
    "pathetic",
    "useless",
    "unacceptable",
];

/// Fear / anxiety markers.
pub const FEAR_MARKERS: &[&str] = &[
    "afraid",
    "scared",
    "fear",
    "worried",
    "worry",
    "anxious",
    "nervous",
    "panic",
    "dread",
    "terrified",
    "danger",
    "dangerous",
    "threat",
    "emergency",
];

/// Surprise markers.
pub const SURPRISE_MARKERS: &[&str] = &[
    "surprised",
    "surprising",
    "unexpected",
    "suddenly",
    "unbelievable",
    "incredible",
    "shocking",
    "shocked",
    "wow",
    "whoa",
];
