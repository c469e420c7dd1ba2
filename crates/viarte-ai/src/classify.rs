//! Content tagging for clips.
//!
//! Tags come from a fixed vocabulary. Who computes them is pluggable: the
//! transition policy only depends on the resulting [`TagSet`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::str::FromStr;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use viarte_timeline::Clip;

use crate::error::AiResult;

/// Content tag vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentTag {
    Nature,
    Urban,
    Action,
    Static,
    Dark,
    Bright,
}

impl ContentTag {
    pub const ALL: [ContentTag; 6] = [
        ContentTag::Nature,
        ContentTag::Urban,
        ContentTag::Action,
        ContentTag::Static,
        ContentTag::Dark,
        ContentTag::Bright,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Nature => "nature",
            Self::Urban => "urban",
            Self::Action => "action",
            Self::Static => "static",
            Self::Dark => "dark",
            Self::Bright => "bright",
        }
    }
}

impl fmt::Display for ContentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown content tag '{}'", s))
    }
}

/// Tags assigned to one clip.
pub type TagSet = BTreeSet<ContentTag>;

/// Something that can tag a clip's content. Calls may take a while.
pub trait ContentClassifier: Send + Sync + 'static {
    fn classify(&self, clip: &Clip) -> impl Future<Output = AiResult<TagSet>> + Send;
}

/// Picks one tag at random per call.
pub struct RandomClassifier {
    rng: Mutex<StdRng>,
}

impl RandomClassifier {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence of tags.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn pick(&self) -> ContentTag {
        let mut rng = self.rng.lock();
        *ContentTag::ALL.choose(&mut *rng).unwrap_or(&ContentTag::Static)
    }
}

impl Default for RandomClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentClassifier for RandomClassifier {
    async fn classify(&self, _clip: &Clip) -> AiResult<TagSet> {
        Ok(TagSet::from([self.pick()]))
    }
}

/// Deterministic tagging from words in a clip's name and source.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: HashMap<String, ContentTag>,
}

impl KeywordClassifier {
    /// Classifier with no keywords; every clip comes back untagged.
    pub fn empty() -> Self {
        Self {
            keywords: HashMap::new(),
        }
    }

    pub fn with_keyword(mut self, word: &str, tag: ContentTag) -> Self {
        self.keywords.insert(word.to_ascii_lowercase(), tag);
        self
    }

    /// Tags for a piece of free text.
    pub fn tags_for(&self, text: &str) -> TagSet {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .filter_map(|word| self.keywords.get(&word.to_ascii_lowercase()).copied())
            .collect()
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        const VOCABULARY: &[(ContentTag, &[&str])] = &[
            (
                ContentTag::Nature,
                &["nature", "forest", "beach", "ocean", "mountain", "river", "tree", "flower", "lake"],
            ),
            (
                ContentTag::Urban,
                &["urban", "city", "street", "traffic", "building", "downtown", "subway"],
            ),
            (
                ContentTag::Action,
                &["action", "chase", "fight", "race", "explosion", "sport", "stunt"],
            ),
            (ContentTag::Static, &["static", "still", "interview", "portrait", "tripod"]),
            (ContentTag::Dark, &["dark", "night", "shadow", "noir"]),
            (ContentTag::Bright, &["bright", "sunny", "day", "snow", "sunrise"]),
        ];

        VOCABULARY
            .iter()
            .flat_map(|(tag, words)| words.iter().map(move |word| (*word, *tag)))
            .fold(Self::empty(), |classifier, (word, tag)| classifier.with_keyword(word, tag))
    }
}

impl ContentClassifier for KeywordClassifier {
    async fn classify(&self, clip: &Clip) -> AiResult<TagSet> {
        let mut tags = self.tags_for(&clip.name);
        tags.extend(self.tags_for(&clip.src));
        Ok(tags)
    }
}
