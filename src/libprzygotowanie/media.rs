use crate::libprzygotowanie::pytania::Question;
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::{Component, Path};

/// Extension of the videos shipped in the archive.
pub const RAW_VIDEO_EXT: &str = "wmv";
/// Extension the app plays, produced by the transcoder.
pub const CONVERTED_VIDEO_EXT: &str = "webm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    RawVideo,
}

fn split_ext(name: &str) -> Option<(&str, &str)> {
    name.rsplit_once('.').filter(|(stem, _)| !stem.is_empty())
}

pub fn kind_of(name: &str) -> MediaKind {
    match split_ext(name) {
        Some((_, ext)) if ext.eq_ignore_ascii_case(RAW_VIDEO_EXT) => MediaKind::RawVideo,
        _ => MediaKind::Image,
    }
}

/// Name of the converted output for a raw video, e.g. `clip.WMV` -> `clip.webm`.
/// Images keep their name.
pub fn target_name(name: &str) -> String {
    match (kind_of(name), split_ext(name)) {
        (MediaKind::RawVideo, Some((stem, _))) => format!("{stem}.{CONVERTED_VIDEO_EXT}"),
        _ => name.to_string(),
    }
}

/// Whether `name` can be placed directly inside a flat directory: exactly one
/// normal path component, no separators of either kind.
pub fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

/// Distinct original media names needed by a question list, split by kind.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MediaNeeds {
    pub images: BTreeSet<String>,
    pub videos: BTreeSet<String>,
}

impl MediaNeeds {
    pub fn from_questions(questions: &[Question]) -> MediaNeeds {
        let mut needs = MediaNeeds::default();
        for original in questions.iter().filter_map(|q| q.media_original.as_deref()) {
            match kind_of(original) {
                MediaKind::RawVideo => needs.videos.insert(original.to_string()),
                MediaKind::Image => needs.images.insert(original.to_string()),
            };
        }
        info!(
            "[Needs] {} questions need {} images and {} videos.",
            questions.len(),
            needs.images.len(),
            needs.videos.len()
        );
        needs
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }
}

/// Media targets of a question list checked against the media directory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MediaAudit {
    pub present: usize,
    pub missing_images: BTreeSet<String>,
    pub missing_videos: BTreeSet<String>,
}

impl MediaAudit {
    pub fn of(questions: &[Question], media_dir: &Path) -> MediaAudit {
        let mut audit = MediaAudit::default();
        let mut seen = BTreeSet::new();
        for question in questions {
            let Some(target) = question.media.as_deref() else {
                continue;
            };
            if !seen.insert(target) {
                continue;
            }
            if is_plain_file_name(target) && media_dir.join(target).is_file() {
                audit.present += 1;
                continue;
            }
            debug!("[Check] Question {} is missing {}", question.id, target);
            let original = question.media_original.as_deref().unwrap_or(target);
            match kind_of(original) {
                MediaKind::RawVideo => audit.missing_videos.insert(target.to_string()),
                MediaKind::Image => audit.missing_images.insert(target.to_string()),
            };
        }
        audit
    }

    pub fn is_complete(&self) -> bool {
        self.missing_images.is_empty() && self.missing_videos.is_empty()
    }
}
