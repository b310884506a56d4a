use crate::libprzygotowanie::archiwum::{ArchiveIndex, MediaArchive};
use crate::libprzygotowanie::error::{Error, Result};
use crate::libprzygotowanie::media::{is_plain_file_name, target_name};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tempfile::{NamedTempFile, TempDir};

const SCRATCH_PREFIX: &str = "prawojazdy-wmv-";
const NOT_PLAIN: &str = "not a plain file name";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImageReport {
    pub extracted: usize,
    pub skipped: usize,
    pub not_found: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Which needed videos still lack a converted file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct VideoPlan {
    pub already_converted: Vec<String>,
    pub pending: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct VideoExtraction {
    pub staged: Vec<String>,
    pub not_found: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Copies one member to `target` through a temporary sibling, so `target`
/// either holds the whole member or does not exist. Never replaces an existing file.
fn copy_member_to(
    archive: &mut dyn MediaArchive,
    member: &str,
    target: &Path,
) -> io::Result<u64> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    let written = {
        let mut out = BufWriter::new(tmp.as_file_mut());
        let written = archive.copy_member(member, &mut out)?;
        out.flush()?;
        written
    };
    tmp.persist_noclobber(target).map_err(|e| e.error)?;
    Ok(written)
}

pub fn create_media_dir(media_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(media_dir)
        .map_err(|e| Error::io(format!("creating {media_dir:?}"), e))
}

/// Copies every needed image that is not in `media_dir` yet.
pub fn extract_images(
    archive: &mut dyn MediaArchive,
    index: &ArchiveIndex,
    images: &BTreeSet<String>,
    media_dir: &Path,
) -> ImageReport {
    let now = Instant::now();
    let mut report = ImageReport::default();
    info!("[Extract] Extracting {} images ...", images.len());

    for name in images {
        if !is_plain_file_name(name) {
            report.failed.push((name.clone(), NOT_PLAIN.to_string()));
            continue;
        }
        let target = media_dir.join(name);
        if target.exists() {
            report.skipped += 1;
            continue;
        }
        let member = match index.resolve(name) {
            Some(member) => member,
            None => {
                report.not_found.push(name.clone());
                continue;
            }
        };
        match copy_member_to(archive, member, &target) {
            Ok(bytes) => {
                debug!("[Extract] {} <- {} ({} bytes)", name, member, bytes);
                report.extracted += 1;
            }
            Err(err) => report.failed.push((name.clone(), err.to_string())),
        }
    }

    info!(
        "[Extract] Extracted {} images ({} already existed) in {} ms.",
        report.extracted,
        report.skipped,
        now.elapsed().as_millis()
    );
    if !report.not_found.is_empty() {
        warn!(
            "[Extract] {} images not found in archive: {}",
            report.not_found.len(),
            report.not_found.join(", ")
        );
    }
    for (name, reason) in &report.failed {
        warn!("[Extract] Could not extract {}: {}", name, reason);
    }
    report
}

/// Splits the needed videos into those with a converted file already in
/// `media_dir` and those that still need extracting and converting.
pub fn plan_videos(videos: &BTreeSet<String>, media_dir: &Path) -> VideoPlan {
    let mut plan = VideoPlan::default();
    for name in videos {
        if is_plain_file_name(name) && media_dir.join(target_name(name)).exists() {
            plan.already_converted.push(name.clone());
        } else {
            plan.pending.push(name.clone());
        }
    }
    info!(
        "[Extract] Videos: {} already converted, {} to convert.",
        plan.already_converted.len(),
        plan.pending.len()
    );
    plan
}

/// Fresh scratch directory for raw videos. Removed when the returned value drops.
pub fn scratch_dir(root: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX);
    let dir = match root {
        Some(root) => {
            std::fs::create_dir_all(root)
                .map_err(|e| Error::io(format!("creating {root:?}"), e))?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
    .map_err(|e| Error::io("creating scratch directory", e))?;
    debug!("[Extract] Scratch directory at {:?}", dir.path());
    Ok(dir)
}

/// Copies the pending raw videos, under their original names, into `scratch`.
pub fn extract_videos(
    archive: &mut dyn MediaArchive,
    index: &ArchiveIndex,
    pending: &[String],
    scratch: &Path,
) -> VideoExtraction {
    let now = Instant::now();
    let mut extraction = VideoExtraction::default();

    for name in pending {
        if !is_plain_file_name(name) {
            extraction.failed.push((name.clone(), NOT_PLAIN.to_string()));
            continue;
        }
        let member = match index.resolve(name) {
            Some(member) => member,
            None => {
                extraction.not_found.push(name.clone());
                continue;
            }
        };
        match copy_member_to(archive, member, &scratch.join(name)) {
            Ok(bytes) => {
                debug!("[Extract] {} <- {} ({} bytes)", name, member, bytes);
                extraction.staged.push(name.clone());
            }
            Err(err) => extraction.failed.push((name.clone(), err.to_string())),
        }
    }

    info!(
        "[Extract] Staged {} raw videos in {} ms.",
        extraction.staged.len(),
        now.elapsed().as_millis()
    );
    if !extraction.not_found.is_empty() {
        warn!(
            "[Extract] {} videos not found in archive: {}",
            extraction.not_found.len(),
            extraction.not_found.join(", ")
        );
    }
    for (name, reason) in &extraction.failed {
        warn!("[Extract] Could not extract {}: {}", name, reason);
    }
    extraction
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory archive that counts how often members are read.
    #[derive(Default)]
    pub(crate) struct FakeArchive {
        pub members: Vec<(String, Vec<u8>)>,
        pub reads: usize,
    }

    impl FakeArchive {
        pub(crate) fn member(mut self, name: &str, bytes: &[u8]) -> Self {
            self.members.push((name.to_string(), bytes.to_vec()));
            self
        }
    }

    impl MediaArchive for FakeArchive {
        fn member_names(&self) -> Vec<String> {
            self.members.iter().map(|(n, _)| n.clone()).collect()
        }

        fn copy_member(&mut self, member: &str, out: &mut dyn Write) -> io::Result<u64> {
            self.reads += 1;
            let (_, data) = self
                .members
                .iter()
                .find(|(name, _)| name == member)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, member.to_string()))?;
            out.write_all(data)?;
            Ok(data.len() as u64)
        }
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn images_are_copied_verbatim() {
        let media = tempfile::tempdir().unwrap();
        let mut archive = FakeArchive::default()
            .member("x/Y/ZNAK.JPG", b"\xff\xd8jpeg")
            .member("b.png", b"png");
        let index = ArchiveIndex::from_archive(&archive);

        let needs = set(&["znak.jpg", "b.png"]);
        let report = extract_images(&mut archive, &index, &needs, media.path());
        assert_eq!(report.extracted, 2);
        assert_eq!(report.skipped, 0);
        assert!(report.not_found.is_empty());
        assert_eq!(
            std::fs::read(media.path().join("znak.jpg")).unwrap(),
            b"\xff\xd8jpeg"
        );
        assert_eq!(std::fs::read(media.path().join("b.png")).unwrap(), b"png");
    }

    #[test]
    fn rerun_skips_without_reading_archive() {
        let media = tempfile::tempdir().unwrap();
        std::fs::write(media.path().join("a.jpg"), b"kept").unwrap();
        std::fs::write(media.path().join("b.jpg"), b"kept").unwrap();
        let mut archive = FakeArchive::default()
            .member("a.jpg", b"new")
            .member("b.jpg", b"new");
        let index = ArchiveIndex::from_archive(&archive);

        let needs = set(&["a.jpg", "b.jpg"]);
        let report = extract_images(&mut archive, &index, &needs, media.path());
        assert_eq!(report.skipped, 2);
        assert_eq!(report.extracted, 0);
        assert_eq!(archive.reads, 0);
        assert_eq!(std::fs::read(media.path().join("a.jpg")).unwrap(), b"kept");
    }

    #[test]
    fn missing_members_do_not_stop_the_pass() {
        let media = tempfile::tempdir().unwrap();
        let mut archive = FakeArchive::default().member("c.jpg", b"c");
        let index = ArchiveIndex::from_archive(&archive);

        let needs = set(&["a.jpg", "c.jpg", "z.jpg"]);
        let report = extract_images(&mut archive, &index, &needs, media.path());
        assert_eq!(report.extracted, 1);
        assert_eq!(
            report.not_found,
            vec!["a.jpg".to_string(), "z.jpg".to_string()]
        );
        assert!(media.path().join("c.jpg").exists());
        assert!(!media.path().join("a.jpg").exists());
    }

    #[test]
    fn failed_copy_leaves_no_partial_file() {
        let media = tempfile::tempdir().unwrap();
        let mut archive = FakeArchive::default();
        // Index points at a member the archive cannot produce.
        let index = ArchiveIndex::build(["broken.jpg"]);

        let report = extract_images(&mut archive, &index, &set(&["broken.jpg"]), media.path());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(std::fs::read_dir(media.path()).unwrap().count(), 0);
    }

    #[test]
    fn images_never_leave_the_media_dir() {
        let root = tempfile::tempdir().unwrap();
        let media = root.path().join("media");
        create_media_dir(&media).unwrap();
        let mut archive = FakeArchive::default()
            .member("x/evil.jpg", b"evil")
            .member("y.jpg", b"y");
        let index = ArchiveIndex::from_archive(&archive);

        let needs = set(&["../evil.jpg", "/x/y.jpg"]);
        let report = extract_images(&mut archive, &index, &needs, &media);
        assert_eq!(report.extracted, 0);
        let failed: Vec<&str> = report.failed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(failed, vec!["../evil.jpg", "/x/y.jpg"]);
        assert_eq!(archive.reads, 0);
        assert!(!root.path().join("evil.jpg").exists());
        assert_eq!(std::fs::read_dir(&media).unwrap().count(), 0);
    }

    #[test]
    fn videos_never_leave_the_scratch_dir() {
        let root = tempfile::tempdir().unwrap();
        let scratch = scratch_dir(Some(root.path())).unwrap();
        let mut archive = FakeArchive::default()
            .member("x/evil.wmv", b"evil")
            .member("y.wmv", b"y");
        let index = ArchiveIndex::from_archive(&archive);

        let pending = vec!["../evil.wmv".to_string(), "/x/y.wmv".to_string()];
        let plan = plan_videos(&pending.iter().cloned().collect(), root.path());
        assert_eq!(plan.pending.len(), 2);
        let extraction = extract_videos(&mut archive, &index, &pending, scratch.path());
        assert!(extraction.staged.is_empty());
        assert_eq!(extraction.failed.len(), 2);
        assert_eq!(archive.reads, 0);
        assert!(!root.path().join("evil.wmv").exists());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn plan_skips_converted_videos() {
        let media = tempfile::tempdir().unwrap();
        std::fs::write(media.path().join("done.webm"), b"").unwrap();
        let plan = plan_videos(&set(&["done.WMV", "todo.wmv"]), media.path());
        assert_eq!(plan.already_converted, vec!["done.WMV".to_string()]);
        assert_eq!(plan.pending, vec!["todo.wmv".to_string()]);
    }

    #[test]
    fn videos_are_staged_under_original_names() {
        let scratch = scratch_dir(None).unwrap();
        let mut archive = FakeArchive::default().member("video/Clip.WMV", b"asf");
        let index = ArchiveIndex::from_archive(&archive);

        let pending = vec!["clip.wmv".to_string(), "gone.wmv".to_string()];
        let extraction = extract_videos(&mut archive, &index, &pending, scratch.path());
        assert_eq!(extraction.staged, vec!["clip.wmv".to_string()]);
        assert_eq!(extraction.not_found, vec!["gone.wmv".to_string()]);
        assert_eq!(std::fs::read(scratch.path().join("clip.wmv")).unwrap(), b"asf");
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = scratch_dir(Some(&root.path().join("tmp"))).unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.starts_with(root.path()));
        std::fs::write(path.join("x.wmv"), b"x").unwrap();
        drop(scratch);
        assert!(!path.exists());
    }
}
