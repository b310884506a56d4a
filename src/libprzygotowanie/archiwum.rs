use crate::libprzygotowanie::error::{Error, Result};
use log::{debug, info};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::time::Instant;
use zip::ZipArchive;

/// Read access to the multimedia archive.
pub trait MediaArchive {
    /// Every member path, in archive order.
    fn member_names(&self) -> Vec<String>;
    /// Streams one member's bytes into `out`, returning how many were written.
    fn copy_member(&mut self, member: &str, out: &mut dyn Write) -> io::Result<u64>;
}

pub struct ZipMediaArchive {
    archive: ZipArchive<BufReader<File>>,
}

impl ZipMediaArchive {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ArchiveMissing(path.to_path_buf()));
        }
        let now = Instant::now();
        let file = File::open(path).map_err(|e| Error::io(format!("opening {path:?}"), e))?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        info!("[Archive] Opened {:?} ({} members)", path, archive.len());
        debug!("[Archive] Opening took {} ms.", now.elapsed().as_millis());
        Ok(Self { archive })
    }
}

impl MediaArchive for ZipMediaArchive {
    fn member_names(&self) -> Vec<String> {
        self.archive.file_names().map(String::from).collect()
    }

    fn copy_member(&mut self, member: &str, out: &mut dyn Write) -> io::Result<u64> {
        let mut file = self.archive.by_name(member).map_err(io::Error::other)?;
        io::copy(&mut file, out)
    }
}

/// Last path component, for either separator.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Lowercase basename -> member path. When two members share a basename the
/// first one listed is kept.
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    by_basename: HashMap<String, String>,
    collisions: usize,
}

impl ArchiveIndex {
    pub fn build<I, S>(members: I) -> ArchiveIndex
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = ArchiveIndex::default();
        for member in members {
            let member = member.as_ref();
            let name = basename(member);
            if name.is_empty() {
                continue;
            }
            match index.by_basename.entry(name.to_lowercase()) {
                Entry::Vacant(slot) => {
                    slot.insert(member.to_string());
                }
                Entry::Occupied(kept) => {
                    debug!(
                        "[Archive] Ignoring {:?}, name already taken by {:?}",
                        member,
                        kept.get()
                    );
                    index.collisions += 1;
                }
            }
        }
        info!(
            "[Archive] Indexed {} names ({} duplicates ignored)",
            index.by_basename.len(),
            index.collisions
        );
        index
    }

    pub fn from_archive(archive: &dyn MediaArchive) -> ArchiveIndex {
        Self::build(archive.member_names())
    }

    /// Member path for a media file name, ignoring case and directories.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.by_basename
            .get(&basename(name).to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_basename.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_basename.is_empty()
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }
}
