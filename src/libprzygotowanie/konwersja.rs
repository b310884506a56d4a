use crate::libprzygotowanie::config::TranscoderConfig;
use crate::libprzygotowanie::error::{Error, Result};
use crate::libprzygotowanie::media::{kind_of, target_name, MediaKind, CONVERTED_VIDEO_EXT};
use crate::libprzygotowanie::wypakowanie::{VideoExtraction, VideoPlan};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

/// What the batch tool said about its own run.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    Success,
    Failed(String),
}

/// A tool that converts every raw video in one directory into another directory,
/// naming each output after its input with the converted extension.
pub trait Transcoder {
    fn name(&self) -> String;
    /// Whether the tool exists or can be built.
    fn is_available(&self) -> bool;
    /// Builds the tool if it is missing. No-op when it is ready.
    fn prepare(&self) -> Result<()>;
    /// Blocks until the whole directory has been processed.
    fn convert(&self, raw_dir: &Path, out_dir: &Path) -> Result<BatchStatus>;
}

pub fn from_config(config: &TranscoderConfig) -> Box<dyn Transcoder> {
    match config {
        TranscoderConfig::Ffmpeg { program } => Box::new(Ffmpeg {
            program: program.clone(),
        }),
        TranscoderConfig::Command {
            program,
            args,
            build,
        } => Box::new(BatchCommand {
            program: program.clone(),
            args: args.clone(),
            build: build.clone(),
        }),
    }
}

/// Converts with one ffmpeg process per file: VP9, constant quality, no audio.
pub struct Ffmpeg {
    pub program: String,
}

impl Ffmpeg {
    fn convert_one(&self, src: &Path, dst: &Path) -> bool {
        let partial = dst.with_extension(format!("part.{CONVERTED_VIDEO_EXT}"));
        let status = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(src)
            .args(["-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "35", "-an", "-f", "webm"])
            .arg(&partial)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => match std::fs::rename(&partial, dst) {
                Ok(()) => true,
                Err(err) => {
                    debug!("[Convert] Cannot move {:?} into place: {}", partial, err);
                    let _ = std::fs::remove_file(&partial);
                    false
                }
            },
            Ok(status) => {
                debug!("[Convert] ffmpeg exited with {} for {:?}", status, src);
                let _ = std::fs::remove_file(&partial);
                false
            }
            Err(err) => {
                debug!("[Convert] Cannot run ffmpeg for {:?}: {}", src, err);
                false
            }
        }
    }
}

impl Transcoder for Ffmpeg {
    fn name(&self) -> String {
        self.program.clone()
    }

    fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    fn convert(&self, raw_dir: &Path, out_dir: &Path) -> Result<BatchStatus> {
        let mut inputs: Vec<PathBuf> = std::fs::read_dir(raw_dir)
            .map_err(|e| Error::io(format!("listing {raw_dir:?}"), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| kind_of(n) == MediaKind::RawVideo)
            })
            .collect();
        inputs.sort();

        let total = inputs.len();
        let mut converted = 0;
        for src in &inputs {
            let Some(name) = src.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.convert_one(src, &out_dir.join(target_name(name))) {
                converted += 1;
                if converted % 50 == 0 {
                    info!("[Convert] ... {}/{} videos converted", converted, total);
                }
            }
        }
        // Per-file failures show up as missing outputs.
        Ok(BatchStatus::Success)
    }
}

/// An external batch converter run once over the scratch directory.
pub struct BatchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub build: Option<Vec<String>>,
}

impl BatchCommand {
    fn resolve(&self) -> Option<PathBuf> {
        if self.program.components().count() > 1 || self.program.is_absolute() {
            self.program.is_file().then(|| self.program.clone())
        } else {
            which::which(&self.program).ok()
        }
    }
}

impl Transcoder for BatchCommand {
    fn name(&self) -> String {
        self.program.display().to_string()
    }

    fn is_available(&self) -> bool {
        self.resolve().is_some() || self.build.is_some()
    }

    fn prepare(&self) -> Result<()> {
        if self.resolve().is_some() {
            return Ok(());
        }
        let build = match self.build.as_deref() {
            Some([program, args @ ..]) => (program, args),
            _ => return Err(Error::TranscoderSetup(format!("{} not found", self.name()))),
        };
        info!("[Convert] Building {} ...", self.name());
        let status = Command::new(build.0)
            .args(build.1)
            .status()
            .map_err(|e| Error::TranscoderSetup(format!("cannot run build: {e}")))?;
        if !status.success() {
            return Err(Error::TranscoderSetup(format!("build exited with {status}")));
        }
        match self.resolve() {
            Some(_) => Ok(()),
            None => Err(Error::TranscoderSetup(format!(
                "build finished but {} is still missing",
                self.name()
            ))),
        }
    }

    fn convert(&self, raw_dir: &Path, out_dir: &Path) -> Result<BatchStatus> {
        let program = self.resolve().unwrap_or_else(|| self.program.clone());
        let input = raw_dir.to_string_lossy();
        let output = out_dir.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{input}", &input).replace("{output}", &output))
            .collect();
        debug!("[Convert] Running {:?} {:?}", program, args);
        let status = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| Error::io(format!("running {program:?}"), e))?;
        if status.success() {
            Ok(BatchStatus::Success)
        } else {
            Ok(BatchStatus::Failed(format!("exited with {status}")))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailReason {
    NotInArchive,
    ExtractFailed(String),
    Unavailable(String),
    BatchFailed(String),
    OutputMissing,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::NotInArchive => write!(f, "not found in archive"),
            FailReason::ExtractFailed(e) => write!(f, "extraction failed: {e}"),
            FailReason::Unavailable(e) => write!(f, "transcoder unavailable: {e}"),
            FailReason::BatchFailed(e) => write!(f, "transcoder failed: {e}"),
            FailReason::OutputMissing => write!(f, "no converted output"),
        }
    }
}

/// Final state of one needed video.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    AlreadyDone,
    Converted,
    Failed(FailReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing was staged for conversion.
    NothingToConvert,
    AllAlreadyConverted,
    Skipped(String),
    Ran(BatchStatus),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub outcome: Outcome,
    pub assets: BTreeMap<String, Disposition>,
}

impl ConversionReport {
    fn count(&self, wanted: fn(&Disposition) -> bool) -> usize {
        self.assets.values().filter(|d| wanted(d)).count()
    }

    pub fn already_done(&self) -> usize {
        self.count(|d| matches!(d, Disposition::AlreadyDone))
    }

    pub fn converted(&self) -> usize {
        self.count(|d| matches!(d, Disposition::Converted))
    }

    pub fn failed(&self) -> Vec<(&str, &FailReason)> {
        self.assets
            .iter()
            .filter_map(|(name, d)| match d {
                Disposition::Failed(reason) => Some((name.as_str(), reason)),
                _ => None,
            })
            .collect()
    }

    /// Report for a run with nothing left to convert.
    pub fn idle(plan: &VideoPlan) -> ConversionReport {
        ConversionReport {
            outcome: idle_outcome(plan),
            assets: already_done(plan),
        }
    }

    /// Report for a run where the transcoder could not be used: nothing pending is
    /// extracted. Pending names in `not_found` are absent from the archive.
    pub fn skipped(plan: &VideoPlan, not_found: &[String], reason: String) -> ConversionReport {
        warn!("[Convert] Skipping video conversion: {}", reason);
        let mut assets = already_done(plan);
        for name in &plan.pending {
            let failure = if not_found.contains(name) {
                FailReason::NotInArchive
            } else {
                FailReason::Unavailable(reason.clone())
            };
            assets.insert(name.clone(), Disposition::Failed(failure));
        }
        ConversionReport {
            outcome: Outcome::Skipped(reason),
            assets,
        }
    }
}

fn idle_outcome(plan: &VideoPlan) -> Outcome {
    if plan.pending.is_empty() && !plan.already_converted.is_empty() {
        info!("[Convert] All videos already converted.");
        Outcome::AllAlreadyConverted
    } else {
        info!("[Convert] Nothing to convert.");
        Outcome::NothingToConvert
    }
}

fn already_done(plan: &VideoPlan) -> BTreeMap<String, Disposition> {
    plan.already_converted
        .iter()
        .map(|name| (name.clone(), Disposition::AlreadyDone))
        .collect()
}

pub enum Readiness {
    Ready,
    Unavailable(String),
}

pub struct Orchestrator<'a> {
    transcoder: &'a dyn Transcoder,
}

impl<'a> Orchestrator<'a> {
    pub fn new(transcoder: &'a dyn Transcoder) -> Self {
        Self { transcoder }
    }

    /// Checks the tool exists and builds it if needed.
    pub fn readiness(&self) -> Readiness {
        if !self.transcoder.is_available() {
            return Readiness::Unavailable(format!("{} not found", self.transcoder.name()));
        }
        match self.transcoder.prepare() {
            Ok(()) => Readiness::Ready,
            Err(err) => Readiness::Unavailable(err.to_string()),
        }
    }

    /// Converts everything staged in `scratch` and checks each expected output
    /// in `media_dir`. The batch status alone is not trusted.
    pub fn run(
        &self,
        plan: &VideoPlan,
        extraction: &VideoExtraction,
        scratch: &Path,
        media_dir: &Path,
    ) -> ConversionReport {
        let mut assets = already_done(plan);
        for name in &extraction.not_found {
            assets.insert(name.clone(), Disposition::Failed(FailReason::NotInArchive));
        }
        for (name, reason) in &extraction.failed {
            assets.insert(
                name.clone(),
                Disposition::Failed(FailReason::ExtractFailed(reason.clone())),
            );
        }

        if extraction.staged.is_empty() {
            return ConversionReport {
                outcome: idle_outcome(plan),
                assets,
            };
        }

        let now = Instant::now();
        info!(
            "[Convert] Converting {} videos with {} ...",
            extraction.staged.len(),
            self.transcoder.name()
        );
        let status = match self.transcoder.convert(scratch, media_dir) {
            Ok(status) => status,
            Err(err) => BatchStatus::Failed(err.to_string()),
        };

        for name in &extraction.staged {
            let disposition = match &status {
                BatchStatus::Failed(reason) => {
                    Disposition::Failed(FailReason::BatchFailed(reason.clone()))
                }
                BatchStatus::Success if media_dir.join(target_name(name)).exists() => {
                    Disposition::Converted
                }
                BatchStatus::Success => Disposition::Failed(FailReason::OutputMissing),
            };
            assets.insert(name.clone(), disposition);
        }

        let report = ConversionReport {
            outcome: Outcome::Ran(status),
            assets,
        };
        info!(
            "[Convert] Videos: {} converted, {} already existed, {} failed ({} s).",
            report.converted(),
            report.already_done(),
            report.failed().len(),
            now.elapsed().as_secs()
        );
        for (name, reason) in report.failed() {
            warn!("[Convert] {}: {}", name, reason);
        }
        report
    }
}
