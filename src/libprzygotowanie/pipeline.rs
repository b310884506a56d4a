use crate::libprzygotowanie::archiwum::{ArchiveIndex, MediaArchive, ZipMediaArchive};
use crate::libprzygotowanie::config::PipelineConfig;
use crate::libprzygotowanie::error::Result;
use crate::libprzygotowanie::konwersja::{
    self, ConversionReport, Orchestrator, Readiness, Transcoder,
};
use crate::libprzygotowanie::media::MediaNeeds;
use crate::libprzygotowanie::pytania::{self, NormalizeReport, Question};
use crate::libprzygotowanie::wypakowanie::{self, ImageReport};
use log::{info, warn};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct QuestionReport {
    pub normalize: NormalizeReport,
    pub json_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct MediaReport {
    pub images: ImageReport,
    pub videos: ConversionReport,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub questions: QuestionReport,
    pub media: MediaReport,
}

/// Spreadsheet -> filtered questions -> question list on disk.
pub fn build_questions(config: &PipelineConfig) -> Result<(Vec<Question>, QuestionReport)> {
    info!("[Sheet] Parsing {:?} ...", config.spreadsheet);
    let rows = pytania::read_spreadsheet(&config.spreadsheet)?;
    let (questions, normalize) = pytania::normalize_rows(rows, config.category.clone());
    info!(
        "[Sheet] Parsed {} questions (skipped {}).",
        questions.len(),
        normalize.skipped()
    );
    let json_bytes = pytania::write_questions(&config.questions_json, &questions)?;
    Ok((
        questions,
        QuestionReport {
            normalize,
            json_bytes,
        },
    ))
}

/// Extracts every needed image, then extracts and converts the videos that
/// have no converted file yet. Raw videos go through a scratch directory
/// that is gone when this returns, on every path.
pub fn prepare_media(
    config: &PipelineConfig,
    questions: &[Question],
    archive: &mut dyn MediaArchive,
    transcoder: &dyn Transcoder,
) -> Result<MediaReport> {
    let needs = MediaNeeds::from_questions(questions);
    wypakowanie::create_media_dir(&config.media_dir)?;
    let index = ArchiveIndex::from_archive(archive);

    let images = wypakowanie::extract_images(archive, &index, &needs.images, &config.media_dir);

    let plan = wypakowanie::plan_videos(&needs.videos, &config.media_dir);
    let orchestrator = Orchestrator::new(transcoder);
    let videos = if plan.pending.is_empty() {
        ConversionReport::idle(&plan)
    } else {
        match orchestrator.readiness() {
            Readiness::Unavailable(reason) => {
                let not_found: Vec<String> = plan
                    .pending
                    .iter()
                    .filter(|name| index.resolve(name).is_none())
                    .cloned()
                    .collect();
                if !not_found.is_empty() {
                    warn!(
                        "[Extract] {} videos not found in archive: {}",
                        not_found.len(),
                        not_found.join(", ")
                    );
                }
                ConversionReport::skipped(&plan, &not_found, reason)
            }
            Readiness::Ready => {
                let scratch = wypakowanie::scratch_dir(config.scratch_root.as_deref())?;
                let extraction =
                    wypakowanie::extract_videos(archive, &index, &plan.pending, scratch.path());
                let report =
                    orchestrator.run(&plan, &extraction, scratch.path(), &config.media_dir);
                if let Err(err) = scratch.close() {
                    warn!("[Run] Could not remove scratch directory: {}", err);
                }
                report
            }
        }
    };

    Ok(MediaReport { images, videos })
}

pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    let now = Instant::now();
    info!(
        "[Run] Category filter: {}",
        config.category.as_deref().unwrap_or("all")
    );
    let (questions_list, questions) = build_questions(config)?;
    let media = run_media(config, &questions_list)?;
    info!("[Run] Finished in {} s.", now.elapsed().as_secs());
    Ok(RunReport { questions, media })
}

/// Media phase against the configured archive and transcoder.
pub fn run_media(config: &PipelineConfig, questions: &[Question]) -> Result<MediaReport> {
    let mut archive = ZipMediaArchive::open(&config.archive)?;
    let transcoder = konwersja::from_config(&config.transcoder);
    prepare_media(config, questions, &mut archive, transcoder.as_ref())
}
