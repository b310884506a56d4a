use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;
use log::{debug, error};
use std::path::PathBuf;

#[allow(dead_code)]
mod libprzygotowanie;

use crate::libprzygotowanie::config::{
    PipelineConfig, TranscoderConfig, DEFAULT_CATEGORY, DEFAULT_FFMPEG,
};
use crate::libprzygotowanie::error::Result;
use crate::libprzygotowanie::konwersja::Outcome;
use crate::libprzygotowanie::pipeline::{self, MediaReport, QuestionReport};
use crate::libprzygotowanie::pytania;

#[derive(Parser, Debug)]
#[command(name = "Przygotowanie (Prawo Jazdy data setup)")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, default_value = "info")]
    log_level: String,
    #[arg(long, value_name = "FILE", default_value = "pytania.xlsx")]
    xlsx: PathBuf,
    #[arg(long, value_name = "FILE", default_value = "multimedia_do_pytan.zip")]
    zip: PathBuf,
    #[arg(short, long, value_name = "FILE", default_value = "questions.json")]
    json: PathBuf,
    #[arg(short, long, value_name = "DIR", default_value = "media")]
    media: PathBuf,
    /// Where the temporary raw-video directory is created.
    #[arg(long, value_name = "DIR")]
    scratch: Option<PathBuf>,
    #[arg(short, long, default_value = DEFAULT_CATEGORY)]
    category: String,
    #[arg(long, default_value = "false", conflicts_with = "category")]
    all_categories: bool,
    #[arg(long, default_value = DEFAULT_FFMPEG)]
    ffmpeg: String,
    /// External batch converter used instead of ffmpeg.
    #[arg(long, value_name = "PROGRAM")]
    transcoder: Option<PathBuf>,
    #[arg(long, default_value = "{input} {output}")]
    transcoder_args: String,
    /// Command that builds the converter when it is missing.
    #[arg(long, requires = "transcoder")]
    transcoder_build: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Questions, then media (default).
    All,
    /// Only spreadsheet -> questions.json.
    Questions,
    /// Only media, for an existing questions.json.
    Media,
}

impl Args {
    fn config(&self) -> PipelineConfig {
        let transcoder = match &self.transcoder {
            Some(program) => TranscoderConfig::command(
                program.clone(),
                &self.transcoder_args,
                self.transcoder_build.as_deref(),
            ),
            None => TranscoderConfig::Ffmpeg {
                program: self.ffmpeg.clone(),
            },
        };
        PipelineConfig {
            spreadsheet: self.xlsx.clone(),
            archive: self.zip.clone(),
            questions_json: self.json.clone(),
            media_dir: self.media.clone(),
            scratch_root: self.scratch.clone(),
            category: (!self.all_categories)
                .then(|| self.category.trim().to_string())
                .filter(|c| !c.is_empty()),
            transcoder,
        }
    }
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str())).init();
    let config = args.config();
    debug!("[Run] {:?}", config);

    println!("{}", "=== Prawo Jazdy – Data Setup ===".cyan());
    println!(
        "{}",
        format!(
            "Category filter: {}",
            config.category.as_deref().unwrap_or("all")
        )
        .cyan()
    );

    let result = match args.command.unwrap_or(Commands::All) {
        Commands::All => run_all(&config),
        Commands::Questions => pipeline::build_questions(&config).map(|(questions, report)| {
            print_questions(questions.len(), &report);
        }),
        Commands::Media => run_media(&config),
    };

    if let Err(err) = result {
        error!("{}", format!("{}", err).red());
        std::process::exit(1);
    }
}

fn run_all(config: &PipelineConfig) -> Result<()> {
    let (questions, report) = pipeline::build_questions(config)?;
    print_questions(questions.len(), &report);
    let media = pipeline::run_media(config, &questions)?;
    print_media(&media);
    print_next_steps(config);
    Ok(())
}

fn run_media(config: &PipelineConfig) -> Result<()> {
    let questions = pytania::read_questions(&config.questions_json)?;
    let media = pipeline::run_media(config, &questions)?;
    print_media(&media);
    Ok(())
}

fn print_questions(count: usize, report: &QuestionReport) {
    println!(
        "{}",
        format!(
            "Questions: {} written ({} KB), {} skipped",
            count,
            report.json_bytes / 1024,
            report.normalize.skipped()
        )
        .green()
    );
    debug!("[Run] {:?}", report.normalize);
}

fn print_media(report: &MediaReport) {
    let images = &report.images;
    println!(
        "{}",
        format!(
            "Images: {} extracted, {} already existed",
            images.extracted, images.skipped
        )
        .green()
    );
    for name in &images.not_found {
        println!("{}", format!("  ✘ {} not found in archive", name).yellow());
    }
    for (name, reason) in &images.failed {
        println!("{}", format!("  ✘ {}: {}", name, reason).red());
    }

    let videos = &report.videos;
    match &videos.outcome {
        Outcome::NothingToConvert => println!("{}", "Videos: nothing to convert".green()),
        Outcome::AllAlreadyConverted => println!(
            "{}",
            format!("Videos: all {} already converted", videos.already_done()).green()
        ),
        Outcome::Skipped(reason) => {
            println!(
                "{}",
                format!("Videos: conversion skipped ({})", reason).yellow()
            );
            println!(
                "{}",
                "  Install the transcoder and re-run to enable video questions.".yellow()
            );
        }
        Outcome::Ran(_) => println!(
            "{}",
            format!(
                "Videos: {} converted, {} already existed, {} failed",
                videos.converted(),
                videos.already_done(),
                videos.failed().len()
            )
            .green()
        ),
    }
    if !matches!(videos.outcome, Outcome::Skipped(_)) {
        for (name, reason) in videos.failed() {
            println!("{}", format!("  ✘ {}: {}", name, reason).red());
        }
    }
}

fn print_next_steps(config: &PipelineConfig) {
    println!("{}", "=== Setup complete! ===".cyan());
    println!("Next steps:");
    println!(
        "  1. Commit {} and {}/ to git",
        config.questions_json.display(),
        config.media_dir.display()
    );
    println!("  2. Serve the app directory over HTTP and open it in your browser");
}
