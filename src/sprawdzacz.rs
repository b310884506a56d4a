use clap::Parser;
use colored::Colorize;
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;

#[allow(dead_code)]
mod libprzygotowanie;

use crate::libprzygotowanie::media::MediaAudit;
use crate::libprzygotowanie::pytania;

#[derive(Parser, Debug)]
#[command(name = "Sprawdzacz (Prawo Jazdy media check)")]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "info")]
    log_level: String,
    #[arg(short, long, value_name = "FILE", default_value = "questions.json")]
    json: PathBuf,
    #[arg(short, long, value_name = "DIR", default_value = "media")]
    media: PathBuf,
    /// Exit with status 2 when any media file is missing.
    #[arg(short, long, default_value = "false")]
    strict: bool,
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str())).init();

    let questions = match pytania::read_questions(&args.json) {
        Ok(q) => q,
        Err(err) => {
            error!("{}", format!("{}", err).red());
            std::process::exit(1);
        }
    };
    info!(
        "[Check] Checking {} questions against {:?}",
        questions.len(),
        args.media
    );

    let audit = MediaAudit::of(&questions, &args.media);
    println!(
        "{}",
        format!("{} media files present", audit.present).green()
    );
    if audit.is_complete() {
        println!("{}", "Nothing missing.".green());
        return;
    }

    println!(
        "{}",
        format!("├ Missing images ({})", audit.missing_images.len()).yellow()
    );
    for name in &audit.missing_images {
        println!("{} {}", "│".yellow(), format!("├ ✘ {}", name).red());
    }
    println!(
        "{}",
        format!("├ Missing videos ({})", audit.missing_videos.len()).yellow()
    );
    for name in &audit.missing_videos {
        println!("{} {}", "│".yellow(), format!("├ ✘ {}", name).red());
    }

    if args.strict {
        std::process::exit(2);
    }
}
