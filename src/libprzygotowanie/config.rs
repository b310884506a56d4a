use std::path::PathBuf;

pub const DEFAULT_CATEGORY: &str = "B";
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub spreadsheet: PathBuf,
    pub archive: PathBuf,
    pub questions_json: PathBuf,
    pub media_dir: PathBuf,
    /// Where the per-run scratch directory is created. `None` uses the system temp dir.
    pub scratch_root: Option<PathBuf>,
    /// `None` accepts every category.
    pub category: Option<String>,
    pub transcoder: TranscoderConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            spreadsheet: PathBuf::from("pytania.xlsx"),
            archive: PathBuf::from("multimedia_do_pytan.zip"),
            questions_json: PathBuf::from("questions.json"),
            media_dir: PathBuf::from("media"),
            scratch_root: None,
            category: Some(DEFAULT_CATEGORY.to_string()),
            transcoder: TranscoderConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscoderConfig {
    /// Converts every raw video in the scratch directory with one ffmpeg call per file.
    Ffmpeg { program: String },
    /// An external batch tool invoked once over the whole scratch directory.
    /// `{input}` and `{output}` in `args` are replaced with the two directories.
    Command {
        program: PathBuf,
        args: Vec<String>,
        build: Option<Vec<String>>,
    },
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        TranscoderConfig::Ffmpeg {
            program: DEFAULT_FFMPEG.to_string(),
        }
    }
}

impl TranscoderConfig {
    /// Parses `--transcoder-args` style input: whitespace separated, placeholders kept verbatim.
    pub fn command(program: PathBuf, args: &str, build: Option<&str>) -> Self {
        let split = |s: &str| s.split_whitespace().map(String::from).collect::<Vec<_>>();
        let args = if args.trim().is_empty() {
            vec!["{input}".to_string(), "{output}".to_string()]
        } else {
            split(args)
        };
        TranscoderConfig::Command {
            program,
            args,
            build: build.map(split).filter(|b| !b.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_category_b() {
        let config = PipelineConfig::default();
        assert_eq!(config.category.as_deref(), Some("B"));
        assert_eq!(config.transcoder, TranscoderConfig::default());
    }

    #[test]
    fn command_without_args_maps_input_to_output() {
        let config = TranscoderConfig::command(PathBuf::from("conv"), "  ", Some(""));
        assert_eq!(
            config,
            TranscoderConfig::Command {
                program: PathBuf::from("conv"),
                args: vec!["{input}".into(), "{output}".into()],
                build: None,
            }
        );
    }

    #[test]
    fn command_splits_args_and_build() {
        let config = TranscoderConfig::command(
            PathBuf::from("./bin/conv"),
            "--in {input} --out {output}",
            Some("make conv"),
        );
        match config {
            TranscoderConfig::Command { args, build, .. } => {
                assert_eq!(args, vec!["--in", "{input}", "--out", "{output}"]);
                assert_eq!(build, Some(vec!["make".to_string(), "conv".to_string()]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
