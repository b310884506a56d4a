use crate::libprzygotowanie::error::{Error, Result};
use crate::libprzygotowanie::media::{is_plain_file_name, target_name};
use calamine::{open_workbook_auto, Data, Range, Reader};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "TN")]
    TrueFalse,
    #[serde(rename = "ABC")]
    MultipleChoice,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Structure {
    #[default]
    #[serde(rename = "PODSTAWOWY")]
    Basic,
    #[serde(rename = "SPECJALISTYCZNY")]
    Specialist,
}

impl Structure {
    fn from_label(label: Option<&str>) -> Structure {
        match label {
            Some(l) if l.eq_ignore_ascii_case("SPECJALISTYCZNY") => Structure::Specialist,
            Some(l) if !l.eq_ignore_ascii_case("PODSTAWOWY") => {
                debug!("[Sheet] Unknown structure label {:?}, using PODSTAWOWY", l);
                Structure::Basic
            }
            _ => Structure::Basic,
        }
    }
}

/// One exam question as the app consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub answers: Option<BTreeMap<String, String>>,
    pub correct: String,
    /// File name inside the media directory.
    pub media: Option<String>,
    /// File name as listed in the spreadsheet, used to find it in the archive.
    #[serde(rename = "mediaOrig")]
    pub media_original: Option<String>,
    #[serde(default)]
    pub structure: Structure,
}

/// The ten positional columns of a spreadsheet row, as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub sequence: Option<String>,
    pub number: Option<String>,
    pub text: Option<String>,
    pub answer_a: Option<String>,
    pub answer_b: Option<String>,
    pub answer_c: Option<String>,
    pub correct: Option<String>,
    pub media: Option<String>,
    pub structure: Option<String>,
    pub categories: Option<String>,
}

impl RawRow {
    pub fn from_cells(cells: &[Data]) -> RawRow {
        let cell = |i: usize| cells.get(i).and_then(cell_text);
        RawRow {
            sequence: cell(0),
            number: cell(1),
            text: cell(2),
            answer_a: cell(3),
            answer_b: cell(4),
            answer_c: cell(5),
            correct: cell(6),
            media: cell(7),
            structure: cell(8),
            categories: cell(9),
        }
    }
}

/// Renders a cell as text. Integral floats lose their `.0` so numeric ids and
/// category cells read the same as text ones.
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some((*f as i64).to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn field(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_id(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeReport {
    pub accepted: usize,
    pub incomplete: usize,
    pub other_category: usize,
    pub without_id: usize,
    /// Media names that would leave the flat media directory.
    pub bad_media: usize,
}

impl NormalizeReport {
    pub fn skipped(&self) -> usize {
        self.incomplete + self.other_category + self.without_id + self.bad_media
    }
}

/// Turns spreadsheet rows into questions, counting the rows it rejects.
#[derive(Debug)]
pub struct Normalizer {
    category: Option<String>,
    report: NormalizeReport,
}

impl Normalizer {
    pub fn new(category: Option<String>) -> Self {
        Self {
            category,
            report: NormalizeReport::default(),
        }
    }

    pub fn report(&self) -> NormalizeReport {
        self.report
    }

    pub fn normalize(&mut self, row: &RawRow) -> Option<Question> {
        let (text, correct) = match (field(&row.text), field(&row.correct)) {
            (Some(text), Some(correct)) => (text, correct),
            _ => {
                debug!(
                    "[Sheet] Row {:?} has no question or answer. Skipping...",
                    row.sequence
                );
                self.report.incomplete += 1;
                return None;
            }
        };

        if let Some(wanted) = &self.category {
            let in_category = field(&row.categories)
                .map(|c| c.split(',').any(|c| c.trim() == wanted))
                .unwrap_or(false);
            if !in_category {
                debug!(
                    "[Sheet] Row {:?} is not in category {}. Skipping...",
                    row.sequence, wanted
                );
                self.report.other_category += 1;
                return None;
            }
        }

        let id = match field(&row.number)
            .and_then(parse_id)
            .or_else(|| field(&row.sequence).and_then(parse_id))
        {
            Some(id) => id,
            None => {
                debug!("[Sheet] Row {:?} has no usable id. Skipping...", row.sequence);
                self.report.without_id += 1;
                return None;
            }
        };

        let (kind, answers) = match correct {
            "T" | "N" => (QuestionType::TrueFalse, None),
            _ => {
                if !matches!(correct, "A" | "B" | "C") {
                    debug!("[Sheet] Question {} has unexpected answer {:?}", id, correct);
                }
                let answers: BTreeMap<String, String> = [
                    ("A", &row.answer_a),
                    ("B", &row.answer_b),
                    ("C", &row.answer_c),
                ]
                .into_iter()
                .filter_map(|(label, value)| {
                    field(value).map(|v| (label.to_string(), v.to_string()))
                })
                .collect();
                (QuestionType::MultipleChoice, Some(answers))
            }
        };

        let media_original = field(&row.media).map(String::from);
        if let Some(name) = media_original.as_deref().filter(|n| !is_plain_file_name(n)) {
            warn!("[Sheet] Question {} has unusable media name {:?}. Skipping...", id, name);
            self.report.bad_media += 1;
            return None;
        }
        self.report.accepted += 1;
        Some(Question {
            id,
            text: text.to_string(),
            kind,
            answers,
            correct: correct.to_string(),
            media: media_original.as_deref().map(target_name),
            media_original,
            structure: Structure::from_label(field(&row.structure)),
        })
    }
}

pub fn normalize_rows<I>(rows: I, category: Option<String>) -> (Vec<Question>, NormalizeReport)
where
    I: IntoIterator<Item = RawRow>,
{
    let mut normalizer = Normalizer::new(category);
    let questions = rows
        .into_iter()
        .filter_map(|row| normalizer.normalize(&row))
        .collect();
    (questions, normalizer.report())
}

/// Data rows of a worksheet range. The first row is the header and is dropped.
pub fn rows_from_range(range: &Range<Data>) -> Vec<RawRow> {
    range.rows().skip(1).map(RawRow::from_cells).collect()
}

/// Reads the data rows of the first worksheet.
pub fn read_spreadsheet(path: &Path) -> Result<Vec<RawRow>> {
    if !path.exists() {
        return Err(Error::SpreadsheetMissing(path.to_path_buf()));
    }
    let now = Instant::now();
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::NoWorksheet(path.to_path_buf()))??;
    let rows = rows_from_range(&range);
    debug!(
        "[Sheet] Read {} rows in {} ms.",
        rows.len(),
        now.elapsed().as_millis()
    );
    Ok(rows)
}

/// Writes the question list compactly and returns its size in bytes.
/// The file is replaced in one step so readers never see half a list.
pub fn write_questions(path: &Path, questions: &[Question]) -> Result<u64> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| Error::io(format!("creating {dir:?}"), e))?;
    let tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::io(format!("creating temporary file in {dir:?}"), e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, questions)?;
        writer
            .flush()
            .map_err(|e| Error::io(format!("writing {path:?}"), e))?;
    }
    tmp.persist(path)
        .map_err(|e| Error::io(format!("saving {path:?}"), e.error))?;
    let size = std::fs::metadata(path)
        .map_err(|e| Error::io(format!("reading {path:?}"), e))?
        .len();
    info!("[Json] Written {:?} ({} KB)", path, size / 1024);
    Ok(size)
}

pub fn read_questions(path: &Path) -> Result<Vec<Question>> {
    if !path.exists() {
        return Err(Error::QuestionsMissing(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| Error::io(format!("opening {path:?}"), e))?;
    let questions: Vec<Question> = serde_json::from_reader(BufReader::new(file))?;
    info!("[Json] Loaded {} questions from {:?}", questions.len(), path);
    Ok(questions)
}
