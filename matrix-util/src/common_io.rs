use anyhow::Context;
use flate2::read::GzDecoder;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Field separator of a delimited text file
#[derive(Clone, Debug, PartialEq)]
pub enum Delimiter {
    Str(String),
    Chars(Vec<char>),
}

impl From<&str> for Delimiter {
    fn from(s: &str) -> Self {
        Delimiter::Str(s.to_string())
    }
}

impl<const N: usize> From<&[char; N]> for Delimiter {
    fn from(chars: &[char; N]) -> Self {
        Delimiter::Chars(chars.to_vec())
    }
}

impl Delimiter {
    /// Guess the delimiter from a file name, ignoring a trailing `.gz`:
    /// `.csv` -> comma, anything else -> tab or whitespace
    pub fn from_file_name(file: &str) -> Self {
        let stripped = file.strip_suffix(".gz").unwrap_or(file);
        match extension(stripped).as_deref() {
            Some("csv") => Delimiter::from(","),
            _ => Delimiter::from(&['\t', ' ']),
        }
    }

    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Str(s) => line.split(s.as_str()).collect(),
            Delimiter::Chars(chars) => line
                .split(chars.as_slice())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// The string used when writing
    pub fn as_output(&self) -> String {
        match self {
            Delimiter::Str(s) => s.clone(),
            Delimiter::Chars(chars) => chars.first().map(|c| c.to_string()).unwrap_or_default(),
        }
    }
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('#') || line.starts_with('%')
}

///
/// Read every non-empty, non-comment line of a file and split it into words
///
/// * `input_file` - file name--either gzipped or not
/// * `delim` - delimiter
///
pub fn read_lines_of_words_delim(
    input_file: &str,
    delim: impl Into<Delimiter>,
) -> anyhow::Result<Vec<Vec<Box<str>>>> {
    let delim = delim.into();
    let buf = open_buf_reader(input_file)?;

    let mut lines_raw = vec![];
    for line in buf.lines() {
        let line = line.with_context(|| format!("reading {}", input_file))?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() || is_comment_line(trimmed) {
            continue;
        }
        lines_raw.push(trimmed.to_string().into_boxed_str());
    }

    // keep the line order while parsing in parallel
    Ok(lines_raw
        .par_iter()
        .map(|s| {
            delim
                .split(s)
                .into_iter()
                .map(|w| w.trim().to_string().into_boxed_str())
                .collect()
        })
        .collect())
}

///
/// Write every line into the output_file
///
/// * `lines` - vector of displayable lines
/// * `output_file` - file name--either gzipped or not
///
pub fn write_lines<T>(lines: &[T], output_file: &str) -> anyhow::Result<()>
where
    T: std::fmt::Display,
{
    let mut buf = open_buf_writer(output_file)?;
    for line in lines {
        if let Err(e) = writeln!(buf, "{}", line) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return Ok(());
            } else {
                return Err(anyhow::anyhow!("unexpected error: {}", e));
            }
        }
    }
    buf.flush()?;
    Ok(())
}

///
/// Open a file for reading, and return a buffered reader
/// * `input_file` - file name--either gzipped or not
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let file = File::open(input_file).with_context(|| format!("opening {}", input_file))?;
    match extension(input_file).as_deref() {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

///
/// Open a file for writing, and return a buffered writer
/// * `output_file` - file name--either gzipped or not, or `stdout`
pub fn open_buf_writer(output_file: &str) -> anyhow::Result<Box<dyn Write>> {
    if output_file.eq_ignore_ascii_case("stdout") {
        return Ok(Box::new(BufWriter::new(std::io::stdout())));
    }

    mkdir(output_file)?;
    let file = File::create(output_file).with_context(|| format!("creating {}", output_file))?;
    match extension(output_file).as_deref() {
        Some("gz") => {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            Ok(Box::new(BufWriter::new(encoder)))
        }
        _ => Ok(Box::new(BufWriter::new(file))),
    }
}

///
/// Create the parent directory of a file if needed
/// * `file` - file name
///
pub fn mkdir(file: &str) -> anyhow::Result<()> {
    if let Some(dir) = Path::new(file).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}

///
/// Take the extension of a file
/// * `file` - file name
///
pub fn extension(file: &str) -> Option<Box<str>> {
    Path::new(file)
        .extension()
        .and_then(|x| x.to_str())
        .map(|x| x.to_string().into_boxed_str())
}
