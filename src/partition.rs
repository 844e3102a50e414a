//! Partitioner: splits a huge, subject-sorted N-Triples dump into contiguous
//! byte ranges ("parts") that each begin and end on a subject boundary, so
//! that no single subject's triples are ever split across two parts.
//!
//! The dump is assumed sorted such that every subject using dereferenceable
//! global identifiers (as opposed to e.g. blank nodes or local-only IRIs)
//! sorts after every other kind of subject; partitioning only begins once
//! that transition point has been located.

use log::{info, warn};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Strategy for locating the first line whose subject contains the global
/// identifier marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchType {
    /// O(log n) seeks, bisecting on lexicographic subject order.
    Binary,
    /// Fixed-size forward jumps followed by backpedal-and-step, useful when
    /// the dump isn't strictly sorted by the marker's presence alone.
    Jump,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error partitioning {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write the parts manifest at {path}")]
    Tsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("the cursor did not move at byte {offset} in {path}; increase jump_size for this input")]
    CursorStuck { path: PathBuf, offset: u64 },
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> Error + '_ {
    move |source| Error::Io { path: path.to_owned(), source }
}

/// Inputs needed to compute a partitioning of one input file.
pub struct PartitionParams {
    pub input_path: PathBuf,
    pub parts_file: PathBuf,
    pub output_dir: PathBuf,
    /// Approximate size in bytes of each part, before snapping to the next
    /// subject boundary.
    pub target_size: u64,
    /// The string that identifies a subject as using a global identifier,
    /// e.g. `global.dbpedia.org/id/`.
    pub global_id_marker: String,
    /// Prefix prepended to `global_id_marker` to build a full comparable
    /// subject string for the binary search, e.g. `<https://`.
    pub id_marker_prefix: String,
    pub search_type: SearchType,
    pub bin_search_limit: u32,
    pub jump_size: i64,
    pub backpedal_size: i64,
}

/// One contiguous byte range of the input file, snapped to subject
/// boundaries on both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub path: PathBuf,
    pub start: u64,
    pub end: u64,
}

/// Computes the partitioning of `params.input_path`, writing each part to
/// `params.parts_file` as it's discovered and returning an iterator that
/// yields the same parts.
pub fn compute_parts(params: PartitionParams) -> Result<PartIter, Error> {
    let mut file = File::open(&params.input_path).map_err(io_err(&params.input_path))?;
    let file_end = file.seek(SeekFrom::End(0)).map_err(io_err(&params.input_path))?;

    let chunk_end = seek_first_global_subject(&mut file, &params.input_path, &params, file_end)?;

    if let Some(parent) = params.output_dir.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
    }
    std::fs::create_dir_all(&params.output_dir).map_err(io_err(&params.output_dir))?;

    let manifest = File::create(&params.parts_file).map_err(io_err(&params.parts_file))?;
    let writer = csv::WriterBuilder::new().delimiter(b'\t').has_headers(false).from_writer(manifest);

    Ok(PartIter {
        file,
        input_path: params.input_path,
        parts_path: params.parts_file,
        output_dir: params.output_dir,
        writer,
        part_number: 0,
        chunk_end,
        file_end,
        target_size: params.target_size,
    })
}

/// Iterator over the parts of a single input file, writing the TSV manifest
/// row for each part as it's yielded.
pub struct PartIter {
    file: File,
    input_path: PathBuf,
    parts_path: PathBuf,
    output_dir: PathBuf,
    writer: csv::Writer<File>,
    part_number: u32,
    chunk_end: u64,
    file_end: u64,
    target_size: u64,
}

impl PartIter {
    fn advance(&mut self) -> Result<Option<Part>, Error> {
        if self.chunk_end >= self.file_end {
            return Ok(None);
        }
        self.part_number += 1;
        let chunk_start = self.chunk_end;

        self.file
            .seek(SeekFrom::Start(chunk_start + self.target_size))
            .map_err(io_err(&self.input_path))?;
        read_line_bytes(&mut self.file, &self.input_path)?;

        let final_subject = read_subject_from_line(&mut self.file, &self.input_path)?;
        let mut bookmark = self.file.stream_position().map_err(io_err(&self.input_path))?;
        loop {
            let new_subject = read_subject_from_line(&mut self.file, &self.input_path)?;
            if !new_subject.is_empty() && new_subject == final_subject {
                bookmark = self.file.stream_position().map_err(io_err(&self.input_path))?;
            } else {
                self.file.seek(SeekFrom::Start(bookmark)).map_err(io_err(&self.input_path))?;
                self.chunk_end = bookmark;
                break;
            }
        }

        let part_name = format!("part-{:03}", self.part_number);
        let part_path = self.output_dir.join(&part_name);
        self.writer
            .write_record([part_path.to_string_lossy().as_ref(), &chunk_start.to_string(), &self.chunk_end.to_string()])
            .map_err(|source| Error::Tsv { path: self.parts_path.clone(), source })?;
        self.writer.flush().map_err(io_err(&self.parts_path))?;

        Ok(Some(Part { name: part_name, path: part_path, start: chunk_start, end: self.chunk_end }))
    }
}

impl Iterator for PartIter {
    type Item = Result<Part, Error>;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

enum SeekStep {
    Moved { cursor: u64, subject: Vec<u8> },
    /// `delta` was too small to clear the line straddling `cursor`: the
    /// discarded partial line was at least as long as the jump itself.
    TooClose,
}

fn seek_subject_at(file: &mut File, path: &Path, cursor: u64, delta: i64) -> Result<SeekStep, Error> {
    let target = cursor as i64 + delta;
    if target < 0 {
        return Err(Error::Io {
            path: path.to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "seek before start of file"),
        });
    }
    file.seek(SeekFrom::Start(target as u64)).map_err(io_err(path))?;
    let discard = read_line_bytes(file, path)?;
    if discard.len() as i64 >= delta.abs() {
        return Ok(SeekStep::TooClose);
    }

    let new_cursor = file.stream_position().map_err(io_err(path))?;
    if new_cursor == cursor {
        return Err(Error::CursorStuck { path: path.to_owned(), offset: cursor });
    }
    let subject = read_subject_from_line(file, path)?;
    Ok(SeekStep::Moved { cursor: new_cursor, subject })
}

fn step_to_marked_line(
    file: &mut File,
    path: &Path,
    mut cursor: u64,
    id_marker: &[u8],
    upper_limit: u64,
) -> Result<u64, Error> {
    let mut subject: Vec<u8> = Vec::new();
    file.seek(SeekFrom::Start(cursor)).map_err(io_err(path))?;
    while !contains(&subject, id_marker) && cursor < upper_limit {
        cursor = file.stream_position().map_err(io_err(path))?;
        subject = read_subject_from_line(file, path)?;
    }
    if !contains(&subject, id_marker) {
        warn!("did not find first global URI");
        cursor = 0;
    }
    file.seek(SeekFrom::Start(cursor)).map_err(io_err(path))?;
    Ok(cursor)
}

fn binary_search(
    file: &mut File,
    path: &Path,
    id_marker: &[u8],
    id_marker_prefix: &[u8],
    file_end: u64,
    bin_search_limit: u32,
) -> Result<u64, Error> {
    let mut left: u64 = 0;
    let mut right = file_end;
    let mut cursor: u64 = 0;

    let mut id_subject = id_marker_prefix.to_vec();
    id_subject.extend_from_slice(id_marker);

    for _ in 0..bin_search_limit {
        let delta = ((right - left) / 2) as i64;
        match seek_subject_at(file, path, left, delta)? {
            SeekStep::TooClose => {
                cursor = step_to_marked_line(file, path, left, id_marker, right)?;
                break;
            }
            SeekStep::Moved { cursor: new_cursor, subject } => {
                cursor = new_cursor;
                if subject < id_subject {
                    info!("forw {left} {right}");
                    left = cursor;
                } else {
                    info!("back {left} {right}");
                    right = cursor;
                }
            }
        }
    }
    Ok(cursor)
}

fn jump_backpedal_and_step(
    file: &mut File,
    path: &Path,
    id_marker: &[u8],
    file_end: u64,
    jump_size: i64,
    backpedal_size: i64,
) -> Result<u64, Error> {
    let mut subject: Vec<u8> = Vec::new();
    let mut cursor: u64 = 0;
    let mut previous_jump_pos: u64 = 0;
    let mut stuck = false;

    while !contains(&subject, id_marker) && cursor < file_end {
        previous_jump_pos = cursor;
        match seek_subject_at(file, path, cursor, jump_size)? {
            SeekStep::TooClose => {
                stuck = true;
                break;
            }
            SeekStep::Moved { cursor: c, subject: s } => {
                cursor = c;
                subject = s;
            }
        }
    }

    if !stuck {
        while contains(&subject, id_marker) && cursor > 0 {
            match seek_subject_at(file, path, cursor, -backpedal_size)? {
                SeekStep::TooClose => {
                    stuck = true;
                    break;
                }
                SeekStep::Moved { cursor: c, subject: s } => {
                    cursor = c;
                    subject = s;
                }
            }
        }
    }

    if stuck {
        cursor = previous_jump_pos;
    }

    let cursor = if cursor > 0 && cursor < file_end {
        step_to_marked_line(file, path, cursor, id_marker, file_end)?
    } else {
        warn!("did not find first global URI");
        0
    };

    Ok(cursor)
}

fn seek_first_global_subject(
    file: &mut File,
    path: &Path,
    params: &PartitionParams,
    file_end: u64,
) -> Result<u64, Error> {
    info!("looking for the first line with a global URI as subject");
    let id_marker = params.global_id_marker.as_bytes();
    let cursor = match params.search_type {
        SearchType::Binary => {
            binary_search(file, path, id_marker, params.id_marker_prefix.as_bytes(), file_end, params.bin_search_limit)?
        }
        SearchType::Jump => jump_backpedal_and_step(file, path, id_marker, file_end, params.jump_size, params.backpedal_size)?,
    };
    file.seek(SeekFrom::Start(cursor)).map_err(io_err(path))?;
    Ok(cursor)
}

/// Reads one line (including its trailing `\n`, if any) without buffering
/// past it, so the file's position always reflects exactly what's been
/// consumed by the caller's seek/readline sequence.
fn read_line_bytes(file: &mut File, path: &Path) -> Result<Vec<u8>, Error> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = file.read(&mut byte).map_err(io_err(path))?;
        if n == 0 {
            break;
        }
        line.push(byte[0]);
        if byte[0] == b'\n' {
            break;
        }
    }
    Ok(line)
}

fn read_subject_from_line(file: &mut File, path: &Path) -> Result<Vec<u8>, Error> {
    let line = read_line_bytes(file, path)?;
    Ok(match find_subslice(&line, b"> <") {
        Some(pos) => line[..pos].to_vec(),
        None => line,
    })
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find_subslice(haystack, needle).is_some()
}
