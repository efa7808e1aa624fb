//! Whole-archive operations: create, list, extract and test.
//!
//! Each operation works on one archive file from start to end. Problems with
//! a single entry are recorded in [`Stats::failures`] and reported to the
//! observer, and the operation moves on to the next entry. Only a failure
//! to open the archive itself, or to keep its stream consistent, ends an
//! operation early with `Err`.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::Builder;

use crate::archive::{ArchiveEnd, ArchiveReader, ArchiveWriter, Entry};
use crate::codec::Level;
use crate::error::{Error, Result};

/// Options for [`create`] and [`create_to_writer`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub level: Level,
}

/// Options for [`extract`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Directory the entry names are resolved against
    pub output_dir: PathBuf,
    /// Replace files that already exist instead of skipping them
    pub overwrite: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            overwrite: false,
        }
    }
}

/// Progress notifications passed to the caller's observer.
#[derive(Debug)]
pub enum Event<'a> {
    Added(&'a Entry),
    SkippedDirectory(&'a Path),
    /// The archive was named among its own inputs.
    SkippedArchive(&'a Path),
    Extracted { entry: &'a Entry, path: &'a Path },
    /// The output file already exists and overwriting is off.
    Exists { entry: &'a Entry, path: &'a Path },
    Verified(&'a Entry),
    Failed { name: &'a str, error: &'a Error },
}

/// An entry that could not be processed.
#[derive(Debug)]
pub struct EntryFailure {
    pub name: String,
    pub error: Error,
}

/// Running totals for one operation.
#[derive(Debug, Default)]
pub struct Stats {
    /// Entries processed successfully
    pub entries: u64,
    pub uncompressed_total: u64,
    pub compressed_total: u64,
    /// Inputs or outputs deliberately left alone (directories, existing files)
    pub skipped: u64,
    pub failures: Vec<EntryFailure>,
    /// How the archive scan ended; `None` for create
    pub end: Option<ArchiveEnd>,
}

impl Stats {
    /// Compressed size as a percentage of the original size.
    pub fn ratio(&self) -> u64 {
        compression_ratio(self.compressed_total, self.uncompressed_total)
    }

    /// True when no entry failed and any scan reached a clean end.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.end.is_none_or(|end| end.is_clean())
    }

    fn record(&mut self, entry: &Entry) {
        self.entries += 1;
        self.uncompressed_total += entry.uncompressed_size();
        self.compressed_total += entry.compressed_size();
    }

    fn fail<F: FnMut(Event<'_>)>(&mut self, name: String, error: Error, observer: &mut F) {
        observer(Event::Failed {
            name: &name,
            error: &error,
        });
        self.failures.push(EntryFailure { name, error });
    }
}

/// Entries found by [`list`].
#[derive(Debug)]
pub struct Listing {
    pub entries: Vec<Entry>,
    pub end: ArchiveEnd,
}

impl Listing {
    pub fn uncompressed_total(&self) -> u64 {
        self.entries.iter().map(Entry::uncompressed_size).sum()
    }

    pub fn compressed_total(&self) -> u64 {
        self.entries.iter().map(Entry::compressed_size).sum()
    }

    pub fn ratio(&self) -> u64 {
        compression_ratio(self.compressed_total(), self.uncompressed_total())
    }
}

/// `compressed * 100 / uncompressed`, or 0 for empty input.
pub fn compression_ratio(compressed: u64, uncompressed: u64) -> u64 {
    if uncompressed == 0 {
        return 0;
    }
    (compressed as u128 * 100 / uncompressed as u128) as u64
}

/// Create `archive` from `files`, back-patching each header in place.
///
/// Directories are skipped. The archive file is truncated to the end of the
/// last complete entry, so a failed final entry leaves nothing behind.
pub fn create<P, F>(archive: &Path, files: &[P], options: &CreateOptions, mut observer: F) -> Result<Stats>
where
    P: AsRef<Path>,
    F: FnMut(Event<'_>),
{
    let file = File::create(archive).map_err(|source| Error::OpenArchive {
        path: archive.to_path_buf(),
        source,
    })?;
    let itself = fs::canonicalize(archive).ok();

    let mut writer = ArchiveWriter::new(BufWriter::new(file), options.level);
    let mut stats = Stats::default();
    add_files(files, itself.as_deref(), &mut stats, &mut observer, |name, source| {
        writer.append(name, source)
    })?;

    let (buffered, end) = writer.finish()?;
    let file = buffered.into_inner().map_err(|e| e.into_error())?;
    file.set_len(end)?;
    Ok(stats)
}

/// Create an archive on a stream that cannot seek, such as a pipe.
///
/// Every entry is compressed in memory before it is written.
pub fn create_to_writer<W, P, F>(
    sink: W,
    files: &[P],
    options: &CreateOptions,
    mut observer: F,
) -> Result<Stats>
where
    W: Write,
    P: AsRef<Path>,
    F: FnMut(Event<'_>),
{
    let mut writer = ArchiveWriter::new(sink, options.level);
    let mut stats = Stats::default();
    add_files(files, None, &mut stats, &mut observer, |name, source| {
        writer.append_buffered(name, source)
    })?;
    writer.finish()?;
    Ok(stats)
}

fn add_files<P, F, A>(
    files: &[P],
    itself: Option<&Path>,
    stats: &mut Stats,
    observer: &mut F,
    mut append: A,
) -> Result<()>
where
    P: AsRef<Path>,
    F: FnMut(Event<'_>),
    A: FnMut(&str, File) -> Result<Entry>,
{
    for path in files {
        let path = path.as_ref();

        if itself.is_some() && fs::canonicalize(path).ok().as_deref() == itself {
            stats.skipped += 1;
            observer(Event::SkippedArchive(path));
            continue;
        }

        let (name, source) = match open_source(path) {
            Ok(Some(opened)) => opened,
            Ok(None) => {
                stats.skipped += 1;
                observer(Event::SkippedDirectory(path));
                continue;
            }
            Err(e) => {
                stats.fail(path.display().to_string(), e, observer);
                continue;
            }
        };

        match append(&name, source) {
            Ok(entry) => {
                stats.record(&entry);
                observer(Event::Added(&entry));
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => stats.fail(name, e, observer),
        }
    }
    Ok(())
}

/// Open a source file for archiving. `Ok(None)` means it is a directory.
///
/// Devices, FIFOs and sockets are refused: their length says nothing about
/// how much they will yield, and some never reach EOF.
fn open_source(path: &Path) -> Result<Option<(String, File)>> {
    let metadata = fs::metadata(path).map_err(|e| source_error(path, e))?;
    if metadata.is_dir() {
        return Ok(None);
    }
    if !metadata.is_file() {
        return Err(Error::NotAFile(path.to_path_buf()));
    }
    if metadata.len() > u32::MAX as u64 {
        return Err(Error::TooLarge {
            size: metadata.len(),
        });
    }

    let name = archive_name(path)?;
    let file = File::open(path).map_err(|e| source_error(path, e))?;
    Ok(Some((name, file)))
}

fn source_error(path: &Path, source: io::Error) -> Error {
    Error::Source {
        path: path.to_path_buf(),
        source,
    }
}

/// Name stored in the archive for `path`: relative, `/`-separated.
///
/// Root and drive prefixes and `.` components are dropped; `..` is refused
/// because it could never be extracted safely.
pub fn archive_name(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::ParentDir => return Err(Error::UnsafeName(path.display().to_string())),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
        }
    }
    if parts.is_empty() {
        return Err(Error::UnsafeName(path.display().to_string()));
    }
    Ok(parts.join("/"))
}

/// Read every entry header of `archive` without decompressing anything.
pub fn list(archive: &Path) -> Result<Listing> {
    let mut reader = open_archive(archive)?;
    let entries = reader.entries()?;
    Ok(Listing {
        entries,
        end: reader.end().unwrap_or(ArchiveEnd::Clean),
    })
}

/// Extract every entry of `archive` below `options.output_dir`.
pub fn extract<F>(archive: &Path, options: &ExtractOptions, mut observer: F) -> Result<Stats>
where
    F: FnMut(Event<'_>),
{
    let mut reader = open_archive(archive)?;
    let mut stats = Stats::default();

    while let Some(entry) = reader.next_entry()? {
        match extract_entry(&mut reader, &entry, options) {
            Ok(Extracted::Written(path)) => {
                stats.record(&entry);
                observer(Event::Extracted {
                    entry: &entry,
                    path: &path,
                });
            }
            Ok(Extracted::Exists(path)) => {
                stats.skipped += 1;
                observer(Event::Exists {
                    entry: &entry,
                    path: &path,
                });
            }
            Err(e) => stats.fail(entry.file_name.clone(), e, &mut observer),
        }
    }

    stats.end = reader.end();
    Ok(stats)
}

enum Extracted {
    Written(PathBuf),
    Exists(PathBuf),
}

fn extract_entry<R: Read + Seek>(
    reader: &mut ArchiveReader<R>,
    entry: &Entry,
    options: &ExtractOptions,
) -> Result<Extracted> {
    let path = output_path(&options.output_dir, &entry.file_name)?;
    if !options.overwrite && path.exists() {
        return Ok(Extracted::Exists(path));
    }

    let output_error = |source| Error::Output {
        path: path.clone(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    refuse_linked_parents(&options.output_dir, parent, &entry.file_name)?;

    // Create parent directories if needed
    fs::create_dir_all(parent).map_err(output_error)?;

    // Decode next to the target and rename into place only once the size
    // and CRC have checked out. On error the temporary file is removed.
    let mut temp = Builder::new()
        .prefix(".pzip-")
        .tempfile_in(parent)
        .map_err(output_error)?;
    let mut out = BufWriter::new(temp.as_file_mut());
    reader.extract_to(entry, &mut out)?;
    out.flush().map_err(output_error)?;
    drop(out);

    temp.persist(&path).map_err(|e| output_error(e.error))?;
    Ok(Extracted::Written(path))
}

/// Refuse to write through a symbolic link that already exists between
/// `dir` and `parent`: it could point anywhere, so an entry below it would
/// land outside `dir`. `dir` itself is trusted.
fn refuse_linked_parents(dir: &Path, parent: &Path, name: &str) -> Result<()> {
    let Ok(relative) = parent.strip_prefix(dir) else {
        return Ok(());
    };

    let mut current = dir.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(Error::UnsafeName(name.to_string()));
            }
            Ok(_) => {}
            // Nothing exists from here on, so nothing below can be a link.
            Err(_) => break,
        }
    }
    Ok(())
}

/// Resolve an entry name below `dir`, refusing anything that could land
/// outside of it.
fn output_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut path = dir.to_path_buf();
    let mut has_file_part = false;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                has_file_part = true;
            }
            Component::CurDir => {}
            _ => return Err(Error::UnsafeName(name.to_string())),
        }
    }

    if !has_file_part {
        return Err(Error::UnsafeName(name.to_string()));
    }
    Ok(path)
}

/// Decompress every entry of `archive` and check its size and CRC32,
/// writing nothing to disk.
pub fn verify<F>(archive: &Path, mut observer: F) -> Result<Stats>
where
    F: FnMut(Event<'_>),
{
    let mut reader = open_archive(archive)?;
    let mut stats = Stats::default();

    while let Some(entry) = reader.next_entry()? {
        match reader.extract_to(&entry, io::sink()) {
            Ok(_) => {
                stats.record(&entry);
                observer(Event::Verified(&entry));
            }
            Err(e) => stats.fail(entry.file_name.clone(), e, &mut observer),
        }
    }

    stats.end = reader.end();
    Ok(stats)
}

fn open_archive(archive: &Path) -> Result<ArchiveReader<BufReader<File>>> {
    let open_error = |source| Error::OpenArchive {
        path: archive.to_path_buf(),
        source,
    };

    let file = File::open(archive).map_err(open_error)?;
    ArchiveReader::new(BufReader::new(file)).map_err(|e| match e {
        Error::Io(source) => open_error(source),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_guards_against_empty_input() {
        assert_eq!(compression_ratio(0, 0), 0);
        assert_eq!(compression_ratio(25, 100), 25);
        assert_eq!(compression_ratio(150, 100), 150);
        assert_eq!(compression_ratio(u64::MAX, u64::MAX), 100);
    }

    #[test]
    fn archive_names_are_relative() {
        assert_eq!(archive_name(Path::new("a.txt")).unwrap(), "a.txt");
        assert_eq!(archive_name(Path::new("./src/lib.rs")).unwrap(), "src/lib.rs");
        assert_eq!(archive_name(Path::new("/tmp/x/y.bin")).unwrap(), "tmp/x/y.bin");
        assert!(matches!(
            archive_name(Path::new("../secret")),
            Err(Error::UnsafeName(_))
        ));
        assert!(archive_name(Path::new("/")).is_err());
    }

    #[test]
    fn output_paths_stay_inside_the_target() {
        let dir = Path::new("out");
        assert_eq!(
            output_path(dir, "a/b.txt").unwrap(),
            PathBuf::from("out/a/b.txt")
        );
        assert_eq!(output_path(dir, "./c").unwrap(), PathBuf::from("out/c"));
        assert!(output_path(dir, "../escape").is_err());
        assert!(output_path(dir, "a/../../escape").is_err());
        assert!(output_path(dir, "/etc/passwd").is_err());
        assert!(output_path(dir, "").is_err());
    }

    #[test]
    fn parents_that_do_not_exist_yet_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("a/b/c");
        assert!(refuse_linked_parents(dir.path(), &parent, "a/b/c/d").is_ok());
        assert!(refuse_linked_parents(dir.path(), dir.path(), "d").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn linked_parent_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), dir.path().join("real/link")).unwrap();

        let parent = dir.path().join("real/link/deeper");
        assert!(matches!(
            refuse_linked_parents(dir.path(), &parent, "real/link/deeper/x"),
            Err(Error::UnsafeName(_))
        ));
    }

    #[test]
    fn success_requires_a_clean_end() {
        let mut stats = Stats::default();
        assert!(stats.is_success());

        stats.end = Some(ArchiveEnd::Clean);
        assert!(stats.is_success());

        stats.end = Some(ArchiveEnd::Truncated { offset: 10 });
        assert!(!stats.is_success());
    }
}
