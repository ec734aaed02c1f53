//! Archive extraction and batch processing.
//!
//! Every entry is written to `<output>/<content id>`. Entries holding a
//! resource chunk additionally get their buffers written to
//! `<output>/<content id>_buf_<buffer index>`. A failing entry is logged and
//! skipped; a failing archive is logged and the batch moves on.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use redarc_formats::{ArchiveFile, ArchiveReader, ArchiveSource, ResourceChunk, SourceMode};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::{DumpConfig, DumpOptions};
use crate::dump;

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub archives: usize,
    pub failed_archives: usize,
    pub entries: usize,
    pub failed_entries: usize,
    pub files_written: usize,
}

impl Summary {
    fn absorb(&mut self, other: Self) {
        self.archives += other.archives;
        self.failed_archives += other.failed_archives;
        self.entries += other.entries;
        self.failed_entries += other.failed_entries;
        self.files_written += other.files_written;
    }
}

/// Whether `path` has the extension `extension` (leading dot optional).
pub fn matches_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    !wanted.is_empty() && path.extension().is_some_and(|ext| ext == wanted)
}

/// Archives directly inside `dir`, sorted by name.
pub fn collect_archives(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if entry.file_type().is_file() && matches_extension(entry.path(), extension) {
            archives.push(entry.into_path());
        }
    }
    Ok(archives)
}

/// Run the extractor as configured.
pub fn run(config: &DumpConfig, out: &mut impl Write) -> Result<Summary> {
    let output = config.output_dir()?;
    let inputs = if config.is_batch() {
        let archives = collect_archives(&config.input, config.normalized_extension())?;
        info!(
            "Found {} archives in {}",
            archives.len(),
            config.input.display()
        );
        archives
    } else {
        vec![config.input.clone()]
    };

    let options = config.dump_options();
    let mut summary = Summary::default();
    for path in &inputs {
        summary.archives += 1;
        match extract_archive(path, &output, &options, config.source_mode(), out) {
            Ok(stats) => summary.absorb(stats),
            Err(e) => {
                error!("Skipping {}: {e:#}", path.display());
                summary.failed_archives += 1;
            }
        }
    }
    Ok(summary)
}

/// Extract one archive into `output`.
///
/// Fails if the archive cannot be opened, the output directory cannot be
/// created, or an entry error invalidates the whole file. Entry-local
/// failures are logged and counted.
pub fn extract_archive(
    path: &Path,
    output: &Path,
    options: &DumpOptions,
    mode: SourceMode,
    out: &mut impl Write,
) -> Result<Summary> {
    let source = ArchiveSource::open(path, mode)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let reader = ArchiveReader::open(&source)
        .with_context(|| format!("Failed to open archive {}", path.display()))?;
    info!("{}: {} entries", path.display(), reader.entry_count());
    if let Some(build) = reader.debug_info() {
        debug!(
            "Packed on {} ({}), build {}",
            build.computer_name(),
            build.build_machine,
            build.build_name()
        );
    }

    if options.write {
        fs::create_dir_all(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
    }

    let mut summary = Summary::default();
    for (index, file) in reader.files() {
        summary.entries += 1;
        let file = match file {
            Ok(file) => file,
            Err(e) if e.is_entry_local() => {
                warn!("{}: skipping entry {index}: {e}", path.display());
                summary.failed_entries += 1;
                continue;
            }
            Err(e) => {
                let context = format!("Archive {} is unreadable at entry {index}", path.display());
                return Err(anyhow::Error::new(e).context(context));
            }
        };
        match extract_entry(&file, output, options, out) {
            Ok(written) => summary.files_written += written,
            Err(e) => {
                warn!("{}: skipping entry {index}: {e:#}", path.display());
                summary.failed_entries += 1;
            }
        }
    }
    Ok(summary)
}

/// Print and write one entry, returning the number of files written.
fn extract_entry(
    file: &ArchiveFile,
    output: &Path,
    options: &DumpOptions,
    out: &mut impl Write,
) -> Result<usize> {
    if options.list {
        dump::write_entry_summary(out, file)?;
    }

    let mut written = 0;
    if options.write {
        let target = output.join(file.id().to_string());
        fs::write(&target, &file.data)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        written += 1;
    }

    if !file.is_resource_chunk() {
        return Ok(written);
    }
    let chunk = ResourceChunk::open(&file.data)
        .with_context(|| format!("Entry {} holds a broken resource", file.id()))?;
    dump::write_chunk(out, &chunk, options)?;

    if options.write && options.buffers {
        for buffer in chunk.buffers() {
            let buffer = buffer?;
            let target = output.join(format!("{}_buf_{}", file.id(), buffer.index));
            fs::write(&target, chunk.buffer_data(&buffer)?)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            written += 1;
        }
    }
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use redarc_formats::FormatError;
    use redarc_formats::test_utils::{
        ArchiveBuilder, ChunkBuilder, TestEntry, raw_segment, tagged_segment,
    };

    /// Resource chunk with one buffer of `payload` in its buffer section
    fn chunk_with_buffer(payload: &[u8]) -> Vec<u8> {
        let mut chunk = ChunkBuilder::new();
        let offset = chunk.section(payload);
        chunk.buffer(3, offset, payload.len() as u32);
        chunk.build()
    }

    /// Archive whose entries are each one raw segment
    fn archive(entries: &[(u64, &[u8])]) -> Vec<u8> {
        entries
            .iter()
            .fold(ArchiveBuilder::new(), |builder, (id, data)| {
                builder.entry(TestEntry::new(*id).segment(raw_segment(data)))
            })
            .build()
    }

    #[test]
    fn test_matches_extension() {
        let path = Path::new("content/basegame_1_engine.archive");
        assert!(matches_extension(path, "archive"));
        assert!(matches_extension(path, ".archive"));
        assert!(!matches_extension(path, "xl"));
        assert!(!matches_extension(path, ""));
        assert!(!matches_extension(Path::new("content/archive"), "archive"));
    }

    #[test]
    fn test_collect_archives_is_shallow() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.archive"), b"").unwrap();
        fs::write(dir.path().join("a.archive"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/c.archive"), b"").unwrap();

        let found = collect_archives(dir.path(), ".archive").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.archive", "b.archive"]);
    }

    #[test]
    fn test_extract_writes_entries_and_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let chunk = chunk_with_buffer(b"\xDE\xAD\xBE\xEF");
        let path = dir.path().join("test.archive");
        fs::write(&path, archive(&[(11, b"plain".as_slice()), (22, chunk.as_slice())])).unwrap();

        let output = dir.path().join("out");
        let options = DumpOptions {
            buffers: true,
            list: true,
            write: true,
            ..DumpOptions::default()
        };
        let mut printed = Vec::new();
        let summary =
            extract_archive(&path, &output, &options, SourceMode::Loaded, &mut printed).unwrap();

        assert_eq!(summary.entries, 2);
        assert_eq!(summary.failed_entries, 0);
        assert_eq!(summary.files_written, 3);
        assert_eq!(fs::read(output.join("11")).unwrap(), b"plain");
        assert_eq!(fs::read(output.join("22")).unwrap(), chunk);
        assert_eq!(fs::read(output.join("22_buf_3")).unwrap(), b"\xDE\xAD\xBE\xEF");

        let text = String::from_utf8(printed).unwrap();
        assert!(text.contains("000000000000000B"));
        assert!(text.contains("buffers (1)"));
    }

    #[test]
    fn test_batch_skips_broken_archives() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("content");
        fs::create_dir(&input).unwrap();
        fs::write(input.join("good.archive"), archive(&[(1, b"one".as_slice())])).unwrap();
        fs::write(input.join("bad.archive"), b"not an archive at all").unwrap();
        fs::write(input.join("ignored.bin"), b"").unwrap();

        let output = dir.path().join("dump");
        let config = DumpConfig::try_parse_from([
            "redarc",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "--no-mmap",
        ])
        .unwrap();

        let summary = run(&config, &mut std::io::sink()).unwrap();
        assert_eq!(summary.archives, 2);
        assert_eq!(summary.failed_archives, 1);
        assert_eq!(summary.entries, 1);
        assert_eq!(
            fs::read(output.join("content").join("1")).unwrap(),
            b"one"
        );
    }

    #[test]
    fn test_truncated_archive_fails_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.archive");
        let bytes = archive(&[(1, b"one".as_slice()), (2, b"two".as_slice())]);
        fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

        let err = extract_archive(
            &path,
            &dir.path().join("out"),
            &DumpOptions::default(),
            SourceMode::Loaded,
            &mut std::io::sink(),
        )
        .unwrap_err();
        let cause = err.downcast_ref::<FormatError>().unwrap();
        assert!(cause.is_file_fatal(), "{cause}");
    }

    #[test]
    fn test_broken_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.archive");
        let bytes = ArchiveBuilder::new()
            .entry(TestEntry::new(1).segment(raw_segment(b"one")))
            .entry(TestEntry::new(2).segment(tagged_segment(*b"ZSTD", &[0; 4], 32)))
            .entry(TestEntry::new(3).segment(raw_segment(b"three")))
            .build();
        fs::write(&path, bytes).unwrap();

        let output = dir.path().join("out");
        let options = DumpOptions {
            write: true,
            ..DumpOptions::default()
        };
        let summary =
            extract_archive(&path, &output, &options, SourceMode::Loaded, &mut std::io::sink())
                .unwrap();
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.failed_entries, 1);
        assert_eq!(summary.files_written, 2);
        assert!(!output.join("2").exists());
        assert_eq!(fs::read(output.join("3")).unwrap(), b"three");
    }

    #[test]
    fn test_no_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.archive");
        fs::write(&path, archive(&[(5, b"data".as_slice())])).unwrap();
        let output = dir.path().join("never");

        let options = DumpOptions::default();
        let summary =
            extract_archive(&path, &output, &options, SourceMode::Mapped, &mut std::io::sink())
                .unwrap();
        assert_eq!(summary.files_written, 0);
        assert!(!output.exists());
    }
}
