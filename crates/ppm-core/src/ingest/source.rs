//! Input file detection and in-memory decompression.
//!
//! Event logs arrive as plain `.csv`, as gzip-compressed `.csv.gz`, or as a
//! `.zip` archive holding a `.csv` entry. Compressed inputs are inflated into
//! memory; nothing is written next to the input.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use ppm_common::{Error, Result};
use zip::ZipArchive;

/// Container format of an event log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Gzip,
    Zip,
}

impl SourceKind {
    /// Classify a path by extension. `.gz` is accepted only when the inner
    /// name is itself a `.csv`.
    pub fn detect(path: &Path) -> Result<Self> {
        match lower_extension(path).as_deref() {
            Some("csv") => Ok(SourceKind::Csv),
            Some("zip") => Ok(SourceKind::Zip),
            Some("gz") => {
                let inner = path.file_stem().map(Path::new);
                match inner.and_then(lower_extension).as_deref() {
                    Some("csv") => Ok(SourceKind::Gzip),
                    _ => Err(unsupported(path)),
                }
            }
            _ => Err(unsupported(path)),
        }
    }
}

fn lower_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn unsupported(path: &Path) -> Error {
    Error::UnsupportedFormat {
        path: path.display().to_string(),
    }
}

/// Read the CSV payload of `path`, decompressing if needed.
pub fn load(path: &Path) -> Result<Vec<u8>> {
    let kind = SourceKind::detect(path)?;
    let file = File::open(path)?;
    let mut data = Vec::new();
    match kind {
        SourceKind::Csv => {
            let mut file = file;
            file.read_to_end(&mut data)?;
        }
        SourceKind::Gzip => {
            GzDecoder::new(file).read_to_end(&mut data)?;
        }
        SourceKind::Zip => {
            read_first_csv_entry(file, path, &mut data)?;
        }
    }
    tracing::debug!(
        path = %path.display(),
        kind = ?kind,
        bytes = data.len() as u64,
        "loaded event log source"
    );
    Ok(data)
}

fn read_first_csv_entry(file: File, path: &Path, data: &mut Vec<u8>) -> Result<()> {
    let zip_err = |e: zip::result::ZipError| Error::Parse(format!("{}: {}", path.display(), e));
    let mut archive = ZipArchive::new(file).map_err(zip_err)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        if entry.is_file() && entry.name().to_ascii_lowercase().ends_with(".csv") {
            entry.read_to_end(data)?;
            return Ok(());
        }
    }
    Err(Error::UnsupportedFormat {
        path: format!("{} (archive holds no .csv entry)", path.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detect_by_extension() {
        assert_eq!(SourceKind::detect(Path::new("log.csv")).unwrap(), SourceKind::Csv);
        assert_eq!(SourceKind::detect(Path::new("LOG.CSV")).unwrap(), SourceKind::Csv);
        assert_eq!(SourceKind::detect(Path::new("log.csv.gz")).unwrap(), SourceKind::Gzip);
        assert_eq!(SourceKind::detect(Path::new("log.zip")).unwrap(), SourceKind::Zip);
    }

    #[test]
    fn unknown_extensions_rejected() {
        for name in ["log.xes", "log.xlsx", "log", "log.json.gz", "log.gz"] {
            let err = SourceKind::detect(Path::new(name)).unwrap_err();
            assert_eq!(err.code(), 20, "{name}");
        }
    }

    #[test]
    fn gzip_is_inflated_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv.gz");
        let mut enc = flate2::write::GzEncoder::new(
            File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        enc.write_all(b"a,b\n1,2\n").unwrap();
        enc.finish().unwrap();

        assert_eq!(load(&path).unwrap(), b"a,b\n1,2\n");
        // only the archive itself exists
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn zip_reads_first_csv_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.zip");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        let opts = zip::write::SimpleFileOptions::default();
        zip.start_file("README.txt", opts).unwrap();
        zip.write_all(b"not a log").unwrap();
        zip.start_file("inner/log.csv", opts).unwrap();
        zip.write_all(b"x\n1\n").unwrap();
        zip.finish().unwrap();

        assert_eq!(load(&path).unwrap(), b"x\n1\n");
    }

    #[test]
    fn zip_without_csv_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.zip");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("notes.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"hello").unwrap();
        zip.finish().unwrap();

        assert_eq!(load(&path).unwrap_err().code(), 20);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/log.csv")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
