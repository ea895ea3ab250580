//! Atomic array-file writer.

use super::npy;
use super::StoreError;
use crate::assembly::OutputArray;
use crate::extraction::OutputKind;
use chrono::SecondsFormat;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// A file written by [`ArrayWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Final path of the file.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
}

/// Writes assembled arrays as `<base>.<kind>.npy` under one directory.
///
/// The files of one call are written to `<name>.partial` and renamed into
/// place only after every one of them has been flushed. If any write or
/// rename fails, none of the call's files is left under its final name.
#[derive(Debug, Clone)]
pub struct ArrayWriter {
    output_dir: PathBuf,
    timestamp_text: bool,
}

impl ArrayWriter {
    /// Creates a writer targeting an existing directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            timestamp_text: false,
        }
    }

    /// Also writes timestamps as `<base>.timestamp.txt`, one RFC 3339
    /// instant per line.
    pub fn with_timestamp_text(mut self, enabled: bool) -> Self {
        self.timestamp_text = enabled;
        self
    }

    /// Returns the path an array of `kind` is written to.
    pub fn output_path(&self, base: &str, kind: OutputKind) -> PathBuf {
        self.output_dir.join(format!("{base}.{kind}.npy"))
    }

    /// Persists one array, returning the files written.
    ///
    /// A failure is surfaced as [`StoreError::Write`] and never retried.
    pub fn write(
        &self,
        base: &str,
        kind: OutputKind,
        array: &OutputArray,
    ) -> Result<Vec<WrittenFile>, StoreError> {
        self.write_set(base, [(kind, array)])
    }

    /// Persists a set of arrays as one unit, returning the files written.
    pub fn write_set<'b>(
        &self,
        base: &str,
        arrays: impl IntoIterator<Item = (OutputKind, &'b OutputArray)>,
    ) -> Result<Vec<WrittenFile>, StoreError> {
        let mut staged = Vec::new();
        for (kind, array) in arrays {
            if let Err(e) = self.stage_array(base, kind, array, &mut staged) {
                for file in &staged {
                    remove_quietly(&file.partial);
                }
                return Err(e);
            }
        }
        commit(staged)
    }

    fn stage_array(
        &self,
        base: &str,
        kind: OutputKind,
        array: &OutputArray,
        staged: &mut Vec<Staged>,
    ) -> Result<(), StoreError> {
        let path = self.output_path(base, kind);
        staged.push(stage(path, |out| npy::write_array(out, array))?);

        if self.timestamp_text {
            if let Some(instants) = array.instants() {
                let path = self.output_dir.join(format!("{base}.timestamp.txt"));
                staged.push(stage(path, |out| {
                    let mut bytes = 0u64;
                    for instant in &instants {
                        let line = instant.to_rfc3339_opts(SecondsFormat::Nanos, true);
                        writeln!(out, "{line}")?;
                        bytes += line.len() as u64 + 1;
                    }
                    Ok(bytes)
                })?);
            }
        }
        Ok(())
    }
}

/// A flushed partial file awaiting its rename.
#[derive(Debug)]
struct Staged {
    partial: PathBuf,
    path: PathBuf,
    bytes: u64,
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove output file");
        }
    }
}

fn stage<F>(path: PathBuf, body: F) -> Result<Staged, StoreError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<u64>,
{
    let partial = partial_path(&path);
    let result = File::create(&partial).and_then(|file| {
        let mut out = BufWriter::new(file);
        let bytes = body(&mut out)?;
        out.into_inner().map_err(io::IntoInnerError::into_error)?.sync_all()?;
        Ok(bytes)
    });

    match result {
        Ok(bytes) => Ok(Staged {
            partial,
            path,
            bytes,
        }),
        Err(source) => {
            remove_quietly(&partial);
            Err(StoreError::Write { path, source })
        }
    }
}

fn commit(staged: Vec<Staged>) -> Result<Vec<WrittenFile>, StoreError> {
    for (position, file) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(&file.partial, &file.path) {
            for renamed in &staged[..position] {
                remove_quietly(&renamed.path);
            }
            for pending in &staged[position..] {
                remove_quietly(&pending.partial);
            }
            return Err(StoreError::Write {
                path: file.path.clone(),
                source,
            });
        }
    }

    Ok(staged
        .into_iter()
        .map(|file| {
            tracing::debug!(path = %file.path.display(), bytes = file.bytes, "Wrote output file");
            WrittenFile {
                path: file.path,
                bytes: file.bytes,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NpyHeader;
    use ndarray::{Array1, Array4};

    #[test]
    fn test_output_path_naming() {
        let writer = ArrayWriter::new("/data/out");
        assert_eq!(
            writer.output_path("rx_1_230101", OutputKind::Magnitude),
            PathBuf::from("/data/out/rx_1_230101.magnitude.npy")
        );
    }

    #[test]
    fn test_write_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArrayWriter::new(dir.path());
        let array = OutputArray::Real(Array4::zeros((2, 3, 1, 1)));

        let written = writer.write("capture", OutputKind::Phase, &array).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].path.exists());
        assert!(!partial_path(&written[0].path).exists());
        assert_eq!(fs::metadata(&written[0].path).unwrap().len(), written[0].bytes);

        let header = NpyHeader::read_file(&written[0].path).unwrap();
        assert_eq!(header.shape, vec![2, 3, 1, 1]);
        assert_eq!(header.descr, "<f8");
    }

    #[test]
    fn test_missing_directory_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArrayWriter::new(dir.path().join("missing"));
        let array = OutputArray::Timestamp(Array1::from_vec(vec![1, 2]));

        let err = writer.write("capture", OutputKind::Timestamp, &array).unwrap_err();
        match err {
            StoreError::Write { path, .. } => assert!(path.ends_with("capture.timestamp.npy")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_failed_rename_rolls_back_set() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("capture.phase.npy")).unwrap();
        let writer = ArrayWriter::new(dir.path());
        let csi = OutputArray::Real(Array4::zeros((1, 2, 1, 1)));
        let phase = OutputArray::Real(Array4::zeros((1, 2, 1, 1)));

        let err = writer
            .write_set("capture", [(OutputKind::Magnitude, &csi), (OutputKind::Phase, &phase)])
            .unwrap_err();
        match err {
            StoreError::Write { path, .. } => assert!(path.ends_with("capture.phase.npy")),
            other => panic!("unexpected error: {other}"),
        }

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["capture.phase.npy".to_string()]);
    }

    #[test]
    fn test_timestamp_text_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArrayWriter::new(dir.path()).with_timestamp_text(true);
        let array = OutputArray::Timestamp(Array1::from_vec(vec![
            1_700_000_000_000_000_001,
            1_700_000_000_500_000_000,
        ]));

        let written = writer.write("capture", OutputKind::Timestamp, &array).unwrap();
        assert_eq!(written.len(), 2);

        let text = fs::read_to_string(dir.path().join("capture.timestamp.txt")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["2023-11-14T22:13:20.000000001Z", "2023-11-14T22:13:20.500000000Z"]
        );
    }

    #[test]
    fn test_sidecar_only_for_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArrayWriter::new(dir.path()).with_timestamp_text(true);
        let array = OutputArray::Real(Array4::zeros((1, 1, 1, 1)));

        let written = writer.write("capture", OutputKind::Magnitude, &array).unwrap();
        assert_eq!(written.len(), 1);
    }
}
