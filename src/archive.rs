use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ContextError;

/// The name of the archive created at the given local time.
pub fn archive_file_name(now: chrono::NaiveDateTime) -> String {
    now.format("invoices_%Y%m%d_%H%M%S.zip").to_string()
}

/// Packs the files into a deflate-compressed zip archive, each of them stored at
/// the root of the archive under its own file name.
pub fn write_archive(files: &[PathBuf], destination: &Path) -> Result<(), ContextError> {
    let archive_file = File::create(destination).map_err(|error| {
        ContextError::with_error(
            format!("Failed to create the archive {:?}", destination),
            &error,
        )
    })?;
    let mut writer = ZipWriter::new(BufWriter::new(archive_file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        let entry_name = file
            .file_name()
            .map(|file_name| file_name.to_string_lossy().into_owned())
            .ok_or(ContextError::with_context(format!(
                "The path {:?} has no file name",
                file
            )))?;
        let contents = std::fs::read(file).map_err(|error| {
            ContextError::with_error(format!("Failed to read the file {:?}", file), &error)
        })?;

        writer.start_file(entry_name.as_str(), options).map_err(|error| {
            ContextError::with_error(format!("Failed to add {:?} to the archive", entry_name), &error)
        })?;
        writer.write_all(&contents).map_err(|error| {
            ContextError::with_error(format!("Failed to write {:?} to the archive", entry_name), &error)
        })?;
    }

    let mut buffered_file = writer
        .finish()
        .map_err(|error| ContextError::with_error("Failed to finish the archive", &error))?;
    buffered_file
        .flush()
        .map_err(|error| ContextError::with_error("Failed to write the archive", &error))?;
    log::info!("Packed {} files into {:?}", files.len(), destination);

    Ok(())
}
