//! Per-job output directory and the downloadable ZIP archive.
//!
//! Layout under the output directory:
//!
//! ```text
//! <job_id>/
//!     <stem>.xlsx            one per successful file
//!     00_CONSOLIDADO.xlsx    when at least one file succeeded
//!     <tool>_log.txt
//!     <tool>_result.zip      all of the above
//! ```

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::StorageError;
use crate::sanitize::{file_stem, unique_name};
use crate::sheet::{save_workbook, Sheet};
use crate::tool::Tool;

pub const CONSOLIDATED_NAME: &str = "00_CONSOLIDADO.xlsx";

pub struct FileStorage {
    output_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn job_directory(&self, job_id: &str) -> PathBuf {
        self.output_directory.join(job_id)
    }

    /// Creates the job directory and returns a writer for its contents.
    pub fn open_job(&self, job_id: &str, tool: Tool) -> Result<JobOutput, StorageError> {
        let dir = self.job_directory(job_id);
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;

        let mut taken = HashSet::new();
        taken.insert(CONSOLIDATED_NAME.to_string());
        taken.insert(tool.log_name());
        taken.insert(tool.archive_name());

        Ok(JobOutput {
            dir,
            tool,
            artifacts: Vec::new(),
            consolidated: false,
            taken,
        })
    }
}

/// Files produced for one job, sealed into an archive at the end.
#[derive(Debug)]
pub struct JobOutput {
    dir: PathBuf,
    tool: Tool,
    artifacts: Vec<String>,
    consolidated: bool,
    taken: HashSet<String>,
}

impl JobOutput {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact names in the order they were added.
    pub fn artifacts(&self) -> &[String] {
        &self.artifacts
    }

    /// Writes the workbook for one source file as `<stem>.xlsx`, suffixing
    /// `_1`, `_2`, ... when two sources share a stem.
    pub fn add_sheet(&mut self, source_filename: &str, sheet: &Sheet) -> Result<String, StorageError> {
        let name = unique_name(&mut self.taken, &format!("{}.xlsx", file_stem(source_filename)));
        save_workbook(&self.dir.join(&name), std::slice::from_ref(sheet))?;
        self.artifacts.push(name.clone());
        Ok(name)
    }

    pub fn add_consolidated(&mut self, sheet: &Sheet) -> Result<(), StorageError> {
        save_workbook(&self.dir.join(CONSOLIDATED_NAME), std::slice::from_ref(sheet))?;
        self.consolidated = true;
        Ok(())
    }

    /// Writes the log file and packs everything into the result archive.
    pub fn seal(self, log_text: &str) -> Result<PathBuf, StorageError> {
        let log_name = self.tool.log_name();
        let log_path = self.dir.join(&log_name);
        std::fs::write(&log_path, log_text).map_err(|e| StorageError::WriteFile {
            path: log_path.clone(),
            source: e,
        })?;

        let mut entries: Vec<&str> = Vec::with_capacity(self.artifacts.len() + 2);
        if self.consolidated {
            entries.push(CONSOLIDATED_NAME);
        }
        entries.extend(self.artifacts.iter().map(String::as_str));
        entries.push(&log_name);

        let archive_path = self.dir.join(self.tool.archive_name());
        write_archive(&archive_path, &self.dir, &entries)?;

        log::debug!(
            "Sealed {} with {} entries",
            archive_path.display(),
            entries.len()
        );
        Ok(archive_path)
    }
}

fn write_archive(archive_path: &Path, dir: &Path, entries: &[&str]) -> Result<(), StorageError> {
    let archive_err = |message: String| StorageError::Archive {
        path: archive_path.to_path_buf(),
        message,
    };

    let file = File::create(archive_path).map_err(|e| StorageError::WriteFile {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);

    for name in entries {
        let path = dir.join(name);
        let content = std::fs::read(&path).map_err(|e| StorageError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(*name, options)
            .map_err(|e| archive_err(e.to_string()))?;
        zip.write_all(&content)
            .map_err(|e| archive_err(e.to_string()))?;
    }

    zip.finish().map_err(|e| archive_err(e.to_string()))?;
    Ok(())
}
