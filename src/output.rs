use anyhow::anyhow;
use formatx::formatx;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Destination for CSV reports, keyed by report (a room id or "summary").
pub trait Output: Debug {
    fn writer_for_report_key(&self, report_key: &str) -> anyhow::Result<impl Write>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Writes one file per report key into a directory, naming files through a
/// `{}` template such as `"{}_runtime_results.csv"`.
#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }
}

impl Output for FileOutput {
    fn writer_for_report_key(&self, report_key: &str) -> anyhow::Result<impl Write> {
        let file_name = formatx!(&self.file_template, report_key)
            .map_err(|error| anyhow!("bad report file template: {error}"))?;
        Ok(BufWriter::new(File::create(
            self.directory_path.join(file_name),
        )?))
    }
}

impl Output for &FileOutput {
    fn writer_for_report_key(&self, report_key: &str) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_report_key(self, report_key)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_report_key(&self, _report_key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}
