use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ClassifyResult, SubmissionReport};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &SubmissionReport) -> io::Result<()> {
        Self::print_json(report)
    }

    /// One compact JSON object per line.
    pub fn print_classifications(results: &[ClassifyResult]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for result in results {
            let line = serde_json::to_string(result).map_err(io::Error::other)?;
            stdout.write_all(line.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
        Ok(())
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
