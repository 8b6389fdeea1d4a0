use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// The outcome of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    /// The average loss over the test set.
    pub test_loss: f32,
    /// The test accuracy, as a percentage.
    pub accuracy: f32,
    /// The stationarity violation of the last step of the epoch, when measured.
    pub violation: Option<f32>,
}

/// Every epoch of a single run, keyed by its learning rate and algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub lr: f32,
    /// What was run, e.g. `SpiderBoost`.
    pub label: String,
    /// Short form of `label` used for columns and file names, e.g. `sb`.
    pub tag: String,
    pub epochs: Vec<EpochReport>,
}

/// Formats a learning rate the way report files are named: `1e-4`, `1e-6`, `0`.
pub fn lr_label(lr: f32) -> String {
    if lr == 0. {
        "0".to_string()
    } else {
        format!("{lr:e}")
    }
}

impl RunReport {
    pub fn new(lr: f32, label: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            lr,
            label: label.into(),
            tag: tag.into(),
            epochs: Vec::new(),
        }
    }

    pub fn push(&mut self, epoch: EpochReport) {
        self.epochs.push(epoch);
    }

    /// The file name of this report without its extension, `<lr><tag>`.
    pub fn file_stem(&self) -> String {
        format!("{}{}", lr_label(self.lr), self.tag)
    }

    /// Writes the report as a table with an index column and the columns `<tag>_l`, `<tag>_a`
    /// and `<tag>_v`, one row per epoch. Missing violations are left empty.
    pub fn to_csv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let tag = &self.tag;
        writeln!(writer, ",{tag}_l,{tag}_a,{tag}_v")?;

        for (i, epoch) in self.epochs.iter().enumerate() {
            let violation = epoch.violation.map(|v| v.to_string()).unwrap_or_default();
            writeln!(
                writer,
                "{i},{},{},{violation}",
                epoch.test_loss, epoch.accuracy
            )?;
        }

        writer.flush()
    }

    /// Writes `<dir>/<lr><tag>.csv`, creating `dir` if needed.
    ///
    /// # Returns
    /// The path of the written file.
    pub fn write_csv<P: AsRef<Path>>(&self, dir: P) -> io::Result<PathBuf> {
        let path = self.path_in(dir.as_ref(), "csv")?;
        self.to_csv(BufWriter::new(File::create(&path)?))?;
        Ok(path)
    }

    /// Writes `<dir>/<lr><tag>.json`, creating `dir` if needed.
    pub fn write_json<P: AsRef<Path>>(&self, dir: P) -> io::Result<PathBuf> {
        let path = self.path_in(dir.as_ref(), "json")?;
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(path)
    }

    fn path_in(&self, dir: &Path, extension: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        Ok(dir.join(format!("{}.{extension}", self.file_stem())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        let mut report = RunReport::new(1e-4, "SpiderBoost", "sb");
        report.push(EpochReport {
            epoch: 0,
            test_loss: 0.5,
            accuracy: 81.25,
            violation: Some(2.0),
        });
        report.push(EpochReport {
            epoch: 1,
            test_loss: 0.25,
            accuracy: 90.0,
            violation: None,
        });
        report
    }

    #[test]
    fn learning_rates_format_like_file_names() {
        assert_eq!(lr_label(1e-4), "1e-4");
        assert_eq!(lr_label(1e-6), "1e-6");
        assert_eq!(lr_label(0.0), "0");
        assert_eq!(report().file_stem(), "1e-4sb");
    }

    #[test]
    fn csv_has_an_index_column() {
        let mut out = Vec::new();
        report().to_csv(&mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            ",sb_l,sb_a,sb_v\n0,0.5,81.25,2\n1,0.25,90,\n"
        );
    }

    #[test]
    fn json_round_trips() {
        let dir = std::env::temp_dir().join(format!("proxquant-report-{}", std::process::id()));
        let path = report().write_json(&dir).unwrap();

        let read: RunReport = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(read, report());
        assert_eq!(path.file_name().unwrap(), "1e-4sb.json");

        fs::remove_dir_all(dir).unwrap();
    }
}
