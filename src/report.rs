use crate::error::{Error, Result};
use crate::trainer::SweepReport;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Hands a finished sweep to whatever draws the curves. The JSON sink writes the whole report;
/// the CSV sink writes long-format tables that plotting tools can group by sweep value.
pub trait ResultSink {
    fn publish(&mut self, report: &SweepReport) -> Result<()>;
}

/// Writes the report as pretty-printed JSON to a single file.
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> JsonSink {
        JsonSink { path: path.into() }
    }
}

impl ResultSink for JsonSink {
    fn publish(&mut self, report: &SweepReport) -> Result<()> {
        let mut writer = create(&self.path)?;
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.flush().map_err(|source| Error::io(&self.path, source))
    }
}

/// Writes `<prefix>_curves.csv` (one row per run and epoch) and `<prefix>_timing.csv` (one row
/// per run) into a directory.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
    prefix: String,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> CsvSink {
        CsvSink {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn curves_path(&self) -> PathBuf {
        self.dir.join(format!("{}_curves.csv", self.prefix))
    }

    pub fn timing_path(&self) -> PathBuf {
        self.dir.join(format!("{}_timing.csv", self.prefix))
    }
}

impl ResultSink for CsvSink {
    fn publish(&mut self, report: &SweepReport) -> Result<()> {
        let variable = report.variable.label();

        let path = self.curves_path();
        let mut curves = create(&path)?;
        let write_curves = |out: &mut BufWriter<File>| -> std::io::Result<()> {
            writeln!(out, "{variable},epoch,train_cost,test_accuracy")?;
            for run in &report.runs {
                for record in &run.epochs {
                    writeln!(
                        out,
                        "{},{},{},{}",
                        run.value, record.epoch, record.train_cost, record.test_accuracy
                    )?;
                }
            }
            out.flush()
        };
        write_curves(&mut curves).map_err(|source| Error::io(&path, source))?;

        let path = self.timing_path();
        let mut timing = create(&path)?;
        let write_timing = |out: &mut BufWriter<File>| -> std::io::Result<()> {
            writeln!(out, "{variable},mean_update_ms")?;
            for run in &report.runs {
                writeln!(out, "{},{}", run.value, run.mean_update_ms)?;
            }
            out.flush()
        };
        write_timing(&mut timing).map_err(|source| Error::io(&path, source))
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::io(parent, source))?;
    }
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| Error::io(path, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweepVariable;
    use crate::trainer::{EpochRecord, RunResult};

    fn report() -> SweepReport {
        SweepReport {
            variable: SweepVariable::BatchSize,
            runs: vec![
                RunResult {
                    value: 4,
                    batch_size: 4,
                    hidden_width: 10,
                    epochs: vec![
                        EpochRecord {
                            epoch: 0,
                            train_cost: 1.5,
                            test_accuracy: 0.25,
                        },
                        EpochRecord {
                            epoch: 1,
                            train_cost: 1.25,
                            test_accuracy: 0.5,
                        },
                    ],
                    mean_update_ms: 0.125,
                },
                RunResult {
                    value: 8,
                    batch_size: 8,
                    hidden_width: 10,
                    epochs: vec![EpochRecord {
                        epoch: 0,
                        train_cost: 1.0,
                        test_accuracy: 0.75,
                    }],
                    mean_update_ms: 0.25,
                },
            ],
        }
    }

    #[test]
    fn test_json_sink_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        JsonSink::new(&path).publish(&report()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let parsed: SweepReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, report());
        assert!(text.contains("\"batch_size\""));
    }

    #[test]
    fn test_csv_sink_writes_long_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvSink::new(dir.path(), "sat");
        sink.publish(&report()).unwrap();

        let curves = fs::read_to_string(sink.curves_path()).unwrap();
        let lines: Vec<_> = curves.lines().collect();
        assert_eq!(lines[0], "batch_size,epoch,train_cost,test_accuracy");
        assert_eq!(lines[1], "4,0,1.5,0.25");
        assert_eq!(lines[3], "8,0,1,0.75");
        assert_eq!(lines.len(), 4);

        let timing = fs::read_to_string(sink.timing_path()).unwrap();
        assert_eq!(timing, "batch_size,mean_update_ms\n4,0.125\n8,0.25\n");
    }
}
