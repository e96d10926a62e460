//! Data export
//!
//! Renders the displayed plot into a downloadable file and hands it to an
//! [`ExportSink`]. The routine is picked by plot type:
//! - `featureSequences` -> FASTA
//! - `table` -> tab-separated indicator table
//! - `heatmap`, `bubbleHeatmap`, `barChart` -> CSV

use crate::error::ExportError;
use crate::plot::{BarPayload, MatrixPayload, PlotData, PlotState, PlotType, SequencePayload, TablePayload};
use std::path::{Path, PathBuf};

/// Export routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    /// Comma-separated values
    Csv,
    /// Tab-separated table
    Table,
    /// FASTA sequences
    Fasta,
}

impl ExportKind {
    /// Routine for a plot type, if it has one
    #[must_use]
    pub fn for_plot(plot_type: PlotType) -> Option<Self> {
        match plot_type {
            PlotType::Heatmap | PlotType::BubbleHeatmap | PlotType::BarChart => Some(Self::Csv),
            PlotType::Table => Some(Self::Table),
            PlotType::FeatureSequences => Some(Self::Fasta),
            PlotType::ShowOrganisms => None,
        }
    }

    /// File extension
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Table => "tsv",
            Self::Fasta => "fasta",
        }
    }
}

/// A rendered file ready to be saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    /// Suggested file name
    pub file_name: String,
    /// File contents
    pub contents: String,
}

/// Where exported files go
pub trait ExportSink: Send + Sync {
    /// Save one file
    ///
    /// # Errors
    /// Any failure to persist the file
    fn save(&self, file: &ExportFile) -> Result<(), ExportError>;
}

/// Writes exports into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create sink rooted at `dir`
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirectorySink {
    fn save(&self, file: &ExportFile) -> Result<(), ExportError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&file.file_name);
        std::fs::write(&path, &file.contents)?;
        tracing::info!("Exported {}", path.display());
        Ok(())
    }
}

/// Render the displayed plot with the routine its plot type selects
///
/// # Errors
/// `ExportError::Unsupported` when the plot type has no routine or the
/// payload does not match it, writer errors otherwise
pub fn render(state: &PlotState) -> Result<ExportFile, ExportError> {
    let kind = ExportKind::for_plot(state.plot_type)
        .ok_or_else(|| ExportError::Unsupported(state.plot_type.to_string()))?;

    let contents = match (kind, &state.data) {
        (ExportKind::Csv, PlotData::Average(m) | PlotData::FractionDetected(m)) => {
            matrix_csv(m, state.has_log)?
        }
        (ExportKind::Csv, PlotData::Bar(bar)) => bar_csv(bar)?,
        (ExportKind::Table, PlotData::Table(table)) => table_tsv(table)?,
        (ExportKind::Fasta, PlotData::Sequences(seqs)) => fasta(seqs),
        _ => return Err(ExportError::Unsupported(state.plot_type.to_string())),
    };

    Ok(ExportFile {
        file_name: file_name(state, kind),
        contents,
    })
}

/// Render and save in one step
///
/// # Errors
/// As [`render`], plus whatever the sink reports
pub fn export(state: &PlotState, sink: &dyn ExportSink) -> Result<ExportFile, ExportError> {
    let file = render(state)?;
    sink.save(&file)?;
    Ok(file)
}

/// Export whatever is displayed, if anything
///
/// # Errors
/// `ExportError::NothingDisplayed` without a plot, otherwise as [`export`]
pub fn export_displayed(
    state: Option<&PlotState>,
    sink: &dyn ExportSink,
) -> Result<ExportFile, ExportError> {
    let state = state.ok_or(ExportError::NothingDisplayed)?;
    export(state, sink)
}

fn file_name(state: &PlotState, kind: ExportKind) -> String {
    let mut name = state.plot_type.to_string();
    for part in [Some(state.organism.as_str()), state.organ.as_deref()]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
    {
        name.push('_');
        name.push_str(&file_safe(part));
    }
    format!("{name}.{}", kind.extension())
}

/// Keep a name part inside the sink directory
fn file_safe(part: &str) -> String {
    part.replace("..", "_")
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Heatmaps write one block under an unlabeled header. Bubble heatmaps
/// write an `average` block followed by a `fraction_detected` block.
fn matrix_csv(matrix: &MatrixPayload, has_log: bool) -> Result<String, ExportError> {
    let values = if has_log {
        matrix.log_average().0
    } else {
        matrix.average.clone()
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    match &matrix.fractions {
        None => write_block(&mut writer, "", &matrix.xaxis, &matrix.yaxis, &values)?,
        Some(fractions) => {
            write_block(&mut writer, "average", &matrix.xaxis, &matrix.yaxis, &values)?;
            write_block(
                &mut writer,
                "fraction_detected",
                &matrix.xaxis,
                &matrix.yaxis,
                fractions,
            )?;
        }
    }
    finish(writer)
}

fn write_block(
    writer: &mut csv::Writer<Vec<u8>>,
    label: &str,
    xaxis: &[String],
    yaxis: &[String],
    values: &[Vec<f64>],
) -> Result<(), ExportError> {
    writer.write_record(std::iter::once(label).chain(xaxis.iter().map(String::as_str)))?;
    for (feature, row) in yaxis.iter().zip(values) {
        writer.write_record(
            std::iter::once(feature.clone()).chain(row.iter().map(ToString::to_string)),
        )?;
    }
    Ok(())
}

fn bar_csv(bar: &BarPayload) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["celltype (organ)", bar.value_unit.as_str()])?;
    for (label, value) in bar.celltypes_organ.iter().zip(&bar.average) {
        writer.write_record([label.clone(), value.to_string()])?;
    }
    finish(writer)
}

fn table_tsv(table: &TablePayload) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    writer.write_record(std::iter::once("").chain(table.organs.iter().map(String::as_str)))?;
    for (celltype, row) in table.celltypes.iter().zip(&table.detected) {
        writer.write_record(
            std::iter::once(celltype.as_str())
                .chain(row.iter().map(|&hit| if hit { "1" } else { "0" })),
        )?;
    }
    finish(writer)
}

fn fasta(seqs: &SequencePayload) -> String {
    seqs.features
        .iter()
        .zip(&seqs.sequences)
        .map(|(feature, sequence)| format!(">{feature}\n{sequence}\n"))
        .collect()
}
