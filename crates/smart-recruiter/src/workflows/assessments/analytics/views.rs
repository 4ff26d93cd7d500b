use std::io::Write;

use serde::{Deserialize, Serialize};

use super::super::domain::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualificationStatus {
    Qualified,
    #[serde(rename = "Not Qualified")]
    NotQualified,
}

impl QualificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            QualificationStatus::Qualified => "Qualified",
            QualificationStatus::NotQualified => "Not Qualified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationEntry {
    pub id: UserId,
    pub name: String,
    pub average_score: f64,
    pub status: QualificationStatus,
}

/// Interviewee qualification rows ordered by id.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct QualificationReport {
    pub entries: Vec<QualificationEntry>,
}

impl QualificationReport {
    pub fn qualified(&self) -> impl Iterator<Item = &QualificationEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.status == QualificationStatus::Qualified)
    }

    /// Write the report as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(["id", "name", "average_score", "status"])?;
        for entry in &self.entries {
            writer.write_record([
                entry.id.to_string(),
                entry.name.clone(),
                format!("{:.2}", entry.average_score),
                entry.status.label().to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenderComposition {
    pub male: usize,
    pub female: usize,
    pub other: usize,
}

impl GenderComposition {
    pub fn total(&self) -> usize {
        self.male + self.female + self.other
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPerformance {
    pub year: i32,
    pub month: u32,
    pub trial: f64,
    pub real: f64,
}

impl MonthlyPerformance {
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}
