use crate::models::Listing;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::info;

/// Destination for a run's ranked listings
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Write the listings and return where they went
    async fn export(&self, listings: &[Listing]) -> Result<PathBuf>;
}

/// Writes `rentals <yyyy-MM-dd HH.mm>.json` into a directory
pub struct JsonExporter {
    dir: PathBuf,
}

impl JsonExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(at: NaiveDateTime) -> String {
        format!("rentals {}.json", at.format("%Y-%m-%d %H.%M"))
    }

    async fn write_at(&self, listings: &[Listing], at: NaiveDateTime) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating output directory {}", self.dir.display()))?;

        let path = self.dir.join(Self::file_name(at));
        let json = serde_json::to_string_pretty(listings)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        info!("💾 Saved {} listings to {}", listings.len(), path.display());
        Ok(path)
    }
}

#[async_trait]
impl Exporter for JsonExporter {
    async fn export(&self, listings: &[Listing]) -> Result<PathBuf> {
        self.write_at(listings, Local::now().naive_local()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use chrono::NaiveDate;
    use serde_json::Value;

    #[test]
    fn test_file_name_format() {
        let at = NaiveDate::from_ymd_opt(2026, 7, 4).unwrap().and_hms_opt(9, 5, 59).unwrap();
        assert_eq!(JsonExporter::file_name(at), "rentals 2026-07-04 09.05.json");
    }

    #[tokio::test]
    async fn test_writes_listings_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path().join("out"));
        let listings = vec![
            Listing::new(Source::Vrbo, "Cheap", "https://a", 1.0, 10.0, 70.0).unwrap(),
            Listing::new(Source::Airbnb, "Dear", "https://b", 2.0, 20.0, 140.0).unwrap(),
        ];

        let path = exporter.export(&listings).await.unwrap();
        assert!(path.starts_with(exporter.dir()));

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let rows = written.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Cheap");
        assert_eq!(rows[0]["source"], "vrbo");
        assert_eq!(rows[1]["total_price"], 140.0);
    }
}
