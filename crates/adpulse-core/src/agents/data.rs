//! Data stage - load the advertising export and build aggregate views
//!
//! Produces four views of the input:
//! - the raw table (header + rows, file order)
//! - a daily series (grouped by date, ascending)
//! - a campaign rollup (grouped by campaign_name)
//! - the low-CTR subset (rows with ctr below the configured threshold)
//!
//! Volume columns are summed and rate columns (ctr, roas) are averaged.
//! Nulls are skipped in both.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::events::{EventLevel, EventSink};
use crate::models::{
    columns, AdRecord, AdTable, Aggregate, CampaignRollup, CampaignSummary, DailyPoint,
    DataSummary, StageKind,
};
use crate::retry::with_retry;
use crate::schema::validate_columns;

/// Resolve the input path from config
///
/// With `use_sample_data` the bundled sample is used; otherwise the path is
/// read from the environment variable named by `paths.data_csv_env`
/// (empty when unset).
pub fn resolve_data_path<F>(config: &PipelineConfig, lookup_env: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    if config.use_sample_data {
        config.paths.sample_csv.clone()
    } else {
        PathBuf::from(lookup_env(&config.paths.data_csv_env).unwrap_or_default())
    }
}

/// Loads the dataset and derives the aggregate views
pub struct DataAgent<'a> {
    config: &'a PipelineConfig,
    sink: &'a dyn EventSink,
}

impl<'a> DataAgent<'a> {
    pub fn new(config: &'a PipelineConfig, sink: &'a dyn EventSink) -> Self {
        Self { config, sink }
    }

    /// Resolve the input path from config and the process environment, then load
    pub fn run(&self) -> Result<DataSummary> {
        let path = resolve_data_path(self.config, |name| std::env::var(name).ok());
        self.load(&path)
    }

    /// Load and summarize the CSV at `path`
    pub fn load(&self, path: &Path) -> Result<DataSummary> {
        let stage = StageKind::Data.as_str();

        if path.as_os_str().is_empty() || !path.exists() {
            self.sink.emit(
                stage,
                "source_not_found",
                EventLevel::Error,
                json!({ "path": path.display().to_string() }),
            );
            return Err(Error::SourceNotFound(format!(
                "CSV not found at {}",
                path.display()
            )));
        }

        let (raw, input_sha256) =
            with_retry(&self.config.retry, self.sink, stage, "load_csv", |attempt| {
                debug!(path = %path.display(), attempt, "Reading CSV");
                read_table(path)
            })?;

        validate_columns(&raw.columns, &self.config.paths.schema_json, self.sink, stage);

        let by_date = daily_series(&raw.rows);
        let by_campaign = campaign_rollup(&raw);
        let low_ctr_ads = low_ctr_rows(&raw.rows, self.config.metrics.low_ctr_threshold);

        info!(
            rows = raw.len(),
            days = by_date.len(),
            campaigns = by_campaign.len(),
            low_ctr = low_ctr_ads.len(),
            "Loaded {}",
            path.display()
        );

        Ok(DataSummary {
            raw,
            by_date,
            by_campaign,
            low_ctr_ads,
            source: path.to_path_buf(),
            input_sha256,
        })
    }
}

/// Read the file and parse it, returning the table and its SHA-256
fn read_table(path: &Path) -> Result<(AdTable, String)> {
    let bytes = fs::read(path)?;
    let digest = hex::encode(Sha256::digest(&bytes));
    let table = parse_table(bytes.as_slice())?;
    Ok((table, digest))
}

/// Positions of the known columns within the header
struct ColumnIndex {
    positions: HashMap<&'static str, usize>,
}

impl ColumnIndex {
    fn new(headers: &StringRecord) -> Self {
        let positions = columns::ALL
            .into_iter()
            .filter_map(|name| headers.iter().position(|h| h == name).map(|i| (name, i)))
            .collect();
        Self { positions }
    }

    fn cell<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.positions.get(name).and_then(|&i| record.get(i))
    }

    /// Cell text exactly as written; only an empty cell is null
    fn text(&self, record: &StringRecord, name: &str) -> Option<String> {
        self.cell(record, name)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    }

    fn number(&self, record: &StringRecord, name: &str, row: usize) -> Result<Option<f64>> {
        let Some(raw) = self.cell(record, name) else {
            return Ok(None);
        };
        parse_metric(raw).map_err(|_| {
            Error::InvalidData(format!(
                "Column '{}' row {}: cannot convert '{}' to a number",
                name, row, raw
            ))
        })
    }
}

/// Parse CSV content into an [`AdTable`]
///
/// Columns missing from the header produce nulls. Dates that can't be
/// parsed become null; numbers that can't be parsed are an error.
pub fn parse_table<R: std::io::Read>(reader: R) -> Result<AdTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let index = ColumnIndex::new(&headers);
    let mut rows = Vec::new();

    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        // 1-based, counting the header line
        let row = i + 2;

        rows.push(AdRecord {
            date: index.cell(&record, columns::DATE).and_then(parse_date),
            campaign_name: index.text(&record, columns::CAMPAIGN_NAME),
            audience_type: index.text(&record, columns::AUDIENCE_TYPE),
            creative_message: index.text(&record, columns::CREATIVE_MESSAGE),
            spend: index.number(&record, columns::SPEND, row)?,
            impressions: index.number(&record, columns::IMPRESSIONS, row)?,
            clicks: index.number(&record, columns::CLICKS, row)?,
            purchases: index.number(&record, columns::PURCHASES, row)?,
            revenue: index.number(&record, columns::REVENUE, row)?,
            ctr: index.number(&record, columns::CTR, row)?,
            roas: index.number(&record, columns::ROAS, row)?,
        });
    }

    debug!("Parsed {} ad rows", rows.len());

    Ok(AdTable {
        columns: headers.iter().map(str::to_string).collect(),
        rows,
    })
}

/// Parse a date string in various common formats
///
/// Returns None rather than failing on anything unrecognized.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%m-%d-%Y", // 01-15-2024
        "%d/%m/%Y", // 15/01/2024 (European)
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Parse a numeric cell, stripping currency symbols and thousands separators
///
/// Empty cells are null.
pub fn parse_metric(s: &str) -> Result<Option<f64>> {
    let cleaned = s.trim().replace(['$', ','], "");
    if cleaned.is_empty() {
        return Ok(None);
    }

    cleaned
        .parse::<f64>()
        .map(Some)
        .map_err(|_| Error::InvalidData(format!("Unable to parse number: {}", s)))
}

/// Running sums and means for one group
#[derive(Debug, Default)]
struct Accumulator {
    spend: f64,
    impressions: f64,
    clicks: f64,
    purchases: f64,
    revenue: f64,
    ctr_sum: f64,
    ctr_count: usize,
    roas_sum: f64,
    roas_count: usize,
}

impl Accumulator {
    fn add(&mut self, record: &AdRecord) {
        self.spend += record.spend.unwrap_or(0.0);
        self.impressions += record.impressions.unwrap_or(0.0);
        self.clicks += record.clicks.unwrap_or(0.0);
        self.purchases += record.purchases.unwrap_or(0.0);
        self.revenue += record.revenue.unwrap_or(0.0);
        if let Some(ctr) = record.ctr {
            self.ctr_sum += ctr;
            self.ctr_count += 1;
        }
        if let Some(roas) = record.roas {
            self.roas_sum += roas;
            self.roas_count += 1;
        }
    }

    fn finish(&self) -> Aggregate {
        let mean = |sum: f64, count: usize| (count > 0).then(|| sum / count as f64);
        Aggregate {
            spend: self.spend,
            impressions: self.impressions,
            clicks: self.clicks,
            ctr: mean(self.ctr_sum, self.ctr_count),
            purchases: self.purchases,
            revenue: self.revenue,
            roas: mean(self.roas_sum, self.roas_count),
        }
    }
}

/// Group rows by date, ascending; rows without a date form the first group
pub fn daily_series(rows: &[AdRecord]) -> Vec<DailyPoint> {
    let mut groups: BTreeMap<Option<NaiveDate>, Accumulator> = BTreeMap::new();
    for record in rows {
        groups.entry(record.date).or_default().add(record);
    }

    groups
        .into_iter()
        .map(|(date, acc)| DailyPoint {
            date,
            metrics: acc.finish(),
        })
        .collect()
}

/// Group rows by campaign_name, in order of first appearance
pub fn campaign_rollup(table: &AdTable) -> CampaignRollup {
    let mut order: Vec<(Option<String>, Accumulator)> = Vec::new();
    let mut index: HashMap<Option<String>, usize> = HashMap::new();

    for record in &table.rows {
        let slot = *index
            .entry(record.campaign_name.clone())
            .or_insert_with(|| {
                order.push((record.campaign_name.clone(), Accumulator::default()));
                order.len() - 1
            });
        order[slot].1.add(record);
    }

    CampaignRollup {
        campaigns: order
            .into_iter()
            .map(|(campaign_name, acc)| CampaignSummary {
                campaign_name,
                metrics: acc.finish(),
            })
            .collect(),
        has_spend: table.has_column(columns::SPEND),
    }
}

/// Rows whose ctr is strictly below `threshold`, source order
pub fn low_ctr_rows(rows: &[AdRecord], threshold: f64) -> Vec<AdRecord> {
    rows.iter()
        .filter(|r| r.ctr.is_some_and(|ctr| ctr < threshold))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventLog;
    use crate::retry::RetryPolicy;
    use std::time::Duration;

    const HEADER: &str = "date,campaign_name,audience_type,creative_message,spend,impressions,clicks,purchases,revenue,ctr,roas";

    fn sample_csv() -> String {
        format!(
            "{HEADER}
2024-03-02,Spring,broad,Fresh looks,100,10000,150,5,250,0.015,2.5
2024-03-01,Spring,lookalike,Comfy fit,50,8000,40,1,40,0.005,0.8
2024-03-01,Clearance,,Last chance,30,6000,30,0,0,0.005,0.0
2024-03-02,Clearance,retargeting,,20,2000,30,2,60,0.015,3.0
"
        )
    }

    fn test_config(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.paths.schema_json = dir.join("schema.json");
        config.retry = RetryPolicy::new(2, Duration::ZERO);
        config
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_date("2024-01-15"), expected);
        assert_eq!(parse_date("01/15/2024"), expected);
        assert_eq!(parse_date("2024-01-15 08:30:00"), expected);
        assert_eq!(parse_date("2024-01-15T08:30:00Z"), expected);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!(parse_metric("$1,234.56").unwrap(), Some(1234.56));
        assert_eq!(parse_metric(" 0.015 ").unwrap(), Some(0.015));
        assert_eq!(parse_metric("").unwrap(), None);
        assert!(parse_metric("abc").is_err());
    }

    #[test]
    fn test_parse_table() {
        let table = parse_table(sample_csv().as_bytes()).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.columns.len(), 11);
        assert!(table.has_column("roas"));

        let first = &table.rows[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(first.campaign_name.as_deref(), Some("Spring"));
        assert_eq!(first.spend, Some(100.0));
        assert_eq!(first.ctr, Some(0.015));

        // Empty cells are null
        assert_eq!(table.rows[2].audience_type, None);
        assert_eq!(table.rows[3].creative_message, None);
    }

    #[test]
    fn test_parse_table_keeps_text_as_written() {
        let csv = "date,campaign_name,audience_type,creative_message,spend,ctr,roas\n\
                   2024-03-01, Spring ,  ,  Padded copy ,10, 0.004 ,1.0\n";
        let table = parse_table(csv.as_bytes()).unwrap();
        let row = &table.rows[0];

        assert_eq!(row.campaign_name.as_deref(), Some(" Spring "));
        assert_eq!(row.audience_type.as_deref(), Some("  "));
        assert_eq!(row.creative_message.as_deref(), Some("  Padded copy "));
        // Numbers and dates still tolerate padding
        assert_eq!(row.ctr, Some(0.004));
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_header_names_match_exactly() {
        let csv = "date, spend,ctr\n2024-03-01,10,0.01\n";
        let table = parse_table(csv.as_bytes()).unwrap();
        assert!(table.has_column(" spend"));
        assert!(!table.has_column("spend"));
        assert_eq!(table.rows[0].spend, None);
        assert_eq!(table.rows[0].ctr, Some(0.01));
    }

    #[test]
    fn test_parse_table_unparsable_date_is_null() {
        let csv = "date,spend,ctr,roas\nsometime,10,0.01,1.0\n2024-03-01,5,0.02,2.0\n";
        let table = parse_table(csv.as_bytes()).unwrap();
        assert_eq!(table.rows[0].date, None);
        assert_eq!(table.rows[1].date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_parse_table_bad_number_is_error() {
        let csv = "date,spend,ctr,roas\n2024-03-01,lots,0.01,1.0\n";
        let err = parse_table(csv.as_bytes()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("spend"), "{}", msg);
        assert!(msg.contains("row 2"), "{}", msg);
    }

    #[test]
    fn test_missing_column_yields_nulls() {
        let csv = "date,campaign_name,ctr,roas\n2024-03-01,A,0.01,1.0\n";
        let table = parse_table(csv.as_bytes()).unwrap();
        assert_eq!(table.rows[0].spend, None);
        assert!(!table.has_column("spend"));

        let rollup = campaign_rollup(&table);
        assert!(!rollup.has_spend);
        assert_eq!(rollup.campaigns[0].metrics.spend, 0.0);
    }

    #[test]
    fn test_daily_series_sorted_and_aggregated() {
        let table = parse_table(sample_csv().as_bytes()).unwrap();
        let daily = daily_series(&table.rows);

        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(daily[1].date, NaiveDate::from_ymd_opt(2024, 3, 2));

        let day1 = &daily[0].metrics;
        assert_eq!(day1.spend, 80.0);
        assert_eq!(day1.impressions, 14000.0);
        assert_eq!(day1.ctr, Some(0.005));
        assert_eq!(day1.roas, Some(0.4));

        let day2 = &daily[1].metrics;
        assert_eq!(day2.revenue, 310.0);
        assert_eq!(day2.roas, Some(2.75));
    }

    #[test]
    fn test_daily_series_null_dates_first() {
        let rows = vec![
            AdRecord {
                date: NaiveDate::from_ymd_opt(2024, 3, 1),
                roas: Some(1.0),
                ..Default::default()
            },
            AdRecord {
                date: None,
                roas: Some(2.0),
                ..Default::default()
            },
        ];
        let daily = daily_series(&rows);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].date, None);
    }

    #[test]
    fn test_mean_skips_nulls() {
        let rows = vec![
            AdRecord {
                ctr: Some(0.02),
                ..Default::default()
            },
            AdRecord {
                ctr: None,
                ..Default::default()
            },
        ];
        let daily = daily_series(&rows);
        assert_eq!(daily[0].metrics.ctr, Some(0.02));
        assert_eq!(daily[0].metrics.roas, None);
    }

    #[test]
    fn test_campaign_rollup_first_appearance_order() {
        let table = parse_table(sample_csv().as_bytes()).unwrap();
        let rollup = campaign_rollup(&table);

        assert!(rollup.has_spend);
        let names: Vec<_> = rollup
            .campaigns
            .iter()
            .map(|c| c.campaign_name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["Spring", "Clearance"]);
        assert_eq!(rollup.campaigns[0].metrics.spend, 150.0);
        assert_eq!(rollup.campaigns[1].metrics.roas, Some(1.5));
        assert_eq!(rollup.total_spend(), 200.0);
    }

    #[test]
    fn test_low_ctr_rows_strict_and_ordered() {
        let table = parse_table(sample_csv().as_bytes()).unwrap();

        let low = low_ctr_rows(&table.rows, 0.01);
        assert_eq!(low.len(), 2);
        assert_eq!(low[0].creative_message.as_deref(), Some("Comfy fit"));
        assert_eq!(low[1].campaign_name.as_deref(), Some("Clearance"));

        // Strictly below: a threshold equal to the ctr excludes the row
        assert!(low_ctr_rows(&table.rows, 0.005).is_empty());
    }

    #[test]
    fn test_resolve_data_path() {
        let mut config = PipelineConfig::default();
        assert_eq!(
            resolve_data_path(&config, |_| None),
            PathBuf::from("data/sample_fb_ads.csv")
        );

        config.use_sample_data = false;
        config.paths.data_csv_env = "ADS_EXPORT".to_string();
        let path = resolve_data_path(&config, |name| {
            (name == "ADS_EXPORT").then(|| "/data/ads.csv".to_string())
        });
        assert_eq!(path, PathBuf::from("/data/ads.csv"));

        assert_eq!(resolve_data_path(&config, |_| None), PathBuf::new());
    }

    #[test]
    fn test_load_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let log = MemoryEventLog::new();

        let result = DataAgent::new(&config, &log).load(&dir.path().join("missing.csv"));
        assert!(matches!(result, Err(Error::SourceNotFound(_))));

        let events = log.find("source_not_found");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, EventLevel::Error);
        // Not retried
        assert!(!log.contains("load_csv_attempt_1_failed"));
    }

    #[test]
    fn test_load_empty_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let log = MemoryEventLog::new();

        let result = DataAgent::new(&config, &log).load(Path::new(""));
        assert!(matches!(result, Err(Error::SourceNotFound(_))));
    }

    #[test]
    fn test_load_summarizes() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("ads.csv");
        fs::write(&csv_path, sample_csv()).unwrap();
        let config = test_config(dir.path());
        let log = MemoryEventLog::new();

        let summary = DataAgent::new(&config, &log).load(&csv_path).unwrap();
        assert_eq!(summary.raw.len(), 4);
        assert_eq!(summary.by_date.len(), 2);
        assert_eq!(summary.by_campaign.len(), 2);
        assert_eq!(summary.low_ctr_ads.len(), 2);
        assert_eq!(summary.source, csv_path);
        assert_eq!(summary.input_sha256.len(), 64);

        // No schema descriptor in the temp dir: reported, not fatal
        assert!(log.contains("schema_file_missing"));
    }

    #[test]
    fn test_load_retries_then_fails_on_bad_data() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("ads.csv");
        fs::write(&csv_path, "date,spend,ctr,roas\n2024-03-01,x,0.1,1\n").unwrap();
        let config = test_config(dir.path());
        let log = MemoryEventLog::new();

        let result = DataAgent::new(&config, &log).load(&csv_path);
        assert!(matches!(result, Err(Error::InvalidData(_))));
        assert!(log.contains("load_csv_attempt_1_failed"));
        assert!(log.contains("load_csv_attempt_2_failed"));
        assert!(log.contains("load_csv_failed_all_retries"));
    }
}
