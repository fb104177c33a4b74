//! Bank of Korea ECOS statistics client (macro indicators).
//!
//! Fetches one statistic series per request and reduces it to a `KpiValue`:
//! the two most recent observations with their dates and unit. Any network,
//! status or shape failure yields an all-absent `KpiValue` instead of an
//! error, so a dashboard can render whatever subset of indicators succeeded.

use super::provider::DataError;
use crate::config::{ApiKey, StatisticsConfig};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const DATE_COLUMNS: [&str; 3] = ["TIME", "DATE", "TIME_PERIOD"];
const VALUE_COLUMNS: [&str; 2] = ["DATA_VALUE", "VALUE"];
const UNIT_COLUMNS: [&str; 2] = ["UNIT_NAME", "UNIT"];

/// Publication frequency of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cadence {
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "M")]
    Monthly,
    #[serde(rename = "Q")]
    Quarterly,
    #[serde(rename = "A")]
    Annual,
}

impl Cadence {
    pub fn code(self) -> &'static str {
        match self {
            Cadence::Daily => "D",
            Cadence::Monthly => "M",
            Cadence::Quarterly => "Q",
            Cadence::Annual => "A",
        }
    }

    /// Default `(start, end)` window in ECOS date syntax, wide enough that a
    /// sparsely updated series still has two observations.
    ///
    /// Daily: 45 days (`YYYYMMDD`). Monthly: 2 years (`YYYYMM`).
    /// Quarterly: from Q1 six years back (`YYYYQn`). Annual: 15 years (`YYYY`).
    pub fn default_window(self, today: NaiveDate) -> (String, String) {
        match self {
            Cadence::Daily => {
                let start = today - Duration::days(45);
                (
                    start.format("%Y%m%d").to_string(),
                    today.format("%Y%m%d").to_string(),
                )
            }
            Cadence::Monthly => {
                let start = shift_years(today, -2);
                (
                    start.format("%Y%m").to_string(),
                    today.format("%Y%m").to_string(),
                )
            }
            Cadence::Quarterly => {
                let quarter = (today.month() - 1) / 3 + 1;
                (
                    format!("{}Q1", today.year() - 6),
                    format!("{}Q{quarter}", today.year()),
                )
            }
            Cadence::Annual => ((today.year() - 15).to_string(), today.year().to_string()),
        }
    }
}

/// Same calendar date `years` away, Feb 29 clamped to Feb 28.
fn shift_years(date: NaiveDate, years: i32) -> NaiveDate {
    let year = date.year() + years;
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}

/// One named ECOS series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub name: String,
    pub stat_code: String,
    pub cadence: Cadence,
    #[serde(default)]
    pub item_code1: String,
    #[serde(default)]
    pub item_code2: String,
}

impl IndicatorSpec {
    pub fn new(name: &str, stat_code: &str, cadence: Cadence, item_code1: &str) -> Self {
        Self {
            name: name.to_string(),
            stat_code: stat_code.to_string(),
            cadence,
            item_code1: item_code1.to_string(),
            item_code2: String::new(),
        }
    }
}

/// The dashboard's headline indicators.
pub fn default_indicators() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec::new("BOK base rate", "722Y001", Cadence::Monthly, "0101000"),
        IndicatorSpec::new("KRW/USD exchange rate", "731Y001", Cadence::Daily, "0000001"),
        IndicatorSpec::new("GDP growth rate", "902Y015", Cadence::Quarterly, "KOR"),
        IndicatorSpec::new("Unemployment rate", "901Y027", Cadence::Monthly, "I61BC"),
        IndicatorSpec::new("CPI inflation", "901Y009", Cadence::Monthly, "0"),
    ]
}

/// Snapshot of a macro indicator: latest and previous observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiValue {
    pub name: String,
    pub latest: Option<f64>,
    pub previous: Option<f64>,
    pub unit: Option<String>,
    pub latest_date: Option<String>,
    pub previous_date: Option<String>,
}

impl KpiValue {
    /// Every field absent except the name.
    pub fn absent(name: &str) -> Self {
        Self {
            name: name.to_string(),
            latest: None,
            previous: None,
            unit: None,
            latest_date: None,
            previous_date: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.latest.is_none()
    }

    /// Latest minus previous, when both exist.
    pub fn change(&self) -> Option<f64> {
        Some(self.latest? - self.previous?)
    }
}

/// Blocking ECOS client.
pub struct EcosClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: ApiKey,
    lang: String,
    max_rows: u32,
}

impl EcosClient {
    pub fn new(config: &StatisticsConfig, api_key: ApiKey) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DataError::ClientSetup(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            lang: config.lang.clone(),
            max_rows: config.max_rows,
        })
    }

    /// `{base}/{key}/json/{lang}/1/{max_rows}/{stat}/{cadence}/{start}/{end}/{item1}/{item2}`
    pub fn build_url(&self, spec: &IndicatorSpec, start: &str, end: &str) -> String {
        format!(
            "{}/{}/json/{}/1/{}/{}/{}/{}/{}/{}/{}",
            self.base_url,
            self.api_key.expose(),
            self.lang,
            self.max_rows,
            spec.stat_code,
            spec.cadence.code(),
            start,
            end,
            spec.item_code1,
            spec.item_code2,
        )
    }

    /// Fetch one indicator. `window` overrides the cadence default.
    pub fn fetch_indicator(&self, spec: &IndicatorSpec, window: Option<(String, String)>) -> KpiValue {
        let (start, end) =
            window.unwrap_or_else(|| spec.cadence.default_window(chrono::Local::now().date_naive()));

        match self.fetch_json(spec, &start, &end) {
            Ok(body) => {
                let kpi = kpi_from_response(&spec.name, &body);
                if kpi.is_absent() {
                    debug!(indicator = %spec.name, "no usable rows");
                }
                kpi
            }
            Err(e) => {
                warn!(indicator = %spec.name, error = %e, "indicator fetch failed");
                KpiValue::absent(&spec.name)
            }
        }
    }

    /// Fetch every indicator in order; failures come back absent.
    pub fn fetch_all(&self, specs: &[IndicatorSpec]) -> Vec<KpiValue> {
        specs.iter().map(|spec| self.fetch_indicator(spec, None)).collect()
    }

    fn fetch_json(&self, spec: &IndicatorSpec, start: &str, end: &str) -> Result<Value, DataError> {
        let url = self.build_url(spec, start, end);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {}", spec.stat_code)));
        }

        resp.json()
            .map_err(|e| DataError::ResponseFormatChanged(e.without_url().to_string()))
    }
}

/// Reduce an ECOS `StatisticSearch` body to a `KpiValue`.
///
/// Date column: first of `TIME`, `DATE`, `TIME_PERIOD` present in the rows.
/// Value column: first of `DATA_VALUE`, `VALUE`. Values are coerced to
/// numbers; rows with a missing date or unparseable value are dropped; the
/// rest are sorted by date. The unit comes from the last raw row.
pub fn kpi_from_response(name: &str, body: &Value) -> KpiValue {
    let rows: Vec<&Map<String, Value>> = body
        .get("StatisticSearch")
        .and_then(|block| block.get("row"))
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default();
    if rows.is_empty() {
        return KpiValue::absent(name);
    }

    let first_present = |candidates: &[&'static str]| {
        candidates
            .iter()
            .copied()
            .find(|col| rows.iter().any(|row| row.contains_key(*col)))
    };
    let (Some(date_col), Some(value_col)) = (first_present(&DATE_COLUMNS[..]), first_present(&VALUE_COLUMNS[..]))
    else {
        return KpiValue::absent(name);
    };

    let mut series: Vec<(String, f64)> = rows
        .iter()
        .filter_map(|row| {
            let date = row.get(date_col).and_then(cell_text)?;
            let value = row.get(value_col).and_then(cell_number)?;
            Some((date, value))
        })
        .collect();
    series.sort_by(|a, b| a.0.cmp(&b.0));

    let Some((latest_date, latest)) = series.last().cloned() else {
        return KpiValue::absent(name);
    };
    let previous = series.len().checked_sub(2).map(|i| series[i].clone());

    let unit = first_present(&UNIT_COLUMNS[..])
        .and_then(|col| rows.last().and_then(|row| row.get(col)))
        .and_then(cell_text);

    KpiValue {
        name: name.to_string(),
        latest: Some(latest),
        previous: previous.as_ref().map(|p| p.1),
        unit,
        latest_date: Some(latest_date),
        previous_date: previous.map(|p| p.0),
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn cell_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
