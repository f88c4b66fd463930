//! Remote special-day registry client.

use async_trait::async_trait;
use chrono::NaiveDate;
use mission_core::{RegistryConfig, RestDayKind};
use serde::{Deserialize, Serialize};

/// Errors from the remote special-day registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry returned status {0}")]
    Status(u16),

    #[error("Failed to decode registry response: {0}")]
    Decode(String),
}

/// One special-day entry from the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialDay {
    pub date: NaiveDate,
    pub name: String,
    pub kind: RestDayKind,
}

/// Source of special-day entries, queried one (year, month) at a time.
#[async_trait]
pub trait SpecialDayRegistry: Send + Sync {
    /// Fetch every special day registered for the given month.
    ///
    /// An empty vec is a valid answer (no special days that month) and is
    /// distinct from an error (registry unreachable or malformed).
    async fn fetch_month(&self, year: i32, month: u32) -> Result<Vec<SpecialDay>, RegistryError>;
}

// ── HTTP implementation ─────────────────────────────────────────────

/// Wire format: `GET {base}/special-days?year=Y&month=M` returns
/// `{"items": [{"date": "2026-01-01", "name": "...", "kind": "public_holiday"}]}`.
#[derive(Debug, Deserialize)]
struct MonthResponse {
    items: Vec<WireSpecialDay>,
}

#[derive(Debug, Deserialize)]
struct WireSpecialDay {
    date: String,
    name: String,
    kind: WireKind,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireKind {
    PublicHoliday,
    SubstituteHoliday,
    TemporaryHoliday,
}

impl From<WireKind> for RestDayKind {
    fn from(kind: WireKind) -> Self {
        match kind {
            WireKind::PublicHoliday => RestDayKind::PublicHoliday,
            WireKind::SubstituteHoliday => RestDayKind::SubstituteHoliday,
            WireKind::TemporaryHoliday => RestDayKind::TemporaryHoliday,
        }
    }
}

/// HTTP client for the special-day registry, with a bounded request timeout.
#[derive(Debug)]
pub struct HttpRegistry {
    base_url: String,
    service_key: Option<String>,
    client: reqwest::Client,
}

impl HttpRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            client,
        })
    }
}

#[async_trait]
impl SpecialDayRegistry for HttpRegistry {
    async fn fetch_month(&self, year: i32, month: u32) -> Result<Vec<SpecialDay>, RegistryError> {
        let url = format!("{}/special-days", self.base_url);
        let mut query: Vec<(&str, String)> =
            vec![("year", year.to_string()), ("month", month.to_string())];
        if let Some(key) = &self.service_key {
            query.push(("serviceKey", key.clone()));
        }

        let response = self.client.get(&url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status(status.as_u16()));
        }

        let body: MonthResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::Decode(e.to_string()))?;

        let mut days = Vec::with_capacity(body.items.len());
        for item in body.items {
            let date = item
                .date
                .parse::<NaiveDate>()
                .map_err(|e| RegistryError::Decode(format!("bad date '{}': {e}", item.date)))?;
            days.push(SpecialDay {
                date,
                name: item.name,
                kind: item.kind.into(),
            });
        }
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_kind_maps_to_rest_day_kind() {
        assert_eq!(
            RestDayKind::from(WireKind::PublicHoliday),
            RestDayKind::PublicHoliday
        );
        assert_eq!(
            RestDayKind::from(WireKind::SubstituteHoliday),
            RestDayKind::SubstituteHoliday
        );
        assert_eq!(
            RestDayKind::from(WireKind::TemporaryHoliday),
            RestDayKind::TemporaryHoliday
        );
    }

    #[test]
    fn month_response_decodes() {
        let json = r#"{"items": [{"date": "2026-01-01", "name": "New Year's Day", "kind": "public_holiday"}]}"#;
        let body: MonthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.items.len(), 1);
        assert_eq!(body.items[0].date, "2026-01-01");
    }
}
