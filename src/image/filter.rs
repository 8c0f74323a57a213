//! Parsing of the `filter` query parameter.
//!
//! Clients send a JSON object such as
//! `{"from":"2025-01-10","to":"2025-01-12","user_id":"3"}`. Every field is
//! optional; empty strings count as absent and a `user_id` of `"0"` (or `0`)
//! selects every owner.
//!
//! Day bounds are UTC. `from` starts at `00:00:00` of its day and `to`
//! covers its whole day, so the resolved upper bound is midnight of the
//! following day, exclusive.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::FilterError;
use crate::store::{ImageFilter, UserId};

/// Owner id meaning "all owners".
const ALL_OWNERS: i64 = 0;

/// Raw filter as sent by the client.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub user_id: Option<Value>,
}

impl FilterParams {
    /// Parse the raw query parameter. An absent or blank parameter is an
    /// empty filter.
    pub fn parse(raw: Option<&str>) -> Result<Self, FilterError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(raw) => {
                serde_json::from_str(raw).map_err(|e| FilterError::Malformed(e.to_string()))
            }
        }
    }

    /// Resolve into concrete bounds for the metadata store.
    pub fn resolve(&self) -> Result<ImageFilter, FilterError> {
        let from = match non_empty(&self.from) {
            Some(value) => Some(start_of_day("from", parse_day("from", value)?)?),
            None => None,
        };

        let until = match non_empty(&self.to) {
            Some(value) => {
                let day = parse_day("to", value)?;
                let next = day.succ_opt().ok_or_else(|| FilterError::InvalidDate {
                    field: "to",
                    value: value.to_string(),
                })?;
                Some(start_of_day("to", next)?)
            }
            None => None,
        };

        Ok(ImageFilter {
            from,
            until,
            owner_id: resolve_owner(self.user_id.as_ref())?,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_day(field: &'static str, value: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| FilterError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn start_of_day(field: &'static str, day: NaiveDate) -> Result<DateTime<Utc>, FilterError> {
    day.and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .ok_or_else(|| FilterError::InvalidDate {
            field,
            value: day.to_string(),
        })
}

fn resolve_owner(value: Option<&Value>) -> Result<Option<UserId>, FilterError> {
    let id = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| FilterError::InvalidUserId(n.to_string()))?,
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i64>()
                .map_err(|_| FilterError::InvalidUserId(s.to_string()))?
        }
        Some(other) => return Err(FilterError::InvalidUserId(other.to_string())),
    };

    Ok((id != ALL_OWNERS).then_some(id))
}
