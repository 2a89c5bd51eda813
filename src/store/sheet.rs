use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{
    Client, Response,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::StoreError;

use super::{AppendOutcome, BackupHandle, COLUMNS, MAX_RESULT, RecordStore, RollEvent};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Roll log kept in one tab of a remote spreadsheet, driven through the
/// sheet service's values API. Rows follow [`COLUMNS`]; the first row is the
/// header and is restored at connect time if it was lost or edited.
#[derive(Debug)]
pub struct SheetStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    tab: String,
    sheet_id: u32,
    write_lock: Mutex<()>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetStore {
    pub async fn connect(
        base_url: &str,
        spreadsheet_id: &str,
        tab: &str,
        sheet_id: u32,
        token: &str,
    ) -> Result<Self, StoreError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|err| StoreError::Unavailable(format!("invalid api token: {err}")))?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        let store = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            tab: tab.to_string(),
            sheet_id,
            write_lock: Mutex::new(()),
        };
        store.ensure_header().await?;
        Ok(store)
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        )
    }

    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, StoreError> {
        let response = self.client.get(self.values_url(range)).send().await?;
        let response = ok_or_unavailable(response, "read").await?;
        let range: ValueRange = response.json().await?;
        Ok(range.values)
    }

    /// Restore the header row when the sheet is empty or someone edited it.
    /// Data rows below the header are never touched.
    async fn ensure_header(&self) -> Result<(), StoreError> {
        let head = self.read_range(&format!("{}!A1:E1", self.tab)).await?;
        match head.first() {
            Some(row) if is_header(row) => return Ok(()),
            Some(_) => warn!(tab = %self.tab, "sheet header does not match the roll log layout, rewriting it"),
            None => info!(tab = %self.tab, "sheet has no header row, writing one"),
        }

        let response = self
            .client
            .put(self.values_url(&format!("{}!A1:E1", self.tab)))
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": [COLUMNS] }))
            .send()
            .await?;
        ok_or_unavailable(response, "write header").await?;
        Ok(())
    }

    async fn append_row(&self, event: &RollEvent) -> Result<(), StoreError> {
        let url = format!("{}:append", self.values_url(&format!("{}!A1", self.tab)));
        let response = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": [encode_row(event)] }))
            .send()
            .await?;
        ok_or_unavailable(response, "append").await?;
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<RollEvent>, StoreError> {
        let rows = self.read_range(&format!("{}!A1:E", self.tab)).await?;
        let mut events = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if index == 0 && is_header(row) {
                continue;
            }
            match parse_row(row) {
                Some(event) => events.push(event),
                None => warn!(row = index + 1, "skipping malformed roll log row"),
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl RecordStore for SheetStore {
    async fn append(&self, event: RollEvent) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.append_row(&event).await
    }

    async fn append_unique(&self, event: RollEvent) -> Result<AppendOutcome, StoreError> {
        let _guard = self.write_lock.lock().await;
        let existing = self.fetch_all().await?;
        if existing.iter().any(|stored| stored.same_day(&event)) {
            return Ok(AppendOutcome::DuplicateDay);
        }
        self.append_row(&event).await?;
        Ok(AppendOutcome::Appended)
    }

    async fn list_all(&self) -> Result<Vec<RollEvent>, StoreError> {
        self.fetch_all().await
    }

    async fn backup(&self, name: &str) -> Result<BackupHandle, StoreError> {
        let url = format!(
            "{}/v4/spreadsheets/{}:batchUpdate",
            self.base_url, self.spreadsheet_id
        );
        let body = json!({
            "requests": [{
                "duplicateSheet": {
                    "sourceSheetId": self.sheet_id,
                    "newSheetName": name,
                }
            }]
        });
        let response = self.client.post(url).json(&body).send().await?;
        ok_or_unavailable(response, "duplicate").await?;
        Ok(BackupHandle {
            name: name.to_string(),
        })
    }
}

async fn ok_or_unavailable(response: Response, action: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Unavailable(format!(
        "sheet {action} returned {status}: {body}"
    )))
}

fn is_header(row: &[String]) -> bool {
    row.iter().map(String::as_str).eq(COLUMNS)
}

fn encode_row(event: &RollEvent) -> Vec<String> {
    vec![
        event.user_id.clone(),
        event.username.clone(),
        event.date.to_string(),
        event.timestamp.to_rfc3339(),
        event.result.to_string(),
    ]
}

fn parse_row(row: &[String]) -> Option<RollEvent> {
    if row.len() < COLUMNS.len() {
        return None;
    }
    Some(RollEvent {
        user_id: row[0].clone(),
        username: row[1].clone(),
        date: row[2].parse().ok()?,
        timestamp: DateTime::parse_from_rfc3339(&row[3]).ok()?,
        result: row[4].parse().ok().filter(|result| *result <= MAX_RESULT)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> RollEvent {
        RollEvent {
            user_id: "1093".into(),
            username: "alice".into(),
            date: "2026-08-23".parse().unwrap(),
            timestamp: DateTime::parse_from_rfc3339("2026-08-23T09:15:00+02:00").unwrap(),
            result: 57,
        }
    }

    #[test]
    fn rows_round_trip() {
        let event = sample_event();
        let row = encode_row(&event);
        assert_eq!(row[2], "2026-08-23");
        assert_eq!(row[3], "2026-08-23T09:15:00+02:00");
        assert_eq!(parse_row(&row).unwrap(), event);
    }

    #[test]
    fn header_row_is_recognized() {
        let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
        assert!(is_header(&header));

        let edited = vec!["user".to_string(), "name".to_string()];
        assert!(!is_header(&edited));
    }

    #[test]
    fn short_rows_are_rejected() {
        assert!(parse_row(&["1093".to_string(), "alice".to_string()]).is_none());
    }

    #[test]
    fn rows_with_bad_fields_are_rejected() {
        let mut row = encode_row(&sample_event());
        row[2] = "not-a-date".into();
        assert!(parse_row(&row).is_none());

        let mut row = encode_row(&sample_event());
        row[4] = "57.5".into();
        assert!(parse_row(&row).is_none());
    }

    #[test]
    fn out_of_range_results_are_rejected() {
        let mut row = encode_row(&sample_event());
        row[4] = "101".into();
        assert!(parse_row(&row).is_none());
    }
}
