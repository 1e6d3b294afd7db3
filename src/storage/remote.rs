//! Client for the hosted request table.
//!
//! Speaks the PostgREST dialect: records live in a `requests` table behind
//! an HTTP gateway, scoped per user by a `user_id` column. All calls are
//! blocking; each CLI invocation makes at most a handful of them.

use chrono::{DateTime, NaiveDate, Utc};
use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::RemoteConfig,
    domain::{request::StoredRequest, Request},
};

/// A store backed by a hosted Postgres table.
#[derive(Debug)]
pub struct RemoteStore {
    client: reqwest::blocking::Client,
    config: RemoteConfig,
}

impl RemoteStore {
    /// Creates a client for the given remote settings.
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            config,
        }
    }

    /// Fetches every record for the configured user, newest first.
    ///
    /// # Errors
    ///
    /// Fails when the service is unreachable or rejects the call.
    pub fn fetch(&self) -> Result<Vec<Request>, RemoteError> {
        let url = self.table_url();
        let scope = self.scope();
        tracing::debug!("Fetching requests from {url}");

        let rows: Vec<RemoteRow> = self
            .authed(self.client.get(url))
            .query(&[
                ("select", "*"),
                ("user_id", scope.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        Ok(rows.into_iter().map(Request::from).collect())
    }

    /// Writes records, inserting new rows and replacing existing ones by
    /// id.
    ///
    /// # Errors
    ///
    /// Fails when the service is unreachable or rejects the call.
    pub fn upsert(&self, requests: &[Request]) -> Result<(), RemoteError> {
        if requests.is_empty() {
            return Ok(());
        }

        let url = self.table_url();
        tracing::debug!("Upserting {} request(s) to {url}", requests.len());

        let rows: Vec<RemoteRow> = requests
            .iter()
            .map(|request| RemoteRow::new(request.clone(), &self.config.user_id))
            .collect();

        self.authed(self.client.post(url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .query(&[("on_conflict", "id")])
            .json(&rows)
            .send()?
            .error_for_status()?;

        Ok(())
    }

    /// Removes one record; ids the service does not know are a no-op.
    ///
    /// # Errors
    ///
    /// Fails when the service is unreachable or rejects the call.
    pub fn delete(&self, id: Uuid) -> Result<(), RemoteError> {
        let url = self.table_url();
        let scope = self.scope();
        let row = format!("eq.{id}");
        tracing::debug!("Deleting request {id} from {url}");

        self.authed(self.client.delete(url))
            .query(&[("user_id", scope.as_str()), ("id", row.as_str())])
            .send()?
            .error_for_status()?;

        Ok(())
    }

    fn authed(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/requests",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn scope(&self) -> String {
        format!("eq.{}", self.config.user_id)
    }
}

/// A call to the hosted table failed.
#[derive(Debug, thiserror::Error)]
#[error("request service call failed")]
pub struct RemoteError(#[from] reqwest::Error);

/// The snake_case row shape of the hosted table.
///
/// Optional columns serialize as explicit nulls so that a merge upsert
/// clears them rather than leaving stale values behind.
#[derive(Debug, Serialize, Deserialize)]
struct RemoteRow {
    id: Uuid,
    user_id: String,
    student_name: NonEmptyString,
    song_title: NonEmptyString,
    artist: NonEmptyString,
    date_requested: NaiveDate,
    due_date: Option<NaiveDate>,
    archived_date: Option<NaiveDate>,
    score_link: Option<String>,
    cost: Option<f64>,
    only_deliverable_if_reimbursed: bool,
    delivered: bool,
    reimbursed: bool,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RemoteRow {
    fn new(request: Request, user_id: &str) -> Self {
        let stored = StoredRequest::from(request);
        Self {
            id: stored.id,
            user_id: user_id.to_owned(),
            student_name: stored.student_name,
            song_title: stored.song_title,
            artist: stored.artist,
            date_requested: stored.date_requested,
            due_date: stored.due_date,
            archived_date: stored.archived_date,
            score_link: stored.score_link,
            cost: stored.cost,
            only_deliverable_if_reimbursed: stored.only_deliverable_if_reimbursed,
            delivered: stored.delivered,
            reimbursed: stored.reimbursed,
            notes: stored.notes,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

impl From<RemoteRow> for Request {
    fn from(row: RemoteRow) -> Self {
        StoredRequest {
            id: row.id,
            student_name: row.student_name,
            song_title: row.song_title,
            artist: row.artist,
            date_requested: row.date_requested,
            due_date: row.due_date,
            archived_date: row.archived_date,
            score_link: row.score_link,
            cost: row.cost,
            only_deliverable_if_reimbursed: row.only_deliverable_if_reimbursed,
            delivered: row.delivered,
            reimbursed: row.reimbursed,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{RemoteRow, RemoteStore};
    use crate::{
        config::RemoteConfig,
        domain::{Draft, Request},
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn sample() -> Request {
        let draft = Draft {
            student_name: "Alice Smith".to_string(),
            song_title: "Song A".to_string(),
            artist: "Band X".to_string(),
            ..Draft::default()
        };
        Request::create(
            draft,
            today(),
            Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap(),
        )
        .unwrap()
    }

    fn store(base_url: &str) -> RemoteStore {
        RemoteStore::new(RemoteConfig {
            base_url: base_url.to_string(),
            api_key: "key".to_string(),
            user_id: "user-1".to_string(),
        })
    }

    #[test]
    fn table_url_tolerates_a_trailing_slash() {
        assert_eq!(
            store("https://db.example.com/").table_url(),
            "https://db.example.com/rest/v1/requests"
        );
        assert_eq!(
            store("https://db.example.com").table_url(),
            "https://db.example.com/rest/v1/requests"
        );
    }

    #[test]
    fn scope_filter_names_the_configured_user() {
        assert_eq!(store("https://db.example.com").scope(), "eq.user-1");
    }

    #[test]
    fn rows_serialize_with_snake_case_columns() {
        let row = RemoteRow::new(sample(), "user-1");
        let json = serde_json::to_value(&row).unwrap();

        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["student_name"], "Alice Smith");
        assert_eq!(json["delivered"], false);
        assert!(json["archived_date"].is_null());
        assert!(json.get("studentName").is_none());
    }

    #[test]
    fn archived_rows_round_trip_their_archive_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap();
        let archived = sample()
            .toggle_reimbursed(today(), now)
            .toggle_delivered(today(), now)
            .unwrap();
        assert_eq!(archived.archived_date(), Some(today()));

        let row = RemoteRow::new(archived.clone(), "user-1");
        let back = Request::from(row);

        assert_eq!(back, archived);
    }

    #[test]
    fn rows_deserialize_from_table_payloads() {
        let payload = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "user_id": "user-1",
            "student_name": "Bob Jones",
            "song_title": "Song B",
            "artist": "Band Y",
            "date_requested": "2024-02-01",
            "due_date": null,
            "archived_date": null,
            "score_link": null,
            "cost": 12.5,
            "only_deliverable_if_reimbursed": true,
            "delivered": false,
            "reimbursed": false,
            "notes": null,
            "created_at": "2024-02-01T08:00:00Z",
            "updated_at": "2024-02-01T08:00:00Z"
        }"#;

        let row: RemoteRow = serde_json::from_str(payload).unwrap();
        let request = Request::from(row);

        assert_eq!(request.student_name.as_str(), "Bob Jones");
        assert_eq!(request.cost, Some(12.5));
        assert!(request.only_deliverable_if_reimbursed);
        assert!(!request.delivered());
    }
}
