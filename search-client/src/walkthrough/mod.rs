//! Walkthrough of every client operation against one collection.
//!
//! The steps run in a fixed order and build on each other: the document indexed first
//! is read back, updated, overwritten by the bulk steps and finally deleted. A failed
//! step is recorded and the run continues, so one report shows everything that broke.

mod report;

pub use report::{StepOutcome, WalkthroughReport};

use std::sync::Arc;

use chrono::Utc;
use search_client_repository::{BulkBatch, BulkItemResult, ItemStatus, SearchClient, WriteOperation};
use search_client_shared::query::{bool_must, match_text, range, term};
use search_client_shared::{Document, Query, SearchRequest, SearchResponse};
use tracing::{info, warn};

use crate::errors::StepError;

/// Page size for the filtered search.
const FILTERED_PAGE_SIZE: i64 = 60;

/// Id that the walkthrough never writes.
const ABSENT_ID: &str = "walkthrough-absent";

/// Runs the walkthrough steps through a shared client.
pub struct Walkthrough {
    client: Arc<SearchClient>,
    collection: String,
}

impl Walkthrough {
    pub fn new(client: Arc<SearchClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// Target collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Run every step in order and report the outcomes.
    pub async fn run(&self) -> WalkthroughReport {
        info!(collection = %self.collection, "Starting walkthrough");
        let mut report = WalkthroughReport::default();

        record(&mut report, "connect", self.connect().await);
        record(&mut report, "index document", self.index_document().await);
        record(&mut report, "get document", self.get_document().await);
        record(&mut report, "update document", self.update_document().await);
        record(&mut report, "index documents", self.index_documents().await);
        record(&mut report, "bulk index", self.bulk_index().await);
        record(&mut report, "bulk index and delete", self.bulk_index_and_delete().await);
        record(&mut report, "match all search", self.match_all_search().await);
        record(&mut report, "term search", self.term_search().await);
        record(&mut report, "match search", self.match_search().await);
        record(&mut report, "filtered search", self.filtered_search().await);
        record(&mut report, "bool search", self.bool_search().await);
        record(&mut report, "get absent document", self.get_absent_document().await);
        record(&mut report, "close", self.close().await);

        info!(
            steps = report.steps.len(),
            failed = report.failed_count(),
            "Walkthrough finished"
        );
        report
    }

    async fn connect(&self) -> Result<String, StepError> {
        self.client.connect().await?;
        Ok(format!("state {}", self.client.state().await))
    }

    async fn index_document(&self) -> Result<String, StepError> {
        let document = tweet("geyang", 20, "trying out Elasticsearch");
        let result = self
            .client
            .index_one(&self.collection, Some("1"), document)
            .await?;
        applied(&result)
    }

    async fn get_document(&self) -> Result<String, StepError> {
        let stored = self
            .client
            .get_one(&self.collection, "1")
            .await?
            .ok_or_else(|| StepError::unexpected("document 1 not found"))?;

        let user = stored.document.get("user").and_then(|v| v.as_text());
        if user != Some("geyang") {
            return Err(StepError::unexpected(format!(
                "document 1 has user {:?}, expected \"geyang\"",
                user
            )));
        }
        Ok(format!(
            "document {} version {} with fields [{}]",
            stored.id,
            version_text(stored.version),
            stored.document.field_names().join(", ")
        ))
    }

    async fn update_document(&self) -> Result<String, StepError> {
        let partial = tweet("geyang", 21, "update geyang");
        let result = self
            .client
            .update_one(&self.collection, "1", partial)
            .await?;
        applied(&result)
    }

    async fn index_documents(&self) -> Result<String, StepError> {
        let mut details = Vec::with_capacity(3);
        for i in 0..3i64 {
            let document = tweet(
                &format!("geyang{}", i),
                20 + i,
                &format!("insert {} into index", i),
            );
            let id = i.to_string();
            let result = self
                .client
                .index_one(&self.collection, Some(id.as_str()), document)
                .await?;
            details.push(applied(&result)?);
        }
        Ok(details.join("; "))
    }

    async fn bulk_index(&self) -> Result<String, StepError> {
        let mut batch = BulkBatch::with_capacity(2);
        batch.add(WriteOperation::index(
            &self.collection,
            "1",
            tweet("geyang", 21, "bulk1 geyang"),
        ))?;
        batch.add(WriteOperation::index(
            &self.collection,
            "2",
            tweet("qingqing", 21, "bulk2 qingqing"),
        ))?;
        self.submit(batch).await
    }

    async fn bulk_index_and_delete(&self) -> Result<String, StepError> {
        let mut batch = BulkBatch::with_capacity(2);
        batch.add(WriteOperation::index(
            &self.collection,
            "1",
            tweet("geyang", 21, "bulk1 geyang"),
        ))?;
        batch.add(WriteOperation::delete(&self.collection, "1"))?;
        self.submit(batch).await
    }

    async fn submit(&self, batch: BulkBatch) -> Result<String, StepError> {
        let summary = self.client.submit_bulk(batch).await?;
        if summary.failed > 0 || summary.indeterminate > 0 {
            let first = summary
                .results
                .iter()
                .find(|r| !r.succeeded())
                .map(|r| r.error_detail.clone().unwrap_or_default())
                .unwrap_or_default();
            return Err(StepError::rejected(format!(
                "{} failed, {} indeterminate of {}: {}",
                summary.failed, summary.indeterminate, summary.total, first
            )));
        }

        let results = summary
            .results
            .iter()
            .map(applied)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("{} in {} ms", results.join("; "), summary.took_ms))
    }

    async fn match_all_search(&self) -> Result<String, StepError> {
        let response = self
            .client
            .search_request(SearchRequest::match_all().collection(&self.collection))
            .await?;
        Ok(hits_text(&response))
    }

    async fn term_search(&self) -> Result<String, StepError> {
        self.search_collection(term("age", 20)).await
    }

    async fn match_search(&self) -> Result<String, StepError> {
        self.search_collection(match_text("user", "geyang0")).await
    }

    async fn filtered_search(&self) -> Result<String, StepError> {
        let request = SearchRequest::new(term("user", "qingqing"))
            .collection(&self.collection)
            .post_filter(range("age", 18, 30))
            .from(0)
            .size(FILTERED_PAGE_SIZE);
        let response = self.client.search_request(request).await?;
        Ok(hits_text(&response))
    }

    async fn bool_search(&self) -> Result<String, StepError> {
        let query = bool_must([match_text("message", "bulk2"), range("age", 20, 30)]);
        let documents = self.client.search(&query, 0, 10).await?;
        Ok(format!("{} hits", documents.len()))
    }

    async fn get_absent_document(&self) -> Result<String, StepError> {
        match self.client.get_one(&self.collection, ABSENT_ID).await? {
            None => Ok(format!("document {} not found", ABSENT_ID)),
            Some(stored) => Err(StepError::unexpected(format!(
                "document {} exists with version {}",
                ABSENT_ID,
                version_text(stored.version)
            ))),
        }
    }

    async fn close(&self) -> Result<String, StepError> {
        self.client.close().await?;
        Ok(format!("state {}", self.client.state().await))
    }

    async fn search_collection(&self, query: Query) -> Result<String, StepError> {
        let request = SearchRequest::new(query).collection(&self.collection);
        let response = self.client.search_request(request).await?;
        Ok(hits_text(&response))
    }
}

fn record(report: &mut WalkthroughReport, name: &'static str, outcome: Result<String, StepError>) {
    match outcome {
        Ok(detail) => {
            info!(step = name, detail = %detail, "Step passed");
            report.record(name, true, detail);
        }
        Err(e) => {
            warn!(step = name, error = %e, "Step failed");
            report.record(name, false, e.to_string());
        }
    }
}

/// Tweet-shaped document stamped with the current time.
fn tweet(user: &str, age: i64, message: &str) -> Document {
    Document::new()
        .with("user", user)
        .with("age", age)
        .with("postDate", Utc::now())
        .with("message", message)
}

/// Describe a successful item, or turn a failed or indeterminate one into an error.
fn applied(result: &BulkItemResult) -> Result<String, StepError> {
    let id = result.id.as_deref().unwrap_or("?");
    match result.status {
        ItemStatus::Succeeded => Ok(format!(
            "{} {} {} (version {})",
            result.kind.action(),
            id,
            result.result.as_deref().unwrap_or("ok"),
            version_text(result.version)
        )),
        ItemStatus::Failed(cause) => Err(StepError::rejected(format!(
            "{} {} failed with {}: {}",
            result.kind.action(),
            id,
            cause,
            result.error_detail.as_deref().unwrap_or("")
        ))),
        ItemStatus::Indeterminate => Err(StepError::rejected(format!(
            "{} {} outcome unknown",
            result.kind.action(),
            id
        ))),
    }
}

fn hits_text(response: &SearchResponse) -> String {
    format!("{} hits (total {})", response.len(), response.total)
}

fn version_text(version: Option<i64>) -> String {
    version.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}
