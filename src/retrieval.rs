use std::future::Future;
use std::sync::OnceLock;
use tokio::sync::Mutex;

static RETRIEVAL_GUARD: OnceLock<Mutex<()>> = OnceLock::new();

fn retrieval_guard() -> &'static Mutex<()> {
    RETRIEVAL_GUARD.get_or_init(|| Mutex::new(()))
}

/// Runs a retrieval while holding the process-wide retrieval guard, so at most one
/// retrieval is in flight at a time. Only fetching goes through here, never computation.
pub async fn single_flight<F, T>(retrieval: F) -> T
where
    F: Future<Output = T>,
{
    let _guard = retrieval_guard().lock().await;
    retrieval.await
}

#[cfg(feature = "remote")]
pub use remote::SheetSource;

#[cfg(feature = "remote")]
mod remote {
    use super::single_flight;
    use crate::error::{DisbursementError, Result};
    use crate::schema::{RawTables, ReferenceKey};
    use log::{debug, info};
    use reqwest::Client;

    /// Published CSV exports of the three source sheets.
    #[derive(Clone)]
    pub struct SheetSource {
        client: Client,
        pub projects_url: String,
        pub operations_url: String,
        pub disbursements_url: String,
    }

    impl SheetSource {
        pub fn new(
            projects_url: impl Into<String>,
            operations_url: impl Into<String>,
            disbursements_url: impl Into<String>,
        ) -> Self {
            Self {
                client: Client::new(),
                projects_url: projects_url.into(),
                operations_url: operations_url.into(),
                disbursements_url: disbursements_url.into(),
            }
        }

        pub async fn fetch_tables(&self, reference_key: ReferenceKey) -> Result<RawTables> {
            let (projects, operations, disbursements) = futures::try_join!(
                self.fetch_csv(&self.projects_url),
                self.fetch_csv(&self.operations_url),
                self.fetch_csv(&self.disbursements_url),
            )?;

            info!(
                "Fetched source sheets ({} + {} + {} bytes)",
                projects.len(),
                operations.len(),
                disbursements.len()
            );

            RawTables::from_csv_readers(
                projects.as_bytes(),
                operations.as_bytes(),
                disbursements.as_bytes(),
                reference_key,
            )
        }

        async fn fetch_csv(&self, url: &str) -> Result<String> {
            single_flight(async {
                debug!("Fetching {}", url);
                let res = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(|res| res.error_for_status())
                    .map_err(|e| DisbursementError::Retrieval(e.to_string()))?;
                res.text()
                    .await
                    .map_err(|e| DisbursementError::Retrieval(e.to_string()))
            })
            .await
        }
    }
}
