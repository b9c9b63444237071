//! Email-marketing list export.

use std::sync::Arc;

use domain::errors::DestinationError;
use domain::models::{Destination, DEFAULT_MAILING_LIST_NAME};
use domain::services::{MailingListClient, Subscriber};
use serde_json::json;
use shared::validation::is_deliverable_email;

use super::{DestinationExecutor, ExecutionRequest, ExecutorResult};

/// Adds companies with a deliverable email to a mailing list.
pub struct MailingExecutor {
    client: Arc<dyn MailingListClient>,
}

impl MailingExecutor {
    pub fn new(client: Arc<dyn MailingListClient>) -> Self {
        Self { client }
    }
}

/// Requested list name, else the supplied job name, else the default list.
fn list_name<'a>(request: &ExecutionRequest<'a>) -> &'a str {
    [request.list_name, request.supplied_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(DEFAULT_MAILING_LIST_NAME)
}

#[async_trait::async_trait]
impl DestinationExecutor for MailingExecutor {
    fn destination(&self) -> Destination {
        Destination::Mailing
    }

    async fn execute(
        &self,
        request: ExecutionRequest<'_>,
    ) -> Result<ExecutorResult, DestinationError> {
        let subscribers: Vec<Subscriber> = request
            .records
            .iter()
            .filter_map(|company| {
                company
                    .email
                    .as_deref()
                    .filter(|email| is_deliverable_email(email))
                    .map(|email| Subscriber::from_company(company, email))
            })
            .collect();

        let skipped = request.records.len() - subscribers.len();
        let list = list_name(&request);

        let ack = if subscribers.is_empty() {
            None
        } else {
            Some(self.client.push_subscribers(list, &subscribers).await?)
        };

        tracing::debug!(
            job_id = %request.job.id,
            list,
            subscribers = subscribers.len(),
            skipped,
            "Mailing list import finished"
        );

        Ok(ExecutorResult {
            delivered_count: subscribers.len(),
            delivered_keys: subscribers.into_iter().map(|s| s.cnpj).collect(),
            output_location: None,
            acknowledgment: Some(json!({
                "list": list,
                "skippedWithoutEmail": skipped,
                "response": ack,
            })),
        })
    }
}
