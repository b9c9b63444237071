//! CRM export.

use std::sync::Arc;

use domain::errors::DestinationError;
use domain::models::Destination;
use domain::services::{CrmClient, CrmContact};
use serde_json::json;

use super::{DestinationExecutor, ExecutionRequest, ExecutorResult};

/// Pushes contacts to the CRM in fixed-size batches.
///
/// A failed batch fails the whole transfer; batches accepted before it are
/// not reported as delivered, so no sent-flag is set for them.
pub struct CrmExecutor {
    client: Arc<dyn CrmClient>,
    batch_size: usize,
}

impl CrmExecutor {
    pub fn new(client: Arc<dyn CrmClient>, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait::async_trait]
impl DestinationExecutor for CrmExecutor {
    fn destination(&self) -> Destination {
        Destination::Crm
    }

    async fn execute(
        &self,
        request: ExecutionRequest<'_>,
    ) -> Result<ExecutorResult, DestinationError> {
        let contacts: Vec<CrmContact> = request.records.iter().map(CrmContact::from).collect();
        let mut acknowledgments = Vec::new();

        for (index, batch) in contacts.chunks(self.batch_size).enumerate() {
            let ack = self.client.push_batch(batch).await.map_err(|e| {
                tracing::warn!(
                    job_id = %request.job.id,
                    batch = index + 1,
                    error = %e,
                    "CRM batch rejected"
                );
                e
            })?;
            acknowledgments.push(ack);
        }

        Ok(ExecutorResult {
            delivered_count: contacts.len(),
            delivered_keys: contacts.into_iter().map(|c| c.cnpj).collect(),
            output_location: None,
            acknowledgment: Some(json!({
                "batches": acknowledgments.len(),
                "responses": acknowledgments,
            })),
        })
    }
}
