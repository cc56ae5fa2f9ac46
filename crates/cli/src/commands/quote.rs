use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;

use renoquote_agent::AgentCollaborators;
use renoquote_core::audit::TracingAuditSink;
use renoquote_core::{
    PipelineState, QuotationId, QuotationPipeline, QuotationRecord, QuotationStatus, SessionId,
};
use renoquote_db::{
    QuotationRepository, SqlCatalogRepository, SqlQuotationRepository, SqlTenantRepository,
    TenantRepository,
};

use crate::commands::{
    execute, open_database, to_data, CommandResult, EXIT_CONFIG, EXIT_DB, EXIT_INPUT,
    EXIT_NOT_FOUND, EXIT_PIPELINE,
};

/// `input` names a transcript file when one exists at that path; otherwise it
/// is the transcript itself.
fn read_transcript(input: &str) -> std::io::Result<String> {
    let path = Path::new(input);
    if path.is_file() {
        std::fs::read_to_string(path)
    } else {
        Ok(input.to_string())
    }
}

pub fn run(input: &str, tenant_name: &str, client_name: &str) -> CommandResult {
    let transcript = match read_transcript(input) {
        Ok(transcript) => transcript,
        Err(error) => {
            return CommandResult::failure(
                "quote",
                "invalid_input",
                format!("failed to read transcript: {error}"),
                EXIT_INPUT,
            );
        }
    };

    execute("quote", |config| async move {
        let collaborators = AgentCollaborators::from_config(&config.llm)
            .map_err(|error| ("config_validation", format!("{error:#}"), EXIT_CONFIG))?;
        let pool = open_database(&config).await?;

        let tenant = SqlTenantRepository::new(pool.clone())
            .find_by_name(tenant_name)
            .await
            .map_err(|error| ("persistence", error.to_string(), EXIT_DB))?
            .ok_or_else(|| {
                ("tenant_not_found", format!("tenant `{tenant_name}` not found"), EXIT_NOT_FOUND)
            })?;

        let pipeline = QuotationPipeline::new(
            collaborators.safety,
            collaborators.extractor,
            Arc::new(SqlCatalogRepository::new(pool.clone())),
            config.matching.settings(),
        )
        .with_audit_sink(Arc::new(TracingAuditSink));
        let quotations = SqlQuotationRepository::new(pool.clone());

        let mut record = QuotationRecord::processing(
            QuotationId(Uuid::new_v4().to_string()),
            tenant.id.clone(),
            SessionId(Uuid::new_v4().to_string()),
            client_name,
            transcript.as_str(),
        );
        quotations.save(&record).await.map_err(|error| ("persistence", error.to_string(), EXIT_DB))?;

        let state = pipeline
            .run(PipelineState::new(tenant.id, record.session_id.clone(), transcript.as_str()))
            .await;
        record
            .record_outcome(&state)
            .map_err(|error| ("pipeline_failure", error.to_string(), EXIT_PIPELINE))?;
        quotations.save(&record).await.map_err(|error| ("persistence", error.to_string(), EXIT_DB))?;
        pool.close().await;

        let data = to_data(&record);
        let message = record.error.clone().unwrap_or_default();
        Ok(match record.status {
            QuotationStatus::Blocked => CommandResult::failure_with_data(
                "quote",
                "security_violation",
                message,
                EXIT_PIPELINE,
                data,
            ),
            QuotationStatus::Failed => CommandResult::failure_with_data(
                "quote",
                "pipeline_failure",
                message,
                EXIT_PIPELINE,
                data,
            ),
            _ => CommandResult::success_with_data(
                "quote",
                format!(
                    "quotation {} priced {} items, {} in suspense",
                    record.id.0,
                    record.items.len(),
                    record.suspense_items.len()
                ),
                data,
            ),
        })
    })
}
