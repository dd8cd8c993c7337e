use super::summary::SummaryCoordinator;
use crate::llm::LlmClient;
use crate::model::TranscriptChunk;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::ConnectionRegistry;
use crate::store::PersonStore;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

/// Orchestrates the processing of inbound caller messages
///
/// One receive loop drives this per connection, so handling for a single
/// caller is strictly sequential; different callers interleave freely.
pub struct CallProcessor {
    registry: Arc<ConnectionRegistry>,
    person_store: Arc<dyn PersonStore>,
    llm: Arc<LlmClient>,
    coordinator: Arc<SummaryCoordinator>,
    chunk_buffer_size: usize,
}

impl CallProcessor {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        person_store: Arc<dyn PersonStore>,
        llm: Arc<LlmClient>,
        coordinator: Arc<SummaryCoordinator>,
        chunk_buffer_size: usize,
    ) -> Self {
        Self {
            registry,
            person_store,
            llm,
            coordinator,
            chunk_buffer_size,
        }
    }

    /// Dispatch one inbound message for a caller.
    ///
    /// All failures are handled here and reported to the originating caller
    /// only; nothing propagates to the receive loop or touches another
    /// caller's session.
    pub async fn process_message(&self, person_id: &str, message: ClientMessage) {
        let result = match message {
            ClientMessage::TranscriptChunk {
                text,
                chunk_index,
                is_final,
                audio_duration_ms,
            } => {
                self.handle_chunk(person_id, text, chunk_index, is_final, audio_duration_ms)
                    .await
            }
            ClientMessage::Heartbeat {} => self.handle_heartbeat(person_id).await,
            ClientMessage::CallEnd {} => self.handle_call_end(person_id).await,
        };

        if let Err(err) = result {
            error!("Error handling message for {}: {:#}", person_id, err);
            self.registry
                .send_to_person(
                    person_id,
                    ServerMessage::error(format!("{}", err), "internal_error"),
                )
                .await;
        }
    }

    /// Append the chunk durably and to the connection buffer, then fire
    /// extraction when the chunk is final or the buffer has reached the
    /// configured size.
    async fn handle_chunk(
        &self,
        person_id: &str,
        text: String,
        chunk_index: u64,
        is_final: bool,
        audio_duration_ms: Option<u64>,
    ) -> Result<()> {
        let (_, created) = self.person_store.get_or_create(person_id).await?;
        if created {
            info!("Created call record for {}", person_id);
        }

        let chunk = TranscriptChunk {
            text,
            chunk_index,
            is_final,
            audio_duration_ms,
            timestamp: Utc::now(),
        };

        self.person_store
            .append_chunk(person_id, chunk.clone())
            .await?
            .context("call record disappeared during append")?;

        // The buffer only exists while a connection does; without one, only
        // a final chunk can trigger extraction.
        let buffered = self
            .registry
            .push_chunk(person_id, chunk)
            .await
            .unwrap_or(0);

        if is_final || buffered >= self.chunk_buffer_size {
            self.run_extraction(person_id).await?;
        }
        Ok(())
    }

    async fn handle_heartbeat(&self, person_id: &str) -> Result<()> {
        self.registry.update_heartbeat(person_id).await;
        self.registry
            .send_to_person(person_id, ServerMessage::heartbeat_ack())
            .await;
        Ok(())
    }

    /// Flush anything still buffered through extraction, close out the
    /// durable record, and schedule a summary refresh.
    async fn handle_call_end(&self, person_id: &str) -> Result<()> {
        info!("Call ended for {}", person_id);

        if self.registry.buffer_len(person_id).await.unwrap_or(0) > 0 {
            self.run_extraction(person_id).await?;
        }

        self.person_store.end_call(person_id).await?;
        self.coordinator.schedule_update().await;
        Ok(())
    }

    /// Run one extraction trigger: snapshot the caller's full transcript,
    /// clear the chunk buffer, and hand the transcript to the gateway.
    ///
    /// Extraction sees the complete accumulated transcript every time, not
    /// an incremental diff, so each call stands alone.
    async fn run_extraction(&self, person_id: &str) -> Result<()> {
        let record = self
            .person_store
            .get(person_id)
            .await?
            .context("no call record to extract from")?;

        // Clear exactly once per trigger, before the provider call, so a
        // slow or failed extraction cannot re-trigger on the same chunks.
        self.registry.take_buffer(person_id).await;

        let transcript = record.full_transcript();
        if transcript.trim().is_empty() {
            return Ok(());
        }

        let last_index = record
            .transcript_chunks
            .last()
            .map(|chunk| chunk.chunk_index)
            .unwrap_or(0);

        match self.llm.extract(&transcript).await {
            Ok(info) => {
                self.person_store
                    .update_extracted_info(person_id, info.clone())
                    .await?;
                self.registry
                    .send_to_person(person_id, ServerMessage::chunk_processed(last_index, info))
                    .await;
                self.coordinator.schedule_update().await;
            }
            Err(err) => {
                error!("Extraction failed for {}: {}", person_id, err);
                self.registry
                    .send_to_person(
                        person_id,
                        ServerMessage::error(
                            format!("Failed to extract information: {}", err),
                            "extraction_failed",
                        ),
                    )
                    .await;
            }
        }
        Ok(())
    }
}
