//! Mock providers for dispatcher tests.

use std::sync::Mutex;

use async_trait::async_trait;
use profesor_core::error::GenerationError;
use profesor_core::message::Message;
use profesor_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
use tokio::sync::mpsc;

/// Answers with fixed fragments, streamed one chunk each.
pub struct ScriptedProvider {
    fragments: Vec<String>,
}

impl ScriptedProvider {
    pub fn new(fragments: Vec<&str>) -> Self {
        Self {
            fragments: fragments.into_iter().map(String::from).collect(),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, GenerationError> {
        Ok(ProviderResponse {
            message: Message::assistant(self.fragments.concat()),
            usage: None,
            model: request.model,
        })
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, GenerationError>>, GenerationError> {
        let (tx, rx) = mpsc::channel(self.fragments.len() + 1);
        for fragment in &self.fragments {
            let _ = tx.try_send(Ok(StreamChunk::text(fragment.clone())));
        }
        let _ = tx.try_send(Ok(StreamChunk::finished()));
        Ok(rx)
    }
}

/// Fails every call with the configured error.
pub struct FailingProvider(pub GenerationError);

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, GenerationError> {
        Err(self.0.clone())
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, GenerationError>>, GenerationError> {
        Err(self.0.clone())
    }
}

/// Keeps the last request it saw.
#[derive(Default)]
pub struct RecordingProvider {
    last: Mutex<Option<ProviderRequest>>,
}

impl RecordingProvider {
    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, GenerationError> {
        let model = request.model.clone();
        *self.last.lock().unwrap() = Some(request);
        Ok(ProviderResponse {
            message: Message::assistant("recorded"),
            usage: None,
            model,
        })
    }
}
