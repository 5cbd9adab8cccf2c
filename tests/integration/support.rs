//! Shared fixtures: a scripted gateway whose streams are driven by the test.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use research_desk::services::gateway::{GatewayError, GatewayResult, ResearchGateway};
use research_desk::storage::{MemorySnapshotBackend, SessionStore};
use research_desk::{Framework, GroundingReference, ResearchController, SourceMetadata};

pub enum StreamStep {
    Chunk(String),
    Finish(GatewayResult<Vec<GroundingReference>>),
}

/// Test side of one scripted report stream
pub struct StreamHandle {
    tx: mpsc::UnboundedSender<StreamStep>,
}

impl StreamHandle {
    pub fn chunk(&self, text: &str) {
        // The stream may already be gone after a cancel
        let _ = self.tx.send(StreamStep::Chunk(text.to_string()));
    }

    pub fn finish(&self, references: Vec<GroundingReference>) {
        let _ = self.tx.send(StreamStep::Finish(Ok(references)));
    }

    pub fn fail(&self, message: &str) {
        let _ = self
            .tx
            .send(StreamStep::Finish(Err(GatewayError::generation(message))));
    }
}

#[derive(Default)]
pub struct ScriptedGateway {
    frameworks: Mutex<VecDeque<GatewayResult<Vec<Framework>>>>,
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<StreamStep>>>,
    metadata: Mutex<VecDeque<oneshot::Receiver<GatewayResult<Vec<SourceMetadata>>>>>,
    /// (topic, framework label) per report request
    pub report_requests: Mutex<Vec<(String, String)>>,
    pub metadata_requests: Mutex<Vec<Vec<GroundingReference>>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_frameworks(&self, result: GatewayResult<Vec<Framework>>) {
        self.frameworks.lock().unwrap().push_back(result);
    }

    pub fn push_stream(&self) -> StreamHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(rx);
        StreamHandle { tx }
    }

    pub fn push_metadata(&self, result: GatewayResult<Vec<SourceMetadata>>) {
        let _ = self.push_metadata_pending().send(result);
    }

    /// Queue a metadata answer the test releases later
    pub fn push_metadata_pending(
        &self,
    ) -> oneshot::Sender<GatewayResult<Vec<SourceMetadata>>> {
        let (tx, rx) = oneshot::channel();
        self.metadata.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl ResearchGateway for ScriptedGateway {
    async fn suggest_frameworks(
        &self,
        _topic: &str,
        _objective: &str,
        _scope: &str,
    ) -> GatewayResult<Vec<Framework>> {
        self.frameworks
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::generation("no scripted suggestion")))
    }

    async fn generate_report_stream(
        &self,
        topic: &str,
        framework_label: &str,
        chunks: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> GatewayResult<Vec<GroundingReference>> {
        self.report_requests
            .lock()
            .unwrap()
            .push((topic.to_string(), framework_label.to_string()));
        let Some(mut steps) = self.streams.lock().unwrap().pop_front() else {
            return Err(GatewayError::generation("no scripted stream"));
        };

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Vec::new()),
                step = steps.recv() => step,
            };
            match step {
                Some(StreamStep::Chunk(text)) => {
                    if chunks.send(text).await.is_err() {
                        return Ok(Vec::new());
                    }
                }
                Some(StreamStep::Finish(result)) => return result,
                None => return Ok(Vec::new()),
            }
        }
    }

    async fn extract_source_metadata(
        &self,
        references: &[GroundingReference],
    ) -> GatewayResult<Vec<SourceMetadata>> {
        self.metadata_requests
            .lock()
            .unwrap()
            .push(references.to_vec());
        let pending = self.metadata.lock().unwrap().pop_front();
        match pending {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(GatewayError::generation("metadata script dropped"))),
            None => Ok(Vec::new()),
        }
    }
}

pub fn frameworks(count: usize) -> Vec<Framework> {
    (1..=count)
        .map(|i| {
            Framework::new(
                format!("框架{}", i),
                format!("Framework {}", i),
                format!("Reason {}", i),
            )
        })
        .collect()
}

pub fn reference(uri: &str, title: &str) -> GroundingReference {
    GroundingReference {
        uri: uri.to_string(),
        title: title.to_string(),
    }
}

pub fn controller(gateway: &Arc<ScriptedGateway>) -> (ResearchController, MemorySnapshotBackend) {
    let backend = MemorySnapshotBackend::new();
    let store = SessionStore::load(Arc::new(backend.clone()));
    (ResearchController::new(store, gateway.clone()), backend)
}

/// Drive a fresh controller to framework selection
pub async fn at_framework_selection(
    gateway: &Arc<ScriptedGateway>,
    count: usize,
) -> (ResearchController, MemorySnapshotBackend) {
    let (mut controller, backend) = controller(gateway);
    gateway.push_frameworks(Ok(frameworks(count)));
    controller.submit_topic("EV market").unwrap();
    controller.submit_goal("assess entry risk", "").unwrap();
    controller.run_until_settled().await;
    (controller, backend)
}
