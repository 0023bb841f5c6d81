#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use omnipost::connection::ConnectionProvider;
use omnipost::content::{ContentService, GenerationError, ImageRequest, RefineRequest, TextRequest};
use omnipost::model::Surface;
use omnipost::pipeline::PipelineStatus;
use omnipost::store::ResultStore;

pub type Scripted = Result<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Text(TextRequest),
    Image(ImageRequest),
    Refine(RefineRequest),
}

/// Content service answering from per-surface scripts. Unscripted calls
/// succeed with a deterministic value.
#[derive(Default)]
pub struct ScriptedContent {
    text: Mutex<HashMap<Surface, VecDeque<Scripted>>>,
    image: Mutex<HashMap<Surface, VecDeque<Scripted>>>,
    refine: Mutex<HashMap<Surface, VecDeque<Scripted>>>,
    text_gates: Mutex<HashMap<Surface, Arc<Notify>>>,
    refine_gates: Mutex<HashMap<Surface, Arc<Notify>>>,
    panic_on_text: Mutex<HashSet<Surface>>,
    calls: Mutex<Vec<Call>>,
}

fn to_result(scripted: Scripted) -> Result<String, GenerationError> {
    scripted.map_err(|message| GenerationError::Api {
        status: 500,
        message,
    })
}

async fn pop(
    script: &Mutex<HashMap<Surface, VecDeque<Scripted>>>,
    surface: Surface,
) -> Option<Scripted> {
    script
        .lock()
        .await
        .get_mut(&surface)
        .and_then(|q| q.pop_front())
}

impl ScriptedContent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn script_text(&self, surface: Surface, responses: Vec<Scripted>) {
        self.text.lock().await.insert(surface, responses.into());
    }

    pub async fn script_image(&self, surface: Surface, responses: Vec<Scripted>) {
        self.image.lock().await.insert(surface, responses.into());
    }

    pub async fn script_refine(&self, surface: Surface, responses: Vec<Scripted>) {
        self.refine.lock().await.insert(surface, responses.into());
    }

    /// The next text call for `surface` waits until the returned handle is
    /// notified.
    pub async fn hold_next_text(&self, surface: Surface) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.text_gates.lock().await.insert(surface, gate.clone());
        gate
    }

    pub async fn hold_next_refine(&self, surface: Surface) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.refine_gates.lock().await.insert(surface, gate.clone());
        gate
    }

    pub async fn panic_on_text(&self, surface: Surface) {
        self.panic_on_text.lock().await.insert(surface);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn text_calls(&self) -> Vec<TextRequest> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                Call::Text(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub async fn image_calls(&self) -> Vec<ImageRequest> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                Call::Image(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub async fn refine_calls(&self) -> Vec<RefineRequest> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|c| match c {
                Call::Refine(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ContentService for ScriptedContent {
    async fn generate_text(&self, req: &TextRequest) -> Result<String, GenerationError> {
        self.calls.lock().await.push(Call::Text(req.clone()));
        if self.panic_on_text.lock().await.contains(&req.surface) {
            panic!("scripted panic for {}", req.surface);
        }
        let response = pop(&self.text, req.surface)
            .await
            .unwrap_or_else(|| Ok(format!("{} post about {}", req.surface, req.topic)));
        let gate = self.text_gates.lock().await.remove(&req.surface);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        to_result(response)
    }

    async fn generate_image(&self, req: &ImageRequest) -> Result<String, GenerationError> {
        self.calls.lock().await.push(Call::Image(req.clone()));
        let response = pop(&self.image, req.surface)
            .await
            .unwrap_or_else(|| Ok(format!("data:image/png;base64,{}", req.surface)));
        to_result(response)
    }

    async fn refine(&self, req: &RefineRequest) -> Result<String, GenerationError> {
        self.calls.lock().await.push(Call::Refine(req.clone()));
        let response = pop(&self.refine, req.surface)
            .await
            .unwrap_or_else(|| Ok(format!("{} ({})", req.current_text, req.action)));
        let gate = self.refine_gates.lock().await.remove(&req.surface);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        to_result(response)
    }
}

pub struct StaticConnection(pub bool);

#[async_trait]
impl ConnectionProvider for StaticConnection {
    async fn is_connected(&self) -> bool {
        self.0
    }

    async fn request_connection(&self) -> bool {
        self.0
    }
}

/// Yield until `surface` reaches `status`.
pub async fn wait_for_status(store: &ResultStore, surface: Surface, status: PipelineStatus) {
    for _ in 0..10_000 {
        if store.get(surface).status == status {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!(
        "{} never reached {} (now {})",
        surface,
        status,
        store.get(surface).status
    );
}

/// Yield until `content` has recorded at least `n` text calls.
pub async fn wait_for_text_calls(content: &ScriptedContent, n: usize) {
    for _ in 0..10_000 {
        if content.text_calls().await.len() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("expected {} text calls", n);
}
