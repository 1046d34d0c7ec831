use crate::services::candidate_filter::CandidateFilter;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle of the runtime-side model. `Failed` is terminal for this
/// instance; a fresh instance (new process) is the retry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// False statement generator backed by a local inference runtime.
///
/// Over-generates sampled completions for a prompt, then hands the raw
/// candidates to the `CandidateFilter` for ranking. The model loads lazily:
/// the first generation call (or the startup warmup) drives
/// `Uninitialized -> Loading -> Ready`. The load runs as a detached task, so
/// a caller abandoning its request cannot strand the state machine in
/// `Loading`; concurrent callers wait for the one load instead of racing a
/// second one.
pub struct LocalGenerator {
    client: Client,
    base_url: String,
    filter: CandidateFilter,
    state_tx: watch::Sender<ModelState>,
    state_rx: watch::Receiver<ModelState>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    max_new_tokens: u32,
    num_return_sequences: usize,
    do_sample: bool,
    top_p: f32,
    top_k: u32,
    temperature: f32,
    repetition_penalty: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    completions: Vec<String>,
}

impl LocalGenerator {
    pub fn new(base_url: String, client: Client, filter: CandidateFilter) -> anyhow::Result<Self> {
        if base_url.is_empty() {
            anyhow::bail!("local runtime URL not provided");
        }
        tracing::info!(runtime = %base_url, "initialized local generator");
        let (state_tx, state_rx) = watch::channel(ModelState::Uninitialized);
        Ok(Self {
            client,
            base_url,
            filter,
            state_tx,
            state_rx,
        })
    }

    pub fn state(&self) -> ModelState {
        *self.state_rx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ModelState::Ready
    }

    /// Synchronous load-and-wait: returns once the model is `Ready`, errors
    /// once it is `Failed`. Exactly one load runs no matter how many callers
    /// arrive at once.
    pub async fn ensure_ready(&self) -> anyhow::Result<()> {
        let mut rx = self.state_tx.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            match current {
                ModelState::Ready => return Ok(()),
                ModelState::Failed => {
                    anyhow::bail!("local model failed to load and is unavailable")
                }
                ModelState::Loading => {
                    if rx.changed().await.is_err() {
                        anyhow::bail!("local generator dropped while loading");
                    }
                }
                ModelState::Uninitialized => {
                    let mut claimed = false;
                    self.state_tx.send_if_modified(|state| {
                        if *state == ModelState::Uninitialized {
                            *state = ModelState::Loading;
                            claimed = true;
                            true
                        } else {
                            false
                        }
                    });
                    if claimed {
                        self.spawn_load();
                    }
                }
            }
        }
    }

    fn spawn_load(&self) {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let state_tx = self.state_tx.clone();
        tokio::spawn(async move {
            tracing::info!("loading local generation model");
            let next = match load_runtime(&client, &base_url).await {
                Ok(()) => {
                    tracing::info!("local generation model ready");
                    ModelState::Ready
                }
                Err(e) => {
                    tracing::error!(error = ?e, "local model load failed");
                    ModelState::Failed
                }
            };
            state_tx.send_replace(next);
        });
    }

    async fn complete(&self, prompt: &str, n: usize) -> anyhow::Result<Vec<String>> {
        let request = CompletionRequest {
            prompt,
            max_new_tokens: 80,
            num_return_sequences: n,
            do_sample: true,
            top_p: 0.92,
            top_k: 50,
            temperature: 1.0,
            repetition_penalty: 1.2,
        };

        let resp = self
            .client
            .post(format!("{}/v1/generate", self.base_url))
            .json(&request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("runtime generate returned {}", status);
        }
        let parsed: CompletionResponse = resp.json().await?;
        Ok(parsed.completions)
    }

    pub async fn generate_false_statements(
        &self,
        partial_sentence: &str,
        full_sentence: &str,
        num_statements: usize,
    ) -> anyhow::Result<Vec<String>> {
        self.ensure_ready().await?;

        // Over-generate so the filter has enough material to choose from.
        let n = (num_statements * 3).max(10);
        let completions = self.complete(partial_sentence, n).await?;
        let raw: Vec<String> = completions
            .iter()
            .map(|c| join_continuation(partial_sentence, c))
            .collect();

        Ok(self
            .filter
            .select(full_sentence, raw, num_statements)
            .await)
    }

    /// Native batch path: the whole batch runs as one unit of work. Items are
    /// still isolated, a failed pair yields an empty slot.
    pub async fn generate_statements_batch(
        &self,
        pairs: &[(String, String)],
        num_statements: usize,
    ) -> anyhow::Result<Vec<Vec<String>>> {
        self.ensure_ready().await?;

        let mut results = Vec::with_capacity(pairs.len());
        for (index, (partial, full)) in pairs.iter().enumerate() {
            match self
                .generate_false_statements(partial, full, num_statements)
                .await
            {
                Ok(statements) => results.push(statements),
                Err(e) => {
                    tracing::error!(index, error = ?e, "batch pair failed");
                    results.push(Vec::new());
                }
            }
        }
        Ok(results)
    }
}

/// Health-check the runtime, then run a one-token completion so the runtime
/// pulls its weights into memory before real traffic arrives.
async fn load_runtime(client: &Client, base_url: &str) -> anyhow::Result<()> {
    let health = client.get(format!("{}/health", base_url)).send().await?;
    if !health.status().is_success() {
        anyhow::bail!("runtime health check returned {}", health.status());
    }

    let warmup = CompletionRequest {
        prompt: "The",
        max_new_tokens: 1,
        num_return_sequences: 1,
        do_sample: false,
        top_p: 1.0,
        top_k: 1,
        temperature: 1.0,
        repetition_penalty: 1.0,
    };
    let resp = client
        .post(format!("{}/v1/generate", base_url))
        .json(&warmup)
        .send()
        .await?;
    if !resp.status().is_success() {
        anyhow::bail!("runtime warmup returned {}", resp.status());
    }
    Ok(())
}

fn join_continuation(partial: &str, continuation: &str) -> String {
    let continuation = continuation.trim_start();
    if continuation.is_empty() {
        partial.trim_end().to_string()
    } else {
        format!("{} {}", partial.trim_end(), continuation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_normalizes_whitespace() {
        assert_eq!(
            join_continuation("The fox ", "  ran away."),
            "The fox ran away."
        );
        assert_eq!(join_continuation("The fox", ""), "The fox");
    }
}
