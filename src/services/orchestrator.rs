use crate::models::qa::QaOutput;
use crate::services::claude_generator::ClaudeGenerator;
use crate::services::local_generator::LocalGenerator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Closed set of generator backends. Requests address them by this tag and
/// responses carry back which one actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Claude,
    Local,
}

impl GeneratorKind {
    /// Fallback resolution order: the rich remote generator first, the local
    /// runtime as the degraded path.
    pub const FALLBACK_ORDER: [GeneratorKind; 2] = [GeneratorKind::Claude, GeneratorKind::Local];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Claude => "claude",
            GeneratorKind::Local => "local",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered adapter. A closed tagged variant rather than a trait
/// object: the set of backends is known at compile time.
pub enum GeneratorAdapter {
    Claude(ClaudeGenerator),
    Local(LocalGenerator),
}

impl GeneratorAdapter {
    pub fn is_ready(&self) -> bool {
        match self {
            // The remote API needs no loading; a configured client is ready.
            GeneratorAdapter::Claude(_) => true,
            GeneratorAdapter::Local(local) => local.is_ready(),
        }
    }

    /// Whether the adapter can run a whole batch as one unit of work.
    pub fn supports_batch(&self) -> bool {
        matches!(self, GeneratorAdapter::Local(_))
    }

    pub fn supports_qa(&self) -> bool {
        matches!(self, GeneratorAdapter::Claude(_))
    }

    pub async fn generate_false_statements(
        &self,
        partial_sentence: &str,
        full_sentence: &str,
        num_statements: usize,
    ) -> anyhow::Result<Vec<String>> {
        match self {
            GeneratorAdapter::Claude(claude) => {
                claude
                    .generate_false_statements(partial_sentence, full_sentence, num_statements)
                    .await
            }
            GeneratorAdapter::Local(local) => {
                local
                    .generate_false_statements(partial_sentence, full_sentence, num_statements)
                    .await
            }
        }
    }

    /// Adapter-native batch. Falls back to a sequential loop for adapters
    /// without one; the orchestrator prefers its own concurrent fan-out for
    /// those.
    pub async fn generate_statements_batch(
        &self,
        pairs: &[(String, String)],
        num_statements: usize,
    ) -> anyhow::Result<Vec<Vec<String>>> {
        match self {
            GeneratorAdapter::Local(local) => {
                local.generate_statements_batch(pairs, num_statements).await
            }
            GeneratorAdapter::Claude(claude) => {
                let mut results = Vec::with_capacity(pairs.len());
                for (partial, full) in pairs {
                    results.push(
                        claude
                            .generate_false_statements(partial, full, num_statements)
                            .await
                            .unwrap_or_default(),
                    );
                }
                Ok(results)
            }
        }
    }

    /// Eager background initialization. Errors are logged, not propagated:
    /// a failed warmup leaves the adapter to retry nothing — the kind simply
    /// reports not-ready.
    pub async fn warmup(&self) {
        if let GeneratorAdapter::Local(local) = self {
            if let Err(e) = local.ensure_ready().await {
                tracing::error!(error = ?e, "local generator warmup failed");
            }
        }
    }
}

/// Outcome of a single generation request. Distinguishes "the generator ran
/// and produced nothing usable" from "no generator exists to run".
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Generated {
        statements: Vec<String>,
        generator: GeneratorKind,
    },
    Empty {
        generator: GeneratorKind,
        reason: String,
    },
    Unavailable,
}

impl GenerationOutcome {
    pub fn generator(&self) -> Option<GeneratorKind> {
        match self {
            GenerationOutcome::Generated { generator, .. }
            | GenerationOutcome::Empty { generator, .. } => Some(*generator),
            GenerationOutcome::Unavailable => None,
        }
    }

    pub fn into_statements(self) -> Vec<String> {
        match self {
            GenerationOutcome::Generated { statements, .. } => statements,
            _ => Vec::new(),
        }
    }
}

/// Outcome of a batch request. `items` is always positionally aligned with
/// the input pairs; failed items hold an empty list.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Completed {
        items: Vec<Vec<String>>,
        generator: GeneratorKind,
    },
    Unavailable,
}

/// Central registry and dispatcher for generator adapters: the single source
/// of truth for which generator kinds are usable, with bounded concurrency
/// and batch timeout handling.
pub struct Orchestrator {
    generators: HashMap<GeneratorKind, Arc<GeneratorAdapter>>,
    permits: Arc<Semaphore>,
    max_workers: usize,
    batch_item_timeout: Duration,
    batch_min_timeout: Duration,
    drain_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        max_workers: usize,
        batch_item_timeout: Duration,
        batch_min_timeout: Duration,
        drain_timeout: Duration,
    ) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            generators: HashMap::new(),
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            batch_item_timeout,
            batch_min_timeout,
            drain_timeout,
        }
    }

    /// Register the result of an adapter's fallible constructor. A failed
    /// initialization leaves the kind unregistered and the process running:
    /// the service degrades to fewer available generators.
    pub fn register(&mut self, kind: GeneratorKind, adapter: anyhow::Result<GeneratorAdapter>) {
        match adapter {
            Ok(adapter) => {
                tracing::info!(kind = %kind, "generator registered");
                self.generators.insert(kind, Arc::new(adapter));
            }
            Err(e) => {
                tracing::error!(kind = %kind, error = ?e, "failed to initialize generator, continuing without it");
            }
        }
    }

    /// Lookup with fallback: the requested kind if registered, otherwise the
    /// first registered kind in the fallback order.
    pub fn resolve(
        &self,
        requested: Option<GeneratorKind>,
    ) -> Option<(GeneratorKind, Arc<GeneratorAdapter>)> {
        if let Some(kind) = requested {
            if let Some(adapter) = self.generators.get(&kind) {
                return Some((kind, adapter.clone()));
            }
            tracing::warn!(kind = %kind, "requested generator not available, using fallback");
        }
        GeneratorKind::FALLBACK_ORDER.iter().find_map(|kind| {
            self.generators
                .get(kind)
                .map(|adapter| (*kind, adapter.clone()))
        })
    }

    /// Synchronous single generation. Adapter failures degrade to `Empty`,
    /// never propagate.
    pub async fn generate_one(
        &self,
        requested: Option<GeneratorKind>,
        partial_sentence: &str,
        full_sentence: &str,
        num_statements: usize,
    ) -> GenerationOutcome {
        let Some((kind, adapter)) = self.resolve(requested) else {
            tracing::error!("no generator available");
            return GenerationOutcome::Unavailable;
        };

        match adapter
            .generate_false_statements(partial_sentence, full_sentence, num_statements)
            .await
        {
            Ok(statements) if statements.is_empty() => GenerationOutcome::Empty {
                generator: kind,
                reason: "no usable candidates survived filtering".to_string(),
            },
            Ok(statements) => GenerationOutcome::Generated {
                statements,
                generator: kind,
            },
            Err(e) => {
                tracing::error!(kind = %kind, error = ?e, "error generating false statements");
                GenerationOutcome::Empty {
                    generator: kind,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Single generation under a worker permit. Suspends while the pool is
    /// saturated; abandoning the returned future releases the slot.
    pub async fn generate_one_bounded(
        &self,
        requested: Option<GeneratorKind>,
        partial_sentence: &str,
        full_sentence: &str,
        num_statements: usize,
    ) -> GenerationOutcome {
        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            // Closed semaphore means the orchestrator is shutting down.
            Err(_) => return GenerationOutcome::Unavailable,
        };
        let outcome = self
            .generate_one(requested, partial_sentence, full_sentence, num_statements)
            .await;
        drop(permit);
        outcome
    }

    /// Batch generation. Uses the adapter's native batch when it has one
    /// (one worker slot, overall timeout `max(min, per_item * n)`, timeout
    /// discards the whole batch); otherwise fans out bounded per-item tasks
    /// joined in input order, where each item fails independently.
    pub async fn generate_batch(
        &self,
        requested: Option<GeneratorKind>,
        pairs: Vec<(String, String)>,
        num_statements: usize,
    ) -> BatchOutcome {
        let Some((kind, adapter)) = self.resolve(requested) else {
            tracing::error!("no generator available for batch processing");
            return BatchOutcome::Unavailable;
        };
        if self.permits.is_closed() {
            return BatchOutcome::Unavailable;
        }
        let item_count = pairs.len();

        if adapter.supports_batch() {
            let timeout = self
                .batch_min_timeout
                .max(self.batch_item_timeout * item_count as u32);

            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return BatchOutcome::Unavailable,
            };
            let batch = adapter.generate_statements_batch(&pairs, num_statements);
            let items = match tokio::time::timeout(timeout, batch).await {
                Ok(Ok(mut items)) => {
                    items.resize(item_count, Vec::new());
                    items
                }
                Ok(Err(e)) => {
                    tracing::error!(kind = %kind, error = ?e, "native batch generation failed");
                    vec![Vec::new(); item_count]
                }
                Err(_) => {
                    tracing::error!(
                        kind = %kind,
                        timeout_secs = timeout.as_secs(),
                        "batch generation timed out"
                    );
                    vec![Vec::new(); item_count]
                }
            };
            drop(permit);
            return BatchOutcome::Completed {
                items,
                generator: kind,
            };
        }

        let mut handles = Vec::with_capacity(item_count);
        for (index, (partial, full)) in pairs.into_iter().enumerate() {
            let adapter = adapter.clone();
            let permits = self.permits.clone();
            let item_timeout = self.batch_item_timeout;
            handles.push(tokio::spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Vec::new(),
                };
                let generation =
                    adapter.generate_false_statements(&partial, &full, num_statements);
                match tokio::time::timeout(item_timeout, generation).await {
                    Ok(Ok(statements)) => statements,
                    Ok(Err(e)) => {
                        tracing::error!(index, error = ?e, "error in batch item");
                        Vec::new()
                    }
                    Err(_) => {
                        tracing::error!(index, "batch item timed out");
                        Vec::new()
                    }
                }
            }));
        }

        // Joined in input order: results are positionally aligned, never
        // reordered by completion time.
        let mut items = Vec::with_capacity(item_count);
        for handle in handles {
            items.push(handle.await.unwrap_or_default());
        }
        BatchOutcome::Completed {
            items,
            generator: kind,
        }
    }

    /// Multiple-choice Q&A from raw text, dispatched to the first registered
    /// generator that can produce it. `None` when no capable generator is
    /// registered.
    pub async fn generate_qa(&self, text: &str, num_questions: usize) -> Option<QaOutput> {
        let adapter = GeneratorKind::FALLBACK_ORDER
            .iter()
            .filter_map(|kind| self.generators.get(kind))
            .find(|adapter| adapter.supports_qa())?
            .clone();

        let permit = self.permits.clone().acquire_owned().await.ok()?;
        let output = match &*adapter {
            GeneratorAdapter::Claude(claude) => claude.generate_qa(text, num_questions).await,
            GeneratorAdapter::Local(_) => return None,
        };
        drop(permit);
        Some(output)
    }

    /// Readiness per kind, for the health surface. Unregistered kinds report
    /// `false`.
    pub fn readiness(&self) -> BTreeMap<&'static str, bool> {
        GeneratorKind::FALLBACK_ORDER
            .iter()
            .map(|kind| {
                (
                    kind.as_str(),
                    self.generators
                        .get(kind)
                        .map(|adapter| adapter.is_ready())
                        .unwrap_or(false),
                )
            })
            .collect()
    }

    pub fn has_generators(&self) -> bool {
        !self.generators.is_empty()
    }

    /// Eagerly initialize adapters in the background so the first request
    /// does not pay the model load.
    pub fn spawn_warmup(&self) {
        for adapter in self.generators.values() {
            let adapter = adapter.clone();
            tokio::spawn(async move {
                adapter.warmup().await;
            });
        }
    }

    /// Graceful drain: wait (bounded) for in-flight generation work to
    /// finish, then stop accepting new work.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down generator orchestrator");
        match tokio::time::timeout(
            self.drain_timeout,
            self.permits.acquire_many(self.max_workers as u32),
        )
        .await
        {
            Ok(Ok(_permits)) => tracing::info!("generation workers drained"),
            _ => tracing::warn!("drain timed out, abandoning in-flight generation work"),
        }
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&GeneratorKind::Claude).unwrap(),
            "\"claude\""
        );
        let parsed: GeneratorKind = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(parsed, GeneratorKind::Local);
    }

    #[test]
    fn fallback_order_prefers_claude() {
        assert_eq!(
            GeneratorKind::FALLBACK_ORDER,
            [GeneratorKind::Claude, GeneratorKind::Local]
        );
    }

    #[tokio::test]
    async fn empty_registry_reports_unavailable() {
        let orchestrator = Orchestrator::new(
            2,
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(!orchestrator.has_generators());
        let outcome = orchestrator
            .generate_one(None, "The fox", "The fox ran away.", 3)
            .await;
        assert_eq!(outcome, GenerationOutcome::Unavailable);

        let batch = orchestrator
            .generate_batch(None, vec![("a".into(), "b".into())], 3)
            .await;
        assert_eq!(batch, BatchOutcome::Unavailable);
        assert!(orchestrator.generate_qa("some text", 3).await.is_none());
    }

    #[tokio::test]
    async fn readiness_reports_unregistered_kinds() {
        let orchestrator = Orchestrator::new(
            2,
            Duration::from_secs(1),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let readiness = orchestrator.readiness();
        assert_eq!(readiness.get("claude"), Some(&false));
        assert_eq!(readiness.get("local"), Some(&false));
    }
}
