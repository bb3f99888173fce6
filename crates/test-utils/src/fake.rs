use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use watchbuild::errors::Result;
use watchbuild::handlers::Handler;
use watchbuild::watch::{Batch, BatchControl, BatchSink, ChangeSet, ChangeSource};

/// A fake handler that:
/// - records which inputs were "built" (and which were deleted)
/// - writes every output file itself, so modification times advance the way
///   the orchestrator expects.
///
/// Failure can be scripted through the shared `fail` flag.
pub struct FakeHandler {
    name: String,
    extension: String,
    suffix: String,
    pub built: Arc<Mutex<Vec<String>>>,
    pub deleted: Arc<Mutex<Vec<String>>>,
    pub fail: Arc<AtomicBool>,
}

impl FakeHandler {
    /// Matches `*{extension}` anywhere under the source root and maps each
    /// input to a single `{input}{suffix}` output.
    pub fn new(name: &str, extension: &str, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            extension: extension.to_string(),
            suffix: suffix.to_string(),
            built: Arc::new(Mutex::new(Vec::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn built_inputs(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

impl Handler for FakeHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, rel: &str) -> bool {
        rel.ends_with(&self.extension)
    }

    fn declare_outputs(&self, rel: &str) -> Vec<String> {
        vec![format!("{rel}{}", self.suffix)]
    }

    fn build<'a>(
        &'a self,
        input: &'a Path,
        outputs: &'a [PathBuf],
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(anyhow::anyhow!("scripted build failure for {:?}", input).into());
            }

            let data = tokio::fs::read(input).await?;
            for output in outputs {
                tokio::fs::write(output, &data).await?;
            }

            let mut guard = self.built.lock().unwrap();
            guard.push(input.display().to_string());
            Ok(())
        })
    }

    fn on_deleted(&mut self, _src_root: &Path, rel: &str) {
        self.deleted.lock().unwrap().push(rel.to_string());
    }
}

/// A change source that replays a scripted sequence of diffs.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    queue: VecDeque<ChangeSet>,
}

impl ScriptedSource {
    pub fn new(sets: Vec<ChangeSet>) -> Self {
        Self {
            queue: sets.into(),
        }
    }

    /// A source with nothing to report (`pending()` is always false).
    pub fn silent() -> Self {
        Self::default()
    }
}

impl ChangeSource for ScriptedSource {
    fn pending(&self) -> bool {
        !self.queue.is_empty()
    }

    fn diff(&mut self) -> ChangeSet {
        self.queue.pop_front().unwrap_or_default()
    }
}

/// A batch sink that records every batch it receives and stops after a
/// scripted number of them.
pub struct RecordingSink {
    pub batches: Arc<Mutex<Vec<Batch>>>,
    stop_after: Option<usize>,
}

impl RecordingSink {
    pub fn new(stop_after: Option<usize>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            stop_after,
        }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl BatchSink for RecordingSink {
    fn process_batch(
        &mut self,
        batch: Batch,
    ) -> Pin<Box<dyn Future<Output = Result<BatchControl>> + Send + '_>> {
        Box::pin(async move {
            let mut guard = self.batches.lock().unwrap();
            guard.push(batch);
            let seen = guard.len();
            drop(guard);

            match self.stop_after {
                Some(limit) if seen >= limit => Ok(BatchControl::Stop),
                _ => Ok(BatchControl::Continue),
            }
        })
    }
}
