//! Gold data sources, the load-once cache, and the evaluation context.
//!
//! The gold standard is fetched once per session. [`GoldCache`] deduplicates
//! concurrent loads: callers arriving while a load is in flight await the same
//! result. A failed load leaves the cache empty so the next call retries.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::GoldConfig;
use crate::error::{EvalError, Result};
use crate::parse;
use crate::records::GoldStandard;

/// Where the gold document comes from.
#[async_trait]
pub trait GoldSource: Send + Sync {
    /// Human-readable location, used in errors and logs.
    fn location(&self) -> String;

    /// Fetch the raw gold document text.
    async fn fetch(&self) -> Result<String>;
}

/// Gold document on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileGoldSource {
    path: PathBuf,
}

impl FileGoldSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GoldSource for FileGoldSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

/// Gold document served over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpGoldSource {
    url: String,
    client: reqwest::Client,
}

impl HttpGoldSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl GoldSource for HttpGoldSource {
    fn location(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<String> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Pick an HTTP source for `http://`/`https://` locations, a file otherwise.
pub fn gold_source_from_location(location: &str, timeout: Duration) -> Result<Box<dyn GoldSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpGoldSource::new(location, timeout)?))
    } else {
        Ok(Box::new(FileGoldSource::new(location)))
    }
}

/// Build the gold source described by the configuration.
pub fn gold_source_from_config(config: &GoldConfig) -> Result<Box<dyn GoldSource>> {
    gold_source_from_location(&config.location, Duration::from_secs(config.timeout_secs))
}

/// Fetch and parse a gold document. Every failure is reported as
/// [`EvalError::GoldLoad`] naming the source.
pub async fn load_gold(source: &dyn GoldSource) -> Result<GoldStandard> {
    let location = source.location();
    let text = source
        .fetch()
        .await
        .map_err(|e| EvalError::gold_load(&location, e.to_string()))?;
    let gold =
        parse::parse_gold_str(&text).map_err(|e| EvalError::gold_load(&location, e.to_string()))?;
    info!(
        %location,
        dialogues = gold.dialogues.len(),
        turns = gold.turns.len(),
        "Loaded gold data"
    );
    Ok(gold)
}

/// Read-only gold data shared by every evaluation in a session.
///
/// Cheap to clone; safe to share across tasks.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    gold: Arc<GoldStandard>,
}

impl EvaluationContext {
    pub fn new(gold: GoldStandard) -> Self {
        Self {
            gold: Arc::new(gold),
        }
    }

    pub fn gold(&self) -> &GoldStandard {
        &self.gold
    }
}

/// Loads the gold standard at most once and hands out contexts over it.
pub struct GoldCache {
    source: Box<dyn GoldSource>,
    cell: OnceCell<EvaluationContext>,
}

impl GoldCache {
    pub fn new(source: Box<dyn GoldSource>) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    pub fn location(&self) -> String {
        self.source.location()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Return the cached context, loading the gold data first if needed.
    pub async fn get_or_load(&self) -> Result<EvaluationContext> {
        self.cell
            .get_or_try_init(|| async {
                load_gold(self.source.as_ref())
                    .await
                    .map(EvaluationContext::new)
                    .inspect_err(|e| warn!(error = %e, "Gold load failed; a later call will retry"))
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GOLD: &str = r#"[
        {"conv_id": "barcor_redial_1", "dial_level_aggregated": {"efficiency": 2.0},
         "dialogue": [{"role": "ASST", "turn_ind": 1, "turn_level_aggregated": {"relevance": 1.5}}]}
    ]"#;

    /// Counts fetches; fails the first `fail_first` of them.
    struct CountingSource {
        fetches: Arc<AtomicUsize>,
        fail_first: usize,
    }

    #[async_trait]
    impl GoldSource for CountingSource {
        fn location(&self) -> String {
            "memory://gold".into()
        }

        async fn fetch(&self) -> Result<String> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if n < self.fail_first {
                return Err(EvalError::Io(std::io::Error::other("unreachable")));
            }
            Ok(GOLD.to_string())
        }
    }

    #[tokio::test]
    async fn test_concurrent_loads_fetch_once() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let cache = GoldCache::new(Box::new(CountingSource {
            fetches: fetches.clone(),
            fail_first: 0,
        }));

        let (a, b, c) = tokio::join!(cache.get_or_load(), cache.get_or_load(), cache.get_or_load());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(cache.is_loaded());

        cache.get_or_load().await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let cache = GoldCache::new(Box::new(CountingSource {
            fetches: fetches.clone(),
            fail_first: 1,
        }));

        let err = cache.get_or_load().await.unwrap_err();
        assert!(matches!(err, EvalError::GoldLoad { .. }));
        assert!(!cache.is_loaded());

        let ctx = cache.get_or_load().await.unwrap();
        assert_eq!(ctx.gold().dialogues.len(), 1);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_file_source_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gold.json");
        std::fs::write(&path, GOLD).unwrap();

        let gold = load_gold(&FileGoldSource::new(&path)).await.unwrap();
        assert_eq!(gold.turns.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_gold_load_error() {
        let err = load_gold(&FileGoldSource::new("/nonexistent/crs_arena_eval.json"))
            .await
            .unwrap_err();
        match err {
            EvalError::GoldLoad { location, .. } => {
                assert_eq!(location, "/nonexistent/crs_arena_eval.json")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_gold_is_gold_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gold.json");
        std::fs::write(&path, r#"{"not": "an array"}"#).unwrap();
        assert!(matches!(
            load_gold(&FileGoldSource::new(&path)).await,
            Err(EvalError::GoldLoad { .. })
        ));
    }

    #[test]
    fn test_source_selection() {
        let timeout = Duration::from_secs(5);
        let http = gold_source_from_location("https://example.org/gold.json", timeout).unwrap();
        assert_eq!(http.location(), "https://example.org/gold.json");
        let file = gold_source_from_location("data/gold.json", timeout).unwrap();
        assert_eq!(file.location(), "data/gold.json");
    }
}
