//! Persisted exemplar store: flat index plus aligned metadata.
//!
//! [`ExemplarStore`] owns one committed generation of the index/metadata
//! pair (see [`manifest`]) and exposes build and search over it. Builds take
//! `&mut self`; searches take `&self`, so a loaded store can be shared by
//! readers while writers are serialized by the borrow checker or a lock
//! held by the caller.

pub mod builder;
pub mod manifest;
pub mod metadata;
pub mod search;
pub mod similarity;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{ErrorContext, ExemplarError, ExemplarResult};
use crate::types::{Record, SearchHit};
use crate::vector::{EmbeddingGenerator, EmbeddingRegistry, FastEmbedGenerator, FlatIndex};

pub use builder::{BuildMode, BuildReport, MAX_BATCH_SIZE};
pub use manifest::Manifest;
pub use metadata::MetadataStore;
pub use search::{CANDIDATE_MULTIPLIER, DEFAULT_DEDUP_THRESHOLD};

use builder::Embedder;

/// Writes `path` through a temporary file in the same directory, then
/// renames it into place.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> std::io::Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> std::io::Result<()>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let temp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Summary of the loaded store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub records: usize,
    pub dimension: usize,
    pub model_name: String,
    pub generation: u64,
    pub created_at: u64,
    pub updated_at: u64,
    pub data_dir: PathBuf,
}

impl StoreStats {
    fn from_manifest(manifest: &Manifest, data_dir: &Path) -> Self {
        Self {
            records: manifest.record_count,
            dimension: manifest.dimension,
            model_name: manifest.model_name.clone(),
            generation: manifest.generation,
            created_at: manifest.created_at,
            updated_at: manifest.updated_at,
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Statistics of the committed generation in `data_dir`, read from the
    /// manifest alone. No model is needed.
    pub fn read(data_dir: &Path) -> ExemplarResult<Self> {
        Manifest::load(data_dir).map(|manifest| Self::from_manifest(&manifest, data_dir))
    }
}

/// Index, metadata and the manifest that names them.
#[derive(Debug)]
struct Committed {
    index: FlatIndex,
    metadata: MetadataStore,
    manifest: Manifest,
}

pub struct ExemplarStore {
    data_dir: PathBuf,
    generator: Arc<dyn EmbeddingGenerator>,
    batch_size: usize,
    dedup_threshold: f64,
    progress: Option<ProgressBar>,
    state: Option<Committed>,
}

impl std::fmt::Debug for ExemplarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExemplarStore")
            .field("data_dir", &self.data_dir)
            .field("model", &self.generator.model_name())
            .field("batch_size", &self.batch_size)
            .field("dedup_threshold", &self.dedup_threshold)
            .field("records", &self.len())
            .finish()
    }
}

impl ExemplarStore {
    /// Store in `data_dir` embedding with `generator`. Nothing is read yet.
    pub fn new(data_dir: impl Into<PathBuf>, generator: Arc<dyn EmbeddingGenerator>) -> Self {
        Self {
            data_dir: data_dir.into(),
            generator,
            batch_size: MAX_BATCH_SIZE,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            progress: None,
            state: None,
        }
    }

    /// Store configured from `settings`, with its provider taken from
    /// `registry` (loaded on first use). `show_download_progress` lets the
    /// provider draw its own bar while fetching model files.
    pub fn open(
        settings: &Settings,
        registry: &EmbeddingRegistry,
        show_download_progress: bool,
    ) -> ExemplarResult<Self> {
        let options = settings.embedding.model_options(show_download_progress);
        let generator = registry.get_or_init(&settings.embedding.model, || {
            let generator: Arc<dyn EmbeddingGenerator> =
                Arc::new(FastEmbedGenerator::new(&options)?);
            Ok(generator)
        })?;

        Ok(Self::new(&settings.data_dir, generator)
            .with_batch_size(settings.embedding.effective_batch_size())
            .with_dedup_threshold(settings.search.dedup_threshold))
    }

    /// Texts per provider call; values outside 1 to 64 are clamped.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_dedup_threshold(mut self, threshold: f64) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    /// Progress bar advanced as records are embedded during builds.
    pub fn set_progress(&mut self, progress: Option<ProgressBar>) {
        self.progress = progress;
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn generator(&self) -> &Arc<dyn EmbeddingGenerator> {
        &self.generator
    }

    /// True when a committed generation is present on disk.
    pub fn exists(&self) -> bool {
        Manifest::exists(&self.data_dir)
    }

    /// Records in the loaded store, 0 if nothing is loaded.
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.metadata.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loaded records in index order.
    pub fn records(&self) -> Option<&[Record]> {
        self.state.as_ref().map(|s| s.metadata.records())
    }

    /// Reads the committed generation into memory.
    ///
    /// Fails with `NotFound` when nothing has been committed and with
    /// `CorruptState` when the artifacts disagree with each other or with
    /// the active embedding model.
    pub fn load(&mut self) -> ExemplarResult<()> {
        let committed = read_committed(&self.data_dir, self.generator.as_ref())?;
        info!(
            generation = committed.manifest.generation,
            records = committed.metadata.len(),
            "Loaded exemplar store"
        );
        self.state = Some(committed);
        Ok(())
    }

    /// Builds the store from `corpus` and commits it.
    ///
    /// With `incremental` set and a committed generation present, only
    /// records whose `raw` text is not stored yet are embedded and appended.
    /// If anything on that path fails the whole corpus is rebuilt instead
    /// and the original error is logged, not returned. Errors from a full
    /// build are returned.
    pub fn build(&mut self, corpus: &[Record], incremental: bool) -> ExemplarResult<BuildReport> {
        let mut fell_back = false;

        if incremental && self.exists() {
            match self.build_incremental(corpus) {
                Ok(report) => return Ok(report),
                Err(e) => {
                    warn!("Incremental build failed, rebuilding from the full corpus: {e}");
                    fell_back = true;
                }
            }
        }

        info!(records = corpus.len(), "Full build");
        let (index, metadata) = {
            let embedder = self.embedder();
            builder::full_build(&embedder, corpus)?
        };
        let committed = self.commit(index, metadata)?;
        let total = committed.metadata.len();
        self.state = Some(committed);

        Ok(BuildReport {
            mode: BuildMode::Full,
            total,
            added: total,
            fell_back,
        })
    }

    fn build_incremental(&mut self, corpus: &[Record]) -> ExemplarResult<BuildReport> {
        let existing = read_committed(&self.data_dir, self.generator.as_ref())?;
        let additions = builder::new_records(&existing.metadata, corpus);
        info!(
            existing = existing.metadata.len(),
            new = additions.len(),
            "Incremental build"
        );

        if additions.is_empty() {
            let total = existing.metadata.len();
            self.state = Some(existing);
            return Ok(BuildReport {
                mode: BuildMode::UpToDate,
                total,
                added: 0,
                fell_back: false,
            });
        }

        let added = additions.len();
        let (index, metadata) = {
            let embedder = self.embedder();
            builder::append(&embedder, existing.index, existing.metadata, &additions)?
        };
        let committed = self.commit(index, metadata)?;
        let total = committed.metadata.len();
        self.state = Some(committed);

        Ok(BuildReport {
            mode: BuildMode::Incremental,
            total,
            added,
            fell_back: false,
        })
    }

    /// Up to `k` distinct records nearest to `query`, nearest first.
    pub fn search(&self, query: &str, k: usize) -> ExemplarResult<Vec<SearchHit>> {
        let state = self.state.as_ref().ok_or_else(|| ExemplarError::InvalidState {
            reason: "store is not loaded; call load() or build() first".to_string(),
        })?;

        search::search(
            self.generator.as_ref(),
            &state.index,
            &state.metadata,
            query,
            k,
            self.dedup_threshold,
        )
    }

    /// Statistics of the loaded generation.
    pub fn stats(&self) -> Option<StoreStats> {
        self.state
            .as_ref()
            .map(|state| StoreStats::from_manifest(&state.manifest, &self.data_dir))
    }

    fn embedder(&self) -> Embedder<'_> {
        Embedder::new(
            self.generator.as_ref(),
            self.batch_size,
            self.progress.as_ref(),
        )
    }

    /// Writes both artifacts under a new generation, then swaps the
    /// manifest. The previous generation stays readable until the swap.
    fn commit(&self, index: FlatIndex, metadata: MetadataStore) -> ExemplarResult<Committed> {
        std::fs::create_dir_all(&self.data_dir).with_path(&self.data_dir)?;

        let created_at = Manifest::load(&self.data_dir).ok().map(|m| m.created_at);
        let generation = Manifest::next_generation(&self.data_dir);
        let manifest = Manifest::new(
            generation,
            self.generator.model_name(),
            self.generator.dimension().get(),
            metadata.len(),
            created_at,
        );

        let index_path = manifest.index_path(&self.data_dir);
        index
            .persist(&index_path)
            .map_err(|e| ExemplarError::from_vector(e, &index_path))?;
        metadata.persist(&manifest.metadata_path(&self.data_dir))?;
        manifest.save(&self.data_dir)?;
        manifest.remove_stale_artifacts(&self.data_dir);

        info!(generation, records = metadata.len(), "Committed store");
        Ok(Committed {
            index,
            metadata,
            manifest,
        })
    }
}

/// Loads and cross-checks the generation named by the manifest.
fn read_committed(
    data_dir: &Path,
    generator: &dyn EmbeddingGenerator,
) -> ExemplarResult<Committed> {
    let manifest = Manifest::load(data_dir)?;
    let manifest_path = Manifest::path(data_dir);
    let corrupt = |reason: String| ExemplarError::CorruptState {
        path: manifest_path.clone(),
        reason,
    };

    if manifest.model_name != generator.model_name() {
        return Err(corrupt(format!(
            "built with model '{}', active model is '{}'",
            manifest.model_name,
            generator.model_name()
        )));
    }
    if manifest.dimension != generator.dimension().get() {
        return Err(corrupt(format!(
            "built with dimension {}, active model produces {}",
            manifest.dimension,
            generator.dimension()
        )));
    }

    let index_path = manifest.index_path(data_dir);
    let index =
        FlatIndex::load(&index_path).map_err(|e| ExemplarError::from_vector(e, &index_path))?;
    let metadata = MetadataStore::load(&manifest.metadata_path(data_dir))?;
    debug!(
        index = index.len(),
        metadata = metadata.len(),
        "Read committed artifacts"
    );

    if index.dimension().map(|d| d.get()) != Some(manifest.dimension) {
        return Err(corrupt(format!(
            "index dimension does not match manifest dimension {}",
            manifest.dimension
        )));
    }
    if index.len() != metadata.len() || metadata.len() != manifest.record_count {
        return Err(corrupt(format!(
            "index has {} vectors, metadata has {} records, manifest expects {}",
            index.len(),
            metadata.len(),
            manifest.record_count
        )));
    }

    Ok(Committed {
        index,
        metadata,
        manifest,
    })
}
