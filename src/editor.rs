//! Editing session over a sign sequence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::asset::{AssetResolver, AssetSource, BlobRegistry};
use crate::config::{CanvasConfig, ConfigError};
use crate::drag::{DragError, DragSource, DragState};
use crate::export::{ExportError, ExportJob, ExportOptions};
use crate::font::{FontError, FontResource};
use crate::generate::{BandSide, ContentGenerator, Generated, GenerationError};
use crate::history::History;
use crate::layout::{AspectCache, Geometry};
use crate::sequence::{
    CustomContent, Direction, IconId, IconRef, InsertionPoint, InvalidCustomization, Sequence,
    TextContent,
};
use crate::store::{SequenceStore, StoreError};

// ============================================================================
// Configurable Trait
// ============================================================================

/// Trait for types whose state can be captured as a [`CanvasConfig`].
pub trait Configurable {
    type Error;

    /// Replaces this instance's state with the configuration's.
    fn apply_config(&mut self, config: &CanvasConfig) -> Result<(), Self::Error>;

    /// Exports the current state as a configuration.
    fn export_config(&self) -> CanvasConfig;
}

/// Errors raised by [`Editor`] operations.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("the canvas is locked while an export is in progress")]
    ExportInProgress,
    #[error("finish the current drag first")]
    DragInProgress,
    #[error(transparent)]
    Customization(#[from] InvalidCustomization),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Drag(#[from] DragError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Font(#[from] FontError),
}

// ============================================================================
// Editor
// ============================================================================

/// An editing session.
///
/// `Editor` owns the committed sequence and everything that derives from or
/// guards it:
///
/// - **History**: every committed change is recorded; drag previews are not.
/// - **Blobs**: generated and imported content, shared with the resolver.
/// - **Drag**: a preview sequence shown by [`canvas`](Self::canvas) until the
///   drag is dropped or cancelled.
/// - **Export lock**: while an [`ExportJob`] from
///   [`begin_export`](Self::begin_export) is alive, mutations fail with
///   [`EditorError::ExportInProgress`].
/// - **Store**: when attached, every committed change is mirrored to disk.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use signboard_renderer::{Direction, Editor, FontResource, MemoryAssets};
///
/// let assets = MemoryAssets::new()
///     .with("line@01.svg", r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 150 150"/>"#);
/// let mut editor = Editor::new(Arc::new(assets), FontResource::new());
///
/// let a = editor.add_file("line@01.svg").unwrap();
/// let b = editor.add_file("line@01.svg").unwrap();
/// editor.move_adjacent(b, Direction::Left).unwrap();
/// assert_eq!(editor.sequence().ids(), vec![b, a]);
///
/// editor.undo().unwrap();
/// assert_eq!(editor.sequence().ids(), vec![a, b]);
/// ```
pub struct Editor {
    sequence: Sequence,
    history: History<Sequence>,
    resolver: AssetResolver,
    font: FontResource,
    generator: ContentGenerator,
    aspects: AspectCache,
    drag: DragState,
    exporting: Arc<AtomicBool>,
    options: ExportOptions,
    store: Option<SequenceStore>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("items", &self.sequence.len())
            .field("history", &self.history.len())
            .field("dragging", &self.drag.is_dragging())
            .field("exporting", &self.is_exporting())
            .finish_non_exhaustive()
    }
}

impl Editor {
    /// Creates an empty editor over `assets`.
    ///
    /// `font` may still be loading; text generation and export report
    /// "font not ready" until it is set.
    pub fn new(assets: Arc<dyn AssetSource>, font: FontResource) -> Self {
        let resolver = AssetResolver::new(assets, BlobRegistry::new());
        let generator = ContentGenerator::new(resolver.clone(), font.clone());
        Self {
            sequence: Sequence::new(),
            history: History::seeded(Sequence::new()),
            resolver,
            font,
            generator,
            aspects: AspectCache::new(),
            drag: DragState::default(),
            exporting: Arc::new(AtomicBool::new(false)),
            options: ExportOptions::default(),
            store: None,
        }
    }

    /// Attaches a store and restores its saved sequence as the starting
    /// state.
    pub fn with_store(mut self, store: SequenceStore) -> Self {
        let restored = store.load(self.resolver.blobs());
        tracing::info!(items = restored.len(), path = %store.path().display(), "restored sequence");
        self.history.reset(restored.clone());
        self.sequence = restored;
        self.store = Some(store);
        self
    }

    /// Replaces the text generator, e.g. to use a real text measurer.
    pub fn with_generator(mut self, generator: ContentGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_export_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    /// Caps the number of undo steps kept; the oldest are dropped first.
    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history.set_max_depth(depth);
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The committed sequence.
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// The sequence on screen: the drag preview while dragging, otherwise
    /// the committed sequence.
    pub fn displayed(&self) -> &Sequence {
        self.drag
            .session()
            .map_or(&self.sequence, |session| session.preview())
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    pub fn blobs(&self) -> &BlobRegistry {
        self.resolver.blobs()
    }

    pub fn font(&self) -> &FontResource {
        &self.font
    }

    pub fn generator(&self) -> &ContentGenerator {
        &self.generator
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn export_options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn set_export_options(&mut self, options: ExportOptions) {
        self.options = options;
    }

    /// Supplies the font once it has finished loading.
    pub fn load_font(&self, bytes: impl Into<Arc<[u8]>>) -> Result<(), EditorError> {
        self.font.set(bytes)?;
        Ok(())
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::Acquire)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Lays out the displayed sequence at scale 1.
    pub fn canvas(&mut self) -> Geometry {
        let items = match self.drag.session() {
            Some(session) => session.preview().items(),
            None => self.sequence.items(),
        };
        let ratios = self.aspects.ratios(items, &self.resolver);
        Geometry::compute(items, &ratios, &self.options.spacing(), 1.0)
    }

    /// The displayed element under a canvas point, for click selection.
    pub fn element_at(&mut self, x: f32, y: f32) -> Option<IconId> {
        self.canvas().hit_test(x, y)
    }

    // ------------------------------------------------------------------------
    // Sequence operations
    // ------------------------------------------------------------------------

    /// Appends an element and returns its id.
    pub fn add(&mut self, icon: IconRef) -> Result<IconId, EditorError> {
        self.ensure_unlocked()?;
        let id = icon.id();
        tracing::debug!(%id, file = %icon.file(), "adding element");
        let next = self.sequence.add(icon);
        self.commit(next);
        Ok(id)
    }

    /// Appends a static asset by name.
    pub fn add_file(&mut self, file: &str) -> Result<IconId, EditorError> {
        self.add(IconRef::new(file)?)
    }

    /// Removes an element. Ids not on the canvas are ignored.
    pub fn remove(&mut self, id: IconId) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        if self.lookup(id).is_none() {
            return Ok(());
        }
        tracing::debug!(%id, "removing element");
        let next = self.sequence.remove(id);
        self.commit(next);
        Ok(())
    }

    /// Swaps an element with its neighbor. A move past either end is a
    /// no-op and records nothing, as is an id not on the canvas.
    pub fn move_adjacent(&mut self, id: IconId, direction: Direction) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        let next = self.sequence.move_adjacent(id, direction);
        self.commit(next);
        Ok(())
    }

    /// Inserts a copy right after the element and returns the copy's id,
    /// or `None` if `id` is not on the canvas.
    pub fn duplicate(&mut self, id: IconId) -> Result<Option<IconId>, EditorError> {
        self.ensure_unlocked()?;
        let Some(index) = self.lookup(id) else {
            return Ok(None);
        };
        let next = self.sequence.duplicate(id);
        let copy = next.items().get(index + 1).map(IconRef::id);
        self.commit(next);
        Ok(copy)
    }

    /// Relocates an element. Ids not on the canvas are ignored.
    pub fn reorder_to(&mut self, id: IconId, target: InsertionPoint) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        let next = self.sequence.reorder_to(id, target);
        self.commit(next);
        Ok(())
    }

    /// Removes every element.
    pub fn clear(&mut self) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        self.commit(Sequence::new());
        Ok(())
    }

    /// Replaces an element's source and custom content in one step.
    /// Ids not on the canvas are ignored.
    pub fn customize(&mut self, id: IconId, generated: Generated) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        let Some(index) = self.lookup(id) else {
            return Ok(());
        };
        let replaced = generated.apply_to(&self.sequence.items()[index])?;
        let next = self.sequence.replace(replaced);
        self.commit(next);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Generated content
    // ------------------------------------------------------------------------

    /// Generates a bilingual text element and appends it.
    pub fn add_text(&mut self, text: TextContent) -> Result<IconId, EditorError> {
        self.ensure_unlocked()?;
        let generated = self.generator.text(text)?;
        self.add(generated.into_icon()?)
    }

    /// Generates text above a color band and appends it.
    pub fn add_text_band(&mut self, text: TextContent, color: &str) -> Result<IconId, EditorError> {
        self.ensure_unlocked()?;
        let generated = self.generator.text_band(text, color)?;
        self.add(generated.into_icon()?)
    }

    /// Generates a plain color band and appends it.
    pub fn add_band(&mut self, side: BandSide, color: &str) -> Result<IconId, EditorError> {
        self.ensure_unlocked()?;
        let generated = self.generator.band(side, color)?;
        self.add(generated.into_icon()?)
    }

    /// Regenerates an element's text, keeping its band color if it has one.
    pub fn edit_text(&mut self, id: IconId, text: TextContent) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        let Some(index) = self.lookup(id) else {
            return Ok(());
        };
        let generated = match self.sequence.items()[index].custom_content() {
            Some(CustomContent::TextBand { color, .. }) => {
                self.generator.text_band(text, color)?
            }
            _ => self.generator.text(text)?,
        };
        self.customize(id, generated)
    }

    /// Recolors an element.
    ///
    /// Text bands are regenerated with the new band color; other colorable
    /// elements are recolored from their original asset.
    pub fn recolor(&mut self, id: IconId, color: &str) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        let Some(index) = self.lookup(id) else {
            return Ok(());
        };
        let icon = &self.sequence.items()[index];
        let generated = match icon.custom_content() {
            Some(CustomContent::TextBand { text, .. }) => {
                self.generator.text_band(text.clone(), color)?
            }
            _ => self.generator.recolor(&base_asset(icon.file()), color)?,
        };
        self.customize(id, generated)
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    /// Steps back one committed change. Returns false at the oldest state.
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        self.ensure_unlocked()?;
        let Some(state) = self.history.undo() else {
            return Ok(false);
        };
        self.sequence = Sequence::clone(&state);
        self.persist();
        Ok(true)
    }

    /// Steps forward one undone change. Returns false at the newest state.
    pub fn redo(&mut self) -> Result<bool, EditorError> {
        self.ensure_unlocked()?;
        let Some(state) = self.history.redo() else {
            return Ok(false);
        };
        self.sequence = Sequence::clone(&state);
        self.persist();
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Drag and drop
    // ------------------------------------------------------------------------

    /// Starts dragging an element on the canvas or a new one from the palette.
    pub fn begin_drag(&mut self, source: DragSource) -> Result<(), EditorError> {
        if self.is_exporting() {
            return Err(EditorError::ExportInProgress);
        }
        self.drag.begin(self.sequence.clone(), source)?;
        Ok(())
    }

    /// Moves the pointer to `pointer_x` in canvas coordinates. Returns true
    /// if the preview order changed.
    pub fn drag_move(&mut self, pointer_x: f32) -> Result<bool, EditorError> {
        let Some(session) = self.drag.session() else {
            return Err(DragError::NotDragging.into());
        };
        let dragged = session.source().id();
        let boxes = self.canvas().hit_boxes(Some(dragged));
        Ok(self.drag.update(pointer_x, &boxes)?)
    }

    /// Commits the preview order as one history entry.
    pub fn drop_drag(&mut self) -> Result<(), EditorError> {
        let session = self.drag.finish()?;
        if self.is_exporting() {
            tracing::warn!("export started during drag; discarding drop");
            return Err(EditorError::ExportInProgress);
        }
        self.commit(session.commit());
        Ok(())
    }

    /// Abandons the drag; the committed sequence is untouched.
    pub fn cancel_drag(&mut self) -> Result<(), EditorError> {
        self.drag.finish()?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Export and configuration
    // ------------------------------------------------------------------------

    /// Starts an export of the committed sequence with the current options.
    ///
    /// The editor is locked until the returned job is dropped.
    pub fn begin_export(&mut self) -> Result<ExportJob, EditorError> {
        // Warm the cache so the job can reserve slots for content that fails to load.
        self.aspects.ratios(self.sequence.items(), &self.resolver);
        let job = ExportJob::start(
            &self.exporting,
            self.sequence.clone(),
            self.resolver.clone(),
            self.font.clone(),
            self.aspects.clone(),
            self.options.clone(),
        )?;
        Ok(job)
    }

    /// Serializes the committed sequence as a configuration document.
    pub fn export_config_json(&self) -> Result<String, EditorError> {
        Ok(self.export_config().to_json()?)
    }

    /// Replaces the sequence with a configuration document's contents.
    ///
    /// The whole document is validated first; on error nothing changes.
    pub fn import_config_json(&mut self, json: &str) -> Result<(), EditorError> {
        let config = CanvasConfig::from_json(json).inspect_err(|err| {
            tracing::warn!(%err, "configuration import failed");
        })?;
        self.apply_config(&config)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn ensure_unlocked(&self) -> Result<(), EditorError> {
        if self.is_exporting() {
            return Err(EditorError::ExportInProgress);
        }
        if self.drag.is_dragging() {
            return Err(EditorError::DragInProgress);
        }
        Ok(())
    }

    /// Position of `id` in the committed sequence. Stale ids are logged.
    fn lookup(&self, id: IconId) -> Option<usize> {
        let index = self.sequence.index_of(id);
        if index.is_none() {
            tracing::debug!(%id, "ignoring element that is not on the canvas");
        }
        index
    }

    /// Makes `next` the committed sequence. Unchanged sequences record nothing.
    fn commit(&mut self, next: Sequence) -> bool {
        if next == self.sequence {
            return false;
        }
        self.sequence = next;
        self.history.record(self.sequence.clone());
        self.persist();
        true
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(&self.sequence, self.resolver.blobs()) {
            tracing::warn!("Failed to persist sequence to {}: {e}", store.path().display());
        }
    }
}

impl Configurable for Editor {
    type Error = EditorError;

    /// Replaces the sequence with the configuration's items as one
    /// undoable change.
    fn apply_config(&mut self, config: &CanvasConfig) -> Result<(), EditorError> {
        self.ensure_unlocked()?;
        let restored = config.restore(self.resolver.blobs()).inspect_err(|err| {
            tracing::warn!(%err, "configuration import failed");
        })?;
        tracing::info!(items = restored.len(), "configuration imported");
        self.commit(restored);
        Ok(())
    }

    fn export_config(&self) -> CanvasConfig {
        CanvasConfig::capture(&self.sequence, self.resolver.blobs())
    }
}

/// Strips a `_<hex>` recolor suffix: `cls@01_ff0000.svg` -> `cls@01.svg`.
fn base_asset(file: &str) -> String {
    let Some((stem, ext)) = file.rsplit_once('.') else {
        return file.to_string();
    };
    match stem.rsplit_once('_') {
        Some((base, hex)) if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            format!("{base}.{ext}")
        }
        _ => file.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
