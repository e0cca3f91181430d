use image::GenericImageView;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::Error;
use crate::files;

// ---------------------------------------------------------------------------
// Decoded page data (CPU side)
// ---------------------------------------------------------------------------

pub struct DecodedPage {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
}

impl DecodedPage {
    pub fn mem_size(&self) -> u64 {
        self.rgba_bytes.len() as u64
    }
}

fn decode_page(path: &Path) -> Result<DecodedPage, String> {
    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    match image::open(path) {
        Ok(img) => {
            let (width, height) = img.dimensions();
            let rgba = img.to_rgba8();
            Ok(DecodedPage {
                rgba_bytes: rgba.into_raw(),
                width,
                height,
                file_size,
            })
        }
        Err(e) => Err(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Snapshot for the status overlay.
pub struct PageStatus {
    pub current_index: usize,
    pub total_pages: usize,
    pub file_name: String,
}

// ---------------------------------------------------------------------------
// Shared cache state (UI thread + prefetch thread)
// ---------------------------------------------------------------------------

/// How far the prefetch pass reaches behind / ahead of the cursor. The bias
/// toward upcoming pages matches the dominant forward reading direction.
const PREFETCH_BEHIND: usize = 3;
const PREFETCH_AHEAD: usize = 5;

struct PageStore {
    cache: HashMap<usize, Arc<DecodedPage>>,
    used_bytes: u64,
    budget: u64,
    /// Mirror of the buffer cursor, so eviction picks the page farthest
    /// from where the reader actually is.
    cursor: usize,
    /// Bumped on every folder switch. A prefetch task started against an
    /// older generation must not insert anything.
    generation: u64,
}

impl PageStore {
    fn new(budget: u64) -> Self {
        Self {
            cache: HashMap::new(),
            used_bytes: 0,
            budget,
            cursor: 0,
            generation: 0,
        }
    }

    fn get(&self, index: usize) -> Option<Arc<DecodedPage>> {
        self.cache.get(&index).cloned()
    }

    /// Insert-if-absent. If another path already decoded this index, the
    /// existing entry wins and the duplicate decode is discarded.
    fn insert_absent(&mut self, index: usize, page: DecodedPage) -> Arc<DecodedPage> {
        if let Some(existing) = self.cache.get(&index) {
            return Arc::clone(existing);
        }
        self.used_bytes += page.mem_size();
        let page = Arc::new(page);
        self.cache.insert(index, Arc::clone(&page));
        self.evict_distant();
        page
    }

    /// Drop the pages farthest from the cursor until we are back under
    /// budget. The cursor page itself is never evicted.
    fn evict_distant(&mut self) {
        while self.used_bytes > self.budget && self.cache.len() > 1 {
            let farthest = self
                .cache
                .keys()
                .filter(|&&idx| idx != self.cursor)
                .max_by_key(|&&idx| self.cursor.abs_diff(idx))
                .copied();
            match farthest {
                Some(evict_idx) => {
                    if let Some(page) = self.cache.remove(&evict_idx) {
                        self.used_bytes -= page.mem_size();
                        log::debug!("[cache] evicted page {}", evict_idx);
                    }
                }
                None => break,
            }
        }
    }

    fn clear(&mut self) {
        self.generation += 1;
        self.cache.clear();
        self.used_bytes = 0;
        self.cursor = 0;
    }
}

// ---------------------------------------------------------------------------
// Page buffer
// ---------------------------------------------------------------------------

/// The sole authority on which page is current, what image data represents
/// each page, and what should be decoded next.
pub struct PageBuffer {
    pages: Arc<Vec<PathBuf>>,
    cursor: usize,
    double_page: bool,
    long_strip: bool,
    store: Arc<Mutex<PageStore>>,
    prefetch: Option<JoinHandle<()>>,
}

impl PageBuffer {
    pub fn new(budget: u64) -> Self {
        Self {
            pages: Arc::new(Vec::new()),
            cursor: 0,
            double_page: false,
            long_strip: false,
            store: Arc::new(Mutex::new(PageStore::new(budget))),
            prefetch: None,
        }
    }

    /// Replace the page list with the contents of `dir`. On I/O failure the
    /// previous list and cache are left untouched (same as cancelling the
    /// folder dialog). An empty result is not an error: the buffer simply
    /// reports no pages afterwards.
    pub fn load_folder(&mut self, dir: &Path) -> Result<usize, Error> {
        let list = files::scan_folder(dir)?;
        let count = list.len();

        {
            let mut store = self.store.lock().unwrap();
            store.clear();
        }
        self.pages = Arc::new(list);
        self.cursor = 0;

        log::info!("loaded {} pages from {}", count, dir.display());
        if count > 0 {
            self.trigger_prefetch();
        }
        Ok(count)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn double_page(&self) -> bool {
        self.double_page
    }

    pub fn long_strip(&self) -> bool {
        self.long_strip
    }

    pub fn set_double_page(&mut self, on: bool) {
        self.double_page = on;
    }

    pub fn set_long_strip(&mut self, on: bool) {
        self.long_strip = on;
    }

    pub fn path_at(&self, index: usize) -> Option<&Path> {
        self.pages.get(index).map(|p| p.as_path())
    }

    /// The decoded page for `index`, or None when the index is out of range
    /// or the file cannot be decoded. A cache miss decodes synchronously so
    /// the viewport is never left waiting on the background task; decode
    /// failures are not cached, so fixing the file on disk makes a later
    /// call succeed.
    pub fn resolve(&mut self, index: usize) -> Option<Arc<DecodedPage>> {
        if index >= self.pages.len() {
            return None;
        }
        if let Some(hit) = self.store.lock().unwrap().get(index) {
            return Some(hit);
        }

        // Decode with the lock released; the prefetch thread may be
        // decoding other indices at the same time.
        match decode_page(&self.pages[index]) {
            Ok(page) => {
                let mut store = self.store.lock().unwrap();
                Some(store.insert_absent(index, page))
            }
            Err(e) => {
                log::warn!("could not decode {}: {}", self.pages[index].display(), e);
                None
            }
        }
    }

    pub fn current_page(&mut self) -> Option<Arc<DecodedPage>> {
        self.resolve(self.cursor)
    }

    /// The cursor page and its right-hand neighbor for double-page display.
    /// The second slot is None on the last page.
    pub fn current_pages(&mut self) -> (Option<Arc<DecodedPage>>, Option<Arc<DecodedPage>>) {
        let left = self.resolve(self.cursor);
        let right = self.resolve(self.cursor + 1);
        (left, right)
    }

    /// Saturating page turn: step 2 in double-page mode, 1 otherwise, and
    /// never past either end. Returns the new cursor.
    pub fn advance(&mut self, direction: Direction) -> usize {
        if self.pages.is_empty() {
            return 0;
        }
        let step = if self.double_page { 2 } else { 1 };
        let new_cursor = match direction {
            Direction::Forward => (self.cursor + step).min(self.pages.len() - 1),
            Direction::Backward => self.cursor.saturating_sub(step),
        };
        self.move_cursor(new_cursor);
        self.cursor
    }

    /// Jump straight to `index` (clamped). Used for Home/End.
    pub fn go_to(&mut self, index: usize) -> usize {
        if self.pages.is_empty() {
            return 0;
        }
        self.move_cursor(index.min(self.pages.len() - 1));
        self.cursor
    }

    fn move_cursor(&mut self, new_cursor: usize) {
        if new_cursor == self.cursor {
            return;
        }
        log::debug!("[nav] page {} -> {}", self.cursor, new_cursor);
        self.cursor = new_cursor;
        self.store.lock().unwrap().cursor = new_cursor;
        self.trigger_prefetch();
    }

    pub fn status(&self) -> Option<PageStatus> {
        let path = self.pages.get(self.cursor)?;
        Some(PageStatus {
            current_index: self.cursor,
            total_pages: self.pages.len(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    /// (cached pages, used bytes, budget bytes) for the info overlay.
    pub fn cache_stats(&self) -> (usize, u64, u64) {
        let store = self.store.lock().unwrap();
        (store.cache.len(), store.used_bytes, store.budget)
    }

    /// Kick the background pass that warms the cache around the cursor.
    /// At most one pass runs at a time; a trigger while the previous pass
    /// is still running is dropped rather than queued, since prefetch is a
    /// best-effort latency optimization and `resolve` always has the
    /// synchronous fallback.
    fn trigger_prefetch(&mut self) {
        if let Some(handle) = &self.prefetch {
            if !handle.is_finished() {
                log::debug!("[prefetch] pass still running, trigger dropped");
                return;
            }
        }
        let pages = Arc::clone(&self.pages);
        let store = Arc::clone(&self.store);
        let cursor = self.cursor;
        let generation = self.store.lock().unwrap().generation;
        self.prefetch = Some(thread::spawn(move || {
            prefetch_pass(&pages, &store, cursor, generation);
        }));
    }

    #[cfg(test)]
    fn wait_for_prefetch(&mut self) {
        if let Some(handle) = self.prefetch.take() {
            let _ = handle.join();
        }
    }
}

/// Decode every uncached page in `[cursor-3, cursor+5]`. The generation is
/// re-checked under the lock before each insert so a pass outliving a
/// folder switch never writes old-folder pages into the new cache.
fn prefetch_pass(pages: &[PathBuf], store: &Mutex<PageStore>, cursor: usize, generation: u64) {
    if pages.is_empty() {
        return;
    }
    let lo = cursor.saturating_sub(PREFETCH_BEHIND);
    let hi = (cursor + PREFETCH_AHEAD).min(pages.len() - 1);

    for index in lo..=hi {
        {
            let state = store.lock().unwrap();
            if state.generation != generation {
                log::debug!("[prefetch] folder changed, abandoning pass");
                return;
            }
            if state.cache.contains_key(&index) {
                continue;
            }
        }
        match decode_page(&pages[index]) {
            Ok(page) => {
                let mut state = store.lock().unwrap();
                if state.generation != generation {
                    return;
                }
                state.insert_absent(index, page);
            }
            // Not cached; resolve() will retry and report it.
            Err(e) => log::debug!("[prefetch] skipping {}: {}", pages[index].display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TEST_BUDGET: u64 = 64 * 1024 * 1024;

    /// Write a real 4x4 image; the extension picks the encoder.
    fn write_page(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb(color));
        img.save(&path).expect("write page fixture");
        path
    }

    fn buffer_for(dir: &Path, names: &[&str]) -> PageBuffer {
        for name in names {
            write_page(dir, name, [10, 20, 30]);
        }
        let mut buffer = PageBuffer::new(TEST_BUDGET);
        buffer.load_folder(dir).expect("load folder");
        buffer
    }

    #[test]
    fn load_folder_sorts_and_resets_cursor() {
        let dir = tempdir().expect("tempdir");
        let buffer = buffer_for(dir.path(), &["b.png", "a.png", "c.jpg"]);

        assert_eq!(buffer.page_count(), 3);
        assert_eq!(buffer.cursor(), 0);
        let status = buffer.status().expect("status");
        assert_eq!(status.file_name, "a.png");
        assert_eq!(status.total_pages, 3);
    }

    #[test]
    fn load_folder_empty_reports_no_pages() {
        let dir = tempdir().expect("tempdir");
        let mut buffer = PageBuffer::new(TEST_BUDGET);
        assert_eq!(buffer.load_folder(dir.path()).expect("load"), 0);
        assert!(buffer.is_empty());
        assert!(buffer.status().is_none());
        assert!(buffer.current_page().is_none());
    }

    #[test]
    fn load_folder_failure_keeps_previous_list() {
        let dir = tempdir().expect("tempdir");
        let mut buffer = buffer_for(dir.path(), &["a.png", "b.png"]);
        buffer.advance(Direction::Forward);

        let missing = dir.path().join("nope");
        assert!(buffer.load_folder(&missing).is_err());
        assert_eq!(buffer.page_count(), 2);
        assert_eq!(buffer.cursor(), 1);
        assert!(buffer.current_page().is_some());
    }

    #[test]
    fn advance_saturates_at_both_ends() {
        let dir = tempdir().expect("tempdir");
        let mut buffer = buffer_for(dir.path(), &["a.png", "b.png", "c.png"]);

        assert_eq!(buffer.advance(Direction::Backward), 0);
        assert_eq!(buffer.advance(Direction::Forward), 1);
        assert_eq!(buffer.advance(Direction::Forward), 2);
        assert_eq!(buffer.advance(Direction::Forward), 2);
    }

    #[test]
    fn double_page_steps_by_two() {
        let dir = tempdir().expect("tempdir");
        let mut buffer = buffer_for(dir.path(), &["a.png", "b.png", "c.png", "d.png", "e.png"]);
        buffer.set_double_page(true);

        assert_eq!(buffer.advance(Direction::Forward), 2);
        assert_eq!(buffer.advance(Direction::Forward), 4);
        // Clamped to the last index, not past it.
        assert_eq!(buffer.advance(Direction::Forward), 4);
        assert_eq!(buffer.advance(Direction::Backward), 2);
        assert_eq!(buffer.advance(Direction::Backward), 0);
    }

    #[test]
    fn current_pages_at_last_index_has_empty_right_slot() {
        let dir = tempdir().expect("tempdir");
        let mut buffer = buffer_for(dir.path(), &["a.png", "b.png"]);
        buffer.set_double_page(true);
        buffer.go_to(1);

        let (left, right) = buffer.current_pages();
        assert!(left.is_some());
        assert!(right.is_none());
    }

    #[test]
    fn resolve_is_idempotent_and_returns_the_cached_page() {
        let dir = tempdir().expect("tempdir");
        let mut buffer = buffer_for(dir.path(), &["a.png", "b.png"]);

        let first = buffer.resolve(1).expect("first resolve");
        let second = buffer.resolve(1).expect("second resolve");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn resolve_out_of_range_is_none() {
        let dir = tempdir().expect("tempdir");
        let mut buffer = buffer_for(dir.path(), &["a.png"]);
        assert!(buffer.resolve(1).is_none());
    }

    #[test]
    fn decode_failure_is_not_cached() {
        let dir = tempdir().expect("tempdir");
        let bad = dir.path().join("a.png");
        fs::write(&bad, b"this is not a png").expect("write bad file");
        let mut buffer = PageBuffer::new(TEST_BUDGET);
        buffer.load_folder(dir.path()).expect("load");
        buffer.wait_for_prefetch();

        assert!(buffer.resolve(0).is_none());

        // Fix the file on disk; the next resolve must pick it up.
        write_page(dir.path(), "a.png", [1, 2, 3]);
        let page = buffer.resolve(0).expect("resolve after fix");
        assert_eq!(page.width, 4);
    }

    #[test]
    fn prefetch_warms_the_window_around_the_cursor() {
        let dir = tempdir().expect("tempdir");
        let names: Vec<String> = (0..10).map(|i| format!("{:02}.png", i)).collect();
        let name_refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let mut buffer = buffer_for(dir.path(), &name_refs);
        buffer.wait_for_prefetch();

        let store = buffer.store.lock().unwrap();
        // Cursor 0: window is [0, 5].
        for index in 0..=5 {
            assert!(store.cache.contains_key(&index), "page {} not warmed", index);
        }
        assert!(!store.cache.contains_key(&6));
    }

    #[test]
    fn folder_switch_discards_the_old_cache() {
        let dir_a = tempdir().expect("tempdir a");
        let dir_b = tempdir().expect("tempdir b");
        write_page(dir_a.path(), "a.png", [255, 0, 0]);
        write_page(dir_b.path(), "a.png", [0, 0, 255]);

        let mut buffer = PageBuffer::new(TEST_BUDGET);
        buffer.load_folder(dir_a.path()).expect("load a");
        buffer.resolve(0).expect("resolve a");
        buffer.wait_for_prefetch();

        buffer.load_folder(dir_b.path()).expect("load b");
        let page = buffer.resolve(0).expect("resolve b");
        // Red pages from folder A must not leak into folder B's indices.
        assert_eq!(&page.rgba_bytes[..3], &[0, 0, 255]);
    }

    #[test]
    fn stale_prefetch_pass_cannot_write_into_a_new_folder() {
        let dir_a = tempdir().expect("tempdir a");
        let dir_b = tempdir().expect("tempdir b");
        write_page(dir_a.path(), "a.png", [255, 0, 0]);
        write_page(dir_b.path(), "a.png", [0, 0, 255]);

        let mut buffer = PageBuffer::new(TEST_BUDGET);
        buffer.load_folder(dir_a.path()).expect("load a");
        buffer.wait_for_prefetch();
        let old_pages = Arc::clone(&buffer.pages);
        let old_generation = buffer.store.lock().unwrap().generation;

        buffer.load_folder(dir_b.path()).expect("load b");
        buffer.wait_for_prefetch();

        // Replay a pass that was started against folder A and outlived the
        // switch: every insert must be dropped.
        prefetch_pass(&old_pages, &buffer.store, 0, old_generation);
        let page = buffer.resolve(0).expect("resolve b");
        assert_eq!(&page.rgba_bytes[..3], &[0, 0, 255]);
    }

    #[test]
    fn eviction_respects_the_budget_and_keeps_the_cursor_page() {
        let dir = tempdir().expect("tempdir");
        // 4x4 RGBA pages are 64 bytes each; budget fits two.
        for i in 0..6 {
            write_page(dir.path(), &format!("{}.png", i), [i as u8, 0, 0]);
        }
        let mut buffer = PageBuffer::new(140);
        buffer.load_folder(dir.path()).expect("load");
        buffer.wait_for_prefetch();

        for _ in 0..5 {
            buffer.advance(Direction::Forward);
            buffer.current_page().expect("current page");
            buffer.wait_for_prefetch();
        }

        let (count, used, budget) = buffer.cache_stats();
        assert!(used <= budget, "cache over budget: {} > {}", used, budget);
        assert!(count <= 2);
        let store = buffer.store.lock().unwrap();
        assert!(store.cache.contains_key(&5), "cursor page was evicted");
    }

    #[test]
    fn toggling_display_mode_leaves_cursor_and_cache_alone() {
        let dir = tempdir().expect("tempdir");
        let mut buffer = buffer_for(dir.path(), &["a.png", "b.png", "c.png"]);
        buffer.go_to(1);
        buffer.wait_for_prefetch();
        buffer.current_page().expect("page");
        let (count_before, _, _) = buffer.cache_stats();

        buffer.set_double_page(true);
        buffer.set_long_strip(true);
        assert_eq!(buffer.cursor(), 1);
        let (count_after, _, _) = buffer.cache_stats();
        assert_eq!(count_before, count_after);
    }

    #[test]
    fn sequential_reading_end_to_end() {
        let dir = tempdir().expect("tempdir");
        let mut buffer = buffer_for(dir.path(), &["b.png", "a.png", "c.jpg"]);

        assert_eq!(buffer.advance(Direction::Forward), 1);
        assert_eq!(buffer.status().expect("status").file_name, "b.png");

        buffer.set_double_page(true);
        let (left, right) = buffer.current_pages();
        assert!(left.is_some());
        assert!(right.is_some());
        assert_eq!(buffer.path_at(2).unwrap().file_name().unwrap(), "c.jpg");
    }
}
