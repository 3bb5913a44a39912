//! The public `Tree` handle: opens/creates a single backing file, locates
//! or initializes the head block, and drives the recursive algorithms in
//! `engine` for every operation.

use std::path::{Path, PathBuf};

use log::warn;

use crate::comparator::{DefaultComparator, KeyComparator};
use crate::compress::{Compressor, GzipCompressor};
use crate::config::{FsyncPolicy, TreeConfig};
use crate::engine::{self, Ctx, InsertOutcome, RemoveOutcome};
use crate::error::{BpError, Result};
use crate::head::{HEAD_MAGIC, Head};
use crate::page::Page;
use crate::writer::{Compression, Writer, compact_path_for};

/// An open, single-writer, append-only B+ tree backed by one file.
///
/// Construct with [`Tree::open`] (default comparator/compressor) or
/// [`Tree::open_full`] for custom collaborators. Only one `Tree` may hold
/// a given file open at a time — a second `open` on the same path fails.
pub struct Tree {
    writer: Option<Writer>,
    comparator: Box<dyn KeyComparator>,
    compressor: Box<dyn Compressor>,
    page_size: u16,
    fsync_policy: FsyncPolicy,
    root_offset: u64,
    root_config: u64,
    path: PathBuf,
}

impl Tree {
    /// Opens or creates `path` with default settings: page size
    /// [`crate::config::DEFAULT_PAGE_SIZE`], [`GzipCompressor`], and the
    /// default byte-wise comparator.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, TreeConfig::default())
    }

    /// Opens or creates `path` with an explicit configuration but default
    /// comparator and compressor.
    pub fn open_with(path: impl AsRef<Path>, config: TreeConfig) -> Result<Self> {
        Self::open_full(path, config, Box::new(DefaultComparator), Box::new(GzipCompressor::default()))
    }

    /// Opens or creates `path` with fully custom collaborators.
    ///
    /// `config.page_size` only takes effect when the file is being created
    /// fresh; reopening an existing file always honors the page size
    /// persisted in its head block, logging a warning if the requested
    /// value was different.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid, the file cannot be opened
    /// or is already locked by another `Tree`, or the head block cannot be
    /// located/written.
    pub fn open_full(
        path: impl AsRef<Path>,
        config: TreeConfig,
        comparator: Box<dyn KeyComparator>,
        compressor: Box<dyn Compressor>,
    ) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let mut writer = Writer::create(&path)?;

        let found = writer.find(config.head_block_stride, compressor.as_ref(), Head::decode)?;
        let (page_size, root_offset, root_config) = match found {
            Some(head) => {
                if head.page_size as u16 != config.page_size {
                    warn!(
                        "{}: ignoring requested page_size {} in favor of persisted page_size {}",
                        path.display(),
                        config.page_size,
                        head.page_size
                    );
                }
                (head.page_size as u16, head.offset, head.config)
            }
            None => {
                let mut ctx = Ctx {
                    writer: &mut writer,
                    compressor: compressor.as_ref(),
                    comparator: comparator.as_ref(),
                    page_size: config.page_size,
                    fsync_policy: config.fsync_policy,
                };
                let mut root = Page::new_leaf();
                engine::save_page(&mut ctx, &mut root)?;
                let head = Head {
                    page_size: config.page_size as u64,
                    hash: HEAD_MAGIC,
                    offset: root.offset,
                    config: root.config,
                };
                writer.write(Compression::NotCompressed, &head.encode(), compressor.as_ref())?;
                if config.fsync_policy != FsyncPolicy::Never {
                    writer.fsync()?;
                }
                (config.page_size, root.offset, root.config)
            }
        };

        log::info!(
            "{}: opened (page_size={page_size}, root_offset={root_offset})",
            path.display()
        );

        Ok(Self {
            writer: Some(writer),
            comparator,
            compressor,
            page_size,
            fsync_policy: config.fsync_policy,
            root_offset,
            root_config,
            path,
        })
    }

    fn ctx(&mut self) -> Ctx<'_> {
        Ctx {
            writer: self.writer.as_mut().expect("tree used after close"),
            compressor: self.compressor.as_ref(),
            comparator: self.comparator.as_ref(),
            page_size: self.page_size,
            fsync_policy: self.fsync_policy,
        }
    }

    /// Writes a fresh head block pointing at the current root, honoring
    /// the configured fsync policy.
    fn write_head(&mut self) -> Result<()> {
        let head = Head {
            page_size: self.page_size as u64,
            hash: HEAD_MAGIC,
            offset: self.root_offset,
            config: self.root_config,
        };
        let compressor = self.compressor.as_ref();
        let writer = self.writer.as_mut().expect("tree used after close");
        writer.write(Compression::NotCompressed, &head.encode(), compressor)?;
        if self.fsync_policy != FsyncPolicy::Never {
            writer.fsync()?;
        }
        Ok(())
    }

    /// Looks up `key`, returning its value or [`BpError::NotFound`].
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let (root_offset, root_config) = (self.root_offset, self.root_config);
        let mut ctx = self.ctx();
        let root = engine::load_page(&mut ctx, root_offset, root_config)?;
        engine::get(&mut ctx, &root, key)
    }

    /// Inserts or overwrites `key` with `value`.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let (root_offset, root_config) = (self.root_offset, self.root_config);
        let mut ctx = self.ctx();
        let (value_offset, value_csize) =
            ctx.writer.write(Compression::Compressed, value, ctx.compressor)?;
        let value_config = value_csize;

        let mut root = engine::load_page(&mut ctx, root_offset, root_config)?;
        let outcome = engine::insert(&mut ctx, &mut root, key, value_offset, value_config)?;
        match outcome {
            InsertOutcome::Done => {
                self.root_offset = root.offset;
                self.root_config = root.config;
            }
            InsertOutcome::NeedsSplit => {
                let mut new_root = Page::new_internal();
                new_root.entries[0].offset = root.offset;
                new_root.entries[0].config = root.config;
                engine::split(&mut ctx, &mut new_root, 0, root)?;
                engine::save_page(&mut ctx, &mut new_root)?;
                self.root_offset = new_root.offset;
                self.root_config = new_root.config;
                log::debug!("root split; new root at offset {}", self.root_offset);
            }
        }
        self.write_head()
    }

    /// Removes `key`, returning [`BpError::NotFound`] if it was absent.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        let (root_offset, root_config) = (self.root_offset, self.root_config);
        let mut ctx = self.ctx();
        let mut root = engine::load_page(&mut ctx, root_offset, root_config)?;
        match engine::remove(&mut ctx, &mut root, key, true)? {
            RemoveOutcome::Done | RemoveOutcome::Empty => {
                self.root_offset = root.offset;
                self.root_config = root.config;
            }
        }
        self.write_head()
    }

    /// Reads `key`, applies `update`, and writes the result back.
    /// `update` receives the current value, or `None` if the key is
    /// absent, and returns either a new value to write (`Some`, which may
    /// insert a previously-absent key) or `None` to mean "no change" —
    /// `update` is read-modify-write, not read-modify-write-or-delete, so
    /// returning `None` never removes an existing key. Callers that want
    /// to delete should call [`Tree::remove`] directly.
    pub fn update(
        &mut self,
        key: &[u8],
        update: impl FnOnce(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<()> {
        let current = match self.get(key) {
            Ok(v) => Some(v),
            Err(BpError::NotFound) => None,
            Err(e) => return Err(e),
        };
        match update(current.as_deref()) {
            Some(new_value) => self.set(key, &new_value),
            None => Ok(()),
        }
    }

    /// Applies `update` to each of `keys` in turn, writing a single head
    /// block at the end rather than one per key. As with [`Tree::update`],
    /// `None` means "no change", never a deletion.
    pub fn bulk_update(
        &mut self,
        keys: &[Vec<u8>],
        mut update: impl FnMut(&[u8], Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<()> {
        for key in keys {
            let current = match self.get(key) {
                Ok(v) => Some(v),
                Err(BpError::NotFound) => None,
                Err(e) => return Err(e),
            };
            if let Some(new_value) = update(key, current.as_deref()) {
                self.set_no_head(key, &new_value)?;
            }
        }
        self.write_head()
    }

    fn set_no_head(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let (root_offset, root_config) = (self.root_offset, self.root_config);
        let mut ctx = self.ctx();
        let (value_offset, value_config) =
            ctx.writer.write(Compression::Compressed, value, ctx.compressor)?;
        let mut root = engine::load_page(&mut ctx, root_offset, root_config)?;
        match engine::insert(&mut ctx, &mut root, key, value_offset, value_config)? {
            InsertOutcome::Done => {
                self.root_offset = root.offset;
                self.root_config = root.config;
            }
            InsertOutcome::NeedsSplit => {
                let mut new_root = Page::new_internal();
                new_root.entries[0].offset = root.offset;
                new_root.entries[0].config = root.config;
                engine::split(&mut ctx, &mut new_root, 0, root)?;
                engine::save_page(&mut ctx, &mut new_root)?;
                self.root_offset = new_root.offset;
                self.root_config = new_root.config;
            }
        }
        Ok(())
    }

    /// Invokes `cb` with every `(key, value)` pair in `[lo, hi]` (either
    /// bound `None` meaning unbounded) in ascending key order. Stops early
    /// if `cb` returns `false`.
    pub fn get_range(
        &mut self,
        lo: Option<&[u8]>,
        hi: Option<&[u8]>,
        mut cb: impl FnMut(&[u8], Vec<u8>) -> bool,
    ) -> Result<()> {
        let (root_offset, root_config) = (self.root_offset, self.root_config);
        let mut ctx = self.ctx();
        let root = engine::load_page(&mut ctx, root_offset, root_config)?;
        engine::range(&mut ctx, &root, lo, hi, &mut cb)?;
        Ok(())
    }

    /// Rebuilds the backing file in place, dropping dead space left by
    /// overwritten and removed entries. Writes to `<path>.compact`, then
    /// atomically renames it over `path` once complete.
    ///
    /// # Errors
    /// Returns [`BpError::CompactExists`] if a stale `<path>.compact` file
    /// is already present.
    pub fn compact(&mut self) -> Result<()> {
        let compact_path = compact_path_for(&self.path);
        if compact_path.exists() {
            return Err(BpError::CompactExists(compact_path.display().to_string()));
        }
        log::info!("{}: compacting into {}", self.path.display(), compact_path.display());

        let (root_offset, root_config) = (self.root_offset, self.root_config);
        let (page_size, fsync_policy) = (self.page_size, self.fsync_policy);
        let mut target_writer = Writer::create(&compact_path)?;

        let new_root = {
            let mut source_ctx = Ctx {
                writer: self.writer.as_mut().expect("tree used after close"),
                compressor: self.compressor.as_ref(),
                comparator: self.comparator.as_ref(),
                page_size,
                fsync_policy,
            };
            let mut target_ctx = Ctx {
                writer: &mut target_writer,
                compressor: self.compressor.as_ref(),
                comparator: self.comparator.as_ref(),
                page_size,
                fsync_policy,
            };
            let root = engine::load_page(&mut source_ctx, root_offset, root_config)?;
            engine::copy_page(&mut source_ctx, &mut target_ctx, &root)?
        };

        let head = Head {
            page_size: page_size as u64,
            hash: HEAD_MAGIC,
            offset: new_root.offset,
            config: new_root.config,
        };
        target_writer.write(Compression::NotCompressed, &head.encode(), self.compressor.as_ref())?;
        target_writer.fsync()?;
        drop(target_writer);

        if let Some(old) = self.writer.take() {
            drop(old);
        }

        std::fs::rename(&compact_path, &self.path)
            .map_err(|e| BpError::FileRename(e.to_string()))?;

        self.writer = Some(Writer::create(&self.path)?);
        self.root_offset = new_root.offset;
        self.root_config = new_root.config;
        log::info!("{}: compaction complete, new root at offset {}", self.path.display(), self.root_offset);
        Ok(())
    }

    /// Closes the backing file, releasing its lock. Further calls on this
    /// `Tree` panic.
    pub fn close(&mut self) {
        log::info!("{}: closed", self.path.display());
        self.writer = None;
    }
}
