//! Recursive B+ tree algorithms: search, get, insert, remove, split, and
//! the compaction copy. Pages are loaded fresh on every descent and never
//! cached between top-level tree operations.

use std::cmp::Ordering;

use crate::comparator::KeyComparator;
use crate::compress::Compressor;
use crate::config::FsyncPolicy;
use crate::error::{BpError, Result};
use crate::kv::Kv;
use crate::page::{Page, PageKind};
use crate::writer::{Compression, Writer};

/// Borrowed collaborators a single top-level tree operation needs: the
/// writer, the pluggable compressor/comparator, and the fixed branching
/// factor. Constructed fresh per call, never stored.
pub(crate) struct Ctx<'a> {
    pub writer: &'a mut Writer,
    pub compressor: &'a dyn Compressor,
    pub comparator: &'a dyn KeyComparator,
    pub page_size: u16,
    pub fsync_policy: FsyncPolicy,
}

impl Ctx<'_> {
    fn maybe_fsync(&self) -> Result<()> {
        if self.fsync_policy == FsyncPolicy::AfterEveryWrite {
            self.writer.fsync()?;
        }
        Ok(())
    }
}

/// Internal-only control-flow signals — never exposed through `BpError`.
pub(crate) enum InsertOutcome {
    Done,
    NeedsSplit,
}

pub(crate) enum RemoveOutcome {
    Done,
    Empty,
}

pub(crate) fn load_page(ctx: &mut Ctx, offset: u64, config: u64) -> Result<Page> {
    let is_leaf = config & 1 == 1;
    let csize = config >> 1;
    let kind = if is_leaf { PageKind::Leaf } else { PageKind::Internal };
    let bytes = ctx.writer.read(Compression::Compressed, offset, csize, ctx.compressor)?;
    log::debug!("loaded {kind:?} page at offset {offset} ({csize} bytes compressed)");
    Ok(Page::decode(kind, offset, config, &bytes))
}

pub(crate) fn save_page(ctx: &mut Ctx, page: &mut Page) -> Result<()> {
    let bytes = page.encode();
    let (offset, csize) = ctx.writer.write(Compression::Compressed, &bytes, ctx.compressor)?;
    page.offset = offset;
    page.config = (csize << 1) | u64::from(page.is_leaf());
    log::debug!("saved {:?} page ({} entries) at offset {offset}", page.kind, page.len());
    ctx.maybe_fsync()
}

/// Shared search step: scan `page` for `key`, and for internal pages load
/// the selected child before returning. Leaves never populate `child`.
fn search(ctx: &mut Ctx, page: &Page, key: &[u8]) -> Result<(usize, Ordering, Option<Page>)> {
    let (mut index, cmp) = page.scan(key, ctx.comparator);
    if page.kind == PageKind::Leaf {
        return Ok((index, cmp, None));
    }
    if cmp != Ordering::Equal {
        index -= 1;
    }
    let entry = &page.entries[index];
    let child = load_page(ctx, entry.offset, entry.config)?;
    Ok((index, cmp, Some(child)))
}

pub(crate) fn get(ctx: &mut Ctx, page: &Page, key: &[u8]) -> Result<Vec<u8>> {
    let (index, cmp, child) = search(ctx, page, key)?;
    match child {
        None => {
            if cmp != Ordering::Equal {
                return Err(BpError::NotFound);
            }
            let e = &page.entries[index];
            ctx.writer.read(Compression::Compressed, e.offset, e.config, ctx.compressor)
        }
        Some(child) => get(ctx, &child, key),
    }
}

pub(crate) fn insert(
    ctx: &mut Ctx,
    page: &mut Page,
    key: &[u8],
    value_offset: u64,
    value_config: u64,
) -> Result<InsertOutcome> {
    let (index, cmp, child) = search(ctx, page, key)?;
    match child {
        None => {
            if cmp == Ordering::Equal {
                page.remove_idx(index);
            }
            page.insert_at(
                index,
                Kv { key: key.to_vec(), offset: value_offset, config: value_config },
            );
        }
        Some(mut child) => {
            let outcome = insert(ctx, &mut child, key, value_offset, value_config)?;
            match outcome {
                InsertOutcome::NeedsSplit => split(ctx, page, index, child)?,
                InsertOutcome::Done => {
                    save_page(ctx, &mut child)?;
                    page.entries[index].offset = child.offset;
                    page.entries[index].config = child.config;
                }
            }
        }
    }

    if page.len() as u16 == ctx.page_size {
        return Ok(InsertOutcome::NeedsSplit);
    }
    save_page(ctx, page)?;
    Ok(InsertOutcome::Done)
}

/// `is_root` suppresses the "page became empty" signal for the page the
/// caller started the recursion on — an empty root leaf is valid (the
/// tree is simply empty), but an empty non-root page must be collapsed
/// away by its parent.
pub(crate) fn remove(
    ctx: &mut Ctx,
    page: &mut Page,
    key: &[u8],
    is_root: bool,
) -> Result<RemoveOutcome> {
    let (index, cmp, child) = search(ctx, page, key)?;
    match child {
        None => {
            if cmp != Ordering::Equal {
                return Err(BpError::NotFound);
            }
            page.remove_idx(index);
            if page.is_empty() && !is_root {
                return Ok(RemoveOutcome::Empty);
            }
        }
        Some(mut child) => {
            let outcome = remove(ctx, &mut child, key, false)?;
            match outcome {
                RemoveOutcome::Empty => {
                    page.remove_idx(index);
                    if page.len() == 1 {
                        let sole = &page.entries[0];
                        let (off, cfg) = (sole.offset, sole.config);
                        *page = load_page(ctx, off, cfg)?;
                    }
                }
                RemoveOutcome::Done => {
                    save_page(ctx, &mut child)?;
                    page.entries[index].offset = child.offset;
                    page.entries[index].config = child.config;
                }
            }
        }
    }
    save_page(ctx, page)?;
    Ok(RemoveOutcome::Done)
}

/// Splits `full_child` (already detached from the parent's entry at
/// `index`) into two halves of `page_size / 2` entries, saves both, and
/// rewrites `parent` in place: the entry at `index` now points at `left`,
/// and a fresh entry for `right` is inserted at `index + 1` keyed on the
/// middle entry.
pub(crate) fn split(ctx: &mut Ctx, parent: &mut Page, index: usize, full_child: Page) -> Result<()> {
    let middle = (ctx.page_size / 2) as usize;
    let middle_key = full_child.entries[middle].key.clone();

    let mut left = Page {
        kind: full_child.kind,
        offset: 0,
        config: 0,
        entries: full_child.entries[..middle].to_vec(),
    };
    let mut right = Page {
        kind: full_child.kind,
        offset: 0,
        config: 0,
        entries: full_child.entries[middle..].to_vec(),
    };

    save_page(ctx, &mut left)?;
    save_page(ctx, &mut right)?;

    parent.entries[index].offset = left.offset;
    parent.entries[index].config = left.config;
    parent.insert_at(index + 1, Kv { key: middle_key, offset: right.offset, config: right.config });
    Ok(())
}

/// Recursively rebuilds `page` (read from `source`) into `target`,
/// appending every live child page and value blob, and returns the
/// rewritten page with its new on-disk location. Used by compaction.
pub(crate) fn copy_page(source: &mut Ctx, target: &mut Ctx, page: &Page) -> Result<Page> {
    let mut new_entries = Vec::with_capacity(page.entries.len());
    for e in &page.entries {
        if page.kind == PageKind::Internal {
            let child = load_page(source, e.offset, e.config)?;
            let copied = copy_page(source, target, &child)?;
            new_entries.push(Kv { key: e.key.clone(), offset: copied.offset, config: copied.config });
        } else {
            let value = source.writer.read(Compression::Compressed, e.offset, e.config, source.compressor)?;
            let (offset, csize) =
                target.writer.write(Compression::Compressed, &value, target.compressor)?;
            target.maybe_fsync()?;
            new_entries.push(Kv { key: e.key.clone(), offset, config: csize });
        }
    }
    let mut new_page = Page { kind: page.kind, offset: 0, config: 0, entries: new_entries };
    save_page(target, &mut new_page)?;
    Ok(new_page)
}

/// In-order range walk with separator-key pruning on internal pages.
/// `cb` returns `false` to stop early. Returns `false` if the walk was
/// stopped early by `cb`, `true` if it ran to completion.
pub(crate) fn range(
    ctx: &mut Ctx,
    page: &Page,
    lo: Option<&[u8]>,
    hi: Option<&[u8]>,
    cb: &mut dyn FnMut(&[u8], Vec<u8>) -> bool,
) -> Result<bool> {
    match page.kind {
        PageKind::Leaf => {
            for e in &page.entries {
                if let Some(lo) = lo
                    && ctx.comparator.compare(&e.key, lo) == Ordering::Less
                {
                    continue;
                }
                if let Some(hi) = hi
                    && ctx.comparator.compare(&e.key, hi) == Ordering::Greater
                {
                    break;
                }
                let value = ctx.writer.read(Compression::Compressed, e.offset, e.config, ctx.compressor)?;
                if !cb(&e.key, value) {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        PageKind::Internal => {
            for i in 0..page.entries.len() {
                if let Some(hi) = hi
                    && i > 0
                    && ctx.comparator.compare(&page.entries[i].key, hi) == Ordering::Greater
                {
                    break;
                }
                if let Some(lo) = lo
                    && let Some(next) = page.entries.get(i + 1)
                    && ctx.comparator.compare(&next.key, lo) != Ordering::Greater
                {
                    continue;
                }
                let child = load_page(ctx, page.entries[i].offset, page.entries[i].config)?;
                if !range(ctx, &child, lo, hi, cb)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}
