use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::compress::Compressor;
use crate::error::{BpError, Result};

/// Every append is preceded by zero padding to this boundary; head-block
/// recovery depends on the resulting fixed strides.
pub(crate) const ALIGN: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Compression {
    NotCompressed,
    Compressed,
}

/// Owns the backing file descriptor and the logical, monotonically
/// growing file size. Offset-addressed, append-only, single-threaded.
pub(crate) struct Writer {
    file: File,
    filesize: u64,
    padding: [u8; ALIGN as usize],
}

impl Writer {
    /// Opens `path` for read+write, creating it if absent, under an
    /// exclusive advisory lock. A second opener on the same file fails
    /// immediately rather than blocking — there is at most one live tree
    /// per file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| BpError::File(format!("{}: {e}", path.display())))?;
        file.try_lock_exclusive().map_err(|_| {
            BpError::File(format!("{} is already opened by another tree", path.display()))
        })?;
        let filesize = file.metadata().map_err(|e| BpError::File(e.to_string()))?.len();
        Ok(Self { file, filesize, padding: [0u8; ALIGN as usize] })
    }

    pub fn filesize(&self) -> u64 {
        self.filesize
    }

    /// Bounds-checks and reads exactly `size` on-disk bytes at `offset`,
    /// then decompresses them if requested. Empty reads short-circuit to
    /// an empty buffer without touching the file.
    pub fn read(
        &mut self,
        compression: Compression,
        offset: u64,
        size: u64,
        compressor: &dyn Compressor,
    ) -> Result<Vec<u8>> {
        if offset.saturating_add(size) > self.filesize {
            return Err(BpError::FileReadOob { offset, expected: size, filesize: self.filesize });
        }
        if size == 0 {
            return Ok(Vec::new());
        }
        let mut raw = vec![0u8; size as usize];
        self.file
            .seek(SeekFrom::Start(offset))
            .inspect_err(|e| log::error!("seek to offset {offset} failed: {e}"))
            .map_err(|e| BpError::FileRead(e.to_string()))?;
        self.file
            .read_exact(&mut raw)
            .inspect_err(|e| log::error!("read of {size} bytes at offset {offset} failed: {e}"))
            .map_err(|e| BpError::FileRead(e.to_string()))?;
        match compression {
            Compression::NotCompressed => Ok(raw),
            Compression::Compressed => {
                // Pre-sizing hint only; the decompressor's own output is
                // authoritative regardless of what this reports.
                let _hint = compressor.uncompressed_length(&raw)?;
                compressor.decompress(&raw)
            }
        }
    }

    /// Realigns to the next 8-byte boundary, then appends `data` (optionally
    /// compressed). Returns the post-padding offset and the number of bytes
    /// actually written on disk. An empty `data` only emits padding.
    pub fn write(
        &mut self,
        compression: Compression,
        data: &[u8],
        compressor: &dyn Compressor,
    ) -> Result<(u64, u64)> {
        self.pad()?;
        let offset = self.filesize;
        if data.is_empty() {
            return Ok((offset, 0));
        }
        let bytes = match compression {
            Compression::NotCompressed => data.to_vec(),
            Compression::Compressed => compressor.compress(data)?,
        };
        self.file
            .seek(SeekFrom::Start(offset))
            .inspect_err(|e| log::error!("seek to offset {offset} failed: {e}"))
            .map_err(|e| BpError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&bytes)
            .inspect_err(|e| log::error!("append of {} bytes at offset {offset} failed: {e}", bytes.len()))
            .map_err(|e| BpError::FileWrite(e.to_string()))?;
        self.filesize += bytes.len() as u64;
        Ok((offset, bytes.len() as u64))
    }

    fn pad(&mut self) -> Result<()> {
        let rem = self.filesize % ALIGN;
        if rem == 0 {
            return Ok(());
        }
        let pad_len = (ALIGN - rem) as usize;
        self.file
            .seek(SeekFrom::Start(self.filesize))
            .map_err(|e| BpError::FileWrite(e.to_string()))?;
        self.file
            .write_all(&self.padding[..pad_len])
            .map_err(|e| BpError::FileWrite(e.to_string()))?;
        self.filesize += pad_len as u64;
        Ok(())
    }

    pub fn fsync(&self) -> Result<()> {
        Ok(self.file.sync_data()?)
    }

    /// Pads, then scans the file backward for a `stride`-sized block
    /// satisfying `seek`, trying every 8-byte-aligned offset — not every
    /// `stride`-sized stride — from `filesize - stride` down to `0`. A
    /// valid head block is always written at an `ALIGN`-aligned offset,
    /// but it need not sit at a multiple of `stride` from the (possibly
    /// padded-up) end of file: tail bytes appended after the last good
    /// head shift the alignment-padded end-of-file by any multiple of
    /// `ALIGN`, not of `stride`, so stepping the scan origin by `stride`
    /// can step right over it. A candidate that fails to read (e.g. a
    /// truncated tail) is skipped rather than treated as fatal, exactly
    /// like a miss. Used exclusively for head-block location.
    pub fn find<T>(
        &mut self,
        stride: u64,
        compressor: &dyn Compressor,
        mut seek: impl FnMut(&[u8]) -> Option<T>,
    ) -> Result<Option<T>> {
        self.pad()?;
        if self.filesize < stride {
            return Ok(None);
        }
        let mut candidate = self.filesize - stride;
        let mut skipped = 0u64;
        loop {
            if let Ok(data) = self.read(Compression::NotCompressed, candidate, stride, compressor)
                && let Some(found) = seek(&data)
            {
                if skipped > 0 {
                    log::warn!(
                        "backward scan skipped {skipped} invalid candidate block(s) before offset {candidate}"
                    );
                }
                return Ok(Some(found));
            }
            skipped += 1;
            match candidate.checked_sub(ALIGN) {
                Some(next) => candidate = next,
                None => break,
            }
        }
        Ok(None)
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub(crate) fn compact_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".compact");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::GzipCompressor;

    #[test]
    fn write_pads_to_eight_byte_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.bin");
        let mut w = Writer::create(&path).unwrap();
        let compressor = GzipCompressor::default();
        let (off1, _) = w.write(Compression::NotCompressed, b"abc", &compressor).unwrap();
        assert_eq!(off1 % ALIGN, 0);
        let (off2, _) = w.write(Compression::NotCompressed, b"de", &compressor).unwrap();
        assert_eq!(off2 % ALIGN, 0);
        assert!(off2 > off1);
    }

    #[test]
    fn read_out_of_bounds_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.bin");
        let mut w = Writer::create(&path).unwrap();
        let compressor = GzipCompressor::default();
        let err = w.read(Compression::NotCompressed, 0, 8, &compressor).unwrap_err();
        assert!(matches!(err, BpError::FileReadOob { .. }));
    }

    #[test]
    fn second_open_on_same_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.bin");
        let _first = Writer::create(&path).unwrap();
        assert!(Writer::create(&path).is_err());
    }
}
