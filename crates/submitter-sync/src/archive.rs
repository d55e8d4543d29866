//! # Upload Archives
//!
//! Both bulk endpoints accept a gzip-compressed tar stream. `ArchiveBuilder`
//! compresses entries as they are appended, and [`ArchiveBuilder::compressed_len()`]
//! sync-flushes the encoder before reporting how much of the upload body has
//! been produced; the asset batcher uses it to decide when a batch is full.
//!
//! Headers are normalised (mode `0644`, zero mtime/uid/gid) so the same
//! entries always produce the same archive.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{EntryType, Header};

/// An in-memory gzip tar archive under construction.
pub struct ArchiveBuilder {
    builder: tar::Builder<GzEncoder<Vec<u8>>>,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default())),
            entries: 0,
        }
    }

    /// Append the contents of the file at `path` under the entry name `name`.
    pub fn append_file(&mut self, name: &str, path: &Path) -> io::Result<()> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        self.append_reader(name, size, file)
    }

    /// Append an in-memory entry.
    pub fn append_bytes(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        self.append_reader(name, data.len() as u64, data)
    }

    fn append_reader(&mut self, name: &str, size: u64, data: impl Read) -> io::Result<()> {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_size(size);
        self.builder.append_data(&mut header, name, data)?;
        self.entries += 1;
        Ok(())
    }

    /// Compressed size of everything appended so far.
    ///
    /// Flushes pending deflate input first, so the count covers every entry
    /// rather than only the blocks the encoder chose to emit. Excludes the
    /// tar trailer and gzip footer written by [`finish()`](Self::finish).
    pub fn compressed_len(&mut self) -> io::Result<usize> {
        let encoder = self.builder.get_mut();
        encoder.flush()?;
        Ok(encoder.get_ref().len())
    }

    /// Number of entries appended.
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Write the tar trailer, flush the gzip stream, and return the archive bytes.
    pub fn finish(self) -> io::Result<Vec<u8>> {
        self.builder.into_inner()?.finish()
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
