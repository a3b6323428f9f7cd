//! Pluggable compression support for shard I/O.
//!
//! Codecs are picked by file extension first and by magic bytes as a fallback,
//! so a shard named `part_000` that is really gzip still decodes.
//!
//! ## Built-in Codecs
//!
//! - **Gzip** (`.gz`) - via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` (feature: `compression-zstd`)
//!
//! ## Usage
//!
//! ```no_run
//! use shardfix::io::compression::{auto_detect_reader, auto_detect_writer};
//! use std::fs::File;
//! use std::io::Write;
//! # fn main() -> anyhow::Result<()> {
//!
//! let reader = auto_detect_reader(File::open("part_000.gz")?, "part_000.gz")?;
//!
//! let mut writer = auto_detect_writer(File::create("out.gz")?, "out.gz")?;
//! writer.write_all(b"{}\n")?;
//! writer.finish()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Finishing Writers
//!
//! Encoders only write their trailer when finished. [`EncodedWriter::finish`]
//! surfaces trailer and flush errors instead of losing them in `Drop`, which
//! is what lets the caller commit an output file only once it is complete.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Global codec registry.
static CODEC_REGISTRY: RwLock<Option<Vec<Arc<dyn CompressionCodec>>>> = RwLock::new(None);

fn init_registry() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
    ]
}

fn get_registry() -> Vec<Arc<dyn CompressionCodec>> {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).clone()
}

/// Register a custom compression codec globally.
///
/// Registered codecs are consulted after the built-in ones.
pub fn register_codec(codec: Arc<dyn CompressionCodec>) {
    let mut lock = CODEC_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(init_registry).push(codec);
}

/// A writer that must be explicitly finished to produce a complete stream.
pub trait EncodedWriter: Write + Send {
    /// Write any trailer and flush everything down to the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while finishing or flushing.
    fn finish(self: Box<Self>) -> std::io::Result<()>;
}

impl<W: Write + Send> EncodedWriter for BufWriter<W> {
    fn finish(mut self: Box<Self>) -> std::io::Result<()> {
        self.flush()
    }
}

/// Pluggable compression codec.
///
/// Implementations are stored in a global registry and must be `Send + Sync`.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g. "gzip").
    fn name(&self) -> &str;

    /// Lowercase extensions with the leading dot (e.g. `&[".gz"]`).
    fn extensions(&self) -> &[&str];

    /// Magic byte signature, if the format has one.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Wrap a reader with decompression.
    fn wrap_reader_dyn(&self, reader: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>>;

    /// Wrap a writer with compression.
    fn wrap_writer_dyn(
        &self,
        writer: Box<dyn Write + Send>,
    ) -> std::io::Result<Box<dyn EncodedWriter>>;
}

/// First registered codec whose extension matches `path` (case-insensitive).
#[must_use]
pub fn detect_from_extension(path: impl AsRef<Path>) -> Option<Arc<dyn CompressionCodec>> {
    let path_str = path.as_ref().to_string_lossy().to_lowercase();
    get_registry()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| path_str.ends_with(ext)))
}

/// Match the head of a buffered stream against codec signatures without
/// consuming it.
fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<Arc<dyn CompressionCodec>> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    get_registry().into_iter().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| buf.starts_with(magic))
    })
}

/// Wrap `reader` with the decompressor matching `path_hint`, falling back to
/// magic bytes, or return it buffered as-is.
///
/// # Errors
///
/// Returns an error if the codec fails to initialize.
pub fn auto_detect_reader<R: Read + Send + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read + Send>> {
    if let Some(codec) = detect_from_extension(&path_hint) {
        return codec
            .wrap_reader_dyn(Box::new(reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    let mut buf_reader = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buf_reader) {
        return codec
            .wrap_reader_dyn(Box::new(buf_reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    Ok(Box::new(buf_reader))
}

/// Wrap `writer` with the compressor matching the extension of `path_hint`,
/// or return it buffered as-is.
///
/// The sink is buffered underneath the encoder as well.
///
/// # Errors
///
/// Returns an error if the codec fails to initialize.
pub fn auto_detect_writer<W: Write + Send + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn EncodedWriter>> {
    let sink = BufWriter::new(writer);
    if let Some(codec) = detect_from_extension(&path_hint) {
        return codec
            .wrap_writer_dyn(Box::new(sink))
            .with_context(|| format!("wrap writer with {} codec", codec.name()));
    }
    Ok(Box::new(sink))
}

/// Registered codec called `name`.
#[must_use]
pub fn codec_by_name(name: &str) -> Option<Arc<dyn CompressionCodec>> {
    get_registry().into_iter().find(|codec| codec.name() == name)
}

/// Like [`auto_detect_writer`], but encodes with the codec named `default`
/// when the extension of `path_hint` names none.
///
/// # Errors
///
/// Returns an error if `default` is not registered or the codec fails to
/// initialize.
pub fn writer_with_default<W: Write + Send + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
    default: &str,
) -> Result<Box<dyn EncodedWriter>> {
    let codec = match detect_from_extension(&path_hint) {
        Some(codec) => codec,
        None => codec_by_name(default)
            .with_context(|| format!("no {default} codec registered"))?,
    };
    codec
        .wrap_writer_dyn(Box::new(BufWriter::new(writer)))
        .with_context(|| format!("wrap writer with {} codec", codec.name()))
}

// ============================================================================
// Built-in Codec Implementations
// ============================================================================

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl EncodedWriter for flate2::write::GzEncoder<Box<dyn Write + Send>> {
    fn finish(self: Box<Self>) -> std::io::Result<()> {
        let mut inner = flate2::write::GzEncoder::finish(*self)?;
        inner.flush()
    }
}

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>> {
        // Multi-member streams are common in concatenated dumps.
        use flate2::read::MultiGzDecoder;
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }

    fn wrap_writer_dyn(
        &self,
        writer: Box<dyn Write + Send>,
    ) -> std::io::Result<Box<dyn EncodedWriter>> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl EncodedWriter for zstd::stream::write::Encoder<'static, Box<dyn Write + Send>> {
    fn finish(self: Box<Self>) -> std::io::Result<()> {
        let mut inner = zstd::stream::write::Encoder::finish(*self)?;
        inner.flush()
    }
}

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read + Send>) -> std::io::Result<Box<dyn Read + Send>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read + Send>)
    }

    fn wrap_writer_dyn(
        &self,
        writer: Box<dyn Write + Send>,
    ) -> std::io::Result<Box<dyn EncodedWriter>> {
        zstd::stream::write::Encoder::new(writer, 3).map(|e| Box::new(e) as Box<dyn EncodedWriter>)
    }
}
