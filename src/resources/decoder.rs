//! Geometry decompression for `EXT_meshopt_compression` buffer views.
//!
//! Compressed buffer views carry their own little extension header (source
//! range, element count/stride, stream mode and an optional filter). The
//! [`MeshDecoder`] trait is the seam the glTF loader consumes; the shipped
//! implementation delegates to the reference meshoptimizer codecs.

use anyhow::{Context, Result, bail};
use serde_json::Value;

/// Which meshoptimizer stream codec a compressed view uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionMode {
    Attributes,
    Triangles,
    Indices,
}

/// Post-decode filter applied to attribute streams.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompressionFilter {
    #[default]
    None,
    Octahedral,
    Quaternion,
    Exponential,
}

/// Parsed `EXT_meshopt_compression` extension of one buffer view.
#[derive(Clone, Debug)]
pub struct CompressedView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: usize,
    pub count: usize,
    pub mode: CompressionMode,
    pub filter: CompressionFilter,
}

impl CompressedView {
    pub fn from_extension(ext: &Value) -> Result<Self> {
        let field = |name: &str| -> Result<usize> {
            ext.get(name)
                .and_then(Value::as_u64)
                .map(|v| v as usize)
                .with_context(|| format!("EXT_meshopt_compression misses \"{name}\""))
        };
        let mode = match ext.get("mode").and_then(Value::as_str) {
            Some("ATTRIBUTES") => CompressionMode::Attributes,
            Some("TRIANGLES") => CompressionMode::Triangles,
            Some("INDICES") => CompressionMode::Indices,
            other => bail!("unknown meshopt compression mode {other:?}"),
        };
        let filter = match ext.get("filter").and_then(Value::as_str) {
            None | Some("NONE") => CompressionFilter::None,
            Some("OCTAHEDRAL") => CompressionFilter::Octahedral,
            Some("QUATERNION") => CompressionFilter::Quaternion,
            Some("EXPONENTIAL") => CompressionFilter::Exponential,
            Some(other) => bail!("unknown meshopt compression filter {other:?}"),
        };

        Ok(Self {
            buffer: field("buffer")?,
            byte_offset: ext
                .get("byteOffset")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize,
            byte_length: field("byteLength")?,
            byte_stride: field("byteStride")?,
            count: field("count")?,
            mode,
            filter,
        })
    }

    /// Size of the decoded view in bytes.
    pub fn decoded_len(&self) -> usize {
        self.count * self.byte_stride
    }
}

/// A decoder that expands a compact encoded geometry representation back
/// into renderable vertex/index data at load time.
pub trait MeshDecoder {
    fn decode(&self, view: &CompressedView, source: &[u8]) -> Result<Vec<u8>>;
}

/// Decoder backed by the reference meshoptimizer codecs.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeshoptDecoder;

impl MeshDecoder for MeshoptDecoder {
    fn decode(&self, view: &CompressedView, source: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; view.decoded_len()];
        let status = unsafe {
            match view.mode {
                CompressionMode::Attributes => meshopt::ffi::meshopt_decodeVertexBuffer(
                    out.as_mut_ptr().cast(),
                    view.count,
                    view.byte_stride,
                    source.as_ptr(),
                    source.len(),
                ),
                CompressionMode::Triangles => meshopt::ffi::meshopt_decodeIndexBuffer(
                    out.as_mut_ptr().cast(),
                    view.count,
                    view.byte_stride,
                    source.as_ptr(),
                    source.len(),
                ),
                CompressionMode::Indices => meshopt::ffi::meshopt_decodeIndexSequence(
                    out.as_mut_ptr().cast(),
                    view.count,
                    view.byte_stride,
                    source.as_ptr(),
                    source.len(),
                ),
            }
        };
        if status != 0 {
            bail!(
                "corrupt meshopt stream ({:?} mode, status {status})",
                view.mode
            );
        }

        match view.filter {
            CompressionFilter::None => (),
            CompressionFilter::Octahedral => unsafe {
                meshopt::ffi::meshopt_decodeFilterOct(
                    out.as_mut_ptr().cast(),
                    view.count,
                    view.byte_stride,
                );
            },
            CompressionFilter::Quaternion => unsafe {
                meshopt::ffi::meshopt_decodeFilterQuat(
                    out.as_mut_ptr().cast(),
                    view.count,
                    view.byte_stride,
                );
            },
            CompressionFilter::Exponential => unsafe {
                meshopt::ffi::meshopt_decodeFilterExp(
                    out.as_mut_ptr().cast(),
                    view.count,
                    view.byte_stride,
                );
            },
        }

        Ok(out)
    }
}
