//! Typed accessor reads over materialized buffer views.
//!
//! Buffer views are materialized (sliced or decompressed) before any
//! accessor is read, so the readers here only deal with offsets, strides
//! and component conversion. Quantized attribute types are widened to f32,
//! honouring the accessor's `normalized` flag, which is what compressed
//! exports rely on.

use anyhow::{Context, Result, bail};
use gltf::accessor::{Accessor, DataType, Dimensions};

/// One materialized buffer view: raw bytes plus an optional stride override
/// recorded during decompression.
#[derive(Clone, Debug, Default)]
pub struct ViewData {
    pub bytes: Vec<u8>,
    pub stride: Option<usize>,
}

fn component_size(ty: DataType) -> usize {
    match ty {
        DataType::I8 | DataType::U8 => 1,
        DataType::I16 | DataType::U16 => 2,
        DataType::U32 | DataType::F32 => 4,
    }
}

fn component_count(dimensions: Dimensions) -> Result<usize> {
    Ok(match dimensions {
        Dimensions::Scalar => 1,
        Dimensions::Vec2 => 2,
        Dimensions::Vec3 => 3,
        Dimensions::Vec4 => 4,
        other => bail!("unsupported accessor dimensions {other:?}"),
    })
}

fn convert(bytes: &[u8], ty: DataType, normalized: bool) -> f32 {
    match ty {
        DataType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        DataType::U8 => {
            let v = bytes[0] as f32;
            if normalized { v / 255.0 } else { v }
        }
        DataType::I8 => {
            let v = bytes[0] as i8 as f32;
            if normalized { (v / 127.0).max(-1.0) } else { v }
        }
        DataType::U16 => {
            let v = u16::from_le_bytes([bytes[0], bytes[1]]) as f32;
            if normalized { v / 65535.0 } else { v }
        }
        DataType::I16 => {
            let v = i16::from_le_bytes([bytes[0], bytes[1]]) as f32;
            if normalized { (v / 32767.0).max(-1.0) } else { v }
        }
        DataType::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
    }
}

/// Read an accessor as a flat list of f32 components.
pub fn read_floats(accessor: &Accessor, views: &[ViewData]) -> Result<Vec<f32>> {
    if accessor.sparse().is_some() {
        bail!("sparse accessors are not supported");
    }
    let components = component_count(accessor.dimensions())?;
    let component = component_size(accessor.data_type());
    let element = components * component;

    let Some(view) = accessor.view() else {
        // Accessors without a view are specified to read as zeros
        return Ok(vec![0.0; accessor.count() * components]);
    };
    let data = views
        .get(view.index())
        .with_context(|| format!("buffer view {} missing", view.index()))?;
    let stride = data.stride.or(view.stride()).unwrap_or(element);
    let base = accessor.offset();

    let needed = base + accessor.count().saturating_sub(1) * stride + element;
    if accessor.count() > 0 && data.bytes.len() < needed {
        bail!(
            "accessor {} reads past its buffer view ({} < {needed})",
            accessor.index(),
            data.bytes.len()
        );
    }

    let mut out = Vec::with_capacity(accessor.count() * components);
    let normalized = accessor.normalized();
    for i in 0..accessor.count() {
        let start = base + i * stride;
        for c in 0..components {
            let at = start + c * component;
            out.push(convert(
                &data.bytes[at..at + component],
                accessor.data_type(),
                normalized,
            ));
        }
    }
    Ok(out)
}

pub fn read_vec2(accessor: &Accessor, views: &[ViewData]) -> Result<Vec<[f32; 2]>> {
    let floats = read_floats(accessor, views)?;
    Ok(floats.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
}

pub fn read_vec3(accessor: &Accessor, views: &[ViewData]) -> Result<Vec<[f32; 3]>> {
    let floats = read_floats(accessor, views)?;
    Ok(floats.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

pub fn read_vec4(accessor: &Accessor, views: &[ViewData]) -> Result<Vec<[f32; 4]>> {
    let floats = read_floats(accessor, views)?;
    Ok(floats
        .chunks_exact(4)
        .map(|c| [c[0], c[1], c[2], c[3]])
        .collect())
}

/// Read an index accessor, widening to u32.
pub fn read_indices(accessor: &Accessor, views: &[ViewData]) -> Result<Vec<u32>> {
    if accessor.sparse().is_some() {
        bail!("sparse accessors are not supported");
    }
    if accessor.dimensions() != Dimensions::Scalar {
        bail!("index accessor must be scalar");
    }
    let component = match accessor.data_type() {
        DataType::U8 => 1,
        DataType::U16 => 2,
        DataType::U32 => 4,
        other => bail!("unsupported index type {other:?}"),
    };

    let Some(view) = accessor.view() else {
        return Ok(vec![0; accessor.count()]);
    };
    let data = views
        .get(view.index())
        .with_context(|| format!("buffer view {} missing", view.index()))?;
    let stride = data.stride.or(view.stride()).unwrap_or(component);
    let base = accessor.offset();

    let needed = base + accessor.count().saturating_sub(1) * stride + component;
    if accessor.count() > 0 && data.bytes.len() < needed {
        bail!(
            "accessor {} reads past its buffer view ({} < {needed})",
            accessor.index(),
            data.bytes.len()
        );
    }

    let mut out = Vec::with_capacity(accessor.count());
    for i in 0..accessor.count() {
        let at = base + i * stride;
        let bytes = &data.bytes[at..at + component];
        out.push(match accessor.data_type() {
            DataType::U8 => bytes[0] as u32,
            DataType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            _ => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        });
    }
    Ok(out)
}
