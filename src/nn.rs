//! Loading and feeding the ONNX networks.
//!
//! Both networks take a square NCHW `f32` input with RGB values in `0.0..=1.0`.

use std::{path::Path, sync::Arc};

use anyhow::Context;
use image::RgbaImage;
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, Tensor, TypedFact,
    TypedOp,
};

use crate::rect::Rect;

pub(crate) type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Loads and optimizes the network stored at `path`. `what` names it in errors and logs.
pub(crate) fn load_model(path: &Path, what: &str) -> anyhow::Result<Model> {
    let graph = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to load {} model '{}'", what, path.display()))?
        .into_optimized()?;
    let model = SimplePlan::new(graph)?;
    log::info!("loaded {} model from '{}'", what, path.display());
    Ok(model)
}

/// Runs `model` on a single input tensor.
pub(crate) fn run(model: &Model, input: Tensor) -> anyhow::Result<TVec<TValue>> {
    Ok(model.run(tvec![TValue::from_const(Arc::new(input))])?)
}

/// Samples the part of `image` covered by `rect` into a `res`x`res` NCHW tensor.
///
/// `rect` may extend past the image borders, those parts of the input are black. Sampling is
/// nearest-neighbor.
pub(crate) fn crop_to_tensor(image: &RgbaImage, rect: Rect, res: u32) -> anyhow::Result<Tensor> {
    let res_f = res as f32;
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    let plane = (res * res) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for v in 0..res {
        let sy = (rect.y() + (v as f32 + 0.5) * rect.height() / res_f).floor() as i64;
        if sy < 0 || sy >= h {
            continue;
        }
        for u in 0..res {
            let sx = (rect.x() + (u as f32 + 0.5) * rect.width() / res_f).floor() as i64;
            if sx < 0 || sx >= w {
                continue;
            }

            let px = image.get_pixel(sx as u32, sy as u32);
            let i = (v * res + u) as usize;
            for c in 0..3 {
                data[c * plane + i] = f32::from(px[c]) / 255.0;
            }
        }
    }

    let shape = [1, 3, res as usize, res as usize];
    Ok(Tensor::from_shape(&shape, &data)?)
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
