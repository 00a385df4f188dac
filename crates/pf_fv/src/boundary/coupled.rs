// crates/pf_fv/src/boundary/coupled.rs

//! 耦合边界
//!
//! 面片的"对侧"是另一个面片上的单元（周期边界、分区边界）。对侧值经
//! [`PatchExchange`](super::PatchExchange) 获得，两阶段求值：
//!
//! 1. `init_evaluate`: 发送本侧单元值与单元到面的距离
//! 2. `evaluate`: 接收对侧缓冲，更新插值权重、差分系数与面值
//!
//! 每个面的缓冲布局为 `[分量..., 距离]`。
//!
//! 隐式系数只耦合本侧单元，对侧值作为显式项进入源项（滞后一次修正）。

use pf_mesh::{PatchType, PolyMesh};

use super::{
    map_values, patch_delta_coeffs, PatchContext, PatchField, PatchFieldArgs, PatchFieldKind,
};
use crate::error::{FvError, FvResult};
use crate::field_value::FieldValue;

/// 耦合边界
#[derive(Debug, Clone)]
pub struct Coupled<T> {
    patch: usize,
    patch_name: String,
    values: Vec<T>,
    neighbour: Vec<T>,
    weights: Vec<f64>,
    delta: Vec<f64>,
}

impl<T: FieldValue> Coupled<T> {
    /// 以本侧单元值初始化，权重取 0.5
    pub fn new(patch: usize, patch_name: impl Into<String>, internal_values: Vec<T>) -> Self {
        let n = internal_values.len();
        Self {
            patch,
            patch_name: patch_name.into(),
            values: internal_values.clone(),
            neighbour: internal_values,
            weights: vec![0.5; n],
            delta: Vec::new(),
        }
    }

    /// 从构造参数创建，面片必须是耦合类型
    pub fn from_args(args: &PatchFieldArgs<T>) -> FvResult<Self> {
        if !matches!(args.patch_type, PatchType::Coupled { .. }) {
            return Err(pf_config::ConfigError::invalid_value(
                args.dict.scoped_key("type"),
                "coupled",
                format!("面片 {} 的几何类型是 {}", args.patch_name, args.patch_type.name()),
            )
            .into());
        }
        Ok(Self::new(
            args.patch,
            args.patch_name.clone(),
            args.internal_values.clone(),
        ))
    }
}

impl<T: FieldValue> PatchField<T> for Coupled<T> {
    fn type_name(&self) -> &'static str {
        "coupled"
    }

    fn kind(&self) -> PatchFieldKind {
        PatchFieldKind::Coupled
    }

    #[inline]
    fn patch(&self) -> usize {
        self.patch
    }

    #[inline]
    fn values(&self) -> &[T] {
        &self.values
    }

    fn set_values(&mut self, values: Vec<T>) {
        self.values = values;
    }

    fn neighbour_values(&self) -> Option<&[T]> {
        Some(&self.neighbour)
    }

    fn coupled_weights(&self) -> Option<&[f64]> {
        Some(&self.weights)
    }

    /// 跨面片的差分系数 `1 / (d_own + d_remote)`
    ///
    /// 第一次交换前假定两侧距离相等。
    fn delta_coeffs(&self, mesh: &PolyMesh) -> Vec<f64> {
        if self.delta.len() == self.values.len() {
            self.delta.clone()
        } else {
            patch_delta_coeffs(mesh, self.patch)
                .into_iter()
                .map(|d| 0.5 * d)
                .collect()
        }
    }

    fn init_evaluate(&mut self, ctx: &PatchContext<'_, T>) -> FvResult<()> {
        let internal = ctx.patch_internal_values(self.patch);
        let own_delta = patch_delta_coeffs(ctx.mesh, self.patch);
        let mut buffer = Vec::with_capacity(internal.len() * (T::N_COMPONENTS + 1));
        for (v, d) in internal.iter().zip(own_delta) {
            buffer.extend((0..T::N_COMPONENTS).map(|k| v.component(k)));
            buffer.push(1.0 / d);
        }
        ctx.exchange.send(ctx.field_name, &self.patch_name, buffer)
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>) -> FvResult<()> {
        let buffer = ctx.exchange.receive(ctx.field_name, &self.patch_name)?;
        let stride = T::N_COMPONENTS + 1;
        let n = self.values.len();
        if buffer.len() != n * stride {
            return Err(FvError::ExchangeProtocol(format!(
                "场 {} 面片 {} 期望 {} 个数据，收到 {} 个",
                ctx.field_name,
                self.patch_name,
                n * stride,
                buffer.len()
            )));
        }

        let internal = ctx.patch_internal_values(self.patch);
        let own_delta = patch_delta_coeffs(ctx.mesh, self.patch);
        self.delta.resize(n, 0.0);
        for (i, chunk) in buffer.chunks_exact(stride).enumerate() {
            let mut nbr = T::zero();
            for k in 0..T::N_COMPONENTS {
                nbr.set_component(k, chunk[k]);
            }
            let d_own = 1.0 / own_delta[i];
            let d_remote = chunk[T::N_COMPONENTS];
            let span = d_own + d_remote;
            let w = d_remote / span;

            self.neighbour[i] = nbr;
            self.weights[i] = w;
            self.delta[i] = 1.0 / span;
            self.values[i] = internal[i] * w + nbr * (1.0 - w);
        }
        Ok(())
    }

    fn map(&mut self, face_map: &[usize], patch: usize) {
        self.values = map_values(&self.values, face_map);
        self.neighbour = map_values(&self.neighbour, face_map);
        self.weights = map_values(&self.weights, face_map);
        // 几何在下一次交换时重建
        self.delta.clear();
        self.patch = patch;
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}
