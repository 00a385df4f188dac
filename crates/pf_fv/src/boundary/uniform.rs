// crates/pf_fv/src/boundary/uniform.rs

//! 随时间变化的均匀给定值边界
//!
//! `uniformValue` 可以是单个值，也可以是 `[[t, v], ...]` 形式的时间表。
//! 时间表按时间分段线性插值，超出范围时取端点值。

use serde::Deserialize;

use super::{map_values, PatchContext, PatchField, PatchFieldArgs, PatchFieldKind};
use crate::error::FvResult;
use crate::field_value::FieldValue;

/// 分段线性时间表
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTable<T> {
    points: Vec<(f64, T)>,
}

impl<T: FieldValue> TimeTable<T> {
    /// 常值表
    pub fn constant(value: T) -> Self {
        Self {
            points: vec![(0.0, value)],
        }
    }

    /// 由时间点创建，按时间排序
    pub fn new(mut points: Vec<(f64, T)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    /// 时刻 `t` 的值
    pub fn value(&self, t: f64) -> T {
        let Some(&(t0, v0)) = self.points.first() else {
            return T::zero();
        };
        if t <= t0 {
            return v0;
        }
        for pair in self.points.windows(2) {
            let (ta, va) = pair[0];
            let (tb, vb) = pair[1];
            if t <= tb {
                let span = tb - ta;
                if span <= 0.0 {
                    return vb;
                }
                let s = (t - ta) / span;
                return va * (1.0 - s) + vb * s;
            }
        }
        self.points.last().map_or(v0, |&(_, v)| v)
    }
}

impl<'de, T: FieldValue> Deserialize<'de> for TimeTable<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        if let Ok(v) = T::deserialize(&value) {
            return Ok(Self::constant(v));
        }
        let points: Vec<(f64, T)> =
            Vec::deserialize(&value).map_err(serde::de::Error::custom)?;
        if points.is_empty() {
            return Err(serde::de::Error::custom("时间表为空"));
        }
        Ok(Self::new(points))
    }
}

/// 均匀给定值边界，面值在每次求值时按当前时间更新
#[derive(Debug, Clone)]
pub struct UniformFixedValue<T> {
    patch: usize,
    table: TimeTable<T>,
    values: Vec<T>,
}

impl<T: FieldValue> UniformFixedValue<T> {
    /// 直接构造，面值取 0 时刻的表值
    pub fn new(patch: usize, size: usize, table: TimeTable<T>) -> Self {
        let values = vec![table.value(0.0); size];
        Self {
            patch,
            table,
            values,
        }
    }

    /// 从字典读取 `uniformValue`
    pub fn from_args(args: &PatchFieldArgs<T>) -> FvResult<Self> {
        let table: TimeTable<T> = args.dict.get("uniformValue")?;
        let mut bc = Self::new(args.patch, args.size(), table);
        if let Some(values) = args.read_values_opt("value")? {
            bc.values = values;
        }
        Ok(bc)
    }
}

impl<T: FieldValue> PatchField<T> for UniformFixedValue<T> {
    fn type_name(&self) -> &'static str {
        "uniformFixedValue"
    }

    fn kind(&self) -> PatchFieldKind {
        PatchFieldKind::FixedValue
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

    fn evaluate(&mut self, ctx: &PatchContext<'_, T>) -> FvResult<()> {
        let v = self.table.value(ctx.time.value);
        self.values.iter_mut().for_each(|x| *x = v);
        Ok(())
    }

    fn map(&mut self, face_map: &[usize], patch: usize) {
        self.values = map_values(&self.values, face_map);
        self.patch = patch;
    }

    fn clone_box(&self) -> Box<dyn PatchField<T>> {
        Box::new(self.clone())
    }
}
