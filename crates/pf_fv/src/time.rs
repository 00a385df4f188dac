// crates/pf_fv/src/time.rs

//! 时间状态

use serde::{Deserialize, Serialize};

/// 时间状态：当前时间、时间步长与时间步序号
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeState {
    /// 当前时间
    pub value: f64,
    /// 当前时间步长
    pub delta_t: f64,
    /// 上一时间步长
    pub delta_t0: f64,
    /// 时间步序号
    pub index: usize,
}

impl TimeState {
    /// 以步长 `delta_t` 从 0 时刻开始
    pub fn new(delta_t: f64) -> Self {
        Self {
            value: 0.0,
            delta_t,
            delta_t0: delta_t,
            index: 0,
        }
    }

    /// 稳态计算使用的单位步长
    pub fn steady() -> Self {
        Self::new(1.0)
    }

    /// 前进一步，步长为 `delta_t`
    pub fn advance(&mut self, delta_t: f64) {
        self.delta_t0 = self.delta_t;
        self.delta_t = delta_t;
        self.value += delta_t;
        self.index += 1;
    }

    /// 以当前步长前进一步
    #[inline]
    pub fn step(&mut self) {
        self.advance(self.delta_t);
    }

    /// `1 / Δt`
    #[inline]
    pub fn r_delta_t(&self) -> f64 {
        1.0 / self.delta_t
    }
}

impl Default for TimeState {
    fn default() -> Self {
        Self::steady()
    }
}
