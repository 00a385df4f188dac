// crates/pf_fv/src/context.rs

//! 离散上下文
//!
//! 把网格、时间、格式配置与交换服务打包，`fvm`/`fvc` 算子只接收这一个参数。

use pf_mesh::PolyMesh;

use crate::boundary::{BoundaryContext, PatchExchange};
use crate::schemes::FvSchemes;
use crate::time::TimeState;

/// 离散上下文
#[derive(Clone, Copy)]
pub struct FvContext<'a> {
    /// 网格
    pub mesh: &'a PolyMesh,
    /// 时间
    pub time: &'a TimeState,
    /// 离散格式
    pub schemes: &'a FvSchemes,
    exchange: Option<&'a dyn PatchExchange>,
}

impl<'a> FvContext<'a> {
    /// 无交换服务的上下文
    pub fn new(mesh: &'a PolyMesh, time: &'a TimeState, schemes: &'a FvSchemes) -> Self {
        Self {
            mesh,
            time,
            schemes,
            exchange: None,
        }
    }

    /// 设置交换服务
    pub fn with_exchange(mut self, exchange: &'a dyn PatchExchange) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// 边界更新上下文
    pub fn boundary(&self) -> BoundaryContext<'a> {
        let ctx = BoundaryContext::new(self.mesh, self.time);
        match self.exchange {
            Some(exchange) => ctx.with_exchange(exchange),
            None => ctx,
        }
    }
}
