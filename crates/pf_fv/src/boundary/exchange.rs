// crates/pf_fv/src/boundary/exchange.rs

//! 面片数据交换服务
//!
//! 耦合面片需要对侧的单元值。离散层只定义请求接口：先为本面片投递发送
//! 缓冲，再接收配对面片的缓冲。所有参与方必须对同一个场在同一步发出
//! 配对的交换调用，调用次数不匹配属于协议违例，是致命错误。
//!
//! 缓冲按面展平为 `f64` 分量。

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use pf_mesh::{PatchType, PolyMesh};

use crate::error::{FvError, FvResult};

/// 数据交换服务
pub trait PatchExchange: Send + Sync {
    /// 投递面片 `patch` 上场 `field` 的发送缓冲
    fn send(&self, field: &str, patch: &str, buffer: Vec<f64>) -> FvResult<()>;

    /// 接收配对面片发给 `patch` 的缓冲
    fn receive(&self, field: &str, patch: &str) -> FvResult<Vec<f64>>;
}

/// 不提供交换的服务，任何耦合请求都是协议违例
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExchange;

impl PatchExchange for NoExchange {
    fn send(&self, field: &str, patch: &str, _buffer: Vec<f64>) -> FvResult<()> {
        Err(FvError::ExchangeProtocol(format!(
            "没有交换服务，场 {} 的耦合面片 {} 无法发送",
            field, patch
        )))
    }

    fn receive(&self, field: &str, patch: &str) -> FvResult<Vec<f64>> {
        Err(FvError::ExchangeProtocol(format!(
            "没有交换服务，场 {} 的耦合面片 {} 无法接收",
            field, patch
        )))
    }
}

/// 一次交换的调用计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeCounts {
    /// 发送次数
    pub sends: usize,
    /// 接收次数
    pub receives: usize,
}

/// 进程内交换服务
///
/// 将同一网格上的面片两两配对。面映射可选：配对面片的第 `i` 个面对应
/// 本面片的第 `map[i]` 个面；缺省时按面序一一对应。
#[derive(Debug, Default)]
pub struct LocalExchange {
    partners: HashMap<String, String>,
    face_maps: HashMap<String, Vec<usize>>,
    posted: Mutex<HashMap<(String, String), Vec<f64>>>,
    ledger: Mutex<BTreeMap<(String, String), ExchangeCounts>>,
}

impl LocalExchange {
    /// 空服务
    pub fn new() -> Self {
        Self::default()
    }

    /// 按网格中的耦合面片类型配对
    pub fn from_mesh(mesh: &PolyMesh) -> Self {
        let mut exchange = Self::new();
        for patch in mesh.boundary() {
            if let PatchType::Coupled { neighbour_patch } = patch.patch_type() {
                exchange
                    .partners
                    .insert(patch.name().to_string(), neighbour_patch.clone());
            }
        }
        exchange
    }

    /// 配对两个面片
    pub fn pair(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        self.partners.insert(a.clone(), b.clone());
        self.partners.insert(b, a);
        self
    }

    /// 为接收面片设置面映射
    pub fn with_face_map(mut self, patch: impl Into<String>, map: Vec<usize>) -> Self {
        self.face_maps.insert(patch.into(), map);
        self
    }

    /// 配对面片名
    pub fn partner(&self, patch: &str) -> Option<&str> {
        self.partners.get(patch).map(String::as_str)
    }

    /// 某个场与面片的调用计数
    pub fn counts(&self, field: &str, patch: &str) -> ExchangeCounts {
        self.ledger
            .lock()
            .get(&(field.to_string(), patch.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// 检查调用是否平衡
    ///
    /// 每个发送都必须被配对面片恰好接收一次，且没有遗留缓冲。
    pub fn verify_balanced(&self) -> FvResult<()> {
        let posted = self.posted.lock();
        if let Some((field, patch)) = posted.keys().next() {
            return Err(FvError::ExchangeProtocol(format!(
                "场 {} 面片 {} 的发送缓冲未被接收",
                field, patch
            )));
        }
        drop(posted);

        let ledger = self.ledger.lock();
        for ((field, patch), counts) in ledger.iter() {
            let partner_receives = self
                .partners
                .get(patch)
                .and_then(|p| ledger.get(&(field.clone(), p.clone())))
                .map_or(0, |c| c.receives);
            if counts.sends != partner_receives {
                return Err(FvError::ExchangeProtocol(format!(
                    "场 {} 面片 {} 发送 {} 次，配对面片接收 {} 次",
                    field, patch, counts.sends, partner_receives
                )));
            }
        }
        Ok(())
    }

    /// 清空账本
    pub fn reset(&self) {
        self.posted.lock().clear();
        self.ledger.lock().clear();
    }
}

impl PatchExchange for LocalExchange {
    fn send(&self, field: &str, patch: &str, buffer: Vec<f64>) -> FvResult<()> {
        if !self.partners.contains_key(patch) {
            return Err(FvError::ExchangeProtocol(format!(
                "面片 {} 没有配对面片",
                patch
            )));
        }
        let key = (field.to_string(), patch.to_string());
        let mut posted = self.posted.lock();
        if posted.contains_key(&key) {
            return Err(FvError::ExchangeProtocol(format!(
                "场 {} 面片 {} 在上一次发送被接收前重复发送",
                field, patch
            )));
        }
        posted.insert(key.clone(), buffer);
        drop(posted);

        self.ledger.lock().entry(key).or_default().sends += 1;
        Ok(())
    }

    fn receive(&self, field: &str, patch: &str) -> FvResult<Vec<f64>> {
        let partner = self.partner(patch).ok_or_else(|| {
            FvError::ExchangeProtocol(format!("面片 {} 没有配对面片", patch))
        })?;
        let buffer = self
            .posted
            .lock()
            .remove(&(field.to_string(), partner.to_string()))
            .ok_or_else(|| {
                FvError::ExchangeProtocol(format!(
                    "场 {} 面片 {} 接收时配对面片 {} 尚未发送",
                    field, patch, partner
                ))
            })?;

        self.ledger
            .lock()
            .entry((field.to_string(), patch.to_string()))
            .or_default()
            .receives += 1;

        match self.face_maps.get(patch) {
            Some(map) => reorder(&buffer, map),
            None => Ok(buffer),
        }
    }
}

/// 按面映射重排缓冲，每个面的分量数由长度推断
///
/// 映射必须是 `0..n` 的一个排列：越界或重复的索引都是协议违例。
fn reorder(buffer: &[f64], map: &[usize]) -> FvResult<Vec<f64>> {
    if map.is_empty() || buffer.len() % map.len() != 0 {
        return Err(FvError::ExchangeProtocol(format!(
            "缓冲长度 {} 与面映射长度 {} 不匹配",
            buffer.len(),
            map.len()
        )));
    }
    let stride = buffer.len() / map.len();
    let mut out = vec![0.0; buffer.len()];
    let mut filled = vec![false; map.len()];
    for (remote, &local) in map.iter().enumerate() {
        if local >= map.len() {
            return Err(FvError::ExchangeProtocol(format!(
                "面映射索引 {} 越界",
                local
            )));
        }
        if std::mem::replace(&mut filled[local], true) {
            return Err(FvError::ExchangeProtocol(format!(
                "面映射索引 {} 重复，映射不是排列",
                local
            )));
        }
        out[local * stride..(local + 1) * stride]
            .copy_from_slice(&buffer[remote * stride..(remote + 1) * stride]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_exchange() {
        let ex = LocalExchange::new().pair("left", "right");
        ex.send("T", "left", vec![1.0, 2.0]).unwrap();
        ex.send("T", "right", vec![3.0, 4.0]).unwrap();
        assert_eq!(ex.receive("T", "right").unwrap(), vec![1.0, 2.0]);
        assert_eq!(ex.receive("T", "left").unwrap(), vec![3.0, 4.0]);
        ex.verify_balanced().unwrap();
    }

    #[test]
    fn test_receive_without_send_is_protocol_error() {
        let ex = LocalExchange::new().pair("left", "right");
        assert!(matches!(
            ex.receive("T", "left"),
            Err(FvError::ExchangeProtocol(_))
        ));
    }

    #[test]
    fn test_unconsumed_send_is_unbalanced() {
        let ex = LocalExchange::new().pair("left", "right");
        ex.send("T", "left", vec![1.0]).unwrap();
        assert!(ex.verify_balanced().is_err());
        assert!(ex.send("T", "left", vec![1.0]).is_err());
    }

    #[test]
    fn test_face_map_reorders_per_face() {
        let ex = LocalExchange::new()
            .pair("a", "b")
            .with_face_map("b", vec![1, 0]);
        ex.send("U", "a", vec![1.0, 1.5, 2.0, 2.5]).unwrap();
        assert_eq!(ex.receive("U", "b").unwrap(), vec![2.0, 2.5, 1.0, 1.5]);
    }

    #[test]
    fn test_face_map_must_be_permutation() {
        let ex = LocalExchange::new()
            .pair("a", "b")
            .with_face_map("b", vec![0, 0, 2]);
        ex.send("T", "a", vec![1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(ex.receive("T", "b"), Err(FvError::ExchangeProtocol(_))));

        assert!(reorder(&[1.0, 2.0], &[0, 2]).is_err());
        assert_eq!(reorder(&[1.0, 2.0, 3.0], &[2, 0, 1]).unwrap(), vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_no_exchange_rejects() {
        assert!(NoExchange.send("T", "p", vec![]).is_err());
        assert!(NoExchange.receive("T", "p").is_err());
    }
}
