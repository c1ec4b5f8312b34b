//! 热键句柄表
//!
//! 独占持有每个已注册热键的系统资源（[`OsHandle`]），以调用方标识符为键。
//!
//! 句柄表本身不加锁，由上层（[`HotkeyBridge`](crate::bridge::HotkeyBridge)）
//! 放在同一把锁里与处理器槽位一起维护。注销分为两步：
//!
//! 1. [`HandleTable::detach`]：从表中移除条目（在锁内完成，之后的分发看不到它）
//! 2. [`HandleTable::release`]：释放系统资源（可以在锁外完成）
//!
//! [`HandleTable::unregister`] 把两步合在一起，供独立使用句柄表的场景。

use std::collections::HashMap;
use std::sync::Arc;

use super::backend::{HotkeyBackend, OsHandle};
use super::error::{HotkeyError, HotkeyResult};
use super::keys::KeySpec;
use super::HotkeyId;

/// 一次有效注册的令牌
///
/// 由标识符和唯一序号组成。标识符注销后可以复用，但序号不会重复，
/// 旧令牌因此不会误释放新的注册。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyHandle {
    id: HotkeyId,
    serial: u64,
}

impl HotkeyHandle {
    /// 注册时使用的标识符
    pub fn id(&self) -> HotkeyId {
        self.id
    }
}

#[derive(Debug)]
struct TableEntry {
    os: OsHandle,
    spec: KeySpec,
    serial: u64,
}

/// 从表中摘下、尚未释放的系统资源
#[derive(Debug)]
#[must_use = "detached hotkeys keep their OS resource until released"]
pub struct Detached {
    id: HotkeyId,
    os: OsHandle,
}

impl Detached {
    /// 标识符
    pub fn id(&self) -> HotkeyId {
        self.id
    }
}

/// 热键句柄表
pub struct HandleTable {
    backend: Arc<dyn HotkeyBackend>,
    entries: HashMap<HotkeyId, TableEntry>,
    next_serial: u64,
}

impl HandleTable {
    /// 创建使用指定后端的句柄表
    pub fn new(backend: Arc<dyn HotkeyBackend>) -> Self {
        Self {
            backend,
            entries: HashMap::new(),
            next_serial: 1,
        }
    }

    /// 后端
    pub fn backend(&self) -> &Arc<dyn HotkeyBackend> {
        &self.backend
    }

    /// 注册全局热键
    ///
    /// 成功后系统可能随时为该标识符投递事件，直到注销
    ///
    /// # Errors
    ///
    /// - 标识符已被占用：[`HotkeyError::DuplicateIdentifier`]，原注册保持不变
    /// - 系统拒绝：[`HotkeyError::Registration`]，表中不留任何状态
    pub fn register(&mut self, id: HotkeyId, spec: KeySpec) -> HotkeyResult<HotkeyHandle> {
        if self.entries.contains_key(&id) {
            return Err(HotkeyError::DuplicateIdentifier(id));
        }

        let os = self.backend.register(id, &spec)?;
        let serial = self.next_serial;
        self.next_serial += 1;

        self.entries.insert(id, TableEntry { os, spec, serial });
        tracing::info!(id, key = %spec, backend = self.backend.name(), "Hotkey registered");

        Ok(HotkeyHandle { id, serial })
    }

    /// 从表中移除条目，返回待释放的系统资源
    ///
    /// # Errors
    ///
    /// 令牌已失效（已注销或被同标识符的新注册取代）时返回
    /// [`HotkeyError::DoubleRelease`]
    pub fn detach(&mut self, handle: HotkeyHandle) -> HotkeyResult<Detached> {
        match self.entries.get(&handle.id) {
            Some(entry) if entry.serial == handle.serial => {}
            _ => return Err(HotkeyError::DoubleRelease(handle.id)),
        }

        let entry = self
            .entries
            .remove(&handle.id)
            .ok_or(HotkeyError::DoubleRelease(handle.id))?;

        Ok(Detached {
            id: handle.id,
            os: entry.os,
        })
    }

    /// 释放已摘下的系统资源
    ///
    /// 不需要访问句柄表，调用方可以在释放共享锁之后调用
    pub fn release(backend: &dyn HotkeyBackend, detached: Detached) -> HotkeyResult<()> {
        backend.unregister(detached.id, &detached.os)?;
        tracing::info!(id = detached.id, backend = backend.name(), "Hotkey unregistered");
        Ok(())
    }

    /// 注销热键：移除条目并释放系统资源
    ///
    /// 系统释放失败时条目仍然被移除，错误返回给调用方
    pub fn unregister(&mut self, handle: HotkeyHandle) -> HotkeyResult<()> {
        let detached = self.detach(handle)?;
        Self::release(&*self.backend, detached)
    }

    /// 标识符当前的有效令牌
    pub fn handle(&self, id: HotkeyId) -> Option<HotkeyHandle> {
        self.entries
            .get(&id)
            .map(|entry| HotkeyHandle { id, serial: entry.serial })
    }

    /// 令牌是否仍然有效
    pub fn is_live(&self, handle: HotkeyHandle) -> bool {
        self.entries
            .get(&handle.id)
            .is_some_and(|entry| entry.serial == handle.serial)
    }

    /// 标识符是否已注册
    pub fn contains(&self, id: HotkeyId) -> bool {
        self.entries.contains_key(&id)
    }

    /// 已注册的热键数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 标识符对应的按键规格
    pub fn key_spec(&self, id: HotkeyId) -> Option<KeySpec> {
        self.entries.get(&id).map(|entry| entry.spec)
    }

    /// 所有已注册的标识符（升序）
    pub fn ids(&self) -> Vec<HotkeyId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// 摘下全部条目
    pub fn detach_all(&mut self) -> Vec<Detached> {
        self.entries
            .drain()
            .map(|(id, entry)| Detached { id, os: entry.os })
            .collect()
    }
}
