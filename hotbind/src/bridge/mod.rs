//! 回调注册桥
//!
//! 把路由器上唯一的原生回调翻译为按标识符调用的处理器。
//!
//! # 架构
//!
//! ```text
//! OS 线程 ──▶ DispatchRouter::dispatch ──▶ HotkeyBridge::dispatch
//!                                              │  读锁：查找槽位，复制 Arc
//!                                              │  释放锁
//!                                              ▼
//!                                   HandlerStore::invoke(slot, is_down)
//! ```
//!
//! 句柄表和槽位表放在同一把 `RwLock` 里。注销在写锁内同时摘下句柄和槽位，
//! 然后在锁外释放系统资源和槽位；分发要么看到完整条目，要么什么都看不到。
//! 处理器在锁外执行，因此可以在处理器中注册或注销热键。
//!
//! # 模块结构
//!
//! - `native` - Rust 闭包处理器
//! - `lua` - Lua 注册表槽位处理器

mod lua;
mod native;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::hotkey::{
    DispatchRouter, HandleTable, HotkeyBackend, HotkeyError, HotkeyEvent, HotkeyHandle,
    HotkeyId, HotkeyResult, KeySpec,
};
use crate::state::{HotkeyPhase, DEFAULT_STRICT};

pub use lua::{LuaHandlers, LuaSlot};
pub use native::{NativeHandler, NativeHandlers, NativeSlot};

/// 事件监听器队列容量
const LISTENER_CAPACITY: usize = 64;

/// 处理器存储
///
/// 负责把处理器值保存到槽位中、通过槽位调用处理器，以及释放槽位
pub trait HandlerStore: Send + Sync + 'static {
    /// 调用方提供的处理器值
    type Handler;
    /// 保存处理器的槽位
    type Slot: Send + Sync + 'static;
    /// 存储或调用失败时的错误
    type Error: fmt::Display;

    /// 为处理器分配新槽位
    fn store(&self, id: HotkeyId, handler: Self::Handler) -> Result<Self::Slot, Self::Error>;

    /// 以 `is_down` 调用槽位中的处理器
    fn invoke(&self, id: HotkeyId, slot: &Self::Slot, is_down: bool) -> Result<(), Self::Error>;

    /// 立即释放槽位
    ///
    /// 默认直接丢弃
    fn release(&self, slot: Self::Slot) {
        drop(slot);
    }

    /// 仍然存活的槽位数量（包括等待在途分发结束的槽位）
    fn live_slots(&self) -> usize;
}

/// 槽位计数器
#[derive(Debug, Clone, Default)]
pub struct SlotCounter {
    live: Arc<AtomicUsize>,
}

impl SlotCounter {
    /// 创建计数器
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一个新槽位，令牌析构时自动注销
    pub fn token(&self) -> SlotToken {
        self.live.fetch_add(1, Ordering::SeqCst);
        SlotToken {
            live: Arc::clone(&self.live),
        }
    }

    /// 当前存活的槽位数量
    pub fn count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// 槽位存活令牌
#[derive(Debug)]
pub struct SlotToken {
    live: Arc<AtomicUsize>,
}

impl Drop for SlotToken {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 桥配置
#[derive(Debug, Clone, Copy)]
pub struct BridgeOptions {
    /// 严格模式：编程错误（重复释放、配对破坏）直接 panic
    ///
    /// 默认在调试构建中开启，发布构建中只记录日志
    pub strict: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            strict: DEFAULT_STRICT,
        }
    }
}

/// 槽位及其释放标记
struct SlotCell<S> {
    slot: S,
    released: AtomicBool,
}

/// 受锁保护的共享映射
struct Registry<S> {
    table: HandleTable,
    slots: HashMap<HotkeyId, Arc<SlotCell<S>>>,
}

impl<S> Registry<S> {
    fn phase(&self, id: HotkeyId) -> HotkeyResult<HotkeyPhase> {
        Ok(HotkeyPhase::from_parts(
            id,
            self.table.contains(id),
            self.slots.contains_key(&id),
        )?)
    }
}

/// 回调注册桥
pub struct HotkeyBridge<H: HandlerStore> {
    registry: RwLock<Registry<H::Slot>>,
    backend: Arc<dyn HotkeyBackend>,
    router: Arc<DispatchRouter>,
    store: H,
    options: BridgeOptions,
    listeners: Mutex<Vec<mpsc::Sender<HotkeyEvent>>>,
}

impl<H: HandlerStore> HotkeyBridge<H> {
    /// 创建桥并安装为路由器的回调
    ///
    /// 回调只持有弱引用，桥被丢弃后事件会被当作未消费丢弃
    pub fn new(
        backend: Arc<dyn HotkeyBackend>,
        router: Arc<DispatchRouter>,
        store: H,
        options: BridgeOptions,
    ) -> Arc<Self> {
        let bridge = Arc::new(Self {
            registry: RwLock::new(Registry {
                table: HandleTable::new(Arc::clone(&backend)),
                slots: HashMap::new(),
            }),
            backend,
            router,
            store,
            options,
            listeners: Mutex::new(Vec::new()),
        });
        bridge.install();
        bridge
    }

    /// 把自身安装为路由器的回调（替换已有回调）
    pub fn install(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.router.set_callback(Arc::new(move |id, is_down| match weak.upgrade() {
            Some(bridge) => bridge.dispatch(id, is_down),
            None => false,
        }));
        tracing::debug!(backend = self.backend.name(), "Hotkey bridge installed");
    }

    /// 处理器存储
    pub fn store(&self) -> &H {
        &self.store
    }

    /// 路由器
    pub fn router(&self) -> &Arc<DispatchRouter> {
        &self.router
    }

    /// 后端
    pub fn backend(&self) -> &Arc<dyn HotkeyBackend> {
        &self.backend
    }

    /// 桥配置
    pub fn options(&self) -> BridgeOptions {
        self.options
    }

    /// 注册热键（不绑定处理器）
    ///
    /// # Errors
    ///
    /// - [`HotkeyError::DuplicateIdentifier`]：标识符已被占用，原注册不变
    /// - [`HotkeyError::Registration`]：系统拒绝
    pub fn register(&self, id: HotkeyId, spec: KeySpec) -> HotkeyResult<HotkeyHandle> {
        let mut registry = self.registry.write();

        let from = registry.phase(id).map_err(|e| self.report(e))?;
        if from.is_registered() {
            return Err(HotkeyError::DuplicateIdentifier(id));
        }
        HotkeyPhase::check_transition(id, from, HotkeyPhase::Registered)
            .map_err(|e| self.report(e.into()))?;

        registry.table.register(id, spec)
    }

    /// 为已注册的标识符绑定处理器
    ///
    /// # Errors
    ///
    /// - [`HotkeyError::UnknownIdentifier`]：标识符没有有效注册
    /// - [`HotkeyError::AlreadyBound`]：已经绑定了处理器
    /// - [`HotkeyError::SlotAllocation`]：存储处理器失败
    pub fn bind(&self, id: HotkeyId, handler: H::Handler) -> HotkeyResult<()> {
        // 槽位在锁外分配，处理器存储可能回调脚本运行时
        let slot = self
            .store
            .store(id, handler)
            .map_err(|e| HotkeyError::SlotAllocation {
                id,
                reason: e.to_string(),
            })?;

        let rejected = {
            let mut registry = self.registry.write();
            match registry.phase(id) {
                Ok(HotkeyPhase::Registered) => {
                    registry.slots.insert(
                        id,
                        Arc::new(SlotCell {
                            slot,
                            released: AtomicBool::new(false),
                        }),
                    );
                    None
                }
                Ok(HotkeyPhase::Bound) => Some((slot, HotkeyError::AlreadyBound(id))),
                Ok(HotkeyPhase::Unregistered) => Some((slot, HotkeyError::UnknownIdentifier(id))),
                Err(e) => Some((slot, self.report(e))),
            }
        };

        match rejected {
            None => {
                tracing::debug!(id, "Handler bound");
                Ok(())
            }
            Some((slot, err)) => {
                self.store.release(slot);
                Err(err)
            }
        }
    }

    /// 注册并绑定处理器
    ///
    /// 绑定失败时回滚注册
    pub fn register_and_bind(
        &self,
        id: HotkeyId,
        spec: KeySpec,
        handler: H::Handler,
    ) -> HotkeyResult<HotkeyHandle> {
        let handle = self.register(id, spec)?;
        if let Err(err) = self.bind(id, handler) {
            if let Err(rollback) = self.unregister_handle(handle) {
                tracing::warn!(id, error = %rollback, "Failed to roll back registration");
            }
            return Err(err);
        }
        Ok(handle)
    }

    /// 解绑处理器，热键保持注册（Bound → Registered）
    ///
    /// # Errors
    ///
    /// - [`HotkeyError::UnknownIdentifier`]：标识符没有有效注册
    /// - [`HotkeyError::DoubleRelease`]：没有可释放的槽位
    pub fn unbind(&self, id: HotkeyId) -> HotkeyResult<()> {
        let cell = {
            let mut registry = self.registry.write();
            let from = registry.phase(id).map_err(|e| self.report(e))?;
            match from {
                HotkeyPhase::Unregistered => return Err(HotkeyError::UnknownIdentifier(id)),
                HotkeyPhase::Registered => return Err(self.report(HotkeyError::DoubleRelease(id))),
                HotkeyPhase::Bound => {}
            }
            HotkeyPhase::check_transition(id, from, HotkeyPhase::Registered)
                .map_err(|e| self.report(e.into()))?;
            registry.slots.remove(&id)
        };

        if let Some(cell) = cell {
            self.release_slot(id, cell);
        }
        tracing::debug!(id, "Handler unbound");
        Ok(())
    }

    /// 注销标识符：同时释放系统资源和处理器槽位
    ///
    /// # Errors
    ///
    /// - [`HotkeyError::UnknownIdentifier`]：标识符没有有效注册
    /// - [`HotkeyError::Unregistration`]：系统释放失败（条目和槽位仍然被移除）
    pub fn unregister(&self, id: HotkeyId) -> HotkeyResult<()> {
        let handle = self
            .registry
            .read()
            .table
            .handle(id)
            .ok_or(HotkeyError::UnknownIdentifier(id))?;

        match self.unregister_handle(handle) {
            // 两次查找之间被其他线程注销
            Err(HotkeyError::DoubleRelease(_)) => Err(HotkeyError::UnknownIdentifier(id)),
            other => other,
        }
    }

    /// 按令牌注销
    ///
    /// 令牌已失效时返回 [`HotkeyError::DoubleRelease`]
    pub fn unregister_handle(&self, handle: HotkeyHandle) -> HotkeyResult<()> {
        let id = handle.id();

        let (detached, cell) = {
            let mut registry = self.registry.write();
            let from = registry.phase(id).map_err(|e| self.report(e))?;

            let detached = match registry.table.detach(handle) {
                Ok(detached) => detached,
                Err(e) => return Err(self.report(e)),
            };
            let cell = registry.slots.remove(&id);

            if let Err(e) = HotkeyPhase::check_transition(id, from, HotkeyPhase::Unregistered) {
                self.report(e.into());
            }
            (detached, cell)
        };

        let released = HandleTable::release(&*self.backend, detached);
        if let Some(cell) = cell {
            self.release_slot(id, cell);
        }

        if let Err(ref e) = released {
            tracing::warn!(id, error = %e, "OS resource release failed, entry removed anyway");
        }
        released
    }

    /// 分发入口（安装为路由器回调）
    ///
    /// 未知标识符或没有槽位时返回 `false`；处理器失败被记录并返回 `false`
    pub fn dispatch(&self, id: HotkeyId, is_down: bool) -> bool {
        let (registered, cell) = {
            let registry = self.registry.read();
            (registry.table.contains(id), registry.slots.get(&id).cloned())
        };

        if !registered {
            tracing::debug!(id, is_down, "Dispatch for unknown identifier ignored");
            return false;
        }

        self.notify_listeners(HotkeyEvent { id, is_down });

        let Some(cell) = cell else {
            tracing::trace!(id, is_down, "No handler bound");
            return false;
        };

        // 查找之后、调用之前被注销
        if cell.released.load(Ordering::SeqCst) {
            tracing::debug!(id, is_down, "Handler released while dispatch was in flight");
            return false;
        }

        match self.store.invoke(id, &cell.slot, is_down) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id, is_down, error = %e, "Hotkey handler failed");
                false
            }
        }
    }

    /// 标识符当前的阶段
    pub fn phase(&self, id: HotkeyId) -> HotkeyResult<HotkeyPhase> {
        self.registry.read().phase(id).map_err(|e| self.report(e))
    }

    /// 标识符是否已注册
    pub fn is_registered(&self, id: HotkeyId) -> bool {
        self.registry.read().table.contains(id)
    }

    /// 标识符是否已绑定处理器
    pub fn is_bound(&self, id: HotkeyId) -> bool {
        self.registry.read().slots.contains_key(&id)
    }

    /// 标识符当前的有效令牌
    pub fn handle(&self, id: HotkeyId) -> Option<HotkeyHandle> {
        self.registry.read().table.handle(id)
    }

    /// 标识符对应的按键规格
    pub fn key_spec(&self, id: HotkeyId) -> Option<KeySpec> {
        self.registry.read().table.key_spec(id)
    }

    /// 已注册的热键数量
    pub fn len(&self) -> usize {
        self.registry.read().table.len()
    }

    /// 是否没有任何注册
    pub fn is_empty(&self) -> bool {
        self.registry.read().table.is_empty()
    }

    /// 所有已注册的标识符（升序）
    pub fn ids(&self) -> Vec<HotkeyId> {
        self.registry.read().table.ids()
    }

    /// 已绑定的槽位数量
    pub fn bound_count(&self) -> usize {
        self.registry.read().slots.len()
    }

    /// 从 `base` 开始第一个未被占用的标识符
    pub fn next_free_id(&self, base: HotkeyId) -> Option<HotkeyId> {
        let registry = self.registry.read();
        (base..=HotkeyId::MAX).find(|id| !registry.table.contains(*id))
    }

    /// 订阅热键事件
    ///
    /// 每次分发到有效注册的事件都会广播给所有订阅者
    pub fn subscribe(&self) -> mpsc::Receiver<HotkeyEvent> {
        let (tx, rx) = mpsc::channel(LISTENER_CAPACITY);
        self.listeners.lock().push(tx);
        rx
    }

    /// 移除所有已关闭的监听器
    pub fn cleanup_listeners(&self) {
        self.listeners.lock().retain(|tx| !tx.is_closed());
    }

    /// 获取当前监听器数量
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// 注销全部热键，返回注销的数量
    pub fn shutdown(&self) -> usize {
        let (detached, cells) = {
            let mut registry = self.registry.write();
            let detached = registry.table.detach_all();
            let cells: Vec<_> = registry.slots.drain().collect();
            (detached, cells)
        };

        let count = detached.len();
        for item in detached {
            let id = item.id();
            if let Err(e) = HandleTable::release(&*self.backend, item) {
                tracing::warn!(id, error = %e, "Failed to release hotkey during shutdown");
            }
        }
        for (id, cell) in cells {
            self.release_slot(id, cell);
        }

        if count > 0 {
            tracing::info!(count, "All hotkeys unregistered");
        }
        count
    }

    /// 释放槽位
    ///
    /// 有在途分发持有槽位时只打上释放标记，最后一个持有者析构时释放
    fn release_slot(&self, id: HotkeyId, cell: Arc<SlotCell<H::Slot>>) {
        cell.released.store(true, Ordering::SeqCst);
        match Arc::try_unwrap(cell) {
            Ok(cell) => self.store.release(cell.slot),
            Err(_) => tracing::debug!(id, "Slot release deferred until in-flight dispatch ends"),
        }
    }

    /// 广播事件，顺便清理已关闭的监听器
    fn notify_listeners(&self, event: HotkeyEvent) {
        let mut listeners = self.listeners.lock();
        listeners.retain(|tx| match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(id = event.id, "Hotkey listener queue full, event dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// 记录编程错误，严格模式下直接 panic
    fn report(&self, err: HotkeyError) -> HotkeyError {
        if err.is_programming_error() {
            tracing::error!(error = %err, "Hotkey programming error");
            if self.options.strict {
                panic!("hotkey programming error: {}", err);
            }
        }
        err
    }
}

impl<H: HandlerStore> Drop for HotkeyBridge<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::SimulatedBackend;

    fn bridge(strict: bool) -> (Arc<HotkeyBridge<NativeHandlers>>, Arc<SimulatedBackend>) {
        let router = Arc::new(DispatchRouter::new());
        let backend = Arc::new(SimulatedBackend::new(Arc::clone(&router)));
        let bridge = HotkeyBridge::new(
            backend.clone(),
            router,
            NativeHandlers::new(),
            BridgeOptions { strict },
        );
        (bridge, backend)
    }

    fn spec(s: &str) -> KeySpec {
        s.parse().unwrap()
    }

    #[test]
    fn test_phases_follow_lifecycle() {
        let (bridge, _backend) = bridge(false);
        assert_eq!(bridge.phase(1).unwrap(), HotkeyPhase::Unregistered);

        bridge.register(1, spec("cmd+a")).unwrap();
        assert_eq!(bridge.phase(1).unwrap(), HotkeyPhase::Registered);

        bridge.bind(1, NativeHandlers::handler(|_| {})).unwrap();
        assert_eq!(bridge.phase(1).unwrap(), HotkeyPhase::Bound);

        bridge.unbind(1).unwrap();
        assert_eq!(bridge.phase(1).unwrap(), HotkeyPhase::Registered);

        bridge.unregister(1).unwrap();
        assert_eq!(bridge.phase(1).unwrap(), HotkeyPhase::Unregistered);
    }

    #[test]
    fn test_unbind_without_slot_is_double_release() {
        let (bridge, _backend) = bridge(false);
        bridge.register(1, spec("f1")).unwrap();
        assert_eq!(bridge.unbind(1), Err(HotkeyError::DoubleRelease(1)));
        assert_eq!(bridge.unbind(2), Err(HotkeyError::UnknownIdentifier(2)));
    }

    #[test]
    #[should_panic(expected = "hotkey programming error")]
    fn test_strict_mode_panics_on_double_release() {
        let (bridge, _backend) = bridge(true);
        let handle = bridge.register(1, spec("f1")).unwrap();
        bridge.unregister_handle(handle).unwrap();
        let _ = bridge.unregister_handle(handle);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "hotkey programming error")]
    fn test_default_options_panic_on_double_release_in_debug() {
        let router = Arc::new(DispatchRouter::new());
        let backend = Arc::new(SimulatedBackend::new(Arc::clone(&router)));
        let bridge = HotkeyBridge::new(backend, router, NativeHandlers::new(), BridgeOptions::default());

        bridge.register(1, spec("f1")).unwrap();
        let _ = bridge.unbind(1);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_default_options_log_double_release_in_release() {
        let router = Arc::new(DispatchRouter::new());
        let backend = Arc::new(SimulatedBackend::new(Arc::clone(&router)));
        let bridge = HotkeyBridge::new(backend, router, NativeHandlers::new(), BridgeOptions::default());

        bridge.register(1, spec("f1")).unwrap();
        assert_eq!(bridge.unbind(1), Err(HotkeyError::DoubleRelease(1)));
    }

    #[test]
    fn test_bind_rejections_release_slot() {
        let (bridge, _backend) = bridge(false);
        assert_eq!(
            bridge.bind(1, NativeHandlers::handler(|_| {})),
            Err(HotkeyError::UnknownIdentifier(1))
        );
        assert_eq!(bridge.store().live_slots(), 0);

        bridge.register(1, spec("f1")).unwrap();
        bridge.bind(1, NativeHandlers::handler(|_| {})).unwrap();
        assert_eq!(
            bridge.bind(1, NativeHandlers::handler(|_| {})),
            Err(HotkeyError::AlreadyBound(1))
        );
        assert_eq!(bridge.store().live_slots(), 1);
    }

    #[test]
    fn test_register_and_bind_rolls_back() {
        let (bridge, backend) = bridge(false);
        bridge.register(1, spec("f1")).unwrap();

        let err = bridge
            .register_and_bind(2, spec("f1"), NativeHandlers::handler(|_| {}))
            .unwrap_err();
        assert!(matches!(err, HotkeyError::Registration { .. }));
        assert!(!bridge.is_registered(2));
        assert_eq!(backend.live_count(), 1);
    }

    #[test]
    fn test_next_free_id_skips_live() {
        let (bridge, _backend) = bridge(false);
        bridge.register(1000, spec("f1")).unwrap();
        bridge.register(1001, spec("f2")).unwrap();
        assert_eq!(bridge.next_free_id(1000), Some(1002));
        assert_eq!(bridge.next_free_id(5), Some(5));
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let (bridge, backend) = bridge(false);
        bridge.register(1, spec("f1")).unwrap();
        bridge
            .register_and_bind(2, spec("f2"), NativeHandlers::handler(|_| {}))
            .unwrap();

        assert_eq!(bridge.shutdown(), 2);
        assert!(bridge.is_empty());
        assert_eq!(bridge.bound_count(), 0);
        assert_eq!(bridge.store().live_slots(), 0);
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn test_dropped_bridge_stops_consuming() {
        let (bridge, backend) = bridge(false);
        bridge
            .register_and_bind(1, spec("f1"), NativeHandlers::handler(|_| {}))
            .unwrap();
        assert!(backend.fire(1, true));

        drop(bridge);
        assert_eq!(backend.live_count(), 0);
        assert!(!backend.fire_in_flight(1, true));
    }
}
