//! 部署就绪门
//!
//! 记录已完成首次扫描的部署源数量，全部完成之前查找操作阻塞等待。
//! 等待按固定间隔复查，因此取消和关闭不会被长时间的等待掩盖。

use parking_lot::{Condvar, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct GateState {
    completed: usize,
    total: usize,
    closed: bool,
}

impl GateState {
    fn is_ready(&self) -> bool {
        self.completed >= self.total
    }
}

/// 就绪门
#[derive(Debug)]
pub struct ReadinessGate {
    state: Mutex<GateState>,
    ready: Condvar,
    check_interval: Duration,
}

impl ReadinessGate {
    /// 创建就绪门，未设置部署源数量时视为就绪
    pub fn new(check_interval: Duration) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            ready: Condvar::new(),
            check_interval,
        }
    }

    /// 设置需要等待的部署源数量并重置计数
    pub fn arm(&self, total: usize) {
        let mut state = self.state.lock();
        state.completed = 0;
        state.total = total;
        state.closed = false;
        debug!("就绪门已设置: 部署源数量={}", total);

        if state.is_ready() {
            self.ready.notify_all();
        }
    }

    /// 一个部署源完成首次扫描
    pub fn complete_one(&self) {
        let mut state = self.state.lock();
        state.completed += 1;
        debug!("部署源首次扫描完成: {}/{}", state.completed, state.total);

        if state.completed == state.total {
            info!("全部部署源首次扫描完成: {}", state.total);
        }
        if state.is_ready() {
            self.ready.notify_all();
        }
    }

    /// 关闭就绪门，正在等待的查找以取消结束
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.ready.notify_all();
    }

    /// 唤醒所有等待者，使其立即复查取消状态
    pub fn interrupt(&self) {
        let _state = self.state.lock();
        self.ready.notify_all();
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().is_ready()
    }

    /// (已完成, 总数)
    pub fn progress(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.completed, state.total)
    }

    /// 等待就绪
    ///
    /// 就绪时返回 `true`；等待期间被取消或就绪门被关闭时返回 `false`。
    pub fn wait(&self, cancel: Option<&CancellationToken>) -> bool {
        let mut state = self.state.lock();

        loop {
            if state.is_ready() {
                return true;
            }
            if state.closed || cancel.is_some_and(CancellationToken::is_cancelled) {
                return false;
            }

            debug!("等待部署源首次扫描完成: {}/{}", state.completed, state.total);
            self.ready.wait_for(&mut state, self.check_interval);
        }
    }
}
