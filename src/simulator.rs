use serde::Serialize;
use thiserror::Error;
use tokio::time::{Duration, Instant};

use crate::models::is_known_model;

pub const STATUS_PROGRAMMING: &str = "Programming...";
pub const STATUS_COMPLETED: &str = "Completed";

// 模拟器拒绝的操作，状态保持不变
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulatorError {
    #[error("未选择型号")]
    NoModelSelected,

    #[error("编程正在进行中")]
    AlreadyRunning,

    #[error("未知型号: {0}")]
    UnknownModel(String),
}

/// 状态机所处阶段
///
/// ```text
/// Idle ──start──► Running ──tick(elapsed >= duration)──► Completed
///  ▲                 │                                      │
///  └────refresh──────┴───────────────refresh────────────────┘
/// Completed ──start──► Running
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Running {
        started_at: Instant,
    },
    Completed,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running { .. } => "Running",
            Self::Completed => "Completed",
        }
    }
}

/// 界面展示所需的会话状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub selected_model: String,
    pub is_running: bool,
    pub progress: f64,
    pub status_text: String,
    pub refresh_enabled: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            selected_model: String::new(),
            is_running: false,
            progress: 0.0,
            status_text: String::new(),
            refresh_enabled: false,
        }
    }
}

// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 仍在运行，changed 表示进度是否有变化
    Progressed { changed: bool },
    /// 本次 tick 完成了编程
    Completed,
    /// 当前不在运行中，tick 被忽略
    NotRunning,
}

pub struct ProgressSimulator {
    state: SessionState,
    phase: Phase,
    duration: Duration,
}

impl ProgressSimulator {
    pub fn new(duration: Duration) -> Self {
        Self {
            state: SessionState::default(),
            phase: Phase::Idle,
            duration,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    /// 自开始以来经过的时间，未运行时为 None
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        match self.phase {
            Phase::Running { started_at } => Some(now.saturating_duration_since(started_at)),
            _ => None,
        }
    }

    /// 下拉框选择型号，空字符串表示清除选择
    pub fn select_model(&mut self, model: &str) -> Result<(), SimulatorError> {
        if self.is_running() {
            return Err(SimulatorError::AlreadyRunning);
        }
        if !model.is_empty() && !is_known_model(model) {
            return Err(SimulatorError::UnknownModel(model.to_string()));
        }
        self.state.selected_model = model.to_string();
        Ok(())
    }

    pub fn start(&mut self, model: &str, now: Instant) -> Result<(), SimulatorError> {
        if model.is_empty() {
            return Err(SimulatorError::NoModelSelected);
        }
        if self.is_running() {
            return Err(SimulatorError::AlreadyRunning);
        }
        if !is_known_model(model) {
            return Err(SimulatorError::UnknownModel(model.to_string()));
        }

        self.state = SessionState {
            selected_model: model.to_string(),
            is_running: true,
            progress: 0.0,
            status_text: STATUS_PROGRAMMING.to_string(),
            refresh_enabled: false,
        };
        self.phase = Phase::Running { started_at: now };
        Ok(())
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let Some(elapsed) = self.elapsed(now) else {
            return TickOutcome::NotRunning;
        };

        let ratio = if self.duration.is_zero() {
            1.0
        } else {
            elapsed.as_secs_f64() / self.duration.as_secs_f64()
        };
        let progress = (ratio * 100.0).min(100.0);

        // progress == 100 只能出现在 Completed 阶段
        if elapsed >= self.duration || progress >= 100.0 {
            self.complete();
            return TickOutcome::Completed;
        }

        let previous = self.state.progress;
        // 进度单调不减
        self.state.progress = progress.max(previous);
        TickOutcome::Progressed {
            changed: self.state.progress != previous,
        }
    }

    /// 任意阶段都可重置，运行中即视为取消
    pub fn refresh(&mut self) {
        self.state = SessionState::default();
        self.phase = Phase::Idle;
    }

    fn complete(&mut self) {
        self.state.progress = 100.0;
        self.state.status_text = STATUS_COMPLETED.to_string();
        self.state.is_running = false;
        self.state.refresh_enabled = true;
        self.phase = Phase::Completed;
    }
}
