use chrono::{DateTime, Local};
use serde::Serialize;

use crate::models::{METER_MODELS, model_position};
use crate::simulator::SessionState;

pub const MODEL_PLACEHOLDER: &str = "-- Select Models --";
pub const DETAIL_COMPLETE: &str = "✓ Complete";
pub const DETAIL_PROCESSING: &str = "Processing...";

/// 窗口显示内容，完全由 SessionState 推导
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    /// 下拉框索引，0 为占位项
    pub selected_index: i32,
    pub status_text: String,
    pub show_progress: bool,
    pub segments: Vec<bool>,
    pub percentage_text: String,
    pub detail_text: String,
    pub start_enabled: bool,
    pub refresh_enabled: bool,
    pub selector_enabled: bool,
}

impl ProgressView {
    pub fn render(state: &SessionState, segment_count: usize) -> Self {
        let selected_index = model_position(&state.selected_model)
            .map(|pos| pos as i32 + 1)
            .unwrap_or(0);

        Self {
            selected_index,
            status_text: state.status_text.clone(),
            show_progress: state.progress > 0.0,
            segments: filled_segments(state.progress, segment_count),
            percentage_text: format!("{}%", state.progress.round() as u32),
            detail_text: if state.progress >= 100.0 {
                DETAIL_COMPLETE.to_string()
            } else {
                DETAIL_PROCESSING.to_string()
            },
            start_enabled: !state.is_running && !state.selected_model.is_empty(),
            refresh_enabled: state.refresh_enabled,
            selector_enabled: !state.is_running,
        }
    }
}

/// 第 i 段在累计进度达到 (i + 1) * 100 / count 时填充
pub fn filled_segments(progress: f64, count: usize) -> Vec<bool> {
    (0..count)
        .map(|index| ((index + 1) as f64) * 100.0 / count as f64 <= progress)
        .collect()
}

/// 下拉框条目：占位项 + 型号列表
pub fn dropdown_entries() -> Vec<String> {
    std::iter::once(MODEL_PLACEHOLDER)
        .chain(METER_MODELS.iter().copied())
        .map(str::to_string)
        .collect()
}

/// 占位项对应空型号
pub fn model_for_entry(entry: &str) -> &str {
    if entry == MODEL_PLACEHOLDER { "" } else { entry }
}

// 调试面板中展示的状态快照
#[derive(Debug, Serialize)]
pub struct InspectorSnapshot<'a> {
    pub phase: &'a str,
    pub state: &'a SessionState,
    pub started_at: Option<DateTime<Local>>,
    pub elapsed_ms: Option<u64>,
    pub duration_ms: u64,
}

impl InspectorSnapshot<'_> {
    pub fn to_text(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("序列化状态失败: {}", e))
    }
}
