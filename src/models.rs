/// 下拉框中可选的电表型号，顺序即显示顺序
pub const METER_MODELS: [&str; 10] = [
    "C8130/35",
    "C-8145/55",
    "C8170",
    "B-8145/55",
    "B-8170",
    "C-8230/35",
    "C-45/55",
    "C-8270",
    "B-8245/55",
    "B-8270",
];

pub fn is_known_model(model: &str) -> bool {
    METER_MODELS.contains(&model)
}

/// 型号在列表中的位置
pub fn model_position(model: &str) -> Option<usize> {
    METER_MODELS.iter().position(|m| *m == model)
}
