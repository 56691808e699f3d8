// Prevent console window in addition to Slint window in Windows release builds when, e.g., starting the app via file manager. Ignored on other platforms.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::error::Error;

mod config;
mod models;
mod shortcuts;
mod simulator;
mod ticker;
mod ui_handlers;
mod view;

slint::include_modules!();

fn main() -> Result<(), Box<dyn Error>> {
    config::init_config();
    log::info!("init_config");

    // 进度定时器使用 tokio 时间驱动，需要在 UI 线程进入 runtime 上下文
    let _runtime_guard = config::get_runtime().enter();

    let ui = AppWindow::new()?;

    // 设置UI事件处理器
    let controller = ui_handlers::setup_ui_handlers(&ui, config::get_config());

    ui.run()?;

    // 窗口关闭后取消未完成的定时任务
    controller.shutdown();

    Ok(())
}
