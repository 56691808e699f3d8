use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use anyhow::anyhow;
use chrono::{DateTime, Local};
use slint::{ComponentHandle, ModelRc, SharedString, VecModel, Weak};
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::shortcuts::{self, KeyChord, Platform, Shortcut};
use crate::simulator::{ProgressSimulator, TickOutcome};
use crate::ticker::{self, TickFlow, TickerHandle};
use crate::view::{self, InspectorSnapshot, ProgressView};
use crate::{AppState, AppWindow};

pub type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

/// 控制器与窗口之间的接口，所有调用都发生在 UI 线程
pub trait UiSurface {
    /// 定时任务的句柄，由控制器持有
    type Task;

    fn render(&self, view: &ProgressView, inspector: Option<&str>);
    fn spawn_local(&self, task: LocalTask) -> anyhow::Result<Self::Task>;
    fn quit(&self);
}

impl UiSurface for Weak<AppWindow> {
    type Task = slint::JoinHandle<()>;

    fn render(&self, view: &ProgressView, inspector: Option<&str>) {
        let Some(ui) = self.upgrade() else {
            return;
        };
        let state = ui.global::<AppState>();
        state.set_selected_index(view.selected_index);
        state.set_selector_enabled(view.selector_enabled);
        state.set_status_text(view.status_text.as_str().into());
        state.set_show_progress(view.show_progress);
        state.set_segments(ModelRc::new(VecModel::from(view.segments.clone())));
        state.set_percentage_text(view.percentage_text.as_str().into());
        state.set_detail_text(view.detail_text.as_str().into());
        state.set_start_enabled(view.start_enabled);
        state.set_refresh_enabled(view.refresh_enabled);
        state.set_show_inspector(inspector.is_some());
        if let Some(text) = inspector {
            state.set_inspector_text(text.into());
        }
    }

    fn spawn_local(&self, task: LocalTask) -> anyhow::Result<Self::Task> {
        slint::spawn_local(task).map_err(|e| anyhow!("启动定时任务失败: {}", e))
    }

    fn quit(&self) {
        if let Err(e) = slint::quit_event_loop() {
            log::error!("退出事件循环失败: {}", e);
        }
    }
}

struct RunningTicker<T> {
    handle: TickerHandle,
    _task: T,
}

/// 持有会话状态和定时任务，响应界面事件
pub struct SessionController<S: UiSurface> {
    surface: S,
    settings: AppConfig,
    simulator: RefCell<ProgressSimulator>,
    ticker: RefCell<Option<RunningTicker<S::Task>>>,
    started_wall: Cell<Option<DateTime<Local>>>,
    show_inspector: Cell<bool>,
}

impl<S: UiSurface + 'static> SessionController<S> {
    pub fn new(surface: S, settings: AppConfig) -> Rc<Self> {
        Rc::new(Self {
            simulator: RefCell::new(ProgressSimulator::new(settings.duration)),
            surface,
            settings,
            ticker: RefCell::new(None),
            started_wall: Cell::new(None),
            show_inspector: Cell::new(false),
        })
    }

    /// 下拉框选择，entry 为显示文本
    pub fn select_model(&self, entry: &str) {
        let model = view::model_for_entry(entry);
        match self.simulator.borrow_mut().select_model(model) {
            Ok(()) => log::info!("选择型号: {:?}", model),
            Err(e) => log::warn!("选择型号被拒绝: {}", e),
        }
        self.render();
    }

    pub fn start(self: &Rc<Self>) {
        let model = self.simulator.borrow().state().selected_model.clone();
        if let Err(e) = self.simulator.borrow_mut().start(&model, Instant::now()) {
            log::warn!("无法开始: {}", e);
            return;
        }
        log::info!("开始编程: {}", model);

        self.cancel_ticker();
        self.started_wall.set(Some(Local::now()));
        self.render();

        let handle = TickerHandle::new();
        let token = handle.token();
        let period = self.settings.tick_interval;
        let controller = Rc::downgrade(self);
        let task = async move {
            let exit = ticker::run_ticker(period, token, move |now| match controller.upgrade() {
                Some(controller) => controller.on_tick(now),
                None => TickFlow::Stop,
            })
            .await;
            log::debug!("进度定时任务结束: {:?}", exit);
        };

        match self.surface.spawn_local(Box::pin(task)) {
            Ok(task) => {
                *self.ticker.borrow_mut() = Some(RunningTicker {
                    handle,
                    _task: task,
                });
            }
            Err(e) => {
                log::error!("{:#}", e);
                self.simulator.borrow_mut().refresh();
                self.started_wall.set(None);
                self.render();
            }
        }
    }

    /// 任意状态下重置；运行中会取消定时任务
    pub fn refresh(&self) {
        self.cancel_ticker();
        self.simulator.borrow_mut().refresh();
        self.started_wall.set(None);
        log::info!("已重置");
        self.render();
    }

    /// 返回 true 表示按键已处理
    pub fn handle_shortcut(&self, chord: &KeyChord) -> bool {
        match shortcuts::resolve(chord, Platform::current()) {
            Some(Shortcut::Quit) => {
                log::info!("快捷键: 退出");
                self.surface.quit();
                true
            }
            Some(Shortcut::ToggleInspector) => {
                let show = !self.show_inspector.get();
                self.show_inspector.set(show);
                log::debug!("调试面板: {}", if show { "显示" } else { "隐藏" });
                self.render();
                true
            }
            None => false,
        }
    }

    /// 窗口关闭时调用
    pub fn shutdown(&self) {
        self.cancel_ticker();
        log::info!("会话结束");
    }

    pub fn render(&self) {
        let (view, inspector) = {
            let sim = self.simulator.borrow();
            let view = ProgressView::render(sim.state(), self.settings.segments);
            let inspector = self.show_inspector.get().then(|| {
                InspectorSnapshot {
                    phase: sim.phase().name(),
                    state: sim.state(),
                    started_at: self.started_wall.get(),
                    elapsed_ms: sim
                        .elapsed(Instant::now())
                        .map(|elapsed| elapsed.as_millis() as u64),
                    duration_ms: sim.duration().as_millis() as u64,
                }
                .to_text()
            });
            (view, inspector)
        };
        self.surface.render(&view, inspector.as_deref());
    }

    fn on_tick(&self, now: Instant) -> TickFlow {
        let outcome = self.simulator.borrow_mut().tick(now);
        match outcome {
            TickOutcome::Progressed { changed } => {
                log::trace!("进度: {:.2}%", self.simulator.borrow().state().progress);
                if changed {
                    self.render();
                }
                TickFlow::Continue
            }
            TickOutcome::Completed => {
                log::info!("编程完成");
                self.render();
                TickFlow::Stop
            }
            TickOutcome::NotRunning => TickFlow::Stop,
        }
    }

    fn cancel_ticker(&self) {
        if let Some(running) = self.ticker.borrow_mut().take() {
            running.handle.cancel();
        }
    }
}

impl<S: UiSurface> Drop for SessionController<S> {
    fn drop(&mut self) {
        if let Some(running) = self.ticker.get_mut().take() {
            running.handle.cancel();
        }
    }
}

pub fn setup_ui_handlers(
    ui: &AppWindow,
    settings: AppConfig,
) -> Rc<SessionController<Weak<AppWindow>>> {
    let models: Vec<SharedString> = view::dropdown_entries()
        .into_iter()
        .map(SharedString::from)
        .collect();
    ui.global::<AppState>()
        .set_models(ModelRc::new(VecModel::from(models)));

    let controller = SessionController::new(ui.as_weak(), settings);

    // 型号选择
    {
        let controller = Rc::clone(&controller);
        ui.global::<AppState>()
            .on_model_selected(move |entry| controller.select_model(&entry));
    }

    // 开始按钮
    {
        let controller = Rc::clone(&controller);
        ui.global::<AppState>()
            .on_start_clicked(move || controller.start());
    }

    // 刷新按钮
    {
        let controller = Rc::clone(&controller);
        ui.global::<AppState>()
            .on_refresh_clicked(move || controller.refresh());
    }

    // 快捷键
    {
        let controller = Rc::clone(&controller);
        ui.global::<AppState>()
            .on_shortcut_pressed(move |text, control, shift, alt, meta| {
                controller.handle_shortcut(&KeyChord {
                    text: text.to_string(),
                    control,
                    shift,
                    alt,
                    meta,
                })
            });
    }

    controller.render();
    controller
}
