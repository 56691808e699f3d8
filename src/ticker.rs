use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

// 每次 tick 回调的返回值，决定定时器是否继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

// 定时循环退出的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerExit {
    /// 回调返回 Stop
    Finished,
    /// 取消令牌被触发
    Cancelled,
}

/// 周期性调用 `on_tick`，直到回调返回 Stop 或令牌被取消。
///
/// 第一次 tick 在 `period` 之后触发，错过的 tick 顺延而不是集中补发。
/// 令牌取消后不会再调用 `on_tick`。
pub async fn run_ticker<F>(period: Duration, token: CancellationToken, mut on_tick: F) -> TickerExit
where
    F: FnMut(Instant) -> TickFlow,
{
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                log::debug!("定时任务: 收到取消信号，退出");
                return TickerExit::Cancelled;
            }
            _ = interval.tick() => {}
        }

        if token.is_cancelled() {
            return TickerExit::Cancelled;
        }

        if on_tick(Instant::now()) == TickFlow::Stop {
            log::debug!("定时任务: 回调结束，退出");
            return TickerExit::Finished;
        }
    }
}

/// 持有定时任务的取消令牌，cancel 或 drop 时通知任务退出
#[derive(Debug)]
pub struct TickerHandle {
    token: CancellationToken,
}

impl TickerHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Default for TickerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
