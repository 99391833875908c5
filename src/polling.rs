//! 固定間隔、固定次數的輪詢狀態機。
//!
//! 等待由 [`Sleeper`] 注入，測試時可以不經過真實時間即可驗證輪詢次數。

use std::{fmt, thread, time::Duration};

/// 暫停目前執行緒的能力介面。
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// 以 [`thread::sleep`] 實作的 [`Sleeper`]。
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// 輪詢參數：每次檢查前等待 `wait_period`，最多檢查 `max_checks` 次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub wait_period: Duration,
    pub max_checks: u32,
}

/// 單次檢查的結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// 已到達目標狀態。
    Done,
    /// 尚未完成，附上目前觀察到的狀態。
    NotYet(String),
}

/// 輪詢結束時的結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Done { attempts: u32 },
    Exhausted { attempts: u32, last_status: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PollState {
    Waiting { next_attempt: u32 },
    Checking { attempt: u32 },
    Finished(PollOutcome),
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Waiting { next_attempt } => write!(f, "waiting before check {}", next_attempt),
            PollState::Checking { attempt } => write!(f, "check {}", attempt),
            PollState::Finished(_) => f.write_str("finished"),
        }
    }
}

/// 輪詢狀態機。
///
/// 狀態轉移為 `Waiting -> Checking -> (Finished | Waiting)`，第一次檢查前同樣會等待，
/// 因此檢查 N 次最多等待 N 次。
pub struct Poller<'a> {
    policy: PollPolicy,
    sleeper: &'a dyn Sleeper,
    state: PollState,
}

impl<'a> Poller<'a> {
    pub fn new(policy: PollPolicy, sleeper: &'a dyn Sleeper) -> Self {
        Poller {
            policy,
            sleeper,
            state: PollState::Waiting { next_attempt: 1 },
        }
    }

    /// 反覆執行 `check` 直到完成或用盡檢查次數。
    ///
    /// `check` 回傳錯誤時立即中止並原樣回傳該錯誤。
    pub fn run<F, E>(mut self, mut check: F) -> Result<PollOutcome, E>
    where
        F: FnMut(u32) -> Result<Check, E>,
    {
        loop {
            log::trace!("poller: {}", self.state);
            self.state = match self.state {
                PollState::Waiting { next_attempt } => {
                    self.sleeper.sleep(self.policy.wait_period);
                    PollState::Checking {
                        attempt: next_attempt,
                    }
                }
                PollState::Checking { attempt } => match check(attempt)? {
                    Check::Done => PollState::Finished(PollOutcome::Done { attempts: attempt }),
                    Check::NotYet(status) => {
                        log::info!(
                            "status is {} after check {}/{}",
                            status,
                            attempt,
                            self.policy.max_checks
                        );
                        if attempt >= self.policy.max_checks {
                            PollState::Finished(PollOutcome::Exhausted {
                                attempts: attempt,
                                last_status: status,
                            })
                        } else {
                            PollState::Waiting {
                                next_attempt: attempt + 1,
                            }
                        }
                    }
                },
                PollState::Finished(outcome) => return Ok(outcome),
            };
        }
    }
}
