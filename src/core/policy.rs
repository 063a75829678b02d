//! 行为策略状态：运行模式、睡眠指令与功能开关
//!
//! 仅由指令面写入，调度器每个 tick 开头只读一次（写入在下一个 tick 生效）。
//! 通过 watch 通道分发，跨重连存活（进程生命周期）。

use serde::Deserialize;
use tokio::sync::watch;

use crate::config::PolicySection;
use crate::world::MovementProfile;

/// 运行模式：互斥的高层姿态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// 全自主：战斗、生产、空闲行为全部开放
    Autonomous,
    /// 只做生产性任务，不主动交战
    TaskOnly,
    /// 被动：只保活与观望
    Passive,
}

impl OperatingMode {
    pub fn allows_combat(self) -> bool {
        matches!(self, Self::Autonomous)
    }

    pub fn allows_tasks(self) -> bool {
        !matches!(self, Self::Passive)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "autonomous" | "auto" | "full" => Some(Self::Autonomous),
            "task" | "task_only" | "taskonly" => Some(Self::TaskOnly),
            "passive" => Some(Self::Passive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Autonomous => "autonomous",
            Self::TaskOnly => "task_only",
            Self::Passive => "passive",
        }
    }
}

/// 睡眠指令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepDirective {
    /// 按昼夜与天气自动判断
    Auto,
    /// 强制尝试入睡
    Force,
    /// 永不入睡
    Deny,
}

impl SleepDirective {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "force" => Some(Self::Force),
            "deny" | "never" => Some(Self::Deny),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Force => "force",
            Self::Deny => "deny",
        }
    }
}

/// 可开关的功能
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// 允许永久改变环境（放置 / 回收临时床铺，移动时挖掘开路）
    Terraform,
}

impl Feature {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "terraform" | "build" => Some(Self::Terraform),
            _ => None,
        }
    }
}

/// 策略状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyState {
    pub mode: OperatingMode,
    pub sleep: SleepDirective,
    pub terraform: bool,
}

impl PolicyState {
    pub fn from_config(cfg: &PolicySection) -> Self {
        Self {
            mode: OperatingMode::parse(&cfg.mode).unwrap_or(OperatingMode::Autonomous),
            sleep: SleepDirective::parse(&cfg.sleep).unwrap_or(SleepDirective::Auto),
            terraform: cfg.terraform,
        }
    }

    /// 由策略推导的移动能力配置；策略写入后须立即推送给在线会话，
    /// 不能等到调度器的下一个 tick
    pub fn movement_profile(&self) -> MovementProfile {
        MovementProfile {
            can_dig: self.terraform && self.mode != OperatingMode::Passive,
            can_open_doors: true,
            allow_sprint: self.mode != OperatingMode::Passive,
        }
    }
}

impl Default for PolicyState {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Autonomous,
            sleep: SleepDirective::Auto,
            terraform: true,
        }
    }
}

/// 策略状态的写端；读端通过 subscribe 拿 watch 接收器
#[derive(Debug)]
pub struct PolicyHandle {
    tx: watch::Sender<PolicyState>,
}

impl PolicyHandle {
    pub fn new(initial: PolicyState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<PolicyState> {
        self.tx.subscribe()
    }

    pub fn read(&self) -> PolicyState {
        *self.tx.borrow()
    }

    /// 原子写入，返回写后的状态
    pub fn update(&self, f: impl FnOnce(&mut PolicyState)) -> PolicyState {
        self.tx.send_modify(f);
        *self.tx.borrow()
    }
}

impl Default for PolicyHandle {
    fn default() -> Self {
        Self::new(PolicyState::default())
    }
}
