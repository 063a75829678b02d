//! 行为调度器：固定节拍 + 优先级分层
//!
//! 主节拍每轮构建一次世界快照，按固定顺序评估四个层
//! （生存 -> 威胁 -> 生产 -> 空闲），第一个真正出手的层消费本轮，后续层跳过。
//! 另有独立节拍的视线漂移，只调视角，不占用动作预算。
//! 两个节拍由同一个 CancellationToken 管辖，停止即一并取消。

pub mod combat;
pub mod economy;
pub mod idle;
pub mod survival;

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::BrainSection;
use crate::core::policy::PolicyState;
use crate::world::{
    EntityFilter, EntitySnapshot, InventoryView, Position, Vitals, WorldClock, WorldSession,
};

/// 层评估结果：出手（消费本轮）或放行（轮到下一层）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Handled,
    Pass,
}

/// 优先级层（数值越小优先级越高）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Survival,
    Threat,
    Economy,
    Idle,
}

/// 每轮重建的世界快照，tick 之间不保留
#[derive(Debug, Clone)]
pub struct TickContext {
    pub spawned: bool,
    pub sleeping: bool,
    pub in_combat: bool,
    pub moving: bool,
    pub vitals: Vitals,
    pub clock: WorldClock,
    pub position: Position,
    pub yaw: f32,
    pub inventory: InventoryView,
    pub nearest_hostile: Option<EntitySnapshot>,
}

impl TickContext {
    pub async fn capture(session: &dyn WorldSession, hostile_range: f64) -> Self {
        let (yaw, _pitch) = session.orientation().await;
        Self {
            spawned: session.is_spawned().await,
            sleeping: session.is_sleeping().await,
            in_combat: session.in_combat().await,
            moving: session.is_moving().await,
            vitals: session.vitals().await,
            clock: session.clock().await,
            position: session.position().await,
            yaw,
            inventory: session.inventory().await,
            nearest_hostile: session
                .nearest_entity(EntityFilter::HostileWithin(hostile_range))
                .await,
        }
    }
}

/// 行为调度器：持有会话句柄与策略读端，随会话生灭
pub struct Brain {
    session: Arc<dyn WorldSession>,
    policy: watch::Receiver<PolicyState>,
    cfg: BrainSection,
    cancel: CancellationToken,
    rng: StdRng,
    survival: survival::SurvivalState,
}

impl Brain {
    pub fn new(
        session: Arc<dyn WorldSession>,
        policy: watch::Receiver<PolicyState>,
        cfg: BrainSection,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            policy,
            cfg,
            cancel,
            rng: StdRng::from_entropy(),
            survival: survival::SurvivalState::default(),
        }
    }

    /// 固定随机种子（测试用）
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// 主循环：到 token 取消为止；取消同时作废两个节拍与进行中的一轮
    pub async fn run(mut self) {
        let tick_period = Duration::from_millis(self.cfg.tick_millis.max(100));
        let gaze_period = Duration::from_millis(self.cfg.gaze_millis.max(100));
        let start = tokio::time::Instant::now();
        let mut tick = tokio::time::interval_at(start + tick_period, tick_period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut gaze = tokio::time::interval_at(start + gaze_period, gaze_period);
        gaze.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let cancel = self.cancel.clone();
        tracing::debug!(?tick_period, ?gaze_period, "brain started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    // 取消与决策赛跑：停止时丢弃进行中的一轮
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        fired = self.tick() => {
                            if let Some(tier) = fired {
                                tracing::trace!(?tier, "tick consumed");
                            }
                        }
                    }
                }
                _ = gaze.tick() => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.gaze() => {}
                    }
                }
            }
        }
        tracing::debug!("brain stopped");
    }

    /// 单轮决策；返回出手的层（测试与追踪用）
    ///
    /// 守卫条件：未就绪、睡眠中、交战中、还在赶路时整轮跳过，
    /// 保证新决策不打断上一轮已经承诺的动作。
    pub async fn tick(&mut self) -> Option<Tier> {
        let policy = *self.policy.borrow();
        let ctx = TickContext::capture(&*self.session, self.cfg.hostile_range).await;

        if !ctx.spawned || ctx.sleeping || ctx.in_combat || ctx.moving {
            return None;
        }

        match survival::run(&*self.session, &policy, &ctx, &self.cfg, &mut self.survival).await {
            Ok(TickOutcome::Handled) => return Some(Tier::Survival),
            Ok(TickOutcome::Pass) => {}
            Err(e) => {
                tracing::debug!(error = %e, "survival action failed, ending tick");
                return None;
            }
        }

        match combat::run(&*self.session, &policy, &ctx, &self.cfg).await {
            Ok(TickOutcome::Handled) => return Some(Tier::Threat),
            Ok(TickOutcome::Pass) => {}
            Err(e) => {
                tracing::debug!(error = %e, "combat action failed, ending tick");
                return None;
            }
        }

        match economy::run(&*self.session, &policy, &ctx, &self.cfg).await {
            Ok(TickOutcome::Handled) => return Some(Tier::Economy),
            Ok(TickOutcome::Pass) => {}
            Err(e) => {
                tracing::debug!(error = %e, "economy action failed, ending tick");
                return None;
            }
        }

        match idle::run(&self.session, &ctx, &self.cfg, &mut self.rng, &self.cancel).await {
            Ok(TickOutcome::Handled) => Some(Tier::Idle),
            Ok(TickOutcome::Pass) => None,
            Err(e) => {
                tracing::debug!(error = %e, "idle action failed, ending tick");
                None
            }
        }
    }

    /// 视线漂移：不移动、不睡眠时轻微转头，纯装饰
    async fn gaze(&mut self) {
        if self.session.is_moving().await || self.session.is_sleeping().await {
            return;
        }
        let (yaw, _) = self.session.orientation().await;
        let delta = self.rng.gen_range(-0.6f32..0.6f32);
        let pitch = self.rng.gen_range(-0.2f32..0.2f32);
        self.session.look(yaw + delta, pitch).await;
    }
}
