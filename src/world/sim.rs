//! 内置模拟世界后端
//!
//! 未配置真实服务器时的本地替身，也是测试替身：昼夜循环、夜间敌对实体、
//! 少量方块与库存交互，并支持脚本化的拒连 / 踢出 / 关闭，用来演练重连路径。
//! 动作耗时用短暂 sleep 模拟，足以驱动完整的监管 + 调度栈。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::core::error::{ActionError, ConnectError, TransportError};
use crate::world::{
    AuthMode, BlockFilter, BlockPos, BlockRef, Credentials, EntityFilter, EntityId, EntityKind,
    EntitySnapshot, Goal, Interaction, InventoryView, ItemStack, MovementProfile, Position,
    ServerTarget, SessionEvent, Vitals, Weather, WorldClock, WorldConnector, WorldHandle,
    WorldSession,
};

/// 模拟行为脚本：测试用它演练失败路径
#[derive(Debug, Clone)]
pub struct SimBehavior {
    /// 直接拒绝连接
    pub refuse: bool,
    /// 连接后到 Ready 的延迟
    pub ready_delay: Duration,
    /// 就绪后延迟踢出（载荷为服务端原因）
    pub kick_after: Option<(Duration, String)>,
    /// 就绪后延迟正常关闭
    pub end_after: Option<Duration>,
    /// 一个昼夜的墙钟长度
    pub day_length: Duration,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            refuse: false,
            ready_delay: Duration::from_millis(20),
            kick_after: None,
            end_after: None,
            day_length: Duration::from_secs(120),
        }
    }
}

/// 模拟连接器
#[derive(Debug, Default)]
pub struct SimConnector {
    behavior: SimBehavior,
    connects: AtomicU64,
}

impl SimConnector {
    pub fn new(behavior: SimBehavior) -> Self {
        Self {
            behavior,
            connects: AtomicU64::new(0),
        }
    }

    /// 历史连接次数（含失败）
    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorldConnector for SimConnector {
    async fn connect(
        &self,
        target: &ServerTarget,
        credentials: &Credentials,
    ) -> Result<WorldHandle, ConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self.behavior.refuse {
            return Err(ConnectError::Transport(TransportError::Refused));
        }
        if credentials.username.is_empty() {
            return Err(ConnectError::InvalidTarget("empty username".into()));
        }

        tracing::debug!(
            host = %target.host,
            port = target.port,
            auth = ?credentials.auth,
            "sim connect"
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = Arc::new(SimSession::new(event_tx.clone(), self.behavior.day_length));

        // 就绪与脚本化终结事件
        let behavior = self.behavior.clone();
        let alive = Arc::clone(&session.alive);
        let decay = Arc::clone(&session.state);
        tokio::spawn(async move {
            tokio::time::sleep(behavior.ready_delay).await;
            if event_tx.send(SessionEvent::Ready).is_err() {
                return;
            }

            if let Some((after, reason)) = behavior.kick_after {
                tokio::time::sleep(after).await;
                alive.store(false, Ordering::SeqCst);
                let _ = event_tx.send(SessionEvent::Kicked { reason });
                return;
            }
            if let Some(after) = behavior.end_after {
                tokio::time::sleep(after).await;
                alive.store(false, Ordering::SeqCst);
                let _ = event_tx.send(SessionEvent::Ended);
                return;
            }

            // 饥饿缓慢衰减，给生存层制造工作
            loop {
                tokio::time::sleep(Duration::from_secs(5)).await;
                if !alive.load(Ordering::SeqCst) {
                    break;
                }
                let mut st = decay.write().await;
                st.vitals.hunger = (st.vitals.hunger - 0.2).max(0.0);
            }
        });

        Ok(WorldHandle {
            session,
            events: event_rx,
        })
    }
}

/// 为 AuthMode 提供解析辅助（配置字符串 -> 枚举）
pub fn credentials_from(username: &str, auth: &str) -> Credentials {
    Credentials {
        username: username.to_string(),
        auth: AuthMode::parse(auth),
    }
}

struct SimState {
    position: Position,
    yaw: f32,
    pitch: f32,
    vitals: Vitals,
    inventory: Vec<ItemStack>,
    moving: bool,
    sleeping: bool,
    in_combat: bool,
    spawned: bool,
    movement: MovementProfile,
    placed: Vec<(BlockPos, String)>,
    chat_log: Vec<String>,
}

impl SimState {
    fn starter() -> Self {
        Self {
            position: Position::new(0.5, 64.0, 0.5),
            yaw: 0.0,
            pitch: 0.0,
            vitals: Vitals {
                health: 20.0,
                hunger: 20.0,
            },
            inventory: vec![
                ItemStack { name: "bread".into(), slot: 0, count: 3 },
                ItemStack { name: "white_bed".into(), slot: 1, count: 1 },
                ItemStack { name: "iron_sword".into(), slot: 2, count: 1 },
                ItemStack { name: "wheat".into(), slot: 3, count: 4 },
                ItemStack { name: "wheat_seeds".into(), slot: 4, count: 8 },
            ],
            moving: false,
            sleeping: false,
            in_combat: false,
            spawned: true,
            movement: MovementProfile::default(),
            placed: Vec::new(),
            chat_log: Vec::new(),
        }
    }

    fn take_one(&mut self, fragment: &str) -> Option<String> {
        let idx = self.inventory.iter().position(|i| i.name.contains(fragment))?;
        let name = self.inventory[idx].name.clone();
        if self.inventory[idx].count <= 1 {
            self.inventory.remove(idx);
        } else {
            self.inventory[idx].count -= 1;
        }
        Some(name)
    }

    fn give(&mut self, name: &str, count: u32) {
        if let Some(item) = self.inventory.iter_mut().find(|i| i.name == name) {
            item.count += count;
        } else {
            let slot = self.inventory.len() as u16;
            self.inventory.push(ItemStack {
                name: name.to_string(),
                slot,
                count,
            });
        }
    }
}

/// 模拟会话
pub struct SimSession {
    state: Arc<RwLock<SimState>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    started: Instant,
    day_length: Duration,
    alive: Arc<AtomicBool>,
}

impl SimSession {
    fn new(events: mpsc::UnboundedSender<SessionEvent>, day_length: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(SimState::starter())),
            events,
            started: Instant::now(),
            day_length,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// 向事件流注入聊天消息（演示 / 测试指令面）
    pub fn push_chat(&self, sender: &str, text: &str) {
        let _ = self.events.send(SessionEvent::Chat {
            sender: sender.to_string(),
            text: text.to_string(),
        });
    }

    /// 最近发出的聊天（测试断言用）
    pub async fn sent_chat(&self) -> Vec<String> {
        self.state.read().await.chat_log.clone()
    }

    fn phase(&self) -> u32 {
        let elapsed = self.started.elapsed().as_millis() as u64;
        let day = self.day_length.as_millis().max(1) as u64;
        ((elapsed % day) * 24000 / day) as u32
    }

    fn ensure_alive(&self) -> Result<(), ActionError> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ActionError::SessionEnded)
        }
    }

    async fn settle(&self, cost: Duration) -> Result<(), ActionError> {
        self.ensure_alive()?;
        tokio::time::sleep(cost).await;
        self.ensure_alive()
    }
}

#[async_trait]
impl WorldSession for SimSession {
    async fn nearest_entity(&self, filter: EntityFilter) -> Option<EntitySnapshot> {
        let phase = self.phase();
        let pos = self.state.read().await.position;
        match filter {
            EntityFilter::HostileWithin(range) => {
                // 夜间在附近刷一只僵尸
                if phase >= 13000 {
                    let hostile = pos.offset(6.0, 0.0, 4.0);
                    (pos.distance_to(&hostile) <= range).then(|| EntitySnapshot {
                        id: EntityId(1000 + (phase / 1000) as u64),
                        kind: EntityKind::Hostile,
                        name: "zombie".into(),
                        position: hostile,
                    })
                } else {
                    None
                }
            }
            EntityFilter::DroppedItemWithin(range) => {
                // 清晨短暂出现一个掉落物
                if (1000..2000).contains(&phase) {
                    let drop = pos.offset(3.0, 0.0, 2.0);
                    (pos.distance_to(&drop) <= range).then(|| EntitySnapshot {
                        id: EntityId(2000),
                        kind: EntityKind::DroppedItem,
                        name: "bone".into(),
                        position: drop,
                    })
                } else {
                    None
                }
            }
        }
    }

    async fn find_block(&self, filter: BlockFilter, max_distance: f64) -> Option<BlockRef> {
        let st = self.state.read().await;
        let pos = st.position;
        match filter {
            BlockFilter::NameContains(fragment) => {
                if let Some((bp, name)) = st
                    .placed
                    .iter()
                    .find(|(bp, name)| {
                        name.contains(&fragment) && pos.distance_to(&bp.center()) <= max_distance
                    })
                    .cloned()
                {
                    return Some(BlockRef {
                        pos: bp,
                        name,
                        maturity: None,
                    });
                }
                // 固定工作台
                if fragment.contains("crafting_table") {
                    let bp = BlockPos::new(10, 64, 10);
                    if pos.distance_to(&bp.center()) <= max_distance {
                        return Some(BlockRef {
                            pos: bp,
                            name: "crafting_table".into(),
                            maturity: None,
                        });
                    }
                }
                None
            }
            BlockFilter::MatureCrop(crop) => {
                // 固定农田，成熟度随相位摆动
                let bp = BlockPos::new(-8, 64, -8);
                let mature = (self.phase() / 3000) % 2 == 0;
                (mature && pos.distance_to(&bp.center()) <= max_distance).then(|| BlockRef {
                    pos: bp,
                    name: crop,
                    maturity: Some(7),
                })
            }
            BlockFilter::BedSpot => {
                let bp = BlockPos::new(pos.x as i32 + 1, pos.y as i32, pos.z as i32 + 1);
                Some(BlockRef {
                    pos: bp,
                    name: "grass_block".into(),
                    maturity: None,
                })
            }
        }
    }

    async fn set_goal(&self, goal: Goal) -> Result<(), ActionError> {
        self.ensure_alive()?;
        let target = match goal {
            Goal::Near { pos, .. } => pos,
            Goal::Block(bp) => bp.center(),
            Goal::Entity(_) => {
                let st = self.state.read().await;
                st.position.offset(4.0, 0.0, 2.0)
            }
        };
        {
            let mut st = self.state.write().await;
            st.moving = true;
        }
        let state = Arc::clone(&self.state);
        let alive = Arc::clone(&self.alive);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            if !alive.load(Ordering::SeqCst) {
                return;
            }
            let mut st = state.write().await;
            st.position = target;
            st.moving = false;
        });
        Ok(())
    }

    async fn is_moving(&self) -> bool {
        self.state.read().await.moving
    }

    async fn travel_to(&self, goal: Goal) -> Result<(), ActionError> {
        let target = match goal {
            Goal::Near { pos, .. } => pos,
            Goal::Block(bp) => bp.center(),
            Goal::Entity(_) => self.state.read().await.position.offset(4.0, 0.0, 2.0),
        };
        let from = self.state.read().await.position;
        let dist = from.distance_to(&target);
        if dist > 64.0 {
            return Err(ActionError::Unreachable);
        }
        self.settle(Duration::from_millis((dist * 10.0).min(400.0) as u64))
            .await?;
        self.state.write().await.position = target;
        Ok(())
    }

    async fn interact(&self, action: Interaction) -> Result<(), ActionError> {
        self.settle(Duration::from_millis(15)).await?;
        let mut st = self.state.write().await;
        match action {
            Interaction::Eat { item } => {
                st.take_one(&item)
                    .ok_or(ActionError::MissingResource(item))?;
                st.vitals.hunger = (st.vitals.hunger + 5.0).min(20.0);
            }
            Interaction::Equip { item } => {
                if st.inventory.iter().all(|i| !i.name.contains(&item)) {
                    return Err(ActionError::MissingResource(item));
                }
            }
            Interaction::Attack { .. } => {
                st.in_combat = false; // 模拟一击得手，不进入持续交战
            }
            Interaction::Jump | Interaction::SetShield { .. } | Interaction::SetSprint { .. } => {}
            Interaction::PlaceBlock { item, at } => {
                let name = st
                    .take_one(&item)
                    .ok_or(ActionError::MissingResource(item))?;
                st.placed.push((at, name));
            }
            Interaction::DigBlock { at } => {
                if let Some(idx) = st.placed.iter().position(|(bp, _)| *bp == at) {
                    let (_, name) = st.placed.remove(idx);
                    st.give(&name, 1);
                }
            }
            Interaction::Craft { recipe, station } => {
                if station.is_none() {
                    return Err(ActionError::Rejected("no workstation".into()));
                }
                if recipe == "bread" {
                    for _ in 0..3 {
                        st.take_one("wheat")
                            .ok_or(ActionError::MissingResource("wheat".into()))?;
                    }
                    st.give("bread", 1);
                } else {
                    return Err(ActionError::Rejected(format!("unknown recipe {recipe}")));
                }
            }
            Interaction::Sleep { .. } => {
                if self.phase() < 13000 {
                    return Err(ActionError::Rejected("not night".into()));
                }
                st.sleeping = true;
            }
            Interaction::Collect { .. } => {
                st.give("bone", 1);
            }
            Interaction::Harvest { .. } => {
                st.give("wheat", 1);
            }
            Interaction::Plant { item, at: _ } => {
                st.take_one(&item)
                    .ok_or(ActionError::MissingResource(item))?;
            }
            Interaction::SwapSlots { from, to } => {
                for i in st.inventory.iter_mut() {
                    if i.slot == from {
                        i.slot = to;
                    } else if i.slot == to {
                        i.slot = from;
                    }
                }
            }
        }
        Ok(())
    }

    async fn vitals(&self) -> Vitals {
        self.state.read().await.vitals
    }

    async fn clock(&self) -> WorldClock {
        let phase = self.phase();
        let day_index = self.started.elapsed().as_millis() as u64
            / self.day_length.as_millis().max(1) as u64;
        let weather = match day_index % 4 {
            1 => Weather::Rain,
            3 => Weather::Thunder,
            _ => Weather::Clear,
        };
        WorldClock {
            is_day: phase < 13000,
            phase,
            weather,
        }
    }

    async fn position(&self) -> Position {
        self.state.read().await.position
    }

    async fn orientation(&self) -> (f32, f32) {
        let st = self.state.read().await;
        (st.yaw, st.pitch)
    }

    async fn inventory(&self) -> InventoryView {
        InventoryView {
            items: self.state.read().await.inventory.clone(),
        }
    }

    async fn is_spawned(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && self.state.read().await.spawned
    }

    async fn is_sleeping(&self) -> bool {
        // 黎明自动醒来
        let sleeping = self.state.read().await.sleeping;
        if sleeping && self.phase() < 13000 {
            self.state.write().await.sleeping = false;
            return false;
        }
        sleeping
    }

    async fn in_combat(&self) -> bool {
        self.state.read().await.in_combat
    }

    async fn look(&self, yaw: f32, pitch: f32) {
        let mut st = self.state.write().await;
        st.yaw = yaw;
        st.pitch = pitch;
    }

    async fn send_chat(&self, text: &str) -> Result<(), ActionError> {
        self.ensure_alive()?;
        tracing::debug!(text, "sim chat");
        self.state.write().await.chat_log.push(text.to_string());
        Ok(())
    }

    async fn set_movement_profile(&self, profile: MovementProfile) {
        self.state.write().await.movement = profile;
    }

    async fn disconnect(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let _ = self.events.send(SessionEvent::Ended);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ServerTarget {
        ServerTarget {
            host: "sim".into(),
            port: 0,
            version: None,
        }
    }

    #[tokio::test]
    async fn test_connect_emits_ready() {
        let connector = SimConnector::default();
        let mut handle = connector
            .connect(&target(), &credentials_from("NomadBot", "offline"))
            .await
            .unwrap();
        let ev = handle.events.recv().await.unwrap();
        assert!(matches!(ev, SessionEvent::Ready));
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_refuse_script() {
        let connector = SimConnector::new(SimBehavior {
            refuse: true,
            ..SimBehavior::default()
        });
        let err = connector
            .connect(&target(), &credentials_from("NomadBot", "offline"))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ConnectError::Transport(TransportError::Refused)
        ));
    }

    #[tokio::test]
    async fn test_scripted_kick() {
        let connector = SimConnector::new(SimBehavior {
            kick_after: Some((Duration::from_millis(10), "duplicate_login".into())),
            ..SimBehavior::default()
        });
        let mut handle = connector
            .connect(&target(), &credentials_from("NomadBot", "offline"))
            .await
            .unwrap();
        assert!(matches!(
            handle.events.recv().await.unwrap(),
            SessionEvent::Ready
        ));
        match handle.events.recv().await.unwrap() {
            SessionEvent::Kicked { reason } => assert!(reason.contains("duplicate_login")),
            other => panic!("expected kick, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_eat_restores_hunger() {
        let connector = SimConnector::default();
        let handle = connector
            .connect(&target(), &credentials_from("NomadBot", "offline"))
            .await
            .unwrap();
        let session = handle.session;
        let before = session.vitals().await.hunger;
        session
            .interact(Interaction::Eat {
                item: "bread".into(),
            })
            .await
            .unwrap();
        let after = session.vitals().await.hunger;
        assert!(after >= before);
    }

    #[tokio::test]
    async fn test_actions_fail_after_disconnect() {
        let connector = SimConnector::default();
        let handle = connector
            .connect(&target(), &credentials_from("NomadBot", "offline"))
            .await
            .unwrap();
        handle.session.disconnect().await;
        let err = handle
            .session
            .interact(Interaction::Jump)
            .await
            .err()
            .unwrap();
        assert_eq!(err, ActionError::SessionEnded);
    }
}
