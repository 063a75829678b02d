//! 世界代理能力面
//!
//! 核心只消费这里定义的 trait：连接器（WorldConnector）建立会话，会话
//! （WorldSession）提供实体 / 方块查询、移动目标、交互动作与事件流。
//! 寻路、物理、库存与协议封包都在后端内部，核心不感知。
//! 内置后端见 [`sim`]（未配置真实服务器时的本地模拟，也是测试替身）。

pub mod sim;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::error::{ActionError, ConnectError, TransportError};

/// 连接目标
#[derive(Debug, Clone)]
pub struct ServerTarget {
    pub host: String,
    pub port: u16,
    /// 协议版本，None 表示自动协商
    pub version: Option<String>,
}

/// 身份凭据
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub auth: AuthMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Offline,
    Online,
}

impl AuthMode {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "online" => Self::Online,
            _ => Self::Offline,
        }
    }
}

/// 世界坐标
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// 方块坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn center(&self) -> Position {
        Position::new(self.x as f64 + 0.5, self.y as f64, self.z as f64 + 0.5)
    }
}

/// 方块查询结果
#[derive(Debug, Clone)]
pub struct BlockRef {
    pub pos: BlockPos,
    pub name: String,
    /// 作物成熟度（0-7），非作物为 None
    pub maturity: Option<u8>,
}

/// 实体标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Hostile,
    Passive,
    DroppedItem,
    Player,
}

/// 实体查询结果
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub position: Position,
}

/// 实体过滤器
#[derive(Debug, Clone)]
pub enum EntityFilter {
    /// 指定半径内最近的敌对实体
    HostileWithin(f64),
    /// 指定半径内最近的掉落物
    DroppedItemWithin(f64),
}

/// 方块过滤器；半径由调用方单独传入
#[derive(Debug, Clone)]
pub enum BlockFilter {
    /// 名称包含片段
    NameContains(String),
    /// 成熟作物（maturity 达到上限）
    MatureCrop(String),
    /// 可放置床的空位（地面实心、上方与侧方留空）
    BedSpot,
}

/// 移动目标
#[derive(Debug, Clone)]
pub enum Goal {
    /// 到达某点附近
    Near { pos: Position, range: f64 },
    /// 走到方块处
    Block(BlockPos),
    /// 追踪实体
    Entity(EntityId),
}

/// 由策略推导的移动能力配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovementProfile {
    pub can_dig: bool,
    pub can_open_doors: bool,
    pub allow_sprint: bool,
}

/// 库存条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    pub name: String,
    pub slot: u16,
    pub count: u32,
}

/// 库存只读视图
#[derive(Debug, Clone, Default)]
pub struct InventoryView {
    pub items: Vec<ItemStack>,
}

/// 可食用物品名
const FOODS: &[&str] = &[
    "bread",
    "apple",
    "carrot",
    "potato",
    "baked_potato",
    "cooked_beef",
    "cooked_porkchop",
];

impl InventoryView {
    pub fn count_of(&self, fragment: &str) -> u32 {
        self.items
            .iter()
            .filter(|i| i.name.contains(fragment))
            .map(|i| i.count)
            .sum()
    }

    pub fn first_matching(&self, fragment: &str) -> Option<&ItemStack> {
        self.items.iter().find(|i| i.name.contains(fragment))
    }

    pub fn first_food(&self) -> Option<&ItemStack> {
        self.items
            .iter()
            .find(|i| FOODS.iter().any(|f| i.name == *f))
    }

    /// 择优武器：剑优先于斧
    pub fn best_weapon(&self) -> Option<&ItemStack> {
        self.first_matching("sword")
            .or_else(|| self.first_matching("_axe"))
    }
}

/// 身体 / 环境读数
#[derive(Debug, Clone, Copy)]
pub struct Vitals {
    pub health: f32,
    pub hunger: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weather {
    Clear,
    Rain,
    Thunder,
}

/// 世界时钟
#[derive(Debug, Clone, Copy)]
pub struct WorldClock {
    pub is_day: bool,
    /// 一天内的相位刻（0..24000）
    pub phase: u32,
    pub weather: Weather,
}

/// 交互动作：挂起直到完成或以 ActionError 失败
#[derive(Debug, Clone)]
pub enum Interaction {
    Eat { item: String },
    Equip { item: String },
    Attack { target: EntityId },
    Jump,
    SetShield { raised: bool },
    SetSprint { on: bool },
    PlaceBlock { item: String, at: BlockPos },
    DigBlock { at: BlockPos },
    Craft { recipe: String, station: Option<BlockPos> },
    Sleep { bed: BlockPos },
    Collect { target: EntityId },
    Harvest { at: BlockPos },
    Plant { item: String, at: BlockPos },
    SwapSlots { from: u16, to: u16 },
}

/// 会话事件：就绪、终结事件与聊天
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// 会话达到就绪（已在世界中生成）
    Ready,
    /// 被踢出，载荷为服务端原因
    Kicked { reason: String },
    /// 传输层错误
    Errored { error: TransportError },
    /// 连接关闭，无显式踢出
    Ended,
    /// 聊天 / 私聊消息
    Chat { sender: String, text: String },
}

/// 一次连接的产物：能力句柄 + 事件流
pub struct WorldHandle {
    pub session: Arc<dyn WorldSession>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// 世界连接器：每次重连调用一次
#[async_trait]
pub trait WorldConnector: Send + Sync {
    async fn connect(
        &self,
        target: &ServerTarget,
        credentials: &Credentials,
    ) -> Result<WorldHandle, ConnectError>;
}

/// 世界会话能力面
///
/// 长动作（travel_to / interact）挂起当前调用方直到落定；会话终结时以
/// ActionError::SessionEnded 落定，效果由调用方丢弃。
#[async_trait]
pub trait WorldSession: Send + Sync {
    async fn nearest_entity(&self, filter: EntityFilter) -> Option<EntitySnapshot>;

    async fn find_block(&self, filter: BlockFilter, max_distance: f64) -> Option<BlockRef>;

    /// 提交移动目标（发出即返回，寻路在后端进行）
    async fn set_goal(&self, goal: Goal) -> Result<(), ActionError>;

    async fn is_moving(&self) -> bool;

    /// 走到目标处；挂起直到到达或 Unreachable
    async fn travel_to(&self, goal: Goal) -> Result<(), ActionError>;

    /// 执行一次交互；挂起直到完成
    async fn interact(&self, action: Interaction) -> Result<(), ActionError>;

    async fn vitals(&self) -> Vitals;

    async fn clock(&self) -> WorldClock;

    async fn position(&self) -> Position;

    /// 视角（yaw, pitch）
    async fn orientation(&self) -> (f32, f32);

    async fn inventory(&self) -> InventoryView;

    async fn is_spawned(&self) -> bool;

    async fn is_sleeping(&self) -> bool;

    /// 是否处于交战（已有攻击目标）
    async fn in_combat(&self) -> bool;

    /// 仅调整视角，不计入 tick 的动作预算
    async fn look(&self, yaw: f32, pitch: f32);

    async fn send_chat(&self, text: &str) -> Result<(), ActionError>;

    /// 推送移动能力配置（策略写入后立即调用，不等下一个 tick）
    async fn set_movement_profile(&self, profile: MovementProfile);

    /// 主动断开；会触发正常的 Ended 事件路径
    async fn disconnect(&self);
}
