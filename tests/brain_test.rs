//! 行为调度器集成测试
//!
//! 用脚本化世界验证：层优先序、每轮至多一层出手、策略写入下轮可见、
//! 停止后两个节拍一并失效。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use nomad::brain::{Brain, Tier};
use nomad::config::BrainSection;
use nomad::core::error::ActionError;
use nomad::core::policy::{OperatingMode, PolicyHandle, SleepDirective};
use nomad::world::{
    BlockFilter, BlockPos, BlockRef, EntityFilter, EntityId, EntityKind, EntitySnapshot, Goal,
    Interaction, InventoryView, ItemStack, MovementProfile, Position, Vitals, Weather, WorldClock,
    WorldSession,
};

/// 一轮的世界脚本
#[derive(Clone)]
struct Script {
    spawned: bool,
    sleeping: bool,
    in_combat: bool,
    moving: bool,
    hunger: f32,
    is_day: bool,
    weather: Weather,
    /// 敌对实体与自身的距离；None 表示没有
    hostile_dist: Option<f64>,
    dropped: bool,
    has_food: bool,
    has_bed_item: bool,
    has_weapon: bool,
    wheat: u32,
    bed_block: bool,
    station: bool,
    crop: bool,
    bed_spot: bool,
}

impl Script {
    fn calm_day() -> Self {
        Self {
            spawned: true,
            sleeping: false,
            in_combat: false,
            moving: false,
            hunger: 20.0,
            is_day: true,
            weather: Weather::Clear,
            hostile_dist: None,
            dropped: false,
            has_food: true,
            has_bed_item: false,
            has_weapon: true,
            wheat: 0,
            bed_block: false,
            station: false,
            crop: false,
            bed_spot: false,
        }
    }
}

/// 脚本化会话：按 Script 回答查询，记录动作名
struct ScriptWorld {
    script: Mutex<Script>,
    log: Mutex<Vec<&'static str>>,
    /// 动作类调用数（look / chat / 查询除外）
    mutations: AtomicUsize,
    /// 所有能力面调用数
    calls: AtomicUsize,
}

impl ScriptWorld {
    fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            log: Mutex::new(Vec::new()),
            mutations: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    fn take_log(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    fn snap(&self) -> Script {
        self.script.lock().unwrap().clone()
    }

    fn record(&self, label: &'static str) {
        self.log.lock().unwrap().push(label);
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorldSession for ScriptWorld {
    async fn nearest_entity(&self, filter: EntityFilter) -> Option<EntitySnapshot> {
        self.touch();
        let s = self.snap();
        match filter {
            EntityFilter::HostileWithin(range) => s.hostile_dist.and_then(|d| {
                (d <= range).then(|| EntitySnapshot {
                    id: EntityId(1),
                    kind: EntityKind::Hostile,
                    name: "zombie".into(),
                    position: Position::new(d, 64.0, 0.0),
                })
            }),
            EntityFilter::DroppedItemWithin(_) => s.dropped.then(|| EntitySnapshot {
                id: EntityId(2),
                kind: EntityKind::DroppedItem,
                name: "bone".into(),
                position: Position::new(2.0, 64.0, 0.0),
            }),
        }
    }

    async fn find_block(&self, filter: BlockFilter, _max: f64) -> Option<BlockRef> {
        self.touch();
        let s = self.snap();
        let hit = |name: &str| BlockRef {
            pos: BlockPos::new(3, 64, 3),
            name: name.to_string(),
            maturity: None,
        };
        match filter {
            BlockFilter::NameContains(f) if f.contains("bed") => s.bed_block.then(|| hit("white_bed")),
            BlockFilter::NameContains(f) if f.contains("crafting_table") => {
                s.station.then(|| hit("crafting_table"))
            }
            BlockFilter::NameContains(_) => None,
            BlockFilter::MatureCrop(c) => s.crop.then(|| BlockRef {
                pos: BlockPos::new(-3, 64, -3),
                name: c,
                maturity: Some(7),
            }),
            BlockFilter::BedSpot => s.bed_spot.then(|| hit("grass_block")),
        }
    }

    async fn set_goal(&self, _goal: Goal) -> Result<(), ActionError> {
        self.touch();
        self.record("goal");
        Ok(())
    }

    async fn is_moving(&self) -> bool {
        self.touch();
        self.snap().moving
    }

    async fn travel_to(&self, _goal: Goal) -> Result<(), ActionError> {
        self.touch();
        self.record("travel");
        Ok(())
    }

    async fn interact(&self, action: Interaction) -> Result<(), ActionError> {
        self.touch();
        let label = match action {
            Interaction::Eat { .. } => "eat",
            Interaction::Equip { .. } => "equip",
            Interaction::Attack { .. } => "attack",
            Interaction::Jump => "jump",
            Interaction::SetShield { .. } => "shield",
            Interaction::SetSprint { .. } => "sprint",
            Interaction::PlaceBlock { .. } => "place",
            Interaction::DigBlock { .. } => "dig",
            Interaction::Craft { .. } => "craft",
            Interaction::Sleep { .. } => "sleep",
            Interaction::Collect { .. } => "collect",
            Interaction::Harvest { .. } => "harvest",
            Interaction::Plant { .. } => "plant",
            Interaction::SwapSlots { .. } => "swap",
        };
        self.record(label);
        Ok(())
    }

    async fn vitals(&self) -> Vitals {
        self.touch();
        Vitals {
            health: 20.0,
            hunger: self.snap().hunger,
        }
    }

    async fn clock(&self) -> WorldClock {
        self.touch();
        let s = self.snap();
        WorldClock {
            is_day: s.is_day,
            phase: if s.is_day { 6000 } else { 18000 },
            weather: s.weather,
        }
    }

    async fn position(&self) -> Position {
        self.touch();
        Position::new(0.0, 64.0, 0.0)
    }

    async fn orientation(&self) -> (f32, f32) {
        self.touch();
        (0.0, 0.0)
    }

    async fn inventory(&self) -> InventoryView {
        self.touch();
        let s = self.snap();
        let mut items = Vec::new();
        let mut slot = 0u16;
        let mut push = |name: &str, count: u32| {
            items.push(ItemStack {
                name: name.to_string(),
                slot,
                count,
            });
            slot += 1;
        };
        if s.has_food {
            push("bread", 2);
        }
        if s.has_bed_item {
            push("white_bed", 1);
        }
        if s.has_weapon {
            push("iron_sword", 1);
        }
        if s.wheat > 0 {
            push("wheat", s.wheat);
            push("wheat_seeds", 4);
        }
        InventoryView { items }
    }

    async fn is_spawned(&self) -> bool {
        self.touch();
        self.snap().spawned
    }

    async fn is_sleeping(&self) -> bool {
        self.touch();
        self.snap().sleeping
    }

    async fn in_combat(&self) -> bool {
        self.touch();
        self.snap().in_combat
    }

    async fn look(&self, _yaw: f32, _pitch: f32) {
        self.touch();
    }

    async fn send_chat(&self, _text: &str) -> Result<(), ActionError> {
        self.touch();
        Ok(())
    }

    async fn set_movement_profile(&self, _profile: MovementProfile) {
        self.touch();
    }

    async fn disconnect(&self) {
        self.touch();
    }
}

fn make_brain(world: &Arc<ScriptWorld>, policy: &PolicyHandle) -> (Brain, CancellationToken) {
    let cancel = CancellationToken::new();
    let session: Arc<dyn WorldSession> = Arc::clone(world) as Arc<dyn WorldSession>;
    let brain = Brain::new(
        session,
        policy.subscribe(),
        BrainSection::default(),
        cancel.clone(),
    )
    .with_seed(42);
    (brain, cancel)
}

/// 动作名 -> 所属层的特征签名；辅助动作（equip / travel / jump / goal）不参与归类
fn signature(action: &str) -> Option<Tier> {
    match action {
        "eat" | "sleep" | "dig" | "place" => Some(Tier::Survival),
        "attack" | "shield" => Some(Tier::Threat),
        "collect" | "craft" | "harvest" | "plant" => Some(Tier::Economy),
        "swap" | "sprint" => Some(Tier::Idle),
        _ => None,
    }
}

#[tokio::test]
async fn test_survival_evaluated_before_threat() {
    let mut script = Script::calm_day();
    script.hunger = 5.0;
    script.hostile_dist = Some(2.0);
    let world = Arc::new(ScriptWorld::new(script));
    let policy = PolicyHandle::default();
    let (mut brain, _cancel) = make_brain(&world, &policy);

    let fired = brain.tick().await;
    assert_eq!(fired, Some(Tier::Survival));
    let log = world.take_log();
    assert!(log.contains(&"eat"), "log = {:?}", log);
    assert!(!log.contains(&"attack"), "log = {:?}", log);
}

#[tokio::test]
async fn test_threat_evaluated_before_economy() {
    let mut script = Script::calm_day();
    script.hostile_dist = Some(2.0);
    script.dropped = true;
    let world = Arc::new(ScriptWorld::new(script));
    let policy = PolicyHandle::default();
    let (mut brain, _cancel) = make_brain(&world, &policy);

    let fired = brain.tick().await;
    assert_eq!(fired, Some(Tier::Threat));
    let log = world.take_log();
    assert!(log.contains(&"attack"), "log = {:?}", log);
    assert!(!log.contains(&"collect"), "log = {:?}", log);
}

#[tokio::test]
async fn test_guards_skip_whole_tick() {
    let guards: [fn(&mut Script); 4] = [
        |s| s.spawned = false,
        |s| s.sleeping = true,
        |s| s.in_combat = true,
        |s| s.moving = true,
    ];
    for mutate in guards {
        let mut script = Script::calm_day();
        script.hunger = 1.0; // 即便急需进食也不许出手
        mutate(&mut script);
        let world = Arc::new(ScriptWorld::new(script));
        let policy = PolicyHandle::default();
        let (mut brain, _cancel) = make_brain(&world, &policy);

        let fired = brain.tick().await;
        assert_eq!(fired, None);
        assert_eq!(world.mutations.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_at_most_one_tier_fires_randomized() {
    let world = Arc::new(ScriptWorld::new(Script::calm_day()));
    let policy = PolicyHandle::default();
    let (mut brain, _cancel) = make_brain(&world, &policy);
    let mut rng = StdRng::seed_from_u64(20260806);

    for i in 0..10_000usize {
        let script = Script {
            spawned: rng.gen_bool(0.9),
            sleeping: rng.gen_bool(0.05),
            in_combat: rng.gen_bool(0.05),
            moving: rng.gen_bool(0.2),
            hunger: rng.gen_range(0.0..20.0),
            is_day: rng.gen_bool(0.5),
            weather: match rng.gen_range(0..3) {
                0 => Weather::Clear,
                1 => Weather::Rain,
                _ => Weather::Thunder,
            },
            hostile_dist: rng.gen_bool(0.4).then(|| rng.gen_range(1.0..24.0)),
            dropped: rng.gen_bool(0.3),
            has_food: rng.gen_bool(0.7),
            has_bed_item: rng.gen_bool(0.5),
            has_weapon: rng.gen_bool(0.7),
            wheat: rng.gen_range(0..6),
            bed_block: rng.gen_bool(0.3),
            station: rng.gen_bool(0.4),
            crop: rng.gen_bool(0.4),
            bed_spot: rng.gen_bool(0.6),
        };
        world.set_script(script);
        policy.update(|p| {
            p.mode = match rng.gen_range(0..3) {
                0 => OperatingMode::Autonomous,
                1 => OperatingMode::TaskOnly,
                _ => OperatingMode::Passive,
            };
            p.sleep = match rng.gen_range(0..3) {
                0 => SleepDirective::Auto,
                1 => SleepDirective::Force,
                _ => SleepDirective::Deny,
            };
            p.terraform = rng.gen_bool(0.5);
        });
        world.take_log();
        world.mutations.store(0, Ordering::SeqCst);

        let fired = brain.tick().await;
        let log = world.take_log();

        if fired.is_none() {
            // 出手为零的轮次不得有任何动作
            assert_eq!(
                world.mutations.load(Ordering::SeqCst),
                0,
                "iter {}: actions without a fired tier: {:?}",
                i,
                log
            );
        }
        // 任何带签名的动作必须属于本轮出手的那一层
        for action in &log {
            if let Some(owner) = signature(action) {
                assert_eq!(
                    Some(owner),
                    fired,
                    "iter {}: action {} from tier {:?} but fired {:?} (log {:?})",
                    i,
                    action,
                    owner,
                    fired,
                    log
                );
            }
        }
    }
}

#[tokio::test]
async fn test_terraform_toggle_visible_to_next_tick() {
    let mut script = Script::calm_day();
    script.is_day = false;
    script.bed_block = false;
    script.bed_spot = true;
    script.has_bed_item = true;
    let world = Arc::new(ScriptWorld::new(script.clone()));
    let policy = PolicyHandle::default();
    let (mut brain, _cancel) = make_brain(&world, &policy);

    let fired = brain.tick().await;
    assert_eq!(fired, Some(Tier::Survival));
    assert!(world.take_log().contains(&"place"));

    // 单次写入，下一轮立即生效：不再放床
    policy.update(|p| p.terraform = false);
    world.set_script(script);
    let _ = brain.tick().await;
    let log = world.take_log();
    assert!(!log.contains(&"place"), "log = {:?}", log);
    assert!(!log.contains(&"sleep"), "log = {:?}", log);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_tick_and_gaze() {
    let world = Arc::new(ScriptWorld::new(Script::calm_day()));
    let policy = PolicyHandle::default();
    let cancel = CancellationToken::new();
    let mut cfg = BrainSection::default();
    cfg.tick_millis = 100;
    cfg.gaze_millis = 150;
    let session: Arc<dyn WorldSession> = Arc::clone(&world) as Arc<dyn WorldSession>;
    let brain = Brain::new(session, policy.subscribe(), cfg, cancel.clone()).with_seed(7);
    let task = tokio::spawn(brain.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(world.calls.load(Ordering::SeqCst) > 0);

    cancel.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let frozen = world.calls.load(Ordering::SeqCst);

    // 两个节拍周期都已过去多轮，仍不得有任何新调用
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(world.calls.load(Ordering::SeqCst), frozen);
    assert!(task.is_finished());
}
