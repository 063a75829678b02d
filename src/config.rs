//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NOMAD__*` 覆盖（双下划线表示嵌套，
//! 如 `NOMAD__SERVER__HOST=play.example.net`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub brain: BrainSection,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub commands: CommandsSection,
    #[serde(default)]
    pub status: StatusSection,
}

/// [server] 段：连接目标与身份
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// 世界后端：目前内置 `sim`（本地模拟）；真实协议后端作为插件接入
    pub backend: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// 认证方式：offline / online
    pub auth: String,
    /// 协议版本，留空自动协商
    pub version: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            backend: "sim".to_string(),
            host: "localhost".to_string(),
            port: 25565,
            username: "NomadBot".to_string(),
            auth: "offline".to_string(),
            version: None,
        }
    }
}

/// [reconnect] 段：重连延迟策略
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectSection {
    /// 基础延迟（秒）
    pub base_secs: u64,
    /// 连续失败时当前延迟的增长倍率
    pub multiplier: f64,
    /// 延迟上限（秒）
    pub cap_secs: u64,
    /// 抖动比例（0.0 = 关闭），实际延迟在 [d, d*(1+jitter)] 内取值
    pub jitter: f64,
    /// 重复登录被踢后的等待（秒），须明显长于基础延迟，给服务端会话留出超时时间
    pub duplicate_secs: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            base_secs: 10,
            multiplier: 1.5,
            cap_secs: 120,
            jitter: 0.1,
            duplicate_secs: 60,
        }
    }
}

/// [brain] 段：行为调度节拍与各层参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrainSection {
    /// 主决策节拍（毫秒）
    pub tick_millis: u64,
    /// 视线漂移节拍（毫秒），独立于主节拍
    pub gaze_millis: u64,
    /// 饥饿低于该值时进食（0-20 刻度）
    pub eat_threshold: f32,
    /// 敌对实体感知半径
    pub hostile_range: f64,
    /// 近战距离
    pub melee_range: f64,
    #[serde(default)]
    pub idle: IdleSection,
    #[serde(default)]
    pub rest: RestSection,
    #[serde(default)]
    pub economy: EconomySection,
}

impl Default for BrainSection {
    fn default() -> Self {
        Self {
            tick_millis: 3000,
            gaze_millis: 4500,
            eat_threshold: 14.0,
            hostile_range: 16.0,
            melee_range: 3.0,
            idle: IdleSection::default(),
            rest: RestSection::default(),
            economy: EconomySection::default(),
        }
    }
}

/// [brain.idle] 段：空闲层累积概率带（shuffle < pause < 1.0，余量为游走）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdleSection {
    pub shuffle_band: f64,
    pub pause_band: f64,
    /// 游走半径下限 / 上限
    pub wander_min: f64,
    pub wander_max: f64,
}

impl Default for IdleSection {
    fn default() -> Self {
        Self {
            shuffle_band: 0.05,
            pause_band: 0.15,
            wander_min: 10.0,
            wander_max: 30.0,
        }
    }
}

/// [brain.rest] 段：休息条件与床搜索
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestSection {
    /// 床搜索半径
    pub bed_range: f64,
    /// 雷暴时是否允许白天入睡（各服务器规则不一，按需开启）
    pub sleep_in_storm: bool,
}

impl Default for RestSection {
    fn default() -> Self {
        Self {
            bed_range: 32.0,
            sleep_in_storm: false,
        }
    }
}

/// [brain.economy] 段：合成与农耕参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EconomySection {
    /// 拾取掉落物的搜索半径
    pub loot_range: f64,
    /// 合成产物
    pub craft_recipe: String,
    /// 合成原料及所需数量
    pub craft_input: String,
    pub craft_input_count: u32,
    /// 工作台方块名
    pub workstation: String,
    /// 工作台 / 农田搜索半径
    pub work_range: f64,
    /// 成熟作物与补种种子
    pub crop: String,
    pub seed: String,
}

impl Default for EconomySection {
    fn default() -> Self {
        Self {
            loot_range: 12.0,
            craft_recipe: "bread".to_string(),
            craft_input: "wheat".to_string(),
            craft_input_count: 3,
            workstation: "crafting_table".to_string(),
            work_range: 16.0,
            crop: "wheat".to_string(),
            seed: "wheat_seeds".to_string(),
        }
    }
}

/// [policy] 段：启动时的行为策略
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    /// 运行模式：autonomous / task / passive
    pub mode: String,
    /// 睡眠指令：auto / force / deny
    pub sleep: String,
    /// 是否允许改造环境（放置 / 回收临时床铺）
    pub terraform: bool,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            mode: "autonomous".to_string(),
            sleep: "auto".to_string(),
            terraform: true,
        }
    }
}

/// [commands] 段：聊天指令授权
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CommandsSection {
    /// 允许下达指令的发送者；未设置时接受所有人
    pub owner: Option<String>,
}

/// [status] 段：HTTP 状态端点
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusSection {
    pub bind: String,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            reconnect: ReconnectSection::default(),
            brain: BrainSection::default(),
            policy: PolicySection::default(),
            commands: CommandsSection::default(),
            status: StatusSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 NOMAD__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NOMAD__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NOMAD")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
