//! 会话监管：生命周期状态机、重连调度与指令分发
//!
//! 单任务消费指令邮箱（定时器、会话事件、强制重连都走同一条队列），
//! 回调之间的顺序因此是确定的。会话由监管方独占持有，重连时
//! 「先摘监听、再置空、后排程」：epoch 递增后，死会话的迟到事件一律丢弃，
//! 不可能影响新会话。
//!
//! 状态机：Idle -> Starting -> Active -> Backoff(delay) -> Starting -> ...
//! 无终态，进程常驻。Starting 有重入保护：重复 start() 是静默无操作。

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::brain::Brain;
use crate::command::{self, ChatCommand};
use crate::config::AppConfig;
use crate::core::error::{classify_kick, DisconnectReason};
use crate::core::policy::{Feature, PolicyHandle, PolicyState};
use crate::core::reconnect::ReconnectPolicy;
use crate::core::state::{LinkPhase, StatusSnapshot};
use crate::world::{
    AuthMode, Credentials, ServerTarget, SessionEvent, WorldConnector, WorldSession,
};

/// 投递给监管任务的指令
#[derive(Debug)]
pub enum Directive {
    /// 立即尝试建立会话（重连定时器到点后也走这里）
    Start,
    /// 会话事件，带产生它的会话 epoch
    SessionEvent { epoch: u64, event: SessionEvent },
    /// 状态端点触发的强制重连
    ForceReconnect,
}

/// 会话监管器：独占持有会话、重连策略与调度器的生杀大权
pub struct Supervisor {
    connector: Arc<dyn WorldConnector>,
    cfg: AppConfig,
    target: ServerTarget,
    credentials: Credentials,
    policy: PolicyHandle,
    reconnect_policy: ReconnectPolicy,
    status_tx: watch::Sender<StatusSnapshot>,
    tx: mpsc::UnboundedSender<Directive>,
    rx: mpsc::UnboundedReceiver<Directive>,
    started: Instant,

    /// 当前会话的 epoch；detach 时递增，旧事件据此识别
    epoch: u64,
    phase: LinkPhase,
    /// Starting 重入保护
    starting: bool,
    /// 已有一个重连定时器在途
    reconnect_pending: bool,
    session: Option<Arc<dyn WorldSession>>,
    session_id: Option<String>,
    pump: Option<JoinHandle<()>>,
    brain_cancel: Option<CancellationToken>,
    brain_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    connected_since: Option<DateTime<Utc>>,
    last_disconnect: Option<DisconnectReason>,
}

impl Supervisor {
    /// 返回监管器本体、指令投递端与状态快照读端
    pub fn new(
        connector: Arc<dyn WorldConnector>,
        cfg: AppConfig,
        policy: PolicyHandle,
    ) -> (
        Self,
        mpsc::UnboundedSender<Directive>,
        watch::Receiver<StatusSnapshot>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = StatusSnapshot::project(LinkPhase::Idle, &policy.read(), None, None, None);
        let (status_tx, status_rx) = watch::channel(initial);

        let target = ServerTarget {
            host: cfg.server.host.clone(),
            port: cfg.server.port,
            version: cfg.server.version.clone(),
        };
        let credentials = Credentials {
            username: cfg.server.username.clone(),
            auth: AuthMode::parse(&cfg.server.auth),
        };
        let reconnect_policy = ReconnectPolicy::new(&cfg.reconnect);

        let supervisor = Self {
            connector,
            cfg,
            target,
            credentials,
            policy,
            reconnect_policy,
            status_tx,
            tx: tx.clone(),
            rx,
            started: Instant::now(),
            epoch: 0,
            phase: LinkPhase::Idle,
            starting: false,
            reconnect_pending: false,
            session: None,
            session_id: None,
            pump: None,
            brain_cancel: None,
            brain_task: None,
            reconnect_timer: None,
            connected_since: None,
            last_disconnect: None,
        };
        (supervisor, tx, status_rx)
    }

    /// 主循环：发出首个 Start，此后消费邮箱直到收到关闭信号
    pub async fn run(mut self, shutdown: CancellationToken) {
        let _ = self.tx.send(Directive::Start);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.teardown().await;
                    break;
                }
                directive = self.rx.recv() => match directive {
                    Some(d) => self.handle(d).await,
                    None => break,
                },
            }
        }
    }

    /// 处理单条指令（测试直接驱动这里）
    pub async fn handle(&mut self, directive: Directive) {
        match directive {
            Directive::Start => self.handle_start().await,
            Directive::SessionEvent { epoch, event } => self.handle_event(epoch, event).await,
            Directive::ForceReconnect => self.handle_force_reconnect().await,
        }
    }

    async fn handle_start(&mut self) {
        if self.starting {
            tracing::debug!("start already in progress, ignoring");
            return;
        }
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.reconnect_pending = false;
        self.starting = true;
        self.phase = LinkPhase::Starting;
        self.publish_status();

        tracing::info!(host = %self.target.host, port = self.target.port, "connecting");
        match self.connector.connect(&self.target, &self.credentials).await {
            Ok(handle) => {
                let epoch = self.epoch;
                self.session = Some(Arc::clone(&handle.session));
                self.session_id = Some(format!("session_{}", uuid::Uuid::new_v4()));

                let tx = self.tx.clone();
                let mut events = handle.events;
                self.pump = Some(tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        if tx.send(Directive::SessionEvent { epoch, event }).is_err() {
                            break;
                        }
                    }
                }));
            }
            Err(e) => {
                tracing::warn!(error = %e, "session create failed");
                self.reconnect(DisconnectReason::CreateError).await;
            }
        }
    }

    async fn handle_event(&mut self, epoch: u64, event: SessionEvent) {
        if epoch != self.epoch {
            tracing::trace!(epoch, current = self.epoch, "stale session event dropped");
            return;
        }
        match event {
            SessionEvent::Ready => self.handle_ready().await,
            SessionEvent::Chat { sender, text } => self.handle_chat(&sender, &text).await,
            SessionEvent::Kicked { reason } => {
                let classified = classify_kick(&reason);
                tracing::warn!(%reason, %classified, "kicked from server");
                self.reconnect(classified).await;
            }
            SessionEvent::Errored { error } => match error.disconnect_reason() {
                Some(classified) => {
                    tracing::warn!(%error, %classified, "session error");
                    self.reconnect(classified).await;
                }
                None => {
                    tracing::warn!(%error, "benign decode error during teardown, ignoring");
                }
            },
            SessionEvent::Ended => {
                tracing::info!("session ended");
                self.reconnect(DisconnectReason::Ended).await;
            }
        }
    }

    async fn handle_ready(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.starting = false;
        self.phase = LinkPhase::Active;
        self.connected_since = Some(Utc::now());
        self.reconnect_policy.reset();
        tracing::info!("session ready");

        // 一次性入场设置：按当前策略推送移动能力
        session
            .set_movement_profile(self.policy.read().movement_profile())
            .await;

        let cancel = CancellationToken::new();
        let brain = Brain::new(
            session,
            self.policy.subscribe(),
            self.cfg.brain.clone(),
            cancel.clone(),
        );
        self.brain_cancel = Some(cancel);
        self.brain_task = Some(tokio::spawn(brain.run()));
        self.publish_status();
    }

    async fn handle_force_reconnect(&mut self) {
        tracing::info!("forced reconnect requested");
        if let Some(session) = self.session.clone() {
            // 在线会话：主动断开，走正常 Ended 路径
            session.disconnect().await;
        } else if !self.starting {
            if let Some(timer) = self.reconnect_timer.take() {
                timer.abort();
            }
            self.reconnect_pending = false;
            self.handle_start().await;
        }
    }

    /// 幂等的重连入口：无论是否有在线会话都可安全调用
    ///
    /// 顺序是约定的一部分：停调度器、清 Starting、摘会话（epoch 递增），
    /// 之后才排程下一次 Start；已有定时器在途时绝不再排第二个。
    async fn reconnect(&mut self, reason: DisconnectReason) {
        self.stop_brain();
        self.starting = false;
        self.detach_session();
        self.last_disconnect = Some(reason);

        if self.reconnect_pending {
            tracing::debug!(%reason, "reconnect already scheduled, ignoring");
            self.publish_status();
            return;
        }

        let delay = self.reconnect_policy.delay_for(reason);
        tracing::info!(%reason, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        self.phase = LinkPhase::Backoff;
        self.reconnect_pending = true;
        let tx = self.tx.clone();
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Directive::Start);
        }));
        self.publish_status();
    }

    /// 先摘监听再置空：epoch 递增后，死会话的迟到事件全部失效
    fn detach_session(&mut self) {
        if self.session.is_none() && self.pump.is_none() {
            return;
        }
        self.epoch += 1;
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.session = None;
        self.session_id = None;
        self.connected_since = None;
    }

    /// 取消令牌同时作废主节拍、视线节拍与进行中的一轮
    fn stop_brain(&mut self) {
        if let Some(cancel) = self.brain_cancel.take() {
            cancel.cancel();
        }
        self.brain_task = None;
    }

    async fn handle_chat(&mut self, sender: &str, text: &str) {
        if !command::authorized(self.cfg.commands.owner.as_deref(), sender) {
            tracing::debug!(sender, "unauthorized command sender, dropping");
            return;
        }
        let cmd = match command::parse(text) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring chat message");
                return;
            }
        };
        match cmd {
            ChatCommand::SetMode(mode) => {
                let state = self.policy.update(|p| p.mode = mode);
                self.push_movement_profile(state).await;
                self.ack(&format!("mode set to {}", mode.as_str())).await;
                self.publish_status();
            }
            ChatCommand::SetSleep(directive) => {
                self.policy.update(|p| p.sleep = directive);
                self.ack(&format!("sleep policy: {}", directive.as_str()))
                    .await;
            }
            ChatCommand::Toggle {
                feature: Feature::Terraform,
                on,
            } => {
                // 单次写入即完成权限变更：立即推送移动能力，不等下一个 tick
                let state = self.policy.update(|p| p.terraform = on);
                self.push_movement_profile(state).await;
                self.ack(&format!("terraform {}", if on { "on" } else { "off" }))
                    .await;
            }
            ChatCommand::Status => {
                let line = format!(
                    "phase={} mode={} uptime={}s",
                    self.phase.as_str(),
                    self.policy.read().mode.as_str(),
                    self.started.elapsed().as_secs()
                );
                self.ack(&line).await;
            }
        }
    }

    async fn push_movement_profile(&self, state: PolicyState) {
        if let Some(session) = self.session.clone() {
            session.set_movement_profile(state.movement_profile()).await;
        }
    }

    async fn ack(&self, text: &str) {
        if let Some(session) = self.session.clone() {
            let _ = session.send_chat(text).await;
        }
    }

    fn publish_status(&mut self) {
        let snapshot = StatusSnapshot::project(
            self.phase,
            &self.policy.read(),
            self.connected_since,
            self.last_disconnect.map(|r| r.as_str().to_string()),
            self.session_id.clone(),
        );
        let _ = self.status_tx.send(snapshot);
    }

    async fn teardown(&mut self) {
        tracing::info!("supervisor shutting down");
        self.stop_brain();
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.reconnect_pending = false;
        if let Some(session) = self.session.clone() {
            session.disconnect().await;
        }
        self.detach_session();
        self.phase = LinkPhase::Idle;
        self.publish_status();
    }
}
