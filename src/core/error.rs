//! 错误类型与断线原因分类
//!
//! 三类边界各自独立：传输层错误（Transport）最终折算为 DisconnectReason 走重连；
//! 动作层错误（ActionError）在 tick 边界被吞掉，绝不上抛到会话监管；
//! 指令层错误（CommandError）静默丢弃。

use thiserror::Error;

/// 传输层错误：来自世界后端的底层连接
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection refused")]
    Refused,

    #[error("io error: {0}")]
    Io(String),

    /// 断线拆连期间的半包读取，属于无害噪声，不应触发第二次重连
    #[error("partial read during teardown")]
    PartialRead,
}

/// 建立会话失败（连 Session 都没能构造出来）
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

/// 动作层可恢复错误：在动作边界捕获，当前 tick 提前结束，同一 tick 内不重试
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("goal unreachable")]
    Unreachable,

    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("interaction rejected: {0}")]
    Rejected(String),

    /// 动作挂起期间会话已终结；结果被丢弃，由会话监管走正常重连
    #[error("session ended")]
    SessionEnded,
}

/// 聊天指令解析错误：未知指令与坏参数都是无操作
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("bad argument for {command}: {arg}")]
    BadArgument { command: String, arg: String },
}

/// 断线原因：重连策略据此给出延迟
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// 被服务端踢出
    Kicked,
    /// 重复登录被踢，需要更长的等待让旧会话在服务端超时
    Duplicate,
    /// 一般网络错误
    NetworkError,
    /// 连接被拒绝
    ConnectionRefused,
    /// 正常 / 非正常关闭，无显式踢出
    Ended,
    /// 连会话都没能创建
    CreateError,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kicked => "kicked",
            Self::Duplicate => "duplicate",
            Self::NetworkError => "error",
            Self::ConnectionRefused => "connection_refused",
            Self::Ended => "end",
            Self::CreateError => "create_error",
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 踢出载荷分类：重复登录有专属原因
pub fn classify_kick(payload: &str) -> DisconnectReason {
    if payload.contains("duplicate_login") {
        DisconnectReason::Duplicate
    } else {
        DisconnectReason::Kicked
    }
}

impl TransportError {
    /// 折算为断线原因；返回 None 表示无害噪声（记日志后忽略）
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        match self {
            Self::Refused => Some(DisconnectReason::ConnectionRefused),
            Self::Io(_) => Some(DisconnectReason::NetworkError),
            Self::PartialRead => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_kick_duplicate() {
        let r = classify_kick(r#"{"reason":"duplicate_login"}"#);
        assert_eq!(r, DisconnectReason::Duplicate);
    }

    #[test]
    fn test_classify_kick_other() {
        assert_eq!(classify_kick("You are banned"), DisconnectReason::Kicked);
        assert_eq!(classify_kick(""), DisconnectReason::Kicked);
    }

    #[test]
    fn test_partial_read_is_benign() {
        assert_eq!(TransportError::PartialRead.disconnect_reason(), None);
    }

    #[test]
    fn test_transport_classification() {
        assert_eq!(
            TransportError::Refused.disconnect_reason(),
            Some(DisconnectReason::ConnectionRefused)
        );
        assert_eq!(
            TransportError::Io("reset by peer".into()).disconnect_reason(),
            Some(DisconnectReason::NetworkError)
        );
    }
}
