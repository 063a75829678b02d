//! 聊天指令面：解析与授权
//!
//! 纯文本指令映射为策略写入：`mode <名称>`、`sleep <auto|force|deny>`、
//! `toggle <功能> <on|off>`、`status`。配置了允许发送者时，其他人的消息
//! 静默丢弃；未知指令同样是无操作。

use crate::core::error::CommandError;
use crate::core::policy::{Feature, OperatingMode, SleepDirective};

/// 解析后的指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    SetMode(OperatingMode),
    SetSleep(SleepDirective),
    Toggle { feature: Feature, on: bool },
    Status,
}

/// 发送者是否有权下达指令；owner 未配置时放行所有人
pub fn authorized(owner: Option<&str>, sender: &str) -> bool {
    match owner {
        Some(owner) => owner == sender,
        None => true,
    }
}

/// 解析一条聊天文本
pub fn parse(text: &str) -> Result<ChatCommand, CommandError> {
    let mut words = text.split_whitespace();
    let head = words.next().unwrap_or("");
    match head.to_ascii_lowercase().as_str() {
        "mode" => {
            let arg = words.next().unwrap_or("");
            OperatingMode::parse(arg)
                .map(ChatCommand::SetMode)
                .ok_or_else(|| CommandError::BadArgument {
                    command: "mode".into(),
                    arg: arg.into(),
                })
        }
        "sleep" => {
            let arg = words.next().unwrap_or("");
            SleepDirective::parse(arg)
                .map(ChatCommand::SetSleep)
                .ok_or_else(|| CommandError::BadArgument {
                    command: "sleep".into(),
                    arg: arg.into(),
                })
        }
        "toggle" => {
            let feature = words.next().unwrap_or("");
            let state = words.next().unwrap_or("");
            let feature = Feature::parse(feature).ok_or_else(|| CommandError::BadArgument {
                command: "toggle".into(),
                arg: feature.into(),
            })?;
            let on = match state.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => true,
                "off" | "false" | "0" => false,
                other => {
                    return Err(CommandError::BadArgument {
                        command: "toggle".into(),
                        arg: other.into(),
                    })
                }
            };
            Ok(ChatCommand::Toggle { feature, on })
        }
        "status" => Ok(ChatCommand::Status),
        other => Err(CommandError::Unknown(other.into())),
    }
}
