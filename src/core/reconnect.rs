//! 重连延迟策略
//!
//! 将断线原因映射为具体延迟：一般原因走指数退避（base * multiplier，封顶 cap），
//! 重复登录使用固定长延迟，可选抖动避免整点齐射。成功上线后由监管方调用 reset。

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectSection;
use crate::core::error::DisconnectReason;

/// 原因 -> 延迟的策略引擎；除连续失败间携带的「当前延迟」外无状态
#[derive(Debug)]
pub struct ReconnectPolicy {
    base: Duration,
    multiplier: f64,
    cap: Duration,
    jitter: f64,
    duplicate: Duration,
    /// 连续失败间滚动的当前延迟
    current: Duration,
}

impl ReconnectPolicy {
    pub fn new(cfg: &ReconnectSection) -> Self {
        let base = Duration::from_secs(cfg.base_secs);
        Self {
            base,
            multiplier: cfg.multiplier.max(1.0),
            cap: Duration::from_secs(cfg.cap_secs.max(cfg.base_secs)),
            jitter: cfg.jitter.clamp(0.0, 1.0),
            duplicate: Duration::from_secs(cfg.duplicate_secs),
            current: base,
        }
    }

    /// 下一次重连应等待的时间
    ///
    /// Duplicate 不参与退避滚动：旧会话在服务端超时所需的时间与失败次数无关。
    pub fn delay_for(&mut self, reason: DisconnectReason) -> Duration {
        let raw = match reason {
            DisconnectReason::Duplicate => self.duplicate,
            _ => {
                let d = self.current;
                self.current = self.cap.min(d.mul_f64(self.multiplier));
                d
            }
        };
        self.with_jitter(raw)
    }

    /// 会话到达就绪后重置退避
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    fn with_jitter(&self, d: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return d;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(0.0..self.jitter);
        d.mul_f64(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: f64) -> ReconnectPolicy {
        ReconnectPolicy::new(&ReconnectSection {
            base_secs: 10,
            multiplier: 1.5,
            cap_secs: 120,
            jitter,
            duplicate_secs: 60,
        })
    }

    #[test]
    fn test_duplicate_longer_than_default() {
        let mut p = policy(0.0);
        let err = p.delay_for(DisconnectReason::NetworkError);
        p.reset();
        let end = p.delay_for(DisconnectReason::Ended);
        p.reset();
        let dup = p.delay_for(DisconnectReason::Duplicate);
        assert!(dup > err);
        assert!(dup > end);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let mut p = policy(0.0);
        let d1 = p.delay_for(DisconnectReason::NetworkError);
        let d2 = p.delay_for(DisconnectReason::NetworkError);
        let d3 = p.delay_for(DisconnectReason::NetworkError);
        assert_eq!(d1, Duration::from_secs(10));
        assert_eq!(d2, Duration::from_secs(15));
        assert!(d3 > d2);

        for _ in 0..20 {
            p.delay_for(DisconnectReason::NetworkError);
        }
        let capped = p.delay_for(DisconnectReason::NetworkError);
        assert!(capped <= Duration::from_secs(120));
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut p = policy(0.0);
        p.delay_for(DisconnectReason::NetworkError);
        p.delay_for(DisconnectReason::NetworkError);
        p.reset();
        assert_eq!(
            p.delay_for(DisconnectReason::Ended),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_duplicate_does_not_advance_backoff() {
        let mut p = policy(0.0);
        p.delay_for(DisconnectReason::Duplicate);
        assert_eq!(
            p.delay_for(DisconnectReason::NetworkError),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_jitter_bounds() {
        let mut p = policy(0.5);
        for _ in 0..100 {
            p.reset();
            let d = p.delay_for(DisconnectReason::Ended);
            assert!(d >= Duration::from_secs(10));
            assert!(d <= Duration::from_secs(15));
        }
    }

    #[test]
    fn test_create_error_is_retried() {
        let mut p = policy(0.0);
        assert_eq!(
            p.delay_for(DisconnectReason::CreateError),
            Duration::from_secs(10)
        );
    }
}
