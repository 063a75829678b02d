//! 空闲层（Tier 3）
//!
//! 单次均匀抽样对照累积概率带：r < shuffle_band 整理背包，
//! r < pause_band 发呆，余量游走（默认行为）。带不重叠，整体和为 1。

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::brain::{TickContext, TickOutcome};
use crate::config::{BrainSection, IdleSection};
use crate::core::error::ActionError;
use crate::world::{Goal, Interaction, WorldSession};

/// 整理背包时低头的时长，到时恢复视角
const SHUFFLE_LOOK_RESET: Duration = Duration::from_millis(1500);

/// 空闲行为选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleChoice {
    Shuffle,
    Pause,
    Wander,
}

/// 累积概率带判定（纯函数，便于分布测试）
pub fn choose(r: f64, bands: &IdleSection) -> IdleChoice {
    if r < bands.shuffle_band {
        IdleChoice::Shuffle
    } else if r < bands.pause_band {
        IdleChoice::Pause
    } else {
        IdleChoice::Wander
    }
}

pub async fn run(
    session: &Arc<dyn WorldSession>,
    ctx: &TickContext,
    cfg: &BrainSection,
    rng: &mut StdRng,
    cancel: &CancellationToken,
) -> Result<TickOutcome, ActionError> {
    let r = rng.gen::<f64>();
    match choose(r, &cfg.idle) {
        IdleChoice::Shuffle => {
            // 低头翻背包，随后用瞬态定时器恢复视角；定时器随调度器一起取消
            session.look(ctx.yaw, -1.5).await;
            if ctx.inventory.items.len() >= 2 {
                let pick = rng.gen_range(0..ctx.inventory.items.len());
                let from = ctx.inventory.items[pick].slot;
                let to = rng.gen_range(0..36u16);
                session
                    .interact(Interaction::SwapSlots { from, to })
                    .await?;
            }
            let sess = Arc::clone(session);
            let yaw = ctx.yaw;
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(SHUFFLE_LOOK_RESET) => {
                        sess.look(yaw, 0.0).await;
                    }
                }
            });
            Ok(TickOutcome::Handled)
        }
        IdleChoice::Pause => Ok(TickOutcome::Handled),
        IdleChoice::Wander => {
            let radius = rng.gen_range(cfg.idle.wander_min..cfg.idle.wander_max.max(cfg.idle.wander_min + 1.0));
            let dx = (rng.gen::<f64>() - 0.5) * radius;
            let dz = (rng.gen::<f64>() - 0.5) * radius;
            let pos = ctx.position.offset(dx, 0.0, dz);
            session
                .interact(Interaction::SetSprint {
                    on: rng.gen::<f64>() < 0.6,
                })
                .await?;
            if rng.gen::<f64>() < 0.3 {
                session.interact(Interaction::Jump).await?;
            }
            session.set_goal(Goal::Near { pos, range: 1.0 }).await?;
            Ok(TickOutcome::Handled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_bands_are_cumulative() {
        let bands = IdleSection::default();
        assert_eq!(choose(0.0, &bands), IdleChoice::Shuffle);
        assert_eq!(choose(0.049, &bands), IdleChoice::Shuffle);
        assert_eq!(choose(0.05, &bands), IdleChoice::Pause);
        assert_eq!(choose(0.149, &bands), IdleChoice::Pause);
        assert_eq!(choose(0.15, &bands), IdleChoice::Wander);
        assert_eq!(choose(0.999, &bands), IdleChoice::Wander);
    }

    #[test]
    fn test_band_distribution() {
        let bands = IdleSection::default();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 100_000usize;
        let mut counts = [0usize; 3];
        for _ in 0..n {
            match choose(rng.gen::<f64>(), &bands) {
                IdleChoice::Shuffle => counts[0] += 1,
                IdleChoice::Pause => counts[1] += 1,
                IdleChoice::Wander => counts[2] += 1,
            }
        }
        let shuffle = counts[0] as f64 / n as f64;
        let pause = counts[1] as f64 / n as f64;
        let wander = counts[2] as f64 / n as f64;
        // 统计容差 ±0.01
        assert!((shuffle - 0.05).abs() < 0.01, "shuffle = {shuffle}");
        assert!((pause - 0.10).abs() < 0.01, "pause = {pause}");
        assert!((wander - 0.85).abs() < 0.01, "wander = {wander}");
    }
}
