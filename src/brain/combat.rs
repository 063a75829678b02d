//! 威胁响应层（Tier 1）
//!
//! 层内顺序固定：先武装，再按距离选近战或追击。近战出手前起跳，
//! 下落瞬间命中吃额外伤害；追击时按距离切换盾牌姿态。

use crate::brain::{TickContext, TickOutcome};
use crate::config::BrainSection;
use crate::core::error::ActionError;
use crate::core::policy::PolicyState;
use crate::world::{Goal, Interaction, WorldSession};

pub async fn run(
    session: &dyn WorldSession,
    policy: &PolicyState,
    ctx: &TickContext,
    cfg: &BrainSection,
) -> Result<TickOutcome, ActionError> {
    if !policy.mode.allows_combat() {
        return Ok(TickOutcome::Pass);
    }
    let Some(hostile) = &ctx.nearest_hostile else {
        return Ok(TickOutcome::Pass);
    };
    let dist = ctx.position.distance_to(&hostile.position);
    if dist > cfg.hostile_range {
        return Ok(TickOutcome::Pass);
    }

    // 先武装
    if let Some(weapon) = ctx.inventory.best_weapon() {
        session
            .interact(Interaction::Equip {
                item: weapon.name.clone(),
            })
            .await?;
    }

    if dist <= cfg.melee_range {
        session.interact(Interaction::Jump).await?;
        session
            .interact(Interaction::Attack { target: hostile.id })
            .await?;
    } else {
        session.set_goal(Goal::Entity(hostile.id)).await?;
        session
            .interact(Interaction::SetShield {
                raised: dist < cfg.hostile_range / 2.0,
            })
            .await?;
    }
    Ok(TickOutcome::Handled)
}
