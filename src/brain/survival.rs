//! 生存层（Tier 0）
//!
//! 顺序固定：先进食，再回收清晨残留的自置床，最后按休息条件执行
//! 「找床 / 置床 / 赶路 / 入睡」流程。任何一步出手即消费本轮。

use crate::brain::{TickContext, TickOutcome};
use crate::config::BrainSection;
use crate::core::error::ActionError;
use crate::core::policy::{PolicyState, SleepDirective};
use crate::world::{BlockFilter, BlockPos, Goal, Interaction, Weather, WorldClock, WorldSession};

/// 跨 tick 的生存层记账：自己放置的床（醒来后要收回）
#[derive(Debug, Default)]
pub struct SurvivalState {
    pub placed_bed: Option<BlockPos>,
}

/// 休息条件判定：指令优先，Auto 按昼夜与天气
pub fn rest_eligible(policy: &PolicyState, clock: &WorldClock, cfg: &BrainSection) -> bool {
    match policy.sleep {
        SleepDirective::Deny => false,
        SleepDirective::Force => true,
        SleepDirective::Auto => {
            !clock.is_day || (clock.weather == Weather::Thunder && cfg.rest.sleep_in_storm)
        }
    }
}

pub async fn run(
    session: &dyn WorldSession,
    policy: &PolicyState,
    ctx: &TickContext,
    cfg: &BrainSection,
    state: &mut SurvivalState,
) -> Result<TickOutcome, ActionError> {
    // 进食
    if ctx.vitals.hunger < cfg.eat_threshold {
        if let Some(food) = ctx.inventory.first_food() {
            session
                .interact(Interaction::Eat {
                    item: food.name.clone(),
                })
                .await?;
            return Ok(TickOutcome::Handled);
        }
    }

    // 清晨回收自置床
    if ctx.clock.is_day {
        if let Some(bed) = state.placed_bed.take() {
            if let Err(e) = reclaim_bed(session, bed).await {
                // 失败则下轮再试
                state.placed_bed = Some(bed);
                return Err(e);
            }
            let _ = session.send_chat("Morning!").await;
            return Ok(TickOutcome::Handled);
        }
    }

    // 入睡
    if !rest_eligible(policy, &ctx.clock, cfg) {
        return Ok(TickOutcome::Pass);
    }

    let bed = match session
        .find_block(
            BlockFilter::NameContains("bed".into()),
            cfg.rest.bed_range,
        )
        .await
    {
        Some(b) => Some(b.pos),
        None => try_place_bed(session, policy, ctx, state).await?,
    };
    let Some(bed) = bed else {
        return Ok(TickOutcome::Pass);
    };

    session.travel_to(Goal::Block(bed)).await?;
    session.interact(Interaction::Sleep { bed }).await?;
    let _ = session.send_chat("Goodnight!").await;
    Ok(TickOutcome::Handled)
}

async fn reclaim_bed(session: &dyn WorldSession, bed: BlockPos) -> Result<(), ActionError> {
    session.travel_to(Goal::Block(bed)).await?;
    session.interact(Interaction::DigBlock { at: bed }).await
}

/// 库存有床且策略允许改造环境时就地放床；返回床位
async fn try_place_bed(
    session: &dyn WorldSession,
    policy: &PolicyState,
    ctx: &TickContext,
    state: &mut SurvivalState,
) -> Result<Option<BlockPos>, ActionError> {
    if !policy.movement_profile().can_dig {
        return Ok(None);
    }
    let Some(bed_item) = ctx.inventory.first_matching("bed") else {
        return Ok(None);
    };
    let Some(spot) = session.find_block(BlockFilter::BedSpot, 5.0).await else {
        return Ok(None);
    };

    let at = BlockPos::new(spot.pos.x, spot.pos.y + 1, spot.pos.z);
    let item = bed_item.name.clone();
    session
        .interact(Interaction::Equip { item: item.clone() })
        .await?;
    session
        .interact(Interaction::PlaceBlock { item, at })
        .await?;
    state.placed_bed = Some(at);
    Ok(Some(at))
}
