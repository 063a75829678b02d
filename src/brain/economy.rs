//! 生产层（Tier 2）
//!
//! 层内顺序：先拾取附近掉落物，再在原料充足且工作台可达时合成，
//! 否则对成熟作物做一轮收割补种。

use crate::brain::{TickContext, TickOutcome};
use crate::config::BrainSection;
use crate::core::error::ActionError;
use crate::core::policy::PolicyState;
use crate::world::{BlockFilter, EntityFilter, Goal, Interaction, WorldSession};

pub async fn run(
    session: &dyn WorldSession,
    policy: &PolicyState,
    ctx: &TickContext,
    cfg: &BrainSection,
) -> Result<TickOutcome, ActionError> {
    if !policy.mode.allows_tasks() {
        return Ok(TickOutcome::Pass);
    }
    let eco = &cfg.economy;

    // 拾取掉落物
    if let Some(drop) = session
        .nearest_entity(EntityFilter::DroppedItemWithin(eco.loot_range))
        .await
    {
        session
            .travel_to(Goal::Near {
                pos: drop.position,
                range: 1.0,
            })
            .await?;
        session
            .interact(Interaction::Collect { target: drop.id })
            .await?;
        return Ok(TickOutcome::Handled);
    }

    // 合成
    if ctx.inventory.count_of(&eco.craft_input) >= eco.craft_input_count {
        if let Some(station) = session
            .find_block(
                BlockFilter::NameContains(eco.workstation.clone()),
                eco.work_range,
            )
            .await
        {
            session.travel_to(Goal::Block(station.pos)).await?;
            session
                .interact(Interaction::Craft {
                    recipe: eco.craft_recipe.clone(),
                    station: Some(station.pos),
                })
                .await?;
            return Ok(TickOutcome::Handled);
        }
    }

    // 收割补种
    if let Some(crop) = session
        .find_block(BlockFilter::MatureCrop(eco.crop.clone()), eco.work_range)
        .await
    {
        session.travel_to(Goal::Block(crop.pos)).await?;
        session
            .interact(Interaction::Harvest { at: crop.pos })
            .await?;
        session
            .interact(Interaction::Plant {
                item: eco.seed.clone(),
                at: crop.pos,
            })
            .await?;
        return Ok(TickOutcome::Handled);
    }

    Ok(TickOutcome::Pass)
}
