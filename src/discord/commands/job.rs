use poise::serenity_prelude as serenity;

use super::parse_id;
use crate::discord::respond;
use crate::discord::Context;
use crate::error::Error;
use crate::framework::composition::Job;

/// Assign jobs for a raid.
#[poise::command(slash_command, subcommands("assign", "remove", "remove_member"))]
pub(crate) async fn job(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Bring one of your characters to a raid on a job. Confirms your attendance.
#[poise::command(slash_command)]
async fn assign(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
    #[description = "Character ID from /character list"] character_id: String,
    #[description = "Job to play, e.g. PLD"] job: String,
    #[description = "Sub-role, e.g. main tank"] sub_role: Option<String>,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;
    let character_id = parse_id("character", &character_id)?;
    let job: Job = job.parse()?;

    let assignment = ctx
        .data()
        .services
        .composition
        .assign_role(raid_id, ctx.author().id.0, character_id, job, sub_role)
        .await?;

    let role = assignment.job.role().map_or_else(|| "?".to_string(), |r| r.to_string());

    respond(ctx, format!("Assigned as {} ({})", assignment.job, role)).await
}

/// Take one of your characters out of a raid's lineup.
#[poise::command(slash_command)]
async fn remove(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
    #[description = "Character ID from /character list"] character_id: String,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;
    let character_id = parse_id("character", &character_id)?;
    let services = &ctx.data().services;
    let user_id = ctx.author().id.0;

    let character = services.characters.get_owned(character_id, user_id).await?;
    let removed = services
        .composition
        .remove_character(raid_id, user_id, character.id)
        .await?;

    let output = if removed {
        format!("Removed {} from the lineup", character.name)
    } else {
        format!("{} is not in this raid's lineup", character.name)
    };

    respond(ctx, output).await
}

/// Remove a member from a raid's lineup.
#[poise::command(
    slash_command,
    rename = "remove-member",
    required_permissions = "MANAGE_MESSAGES"
)]
async fn remove_member(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
    #[description = "Member to remove"] member: serenity::User,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;

    let removed = ctx
        .data()
        .services
        .composition
        .remove_assignment(raid_id, member.id.0)
        .await?;

    let output = if removed {
        format!("Removed {} from the lineup", member.name)
    } else {
        format!("{} has no job in this raid", member.name)
    };

    respond(ctx, output).await
}
