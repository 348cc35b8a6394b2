use std::fmt::Write;

use chrono::Utc;

use super::parse_id;
use crate::discord::respond;
use crate::discord::Context;
use crate::error::Error;
use crate::framework::raid::display;
use crate::framework::RaidDraft;

/// Plan and manage raids.
#[poise::command(
    slash_command,
    subcommands("create", "list", "show", "delete", "archive", "reset_attendance")
)]
pub(crate) async fn raid(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Create a raid in this channel. Date and time are in your own time zone.
#[poise::command(slash_command)]
async fn create(
    ctx: Context<'_>,
    #[description = "Raid name"] name: String,
    #[description = "Date as yyyy-MM-dd"] date: String,
    #[description = "Start time as HH:mm"] time: String,
    #[description = "Where to meet"] location: String,
    #[description = "What the raid is about"] description: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| Error::InvalidInput("Raids can only be created in a server".into()))?;

    let draft = RaidDraft {
        name,
        description: description.unwrap_or_default(),
        date,
        time,
        location,
        guild_id: guild_id.0,
        channel_id: ctx.channel_id().0,
    };

    let author = ctx.author();
    let raid = ctx
        .data()
        .services
        .plan_raid(author.id.0, &author.name, draft, Utc::now())
        .await?;

    respond(
        ctx,
        format!(
            "Created raid **{}** for <t:{}:F> (ID: {})",
            raid.name,
            raid.scheduled.timestamp(),
            raid.id
        ),
    )
    .await
}

/// List this server's upcoming raids.
#[poise::command(slash_command)]
async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or_else(|| Error::InvalidInput("Raids are listed per server".into()))?;

    let raids = ctx.data().services.raids.list_upcoming(guild_id.0).await?;

    if raids.is_empty() {
        return respond(ctx, "No upcoming raids".to_owned()).await;
    }

    let mut output = String::from("## Upcoming raids\n");
    for raid in raids {
        writeln!(
            output,
            "**{}** <t:{}:F> @ {} (ID: {})",
            raid.name,
            raid.scheduled.timestamp(),
            raid.location,
            raid.id
        )?;
    }

    respond(ctx, output).await
}

/// Show a raid with its attendance and lineup.
#[poise::command(slash_command)]
async fn show(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;
    let details = ctx.data().services.raids.get(raid_id).await?;
    let content = display(&details);

    let mut output = String::new();
    writeln!(output, "## {}", content.title)?;
    if !content.description.is_empty() {
        writeln!(output, "{}", content.description)?;
    }
    for field in &content.fields {
        writeln!(output, "**{}**\n{}", field.name, field.value)?;
    }
    if let Some(footer) = &content.footer {
        write!(output, "{}", footer)?;
    }

    respond(ctx, output).await
}

/// Delete a raid together with its attendance and lineup.
#[poise::command(slash_command, required_permissions = "MANAGE_MESSAGES")]
async fn delete(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;
    let raid = ctx.data().services.raids.delete(raid_id).await?;

    respond(ctx, format!("Deleted raid **{}**", raid.name)).await
}

/// Archive a raid. Archived raids get no reminders and cannot be reopened.
#[poise::command(slash_command, required_permissions = "MANAGE_MESSAGES")]
async fn archive(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;
    let raid = ctx.data().services.raids.archive(raid_id).await?;

    respond(ctx, format!("Archived raid **{}**", raid.name)).await
}

/// Clear every RSVP for a raid. The lineup is kept.
#[poise::command(
    slash_command,
    rename = "reset-attendance",
    required_permissions = "MANAGE_MESSAGES"
)]
async fn reset_attendance(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;
    let services = &ctx.data().services;
    let raid = services.raids.find(raid_id).await?;

    let rows = services.attendance.delete_all_for_raid(raid_id).await?;

    respond(ctx, format!("Cleared {} response(s) for **{}**", rows, raid.name)).await
}
