use std::fmt::Write;

use crate::discord::respond;
use crate::discord::Context;
use crate::error::Error;
use crate::framework::timezone::list_zone_ids;

/// Personal settings.
#[poise::command(slash_command, subcommands("show", "timezone", "timezone_list"))]
pub(crate) async fn settings(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show your current settings.
#[poise::command(slash_command)]
async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let settings = ctx
        .data()
        .services
        .user_settings
        .get(ctx.author().id.0)
        .await?;

    let zone = if settings.time_zone.is_empty() {
        "Not set (use `/settings timezone` to set it)".to_string()
    } else {
        format!("`{}`", settings.time_zone)
    };

    respond(
        ctx,
        format!(
            "## Your settings\nTime zone: {}\nLast updated: <t:{}:F>",
            zone,
            settings.last_updated.timestamp()
        ),
    )
    .await
}

/// Set the time zone raid times you enter are read in.
#[poise::command(slash_command)]
async fn timezone(
    ctx: Context<'_>,
    #[description = "IANA zone, e.g. Europe/Berlin"] zone: String,
) -> Result<(), Error> {
    let settings = ctx
        .data()
        .services
        .user_settings
        .set_timezone(ctx.author().id.0, &zone)
        .await?;

    respond(ctx, format!("Your time zone is now {}", settings.time_zone)).await
}

/// List known time zones, optionally only those containing `filter`.
#[poise::command(slash_command, rename = "timezone-list")]
async fn timezone_list(
    ctx: Context<'_>,
    #[description = "Part of the zone name, e.g. America"] filter: Option<String>,
) -> Result<(), Error> {
    let filter = filter.unwrap_or_default().to_lowercase();

    let mut output = String::new();
    for zone in list_zone_ids()
        .into_iter()
        .filter(|zone| zone.to_lowercase().contains(&filter))
    {
        writeln!(output, "{}", zone)?;
    }
    if output.is_empty() {
        output.push_str("No matching time zones");
    }

    respond(ctx, output).await
}
