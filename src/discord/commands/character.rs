use std::fmt::Write;

use crate::discord::respond;
use crate::discord::Context;
use crate::error::Error;
use crate::framework::character::parse_jobs;
use crate::framework::composition::Job;

/// Manage your characters.
#[poise::command(slash_command, subcommands("register", "update_jobs", "list"))]
pub(crate) async fn character(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Register a character you can bring to raids.
#[poise::command(slash_command)]
async fn register(
    ctx: Context<'_>,
    #[description = "Character name"] name: String,
    #[description = "Home world"] world: String,
    #[description = "Preferred job, e.g. WHM"] job: String,
    #[description = "Other jobs, comma separated"] secondary_jobs: Option<String>,
) -> Result<(), Error> {
    let job: Job = job.parse()?;
    let secondary_jobs = secondary_jobs.as_deref().map(parse_jobs).transpose()?;

    let character = ctx
        .data()
        .services
        .characters
        .register(ctx.author().id.0, name.trim(), world.trim(), job, secondary_jobs)
        .await?;

    respond(ctx, format!("Registered {}", character)).await
}

/// Change the jobs of a registered character.
#[poise::command(slash_command, rename = "update-jobs")]
async fn update_jobs(
    ctx: Context<'_>,
    #[description = "Character name"] name: String,
    #[description = "Preferred job"] job: String,
    #[description = "Other jobs, comma separated"] secondary_jobs: Option<String>,
) -> Result<(), Error> {
    let job: Job = job.parse()?;
    let secondary_jobs = secondary_jobs.as_deref().map(parse_jobs).transpose()?;
    let services = &ctx.data().services;
    let user_id = ctx.author().id.0;

    let existing = services
        .characters
        .list_for_user(user_id)
        .await?
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| Error::InvalidInput(format!("You have no character named {}", name)))?;

    let character = services
        .characters
        .register(user_id, &existing.name, &existing.world, job, secondary_jobs)
        .await?;

    respond(ctx, format!("Updated {}", character)).await
}

/// List your characters.
#[poise::command(slash_command)]
async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let characters = ctx
        .data()
        .services
        .characters
        .list_for_user(ctx.author().id.0)
        .await?;

    if characters.is_empty() {
        return respond(ctx, "You have no characters, use `/character register`".to_owned()).await;
    }

    let mut output = String::new();
    for character in characters {
        writeln!(output, "{}", character)?;
    }

    respond(ctx, output).await
}
