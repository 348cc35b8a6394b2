use std::fmt::Write;

use super::parse_id;
use crate::discord::respond;
use crate::discord::Context;
use crate::error::Error;
use crate::framework::composition::TARGET_COMPOSITION;

/// Show role counts for a raid against a full party.
#[poise::command(slash_command)]
pub(crate) async fn composition(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;
    let services = &ctx.data().services;
    let raid = services.raids.find(raid_id).await?;
    let counts = services.composition.role_counts(raid_id).await?;
    let complete = services.composition.is_valid_composition(raid_id).await?;

    let mut output = String::new();
    writeln!(output, "## Composition for {}", raid.name)?;
    for (role, target) in TARGET_COMPOSITION {
        let count = counts.get(&role).copied().unwrap_or(0);
        writeln!(output, "{}: {}/{}", role, count, target)?;
    }
    if complete {
        write!(output, "The party is complete")?;
    } else {
        write!(output, "The party is not complete yet")?;
    }

    respond(ctx, output).await
}
