use uuid::Uuid;

use crate::discord::Context;
use crate::discord::Data;
use crate::error::Error;

mod attendance;
mod character;
mod composition;
mod job;
mod raid;
mod settings;

pub(crate) fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        raid::raid(),
        attendance::attend(),
        attendance::decline(),
        attendance::bench(),
        attendance::move_to_bench(),
        attendance::move_from_bench(),
        attendance::attendance(),
        attendance::stats(),
        character::character(),
        job::job(),
        composition::composition(),
        settings::settings(),
        ping(),
        help(),
        about(),
    ]
}

/// Check that the bot is alive.
#[poise::command(slash_command)]
async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    crate::discord::respond(ctx, "Pong!".to_owned()).await
}

/// Show the available commands.
#[poise::command(slash_command)]
async fn help(ctx: Context<'_>) -> Result<(), Error> {
    crate::discord::respond(ctx, HELP.to_owned()).await
}

/// Show what this bot does.
#[poise::command(slash_command)]
async fn about(ctx: Context<'_>) -> Result<(), Error> {
    crate::discord::respond(ctx, ABOUT.to_owned()).await
}

const HELP: &str = "## Available commands
**Basic**
`/ping` - Check that the bot is alive
`/about` - Show what this bot does
`/help` - Show this message
**Raids**
`/raid create` - Plan a raid in this channel
`/raid list` - List upcoming raids
`/raid show` - Show a raid with attendance and lineup
`/raid archive` - Archive a raid
`/raid delete` - Delete a raid
`/raid reset-attendance` - Clear every response to a raid
**Attendance**
`/attend`, `/decline`, `/bench` - Respond to a raid
`/attendance` - List the responses to a raid
`/move-to-bench`, `/move-from-bench` - Manage the bench
`/stats` - Count confirmed raids
**Characters & jobs**
`/character register`, `/character update-jobs`, `/character list` - Manage your characters
`/job assign`, `/job remove` - Join or leave a raid's lineup
`/job remove-member` - Remove someone from a lineup
`/composition` - Show role counts for a raid
**Settings**
`/settings show`, `/settings timezone`, `/settings timezone-list` - Your time zone";

const ABOUT: &str = "## Raid bot
Plans raid parties for the server.
- Raid scheduling and reminders
- Attendance tracking
- Bench management for substitutes
- Job role and party composition tracking";

/// Accepts both the hyphenated and the simple form ids are printed in.
pub(crate) fn parse_id(kind: &str, id: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(id.trim())
        .map_err(|_| Error::InvalidInput(format!("'{}' is not a valid {} ID", id, kind)))
}
