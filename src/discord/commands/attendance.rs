use std::fmt::Write;

use chrono::Duration;
use chrono::Utc;
use poise::serenity_prelude as serenity;

use super::parse_id;
use crate::discord::respond;
use crate::discord::Context;
use crate::error::Error;
use crate::framework::attendance::AttendanceRecord;
use crate::framework::attendance::AttendanceStatus;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub(crate) enum StatusChoice {
    Pending,
    Confirmed,
    Declined,
    #[name = "Bench requested"]
    BenchRequested,
    #[name = "On bench"]
    OnBench,
}

impl From<StatusChoice> for AttendanceStatus {
    fn from(choice: StatusChoice) -> Self {
        match choice {
            StatusChoice::Pending => AttendanceStatus::Pending,
            StatusChoice::Confirmed => AttendanceStatus::Confirmed,
            StatusChoice::Declined => AttendanceStatus::Declined,
            StatusChoice::BenchRequested => AttendanceStatus::BenchRequested,
            StatusChoice::OnBench => AttendanceStatus::OnBench,
        }
    }
}

async fn rsvp(
    ctx: Context<'_>,
    raid_id: &str,
    status: AttendanceStatus,
    note: Option<String>,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", raid_id)?;
    let author = ctx.author();
    let attendance = &ctx.data().services.attendance;

    let previous = attendance.get_status(raid_id, author.id.0).await?;
    let record = attendance
        .set_status(raid_id, author.id.0, &author.name, status, note)
        .await?;

    let output = match previous {
        Some(previous) if previous != record.status => {
            format!("Your attendance changed from {} to {}", previous, record.status)
        }
        _ => format!("Your attendance is now: {}", record.status),
    };

    respond(ctx, output).await
}

/// Confirm that you will attend a raid.
#[poise::command(slash_command)]
pub(crate) async fn attend(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
    #[description = "Note for the raid lead"] note: Option<String>,
) -> Result<(), Error> {
    rsvp(ctx, &raid_id, AttendanceStatus::Confirmed, note).await
}

/// Let the group know you cannot make it.
#[poise::command(slash_command)]
pub(crate) async fn decline(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
    #[description = "Reason"] note: Option<String>,
) -> Result<(), Error> {
    rsvp(ctx, &raid_id, AttendanceStatus::Declined, note).await
}

/// Ask to be on the bench for a raid.
#[poise::command(slash_command)]
pub(crate) async fn bench(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
    #[description = "Note for the raid lead"] note: Option<String>,
) -> Result<(), Error> {
    rsvp(ctx, &raid_id, AttendanceStatus::BenchRequested, note).await
}

/// Move a member to the bench.
#[poise::command(
    slash_command,
    rename = "move-to-bench",
    required_permissions = "MANAGE_MESSAGES"
)]
pub(crate) async fn move_to_bench(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
    #[description = "Member to bench"] member: serenity::User,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;

    let output = match ctx
        .data()
        .services
        .attendance
        .move_to_bench(raid_id, member.id.0)
        .await?
    {
        Some(record) => format!("Moved {} to the bench", record.member_name),
        None => format!("{} has not responded to this raid", member.name),
    };

    respond(ctx, output).await
}

/// Take a member off the bench and confirm them.
#[poise::command(
    slash_command,
    rename = "move-from-bench",
    required_permissions = "MANAGE_MESSAGES"
)]
pub(crate) async fn move_from_bench(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
    #[description = "Member to confirm"] member: serenity::User,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;

    let output = match ctx
        .data()
        .services
        .attendance
        .move_from_bench_to_confirmed(raid_id, member.id.0)
        .await?
    {
        Some(record) => format!("{} is now confirmed", record.member_name),
        None => format!("{} has not responded to this raid", member.name),
    };

    respond(ctx, output).await
}

fn write_record(output: &mut String, record: &AttendanceRecord) -> std::fmt::Result {
    match &record.note {
        Some(note) => writeln!(output, "- {} ({})", record.member_name, note),
        None => writeln!(output, "- {}", record.member_name),
    }
}

/// List everyone who responded to a raid, or only those with one status.
#[poise::command(slash_command)]
pub(crate) async fn attendance(
    ctx: Context<'_>,
    #[description = "Raid ID"] raid_id: String,
    #[description = "Only show this status"] status: Option<StatusChoice>,
) -> Result<(), Error> {
    let raid_id = parse_id("raid", &raid_id)?;
    let services = &ctx.data().services;
    let raid = services.raids.find(raid_id).await?;

    let mut output = String::new();
    writeln!(output, "## Attendance for {}", raid.name)?;

    if let Some(status) = status {
        let status = AttendanceStatus::from(status);
        let records = services.attendance.list_by_status(raid_id, status).await?;

        writeln!(output, "**{}**", status)?;
        for record in &records {
            write_record(&mut output, record)?;
        }
        if records.is_empty() {
            writeln!(output, "Nobody")?;
        }

        return respond(ctx, output).await;
    }

    let records = services.attendance.list_by_raid(raid_id).await?;
    if records.is_empty() {
        writeln!(output, "Nobody has responded yet")?;
        return respond(ctx, output).await;
    }

    let mut current = None;
    for record in records.iter().filter(|r| !r.status.is_bench()) {
        if current != Some(record.status) {
            writeln!(output, "**{}**", record.status)?;
            current = Some(record.status);
        }
        write_record(&mut output, record)?;
    }

    let bench = services.attendance.bench(raid_id).await?;
    if !bench.is_empty() {
        writeln!(output, "**Bench**")?;
        for record in &bench {
            let state = match record.status {
                AttendanceStatus::OnBench => "benched",
                _ => "requested",
            };
            writeln!(output, "- {} ({})", record.member_name, state)?;
        }
    }

    respond(ctx, output).await
}

/// Count the raids a member confirmed over the last days.
#[poise::command(slash_command)]
pub(crate) async fn stats(
    ctx: Context<'_>,
    #[description = "Member, yourself if empty"] member: Option<serenity::User>,
    #[description = "How many days back, 30 if empty"]
    #[min = 1]
    #[max = 365]
    days: Option<i64>,
) -> Result<(), Error> {
    let member = member.unwrap_or_else(|| ctx.author().clone());
    let days = days.unwrap_or(30);
    let now = Utc::now();

    let count = ctx
        .data()
        .services
        .attendance
        .confirmed_count(member.id.0, now - Duration::days(days), now)
        .await?;

    respond(
        ctx,
        format!("{} confirmed {} raid(s) in the last {} days", member.name, count, days),
    )
    .await
}
