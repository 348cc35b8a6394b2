use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::error::Error;
use crate::framework::notification::ColorHint;
use crate::framework::notification::MessageContent;
use crate::framework::notification::MessageHandle;
use crate::framework::notification::NotificationHub;
use crate::framework::notification::RsvpReaction;
use crate::framework::ChannelId;
use crate::framework::Services;

mod commands;

pub struct Data {
    pub services: Arc<Services>,
}

pub type Context<'a> = poise::Context<'a, Data, Error>;

pub async fn start_bot(
    token: String,
    server_id: u64,
    services: Arc<Services>,
) -> Result<(), Error> {
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .token(token)
        .intents(intents)
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("{} is connected!", ready.user.name);

                poise::builtins::register_in_guild(
                    ctx,
                    &framework.options().commands,
                    serenity::GuildId(server_id),
                )
                .await?;

                Ok(Data { services })
            })
        });

    info!("Starting bot...");

    framework.run().await?;

    Ok(())
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &poise::Event<'_>,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let poise::Event::ReactionAdd { add_reaction } = event {
        on_reaction(ctx, add_reaction, data).await?;
    }

    Ok(())
}

/// RSVP reactions on advance reminders update the reacting member's
/// attendance.
async fn on_reaction(
    ctx: &serenity::Context,
    reaction: &serenity::Reaction,
    data: &Data,
) -> Result<(), Error> {
    let serenity::ReactionType::Unicode(emoji) = &reaction.emoji else {
        return Ok(());
    };
    if RsvpReaction::from_emoji(emoji).is_none() {
        return Ok(());
    }

    let user = reaction.user(ctx).await?;
    if user.bot {
        return Ok(());
    }

    let record = data
        .services
        .attendance
        .respond_to_reminder(MessageHandle(reaction.message_id.0), user.id.0, &user.name, emoji)
        .await?;

    if let Some(record) = record {
        debug!(
            raid_id = %record.raid_id,
            member_id = record.member_id,
            status = %record.status,
            "Reminder reaction recorded"
        );
    }

    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx } => {
            let reply = if error.is_user_facing() {
                warn!(command = %ctx.command().qualified_name, error = %error, "Command rejected");
                error.to_string()
            } else {
                error!(command = %ctx.command().qualified_name, error = %error, "Command failed");
                "Something went wrong, please try again later.".to_string()
            };

            if let Err(e) = ctx.say(reply).await {
                error!("Error sending error response: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Replies with `content`, split into as many messages as needed.
pub(crate) async fn respond(ctx: Context<'_>, content: String) -> Result<(), Error> {
    for chunk in split_message(content)? {
        ctx.say(chunk).await?;
    }

    Ok(())
}

const MESSAGE_LIMIT: usize = 2000;

/// Splits on line boundaries so no chunk exceeds Discord's 2000 character
/// limit. Lines longer than the limit are cut on char boundaries.
pub(crate) fn split_message(message: String) -> Result<Vec<String>, Error> {
    let mut output = String::new();
    let mut messages = Vec::new();

    for line in message.lines().flat_map(hard_wrap) {
        if !output.is_empty() && output.len() + line.len() > MESSAGE_LIMIT {
            let chunk = output.trim_end().to_string();
            trace!("Adding chunk to messages: {}", chunk);
            messages.push(chunk);
            output.clear();
        }
        writeln!(output, "{}", line)?;
    }
    messages.push(output.trim_end().to_string());

    Ok(messages)
}

fn hard_wrap(line: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = line;

    loop {
        let mut end = rest.len().min(MESSAGE_LIMIT);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (piece, tail) = rest.split_at(end);
        pieces.push(piece);
        rest = tail;

        if rest.is_empty() {
            return pieces;
        }
    }
}

/// [`NotificationHub`] backed by the Discord REST API.
pub struct DiscordHub {
    http: Arc<serenity::Http>,
}

impl DiscordHub {
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(serenity::Http::new(token)),
        }
    }
}

fn colour(hint: ColorHint) -> serenity::Colour {
    match hint {
        ColorHint::Blue => serenity::Colour::BLUE,
        ColorHint::Gold => serenity::Colour::GOLD,
        ColorHint::Red => serenity::Colour::RED,
    }
}

fn fill_embed<'a>(
    embed: &'a mut serenity::CreateEmbed,
    content: &MessageContent,
) -> &'a mut serenity::CreateEmbed {
    embed
        .title(&content.title)
        .description(&content.description)
        .colour(colour(content.color));

    for field in &content.fields {
        embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &content.footer {
        embed.footer(|f| f.text(footer));
    }
    if let Some(timestamp) = content.timestamp {
        if let Ok(timestamp) = serenity::Timestamp::from_unix_timestamp(timestamp.timestamp()) {
            embed.timestamp(timestamp);
        }
    }

    embed
}

fn mention_line(content: &MessageContent) -> Option<String> {
    if content.mentions.is_empty() {
        return None;
    }

    Some(
        content
            .mentions
            .iter()
            .map(|id| format!("<@{}>", id))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn unavailable(e: serenity::Error) -> Error {
    Error::MessageUnavailable(e.to_string())
}

#[async_trait]
impl NotificationHub for DiscordHub {
    async fn send(
        &self,
        channel_id: ChannelId,
        content: &MessageContent,
    ) -> Result<MessageHandle, Error> {
        let message = serenity::ChannelId(channel_id)
            .send_message(&self.http, |m| {
                if let Some(mentions) = mention_line(content) {
                    m.content(mentions);
                }
                m.embed(|e| fill_embed(e, content))
            })
            .await
            .map_err(unavailable)?;

        for reaction in &content.reactions {
            let emoji = serenity::ReactionType::Unicode(reaction.emoji().to_string());
            if let Err(e) = message.react(&*self.http, emoji).await {
                warn!(channel_id, message_id = message.id.0, error = %e, "Could not add reaction");
            }
        }

        Ok(MessageHandle(message.id.0))
    }

    async fn update(
        &self,
        channel_id: ChannelId,
        handle: MessageHandle,
        content: &MessageContent,
    ) -> Result<(), Error> {
        serenity::ChannelId(channel_id)
            .edit_message(&self.http, handle.0, |m| m.embed(|e| fill_embed(e, content)))
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn delete(&self, channel_id: ChannelId, handle: MessageHandle) -> Result<(), Error> {
        serenity::ChannelId(channel_id)
            .delete_message(&self.http, handle.0)
            .await
            .map_err(unavailable)
    }
}
