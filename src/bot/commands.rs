use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, WebAppInfo};
use teloxide::utils::command::BotCommands;

use crate::bot::{messages, HandlerResult};
use crate::config::Config;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    Start,
    Help,
    Profile,
}

/// One-button keyboard that opens the WebApp at `url`.
pub fn webapp_keyboard(label: &str, url: &str) -> Result<InlineKeyboardMarkup, url::ParseError> {
    let url = url.parse()?;
    Ok(InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(
        label,
        WebAppInfo { url },
    )]]))
}

pub fn profile_url(webapp_url: &str) -> String {
    format!("{}#/profile", webapp_url.trim_end_matches('/'))
}

pub async fn handle(bot: Bot, msg: Message, cmd: Command, cfg: Arc<Config>) -> HandlerResult {
    match cmd {
        Command::Start => {
            let keyboard = webapp_keyboard(messages::OPEN_APP_BUTTON, &cfg.webapp_url)?;
            bot.send_message(msg.chat.id, messages::welcome_message(msg.chat.first_name()))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, messages::help_message())
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::Profile => {
            let keyboard = webapp_keyboard(messages::PROFILE_BUTTON, &profile_url(&cfg.webapp_url))?;
            bot.send_message(msg.chat.id, messages::profile_prompt())
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}
