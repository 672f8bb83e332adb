use std::sync::Arc;
use serde::Deserialize;
use teloxide::prelude::*;

use crate::bot::commands::webapp_keyboard;
use crate::bot::{messages, HandlerResult};
use crate::config::Config;

#[derive(Debug, Deserialize)]
pub struct MatchedUser {
    pub first_name: Option<String>,
}

/// Events the WebApp posts back through `Telegram.WebApp.sendData`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebAppEvent {
    ProfileUpdated,
    MatchFound {
        #[serde(default)]
        user: Option<MatchedUser>,
    },
    ContactRequest,
}

/// Reply for a raw payload. `Ok(None)` for well-formed JSON of an unknown type.
pub fn reply_for(data: &str) -> Result<Option<String>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    let Ok(event) = serde_json::from_value::<WebAppEvent>(value) else {
        return Ok(None);
    };
    Ok(Some(match event {
        WebAppEvent::ProfileUpdated => messages::profile_updated().to_string(),
        WebAppEvent::MatchFound { user } => {
            messages::match_found(user.as_ref().and_then(|u| u.first_name.as_deref()))
        }
        WebAppEvent::ContactRequest => messages::contact_shared().to_string(),
    }))
}

pub async fn handle_data(bot: Bot, msg: Message) -> HandlerResult {
    let Some(payload) = msg.web_app_data() else {
        return Ok(());
    };
    match reply_for(&payload.data) {
        Ok(Some(text)) => {
            bot.send_message(msg.chat.id, text).await?;
        }
        Ok(None) => tracing::debug!(data = %payload.data, "Ignoring web app event"),
        Err(e) => {
            tracing::error!(data = %payload.data, error = %e, "Invalid web app data");
            bot.send_message(msg.chat.id, messages::web_app_data_error()).await?;
        }
    }
    Ok(())
}

/// Anything that is not a command or WebApp payload.
pub async fn handle_other(bot: Bot, msg: Message, cfg: Arc<Config>) -> HandlerResult {
    let keyboard = webapp_keyboard(messages::OPEN_APP_BUTTON, &cfg.webapp_url)?;
    bot.send_message(msg.chat.id, messages::open_app_prompt())
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_events_get_replies() {
        assert_eq!(
            reply_for(r#"{"type":"profile_updated"}"#).unwrap().as_deref(),
            Some(messages::profile_updated())
        );
        let text = reply_for(r#"{"type":"match_found","user":{"first_name":"Лена"}}"#)
            .unwrap()
            .unwrap();
        assert!(text.contains("Лена"));
        let text = reply_for(r#"{"type":"match_found"}"#).unwrap().unwrap();
        assert!(text.contains("Новый пользователь"));
        assert_eq!(
            reply_for(r#"{"type":"contact_request","extra":1}"#).unwrap().as_deref(),
            Some(messages::contact_shared())
        );
    }

    #[test]
    fn unknown_events_are_ignored() {
        assert_eq!(reply_for(r#"{"type":"something_else"}"#).unwrap(), None);
        assert_eq!(reply_for(r#"[1,2,3]"#).unwrap(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(reply_for("{not json").is_err());
    }
}
