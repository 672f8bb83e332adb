use teloxide::prelude::*;

use crate::bot::messages;
use crate::db::repository::User;

pub struct MatchNotice {
    pub chat_id: i64,
    pub text: String,
}

/// One notice per side of the match, each describing the other user.
pub fn match_notices(a: &User, b: &User) -> Vec<MatchNotice> {
    vec![
        MatchNotice { chat_id: a.telegram_id, text: messages::format_match_notice(b) },
        MatchNotice { chat_id: b.telegram_id, text: messages::format_match_notice(a) },
    ]
}

/// Delivery failures are logged and otherwise ignored.
pub async fn send_match_notices(bot: &Bot, notices: Vec<MatchNotice>) {
    for notice in notices {
        match bot.send_message(ChatId(notice.chat_id), &notice.text).await {
            Ok(_) => tracing::info!(chat_id = notice.chat_id, "Match notice sent"),
            Err(e) => {
                tracing::error!(chat_id = notice.chat_id, error = %e, "Failed to send match notice");
            }
        }
        // Basic throttle: avoid hitting Telegram rate limits
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::tests::{identity, mem_db};

    #[test]
    fn each_side_hears_about_the_other() {
        let db = mem_db();
        let a = db.upsert_identity(&identity(11, "Аня")).unwrap();
        let b = db.upsert_identity(&identity(22, "Боря")).unwrap();

        let notices = match_notices(&a, &b);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].chat_id, 11);
        assert!(notices[0].text.contains("Боря"));
        assert_eq!(notices[1].chat_id, 22);
        assert!(notices[1].text.contains("Аня"));
    }
}
