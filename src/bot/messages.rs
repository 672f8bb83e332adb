use teloxide::utils::html;

use crate::db::repository::User;

pub const OPEN_APP_BUTTON: &str = "🏠 Открыть приложение";
pub const PROFILE_BUTTON: &str = "👤 Мой профиль";

/// HTML; `first_name` is escaped here.
pub fn welcome_message(first_name: Option<&str>) -> String {
    let name = html::escape(first_name.unwrap_or("друг"));
    format!(
        "👋 Привет, {name}!\n\n\
         Добро пожаловать в Social Rent - социальную сеть для поиска жилья и соседей!\n\n\
         🔍 Здесь вы можете:\n\
         • Создать профиль с вашими предпочтениями\n\
         • Найти людей, ищущих жилье в том же районе\n\
         • Лайкать профили и находить соседей\n\
         • Просматривать понравившиеся объявления вместе\n\
         • Общаться с подходящими кандидатами\n\n\
         Нажмите кнопку ниже, чтобы начать!"
    )
}

pub fn help_message() -> &'static str {
    "🆘 <b>Помощь по использованию Social Rent</b>\n\n\
     <b>Основные функции:</b>\n\
     1️⃣ <b>Создание профиля</b> - укажите ваши предпочтения по жилью\n\
     2️⃣ <b>Поиск соседей</b> - находите людей с пересекающимися зонами поиска\n\
     3️⃣ <b>Система лайков</b> - лайкайте понравившиеся профили\n\
     4️⃣ <b>Матчи</b> - при взаимных лайках откроется контакт для общения\n\
     5️⃣ <b>Просмотр объявлений</b> - смотрите что нравится вашим матчам\n\n\
     <b>Команды бота:</b>\n\
     /start - открыть приложение\n\
     /help - показать эту справку\n\
     /profile - быстрый доступ к профилю\n\n\
     <b>Как это работает:</b>\n\
     • Вы указываете станцию метро и радиус поиска\n\
     • Система находит людей, чьи зоны поиска пересекаются с вашей\n\
     • При взаимных лайках вы получаете контакт для общения в Telegram\n\
     • Можете просматривать какие объявления понравились вашим матчам"
}

pub fn profile_prompt() -> &'static str {
    "👤 Нажмите кнопку ниже для редактирования профиля:"
}

pub fn open_app_prompt() -> &'static str {
    "Для использования Social Rent откройте веб-приложение:"
}

pub fn profile_updated() -> &'static str {
    "✅ Профиль успешно обновлен!"
}

pub fn match_found(first_name: Option<&str>) -> String {
    format!(
        "🎉 У вас новый матч!\n\
         Пользователь: {}\n\
         Теперь вы можете общаться!",
        first_name.unwrap_or("Новый пользователь")
    )
}

pub fn contact_shared() -> &'static str {
    "📞 Контактные данные переданы в приложение"
}

pub fn web_app_data_error() -> &'static str {
    "❌ Произошла ошибка при обработке данных"
}

/// Sent to one side of a fresh match about `other`.
pub fn format_match_notice(other: &User) -> String {
    let mut lines = vec![
        "🎉 У вас новый матч!".to_string(),
        format!("Пользователь: {}", other.display_name()),
    ];
    if let Some(username) = other.username.as_deref().filter(|u| !u.is_empty()) {
        lines.push(format!("Telegram: @{username}"));
    }
    if let Some(station) = &other.metro_station {
        lines.push(format!("Метро: {station}"));
    }
    lines.push("Теперь вы можете общаться!".to_string());
    lines.join("\n")
}
