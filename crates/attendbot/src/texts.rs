//! User-facing texts and the tokens recognised from the reply keyboard.

use crate::conversation::state::Flow;

// Keyboard buttons
pub const BUTTON_REGISTER: &str = "Регистрация";
pub const BUTTON_ENTER: &str = "Вход";
pub const BUTTON_STATUS_ON: &str = "Автопосещение Вкл";
pub const BUTTON_STATUS_OFF: &str = "Автопосещение Выкл";
pub const BUTTON_CHANNEL: &str = "Перейти в канал";

// Slash aliases of the start buttons
pub const COMMAND_REGISTER: &str = "/register";
pub const COMMAND_ENTER: &str = "/enter";

pub const GREETING: &str = "Привет! Зарегистрируйтесь или войдите, чтобы отмечаться на парах.";

// Prompts
pub const ASK_GROUP: &str = "Введите вашу учебную группу";
pub const ASK_LOGIN: &str = "Введите ваш логин от ЛК";
pub const ASK_PASSWORD: &str = "Введите ваш пароль от ЛК";
pub const ASK_ALL_AT_ONCE: &str = "Введите вашу учебную группу (пробел) Ваш Логин от ЛК (пробел) Ваш пароль от ЛК";
pub const ASK_STATUS: &str = "Выберите свой статус";

// Confirmations
pub const REGISTERED: &str = "Данные успешно загружены";
pub const LOGGED_IN: &str = "Вход выполнен!";
pub const SUBSCRIPTION_CONFIRMED: &str = "Подписка на канал подтверждена";
pub const STATUS_ON: &str = "Поздравляем! Вы отметились на паре!";
pub const STATUS_OFF: &str = "Вы ушли с пары";
pub const UNKNOWN_COMMAND: &str = "Неизвестная команда -> авторизуйтесь заново";

// Failures
pub const EMPTY_ANSWER: &str = "Ответ не может быть пустым. Введите данные заново";
pub const ONE_WORD_EXPECTED: &str = "Введите одно значение без пробелов. Начните заново";
pub const THREE_FIELDS_EXPECTED: &str =
    "Пожалуйста, введите ровно три значения: учебная группа (пробел) логин (пробел) пароль";
pub const DUPLICATE_LOGIN: &str = "Такой логин уже зарегистрирован в группе. Попробуйте другой логин";
pub const GROUP_NOT_FOUND: &str = "Группа не найдена";
pub const STUDENT_NOT_FOUND: &str = "Студент не найден";
pub const WRONG_PASSWORD: &str = "Неверный пароль. Попробуйте еще раз";
pub const STORE_UNAVAILABLE: &str = "Ошибка базы данных. Попробуйте позже";
pub const NOT_SUBSCRIBED: &str = "Чтобы получить возможность отмечаться, надо подписаться на канал";
pub const VERIFICATION_FAILED: &str = "Не удалось проверить подписку. Попробуйте еще раз";
pub const TIMEOUT: &str = "Время ожидания истекло. Введите данные заново";
pub const INTERNAL: &str = "Ошибка на сервере. Попробуйте позже";

/// Recognises a start command. A `@botname` suffix on slash commands is
/// ignored.
pub fn parse_start(text: &str) -> Option<Flow> {
    let text = text.trim();
    let command = match text.split_once('@') {
        Some((command, _)) if text.starts_with('/') => command,
        _ => text,
    };
    match command {
        BUTTON_REGISTER | COMMAND_REGISTER => Some(Flow::Register),
        BUTTON_ENTER | COMMAND_ENTER => Some(Flow::Enter),
        _ => None,
    }
}

/// Recognises a status token: `Some(true)` for on, `Some(false)` for off.
pub fn parse_status(text: &str) -> Option<bool> {
    match text.trim() {
        BUTTON_STATUS_ON => Some(true),
        BUTTON_STATUS_OFF => Some(false),
        _ => None,
    }
}
