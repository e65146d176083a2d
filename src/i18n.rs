//! User-facing texts for the supported locales.
use crate::weather::WeatherSummary;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const QUESTION_MARK: &str = "\u{2753}";
pub const ANSWER_MARK: &str = "\u{2705}";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ru,
    En,
}

impl Locale {
    /// Language code passed to upstream APIs.
    pub fn code(&self) -> &'static str {
        match self {
            Locale::Ru => "ru",
            Locale::En => "en",
        }
    }

    pub fn language_name(&self) -> &'static str {
        match self {
            Locale::Ru => "Russian",
            Locale::En => "English",
        }
    }
}

const MONTHS_RU: [&str; 12] = [
    "янв", "фев", "мар", "апр", "мая", "июн", "июл", "авг", "сен", "окт", "ноя", "дек",
];
const MONTHS_EN: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy)]
pub struct Messages {
    locale: Locale,
}

impl Messages {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn help(&self) -> String {
        let lines: &[&str] = match self.locale {
            Locale::Ru => &[
                "Доступные команды:",
                "/start - регистрация и помощь",
                "/help - список команд",
                "/setcity <город> - установить город",
                "/settime <HH:MM> - время ежедневного дайджеста",
                "/settz <Зона/Город> - часовой пояс, например Europe/Berlin",
                "/on - включить ежедневный дайджест",
                "/off - выключить ежедневный дайджест",
                "/weather - погода для сохраненного города",
                "/interview - вопросы с ответами",
                "/ask <вопрос> - спросить ассистента",
            ],
            Locale::En => &[
                "Available commands:",
                "/start - register and show help",
                "/help - list commands",
                "/setcity <city> - set your city",
                "/settime <HH:MM> - daily digest time",
                "/settz <Area/City> - timezone, e.g. Europe/Berlin",
                "/on - enable the daily digest",
                "/off - disable the daily digest",
                "/weather - weather for the saved city",
                "/interview - questions with answers",
                "/ask <question> - ask the assistant",
            ],
        };
        lines.join("\n")
    }

    pub fn greeting(&self) -> String {
        let hello = match self.locale {
            Locale::Ru => "Привет! Бот готов к работе.",
            Locale::En => "Hi! The bot is ready.",
        };
        format!("{}\n{}", hello, self.help())
    }

    pub fn setcity_usage(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Укажи город после команды, например: /setcity Berlin",
            Locale::En => "Add a city after the command, for example: /setcity Berlin",
        }
    }

    pub fn city_saved(&self, city: &str) -> String {
        match self.locale {
            Locale::Ru => format!("Город сохранен: {}", city),
            Locale::En => format!("City saved: {}", city),
        }
    }

    pub fn settime_usage(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Неверный формат. Пример: /settime 08:30",
            Locale::En => "Invalid format. Example: /settime 08:30",
        }
    }

    pub fn time_saved(&self, time: &str) -> String {
        match self.locale {
            Locale::Ru => format!("Время дайджеста сохранено: {}", time),
            Locale::En => format!("Digest time saved: {}", time),
        }
    }

    pub fn settz_usage(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Неизвестный часовой пояс. Пример: /settz Europe/Berlin",
            Locale::En => "Unknown timezone. Example: /settz Europe/Berlin",
        }
    }

    pub fn tz_saved(&self, tz: &str) -> String {
        match self.locale {
            Locale::Ru => format!("Часовой пояс сохранен: {}", tz),
            Locale::En => format!("Timezone saved: {}", tz),
        }
    }

    pub fn digest_enabled(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Ежедневный дайджест включен.",
            Locale::En => "Daily digest enabled.",
        }
    }

    pub fn digest_disabled(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Ежедневный дайджест выключен.",
            Locale::En => "Daily digest disabled.",
        }
    }

    pub fn city_required(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Сначала установи город через /setcity",
            Locale::En => "Set your city first with /setcity",
        }
    }

    pub fn weather_unavailable(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Не удалось получить погоду. Попробуй позже.",
            Locale::En => "Could not fetch the weather. Try again later.",
        }
    }

    pub fn weather_no_data(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Погода: нет данных.",
            Locale::En => "Weather: no data.",
        }
    }

    pub fn no_questions(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Вопросы не найдены.",
            Locale::En => "No questions found.",
        }
    }

    pub fn ask_usage(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Напиши вопрос после команды, например: /ask что такое замыкание?",
            Locale::En => "Add a question after the command, for example: /ask what is a closure?",
        }
    }

    pub fn ai_unavailable(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Ассистент не настроен.",
            Locale::En => "The assistant is not configured.",
        }
    }

    pub fn ai_failed(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Не удалось получить ответ.",
            Locale::En => "Could not get an answer.",
        }
    }

    pub fn unknown_command(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Неизвестная команда. /help - список команд.",
            Locale::En => "Unknown command. /help lists the commands.",
        }
    }

    pub fn internal_error(&self) -> &'static str {
        match self.locale {
            Locale::Ru => "Что-то пошло не так. Попробуй позже.",
            Locale::En => "Something went wrong. Try again later.",
        }
    }

    /// Weather details without a prefix, e.g. `ясно, 12°C (ощущается как 10°C)`.
    pub fn weather_details(&self, w: &WeatherSummary) -> String {
        let (feels, precip) = match self.locale {
            Locale::Ru => ("ощущается как", "осадки"),
            Locale::En => ("feels like", "precipitation"),
        };
        let mut out = format!(
            "{}, {}°C ({} {}°C)",
            w.description,
            round_half_up(w.temp),
            feels,
            round_half_up(w.feels_like)
        );
        if let Some(mm) = w.precipitation_mm {
            let unit = match self.locale {
                Locale::Ru => "мм",
                Locale::En => "mm",
            };
            out.push_str(&format!(", {} ~{} {}", precip, mm, unit));
        }
        out
    }

    pub fn weather_now(&self, city: &str, w: &WeatherSummary) -> String {
        match self.locale {
            Locale::Ru => format!("Погода сейчас в {}: {}", city, self.weather_details(w)),
            Locale::En => format!("Weather now in {}: {}", city, self.weather_details(w)),
        }
    }

    pub fn digest_weather_line(&self, w: &WeatherSummary) -> String {
        format!("\u{2600}\u{fe0f} {}", self.weather_details(w))
    }

    /// `📅 18 окт 2026, Berlin`
    pub fn digest_header(&self, date: NaiveDate, city: &str) -> String {
        let months = match self.locale {
            Locale::Ru => &MONTHS_RU,
            Locale::En => &MONTHS_EN,
        };
        format!(
            "\u{1f4c5} {:02} {} {}, {}",
            date.day(),
            months[date.month0() as usize],
            date.year(),
            city
        )
    }
}

/// Nearest integer with halves rounded up, so -0.5 becomes 0.
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(precip: Option<f64>) -> WeatherSummary {
        WeatherSummary {
            description: "light rain".into(),
            temp: 11.6,
            feels_like: 9.4,
            precipitation_mm: precip,
        }
    }

    #[test]
    fn halves_round_up_below_zero() {
        let m = Messages::new(Locale::En);
        let w = WeatherSummary {
            description: "fog".into(),
            temp: -0.5,
            feels_like: -2.5,
            precipitation_mm: None,
        };
        assert_eq!(m.weather_details(&w), "fog, 0°C (feels like -2°C)");
        assert_eq!(round_half_up(0.5), 1);
        assert_eq!(round_half_up(-1.6), -2);
        assert_eq!(round_half_up(12.4), 12);
    }

    #[test]
    fn weather_details_rounds_temperatures() {
        let m = Messages::new(Locale::En);
        assert_eq!(
            m.weather_details(&summary(None)),
            "light rain, 12°C (feels like 9°C)"
        );
        assert_eq!(
            m.weather_details(&summary(Some(0.5))),
            "light rain, 12°C (feels like 9°C), precipitation ~0.5 mm"
        );
    }

    #[test]
    fn header_uses_localized_month() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(
            Messages::new(Locale::Ru).digest_header(date, "Minsk"),
            "\u{1f4c5} 05 мар 2026, Minsk"
        );
        assert_eq!(
            Messages::new(Locale::En).digest_header(date, "Minsk"),
            "\u{1f4c5} 05 Mar 2026, Minsk"
        );
    }

    #[test]
    fn locale_parses_lowercase() {
        let l: Locale = serde_yaml::from_str("en").unwrap();
        assert_eq!(l, Locale::En);
        assert_eq!(l.code(), "en");
    }
}
