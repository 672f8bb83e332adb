use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Station {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub line: &'static str,
}

const L1: &str = "Сокольническая";
const L2: &str = "Замоскворецкая";
const L3: &str = "Арбатско-Покровская";
const L6: &str = "Калужско-Рижская";
const L7: &str = "Таганско-Краснопресненская";

const fn st(name: &'static str, line: &'static str, lat: f64, lon: f64) -> Station {
    Station { name, lat, lon, line }
}

pub static STATIONS: &[Station] = &[
    st("Сокольники", L1, 55.7885, 37.6798),
    st("Красносельская", L1, 55.7781, 37.6627),
    st("Комсомольская", L1, 55.7755, 37.6549),
    st("Красные Ворота", L1, 55.7687, 37.6506),
    st("Чистые пруды", L1, 55.7647, 37.6434),
    st("Лубянка", L1, 55.7609, 37.6274),
    st("Охотный Ряд", L1, 55.7565, 37.6149),
    st("Библиотека им. Ленина", L1, 55.7514, 37.6097),
    st("Кропоткинская", L1, 55.7452, 37.6043),
    st("Парк культуры", L1, 55.7353, 37.5934),
    st("Фрунзенская", L1, 55.7274, 37.5802),
    st("Спортивная", L1, 55.7223, 37.5620),
    st("Воробьёвы горы", L1, 55.7104, 37.5593),
    st("Университет", L1, 55.6925, 37.5345),
    st("Проспект Вернадского", L1, 55.6770, 37.5050),
    st("Юго-Западная", L1, 55.6637, 37.4828),
    st("Речной вокзал", L2, 55.8545, 37.4761),
    st("Войковская", L2, 55.8189, 37.4979),
    st("Сокол", L2, 55.8055, 37.5152),
    st("Аэропорт", L2, 55.8004, 37.5330),
    st("Динамо", L2, 55.7897, 37.5582),
    st("Белорусская", L2, 55.7772, 37.5822),
    st("Маяковская", L2, 55.7698, 37.5963),
    st("Тверская", L2, 55.7649, 37.6057),
    st("Театральная", L2, 55.7576, 37.6189),
    st("Новокузнецкая", L2, 55.7424, 37.6293),
    st("Павелецкая", L2, 55.7297, 37.6386),
    st("Автозаводская", L2, 55.7070, 37.6573),
    st("Коломенская", L2, 55.6774, 37.6637),
    st("Каширская", L2, 55.6555, 37.6491),
    st("Царицыно", L2, 55.6210, 37.6699),
    st("Киевская", L3, 55.7436, 37.5665),
    st("Смоленская", L3, 55.7477, 37.5839),
    st("Арбатская", L3, 55.7523, 37.6038),
    st("Площадь Революции", L3, 55.7568, 37.6220),
    st("Курская", L3, 55.7586, 37.6609),
    st("Бауманская", L3, 55.7724, 37.6790),
    st("Электрозаводская", L3, 55.7820, 37.7053),
    st("Партизанская", L3, 55.7886, 37.7490),
    st("ВДНХ", L6, 55.8214, 37.6412),
    st("Алексеевская", L6, 55.8078, 37.6387),
    st("Рижская", L6, 55.7925, 37.6360),
    st("Проспект Мира", L6, 55.7796, 37.6336),
    st("Сухаревская", L6, 55.7722, 37.6321),
    st("Тургеневская", L6, 55.7655, 37.6368),
    st("Китай-город", L6, 55.7565, 37.6311),
    st("Третьяковская", L6, 55.7408, 37.6257),
    st("Октябрьская", L6, 55.7292, 37.6113),
    st("Шаболовская", L6, 55.7187, 37.6079),
    st("Ленинский проспект", L6, 55.7077, 37.5857),
    st("Академическая", L6, 55.6876, 37.5733),
    st("Профсоюзная", L6, 55.6777, 37.5628),
    st("Новые Черёмушки", L6, 55.6701, 37.5545),
    st("Беляево", L6, 55.6425, 37.5262),
    st("Тёплый Стан", L6, 55.6187, 37.5059),
    st("Пушкинская", L7, 55.7655, 37.6036),
    st("Баррикадная", L7, 55.7609, 37.5812),
    st("Улица 1905 года", L7, 55.7650, 37.5614),
    st("Таганская", L7, 55.7425, 37.6531),
    st("Пролетарская", L7, 55.7316, 37.6660),
    st("Текстильщики", L7, 55.7090, 37.7319),
    st("Кузьминки", L7, 55.7055, 37.7656),
    st("Выхино", L7, 55.7159, 37.8173),
];

// "Охотный ряд" == "Охотный Ряд", "Воробьевы" == "Воробьёвы"
fn fold(s: &str) -> String {
    s.trim().to_lowercase().replace('ё', "е")
}

pub fn names() -> Vec<&'static str> {
    STATIONS.iter().map(|s| s.name).collect()
}

pub fn find(name: &str) -> Option<&'static Station> {
    let key = fold(name);
    STATIONS.iter().find(|s| fold(s.name) == key)
}

/// Substring search; an empty query returns every station.
pub fn search(query: &str) -> Vec<&'static Station> {
    let key = fold(query);
    STATIONS
        .iter()
        .filter(|s| key.is_empty() || fold(s.name).contains(&key))
        .collect()
}
