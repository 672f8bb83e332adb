use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::metro::STATIONS;
use crate::db::repository::{NewListing, TelegramIdentity};
use crate::db::Db;

pub const DEMO_USERS: usize = 30;
pub const DEMO_LISTINGS: usize = 200;
const FIRST_TELEGRAM_ID: i64 = 100_000;

// lat_min, lat_max, lon_min, lon_max
const MOSCOW_BOUNDS: (f64, f64, f64, f64) = (55.48, 55.95, 37.32, 37.85);

const FIRST_NAMES: &[&str] = &["Александр", "Мария", "Дмитрий", "Анна", "Михаил", "Елена", "Алексей", "Ольга"];
const LAST_NAMES: &[&str] = &["Иванов", "Петрова", "Сидоров", "Козлова", "Смирнов", "Новикова"];
const STREETS: &[&str] = &[
    "ул. Тверская", "ул. Арбат", "Ленинский пр-т", "ул. Покровка", "Кутузовский пр-т",
    "ул. Маросейка", "пр-т Мира", "ул. Бауманская", "Волгоградский пр-т", "ул. Профсоюзная",
];
const DESCRIPTIONS: &[&str] = &[
    "Уютная студия в центре города",
    "Просторная однокомнатная квартира",
    "Светлая двухкомнатная квартира с ремонтом",
    "Трехкомнатная квартира в новостройке",
    "Современная квартира с панорамными окнами",
    "Квартира после евроремонта",
    "Уютная квартира рядом с метро",
    "Просторная квартира в тихом районе",
];

/// Fill an empty database with demo users and listings.
/// Returns `false` if anything was already stored.
pub fn seed_if_empty(db: &Db) -> Result<bool> {
    if db.count_users()? > 0 || db.count_listings()? > 0 {
        tracing::info!("Database already contains data, skipping demo data");
        return Ok(false);
    }
    let mut rng = rand::thread_rng();
    seed_users(db, &mut rng, DEMO_USERS)?;
    seed_listings(db, &mut rng, DEMO_LISTINGS)?;
    tracing::info!(users = DEMO_USERS, listings = DEMO_LISTINGS, "Demo data generated");
    Ok(true)
}

pub fn seed_users(db: &Db, rng: &mut impl Rng, count: usize) -> Result<()> {
    for i in 0..count {
        let username = format!("testuser{i}");
        let first = FIRST_NAMES.choose(rng).copied();
        let last = LAST_NAMES.choose(rng).copied();
        let mut user = db.upsert_identity(&TelegramIdentity {
            telegram_id: FIRST_TELEGRAM_ID + i as i64,
            username: Some(&username),
            first_name: first,
            last_name: last,
            photo_url: None,
        })?;

        let station = STATIONS.choose(rng).unwrap_or(&STATIONS[0]);
        let base_budget: i64 = rng.gen_range(20_000..=150_000);
        user.age = Some(rng.gen_range(18..=45));
        user.bio = Some(format!("Ищу жильё рядом с м. {}", station.name));
        user.price_min = Some((base_budget - rng.gen_range(0..=15_000)).max(0));
        user.price_max = Some(base_budget + rng.gen_range(10_000..=50_000));
        user.metro_station = Some(station.name.to_string());
        user.search_lat = Some(station.lat + rng.gen_range(-0.02..=0.02));
        user.search_lon = Some(station.lon + rng.gen_range(-0.02..=0.02));
        user.search_radius = Some(rng.gen_range(1000..=5000));
        db.save_profile(&user)?;
    }
    Ok(())
}

pub fn seed_listings(db: &Db, rng: &mut impl Rng, count: usize) -> Result<()> {
    let (lat_min, lat_max, lon_min, lon_max) = MOSCOW_BOUNDS;
    for _ in 0..count {
        let rooms: i64 = rng.gen_range(1..=4);
        let area: f64 = rng.gen_range(20.0..150.0);
        let floor: i64 = rng.gen_range(1..=25);
        let total_floors: i64 = rng.gen_range(floor..=30);
        let base_price = rooms as f64 * 25_000.0 + area * 300.0;
        let price = (base_price * rng.gen_range(0.7..1.5)) as i64;
        let station = STATIONS.choose(rng).unwrap_or(&STATIONS[0]);
        let street = STREETS.choose(rng).copied().unwrap_or("ул. Тверская");
        let description = DESCRIPTIONS.choose(rng).copied().unwrap_or_default();

        db.insert_listing(&NewListing {
            title: format!("{rooms}-комн. квартира, {area:.0} м²"),
            description: Some(description.to_string()),
            price,
            address: Some(format!("Москва, {street}, д. {}", rng.gen_range(1..=120))),
            lat: rng.gen_range(lat_min..lat_max),
            lon: rng.gen_range(lon_min..lon_max),
            rooms: Some(rooms),
            area: Some((area * 10.0).round() / 10.0),
            floor: Some(floor),
            total_floors: Some(total_floors),
            metro_station: Some(station.name.to_string()),
            metro_distance: Some(rng.gen_range(50..=1500)),
            photos: Vec::new(),
        })?;
    }
    Ok(())
}
