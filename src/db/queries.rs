use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, Charger, ChargerStatus, ChargerType, Role, User};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, name, role) VALUES (?1, ?2, ?3, ?4)",
        params![user.id, user.email, user.name, user.role.as_str()],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, email, name, role FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    );

    match result {
        Ok((id, email, name, role_str)) => {
            let role = Role::parse(&role_str)
                .ok_or_else(|| anyhow::anyhow!("unknown role in users row: {role_str}"))?;
            Ok(Some(User {
                id,
                email,
                name,
                role,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Chargers ──

const CHARGER_COLUMNS: &str = "id, host_id, title, address, pincode, price_per_hour, charger_type, \
     power_output, available_start, available_end, photo_url, status, created_at";

pub fn create_charger(conn: &Connection, charger: &Charger) -> anyhow::Result<()> {
    let created_at = charger.created_at.format(DATETIME_FMT).to_string();
    conn.execute(
        "INSERT INTO chargers (id, host_id, title, address, pincode, price_per_hour, charger_type,
                               power_output, available_start, available_end, photo_url, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            charger.id,
            charger.host_id,
            charger.title,
            charger.address,
            charger.pincode,
            charger.price_per_hour,
            charger.charger_type.as_str(),
            charger.power_output,
            charger.available_start,
            charger.available_end,
            charger.photo_url,
            charger.status.as_str(),
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_charger(conn: &Connection, id: &str) -> anyhow::Result<Option<Charger>> {
    let result = conn.query_row(
        &format!("SELECT {CHARGER_COLUMNS} FROM chargers WHERE id = ?1"),
        params![id],
        |row| Ok(parse_charger_row(row)),
    );

    match result {
        Ok(charger) => Ok(Some(charger?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Charger plus its host's display name, for the public detail view.
pub fn get_charger_detail(conn: &Connection, id: &str) -> anyhow::Result<Option<(Charger, String)>> {
    let result = conn.query_row(
        "SELECT c.id, c.host_id, c.title, c.address, c.pincode, c.price_per_hour, c.charger_type,
                c.power_output, c.available_start, c.available_end, c.photo_url, c.status, c.created_at,
                u.name
         FROM chargers c
         INNER JOIN users u ON u.id = c.host_id
         WHERE c.id = ?1",
        params![id],
        |row| {
            let host_name: String = row.get(13)?;
            Ok((parse_charger_row(row), host_name))
        },
    );

    match result {
        Ok((charger, host_name)) => Ok(Some((charger?, host_name))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_chargers_for_host(conn: &Connection, host_id: &str) -> anyhow::Result<Vec<Charger>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHARGER_COLUMNS} FROM chargers WHERE host_id = ?1 ORDER BY created_at DESC"
    ))?;

    let rows = stmt.query_map(params![host_id], |row| Ok(parse_charger_row(row)))?;

    let mut chargers = vec![];
    for row in rows {
        chargers.push(row??);
    }
    Ok(chargers)
}

pub fn update_charger(conn: &Connection, charger: &Charger) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE chargers SET title = ?1, address = ?2, pincode = ?3, price_per_hour = ?4,
             charger_type = ?5, power_output = ?6, available_start = ?7, available_end = ?8,
             photo_url = ?9, status = ?10
         WHERE id = ?11",
        params![
            charger.title,
            charger.address,
            charger.pincode,
            charger.price_per_hour,
            charger.charger_type.as_str(),
            charger.power_output,
            charger.available_start,
            charger.available_end,
            charger.photo_url,
            charger.status.as_str(),
            charger.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_charger(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM chargers WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

#[derive(Debug, Default)]
pub struct ChargerFilter {
    pub pincode: Option<String>,
    pub charger_type: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_power: Option<f64>,
}

/// Drivers only ever see active chargers; the filter narrows within those.
pub fn search_chargers(conn: &Connection, filter: &ChargerFilter) -> anyhow::Result<Vec<Charger>> {
    let mut sql = format!("SELECT {CHARGER_COLUMNS} FROM chargers WHERE status = 'active'");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(pincode) = &filter.pincode {
        params_vec.push(Box::new(format!("{pincode}%")));
        sql.push_str(&format!(" AND pincode LIKE ?{}", params_vec.len()));
    }
    if let Some(charger_type) = &filter.charger_type {
        params_vec.push(Box::new(charger_type.clone()));
        sql.push_str(&format!(" AND charger_type = ?{}", params_vec.len()));
    }
    if let Some(min_price) = filter.min_price {
        params_vec.push(Box::new(min_price));
        sql.push_str(&format!(" AND price_per_hour >= ?{}", params_vec.len()));
    }
    if let Some(max_price) = filter.max_price {
        params_vec.push(Box::new(max_price));
        sql.push_str(&format!(" AND price_per_hour <= ?{}", params_vec.len()));
    }
    if let Some(min_power) = filter.min_power {
        params_vec.push(Box::new(min_power));
        sql.push_str(&format!(" AND power_output >= ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_charger_row(row)))?;

    let mut chargers = vec![];
    for row in rows {
        chargers.push(row??);
    }
    Ok(chargers)
}

fn parse_charger_row(row: &rusqlite::Row) -> anyhow::Result<Charger> {
    let id: String = row.get(0)?;
    let host_id: String = row.get(1)?;
    let title: String = row.get(2)?;
    let address: String = row.get(3)?;
    let pincode: String = row.get(4)?;
    let price_per_hour: i64 = row.get(5)?;
    let charger_type_str: String = row.get(6)?;
    let power_output: f64 = row.get(7)?;
    let available_start: String = row.get(8)?;
    let available_end: String = row.get(9)?;
    let photo_url: Option<String> = row.get(10)?;
    let status_str: String = row.get(11)?;
    let created_at_str: String = row.get(12)?;

    let charger_type = ChargerType::parse(&charger_type_str)
        .ok_or_else(|| anyhow::anyhow!("unknown charger type in row: {charger_type_str}"))?;
    let status = ChargerStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown charger status in row: {status_str}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Charger {
        id,
        host_id,
        title,
        address,
        pincode,
        price_per_hour,
        charger_type,
        power_output,
        available_start,
        available_end,
        photo_url,
        status,
        created_at,
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str =
    "id, charger_id, driver_id, booking_date, start_time, end_time, total_price, status, created_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let booking_date = booking.booking_date.format(DATE_FMT).to_string();
    let created_at = booking.created_at.format(DATETIME_FMT).to_string();

    conn.execute(
        "INSERT INTO bookings (id, charger_id, driver_id, booking_date, start_time, end_time, total_price, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            booking.id,
            booking.charger_id,
            booking.driver_id,
            booking_date,
            booking.start_time,
            booking.end_time,
            booking.total_price,
            booking.status.as_str(),
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Whether any slot-holding booking on `(charger_id, date)` intersects the
/// half-open candidate interval. HH:MM strings compare correctly as text.
pub fn has_overlapping_booking(
    conn: &Connection,
    charger_id: &str,
    date: NaiveDate,
    start_time: &str,
    end_time: &str,
) -> anyhow::Result<bool> {
    let date_str = date.format(DATE_FMT).to_string();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE charger_id = ?1 AND booking_date = ?2
           AND status IN ('pending', 'confirmed')
           AND NOT (end_time <= ?3 OR start_time >= ?4)",
        params![charger_id, date_str, start_time, end_time],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn active_bookings_for_day(
    conn: &Connection,
    charger_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let date_str = date.format(DATE_FMT).to_string();
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE charger_id = ?1 AND booking_date = ?2 AND status IN ('pending', 'confirmed')
         ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(params![charger_id, date_str], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

/// A booking joined with its charger and the charger's host, as shown to the
/// driver who made it.
pub struct DriverBookingRow {
    pub booking: Booking,
    pub charger_title: String,
    pub charger_address: String,
    pub charger_photo_url: Option<String>,
    pub price_per_hour: i64,
    pub host_id: String,
    pub host_name: String,
}

/// A booking joined with its charger and the driver's identity, as shown to
/// the charger's host.
pub struct HostBookingRow {
    pub booking: Booking,
    pub charger_title: String,
    pub charger_address: String,
    pub price_per_hour: i64,
    pub driver_name: String,
    pub driver_email: String,
}

pub fn bookings_for_driver(
    conn: &Connection,
    driver_id: &str,
    status_filter: Option<&str>,
) -> anyhow::Result<Vec<DriverBookingRow>> {
    let mut sql = String::from(
        "SELECT b.id, b.charger_id, b.driver_id, b.booking_date, b.start_time, b.end_time,
                b.total_price, b.status, b.created_at,
                c.title, c.address, c.photo_url, c.price_per_hour, u.id, u.name
         FROM bookings b
         INNER JOIN chargers c ON c.id = b.charger_id
         INNER JOIN users u ON u.id = c.host_id
         WHERE b.driver_id = ?1",
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(driver_id.to_string())];

    if let Some(status) = status_filter {
        params_vec.push(Box::new(status.to_string()));
        sql.push_str(&format!(" AND b.status = ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY b.booking_date DESC, b.start_time DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let charger_title: String = row.get(9)?;
        let charger_address: String = row.get(10)?;
        let charger_photo_url: Option<String> = row.get(11)?;
        let price_per_hour: i64 = row.get(12)?;
        let host_id: String = row.get(13)?;
        let host_name: String = row.get(14)?;
        Ok((
            parse_booking_row(row),
            charger_title,
            charger_address,
            charger_photo_url,
            price_per_hour,
            host_id,
            host_name,
        ))
    })?;

    let mut bookings = vec![];
    for row in rows {
        let (booking, charger_title, charger_address, charger_photo_url, price_per_hour, host_id, host_name) =
            row?;
        bookings.push(DriverBookingRow {
            booking: booking?,
            charger_title,
            charger_address,
            charger_photo_url,
            price_per_hour,
            host_id,
            host_name,
        });
    }
    Ok(bookings)
}

pub fn bookings_for_host(
    conn: &Connection,
    host_id: &str,
    status_filter: Option<&str>,
) -> anyhow::Result<Vec<HostBookingRow>> {
    let mut sql = String::from(
        "SELECT b.id, b.charger_id, b.driver_id, b.booking_date, b.start_time, b.end_time,
                b.total_price, b.status, b.created_at,
                c.title, c.address, c.price_per_hour, u.name, u.email
         FROM bookings b
         INNER JOIN chargers c ON c.id = b.charger_id
         INNER JOIN users u ON u.id = b.driver_id
         WHERE c.host_id = ?1",
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(host_id.to_string())];

    if let Some(status) = status_filter {
        params_vec.push(Box::new(status.to_string()));
        sql.push_str(&format!(" AND b.status = ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY b.created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let charger_title: String = row.get(9)?;
        let charger_address: String = row.get(10)?;
        let price_per_hour: i64 = row.get(11)?;
        let driver_name: String = row.get(12)?;
        let driver_email: String = row.get(13)?;
        Ok((
            parse_booking_row(row),
            charger_title,
            charger_address,
            price_per_hour,
            driver_name,
            driver_email,
        ))
    })?;

    let mut bookings = vec![];
    for row in rows {
        let (booking, charger_title, charger_address, price_per_hour, driver_name, driver_email) =
            row?;
        bookings.push(HostBookingRow {
            booking: booking?,
            charger_title,
            charger_address,
            price_per_hour,
            driver_name,
            driver_email,
        });
    }
    Ok(bookings)
}

pub fn get_booking_detail(conn: &Connection, id: &str) -> anyhow::Result<Option<DriverBookingRow>> {
    let result = conn.query_row(
        "SELECT b.id, b.charger_id, b.driver_id, b.booking_date, b.start_time, b.end_time,
                b.total_price, b.status, b.created_at,
                c.title, c.address, c.photo_url, c.price_per_hour, u.id, u.name
         FROM bookings b
         INNER JOIN chargers c ON c.id = b.charger_id
         INNER JOIN users u ON u.id = c.host_id
         WHERE b.id = ?1",
        params![id],
        |row| {
            let charger_title: String = row.get(9)?;
            let charger_address: String = row.get(10)?;
            let charger_photo_url: Option<String> = row.get(11)?;
            let price_per_hour: i64 = row.get(12)?;
            let host_id: String = row.get(13)?;
            let host_name: String = row.get(14)?;
            Ok((
                parse_booking_row(row),
                charger_title,
                charger_address,
                charger_photo_url,
                price_per_hour,
                host_id,
                host_name,
            ))
        },
    );

    match result {
        Ok((booking, charger_title, charger_address, charger_photo_url, price_per_hour, host_id, host_name)) => {
            Ok(Some(DriverBookingRow {
                booking: booking?,
                charger_title,
                charger_address,
                charger_photo_url,
                price_per_hour,
                host_id,
                host_name,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let charger_id: String = row.get(1)?;
    let driver_id: String = row.get(2)?;
    let booking_date_str: String = row.get(3)?;
    let start_time: String = row.get(4)?;
    let end_time: String = row.get(5)?;
    let total_price: i64 = row.get(6)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(8)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status in row: {status_str}"))?;
    let booking_date = NaiveDate::parse_from_str(&booking_date_str, DATE_FMT)
        .unwrap_or_else(|_| Utc::now().date_naive());
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Booking {
        id,
        charger_id,
        driver_id,
        booking_date,
        start_time,
        end_time,
        total_price,
        status,
        created_at,
    })
}
