//! Address migration
//!
//! Older data stored each address as one free-text block under `address`.
//! Records still carrying that block (and no `address1`) are split into the
//! structured fields; the block is removed afterwards. Running the
//! migration again is a no-op.

use crate::store::{Address, Dataset};

/// City, state and ZIP parsed from a `City, ST 12345[-6789]` line
#[derive(Debug, Clone, PartialEq, Eq)]
struct CityLine {
    city: String,
    state: String,
    zip: String,
}

fn is_zip(s: &str) -> bool {
    let all_digits = |part: &str, len: usize| {
        part.len() == len && part.chars().all(|c| c.is_ascii_digit())
    };

    match s.split_once('-') {
        Some((five, four)) => all_digits(five, 5) && all_digits(four, 4),
        None => all_digits(s, 5),
    }
}

fn parse_city_line(line: &str) -> Option<CityLine> {
    let (city, rest) = line.rsplit_once(',')?;
    let city = city.trim();
    if city.is_empty() {
        return None;
    }

    let mut parts = rest.split_whitespace();
    let state = parts.next()?;
    let zip = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) || !is_zip(zip) {
        return None;
    }

    Some(CityLine {
        city: city.to_string(),
        state: state.to_ascii_uppercase(),
        zip: zip.to_string(),
    })
}

/// Split a free-text address into structured fields.
///
/// Never fails: content that does not fit a field ends up in `address2`.
pub fn parse_legacy_address(text: &str) -> Address {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut address = Address::default();
    let Some((first, rest)) = lines.split_first() else {
        return address;
    };
    address.address1 = first.to_string();

    let Some((last, middle)) = rest.split_last() else {
        return address;
    };

    match parse_city_line(last) {
        Some(city_line) => {
            address.address2 = middle.join(", ");
            address.city = city_line.city;
            address.state = city_line.state;
            address.zip = city_line.zip;
        }
        None => address.address2 = rest.join(", "),
    }
    address
}

/// Migrate one address in place. Returns true if anything changed.
pub fn migrate_address(address: &mut Address) -> bool {
    let Some(legacy) = address.legacy.take() else {
        return false;
    };

    if address.address1.trim().is_empty() {
        let parsed = parse_legacy_address(&legacy);
        address.address1 = parsed.address1;
        if address.address2.is_empty() {
            address.address2 = parsed.address2;
        }
        if address.city.is_empty() {
            address.city = parsed.city;
        }
        if address.state.is_empty() {
            address.state = parsed.state;
        }
        if address.zip.is_empty() {
            address.zip = parsed.zip;
        }
    }
    true
}

/// Migrate every address in the dataset. Returns how many were rewritten.
pub fn migrate_addresses(data: &mut Dataset) -> usize {
    let mut migrated = 0;
    let mut visit = |address: &mut Address| {
        if migrate_address(address) {
            migrated += 1;
        }
    };

    visit(&mut data.settings.business.address);
    for client in &mut data.clients {
        visit(&mut client.address);
    }
    for invoice in &mut data.invoices {
        visit(&mut invoice.body.from_party.address);
        visit(&mut invoice.body.to_party.address);
    }
    for estimate in &mut data.estimates {
        visit(&mut estimate.body.from_party.address);
        visit(&mut estimate.body.to_party.address);
    }

    if migrated > 0 {
        tracing::info!("Migrated {} legacy addresses", migrated);
    }
    migrated
}

/// True when at least one record still carries a legacy address
pub fn needs_migration(data: &Dataset) -> bool {
    let legacy = |a: &Address| a.legacy.is_some();

    legacy(&data.settings.business.address)
        || data.clients.iter().any(|c| legacy(&c.address))
        || data
            .invoices
            .iter()
            .any(|i| legacy(&i.body.from_party.address) || legacy(&i.body.to_party.address))
        || data
            .estimates
            .iter()
            .any(|e| legacy(&e.body.from_party.address) || legacy(&e.body.to_party.address))
}
