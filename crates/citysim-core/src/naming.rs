//! Human-readable identifiers: city names, VINs, and license plates.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::IndexedRandom;

/// Built-in pool of city names. When every name has been handed out the
/// generator starts appending a counter.
const CITY_POOL: &[&str] = &[
    "Astapor", "Braavos", "Casterly Rock", "Dorne", "Dragonstone", "Duskendale",
    "Eastwatch", "Gulltown", "Harrenhal", "Highgarden", "Kings Landing", "Lannisport",
    "Lorath", "Lys", "Meereen", "Myr", "Norvos", "Oldtown", "Pentos", "Qarth",
    "Qohor", "Riverrun", "Saltpans", "Sunspear", "Tyrosh", "Volantis", "White Harbor",
    "Winterfell", "Yunkai", "Maidenpool",
];

/// Characters allowed in a VIN (no `I`, `O`, or `Q`).
const VIN_ALPHABET: &[u8] = b"0123456789ABCDEFGHJKLMNPRSTUVWXYZ";

/// VIN length.
const VIN_LENGTH: usize = 17;

/// Letters used on French SIV plates (no `I`, `O`, or `U`).
const PLATE_LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTVWXYZ";

/// A random 17-character vehicle identification number.
pub fn vin<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..VIN_LENGTH)
        .filter_map(|_| VIN_ALPHABET.choose(rng).copied().map(char::from))
        .collect()
}

/// A random license plate in the `AB-123-CD` format.
pub fn license_plate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut letters = || -> String {
        (0..2)
            .filter_map(|_| PLATE_LETTERS.choose(rng).copied().map(char::from))
            .collect()
    };
    let head = letters();
    let tail = letters();
    let number: u16 = rng.random_range(1..=999);
    format!("{head}-{number:03}-{tail}")
}

/// Hands out city names that are unique for the life of the process.
#[derive(Debug, Default)]
pub struct CityNames {
    issued: BTreeSet<String>,
}

impl CityNames {
    /// Create a generator that has issued nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a name that has never been returned before.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        let unused: Vec<&str> = CITY_POOL
            .iter()
            .copied()
            .filter(|name| !self.issued.contains(*name))
            .collect();

        let name = if let Some(name) = unused.choose(rng) {
            (*name).to_owned()
        } else {
            let base = CITY_POOL.choose(rng).copied().unwrap_or("City");
            let mut suffix: u32 = 2;
            loop {
                let candidate = format!("{base} {suffix}");
                if !self.issued.contains(&candidate) {
                    break candidate;
                }
                suffix = suffix.saturating_add(1);
            }
        };

        self.issued.insert(name.clone());
        name
    }
}
