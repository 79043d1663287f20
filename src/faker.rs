//! The Faker collaborator: random-primitive generation kept behind a
//! trait so `ValueFactory` never depends on a concrete RNG or locale
//! library directly.

use std::sync::Mutex;

use chrono::{NaiveDate, NaiveDateTime};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Minimal random-primitive contract. `bothify` substitutes each `#` in
/// `pattern` with a random digit, leaving other characters untouched.
pub trait Faker: Send + Sync {
    fn random_letters(&self, length: u32) -> String;
    fn random_int(&self, min: i64, max: i64) -> i64;
    /// `random_int` cannot span an unsigned `bigint`'s full range
    /// (`u64::MAX` overflows `i64`), so unsigned 64-bit columns draw
    /// from this instead.
    fn random_uint(&self, min: u64, max: u64) -> u64;
    fn random_element(&self, items: &[String]) -> String;
    fn random_elements(&self, items: &[String]) -> Vec<String>;
    fn text(&self, max_nb_chars: usize) -> String;
    fn sentence(&self) -> String;
    fn date(&self) -> NaiveDate;
    fn date_time(&self) -> NaiveDateTime;
    fn unix_time(&self) -> i64;
    fn bothify(&self, pattern: &str) -> String;
    /// Uniform draw in `[0, 1)`, backing `empty_ratio`/`nullable_ratio`
    /// decisions.
    fn ratio(&self) -> f64;
}

/// Default [`Faker`] built on `rand`'s `StdRng` and the `fake` crate's
/// lorem generators. Dates/times are hand-rolled rather than routed
/// through `fake`'s chrono generators, to keep the representation
/// (`chrono::NaiveDate`/`NaiveDateTime`) and range explicit.
pub struct RandFaker {
    rng: Mutex<StdRng>,
}

impl RandFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl Faker for RandFaker {
    fn random_letters(&self, length: u32) -> String {
        let mut rng = self.rng.lock().unwrap();
        (0..length).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
    }

    fn random_int(&self, min: i64, max: i64) -> i64 {
        let mut rng = self.rng.lock().unwrap();
        if min >= max {
            return min;
        }
        rng.gen_range(min..=max)
    }

    fn random_uint(&self, min: u64, max: u64) -> u64 {
        let mut rng = self.rng.lock().unwrap();
        if min >= max {
            return min;
        }
        rng.gen_range(min..=max)
    }

    fn random_element(&self, items: &[String]) -> String {
        let mut rng = self.rng.lock().unwrap();
        items.choose(&mut *rng).cloned().unwrap_or_default()
    }

    fn random_elements(&self, items: &[String]) -> Vec<String> {
        if items.is_empty() {
            return Vec::new();
        }
        let mut rng = self.rng.lock().unwrap();
        let mut chosen: Vec<String> = items.iter().filter(|_| rng.gen_bool(0.5)).cloned().collect();
        if chosen.is_empty() {
            chosen.push(items.choose(&mut *rng).cloned().unwrap_or_default());
        }
        chosen
    }

    fn text(&self, max_nb_chars: usize) -> String {
        let words = (max_nb_chars / 6).max(1);
        let generated: String = {
            let mut rng = self.rng.lock().unwrap();
            Sentence(words..words + 3).fake_with_rng(&mut *rng)
        };
        generated.chars().take(max_nb_chars).collect()
    }

    fn sentence(&self) -> String {
        let mut rng = self.rng.lock().unwrap();
        Sentence(4..12).fake_with_rng(&mut *rng)
    }

    fn date(&self) -> NaiveDate {
        let mut rng = self.rng.lock().unwrap();
        let year = rng.gen_range(1970..=2035);
        let month = rng.gen_range(1..=12);
        let day = rng.gen_range(1..=28);
        NaiveDate::from_ymd_opt(year, month, day).expect("constrained ymd is always valid")
    }

    fn date_time(&self) -> NaiveDateTime {
        let date = self.date();
        let mut rng = self.rng.lock().unwrap();
        let hour = rng.gen_range(0..24);
        let minute = rng.gen_range(0..60);
        let second = rng.gen_range(0..60);
        date.and_hms_opt(hour, minute, second)
            .expect("constrained hms is always valid")
    }

    fn unix_time(&self) -> i64 {
        self.date_time().and_utc().timestamp()
    }

    fn bothify(&self, pattern: &str) -> String {
        let mut rng = self.rng.lock().unwrap();
        pattern
            .chars()
            .map(|c| {
                if c == '#' {
                    std::char::from_digit(rng.gen_range(0..10), 10).unwrap()
                } else {
                    c
                }
            })
            .collect()
    }

    fn ratio(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap();
        rng.gen::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bothify_substitutes_hashes_with_digits() {
        let faker = RandFaker::new(42);
        let formatted = faker.bothify("##.##");
        assert_eq!(formatted.len(), 5);
        assert!(formatted.chars().nth(2) == Some('.'));
        assert!(formatted.chars().filter(|c| *c != '.').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn random_int_respects_bounds() {
        let faker = RandFaker::new(7);
        for _ in 0..50 {
            let v = faker.random_int(-5, 5);
            assert!((-5..=5).contains(&v));
        }
    }

    #[test]
    fn random_elements_never_empty_for_nonempty_input() {
        let faker = RandFaker::new(1);
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        for _ in 0..20 {
            assert!(!faker.random_elements(&items).is_empty());
        }
    }

    #[test]
    fn ratio_is_within_unit_interval() {
        let faker = RandFaker::new(3);
        for _ in 0..50 {
            let r = faker.ratio();
            assert!((0.0..1.0).contains(&r));
        }
    }
}
