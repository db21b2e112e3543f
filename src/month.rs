use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref MONTH_NAMES: HashMap<&'static str, u32> = {
        let names: [(&[&'static str], u32); 12] = [
            (&["yanvar", "январ", "январь", "january", "jan"], 1),
            (&["fevral", "феврал", "февраль", "february", "feb"], 2),
            (&["mart", "март", "march", "mar"], 3),
            (&["aprel", "апрел", "апрель", "april", "apr"], 4),
            (&["may", "май", "мая"], 5),
            (&["iyun", "июн", "июнь", "june", "jun"], 6),
            (&["iyul", "июл", "июль", "july", "jul"], 7),
            (&["avgust", "август", "august", "aug"], 8),
            (&["sentabr", "sentyabr", "сентябр", "сентябрь", "september", "sep"], 9),
            (&["oktabr", "oktyabr", "октябр", "октябрь", "october", "oct"], 10),
            (&["noyabr", "ноябр", "ноябрь", "november", "nov"], 11),
            (&["dekabr", "декабр", "декабрь", "december", "dec"], 12),
        ];
        names
            .iter()
            .flat_map(|(aliases, month)| aliases.iter().map(move |alias| (*alias, *month)))
            .collect()
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingMonth {
    year: i32,
    month: u32,
}

impl BillingMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (1900..=9999).contains(&year) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::of(Utc::now().naive_utc().date())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Parses `YYYY-MM`, or a month name placed in `year`.
    pub fn parse_in(input: &str, year: i32) -> Result<Self, String> {
        let trimmed = input.trim();
        if let Some((y, m)) = trimmed.split_once('-') {
            if let (Ok(y), Ok(m)) = (y.parse::<i32>(), m.parse::<u32>()) {
                return Self::new(y, m).ok_or_else(|| format!("Invalid month `{}`", input));
            }
        }
        let lowered = trimmed.to_lowercase();
        let name = lowered.trim_end_matches(" oyi").trim();
        MONTH_NAMES
            .get(name)
            .and_then(|month| Self::new(year, *month))
            .ok_or_else(|| format!("Invalid month `{}`, expected YYYY-MM", input))
    }
}

impl FromStr for BillingMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_in(s, Utc::now().year())
    }
}

impl TryFrom<String> for BillingMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillingMonth> for String {
    fn from(month: BillingMonth) -> Self {
        month.to_string()
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
