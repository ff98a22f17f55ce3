use rand::{Rng, RngCore};

pub(crate) const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Carmen", "David", "Elena", "Fatima", "George", "Hana", "Ivan", "Julia",
    "Kenji", "Laura", "Miguel", "Nora", "Oscar", "Paula", "Quentin", "Rosa", "Samuel", "Teresa",
    "Umar", "Vera", "Walter", "Ximena", "Yusuf", "Zoe",
];

pub(crate) const LAST_NAMES: &[&str] = &[
    "Anderson", "Baker", "Castro", "Dubois", "Evans", "Fischer", "Garcia", "Hughes", "Ibarra",
    "Jensen", "Kowalski", "Lopez", "Martin", "Novak", "Olsen", "Petrov", "Quinn", "Rossi",
    "Silva", "Tanaka", "Ueda", "Varga", "Weber", "Young", "Zimmer",
];

pub(crate) const EMAIL_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "mail.test",
    "inbox.invalid",
];

pub(crate) const TLDS: &[&str] = &["com", "org", "net", "io", "dev"];

pub(crate) const STREETS: &[&str] = &[
    "Oak", "Maple", "Cedar", "Elm", "Pine", "Willow", "Birch", "Chestnut", "Harbor", "Mill",
];

pub(crate) const STREET_SUFFIXES: &[&str] = &["Street", "Avenue", "Road", "Lane", "Way", "Court"];

pub(crate) const CITIES: &[&str] = &[
    "Springfield",
    "Riverton",
    "Lakeside",
    "Fairview",
    "Greenville",
    "Bristol",
    "Clayton",
    "Milton",
];

pub(crate) const COMPANY_SUFFIXES: &[&str] = &["Ltd", "Inc", "Group", "Partners", "Labs", "SL"];

pub(crate) const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
];

pub(crate) fn pick<'a>(rng: &mut dyn RngCore, words: &[&'a str]) -> &'a str {
    words[rng.random_range(0..words.len())]
}

/// `count` random decimal digits.
pub(crate) fn digits(rng: &mut dyn RngCore, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Replaces every `#` in `template` with a random digit.
pub(crate) fn numerify(rng: &mut dyn RngCore, template: &str) -> String {
    template
        .chars()
        .map(|ch| {
            if ch == '#' {
                char::from(b'0' + rng.random_range(0..10u8))
            } else {
                ch
            }
        })
        .collect()
}
