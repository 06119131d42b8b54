use std::net::IpAddr;

/// Fully validated run configuration consumed by the echo engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub ip_version: u8,
    pub dest: String,
    pub count: u32,
    /// Size of the whole IP datagram, headers included.
    pub size: usize,
    pub payload: Vec<u8>,
    pub ttl: u32,
    pub timeout_secs: u64,
}

pub const DEFAULT_PAYLOAD: [u8; 2] = [0xAB, 0xCD];

impl Default for Config {
    fn default() -> Self {
        Self {
            ip_version: 4,
            dest: String::new(),
            count: 5,
            size: 100,
            payload: DEFAULT_PAYLOAD.to_vec(),
            ttl: 64,
            timeout_secs: 2,
        }
    }
}

impl Config {
    /// The destination must be an address literal; IPv4 runs also require an
    /// IPv4 literal.
    pub fn valid_ip(&self) -> bool {
        match self.dest.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => true,
            Ok(IpAddr::V6(addr)) => self.ip_version != 4 || addr.to_ipv4_mapped().is_some(),
            Err(_) => false,
        }
    }
}

/// Bare keyword accepted on the command line in place of its long flag.
#[derive(Debug, Clone, Copy)]
pub struct Keyword {
    pub name: &'static str,
    /// Shortest accepted abbreviation.
    pub min_len: usize,
    pub flag: &'static str,
    pub short: Option<&'static str>,
    pub takes_value: bool,
}

pub const KEYWORDS: &[Keyword] = &[
    Keyword { name: "help", min_len: 1, flag: "--help", short: Some("-h"), takes_value: false },
    Keyword { name: "ipv4", min_len: 4, flag: "--ipv4", short: None, takes_value: false },
    Keyword { name: "ipv6", min_len: 4, flag: "--ipv6", short: None, takes_value: false },
    Keyword { name: "count", min_len: 1, flag: "--count", short: Some("-c"), takes_value: true },
    Keyword { name: "size", min_len: 1, flag: "--size", short: Some("-s"), takes_value: true },
    Keyword { name: "payload", min_len: 1, flag: "--payload", short: Some("-p"), takes_value: true },
    Keyword { name: "ttl", min_len: 2, flag: "--ttl", short: None, takes_value: true },
    Keyword { name: "timeout", min_len: 2, flag: "--timeout", short: Some("-t"), takes_value: true },
];

impl Keyword {
    fn matches(&self, word: &str) -> bool {
        word.len() >= self.min_len && self.name.starts_with(word)
    }

    fn is_flag(&self, arg: &str) -> bool {
        self.flag == arg || self.short == Some(arg)
    }
}

/// Whether `arg` is a dashed flag whose value is the next word.
fn flag_takes_value(arg: &str) -> bool {
    KEYWORDS.iter().any(|k| k.takes_value && k.is_flag(arg))
}

/// Look up a bare word. `?` is an alias for help.
pub fn keyword(word: &str) -> Option<&'static Keyword> {
    if word == "?" {
        return KEYWORDS.first();
    }
    KEYWORDS.iter().find(|k| k.matches(&word.to_ascii_lowercase()))
}

/// Rewrite Cisco-style keywords (`count 10 size 60 ipv6 ::1`) into long flags.
///
/// The word after a value keyword is passed through untouched, as is anything
/// that is not a keyword (flags, the destination).
pub fn normalize_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out = Vec::new();
    let mut expect_value = false;

    for arg in args {
        let arg = arg.into();
        if expect_value {
            out.push(arg);
            expect_value = false;
            continue;
        }

        if arg.starts_with('-') {
            expect_value = flag_takes_value(&arg);
            out.push(arg);
            continue;
        }

        match keyword(&arg) {
            Some(k) => {
                out.push(k.flag.to_string());
                expect_value = k.takes_value;
            }
            None => out.push(arg),
        }
    }

    out
}
