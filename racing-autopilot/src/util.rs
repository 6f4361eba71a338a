use anyhow::{anyhow, Context, Result};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn parse_seed(seed: &str) -> Result<u64> {
    let s = seed.trim();
    if s.is_empty() {
        return Err(anyhow!("empty seed"));
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).with_context(|| format!("invalid hex seed: {s}"))
    } else {
        s.parse::<u64>()
            .with_context(|| format!("invalid decimal seed: {s}"))
    }
}

pub fn seed_to_hex(seed: u64) -> String {
    format!("0x{seed:016x}")
}

pub fn now_unix_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_parse_as_hex_or_decimal() {
        assert_eq!(parse_seed("42").expect("decimal"), 42);
        assert_eq!(parse_seed(" 0x2A ").expect("hex"), 42);
        assert_eq!(parse_seed("0XfF").expect("upper prefix"), 255);
        assert!(parse_seed("").is_err());
        assert!(parse_seed("0xzz").is_err());
        assert_eq!(seed_to_hex(255), "0x00000000000000ff");
    }
}
