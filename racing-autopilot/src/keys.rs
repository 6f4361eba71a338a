//! Scripted keyboard input for headless player runs.
//!
//! A script is a comma separated list of frames. Each frame is an optional
//! `<count>x` repeat prefix followed by the held keys: `A` accelerate,
//! `L` left, `R` right, `-` nothing held. `40xA,10xAL,-` holds the
//! throttle for 40 ticks, throttle and left for 10, then releases for one.

use anyhow::{anyhow, Context, Result};
use racing_core::KeyState;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyScript {
    frames: Vec<(u32, KeyState)>,
}

impl KeyScript {
    pub fn parse(input: &str) -> Result<Self> {
        let mut frames = Vec::new();
        for token in input.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (count, keys) = match token.split_once(['x', 'X']) {
                Some((count, keys)) if count.chars().all(|c| c.is_ascii_digit()) => {
                    let count = count
                        .parse::<u32>()
                        .with_context(|| format!("invalid repeat count in '{token}'"))?;
                    (count, keys)
                }
                _ => (1, token),
            };
            frames.push((count, parse_keys(keys).with_context(|| format!("in '{token}'"))?));
        }
        if frames.is_empty() {
            return Err(anyhow!("key script is empty"));
        }
        Ok(Self { frames })
    }

    pub fn total_ticks(&self) -> u64 {
        self.frames.iter().map(|(count, _)| u64::from(*count)).sum()
    }

    /// Key state per tick, in order.
    pub fn ticks(&self) -> impl Iterator<Item = KeyState> + '_ {
        self.frames
            .iter()
            .flat_map(|(count, keys)| std::iter::repeat(*keys).take(*count as usize))
    }
}

fn parse_keys(raw: &str) -> Result<KeyState> {
    let mut keys = KeyState::default();
    for ch in raw.chars() {
        match ch.to_ascii_uppercase() {
            'A' => keys.accelerate = true,
            'L' => keys.left = true,
            'R' => keys.right = true,
            '-' => {}
            other => return Err(anyhow!("unknown key '{other}', expected A, L, R or -")),
        }
    }
    if raw.is_empty() {
        return Err(anyhow!("missing keys after repeat count"));
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_prefixes_expand() {
        let script = KeyScript::parse("3xA, 2xal ,-,R").expect("valid script");
        assert_eq!(script.total_ticks(), 7);
        let ticks: Vec<KeyState> = script.ticks().collect();
        assert!(ticks[..3].iter().all(|k| k.accelerate && !k.left));
        assert!(ticks[3].accelerate && ticks[3].left);
        assert_eq!(ticks[5], KeyState::default());
        assert!(ticks[6].right && !ticks[6].accelerate);
    }

    #[test]
    fn bad_scripts_are_rejected() {
        assert!(KeyScript::parse("").is_err());
        assert!(KeyScript::parse("4xQ").is_err());
        assert!(KeyScript::parse("4x").is_err());
    }
}
