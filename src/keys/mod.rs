// ABOUTME: Key sequence types and translation of logical key names to platform key codes
// ABOUTME: Sequences are mapped up front so an unknown key aborts before anything is sent

mod table;

use crate::error::BackendError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

/// One entry of a simulated key sequence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeyEvent {
    pub name: String,
    pub down: bool,
    /// Milliseconds to wait before this event is sent.
    #[serde(default)]
    pub delay_ms: u64,
}

impl KeyEvent {
    pub fn new(name: &str, down: bool, delay_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            down,
            delay_ms,
        }
    }

    /// Parses the `name:down:delay` form used on the command line, e.g. `ControlLeft:down:0`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.split(':');
        let name = parts.next().filter(|n| !n.is_empty());
        let Some(name) = name else {
            anyhow::bail!("Key event '{}' has no key name", spec);
        };

        let down = match parts.next().map(|s| s.to_ascii_lowercase()) {
            None => true,
            Some(s) if s == "down" || s == "press" => true,
            Some(s) if s == "up" || s == "release" => false,
            Some(other) => anyhow::bail!("Key event '{}': expected 'down' or 'up', got '{}'", spec, other),
        };

        let delay_ms = match parts.next() {
            Some(delay) => delay
                .parse()
                .map_err(|_| anyhow::anyhow!("Key event '{}': invalid delay '{}'", spec, delay))?,
            None => 0,
        };

        Ok(Self::new(name, down, delay_ms))
    }
}

/// The code space a key name is translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPlatform {
    Windows,
    Macos,
    Linux,
}

impl fmt::Display for KeyPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyPlatform::Windows => "windows",
            KeyPlatform::Macos => "macos",
            KeyPlatform::Linux => "linux",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub(crate) struct KeyCode {
    pub name: &'static str,
    pub windows: Option<u32>,
    pub macos: Option<u32>,
    pub linux: Option<u32>,
}

impl KeyCode {
    fn code_for(&self, platform: KeyPlatform) -> Option<u32> {
        match platform {
            KeyPlatform::Windows => self.windows,
            KeyPlatform::Macos => self.macos,
            KeyPlatform::Linux => self.linux,
        }
    }
}

// Short names people type instead of DOM codes.
const ALIASES: &[(&str, &str)] = &[
    ("ctrl", "ControlLeft"),
    ("control", "ControlLeft"),
    ("shift", "ShiftLeft"),
    ("alt", "AltLeft"),
    ("option", "AltLeft"),
    ("altgr", "AltRight"),
    ("meta", "MetaLeft"),
    ("super", "MetaLeft"),
    ("cmd", "MetaLeft"),
    ("command", "MetaLeft"),
    ("win", "MetaLeft"),
    ("esc", "Escape"),
    ("return", "Enter"),
    ("up", "ArrowUp"),
    ("down", "ArrowDown"),
    ("left", "ArrowLeft"),
    ("right", "ArrowRight"),
    ("del", "Delete"),
    ("ins", "Insert"),
    ("pgup", "PageUp"),
    ("pgdn", "PageDown"),
    ("pagedown", "PageDown"),
    ("pageup", "PageUp"),
    ("plus", "Equal"),
    ("volumeup", "AudioVolumeUp"),
    ("volumedown", "AudioVolumeDown"),
    ("volumemute", "AudioVolumeMute"),
    ("mediaplaypause", "MediaPlayPause"),
    ("medianexttrack", "MediaTrackNext"),
    ("mediaprevioustrack", "MediaTrackPrevious"),
    ("printscreen", "PrintScreen"),
];

static KEYS_BY_NAME: LazyLock<HashMap<String, &'static KeyCode>> = LazyLock::new(|| {
    let mut keys: HashMap<String, &'static KeyCode> = table::KEY_TABLE
        .iter()
        .map(|key| (key.name.to_ascii_lowercase(), key))
        .collect();

    for (alias, target) in ALIASES {
        if let Some(key) = keys.get(&target.to_ascii_lowercase()).copied() {
            keys.entry(alias.to_string()).or_insert(key);
        }
    }

    keys
});

fn lookup(name: &str) -> Option<&'static KeyCode> {
    KEYS_BY_NAME.get(&name.to_ascii_lowercase()).copied()
}

/// Returns the canonical DOM code spelling of a known key, e.g. `keyk` -> `KeyK`.
pub fn canonical_key_name(name: &str) -> Option<&'static str> {
    lookup(name).map(|key| key.name)
}

/// Code of a single key for `platform`.
pub fn key_code(name: &str, platform: KeyPlatform) -> Result<u32> {
    lookup(name)
        .and_then(|code| code.code_for(platform))
        .ok_or_else(|| {
            BackendError::UnknownKey {
                name: name.to_string(),
                platform: platform.to_string(),
            }
            .into()
        })
}

/// Translates every key of the sequence for `platform`, failing on the first unknown name.
pub fn map_keys(keys: &[KeyEvent], platform: KeyPlatform) -> Result<Vec<u32>> {
    keys.iter().map(|key| key_code(&key.name, platform)).collect()
}

/// Maps the whole sequence, then sends each event in order after waiting its delay.
///
/// Nothing reaches `send` unless every key name resolved.
pub async fn dispatch_key_sequence<F, Fut>(
    keys: &[KeyEvent],
    platform: KeyPlatform,
    mut send: F,
) -> Result<()>
where
    F: FnMut(u32, bool) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let codes = map_keys(keys, platform)?;

    for (key, code) in keys.iter().zip(codes) {
        if key.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(key.delay_ms)).await;
        }
        tracing::debug!("Sending key {} ({:#06x}) down={}", key.name, code, key.down);
        send(code, key.down).await?;
    }

    Ok(())
}

/// Resolves the key part of an accelerator (`K`, `5`, `F5`, `Space`, `Up`, `-`) to a DOM code name.
pub fn key_code_for_accelerator_key(token: &str) -> Option<&'static str> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        let name = match c {
            'a'..='z' | 'A'..='Z' => format!("Key{}", c.to_ascii_uppercase()),
            '0'..='9' => format!("Digit{}", c),
            '-' => "Minus".to_string(),
            '=' | '+' => "Equal".to_string(),
            ',' => "Comma".to_string(),
            '.' => "Period".to_string(),
            '/' => "Slash".to_string(),
            ';' => "Semicolon".to_string(),
            '\'' => "Quote".to_string(),
            '`' => "Backquote".to_string(),
            '[' => "BracketLeft".to_string(),
            ']' => "BracketRight".to_string(),
            '\\' => "Backslash".to_string(),
            ' ' => "Space".to_string(),
            _ => return None,
        };
        return canonical_key_name(&name);
    }

    let lower = token.to_ascii_lowercase();
    if let Some(digit) = lower.strip_prefix("num").filter(|d| d.len() == 1) {
        return canonical_key_name(&format!("Numpad{}", digit));
    }

    canonical_key_name(&lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::backend_error;
    use std::sync::Mutex;

    #[test]
    fn test_map_keys_preserves_order_and_length() {
        let keys = vec![
            KeyEvent::new("ControlLeft", true, 0),
            KeyEvent::new("KeyC", true, 0),
            KeyEvent::new("KeyC", false, 0),
            KeyEvent::new("ControlLeft", false, 0),
        ];

        let codes = map_keys(&keys, KeyPlatform::Linux).unwrap();
        assert_eq!(codes, vec![0x25, 0x36, 0x36, 0x25]);

        let codes = map_keys(&keys, KeyPlatform::Windows).unwrap();
        assert_eq!(codes, vec![0x1d, 0x2e, 0x2e, 0x1d]);
    }

    #[test]
    fn test_map_keys_is_case_insensitive() {
        let keys = vec![KeyEvent::new("arrowup", true, 0), KeyEvent::new("ARROWUP", false, 0)];
        assert_eq!(map_keys(&keys, KeyPlatform::Macos).unwrap(), vec![0x7e, 0x7e]);
    }

    #[test]
    fn test_map_keys_aliases() {
        let keys = vec![KeyEvent::new("ctrl", true, 0), KeyEvent::new("esc", true, 0)];
        assert_eq!(map_keys(&keys, KeyPlatform::Linux).unwrap(), vec![0x25, 0x09]);
    }

    #[test]
    fn test_map_keys_unknown_name() {
        let keys = vec![KeyEvent::new("KeyA", true, 0), KeyEvent::new("Hyper", true, 0)];
        let error = map_keys(&keys, KeyPlatform::Linux).unwrap_err();

        assert_eq!(
            backend_error(&error),
            Some(&BackendError::UnknownKey {
                name: "Hyper".to_string(),
                platform: "linux".to_string(),
            })
        );
    }

    #[test]
    fn test_map_keys_missing_on_platform() {
        // "Again" only exists on Linux.
        let keys = vec![KeyEvent::new("Again", true, 0)];
        assert!(map_keys(&keys, KeyPlatform::Linux).is_ok());
        assert!(map_keys(&keys, KeyPlatform::Windows).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_sends_nothing_when_a_key_is_unknown() {
        let sent = Mutex::new(Vec::new());
        let keys = vec![
            KeyEvent::new("ShiftLeft", true, 0),
            KeyEvent::new("NotAKey", true, 0),
        ];

        let result = dispatch_key_sequence(&keys, KeyPlatform::Linux, |code, down| {
            sent.lock().unwrap().push((code, down));
            async { Ok(()) }
        })
        .await;

        assert!(result.is_err());
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_honors_delays_in_order() {
        let start = tokio::time::Instant::now();
        let sent = Mutex::new(Vec::new());
        let keys = vec![
            KeyEvent::new("KeyA", true, 0),
            KeyEvent::new("KeyA", false, 50),
            KeyEvent::new("KeyB", true, 0),
            KeyEvent::new("KeyB", false, 20),
        ];

        dispatch_key_sequence(&keys, KeyPlatform::Linux, |code, down| {
            sent.lock().unwrap().push((code, down, start.elapsed().as_millis()));
            async { Ok(()) }
        })
        .await
        .unwrap();

        let sent = sent.into_inner().unwrap();
        let events: Vec<(u32, bool)> = sent.iter().map(|(c, d, _)| (*c, *d)).collect();
        assert_eq!(events, vec![(0x26, true), (0x26, false), (0x38, true), (0x38, false)]);

        let times: Vec<u128> = sent.iter().map(|(_, _, t)| *t).collect();
        assert_eq!(times[0], 0);
        assert!(times[1] >= 50 && times[1] < 55);
        assert_eq!(times[2], times[1]);
        assert!(times[3] >= times[2] + 20 && times[3] < 80);
    }

    #[tokio::test]
    async fn test_dispatch_stops_on_send_error() {
        let mut count = 0;
        let keys = vec![KeyEvent::new("KeyA", true, 0), KeyEvent::new("KeyA", false, 0)];

        let result = dispatch_key_sequence(&keys, KeyPlatform::Linux, |_, _| {
            count += 1;
            async { Err(anyhow::anyhow!("device gone")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_parse_key_event() {
        assert_eq!(
            KeyEvent::parse("ControlLeft:down:10").unwrap(),
            KeyEvent::new("ControlLeft", true, 10)
        );
        assert_eq!(KeyEvent::parse("KeyV:up").unwrap(), KeyEvent::new("KeyV", false, 0));
        assert_eq!(KeyEvent::parse("Enter").unwrap(), KeyEvent::new("Enter", true, 0));
        assert!(KeyEvent::parse("KeyV:sideways").is_err());
        assert!(KeyEvent::parse(":down").is_err());
        assert!(KeyEvent::parse("KeyV:down:soon").is_err());
    }

    #[test]
    fn test_accelerator_keys() {
        assert_eq!(key_code_for_accelerator_key("k"), Some("KeyK"));
        assert_eq!(key_code_for_accelerator_key("K"), Some("KeyK"));
        assert_eq!(key_code_for_accelerator_key("5"), Some("Digit5"));
        assert_eq!(key_code_for_accelerator_key("F12"), Some("F12"));
        assert_eq!(key_code_for_accelerator_key("Space"), Some("Space"));
        assert_eq!(key_code_for_accelerator_key("Up"), Some("ArrowUp"));
        assert_eq!(key_code_for_accelerator_key("num7"), Some("Numpad7"));
        assert_eq!(key_code_for_accelerator_key("-"), Some("Minus"));
        assert_eq!(key_code_for_accelerator_key("KeyQ"), Some("KeyQ"));
        assert_eq!(key_code_for_accelerator_key("Hyper"), None);
    }
}
