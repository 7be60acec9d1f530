//! Mapping manifest control descriptions to concrete key events.
//!
//! Manifest entries describe controls in free text ("Arrow keys", "A/D to
//! steer", "WASD + Space"). The responsiveness check needs one concrete key
//! to press, so this module picks the first recognizable movement token.
//! When nothing matches, the probe skips the check rather than pressing a
//! key the game may not listen to.

/// A key the browser can synthesize via `Input.dispatchKeyEvent`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyToken {
    /// DOM `KeyboardEvent.key` value.
    pub key: &'static str,
    /// DOM `KeyboardEvent.code` value.
    pub code: &'static str,
    /// Windows virtual key code, which CDP uses for `keyCode` fills.
    pub key_code: u32,
}

impl KeyToken {
    const fn new(key: &'static str, code: &'static str, key_code: u32) -> Self {
        Self {
            key,
            code,
            key_code,
        }
    }
}

const ARROW_LEFT: KeyToken = KeyToken::new("ArrowLeft", "ArrowLeft", 37);
const ARROW_UP: KeyToken = KeyToken::new("ArrowUp", "ArrowUp", 38);
const ARROW_RIGHT: KeyToken = KeyToken::new("ArrowRight", "ArrowRight", 39);
const ARROW_DOWN: KeyToken = KeyToken::new("ArrowDown", "ArrowDown", 40);
const SPACE: KeyToken = KeyToken::new(" ", "Space", 32);

/// Pick a movement key from a free-text input description.
///
/// Recognized forms, in priority order: explicit arrow names, the generic
/// "arrow"/"arrows" word, WASD (as a cluster or slash-separated pair),
/// space, then any standalone letter. Returns `None` for descriptions like
/// "mouse" or "touch" where no key press is meaningful.
pub fn derive_movement_key(description: &str) -> Option<KeyToken> {
    let lower = description.to_ascii_lowercase();

    if lower.contains("arrowleft") || lower.contains("left arrow") {
        return Some(ARROW_LEFT);
    }
    if lower.contains("arrowright") || lower.contains("right arrow") {
        return Some(ARROW_RIGHT);
    }
    if lower.contains("arrowup") || lower.contains("up arrow") {
        return Some(ARROW_UP);
    }
    if lower.contains("arrowdown") || lower.contains("down arrow") {
        return Some(ARROW_DOWN);
    }
    if lower.contains("arrow") {
        // "Arrow keys", "arrows": pick left, every directional game reacts
        // to at least one horizontal arrow.
        return Some(ARROW_LEFT);
    }

    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.iter().any(|t| *t == "wasd") {
        return Some(letter_token('a'));
    }
    if tokens.iter().any(|t| *t == "space" || *t == "spacebar") {
        return Some(SPACE);
    }
    if lower.contains("left") {
        return Some(ARROW_LEFT);
    }
    if lower.contains("right") {
        return Some(ARROW_RIGHT);
    }

    tokens
        .iter()
        .find(|t| t.len() == 1 && t.chars().all(|c| c.is_ascii_alphabetic()))
        .map(|t| letter_token(t.chars().next().unwrap()))
}

fn letter_token(letter: char) -> KeyToken {
    // Static tables keep KeyToken free of owned strings; CDP wants the
    // exact KeyboardEvent.key / .code spellings.
    const KEYS: [(&str, &str); 26] = [
        ("a", "KeyA"),
        ("b", "KeyB"),
        ("c", "KeyC"),
        ("d", "KeyD"),
        ("e", "KeyE"),
        ("f", "KeyF"),
        ("g", "KeyG"),
        ("h", "KeyH"),
        ("i", "KeyI"),
        ("j", "KeyJ"),
        ("k", "KeyK"),
        ("l", "KeyL"),
        ("m", "KeyM"),
        ("n", "KeyN"),
        ("o", "KeyO"),
        ("p", "KeyP"),
        ("q", "KeyQ"),
        ("r", "KeyR"),
        ("s", "KeyS"),
        ("t", "KeyT"),
        ("u", "KeyU"),
        ("v", "KeyV"),
        ("w", "KeyW"),
        ("x", "KeyX"),
        ("y", "KeyY"),
        ("z", "KeyZ"),
    ];

    let idx = (letter.to_ascii_lowercase() as u8 - b'a') as usize;
    let (key, code) = KEYS[idx];
    KeyToken::new(key, code, u32::from(letter.to_ascii_uppercase() as u8))
}
