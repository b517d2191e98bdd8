// ABOUTME: Parsing of Electron-style shortcut triggers such as "CommandOrControl+Shift+K"
// ABOUTME: Renders them for GNOME (GDK accelerators) and for the global-hotkey crate

use crate::error::BackendError;
use crate::keys::key_code_for_accelerator_key;
use anyhow::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub control: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    /// `Option` on macOS; only meaningful to the global-hotkey path.
    pub option: bool,
    pub alt_gr: bool,
}

/// A parsed shortcut trigger: a set of modifiers plus exactly one key, as a DOM code name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accelerator {
    pub trigger: String,
    pub modifiers: Modifiers,
    pub key: &'static str,
}

impl Accelerator {
    pub fn parse(trigger: &str) -> Result<Self> {
        let trimmed = trigger.trim();
        if trimmed.is_empty() {
            return Err(BackendError::invalid_shortcut(trigger, "trigger is empty").into());
        }

        let mut modifiers = Modifiers::default();
        let mut key = None;

        for part in split_parts(trimmed) {
            let part = part.trim();
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.control = true,
                "commandorcontrol" | "cmdorctrl" | "command" | "cmd" => {
                    // Command is the Cmd key on macOS and Ctrl everywhere else.
                    if cfg!(target_os = "macos") {
                        modifiers.meta = true
                    } else {
                        modifiers.control = true
                    }
                }
                "alt" => modifiers.alt = true,
                "option" => modifiers.option = true,
                "altgr" => modifiers.alt_gr = true,
                "shift" => modifiers.shift = true,
                "super" | "meta" => modifiers.meta = true,
                "" => {
                    return Err(BackendError::invalid_shortcut(trigger, "empty key name").into());
                }
                _ => {
                    if key.is_some() {
                        return Err(
                            BackendError::invalid_shortcut(trigger, "more than one key").into()
                        );
                    }
                    let code = key_code_for_accelerator_key(part).ok_or_else(|| {
                        BackendError::invalid_shortcut(trigger, format!("unknown key '{}'", part))
                    })?;
                    key = Some(code);
                }
            }
        }

        let key = key.ok_or_else(|| BackendError::invalid_shortcut(trigger, "no key specified"))?;

        Ok(Self {
            trigger: trigger.to_string(),
            modifiers,
            key,
        })
    }

    /// Renders the trigger as a GDK accelerator, e.g. `<Ctrl><Shift>k`.
    pub fn to_gdk(&self) -> Result<String> {
        if self.modifiers.option || self.modifiers.alt_gr {
            return Err(BackendError::invalid_shortcut(
                &self.trigger,
                "Option and AltGr are not supported on GNOME",
            )
            .into());
        }

        let mut out = String::new();
        if self.modifiers.control {
            out.push_str("<Ctrl>");
        }
        if self.modifiers.alt {
            out.push_str("<Alt>");
        }
        if self.modifiers.shift {
            out.push_str("<Shift>");
        }
        if self.modifiers.meta {
            out.push_str("<Super>");
        }
        out.push_str(&gdk_key_name(self.key));
        Ok(out)
    }

    /// Renders the trigger in the syntax `global_hotkey::hotkey::HotKey` parses.
    pub fn to_hotkey_string(&self) -> Result<String> {
        if self.modifiers.alt_gr {
            return Err(
                BackendError::invalid_shortcut(&self.trigger, "AltGr cannot be used here").into(),
            );
        }

        let mut parts = Vec::new();
        if self.modifiers.control {
            parts.push("control");
        }
        if self.modifiers.alt || self.modifiers.option {
            parts.push("alt");
        }
        if self.modifiers.shift {
            parts.push("shift");
        }
        if self.modifiers.meta {
            parts.push("super");
        }
        parts.push(self.key);
        Ok(parts.join("+"))
    }
}

// "Ctrl++" means Ctrl and the plus key, so a trailing empty piece belongs to the key.
fn split_parts(trigger: &str) -> Vec<&str> {
    if let Some(head) = trigger.strip_suffix("++") {
        let mut parts: Vec<&str> = head.split('+').collect();
        parts.push("+");
        return parts;
    }
    trigger.split('+').collect()
}

fn gdk_key_name(code: &str) -> String {
    if let Some(letter) = code.strip_prefix("Key") {
        return letter.to_ascii_lowercase();
    }
    if let Some(digit) = code.strip_prefix("Digit") {
        return digit.to_string();
    }
    if let Some(digit) = code.strip_prefix("Numpad").filter(|d| d.len() == 1) {
        return format!("KP_{}", digit);
    }

    let name = match code {
        "ArrowUp" => "Up",
        "ArrowDown" => "Down",
        "ArrowLeft" => "Left",
        "ArrowRight" => "Right",
        "Enter" => "Return",
        "Backspace" => "BackSpace",
        "PageUp" => "Page_Up",
        "PageDown" => "Page_Down",
        "Space" => "space",
        "Minus" => "minus",
        "Equal" => "equal",
        "Comma" => "comma",
        "Period" => "period",
        "Slash" => "slash",
        "Backslash" => "backslash",
        "Semicolon" => "semicolon",
        "Quote" => "apostrophe",
        "Backquote" => "grave",
        "BracketLeft" => "bracketleft",
        "BracketRight" => "bracketright",
        other => other,
    };
    name.to_string()
}
