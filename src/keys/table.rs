// ABOUTME: Static table mapping DOM key code names to Windows, macOS and Linux key codes
// ABOUTME: Windows values are scan codes (0xe0 prefix = extended), Linux values are X11 keycodes

use super::KeyCode;

pub(super) static KEY_TABLE: &[KeyCode] = &[
    KeyCode { name: "Again", windows: None, macos: None, linux: Some(0x0089) },
    KeyCode { name: "AltLeft", windows: Some(0x0038), macos: Some(0x003a), linux: Some(0x0040) },
    KeyCode { name: "AltRight", windows: Some(0xe038), macos: Some(0x003d), linux: Some(0x006c) },
    KeyCode { name: "ArrowDown", windows: Some(0xe050), macos: Some(0x007d), linux: Some(0x0074) },
    KeyCode { name: "ArrowLeft", windows: Some(0xe04b), macos: Some(0x007b), linux: Some(0x0071) },
    KeyCode { name: "ArrowRight", windows: Some(0xe04d), macos: Some(0x007c), linux: Some(0x0072) },
    KeyCode { name: "ArrowUp", windows: Some(0xe048), macos: Some(0x007e), linux: Some(0x006f) },
    KeyCode { name: "AudioVolumeDown", windows: Some(0xe02e), macos: Some(0x0049), linux: Some(0x007a) },
    KeyCode { name: "AudioVolumeMute", windows: Some(0xe020), macos: Some(0x004a), linux: Some(0x0079) },
    KeyCode { name: "AudioVolumeUp", windows: Some(0xe030), macos: Some(0x0048), linux: Some(0x007b) },
    KeyCode { name: "Backquote", windows: Some(0x0029), macos: Some(0x0032), linux: Some(0x0031) },
    KeyCode { name: "Backslash", windows: Some(0x002b), macos: Some(0x002a), linux: Some(0x0033) },
    KeyCode { name: "Backspace", windows: Some(0x000e), macos: Some(0x0033), linux: Some(0x0016) },
    KeyCode { name: "BracketLeft", windows: Some(0x001a), macos: Some(0x0021), linux: Some(0x0022) },
    KeyCode { name: "BracketRight", windows: Some(0x001b), macos: Some(0x001e), linux: Some(0x0023) },
    KeyCode { name: "BrowserBack", windows: Some(0xe06a), macos: None, linux: Some(0x00a6) },
    KeyCode { name: "BrowserFavorites", windows: Some(0xe066), macos: None, linux: Some(0x00a4) },
    KeyCode { name: "BrowserForward", windows: Some(0xe069), macos: None, linux: Some(0x00a7) },
    KeyCode { name: "BrowserHome", windows: Some(0xe032), macos: None, linux: Some(0x00b4) },
    KeyCode { name: "BrowserRefresh", windows: Some(0xe067), macos: None, linux: Some(0x00b5) },
    KeyCode { name: "BrowserSearch", windows: Some(0xe065), macos: None, linux: Some(0x00e1) },
    KeyCode { name: "BrowserStop", windows: Some(0xe068), macos: None, linux: Some(0x0088) },
    KeyCode { name: "CapsLock", windows: Some(0x003a), macos: Some(0x0039), linux: Some(0x0042) },
    KeyCode { name: "Comma", windows: Some(0x0033), macos: Some(0x002b), linux: Some(0x003b) },
    KeyCode { name: "ContextMenu", windows: Some(0xe05d), macos: Some(0x006e), linux: Some(0x0087) },
    KeyCode { name: "ControlLeft", windows: Some(0x001d), macos: Some(0x003b), linux: Some(0x0025) },
    KeyCode { name: "ControlRight", windows: Some(0xe01d), macos: Some(0x003e), linux: Some(0x0069) },
    KeyCode { name: "Convert", windows: Some(0x0079), macos: None, linux: Some(0x0064) },
    KeyCode { name: "Copy", windows: Some(0xe018), macos: None, linux: Some(0x008d) },
    KeyCode { name: "Cut", windows: Some(0xe017), macos: None, linux: Some(0x0091) },
    KeyCode { name: "Delete", windows: Some(0xe053), macos: Some(0x0075), linux: Some(0x0077) },
    KeyCode { name: "Digit0", windows: Some(0x000b), macos: Some(0x001d), linux: Some(0x0013) },
    KeyCode { name: "Digit1", windows: Some(0x0002), macos: Some(0x0012), linux: Some(0x000a) },
    KeyCode { name: "Digit2", windows: Some(0x0003), macos: Some(0x0013), linux: Some(0x000b) },
    KeyCode { name: "Digit3", windows: Some(0x0004), macos: Some(0x0014), linux: Some(0x000c) },
    KeyCode { name: "Digit4", windows: Some(0x0005), macos: Some(0x0015), linux: Some(0x000d) },
    KeyCode { name: "Digit5", windows: Some(0x0006), macos: Some(0x0017), linux: Some(0x000e) },
    KeyCode { name: "Digit6", windows: Some(0x0007), macos: Some(0x0016), linux: Some(0x000f) },
    KeyCode { name: "Digit7", windows: Some(0x0008), macos: Some(0x001a), linux: Some(0x0010) },
    KeyCode { name: "Digit8", windows: Some(0x0009), macos: Some(0x001c), linux: Some(0x0011) },
    KeyCode { name: "Digit9", windows: Some(0x000a), macos: Some(0x0019), linux: Some(0x0012) },
    KeyCode { name: "Eject", windows: Some(0xe02c), macos: None, linux: Some(0x00a9) },
    KeyCode { name: "End", windows: Some(0xe04f), macos: Some(0x0077), linux: Some(0x0073) },
    KeyCode { name: "Enter", windows: Some(0x001c), macos: Some(0x0024), linux: Some(0x0024) },
    KeyCode { name: "Equal", windows: Some(0x000d), macos: Some(0x0018), linux: Some(0x0015) },
    KeyCode { name: "Escape", windows: Some(0x0001), macos: Some(0x0035), linux: Some(0x0009) },
    KeyCode { name: "F1", windows: Some(0x003b), macos: Some(0x007a), linux: Some(0x0043) },
    KeyCode { name: "F10", windows: Some(0x0044), macos: Some(0x006d), linux: Some(0x004c) },
    KeyCode { name: "F11", windows: Some(0x0057), macos: Some(0x0067), linux: Some(0x005f) },
    KeyCode { name: "F12", windows: Some(0x0058), macos: Some(0x006f), linux: Some(0x0060) },
    KeyCode { name: "F13", windows: Some(0x0064), macos: Some(0x0069), linux: Some(0x00bf) },
    KeyCode { name: "F14", windows: Some(0x0065), macos: Some(0x006b), linux: Some(0x00c0) },
    KeyCode { name: "F15", windows: Some(0x0066), macos: Some(0x0071), linux: Some(0x00c1) },
    KeyCode { name: "F16", windows: Some(0x0067), macos: Some(0x006a), linux: Some(0x00c2) },
    KeyCode { name: "F17", windows: Some(0x0068), macos: Some(0x0040), linux: Some(0x00c3) },
    KeyCode { name: "F18", windows: Some(0x0069), macos: Some(0x004f), linux: Some(0x00c4) },
    KeyCode { name: "F19", windows: Some(0x006a), macos: Some(0x0050), linux: Some(0x00c5) },
    KeyCode { name: "F2", windows: Some(0x003c), macos: Some(0x0078), linux: Some(0x0044) },
    KeyCode { name: "F20", windows: Some(0x006b), macos: Some(0x005a), linux: Some(0x00c6) },
    KeyCode { name: "F21", windows: Some(0x006c), macos: None, linux: Some(0x00c7) },
    KeyCode { name: "F22", windows: Some(0x006d), macos: None, linux: Some(0x00c8) },
    KeyCode { name: "F23", windows: Some(0x006e), macos: None, linux: Some(0x00c9) },
    KeyCode { name: "F24", windows: Some(0x0076), macos: None, linux: Some(0x00ca) },
    KeyCode { name: "F3", windows: Some(0x003d), macos: Some(0x0063), linux: Some(0x0045) },
    KeyCode { name: "F4", windows: Some(0x003e), macos: Some(0x0076), linux: Some(0x0046) },
    KeyCode { name: "F5", windows: Some(0x003f), macos: Some(0x0060), linux: Some(0x0047) },
    KeyCode { name: "F6", windows: Some(0x0040), macos: Some(0x0061), linux: Some(0x0048) },
    KeyCode { name: "F7", windows: Some(0x0041), macos: Some(0x0062), linux: Some(0x0049) },
    KeyCode { name: "F8", windows: Some(0x0042), macos: Some(0x0064), linux: Some(0x004a) },
    KeyCode { name: "F9", windows: Some(0x0043), macos: Some(0x0065), linux: Some(0x004b) },
    KeyCode { name: "Find", windows: None, macos: None, linux: Some(0x0090) },
    KeyCode { name: "Help", windows: Some(0xe03b), macos: None, linux: Some(0x0092) },
    KeyCode { name: "Home", windows: Some(0xe047), macos: Some(0x0073), linux: Some(0x006e) },
    KeyCode { name: "Insert", windows: Some(0xe052), macos: Some(0x0072), linux: Some(0x0076) },
    KeyCode { name: "IntlBackslash", windows: Some(0x0056), macos: Some(0x000a), linux: Some(0x005e) },
    KeyCode { name: "IntlRo", windows: Some(0x0073), macos: Some(0x005e), linux: Some(0x0061) },
    KeyCode { name: "IntlYen", windows: Some(0x007d), macos: Some(0x005d), linux: Some(0x0084) },
    KeyCode { name: "KanaMode", windows: Some(0x0070), macos: None, linux: Some(0x0065) },
    KeyCode { name: "KeyA", windows: Some(0x001e), macos: Some(0x0000), linux: Some(0x0026) },
    KeyCode { name: "KeyB", windows: Some(0x0030), macos: Some(0x000b), linux: Some(0x0038) },
    KeyCode { name: "KeyC", windows: Some(0x002e), macos: Some(0x0008), linux: Some(0x0036) },
    KeyCode { name: "KeyD", windows: Some(0x0020), macos: Some(0x0002), linux: Some(0x0028) },
    KeyCode { name: "KeyE", windows: Some(0x0012), macos: Some(0x000e), linux: Some(0x001a) },
    KeyCode { name: "KeyF", windows: Some(0x0021), macos: Some(0x0003), linux: Some(0x0029) },
    KeyCode { name: "KeyG", windows: Some(0x0022), macos: Some(0x0005), linux: Some(0x002a) },
    KeyCode { name: "KeyH", windows: Some(0x0023), macos: Some(0x0004), linux: Some(0x002b) },
    KeyCode { name: "KeyI", windows: Some(0x0017), macos: Some(0x0022), linux: Some(0x001f) },
    KeyCode { name: "KeyJ", windows: Some(0x0024), macos: Some(0x0026), linux: Some(0x002c) },
    KeyCode { name: "KeyK", windows: Some(0x0025), macos: Some(0x0028), linux: Some(0x002d) },
    KeyCode { name: "KeyL", windows: Some(0x0026), macos: Some(0x0025), linux: Some(0x002e) },
    KeyCode { name: "KeyM", windows: Some(0x0032), macos: Some(0x002e), linux: Some(0x003a) },
    KeyCode { name: "KeyN", windows: Some(0x0031), macos: Some(0x002d), linux: Some(0x0039) },
    KeyCode { name: "KeyO", windows: Some(0x0018), macos: Some(0x001f), linux: Some(0x0020) },
    KeyCode { name: "KeyP", windows: Some(0x0019), macos: Some(0x0023), linux: Some(0x0021) },
    KeyCode { name: "KeyQ", windows: Some(0x0010), macos: Some(0x000c), linux: Some(0x0018) },
    KeyCode { name: "KeyR", windows: Some(0x0013), macos: Some(0x000f), linux: Some(0x001b) },
    KeyCode { name: "KeyS", windows: Some(0x001f), macos: Some(0x0001), linux: Some(0x0027) },
    KeyCode { name: "KeyT", windows: Some(0x0014), macos: Some(0x0011), linux: Some(0x001c) },
    KeyCode { name: "KeyU", windows: Some(0x0016), macos: Some(0x0020), linux: Some(0x001e) },
    KeyCode { name: "KeyV", windows: Some(0x002f), macos: Some(0x0009), linux: Some(0x0037) },
    KeyCode { name: "KeyW", windows: Some(0x0011), macos: Some(0x000d), linux: Some(0x0019) },
    KeyCode { name: "KeyX", windows: Some(0x002d), macos: Some(0x0007), linux: Some(0x0035) },
    KeyCode { name: "KeyY", windows: Some(0x0015), macos: Some(0x0010), linux: Some(0x001d) },
    KeyCode { name: "KeyZ", windows: Some(0x002c), macos: Some(0x0006), linux: Some(0x0034) },
    KeyCode { name: "Lang1", windows: Some(0x0072), macos: Some(0x0068), linux: Some(0x0082) },
    KeyCode { name: "Lang2", windows: Some(0x0071), macos: Some(0x0066), linux: Some(0x0083) },
    KeyCode { name: "Lang3", windows: Some(0x0078), macos: None, linux: Some(0x0062) },
    KeyCode { name: "Lang4", windows: Some(0x0077), macos: None, linux: Some(0x0063) },
    KeyCode { name: "Lang5", windows: None, macos: None, linux: Some(0x005d) },
    KeyCode { name: "LaunchApp1", windows: Some(0xe06b), macos: None, linux: Some(0x0098) },
    KeyCode { name: "LaunchApp2", windows: Some(0xe021), macos: None, linux: Some(0x0094) },
    KeyCode { name: "LaunchMail", windows: Some(0xe06c), macos: None, linux: Some(0x00a3) },
    KeyCode { name: "MediaPlayPause", windows: Some(0xe022), macos: None, linux: Some(0x00ac) },
    KeyCode { name: "MediaSelect", windows: Some(0xe06d), macos: None, linux: Some(0x00b3) },
    KeyCode { name: "MediaStop", windows: Some(0xe024), macos: None, linux: Some(0x00ae) },
    KeyCode { name: "MediaTrackNext", windows: Some(0xe019), macos: None, linux: Some(0x00ab) },
    KeyCode { name: "MediaTrackPrevious", windows: Some(0xe010), macos: None, linux: Some(0x00ad) },
    KeyCode { name: "MetaLeft", windows: Some(0xe05b), macos: Some(0x0037), linux: Some(0x0085) },
    KeyCode { name: "MetaRight", windows: Some(0xe05c), macos: Some(0x0036), linux: Some(0x0086) },
    KeyCode { name: "Minus", windows: Some(0x000c), macos: Some(0x001b), linux: Some(0x0014) },
    KeyCode { name: "NonConvert", windows: Some(0x007b), macos: None, linux: Some(0x0066) },
    KeyCode { name: "NumLock", windows: Some(0xe045), macos: Some(0x0047), linux: Some(0x004d) },
    KeyCode { name: "Numpad0", windows: Some(0x0052), macos: Some(0x0052), linux: Some(0x005a) },
    KeyCode { name: "Numpad1", windows: Some(0x004f), macos: Some(0x0053), linux: Some(0x0057) },
    KeyCode { name: "Numpad2", windows: Some(0x0050), macos: Some(0x0054), linux: Some(0x0058) },
    KeyCode { name: "Numpad3", windows: Some(0x0051), macos: Some(0x0055), linux: Some(0x0059) },
    KeyCode { name: "Numpad4", windows: Some(0x004b), macos: Some(0x0056), linux: Some(0x0053) },
    KeyCode { name: "Numpad5", windows: Some(0x004c), macos: Some(0x0057), linux: Some(0x0054) },
    KeyCode { name: "Numpad6", windows: Some(0x004d), macos: Some(0x0058), linux: Some(0x0055) },
    KeyCode { name: "Numpad7", windows: Some(0x0047), macos: Some(0x0059), linux: Some(0x004f) },
    KeyCode { name: "Numpad8", windows: Some(0x0048), macos: Some(0x005b), linux: Some(0x0050) },
    KeyCode { name: "Numpad9", windows: Some(0x0049), macos: Some(0x005c), linux: Some(0x0051) },
    KeyCode { name: "NumpadAdd", windows: Some(0x004e), macos: Some(0x0045), linux: Some(0x0056) },
    KeyCode { name: "NumpadComma", windows: Some(0x007e), macos: Some(0x005f), linux: Some(0x0081) },
    KeyCode { name: "NumpadDecimal", windows: Some(0x0053), macos: Some(0x0041), linux: Some(0x005b) },
    KeyCode { name: "NumpadDivide", windows: Some(0xe035), macos: Some(0x004b), linux: Some(0x006a) },
    KeyCode { name: "NumpadEnter", windows: Some(0xe01c), macos: Some(0x004c), linux: Some(0x0068) },
    KeyCode { name: "NumpadEqual", windows: Some(0x0059), macos: Some(0x0051), linux: Some(0x007d) },
    KeyCode { name: "NumpadMultiply", windows: Some(0x0037), macos: Some(0x0043), linux: Some(0x003f) },
    KeyCode { name: "NumpadParenLeft", windows: None, macos: None, linux: Some(0x00bb) },
    KeyCode { name: "NumpadParenRight", windows: None, macos: None, linux: Some(0x00bc) },
    KeyCode { name: "NumpadSubtract", windows: Some(0x004a), macos: Some(0x004e), linux: Some(0x0052) },
    KeyCode { name: "Open", windows: None, macos: None, linux: Some(0x008e) },
    KeyCode { name: "PageDown", windows: Some(0xe051), macos: Some(0x0079), linux: Some(0x0075) },
    KeyCode { name: "PageUp", windows: Some(0xe049), macos: Some(0x0074), linux: Some(0x0070) },
    KeyCode { name: "Paste", windows: Some(0xe00a), macos: None, linux: Some(0x008f) },
    KeyCode { name: "Pause", windows: Some(0x0045), macos: None, linux: Some(0x007f) },
    KeyCode { name: "Period", windows: Some(0x0034), macos: Some(0x002f), linux: Some(0x003c) },
    KeyCode { name: "Power", windows: Some(0xe05e), macos: None, linux: Some(0x007c) },
    KeyCode { name: "PrintScreen", windows: Some(0xe037), macos: None, linux: Some(0x006b) },
    KeyCode { name: "Quote", windows: Some(0x0028), macos: Some(0x0027), linux: Some(0x0030) },
    KeyCode { name: "ScrollLock", windows: Some(0x0046), macos: None, linux: Some(0x004e) },
    KeyCode { name: "Select", windows: None, macos: None, linux: Some(0x008c) },
    KeyCode { name: "Semicolon", windows: Some(0x0027), macos: Some(0x0029), linux: Some(0x002f) },
    KeyCode { name: "ShiftLeft", windows: Some(0x002a), macos: Some(0x0038), linux: Some(0x0032) },
    KeyCode { name: "ShiftRight", windows: Some(0x0036), macos: Some(0x003c), linux: Some(0x003e) },
    KeyCode { name: "Slash", windows: Some(0x0035), macos: Some(0x002c), linux: Some(0x003d) },
    KeyCode { name: "Sleep", windows: Some(0xe05f), macos: None, linux: Some(0x0096) },
    KeyCode { name: "Space", windows: Some(0x0039), macos: Some(0x0031), linux: Some(0x0041) },
    KeyCode { name: "Tab", windows: Some(0x000f), macos: Some(0x0030), linux: Some(0x0017) },
    KeyCode { name: "Undo", windows: Some(0xe008), macos: None, linux: Some(0x008b) },
    KeyCode { name: "WakeUp", windows: Some(0xe063), macos: Some(0x0030), linux: Some(0x0097) },
];
