//! 按键与修饰键模块
//!
//! 定义 `KeySpec`（键码 + 修饰键集合）以及按键名称到键码的映射。
//!
//! 键码使用 macOS 虚拟键码（ANSI 布局，`a` = 0x00），修饰键位使用
//! Carbon 的掩码值，其他后端在注册时自行转换。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{HotkeyError, HotkeyResult};

/// 最大合法键码
pub const MAX_KEYCODE: u32 = 0x7F;

/// 按键名称与键码对照表
const KEY_TABLE: &[(&str, u32)] = &[
    ("a", 0x00),
    ("s", 0x01),
    ("d", 0x02),
    ("f", 0x03),
    ("h", 0x04),
    ("g", 0x05),
    ("z", 0x06),
    ("x", 0x07),
    ("c", 0x08),
    ("v", 0x09),
    ("b", 0x0B),
    ("q", 0x0C),
    ("w", 0x0D),
    ("e", 0x0E),
    ("r", 0x0F),
    ("y", 0x10),
    ("t", 0x11),
    ("1", 0x12),
    ("2", 0x13),
    ("3", 0x14),
    ("4", 0x15),
    ("6", 0x16),
    ("5", 0x17),
    ("=", 0x18),
    ("9", 0x19),
    ("7", 0x1A),
    ("-", 0x1B),
    ("8", 0x1C),
    ("0", 0x1D),
    ("]", 0x1E),
    ("o", 0x1F),
    ("u", 0x20),
    ("[", 0x21),
    ("i", 0x22),
    ("p", 0x23),
    ("return", 0x24),
    ("l", 0x25),
    ("j", 0x26),
    ("'", 0x27),
    ("k", 0x28),
    (";", 0x29),
    ("\\", 0x2A),
    (",", 0x2B),
    ("/", 0x2C),
    ("n", 0x2D),
    ("m", 0x2E),
    (".", 0x2F),
    ("tab", 0x30),
    ("space", 0x31),
    ("`", 0x32),
    ("delete", 0x33),
    ("escape", 0x35),
    ("f17", 0x40),
    ("pad.", 0x41),
    ("pad*", 0x43),
    ("pad+", 0x45),
    ("padclear", 0x47),
    ("pad/", 0x4B),
    ("padenter", 0x4C),
    ("pad-", 0x4E),
    ("f18", 0x4F),
    ("f19", 0x50),
    ("pad=", 0x51),
    ("pad0", 0x52),
    ("pad1", 0x53),
    ("pad2", 0x54),
    ("pad3", 0x55),
    ("pad4", 0x56),
    ("pad5", 0x57),
    ("pad6", 0x58),
    ("pad7", 0x59),
    ("f20", 0x5A),
    ("pad8", 0x5B),
    ("pad9", 0x5C),
    ("f5", 0x60),
    ("f6", 0x61),
    ("f7", 0x62),
    ("f3", 0x63),
    ("f8", 0x64),
    ("f9", 0x65),
    ("f11", 0x67),
    ("f13", 0x69),
    ("f16", 0x6A),
    ("f14", 0x6B),
    ("f10", 0x6D),
    ("f12", 0x6F),
    ("f15", 0x71),
    ("help", 0x72),
    ("home", 0x73),
    ("pageup", 0x74),
    ("forwarddelete", 0x75),
    ("f4", 0x76),
    ("end", 0x77),
    ("f2", 0x78),
    ("pagedown", 0x79),
    ("f1", 0x7A),
    ("left", 0x7B),
    ("right", 0x7C),
    ("down", 0x7D),
    ("up", 0x7E),
];

/// 常用别名，映射到表中的规范名称
const KEY_ALIASES: &[(&str, &str)] = &[
    ("enter", "return"),
    ("esc", "escape"),
    ("backspace", "delete"),
    ("minus", "-"),
    ("equal", "="),
    ("comma", ","),
    ("period", "."),
    ("slash", "/"),
    ("backslash", "\\"),
    ("semicolon", ";"),
    ("quote", "'"),
    ("grave", "`"),
    ("leftbracket", "["),
    ("rightbracket", "]"),
    ("arrowleft", "left"),
    ("arrowright", "right"),
    ("arrowup", "up"),
    ("arrowdown", "down"),
];

/// 根据按键名称查找键码（不区分大小写）
///
/// # Examples
///
/// ```
/// use hotbind_lib::hotkey::keycode_for;
///
/// assert_eq!(keycode_for("a"), Some(0x00));
/// assert_eq!(keycode_for("Space"), Some(0x31));
/// assert_eq!(keycode_for("esc"), Some(0x35));
/// assert_eq!(keycode_for("nope"), None);
/// ```
pub fn keycode_for(name: &str) -> Option<u32> {
    let lower = name.trim().to_lowercase();
    let canonical = KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, target)| *target)
        .unwrap_or(lower.as_str());

    KEY_TABLE
        .iter()
        .find(|(key, _)| *key == canonical)
        .map(|(_, code)| *code)
}

/// 根据键码查找规范按键名称
pub fn key_name(keycode: u32) -> Option<&'static str> {
    KEY_TABLE
        .iter()
        .find(|(_, code)| *code == keycode)
        .map(|(key, _)| *key)
}

/// 修饰键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// Command（⌘）
    Command,
    /// Control（⌃）
    Control,
    /// Option / Alt（⌥）
    Option,
    /// Shift（⇧）
    Shift,
}

impl Modifier {
    /// 所有修饰键，按规范顺序排列
    pub const ALL: [Modifier; 4] = [
        Modifier::Command,
        Modifier::Control,
        Modifier::Option,
        Modifier::Shift,
    ];

    /// 解析修饰键名称
    ///
    /// 支持 `command`/`cmd`、`control`/`ctrl`、`option`/`opt`/`alt`、`shift`
    pub fn parse(name: &str) -> HotkeyResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "command" | "cmd" => Ok(Modifier::Command),
            "control" | "ctrl" => Ok(Modifier::Control),
            "option" | "opt" | "alt" => Ok(Modifier::Option),
            "shift" => Ok(Modifier::Shift),
            _ => Err(HotkeyError::InvalidModifier(name.to_string())),
        }
    }

    /// Carbon 修饰键掩码位
    pub fn carbon_flag(&self) -> u32 {
        match self {
            Modifier::Command => 1 << 8,
            Modifier::Shift => 1 << 9,
            Modifier::Option => 1 << 11,
            Modifier::Control => 1 << 12,
        }
    }

    /// 规范名称
    pub fn name(&self) -> &'static str {
        match self {
            Modifier::Command => "cmd",
            Modifier::Control => "ctrl",
            Modifier::Option => "opt",
            Modifier::Shift => "shift",
        }
    }
}

/// 修饰键集合（以 Carbon 掩码存储）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModifierSet {
    bits: u32,
}

impl ModifierSet {
    /// 空集合
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// 从修饰键列表构建
    pub fn from_modifiers(modifiers: &[Modifier]) -> Self {
        let mut set = Self::empty();
        for modifier in modifiers {
            set.insert(*modifier);
        }
        set
    }

    /// 从 Carbon 掩码构建，含未知位时返回 `None`
    pub fn from_bits(bits: u32) -> Option<Self> {
        let known = Modifier::ALL.iter().fold(0, |acc, m| acc | m.carbon_flag());
        if bits & !known != 0 {
            return None;
        }
        Some(Self { bits })
    }

    /// 添加修饰键
    pub fn insert(&mut self, modifier: Modifier) {
        self.bits |= modifier.carbon_flag();
    }

    /// 是否包含修饰键
    pub fn contains(&self, modifier: Modifier) -> bool {
        self.bits & modifier.carbon_flag() != 0
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Carbon 掩码
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// 按规范顺序迭代包含的修饰键
    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

/// 热键按键规格
///
/// 注册后不可修改，改绑需要先注销再重新注册
///
/// # Examples
///
/// ```
/// use hotbind_lib::hotkey::{KeySpec, Modifier};
///
/// let spec: KeySpec = "cmd+shift+a".parse().unwrap();
/// assert_eq!(spec.keycode(), 0x00);
/// assert!(spec.modifiers().contains(Modifier::Command));
/// assert!(spec.modifiers().contains(Modifier::Shift));
/// assert_eq!(spec.to_string(), "cmd+shift+a");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeySpec {
    keycode: u32,
    modifiers: ModifierSet,
}

impl KeySpec {
    /// 使用原始键码和修饰键集合创建
    pub fn new(keycode: u32, modifiers: ModifierSet) -> Self {
        Self { keycode, modifiers }
    }

    /// 从按键名称和修饰键名称列表创建
    ///
    /// 这是脚本接口 `hotkey.bind(key, mods, fn)` 使用的形式
    pub fn from_parts<S: AsRef<str>>(key: &str, modifiers: &[S]) -> HotkeyResult<Self> {
        let keycode = parse_key(key).ok_or_else(|| HotkeyError::InvalidKey(key.to_string()))?;
        let mut set = ModifierSet::empty();
        for name in modifiers {
            set.insert(Modifier::parse(name.as_ref())?);
        }
        Ok(Self::new(keycode, set))
    }

    /// 键码
    pub fn keycode(&self) -> u32 {
        self.keycode
    }

    /// 修饰键集合
    pub fn modifiers(&self) -> ModifierSet {
        self.modifiers
    }

    /// 键码是否在合法范围内
    pub fn is_valid(&self) -> bool {
        self.keycode <= MAX_KEYCODE
    }
}

impl FromStr for KeySpec {
    type Err = HotkeyError;

    /// 解析 `mod+mod+key` 形式
    ///
    /// 最后一个非空片段是按键（`pad+` 这类以 `+` 结尾的按键名也可以），
    /// 前面的片段都必须是修饰键
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (prefix, key) = split_key(s);
        let keycode = parse_key(key).ok_or_else(|| HotkeyError::InvalidKey(s.to_string()))?;

        let mut modifiers = ModifierSet::empty();
        if let Some(prefix) = prefix {
            for token in prefix.split('+').map(str::trim) {
                if token.is_empty() {
                    return Err(HotkeyError::InvalidKey(s.to_string()));
                }
                match Modifier::parse(token) {
                    Ok(modifier) => modifiers.insert(modifier),
                    // 多于一个按键
                    Err(_) if parse_key(token).is_some() => {
                        return Err(HotkeyError::InvalidKey(s.to_string()));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(Self::new(keycode, modifiers))
    }
}

/// 从右侧拆出按键片段，跳过以 `+` 结尾造成的空片段
fn split_key(s: &str) -> (Option<&str>, &str) {
    let mut end = s.len();
    while let Some(pos) = s[..end].rfind('+') {
        let key = s[pos + 1..].trim();
        if !key.is_empty() {
            return (Some(&s[..pos]), key);
        }
        end = pos;
    }
    (None, s)
}

/// 按键名称或 `0x..` 形式的原始键码
fn parse_key(token: &str) -> Option<u32> {
    let token = token.trim();
    match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => keycode_for(token),
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in self.modifiers.iter() {
            write!(f, "{}+", modifier.name())?;
        }
        match key_name(self.keycode) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "0x{:02X}", self.keycode),
        }
    }
}

impl TryFrom<String> for KeySpec {
    type Error = HotkeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeySpec> for String {
    fn from(spec: KeySpec) -> Self {
        spec.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keycode_lookup() {
        assert_eq!(keycode_for("A"), Some(0x00));
        assert_eq!(keycode_for("return"), Some(0x24));
        assert_eq!(keycode_for("Enter"), Some(0x24));
        assert_eq!(keycode_for("f1"), Some(0x7A));
        assert_eq!(keycode_for("pad5"), Some(0x57));
        assert_eq!(keycode_for(""), None);
        assert_eq!(keycode_for("hyper"), None);
    }

    #[test]
    fn test_key_name_inverse() {
        for (name, code) in KEY_TABLE {
            assert_eq!(key_name(*code), Some(*name));
        }
        assert_eq!(key_name(0x7F), None);
    }

    #[test]
    fn test_modifier_aliases() {
        assert_eq!(Modifier::parse("cmd").unwrap(), Modifier::Command);
        assert_eq!(Modifier::parse("Command").unwrap(), Modifier::Command);
        assert_eq!(Modifier::parse("ctrl").unwrap(), Modifier::Control);
        assert_eq!(Modifier::parse("alt").unwrap(), Modifier::Option);
        assert_eq!(Modifier::parse("opt").unwrap(), Modifier::Option);
        assert_eq!(Modifier::parse("SHIFT").unwrap(), Modifier::Shift);
        assert!(matches!(
            Modifier::parse("hyper"),
            Err(HotkeyError::InvalidModifier(_))
        ));
    }

    #[test]
    fn test_modifier_set_bits() {
        let set = ModifierSet::from_modifiers(&[Modifier::Command, Modifier::Shift]);
        assert_eq!(set.bits(), 0x100 | 0x200);
        assert!(set.contains(Modifier::Command));
        assert!(!set.contains(Modifier::Control));

        assert_eq!(ModifierSet::from_bits(0x1800).unwrap().iter().count(), 2);
        assert!(ModifierSet::from_bits(0x1).is_none());
        assert!(ModifierSet::empty().is_empty());
    }

    #[test]
    fn test_key_spec_parse() {
        let spec: KeySpec = "ctrl+alt+Space".parse().unwrap();
        assert_eq!(spec.keycode(), 0x31);
        assert!(spec.modifiers().contains(Modifier::Control));
        assert!(spec.modifiers().contains(Modifier::Option));
        assert_eq!(spec.to_string(), "ctrl+opt+space");

        let bare: KeySpec = "f5".parse().unwrap();
        assert!(bare.modifiers().is_empty());
    }

    #[test]
    fn test_key_spec_parse_invalid() {
        assert!(matches!("".parse::<KeySpec>(), Err(HotkeyError::InvalidKey(_))));
        assert!(matches!("cmd+".parse::<KeySpec>(), Err(HotkeyError::InvalidKey(_))));
        assert!(matches!("cmd+shift".parse::<KeySpec>(), Err(HotkeyError::InvalidKey(_))));
        assert!(matches!("a+b".parse::<KeySpec>(), Err(HotkeyError::InvalidKey(_))));
        assert!(matches!("cmd+nokey".parse::<KeySpec>(), Err(HotkeyError::InvalidKey(_))));
        assert!(matches!("cmd++a".parse::<KeySpec>(), Err(HotkeyError::InvalidKey(_))));
        assert!(matches!("0xZZ".parse::<KeySpec>(), Err(HotkeyError::InvalidKey(_))));
    }

    #[test]
    fn test_key_spec_unknown_modifier() {
        assert_eq!(
            "hyper+a".parse::<KeySpec>(),
            Err(HotkeyError::InvalidModifier("hyper".to_string()))
        );
        assert_eq!(
            "cmd+meta+a".parse::<KeySpec>(),
            Err(HotkeyError::InvalidModifier("meta".to_string()))
        );
    }

    #[test]
    fn test_key_spec_keys_ending_in_plus() {
        let spec: KeySpec = "pad+".parse().unwrap();
        assert_eq!(spec.keycode(), 0x45);
        assert!(spec.modifiers().is_empty());

        let spec: KeySpec = "cmd+pad+".parse().unwrap();
        assert_eq!(spec.keycode(), 0x45);
        assert!(spec.modifiers().contains(Modifier::Command));
    }

    #[test]
    fn test_key_spec_hex_keycode() {
        let spec: KeySpec = "shift+0x0A".parse().unwrap();
        assert_eq!(spec, KeySpec::new(0x0A, ModifierSet::from_modifiers(&[Modifier::Shift])));
        assert_eq!(KeySpec::from_parts("0x7f", &["cmd"]).unwrap().keycode(), 0x7F);
    }

    #[test]
    fn test_key_spec_display_parses_back() {
        let all = ModifierSet::from_modifiers(&Modifier::ALL);
        let unnamed = (0..=MAX_KEYCODE).filter(|code| key_name(*code).is_none());
        let codes = KEY_TABLE.iter().map(|(_, code)| *code).chain(unnamed);

        for code in codes {
            for modifiers in [ModifierSet::empty(), all] {
                let spec = KeySpec::new(code, modifiers);
                let text = spec.to_string();
                assert_eq!(text.parse::<KeySpec>(), Ok(spec), "{text}");

                let json = serde_json::to_string(&spec).unwrap();
                assert_eq!(serde_json::from_str::<KeySpec>(&json).unwrap(), spec, "{json}");
            }
        }
    }

    #[test]
    fn test_key_spec_from_parts() {
        let spec = KeySpec::from_parts("a", &["cmd"]).unwrap();
        assert_eq!(spec, KeySpec::new(0x00, ModifierSet::from_modifiers(&[Modifier::Command])));

        let err = KeySpec::from_parts("a", &["cmd", "meta"]).unwrap_err();
        assert_eq!(err, HotkeyError::InvalidModifier("meta".to_string()));
    }

    #[test]
    fn test_key_spec_validity() {
        assert!(KeySpec::new(0x7E, ModifierSet::empty()).is_valid());
        assert!(!KeySpec::new(0x80, ModifierSet::empty()).is_valid());
        assert_eq!(KeySpec::new(0x7F, ModifierSet::empty()).to_string(), "0x7F");
    }

    #[test]
    fn test_key_spec_serde_as_string() {
        let spec: KeySpec = "cmd+r".parse().unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, "\"cmd+r\"");
        assert!(serde_json::from_str::<KeySpec>("\"cmd+bogus\"").is_err());
    }
}
