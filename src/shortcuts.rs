// 窗口快捷键：退出、切换调试面板

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Quit,
    ToggleInspector,
}

#[derive(Debug, Clone, Default)]
pub struct KeyChord {
    pub text: String,
    pub control: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyChord {
    fn is_key(&self, key: char) -> bool {
        let mut chars = self.text.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.eq_ignore_ascii_case(&key))
    }
}

/// macOS: Cmd+Q / Cmd+Option+I，其他平台: Ctrl+Q / Ctrl+Shift+I
pub fn resolve(chord: &KeyChord, platform: Platform) -> Option<Shortcut> {
    let primary = match platform {
        Platform::MacOs => chord.meta,
        Platform::Other => chord.control,
    };
    if !primary {
        return None;
    }

    let inspector_modifier = match platform {
        Platform::MacOs => chord.alt,
        Platform::Other => chord.shift,
    };

    if chord.is_key('i') && inspector_modifier {
        return Some(Shortcut::ToggleInspector);
    }
    if chord.is_key('q') && !chord.shift && !chord.alt {
        return Some(Shortcut::Quit);
    }
    None
}
