//! Localized UI strings
//!
//! Tables are immutable statics keyed by `Language`; switching language only
//! changes which table `Translator` reads from.

use serde::{Deserialize, Serialize};

use crate::persistence::{DualStore, keys};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "ja-JP")]
    JaJp,
    #[serde(rename = "ko-KR")]
    KoKr,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::ZhCn, Language::EnUs, Language::JaJp, Language::KoKr];

    /// Used when a key is missing from the current table
    pub const FALLBACK: Language = Language::ZhCn;

    pub fn code(&self) -> &'static str {
        match self {
            Language::ZhCn => "zh-CN",
            Language::EnUs => "en-US",
            Language::JaJp => "ja-JP",
            Language::KoKr => "ko-KR",
        }
    }

    /// Name of the language in itself
    pub fn native_name(&self) -> &'static str {
        match self {
            Language::ZhCn => "简体中文",
            Language::EnUs => "English",
            Language::JaJp => "日本語",
            Language::KoKr => "한국어",
        }
    }

    /// Exact tag match, case-insensitive
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Exact match first, then by primary subtag ("en-GB" -> en-US)
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::from_code(tag).or_else(|| {
            let primary = tag.trim().split(['-', '_']).next()?;
            Self::ALL
                .into_iter()
                .find(|l| l.code().split('-').next().is_some_and(|p| p.eq_ignore_ascii_case(primary)))
        })
    }

    fn table(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Language::ZhCn => ZH_CN,
            Language::EnUs => EN_US,
            Language::JaJp => JA_JP,
            Language::KoKr => KO_KR,
        }
    }

    /// Look a key up in this language only
    pub fn lookup(&self, key: &str) -> Option<&'static str> {
        self.table().iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

/// Pick the UI language: explicit request, then stored preference, then
/// host preferences, then the default. Unsupported values are skipped.
pub fn detect_language(requested: Option<&str>, stored: Option<&str>, preferred: &[String]) -> Language {
    requested
        .and_then(Language::from_code)
        .or_else(|| stored.and_then(Language::from_code))
        .or_else(|| preferred.iter().find_map(|tag| Language::from_tag(tag)))
        .unwrap_or_default()
}

/// Current-language view over the static tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Translator {
    current: Language,
}

impl Translator {
    pub fn new(language: Language) -> Self {
        Self { current: language }
    }

    pub fn language(&self) -> Language {
        self.current
    }

    /// Translate with fallback to the fallback language, then to the key
    pub fn translate<'a>(&self, key: &'a str) -> &'a str {
        self.current
            .lookup(key)
            .or_else(|| Language::FALLBACK.lookup(key))
            .unwrap_or(key)
    }

    /// Switch language for this session only
    pub fn set_language(&mut self, language: Language) {
        self.current = language;
    }

    /// Switch by tag and remember the choice. Unsupported tags are refused.
    pub fn set_language_code(&mut self, code: &str, store: &mut DualStore) -> bool {
        let Some(language) = Language::from_code(code) else {
            log::warn!("Unsupported language: {code}");
            return false;
        };
        self.current = language;
        if !store.set(keys::LANGUAGE, language.code()).success {
            log::warn!("Language preference could not be persisted");
        }
        true
    }
}

static ZH_CN: &[(&str, &str)] = &[
    ("game.title", "跳跳方块"),
    ("game.start", "开始游戏"),
    ("game.restart", "重新开始"),
    ("game.score", "得分"),
    ("game.best", "最佳"),
    ("game.combo", "连击"),
    ("game.perfect", "完美!"),
    ("game.excellent", "优秀!"),
    ("game.good", "不错!"),
    ("game.miss", "未击中"),
    ("game.gameOver", "游戏结束"),
    ("game.newBest", "新纪录!"),
    ("game.enterNickname", "请输入昵称"),
    ("game.nicknamePlaceholder", "输入昵称..."),
    ("game.saveScore", "保存分数"),
    ("game.skip", "跳过"),
    ("game.ranking", "排行榜"),
    ("game.skinShop", "皮肤商店"),
    ("game.language", "语言"),
    ("game.storageHealthy", "存储正常"),
    ("game.storageWarning", "存储警告"),
    ("game.storageError", "存储错误"),
    ("game.suspiciousScore", "检测到异常分数"),
    ("game.scoreValidated", "分数验证通过"),
    ("game.scoreRejected", "分数被拒绝"),
];

static EN_US: &[(&str, &str)] = &[
    ("game.title", "SkyHop"),
    ("game.start", "Start Game"),
    ("game.restart", "Restart"),
    ("game.score", "Score"),
    ("game.best", "Best"),
    ("game.combo", "Combo"),
    ("game.perfect", "Perfect!"),
    ("game.excellent", "Excellent!"),
    ("game.good", "Good!"),
    ("game.miss", "Miss"),
    ("game.gameOver", "Game Over"),
    ("game.newBest", "New Record!"),
    ("game.enterNickname", "Enter Nickname"),
    ("game.nicknamePlaceholder", "Enter nickname..."),
    ("game.saveScore", "Save Score"),
    ("game.skip", "Skip"),
    ("game.ranking", "Ranking"),
    ("game.skinShop", "Skin Shop"),
    ("game.language", "Language"),
    ("game.storageHealthy", "Storage Healthy"),
    ("game.storageWarning", "Storage Warning"),
    ("game.storageError", "Storage Error"),
    ("game.suspiciousScore", "Suspicious Score Detected"),
    ("game.scoreValidated", "Score Validated"),
    ("game.scoreRejected", "Score Rejected"),
];

static JA_JP: &[(&str, &str)] = &[
    ("game.title", "ジャンプブロック"),
    ("game.start", "ゲーム開始"),
    ("game.restart", "リスタート"),
    ("game.score", "スコア"),
    ("game.best", "最高記録"),
    ("game.combo", "コンボ"),
    ("game.perfect", "パーフェクト!"),
    ("game.excellent", "エクセレント!"),
    ("game.good", "グッド!"),
    ("game.miss", "ミス"),
    ("game.gameOver", "ゲームオーバー"),
    ("game.newBest", "新記録!"),
    ("game.enterNickname", "ニックネームを入力"),
    ("game.nicknamePlaceholder", "ニックネーム..."),
    ("game.saveScore", "スコアを保存"),
    ("game.skip", "スキップ"),
    ("game.ranking", "ランキング"),
    ("game.skinShop", "スキンショップ"),
    ("game.language", "言語"),
    ("game.storageHealthy", "ストレージ正常"),
    ("game.storageWarning", "ストレージ警告"),
    ("game.storageError", "ストレージエラー"),
    ("game.suspiciousScore", "異常スコアを検出"),
    ("game.scoreValidated", "スコア検証完了"),
    ("game.scoreRejected", "スコアが拒否されました"),
];

// Partial table; missing keys fall back
static KO_KR: &[(&str, &str)] = &[
    ("game.title", "점핑 블록"),
    ("game.start", "게임 시작"),
    ("game.restart", "다시 시작"),
    ("game.score", "점수"),
    ("game.best", "최고 기록"),
    ("game.combo", "콤보"),
    ("game.perfect", "퍼펙트!"),
    ("game.excellent", "엑설런트!"),
    ("game.good", "굿!"),
    ("game.miss", "미스"),
    ("game.gameOver", "게임 오버"),
    ("game.newBest", "신기록!"),
    ("game.enterNickname", "닉네임 입력"),
    ("game.saveScore", "점수 저장"),
    ("game.skip", "건너뛰기"),
    ("game.ranking", "랭킹"),
    ("game.language", "언어"),
    ("game.scoreValidated", "점수 검증됨"),
    ("game.scoreRejected", "점수 거부됨"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_translate_with_fallback() {
        let mut t = Translator::new(Language::EnUs);
        assert_eq!(t.translate("game.start"), "Start Game");
        assert_eq!(t.translate("no.such.key"), "no.such.key");

        t.set_language(Language::KoKr);
        assert_eq!(t.translate("game.start"), "게임 시작");
        // Missing in ko-KR, served from the fallback table
        assert_eq!(t.translate("game.skinShop"), "皮肤商店");
    }

    #[test]
    fn test_every_table_covers_fallback_or_falls_back() {
        for (key, _) in ZH_CN {
            for language in Language::ALL {
                assert!(!Translator::new(language).translate(key).is_empty());
            }
        }
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("en-us"), Some(Language::EnUs));
        assert_eq!(Language::from_code("fr-FR"), None);
        assert_eq!(Language::from_tag("ja"), Some(Language::JaJp));
        assert_eq!(Language::from_tag("en-GB"), Some(Language::EnUs));
        assert_eq!(Language::from_tag("de"), None);
        for language in Language::ALL {
            assert_eq!(Language::from_code(language.code()), Some(language));
        }
    }

    #[test]
    fn test_detection_order() {
        let browser = vec!["fr-FR".to_string(), "ko-KR".to_string()];
        assert_eq!(detect_language(Some("ja-JP"), Some("en-US"), &browser), Language::JaJp);
        assert_eq!(detect_language(Some("xx"), Some("en-US"), &browser), Language::EnUs);
        assert_eq!(detect_language(None, Some("bogus"), &browser), Language::KoKr);
        assert_eq!(detect_language(None, None, &[]), Language::ZhCn);
    }

    #[test]
    fn test_set_language_persists() {
        let mut store = DualStore::in_memory(Rc::new(|| 0.0));
        let mut t = Translator::default();
        assert!(!t.set_language_code("xx-XX", &mut store));
        assert_eq!(t.language(), Language::ZhCn);
        assert!(store.get(keys::LANGUAGE).is_none());

        assert!(t.set_language_code("en-US", &mut store));
        assert_eq!(t.language(), Language::EnUs);
        assert_eq!(store.get(keys::LANGUAGE).as_deref(), Some("en-US"));
    }

    #[test]
    fn test_language_serde_uses_tags() {
        assert_eq!(serde_json::to_string(&Language::KoKr).unwrap(), "\"ko-KR\"");
    }
}
