use crate::card::{Rank, Suit};
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 牌型 (Combo)
/// 变体顺序即强弱顺序，`index()` 直接用于叫牌比较。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub enum Combo {
    Carte,
    Paire,
    DoublePaire,
    Brelan,
    Couleur,
    Suite,
    Full,
    Carre,
    QuinteFlush,
    QuinteFlushRoyale,
}

impl Combo {
    pub const ALL: [Combo; 10] = [
        Combo::Carte, Combo::Paire, Combo::DoublePaire, Combo::Brelan, Combo::Couleur,
        Combo::Suite, Combo::Full, Combo::Carre, Combo::QuinteFlush, Combo::QuinteFlushRoyale,
    ];

    pub fn index(self) -> i8 {
        self as i8
    }

    pub fn name(self) -> &'static str {
        match self {
            Combo::Carte => "Carte",
            Combo::Paire => "Paire",
            Combo::DoublePaire => "Double Paire",
            Combo::Brelan => "Brelan",
            Combo::Couleur => "Couleur",
            Combo::Suite => "Suite",
            Combo::Full => "Full",
            Combo::Carre => "Carré",
            Combo::QuinteFlush => "QuinteFlush",
            Combo::QuinteFlushRoyale => "QuinteFlushRoyale",
        }
    }

    /// 按线上名称解析，未知名称返回 `None`
    pub fn from_name(name: &str) -> Option<Combo> {
        Combo::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 叫牌里写的牌型名称，无法识别的名称原样保留
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum ComboName {
    Known(Combo),
    Malformed(String),
}

impl ComboName {
    pub fn parse(name: &str) -> Self {
        match Combo::from_name(name) {
            Some(combo) => ComboName::Known(combo),
            None => ComboName::Malformed(name.to_string()),
        }
    }

    pub fn known(&self) -> Option<Combo> {
        match self {
            ComboName::Known(combo) => Some(*combo),
            ComboName::Malformed(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComboName::Known(combo) => combo.name(),
            ComboName::Malformed(name) => name,
        }
    }
}

impl From<Combo> for ComboName {
    fn from(combo: Combo) -> Self {
        ComboName::Known(combo)
    }
}

impl fmt::Display for ComboName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个牌型描述：牌型 + 可选的点数/花色约束。
/// `combo` 缺失或无法识别时永远不会被验证为真。
#[derive(Debug, PartialEq, Eq, Hash, Clone, Default)]
pub struct Combination {
    pub combo: Option<ComboName>,
    pub rank1: Option<Rank>,
    pub rank2: Option<Rank>,
    pub suit: Option<Suit>,
}

/// (牌型序号, 主点数, 次点数, 花色加成)，未指定的项为 -1
pub type ScoreTuple = (i8, i8, i8, i8);

/// 整个叫牌的比较键：(主牌型分数, 副牌型分数)
pub type ClaimKey = (ScoreTuple, ScoreTuple);

pub const EMPTY_SCORE: ScoreTuple = (-1, -1, -1, -1);

/// 计算单个牌型的分数元组。
///
/// 除 Full 外，主点数取两者较大值、次点数取较小值；
/// Full 的两个点数角色不同（三条 / 对子），按原样保留。
/// 指定了花色的叫牌在其他项相同时更大。
/// 无法识别的牌型序号为 -1，但点数和花色照常计分。
pub fn score_tuple(
    combo: Option<&ComboName>,
    rank1: Option<Rank>,
    rank2: Option<Rank>,
    suit: Option<Suit>,
) -> ScoreTuple {
    let Some(combo) = combo else {
        return EMPTY_SCORE;
    };
    let combo = combo.known();

    let v1 = rank1.map_or(-1, |r| r.value() as i8);
    let v2 = rank2.map_or(-1, |r| r.value() as i8);

    let (primary, secondary) = match combo {
        Some(Combo::Full) => (v1, v2),
        _ => (v1.max(v2), v1.min(v2)),
    };
    let suit_bonus = if suit.is_some() { 1 } else { 0 };

    (combo.map_or(-1, Combo::index), primary, secondary, suit_bonus)
}

impl Combination {
    pub fn new(combo: Combo) -> Self {
        Combination { combo: Some(ComboName::Known(combo)), ..Default::default() }
    }

    pub fn rank(mut self, rank: Rank) -> Self {
        self.rank1 = Some(rank);
        self
    }

    pub fn ranks(mut self, rank1: Rank, rank2: Rank) -> Self {
        self.rank1 = Some(rank1);
        self.rank2 = Some(rank2);
        self
    }

    pub fn suit(mut self, suit: Suit) -> Self {
        self.suit = Some(suit);
        self
    }

    pub fn score(&self) -> ScoreTuple {
        score_tuple(self.combo.as_ref(), self.rank1, self.rank2, self.suit)
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Some(combo) = &self.combo else {
            return f.write_str("?");
        };
        write!(f, "{}", combo)?;
        match (self.rank1, self.rank2, self.suit) {
            (Some(r1), Some(r2), _) if combo.known() == Some(Combo::Full) => write!(f, " aux {} par les {}", r1, r2),
            (Some(r1), Some(r2), _) => write!(f, " {} & {}", r1, r2),
            (Some(r1), None, _) => write!(f, " de {}", r1),
            (None, _, Some(s)) => write!(f, " à {}", s),
            _ => Ok(()),
        }
    }
}

/// 叫牌 (Claim)
/// 一个主牌型加一个可选的副牌型；副牌型本身不能再嵌套。
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Claim {
    pub primary: Combination,
    pub secondary: Option<Combination>,
}

impl Claim {
    pub fn single(primary: Combination) -> Self {
        Claim { primary, secondary: None }
    }

    pub fn compound(primary: Combination, secondary: Combination) -> Self {
        Claim { primary, secondary: Some(secondary) }
    }

    pub fn key(&self) -> ClaimKey {
        let secondary = self.secondary.as_ref().map_or(EMPTY_SCORE, Combination::score);
        (self.primary.score(), secondary)
    }

    /// 加注规则：当前没有叫牌，或新叫牌的比较键严格更大
    pub fn is_raise_over(&self, current: Option<&Claim>) -> bool {
        current.is_none_or(|current| self.key() > current.key())
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        if let Some(secondary) = &self.secondary {
            write!(f, " + {}", secondary)?;
        }
        Ok(())
    }
}

// --- 线上格式 ---

/// 客户端发送的叫牌描述，字段扁平展开；空字符串视为未填写。
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimDescriptor {
    #[serde(deserialize_with = "empty_as_none")]
    pub combo: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub rank1: Option<Rank>,
    #[serde(deserialize_with = "empty_as_none")]
    pub rank2: Option<Rank>,
    #[serde(deserialize_with = "empty_as_none")]
    pub suit: Option<Suit>,
    #[serde(deserialize_with = "empty_as_none")]
    pub sec_combo: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub sec_rank1: Option<Rank>,
    #[serde(deserialize_with = "empty_as_none")]
    pub sec_rank2: Option<Rank>,
    #[serde(deserialize_with = "empty_as_none")]
    pub sec_suit: Option<Suit>,
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => T::deserialize(s.into_deserializer()).map(Some),
    }
}

impl From<ClaimDescriptor> for Claim {
    fn from(d: ClaimDescriptor) -> Self {
        let primary = Combination {
            combo: d.combo.as_deref().map(ComboName::parse),
            rank1: d.rank1,
            rank2: d.rank2,
            suit: d.suit,
        };
        // 副牌型名称存在但无法识别时仍保留，验证时必然失败
        let secondary = d.sec_combo.as_deref().map(|name| Combination {
            combo: Some(ComboName::parse(name)),
            rank1: d.sec_rank1,
            rank2: d.sec_rank2,
            suit: d.sec_suit,
        });
        Claim { primary, secondary }
    }
}

impl From<&Claim> for ClaimDescriptor {
    fn from(claim: &Claim) -> Self {
        let sec = claim.secondary.clone().unwrap_or_default();
        ClaimDescriptor {
            combo: claim.primary.combo.as_ref().map(ComboName::to_string),
            rank1: claim.primary.rank1,
            rank2: claim.primary.rank2,
            suit: claim.primary.suit,
            sec_combo: sec.combo.as_ref().map(ComboName::to_string),
            sec_rank1: sec.rank1,
            sec_rank2: sec.rank2,
            sec_suit: sec.suit,
        }
    }
}

// --- 单元测试 ---
