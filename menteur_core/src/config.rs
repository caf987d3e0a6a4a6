use std::time::Duration;

/// 最多可以输掉的命数，quota 超过此值即被淘汰
pub const MAX_LIVES: u32 = 6;

/// 牌局参数。默认值即线上规则。
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub max_lives: u32,
    /// 计时模式下每个玩家的行动时间
    pub turn_timeout: Duration,
    /// 质疑摊牌后到下一局开始的展示时间
    pub showdown_delay: Duration,
    /// 超时判罚后到下一局开始的展示时间
    pub timeout_delay: Duration,
    pub odds: ModifierOdds,
}

/// 每局开始时特殊模式的概率。
///
/// `blind`、`double_penalty`、`timer` 共用同一次随机抽取、互斥；
/// `revolution` 单独抽取，且盲牌局不会触发。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifierOdds {
    pub blind: f64,
    pub double_penalty: f64,
    pub timer: f64,
    pub revolution: f64,
}

impl Default for ModifierOdds {
    fn default() -> Self {
        ModifierOdds {
            blind: 0.05,
            double_penalty: 0.10,
            timer: 0.10,
            revolution: 0.15,
        }
    }
}

impl ModifierOdds {
    /// 不触发任何特殊模式
    pub fn none() -> Self {
        ModifierOdds { blind: 0.0, double_penalty: 0.0, timer: 0.0, revolution: 0.0 }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            max_lives: MAX_LIVES,
            turn_timeout: Duration::from_millis(10_500),
            showdown_delay: Duration::from_secs(6),
            timeout_delay: Duration::from_secs(4),
            odds: ModifierOdds::default(),
        }
    }
}
