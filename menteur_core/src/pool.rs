//! 叫牌验证引擎
//!
//! 判断一个牌型描述能否从给定的牌池中凑出。匹配采用"首个命中"的
//! 扫描顺序而不是最优选择，因此在个别牌池中（例如先选错三条导致
//! 剩余的牌凑不出对子）结果可能与穷举搜索不同。同一牌池的裁决必须
//! 与既有规则保持一致，不要改成穷举搜索。

use crate::card::{Card, Rank, Suit};
use crate::claim::{Claim, Combination, Combo, ComboName};

/// 单次验证的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub found: bool,
    /// 移除已匹配的牌之后剩下的牌（仅在 `found` 时有意义）
    pub residual: Vec<Card>,
}

/// 验证单个牌型描述
pub fn verify(combination: &Combination, pool: &[Card]) -> Verification {
    let mut pool = Pool { cards: pool.to_vec() };
    let found = pool.matches(combination);
    Verification { found, residual: pool.cards }
}

/// 验证完整的叫牌：主牌型针对全部牌，副牌型针对剩余的牌
pub fn verify_claim(claim: &Claim, pool: &[Card]) -> bool {
    let primary = verify(&claim.primary, pool);
    if !primary.found {
        return false;
    }
    match &claim.secondary {
        Some(secondary) => verify(secondary, &primary.residual).found,
        None => true,
    }
}

/// 摊牌时给玩家看的统计信息，例如牌桌上一共有几张 K
pub fn claim_stats(claim: &Claim, pool: &[Card]) -> Vec<String> {
    let primary = &claim.primary;
    if primary.combo.is_none() {
        return vec![];
    }
    let line = if let Some(rank) = primary.rank1.or(primary.rank2) {
        let count = pool.iter().filter(|c| c.rank == rank).count();
        format!("Il y avait exactement {} cartes au rang {} sur la table.", count, rank)
    } else if let Some(suit) = primary.suit {
        let count = pool.iter().filter(|c| c.suit == suit).count();
        format!("Il y avait exactement {} cartes à {} sur la table.", count, suit)
    } else {
        return vec![];
    };
    vec![line]
}

struct Pool {
    cards: Vec<Card>,
}

impl Pool {
    fn matches(&mut self, combination: &Combination) -> bool {
        let Combination { combo, rank1, rank2, suit } = combination;
        let (rank1, rank2, suit) = (*rank1, *rank2, *suit);
        let Some(combo) = combo.as_ref().and_then(ComboName::known) else {
            return false;
        };

        match combo {
            Combo::Carte => self.take(rank1, None, 1),
            Combo::Paire => self.take_group(rank1, 2),
            Combo::Brelan => self.take_group(rank1, 3),
            Combo::Carre => self.take_group(rank1, 4),
            Combo::DoublePaire => match (rank1, rank2) {
                (Some(r1), Some(r2)) => self.take(Some(r1), None, 2) && self.take(Some(r2), None, 2),
                // 只给出一个点数时按模糊两对处理
                _ => {
                    let pairs = self.ranks_with_at_least(2);
                    if pairs.len() < 2 {
                        return false;
                    }
                    self.take(Some(pairs[0]), None, 2) && self.take(Some(pairs[1]), None, 2)
                }
            },
            Combo::Full => self.take_group(rank1, 3) && self.take_group(rank2, 2),
            Combo::Couleur => match suit {
                Some(s) => self.take(None, Some(s), 5),
                None => match self.suit_counts().into_iter().find(|&(_, n)| n >= 5) {
                    Some((s, _)) => self.take(None, Some(s), 5),
                    None => false,
                },
            },
            Combo::Suite => match find_sequence(&self.cards, false) {
                Some(indices) => {
                    self.remove_indices(indices);
                    true
                }
                None => false,
            },
            Combo::QuinteFlush | Combo::QuinteFlushRoyale => {
                let royal = combo == Combo::QuinteFlushRoyale;
                let suits = match suit {
                    Some(s) => vec![s],
                    None => self.suit_counts().into_iter().map(|(s, _)| s).collect(),
                };
                for s in suits {
                    // 记录同花子集在牌池中的真实下标
                    let (positions, suited): (Vec<usize>, Vec<Card>) = self
                        .cards
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| c.suit == s)
                        .map(|(i, c)| (i, *c))
                        .unzip();
                    if let Some(indices) = find_sequence(&suited, royal) {
                        self.remove_indices(indices.into_iter().map(|k| positions[k]).collect());
                        return true;
                    }
                }
                false
            }
        }
    }

    /// 按扫描顺序找出 `count` 张满足条件的牌；不足时牌池保持不变
    fn take(&mut self, rank: Option<Rank>, suit: Option<Suit>, count: usize) -> bool {
        let indices: Vec<usize> = self
            .cards
            .iter()
            .enumerate()
            .filter(|(_, c)| rank.is_none_or(|r| c.rank == r) && suit.is_none_or(|s| c.suit == s))
            .map(|(i, _)| i)
            .take(count)
            .collect();
        if indices.len() != count {
            return false;
        }
        self.remove_indices(indices);
        true
    }

    /// 同点数的一组牌：指定点数时精确匹配，否则取第一个数量足够的点数
    fn take_group(&mut self, rank: Option<Rank>, size: usize) -> bool {
        match rank {
            Some(r) => self.take(Some(r), None, size),
            None => match self.ranks_with_at_least(size).first() {
                Some(&r) => self.take(Some(r), None, size),
                None => false,
            },
        }
    }

    fn remove_indices(&mut self, mut indices: Vec<usize>) {
        // 从后往前删，避免下标错位
        indices.sort_unstable_by(|a, b| b.cmp(a));
        for i in indices {
            self.cards.remove(i);
        }
    }

    /// 各点数的数量，按该点数在牌池中首次出现的顺序排列
    fn rank_counts(&self) -> Vec<(Rank, usize)> {
        tally(self.cards.iter().map(|c| c.rank))
    }

    fn suit_counts(&self) -> Vec<(Suit, usize)> {
        tally(self.cards.iter().map(|c| c.suit))
    }

    fn ranks_with_at_least(&self, n: usize) -> Vec<Rank> {
        self.rank_counts().into_iter().filter(|&(_, c)| c >= n).map(|(r, _)| r).collect()
    }
}

fn tally<T: PartialEq + Copy>(items: impl Iterator<Item = T>) -> Vec<(T, usize)> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(k, _)| *k == item) {
            Some((_, n)) => *n += 1,
            None => counts.push((item, 1)),
        }
    }
    counts
}

const STRAIGHT_LEN: usize = 5;
const WHEEL: [u8; STRAIGHT_LEN] = [0, 1, 2, 3, 12];

/// 在一组牌中寻找五张连续点数，返回所用牌在 `cards` 中的下标。
///
/// 去重后的点数升序滑动窗口，取第一个满足 `max - min == 4` 的窗口；
/// 皇家同花顺还要求窗口以 A 结尾。没有普通顺子时再检查 A-2-3-4-5。
fn find_sequence(cards: &[Card], royal: bool) -> Option<Vec<usize>> {
    let mut values: Vec<u8> = cards.iter().map(|c| c.rank.value()).collect();
    values.sort_unstable();
    values.dedup();

    let ace = Rank::Ace.value();
    let mut run = values
        .windows(STRAIGHT_LEN)
        .find(|w| w[STRAIGHT_LEN - 1] - w[0] == (STRAIGHT_LEN - 1) as u8 && (!royal || w[STRAIGHT_LEN - 1] == ace))
        .map(|w| w.to_vec());

    if run.is_none() && !royal && WHEEL.iter().all(|v| values.contains(v)) {
        run = Some(WHEEL.to_vec());
    }

    // 每个点数取牌池中第一张该点数的牌
    run.map(|vals| {
        vals.into_iter()
            .filter_map(|v| cards.iter().position(|c| c.rank.value() == v))
            .collect()
    })
}

// --- 单元测试 ---
