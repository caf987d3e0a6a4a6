use thiserror::Error;

/// 被拒绝的玩家动作。只回复给发起者，牌局状态保持不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Pas votre tour")]
    NotYourTurn,
    #[error("Enchère insuffisante ! Vous devez monter.")]
    InsufficientRaise,
    #[error("Impossible, le joueur précédent est parti. Veuillez enchérir.")]
    NoDeclarer,
    #[error("La partie n'a pas commencé.")]
    NotStarted,
    #[error("La manche est terminée, patientez.")]
    RoundResolving,
    #[error("Joueur inconnu.")]
    UnknownPlayer,
    #[error("Une partie est déjà en cours. Impossible de rejoindre.")]
    GameInProgress,
}
