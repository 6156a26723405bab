use crate::PositionError;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Move, Role, Square};
use std::fmt;
use std::str::FromStr;

/// One half-move: origin, destination and an optional promotion piece.
///
/// Castling is expressed as the king's two-square move (`e1g1`), the way UCI
/// engines and board widgets both expect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalfMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl HalfMove {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, role: Role) -> Self {
        self.promotion = Some(role);
        self
    }

    pub(crate) fn from_legal(m: &Move) -> Option<Self> {
        match m.to_uci(CastlingMode::Standard) {
            UciMove::Normal {
                from,
                to,
                promotion,
            } => Some(Self {
                from,
                to,
                promotion,
            }),
            _ => None,
        }
    }

    pub(crate) fn to_uci_move(self) -> UciMove {
        UciMove::Normal {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
    }
}

impl fmt::Display for HalfMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role.char())?;
        }
        Ok(())
    }
}

impl FromStr for HalfMove {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PositionError::InvalidMove(s.to_string());
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(invalid());
        }

        let from: Square = s[0..2].parse().map_err(|_| invalid())?;
        let to: Square = s[2..4].parse().map_err(|_| invalid())?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => match Role::from_char(c.to_ascii_lowercase()) {
                Some(role @ (Role::Queen | Role::Rook | Role::Bishop | Role::Knight)) => {
                    Some(role)
                }
                _ => return Err(invalid()),
            },
        };

        Ok(Self {
            from,
            to,
            promotion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let mv: HalfMove = "e2e4".parse().unwrap();
        assert_eq!(mv, HalfMove::new(Square::E2, Square::E4));
        assert_eq!(mv.to_string(), "e2e4");

        let promo: HalfMove = "a7a8n".parse().unwrap();
        assert_eq!(promo.promotion, Some(Role::Knight));
        assert_eq!(promo.to_string(), "a7a8n");
    }

    #[test]
    fn rejects_malformed() {
        assert!("e2".parse::<HalfMove>().is_err());
        assert!("e2e9".parse::<HalfMove>().is_err());
        assert!("e7e8k".parse::<HalfMove>().is_err());
        assert!("e7e8qq".parse::<HalfMove>().is_err());
        assert!("é2e4".parse::<HalfMove>().is_err());
    }
}
