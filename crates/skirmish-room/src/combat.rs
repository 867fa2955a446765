//! Two-player combat.
//!
//! A [`Combat`] only tracks who fights and whose combat turn it is; life,
//! evasions, and counters live on the players inside the
//! [`GameSession`]. The room actor drives it: it calls [`Combat::attack`]
//! or [`Combat::evade`] for the combat-turn holder, passes the turn, and
//! calls [`conclude`] when someone drops to zero life.

use rand::Rng;
use skirmish_grid::Position;
use skirmish_protocol::PlayerId;

use crate::{GameRules, GameSession, ItemEffects, ItemPlacement, RoomError};

/// `true` iff `(attack_draw + attack) - (defense_draw + defense) > 0`.
pub fn attack_succeeds(attack_draw: u32, attack: i32, defense_draw: u32, defense: i32) -> bool {
    let offense = i64::from(attack_draw) + i64::from(attack);
    let guard = i64::from(defense_draw) + i64::from(defense);
    offense - guard > 0
}

/// Outcome of one attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackReport {
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub attack_draw: u32,
    pub defense_draw: u32,
    pub success: bool,
    pub defender_life: u32,
}

impl AttackReport {
    /// The defender has no life left; the combat is over.
    pub fn is_lethal(&self) -> bool {
        self.defender_life == 0
    }
}

/// Outcome of one evasion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvasionReport {
    Escaped { player: PlayerId },
    Failed { player: PlayerId, evasions_left: u32 },
}

/// What [`conclude`] did to the loser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conclusion {
    pub winner: PlayerId,
    pub loser: PlayerId,
    pub respawned_at: Position,
    pub dropped: Vec<ItemPlacement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combat {
    challenger: PlayerId,
    opponent: PlayerId,
    turn: PlayerId,
}

impl Combat {
    /// A combat where the challenger acts first.
    pub fn new(challenger: PlayerId, opponent: PlayerId) -> Self {
        Self {
            challenger,
            opponent,
            turn: challenger,
        }
    }

    /// Validates an engagement and starts it: the opponent must be an
    /// active player adjacent to the challenger, and the challenger pays
    /// one action. Both sides get a fresh set of evasions.
    pub fn begin(
        session: &mut GameSession,
        challenger: PlayerId,
        opponent: PlayerId,
        max_evasions: u32,
    ) -> Result<Self, RoomError> {
        if challenger == opponent {
            return Err(RoomError::InvalidTransition(format!(
                "{challenger} cannot fight itself"
            )));
        }
        let attacker = session
            .player(challenger)
            .ok_or(RoomError::PlayerNotFound(challenger))?;
        let target = session
            .player(opponent)
            .filter(|p| p.active)
            .ok_or(RoomError::PlayerNotFound(opponent))?;
        if !attacker.position.is_adjacent(target.position) {
            return Err(RoomError::InvalidTransition(format!(
                "{opponent} is not adjacent to {challenger}"
            )));
        }
        if attacker.stats.actions == 0 {
            return Err(RoomError::Exhausted(format!(
                "{challenger} has no actions left"
            )));
        }

        for id in [challenger, opponent] {
            if let Some(p) = session.player_mut(id) {
                p.stats.evasions = max_evasions;
                if id == challenger {
                    p.stats.actions -= 1;
                }
            }
        }
        Ok(Self::new(challenger, opponent))
    }

    pub fn challenger(&self) -> PlayerId {
        self.challenger
    }

    pub fn opponent(&self) -> PlayerId {
        self.opponent
    }

    /// Whose combat turn it is.
    pub fn turn(&self) -> PlayerId {
        self.turn
    }

    pub fn involves(&self, id: PlayerId) -> bool {
        id == self.challenger || id == self.opponent
    }

    /// The other participant.
    pub fn other(&self, id: PlayerId) -> PlayerId {
        if id == self.challenger {
            self.opponent
        } else {
            self.challenger
        }
    }

    pub fn pass_turn(&mut self) {
        self.turn = self.other(self.turn);
    }

    fn check_turn(&self, id: PlayerId) -> Result<(), RoomError> {
        if id != self.turn {
            return Err(RoomError::InvalidTransition(format!(
                "not {id}'s combat turn"
            )));
        }
        Ok(())
    }

    /// Rolls both dice and resolves an attack by `attacker`, who must
    /// hold the combat turn.
    pub fn attack<R: Rng>(
        &mut self,
        session: &mut GameSession,
        attacker: PlayerId,
        rng: &mut R,
    ) -> Result<AttackReport, RoomError> {
        self.check_turn(attacker)?;
        let defender = self.other(attacker);
        let attack_die = session
            .player(attacker)
            .ok_or(RoomError::PlayerNotFound(attacker))?
            .stats
            .attack_die;
        let defense_die = session
            .player(defender)
            .ok_or(RoomError::PlayerNotFound(defender))?
            .stats
            .defense_die;
        let attack_draw = attack_die.roll(rng);
        let defense_draw = defense_die.roll(rng);
        self.resolve(session, attack_draw, defense_draw)
    }

    /// Resolves an attack by the combat-turn holder with known draws.
    /// On success the defender loses exactly one life, never going
    /// below zero.
    pub fn resolve(
        &mut self,
        session: &mut GameSession,
        attack_draw: u32,
        defense_draw: u32,
    ) -> Result<AttackReport, RoomError> {
        let attacker = self.turn;
        let defender = self.other(attacker);
        let attack = session
            .player(attacker)
            .ok_or(RoomError::PlayerNotFound(attacker))?
            .stats
            .attack;
        let target = session
            .player_mut(defender)
            .ok_or(RoomError::PlayerNotFound(defender))?;

        let success = attack_succeeds(attack_draw, attack, defense_draw, target.stats.defense);
        if success {
            target.stats.life = target.stats.life.saturating_sub(1);
            target.record.life_lost += 1;
        }
        let defender_life = target.stats.life;
        if success {
            if let Some(p) = session.player_mut(attacker) {
                p.record.life_taken += 1;
            }
        }

        Ok(AttackReport {
            attacker,
            defender,
            attack_draw,
            defense_draw,
            success,
            defender_life,
        })
    }

    /// Spends one evasion attempt of `player`, who must hold the combat
    /// turn and have attempts left.
    pub fn evade<R: Rng>(
        &mut self,
        session: &mut GameSession,
        player: PlayerId,
        probability: f64,
        rng: &mut R,
    ) -> Result<EvasionReport, RoomError> {
        self.check_turn(player)?;
        let p = session
            .player_mut(player)
            .ok_or(RoomError::PlayerNotFound(player))?;
        if p.stats.evasions == 0 {
            return Err(RoomError::Exhausted(format!("{player} has no evasions left")));
        }
        p.stats.evasions -= 1;
        if rng.random_bool(probability.clamp(0.0, 1.0)) {
            p.record.evasions += 1;
            Ok(EvasionReport::Escaped { player })
        } else {
            Ok(EvasionReport::Failed {
                player,
                evasions_left: p.stats.evasions,
            })
        }
    }

    fn restore_lives(&self, session: &mut GameSession) {
        for id in [self.challenger, self.opponent] {
            if let Some(p) = session.player_mut(id) {
                p.stats.life = p.stats.max_life;
                p.record.combats += 1;
            }
        }
    }
}

/// Closes a combat won by `winner`: counters for both sides, lives
/// restored, and the loser drops its inventory and goes back to spawn.
pub fn conclude(
    session: &mut GameSession,
    combat: &Combat,
    winner: PlayerId,
    effects: &dyn ItemEffects,
    rules: &GameRules,
) -> Result<Conclusion, RoomError> {
    let loser = combat.other(winner);
    combat.restore_lives(session);
    if let Some(p) = session.player_mut(winner) {
        p.record.victories += 1;
    }
    if let Some(p) = session.player_mut(loser) {
        p.record.defeats += 1;
    }
    let dropped = session.drop_inventory(loser, effects)?;
    let respawned_at = session.respawn(loser, rules.ice_penalty)?;
    Ok(Conclusion {
        winner,
        loser,
        respawned_at,
        dropped,
    })
}

/// Closes a combat that ended by evasion. Nobody wins.
pub fn conclude_by_evasion(session: &mut GameSession, combat: &Combat) {
    combat.restore_lives(session);
}
