//! Room manager: creates, tracks, and routes players to rooms.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skirmish_protocol::{PlayerId, RoomId};

use crate::room::spawn_room;
use crate::{
    CharacterSheet, ClientEvent, GameSession, ItemEffects, JoinAck, Journal, MapLayout,
    PlayerSender, RoomConfig, RoomError, RoomHandle, RoomInfo, SessionView, StandardItemEffects,
    TracingJournal,
};

/// Range of generated room codes (4 digits).
const ROOM_CODES: std::ops::Range<u32> = 1000..10000;

/// Manages all live rooms and tracks which player is in which room.
///
/// A player is in at most one room at a time. Rooms whose actor has
/// stopped (game finished, room closed) are pruned lazily.
pub struct RoomManager {
    rooms: HashMap<RoomId, RoomHandle>,
    player_rooms: HashMap<PlayerId, RoomId>,
    config: RoomConfig,
    effects: Arc<dyn ItemEffects>,
    journal: Arc<dyn Journal>,
    rng: StdRng,
}

impl RoomManager {
    pub fn new(config: RoomConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            config,
            effects: Arc::new(StandardItemEffects),
            journal: Arc::new(TracingJournal),
            rng,
        }
    }

    /// Replaces the item effects given to rooms created from now on.
    pub fn with_effects(mut self, effects: Arc<dyn ItemEffects>) -> Self {
        self.effects = effects;
        self
    }

    /// Replaces the journal given to rooms created from now on.
    pub fn with_journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a lobby on `layout` and returns its id.
    ///
    /// Without a requested id a free 4-digit code is drawn. Requesting an
    /// id that is already live fails with [`RoomError::Duplicate`].
    pub fn create_room(
        &mut self,
        requested: Option<RoomId>,
        layout: MapLayout,
    ) -> Result<RoomId, RoomError> {
        self.prune_closed();
        let room_id = match requested {
            Some(id) if self.rooms.contains_key(&id) => return Err(RoomError::Duplicate(id)),
            Some(id) => id,
            None => self.fresh_code(),
        };

        let mut rng = StdRng::seed_from_u64(self.rng.random());
        let map_id = layout.id.clone();
        let session = GameSession::new(room_id.clone(), layout, &mut rng)?;
        let handle = spawn_room(
            session,
            &self.config,
            rng,
            Arc::clone(&self.effects),
            Arc::clone(&self.journal),
        );
        self.rooms.insert(room_id.clone(), handle);
        tracing::info!(%room_id, %map_id, "room created");
        Ok(room_id)
    }

    fn fresh_code(&mut self) -> RoomId {
        loop {
            let code = RoomId::new(self.rng.random_range(ROOM_CODES).to_string());
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// Adds a player to a room.
    ///
    /// Enforces the "one room at a time" invariant.
    pub async fn join_room(
        &mut self,
        player_id: PlayerId,
        room_id: RoomId,
        sheet: CharacterSheet,
        sender: PlayerSender,
    ) -> Result<JoinAck, RoomError> {
        self.prune_closed();
        if let Some(current) = self.player_rooms.get(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id, current.clone()));
        }

        let handle = self
            .rooms
            .get(&room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        let ack = handle.join(player_id, sheet, sender).await?;
        self.player_rooms.insert(player_id, room_id);
        Ok(ack)
    }

    /// Removes a player from their current room.
    pub async fn leave_room(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let room_id = self
            .player_rooms
            .remove(&player_id)
            .ok_or(RoomError::NotInRoom(player_id))?;

        match self.rooms.get(&room_id) {
            // A room that already stopped has nothing left to tell.
            Some(handle) if !handle.is_closed() => match handle.leave(player_id).await {
                Err(RoomError::Unavailable(_)) => Ok(()),
                other => other,
            },
            _ => Ok(()),
        }
    }

    /// Routes a game event from a player to their current room.
    pub async fn route_event(
        &mut self,
        player_id: PlayerId,
        event: ClientEvent,
    ) -> Result<(), RoomError> {
        if matches!(event, ClientEvent::LeaveRoom) {
            return self.leave_room(player_id).await;
        }
        let room_id = self
            .player_rooms
            .get(&player_id)
            .ok_or(RoomError::NotInRoom(player_id))?;
        let handle = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        handle.send_event(player_id, event).await
    }

    /// Returns info about a specific room.
    pub async fn get_room_info(&self, room_id: &RoomId) -> Result<RoomInfo, RoomError> {
        self.handle(room_id)?.get_info().await
    }

    /// Current session view of a room.
    pub async fn snapshot(&self, room_id: &RoomId) -> Result<SessionView, RoomError> {
        self.handle(room_id)?.snapshot().await
    }

    fn handle(&self, room_id: &RoomId) -> Result<&RoomHandle, RoomError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    /// Forgets rooms whose actor has stopped, and their players.
    /// Returns how many rooms were dropped.
    pub fn prune_closed(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, handle| !handle.is_closed());
        let rooms = &self.rooms;
        self.player_rooms.retain(|_, rid| rooms.contains_key(rid));
        let pruned = before - self.rooms.len();
        if pruned > 0 {
            tracing::debug!(pruned, "closed rooms pruned");
        }
        pruned
    }

    /// The room a player is currently in, if any.
    pub fn room_of(&self, player_id: PlayerId) -> Option<&RoomId> {
        self.player_rooms.get(&player_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
