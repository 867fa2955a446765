//! Room actor: an isolated Tokio task that owns one game session.
//!
//! Each room runs in its own task and is the single owner of its
//! session, combat, and clocks. Everything that can change the room
//! arrives as a message on one of four channels, consumed by a single
//! `select!` loop, so mutations are serialized without locks:
//!
//! - commands from the outside world ([`RoomHandle`]),
//! - notices from the turn clock,
//! - notices from the combat clock,
//! - self-scheduled wakeups (movement animation, virtual-player thinking).
//!
//! Wakeups carry the epoch they were scheduled in. Ending a turn or
//! starting a combat bumps the epoch, so anything scheduled for the old
//! situation is dropped on arrival.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use skirmish_clock::{CountdownConfig, CountdownEvent, CountdownManager, CountdownNotice};
use skirmish_grid::Position;
use skirmish_protocol::{PlayerId, Recipient, RoomId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::bot::{self, BotAction, CombatChoice, MoveIntent};
use crate::combat::{self, Combat, EvasionReport};
use crate::{
    CharacterSheet, ClientEvent, GameRules, GameSession, ItemEffects, Journal, JournalEntry,
    Player, Profile, RoomConfig, RoomError, RoomState, ServerEvent, SessionView,
};

/// Channel delivering server events to one connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        player_id: PlayerId,
        sheet: CharacterSheet,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<JoinAck, RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Event {
        sender: PlayerId,
        event: ClientEvent,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionView>,
    },
}

/// Answer to a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAck {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    /// Name after collision renaming.
    pub name: String,
    pub is_host: bool,
}

/// A snapshot of room metadata (not the session itself).
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub state: RoomState,
    pub player_count: usize,
    pub capacity: usize,
    pub locked: bool,
    pub host: Option<PlayerId>,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }

    pub async fn join(
        &self,
        player_id: PlayerId,
        sheet: CharacterSheet,
        sender: PlayerSender,
    ) -> Result<JoinAck, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                player_id,
                sheet,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn leave(&self, player_id: PlayerId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                player_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Delivers a client event (fire-and-forget). Failures are reported
    /// to the sender by the room itself.
    pub async fn send_event(&self, sender: PlayerId, event: ClientEvent) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Event { sender, event })
            .await
            .map_err(|_| self.unavailable())
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    pub async fn snapshot(&self) -> Result<SessionView, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnPhase {
    Idle,
    /// Pre-turn delay; actions are rejected.
    Delay,
    Active,
}

#[derive(Debug, Clone, Copy)]
enum Wake {
    /// Next tile of the running movement.
    Step,
    /// A virtual player's next decision on its turn.
    BotAct,
    /// A virtual player's move on its combat turn.
    BotCombat,
}

#[derive(Debug, Clone, Copy)]
struct Wakeup {
    epoch: u64,
    wake: Wake,
}

/// A movement being animated tile by tile.
struct Motion {
    player: PlayerId,
    remaining: VecDeque<Position>,
    fell: bool,
    /// Set for virtual players; decides what follows the move.
    intent: Option<MoveIntent>,
}

enum Input {
    Command(RoomCommand),
    TurnClock(CountdownNotice<RoomId>),
    CombatClock(CountdownNotice<RoomId>),
    Wake(Wakeup),
}

struct RoomActor {
    room_id: RoomId,
    state: RoomState,
    rules: GameRules,
    session: GameSession,
    senders: HashMap<PlayerId, PlayerSender>,
    combat: Option<Combat>,
    phase: TurnPhase,
    motion: Option<Motion>,
    epoch: u64,
    bot_invocations: u32,
    /// Next id handed to a virtual player in this room.
    next_virtual_id: u64,
    turn_clock: CountdownManager<RoomId>,
    combat_clock: CountdownManager<RoomId>,
    turn_rx: mpsc::UnboundedReceiver<CountdownNotice<RoomId>>,
    combat_rx: mpsc::UnboundedReceiver<CountdownNotice<RoomId>>,
    wake_tx: mpsc::UnboundedSender<Wakeup>,
    wake_rx: mpsc::UnboundedReceiver<Wakeup>,
    rng: StdRng,
    effects: Arc<dyn ItemEffects>,
    journal: Arc<dyn Journal>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until the room is finished or closed.
    async fn run(mut self) {
        info!(room_id = %self.room_id, "room actor started");

        while !self.state.is_over() {
            let input = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Input::Command(cmd),
                    None => break,
                },
                Some(notice) = self.turn_rx.recv() => Input::TurnClock(notice),
                Some(notice) = self.combat_rx.recv() => Input::CombatClock(notice),
                Some(wakeup) = self.wake_rx.recv() => Input::Wake(wakeup),
            };

            match input {
                Input::Command(cmd) => self.handle_command(cmd),
                Input::TurnClock(notice) => {
                    if self.turn_clock.is_current(&notice) {
                        self.on_turn_clock(notice.event);
                    }
                }
                Input::CombatClock(notice) => {
                    if self.combat_clock.is_current(&notice) {
                        self.on_combat_clock(notice.event);
                    }
                }
                Input::Wake(wakeup) => {
                    if wakeup.epoch == self.epoch {
                        self.on_wake(wakeup.wake);
                    } else {
                        trace!(room_id = %self.room_id, ?wakeup, "stale wakeup dropped");
                    }
                }
            }
        }

        self.turn_clock.delete(&self.room_id);
        self.combat_clock.delete(&self.room_id);
        info!(room_id = %self.room_id, state = %self.state, "room actor stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player_id,
                sheet,
                sender,
                reply,
            } => {
                let result = self.handle_join(player_id, sheet, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { player_id, reply } => {
                let result = self.handle_leave(player_id);
                let _ = reply.send(result);
            }
            RoomCommand::Event { sender, event } => self.handle_event(sender, event),
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.session.view());
            }
        }
    }

    // -- outbound ---------------------------------------------------------

    /// Sends an event to every connected member `to` addresses.
    /// Silently skips members whose connection is gone.
    fn emit(&self, to: Recipient, event: ServerEvent) {
        for (id, sender) in &self.senders {
            if to.includes(*id) {
                let _ = sender.send(event.clone());
            }
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        self.emit(Recipient::All, event);
    }

    fn send_to(&self, player: PlayerId, event: ServerEvent) {
        self.emit(Recipient::Player(player), event);
    }

    fn broadcast_position(&self, id: PlayerId) {
        if let Some(player) = self.session.player(id) {
            self.broadcast(ServerEvent::PositionUpdate {
                session: self.room_id.clone(),
                player: player.clone(),
            });
        }
    }

    fn record(&self, message: String, involved: Vec<PlayerId>) {
        self.journal
            .record(&self.room_id, JournalEntry::new(message, involved));
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.session
            .player(id)
            .map_or_else(|| id.to_string(), |p| p.name.clone())
    }

    /// Reports a failed request: silent classes are only logged.
    fn report(&self, player: PlayerId, err: RoomError) {
        if err.is_silent() {
            debug!(room_id = %self.room_id, %player, %err, "request ignored");
        } else {
            debug!(room_id = %self.room_id, %player, %err, "request rejected");
            self.send_to(player, ServerEvent::error(&err));
        }
    }

    fn schedule(&self, delay: Duration, wake: Wake) {
        let tx = self.wake_tx.clone();
        let wakeup = Wakeup {
            epoch: self.epoch,
            wake,
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(wakeup);
        });
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            state: self.state,
            player_count: self.session.players().len(),
            capacity: self.session.capacity(),
            locked: self.session.is_locked(),
            host: self.session.host(),
        }
    }

    // -- lobby ------------------------------------------------------------

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        sheet: CharacterSheet,
        sender: PlayerSender,
    ) -> Result<JoinAck, RoomError> {
        if !self.state.is_joinable() {
            return Err(RoomError::AlreadyStarted(self.room_id.clone()));
        }
        let name = self
            .session
            .add_player(Player::new(player_id, &sheet))?
            .name
            .clone();
        self.senders.insert(player_id, sender);
        info!(
            room_id = %self.room_id,
            %player_id,
            %name,
            players = self.session.players().len(),
            "player joined"
        );

        self.send_to(
            player_id,
            ServerEvent::RoomJoined {
                room_id: self.room_id.clone(),
                you: player_id,
                name: name.clone(),
            },
        );
        self.broadcast(ServerEvent::RoomUpdated {
            room: self.session.view(),
        });
        Ok(JoinAck {
            room_id: self.room_id.clone(),
            player_id,
            name,
            is_host: self.session.host() == Some(player_id),
        })
    }

    fn require_host_in_lobby(&self, requester: PlayerId) -> Result<(), RoomError> {
        if self.state != RoomState::Lobby {
            return Err(RoomError::AlreadyStarted(self.room_id.clone()));
        }
        if self.session.host() != Some(requester) {
            return Err(RoomError::NotHost(requester));
        }
        Ok(())
    }

    fn add_virtual_player(&mut self, requester: PlayerId, profile: Profile) -> Result<(), RoomError> {
        self.require_host_in_lobby(requester)?;
        let id = PlayerId(self.next_virtual_id);
        let name = bot::bot_name(&mut self.rng);
        let sheet = CharacterSheet::random(name, &mut self.rng);
        let name = self
            .session
            .add_player(Player::virtual_player(id, &sheet, profile))?
            .name
            .clone();
        self.next_virtual_id += 1;
        info!(room_id = %self.room_id, player_id = %id, %name, ?profile, "virtual player added");
        self.broadcast(ServerEvent::RoomUpdated {
            room: self.session.view(),
        });
        Ok(())
    }

    fn set_locked(&mut self, requester: PlayerId, locked: bool) -> Result<(), RoomError> {
        self.require_host_in_lobby(requester)?;
        self.session.set_locked(locked)?;
        debug!(room_id = %self.room_id, locked, "lock toggled");
        self.broadcast(ServerEvent::RoomUpdated {
            room: self.session.view(),
        });
        Ok(())
    }

    fn start_game(&mut self, requester: PlayerId) -> Result<(), RoomError> {
        self.require_host_in_lobby(requester)?;
        self.session.start(&self.rules, &mut self.rng)?;
        self.transition(RoomState::InProgress);
        info!(
            room_id = %self.room_id,
            players = self.session.players().len(),
            "game started"
        );
        self.broadcast(ServerEvent::GameStarted {
            room: self.session.view(),
        });
        self.begin_turn();
        Ok(())
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        if self.session.player(player_id).is_none() {
            return Err(RoomError::NotInRoom(player_id));
        }
        if self.state == RoomState::Lobby {
            let gone = self.session.remove_player(player_id)?;
            self.senders.remove(&player_id);
            info!(room_id = %self.room_id, %player_id, "player left lobby");
            if gone.was_host {
                self.close_room("host left");
                return Ok(());
            }
            self.broadcast(ServerEvent::PlayerLeft {
                player: player_id,
                name: gone.player.name,
            });
            self.broadcast(ServerEvent::RoomUpdated {
                room: self.session.view(),
            });
            return Ok(());
        }
        self.leave_mid_game(player_id)
    }

    /// A player drops out of a running game. A combat they were in is
    /// forfeited on the spot; a movement they were making stops where it
    /// is.
    fn leave_mid_game(&mut self, id: PlayerId) -> Result<(), RoomError> {
        let gone = self.session.remove_player(id)?;
        self.senders.remove(&id);
        info!(room_id = %self.room_id, player_id = %id, "player left game");

        match self.session.drop_inventory(id, self.effects.as_ref()) {
            Ok(dropped) => {
                for item in dropped {
                    self.broadcast(ServerEvent::ItemDropped {
                        position: item.position,
                        item: item.kind,
                    });
                }
            }
            Err(err) => warn!(room_id = %self.room_id, %err, "could not drop inventory"),
        }
        self.broadcast(ServerEvent::PlayerLeft {
            player: id,
            name: gone.player.name.clone(),
        });
        self.record(format!("{} left the game", gone.player.name), vec![id]);

        if self.motion.as_ref().is_some_and(|m| m.player == id) {
            self.motion = None;
        }

        let forfeit = self
            .combat
            .as_ref()
            .filter(|c| c.involves(id))
            .map(|c| c.other(id));
        if let Some(winner) = forfeit {
            info!(room_id = %self.room_id, loser = %id, %winner, "combat forfeited");
            self.finish_combat(winner);
            return Ok(());
        }

        if self.check_game_over() {
            return Ok(());
        }
        if gone.was_current {
            self.end_turn();
        }
        Ok(())
    }

    // -- events -----------------------------------------------------------

    fn handle_event(&mut self, sender: PlayerId, event: ClientEvent) {
        if !self.senders.contains_key(&sender) {
            warn!(room_id = %self.room_id, %sender, "event from non-member, ignoring");
            return;
        }
        let result = match event {
            ClientEvent::CreateRoom { .. } | ClientEvent::JoinRoom { .. } => Err(
                RoomError::InvalidTransition("lobby event sent to a room".into()),
            ),
            ClientEvent::AddVirtualPlayer { profile } => self.add_virtual_player(sender, profile),
            ClientEvent::SetLocked { locked } => self.set_locked(sender, locked),
            ClientEvent::LeaveRoom => self.handle_leave(sender),
            ClientEvent::StartGame => self.start_game(sender),
            ClientEvent::EndTurn => self.request_end_turn(sender),
            ClientEvent::RequestMoves => self.send_moves(sender),
            ClientEvent::MoveTo { destination } => self.start_move(sender, destination, None),
            ClientEvent::StartCombat { opponent } => self.start_combat(sender, opponent),
            ClientEvent::Attack => self.combat_attack(sender),
            ClientEvent::StartEvasion => self.combat_evade(sender),
            ClientEvent::ToggleDoor { position } => self.toggle_door(sender, position),
            ClientEvent::BreakWall { position } => self.break_wall(sender, position),
        };
        if let Err(err) = result {
            self.report(sender, err);
        }
    }

    /// The player may act on their turn right now.
    fn require_turn(&self, id: PlayerId) -> Result<(), RoomError> {
        if !self.state.is_active() {
            return Err(RoomError::InvalidTransition("game is not running".into()));
        }
        if self.session.current_id() != Some(id) {
            return Err(RoomError::InvalidTransition(format!("not {id}'s turn")));
        }
        if self.phase != TurnPhase::Active {
            return Err(RoomError::InvalidTransition("turn has not begun".into()));
        }
        if self.combat.is_some() {
            return Err(RoomError::InvalidTransition("combat in progress".into()));
        }
        if self.motion.is_some() {
            return Err(RoomError::InvalidTransition("still moving".into()));
        }
        Ok(())
    }

    fn request_end_turn(&mut self, id: PlayerId) -> Result<(), RoomError> {
        self.require_turn(id)?;
        debug!(room_id = %self.room_id, player_id = %id, "turn ended by player");
        self.end_turn();
        Ok(())
    }

    fn send_moves(&self, id: PlayerId) -> Result<(), RoomError> {
        if self.session.current_id() != Some(id) || self.motion.is_some() {
            return Err(RoomError::InvalidTransition(format!("not {id}'s turn")));
        }
        let moves = self
            .session
            .reachable_for(id)?
            .into_iter()
            .map(|(destination, route)| crate::PossibleMove {
                destination,
                cost: route.cost,
                path: route.path,
            })
            .collect();
        self.send_to(id, ServerEvent::PossibleMoves { moves });
        Ok(())
    }

    fn toggle_door(&mut self, id: PlayerId, position: Position) -> Result<(), RoomError> {
        self.require_turn(id)?;
        let open = self.session.toggle_door(id, position)?;
        self.broadcast(ServerEvent::DoorToggled { position, open });
        let verb = if open { "opened" } else { "closed" };
        self.record(
            format!("{} {verb} the door at {position}", self.name_of(id)),
            vec![id],
        );
        Ok(())
    }

    fn break_wall(&mut self, id: PlayerId, position: Position) -> Result<(), RoomError> {
        self.require_turn(id)?;
        self.session.break_wall(id, position)?;
        self.broadcast(ServerEvent::WallBroken { position });
        self.record(
            format!("{} broke the wall at {position}", self.name_of(id)),
            vec![id],
        );
        Ok(())
    }

    // -- turns ------------------------------------------------------------

    fn begin_turn(&mut self) {
        self.epoch += 1;
        self.motion = None;
        self.bot_invocations = 0;
        self.phase = TurnPhase::Delay;

        let Some(current) = self.session.current_id() else {
            self.close_room("no active players");
            return;
        };
        let actions = self.rules.actions_per_turn;
        if let Some(player) = self.session.player_mut(current) {
            player.begin_turn(actions);
        }
        debug!(room_id = %self.room_id, player_id = %current, turn = self.session.turn_count(), "turn handed over");
        self.broadcast(ServerEvent::PlayerTurn {
            player: current,
            name: self.name_of(current),
        });

        self.turn_clock.start(&self.room_id);
        if self.rules.pre_turn_delay_secs == 0 {
            self.on_turn_began();
        }
    }

    fn on_turn_clock(&mut self, event: CountdownEvent) {
        match event {
            CountdownEvent::DelayTick { remaining } => {
                self.broadcast(ServerEvent::PreTurnDelay { remaining });
            }
            CountdownEvent::Began => self.on_turn_began(),
            CountdownEvent::Tick { remaining } => {
                self.session.tick_elapsed();
                self.broadcast(ServerEvent::TurnTick { remaining });
            }
            CountdownEvent::Expired => {
                if self.combat.is_some() {
                    return;
                }
                debug!(room_id = %self.room_id, "turn timed out");
                self.end_turn();
            }
        }
    }

    fn on_turn_began(&mut self) {
        self.phase = TurnPhase::Active;
        let Some(player) = self.session.current_player() else {
            return;
        };
        let (id, is_virtual) = (player.id, player.is_virtual());
        self.send_to(
            id,
            ServerEvent::YourTurn {
                move_points: player.stats.move_points,
                actions: player.stats.actions,
            },
        );
        if is_virtual {
            self.schedule(self.rules.bot_think_delay, Wake::BotAct);
        }
    }

    /// Hands the turn to the next active player.
    fn end_turn(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.turn_clock.reset(&self.room_id);
        self.motion = None;
        self.phase = TurnPhase::Idle;
        if self.check_game_over() {
            return;
        }
        match self.session.advance_turn() {
            Some(_) => self.begin_turn(),
            None => self.close_room("no active players"),
        }
    }

    /// Ends the game if it is over. Returns `true` when it did.
    fn check_game_over(&mut self) -> bool {
        if !self.state.is_active() {
            return true;
        }
        if !self.session.has_active_human() {
            self.close_room("no human players left");
            return true;
        }
        match self.session.winner(&self.rules) {
            Some(winner) => {
                self.finish_game(winner);
                true
            }
            None => false,
        }
    }

    fn finish_game(&mut self, winner: PlayerId) {
        self.turn_clock.delete(&self.room_id);
        self.combat_clock.delete(&self.room_id);
        self.combat = None;
        self.motion = None;
        self.transition(RoomState::Finished);

        let name = self.name_of(winner);
        info!(
            room_id = %self.room_id,
            %winner,
            duration_secs = self.session.elapsed_secs(),
            turns = self.session.turn_count(),
            "game finished"
        );
        self.broadcast(ServerEvent::GameFinished {
            winner,
            name: name.clone(),
            duration_secs: self.session.elapsed_secs(),
            turns: self.session.turn_count(),
        });
        self.record(format!("{name} won the game"), vec![winner]);
    }

    fn close_room(&mut self, reason: &str) {
        info!(room_id = %self.room_id, reason, "room closed");
        self.broadcast(ServerEvent::RoomClosed {
            room_id: self.room_id.clone(),
        });
        self.transition(RoomState::Closed);
    }

    fn transition(&mut self, target: RoomState) {
        if !self.state.can_transition_to(target) {
            warn!(room_id = %self.room_id, from = %self.state, to = %target, "unexpected room transition");
        }
        self.state = target;
    }

    // -- movement ---------------------------------------------------------

    fn start_move(
        &mut self,
        id: PlayerId,
        destination: Position,
        intent: Option<MoveIntent>,
    ) -> Result<(), RoomError> {
        self.require_turn(id)?;
        let movement =
            self.session
                .plan_move(id, destination, self.rules.fall_probability, &mut self.rng)?;
        if movement.path.is_empty() {
            return Err(RoomError::InvalidTransition(format!(
                "{destination} is where {id} stands"
            )));
        }
        debug!(
            room_id = %self.room_id,
            player_id = %id,
            %destination,
            cost = movement.cost,
            fell = movement.fell,
            "movement started"
        );
        self.motion = Some(Motion {
            player: id,
            remaining: movement.path.into(),
            fell: movement.fell,
            intent,
        });
        self.schedule(self.rules.move_step_delay, Wake::Step);
        Ok(())
    }

    fn advance_motion(&mut self) {
        let Some(motion) = self.motion.as_mut() else {
            return;
        };
        let player = motion.player;
        let Some(cell) = motion.remaining.pop_front() else {
            self.finish_motion();
            return;
        };

        if let Err(err) = self
            .session
            .step_player(player, cell, self.rules.ice_penalty)
        {
            debug!(room_id = %self.room_id, %err, "movement interrupted");
            if let Some(m) = self.motion.as_mut() {
                m.remaining.clear();
                m.fell = false;
            }
            self.finish_motion();
            return;
        }
        self.broadcast_position(player);

        match self
            .session
            .pick_up(player, self.effects.as_ref(), self.rules.inventory_capacity)
        {
            Ok(Some(pickup)) => {
                self.broadcast(ServerEvent::ItemPickedUp {
                    player,
                    item: pickup.item,
                    dropped: pickup.dropped,
                });
                if let Some(dropped) = pickup.dropped {
                    self.broadcast(ServerEvent::ItemDropped {
                        position: cell,
                        item: dropped,
                    });
                }
                self.record(
                    format!("{} picked up {:?}", self.name_of(player), pickup.item),
                    vec![player],
                );
            }
            Ok(None) => {}
            Err(err) => warn!(room_id = %self.room_id, %err, "pickup failed"),
        }

        if self.motion.as_ref().is_some_and(|m| m.remaining.is_empty()) {
            self.finish_motion();
        } else {
            self.schedule(self.rules.move_step_delay, Wake::Step);
        }
    }

    fn finish_motion(&mut self) {
        let Some(motion) = self.motion.take() else {
            return;
        };
        if motion.fell {
            self.send_to(motion.player, ServerEvent::YouFell);
            self.record(
                format!("{} slipped on the ice", self.name_of(motion.player)),
                vec![motion.player],
            );
        }
        self.send_to(motion.player, ServerEvent::YouFinishedMoving);

        if self.check_game_over() {
            return;
        }
        if let Some(intent) = motion.intent {
            self.continue_bot(motion.player, intent);
        }
    }

    // -- combat -----------------------------------------------------------

    fn start_combat(&mut self, challenger: PlayerId, opponent: PlayerId) -> Result<(), RoomError> {
        self.require_turn(challenger)?;
        let combat = Combat::begin(
            &mut self.session,
            challenger,
            opponent,
            self.rules.max_evasions,
        )?;
        self.epoch += 1;
        self.combat = Some(combat);

        let remaining = self.turn_clock.pause(&self.room_id).unwrap_or(0);
        self.broadcast(ServerEvent::CountdownPaused { remaining });
        self.broadcast(ServerEvent::CombatStarted {
            challenger,
            opponent,
        });
        info!(room_id = %self.room_id, %challenger, %opponent, "combat started");
        self.record(
            format!(
                "{} challenged {}",
                self.name_of(challenger),
                self.name_of(opponent)
            ),
            vec![challenger, opponent],
        );
        self.begin_combat_turn();
        Ok(())
    }

    /// Starts the combat clock for whoever holds the combat turn. The
    /// clock is longer while they can still evade.
    fn begin_combat_turn(&mut self) {
        let Some(holder) = self.combat.as_ref().map(Combat::turn) else {
            return;
        };
        self.epoch += 1;
        let (evasions, is_virtual) = self
            .session
            .player(holder)
            .map_or((0, false), |p| (p.stats.evasions, p.is_virtual()));
        self.combat_clock
            .start_with(&self.room_id, self.rules.combat_secs(evasions));
        self.broadcast(ServerEvent::CombatTurn {
            player: holder,
            evasions,
        });
        if is_virtual {
            self.schedule(self.rules.bot_think_delay, Wake::BotCombat);
        }
    }

    fn on_combat_clock(&mut self, event: CountdownEvent) {
        match event {
            CountdownEvent::Tick { remaining } => {
                self.session.tick_elapsed();
                self.broadcast(ServerEvent::CombatTick { remaining });
            }
            CountdownEvent::Expired => {
                let Some(holder) = self.combat.as_ref().map(Combat::turn) else {
                    return;
                };
                debug!(room_id = %self.room_id, %holder, "combat turn timed out, attacking");
                if let Err(err) = self.combat_attack(holder) {
                    warn!(room_id = %self.room_id, %err, "automatic attack failed");
                }
            }
            CountdownEvent::DelayTick { .. } | CountdownEvent::Began => {}
        }
    }

    fn combat_attack(&mut self, attacker: PlayerId) -> Result<(), RoomError> {
        let combat = self
            .combat
            .as_mut()
            .ok_or_else(|| RoomError::InvalidTransition("no combat in progress".into()))?;
        let report = combat.attack(&mut self.session, attacker, &mut self.rng)?;

        self.broadcast(ServerEvent::DiceRolled {
            attack_draw: report.attack_draw,
            defense_draw: report.defense_draw,
        });
        if report.success {
            self.broadcast(ServerEvent::AttackSuccess {
                attacker: report.attacker,
                defender: report.defender,
                defender_life: report.defender_life,
            });
        } else {
            self.broadcast(ServerEvent::AttackFailure {
                attacker: report.attacker,
                defender: report.defender,
            });
        }

        if report.is_lethal() {
            self.finish_combat(report.attacker);
        } else {
            if let Some(combat) = self.combat.as_mut() {
                combat.pass_turn();
            }
            self.begin_combat_turn();
        }
        Ok(())
    }

    fn combat_evade(&mut self, player: PlayerId) -> Result<(), RoomError> {
        let probability = self.rules.evasion_probability;
        let combat = self
            .combat
            .as_mut()
            .ok_or_else(|| RoomError::InvalidTransition("no combat in progress".into()))?;
        let report = combat.evade(&mut self.session, player, probability, &mut self.rng)?;

        match report {
            EvasionReport::Escaped { player } => {
                self.broadcast(ServerEvent::EvasionSuccess { player });
                self.broadcast(ServerEvent::CombatFinishedByEvasion {
                    session: self.room_id.clone(),
                    evading_player: player,
                });
                if let Some(combat) = self.combat.take() {
                    combat::conclude_by_evasion(&mut self.session, &combat);
                }
                self.record(format!("{} escaped", self.name_of(player)), vec![player]);
                self.after_combat(None);
            }
            EvasionReport::Failed {
                player,
                evasions_left,
            } => {
                self.broadcast(ServerEvent::EvasionFailed {
                    player,
                    evasions_left,
                });
                if let Some(combat) = self.combat.as_mut() {
                    combat.pass_turn();
                }
                self.begin_combat_turn();
            }
        }
        Ok(())
    }

    fn finish_combat(&mut self, winner: PlayerId) {
        let Some(combat) = self.combat.take() else {
            return;
        };
        match combat::conclude(
            &mut self.session,
            &combat,
            winner,
            self.effects.as_ref(),
            &self.rules,
        ) {
            Ok(done) => {
                self.broadcast(ServerEvent::CombatFinished {
                    session: self.room_id.clone(),
                    winner,
                });
                for item in &done.dropped {
                    self.broadcast(ServerEvent::ItemDropped {
                        position: item.position,
                        item: item.kind,
                    });
                }
                self.broadcast_position(done.loser);
                info!(room_id = %self.room_id, %winner, loser = %done.loser, "combat finished");
                self.record(
                    format!(
                        "{} defeated {}",
                        self.name_of(winner),
                        self.name_of(done.loser)
                    ),
                    vec![winner, done.loser],
                );
                self.after_combat(Some(done.loser));
            }
            Err(err) => {
                warn!(room_id = %self.room_id, %err, "combat bookkeeping failed");
                self.after_combat(None);
            }
        }
    }

    /// Hands control back to the turn system. The turn ends if its
    /// holder lost or its clock ran out meanwhile; otherwise the main
    /// clock resumes where it was paused.
    fn after_combat(&mut self, loser: Option<PlayerId>) {
        self.combat_clock.reset(&self.room_id);
        self.epoch += 1;
        if self.check_game_over() {
            return;
        }

        let current = self.session.current_id();
        if current.is_none() || loser == current {
            self.end_turn();
            return;
        }
        if self.turn_clock.remaining(&self.room_id).unwrap_or(0) == 0 {
            debug!(room_id = %self.room_id, "turn expired during combat");
            self.end_turn();
            return;
        }
        self.turn_clock.resume(&self.room_id);
        if self.session.current_player().is_some_and(Player::is_virtual) {
            self.schedule(self.rules.bot_think_delay, Wake::BotAct);
        }
    }

    // -- virtual players --------------------------------------------------

    fn on_wake(&mut self, wake: Wake) {
        match wake {
            Wake::Step => self.advance_motion(),
            Wake::BotAct => self.bot_act(),
            Wake::BotCombat => self.bot_combat(),
        }
    }

    /// One decision of the virtual player holding the turn.
    fn bot_act(&mut self) {
        let Some(bot) = self
            .session
            .current_player()
            .filter(|p| p.is_virtual())
            .map(|p| p.id)
        else {
            return;
        };
        if self.phase != TurnPhase::Active || self.combat.is_some() || self.motion.is_some() {
            return;
        }
        self.bot_invocations += 1;
        if self.bot_invocations > self.rules.bot_max_invocations {
            debug!(room_id = %self.room_id, %bot, "bot invocation cap reached");
            self.end_turn();
            return;
        }

        if let Some(door) = bot::pick_door(&self.session, bot, &mut self.rng) {
            if let Err(err) = self.toggle_door(bot, door) {
                debug!(room_id = %self.room_id, %bot, %err, "bot door toggle rejected");
            }
        }

        let action = bot::decide(&self.session, bot, &mut self.rng);
        trace!(room_id = %self.room_id, %bot, ?action, "bot decided");
        let result = match action {
            BotAction::Move {
                destination,
                intent,
            } => self.start_move(bot, destination, Some(intent)),
            BotAction::Engage(target) => self.start_combat(bot, target),
            BotAction::EndTurn => {
                self.end_turn();
                Ok(())
            }
        };
        if let Err(err) = result {
            debug!(room_id = %self.room_id, %bot, %err, "bot action rejected, ending turn");
            self.end_turn();
        }
    }

    fn continue_bot(&mut self, bot: PlayerId, intent: MoveIntent) {
        let keep_going = match self.session.player(bot) {
            Some(me) => bot::keeps_going(intent, me, &self.rules, &mut self.rng),
            None => false,
        };
        if keep_going {
            self.schedule(self.rules.bot_think_delay, Wake::BotAct);
        } else {
            self.end_turn();
        }
    }

    /// A virtual player's move on its combat turn.
    fn bot_combat(&mut self) {
        let Some(combat) = self.combat.as_ref() else {
            return;
        };
        let holder = combat.turn();
        let opponent = combat.other(holder);
        if !self.session.player(holder).is_some_and(Player::is_virtual) {
            return;
        }
        let result = match bot::combat_choice(&self.session, holder, opponent) {
            CombatChoice::Attack => self.combat_attack(holder),
            CombatChoice::Evade => self.combat_evade(holder),
        };
        if let Err(err) = result {
            debug!(room_id = %self.room_id, %holder, %err, "bot combat move rejected");
        }
    }
}

impl RoomActor {
    /// Builds the actor of a lobby and the handle that reaches it.
    fn new(
        session: GameSession,
        config: &RoomConfig,
        rng: StdRng,
        effects: Arc<dyn ItemEffects>,
        journal: Arc<dyn Journal>,
    ) -> (Self, RoomHandle) {
        let room_id = session.id().clone();
        let rules = config.rules.clone();
        let (tx, rx) = mpsc::channel(config.channel_size);
        let (turn_tx, turn_rx) = mpsc::unbounded_channel();
        let (combat_tx, combat_rx) = mpsc::unbounded_channel();
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();

        let mut turn_clock = CountdownManager::new(turn_tx);
        turn_clock.init(
            room_id.clone(),
            CountdownConfig {
                duration_secs: rules.turn_duration_secs,
                pre_delay_secs: rules.pre_turn_delay_secs,
                tick: config.tick,
            },
        );
        let mut combat_clock = CountdownManager::new(combat_tx);
        combat_clock.init(
            room_id.clone(),
            CountdownConfig {
                duration_secs: rules.combat_secs_with_evasion,
                pre_delay_secs: 0,
                tick: config.tick,
            },
        );

        let actor = Self {
            room_id: room_id.clone(),
            state: RoomState::Lobby,
            rules,
            session,
            senders: HashMap::new(),
            combat: None,
            phase: TurnPhase::Idle,
            motion: None,
            epoch: 0,
            bot_invocations: 0,
            next_virtual_id: PlayerId::VIRTUAL_BASE,
            turn_clock,
            combat_clock,
            turn_rx,
            combat_rx,
            wake_tx,
            wake_rx,
            rng,
            effects,
            journal,
            receiver: rx,
        };
        let handle = RoomHandle {
            room_id,
            sender: tx,
        };
        (actor, handle)
    }
}

/// Spawns a room actor for `session` and returns a handle to it.
pub(crate) fn spawn_room(
    session: GameSession,
    config: &RoomConfig,
    rng: StdRng,
    effects: Arc<dyn ItemEffects>,
    journal: Arc<dyn Journal>,
) -> RoomHandle {
    let (actor, handle) = RoomActor::new(session, config, rng, effects, journal);
    tokio::spawn(actor.run());
    handle
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use skirmish_grid::{Grid, Tile};

    use super::*;
    use crate::{DiceBonus, GameMode, MapLayout, StandardItemEffects, StatBonus, TracingJournal};

    const P1: PlayerId = PlayerId(1);
    const P2: PlayerId = PlayerId(2);

    /// An unspawned lobby on open floor with the given start tiles.
    fn lobby(side: usize, starts: &[(usize, usize)]) -> RoomActor {
        let layout = MapLayout {
            id: "test".into(),
            name: String::new(),
            mode: GameMode::Classic,
            grid: Grid::filled(side, Tile::Floor),
            items: Vec::new(),
            start_points: starts.iter().map(|&(x, y)| Position::new(x, y)).collect(),
        };
        let mut rng = StdRng::seed_from_u64(3);
        let session = GameSession::new(RoomId::from("U1"), layout, &mut rng).unwrap();
        let (actor, _handle) = RoomActor::new(
            session,
            &RoomConfig::default(),
            rng,
            Arc::new(StandardItemEffects),
            Arc::new(TracingJournal),
        );
        actor
    }

    fn join(
        actor: &mut RoomActor,
        id: PlayerId,
        name: &str,
    ) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sheet = CharacterSheet::new(name, StatBonus::Life, DiceBonus::Attack);
        actor.handle_join(id, sheet, tx).unwrap();
        rx
    }

    /// A started duel with the two pawns side by side and the first turn
    /// already begun.
    fn duel() -> (RoomActor, mpsc::UnboundedReceiver<ServerEvent>) {
        let mut actor = lobby(10, &[(0, 0), (1, 0)]);
        let rx = join(&mut actor, P1, "ana");
        join(&mut actor, P2, "bo");
        actor.start_game(P1).unwrap();
        actor.on_turn_began();
        (actor, rx)
    }

    fn fighters(actor: &RoomActor) -> (PlayerId, PlayerId) {
        let holder = actor.session.current_id().unwrap();
        let opponent = if holder == P1 { P2 } else { P1 };
        (holder, opponent)
    }

    #[tokio::test]
    async fn test_turn_clock_resumes_with_paused_time_after_holder_wins() {
        let (mut actor, _rx) = duel();
        let (holder, opponent) = fighters(&actor);

        actor.start_combat(holder, opponent).unwrap();
        let paused = actor.turn_clock.remaining(&actor.room_id).unwrap();
        assert!(paused > 0);
        assert!(!actor.turn_clock.is_running(&actor.room_id));

        actor.finish_combat(holder);

        assert!(actor.combat.is_none());
        assert_eq!(actor.session.current_id(), Some(holder));
        assert!(actor.turn_clock.is_running(&actor.room_id));
        assert_eq!(actor.turn_clock.remaining(&actor.room_id), Some(paused));
    }

    #[tokio::test]
    async fn test_turn_ends_after_combat_when_clock_ran_out() {
        let (mut actor, mut rx) = duel();
        let (holder, opponent) = fighters(&actor);

        // Nothing left on the clock when the challenge lands.
        actor.turn_clock.start_with(&actor.room_id, 0);
        actor.start_combat(holder, opponent).unwrap();
        assert_eq!(actor.turn_clock.remaining(&actor.room_id), Some(0));

        actor.finish_combat(holder);

        assert_eq!(actor.session.current_id(), Some(opponent));
        let events: Vec<ServerEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(events.contains(&ServerEvent::CountdownPaused { remaining: 0 }));
        assert!(events.iter().any(
            |e| matches!(e, ServerEvent::PlayerTurn { player, .. } if *player == opponent)
        ));
    }

    #[tokio::test]
    async fn test_virtual_ids_start_at_base_in_every_room() {
        for _ in 0..2 {
            let mut actor = lobby(15, &[(0, 0), (1, 0), (2, 0), (3, 0)]);
            let _rx = join(&mut actor, P1, "ana");
            actor.add_virtual_player(P1, Profile::Aggressive).unwrap();
            actor.add_virtual_player(P1, Profile::Defensive).unwrap();

            let ids: Vec<PlayerId> = actor.session.players().iter().map(|p| p.id).collect();
            assert_eq!(
                ids,
                vec![
                    P1,
                    PlayerId(PlayerId::VIRTUAL_BASE),
                    PlayerId(PlayerId::VIRTUAL_BASE + 1)
                ]
            );
        }
    }
}
