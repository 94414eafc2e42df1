use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::game::{Color, Game, GameResult, GameStatus, PositionUpdate, STARTING_POSITION};
use crate::models::game_move::MoveRecord;
use crate::models::rating::RatingUpdateRequest;
use crate::repositories::game_repository::GameRepository;
use crate::repositories::move_repository::MoveRepository;
use crate::services::board_service::{BoardService, MoveOutcome, TerminalStatus};
use crate::services::clock;
use crate::services::errors::game_session_service_errors::GameSessionError;
use crate::services::functions_gateway::FunctionsGateway;

#[derive(Clone)]
pub struct GameSessionService {
    games: Arc<dyn GameRepository + Send + Sync>,
    moves: Arc<dyn MoveRepository + Send + Sync>,
    functions: Arc<dyn FunctionsGateway + Send + Sync>,
    board: BoardService,
}

impl GameSessionService {
    pub fn new(
        games: Arc<dyn GameRepository + Send + Sync>,
        moves: Arc<dyn MoveRepository + Send + Sync>,
        functions: Arc<dyn FunctionsGateway + Send + Sync>,
    ) -> Self {
        GameSessionService {
            games,
            moves,
            functions,
            board: BoardService::new(),
        }
    }

    /// Load a game and hand back a session for one participant. The position
    /// history is rebuilt from the move rows so repetition detection works
    /// across reloads.
    pub async fn open(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> Result<GameSession, GameSessionError> {
        let game = self
            .games
            .get_game(game_id)
            .await?
            .ok_or(GameSessionError::GameNotFound)?;
        let my_color = game
            .color_of(player_id)
            .ok_or(GameSessionError::NotAParticipant)?;

        let moves = self.moves.list_moves(game_id).await?;
        let mut positions = vec![STARTING_POSITION.to_string()];
        positions.extend(moves.iter().map(|m| m.position_after.clone()));
        let ply_count = moves.len() as u32;

        debug!(
            "Opened game {} for {} as {:?} at ply {}",
            game_id, player_id, my_color, ply_count
        );

        Ok(GameSession {
            service: self.clone(),
            player_id: player_id.to_string(),
            my_color,
            game,
            positions,
            ply_count,
        })
    }
}

/// One participant's view of an active game. The remote row stays
/// authoritative: everything here is a cache, refreshed by realtime pushes
/// through [`GameSession::apply_remote`].
pub struct GameSession {
    service: GameSessionService,
    player_id: String,
    my_color: Color,
    game: Game,
    positions: Vec<String>,
    ply_count: u32,
}

impl GameSession {
    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn my_color(&self) -> Color {
        self.my_color
    }

    pub fn ply_count(&self) -> u32 {
        self.ply_count
    }

    pub fn is_over(&self) -> bool {
        self.game.status.is_terminal()
    }

    /// Remaining clock for either side at `now`, computed from timestamps
    /// rather than accumulated ticks.
    pub fn remaining_seconds(&self, side: Color, now: DateTime<Utc>) -> i64 {
        clock::remaining_seconds(&self.game, side, now)
    }

    /// Validate and submit one move. The local gate (turn, legality, clock)
    /// never touches the network; the remote write is conditional on the
    /// position and turn it was computed from, so a concurrent write from the
    /// peer surfaces as `Conflict` instead of silently corrupting the row.
    pub async fn submit_move(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<char>,
        now: DateTime<Utc>,
    ) -> Result<MoveOutcome, GameSessionError> {
        if self.game.status != GameStatus::InProgress {
            return Err(GameSessionError::GameOver);
        }
        if self.game.current_turn != self.my_color {
            return Err(GameSessionError::NotYourTurn);
        }
        let remaining = clock::remaining_seconds(&self.game, self.my_color, now);
        if remaining <= 0 {
            return Err(GameSessionError::ClockExpired);
        }

        let mut outcome = self
            .service
            .board
            .apply_move(&self.game.board_state, from, to, promotion)?;
        if outcome.terminal == TerminalStatus::None {
            // Repetition needs the game history, which the adapter alone
            // does not have.
            let full = self
                .service
                .board
                .terminal_status(&outcome.position, &self.positions)?;
            if full == TerminalStatus::ThreefoldRepetition {
                outcome.terminal = TerminalStatus::ThreefoldRepetition;
            }
        }

        let update = PositionUpdate {
            game_id: self.game.id.clone(),
            expected_position: self.game.board_state.clone(),
            expected_turn: self.my_color,
            new_position: outcome.position.clone(),
            next_turn: self.my_color.opposite(),
            mover: self.my_color,
            mover_time_remaining: remaining as u64,
            updated_at: now,
        };
        let time_taken_ms = (now - self.game.updated_at).num_milliseconds().max(0) as u64;
        let record = MoveRecord::new(
            &self.game.id,
            self.ply_count + 1,
            self.my_color,
            outcome.san.clone(),
            outcome.position.clone(),
            time_taken_ms,
        );
        // One transaction: a rejected row update also drops the move row, so
        // the ply sequence stays contiguous.
        self.service
            .games
            .apply_position_update(&update, &record)
            .await?;

        match self.my_color {
            Color::White => self.game.white_time_remaining = remaining as u64,
            Color::Black => self.game.black_time_remaining = remaining as u64,
        }
        self.game.board_state = outcome.position.clone();
        self.game.current_turn = self.my_color.opposite();
        self.game.updated_at = now;
        self.game.draw_offer_by = None;
        self.positions.push(outcome.position.clone());
        self.ply_count += 1;

        info!(
            "Game {}: {} played {} (ply {})",
            self.game.id, self.player_id, outcome.san, self.ply_count
        );

        if outcome.terminal != TerminalStatus::None {
            let (result, winner) = self.terminal_verdict(outcome.terminal);
            self.finish(GameStatus::Completed, result, winner, now).await?;
        }

        Ok(outcome)
    }

    /// Timeout check, driven by any ticker. Safe to call repeatedly after
    /// zero: the local status gate and the conditional terminal write together
    /// make the timeout land exactly once.
    pub async fn check_flag(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<GameResult>, GameSessionError> {
        let flagged = match clock::flagged_side(&self.game, now) {
            Some(side) => side,
            None => return Ok(None),
        };

        let winner = self
            .game
            .player_id_for(flagged.opposite())
            .map(str::to_string);
        self.finish(
            GameStatus::Completed,
            GameResult::Timeout,
            winner,
            now,
        )
        .await?;
        Ok(Some(GameResult::Timeout))
    }

    pub async fn resign(&mut self, now: DateTime<Utc>) -> Result<(), GameSessionError> {
        if self.game.status != GameStatus::InProgress {
            return Err(GameSessionError::GameOver);
        }
        let winner = self.game.opponent_of(&self.player_id).map(str::to_string);
        self.finish(GameStatus::Completed, GameResult::Resignation, winner, now)
            .await
    }

    /// Abandon a game that never really happened (e.g. opponent gone before
    /// the first moves). No winner, no rating change.
    pub async fn abort(&mut self, now: DateTime<Utc>) -> Result<(), GameSessionError> {
        if self.game.status != GameStatus::InProgress {
            return Err(GameSessionError::GameOver);
        }
        self.finish(GameStatus::Abandoned, GameResult::Abandoned, None, now)
            .await
    }

    /// Record a draw offer on the row; the peer sees it through the realtime
    /// push and answers with accept or decline.
    pub async fn offer_draw(&mut self) -> Result<(), GameSessionError> {
        if self.game.status != GameStatus::InProgress {
            return Err(GameSessionError::GameOver);
        }
        self.service
            .games
            .set_draw_offer(&self.game.id, Some(self.player_id.clone()))
            .await?;
        self.game.draw_offer_by = Some(self.player_id.clone());
        Ok(())
    }

    pub async fn accept_draw(&mut self, now: DateTime<Utc>) -> Result<(), GameSessionError> {
        if self.game.status != GameStatus::InProgress {
            return Err(GameSessionError::GameOver);
        }
        match self.game.draw_offer_by.as_deref() {
            Some(offerer) if offerer != self.player_id => {}
            _ => {
                return Err(GameSessionError::ValidationError(
                    "No draw offer from the opponent to accept".to_string(),
                ));
            }
        }
        self.finish(GameStatus::Completed, GameResult::Draw, None, now)
            .await
    }

    pub async fn decline_draw(&mut self) -> Result<(), GameSessionError> {
        if self.game.draw_offer_by.is_none() {
            return Ok(());
        }
        self.service.games.set_draw_offer(&self.game.id, None).await?;
        self.game.draw_offer_by = None;
        Ok(())
    }

    /// Merge a realtime push for this game. Idempotent: echoes of state the
    /// session already reflects are dropped, and rows older than the local
    /// cache never overwrite it. Returns true when the local state changed.
    pub fn apply_remote(&mut self, pushed: Game) -> bool {
        if pushed.id != self.game.id {
            return false;
        }
        if pushed.updated_at < self.game.updated_at {
            debug!("Dropping stale push for game {}", self.game.id);
            return false;
        }
        let board_changed = pushed.board_state != self.game.board_state;
        if !board_changed
            && pushed.status == self.game.status
            && pushed.draw_offer_by == self.game.draw_offer_by
        {
            return false;
        }
        if board_changed && !self.service.board.is_valid_position(&pushed.board_state) {
            warn!(
                "Ignoring push with unparseable position for game {}",
                self.game.id
            );
            return false;
        }

        if board_changed {
            self.positions.push(pushed.board_state.clone());
            self.ply_count += 1;
        }
        if pushed.status.is_terminal() {
            info!(
                "Game {} ended remotely: {:?}",
                self.game.id, pushed.result
            );
        }
        self.game = pushed;
        true
    }

    fn terminal_verdict(&self, terminal: TerminalStatus) -> (GameResult, Option<String>) {
        match terminal {
            TerminalStatus::Checkmate => {
                let winner = self.game.player_id_for(self.my_color).map(str::to_string);
                let result = match self.my_color {
                    Color::White => GameResult::WhiteWins,
                    Color::Black => GameResult::BlackWins,
                };
                (result, winner)
            }
            _ => (GameResult::Draw, None),
        }
    }

    /// One-shot terminal write plus the best-effort rating call. Only the
    /// client whose conditional write landed invokes the rating function, so
    /// it runs once per game even with both participants watching the end.
    async fn finish(
        &mut self,
        status: GameStatus,
        result: GameResult,
        winner_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), GameSessionError> {
        if self.game.status.is_terminal() {
            return Ok(());
        }

        let wrote = self
            .service
            .games
            .finish_game(&self.game.id, status, result, winner_id.clone(), now)
            .await?;

        self.game.status = status;
        self.game.result = Some(result);
        self.game.winner_id = winner_id.clone();
        self.game.finished_at = Some(now);
        self.game.updated_at = now;
        self.game.draw_offer_by = None;

        if !wrote {
            debug!("Game {} was already finished remotely", self.game.id);
            return Ok(());
        }

        info!(
            "Game {} finished: {:?}, winner {:?}",
            self.game.id, result, winner_id
        );

        if status == GameStatus::Completed {
            let request = RatingUpdateRequest {
                game_id: self.game.id.clone(),
                winner_id,
                result,
            };
            // Ratings are best-effort; the game result stands without them.
            if let Err(e) = self.service.functions.update_ratings(&request).await {
                warn!("Rating update for game {} failed: {}", self.game.id, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rating::RatingUpdateResponse;
    use crate::models::time_control::TimeControl;
    use crate::repositories::game_repository::MockGameRepository;
    use crate::repositories::move_repository::MockMoveRepository;
    use crate::services::errors::board_service_errors::BoardServiceError;
    use crate::services::functions_gateway::MockFunctionsGateway;
    use chrono::Duration;
    use std::str::FromStr;

    fn live_game() -> Game {
        Game::new_pair("alice", "bob", &TimeControl::from_str("5+0").unwrap())
    }

    fn session_with(
        game: Game,
        player_id: &str,
        games: MockGameRepository,
        moves: MockMoveRepository,
        functions: MockFunctionsGateway,
    ) -> GameSession {
        let my_color = game.color_of(player_id).unwrap();
        let service =
            GameSessionService::new(Arc::new(games), Arc::new(moves), Arc::new(functions));
        GameSession {
            service,
            player_id: player_id.to_string(),
            my_color,
            positions: vec![game.board_state.clone()],
            ply_count: 0,
            game,
        }
    }

    #[tokio::test]
    async fn out_of_turn_move_is_rejected_without_a_network_call() {
        // Mocks without expectations panic when called, which is the point.
        let mut session = session_with(
            live_game(),
            "bob",
            MockGameRepository::new(),
            MockMoveRepository::new(),
            MockFunctionsGateway::new(),
        );

        let err = session
            .submit_move("e7", "e5", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, GameSessionError::NotYourTurn));
    }

    #[tokio::test]
    async fn illegal_move_is_rejected_locally() {
        let mut session = session_with(
            live_game(),
            "alice",
            MockGameRepository::new(),
            MockMoveRepository::new(),
            MockFunctionsGateway::new(),
        );

        let err = session
            .submit_move("e2", "e5", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GameSessionError::Board(BoardServiceError::IllegalMove(_))
        ));
    }

    #[tokio::test]
    async fn accepted_move_flips_turn_and_appends_ply_one() {
        let game = live_game();
        let now = game.updated_at + Duration::seconds(3);

        let mut games = MockGameRepository::new();
        games
            .expect_apply_position_update()
            .withf(|u: &PositionUpdate, m: &MoveRecord| {
                u.expected_turn == Color::White
                    && u.next_turn == Color::Black
                    && u.expected_position.starts_with("rnbqkbnr/pppppppp")
                    && u.mover_time_remaining == 297
                    && m.move_number == 1
                    && m.san == "e4"
                    && m.side == Color::White
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut session = session_with(
            game,
            "alice",
            games,
            MockMoveRepository::new(),
            MockFunctionsGateway::new(),
        );
        let outcome = session.submit_move("e2", "e4", None, now).await.unwrap();

        assert_eq!(outcome.san, "e4");
        assert_eq!(session.game().current_turn, Color::Black);
        assert_eq!(session.ply_count(), 1);
        assert_eq!(session.game().white_time_remaining, 297);
        assert_eq!(session.game().black_time_remaining, 300);
    }

    #[tokio::test]
    async fn conflicting_write_surfaces_as_conflict_and_leaves_state_alone() {
        let game = live_game();
        let before = game.board_state.clone();

        let mut games = MockGameRepository::new();
        games.expect_apply_position_update().returning(|_, _| {
            Err(crate::repositories::errors::game_repository_errors::GameRepositoryError::Conflict)
        });

        let mut session = session_with(
            game,
            "alice",
            games,
            MockMoveRepository::new(),
            MockFunctionsGateway::new(),
        );
        let err = session
            .submit_move("e2", "e4", None, Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, GameSessionError::Conflict));
        assert_eq!(session.game().board_state, before);
        assert_eq!(session.ply_count(), 0);
    }

    #[tokio::test]
    async fn checkmate_finishes_the_game_and_rates_it_once() {
        // Mate in one: white queen h5 takes f7 with the black knight on f6
        // blocking the escape.
        let mut game = live_game();
        game.board_state =
            "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4".to_string();

        let mut games = MockGameRepository::new();
        games
            .expect_apply_position_update()
            .times(1)
            .returning(|_, _| Ok(()));
        games
            .expect_finish_game()
            .withf(|_, status, result, winner, _| {
                *status == GameStatus::Completed
                    && *result == GameResult::WhiteWins
                    && winner.as_deref() == Some("alice")
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(true));
        let mut functions = MockFunctionsGateway::new();
        functions
            .expect_update_ratings()
            .withf(|r: &RatingUpdateRequest| r.result == GameResult::WhiteWins)
            .times(1)
            .returning(|_| {
                Ok(RatingUpdateResponse {
                    white_rating: 1216,
                    black_rating: 1184,
                })
            });

        let mut session = session_with(game, "alice", games, MockMoveRepository::new(), functions);
        let outcome = session
            .submit_move("h5", "f7", None, Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.terminal, TerminalStatus::Checkmate);
        assert_eq!(outcome.san, "Qxf7#");
        assert!(session.is_over());
        assert_eq!(session.game().result, Some(GameResult::WhiteWins));
    }

    #[tokio::test]
    async fn rating_failure_does_not_fail_the_finish() {
        let game = live_game();
        let mut games = MockGameRepository::new();
        games
            .expect_finish_game()
            .times(1)
            .returning(|_, _, _, _, _| Ok(true));
        let mut functions = MockFunctionsGateway::new();
        functions.expect_update_ratings().times(1).returning(|_| {
            Err(crate::services::errors::functions_gateway_errors::FunctionsError::Invoke(
                "function unavailable".to_string(),
            ))
        });

        let mut session = session_with(game, "bob", games, MockMoveRepository::new(), functions);
        session.resign(Utc::now()).await.unwrap();

        assert!(session.is_over());
        assert_eq!(session.game().result, Some(GameResult::Resignation));
        assert_eq!(session.game().winner_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn repeated_flag_ticks_write_the_timeout_once() {
        let game = live_game();
        let deadline = game.updated_at + Duration::seconds(301);

        let mut games = MockGameRepository::new();
        games
            .expect_finish_game()
            .withf(|_, _, result, winner, _| {
                *result == GameResult::Timeout && winner.as_deref() == Some("bob")
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(true));
        let mut functions = MockFunctionsGateway::new();
        functions.expect_update_ratings().times(1).returning(|_| {
            Ok(RatingUpdateResponse {
                white_rating: 1184,
                black_rating: 1216,
            })
        });

        let mut session = session_with(game, "alice", games, MockMoveRepository::new(), functions);

        let first = session.check_flag(deadline).await.unwrap();
        assert_eq!(first, Some(GameResult::Timeout));

        // Later ticks see a terminal game and do nothing.
        for extra in 1..5 {
            let again = session
                .check_flag(deadline + Duration::seconds(extra))
                .await
                .unwrap();
            assert_eq!(again, None);
        }
    }

    #[tokio::test]
    async fn lost_finish_race_does_not_rate_the_game() {
        let game = live_game();
        let mut games = MockGameRepository::new();
        games
            .expect_finish_game()
            .times(1)
            .returning(|_, _, _, _, _| Ok(false));
        // No update_ratings expectation: invoking it would panic.
        let functions = MockFunctionsGateway::new();

        let mut session = session_with(game, "alice", games, MockMoveRepository::new(), functions);
        session.resign(Utc::now()).await.unwrap();
        assert!(session.is_over());
    }

    #[tokio::test]
    async fn echo_of_own_move_is_ignored() {
        let game = live_game();
        let mut session = session_with(
            game.clone(),
            "alice",
            MockGameRepository::new(),
            MockMoveRepository::new(),
            MockFunctionsGateway::new(),
        );

        assert!(!session.apply_remote(game));
        assert_eq!(session.ply_count(), 0);
    }

    #[tokio::test]
    async fn peer_move_is_merged_and_terminal_push_stops_play() {
        let game = live_game();
        let mut pushed = game.clone();
        pushed.board_state =
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1".to_string();
        pushed.current_turn = Color::Black;
        pushed.updated_at = game.updated_at + Duration::seconds(2);

        let mut session = session_with(
            game,
            "bob",
            MockGameRepository::new(),
            MockMoveRepository::new(),
            MockFunctionsGateway::new(),
        );

        assert!(session.apply_remote(pushed.clone()));
        assert_eq!(session.ply_count(), 1);
        assert_eq!(session.game().current_turn, Color::Black);
        // Replaying the same push is a no-op.
        assert!(!session.apply_remote(pushed.clone()));
        assert_eq!(session.ply_count(), 1);

        let mut terminal = pushed;
        terminal.status = GameStatus::Completed;
        terminal.result = Some(GameResult::Resignation);
        terminal.updated_at = terminal.updated_at + Duration::seconds(5);
        assert!(session.apply_remote(terminal));
        assert!(session.is_over());

        let err = session
            .submit_move("e7", "e5", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, GameSessionError::GameOver));
    }

    #[tokio::test]
    async fn stale_push_never_regresses_local_state() {
        let game = live_game();
        let mut stale = game.clone();
        stale.board_state = "8/8/8/8/8/8/8/K6k w - - 0 1".to_string();
        stale.updated_at = game.updated_at - Duration::seconds(30);

        let mut session = session_with(
            game.clone(),
            "alice",
            MockGameRepository::new(),
            MockMoveRepository::new(),
            MockFunctionsGateway::new(),
        );

        assert!(!session.apply_remote(stale));
        assert_eq!(session.game().board_state, game.board_state);
    }

    #[tokio::test]
    async fn accepting_a_draw_needs_an_opponent_offer() {
        let mut game = live_game();
        game.draw_offer_by = Some("alice".to_string());

        // Alice cannot accept her own offer.
        let mut session = session_with(
            game.clone(),
            "alice",
            MockGameRepository::new(),
            MockMoveRepository::new(),
            MockFunctionsGateway::new(),
        );
        let err = session.accept_draw(Utc::now()).await.unwrap_err();
        assert!(matches!(err, GameSessionError::ValidationError(_)));

        // Bob can.
        let mut games = MockGameRepository::new();
        games
            .expect_finish_game()
            .withf(|_, _, result, winner, _| *result == GameResult::Draw && winner.is_none())
            .times(1)
            .returning(|_, _, _, _, _| Ok(true));
        let mut functions = MockFunctionsGateway::new();
        functions.expect_update_ratings().times(1).returning(|_| {
            Ok(RatingUpdateResponse {
                white_rating: 1200,
                black_rating: 1200,
            })
        });
        let mut session = session_with(game, "bob", games, MockMoveRepository::new(), functions);
        session.accept_draw(Utc::now()).await.unwrap();
        assert_eq!(session.game().result, Some(GameResult::Draw));
    }

    #[tokio::test]
    async fn abort_is_terminal_without_a_rating_call() {
        let game = live_game();
        let mut games = MockGameRepository::new();
        games
            .expect_finish_game()
            .withf(|_, status, result, winner, _| {
                *status == GameStatus::Abandoned
                    && *result == GameResult::Abandoned
                    && winner.is_none()
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(true));
        // No functions expectations: an abandoned game is not rated.
        let mut session = session_with(
            game,
            "alice",
            games,
            MockMoveRepository::new(),
            MockFunctionsGateway::new(),
        );

        session.abort(Utc::now()).await.unwrap();
        assert_eq!(session.game().status, GameStatus::Abandoned);
    }
}
