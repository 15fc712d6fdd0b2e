use cube4::learning::encode_state;
use cube4::storage::{LearnedStore, MemoryStore};
use cube4::{
    compute_best_move, handle_request, Actor, Board, Column, GameSession, GameStatus, LearnedState, Mode,
    Player, SearchOptions, SearchWorker,
};

fn fast() -> SearchOptions {
    SearchOptions {
        time_limit_ms: 40,
        max_depth: 2,
        ..SearchOptions::default()
    }
}

#[test]
fn horizontal_line_completes_on_the_fourth_stone() {
    let mut board = Board::new();
    for x in 0..3 {
        let outcome = board.make_move(Column::new(x, 0), Player::Red).unwrap();
        assert!(!outcome.won);
    }
    let outcome = board.make_move(Column::new(3, 0), Player::Red).unwrap();
    assert!(outcome.won);
    let coords = outcome.winning_coords();
    assert_eq!(coords.len(), 1);
    let xs: Vec<usize> = coords[0].iter().map(|c| c.x).collect();
    assert_eq!(xs, vec![0, 1, 2, 3]);
    assert!(coords[0].iter().all(|c| c.y == 0 && c.z == 0));
}

#[test]
fn engine_self_play_finishes_with_legal_moves() {
    let mut board = Board::new();
    let mut player = Player::Red;
    let mut seed = 1;
    loop {
        let options = SearchOptions {
            random_seed: seed,
            random_intensity: 0.3,
            ..fast()
        };
        let result = compute_best_move(&board, player, &options);
        let Some(column) = result.mv else {
            assert!(board.is_full());
            break;
        };
        assert!(board.valid_moves().contains(&column), "illegal {column:?}");
        let outcome = board.make_move(column, player).unwrap();
        assert!(board.heights().iter().all(|&h| h as usize <= cube4::SIZE));
        if outcome.is_terminal() {
            break;
        }
        player = player.opponent();
        seed += 1;
    }
    assert!(board.moves_played() <= cube4::CELLS);
}

#[test]
fn session_learns_and_persists_a_lost_game() {
    let store = LearnedStore::new(MemoryStore::new());
    let mut session = GameSession::new(Mode::Ai, true, store.load());
    session.set_seed(3);

    // The human builds a horizontal line while the engine answers each move.
    // A scripted reply stands in for the engine so the outcome is fixed.
    for x in 0..3 {
        session
            .apply_move(Column::new(x, 0), Player::Red, Actor::Human)
            .unwrap();
        let (ticket, request) = session.prepare_search().unwrap();
        let mut response = handle_request(request);
        assert!(response.mv.is_some());
        response.mv = Some(Column::new(x, 4));
        session.accept_reply(ticket, response).unwrap();
    }
    let key_before_last_reply = {
        let mut replay = Board::new();
        for (column, player) in [
            ((0, 0), Player::Red),
            ((0, 4), Player::Blue),
            ((1, 0), Player::Red),
            ((1, 4), Player::Blue),
            ((2, 0), Player::Red),
        ] {
            replay.make_move(Column::new(column.0, column.1), player).unwrap();
        }
        encode_state(replay.cells(), Player::Blue)
    };
    session
        .apply_move(Column::new(3, 0), Player::Red, Actor::Human)
        .unwrap();
    assert_eq!(session.status(), GameStatus::Won(Player::Red));

    store.save(session.learned()).unwrap();
    let reloaded: LearnedState = store.load();
    assert_eq!(reloaded.profile.games, 1);
    assert_eq!(reloaded.profile.moves, 4);
    let tally = reloaded.memory.pick(&key_before_last_reply);
    assert_eq!(tally.len(), 1);
    assert_eq!(tally[0].column, Column::new(2, 4));
    assert_eq!(tally[0].losses, 1);
    assert!(reloaded.weights.block_two > LearnedState::default().weights.block_two);
}

#[tokio::test]
async fn computer_versus_scripted_human_through_the_worker() {
    let worker = SearchWorker::new();
    let mut session = GameSession::new(Mode::Ai, false, LearnedState::default());
    session.set_difficulty(cube4::Difficulty::Easy);
    session.set_seed(11);

    for _ in 0..40 {
        if session.is_over() {
            break;
        }
        session.play_computer_turn(&worker).await.unwrap();
        if session.is_over() {
            break;
        }
        let column = session.fallback_move().unwrap();
        session
            .apply_move(column, Player::Red, Actor::Human)
            .unwrap();
    }
    assert!(session.pending().is_none());
    assert!(session.board().moves_played() >= 2);
}
