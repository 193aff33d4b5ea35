//! End-to-end counting scenarios and game properties, driven through
//! `CountingGame` with the in-memory store and the recording host.

use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use tally_expr::Sandbox;
use tally_game::{
    ChannelId, CountStore, CountingConfig, CountingGame, GameState, HostCall, MemoryCountStore,
    MessageId, Outcome, Reaction, RecordingHost, UserId,
};

const A: UserId = UserId::new(100);
const B: UserId = UserId::new(200);
const CHANNEL: ChannelId = ChannelId::new(1);

type Game = CountingGame<MemoryCountStore, RecordingHost>;

async fn fresh_game() -> Game {
    let config = CountingConfig::default();
    let sandbox = Arc::new(Sandbox::new(config.sandbox_config()));
    CountingGame::open(
        CHANNEL,
        config,
        sandbox,
        Arc::new(MemoryCountStore::new()),
        Arc::new(RecordingHost::new()),
    )
    .await
    .unwrap()
}

fn state(last_count: u64, user: Option<UserId>) -> (u64, Option<UserId>) {
    (last_count, user)
}

async fn snapshot(game: &Game) -> (u64, Option<UserId>) {
    let s = game.state().await;
    (s.last_count, s.last_count_user)
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// S1: from nothing, A posts "1".
async fn s1() -> Game {
    let game = fresh_game().await;
    let outcome = game.process(A, MessageId::new(1), "1").await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Accepted {
            new_last_count: 1,
            reaction: Reaction::NewHigh,
        }
    );
    assert_eq!(snapshot(&game).await, state(1, Some(A)));
    game
}

/// S3: from S1, B posts "0x2".
async fn s3() -> Game {
    let game = s1().await;
    let outcome = game.process(B, MessageId::new(2), "0x2").await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Accepted {
            new_last_count: 2,
            reaction: Reaction::NewHigh,
        }
    );
    assert_eq!(snapshot(&game).await, state(2, Some(B)));
    game
}

#[tokio::test]
async fn scenario_s1_first_count() {
    let game = s1().await;
    let stats = game.store().read(A).await.unwrap();
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.highest_user_count, 1);
}

#[tokio::test]
async fn scenario_s2_same_user_twice() {
    let game = s1().await;
    let outcome = game.process(A, MessageId::new(2), "2").await.unwrap();
    assert_eq!(outcome, Outcome::FailedSameUser);
    assert_eq!(snapshot(&game).await, state(0, None));
    assert_eq!(game.store().read(A).await.unwrap().fails, 1);
}

#[tokio::test]
async fn scenario_s3_hex_literal() {
    let game = s3().await;
    assert_eq!(game.state().await.highest_count, 2);
}

#[tokio::test]
async fn scenario_s4_hash_is_power() {
    let game = s3().await;
    let outcome = game.process(A, MessageId::new(3), "6 # 1 / 2").await.unwrap();
    assert!(matches!(outcome, Outcome::Accepted { new_last_count: 3, .. }));
    assert_eq!(snapshot(&game).await, state(3, Some(A)));
}

#[tokio::test]
async fn scenario_s5_division_by_zero() {
    let game = s3().await;
    let outcome = game.process(A, MessageId::new(3), "1/0").await.unwrap();
    assert_eq!(outcome, Outcome::FailedDivZero);
    assert_eq!(snapshot(&game).await, state(0, None));
    assert_eq!(game.state().await.highest_count, 2);

    let calls = game.host().calls();
    assert!(calls.contains(&HostCall::React(MessageId::new(3), Reaction::Fail)));
    assert!(calls
        .iter()
        .any(|call| matches!(call, HostCall::Reply(_, text) if text.contains("**2**"))));
}

#[tokio::test]
async fn scenario_s6_huge_power() {
    let game = s1().await;
    let deadline = CountingConfig::default().deadline();
    let start = Instant::now();
    let outcome = game
        .process(B, MessageId::new(2), "99999999999 ** 99999999999")
        .await
        .unwrap();
    assert!(
        matches!(outcome, Outcome::FailedOverflow | Outcome::FailedTimeout),
        "{outcome:?}"
    );
    assert!(start.elapsed() < deadline + Duration::from_millis(100));
    assert_eq!(snapshot(&game).await, state(0, None));
}

#[tokio::test]
async fn test_wrong_number_at_zero_is_advice() {
    let game = fresh_game().await;
    let outcome = game.process(A, MessageId::new(1), "2").await.unwrap();
    assert_eq!(outcome, Outcome::AdvisoryNextIsOne);
    assert_eq!(game.state().await, GameState::new());
    assert_eq!(game.store().read(A).await.unwrap().fails, 0);
}

#[tokio::test]
async fn test_games_resume_from_the_store() {
    let store = Arc::new(MemoryCountStore::new());
    let sandbox = Arc::new(Sandbox::default());
    {
        let game = CountingGame::open(
            CHANNEL,
            CountingConfig::default(),
            Arc::clone(&sandbox),
            Arc::clone(&store),
            Arc::new(RecordingHost::new()),
        )
        .await
        .unwrap();
        game.process(A, MessageId::new(1), "1").await.unwrap();
        game.process(B, MessageId::new(2), "1+1").await.unwrap();
    }
    let game = CountingGame::open(
        CHANNEL,
        CountingConfig::default(),
        sandbox,
        store,
        Arc::new(RecordingHost::new()),
    )
    .await
    .unwrap();
    assert_eq!(snapshot(&game).await, state(2, Some(B)));
    assert_eq!(game.state().await.last_counted_message_id, Some(MessageId::new(2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_messages_are_serialised() {
    let game = Arc::new(fresh_game().await);
    game.process(A, MessageId::new(1), "1").await.unwrap();

    // Eight users race to post "2"; exactly one can win.
    let mut tasks = Vec::new();
    for id in 0..8u64 {
        let game = Arc::clone(&game);
        tasks.push(tokio::spawn(async move {
            game.process(UserId::new(1000 + id), MessageId::new(10 + id), "2")
                .await
                .unwrap()
        }));
    }
    let mut accepted = 0;
    for task in tasks {
        if task.await.unwrap().is_accepted() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}

// ============================================================================
// PROPERTIES
// ============================================================================

/// What a simulated user posts.
#[derive(Clone, Debug)]
enum Post {
    /// The expected next number, written as a sum.
    Correct,
    /// Some other number.
    Wrong(u64),
    /// Text the lexical filter rejects.
    Chatter,
    /// Passes the filter but is not an expression.
    Malformed,
    /// Division by zero.
    DivZero,
}

fn post_strategy() -> impl Strategy<Value = (u64, Post)> {
    let post = prop_oneof![
        6 => Just(Post::Correct),
        1 => (0u64..50).prop_map(Post::Wrong),
        1 => Just(Post::Chatter),
        1 => Just(Post::Malformed),
        1 => Just(Post::DivZero),
    ];
    (0u64..3, post)
}

fn render(post: &Post, expected: u64) -> String {
    match post {
        Post::Correct => format!("{} + 1", expected - 1),
        Post::Wrong(n) => n.to_string(),
        Post::Chatter => "nice one".to_owned(),
        Post::Malformed => "1 + * 2".to_owned(),
        Post::DivZero => "7 / 0".to_owned(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_game_invariants(posts in proptest::collection::vec(post_strategy(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let game = fresh_game().await;
            let mut last_accepted_user: Option<UserId> = None;

            for (index, (user, post)) in posts.iter().enumerate() {
                let user = UserId::new(*user);
                let before = game.state().await;
                let text = render(post, before.last_count + 1);
                let outcome = game
                    .process(user, MessageId::new(index as u64), &text)
                    .await
                    .unwrap();
                let after = game.state().await;

                // Highest count never goes down.
                prop_assert!(after.highest_count >= before.highest_count);

                match &outcome {
                    Outcome::NotACount | Outcome::RejectedSyntax => {
                        prop_assert!(matches!(post, Post::Chatter | Post::Malformed));
                        prop_assert_eq!(after, before);
                    }
                    Outcome::Accepted { new_last_count, .. } => {
                        prop_assert_eq!(*new_last_count, before.last_count + 1);
                        prop_assert_eq!(after.last_count, before.last_count + 1);
                        if before.last_count == 0 {
                            prop_assert_eq!(*new_last_count, 1);
                        }
                        prop_assert_ne!(last_accepted_user, Some(user));
                        last_accepted_user = Some(user);
                    }
                    outcome if outcome.is_failure() => {
                        prop_assert_eq!(after.last_count, 0);
                        prop_assert_eq!(after.last_count_user, None);
                        last_accepted_user = None;
                    }
                    Outcome::AdvisoryNextIsOne => {
                        prop_assert_eq!(before.last_count, 0);
                        prop_assert_eq!(after, before);
                    }
                    other => prop_assert!(false, "unexpected outcome {:?}", other),
                }

                if matches!(post, Post::Chatter) {
                    prop_assert_eq!(&outcome, &Outcome::NotACount);
                }
            }
            Ok::<(), proptest::test_runner::TestCaseError>(())
        })?;
    }
}
