//! Host-level tests: `Tally` over the journal store, and messages that must
//! never reach the game.

use std::path::PathBuf;
use std::sync::Arc;

use proptest::prelude::*;
use tally::Tally;
use tally_game::{
    ChannelId, CountingConfig, GameState, HostCall, JournalCountStore, MemoryCountStore,
    MessageId, Outcome, RecordingHost, UserId,
};

const CHANNEL: ChannelId = ChannelId::new(42);

fn temp_journal_path(name: &str) -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("tally_{name}_{id}_{}.tjnl", std::process::id()))
}

fn config() -> CountingConfig {
    CountingConfig {
        counting_channel_id: Some(CHANNEL.get()),
        counting_fail_role: Some(3),
        ..CountingConfig::default()
    }
}

#[tokio::test]
async fn test_counts_survive_a_restart() {
    let path = temp_journal_path("restart");
    {
        let tally = Tally::new(
            config(),
            Arc::new(JournalCountStore::open(&path).unwrap()),
            Arc::new(RecordingHost::new()),
        );
        let posts = [(1, "1"), (2, "0b10"), (1, "3"), (2, "2 * 2")];
        for (index, (user, text)) in posts.iter().enumerate() {
            let outcome = tally
                .process_count(CHANNEL, UserId::new(*user), MessageId::new(index as u64), text)
                .await
                .unwrap();
            assert!(outcome.is_accepted(), "{text}: {outcome:?}");
        }
        // A failure is journalled as well.
        let outcome = tally
            .process_count(CHANNEL, UserId::new(2), MessageId::new(9), "10")
            .await
            .unwrap();
        assert!(outcome.is_failure());
    }

    let store = Arc::new(JournalCountStore::open(&path).unwrap());
    assert!(store.recovery().committed_batches >= 5);
    let tally = Tally::new(config(), Arc::clone(&store), Arc::new(RecordingHost::new()));

    let top = tally.leaderboard(10).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].1.successes, 2);
    assert_eq!(top[0].1.highest_user_count, 4);
    assert_eq!(top[0].0, UserId::new(2));
    assert_eq!(top[0].1.fails, 1);

    // The failure reset the count before the restart.
    let outcome = tally
        .process_count(CHANNEL, UserId::new(1), MessageId::new(10), "1")
        .await
        .unwrap();
    assert!(outcome.is_accepted());

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_failure_applies_the_fail_role() {
    let host = Arc::new(RecordingHost::new());
    let tally = Tally::new(config(), Arc::new(MemoryCountStore::new()), Arc::clone(&host));

    tally
        .process_count(CHANNEL, UserId::new(1), MessageId::new(1), "1")
        .await
        .unwrap();
    let outcome = tally
        .process_count(CHANNEL, UserId::new(1), MessageId::new(2), "2")
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::FailedSameUser);
    assert!(host
        .calls()
        .contains(&HostCall::ApplyRole(UserId::new(1), tally_game::RoleId::new(3))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Letters outside the hex digits and radix markers never pass the filter.
    #[test]
    fn prop_chatter_is_never_a_count(
        head in "[0-9 +]{0,4}",
        letter in "[g-np-wyz]",
        tail in "[0-9a-z ]{0,6}",
    ) {
        let text = format!("{head}{letter}{tail}");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let host = Arc::new(RecordingHost::new());
            let store = Arc::new(MemoryCountStore::new());
            let tally = Tally::new(config(), Arc::clone(&store), Arc::clone(&host));
            tally
                .process_count(CHANNEL, UserId::new(1), MessageId::new(1), "1")
                .await
                .unwrap();
            let calls_before = host.calls().len();

            let outcome = tally
                .process_count(CHANNEL, UserId::new(2), MessageId::new(2), &text)
                .await
                .unwrap();
            prop_assert_eq!(outcome, Outcome::NotACount);
            prop_assert_eq!(host.calls().len(), calls_before);

            let saved = tally_game::CountStore::load_channel(&*store, CHANNEL)
                .await
                .unwrap();
            prop_assert_eq!(
                saved,
                Some(GameState::new().advanced(UserId::new(1), 1, MessageId::new(1)))
            );
            Ok::<(), proptest::test_runner::TestCaseError>(())
        })?;
    }
}
