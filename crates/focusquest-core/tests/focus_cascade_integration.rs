//! Integration tests for the full focus flow.
//!
//! A Work timer bound to a task drives a focus session through the
//! coordinator; completing tasks in the graph drives quest rewards.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;

use focusquest_core::{
    Achievement, AchievementRegistry, Config, FocusCoordinator, Quest, QuestListener,
    QuestManager, QuestReward, SessionEvent, SessionListener, SessionTracker, TaskGraph,
    TimerEngine, TimerEvent, TimerKind, TimerListener, TimerSignal, TimerState, XpLedger,
};

#[derive(Default)]
struct TimerLog(Mutex<Vec<TimerSignal>>);

impl TimerListener for TimerLog {
    fn on_event(&self, event: &TimerEvent) {
        self.0.lock().push(event.signal);
    }
}

#[derive(Default)]
struct SessionLog(Mutex<Vec<&'static str>>);

impl SessionListener for SessionLog {
    fn on_event(&self, event: &SessionEvent) {
        self.0.lock().push(event.name());
    }
}

#[derive(Default)]
struct RewardLog(Mutex<Vec<QuestReward>>);

impl QuestListener for RewardLog {
    fn on_quest_completed(&self, reward: &QuestReward) {
        self.0.lock().push(reward.clone());
    }
}

#[tokio::test(start_paused = true)]
async fn test_timer_run_records_completed_session() {
    let sessions = Arc::new(SessionTracker::new());
    let session_log = Arc::new(SessionLog::default());
    sessions.add_listener(session_log.clone());

    let engine = TimerEngine::new(TimerKind::Work, 2, Handle::current())
        .unwrap()
        .with_task("T1");
    let timer_log = Arc::new(TimerLog::default());
    engine.add_listener(Arc::new(FocusCoordinator::new(sessions.clone())));
    engine.add_listener(timer_log.clone());

    assert!(engine.start());
    assert_eq!(sessions.current_session().unwrap().task_id, "T1");

    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(engine.state(), TimerState::Completed);
    assert_eq!(
        *timer_log.0.lock(),
        vec![
            TimerSignal::Started { total_secs: 2 },
            TimerSignal::Tick { remaining_secs: 1 },
            TimerSignal::Tick { remaining_secs: 0 },
            TimerSignal::Completed,
        ]
    );

    assert!(sessions.current_session().is_none());
    let history = sessions.session_history();
    assert_eq!(history.len(), 1);
    assert!(history[0].completed);
    assert!(history[0].end_time.is_some());
    assert_eq!(
        *session_log.0.lock(),
        vec!["session_started", "session_ended", "session_history_changed"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stopped_run_records_incomplete_session() {
    let sessions = Arc::new(SessionTracker::new());
    let engine = TimerEngine::new(TimerKind::Work, 60, Handle::current())
        .unwrap()
        .with_task("T1");
    engine.add_listener(Arc::new(FocusCoordinator::new(sessions.clone())));

    engine.start();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    engine.pause();
    engine.resume();
    assert!(engine.stop());

    let history = sessions.session_history();
    assert_eq!(history.len(), 1);
    assert!(!history[0].completed);
    assert!(!history[0].paused);
}

#[tokio::test(start_paused = true)]
async fn test_break_timer_is_not_tracked() {
    let sessions = Arc::new(SessionTracker::new());
    let engine = TimerEngine::new(TimerKind::ShortBreak, 1, Handle::current())
        .unwrap()
        .with_task("T1");
    engine.add_listener(Arc::new(FocusCoordinator::new(sessions.clone())));

    engine.start();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(engine.state(), TimerState::Completed);
    assert!(sessions.session_history().is_empty());
}

#[test]
fn test_task_completion_cascades_into_quest_reward() {
    let tasks = Arc::new(TaskGraph::new());
    let ledger = Arc::new(XpLedger::new());
    let achievements = Arc::new(AchievementRegistry::new());
    achievements
        .register(Achievement::new("first-quest", "First Quest"))
        .unwrap();
    let quests = QuestManager::new(tasks.clone(), ledger.clone(), achievements.clone());
    let rewards = Arc::new(RewardLog::default());
    quests.add_listener(rewards.clone());

    tasks.add_task("T1", "Write draft").unwrap();
    tasks.add_task("T2", "Collect notes").unwrap();
    tasks.mark_complete("T2").unwrap();
    quests
        .add_quest(
            Quest::new("Q1", "Publish", 50)
                .with_tasks(["T1", "T2"])
                .with_reward_achievement("first-quest"),
        )
        .unwrap();

    tasks.mark_complete("T1").unwrap();

    assert!(quests.get_quest("Q1").unwrap().completed);
    assert_eq!(ledger.current_xp(), 70);
    assert_eq!(ledger.current_level(), 1);
    assert!(achievements.is_unlocked("first-quest"));

    let rewards = rewards.0.lock();
    assert_eq!(rewards.len(), 1);
    assert_eq!(rewards[0].quest_id, "Q1");
    assert_eq!(rewards[0].task_count, 2);
    assert_eq!(rewards[0].subtask_count, 0);
}

#[test]
fn test_config_drives_components() {
    let mut config = Config::default();
    config.set("xp.base", "50").unwrap();
    config.set("tasks.require_subtasks_complete", "true").unwrap();

    let ledger = XpLedger::with_curve(config.xp_curve().unwrap());
    assert!(ledger.add_xp(50).unwrap());
    assert_eq!(ledger.current_level(), 2);

    let tasks = TaskGraph::with_policy(config.task_policy());
    tasks.add_task("P", "Parent").unwrap();
    tasks.add_task("C", "Child").unwrap();
    tasks.add_subtask("P", "C").unwrap();
    assert!(tasks.mark_complete("P").is_err());
    tasks.mark_complete("C").unwrap();
    assert!(tasks.is_completed("P"));

    let sessions = SessionTracker::with_policy(config.session_policy().unwrap());
    assert_eq!(sessions.policy().tolerance_secs, 120);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_racing_completion_yields_one_terminal_event() {
    let engine = TimerEngine::new(TimerKind::Work, 1, Handle::current()).unwrap();
    let log = Arc::new(TimerLog::default());
    engine.add_listener(log.clone());

    engine.start();
    let stopper = engine.clone();
    let racer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(1000));
        stopper.stop();
    });
    tokio::time::sleep(Duration::from_millis(1300)).await;
    racer.join().unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let signals = log.0.lock().clone();
    let terminal: Vec<_> = signals.iter().filter(|s| s.is_terminal()).collect();
    assert_eq!(terminal.len(), 1, "signals: {signals:?}");
    assert_eq!(signals.last(), terminal.last().copied());
    assert!(matches!(
        engine.state(),
        TimerState::Completed | TimerState::Stopped
    ));
}
