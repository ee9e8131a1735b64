use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use learn_core::model::{Domain, QuizResult, SlotKey, Statistics, SubjectId};
use learn_core::time::fixed_now;
use services::{Clock, ProgressError, ProgressService, ProgressServices};
use storage::repository::{
    InMemoryRepository, ProgressRecord, ProgressRepository, SlotFilter, StorageError,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn service(domain: Domain) -> (ProgressService, InMemoryRepository) {
    let repo = InMemoryRepository::new();
    let svc = ProgressService::new(domain, Clock::fixed(fixed_now()), Arc::new(repo.clone()));
    (svc, repo)
}

fn session(token: &str) -> SubjectId {
    SubjectId::session(token).unwrap()
}

#[tokio::test]
async fn recording_same_item_twice_is_idempotent() {
    let (svc, _) = service(Domain::General);
    let s = session("dup");
    let date = day(2024, 1, 1);

    let first = svc.recorder().record_item_learned(&s, date, 4).await.unwrap();
    let second = svc.recorder().record_item_learned(&s, date, 4).await.unwrap();
    assert!(first.added);
    assert!(!second.added);

    let progress = svc.queries().get_progress(&s).await.unwrap();
    assert_eq!(progress[&date], vec![4]);
    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert_eq!(stats.total_learned, 1);
}

#[tokio::test]
async fn streak_counts_consecutive_days_and_breaks_on_gap() {
    let (svc, _) = service(Domain::General);
    let run = session("run");
    for d in 1..=3 {
        svc.recorder()
            .record_item_learned(&run, day(2024, 1, d), 0)
            .await
            .unwrap();
    }
    let stats = svc.queries().get_stats(&run).await.unwrap();
    assert_eq!(stats.streak_days, 3);
    assert_eq!(stats.last_learned_date, Some(day(2024, 1, 3)));

    let gap = session("gap");
    for d in [1, 3] {
        svc.recorder()
            .record_item_learned(&gap, day(2024, 1, d), 0)
            .await
            .unwrap();
    }
    let stats = svc.queries().get_stats(&gap).await.unwrap();
    assert_eq!(stats.streak_days, 1);
    assert_eq!(stats.last_learned_date, Some(day(2024, 1, 3)));
}

#[tokio::test]
async fn max_streak_never_decreases() {
    let (svc, _) = service(Domain::General);
    let s = session("max");

    for d in 1..=3 {
        svc.recorder()
            .record_item_learned(&s, day(2024, 1, d), 0)
            .await
            .unwrap();
    }
    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert_eq!((stats.streak_days, stats.max_streak), (3, 3));

    svc.recorder()
        .record_item_learned(&s, day(2024, 1, 10), 0)
        .await
        .unwrap();
    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert_eq!((stats.streak_days, stats.max_streak), (1, 3));

    for d in 11..=14 {
        svc.recorder()
            .record_item_learned(&s, day(2024, 1, d), 0)
            .await
            .unwrap();
        let stats = svc.queries().get_stats(&s).await.unwrap();
        assert!(stats.max_streak >= 3);
    }
    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert_eq!((stats.streak_days, stats.max_streak), (5, 5));
}

#[tokio::test]
async fn achievements_fire_once() {
    let (svc, _) = service(Domain::General);
    let s = session("badges");
    let date = day(2024, 2, 1);

    for item in 0..10 {
        svc.recorder().record_item_learned(&s, date, item).await.unwrap();
    }
    let report = svc.achievements().evaluate(&s).await.unwrap();
    assert_eq!(report.newly_unlocked, vec!["first_10"]);
    assert_eq!(report.current, vec!["first_10"]);

    for item in 10..15 {
        svc.recorder().record_item_learned(&s, date, item).await.unwrap();
    }
    assert_eq!(svc.queries().get_stats(&s).await.unwrap().total_learned, 15);
    let report = svc.achievements().evaluate(&s).await.unwrap();
    assert!(report.newly_unlocked.is_empty());
    assert_eq!(report.current, vec!["first_10"]);

    // recompute carries the unlocked set forward
    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert!(stats.has_achievement("first_10"));
}

#[tokio::test]
async fn unknown_subject_reads_as_defaults() {
    let (svc, repo) = service(Domain::General);
    let s = session("never-seen");

    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert_eq!(stats, Statistics::empty(Domain::General));
    assert_eq!(stats.last_learned_date, None);
    assert!(svc.queries().get_progress(&s).await.unwrap().is_empty());

    // reads never create rows
    let rows = repo
        .list_records(Domain::General, &s, SlotFilter::Stats)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn corrupted_date_slot_is_skipped_then_healed() {
    let (svc, repo) = service(Domain::General);
    let s = session("corrupt");
    repo.upsert_learned(
        Domain::General,
        &s,
        SlotKey::Date(day(2024, 1, 2)),
        "not json",
        fixed_now(),
    )
    .await
    .unwrap();

    for d in [1, 3] {
        svc.recorder()
            .record_item_learned(&s, day(2024, 1, d), 0)
            .await
            .unwrap();
    }
    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert_eq!(stats.total_learned, 2);
    assert_eq!(stats.streak_days, 1);
    let progress = svc.queries().get_progress(&s).await.unwrap();
    assert!(!progress.contains_key(&day(2024, 1, 2)));

    let ack = svc
        .recorder()
        .record_item_learned(&s, day(2024, 1, 2), 5)
        .await
        .unwrap();
    assert!(ack.added);
    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert_eq!(stats.total_learned, 3);
    assert_eq!(stats.streak_days, 3);
}

#[tokio::test]
async fn two_day_scenario() {
    let (svc, _) = service(Domain::General);
    let s = session("scenario");
    svc.recorder()
        .record_item_learned(&s, day(2024, 3, 1), 0)
        .await
        .unwrap();
    svc.recorder()
        .record_item_learned(&s, day(2024, 3, 1), 1)
        .await
        .unwrap();
    svc.recorder()
        .record_item_learned(&s, day(2024, 3, 2), 0)
        .await
        .unwrap();

    let progress = svc.queries().get_progress(&s).await.unwrap();
    assert_eq!(progress.len(), 2);
    let one_day = svc
        .queries()
        .progress_on(&s, Some("2024-03-02"))
        .await
        .unwrap();
    assert_eq!(one_day.keys().copied().collect::<Vec<_>>(), vec![day(2024, 3, 2)]);
    let bad_filter = svc.queries().progress_on(&s, Some("march")).await.unwrap();
    assert_eq!(bad_filter, progress);
    assert_eq!(progress[&day(2024, 3, 1)], vec![0, 1]);
    assert_eq!(progress[&day(2024, 3, 2)], vec![0]);

    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert_eq!(stats.total_learned, 3);
    assert_eq!(stats.streak_days, 2);
    assert_eq!(stats.last_learned_date, Some(day(2024, 3, 2)));

    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["last_learned_date"], "2024-03-02");
}

#[tokio::test]
async fn finance_tracks_terms_per_item() {
    let (svc, _) = service(Domain::Finance);
    let user = SubjectId::user(42);
    let d1 = day(2024, 5, 1);
    let d2 = day(2024, 5, 2);

    svc.recorder().record_item_learned(&user, d1, 0).await.unwrap();
    svc.recorder()
        .record_term_learned(&user, d1, 0, "ETF")
        .await
        .unwrap();
    svc.recorder()
        .record_term_learned(&user, d1, 0, "bond")
        .await
        .unwrap();
    let dup = svc
        .recorder()
        .record_term_learned(&user, d1, 0, " ETF ")
        .await
        .unwrap();
    assert!(!dup.added);
    svc.recorder()
        .record_term_learned(&user, d2, 3, "yield")
        .await
        .unwrap();

    let stats = svc.queries().get_stats(&user).await.unwrap();
    assert_eq!(stats.total_learned, 1);
    assert_eq!(stats.total_terms_learned, Some(3));
    // term-only days do not extend the streak
    assert_eq!(stats.streak_days, 1);
    assert_eq!(stats.last_learned_date, Some(d1));

    let view = svc.queries().composite_view(&user, None).await.unwrap();
    assert_eq!(view.days[&d1].items, vec![0]);
    assert_eq!(view.days[&d1].terms[&0], vec!["ETF", "bond"]);
    assert!(view.days[&d2].items.is_empty());
    assert_eq!(view.stats, stats);

    let filtered = svc
        .queries()
        .composite_view(&user, Some("2024-05-02"))
        .await
        .unwrap();
    assert_eq!(filtered.days.keys().copied().collect::<Vec<_>>(), vec![d2]);

    let unfiltered = svc
        .queries()
        .composite_view(&user, Some("yesterday"))
        .await
        .unwrap();
    assert_eq!(unfiltered.days.len(), 2);

    let terms = svc.queries().learned_terms(&user, Some("all")).await.unwrap();
    assert_eq!(
        terms.iter().map(|t| (t.date, t.item)).collect::<Vec<_>>(),
        vec![(d2, 3), (d1, 0)]
    );
}

#[tokio::test]
async fn general_domain_rejects_terms() {
    let (svc, _) = service(Domain::General);
    let err = svc
        .recorder()
        .record_term_learned(&session("t"), day(2024, 1, 1), 0, "ETF")
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::TermsNotTracked(Domain::General)));
}

#[tokio::test]
async fn quiz_score_unlocks_quiz_master_and_survives_recompute() {
    let (svc, _) = service(Domain::Finance);
    let user = SubjectId::user(7);

    let low = svc
        .quiz()
        .record_quiz_result(&user, QuizResult::new(2, 3))
        .await
        .unwrap();
    assert_eq!(low.quiz_score, 66);
    assert!(low.achievements.newly_unlocked.is_empty());

    let high = svc
        .quiz()
        .record_quiz_result(&user, QuizResult::new(4, 5))
        .await
        .unwrap();
    assert_eq!(high.quiz_score, 80);
    assert_eq!(high.achievements.newly_unlocked, vec!["quiz_master"]);

    svc.recorder()
        .record_item_learned(&user, day(2024, 6, 1), 0)
        .await
        .unwrap();
    let stats = svc.queries().get_stats(&user).await.unwrap();
    assert_eq!(stats.quiz_score, 80);
    assert_eq!(stats.achievements, vec!["quiz_master"]);
    assert_eq!(stats.total_learned, 1);
}

#[tokio::test]
async fn today_summary_and_daily_activity_follow_clock() {
    let repo = InMemoryRepository::new();
    let today = day(2024, 4, 10);
    let svc = ProgressService::new(Domain::Finance, Clock::fixed_on(today), Arc::new(repo));
    let user = SubjectId::user(1);

    svc.recorder().record_item_learned(&user, today, 0).await.unwrap();
    svc.recorder().record_item_learned(&user, today, 1).await.unwrap();
    svc.recorder()
        .record_term_learned(&user, today, 1, "inflation")
        .await
        .unwrap();
    svc.recorder()
        .record_item_learned(&user, day(2024, 4, 8), 0)
        .await
        .unwrap();

    let summary = svc.queries().today_summary(&user).await.unwrap();
    assert_eq!(summary.date, today);
    assert_eq!(summary.items_learned, 2);
    assert_eq!(summary.terms_learned, 1);

    let activity = svc.queries().daily_activity(&user, 3).await.unwrap();
    assert_eq!(
        activity
            .iter()
            .map(|a| (a.date, a.learned_count))
            .collect::<Vec<_>>(),
        vec![(day(2024, 4, 8), 1), (day(2024, 4, 9), 0), (today, 2)]
    );
    assert!(svc.queries().daily_activity(&user, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn replace_stats_keeps_monotonic_fields() {
    let (svc, _) = service(Domain::General);
    let s = session("overwrite");
    for d in 1..=4 {
        svc.recorder()
            .record_item_learned(&s, day(2024, 1, d), 0)
            .await
            .unwrap();
    }
    let mut extra = Statistics::default();
    extra.unlock("first_10");
    svc.replace_stats(&s, extra).await.unwrap();

    let replaced = svc
        .replace_stats(
            &s,
            Statistics {
                total_learned: 2,
                streak_days: 1,
                quiz_score: 120,
                ..Statistics::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(replaced.total_learned, 2);
    assert_eq!(replaced.max_streak, 4);
    assert_eq!(replaced.quiz_score, 100);
    assert_eq!(replaced.achievements, vec!["first_10"]);
}

#[tokio::test]
async fn domains_are_separate_namespaces() {
    let services = ProgressServices::in_memory(Clock::fixed(fixed_now()));
    let subject = SubjectId::user(5);

    services
        .general()
        .recorder()
        .record_item_learned(&subject, day(2024, 1, 1), 0)
        .await
        .unwrap();

    let finance = services.for_domain(Domain::Finance);
    let stats = finance.queries().get_stats(&subject).await.unwrap();
    assert_eq!(stats.total_learned, 0);
    assert_eq!(stats.total_terms_learned, Some(0));

    let removed = services.general().reset_subject(&subject).await.unwrap();
    assert_eq!(removed, 2);
}

/// Repository whose stats writes always fail.
#[derive(Clone, Default)]
struct FlakyStatsRepository {
    inner: InMemoryRepository,
}

#[async_trait]
impl ProgressRepository for FlakyStatsRepository {
    async fn get_record(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        self.inner.get_record(domain, subject, slot).await
    }

    async fn list_records(
        &self,
        domain: Domain,
        subject: &SubjectId,
        filter: SlotFilter,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.inner.list_records(domain, subject, filter).await
    }

    async fn upsert_learned(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.inner
            .upsert_learned(domain, subject, slot, payload, now)
            .await
    }

    async fn swap_learned(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        expected: Option<&str>,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        self.inner
            .swap_learned(domain, subject, slot, expected, payload, now)
            .await
    }

    async fn upsert_stats(
        &self,
        _domain: Domain,
        _subject: &SubjectId,
        _payload: &str,
        _now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        Err(StorageError::Connection("stats table locked".into()))
    }

    async fn delete_subject(
        &self,
        domain: Domain,
        subject: &SubjectId,
    ) -> Result<u64, StorageError> {
        self.inner.delete_subject(domain, subject).await
    }
}

#[tokio::test]
async fn failed_recompute_keeps_recorded_item() {
    let repo = FlakyStatsRepository::default();
    let svc = ProgressService::new(
        Domain::General,
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
    );
    let s = session("flaky");

    let err = svc
        .recorder()
        .record_item_learned(&s, day(2024, 1, 1), 9)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::Storage(StorageError::Connection(_))));

    let progress = svc.queries().get_progress(&s).await.unwrap();
    assert_eq!(progress[&day(2024, 1, 1)], vec![9]);
    let stats = svc.queries().get_stats(&s).await.unwrap();
    assert_eq!(stats.total_learned, 0);
}

#[tokio::test]
async fn bad_snapshot_field_keeps_achievements_and_max_streak() {
    for raw in [
        r#"{"quiz_score":300,"max_streak":6,"achievements":["first_10","quiz_master"]}"#,
        r#"{"quiz_score":85.5,"max_streak":6,"achievements":["first_10","quiz_master"]}"#,
        r#"{"total_learned":-1,"quiz_score":90,"max_streak":6,"achievements":["first_10","quiz_master"]}"#,
    ] {
        let (svc, repo) = service(Domain::General);
        let s = session("overwritten");
        repo.upsert_stats(Domain::General, &s, raw, fixed_now())
            .await
            .unwrap();

        svc.recorder()
            .record_item_learned(&s, day(2024, 1, 1), 0)
            .await
            .unwrap();

        let stats = svc.queries().get_stats(&s).await.unwrap();
        assert_eq!(stats.achievements, vec!["first_10", "quiz_master"], "{raw}");
        assert_eq!(stats.max_streak, 6, "{raw}");
        assert_eq!(stats.total_learned, 1, "{raw}");
        assert!(stats.quiz_score >= 80, "{raw}");
    }
}

/// Repository that lets a competing writer land between a slot read and its swap.
#[derive(Clone, Default)]
struct RacingRepository {
    inner: InMemoryRepository,
    competing: Arc<std::sync::Mutex<Option<String>>>,
}

#[async_trait]
impl ProgressRepository for RacingRepository {
    async fn get_record(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        self.inner.get_record(domain, subject, slot).await
    }

    async fn list_records(
        &self,
        domain: Domain,
        subject: &SubjectId,
        filter: SlotFilter,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.inner.list_records(domain, subject, filter).await
    }

    async fn upsert_learned(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.inner
            .upsert_learned(domain, subject, slot, payload, now)
            .await
    }

    async fn swap_learned(
        &self,
        domain: Domain,
        subject: &SubjectId,
        slot: SlotKey,
        expected: Option<&str>,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let competing = self.competing.lock().unwrap().take();
        if let Some(other) = competing {
            self.inner
                .upsert_learned(domain, subject, slot, &other, now)
                .await?;
        }
        self.inner
            .swap_learned(domain, subject, slot, expected, payload, now)
            .await
    }

    async fn upsert_stats(
        &self,
        domain: Domain,
        subject: &SubjectId,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.inner.upsert_stats(domain, subject, payload, now).await
    }

    async fn delete_subject(
        &self,
        domain: Domain,
        subject: &SubjectId,
    ) -> Result<u64, StorageError> {
        self.inner.delete_subject(domain, subject).await
    }
}

#[tokio::test]
async fn concurrent_write_to_same_day_is_not_lost() {
    let repo = RacingRepository::default();
    let svc = ProgressService::new(
        Domain::General,
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
    );
    let s = session("race");
    let date = day(2024, 1, 1);
    svc.recorder().record_item_learned(&s, date, 0).await.unwrap();

    // another writer adds item 1 after our read of [0]
    *repo.competing.lock().unwrap() = Some("[0,1]".into());
    let ack = svc.recorder().record_item_learned(&s, date, 2).await.unwrap();
    assert!(ack.added);

    let progress = svc.queries().get_progress(&s).await.unwrap();
    assert_eq!(progress[&date], vec![0, 1, 2]);
    assert_eq!(svc.queries().get_stats(&s).await.unwrap().total_learned, 3);
}
