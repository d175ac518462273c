//! End-to-end mention handling against a mock posting service and an
//! in-memory state database.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use common::{BOT_DID, MockPostingApi, OWNER_DID, cid_for, mention, png_bytes, record_ref};
use skein_core::post::BlobRef;
use skein_core::{JpegCompressor, MentionDispatcher, Outcome, Runner, SkeinConfig, StateStore};
use skein_db::StateDb;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn config() -> SkeinConfig {
    let mut config = SkeinConfig::default();
    config.account.owner_did = Some(OWNER_DID.to_string());
    config.mentions.daily_limit = 3;
    config
}

async fn setup(
    api: MockPostingApi,
    files: &[(&str, Vec<u8>)],
) -> (
    Arc<MockPostingApi>,
    Arc<StateDb>,
    MentionDispatcher,
    tempfile::TempDir,
) {
    let api = Arc::new(api);
    let state = Arc::new(StateDb::open_in_memory().await.unwrap());
    let (dir, corpus) = common::corpus(files).await;
    let runner = Runner::new(config(), api.clone(), corpus, Arc::new(JpegCompressor));
    let dispatcher = runner
        .dispatcher(&MockPostingApi::session(), state.clone())
        .unwrap();
    (api, state, dispatcher, dir)
}

#[tokio::test]
async fn test_second_run_publishes_nothing() {
    let api = MockPostingApi::new().with_notifications(vec![
        mention("m1", "did:plc:a", "@bot 그림 알려줘"),
        mention("m2", "did:plc:b", "@bot 안녕"),
    ]);
    let (api, _state, dispatcher, _dir) = setup(api, &[]).await;

    let first = dispatcher.run(today()).await.unwrap();
    assert_eq!(first.count(Outcome::Replied), 1);
    assert_eq!(first.count(Outcome::NoReply), 1);
    let posted = api.published.lock().len();
    assert_eq!(posted, 1);

    let second = dispatcher.run(today()).await.unwrap();
    assert_eq!(second.count(Outcome::AlreadyProcessed), 2);
    assert_eq!(api.published.lock().len(), posted);
}

#[tokio::test]
async fn test_non_mentions_are_skipped() {
    let mut like = mention("l1", "did:plc:a", "");
    like.reason = "like".to_string();
    let (api, state, dispatcher, _dir) = setup(MockPostingApi::new(), &[]).await;

    assert_eq!(
        dispatcher.process(&like, today()).await.unwrap(),
        Outcome::NotMention
    );
    assert!(!state.is_processed(&cid_for("l1")).await.unwrap());
    assert!(api.published.lock().is_empty());
}

#[tokio::test]
async fn test_moderation_blacklists_and_replies_in_thread() {
    let (api, state, dispatcher, _dir) = setup(MockPostingApi::new(), &[]).await;

    // matches both the first and the third category; the first wins
    let n = mention("m1", "did:plc:rude", "류웡 절대미궁 사진");
    let outcome = dispatcher.process(&n, today()).await.unwrap();

    assert_eq!(outcome, Outcome::Moderated);
    assert!(state.is_ignored("did:plc:rude").await.unwrap());
    assert!(state.is_processed(&cid_for("m1")).await.unwrap());

    let drafts = api.drafts();
    assert_eq!(drafts.len(), 1);
    assert_eq!(
        drafts[0].text,
        "봇주는 오메르타 시리즈의 비공식 커플링 관련 주제를 거부하고 있습니다."
    );
    let reply = drafts[0].reply.as_ref().unwrap();
    assert_eq!(reply.parent, n.post_ref());
    assert_eq!(reply.root, n.post_ref());

    // subsequent mentions from the same actor are dropped silently
    let again = mention("m2", "did:plc:rude", "사진 주세요");
    assert_eq!(
        dispatcher.process(&again, today()).await.unwrap(),
        Outcome::Ignored
    );
    assert_eq!(api.published.lock().len(), 1);
}

#[tokio::test]
async fn test_repeated_text_is_dropped() {
    let (api, _state, dispatcher, _dir) = setup(MockPostingApi::new(), &[]).await;

    let first = mention("m1", "did:plc:a", "@bot 그림 알려줘");
    let repeat = mention("m2", "did:plc:a", "  @bot 그림 알려줘 ");
    let next_day = mention("m3", "did:plc:a", "@bot 그림 알려줘");
    let other_day = today().succ_opt().unwrap();

    assert_eq!(dispatcher.process(&first, today()).await.unwrap(), Outcome::Replied);
    assert_eq!(
        dispatcher.process(&repeat, today()).await.unwrap(),
        Outcome::DuplicateText
    );
    assert_eq!(
        dispatcher.process(&next_day, other_day).await.unwrap(),
        Outcome::Replied
    );
    assert_eq!(api.published.lock().len(), 2);
}

#[tokio::test]
async fn test_daily_limit_blacklists_without_reply() {
    let (api, state, dispatcher, _dir) = setup(MockPostingApi::new(), &[]).await;

    for i in 1..=3 {
        let n = mention(&format!("m{}", i), "did:plc:chatty", &format!("안녕 {}", i));
        assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::NoReply);
    }
    let n = mention("m4", "did:plc:chatty", "사진 줘");
    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::OverQuota);

    assert!(state.is_ignored("did:plc:chatty").await.unwrap());
    assert!(state.is_processed(&cid_for("m4")).await.unwrap());
    assert!(api.published.lock().is_empty());
}

#[tokio::test]
async fn test_owner_unblacklist_then_normal_handling() {
    let (api, state, dispatcher, _dir) = setup(MockPostingApi::new(), &[]).await;
    state.add_ignored(&["did:plc:fan".to_string()]).await.unwrap();

    let n = mention(
        "m1",
        OWNER_DID,
        "@bot.bsky.social 블랙리스트 해제 @fan.bsky.social",
    );
    let outcome = dispatcher.process(&n, today()).await.unwrap();

    // no intent keyword, so only the confirmation is posted
    assert_eq!(outcome, Outcome::NoReply);
    assert!(!state.is_ignored("did:plc:fan").await.unwrap());

    let drafts = api.drafts();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].text, "✅ @fan.bsky.social 블랙리스트에서 해제되었습니다.");
    assert!(drafts[0].reply.is_none());
    // the handle in the confirmation is linked
    assert_eq!(drafts[0].facets.len(), 1);
}

#[tokio::test]
async fn test_unblacklist_from_non_owner_does_nothing() {
    let (api, state, dispatcher, _dir) = setup(MockPostingApi::new(), &[]).await;
    state.add_ignored(&["did:plc:fan".to_string()]).await.unwrap();

    let n = mention("m1", "did:plc:random", "블랙리스트 해제 @did:plc:fan");
    dispatcher.process(&n, today()).await.unwrap();

    assert!(state.is_ignored("did:plc:fan").await.unwrap());
    assert!(api.published.lock().is_empty());
}

#[tokio::test]
async fn test_failed_reply_is_retried_next_run() {
    let api = MockPostingApi::new();
    api.fail_publishing("⚠️");
    let (api, state, dispatcher, _dir) = setup(api, &[]).await;

    // no reply sources on disk, so the text fallback is what gets posted
    let n = mention("m1", "did:plc:a", "@bot 스크립트 하나");
    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Deferred);
    assert!(!state.is_processed(&cid_for("m1")).await.unwrap());
    assert!(api.published.lock().is_empty());

    api.stop_failing();
    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Replied);
    assert!(state.is_processed(&cid_for("m1")).await.unwrap());
    assert!(api.posted_texts()[0].starts_with("⚠️ 텍스트 응답이"));
}

#[tokio::test]
async fn test_retried_replies_do_not_use_up_the_daily_limit() {
    let api = MockPostingApi::new();
    api.fail_publishing("⚠️");
    let (api, state, dispatcher, _dir) = setup(api, &[]).await;

    // daily_limit is 3; every failed attempt must hand its count back
    let n = mention("m1", "did:plc:a", "@bot 스크립트 하나");
    for _ in 0..5 {
        assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Deferred);
    }
    assert!(!state.is_ignored("did:plc:a").await.unwrap());
    assert!(!state.is_processed(&n.cid).await.unwrap());

    api.stop_failing();
    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Replied);
    assert!(!state.is_ignored("did:plc:a").await.unwrap());

    // the successful reply is the only one on today's count
    for i in 2..=3 {
        let other = mention(&format!("m{}", i), "did:plc:a", &format!("안녕 {}", i));
        assert_eq!(
            dispatcher.process(&other, today()).await.unwrap(),
            Outcome::NoReply
        );
    }
    let fourth = mention("m4", "did:plc:a", "안녕 4");
    assert_eq!(
        dispatcher.process(&fourth, today()).await.unwrap(),
        Outcome::OverQuota
    );
}

#[tokio::test]
async fn test_failed_moderation_reply_is_sent_on_retry() {
    let api = MockPostingApi::new();
    api.fail_publishing("봇주는");
    let (api, state, dispatcher, _dir) = setup(api, &[]).await;

    let n = mention("m1", "did:plc:rude", "류웡 사진");
    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Deferred);
    assert!(!state.is_ignored("did:plc:rude").await.unwrap());
    assert!(!state.is_processed(&n.cid).await.unwrap());
    assert!(api.published.lock().is_empty());

    api.stop_failing();
    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Moderated);
    assert!(state.is_ignored("did:plc:rude").await.unwrap());
    assert!(state.is_processed(&n.cid).await.unwrap());

    let drafts = api.drafts();
    assert_eq!(drafts.len(), 1);
    assert!(drafts[0].text.starts_with("봇주는"));
    assert_eq!(drafts[0].reply.as_ref().unwrap().parent, n.post_ref());
}

#[tokio::test]
async fn test_reply_to_mention_inside_a_thread() {
    let (api, _state, dispatcher, _dir) = setup(
        MockPostingApi::new(),
        &[("replies/a.txt", "제목\n---\n답장 본문\n---\n끝".as_bytes().to_vec())],
    )
    .await;

    let root = record_ref("root", "at://did:plc:op/app.bsky.feed.post/r");
    let mut n = mention("m1", "did:plc:a", "@bot ss 하나");
    n.thread_root = Some(root.clone());

    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Replied);
    let drafts = api.drafts();
    assert_eq!(drafts[0].text, "답장 본문");
    let reply = drafts[0].reply.as_ref().unwrap();
    assert_eq!(reply.root, root);
    assert_eq!(reply.parent, n.post_ref());
}

#[tokio::test]
async fn test_image_reply_embeds_jpeg() {
    let (api, _state, dispatcher, _dir) =
        setup(MockPostingApi::new(), &[("reply_images/cat.png", png_bytes())]).await;

    let n = mention("m1", "did:plc:a", "@bot 사진 줘");
    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Replied);

    assert_eq!(api.uploads.lock()[0].1, "image/jpeg");
    let drafts = api.drafts();
    assert_eq!(drafts[0].text, "📷 요청하신 이미지를 첨부합니다.");
    let Some(embed) = &drafts[0].embed else {
        panic!("expected an image embed");
    };
    assert_eq!(embed.images[0].alt, "cat.png");
    assert!(matches!(embed.images[0].image, BlobRef::Typed(_)));
}

#[tokio::test]
async fn test_image_upload_failure_falls_back_to_notice() {
    let api = MockPostingApi {
        fail_uploads: true,
        ..MockPostingApi::new()
    };
    let (api, _state, dispatcher, _dir) =
        setup(api, &[("reply_images/cat.png", png_bytes())]).await;

    let n = mention("m1", "did:plc:a", "@bot 이미지");
    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Replied);

    let drafts = api.drafts();
    assert_eq!(drafts.len(), 1);
    assert!(drafts[0].embed.is_none());
    assert!(drafts[0].text.starts_with("⚠️ 이미지 응답이"));
}

#[tokio::test]
async fn test_question_answers_chain_and_unknown_questions_stay_silent() {
    let long_answer: String = (0..12)
        .map(|i| format!("웡 웨이에 대한 설명 {}번째 줄입니다. 조금 더 길게 써 봅니다.", i))
        .collect::<Vec<_>>()
        .join("\n");
    let (api, state, dispatcher, _dir) = setup(
        MockPostingApi::new(),
        &[("reply_questions/02. wong wei.txt", long_answer.into_bytes())],
    )
    .await;

    let n = mention("m1", "did:plc:a", "웡에 대해 알려줘");
    assert_eq!(dispatcher.process(&n, today()).await.unwrap(), Outcome::Replied);

    let published = api.published.lock().clone();
    assert!(published.len() > 1);
    // first answer post replies to the mention, the rest chain below it
    let first_reply = published[0].1.reply.as_ref().unwrap();
    assert_eq!(first_reply.parent, n.post_ref());
    let second_reply = published[1].1.reply.as_ref().unwrap();
    assert_eq!(second_reply.parent, published[0].0);
    assert_eq!(second_reply.root, n.post_ref());

    let unknown = mention("m2", "did:plc:b", "날씨 알려줘");
    assert_eq!(
        dispatcher.process(&unknown, today()).await.unwrap(),
        Outcome::NoReply
    );
    assert!(state.is_processed(&cid_for("m2")).await.unwrap());
    assert_eq!(api.published.lock().len(), published.len());
}

#[tokio::test]
async fn test_replies_are_posted_to_bot_repo() {
    let api = MockPostingApi::new().with_notifications(vec![mention("m1", "did:plc:a", "그림")]);
    let (api, _state, dispatcher, _dir) = setup(api, &[]).await;
    dispatcher.run(today()).await.unwrap();

    let published = api.published.lock();
    assert!(published[0].0.uri.starts_with(&format!("at://{}/", BOT_DID)));
}
