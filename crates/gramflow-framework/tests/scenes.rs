mod common;

use gramflow_framework::fsm::{FsmContext, StorageKey};
use gramflow_framework::scene::{
    After, SceneBuilder, SceneConfig, SceneRegistry, SceneWizard, ScenesManager,
};
use gramflow_framework::{Command, Data, Dispatcher, EventType, RawState, Text};

use common::{Log, bot, callback_query, entries, log, message};

fn scene(name: &'static str, tag: &'static str, trace: &Log) -> SceneBuilder {
    let entered = trace.clone();
    let left = trace.clone();
    SceneBuilder::new(name)
        .on_enter(EventType::Message, move || {
            let trace = entered.clone();
            async move { trace.lock().push(format!("{tag}-enter")) }
        })
        .on_leave(EventType::Message, move || {
            let trace = left.clone();
            async move { trace.lock().push(format!("{tag}-leave")) }
        })
}

async fn current_state(dp: &Dispatcher) -> Option<String> {
    let key = StorageKey::new(42, 100, 7);
    FsmContext::new(dp.storage().clone(), key)
        .get_state()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_scene_transition() {
    let dp = Dispatcher::new();
    let trace = log();
    let registry = SceneRegistry::new(&dp);

    let scene_a = scene("SceneA", "A", &trace)
        .handler_after(
            EventType::Message,
            || async {},
            Text::equals(["next"]),
            After::goto("SceneB"),
        )
        .build();
    let scene_b = scene("SceneB", "B", &trace)
        .handler(
            EventType::Message,
            |wizard: SceneWizard| async move { wizard.back(Data::new()).await },
            Text::equals(["back"]),
        )
        .build();
    registry.add(scene_a.clone()).unwrap();
    registry.add(scene_b).unwrap();
    dp.message()
        .register(scene_a.as_handler(), Command::new(["a"]));

    let bot = bot();
    assert!(dp.feed_update(&bot, message(1, "/a")).await.unwrap().is_handled());
    assert_eq!(current_state(&dp).await.as_deref(), Some("SceneA"));
    assert_eq!(entries(&trace), ["A-enter"]);

    assert!(dp.feed_update(&bot, message(2, "next")).await.unwrap().is_handled());
    assert_eq!(entries(&trace), ["A-enter", "A-leave", "B-enter"]);
    assert_eq!(current_state(&dp).await.as_deref(), Some("SceneB"));

    // Scene A's handlers no longer see the conversation.
    assert!(!dp.feed_update(&bot, message(3, "next")).await.unwrap().is_handled());

    assert!(dp.feed_update(&bot, message(4, "back")).await.unwrap().is_handled());
    assert_eq!(current_state(&dp).await.as_deref(), Some("SceneA"));
    assert_eq!(
        entries(&trace),
        ["A-enter", "A-leave", "B-enter", "B-leave", "A-enter"]
    );
}

#[tokio::test]
async fn test_history_keeps_one_entry_per_transition() {
    let dp = Dispatcher::new();
    let trace = log();
    let registry = SceneRegistry::new(&dp);
    registry
        .add_all([
            scene("SceneA", "A", &trace).build(),
            scene("SceneB", "B", &trace).build(),
        ])
        .unwrap();

    dp.message().register(
        |scenes: ScenesManager| async move {
            scenes.enter("SceneA", Data::new()).await?;
            scenes.enter("SceneB", Data::new()).await?;
            let history = scenes.history().all().await?;
            Ok::<_, gramflow_framework::DispatchError>(history.len())
        },
        Command::new(["walk"]),
    );

    let outcome = dp.feed_update(&bot(), message(1, "/walk")).await.unwrap();
    assert_eq!(outcome.response().unwrap().downcast_ref::<usize>(), Some(&1));
}

#[tokio::test]
async fn test_callback_query_without_state() {
    let dp = Dispatcher::new();
    let registry = SceneRegistry::new(&dp);
    let config = SceneConfig {
        callback_query_without_state: true,
        ..Default::default()
    };
    registry
        .add(
            SceneBuilder::new("Menu")
                .config(config)
                .handler(EventType::Message, || async { "message" }, ())
                .handler(EventType::CallbackQuery, || async { "callback" }, ())
                .build(),
        )
        .unwrap();

    let bot = bot();
    assert!(!dp.feed_update(&bot, message(1, "hi")).await.unwrap().is_handled());

    let outcome = dp.feed_update(&bot, callback_query(2, "menu:open")).await.unwrap();
    assert_eq!(outcome.response().unwrap().downcast_ref::<&str>(), Some(&"callback"));
}

#[tokio::test]
async fn test_raw_state_is_visible_to_handlers() {
    let dp = Dispatcher::new();
    let registry = SceneRegistry::new(&dp);
    let form = SceneBuilder::new("Form")
        .handler(
            EventType::Message,
            |state: RawState| async move { state.0.unwrap_or_default() },
            (),
        )
        .build();
    registry.add(form.clone()).unwrap();
    dp.message().register(form.as_handler(), Command::new(["form"]));

    let bot = bot();
    dp.feed_update(&bot, message(1, "/form")).await.unwrap();
    let outcome = dp.feed_update(&bot, message(2, "anything")).await.unwrap();
    assert_eq!(
        outcome.response().unwrap().downcast_ref::<String>().map(String::as_str),
        Some("Form")
    );
}

fn register_form(dp: &Dispatcher) {
    let registry = SceneRegistry::new(dp);
    let form = SceneBuilder::new("Form")
        .handler(EventType::Message, || async { "in form" }, ())
        .build();
    registry.add(form.clone()).unwrap();
    dp.message().register(form.as_handler(), Command::new(["form"]));
}

#[tokio::test]
async fn test_scenes_outlive_registry_handle() {
    let dp = Dispatcher::new();
    register_form(&dp);

    let bot = bot();
    assert!(dp.feed_update(&bot, message(1, "/form")).await.unwrap().is_handled());
    assert_eq!(current_state(&dp).await.as_deref(), Some("Form"));

    let outcome = dp.feed_update(&bot, message(2, "hello")).await.unwrap();
    assert_eq!(outcome.response().unwrap().downcast_ref::<&str>(), Some(&"in form"));
}

#[tokio::test]
async fn test_registry_on_dropped_router() {
    let registry = SceneRegistry::new(&gramflow_framework::Router::new("gone"));
    let err = registry
        .add(SceneBuilder::new("Form").build())
        .unwrap_err();
    assert!(matches!(err, gramflow_framework::SceneError::RouterDropped(name) if name == "gone"));
}
