use anyhow::Result;
use nodeflow::prelude::*;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn test_create_with_context() -> Result<()> {
    let ctx = FlowContext::new_with_trace_id("create-1".to_string());

    let flow = nodeflow::create(
        Step::sync(|v: i64, ctx: &FlowContext| {
            ctx.set_variable("first", v.to_string());
            Ok(v * 2)
        }),
        Some(ctx.clone()),
    )
    .then(|v, _| Ok(v + 1));

    let result = flow.run_bound(5)?.join().await?;

    assert_eq!(result, Some(11));
    assert_eq!(ctx.get_variable("first"), Some("5".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_run_bound_without_context() {
    let flow = nodeflow::create(Step::sync(|v: i64, _: &FlowContext| Ok(v)), None);

    let err = flow.run_bound(1).err();
    assert!(matches!(err, Some(FlowError::Unbound)));
}

#[tokio::test]
async fn test_json_loop_until_threshold() -> Result<()> {
    let ctx = FlowContext::default();

    let flow = nodeflow::flow::<Value, FlowContext>()
        .label("loop")
        .then(|_, ctx| Ok(json!(ctx.increment("passes"))))
        .check(|v, _| Ok(json!(v.as_i64().unwrap_or(0) > 20)))
        .on_true(Step::callback(
            |_: Value, _: &FlowContext, done: Completion<Value>| done.ok(json!(33)),
        ))
        .on_false(nodeflow::flow::<Value, FlowContext>().goto("loop"))
        .then(|v, ctx| {
            ctx.set_variable("end", v.to_string());
            Ok(v)
        })
        .on_error(|err, ctx| ctx.set_variable("error", err.to_string()))
        .always(|v, ctx| {
            ctx.increment("finally");
            if v.is_none() {
                ctx.set_variable("finally_after_error", "true");
            }
        });

    let result = flow.run(json!(0), ctx.clone()).join().await?;

    assert_eq!(result, Some(json!(33)));
    assert_eq!(ctx.get_variable("passes"), Some("21".to_string()));
    assert_eq!(ctx.get_variable("end"), Some("33".to_string()));
    assert_eq!(ctx.get_variable("error"), None);
    // Once for the branch step, once for the final step.
    assert_eq!(ctx.get_variable("finally"), Some("2".to_string()));
    assert_eq!(ctx.get_variable("finally_after_error"), None);
    Ok(())
}

#[tokio::test]
async fn test_step_error_is_handled() -> Result<()> {
    let ctx = FlowContext::default();

    let flow = nodeflow::flow::<i64, FlowContext>()
        .then(|v, _| Ok(v + 1))
        .then(|_, _| Err(anyhow::anyhow!("boom")))
        .then(|v, ctx| {
            ctx.set_variable("unreachable", v.to_string());
            Ok(v)
        })
        .on_error(|err, ctx| {
            ctx.increment("errors");
            ctx.set_variable("message", err.to_string());
        })
        .always(|v, ctx| ctx.set_variable("cleanup", format!("{v:?}")));

    let result = flow.run(1, ctx.clone()).join().await?;

    assert_eq!(result, None);
    assert_eq!(ctx.get_variable("errors"), Some("1".to_string()));
    assert_eq!(ctx.get_variable("message"), Some("boom".to_string()));
    assert_eq!(ctx.get_variable("cleanup"), Some("None".to_string()));
    assert_eq!(ctx.get_variable("unreachable"), None);
    Ok(())
}

#[tokio::test]
async fn test_unhandled_error_fails_run() {
    let flow = nodeflow::flow::<i64, FlowContext>()
        .then(|_, _| Err(anyhow::anyhow!("no handler")))
        .always(|_, ctx| ctx.set_variable("cleanup", "ran"));

    let ctx = FlowContext::default();
    let err = flow.run(0, ctx.clone()).join().await.unwrap_err();

    assert_eq!(err.to_string(), "no handler");
    assert!(err.action_error().is_some());
    assert_eq!(ctx.get_variable("cleanup"), None);
}

#[tokio::test]
async fn test_future_step_between_sync_steps() -> Result<()> {
    let flow = nodeflow::flow::<i64, FlowContext>()
        .then(|v, _| Ok(v + 1))
        .then_future(|v, ctx| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            ctx.set_variable("slept", "yes");
            Ok(v * 10)
        })
        .then(|v, _| Ok(v - 1));

    let ctx = FlowContext::default();
    let result = flow.run(1, ctx.clone()).join().await?;

    assert_eq!(result, Some(19));
    assert_eq!(ctx.get_variable("slept"), Some("yes".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_named_run_with_logger() -> Result<()> {
    Logger::init_tracing();
    let ctx = FlowContext::new_with_trace_id("named-run".to_string());
    let logger = Logger::for_context(&ctx);

    let flow = nodeflow::flow::<i64, FlowContext>()
        .then(|v, _| Ok(v + 1))
        .goto("missing")
        .on_error(logger.error_handler::<FlowContext>())
        .on_error(|err, ctx| {
            if err.is_label_not_found() {
                ctx.set_variable("missing_label", "true");
            }
        })
        .always(logger.cleanup_handler::<i64, FlowContext>());

    let config = RunConfig::named("missing-label")
        .with_trace_id(ctx.trace_id.clone())
        .detailed_logging(true);
    let handle = flow.run_with_config(0, ctx.clone(), config);
    assert_eq!(handle.trace_id(), "named-run");

    let result = handle.join().await?;

    assert_eq!(result, None);
    assert_eq!(ctx.get_variable("missing_label"), Some("true".to_string()));
    logger.log_context_summary(&ctx);
    Ok(())
}

#[tokio::test]
async fn test_loop_demo_shape() -> Result<()> {
    let ctx = FlowContext::default();

    let flow = nodeflow::flow::<i64, FlowContext>()
        .label("loop")
        .then(|_, ctx| Ok(ctx.increment("passes")))
        .check(|v, _| Ok(if v > 20 { v } else { 0 }))
        .on_true(Step::callback(
            |_: i64, _: &FlowContext, done: Completion<i64>| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    done.ok(33);
                });
            },
        ))
        .on_false(nodeflow::flow::<i64, FlowContext>().goto("loop"))
        .then(|v, ctx| {
            ctx.set_variable("end", v.to_string());
            Ok(v)
        })
        .on_error(|err, ctx| ctx.set_variable("error", err.to_string()))
        .always(|v, ctx| {
            if v.is_none() {
                ctx.set_variable("finally_without_value", "true");
            }
        });

    let result = flow
        .run_with_config(0, ctx.clone(), RunConfig::named("loop_demo"))
        .join()
        .await?;

    assert_eq!(result, Some(33));
    assert_eq!(ctx.get_variable("passes"), Some("21".to_string()));
    assert_eq!(ctx.get_variable("end"), Some("33".to_string()));
    assert_eq!(ctx.get_variable("error"), None);
    assert_eq!(ctx.get_variable("finally_without_value"), None);
    Ok(())
}

#[tokio::test]
async fn test_failed_goto_keeps_value_for_cleanup() -> Result<()> {
    let ctx = FlowContext::default();

    let flow = nodeflow::flow::<i64, FlowContext>()
        .then(|v, _| Ok(v + 1))
        .goto("missing")
        .on_error(|err, ctx| ctx.set_variable("error", err.to_string()))
        .always(|v, ctx| ctx.set_variable("cleanup", format!("{v:?}")));

    let result = flow.run(41, ctx.clone()).join().await?;

    assert_eq!(result, None);
    assert_eq!(
        ctx.get_variable("error"),
        Some("goto target not found: missing".to_string())
    );
    assert_eq!(ctx.get_variable("cleanup"), Some("Some(42)".to_string()));
    Ok(())
}
